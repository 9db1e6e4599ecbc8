//! # mxx-plugin
//!
//! Hook pipeline for mxx.
//!
//! Every lifecycle transition of a profile run is announced to the
//! registered plugins, and the transitions that matter (start, kill,
//! command execution) can be vetoed by any one of them.
//!
//! ## Key components
//!
//! - [`RunContext`] - the per-invocation key/value bag (`--var` values,
//!   profile name, scratch keys such as `profile_failed`)
//! - [`Plugin`] - the capability set a plugin may implement; every hook is
//!   optional
//! - [`PluginRegistry`] - ordered plugin list with failure-isolating
//!   dispatch and AND-of-all-votes veto gates
//! - [`ExternalPlugin`] - adapter for `mxxp-*` executables speaking JSON
//!   over stdio, found by [`PluginRegistry::discover`]

pub mod context;
pub mod error;
pub mod external;
pub mod plugin;
pub mod registry;

pub use context::RunContext;
pub use error::PluginError;
pub use external::{ExternalPlugin, PluginManifest};
pub use plugin::{hooks, HookResult, Plugin};
pub use registry::{DiscoveryOptions, PluginRegistry};
