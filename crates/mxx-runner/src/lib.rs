//! # mxx-runner
//!
//! The profile execution engine: starts a profile's processes, optionally
//! watches them for the profile's lifetime, and tears them down, asking the
//! plugin registry for permission at every gate.
//!
//! ```text
//! Idle -> Starting -> Running -> Detached
//!                             -> MonitoringForKill -> Stopping -> Stopped
//!         (any) -> Aborted
//! ```

pub mod config;
pub mod error;
pub mod resolver;
pub mod runner;
pub mod state;

pub use config::{MxxConfig, MxxPaths};
pub use error::RunError;
pub use resolver::ProfileResolver;
pub use runner::{DownReport, ProfileRunner, UpOptions};
pub use state::{KillMode, RunOutcome, RunReport, RunState};
