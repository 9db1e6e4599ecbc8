//! # mxx-profile
//!
//! Profile model for mxx.
//!
//! A [`Profile`] names one emulator + automation-app pairing together with
//! its run parameters (lifetime, waittime). Profiles are read from TOML
//! files by [`ProfileStore`] and handed to the runner through the
//! [`ProfileSource`] trait, so other sources (plugins, tests) can supply
//! them too.

pub mod error;
pub mod profile;
pub mod source;
pub mod store;

pub use error::ProfileError;
pub use profile::{AppDescriptor, EmulatorSlot, Profile};
pub use source::ProfileSource;
pub use store::ProfileStore;
