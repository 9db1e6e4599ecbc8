//! # mxx-process
//!
//! Everything that touches OS processes: launching the emulator and the
//! automation app detached, asking whether they are still alive, killing
//! them, and the lifetime monitor that polls them while a profile runs.
//!
//! The [`ProcessControl`] trait is the seam between mxx and the OS.
//! [`SystemProcessControl`] is the real implementation; tests substitute a
//! scripted one.

pub mod control;
pub mod error;
pub mod instance;
pub mod monitor;
pub mod supervisor;
pub mod system;

pub use control::{ProcessControl, ProcessMatcher};
pub use error::ProcessError;
pub use instance::SingleInstanceGuard;
pub use monitor::{Monitor, MonitorOutcome, MonitorState, Sleeper, ThreadSleeper};
pub use supervisor::Supervisor;
pub use system::SystemProcessControl;
