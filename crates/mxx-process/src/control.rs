// control.rs - ProcessControl: the primitives mxx needs from the OS.

use std::fmt;
use std::path::{Path, PathBuf};

use mxx_profile::EmulatorSlot;

use crate::error::ProcessError;

/// Selects a set of processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessMatcher {
    /// Processes whose executable file name matches (e.g. `MAA.exe`).
    ExecutableName(String),
    /// Processes running exactly this executable.
    ExecutablePath(PathBuf),
    /// One emulator instance, addressed through the emulator console.
    EmulatorSlot(EmulatorSlot),
    /// Every emulator instance.
    AllEmulators,
}

impl fmt::Display for ProcessMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessMatcher::ExecutableName(name) => write!(f, "process '{}'", name),
            ProcessMatcher::ExecutablePath(path) => write!(f, "executable {}", path.display()),
            ProcessMatcher::EmulatorSlot(slot) => write!(f, "emulator {}", slot),
            ProcessMatcher::AllEmulators => write!(f, "all emulators"),
        }
    }
}

/// OS process primitives.
pub trait ProcessControl: Send + Sync {
    /// Start `program` detached from mxx: no inherited stdio, own session,
    /// survives mxx exiting.
    fn launch_detached(
        &self,
        program: &Path,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<(), ProcessError>;

    /// Boot an emulator instance.
    fn launch_emulator(&self, slot: &EmulatorSlot) -> Result<(), ProcessError>;

    /// Whether any process selected by `matcher` is alive.
    fn is_running(&self, matcher: &ProcessMatcher) -> bool;

    /// Stop every process selected by `matcher`. Returns how many were
    /// signalled.
    fn kill_all(&self, matcher: &ProcessMatcher) -> Result<usize, ProcessError>;
}
