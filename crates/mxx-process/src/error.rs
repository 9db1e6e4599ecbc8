// error.rs - Error types for process control.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program is not on PATH or the given path doesn't exist.
    #[error("executable not found: {program}")]
    ExecutableNotFound { program: String },

    /// The OS refused to start the program.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The emulator console ran but reported failure.
    #[error("emulator console '{command}' failed: {reason}")]
    Console { command: String, reason: String },
}

impl ProcessError {
    /// Whether this error means nothing was started.
    pub fn is_launch_failure(&self) -> bool {
        matches!(
            self,
            ProcessError::ExecutableNotFound { .. } | ProcessError::Spawn { .. }
        )
    }
}
