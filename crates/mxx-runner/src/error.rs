// error.rs - Error types for the profile runner.

use mxx_process::ProcessError;
use mxx_profile::ProfileError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    /// Profile missing or malformed. Raised before any process is touched.
    #[error(transparent)]
    Profile(#[from] ProfileError),

    /// A process could not be started; the run was aborted.
    #[error("failed to launch profile '{profile}': {source}")]
    Launch {
        profile: String,
        source: ProcessError,
    },

    #[error("invalid run state transition for '{profile}': {from} -> {to}")]
    InvalidTransition {
        profile: String,
        from: String,
        to: String,
    },

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: String,
        source: toml::de::Error,
    },
}
