// error.rs - Error types for profile loading and validation.

use thiserror::Error;

/// Errors raised while locating, parsing, or validating a profile.
///
/// All of these are configuration errors: they surface before any process
/// is launched.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// No profile with this name exists in any source.
    #[error("profile not found: {0}")]
    NotFound(String),

    /// The profile parsed but describes something that cannot run.
    #[error("invalid profile '{name}': {reason}")]
    Invalid { name: String, reason: String },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// The TOML content could not be decoded into a profile.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    /// A `{ template = "..." }` section points at a part file that does not exist.
    #[error("template '{template}' for section '{section}' of '{name}' not found")]
    MissingTemplate {
        name: String,
        section: String,
        template: String,
    },
}
