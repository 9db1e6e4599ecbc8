// error.rs - Error types for completion persistence.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to encode {path}: {source}")]
    Encode {
        path: String,
        source: serde_json::Error,
    },
}
