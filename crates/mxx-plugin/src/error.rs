// error.rs - Error types for plugin hooks.
//
// A PluginError never stops a run: the registry logs it and treats the
// failing plugin as having no opinion.

use thiserror::Error;

/// Errors a plugin hook can report.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin executable could not be started.
    #[error("failed to start plugin {path}: {source}")]
    Spawn {
        path: String,
        source: std::io::Error,
    },

    /// Reading from or writing to the plugin process failed.
    #[error("I/O error talking to plugin {name}: {source}")]
    Io {
        name: String,
        source: std::io::Error,
    },

    /// The plugin did not answer within the configured timeout.
    #[error("plugin {name} timed out after {seconds}s")]
    Timeout { name: String, seconds: u64 },

    /// The plugin process exited unsuccessfully.
    #[error("plugin {name} exited with {status}")]
    Exit { name: String, status: String },

    /// The plugin's answer was not the JSON we expect.
    #[error("plugin {name} returned malformed output: {source}")]
    Protocol {
        name: String,
        source: serde_json::Error,
    },

    /// A hook implemented in-process failed.
    #[error("{0}")]
    Failed(String),
}
