// config.rs - Runtime configuration and directory layout.
//
// Layout under the mxx root (`$MXX_CONFIG_DIR`, else `~/.mxx`):
//   mxx.toml        runtime tunables (MxxConfig), optional
//   configs/        profile files
//   completion/     per-day completion records and the notify list
// External plugins under development live in `<cwd>/plugins`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mxx_process::Monitor;
use serde::{Deserialize, Serialize};

use crate::error::RunError;

/// Environment variable overriding the mxx root directory.
pub const CONFIG_DIR_ENV: &str = "MXX_CONFIG_DIR";

/// Where mxx keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxxPaths {
    pub root: PathBuf,
    pub config_file: PathBuf,
    pub configs_dir: PathBuf,
    pub completion_dir: PathBuf,
    pub plugins_dir: PathBuf,
}

impl MxxPaths {
    /// Standard layout under `root`, with plugins looked up under `cwd`.
    pub fn for_root(root: impl AsRef<Path>, cwd: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            config_file: root.join("mxx.toml"),
            configs_dir: root.join("configs"),
            completion_dir: root.join("completion"),
            plugins_dir: cwd.as_ref().join("plugins"),
            root,
        }
    }

    /// Resolve the root from `$MXX_CONFIG_DIR` or the home directory.
    pub fn resolve() -> Option<Self> {
        let root = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()?.join(".mxx"),
        };
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Some(Self::for_root(root, cwd))
    }
}

/// Tunables from `mxx.toml`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MxxConfig {
    /// Emulator console executable, looked up on PATH.
    #[serde(default = "default_emulator_console")]
    pub emulator_console: String,

    /// Seconds between starting the emulator and the app when the profile
    /// doesn't say.
    #[serde(default = "default_waittime")]
    pub default_waittime: u64,

    /// Seconds between liveness polls while monitoring.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Consecutive failed polls before a run is declared failed.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Per-call timeout for external plugins.
    #[serde(default = "default_plugin_timeout_secs")]
    pub plugin_timeout_secs: u64,

    /// Refuse to run while another mxx is running.
    #[serde(default = "default_true")]
    pub single_instance: bool,

    /// Look for `mxxp-*` plugin executables.
    #[serde(default = "default_true")]
    pub discover_plugins: bool,
}

impl Default for MxxConfig {
    fn default() -> Self {
        Self {
            emulator_console: default_emulator_console(),
            default_waittime: default_waittime(),
            poll_interval_secs: default_poll_interval_secs(),
            max_consecutive_failures: default_max_consecutive_failures(),
            plugin_timeout_secs: default_plugin_timeout_secs(),
            single_instance: true,
            discover_plugins: true,
        }
    }
}

fn default_emulator_console() -> String {
    "ldpx".to_string()
}

fn default_waittime() -> u64 {
    15
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_max_consecutive_failures() -> u32 {
    10
}

fn default_plugin_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl MxxConfig {
    pub fn load(path: &Path) -> Result<Self, RunError> {
        let content = fs::read_to_string(path).map_err(|source| RunError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| RunError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load the config, falling back to defaults when the file is missing.
    /// A file that exists but doesn't parse is reported and ignored.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("{}; using defaults", e);
            Self::default()
        })
    }

    pub fn plugin_timeout(&self) -> Duration {
        Duration::from_secs(self.plugin_timeout_secs)
    }

    pub fn monitor(&self) -> Monitor {
        Monitor::new(
            Duration::from_secs(self.poll_interval_secs),
            self.max_consecutive_failures,
        )
    }
}
