// profile.rs - Profile: one emulator + automation-app pairing.
//
// A profile is immutable for the duration of a run. It names up to two
// things to launch:
//   - an emulator slot, addressed by index OR by name (never both)
//   - an automation app, an executable inside an install directory
// plus the lifetime (how long kill-on-lifetime runs wait before tearing
// down) and the waittime between starting the emulator and the app.
//
// Legacy profile files use `ld` / `maa` / `configDir`; those keys are
// accepted as aliases.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// Which emulator instance a profile drives.
///
/// Serialized as `{ index = 3 }` or `{ name = "farm-2" }`. Supplying both
/// keys, or neither, is rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SlotFields", into = "SlotFields")]
pub enum EmulatorSlot {
    Index(u32),
    Name(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SlotFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl TryFrom<SlotFields> for EmulatorSlot {
    type Error = String;

    fn try_from(fields: SlotFields) -> Result<Self, Self::Error> {
        let name = fields.name.filter(|n| !n.trim().is_empty());
        match (fields.index, name) {
            (Some(index), None) => Ok(EmulatorSlot::Index(index)),
            (None, Some(name)) => Ok(EmulatorSlot::Name(name)),
            (Some(_), Some(_)) => {
                Err("emulator slot takes either 'index' or 'name', not both".to_string())
            }
            (None, None) => Err("emulator slot needs an 'index' or a 'name'".to_string()),
        }
    }
}

impl From<EmulatorSlot> for SlotFields {
    fn from(slot: EmulatorSlot) -> Self {
        match slot {
            EmulatorSlot::Index(index) => SlotFields {
                index: Some(index),
                name: None,
            },
            EmulatorSlot::Name(name) => SlotFields {
                index: None,
                name: Some(name),
            },
        }
    }
}

impl EmulatorSlot {
    /// Console arguments selecting this slot (`--index 3` / `--name farm-2`).
    pub fn selector_args(&self) -> Vec<String> {
        match self {
            EmulatorSlot::Index(index) => vec!["--index".to_string(), index.to_string()],
            EmulatorSlot::Name(name) => vec!["--name".to_string(), name.clone()],
        }
    }
}

impl fmt::Display for EmulatorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmulatorSlot::Index(index) => write!(f, "index {}", index),
            EmulatorSlot::Name(name) => write!(f, "name '{}'", name),
        }
    }
}

/// The automation client a profile launches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDescriptor {
    /// Install directory.
    pub path: PathBuf,

    /// Executable file name inside `path` (e.g. `MAA.exe`).
    pub app: String,

    /// Config directory, relative to `path`.
    #[serde(default, alias = "configDir", skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<PathBuf>,

    /// Config file name inside `config_dir`.
    #[serde(default, alias = "configFile", skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,

    /// How the app's config is merged before launch. Passed through
    /// untouched for plugins that prepare the config file.
    #[serde(default, alias = "parseMode", skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
}

impl AppDescriptor {
    pub fn new(path: impl Into<PathBuf>, app: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            app: app.into(),
            config_dir: None,
            config_file: None,
            parse_mode: None,
        }
    }

    /// Full path to the executable.
    pub fn executable_path(&self) -> PathBuf {
        self.path.join(&self.app)
    }

    /// Bare file name of the executable, used to match it in the process table.
    pub fn executable_name(&self) -> String {
        PathBuf::from(&self.app)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.app.clone())
    }

    /// Full path to the config directory, if one is configured.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config_dir.as_ref().map(|dir| self.path.join(dir))
    }
}

/// A named automation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Unique key. Filled from the file stem when loaded from disk.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, alias = "ld", skip_serializing_if = "Option::is_none")]
    pub emulator: Option<EmulatorSlot>,

    #[serde(default, alias = "maa", skip_serializing_if = "Option::is_none")]
    pub app: Option<AppDescriptor>,

    /// Seconds the processes may run in kill-on-lifetime modes. 0 or
    /// absent means run indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<u64>,

    /// Seconds between starting the emulator and starting the app.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waittime: Option<u64>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            emulator: None,
            app: None,
            lifetime: None,
            waittime: None,
        }
    }

    pub fn with_emulator(mut self, slot: EmulatorSlot) -> Self {
        self.emulator = Some(slot);
        self
    }

    pub fn with_app(mut self, app: AppDescriptor) -> Self {
        self.app = Some(app);
        self
    }

    pub fn with_lifetime(mut self, seconds: u64) -> Self {
        self.lifetime = Some(seconds);
        self
    }

    pub fn with_waittime(mut self, seconds: u64) -> Self {
        self.waittime = Some(seconds);
        self
    }

    /// Lifetime as a duration, `None` when the profile runs indefinitely.
    pub fn lifetime_duration(&self) -> Option<Duration> {
        self.lifetime
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Waittime, falling back to `default_secs` when the profile leaves it unset.
    pub fn waittime_or(&self, default_secs: u64) -> Duration {
        Duration::from_secs(self.waittime.unwrap_or(default_secs))
    }

    /// Structural checks that must pass before anything is launched.
    ///
    /// Whether the executable actually exists is left to the launch step,
    /// which reports it as a launch failure.
    pub fn validate(&self) -> Result<(), ProfileError> {
        let invalid = |reason: &str| ProfileError::Invalid {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("profile has no name"));
        }
        if self.emulator.is_none() && self.app.is_none() {
            return Err(invalid("profile must configure an emulator, an app, or both"));
        }
        if let Some(app) = &self.app {
            if app.path.as_os_str().is_empty() {
                return Err(invalid("app install path cannot be empty"));
            }
            if app.app.trim().is_empty() {
                return Err(invalid("app executable must be specified"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> Result<Profile, toml::de::Error> {
        toml::from_str(toml_text)
    }

    #[test]
    fn parses_full_profile() {
        let profile = parse(
            r#"
            lifetime = 3600
            waittime = 20

            [emulator]
            index = 2

            [app]
            path = "/opt/maa"
            app = "MAA"
            config_dir = "config"
            config_file = "gui.json"
            parse_mode = "overwrite"
            "#,
        )
        .unwrap();

        assert_eq!(profile.emulator, Some(EmulatorSlot::Index(2)));
        let app = profile.app.unwrap();
        assert_eq!(app.executable_path(), PathBuf::from("/opt/maa/MAA"));
        assert_eq!(app.config_path(), Some(PathBuf::from("/opt/maa/config")));
        assert_eq!(app.parse_mode.as_deref(), Some("overwrite"));
        assert_eq!(profile.lifetime, Some(3600));
        assert_eq!(profile.waittime, Some(20));
    }

    #[test]
    fn accepts_legacy_section_names() {
        let profile = parse(
            r#"
            [ld]
            name = "farm"

            [maa]
            path = "C:/MAA"
            app = "MAA.exe"
            configDir = "config"
            "#,
        )
        .unwrap();

        assert_eq!(profile.emulator, Some(EmulatorSlot::Name("farm".into())));
        assert_eq!(
            profile.app.unwrap().config_dir,
            Some(PathBuf::from("config"))
        );
    }

    #[test]
    fn slot_with_index_and_name_is_rejected() {
        let err = parse("[emulator]\nindex = 1\nname = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("not both"));
    }

    #[test]
    fn slot_with_neither_is_rejected() {
        assert!(parse("[emulator]\n").is_err());
        // Blank names count as absent.
        assert!(parse("[emulator]\nname = \"  \"\n").is_err());
    }

    #[test]
    fn slot_serializes_back_to_single_key() {
        let json = serde_json::to_string(&EmulatorSlot::Index(4)).unwrap();
        assert_eq!(json, r#"{"index":4}"#);
        let json = serde_json::to_string(&EmulatorSlot::Name("a".into())).unwrap();
        assert_eq!(json, r#"{"name":"a"}"#);
    }

    #[test]
    fn selector_args_match_console_flags() {
        assert_eq!(EmulatorSlot::Index(0).selector_args(), vec!["--index", "0"]);
        assert_eq!(
            EmulatorSlot::Name("main".into()).selector_args(),
            vec!["--name", "main"]
        );
    }

    #[test]
    fn zero_lifetime_means_indefinite() {
        assert_eq!(Profile::new("p").with_lifetime(0).lifetime_duration(), None);
        assert_eq!(Profile::new("p").lifetime_duration(), None);
        assert_eq!(
            Profile::new("p").with_lifetime(5).lifetime_duration(),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn waittime_falls_back_to_default() {
        assert_eq!(Profile::new("p").waittime_or(15), Duration::from_secs(15));
        assert_eq!(
            Profile::new("p").with_waittime(0).waittime_or(15),
            Duration::ZERO
        );
    }

    #[test]
    fn validate_requires_something_to_launch() {
        let err = Profile::new("empty").validate().unwrap_err();
        assert!(matches!(err, ProfileError::Invalid { .. }));

        Profile::new("emu")
            .with_emulator(EmulatorSlot::Index(0))
            .validate()
            .unwrap();
    }

    #[test]
    fn validate_rejects_blank_app_fields() {
        let profile = Profile::new("p").with_app(AppDescriptor::new("/opt/maa", ""));
        assert!(profile.validate().is_err());

        let profile = Profile::new("p").with_app(AppDescriptor::new("", "MAA"));
        assert!(profile.validate().is_err());
    }

    #[test]
    fn executable_name_strips_directories() {
        let app = AppDescriptor::new("/opt/maa", "bin/MAA.exe");
        assert_eq!(app.executable_name(), "MAA.exe");
    }
}
