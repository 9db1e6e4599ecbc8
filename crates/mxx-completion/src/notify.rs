// notify.rs - Profiles whose early process exit still counts as success.
//
// Some apps quit on their own once their work is done. For those the
// monitor's "processes vanished" verdict is expected, so the tracker
// records them as completed. The list lives in
// `<completion_dir>/notify.json` as a sorted JSON array of names.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CompletionError;

pub const NOTIFY_FILE: &str = "notify.json";

pub struct NotifyList {
    path: PathBuf,
}

impl NotifyList {
    pub fn in_dir(completion_dir: &Path) -> Self {
        Self {
            path: completion_dir.join(NOTIFY_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeSet<String> {
        if !self.path.exists() {
            return BTreeSet::new();
        }
        let parsed = fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()));
        match parsed {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "ignoring unreadable notify list: {}", e);
                BTreeSet::new()
            }
        }
    }

    fn save(&self, names: &BTreeSet<String>) -> Result<(), CompletionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| CompletionError::IoError {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(names).map_err(|source| CompletionError::Encode {
            path: self.path.display().to_string(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|source| CompletionError::IoError {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Returns `false` if the name was already listed.
    pub fn add(&self, name: &str) -> Result<bool, CompletionError> {
        let mut names = self.load();
        if !names.insert(name.to_string()) {
            return Ok(false);
        }
        self.save(&names)?;
        Ok(true)
    }

    /// Returns `false` if the name wasn't listed.
    pub fn remove(&self, name: &str) -> Result<bool, CompletionError> {
        let mut names = self.load();
        if !names.remove(name) {
            return Ok(false);
        }
        self.save(&names)?;
        Ok(true)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.load().contains(name)
    }

    pub fn list(&self) -> Vec<String> {
        self.load().into_iter().collect()
    }
}
