// store.rs - ProfileStore: profiles as TOML files on disk.
//
// Layout: `<configs_dir>/<name>.toml`, one profile per file. The profile's
// name is the file stem.
//
// A section may be written as `{ template = "base" }` instead of inline
// fields; it is then replaced by the part file `<configs_dir>/base.<section>.toml`.
// Part files have a dotted stem (`base.emulator.toml`, `base.app.toml`,
// legacy `base.ld.toml` / `base.maa.toml`) and are never listed as profiles.

use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;

use crate::error::ProfileError;
use crate::profile::Profile;
use crate::source::ProfileSource;

/// Section names that may be templated, with the part-file suffixes tried
/// for each (canonical first).
const TEMPLATE_SECTIONS: &[(&str, &[&str])] = &[
    ("emulator", &["emulator", "ld"]),
    ("ld", &["ld", "emulator"]),
    ("app", &["app", "maa"]),
    ("maa", &["maa", "app"]),
];

/// Profile files in a single directory.
pub struct ProfileStore {
    configs_dir: PathBuf,
}

impl ProfileStore {
    /// Create a store backed by the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new(configs_dir: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let configs_dir = configs_dir.as_ref().to_path_buf();
        fs::create_dir_all(&configs_dir).map_err(|source| ProfileError::IoError {
            path: configs_dir.display().to_string(),
            source,
        })?;
        Ok(Self { configs_dir })
    }

    pub fn configs_dir(&self) -> &Path {
        &self.configs_dir
    }

    /// Names of all full profiles (part files excluded), sorted.
    pub fn names(&self) -> Result<Vec<String>, ProfileError> {
        let entries = fs::read_dir(&self.configs_dir).map_err(|source| ProfileError::IoError {
            path: self.configs_dir.display().to_string(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ProfileError::IoError {
                path: self.configs_dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "toml") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !is_part_name(stem) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn profile_file(&self, name: &str) -> PathBuf {
        self.configs_dir.join(format!("{}.toml", name))
    }

    fn read_table(&self, path: &Path) -> Result<toml::Table, ProfileError> {
        let text = fs::read_to_string(path).map_err(|source| ProfileError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        text.parse::<toml::Table>()
            .map_err(|source| ProfileError::Parse {
                path: path.display().to_string(),
                source,
            })
    }

    /// Replace `{ template = "..." }` sections with the referenced part file.
    fn expand_templates(&self, name: &str, table: &mut toml::Table) -> Result<(), ProfileError> {
        for (section, suffixes) in TEMPLATE_SECTIONS {
            let template = match table.get(*section) {
                Some(Value::Table(inner)) if inner.contains_key("template") => {
                    if inner.len() != 1 {
                        return Err(ProfileError::Invalid {
                            name: name.to_string(),
                            reason: format!("template section '{}' has extra keys", section),
                        });
                    }
                    match inner.get("template") {
                        Some(Value::String(t)) => t.clone(),
                        _ => {
                            return Err(ProfileError::Invalid {
                                name: name.to_string(),
                                reason: format!("template in '{}' must be a string", section),
                            })
                        }
                    }
                }
                _ => continue,
            };

            let part_path = suffixes
                .iter()
                .map(|suffix| self.configs_dir.join(format!("{}.{}.toml", template, suffix)))
                .find(|p| p.exists())
                .ok_or_else(|| ProfileError::MissingTemplate {
                    name: name.to_string(),
                    section: section.to_string(),
                    template: template.clone(),
                })?;

            tracing::debug!(profile = name, section, template = %template, "expanding template");
            let part = self.read_table(&part_path)?;
            table.insert(section.to_string(), Value::Table(part));
        }
        Ok(())
    }
}

impl ProfileSource for ProfileStore {
    fn get(&self, name: &str) -> Result<Profile, ProfileError> {
        if name.is_empty() || is_part_name(name) || name.contains('/') || name.contains('\\') {
            return Err(ProfileError::NotFound(name.to_string()));
        }
        let path = self.profile_file(name);
        if !path.exists() {
            return Err(ProfileError::NotFound(name.to_string()));
        }

        let mut table = self.read_table(&path)?;
        self.expand_templates(name, &mut table)?;

        let mut profile: Profile =
            Value::Table(table)
                .try_into()
                .map_err(|source| ProfileError::Parse {
                    path: path.display().to_string(),
                    source,
                })?;
        profile.name = name.to_string();
        Ok(profile)
    }

    /// Profiles that fail to load are skipped with a warning so one broken
    /// file does not hide the rest.
    fn list_all(&self) -> Result<Vec<Profile>, ProfileError> {
        let mut profiles = Vec::new();
        for name in self.names()? {
            match self.get(&name) {
                Ok(profile) => profiles.push(profile),
                Err(e) => tracing::warn!("skipping profile '{}': {}", name, e),
            }
        }
        Ok(profiles)
    }
}

/// Part files have a dotted stem (`base.emulator`).
fn is_part_name(stem: &str) -> bool {
    stem.contains('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::EmulatorSlot;
    use tempfile::tempdir;

    fn write(dir: &Path, file: &str, content: &str) {
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn get_loads_profile_and_sets_name() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "daily.toml",
            "lifetime = 60\n[emulator]\nindex = 1\n",
        );
        let store = ProfileStore::new(dir.path()).unwrap();

        let profile = store.get("daily").unwrap();
        assert_eq!(profile.name, "daily");
        assert_eq!(profile.emulator, Some(EmulatorSlot::Index(1)));
        assert_eq!(profile.lifetime, Some(60));
    }

    #[test]
    fn get_missing_profile_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ProfileStore::new(dir.path()).unwrap();
        assert!(matches!(store.get("nope"), Err(ProfileError::NotFound(_))));
        assert!(matches!(store.get("../etc"), Err(ProfileError::NotFound(_))));
    }

    #[test]
    fn template_sections_are_expanded() {
        let dir = tempdir().unwrap();
        write(dir.path(), "base.emulator.toml", "name = \"farm\"\n");
        write(dir.path(), "base.maa.toml", "path = \"/opt/maa\"\napp = \"MAA\"\n");
        write(
            dir.path(),
            "weekly.toml",
            "[emulator]\ntemplate = \"base\"\n[app]\ntemplate = \"base\"\n",
        );
        let store = ProfileStore::new(dir.path()).unwrap();

        let profile = store.get("weekly").unwrap();
        assert_eq!(profile.emulator, Some(EmulatorSlot::Name("farm".into())));
        assert_eq!(profile.app.unwrap().app, "MAA");
    }

    #[test]
    fn missing_template_is_reported() {
        let dir = tempdir().unwrap();
        write(dir.path(), "p.toml", "[app]\ntemplate = \"ghost\"\n");
        let store = ProfileStore::new(dir.path()).unwrap();

        let err = store.get("p").unwrap_err();
        assert!(matches!(err, ProfileError::MissingTemplate { .. }));
    }

    #[test]
    fn template_with_extra_keys_is_invalid() {
        let dir = tempdir().unwrap();
        write(dir.path(), "base.app.toml", "path = \"/x\"\napp = \"y\"\n");
        write(
            dir.path(),
            "p.toml",
            "[app]\ntemplate = \"base\"\napp = \"z\"\n",
        );
        let store = ProfileStore::new(dir.path()).unwrap();
        assert!(matches!(
            store.get("p"),
            Err(ProfileError::Invalid { .. })
        ));
    }

    #[test]
    fn list_all_skips_parts_and_broken_files() {
        let dir = tempdir().unwrap();
        write(dir.path(), "b.toml", "[emulator]\nindex = 2\n");
        write(dir.path(), "a.toml", "[emulator]\nindex = 1\n");
        write(dir.path(), "base.emulator.toml", "index = 9\n");
        write(dir.path(), "broken.toml", "this is = = not toml");
        write(dir.path(), "notes.txt", "ignored");
        let store = ProfileStore::new(dir.path()).unwrap();

        let names: Vec<String> = store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
