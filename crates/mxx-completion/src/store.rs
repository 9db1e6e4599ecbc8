// store.rs - CompletionStore: which profiles finished on which day.
//
// Layout: `<completion_dir>/YYYY-MM-DD.json`, a flat JSON object mapping
// profile name to success (`{"alpha": true, "beta": false}`). Every write
// reads the whole file, changes one entry and rewrites the whole file.
//
// A missing, unreadable or corrupt file reads as "no records"; tracking is
// best effort and must never stop a run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use crate::error::CompletionError;

pub type CompletionRecord = BTreeMap<String, bool>;

pub struct CompletionStore {
    completion_dir: PathBuf,
}

impl CompletionStore {
    /// Create a store in `completion_dir`, creating the directory if needed.
    pub fn new(completion_dir: impl AsRef<Path>) -> Result<Self, CompletionError> {
        let completion_dir = completion_dir.as_ref().to_path_buf();
        fs::create_dir_all(&completion_dir).map_err(|source| CompletionError::IoError {
            path: completion_dir.display().to_string(),
            source,
        })?;
        Ok(Self { completion_dir })
    }

    /// Today in local time, the date every CLI operation uses.
    pub fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    pub fn completion_dir(&self) -> &Path {
        &self.completion_dir
    }

    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.completion_dir
            .join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// All records for `date`.
    pub fn load(&self, date: NaiveDate) -> CompletionRecord {
        let path = self.file_for(date);
        if !path.exists() {
            return CompletionRecord::new();
        }
        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()));
        match parsed {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring unreadable completion file: {}", e);
                CompletionRecord::new()
            }
        }
    }

    fn save(&self, date: NaiveDate, record: &CompletionRecord) -> Result<(), CompletionError> {
        let path = self.file_for(date);
        let json = serde_json::to_string_pretty(record).map_err(|source| CompletionError::Encode {
            path: path.display().to_string(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| CompletionError::IoError {
            path: path.display().to_string(),
            source,
        })
    }

    /// Whether `profile` is done for `date`. A recorded failure only counts
    /// with `include_failed`.
    pub fn is_completed(&self, profile: &str, date: NaiveDate, include_failed: bool) -> bool {
        match self.load(date).get(profile) {
            Some(success) => *success || include_failed,
            None => false,
        }
    }

    /// Upsert the outcome for (`profile`, `date`).
    pub fn record(&self, profile: &str, date: NaiveDate, success: bool) -> Result<(), CompletionError> {
        let mut record = self.load(date);
        record.insert(profile.to_string(), success);
        self.save(date, &record)?;
        tracing::debug!(profile, %date, success, "recorded completion");
        Ok(())
    }

    /// Remove the entry for (`profile`, `date`). Returns whether one existed.
    pub fn reset(&self, profile: &str, date: NaiveDate) -> Result<bool, CompletionError> {
        let mut record = self.load(date);
        if record.remove(profile).is_none() {
            return Ok(false);
        }
        self.save(date, &record)?;
        Ok(true)
    }

    /// Profiles from `all` without a successful entry for `date`, in input
    /// order.
    pub fn get_incomplete(&self, all: &[String], date: NaiveDate) -> Vec<String> {
        let record = self.load(date);
        all.iter()
            .filter(|name| record.get(name.as_str()) != Some(&true))
            .cloned()
            .collect()
    }
}
