//! Run Registry - keep a record of every import run
//!
//! Each finished run is saved as one JSON file in the registry directory so
//! it can be listed and inspected later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{RegistryError, RegistryResult};
use crate::store::RecordId;

/// Directory where run records are stored (relative to current dir)
pub const DEFAULT_RUNS_DIR: &str = ".csvimport/runs";

/// Result record of one import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRun {
    pub file_name: String,
    /// Target model.
    pub model: String,
    pub import_user: String,
    pub upload_method: String,
    /// Charset the source was decoded with.
    pub charset: String,
    /// Batch id stamped on every record saved by the run.
    pub batch: Uuid,
    /// The import log, one line per entry.
    pub error_log: String,
    pub import_date: DateTime<Utc>,
    /// Ids of the main records imported, in row order.
    pub import_list: Vec<RecordId>,
}

impl ImportRun {
    pub fn log_lines(&self) -> impl Iterator<Item = &str> {
        self.error_log.lines()
    }
}

/// A run record with its registry id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    pub id: String,
    #[serde(flatten)]
    pub run: ImportRun,
}

/// Registry for import run records
pub struct RunRegistry {
    /// Directory where runs are stored
    registry_dir: PathBuf,
    /// Loaded runs (id -> run)
    runs: HashMap<String, StoredRun>,
}

impl RunRegistry {
    /// Create a new registry, loading existing runs from disk
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_RUNS_DIR)
    }

    /// Create a registry with a custom directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: PathBuf::from(dir.as_ref()),
            runs: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    /// Unreadable files are skipped.
    fn load_all(&mut self) {
        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(run) = serde_json::from_str::<StoredRun>(&content) {
                        self.runs.insert(run.id.clone(), run);
                    }
                }
            }
        }
    }

    /// All runs, newest first
    pub fn list(&self) -> Vec<&StoredRun> {
        let mut runs: Vec<_> = self.runs.values().collect();
        runs.sort_by(|a, b| {
            b.run
                .import_date
                .cmp(&a.run.import_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        runs
    }

    pub fn get(&self, id: &str) -> Option<&StoredRun> {
        self.runs.get(id)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Persist a run and return its id
    pub fn save(&mut self, run: ImportRun) -> RegistryResult<String> {
        fs::create_dir_all(&self.registry_dir)?;

        let mut id = self.generate_id(&run.model, &run.import_date);
        let mut n = 1;
        while self.runs.contains_key(&id) {
            n += 1;
            id = format!("{}-{}", self.generate_id(&run.model, &run.import_date), n);
        }

        let stored = StoredRun { id: id.clone(), run };
        let content = serde_json::to_string_pretty(&stored)?;
        fs::write(self.path_for(&id), content)?;

        self.runs.insert(id.clone(), stored);
        Ok(id)
    }

    pub fn delete(&mut self, id: &str) -> RegistryResult<()> {
        if self.runs.remove(id).is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        fs::remove_file(self.path_for(id))?;
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }

    /// Slug of the model name plus the run timestamp in milliseconds
    fn generate_id(&self, model: &str, at: &DateTime<Utc>) -> String {
        let slug: String = model
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");

        format!("{}-{}", slug, at.timestamp_millis())
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}
