//! JSON file store - one file per model.
//!
//! Records live in memory. A save marks the record's model dirty and
//! [`DataStore::flush`] rewrites each dirty model's file (`<dir>/<Model>.json`)
//! once, so a store directory can be reopened by a later run.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::memory::MemoryStore;
use super::{DataStore, Filter, Record};
use crate::error::StoreError;

/// Directory used when none is configured (relative to current dir).
pub const DEFAULT_STORE_DIR: &str = ".csvimport/store";

/// File-backed store.
#[derive(Debug)]
pub struct JsonStore {
    dir: PathBuf,
    records: MemoryStore,
    dirty: BTreeSet<String>,
}

impl JsonStore {
    /// Open (or prepare) a store directory, loading every `*.json` table in it.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut store = Self {
            dir: PathBuf::from(dir.as_ref()),
            records: MemoryStore::new(),
            dirty: BTreeSet::new(),
        };
        store.load_all()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Models with saves not yet written to disk.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Read-only view of the loaded records.
    pub fn records(&self) -> &MemoryStore {
        &self.records
    }

    fn load_all(&mut self) -> Result<(), StoreError> {
        if !self.dir.exists() {
            return Ok(());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let content = fs::read_to_string(&path)?;
            let table: Vec<Record> = serde_json::from_str(&content)?;
            self.records.load(table);
        }
        Ok(())
    }

    fn table_path(&self, model: &str) -> PathBuf {
        self.dir.join(format!("{}.json", model))
    }

    fn write_table(&self, model: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(self.records.all(model))?;
        fs::write(self.table_path(model), content)?;
        Ok(())
    }
}

impl DataStore for JsonStore {
    fn filter(&self, model: &str, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        self.records.filter(model, filter)
    }

    fn save(&mut self, record: &mut Record) -> Result<(), StoreError> {
        self.records.put(record);
        self.dirty.insert(record.model.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        let models: Vec<String> = self.dirty.iter().cloned().collect();
        for model in models {
            self.write_table(&model)?;
            self.dirty.remove(&model);
        }
        Ok(())
    }
}
