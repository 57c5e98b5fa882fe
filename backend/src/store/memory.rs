//! In-memory data store.

use std::collections::BTreeMap;

use super::{DataStore, Filter, Record, RecordId};
use crate::error::StoreError;

/// Tables of records kept in memory, one per model.
///
/// Ids are assigned per model, starting at 1.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: BTreeMap<String, Vec<Record>>,
    next_ids: BTreeMap<String, RecordId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records of a model, oldest first.
    pub fn all(&self, model: &str) -> &[Record] {
        self.tables.get(model).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, model: &str) -> usize {
        self.all(model).len()
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn find(&self, model: &str, id: RecordId) -> Option<&Record> {
        self.all(model).iter().find(|r| r.id == Some(id))
    }

    /// Put already-saved records back in place, e.g. after reading them from disk.
    pub(crate) fn load(&mut self, records: Vec<Record>) {
        for record in records {
            if let Some(id) = record.id {
                let next = self.next_ids.entry(record.model.clone()).or_insert(1);
                *next = (*next).max(id + 1);
            }
            self.tables
                .entry(record.model.clone())
                .or_default()
                .push(record);
        }
    }

    /// Insert or replace, assigning an id to new records.
    pub(crate) fn put(&mut self, record: &mut Record) {
        let table = self.tables.entry(record.model.clone()).or_default();
        match record.id {
            Some(id) => {
                if let Some(pos) = table.iter().position(|r| r.id == Some(id)) {
                    table[pos] = record.clone();
                    return;
                }
                let next = self.next_ids.entry(record.model.clone()).or_insert(1);
                *next = (*next).max(id + 1);
            }
            None => {
                let next = self.next_ids.entry(record.model.clone()).or_insert(1);
                record.id = Some(*next);
                *next += 1;
            }
        }
        table.push(record.clone());
    }
}

impl DataStore for MemoryStore {
    fn filter(&self, model: &str, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .all(model)
            .iter()
            .filter(|r| r.matches(filter))
            .cloned()
            .collect())
    }

    fn save(&mut self, record: &mut Record) -> Result<(), StoreError> {
        self.put(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldMap, FieldValue};

    fn titled(title: &str) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("title".into(), FieldValue::from(title));
        fields
    }

    #[test]
    fn test_ids_are_per_model() {
        let mut store = MemoryStore::new();
        let mut a = store.create("Item", titled("a"));
        let mut b = store.create("Category", titled("b"));
        let mut c = store.create("Item", titled("c"));
        store.save(&mut a).unwrap();
        store.save(&mut b).unwrap();
        store.save(&mut c).unwrap();

        assert_eq!(a.id, Some(1));
        assert_eq!(b.id, Some(1));
        assert_eq!(c.id, Some(2));
        assert_eq!(store.count("Item"), 2);
    }

    #[test]
    fn test_save_existing_updates_in_place() {
        let mut store = MemoryStore::new();
        let mut a = store.create("Item", titled("a"));
        store.save(&mut a).unwrap();

        a.set("title", FieldValue::from("renamed"));
        store.save(&mut a).unwrap();

        assert_eq!(store.count("Item"), 1);
        assert_eq!(
            store.find("Item", 1).unwrap().get("title"),
            Some(&FieldValue::from("renamed"))
        );
    }

    #[test]
    fn test_load_keeps_id_sequence() {
        let mut store = MemoryStore::new();
        let mut loaded = Record::new("Item", titled("old"));
        loaded.id = Some(7);
        store.load(vec![loaded]);

        let mut fresh = store.create("Item", titled("new"));
        store.save(&mut fresh).unwrap();
        assert_eq!(fresh.id, Some(8));
    }
}
