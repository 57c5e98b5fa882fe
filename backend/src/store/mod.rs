//! Data store collaborator.
//!
//! The importer never talks to a database directly. It goes through the
//! [`DataStore`] trait, handing over plain `name -> value` maps:
//!
//! - [`DataStore::get`] - exactly one record matching a filter
//! - [`DataStore::filter`] - every matching record, in insertion order
//! - [`DataStore::create`] - build an unsaved record
//! - [`DataStore::save`] - insert or update, assigning an id on first save
//!
//! Two implementations ship with the crate: [`MemoryStore`] and the
//! file-backed [`JsonStore`].

pub mod json;
pub mod memory;
pub mod value;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{LookupError, StoreError};

pub use json::JsonStore;
pub use memory::MemoryStore;
pub use value::FieldValue;

/// Identity key assigned by the store.
pub type RecordId = u64;

/// Field values of a record, keyed by field name.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Equality filter: every entry must match.
pub type Filter = BTreeMap<String, FieldValue>;

/// One model instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Model name.
    pub model: String,
    /// Identity, `None` until saved.
    pub id: Option<RecordId>,
    /// Import batch that last touched this record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<Uuid>,
    /// Field values.
    #[serde(default)]
    pub fields: FieldMap,
}

impl Record {
    /// Create an unsaved record.
    pub fn new(model: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            model: model.into(),
            id: None,
            batch: None,
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    /// Overlay `fields` onto this record. Fields absent from `fields` are kept.
    pub fn update(&mut self, fields: &FieldMap) {
        for (name, value) in fields {
            self.fields.insert(name.clone(), value.clone());
        }
    }

    /// A missing field only matches a `Null` filter value.
    pub fn matches(&self, filter: &Filter) -> bool {
        filter.iter().all(|(name, expected)| match self.fields.get(name) {
            Some(actual) => actual == expected,
            None => *expected == FieldValue::Null,
        })
    }
}

/// Storage operations the importer needs, per model.
pub trait DataStore {
    /// All records of `model` matching `filter`, oldest first.
    fn filter(&self, model: &str, filter: &Filter) -> Result<Vec<Record>, StoreError>;

    /// Insert (no id yet) or update (id set) a record.
    fn save(&mut self, record: &mut Record) -> Result<(), StoreError>;

    /// Exactly one record matching `filter`.
    fn get(&self, model: &str, filter: &Filter) -> Result<Record, LookupError> {
        let mut found = self.filter(model, filter)?;
        match found.len() {
            0 => Err(LookupError::NotFound),
            1 => Ok(found.remove(0)),
            n => Err(LookupError::MultipleFound(n)),
        }
    }

    /// Write saved records through to durable storage.
    ///
    /// Called once at the end of an import run. Stores without a backing
    /// medium keep the default.
    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Build an unsaved record. Nothing is written until [`DataStore::save`].
    fn create(&self, model: &str, fields: FieldMap) -> Record {
        Record::new(model, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, FieldValue)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_record_matches() {
        let record = Record::new(
            "Item",
            fields(&[("title", "Widget".into()), ("stock", FieldValue::Int(3))]),
        );

        assert!(record.matches(&fields(&[("title", "Widget".into())])));
        assert!(!record.matches(&fields(&[("title", "Gadget".into())])));
        assert!(record.matches(&fields(&[("price", FieldValue::Null)])));
        assert!(record.matches(&Filter::new()));
    }

    #[test]
    fn test_record_update_overlays() {
        let mut record = Record::new(
            "Item",
            fields(&[("title", "Widget".into()), ("stock", FieldValue::Int(3))]),
        );
        record.update(&fields(&[("stock", FieldValue::Int(5))]));

        assert_eq!(record.get("title"), Some(&FieldValue::from("Widget")));
        assert_eq!(record.get("stock"), Some(&FieldValue::Int(5)));
    }

    #[test]
    fn test_default_get_policy() {
        let mut store = MemoryStore::new();
        for title in ["Widget", "Widget", "Gadget"] {
            let mut r = store.create("Item", fields(&[("title", title.into())]));
            store.save(&mut r).unwrap();
        }

        let widget = fields(&[("title", "Widget".into())]);
        assert!(matches!(
            store.get("Item", &widget),
            Err(LookupError::MultipleFound(2))
        ));
        let gadget = fields(&[("title", "Gadget".into())]);
        assert_eq!(store.get("Item", &gadget).unwrap().id, Some(3));
        let other = fields(&[("title", "Other".into())]);
        assert!(matches!(store.get("Item", &other), Err(LookupError::NotFound)));
    }
}
