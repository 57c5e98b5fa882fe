//! Column to field mapping.
//!
//! A mapping says which column feeds which field of the target model, and
//! optionally which related model a column resolves through:
//!
//! ```text
//! column1=title,*column2=category(Category|label) column3=price
//! ```
//!
//! - `columnN` / `N` - 1-based column position (or a header name in named mode)
//! - `field` - field of the main model
//! - `(Model|field)` - the value is looked up / stored on `Model.field` and the
//!   main model's `field` points at that record
//! - leading `*` - use this field to deduplicate
//!
//! Mappings come from [`Mapping::parse`] or, when no explicit mapping is given,
//! from the file header through [`header::infer_mapping`].

pub mod header;
pub mod parser;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::schema::FieldCatalog;

pub use header::infer_mapping;

/// `(related model, related field)` part of a mapping entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    pub model: String,
    pub field: String,
}

impl ForeignKey {
    pub fn new(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            field: field.into(),
        }
    }
}

/// One column → field (→ related field) association.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Column selector: a 1-based position or a header name.
    pub column: String,
    /// Field of the main model.
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,
}

impl MappingEntry {
    pub fn new(column: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            field: field.into(),
            foreign_key: None,
        }
    }

    pub fn with_foreign_key(mut self, model: &str, field: &str) -> Self {
        self.foreign_key = Some(ForeignKey::new(model, field));
        self
    }

    /// The selector as a 1-based position, if it is one.
    pub fn position(&self) -> Option<usize> {
        self.column.parse::<usize>().ok().filter(|&p| p > 0)
    }
}

/// A parsed mapping with its deduplication keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub entries: Vec<MappingEntry>,
    /// Main model fields marked with `*`. Empty: match on every mapped field.
    #[serde(default)]
    pub unique_fields: BTreeSet<String>,
    /// Related model fields marked with `*`. Empty: match on every related field.
    #[serde(default)]
    pub unique_related_fields: BTreeSet<String>,
}

impl Mapping {
    /// Parse a mapping spec. Unparseable text yields an empty mapping.
    pub fn parse(spec: &str) -> Self {
        parser::parse_mapping(spec)
    }

    /// Parse a mapping spec given on the command line or in a request.
    ///
    /// A spec without any `=` is a comma separated list of header names and is
    /// matched against the catalog as if it were the file's header row.
    pub fn from_spec(spec: &str, catalog: &FieldCatalog) -> Self {
        if spec.contains('=') {
            return Self::parse(spec);
        }
        let headers: Vec<&str> = spec.split(',').map(str::trim).collect();
        Self::parse(&infer_mapping(&headers, catalog))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries that resolve through a related model.
    pub fn foreign_key_entries(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.iter().filter(|e| e.foreign_key.is_some())
    }

    pub fn has_foreign_keys(&self) -> bool {
        self.foreign_key_entries().next().is_some()
    }

    /// Canonical textual form, parseable by [`Mapping::parse`].
    pub fn to_spec(&self) -> String {
        self.entries
            .iter()
            .map(|entry| {
                let marked = match &entry.foreign_key {
                    Some(fk) => self.unique_related_fields.contains(&fk.field),
                    None => self.unique_fields.contains(&entry.field),
                };
                let column = match entry.position() {
                    Some(p) => format!("column{}", p),
                    None => entry.column.clone(),
                };
                let related = entry
                    .foreign_key
                    .as_ref()
                    .map(|fk| format!("({}|{})", fk.model, fk.field))
                    .unwrap_or_default();
                format!(
                    "{}{}={}{}",
                    if marked { "*" } else { "" },
                    column,
                    entry.field,
                    related
                )
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}
