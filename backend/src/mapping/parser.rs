//! Mapping spec parser.
//!
//! The grammar is scanned, not validated: every substring shaped like
//! `[*]word=word[(word|word)]` becomes an entry and everything else is
//! dropped without a diagnostic.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ForeignKey, Mapping, MappingEntry};

/// `[*]column=field[(Model|field)]`
static ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\*?)(\w+)=(\w+)(?:\((\w+)\|(\w+)\))?").expect("valid mapping pattern")
});

/// `column` directly in front of a position.
static COLUMN_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bcolumn(\d+)").expect("valid column prefix pattern"));

/// Parse a mapping spec into entries and dedup key sets.
pub fn parse_mapping(spec: &str) -> Mapping {
    let mut mapping = Mapping::default();
    if spec.trim().is_empty() {
        return mapping;
    }

    let normalized = spec.replace(',', " ");
    let normalized = COLUMN_PREFIX.replace_all(&normalized, "${1}");

    for caps in ENTRY.captures_iter(&normalized) {
        let marked = !caps[1].is_empty();
        let field = caps[3].to_string();
        let foreign_key = match (caps.get(4), caps.get(5)) {
            (Some(model), Some(related)) => Some(ForeignKey::new(model.as_str(), related.as_str())),
            _ => None,
        };

        if marked {
            match &foreign_key {
                Some(fk) => mapping.unique_related_fields.insert(fk.field.clone()),
                None => mapping.unique_fields.insert(field.clone()),
            };
        }

        mapping.entries.push(MappingEntry {
            column: caps[2].to_string(),
            field,
            foreign_key,
        });
    }

    mapping
}
