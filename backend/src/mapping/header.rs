//! Derive a mapping from a header row.

use crate::schema::{CatalogEntry, FieldCatalog};

/// Build a mapping spec from header cells matched against the catalog.
///
/// Each cell is tried as-is, then lower-cased. Foreign keys get their
/// `(Model|lookup_field)` group, except when matched through the `_id` alias.
/// Unmatched cells are skipped; no match at all gives an empty string.
pub fn infer_mapping<S: AsRef<str>>(headers: &[S], catalog: &FieldCatalog) -> String {
    let mut mapping = Vec::new();

    for (i, heading) in headers.iter().enumerate() {
        let heading = heading.as_ref().trim();
        let lowered = heading.to_lowercase();

        let matched = [heading, lowered.as_str()]
            .into_iter()
            .find_map(|key| catalog.get(key).map(|entry| (key, entry)));

        if let Some((key, entry)) = matched {
            mapping.push(format!("column{}={}", i + 1, annotate(key, entry)));
        }
    }

    mapping.join(",")
}

fn annotate(key: &str, entry: &CatalogEntry) -> String {
    if key.ends_with("_id") {
        return key.to_string();
    }
    match &entry.related {
        Some(related) => format!("{}({}|{})", key, related.model, related.lookup_field),
        None => key.to_string(),
    }
}
