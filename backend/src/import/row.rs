//! Importing a single row.

use uuid::Uuid;

use super::{Column, Importer, RelatedTarget, RowMap, Target};
use crate::coerce::coerce;
use crate::error::LookupError;
use crate::store::{DataStore, FieldMap, FieldValue, Filter, Record, RecordId};

/// What happened to the main record of a row.
pub(super) struct RowResult {
    /// Set when the main record is saved.
    pub id: Option<RecordId>,
    /// The main record was new.
    pub created: bool,
}

/// Cell values of a row, split by destination.
#[derive(Default)]
struct RowValues {
    main: FieldMap,
    related: FieldMap,
}

impl Importer {
    pub(super) fn import_row<S: DataStore>(
        &self,
        store: &mut S,
        number: usize,
        row: &[String],
        batch: Uuid,
        log: &mut Vec<String>,
    ) -> RowResult {
        // 1. Resolve cells
        let mut values = self.resolve(number, row, log);
        let row_map = self.row_map(row);

        // 2. Pre-import event
        self.signals.send_importing(&self.model, None, &row_map);

        // 3-5. Related record and foreign key
        let mut related_found = None;
        if let Some(target) = &self.related {
            if values.related.is_empty() {
                log.push(format!(
                    "Row {} has no {} value, {}.{} left unset",
                    number, target.model, self.model, target.fk_field
                ));
            } else {
                related_found = self.import_related(store, target, &mut values, batch, log);
            }
        }

        // 6. Main record
        let (mut record, created) = self.resolve_main(store, &values.main, related_found, log);

        // 7. Persist main
        record.batch = Some(batch);
        if let Err(e) = store.save(&mut record) {
            log.push(format!("Database Error: {}", e));
        }

        // 8. Post-import event
        self.signals.send_imported(&self.model, created, &record, &row_map);

        // 9. Bookkeeping
        RowResult {
            id: record.id,
            created,
        }
    }

    /// Coerce every mapped cell and route it to the main or related fields.
    fn resolve(&self, number: usize, row: &[String], log: &mut Vec<String>) -> RowValues {
        let mut values = RowValues::default();

        if let Some(max) = self.columns.iter().map(|c| c.index).max() {
            if row.len() <= max {
                log.push(format!(
                    "Row {} has {} columns, missing cells read as empty",
                    number,
                    row.len()
                ));
            }
        }

        for column in &self.columns {
            let raw = row.get(column.index).map(String::as_str).unwrap_or("");

            if self.options.debug {
                log.push(format!("{}.{} = \"{}\"", self.model, column.label, raw.trim()));
            }

            let coerced = coerce(raw, &column.field, column.field_type);
            log.extend(coerced.log);
            if coerced.value.is_empty_text() {
                continue;
            }

            self.route(column, coerced.value, &mut values, log);
        }

        values
    }

    fn route(&self, column: &Column, value: FieldValue, values: &mut RowValues, log: &mut Vec<String>) {
        match &column.target {
            Target::Main => {
                values.main.insert(column.field.clone(), value);
            }
            Target::Related(field) => {
                values.related.insert(field.clone(), value);
            }
            Target::RecordId => {
                let text = value.as_text().unwrap_or_default();
                match text.parse::<RecordId>() {
                    Ok(id) => {
                        values.main.insert(column.field.clone(), FieldValue::Ref(id));
                    }
                    Err(_) => log.push(format!(
                        "Column {} = {} is not a record id so is skipped",
                        column.label, text
                    )),
                }
            }
        }
    }

    /// The row keyed by header cell, or by 1-based column number.
    fn row_map(&self, row: &[String]) -> RowMap {
        match &self.header {
            Some(header) => header
                .iter()
                .zip(row)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            None => row
                .iter()
                .enumerate()
                .map(|(i, value)| ((i + 1).to_string(), value.clone()))
                .collect(),
        }
    }

    /// Find or create the related record, save it and point the main fields at it.
    ///
    /// Returns the related id when an existing record was reused.
    fn import_related<S: DataStore>(
        &self,
        store: &mut S,
        target: &RelatedTarget,
        values: &mut RowValues,
        batch: Uuid,
        log: &mut Vec<String>,
    ) -> Option<RecordId> {
        let existing = if self.options.deduplicate {
            let filter = dedup_filter(&values.related, &self.mapping.unique_related_fields);
            find_existing(store, &target.model, &filter, log)
        } else {
            None
        };

        let found = existing.is_some();
        let mut related = match existing {
            Some(mut record) => {
                record.update(&values.related);
                record
            }
            None => store.create(&target.model, values.related.clone()),
        };

        related.batch = Some(batch);
        if let Err(e) = store.save(&mut related) {
            log.push(format!("Database Error: {}", e));
        }

        match related.id {
            Some(id) => {
                values.main.insert(target.fk_field.clone(), FieldValue::Ref(id));
                found.then_some(id)
            }
            None => {
                log.push(format!(
                    "{} record was not saved, {}.{} left unset",
                    target.model, self.model, target.fk_field
                ));
                None
            }
        }
    }

    /// Find the main record to update, or create a new one.
    fn resolve_main<S: DataStore>(
        &self,
        store: &S,
        main: &FieldMap,
        related_found: Option<RecordId>,
        log: &mut Vec<String>,
    ) -> (Record, bool) {
        let mut existing = None;

        // A reused related record: look among the records already pointing at it.
        if let (Some(id), Some(target)) = (related_found, &self.related) {
            let mut filter = dedup_filter(main, &self.mapping.unique_fields);
            filter.insert(target.fk_field.clone(), FieldValue::Ref(id));
            existing = find_existing(store, &self.model, &filter, log);
        }

        if existing.is_none() && self.options.deduplicate {
            let filter = dedup_filter(main, &self.mapping.unique_fields);
            existing = find_existing(store, &self.model, &filter, log);
        }

        match existing {
            Some(mut record) => {
                record.update(main);
                (record, false)
            }
            None => (store.create(&self.model, main.clone()), true),
        }
    }
}

/// Match on the marked keys present in the row, or on every value when
/// nothing is marked.
fn dedup_filter(values: &FieldMap, keys: &std::collections::BTreeSet<String>) -> Filter {
    if keys.is_empty() {
        return values.clone();
    }
    keys.iter()
        .filter_map(|key| values.get(key).map(|v| (key.clone(), v.clone())))
        .collect()
}

/// Zero matches: `None`. One: that record. Several: the oldest.
///
/// An empty filter never matches.
fn find_existing<S: DataStore>(
    store: &S,
    model: &str,
    filter: &Filter,
    log: &mut Vec<String>,
) -> Option<Record> {
    if filter.is_empty() {
        return None;
    }

    match store.get(model, filter) {
        Ok(record) => Some(record),
        Err(LookupError::NotFound) => None,
        Err(LookupError::MultipleFound(_)) => match store.filter(model, filter) {
            Ok(found) => found.into_iter().next(),
            Err(e) => {
                log.push(format!("Database Error: {}", e));
                None
            }
        },
        Err(LookupError::Storage(e)) => {
            log.push(format!("Database Error: {}", e));
            None
        }
    }
}
