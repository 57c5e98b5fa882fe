//! Row import orchestrator.
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────────────────────┐   ┌───────────┐
//! │  Source  │──▶│    Setup     │──▶│          Per row              │──▶│ ImportRun │
//! │  rows    │   │ model, map,  │   │ coerce ─▶ related ─▶ fk ─▶    │   │ log, ids  │
//! └──────────┘   │ columns, fk  │   │ main ─▶ save ─▶ signals       │   └───────────┘
//!                └──────────────┘   └───────────────────────────────┘
//! ```
//!
//! Setup problems are fatal and come back as [`ImportError`]. Everything that
//! goes wrong while rows are processed is written to the import log and the
//! run carries on with the next step or row.
//!
//! # Example
//!
//! ```rust,ignore
//! use csvimport::{import_file, ImportOptions, MemoryStore, Schema};
//!
//! let schema = Schema::load("schema.json")?;
//! let mut store = MemoryStore::new();
//! let options = ImportOptions::new("shop.Item")
//!     .with_mappings("column1=title,column2=category(Category|label)");
//!
//! let outcome = import_file("items.csv", &schema, options, &mut store)?;
//! println!("Imported {:?}", outcome.imported);
//! ```

mod row;
pub mod signals;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ImportError, ImportResult};
use crate::logs::{LogSink, NullSink};
use crate::mapping::{infer_mapping, Mapping};
use crate::reader::{read_source, ReadOptions, SourceData};
use crate::runs::ImportRun;
use crate::schema::{FieldCatalog, FieldType, Schema};
use crate::store::{DataStore, RecordId};

pub use signals::{ImportObserver, RowMap, Signals};

/// Options for one import run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Target model, `app_label.Model` or `Model`.
    pub model: String,

    /// Explicit mapping spec. `None`: infer it from the header row.
    pub mappings: Option<String>,

    /// The first row of the source is a header.
    pub header: bool,

    /// Mapping selectors are header names instead of positions.
    pub nameindexes: bool,

    /// Reuse matching records instead of always creating new ones.
    pub deduplicate: bool,

    /// Log every mapped cell.
    pub debug: bool,

    /// Batch id stamped on saved records. A fresh one per run when unset.
    pub batch: Option<Uuid>,

    pub import_user: String,

    pub upload_method: String,

    /// Charset / delimiter overrides for [`import_file`].
    #[serde(skip)]
    pub read: ReadOptions,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            model: String::new(),
            mappings: None,
            header: true,
            nameindexes: false,
            deduplicate: true,
            debug: false,
            batch: None,
            import_user: "cron".to_string(),
            upload_method: "cronjob".to_string(),
            read: ReadOptions::default(),
        }
    }
}

impl ImportOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn with_mappings(mut self, mappings: impl Into<String>) -> Self {
        self.mappings = Some(mappings.into());
        self
    }

    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    pub fn with_nameindexes(mut self, nameindexes: bool) -> Self {
        self.nameindexes = nameindexes;
        self
    }

    pub fn with_deduplicate(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_batch(mut self, batch: Uuid) -> Self {
        self.batch = Some(batch);
        self
    }
}

/// What a run produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    /// The import log. `["No logging"]` when nothing was logged.
    pub log: Vec<String>,
    /// Ids of the saved main records, one per imported row.
    pub imported: Vec<RecordId>,
    /// Main records created by the run.
    pub created: usize,
    /// Existing main records updated by the run.
    pub updated: usize,
    /// Result record, ready for the run registry.
    pub run: ImportRun,
}

/// Where a mapped cell ends up.
#[derive(Debug, Clone, PartialEq)]
enum Target {
    /// A field of the main model.
    Main,
    /// The `<fk>_id` alias: the cell is a related record id.
    RecordId,
    /// A field of the related model.
    Related(String),
}

/// A mapping entry resolved against the catalog and the header.
#[derive(Debug, Clone)]
struct Column {
    /// 0-based cell index.
    index: usize,
    /// Field name as written in the mapping.
    label: String,
    /// Main model field.
    field: String,
    field_type: FieldType,
    target: Target,
}

/// The related model of a run and the main model field pointing at it.
#[derive(Debug, Clone)]
struct RelatedTarget {
    model: String,
    fk_field: String,
}

/// A configured import, ready to run against a store
pub struct Importer {
    model: String,
    mapping: Mapping,
    columns: Vec<Column>,
    related: Option<RelatedTarget>,
    header: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
    file_name: String,
    charset: String,
    options: ImportOptions,
    setup_log: Vec<String>,
    sink: Arc<dyn LogSink>,
    signals: Signals,
}

impl Importer {
    /// Validate the options against the schema and the source.
    ///
    /// 1. Resolve the main model and build its field catalog
    /// 2. Load the mapping (explicit, or from the header row)
    /// 3. Resolve every entry to a field and a cell index
    /// 4. Check the related model, if any
    pub fn new(schema: &Schema, source: SourceData, options: ImportOptions) -> ImportResult<Self> {
        // Step 1: Main model
        let model_def = schema
            .model(&options.model)
            .ok_or_else(|| ImportError::UnknownModel(options.model.clone()))?;
        let catalog = FieldCatalog::build(schema, model_def)?;

        let file_name = source.file_name();
        let charset = source.charset;
        let mut rows = source.rows;
        let header = if options.header && !rows.is_empty() {
            Some(rows.remove(0))
        } else {
            None
        };

        // Step 2: Mapping
        let mut setup_log = Vec::new();
        let explicit = options
            .mappings
            .as_deref()
            .map(str::trim)
            .filter(|spec| !spec.is_empty());

        let (mapping, named) = match explicit {
            Some(spec) => {
                setup_log.push("Using manually entered mapping list".to_string());
                // A bare header list always maps by position.
                let named = options.nameindexes && spec.contains('=');
                (Mapping::from_spec(spec, &catalog), named)
            }
            None => {
                let inferred = header
                    .as_ref()
                    .map(|cells| Mapping::parse(&infer_mapping(cells, &catalog)))
                    .unwrap_or_default();
                if !inferred.is_empty() {
                    setup_log.push("Using mapping from first row of CSV file".to_string());
                }
                (inferred, false)
            }
        };

        if mapping.is_empty() {
            return Err(ImportError::NoMapping {
                model: model_def.qualified_name(),
            });
        }
        if named && header.is_none() {
            return Err(ImportError::HeaderRequired);
        }

        // Step 3: Columns
        let mut columns = Vec::with_capacity(mapping.len());
        for entry in &mapping.entries {
            let (field, alias) =
                catalog
                    .resolve(&entry.field)
                    .ok_or_else(|| ImportError::UnknownField {
                        model: model_def.name.clone(),
                        field: entry.field.clone(),
                    })?;

            let index = match &header {
                Some(cells) if named => cells
                    .iter()
                    .position(|cell| cell.trim() == entry.column)
                    .ok_or_else(|| ImportError::MissingColumn(entry.column.clone()))?,
                _ => entry
                    .position()
                    .map(|p| p - 1)
                    .ok_or_else(|| ImportError::InvalidColumn(entry.column.clone()))?,
            };

            let target = match (&entry.foreign_key, alias) {
                (Some(fk), _) => Target::Related(fk.field.clone()),
                (None, true) => Target::RecordId,
                (None, false) => Target::Main,
            };

            columns.push(Column {
                index,
                label: entry.field.clone(),
                field: field.name.clone(),
                field_type: field.field_type,
                target,
            });
        }

        // Step 4: Related model
        let related = related_target(schema, &catalog, &mapping)?;

        Ok(Self {
            model: model_def.name.clone(),
            mapping,
            columns,
            related,
            header,
            rows,
            file_name,
            charset,
            options,
            setup_log,
            sink: Arc::new(NullSink),
            signals: Signals::new(),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_signals(mut self, signals: Signals) -> Self {
        self.signals = signals;
        self
    }

    pub fn connect(&mut self, observer: Arc<dyn ImportObserver>) {
        self.signals.connect(observer);
    }

    /// Main model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Data rows, header excluded.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Import every row into `store`.
    pub fn run<S: DataStore>(&self, store: &mut S) -> ImportOutcome {
        let batch = self.options.batch.unwrap_or_else(Uuid::new_v4);

        let mut log = self.setup_log.clone();
        for line in &log {
            self.sink.info(line.clone());
        }

        let mut imported = Vec::new();
        let mut created = 0;
        let mut updated = 0;

        for (i, row) in self.rows.iter().enumerate() {
            let number = i + 1;
            self.sink.info(format!("Import {} {}", self.model, number));

            let mut row_log = Vec::new();
            let result = self.import_row(store, number, row, batch, &mut row_log);

            for line in &row_log {
                self.sink.info(line.clone());
            }
            log.append(&mut row_log);

            if let Some(id) = result.id {
                imported.push(id);
                if result.created {
                    created += 1;
                } else {
                    updated += 1;
                }
            }
        }

        if let Err(e) = store.flush() {
            let line = format!("Database Error: {}", e);
            self.sink.error(line.clone());
            log.push(line);
        }

        self.sink.success(format!(
            "Imported {} {} rows ({} created, {} updated)",
            imported.len(),
            self.model,
            created,
            updated
        ));

        let run = ImportRun {
            file_name: self.file_name.clone(),
            model: self.model.clone(),
            import_user: self.options.import_user.clone(),
            upload_method: self.options.upload_method.clone(),
            charset: self.charset.clone(),
            batch,
            error_log: log.join("\n"),
            import_date: Utc::now(),
            import_list: imported.clone(),
        };

        if log.is_empty() {
            log.push("No logging".to_string());
        }

        ImportOutcome {
            log,
            imported,
            created,
            updated,
            run,
        }
    }
}

/// Read `path` (file or directory) and import it into `store`.
pub fn import_file<P, S>(
    path: P,
    schema: &Schema,
    options: ImportOptions,
    store: &mut S,
) -> ImportResult<ImportOutcome>
where
    P: AsRef<Path>,
    S: DataStore,
{
    let source = read_source(path, &options.read)?;
    let importer = Importer::new(schema, source, options)?;
    Ok(importer.run(store))
}

/// The single related model named by the mapping's foreign-key entries.
fn related_target(
    schema: &Schema,
    catalog: &FieldCatalog,
    mapping: &Mapping,
) -> ImportResult<Option<RelatedTarget>> {
    let mut targets = BTreeSet::new();
    for entry in mapping.foreign_key_entries() {
        if let Some(fk) = &entry.foreign_key {
            targets.insert((entry.field.clone(), fk.model.clone()));
        }
    }

    let (fk_field, model) = match targets.len() {
        0 => return Ok(None),
        1 => targets.into_iter().next().unwrap_or_default(),
        _ => {
            let names: Vec<String> = targets
                .iter()
                .map(|(field, model)| format!("{}({})", field, model))
                .collect();
            return Err(ImportError::MultipleRelatedModels(names.join(", ")));
        }
    };

    let related = schema
        .model(&model)
        .ok_or_else(|| ImportError::UnknownModel(model.clone()))?;

    let is_fk = catalog
        .get(&fk_field)
        .map_or(false, |entry| entry.field_type == FieldType::ForeignKey);
    if !is_fk {
        return Err(ImportError::NoForeignKeyField {
            model: catalog.model().to_string(),
            field: fk_field,
        });
    }

    for entry in mapping.foreign_key_entries() {
        if let Some(fk) = &entry.foreign_key {
            if !related.fields.iter().any(|f| f.name == fk.field) {
                return Err(ImportError::UnknownField {
                    model: related.name.clone(),
                    field: fk.field.clone(),
                });
            }
        }
    }

    Ok(Some(RelatedTarget {
        model: related.name.clone(),
        fk_field,
    }))
}
