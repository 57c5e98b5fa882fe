//! Error types for the csvimport pipeline.
//!
//! - [`SourceError`] - reading and decoding the delimited source
//! - [`SchemaError`] - loading the model schema / field catalog
//! - [`StoreError`] / [`LookupError`] - data store collaborator failures
//! - [`ImportError`] - fatal configuration errors that abort a run
//! - [`RegistryError`] - run record persistence
//! - [`ConfigError`] - environment settings
//! - [`ServerError`] - HTTP surface
//!
//! Only [`ImportError`] aborts a run. Storage failures while a run is in
//! progress are turned into lines of the import log instead.

use thiserror::Error;

// =============================================================================
// Source Errors
// =============================================================================

/// Errors while loading the delimited source file.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Neither a file nor a directory containing `.csv` files.
    #[error("File {0} not found")]
    NotFound(String),

    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported or undecodable charset.
    #[error("Failed to decode content as {0}")]
    Encoding(String),

    /// Delimiters must be single-byte characters.
    #[error("Invalid delimiter '{0}'")]
    InvalidDelimiter(char),

    /// Malformed CSV.
    #[error("Invalid CSV format: {0}")]
    Csv(#[from] csv::Error),

    /// Source produced no rows at all.
    #[error("CSV source is empty")]
    Empty,
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors while loading the model schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read schema: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A foreign key without a target model.
    #[error("Field {model}.{field} is a foreign key but names no related model")]
    MissingRelation { model: String, field: String },

    /// The related model has no field usable as lookup field.
    #[error("Cannot find a lookup field for {model}.{field} -> {related}")]
    NoLookupField {
        model: String,
        field: String,
        related: String,
    },
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors raised by a data store while saving or querying.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store refused the record (constraint violation and the like).
    #[error("{0}")]
    Rejected(String),
}

/// Outcome of a single-record lookup that did not return exactly one record.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("No matching record")]
    NotFound,

    #[error("{0} records match")]
    MultipleFound(usize),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

// =============================================================================
// Import Errors (fatal)
// =============================================================================

/// How bad an error is. Mirrors the two levels the import log knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Aborts the run.
    Fatal,
    /// Logged, the run continues.
    Notice,
}

impl Severity {
    /// Numeric code reported to callers (0 fatal, 1 notice).
    pub fn code(self) -> u8 {
        match self {
            Severity::Fatal => 0,
            Severity::Notice => 1,
        }
    }
}

/// Configuration errors detected before any row is processed.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Neither an explicit mapping nor the header row yields a usable mapping.
    #[error(
        "No fields in the CSV file match {model} - you must add a header field name row \
         to the CSV file or supply a mapping list"
    )]
    NoMapping { model: String },

    #[error("Sorry your model {0} could not be found please check app_label.modelname")]
    UnknownModel(String),

    #[error("Field '{field}' does not exist on {model}")]
    UnknownField { model: String, field: String },

    /// Only one related model per run is supported.
    #[error("Only one related model is supported per import, found: {0}")]
    MultipleRelatedModels(String),

    /// The mapping references a related model through a field that is not a foreign key.
    #[error("No fk_field is set: '{field}' is not a foreign key on {model}")]
    NoForeignKeyField { model: String, field: String },

    #[error("Column selector '{0}' is not a 1-based column number")]
    InvalidColumn(String),

    #[error("Column '{0}' is not in the header row")]
    MissingColumn(String),

    #[error("Named column selectors need a header row")]
    HeaderRequired,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl ImportError {
    /// Every import error stops the run.
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the run registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Import run not found: {0}")]
    NotFound(String),

    #[error("Registry IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Registry JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Config Errors
// =============================================================================

/// Invalid environment settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type SourceResult<T> = Result<T, SourceError>;

pub type StoreResult<T> = Result<T, StoreError>;

pub type ImportResult<T> = Result<T, ImportError>;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let source_err = SourceError::NotFound("missing.csv".into());
        let import_err: ImportError = source_err.into();
        assert!(import_err.to_string().contains("missing.csv"));
        assert_eq!(import_err.severity(), Severity::Fatal);
        assert_eq!(import_err.severity().code(), 0);
    }

    #[test]
    fn test_no_mapping_message() {
        let err = ImportError::NoMapping {
            model: "shop.Item".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("shop.Item"));
        assert!(msg.contains("mapping list"));
    }

    #[test]
    fn test_lookup_wraps_store_error() {
        let err: LookupError = StoreError::Rejected("duplicate key".into()).into();
        assert_eq!(err.to_string(), "duplicate key");
    }
}
