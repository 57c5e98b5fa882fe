//! # csvimport - map CSV rows onto model records
//!
//! csvimport loads delimited files into an existing relational model: every
//! row becomes (or updates) a record of the target model, optionally linked
//! to a record of one related model through a foreign key.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV File   │────▶│   Reader    │────▶│  Importer   │────▶│  DataStore  │
//! │  (any enc)  │     │ (auto-enc)  │     │ map, coerce │     │ Memory/JSON │
//! └─────────────┘     └─────────────┘     │ dedup, fk   │     └─────────────┘
//!                                         └──────┬──────┘
//!                                                ▼
//!                                         ┌─────────────┐
//!                                         │  ImportRun  │
//!                                         │ (registry)  │
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use csvimport::{import_file, ImportOptions, MemoryStore, Schema};
//!
//! let schema = Schema::load("schema.json")?;
//! let mut store = MemoryStore::new();
//! let outcome = import_file("items.csv", &schema, ImportOptions::new("shop.Item"), &mut store)?;
//! for line in &outcome.log {
//!     println!("{}", line);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`schema`] - Model definitions and the field catalog
//! - [`mapping`] - Mapping grammar and header inference
//! - [`coerce`] - Cell value coercion
//! - [`reader`] - CSV reading with charset and delimiter detection
//! - [`store`] - Data store trait and implementations
//! - [`import`] - Row import orchestrator and signals
//! - [`runs`] - Run result records
//! - [`logs`] - Log sinks
//! - [`config`] - Environment settings
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod schema;

// Mapping and coercion
pub mod coerce;
pub mod mapping;

// Input
pub mod reader;

// Storage
pub mod store;

// Import
pub mod import;
pub mod runs;

// Ambient
pub mod config;
pub mod logs;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ImportError, LookupError, RegistryError, SchemaError, ServerError, Severity,
    SourceError, StoreError,
};

// =============================================================================
// Re-exports - Schema
// =============================================================================

pub use schema::{
    CatalogEntry, FieldCatalog, FieldDef, FieldType, ModelDef, RelatedModel, Schema,
    DISPLAY_FIELD_POSITION,
};

// =============================================================================
// Re-exports - Mapping and coercion
// =============================================================================

pub use coerce::{coerce, Coerced, BOOLEAN_TRUE};
pub use mapping::{infer_mapping, ForeignKey, Mapping, MappingEntry};

// =============================================================================
// Re-exports - Reader
// =============================================================================

pub use reader::{
    decode_content, detect_delimiter, detect_encoding, read_bytes, read_source, ReadOptions,
    SourceData,
};

// =============================================================================
// Re-exports - Stores
// =============================================================================

pub use store::{
    DataStore, FieldMap, FieldValue, Filter, JsonStore, MemoryStore, Record, RecordId,
};

// =============================================================================
// Re-exports - Import
// =============================================================================

pub use import::{
    import_file, ImportObserver, ImportOptions, ImportOutcome, Importer, RowMap, Signals,
};
pub use runs::{ImportRun, RunRegistry, StoredRun};

// =============================================================================
// Re-exports - Logging and config
// =============================================================================

pub use config::{LogDestination, Settings};
pub use logs::{
    LogBroadcaster, LogEntry, LogLevel, LogSink, MemorySink, NullSink, ScreenSink, TracingSink,
    LOG_TARGET,
};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
