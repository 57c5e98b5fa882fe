//! REST API types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::import::ImportOutcome;
use crate::store::RecordId;

/// Response sent after an uploaded CSV was imported.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    /// Run registry id
    pub run_id: String,

    /// Status: "ok", "warning"
    pub status: String,

    pub model: String,

    /// Ids of the imported main records
    pub imported: Vec<RecordId>,

    pub created: usize,

    pub updated: usize,

    /// The import log
    pub log: Vec<String>,

    pub source: SourceMetadata,
}

/// Uploaded file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    pub file_name: String,
    pub charset: String,
    pub delimiter: String,
    pub row_count: usize,
}

impl ImportResponse {
    /// "warning" when a row hit a storage error.
    pub fn new(run_id: String, outcome: ImportOutcome, source: SourceMetadata) -> Self {
        let failed = outcome
            .log
            .iter()
            .any(|line| line.starts_with("Database Error"));

        Self {
            run_id,
            status: if failed { "warning" } else { "ok" }.to_string(),
            model: outcome.run.model,
            imported: outcome.imported,
            created: outcome.created,
            updated: outcome.updated,
            log: outcome.log,
            source,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
        "imported": [],
        "log": []
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let body = error_response("No file provided");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "No file provided");
        assert!(body["imported"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_metadata_camel_case() {
        let meta = SourceMetadata {
            file_name: "items.csv".into(),
            charset: "utf-8".into(),
            delimiter: ",".into(),
            row_count: 2,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["fileName"], "items.csv");
        assert_eq!(json["rowCount"], 2);
    }
}
