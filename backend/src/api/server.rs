//! HTTP Server for the csvimport API.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | POST   | `/api/import`     | Upload a CSV and import it           |
//! | GET    | `/api/runs`       | Import runs, newest first            |
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |
//!
//! `POST /api/import` takes a multipart form: `file` (required), `model`
//! (required), and optionally `mappings`, `deduplicate`, `nameindexes` and
//! `header`. Imports run one at a time: the store is locked for the whole run.

use axum::{
    extract::{Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::types::{error_response, ImportResponse, SourceMetadata};
use crate::coerce::to_boolean;
use crate::config::Settings;
use crate::error::ServerError;
use crate::import::{ImportOptions, Importer};
use crate::logs::{LogBroadcaster, LogSink};
use crate::reader::{read_bytes, ReadOptions};
use crate::runs::{RunRegistry, StoredRun};
use crate::schema::Schema;
use crate::store::JsonStore;

type ApiError = (StatusCode, Json<Value>);

/// Shared server state
#[derive(Clone)]
pub struct AppState {
    pub schema: Arc<Schema>,
    pub store: Arc<Mutex<JsonStore>>,
    pub runs: Arc<Mutex<RunRegistry>>,
    pub logs: Arc<LogBroadcaster>,
}

impl AppState {
    pub fn new(schema: Schema, store: JsonStore, runs: RunRegistry) -> Self {
        Self {
            schema: Arc::new(schema),
            store: Arc::new(Mutex::new(store)),
            runs: Arc::new(Mutex::new(runs)),
            logs: Arc::new(LogBroadcaster::new()),
        }
    }

    /// Open the store and run registry named by `settings`.
    pub fn from_settings(settings: &Settings, schema: Schema) -> Result<Self, ServerError> {
        let store = JsonStore::open(&settings.store_dir)
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        let runs = RunRegistry::with_dir(&settings.runs_dir);
        Ok(Self::new(schema, store, runs))
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/import", post(import_csv))
        .route("/api/runs", get(list_runs))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 csvimport server running on http://localhost:{}", port);
    println!("   POST /api/import - Upload and import a CSV file");
    println!("   GET  /api/runs   - Import runs");
    println!("   GET  /api/logs   - SSE log stream");
    println!("   GET  /health     - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "csvimport",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "import": "POST /api/import",
            "runs": "GET /api/runs",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.logs.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Import runs, newest first
async fn list_runs(State(state): State<AppState>) -> Result<Json<Vec<StoredRun>>, ApiError> {
    let runs = state
        .runs
        .lock()
        .map_err(|_| reject(ServerError::Internal("run registry lock poisoned".into())))?;
    Ok(Json(runs.list().into_iter().cloned().collect()))
}

/// Fields of the upload form.
#[derive(Debug, Default)]
struct UploadForm {
    file_name: Option<String>,
    file: Option<Vec<u8>>,
    model: Option<String>,
    mappings: Option<String>,
    deduplicate: Option<bool>,
    nameindexes: Option<bool>,
    header: Option<bool>,
}

impl UploadForm {
    fn set(&mut self, name: &str, value: String) {
        // HTML checkboxes submit "on".
        let flag = || {
            let value = value.trim();
            value.eq_ignore_ascii_case("on") || to_boolean(value)
        };
        match name {
            "model" => self.model = Some(value.trim().to_string()),
            "mappings" => self.mappings = Some(value.clone()),
            "deduplicate" => self.deduplicate = Some(flag()),
            "nameindexes" => self.nameindexes = Some(flag()),
            "header" => self.header = Some(flag()),
            _ => {}
        }
    }

    fn into_parts(self) -> Result<(String, Vec<u8>, ImportOptions), ServerError> {
        let bytes = self
            .file
            .ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;
        let model = self
            .model
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ServerError::BadRequest("No model provided".into()))?;

        let defaults = ImportOptions::default();
        let mut options = ImportOptions::new(model)
            .with_deduplicate(self.deduplicate.unwrap_or(defaults.deduplicate))
            .with_nameindexes(self.nameindexes.unwrap_or(defaults.nameindexes))
            .with_header(self.header.unwrap_or(defaults.header));
        options.mappings = self.mappings.filter(|m| !m.trim().is_empty());
        options.upload_method = "upload".to_string();

        let file_name = self.file_name.unwrap_or_else(|| "upload.csv".to_string());
        Ok((file_name, bytes, options))
    }
}

/// Upload CSV endpoint
async fn import_csv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        reject(ServerError::BadRequest(format!("Multipart error: {}", e)))
    })? {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            form.file_name = field.file_name().map(|s| s.to_string());
            form.file = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| reject(ServerError::BadRequest(format!("Read error: {}", e))))?
                    .to_vec(),
            );
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| reject(ServerError::BadRequest(format!("Read error: {}", e))))?;
            form.set(&name, value);
        }
    }

    let (file_name, bytes, options) = form.into_parts().map_err(reject)?;

    println!("\n{}", "=".repeat(70));
    println!("📄 NEW UPLOAD: {} ({} bytes) -> {}", file_name, bytes.len(), options.model);
    println!("{}\n", "=".repeat(70));

    let response = tokio::task::spawn_blocking(move || run_import(&state, file_name, &bytes, options))
        .await
        .map_err(|e| reject(ServerError::Internal(e.to_string())))?
        .map_err(|e| {
            eprintln!("❌ Import error: {}", e);
            reject(e)
        })?;

    Ok(Json(response))
}

/// Read, import and record one uploaded file.
fn run_import(
    state: &AppState,
    file_name: String,
    bytes: &[u8],
    options: ImportOptions,
) -> Result<ImportResponse, ServerError> {
    let mut source = read_bytes(bytes, &ReadOptions::default())
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;
    source.files.push(PathBuf::from(&file_name));

    let metadata = SourceMetadata {
        file_name,
        charset: source.charset.clone(),
        delimiter: source.delimiter.to_string(),
        row_count: source.rows.len(),
    };

    let sink: Arc<dyn LogSink> = state.logs.clone();
    let importer = Importer::new(&state.schema, source, options)?.with_sink(sink);

    let outcome = {
        let mut store = state
            .store
            .lock()
            .map_err(|_| ServerError::Internal("store lock poisoned".into()))?;
        importer.run(&mut *store)
    };

    let run_id = state
        .runs
        .lock()
        .map_err(|_| ServerError::Internal("run registry lock poisoned".into()))?
        .save(outcome.run.clone())?;

    Ok(ImportResponse::new(run_id, outcome, metadata))
}

fn reject(err: ServerError) -> ApiError {
    let status = match &err {
        ServerError::Import(_) | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Registry(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(error_response(&err.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldType, ModelDef};
    use tempfile::tempdir;

    fn state(dir: &std::path::Path) -> AppState {
        let schema = Schema::new(vec![
            ModelDef::new(
                "Category",
                vec![
                    FieldDef::new("id", FieldType::Integer),
                    FieldDef::new("label", FieldType::Text),
                ],
            ),
            ModelDef::new(
                "Item",
                vec![
                    FieldDef::new("id", FieldType::Integer),
                    FieldDef::new("title", FieldType::Text),
                    FieldDef::foreign_key("category", "Category"),
                ],
            ),
        ]);
        let store = JsonStore::open(dir.join("store")).unwrap();
        let runs = RunRegistry::with_dir(dir.join("runs"));
        AppState::new(schema, store, runs)
    }

    #[test]
    fn test_form_defaults() {
        let mut form = UploadForm {
            file: Some(b"title\nWidget".to_vec()),
            ..Default::default()
        };
        form.set("model", " Item ".to_string());

        let (file_name, _, options) = form.into_parts().unwrap();
        assert_eq!(file_name, "upload.csv");
        assert_eq!(options.model, "Item");
        assert!(options.deduplicate);
        assert!(options.header);
        assert!(options.mappings.is_none());
        assert_eq!(options.upload_method, "upload");
    }

    #[test]
    fn test_form_flags() {
        let mut form = UploadForm {
            file: Some(Vec::new()),
            ..Default::default()
        };
        form.set("model", "Item".into());
        form.set("deduplicate", "false".into());
        form.set("header", "0".into());
        form.set("nameindexes", "yes".into());
        form.set("mappings", "column1=title".into());

        let (_, _, options) = form.into_parts().unwrap();
        assert!(!options.deduplicate);
        assert!(!options.header);
        assert!(options.nameindexes);
        assert_eq!(options.mappings.as_deref(), Some("column1=title"));
    }

    #[test]
    fn test_form_checkbox_values() {
        let mut form = UploadForm {
            file: Some(Vec::new()),
            ..Default::default()
        };
        form.set("model", "Item".into());
        form.set("nameindexes", "on".into());
        form.set("deduplicate", "off".into());

        let (_, _, options) = form.into_parts().unwrap();
        assert!(options.nameindexes);
        assert!(!options.deduplicate);
    }

    #[test]
    fn test_form_requires_file_and_model() {
        let err = UploadForm::default().into_parts().unwrap_err();
        assert!(err.to_string().contains("No file provided"));

        let form = UploadForm {
            file: Some(Vec::new()),
            ..Default::default()
        };
        let err = form.into_parts().unwrap_err();
        assert!(err.to_string().contains("No model provided"));
    }

    #[test]
    fn test_run_import_records_run() {
        let dir = tempdir().unwrap();
        let state = state(dir.path());
        let options = ImportOptions::new("Item");

        let response = run_import(
            &state,
            "items.csv".into(),
            b"title,category\nWidget,Tools\nGadget,Tools\n",
            options,
        )
        .unwrap();

        assert_eq!(response.status, "ok");
        assert_eq!(response.imported, vec![1, 2]);
        assert_eq!(response.source.row_count, 3);
        assert_eq!(state.store.lock().unwrap().records().count("Category"), 1);

        let runs = state.runs.lock().unwrap();
        let stored = runs.get(&response.run_id).unwrap();
        assert_eq!(stored.run.file_name, "items.csv");
        assert_eq!(stored.run.upload_method, "upload");
    }

    #[test]
    fn test_run_import_unknown_model() {
        let dir = tempdir().unwrap();
        let err = run_import(
            &state(dir.path()),
            "items.csv".into(),
            b"title\nWidget\n",
            ImportOptions::new("Shelf"),
        )
        .unwrap_err();

        let (status, body) = reject(err);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0["status"], "error");
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body["service"], "csvimport");
    }
}
