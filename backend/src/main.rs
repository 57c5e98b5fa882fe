//! csvimport CLI - import CSV files into model records
//!
//! # Main Commands
//!
//! ```bash
//! csvimport import items.csv --model shop.Item --schema schema.json
//! csvimport serve                          # Start HTTP server (port 3000)
//! csvimport runs list                      # Show past import runs
//! ```
//!
//! # Helper Commands
//!
//! ```bash
//! csvimport mapping "column1=title,*column2=category(Category|label)"
//! csvimport infer items.csv --model shop.Item --schema schema.json
//! ```

use clap::{Parser, Subcommand};
use csvimport::{
    infer_mapping, read_source, FieldCatalog, ImportOptions, Importer, JsonStore, LogDestination,
    Mapping, ReadOptions, RunRegistry, Schema, Settings, LOG_TARGET,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "csvimport")]
#[command(about = "Import CSV files into model records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a CSV file (or a directory of CSV files)
    Import {
        /// Input CSV file or directory
        input: PathBuf,

        /// Target model, app_label.Model or Model
        #[arg(short, long)]
        model: String,

        /// Schema JSON file (default: CSVIMPORT_SCHEMA)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Store directory (default: CSVIMPORT_STORE_DIR)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Mapping list, e.g. "column1=title,column2=category(Category|label)"
        #[arg(long)]
        mappings: Option<String>,

        /// Force the charset instead of detecting it
        #[arg(long)]
        charset: Option<String>,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// The first row is data, not a header
        #[arg(long)]
        no_header: bool,

        /// Mapping selectors are header names
        #[arg(long)]
        nameindexes: bool,

        /// Always create new records
        #[arg(long)]
        no_dedup: bool,

        /// Log every mapped cell
        #[arg(long)]
        debug: bool,

        /// Importing user recorded on the run
        #[arg(long, default_value = "cron")]
        user: String,

        /// Upload method recorded on the run
        #[arg(long, default_value = "cronjob")]
        method: String,
    },

    /// Parse a mapping list and print it
    Mapping {
        /// Mapping list
        spec: String,

        /// Resolve a bare header list against this model
        #[arg(short, long)]
        model: Option<String>,

        /// Schema JSON file (default: CSVIMPORT_SCHEMA)
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Print the mapping derived from a file's header row
    Infer {
        /// Input CSV file
        input: PathBuf,

        /// Target model
        #[arg(short, long)]
        model: String,

        /// Schema JSON file (default: CSVIMPORT_SCHEMA)
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Manage recorded import runs
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: CSVIMPORT_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Schema JSON file (default: CSVIMPORT_SCHEMA)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Store directory (default: CSVIMPORT_STORE_DIR)
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum RunsAction {
    /// List all recorded runs
    List,

    /// Show details of a run
    Show {
        /// Run ID
        id: String,
    },

    /// Delete a run record
    Delete {
        /// Run ID
        id: String,
    },
}

#[tokio::main]
async fn main() {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    };

    if settings.log == LogDestination::Logger {
        init_tracing();
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Import {
            input,
            model,
            schema,
            store,
            mappings,
            charset,
            delimiter,
            no_header,
            nameindexes,
            no_dedup,
            debug,
            user,
            method,
        } => {
            let mut options = ImportOptions::new(model)
                .with_header(!no_header)
                .with_nameindexes(nameindexes)
                .with_deduplicate(!no_dedup)
                .with_debug(debug);
            options.mappings = mappings;
            options.import_user = user;
            options.upload_method = method;
            options.read = ReadOptions { charset, delimiter };

            cmd_import(&settings, &input, schema.as_deref(), store.as_deref(), options)
        }

        Commands::Mapping { spec, model, schema } => {
            cmd_mapping(&settings, &spec, model.as_deref(), schema.as_deref())
        }

        Commands::Infer { input, model, schema } => {
            cmd_infer(&settings, &input, &model, schema.as_deref())
        }

        Commands::Runs { action } => cmd_runs(&settings, action),

        Commands::Serve { port, schema, store } => {
            cmd_serve(settings, port, schema, store).await
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// JSON events on stderr, `RUST_LOG` overrides the default filter.
fn init_tracing() {
    tracing_subscriber::fmt()
        .json()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("{}=info", LOG_TARGET))),
        )
        .init();
}

fn load_schema(
    settings: &Settings,
    path: Option<&Path>,
) -> Result<Schema, Box<dyn std::error::Error>> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| settings.schema.clone())
        .ok_or("No schema given: pass --schema or set CSVIMPORT_SCHEMA")?;
    Ok(Schema::load(path)?)
}

fn cmd_import(
    settings: &Settings,
    input: &Path,
    schema: Option<&Path>,
    store_dir: Option<&Path>,
    options: ImportOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = load_schema(settings, schema)?;
    let store_dir = store_dir.unwrap_or(settings.store_dir.as_path());
    let mut store = JsonStore::open(store_dir)?;

    eprintln!("📄 Importing: {} -> {}", input.display(), options.model);

    let source = read_source(input, &options.read)?;
    eprintln!("   Encoding: {}", source.charset);
    eprintln!("   Delimiter: '{}'", format_delimiter(source.delimiter));
    if source.files.len() > 1 {
        eprintln!("   Files: {}", source.files.len());
    }

    let importer = Importer::new(&schema, source, options)?.with_sink(settings.sink());
    eprintln!("   Mapping: {}", importer.mapping().to_spec());
    eprintln!("   Rows: {}", importer.row_count());

    let outcome = importer.run(&mut store);

    let mut registry = RunRegistry::with_dir(&settings.runs_dir);
    let run_id = registry.save(outcome.run.clone())?;

    eprintln!(
        "\n✅ Imported {} rows ({} created, {} updated)",
        outcome.imported.len(),
        outcome.created,
        outcome.updated
    );
    eprintln!("   Store: {}", store.dir().display());
    eprintln!("   Run: {}", run_id);

    Ok(())
}

fn cmd_mapping(
    settings: &Settings,
    spec: &str,
    model: Option<&str>,
    schema: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mapping = match model {
        Some(model) => {
            let schema = load_schema(settings, schema)?;
            let model_def = schema
                .model(model)
                .ok_or_else(|| csvimport::ImportError::UnknownModel(model.to_string()))?;
            let catalog = FieldCatalog::build(&schema, model_def)?;
            Mapping::from_spec(spec, &catalog)
        }
        None => Mapping::parse(spec),
    };

    if mapping.is_empty() {
        return Err("No mapping entries found".into());
    }

    eprintln!("🗺️  {}", mapping.to_spec());
    println!("{}", serde_json::to_string_pretty(&mapping)?);
    Ok(())
}

fn cmd_infer(
    settings: &Settings,
    input: &Path,
    model: &str,
    schema: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema = load_schema(settings, schema)?;
    let model_def = schema
        .model(model)
        .ok_or_else(|| csvimport::ImportError::UnknownModel(model.to_string()))?;
    let catalog = FieldCatalog::build(&schema, model_def)?;

    let source = read_source(input, &ReadOptions::default())?;
    let header = source.rows.first().ok_or("Empty CSV file")?;
    eprintln!("   Columns: {}", header.join(", "));

    let spec = infer_mapping(header, &catalog);
    if spec.is_empty() {
        return Err(csvimport::ImportError::NoMapping {
            model: model_def.qualified_name(),
        }
        .into());
    }

    println!("{}", spec);
    Ok(())
}

fn cmd_runs(settings: &Settings, action: RunsAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = RunRegistry::with_dir(&settings.runs_dir);

    match action {
        RunsAction::List => {
            let runs = registry.list();
            if runs.is_empty() {
                eprintln!("📋 No import runs recorded yet.");
                return Ok(());
            }

            eprintln!("📋 Import runs ({}):\n", runs.len());
            for stored in runs {
                let run = &stored.run;
                println!("  📄 {} ({})", run.file_name, stored.id);
                println!("     Model: {}", run.model);
                println!("     Date: {}", run.import_date.to_rfc3339());
                println!("     Imported: {}", run.import_list.len());
                println!("     By: {} via {}", run.import_user, run.upload_method);
                println!();
            }
        }

        RunsAction::Show { id } => {
            let stored = registry
                .get(&id)
                .ok_or_else(|| csvimport::RegistryError::NotFound(id.clone()))?;
            println!("{}", serde_json::to_string_pretty(stored)?);
        }

        RunsAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Run deleted: {}", id);
        }
    }

    Ok(())
}

async fn cmd_serve(
    mut settings: Settings,
    port: Option<u16>,
    schema: Option<PathBuf>,
    store: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(store) = store {
        settings.store_dir = store;
    }
    let schema = load_schema(&settings, schema.as_deref())?;
    let state = csvimport::server::AppState::from_settings(&settings, schema)?;
    csvimport::server::start_server(state, port.unwrap_or(settings.port)).await
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
