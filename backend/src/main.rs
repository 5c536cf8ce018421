//! Bulkload CLI - Import CSV records as repository objects
//!
//! # Main Commands
//!
//! ```bash
//! bulkload import works.csv -c importer.json     # Full import run
//! bulkload import works.csv -c importer.json --validate-only
//! bulkload objects list                          # Inspect the object store
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! bulkload parse works.csv                       # Just parse CSV to JSON
//! bulkload types -c importer.json                # Show registered object types
//! ```

use bulkload::logs::log_error;
use bulkload::store::DEFAULT_STORE_DIR;
use bulkload::{
    entries_from_records, parse_csv_file_auto, run_import, ChannelQueue, EntryImportBehavior,
    ImportContext, ImporterConfig, ImporterRun, JsonObjectStore, RelationshipRequest, RunError,
    RunReport, TypeRegistry,
};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

#[derive(Parser)]
#[command(name = "bulkload")]
#[command(about = "Import CSV metadata records as repository objects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output JSON records
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a CSV file: build, persist and link every record
    Import {
        /// Input CSV file
        input: PathBuf,

        /// Importer config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Build and validate without persisting
        #[arg(long)]
        validate_only: bool,

        /// Object store directory
        #[arg(long)]
        store: Option<PathBuf>,

        /// Write the run report (JSON) here, default stdout
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Write scheduled relationship requests (JSON) here
        #[arg(long)]
        relationships: Option<PathBuf>,

        /// Write per-entry statuses (JSON) here
        #[arg(long)]
        entries: Option<PathBuf>,
    },

    /// List registered object types
    Types {
        /// Importer config (JSON), built-in types only if omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Inspect persisted objects
    Objects {
        #[command(subcommand)]
        action: ObjectsAction,
    },
}

#[derive(Subcommand)]
enum ObjectsAction {
    /// List all stored objects
    List {
        /// Object store directory
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Show one object
    Show {
        /// Object id
        id: String,

        /// Object store directory
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Import {
            input,
            config,
            validate_only,
            store,
            report,
            relationships,
            entries,
        } => {
            let outputs = ImportOutputs {
                report,
                relationships,
                entries,
            };
            cmd_import(&input, &config, validate_only, store.as_deref(), outputs).await
        }

        Commands::Types { config } => cmd_types(config.as_deref()),

        Commands::Objects { action } => cmd_objects(action),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), RunError> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file_auto(input)?;
    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.records.len());

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)
}

struct ImportOutputs {
    report: Option<PathBuf>,
    relationships: Option<PathBuf>,
    entries: Option<PathBuf>,
}

async fn cmd_import(
    input: &Path,
    config_path: &Path,
    validate_only: bool,
    store_dir: Option<&Path>,
    outputs: ImportOutputs,
) -> Result<(), RunError> {
    let mut config = ImporterConfig::from_json_file(config_path)?;
    config.apply_env();
    config.validate_only |= validate_only;

    eprintln!("📄 Processing: {}", input.display());
    let parsed = parse_csv_file_auto(input)?;
    eprintln!("   Encoding: {}", parsed.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(parsed.delimiter));
    eprintln!("   Rows: {}", parsed.records.len());
    if config.validate_only {
        eprintln!("   Mode: validate only");
    }

    let store = JsonObjectStore::with_dir(store_dir.unwrap_or(Path::new(DEFAULT_STORE_DIR)))?;
    let registry = TypeRegistry::from_config(&config);
    let run = ImporterRun::start(&config.name);

    // Relationship requests are collected by a separate task
    let (queue, mut receiver) = ChannelQueue::channel();
    let collector = tokio::spawn(async move {
        let mut requests: Vec<RelationshipRequest> = Vec::new();
        while let Some(request) = receiver.recv().await {
            requests.push(request);
        }
        requests
    });

    let mut entries = entries_from_records(parsed.records, &config, &run);
    let outcome = {
        let ctx = ImportContext::new(&config, &run, &registry, &store, &queue);
        run_import(&mut entries, &ctx)
    };
    drop(queue);
    let requests = collected(collector).await;

    let (report, halt) = match outcome {
        Ok(report) => (report, None),
        Err(halted) => (halted.report, Some(halted.cause)),
    };
    print_summary(&report, requests.len());

    if let Some(path) = outputs.relationships {
        fs::write(&path, serde_json::to_string_pretty(&requests)?)?;
        eprintln!("   💾 Relationships written to: {}", path.display());
    }
    if let Some(path) = outputs.entries {
        let records: Vec<_> = entries.iter().map(|e| e.entry()).collect();
        fs::write(&path, serde_json::to_string_pretty(&records)?)?;
        eprintln!("   💾 Entries written to: {}", path.display());
    }
    write_output(&serde_json::to_string_pretty(&report)?, outputs.report.as_deref())?;

    match halt {
        Some(cause) => Err(RunError::Halted(cause)),
        None => {
            eprintln!("\n✨ Done!");
            Ok(())
        }
    }
}

/// Requests gathered by the collector task; none if the task failed.
async fn collected(collector: JoinHandle<Vec<RelationshipRequest>>) -> Vec<RelationshipRequest> {
    match collector.await {
        Ok(requests) => requests,
        Err(e) => {
            log_error(format!("Relationship collector failed: {}", e));
            Vec::new()
        }
    }
}

fn print_summary(report: &RunReport, relationships: usize) {
    eprintln!("\n📊 Run {}:", report.run_id);
    eprintln!("   ✅ Complete: {}", report.complete);
    eprintln!("   ❌ Failed: {}", report.failed);
    if report.pending > 0 {
        eprintln!("   ⏸️  Pending: {}", report.pending);
    }
    eprintln!("   🔗 Relationship requests: {}", relationships);
}

fn cmd_types(config_path: Option<&Path>) -> Result<(), RunError> {
    let registry = match config_path {
        Some(path) => TypeRegistry::from_config(&ImporterConfig::from_json_file(path)?),
        None => TypeRegistry::with_defaults(),
    };

    for name in registry.names() {
        println!("{}", name);
    }
    Ok(())
}

fn cmd_objects(action: ObjectsAction) -> Result<(), RunError> {
    match action {
        ObjectsAction::List { store } => {
            let store = open_store(store.as_deref())?;
            let objects = store.list();
            if objects.is_empty() {
                eprintln!("📋 No objects stored in {}", store.dir().display());
                return Ok(());
            }

            eprintln!("📋 Stored objects ({}):\n", objects.len());
            for o in objects {
                println!("  📄 {} ({})", o.source_identifier, o.id);
                println!("     Type: {}", o.type_name);
                println!("     Updated: {}", o.updated_at);
                println!();
            }
        }

        ObjectsAction::Show { id, store } => {
            let store = open_store(store.as_deref())?;
            // Accept either the object id or the source identifier
            let object = store
                .get(&id)
                .or_else(|| store.get_by_source(&id))
                .ok_or_else(|| RunError::Command(format!("Object not found: {}", id)))?;
            println!("{}", serde_json::to_string_pretty(&object)?);
        }
    }

    Ok(())
}

fn open_store(dir: Option<&Path>) -> Result<JsonObjectStore, RunError> {
    Ok(JsonObjectStore::with_dir(dir.unwrap_or(Path::new(DEFAULT_STORE_DIR)))?)
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), RunError> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
