//! docmelt: Export a directory of document collections into SQLite
//!
//! Every `*.json` / `*.jsonl` / `*.ndjson` file in the source directory is a
//! collection. Tables are created and widened as rows arrive unless
//! `--data-only` is given, in which case existing tables are truncated and
//! reloaded without touching their schema.
//!
//! Usage:
//!   # Export everything
//!   docmelt --source dump/ --database out.db
//!
//!   # Preview the inferred schema of the first 1000 documents per collection
//!   docmelt --source dump/ --dry-run --limit 1000
//!
//!   # Reload data into an existing schema, skipping some tables
//!   docmelt --source dump/ --database out.db --data-only --skip sessions,users__tokens

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use docmelt::config::split_list;
use docmelt::{ExportConfig, Exporter, JsonDirSource, MemoryStore, SqliteStore};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "docmelt")]
#[command(about = "Export document collections into a relational schema", long_about = None)]
struct Args {
    /// Directory holding one JSON / NDJSON file per collection
    #[arg(long, value_name = "DIR")]
    source: PathBuf,

    /// Destination SQLite database file
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Maximum number of documents read per collection
    #[arg(long)]
    limit: Option<u64>,

    /// Only load data into existing tables; never change schemas
    #[arg(long)]
    data_only: bool,

    /// Comma-separated destination tables to skip
    #[arg(long, value_name = "TABLES")]
    skip: Option<String>,

    /// Comma-separated source collections to export (default: all)
    #[arg(long, value_name = "NAMES")]
    collections: Option<String>,

    /// Skip rows with more attributes than this
    #[arg(long)]
    max_columns: Option<usize>,

    /// Strings longer than this become text columns
    #[arg(long)]
    max_varchar: Option<u32>,

    /// JSON config file; command line flags take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Export into memory and print the inferred table definitions
    #[arg(long)]
    dry_run: bool,

    /// Compact dry-run output (no pretty-printing)
    #[arg(long)]
    compact: bool,
}

impl Args {
    fn export_config(&self) -> Result<ExportConfig> {
        let mut config = match &self.config {
            Some(path) => ExportConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ExportConfig::default(),
        };

        if self.limit.is_some() {
            config.limit = self.limit;
        }
        if self.data_only {
            config.data_only = true;
        }
        if let Some(skip) = &self.skip {
            config.skip_tables = split_list(skip);
        }
        if let Some(collections) = &self.collections {
            config.collections = split_list(collections);
        }
        if let Some(max_columns) = self.max_columns {
            config.max_columns = max_columns;
        }
        if let Some(max_varchar) = self.max_varchar {
            config.max_varchar_length = max_varchar;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.export_config()?;
    let source = JsonDirSource::new(&args.source);

    if args.dry_run {
        let mut exporter = Exporter::new(MemoryStore::new(), config)?;
        exporter
            .run(&source)
            .with_context(|| format!("Failed to export {}", args.source.display()))?;

        let definitions = exporter.store().definitions();
        let output = if args.compact {
            serde_json::to_string(&definitions)?
        } else {
            serde_json::to_string_pretty(&definitions)?
        };
        println!("{}", output);
        return Ok(());
    }

    let Some(database) = &args.database else {
        bail!("--database is required unless --dry-run is given");
    };

    let store = SqliteStore::open(database)
        .with_context(|| format!("Failed to open database {}", database.display()))?;
    let mut exporter = Exporter::new(store, config)?;
    let stats = exporter
        .run(&source)
        .with_context(|| format!("Failed to export {}", args.source.display()))?;

    info!(
        documents = stats.documents,
        rows = stats.rows_written,
        skipped_listed = stats.skipped_listed,
        skipped_missing = stats.skipped_missing,
        skipped_wide = stats.skipped_wide,
        "done"
    );
    Ok(())
}
