//! KGraph CLI
//!
//! Host process around the structure and inference pipelines:
//! - Ingesting / deleting instances (structure maintained in the same batch)
//! - Applying meta-definition deprecations
//! - Reconciling native documents into inferred instances
//! - Inspecting the store snapshot

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use kgraph_core::{CollectionRef, DataStage, Event, EventKind, IdUtils, KgConfig, NormalizedDoc, SpaceName};
use kgraph_inference::Reconciler;
use kgraph_store::{GraphStore, MemoryStore};
use kgraph_structure::Ingestor;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "kgraph")]
#[command(author, version, about = "KGraph: structure maintenance and reconciliation")]
struct Cli {
    /// Configuration file (JSON). Missing file means defaults.
    #[arg(long, global = true, default_value = "kgraph.json")]
    config: PathBuf,

    /// Store snapshot; overrides `snapshot_path` from the config.
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a JSON-LD document (or an array of documents) into a space.
    Ingest {
        /// Input JSON file
        input: PathBuf,
        #[arg(short, long)]
        space: String,
        #[arg(long, value_enum, default_value = "native")]
        stage: StageArg,
    },

    /// Delete an instance; links pointing at it become unresolved.
    Delete {
        /// Instance uuid or absolute id
        id: String,
        #[arg(short, long)]
        space: String,
        #[arg(long, value_enum, default_value = "native")]
        stage: StageArg,
    },

    /// Apply the deprecation semantics of a meta-definition document.
    Deprecate {
        input: PathBuf,
        #[arg(short, long)]
        space: String,
    },

    /// Reconcile the native documents around one document.
    Reconcile {
        /// Triggering document (uuid or absolute id)
        id: String,
        #[arg(short, long)]
        space: String,
        /// Print the events without applying them
        #[arg(long)]
        dry_run: bool,
    },

    /// Collection overview of a stage, or the documents of one collection.
    Show {
        collection: Option<String>,
        #[arg(long, value_enum, default_value = "native")]
        stage: StageArg,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Write the effective configuration to a file.
    InitConfig {
        #[arg(short, long)]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StageArg {
    Native,
    InProgress,
    Released,
}

impl From<StageArg> for DataStage {
    fn from(stage: StageArg) -> Self {
        match stage {
            StageArg::Native => DataStage::Native,
            StageArg::InProgress => DataStage::InProgress,
            StageArg::Released => DataStage::Released,
        }
    }
}

// ============================================================================
// Host
// ============================================================================

struct Host {
    config: KgConfig,
    store: Arc<MemoryStore>,
    snapshot: Option<PathBuf>,
    ingestor: Ingestor,
}

impl Host {
    async fn open(config: KgConfig, snapshot: Option<PathBuf>) -> Result<Self> {
        let ids = config.id_utils();
        let store = match &snapshot {
            Some(path) => MemoryStore::open(path, ids)
                .with_context(|| format!("failed to open snapshot {}", path.display()))?,
            None => {
                tracing::warn!("no snapshot configured, changes are not persisted");
                MemoryStore::new(ids)
            }
        };
        let store = Arc::new(store);
        store.ensure_schema().await?;
        let ingestor = Ingestor::new(store.clone(), &config);
        Ok(Self {
            config,
            store,
            snapshot,
            ingestor,
        })
    }

    fn ids(&self) -> &IdUtils {
        self.ingestor.id_utils()
    }

    fn persist(&self) -> Result<()> {
        if let Some(path) = &self.snapshot {
            self.store.save_snapshot(path)?;
        }
        Ok(())
    }

    fn parse_id(&self, raw: &str) -> Result<Uuid> {
        self.ids()
            .get_uuid(raw)
            .ok_or_else(|| anyhow!("{raw} is neither a uuid nor an id in {}", self.ids().namespace()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level)?;

    let config = KgConfig::load(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;

    if let Commands::InitConfig { out } = &cli.command {
        config.save(out)?;
        eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
        return Ok(());
    }

    let snapshot = cli.snapshot.clone().or_else(|| config.snapshot_path.clone());
    let host = Host::open(config, snapshot).await?;

    match cli.command {
        Commands::Ingest { input, space, stage } => cmd_ingest(&host, &input, &space, stage.into()).await?,
        Commands::Delete { id, space, stage } => cmd_delete(&host, &id, &space, stage.into()).await?,
        Commands::Deprecate { input, space } => cmd_deprecate(&host, &input, &space).await?,
        Commands::Reconcile { id, space, dry_run } => cmd_reconcile(&host, &id, &space, dry_run).await?,
        Commands::Show { collection, stage, limit } => {
            cmd_show(&host, collection.as_deref(), stage.into(), limit);
            return Ok(());
        }
        Commands::InitConfig { .. } => return Ok(()),
    }
    host.persist()
}

fn setup_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow!("invalid log filter {level}: {e}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// One document, or every element of a top-level array.
fn read_documents(path: &Path) -> Result<Vec<NormalizedDoc>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)?;
    let values = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    values
        .into_iter()
        .map(|v| NormalizedDoc::from_value(v).map_err(Into::into))
        .collect()
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_ingest(host: &Host, input: &Path, space: &str, stage: DataStage) -> Result<()> {
    let space = SpaceName::new(space);
    let documents = read_documents(input)?;
    println!(
        "{} {} document(s) into {} ({})",
        "Ingesting".green().bold(),
        documents.len(),
        space.to_string().bold(),
        stage
    );
    for doc in documents {
        let report = host.ingestor.upsert(stage, &space, doc).await?;
        println!(
            "  {} {} ({} operations, {} upserted, {} deleted)",
            "ok".green().bold(),
            report.document,
            report.operations,
            report.summary.upserted,
            report.summary.deleted
        );
    }
    Ok(())
}

async fn cmd_delete(host: &Host, id: &str, space: &str, stage: DataStage) -> Result<()> {
    let key = host.parse_id(id)?;
    let target = CollectionRef::from_space(&SpaceName::new(space)).doc(key);
    let report = host.ingestor.delete(stage, &target).await?;
    println!(
        "{} {} ({} operations)",
        "deleted".green().bold(),
        report.document,
        report.operations
    );
    Ok(())
}

async fn cmd_deprecate(host: &Host, input: &Path, space: &str) -> Result<()> {
    let space = SpaceName::new(space);
    for doc in read_documents(input)? {
        let report = host.ingestor.deprecate(DataStage::Native, &space, &doc).await?;
        println!(
            "{} {} ({} operations, {} deleted)",
            "deprecated".green().bold(),
            report.document,
            report.operations,
            report.summary.deleted
        );
    }
    Ok(())
}

async fn cmd_reconcile(host: &Host, id: &str, space: &str, dry_run: bool) -> Result<()> {
    let key = host.parse_id(id)?;
    let space = SpaceName::new(space);
    let reconciler = Reconciler::new(host.store.clone(), &host.config);
    let events = reconciler.reconcile(&space, key).await?;

    if events.is_empty() {
        println!("{} nothing to reconcile", "ok".green().bold());
        return Ok(());
    }
    for event in &events {
        print_event(event);
    }
    if dry_run {
        println!("{} {} event(s) not applied", "dry run".yellow().bold(), events.len());
        return Ok(());
    }
    let summary = host
        .ingestor
        .commit_inference_events(reconciler.inferred_stage(), &events)
        .await?;
    println!(
        "{} {} event(s) ({} upserted, {} deleted)",
        "applied".green().bold(),
        events.len(),
        summary.upserted,
        summary.deleted
    );
    Ok(())
}

fn print_event(event: &Event) {
    let kind = match event.kind {
        EventKind::Insert => event.kind.to_string().green(),
        EventKind::Update => event.kind.to_string().cyan(),
        EventKind::Delete => event.kind.to_string().red(),
    };
    println!("  {:<6} {}/{}", kind.bold(), event.space, event.document_id);
}

fn cmd_show(host: &Host, collection: Option<&str>, stage: DataStage, limit: usize) {
    match collection {
        None => {
            println!("{} {}", "Stage".bold(), stage);
            for name in host.store.collection_names(stage) {
                println!("  {:<32} {}", name, host.store.count(stage, &name));
            }
        }
        Some(name) => {
            let documents = host.store.documents(stage, name);
            println!("{} {} ({} documents)", "Collection".bold(), name.bold(), documents.len());
            for document in documents.iter().take(limit) {
                match serde_json::to_string_pretty(document) {
                    Ok(json) => println!("{json}"),
                    Err(err) => tracing::warn!(error = %err, "failed to render document"),
                }
            }
            if documents.len() > limit {
                println!("{}", format!("... {} more", documents.len() - limit).dimmed());
            }
        }
    }
}
