//! textvec CLI - Command-line interface
//!
//! Usage:
//!   textvec ingest <text>
//!   textvec ingest --file <path>
//!   textvec ingest --dir <dir>
//!   textvec query <text> [--top-k N] [--ef N] [--exact]
//!   textvec remove <id>...
//!   textvec demo

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::{Path, PathBuf};
use textvec_chunker::{load_directory, load_file};
use textvec_core::{AppConfig, LoggingConfig, StoreBackend};
use textvec_pipeline::Pipeline;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEMO_TEXT: &str = "This is a string to search similar items for";
const DEMO_QUERY: &str = "What is a string?";

#[derive(Parser)]
#[command(name = "textvec")]
#[command(about = "Chunk, embed, and search text with a vector index")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the in-memory store instead of Qdrant
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest text, a file, or a directory of text files
    #[command(group(ArgGroup::new("source").required(true).args(["text", "file", "dir"])))]
    Ingest {
        /// Text to ingest
        text: Option<String>,

        /// Plain text or Markdown file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Directory of .txt and .md files
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Search for chunks similar to the given text
    Query {
        text: String,

        /// Number of matches (defaults to the configured top_k)
        #[arg(long)]
        top_k: Option<usize>,

        /// HNSW exploration factor
        #[arg(long)]
        ef: Option<u64>,

        /// Bypass the index and search exhaustively
        #[arg(long)]
        exact: bool,
    },
    /// Remove stored chunks by id
    Remove {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    /// Ingest a sample sentence, remove it, then search
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if cli.memory {
        config.vector.backend = StoreBackend::Memory;
    }
    init_tracing(&config.logging);

    let pipeline = Pipeline::from_config(&config).context("failed to build pipeline")?;
    let created = pipeline
        .bootstrap()
        .await
        .context("failed to prepare collection")?;
    tracing::info!(
        backend = pipeline.store().backend_name(),
        collection = %pipeline.store().collection().name,
        created,
        "Collection ready"
    );

    match cli.command {
        Commands::Ingest { text, file, dir } => {
            if let Some(text) = text {
                print_ids(&pipeline.ingest(&text).await);
            } else if let Some(path) = file {
                let document = load_file(&path)?;
                print_ids(&pipeline.ingest(&document.content).await);
            } else if let Some(dir) = dir {
                let documents = load_directory(&dir)?;
                let mut stored = 0;
                for document in &documents {
                    let ids = pipeline.ingest(&document.content).await;
                    println!("{}: {} chunk(s)", document.path.display(), ids.len());
                    print_ids(&ids);
                    stored += ids.len();
                }
                tracing::info!(files = documents.len(), stored, "Directory ingested");
            }
        }
        Commands::Query {
            text,
            top_k,
            ef,
            exact,
        } => {
            let mut params = pipeline.config().search_params;
            if let Some(ef) = ef {
                params = params.with_hnsw_ef(ef);
            }
            if exact {
                params = params.exact();
            }
            let top_k = top_k.unwrap_or(pipeline.config().top_k);

            let results = pipeline.query_with(&text, top_k, &params).await;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Remove { ids } => {
            for id in ids {
                let status = if pipeline.remove(id).await {
                    "removed"
                } else {
                    "not found"
                };
                println!("{id}: {status}");
            }
        }
        Commands::Demo => {
            let ids = pipeline.ingest(DEMO_TEXT).await;
            println!("Stored: {ids:?}");

            if let Some(first) = ids.first() {
                let removed = pipeline.remove(*first).await;
                tracing::debug!(id = %first, removed, "Demo record removed");
            }

            let results = pipeline.query_default(DEMO_QUERY).await;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)
            .and_then(AppConfig::with_env_override)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

/// Logs go to stderr so command output stays parseable
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_ids(ids: &[Uuid]) {
    for id in ids {
        println!("{id}");
    }
}
