//! progindex CLI.
//!
//! # Commands
//! ```text
//! progindex run     [--chains <path.tsv>] [--window-size N] [--workers N]
//! progindex export  [--output <path.tsv>]
//! progindex chains  [--chains <path.tsv>] [--database-url <uri>]
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use progindex_core::checkpoint::{resume_points, IngestStore};
use progindex_core::error::IndexerError;
use progindex_core::indexer::{IngestConfig, DEFAULT_WINDOW_SIZE};
use progindex_core::registry::ChainRegistry;
use progindex_evm::{IngestorBuilder, RpcActivationSource};
use progindex_rpc::HttpClientConfig;
use progindex_storage::{PostgresOptions, PostgresStore};

mod export;
mod logging;

/// The chain table compiled into the binary.
const BUNDLED_CHAINS: &str = include_str!("../chains.tsv");

#[derive(Parser)]
#[command(
    name = "progindex",
    about = "Index Stylus ProgramActivated events from Arbitrum chains into PostgreSQL",
    long_about = "
progindex: resumable indexer for ArbWasm ProgramActivated events.
Each chain is paged from its last checkpoint up to the height probed at
startup; every window is committed atomically with its checkpoint.

ENVIRONMENT VARIABLES:
  SPN_DATABASE_URI   PostgreSQL connection string
  RUST_LOG           Tracing filter (overrides --log-level)
",
    version
)]
struct Cli {
    /// Default log level or filter directives
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit JSON structured logs
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DatabaseArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "SPN_DATABASE_URI", hide_env_values = true)]
    database_url: String,

    /// Maximum connections in the pool
    #[arg(long, default_value_t = 10)]
    max_connections: u32,
}

impl DatabaseArgs {
    async fn connect(&self) -> Result<PostgresStore> {
        let opts = PostgresOptions {
            max_connections: self.max_connections,
            ..PostgresOptions::default()
        };
        PostgresStore::connect_with_options(&self.database_url, opts)
            .await
            .context("connecting to the database")
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest every configured chain up to its current height
    Run {
        #[command(flatten)]
        db: DatabaseArgs,

        /// Chain table (TSV); defaults to the bundled one
        #[arg(long)]
        chains: Option<PathBuf>,

        /// Blocks per eth_getLogs window
        #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
        window_size: u64,

        /// Concurrent workers (default: CPUs x 5)
        #[arg(long)]
        workers: Option<usize>,

        /// Per-request HTTP timeout in seconds (default: none)
        #[arg(long)]
        request_timeout_secs: Option<u64>,
    },

    /// Write the deduplicated activation set as TSV
    Export {
        #[command(flatten)]
        db: DatabaseArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the configured chains, with resume points if a database is given
    Chains {
        /// Chain table (TSV); defaults to the bundled one
        #[arg(long)]
        chains: Option<PathBuf>,

        /// PostgreSQL connection string
        #[arg(long, env = "SPN_DATABASE_URI", hide_env_values = true)]
        database_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(&logging::LogConfig {
        level: cli.log_level.clone(),
        json: cli.json_logs,
    });

    match dispatch(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let class = match e.downcast_ref::<IndexerError>() {
                Some(ie) if ie.is_storage() => "storage",
                Some(ie) if ie.is_remote() => "rpc",
                Some(_) => "pipeline",
                None => "other",
            };
            tracing::error!(class, error = %format!("{e:#}"), "progindex failed");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            db,
            chains,
            window_size,
            workers,
            request_timeout_secs,
        } => cmd_run(&db, chains.as_deref(), window_size, workers, request_timeout_secs).await,

        Commands::Export { db, output } => cmd_export(&db, output.as_deref()).await,

        Commands::Chains {
            chains,
            database_url,
        } => cmd_chains(chains.as_deref(), database_url.as_deref()).await,
    }
}

fn load_registry(path: Option<&Path>) -> Result<ChainRegistry> {
    let registry = match path {
        Some(p) => ChainRegistry::from_path(p)
            .with_context(|| format!("loading chain table {}", p.display()))?,
        None => ChainRegistry::from_tsv(BUNDLED_CHAINS).context("loading bundled chain table")?,
    };
    Ok(registry)
}

async fn cmd_run(
    db: &DatabaseArgs,
    chains: Option<&Path>,
    window_size: u64,
    workers: Option<usize>,
    request_timeout_secs: Option<u64>,
) -> Result<()> {
    let registry = load_registry(chains)?;
    let store = db.connect().await?;
    let source = RpcActivationSource::new(&HttpClientConfig {
        request_timeout: request_timeout_secs.map(Duration::from_secs),
    })?;

    let ingestor = IngestorBuilder::new()
        .registry(registry)
        .source(Arc::new(source))
        .store(Arc::new(store))
        .window_size(window_size)
        .workers(workers.unwrap_or_else(IngestConfig::default_workers))
        .build()?;

    let summary = ingestor.run().await.context("ingestion run failed")?;
    for (chain_id, block) in &summary.checkpoints {
        tracing::info!(chain_id, checkpoint = block, "final checkpoint");
    }
    tracing::info!(
        chains = summary.chains,
        already_complete = summary.already_complete,
        windows = summary.windows,
        records = summary.records,
        "run summary"
    );
    Ok(())
}

async fn cmd_export(db: &DatabaseArgs, output: Option<&Path>) -> Result<()> {
    let store = db.connect().await?;
    let rows = store
        .unique_deployments()
        .await
        .context("reading deduplicated activations")?;

    let written = match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            export::write_tsv(file, &rows)?
        }
        None => export::write_tsv(std::io::stdout().lock(), &rows)?,
    };
    tracing::info!(rows = written, "export complete");
    Ok(())
}

async fn cmd_chains(chains: Option<&Path>, database_url: Option<&str>) -> Result<()> {
    let registry = load_registry(chains)?;

    let resume = match database_url {
        Some(url) => {
            let store = PostgresStore::connect(url)
                .await
                .context("connecting to the database")?;
            let stored = store.load_checkpoints().await.context("reading checkpoints")?;
            Some(resume_points(&registry, &stored))
        }
        None => None,
    };

    println!("{:<20} {:>8} {:>12} {:>12}  rpc", "name", "chain id", "start", "resume");
    for chain in registry.chains() {
        let at = resume
            .as_ref()
            .and_then(|r| r.get(&chain.chain_id))
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<20} {:>8} {:>12} {:>12}  {}",
            chain.name, chain.chain_id, chain.start_block, at, chain.rpc
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_chain_table_parses() {
        let registry = load_registry(None).unwrap();
        assert!(registry.get(42161).is_some());
        assert!(registry.get(421614).is_some());
    }

    #[test]
    fn cli_parses_run_defaults() {
        let cli = Cli::try_parse_from([
            "progindex",
            "run",
            "--database-url",
            "postgres://localhost/progindex",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                window_size,
                workers,
                chains,
                ..
            } => {
                assert_eq!(window_size, 5000);
                assert!(workers.is_none());
                assert!(chains.is_none());
            }
            _ => panic!("expected run"),
        }
    }
}
