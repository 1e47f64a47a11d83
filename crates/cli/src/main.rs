//! Passage CLI
//!
//! Command-line front-end for the passage retrieval pipeline: ingest
//! extracted document text into the vector index, query it, inspect it.

mod commands;

use clap::{Parser, Subcommand};
use commands::{DeleteCommand, IngestCommand, QueryCommand, StatsCommand};
use passage_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// Document retrieval over a local vector index
#[derive(Parser, Debug)]
#[command(name = "passage")]
#[command(about = "Chunk, embed, and search extracted document text", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "PASSAGE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Embedding provider (trigram, ollama)
    #[arg(short, long, global = true, env = "PASSAGE_PROVIDER")]
    provider: Option<String>,

    /// Embedding model identifier
    #[arg(short, long, global = true, env = "PASSAGE_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest extracted text files into the index
    Ingest(IngestCommand),

    /// Query the index for relevant passages
    Query(QueryCommand),

    /// Show index statistics
    Stats(StatsCommand),

    /// Remove a document from the index
    Delete(DeleteCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?;
    let config = config.with_overrides(
        cli.workspace,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}/{}", config.provider, config.model);

    config.ensure_passage_dir()?;

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Query(_) => "query",
        Commands::Stats(_) => "stats",
        Commands::Delete(_) => "delete",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Query(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config),
        Commands::Delete(cmd) => cmd.execute(&config),
    };

    if let Err(ref e) = result {
        tracing::error!("Command failed: {}", e);
    }

    result
}
