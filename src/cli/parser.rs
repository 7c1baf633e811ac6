//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// govreporter: semantic search over US federal legal documents.
///
/// Ingests Supreme Court opinions and presidential executive orders into a
/// vector database and serves them to LLM clients over the Model Context
/// Protocol.
#[derive(Parser, Debug)]
#[command(name = "govreporter")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the MCP server on stdio.
    ///
    /// Reads JSON-RPC messages from stdin, writes responses to stdout.
    /// Logs go to stderr.
    #[command(after_help = r#"Examples:
  govreporter server                          # Start stdio MCP server
  OPENAI_API_KEY=sk-... govreporter server    # With embedding credentials
  govreporter server --log-level debug        # Verbose protocol logging
"#)]
    Server,

    /// Ingest documents into the vector store.
    #[command(subcommand)]
    Ingest(IngestCommands),

    /// Remove a collection (or all collections) from the vector store.
    #[command(after_help = r#"Examples:
  govreporter delete --collection court_opinions
  govreporter delete --all -y                 # No confirmation prompt
"#)]
    Delete {
        /// Collection to delete.
        #[arg(long, conflicts_with = "all")]
        collection: Option<String>,

        /// Delete every collection.
        #[arg(long)]
        all: bool,

        /// Skip confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Inspect stored state.
    #[command(subcommand)]
    Info(InfoCommands),

    /// One-shot semantic search from the command line (debug).
    #[command(after_help = r#"Examples:
  govreporter query "appropriations clause"
  govreporter query "AI safety reporting" --limit 3
"#)]
    Query {
        /// Search query text.
        text: String,

        /// Maximum number of results.
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

/// Ingestion subcommands, one per document type.
#[derive(Subcommand, Debug)]
pub enum IngestCommands {
    /// Ingest Supreme Court opinions from CourtListener.
    #[command(after_help = r#"Examples:
  govreporter ingest opinions --start-date 2024-01-01 --end-date 2024-01-31
  govreporter ingest opinions --start-date 2024-01-01 --end-date 2024-12-31 --batch-size 10
  govreporter ingest opinions --start-date 2024-01-01 --end-date 2024-01-31 --dry-run
"#)]
    Opinions(IngestArgs),

    /// Ingest executive orders from the Federal Register.
    #[command(after_help = r#"Examples:
  govreporter ingest orders --start-date 2025-01-20 --end-date 2025-03-01
  govreporter ingest orders --start-date 2025-01-20 --end-date 2025-03-01 --progress-db ./orders.db
"#)]
    Orders(IngestArgs),
}

/// Shared ingestion flags.
#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Earliest publication date, inclusive (YYYY-MM-DD).
    #[arg(long)]
    pub start_date: String,

    /// Latest publication date, inclusive (YYYY-MM-DD).
    #[arg(long)]
    pub end_date: String,

    /// Documents per pipeline batch.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Discover and report without fetching or writing.
    #[arg(long)]
    pub dry_run: bool,

    /// Path to the progress database for this document type.
    #[arg(long)]
    pub progress_db: Option<PathBuf>,

    /// Local vector-store data directory (accepted for compatibility; the
    /// Rust client talks to a running Qdrant instance instead).
    #[arg(long, env = "QDRANT_DB_PATH")]
    pub vector_db_path: Option<PathBuf>,
}

/// Inspection subcommands.
#[derive(Subcommand, Debug)]
pub enum InfoCommands {
    /// List collections and chunk counts.
    Collections,

    /// Show sample chunks from a collection.
    #[command(after_help = r#"Examples:
  govreporter info sample opinions
  govreporter info sample orders --limit 3 --show-text
"#)]
    Sample {
        /// Document type (opinions, orders).
        doc_type: String,

        /// Number of chunks to show.
        #[arg(long, default_value = "5")]
        limit: usize,

        /// Print the full chunk text instead of a preview.
        #[arg(long)]
        show_text: bool,
    },
}
