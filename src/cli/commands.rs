//! CLI command implementations.
//!
//! Contains the business logic for each CLI command. Commands return their
//! user-facing output as a string; `main` prints it and maps errors to exit
//! codes (0 success, 1 user error, 2 configuration error, 3 runtime
//! failure, 130 interrupted).

#![allow(clippy::format_push_string)]

use std::fmt::Write as FmtWrite;
use std::io::{BufRead, Write as IoWrite};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::app::Application;
use crate::cli::parser::{Cli, Commands, InfoCommands, IngestArgs, IngestCommands};
use crate::config::AppConfig;
use crate::document::{ChunkPayload, DocumentType};
use crate::error::{CommandError, ConfigError, Error, Result};
use crate::mcp::GovMcpServer;
use crate::pipeline::{PipelineOptions, RunSummary};
use crate::progress::ProgressStore;
use crate::query::{shape_collections, shape_search_results, shape_single};
use crate::vector::{QdrantStore, VectorStore};

/// Grace period for in-flight MCP requests after a termination signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error whose [`Error::exit_code`] the binary maps to the
/// process exit status.
pub async fn execute(cli: &Cli) -> Result<String> {
    match &cli.command {
        Commands::Server => cmd_server().await,
        Commands::Ingest(IngestCommands::Opinions(args)) => {
            cmd_ingest(DocumentType::CourtOpinion, args).await
        }
        Commands::Ingest(IngestCommands::Orders(args)) => {
            cmd_ingest(DocumentType::ExecutiveOrder, args).await
        }
        Commands::Delete {
            collection,
            all,
            yes,
        } => cmd_delete(collection.as_deref(), *all, *yes).await,
        Commands::Info(InfoCommands::Collections) => cmd_info_collections().await,
        Commands::Info(InfoCommands::Sample {
            doc_type,
            limit,
            show_text,
        }) => cmd_info_sample(doc_type, *limit, *show_text).await,
        Commands::Query { text, limit } => cmd_query(text, *limit).await,
    }
}

// ── Server ──────────────────────────────────────────────────

async fn cmd_server() -> Result<String> {
    let app = Arc::new(Application::from_config(AppConfig::from_env())?);
    let server = GovMcpServer::new(app);

    let serve = crate::mcp::serve_stdio(server);
    tokio::pin!(serve);
    tokio::select! {
        result = &mut serve => {
            result.map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "termination signal; draining in-flight requests"
            );
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, &mut serve).await;
            return Err(Error::Interrupted);
        }
    }
    Ok(String::new())
}

// ── Ingestion ───────────────────────────────────────────────

async fn cmd_ingest(doc_type: DocumentType, args: &IngestArgs) -> Result<String> {
    let start = parse_date(&args.start_date)?;
    let end = parse_date(&args.end_date)?;
    if start > end {
        return Err(ConfigError::InvalidDateRange {
            start: args.start_date.clone(),
            end: args.end_date.clone(),
        }
        .into());
    }
    if args.vector_db_path.is_some() {
        warn!(
            "--vector-db-path is accepted for compatibility but unused; \
             configure QDRANT_HOST/QDRANT_PORT to reach a running instance"
        );
    }

    let app = Application::from_config(AppConfig::from_env())?;
    let progress_path = args
        .progress_db
        .clone()
        .unwrap_or_else(|| default_progress_path(doc_type));
    let progress = Arc::new(ProgressStore::open(
        &progress_path,
        app.config.stale_claim_after,
        app.config.retry_budget,
    )?);
    let pipeline = app.pipeline(doc_type, progress)?;

    let options = PipelineOptions {
        start,
        end,
        batch_size: args.batch_size.unwrap_or(app.config.pipeline_batch_size),
        dry_run: args.dry_run,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let summary = pipeline.run(&options, &shutdown_rx).await?;
    if *shutdown_rx.borrow() {
        return Err(Error::Interrupted);
    }
    Ok(format_summary(doc_type, &options, &summary))
}

fn default_progress_path(doc_type: DocumentType) -> PathBuf {
    PathBuf::from(".govreporter").join(format!("{}_progress.db", doc_type.as_str()))
}

fn format_summary(
    doc_type: DocumentType,
    options: &PipelineOptions,
    summary: &RunSummary,
) -> String {
    let mut out = format!(
        "Ingestion summary ({} {}..{}){}\n",
        doc_type.as_str(),
        options.start,
        options.end,
        if options.dry_run { " [dry run]" } else { "" },
    );
    let _ = writeln!(out, "  discovered:     {}", summary.discovered);
    let _ = writeln!(out, "  completed:      {}", summary.completed);
    let _ = writeln!(out, "  failed:         {}", summary.failed);
    let _ = writeln!(out, "  duplicates:     {}", summary.duplicates);
    let _ = writeln!(out, "  skipped:        {}", summary.skipped);
    let _ = writeln!(out, "  chunks written: {}", summary.chunks_written);
    out
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ConfigError::InvalidDate {
            value: value.to_string(),
        }
        .into()
    })
}

// ── Collection management ───────────────────────────────────

async fn cmd_delete(collection: Option<&str>, all: bool, yes: bool) -> Result<String> {
    let store = QdrantStore::connect(&AppConfig::from_env())?;

    let targets: Vec<String> = if all {
        store
            .list_collections()
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect()
    } else {
        let name = collection.ok_or_else(|| {
            CommandError::InvalidArguments("either --collection NAME or --all is required".into())
        })?;
        vec![name.to_string()]
    };

    if targets.is_empty() {
        return Ok("No collections to delete.".to_string());
    }

    if !yes {
        let prompt = format!("Delete collection(s) {}? This cannot be undone.", targets.join(", "));
        if !confirm(&prompt)? {
            return Err(CommandError::Aborted("deletion not confirmed".into()).into());
        }
    }

    let mut out = String::new();
    for name in &targets {
        let deleted = store.delete_collection(name).await?;
        let _ = writeln!(
            out,
            "{}: {}",
            name,
            if deleted { "deleted" } else { "not found" }
        );
    }
    Ok(out)
}

/// Reads a y/N confirmation from stdin. The prompt goes to stderr so
/// scripted stdout stays clean.
fn confirm(prompt: &str) -> Result<bool> {
    #[allow(clippy::print_stderr)]
    {
        eprint!("{prompt} [y/N] ");
    }
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes" | "YES"))
}

// ── Inspection ──────────────────────────────────────────────

async fn cmd_info_collections() -> Result<String> {
    let store = QdrantStore::connect(&AppConfig::from_env())?;
    let collections = store.list_collections().await?;
    Ok(shape_collections(&collections))
}

async fn cmd_info_sample(doc_type: &str, limit: usize, show_text: bool) -> Result<String> {
    let doc_type = DocumentType::parse(doc_type).ok_or_else(|| {
        CommandError::InvalidArguments(format!(
            "unknown document type {doc_type:?}; expected opinions or orders"
        ))
    })?;
    let store = QdrantStore::connect(&AppConfig::from_env())?;
    let payloads = store.sample(doc_type.collection(), limit.max(1)).await?;

    if payloads.is_empty() {
        return Ok(format!("Collection {} is empty.", doc_type.collection()));
    }

    let mut out = String::new();
    for payload in &payloads {
        if show_text {
            out.push_str(&shape_single(payload));
            out.push('\n');
        } else {
            let _ = writeln!(out, "{}", sample_line(payload));
        }
    }
    Ok(out)
}

fn sample_line(payload: &ChunkPayload) -> String {
    let preview: String = payload.text().chars().take(120).collect();
    format!(
        "{} · chunk {} · {}",
        payload.chunk_id(),
        payload.chunk_index(),
        preview.replace('\n', " ")
    )
}

// ── One-shot query ──────────────────────────────────────────

async fn cmd_query(text: &str, limit: usize) -> Result<String> {
    if text.trim().is_empty() {
        return Err(CommandError::InvalidArguments("query cannot be empty".into()).into());
    }
    let app = Application::from_config(AppConfig::from_env())?;
    let vector = app.embed_query(text).await?;

    let limit = limit.clamp(1, app.config.max_search_limit);
    let mut hits = Vec::new();
    for doc_type in [DocumentType::CourtOpinion, DocumentType::ExecutiveOrder] {
        hits.extend(
            app.store
                .semantic_search(doc_type.collection(), vector.clone(), limit, None)
                .await?,
        );
    }
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(limit);

    Ok(shape_search_results(text, &hits, &app.shaper_config()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2024-01-31").is_ok());
        let err = parse_date("01/31/2024").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_default_progress_path_per_type() {
        let opinions = default_progress_path(DocumentType::CourtOpinion);
        let orders = default_progress_path(DocumentType::ExecutiveOrder);
        assert_ne!(opinions, orders);
        assert!(opinions.to_string_lossy().contains("court_opinion"));
    }

    #[test]
    fn test_format_summary_accounts_for_everything() {
        let options = PipelineOptions {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap_or_default(),
            batch_size: 25,
            dry_run: false,
        };
        let summary = RunSummary {
            discovered: 5,
            completed: 3,
            failed: 1,
            duplicates: 1,
            skipped: 0,
            chunks_written: 42,
        };
        let text = format_summary(DocumentType::CourtOpinion, &options, &summary);
        assert!(text.contains("discovered:     5"));
        assert!(text.contains("chunks written: 42"));
    }
}
