//! Resumable ingestion pipeline.
//!
//! Coordinates fetch → chunk → enrich → embed → upsert for one document
//! type with the guarantees the progress store makes durable:
//!
//! ```text
//! list_ids (date-ascending)
//!   ↓ per batch of batch_size documents
//! claim → fetch → chunk → enrich        (bounded worker pool)
//!   ↓ accumulate batch chunks
//! embed (one or more embedder batches)
//!   ↓
//! batch_upsert (single vector-store call)
//!   ↓ per document
//! complete / fail in the progress store
//! ```
//!
//! A failure at any stage routes only that document to `failed`; the batch
//! continues. Re-running the same command resumes: completed documents are
//! skipped without re-fetching, and the vector store's deterministic chunk
//! ids make re-upserts idempotent.

pub mod monitor;

pub use monitor::{IngestMonitor, MonitorSnapshot};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use futures_util::StreamExt;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::chunking::{Tokenizer, chunk_document};
use crate::config::{AppConfig, ChunkingConfig};
use crate::document::{ChunkPayload, Document, Enrichment, chunk_id};
use crate::embedding::Embedder;
use crate::enrich::Enricher;
use crate::error::Error;
use crate::fetch::DocumentFetcher;
use crate::progress::{DocumentStatus, ProgressStore};
use crate::vector::VectorStore;

/// Options for one ingestion run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Earliest publication date, inclusive.
    pub start: NaiveDate,
    /// Latest publication date, inclusive.
    pub end: NaiveDate,
    /// Documents per pipeline batch.
    pub batch_size: usize,
    /// Discover and report without fetching or writing.
    pub dry_run: bool,
}

/// End-of-run tally.
///
/// `completed + failed + duplicates + skipped == discovered` for every
/// finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Documents discovered in the date range.
    pub discovered: usize,
    /// Documents processed to completion this run.
    pub completed: usize,
    /// Documents that failed this run.
    pub failed: usize,
    /// Documents already present (progress store or vector store).
    pub duplicates: usize,
    /// Documents skipped because their claim was refused.
    pub skipped: usize,
    /// Chunks written to the vector store.
    pub chunks_written: usize,
}

/// Components the pipeline drives; the application wires these up and tests
/// swap in fakes.
pub struct PipelineDeps {
    /// Document source.
    pub fetcher: Arc<dyn DocumentFetcher>,
    /// Metadata enricher.
    pub enricher: Arc<Enricher>,
    /// Vector generator.
    pub embedder: Arc<Embedder>,
    /// Vector store.
    pub store: Arc<dyn VectorStore>,
    /// Progress store for this document type.
    pub progress: Arc<ProgressStore>,
    /// Shared tokenizer.
    pub tokenizer: Arc<Tokenizer>,
}

/// One document prepared for the batch flush.
struct PreparedDoc {
    id: String,
    payloads: Vec<ChunkPayload>,
    started: Instant,
}

/// Outcome of the per-document preparation stage.
enum PrepOutcome {
    Ready(Box<PreparedDoc>),
    Duplicate,
    ClaimSkipped,
    EmptyCompleted,
    Failed,
}

/// The ingestion pipeline for one document type.
pub struct IngestionPipeline {
    deps: PipelineDeps,
    chunking: ChunkingConfig,
    timeouts: crate::config::StageTimeouts,
    workers: usize,
    embedding_dim: u64,
}

impl IngestionPipeline {
    /// Creates a pipeline from its dependencies and configuration.
    #[must_use]
    pub fn new(deps: PipelineDeps, chunking: ChunkingConfig, config: &AppConfig) -> Self {
        Self {
            deps,
            chunking,
            timeouts: config.timeouts,
            workers: config.workers.max(1),
            embedding_dim: config.embedding_dim,
        }
    }

    /// Runs ingestion over the date range.
    ///
    /// `shutdown` flipping to `true` stops the pipeline from claiming new
    /// documents; the in-flight batch is flushed before returning.
    ///
    /// # Errors
    ///
    /// Returns an error only when the pipeline itself cannot run (discovery
    /// failure, collection mismatch, progress database loss). Per-document
    /// failures are recorded in the summary instead.
    pub async fn run(
        &self,
        options: &PipelineOptions,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<RunSummary, Error> {
        let doc_type = self.deps.fetcher.doc_type();
        let collection = doc_type.collection();
        self.deps
            .store
            .ensure_collection(collection, self.embedding_dim)
            .await?;

        let ids = self
            .deps
            .fetcher
            .list_ids(options.start, options.end)
            .await?;
        let discovered = ids.len();
        info!(
            source = self.deps.fetcher.name(),
            discovered,
            start = %options.start,
            end = %options.end,
            "discovered documents"
        );

        let mut summary = RunSummary {
            discovered,
            ..RunSummary::default()
        };

        if options.dry_run {
            for id in &ids {
                if self.is_duplicate(collection, id).await {
                    summary.duplicates += 1;
                } else {
                    info!(document_id = %id, "dry-run: would process");
                }
            }
            info!(
                discovered,
                duplicates = summary.duplicates,
                "dry-run complete; nothing written"
            );
            return Ok(summary);
        }

        let run_args = serde_json::json!({
            "source": self.deps.fetcher.name(),
            "start": options.start.to_string(),
            "end": options.end.to_string(),
            "batch_size": options.batch_size,
        })
        .to_string();
        let run_id = self.deps.progress.begin_run(&run_args)?;

        for id in &ids {
            self.deps.progress.mark_pending(id)?;
        }

        let monitor = IngestMonitor::new(discovered);
        let mut interrupted = false;

        for batch_ids in ids.chunks(options.batch_size.max(1)) {
            if *shutdown.borrow() {
                warn!("shutdown requested; not claiming further documents");
                interrupted = true;
                break;
            }

            let outcomes = self.prepare_batch(collection, batch_ids).await;
            let mut ready = Vec::new();
            for outcome in outcomes {
                match outcome {
                    PrepOutcome::Ready(doc) => ready.push(*doc),
                    PrepOutcome::Duplicate => {
                        summary.duplicates += 1;
                        monitor.record_skipped();
                    }
                    PrepOutcome::ClaimSkipped => {
                        summary.skipped += 1;
                        monitor.record_skipped();
                    }
                    PrepOutcome::EmptyCompleted => {
                        summary.completed += 1;
                        monitor.record_completed(Duration::ZERO);
                    }
                    PrepOutcome::Failed => {
                        summary.failed += 1;
                        monitor.record_failed();
                    }
                }
            }

            self.flush_batch(collection, ready, &monitor, &mut summary)
                .await;

            let snap = monitor.snapshot();
            info!(
                processed = snap.processed(),
                total = snap.total,
                completed = snap.completed,
                failed = snap.failed,
                skipped = snap.skipped,
                throughput_per_min = format!("{:.1}", snap.throughput_per_min),
                eta_secs = snap.eta.map(|d| d.as_secs()),
                "batch flushed"
            );
        }

        self.deps
            .progress
            .end_run(run_id, if interrupted { "interrupted" } else { "completed" })?;
        info!(
            discovered = summary.discovered,
            completed = summary.completed,
            failed = summary.failed,
            duplicates = summary.duplicates,
            skipped = summary.skipped,
            chunks_written = summary.chunks_written,
            "ingestion run finished"
        );
        Ok(summary)
    }

    /// Claim + fetch + chunk + enrich for one batch, bounded by the worker
    /// pool. Outcome order is not meaningful; completion order races.
    async fn prepare_batch(&self, collection: &str, batch_ids: &[String]) -> Vec<PrepOutcome> {
        futures_util::stream::iter(batch_ids.iter().cloned())
            .map(|id| self.prepare_one(collection, id))
            .buffer_unordered(self.workers)
            .collect()
            .await
    }

    async fn prepare_one(&self, collection: &str, id: String) -> PrepOutcome {
        let started = Instant::now();
        let progress = &self.deps.progress;

        let prior = match progress.status(&id) {
            Ok(status) => status,
            Err(e) => return self.record_failure(&id, "claim", &e.to_string()),
        };
        if prior == Some(DocumentStatus::Completed) {
            return PrepOutcome::Duplicate;
        }
        match progress.claim(&id) {
            Ok(true) => {}
            Ok(false) => return PrepOutcome::ClaimSkipped,
            Err(e) => return self.record_failure(&id, "claim", &e.to_string()),
        }

        // A reclaimed failure reprocesses unconditionally so zero-vector
        // chunks from a previous attempt get overwritten.
        let fresh = prior != Some(DocumentStatus::Failed);
        if fresh && self.store_has_first_chunk(collection, &id).await {
            if let Err(e) = progress.complete(&id, started.elapsed()) {
                return self.record_failure(&id, "claim", &e.to_string());
            }
            info!(document_id = %id, "already stored; marked completed");
            return PrepOutcome::Duplicate;
        }

        let doc = match tokio::time::timeout(self.timeouts.fetch, self.deps.fetcher.fetch(&id))
            .await
        {
            Ok(Ok(doc)) => doc,
            Ok(Err(e)) => return self.record_failure(&id, "fetch", &e.to_string()),
            Err(_) => {
                return self.record_failure(
                    &id,
                    "fetch",
                    &format!("deadline {}s elapsed", self.timeouts.fetch.as_secs()),
                );
            }
        };

        let chunks = {
            let tokenizer = Arc::clone(&self.deps.tokenizer);
            let chunking = self.chunking;
            let text = doc.text.clone();
            let doc_type = doc.doc_type;
            match tokio::task::spawn_blocking(move || {
                chunk_document(doc_type, &text, &chunking, &tokenizer)
            })
            .await
            {
                Ok(chunks) => chunks,
                Err(e) => return self.record_failure(&id, "chunk", &e.to_string()),
            }
        };

        if chunks.is_empty() {
            return match progress.complete(&id, started.elapsed()) {
                Ok(()) => {
                    info!(document_id = %id, "no chunkable text; completed with zero chunks");
                    PrepOutcome::EmptyCompleted
                }
                Err(e) => self.record_failure(&id, "chunk", &e.to_string()),
            };
        }

        let enrichment = match tokio::time::timeout(
            self.timeouts.enrich,
            self.deps.enricher.enrich(&doc),
        )
        .await
        {
            Ok(enrichment) => enrichment,
            Err(_) => {
                warn!(document_id = %id, "enrichment deadline elapsed; proceeding with empty record");
                Enrichment::empty(doc.doc_type)
            }
        };

        let payloads = build_payloads(&doc, &chunks, &enrichment);
        PrepOutcome::Ready(Box::new(PreparedDoc {
            id,
            payloads,
            started,
        }))
    }

    /// Embed the accumulated batch and upsert it in a single store call,
    /// then settle each document's terminal state.
    async fn flush_batch(
        &self,
        collection: &str,
        ready: Vec<PreparedDoc>,
        monitor: &IngestMonitor,
        summary: &mut RunSummary,
    ) {
        if ready.is_empty() {
            return;
        }

        let texts: Vec<String> = ready
            .iter()
            .flat_map(|doc| doc.payloads.iter().map(|p| p.text().to_string()))
            .collect();

        let outcome = match tokio::time::timeout(
            self.timeouts.embed,
            self.deps.embedder.embed_all(&texts),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                let message = format!("deadline {}s elapsed", self.timeouts.embed.as_secs());
                for doc in &ready {
                    self.record_failure(&doc.id, "embed", &message);
                    summary.failed += 1;
                    monitor.record_failed();
                }
                return;
            }
        };

        // Map zero-vector indices back to their documents.
        let mut owner_of_index = Vec::with_capacity(texts.len());
        for doc in &ready {
            for _ in &doc.payloads {
                owner_of_index.push(doc.id.clone());
            }
        }
        let zero_vector_docs: HashSet<&str> = outcome
            .failed_indices
            .iter()
            .filter_map(|&i| owner_of_index.get(i).map(String::as_str))
            .collect();

        let items: Vec<(ChunkPayload, Vec<f32>)> = ready
            .iter()
            .flat_map(|doc| doc.payloads.iter().cloned())
            .zip(outcome.vectors)
            .collect();

        let report = match tokio::time::timeout(
            self.timeouts.upsert,
            self.deps.store.batch_upsert(collection, items, None),
        )
        .await
        {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                let message = e.to_string();
                for doc in &ready {
                    self.record_failure(&doc.id, "upsert", &message);
                    summary.failed += 1;
                    monitor.record_failed();
                }
                return;
            }
            Err(_) => {
                let message = format!("deadline {}s elapsed", self.timeouts.upsert.as_secs());
                for doc in &ready {
                    self.record_failure(&doc.id, "upsert", &message);
                    summary.failed += 1;
                    monitor.record_failed();
                }
                return;
            }
        };

        // Chunk ids whose individual writes failed, normalized to hex.
        let errored_chunks: HashSet<String> = report
            .errors
            .iter()
            .filter_map(|e| e.split(':').next())
            .map(|key| key.trim().replace('-', ""))
            .collect();

        for doc in ready {
            let zero_vectors = zero_vector_docs.contains(doc.id.as_str());
            let write_failed = doc
                .payloads
                .iter()
                .any(|p| errored_chunks.contains(p.chunk_id()));

            if zero_vectors {
                let n = doc.payloads.len();
                self.record_failure(
                    &doc.id,
                    "embed",
                    &format!("zero vectors stored for some of {n} chunks; pending re-embed"),
                );
                summary.failed += 1;
                monitor.record_failed();
            } else if write_failed {
                self.record_failure(&doc.id, "upsert", "one or more chunk writes failed");
                summary.failed += 1;
                monitor.record_failed();
            } else {
                match self.deps.progress.complete(&doc.id, doc.started.elapsed()) {
                    Ok(()) => {
                        summary.completed += 1;
                        summary.chunks_written += doc.payloads.len();
                        monitor.record_completed(doc.started.elapsed());
                    }
                    Err(e) => {
                        self.record_failure(&doc.id, "complete", &e.to_string());
                        summary.failed += 1;
                        monitor.record_failed();
                    }
                }
            }
        }
    }

    /// Marks a failure in the progress store and emits the per-document log
    /// line (document id, stage, reason).
    fn record_failure(&self, id: &str, stage: &'static str, message: &str) -> PrepOutcome {
        warn!(document_id = %id, stage, reason = %message, "document failed");
        if let Err(e) = self.deps.progress.fail(id, &format!("{stage}: {message}")) {
            warn!(document_id = %id, error = %e, "could not record failure");
        }
        PrepOutcome::Failed
    }

    async fn is_duplicate(&self, collection: &str, id: &str) -> bool {
        self.deps.progress.is_completed(id).unwrap_or(false)
            || self.store_has_first_chunk(collection, id).await
    }

    async fn store_has_first_chunk(&self, collection: &str, id: &str) -> bool {
        self.deps
            .store
            .exists(collection, &chunk_id(id, 0))
            .await
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("workers", &self.workers)
            .field("embedding_dim", &self.embedding_dim)
            .finish_non_exhaustive()
    }
}

/// Builds persisted payloads for every chunk of a document.
fn build_payloads(doc: &Document, chunks: &[crate::document::Chunk], enrichment: &Enrichment) -> Vec<ChunkPayload> {
    chunks
        .iter()
        .map(|chunk| ChunkPayload::build(doc, chunk, enrichment))
        .collect()
}
