//! govreporter: semantic search over US federal legal documents.
//!
//! Indexes Supreme Court opinions (CourtListener) and presidential
//! executive orders (Federal Register) into a vector database and serves
//! them to LLM clients through a Model Context Protocol server.
//!
//! # Architecture
//!
//! ```text
//! Ingestion (per document type):
//!   fetch (rate-limited, retrying)
//!     → chunk (structure-aware, token-budgeted sliding windows)
//!     → enrich (LLM metadata, substring-validated)
//!     → embed (batched, backoff, zero-vector quarantine)
//!     → upsert (deterministic ids → idempotent)
//!   with a SQLite progress store making the whole run resumable.
//!
//! Serving:
//!   MCP stdio server → typed tools (filtered vector search, shaped text)
//!                    → resources opinion://{id}, order://{document_number}
//!                      (always fetched fresh from the source)
//! ```
//!
//! The [`app::Application`] struct owns the wiring; the CLI in [`cli`]
//! drives ingestion and serving.

pub mod app;
pub mod chunking;
pub mod citation;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod llm;
pub mod mcp;
pub mod pipeline;
pub mod progress;
pub mod query;
pub mod vector;

pub use app::Application;
pub use config::{AppConfig, ChunkingConfig};
pub use document::{Chunk, ChunkPayload, Document, DocumentType};
pub use error::{Error, Result};
pub use pipeline::{IngestionPipeline, PipelineOptions, RunSummary};
