//! Vector store abstraction and the Qdrant adapter.
//!
//! The store holds one collection per document type (cosine distance, fixed
//! dimension). Only chunk payloads live here; full documents are re-fetched
//! from their authoritative sources on demand.

pub mod filter;
pub mod qdrant;

pub use filter::{Filter, Predicate};
pub use qdrant::QdrantStore;

use async_trait::async_trait;

use crate::document::ChunkPayload;
use crate::error::VectorStoreError;

/// A search hit: deterministic chunk id, cosine similarity, payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Deterministic chunk id (md5 hex).
    pub id: String,
    /// Cosine similarity score.
    pub score: f32,
    /// Stored payload.
    pub payload: ChunkPayload,
}

/// Summary of one collection for inventory listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    /// Collection name.
    pub name: String,
    /// Stored point count.
    pub count: u64,
    /// Vector dimension.
    pub dim: u64,
    /// Distance metric name.
    pub metric: String,
}

/// Outcome of a batch upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertReport {
    /// Payloads written.
    pub written: usize,
    /// Payloads skipped because their id already existed.
    pub skipped: usize,
    /// Per-payload error messages.
    pub errors: Vec<String>,
}

/// Progress callback for batch upserts: `(written_so_far, total)`.
pub type UpsertProgress<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// Vector database operations used by the pipeline and the MCP server.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the collection if absent (cosine distance); verifies the
    /// dimension if present.
    ///
    /// # Errors
    ///
    /// Returns [`VectorStoreError::DimensionMismatch`] when an existing
    /// collection has a different dimension — this is fatal.
    async fn ensure_collection(&self, name: &str, dim: u64) -> Result<(), VectorStoreError>;

    /// Whether a chunk id already exists in the collection.
    async fn exists(&self, collection: &str, chunk_id: &str) -> Result<bool, VectorStoreError>;

    /// Upserts payloads with precomputed vectors under deterministic ids.
    ///
    /// Atomic per payload, not across the batch; duplicates are skipped.
    /// `progress` is invoked as payloads are written.
    async fn batch_upsert(
        &self,
        collection: &str,
        items: Vec<(ChunkPayload, Vec<f32>)>,
        progress: Option<UpsertProgress<'_>>,
    ) -> Result<UpsertReport, VectorStoreError>;

    /// Top-`limit` cosine-similarity search, optionally filtered.
    async fn semantic_search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError>;

    /// Fetches a payload by chunk id.
    async fn get_by_id(
        &self,
        collection: &str,
        chunk_id: &str,
    ) -> Result<Option<ChunkPayload>, VectorStoreError>;

    /// Returns up to `limit` stored payloads without ranking (debug surface).
    async fn sample(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<ChunkPayload>, VectorStoreError>;

    /// Lists collections with counts and dimensions.
    async fn list_collections(&self) -> Result<Vec<CollectionSummary>, VectorStoreError>;

    /// Deletes a collection. Returns whether it existed.
    async fn delete_collection(&self, name: &str) -> Result<bool, VectorStoreError>;
}
