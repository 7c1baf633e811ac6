//! Qdrant adapter for the [`VectorStore`] trait.
//!
//! Point ids: Qdrant accepts integers or UUIDs, so the md5 chunk id is
//! stored in UUID formatting (same 16 bytes, dashed). The hex form lives in
//! the payload's `chunk_id` field and is what every public API speaks.
//!
//! Date filters: ISO dates in payloads are shadowed by the integer
//! `date_num` field (`YYYYMMDD`), and [`Predicate::DateRange`] translates
//! to a numeric range condition on it.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter as QdrantFilter, GetPointsBuilder,
    PointId, PointStruct, Range, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder, point_id::PointIdOptions,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{debug, info};

use super::filter::{Filter, Predicate};
use super::{CollectionSummary, ScoredChunk, UpsertProgress, UpsertReport, VectorStore};
use crate::config::AppConfig;
use crate::document::{ChunkPayload, date_num};
use crate::error::VectorStoreError;

/// Qdrant-backed vector store.
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Connects to Qdrant using the application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VectorStoreError::Backend`] when the client cannot be built.
    pub fn connect(config: &AppConfig) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.qdrant_url());
        if let Some(ref key) = config.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder.build().map_err(backend)?;
        Ok(Self { client })
    }

    /// Wraps an already-built client (used by tests with a local instance).
    #[must_use]
    pub const fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    /// Reads the configured vector dimension of an existing collection.
    async fn collection_dim(&self, name: &str) -> Result<Option<u64>, VectorStoreError> {
        use qdrant_client::qdrant::vectors_config::Config;
        let info = self.client.collection_info(name).await.map_err(backend)?;
        let dim = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|c| match c {
                Config::Params(params) => Some(params.size),
                Config::ParamsMap(_) => None,
            });
        Ok(dim)
    }

    /// Point count of a collection.
    async fn collection_count(&self, name: &str) -> Result<u64, VectorStoreError> {
        let info = self.client.collection_info(name).await.map_err(backend)?;
        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }

    /// Which of the given point uuids already exist.
    async fn existing_ids(
        &self,
        collection: &str,
        uuids: &[String],
    ) -> Result<std::collections::HashSet<String>, VectorStoreError> {
        if uuids.is_empty() {
            return Ok(std::collections::HashSet::new());
        }
        let ids: Vec<PointId> = uuids.iter().map(|u| PointId::from(u.clone())).collect();
        let response = self
            .client
            .get_points(GetPointsBuilder::new(collection, ids))
            .await
            .map_err(backend)?;
        Ok(response
            .result
            .into_iter()
            .filter_map(|p| p.id.and_then(point_id_string))
            .collect())
    }
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, name: &str, dim: u64) -> Result<(), VectorStoreError> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(backend)?;
        if exists {
            if let Some(actual) = self.collection_dim(name).await?
                && actual != dim
            {
                return Err(VectorStoreError::DimensionMismatch {
                    collection: name.to_string(),
                    actual,
                    expected: dim,
                });
            }
            debug!(collection = name, "collection already present");
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dim, Distance::Cosine)),
            )
            .await
            .map_err(backend)?;
        info!(collection = name, dim, "created collection");
        Ok(())
    }

    async fn exists(&self, collection: &str, chunk_id: &str) -> Result<bool, VectorStoreError> {
        let uuid = hex_to_uuid(chunk_id);
        let existing = self.existing_ids(collection, &[uuid]).await?;
        Ok(!existing.is_empty())
    }

    async fn batch_upsert(
        &self,
        collection: &str,
        items: Vec<(ChunkPayload, Vec<f32>)>,
        progress: Option<UpsertProgress<'_>>,
    ) -> Result<UpsertReport, VectorStoreError> {
        let total = items.len();
        let mut report = UpsertReport::default();
        if items.is_empty() {
            return Ok(report);
        }

        let uuids: Vec<String> = items
            .iter()
            .map(|(p, _)| hex_to_uuid(p.chunk_id()))
            .collect();

        // Dedupe within the request; ids already in the store are simply
        // overwritten with identical content (deterministic ids make the
        // write idempotent), which also lets a retry replace zero vectors.
        let mut seen = std::collections::HashSet::new();
        let mut points: Vec<PointStruct> = Vec::new();
        for ((payload, vector), uuid) in items.into_iter().zip(uuids) {
            if !seen.insert(uuid.clone()) {
                report.skipped += 1;
                continue;
            }
            match to_qdrant_payload(&payload) {
                Ok(qdrant_payload) => {
                    points.push(PointStruct::new(uuid, vector, qdrant_payload));
                }
                Err(e) => report
                    .errors
                    .push(format!("{}: {e}", payload.chunk_id())),
            }
        }

        if points.is_empty() {
            if let Some(cb) = progress {
                cb(0, total);
            }
            return Ok(report);
        }

        match self
            .client
            .upsert_points(UpsertPointsBuilder::new(collection, points.clone()).wait(true))
            .await
        {
            Ok(_) => {
                report.written = points.len();
                if let Some(cb) = progress {
                    cb(report.written, total);
                }
            }
            Err(batch_err) => {
                // Batch write failed; retry point by point so one bad payload
                // cannot sink the rest. Each point write is atomic.
                debug!(error = %batch_err, "batch upsert failed; retrying per point");
                for point in points {
                    let outcome = self
                        .client
                        .upsert_points(
                            UpsertPointsBuilder::new(collection, vec![point.clone()]).wait(true),
                        )
                        .await;
                    match outcome {
                        Ok(_) => report.written += 1,
                        Err(e) => {
                            let id = point
                                .id
                                .clone()
                                .and_then(point_id_string)
                                .unwrap_or_default();
                            report.errors.push(format!("{id}: {e}"));
                        }
                    }
                    if let Some(cb) = progress {
                        cb(report.written, total);
                    }
                }
            }
        }
        Ok(report)
    }

    async fn semantic_search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let mut builder =
            SearchPointsBuilder::new(collection, vector, limit as u64).with_payload(true);
        if let Some(f) = filter.filter(|f| !f.is_empty()) {
            builder = builder.filter(translate_filter(f));
        }
        let response = self.client.search_points(builder).await.map_err(backend)?;

        let mut hits = Vec::with_capacity(response.result.len());
        for point in response.result {
            let payload = payload_from_map(point.payload)?;
            hits.push(ScoredChunk {
                id: payload.chunk_id().to_string(),
                score: point.score,
                payload,
            });
        }
        Ok(hits)
    }

    async fn get_by_id(
        &self,
        collection: &str,
        chunk_id: &str,
    ) -> Result<Option<ChunkPayload>, VectorStoreError> {
        let uuid = hex_to_uuid(chunk_id);
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(collection, vec![PointId::from(uuid)]).with_payload(true),
            )
            .await
            .map_err(backend)?;
        response
            .result
            .into_iter()
            .next()
            .map(|p| payload_from_map(p.payload))
            .transpose()
    }

    async fn sample(
        &self,
        collection: &str,
        limit: usize,
    ) -> Result<Vec<ChunkPayload>, VectorStoreError> {
        #[allow(clippy::cast_possible_truncation)]
        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(collection)
                    .limit(limit as u32)
                    .with_payload(true),
            )
            .await
            .map_err(backend)?;
        response
            .result
            .into_iter()
            .map(|p| payload_from_map(p.payload))
            .collect()
    }

    async fn list_collections(&self) -> Result<Vec<CollectionSummary>, VectorStoreError> {
        let response = self.client.list_collections().await.map_err(backend)?;
        let mut summaries = Vec::new();
        for description in response.collections {
            let name = description.name;
            let count = self.collection_count(&name).await?;
            let dim = self.collection_dim(&name).await?.unwrap_or(0);
            summaries.push(CollectionSummary {
                name,
                count,
                dim,
                metric: "cosine".to_string(),
            });
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, VectorStoreError> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(backend)?;
        if !exists {
            return Ok(false);
        }
        self.client.delete_collection(name).await.map_err(backend)?;
        info!(collection = name, "deleted collection");
        Ok(true)
    }
}

fn backend(e: impl std::fmt::Display) -> VectorStoreError {
    VectorStoreError::Backend {
        message: e.to_string(),
    }
}

/// Reformats a 32-char md5 hex id as a dashed UUID. Ids of any other shape
/// pass through unchanged and rely on Qdrant's own validation.
fn hex_to_uuid(hex: &str) -> String {
    if hex.len() != 32 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return hex.to_string();
    }
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Extracts the string form of a point id.
fn point_id_string(id: PointId) -> Option<String> {
    match id.point_id_options {
        Some(PointIdOptions::Uuid(uuid)) => Some(uuid),
        Some(PointIdOptions::Num(n)) => Some(n.to_string()),
        None => None,
    }
}

/// Serializes a [`ChunkPayload`] into a Qdrant payload map.
fn to_qdrant_payload(payload: &ChunkPayload) -> Result<Payload, VectorStoreError> {
    let json = serde_json::to_value(payload)?;
    Payload::try_from(json).map_err(backend)
}

/// Rebuilds a [`ChunkPayload`] from a stored payload map.
fn payload_from_map(
    map: std::collections::HashMap<String, qdrant_client::qdrant::Value>,
) -> Result<ChunkPayload, VectorStoreError> {
    let object: serde_json::Map<String, serde_json::Value> = map
        .into_iter()
        .map(|(k, v)| (k, v.into_json()))
        .collect();
    Ok(serde_json::from_value(serde_json::Value::Object(object))?)
}

/// Translates the typed filter AST into a Qdrant filter.
fn translate_filter(filter: &Filter) -> QdrantFilter {
    let mut conditions: Vec<Condition> = Vec::new();
    for predicate in &filter.predicates {
        match predicate {
            Predicate::Eq { field, value } => {
                conditions.push(Condition::matches(field.clone(), value.clone()));
            }
            Predicate::AnyOf { field, values } => {
                conditions.push(Condition::matches(field.clone(), values.clone()));
            }
            Predicate::DateRange { from, to } => {
                #[allow(clippy::cast_precision_loss)]
                conditions.push(Condition::range(
                    "date_num",
                    Range {
                        gte: from.map(|d| date_num(d) as f64),
                        lte: to.map(|d| date_num(d) as f64),
                        gt: None,
                        lt: None,
                    },
                ));
            }
        }
    }
    QdrantFilter::must(conditions)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::document::chunk_id;

    #[test]
    fn test_hex_to_uuid() {
        let hex = chunk_id("doc-1", 0);
        let uuid = hex_to_uuid(&hex);
        assert_eq!(uuid.len(), 36);
        assert_eq!(uuid.replace('-', ""), hex);
        // Non-hex ids pass through
        assert_eq!(hex_to_uuid("not-an-id"), "not-an-id");
    }

    #[test]
    fn test_translate_filter_conditions() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 1);
        let to = NaiveDate::from_ymd_opt(2024, 12, 31);
        let filter = Filter::new()
            .eq("opinion_type", "majority")
            .any_of(
                "agencies",
                vec!["EPA".to_string(), "DOE".to_string()],
            )
            .date_range(from, to);
        let translated = translate_filter(&filter);
        assert_eq!(translated.must.len(), 3);
    }

    #[test]
    fn test_empty_filter_translates_to_no_conditions() {
        let translated = translate_filter(&Filter::new());
        assert!(translated.must.is_empty());
    }
}
