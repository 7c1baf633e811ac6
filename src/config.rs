//! Application configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.
//! Credentials are validated lazily by the component that needs them, so the
//! MCP server can start without a CourtListener token and ingestion can run
//! without MCP tuning vars.

use std::time::Duration;

use crate::document::DocumentType;
use crate::error::ConfigError;

/// Default embedding model. Must stay aligned with [`DEFAULT_EMBEDDING_DIM`].
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Vector dimension of the default embedding model.
pub const DEFAULT_EMBEDDING_DIM: u64 = 1536;
/// Default model for document-level metadata extraction.
const DEFAULT_ENRICHMENT_MODEL: &str = "gpt-5-mini-2025-08-07";
/// Default texts per embedding batch.
const DEFAULT_EMBED_BATCH_SIZE: usize = 100;
/// Default documents per pipeline batch.
const DEFAULT_PIPELINE_BATCH_SIZE: usize = 25;
/// Default pipeline worker pool size.
const DEFAULT_WORKERS: usize = 4;
/// Default retry attempts for transient upstream failures.
const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default retry budget per document before `claim` stops reclaiming it.
const DEFAULT_RETRY_BUDGET: u32 = 3;
/// Default stale-claim reclaim threshold in seconds.
const DEFAULT_STALE_CLAIM_SECS: u64 = 600;
/// Default per-hit character ceiling in shaped search results.
const DEFAULT_CHUNK_CHAR_CEILING: usize = 2000;
/// Default similarity threshold for the full-document hint.
const DEFAULT_HINT_SCORE_THRESHOLD: f32 = 0.4;
/// Default maximum hit count for the full-document hint.
const DEFAULT_HINT_MAX_HITS: usize = 3;
/// Default search result limit for MCP tools.
const DEFAULT_SEARCH_LIMIT: usize = 10;
/// Default cap on MCP search limits.
const DEFAULT_MAX_SEARCH_LIMIT: usize = 50;

/// Per-stage deadlines for the pipeline's external calls.
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    /// Deadline for a single document fetch.
    pub fetch: Duration,
    /// Deadline for the enrichment LLM call.
    pub enrich: Duration,
    /// Deadline for one embedding batch.
    pub embed: Duration,
    /// Deadline for one vector-store write.
    pub upsert: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(30),
            enrich: Duration::from_secs(60),
            embed: Duration::from_secs(60),
            upsert: Duration::from_secs(30),
        }
    }
}

/// Token budget for one document type's chunker.
///
/// Invariant: `0 < min_tokens <= target_tokens <= max_tokens` and
/// `0 <= overlap_ratio < 1`, enforced by [`ChunkingConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkingConfig {
    /// Minimum tokens per chunk (tail chunks may fall below, see merge rule).
    pub min_tokens: usize,
    /// Preferred chunk size; emission starts once this is reached.
    pub target_tokens: usize,
    /// Hard ceiling per chunk.
    pub max_tokens: usize,
    /// Fraction of `target_tokens` carried over as the overlap tail.
    pub overlap_ratio: f32,
}

impl ChunkingConfig {
    /// Default budget for Supreme Court opinions.
    #[must_use]
    pub const fn opinions() -> Self {
        Self {
            min_tokens: 500,
            target_tokens: 600,
            max_tokens: 800,
            overlap_ratio: 0.15,
        }
    }

    /// Default budget for executive orders.
    #[must_use]
    pub const fn orders() -> Self {
        Self {
            min_tokens: 240,
            target_tokens: 340,
            max_tokens: 400,
            overlap_ratio: 0.10,
        }
    }

    /// Overlap tail length in tokens: `round(overlap_ratio × target_tokens)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn overlap_tokens(&self) -> usize {
        (self.overlap_ratio * self.target_tokens as f32).round() as usize
    }

    /// Validates the token-budget invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidChunkingConfig`] or
    /// [`ConfigError::InvalidOverlapRatio`] when an invariant is violated.
    pub fn validate(&self, doc_type: &'static str) -> Result<(), ConfigError> {
        if self.min_tokens == 0
            || self.min_tokens > self.target_tokens
            || self.target_tokens > self.max_tokens
        {
            return Err(ConfigError::InvalidChunkingConfig {
                doc_type,
                min: self.min_tokens,
                target: self.target_tokens,
                max: self.max_tokens,
            });
        }
        if !(0.0..1.0).contains(&self.overlap_ratio) {
            return Err(ConfigError::InvalidOverlapRatio(self.overlap_ratio));
        }
        Ok(())
    }

    /// Applies `RAG_{PREFIX}_{FIELD}_TOKENS` / `RAG_{PREFIX}_OVERLAP_RATIO`
    /// environment overrides on top of self.
    fn with_env_overrides(mut self, prefix: &str) -> Self {
        if let Some(v) = env_parse(&format!("RAG_{prefix}_MIN_TOKENS")) {
            self.min_tokens = v;
        }
        if let Some(v) = env_parse(&format!("RAG_{prefix}_TARGET_TOKENS")) {
            self.target_tokens = v;
        }
        if let Some(v) = env_parse(&format!("RAG_{prefix}_MAX_TOKENS")) {
            self.max_tokens = v;
        }
        if let Some(v) = env_parse::<f32>(&format!("RAG_{prefix}_OVERLAP_RATIO")) {
            self.overlap_ratio = v;
        }
        self
    }

    /// Resolves the budget for a document type from defaults + env overrides.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the resolved values violate the invariants.
    pub fn resolve(doc_type: DocumentType) -> Result<Self, ConfigError> {
        let config = match doc_type {
            DocumentType::CourtOpinion => Self::opinions().with_env_overrides("OPINION"),
            DocumentType::ExecutiveOrder => Self::orders().with_env_overrides("ORDER"),
        };
        config.validate(doc_type.as_str())?;
        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// OpenAI-compatible API key for embeddings and enrichment.
    pub openai_api_key: Option<String>,
    /// Optional base URL override for the OpenAI-compatible API.
    pub openai_base_url: Option<String>,
    /// CourtListener API token (required only for opinion ingestion and
    /// `opinion://` resources).
    pub court_listener_token: Option<String>,
    /// Qdrant host.
    pub qdrant_host: String,
    /// Qdrant gRPC port.
    pub qdrant_port: u16,
    /// Optional Qdrant API key.
    pub qdrant_api_key: Option<String>,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Vector dimension the collections are created with.
    pub embedding_dim: u64,
    /// Model for document-level metadata extraction.
    pub enrichment_model: String,
    /// Texts per embedding request.
    pub embed_batch_size: usize,
    /// Documents per pipeline batch.
    pub pipeline_batch_size: usize,
    /// Pipeline worker pool size.
    pub workers: usize,
    /// Retry attempts for transient upstream failures.
    pub max_retries: u32,
    /// Per-document retry budget in the progress store.
    pub retry_budget: u32,
    /// Stale-claim reclaim threshold.
    pub stale_claim_after: Duration,
    /// Per-stage deadlines.
    pub timeouts: StageTimeouts,
    /// Per-hit character ceiling in shaped results.
    pub chunk_char_ceiling: usize,
    /// Minimum score for every hit before the full-document hint is emitted.
    pub hint_score_threshold: f32,
    /// Maximum hit count for the full-document hint.
    pub hint_max_hits: usize,
    /// Default MCP search limit.
    pub default_search_limit: usize,
    /// Hard cap on MCP search limits.
    pub max_search_limit: usize,
}

impl AppConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::builder().from_env().build()
    }

    /// Returns the OpenAI API key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] when unset.
    pub fn require_openai_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .ok_or(ConfigError::MissingCredential("OPENAI_API_KEY"))
    }

    /// Returns the CourtListener token.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] when unset.
    pub fn require_court_listener_token(&self) -> Result<&str, ConfigError> {
        self.court_listener_token
            .as_deref()
            .ok_or(ConfigError::MissingCredential("COURT_LISTENER_API_TOKEN"))
    }

    /// Qdrant connection URL.
    #[must_use]
    pub fn qdrant_url(&self) -> String {
        format!("http://{}:{}", self.qdrant_host, self.qdrant_port)
    }
}

/// Builder for [`AppConfig`].
#[derive(Debug, Clone, Default)]
pub struct AppConfigBuilder {
    openai_api_key: Option<String>,
    openai_base_url: Option<String>,
    court_listener_token: Option<String>,
    qdrant_host: Option<String>,
    qdrant_port: Option<u16>,
    qdrant_api_key: Option<String>,
    embedding_model: Option<String>,
    embedding_dim: Option<u64>,
    enrichment_model: Option<String>,
    embed_batch_size: Option<usize>,
    pipeline_batch_size: Option<usize>,
    workers: Option<usize>,
    max_retries: Option<u32>,
    retry_budget: Option<u32>,
    stale_claim_after: Option<Duration>,
    timeouts: Option<StageTimeouts>,
    chunk_char_ceiling: Option<usize>,
    hint_score_threshold: Option<f32>,
    hint_max_hits: Option<usize>,
    default_search_limit: Option<usize>,
    max_search_limit: Option<usize>,
}

impl AppConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.openai_api_key.is_none() {
            self.openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if self.openai_base_url.is_none() {
            self.openai_base_url = std::env::var("OPENAI_BASE_URL").ok();
        }
        if self.court_listener_token.is_none() {
            self.court_listener_token = std::env::var("COURT_LISTENER_API_TOKEN").ok();
        }
        if self.qdrant_host.is_none() {
            self.qdrant_host = std::env::var("QDRANT_HOST").ok();
        }
        if self.qdrant_port.is_none() {
            self.qdrant_port = env_parse("QDRANT_PORT");
        }
        if self.qdrant_api_key.is_none() {
            self.qdrant_api_key = std::env::var("QDRANT_API_KEY").ok();
        }
        if self.embedding_model.is_none() {
            self.embedding_model = std::env::var("GOVREPORTER_EMBEDDING_MODEL").ok();
        }
        if self.enrichment_model.is_none() {
            self.enrichment_model = std::env::var("GOVREPORTER_ENRICHMENT_MODEL").ok();
        }
        if self.workers.is_none() {
            self.workers = env_parse("GOVREPORTER_WORKERS");
        }
        if self.stale_claim_after.is_none() {
            self.stale_claim_after =
                env_parse::<u64>("GOVREPORTER_STALE_CLAIM_SECS").map(Duration::from_secs);
        }
        if self.hint_score_threshold.is_none() {
            self.hint_score_threshold = env_parse("GOVREPORTER_HINT_SCORE_THRESHOLD");
        }
        if self.hint_max_hits.is_none() {
            self.hint_max_hits = env_parse("GOVREPORTER_HINT_MAX_HITS");
        }
        if self.default_search_limit.is_none() {
            self.default_search_limit = env_parse("MCP_DEFAULT_SEARCH_LIMIT");
        }
        if self.max_search_limit.is_none() {
            self.max_search_limit = env_parse("MCP_MAX_SEARCH_LIMIT");
        }
        self
    }

    /// Sets the OpenAI API key.
    #[must_use]
    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    /// Sets the OpenAI base URL override.
    #[must_use]
    pub fn openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai_base_url = Some(url.into());
        self
    }

    /// Sets the CourtListener API token.
    #[must_use]
    pub fn court_listener_token(mut self, token: impl Into<String>) -> Self {
        self.court_listener_token = Some(token.into());
        self
    }

    /// Sets the Qdrant host.
    #[must_use]
    pub fn qdrant_host(mut self, host: impl Into<String>) -> Self {
        self.qdrant_host = Some(host.into());
        self
    }

    /// Sets the Qdrant port.
    #[must_use]
    pub const fn qdrant_port(mut self, port: u16) -> Self {
        self.qdrant_port = Some(port);
        self
    }

    /// Sets the embedding model.
    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Sets the enrichment model.
    #[must_use]
    pub fn enrichment_model(mut self, model: impl Into<String>) -> Self {
        self.enrichment_model = Some(model.into());
        self
    }

    /// Sets the embedding batch size.
    #[must_use]
    pub const fn embed_batch_size(mut self, n: usize) -> Self {
        self.embed_batch_size = Some(n);
        self
    }

    /// Sets the pipeline batch size.
    #[must_use]
    pub const fn pipeline_batch_size(mut self, n: usize) -> Self {
        self.pipeline_batch_size = Some(n);
        self
    }

    /// Sets the worker pool size.
    #[must_use]
    pub const fn workers(mut self, n: usize) -> Self {
        self.workers = Some(n);
        self
    }

    /// Sets the transient-failure retry ceiling.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Sets the per-document retry budget.
    #[must_use]
    pub const fn retry_budget(mut self, n: u32) -> Self {
        self.retry_budget = Some(n);
        self
    }

    /// Sets the stale-claim reclaim threshold.
    #[must_use]
    pub const fn stale_claim_after(mut self, d: Duration) -> Self {
        self.stale_claim_after = Some(d);
        self
    }

    /// Sets the per-stage deadlines.
    #[must_use]
    pub const fn timeouts(mut self, t: StageTimeouts) -> Self {
        self.timeouts = Some(t);
        self
    }

    /// Sets the per-hit character ceiling.
    #[must_use]
    pub const fn chunk_char_ceiling(mut self, n: usize) -> Self {
        self.chunk_char_ceiling = Some(n);
        self
    }

    /// Sets the full-document hint score threshold.
    #[must_use]
    pub const fn hint_score_threshold(mut self, t: f32) -> Self {
        self.hint_score_threshold = Some(t);
        self
    }

    /// Sets the full-document hint hit cap.
    #[must_use]
    pub const fn hint_max_hits(mut self, n: usize) -> Self {
        self.hint_max_hits = Some(n);
        self
    }

    /// Builds the [`AppConfig`].
    #[must_use]
    pub fn build(self) -> AppConfig {
        AppConfig {
            openai_api_key: self.openai_api_key,
            openai_base_url: self.openai_base_url,
            court_listener_token: self.court_listener_token,
            qdrant_host: self.qdrant_host.unwrap_or_else(|| "localhost".to_string()),
            qdrant_port: self.qdrant_port.unwrap_or(6334),
            qdrant_api_key: self.qdrant_api_key,
            embedding_model: self
                .embedding_model
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dim: self.embedding_dim.unwrap_or(DEFAULT_EMBEDDING_DIM),
            enrichment_model: self
                .enrichment_model
                .unwrap_or_else(|| DEFAULT_ENRICHMENT_MODEL.to_string()),
            embed_batch_size: self.embed_batch_size.unwrap_or(DEFAULT_EMBED_BATCH_SIZE),
            pipeline_batch_size: self
                .pipeline_batch_size
                .unwrap_or(DEFAULT_PIPELINE_BATCH_SIZE),
            workers: self.workers.unwrap_or(DEFAULT_WORKERS).max(1),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_budget: self.retry_budget.unwrap_or(DEFAULT_RETRY_BUDGET),
            stale_claim_after: self
                .stale_claim_after
                .unwrap_or(Duration::from_secs(DEFAULT_STALE_CLAIM_SECS)),
            timeouts: self.timeouts.unwrap_or_default(),
            chunk_char_ceiling: self.chunk_char_ceiling.unwrap_or(DEFAULT_CHUNK_CHAR_CEILING),
            hint_score_threshold: self
                .hint_score_threshold
                .unwrap_or(DEFAULT_HINT_SCORE_THRESHOLD),
            hint_max_hits: self.hint_max_hits.unwrap_or(DEFAULT_HINT_MAX_HITS),
            default_search_limit: self.default_search_limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            max_search_limit: self.max_search_limit.unwrap_or(DEFAULT_MAX_SEARCH_LIMIT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AppConfig::builder().build();
        assert_eq!(config.qdrant_host, "localhost");
        assert_eq!(config.qdrant_port, 6334);
        assert_eq!(config.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.embedding_dim, 1536);
        assert_eq!(config.embed_batch_size, 100);
        assert_eq!(config.workers, 4);
        assert!((config.hint_score_threshold - 0.4).abs() < f32::EPSILON);
        assert_eq!(config.hint_max_hits, 3);
        assert_eq!(config.stale_claim_after, Duration::from_secs(600));
    }

    #[test]
    fn test_missing_credentials() {
        let config = AppConfig::builder().build();
        assert!(config.require_openai_key().is_err());
        assert!(config.require_court_listener_token().is_err());

        let config = AppConfig::builder()
            .openai_api_key("sk-test")
            .court_listener_token("tok")
            .build();
        assert_eq!(config.require_openai_key().ok(), Some("sk-test"));
        assert_eq!(config.require_court_listener_token().ok(), Some("tok"));
    }

    #[test]
    fn test_chunking_defaults() {
        let opinions = ChunkingConfig::opinions();
        assert_eq!(
            (opinions.min_tokens, opinions.target_tokens, opinions.max_tokens),
            (500, 600, 800)
        );
        assert_eq!(opinions.overlap_tokens(), 90);

        let orders = ChunkingConfig::orders();
        assert_eq!(
            (orders.min_tokens, orders.target_tokens, orders.max_tokens),
            (240, 340, 400)
        );
        assert_eq!(orders.overlap_tokens(), 34);
    }

    #[test]
    fn test_chunking_validation() {
        assert!(ChunkingConfig::opinions().validate("court_opinion").is_ok());

        let bad = ChunkingConfig {
            min_tokens: 700,
            target_tokens: 600,
            max_tokens: 800,
            overlap_ratio: 0.15,
        };
        assert!(bad.validate("court_opinion").is_err());

        let bad_ratio = ChunkingConfig {
            overlap_ratio: 1.0,
            ..ChunkingConfig::orders()
        };
        assert!(bad_ratio.validate("executive_order").is_err());

        let zero_min = ChunkingConfig {
            min_tokens: 0,
            ..ChunkingConfig::orders()
        };
        assert!(zero_min.validate("executive_order").is_err());
    }

    #[test]
    fn test_qdrant_url() {
        let config = AppConfig::builder()
            .qdrant_host("qdrant.internal")
            .qdrant_port(7000)
            .build();
        assert_eq!(config.qdrant_url(), "http://qdrant.internal:7000");
    }
}
