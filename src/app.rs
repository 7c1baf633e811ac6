//! Application wiring.
//!
//! One [`Application`] owns the fetchers, embedder, enricher, vector store,
//! and tokenizer, constructed from [`AppConfig`] and injected into the
//! pipeline and the MCP server. Tests build one with
//! [`Application::with_parts`] and swap in fakes.

use std::sync::Arc;

use crate::config::{AppConfig, ChunkingConfig};
use crate::chunking::Tokenizer;
use crate::document::DocumentType;
use crate::embedding::{Embedder, OpenAiEmbeddingClient};
use crate::enrich::Enricher;
use crate::error::{ConfigError, EmbedError, Error};
use crate::fetch::{CourtListenerFetcher, DocumentFetcher, FederalRegisterFetcher};
use crate::llm::OpenAiProvider;
use crate::pipeline::{IngestionPipeline, PipelineDeps};
use crate::progress::ProgressStore;
use crate::query::ShaperConfig;
use crate::vector::{QdrantStore, VectorStore};

/// Container for the long-lived components.
pub struct Application {
    /// Resolved configuration.
    pub config: AppConfig,
    /// Vector store.
    pub store: Arc<dyn VectorStore>,
    /// Batched embedder.
    pub embedder: Arc<Embedder>,
    /// Metadata enricher.
    pub enricher: Arc<Enricher>,
    /// Shared tokenizer.
    pub tokenizer: Arc<Tokenizer>,
    opinion_fetcher: Option<Arc<dyn DocumentFetcher>>,
    order_fetcher: Arc<dyn DocumentFetcher>,
}

impl Application {
    /// Builds the production wiring from configuration.
    ///
    /// Requires `OPENAI_API_KEY` (embeddings and enrichment). The
    /// CourtListener fetcher is built only when its token is present;
    /// operations that need it fail with a configuration error at use.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`]-wrapping [`Error`] on missing credentials
    /// and on vector store or tokenizer construction failures.
    pub fn from_config(config: AppConfig) -> Result<Self, Error> {
        let store: Arc<dyn VectorStore> = Arc::new(QdrantStore::connect(&config)?);
        let embedding_client = Arc::new(OpenAiEmbeddingClient::from_config(&config)?);
        #[allow(clippy::cast_possible_truncation)]
        let embedder = Arc::new(Embedder::new(
            embedding_client,
            config.embed_batch_size,
            config.max_retries,
            config.embedding_dim as usize,
        ));
        let provider = Arc::new(OpenAiProvider::from_config(&config)?);
        let enricher = Arc::new(Enricher::new(provider, config.enrichment_model.clone()));
        let tokenizer = Arc::new(Tokenizer::new()?);

        let opinion_fetcher: Option<Arc<dyn DocumentFetcher>> =
            config.court_listener_token.as_deref().map(|token| {
                Arc::new(CourtListenerFetcher::new(
                    token,
                    config.max_retries,
                    config.timeouts.fetch,
                )) as Arc<dyn DocumentFetcher>
            });
        let order_fetcher: Arc<dyn DocumentFetcher> = Arc::new(FederalRegisterFetcher::new(
            config.max_retries,
            config.timeouts.fetch,
        ));

        Ok(Self {
            config,
            store,
            embedder,
            enricher,
            tokenizer,
            opinion_fetcher,
            order_fetcher,
        })
    }

    /// Assembles an application from pre-built components (tests).
    #[must_use]
    pub fn with_parts(
        config: AppConfig,
        store: Arc<dyn VectorStore>,
        embedder: Arc<Embedder>,
        enricher: Arc<Enricher>,
        tokenizer: Arc<Tokenizer>,
        opinion_fetcher: Option<Arc<dyn DocumentFetcher>>,
        order_fetcher: Arc<dyn DocumentFetcher>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
            enricher,
            tokenizer,
            opinion_fetcher,
            order_fetcher,
        }
    }

    /// Returns the fetcher for a document type.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] when the CourtListener
    /// token is not configured.
    pub fn fetcher(&self, doc_type: DocumentType) -> Result<Arc<dyn DocumentFetcher>, ConfigError> {
        match doc_type {
            DocumentType::CourtOpinion => self
                .opinion_fetcher
                .clone()
                .ok_or(ConfigError::MissingCredential("COURT_LISTENER_API_TOKEN")),
            DocumentType::ExecutiveOrder => Ok(Arc::clone(&self.order_fetcher)),
        }
    }

    /// Result-shaping knobs derived from configuration.
    #[must_use]
    pub const fn shaper_config(&self) -> ShaperConfig {
        ShaperConfig {
            char_ceiling: self.config.chunk_char_ceiling,
            hint_score_threshold: self.config.hint_score_threshold,
            hint_max_hits: self.config.hint_max_hits,
        }
    }

    /// Builds the ingestion pipeline for a document type.
    ///
    /// # Errors
    ///
    /// Returns an error when the fetcher is unavailable or the chunking
    /// configuration is invalid.
    pub fn pipeline(
        &self,
        doc_type: DocumentType,
        progress: Arc<ProgressStore>,
    ) -> Result<IngestionPipeline, Error> {
        let fetcher = self.fetcher(doc_type)?;
        let chunking = ChunkingConfig::resolve(doc_type)?;
        let deps = PipelineDeps {
            fetcher,
            enricher: Arc::clone(&self.enricher),
            embedder: Arc::clone(&self.embedder),
            store: Arc::clone(&self.store),
            progress,
            tokenizer: Arc::clone(&self.tokenizer),
        };
        Ok(IngestionPipeline::new(deps, chunking, &self.config))
    }

    /// Embeds a search query, refusing to search on a degraded vector.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::ApiRequest`] when the query could not be
    /// embedded (a zero vector would match nothing meaningful).
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let outcome = self.embedder.embed_all(&[text.to_string()]).await;
        if !outcome.failed_indices.is_empty() {
            return Err(EmbedError::ApiRequest {
                message: "query embedding failed".to_string(),
            });
        }
        outcome
            .vectors
            .into_iter()
            .next()
            .ok_or(EmbedError::CountMismatch {
                sent: 1,
                received: 0,
            })
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("has_opinion_fetcher", &self.opinion_fetcher.is_some())
            .finish_non_exhaustive()
    }
}
