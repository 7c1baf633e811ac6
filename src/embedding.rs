//! Batched vector generation with backoff and per-item fallback.
//!
//! The embedder sends batches of up to a configured size. A batch that keeps
//! failing transiently is retried with exponential backoff; once the retry
//! ceiling is hit (or the failure is permanent) the batch degrades to
//! per-item requests so one bad input cannot poison its neighbors. An item
//! that still fails gets a zero vector and is reported to the caller so its
//! document can be flagged for re-embedding rather than silently dropped.

use std::sync::Arc;
use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::CreateEmbeddingRequestArgs;
use async_trait::async_trait;
use tracing::warn;

use crate::config::AppConfig;
use crate::error::{ConfigError, EmbedError};

/// Initial backoff delay.
const BACKOFF_BASE: Duration = Duration::from_millis(500);
/// Backoff ceiling.
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// A backend that turns a batch of texts into vectors, order-preserving.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embeds `texts`, returning one vector per input in the same order.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Transient`] for retriable failures and other
    /// variants for permanent ones.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// `OpenAI`-compatible embedding backend.
pub struct OpenAiEmbeddingClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbeddingClient {
    /// Creates a backend from application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] when no API key is set.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let api_key = config.require_openai_key()?;
        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(ref base_url) = config.openai_base_url {
            openai_config = openai_config.with_api_base(base_url);
        }
        Ok(Self {
            client: Client::with_config(openai_config),
            model: config.embedding_model.clone(),
        })
    }

    /// Maps SDK errors to the transient/permanent split the retry loop needs.
    fn classify(e: &async_openai::error::OpenAIError) -> EmbedError {
        use async_openai::error::OpenAIError;
        let message = e.to_string();
        let transient = match e {
            OpenAIError::Reqwest(_) => true,
            OpenAIError::ApiError(api) => {
                let lowered = message.to_lowercase();
                api.r#type.as_deref() == Some("server_error")
                    || lowered.contains("rate limit")
                    || lowered.contains("overloaded")
                    || lowered.contains("timeout")
            }
            _ => false,
        };
        if transient {
            EmbedError::Transient { message }
        } else {
            EmbedError::ApiRequest { message }
        }
    }
}

impl std::fmt::Debug for OpenAiEmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddingClient")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(texts.to_vec())
            .build()
            .map_err(|e| EmbedError::ApiRequest {
                message: e.to_string(),
            })?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| Self::classify(&e))?;

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Result of embedding a batch of texts.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedOutcome {
    /// One vector per input text, in order; failed items hold zero vectors.
    pub vectors: Vec<Vec<f32>>,
    /// Indices of inputs that received zero vectors and need re-embedding.
    pub failed_indices: Vec<usize>,
}

/// Batching + retry wrapper around an [`EmbeddingClient`].
pub struct Embedder {
    client: Arc<dyn EmbeddingClient>,
    batch_size: usize,
    max_retries: u32,
    dim: usize,
}

impl Embedder {
    /// Creates an embedder.
    pub fn new(
        client: Arc<dyn EmbeddingClient>,
        batch_size: usize,
        max_retries: u32,
        dim: usize,
    ) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
            max_retries,
            dim,
        }
    }

    /// Vector dimension produced by this embedder.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Embeds all texts, degrading per the batch→item→zero-vector ladder.
    ///
    /// The returned vectors are positionally aligned with `texts`.
    pub async fn embed_all(&self, texts: &[String]) -> EmbedOutcome {
        let mut vectors: Vec<Vec<f32>> = vec![Vec::new(); texts.len()];
        let mut failed_indices = Vec::new();

        for (batch_idx, batch) in texts.chunks(self.batch_size).enumerate() {
            let offset = batch_idx * self.batch_size;
            match self.with_retries(batch).await {
                Ok(batch_vectors) => {
                    for (i, v) in batch_vectors.into_iter().enumerate() {
                        vectors[offset + i] = v;
                    }
                }
                Err(batch_err) => {
                    warn!(
                        batch = batch_idx,
                        error = %batch_err,
                        "batch embedding failed; falling back to per-item requests"
                    );
                    for (i, text) in batch.iter().enumerate() {
                        match self.with_retries(std::slice::from_ref(text)).await {
                            Ok(mut single) if single.len() == 1 => {
                                vectors[offset + i] = single.swap_remove(0);
                            }
                            Ok(_) | Err(_) => {
                                warn!(
                                    index = offset + i,
                                    "item embedding failed; emitting zero vector"
                                );
                                vectors[offset + i] = vec![0.0; self.dim];
                                failed_indices.push(offset + i);
                            }
                        }
                    }
                }
            }
        }

        EmbedOutcome {
            vectors,
            failed_indices,
        }
    }

    /// Runs one request with exponential backoff on transient failures and
    /// validates count and dimension on success.
    async fn with_retries(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut attempt: u32 = 0;
        loop {
            match self.client.embed(texts).await {
                Ok(vectors) => {
                    if vectors.len() != texts.len() {
                        return Err(EmbedError::CountMismatch {
                            sent: texts.len(),
                            received: vectors.len(),
                        });
                    }
                    if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
                        return Err(EmbedError::DimensionMismatch {
                            actual: bad.len(),
                            expected: self.dim,
                        });
                    }
                    return Ok(vectors);
                }
                Err(EmbedError::Transient { message }) if attempt < self.max_retries => {
                    let delay = backoff_delay(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %message,
                          "transient embedding failure; backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("batch_size", &self.batch_size)
            .field("max_retries", &self.max_retries)
            .field("dim", &self.dim)
            .finish_non_exhaustive()
    }
}

/// `BACKOFF_BASE × 2^attempt`, capped at [`BACKOFF_CAP`].
fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_BASE
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(BACKOFF_CAP)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    const DIM: usize = 4;

    enum Step {
        Ok,
        Transient,
        Permanent,
    }

    /// Client that follows a script of outcomes, then succeeds.
    struct ScriptedClient {
        script: Mutex<Vec<Step>>,
        calls: Mutex<usize>,
    }

    impl ScriptedClient {
        fn new(mut script: Vec<Step>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().map(|c| *c).unwrap_or(0)
        }
    }

    #[async_trait]
    impl EmbeddingClient for ScriptedClient {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            if let Ok(mut calls) = self.calls.lock() {
                *calls += 1;
            }
            let step = self
                .script
                .lock()
                .ok()
                .and_then(|mut s| s.pop())
                .unwrap_or(Step::Ok);
            match step {
                Step::Ok => Ok(texts.iter().map(|_| vec![0.5; DIM]).collect()),
                Step::Transient => Err(EmbedError::Transient {
                    message: "503".to_string(),
                }),
                Step::Permanent => Err(EmbedError::ApiRequest {
                    message: "bad input".to_string(),
                }),
            }
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {i}")).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retried() {
        let client = Arc::new(ScriptedClient::new(vec![Step::Transient, Step::Ok]));
        let embedder = Embedder::new(client.clone(), 10, 3, DIM);
        let outcome = embedder.embed_all(&texts(3)).await;
        assert!(outcome.failed_indices.is_empty());
        assert_eq!(outcome.vectors.len(), 3);
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_batch_failure_falls_back_per_item() {
        // Batch fails permanently, then 3 per-item calls: ok, permanent, ok.
        let client = Arc::new(ScriptedClient::new(vec![
            Step::Permanent,
            Step::Ok,
            Step::Permanent,
            Step::Ok,
        ]));
        let embedder = Embedder::new(client.clone(), 10, 0, DIM);
        let outcome = embedder.embed_all(&texts(3)).await;
        assert_eq!(outcome.failed_indices, vec![1]);
        assert_eq!(outcome.vectors[1], vec![0.0; DIM]);
        assert_eq!(outcome.vectors[0], vec![0.5; DIM]);
        assert_eq!(outcome.vectors[2], vec![0.5; DIM]);
        assert_eq!(client.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_ceiling_respected() {
        let client = Arc::new(ScriptedClient::new(vec![
            Step::Transient,
            Step::Transient,
            Step::Transient,
            Step::Transient,
        ]));
        let embedder = Embedder::new(client.clone(), 10, 1, DIM);
        // Batch: 2 attempts (1 retry), then per-item: 2 more. All transient,
        // so the item degrades to a zero vector.
        let outcome = embedder.embed_all(&texts(1)).await;
        assert_eq!(outcome.failed_indices, vec![0]);
        assert_eq!(outcome.vectors[0], vec![0.0; DIM]);
        assert_eq!(client.calls(), 4);
    }

    #[tokio::test]
    async fn test_batching_splits_inputs() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let embedder = Embedder::new(client.clone(), 2, 0, DIM);
        let outcome = embedder.embed_all(&texts(5)).await;
        assert_eq!(outcome.vectors.len(), 5);
        assert_eq!(client.calls(), 3, "expected ceil(5/2) batch calls");
    }

    #[test]
    fn test_backoff_delay_caps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(10), BACKOFF_CAP);
        assert_eq!(backoff_delay(32), BACKOFF_CAP);
    }
}
