//! Error taxonomy for govreporter.
//!
//! Errors are grouped by the subsystem that raises them and unified under
//! the top-level [`Error`] enum. The CLI maps each top-level variant to a
//! process exit code via [`Error::exit_code`]: configuration problems exit 2,
//! user errors exit 1, runtime failures exit 3.

use thiserror::Error;

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration and startup errors. Fatal for the operation being started.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required credential is missing from the environment.
    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),

    /// A date flag could not be parsed as YYYY-MM-DD.
    #[error("invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate {
        /// The offending input.
        value: String,
    },

    /// A date range where the start falls after the end.
    #[error("invalid date range: {start} is after {end}")]
    InvalidDateRange {
        /// Range start.
        start: String,
        /// Range end.
        end: String,
    },

    /// A chunking override violates `0 < min <= target <= max`.
    #[error("invalid chunking config for {doc_type}: min={min} target={target} max={max}")]
    InvalidChunkingConfig {
        /// Document type the config applies to.
        doc_type: &'static str,
        /// Minimum tokens per chunk.
        min: usize,
        /// Target tokens per chunk.
        target: usize,
        /// Maximum tokens per chunk.
        max: usize,
    },

    /// An overlap ratio outside `[0, 1)`.
    #[error("invalid overlap ratio {0}: must be in [0, 1)")]
    InvalidOverlapRatio(f32),

    /// An existing collection has a different vector dimension than configured.
    #[error("collection '{collection}' has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        /// Collection name.
        collection: String,
        /// Dimension found in the store.
        actual: u64,
        /// Dimension the configuration requires.
        expected: u64,
    },
}

/// Errors raised while talking to an upstream document source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transient upstream failure (timeout, 5xx, 429) that exhausted its
    /// retry budget.
    #[error("upstream {source_name} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        /// Fetcher name.
        source_name: &'static str,
        /// Attempts made, including the first.
        attempts: u32,
        /// Last observed error.
        message: String,
    },

    /// Non-retriable upstream response (4xx other than 429).
    #[error("upstream {source_name} rejected request ({status}): {message}")]
    Rejected {
        /// Fetcher name.
        source_name: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The upstream response did not match the expected shape.
    #[error("upstream {source_name} returned malformed response: {message}")]
    MalformedResponse {
        /// Fetcher name.
        source_name: &'static str,
        /// What was wrong.
        message: String,
    },

    /// A stage deadline elapsed before the request completed.
    #[error("fetch from {source_name} timed out after {seconds}s")]
    DeadlineElapsed {
        /// Fetcher name.
        source_name: &'static str,
        /// Deadline in seconds.
        seconds: u64,
    },

    /// Transport-level failure from the HTTP client.
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors raised while preparing the chunker.
///
/// Segmentation itself never fails: malformed input degrades to a single
/// unlabeled span and empty input yields no chunks.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// The BPE tokenizer could not be constructed.
    #[error("tokenizer initialization failed: {0}")]
    TokenizerInit(String),
}

/// Errors raised by the chat-completion provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key was configured for the provider.
    #[error("LLM API key missing")]
    ApiKeyMissing,

    /// The provider request failed.
    #[error("LLM request failed: {message}")]
    ApiRequest {
        /// Provider error detail.
        message: String,
    },
}

/// Errors raised by the embedding client.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Transient failure (timeout, 5xx, rate limit); eligible for retry.
    #[error("embedding request failed transiently: {message}")]
    Transient {
        /// Provider error detail.
        message: String,
    },

    /// The embedding API rejected or failed the request beyond retry.
    #[error("embedding request failed: {message}")]
    ApiRequest {
        /// Provider error detail.
        message: String,
    },

    /// The API returned a different number of vectors than inputs.
    #[error("embedding response count mismatch: sent {sent}, received {received}")]
    CountMismatch {
        /// Texts sent.
        sent: usize,
        /// Vectors received.
        received: usize,
    },

    /// A returned vector had the wrong dimension.
    #[error("embedding dimension mismatch: got {actual}, expected {expected}")]
    DimensionMismatch {
        /// Dimension received.
        actual: usize,
        /// Dimension expected.
        expected: usize,
    },
}

/// Errors raised by the metadata enricher.
///
/// Enrichment failures are downgraded to warnings by the pipeline; these
/// variants exist so callers can log the reason precisely.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// The LLM call itself failed.
    #[error("enrichment request failed: {message}")]
    ApiRequest {
        /// Provider error detail.
        message: String,
    },

    /// The response was not valid JSON or did not match the schema,
    /// even after the stricter retry.
    #[error("enrichment response failed schema validation: {message}")]
    SchemaValidation {
        /// Parse or validation detail.
        message: String,
    },
}

/// Errors raised by the vector store adapter.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// The underlying store client returned an error.
    #[error("vector store operation failed: {message}")]
    Backend {
        /// Store error detail.
        message: String,
    },

    /// A payload could not be serialized for the store.
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The requested collection does not exist.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// An existing collection has an incompatible vector dimension.
    #[error("collection '{collection}' has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        /// Collection name.
        collection: String,
        /// Dimension found in the store.
        actual: u64,
        /// Dimension the configuration requires.
        expected: u64,
    },
}

/// Errors raised by the progress store.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// SQLite-level failure.
    #[error("progress database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The progress store lock was poisoned by a panicking holder.
    #[error("progress store lock poisoned")]
    LockPoisoned,
}

/// Per-document processing failure inside the ingestion pipeline.
///
/// Recorded in the progress store; never aborts the run.
#[derive(Debug, Error)]
#[error("document {document_id} failed at {stage}: {message}")]
pub struct DocumentFailure {
    /// The failed document.
    pub document_id: String,
    /// Pipeline stage that failed (fetch, chunk, enrich, embed, upsert).
    pub stage: &'static str,
    /// Failure detail, persisted to the progress store.
    pub message: String,
}

/// Errors raised by CLI command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The user supplied invalid arguments beyond what clap can catch.
    #[error("{0}")]
    InvalidArguments(String),

    /// The command was aborted at a confirmation prompt.
    #[error("aborted: {0}")]
    Aborted(String),

    /// The command failed at runtime.
    #[error("{0}")]
    ExecutionFailed(String),
}

/// Top-level error type unifying all subsystems.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration or startup failure (exit code 2).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Upstream source failure (exit code 3).
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Chunker setup failure (exit code 3).
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    /// Chat-completion provider failure (exit code 3).
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Embedding failure (exit code 3).
    #[error(transparent)]
    Embed(#[from] EmbedError),

    /// Enrichment failure (exit code 3; normally downgraded before reaching here).
    #[error(transparent)]
    Enrich(#[from] EnrichError),

    /// Vector store failure (exit code 3).
    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),

    /// Progress store failure (exit code 3).
    #[error(transparent)]
    Progress(#[from] ProgressError),

    /// CLI command failure (exit code 1 or 3 depending on variant).
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure (exit code 3).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The run was interrupted by a termination signal (exit code 130).
    #[error("interrupted")]
    Interrupted,
}

impl Error {
    /// Maps this error to a process exit code.
    ///
    /// 0 is success (not represented here), 1 user error, 2 configuration
    /// error, 3 runtime failure, 130 interrupted.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Command(CommandError::InvalidArguments(_) | CommandError::Aborted(_)) => 1,
            Self::Interrupted => 130,
            _ => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_exit_code() {
        let err = Error::from(ConfigError::MissingCredential("OPENAI_API_KEY"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_user_error_exit_code() {
        let err = Error::from(CommandError::InvalidArguments("bad flag".to_string()));
        assert_eq!(err.exit_code(), 1);
        let err = Error::from(CommandError::Aborted("no confirmation".to_string()));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_runtime_error_exit_code() {
        let err = Error::from(CommandError::ExecutionFailed("boom".to_string()));
        assert_eq!(err.exit_code(), 3);
        let err = Error::from(EmbedError::ApiRequest {
            message: "503".to_string(),
        });
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_interrupted_exit_code() {
        assert_eq!(Error::Interrupted.exit_code(), 130);
    }

    #[test]
    fn test_document_failure_display() {
        let failure = DocumentFailure {
            document_id: "op-123".to_string(),
            stage: "embed",
            message: "rate limited".to_string(),
        };
        let rendered = failure.to_string();
        assert!(rendered.contains("op-123"));
        assert!(rendered.contains("embed"));
        assert!(rendered.contains("rate limited"));
    }
}
