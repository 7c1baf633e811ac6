//! External document sources.
//!
//! Each source implements [`DocumentFetcher`]: date-ranged id listing,
//! single-document fetch, and a declared minimum inter-request interval that
//! the pipeline and the [`RateGate`] enforce. The MCP server dispatches
//! `opinion://` and `order://` resource reads to the matching fetcher so
//! resource contents are always fresh.

pub mod court_listener;
pub mod federal_register;
pub mod http;
pub mod strip;

pub use court_listener::CourtListenerFetcher;
pub use federal_register::FederalRegisterFetcher;
pub use strip::strip_html;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::time::Instant;

use crate::document::{Document, DocumentType};
use crate::error::FetchError;

/// A source of ingestible documents.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Source name for logging and error messages.
    fn name(&self) -> &'static str;

    /// Document type this fetcher produces.
    fn doc_type(&self) -> DocumentType;

    /// Minimum interval between requests to this source.
    fn rate_limit(&self) -> Duration;

    /// Lists document ids published in `[start, end]`, ascending by
    /// publication date. Pagination happens internally; the sequence is
    /// finite.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on upstream failures.
    async fn list_ids(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<String>, FetchError>;

    /// Fetches one document with text, URL, and source-specific metadata.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on upstream failures; 4xx other than 429 is
    /// non-retriable and surfaces as a document-level failure.
    async fn fetch(&self, id: &str) -> Result<Document, FetchError>;
}

/// Enforces a minimum interval between requests to one source.
///
/// Callers `wait()` before each request; the gate sleeps out the remainder
/// of the interval since the previous request. One gate per fetcher.
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    last: tokio::sync::Mutex<Option<Instant>>,
}

impl RateGate {
    /// Creates a gate with the given minimum interval.
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: tokio::sync::Mutex::const_new(None),
        }
    }

    /// Waits until the interval since the previous request has elapsed,
    /// then records this request.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let next_allowed = previous + self.min_interval;
            let now = Instant::now();
            if next_allowed > now {
                tokio::time::sleep_until(next_allowed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
