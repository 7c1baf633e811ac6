//! Shared HTTP plumbing for the source adapters.
//!
//! Wraps a `reqwest` client with the retry policy both sources share:
//! 429 and 5xx retry with exponential backoff up to a ceiling, other 4xx
//! raise a non-retriable [`FetchError::Rejected`], and every request goes
//! through the source's [`RateGate`] first.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::RateGate;
use crate::error::FetchError;

/// Initial backoff delay.
const BACKOFF_BASE: Duration = Duration::from_millis(500);
/// Backoff ceiling.
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// How a response status should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx.
    Ok,
    /// 429 or 5xx: retry with backoff.
    Retriable,
    /// Other 4xx: fail the document, do not retry.
    Fatal,
}

/// Classifies a response status per the shared retry policy.
#[must_use]
pub fn classify_status(status: StatusCode) -> StatusClass {
    if status.is_success() {
        StatusClass::Ok
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StatusClass::Retriable
    } else {
        StatusClass::Fatal
    }
}

/// Rate-limited, retrying HTTP client for one upstream source.
pub struct HttpSource {
    client: reqwest::Client,
    source_name: &'static str,
    auth_header: Option<(&'static str, String)>,
    gate: RateGate,
    max_retries: u32,
    request_timeout: Duration,
}

impl HttpSource {
    /// Creates a source client.
    #[must_use]
    pub fn new(
        source_name: &'static str,
        min_interval: Duration,
        max_retries: u32,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            source_name,
            auth_header: None,
            gate: RateGate::new(min_interval),
            max_retries,
            request_timeout,
        }
    }

    /// Attaches a static header sent with every request (e.g. authorization).
    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.auth_header = Some((name, value.into()));
        self
    }

    /// GETs `url` and decodes the JSON response body.
    ///
    /// # Errors
    ///
    /// See [`HttpSource::get_text`]; additionally raises
    /// [`FetchError::MalformedResponse`] when the body is not valid JSON
    /// for `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let body = self.get_text(url, query).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::MalformedResponse {
            source_name: self.source_name,
            message: format!("{e} (url: {url})"),
        })
    }

    /// GETs `url` and returns the response body, applying the rate gate and
    /// the shared retry policy.
    ///
    /// # Errors
    ///
    /// [`FetchError::Rejected`] on non-retriable 4xx,
    /// [`FetchError::RetriesExhausted`] when the backoff ceiling is hit, and
    /// [`FetchError::Transport`]-mapped errors on terminal transport failure.
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<String, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            self.gate.wait().await;

            let mut request = self
                .client
                .get(url)
                .timeout(self.request_timeout)
                .query(query);
            if let Some((name, value)) = &self.auth_header {
                request = request.header(*name, value);
            }

            // Evaluates to the retriable failure message; success and fatal
            // rejection return early.
            let message: String = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    match classify_status(status) {
                        StatusClass::Ok => {
                            return response.text().await.map_err(FetchError::Transport);
                        }
                        StatusClass::Fatal => {
                            let body = response.text().await.unwrap_or_default();
                            return Err(FetchError::Rejected {
                                source_name: self.source_name,
                                status: status.as_u16(),
                                message: truncate(&body, 500),
                            });
                        }
                        StatusClass::Retriable => format!("http {status}"),
                    }
                }
                // Timeouts and transport errors are treated as transient.
                Err(e) => e.to_string(),
            };
            if attempt >= self.max_retries {
                return Err(FetchError::RetriesExhausted {
                    source_name: self.source_name,
                    attempts: attempt + 1,
                    message,
                });
            }
            let delay = backoff_delay(attempt);
            warn!(
                source = self.source_name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %message,
                "transient upstream failure; backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl std::fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSource")
            .field("source_name", &self.source_name)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

/// `BACKOFF_BASE × 2^attempt`, capped at [`BACKOFF_CAP`].
fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_BASE
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(BACKOFF_CAP)
}

fn truncate(s: &str, limit: usize) -> String {
    let mut end = s.len().min(limit);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::OK), StatusClass::Ok);
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            StatusClass::Retriable
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            StatusClass::Retriable
        );
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            StatusClass::Retriable
        );
        assert_eq!(classify_status(StatusCode::NOT_FOUND), StatusClass::Fatal);
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED),
            StatusClass::Fatal
        );
    }

    #[test]
    fn test_backoff_delay_caps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(30), BACKOFF_CAP);
    }

    #[test]
    fn test_truncate_char_boundary() {
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
