//! Federal Register adapter for presidential executive orders.
//!
//! Unauthenticated; the public API allows 60 requests per minute, so the
//! gate spaces requests 1.1 s apart. Listing pages the documents endpoint
//! filtered to executive orders, oldest first; fetching reads the document
//! detail and then follows its `raw_text_url` for the full body text.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use super::http::HttpSource;
use super::{DocumentFetcher, strip_html};
use crate::document::{Document, DocumentType, SourceMetadata};
use crate::error::FetchError;

/// Minimum inter-request interval (≤ 60 req/min with headroom).
const MIN_INTERVAL: Duration = Duration::from_millis(1100);
/// Source tag recorded on produced documents.
const SOURCE: &str = "federal_register";
/// Production API root.
const DEFAULT_BASE_URL: &str = "https://www.federalregister.gov/api/v1";

#[derive(Debug, Deserialize)]
struct DocumentListPage {
    #[serde(default)]
    next_page_url: Option<String>,
    #[serde(default)]
    results: Vec<DocumentListItem>,
}

#[derive(Debug, Deserialize)]
struct DocumentListItem {
    document_number: String,
}

#[derive(Debug, Deserialize)]
struct President {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct OrderDetail {
    document_number: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    publication_date: String,
    #[serde(default)]
    signing_date: Option<String>,
    #[serde(default)]
    executive_order_number: Option<serde_json::Value>,
    #[serde(default)]
    president: Option<President>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    raw_text_url: Option<String>,
}

/// Executive order fetcher backed by the Federal Register.
#[derive(Debug)]
pub struct FederalRegisterFetcher {
    http: HttpSource,
    base_url: String,
}

impl FederalRegisterFetcher {
    /// Creates a fetcher.
    #[must_use]
    pub fn new(max_retries: u32, request_timeout: Duration) -> Self {
        Self {
            http: HttpSource::new(SOURCE, MIN_INTERVAL, max_retries, request_timeout),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Overrides the API root (tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl DocumentFetcher for FederalRegisterFetcher {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn doc_type(&self) -> DocumentType {
        DocumentType::ExecutiveOrder
    }

    fn rate_limit(&self) -> Duration {
        MIN_INTERVAL
    }

    async fn list_ids(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<String>, FetchError> {
        let mut ids = Vec::new();
        let mut url = format!("{}/documents.json", self.base_url);
        let mut query: Vec<(&str, String)> = vec![
            ("conditions[type][]", "PRESDOCU".to_string()),
            (
                "conditions[presidential_document_type][]",
                "executive_order".to_string(),
            ),
            ("conditions[publication_date][gte]", start.to_string()),
            ("conditions[publication_date][lte]", end.to_string()),
            ("order", "oldest".to_string()),
            ("per_page", "100".to_string()),
            ("fields[]", "document_number".to_string()),
        ];

        loop {
            let page: DocumentListPage = self.http.get_json(&url, &query).await?;
            ids.extend(page.results.into_iter().map(|item| item.document_number));
            match page.next_page_url {
                Some(next) => {
                    url = next;
                    query.clear();
                }
                None => break,
            }
        }
        debug!(count = ids.len(), %start, %end, "listed executive order ids");
        Ok(ids)
    }

    async fn fetch(&self, id: &str) -> Result<Document, FetchError> {
        let detail_url = format!("{}/documents/{id}.json", self.base_url);
        let detail: OrderDetail = self.http.get_json(&detail_url, &[]).await?;

        // Full body text lives behind a secondary URL in the detail response.
        let text = match &detail.raw_text_url {
            Some(raw_url) => strip_html(&self.http.get_text(raw_url, &[]).await?),
            None => String::new(),
        };

        let date = NaiveDate::parse_from_str(&detail.publication_date, "%Y-%m-%d").map_err(
            |_| FetchError::MalformedResponse {
                source_name: SOURCE,
                message: format!(
                    "order {id}: unparseable publication_date {:?}",
                    detail.publication_date
                ),
            },
        )?;

        let signing_date = detail
            .signing_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        let url = detail.html_url.unwrap_or_else(|| {
            format!(
                "https://www.federalregister.gov/documents/{}",
                detail.document_number
            )
        });

        Ok(Document {
            id: detail.document_number.clone(),
            title: detail.title.clone(),
            date,
            doc_type: DocumentType::ExecutiveOrder,
            source: SOURCE,
            text,
            url,
            metadata: SourceMetadata::Order {
                executive_order_number: order_number_string(detail.executive_order_number.as_ref()),
                president: detail.president.map(|p| p.name).unwrap_or_default(),
                signing_date,
            },
        })
    }
}

/// The API serves the order number as either a number or a string.
fn order_number_string(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_page_deserialization() {
        let json = r#"{
            "count": 1,
            "next_page_url": null,
            "results": [{"document_number": "2024-02006"}]
        }"#;
        let page: DocumentListPage = serde_json::from_str(json).unwrap_or_else(|_| {
            DocumentListPage {
                next_page_url: None,
                results: Vec::new(),
            }
        });
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].document_number, "2024-02006");
    }

    #[test]
    fn test_detail_numeric_and_string_order_numbers() {
        let numeric = serde_json::json!(14110);
        assert_eq!(order_number_string(Some(&numeric)), "14110");
        let string = serde_json::json!("14110");
        assert_eq!(order_number_string(Some(&string)), "14110");
        assert_eq!(order_number_string(None), "");
    }

    #[test]
    fn test_detail_deserialization() {
        let json = r#"{
            "document_number": "2023-24283",
            "title": "Safe, Secure, and Trustworthy Development and Use of Artificial Intelligence",
            "publication_date": "2023-11-01",
            "signing_date": "2023-10-30",
            "executive_order_number": 14110,
            "president": {"name": "Joseph R. Biden Jr."},
            "html_url": "https://www.federalregister.gov/documents/2023/11/01/2023-24283",
            "raw_text_url": "https://www.federalregister.gov/documents/full_text/text/2023/11/01/2023-24283.txt"
        }"#;
        let detail: OrderDetail = serde_json::from_str(json).unwrap_or_else(|_| OrderDetail {
            document_number: String::new(),
            title: String::new(),
            publication_date: String::new(),
            signing_date: None,
            executive_order_number: None,
            president: None,
            html_url: None,
            raw_text_url: None,
        });
        assert_eq!(detail.document_number, "2023-24283");
        assert_eq!(
            detail.president.as_ref().map(|p| p.name.as_str()),
            Some("Joseph R. Biden Jr.")
        );
        assert!(detail.raw_text_url.is_some());
    }

    #[test]
    fn test_fetcher_declares_contract() {
        let fetcher = FederalRegisterFetcher::new(3, Duration::from_secs(30));
        assert_eq!(fetcher.name(), "federal_register");
        assert_eq!(fetcher.doc_type(), DocumentType::ExecutiveOrder);
        assert_eq!(fetcher.rate_limit(), Duration::from_millis(1100));
    }
}
