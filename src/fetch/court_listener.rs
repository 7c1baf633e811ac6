//! CourtListener adapter for Supreme Court opinions.
//!
//! Authenticated via `COURT_LISTENER_API_TOKEN`. Listing pages the opinion
//! endpoint ordered by cluster filing date; fetching joins the opinion
//! detail with its cluster record to recover the case name, filing date,
//! and Bluebook citation. The `html_with_citations` variant is reduced to
//! plain text before the chunker sees it.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use super::http::HttpSource;
use super::{DocumentFetcher, strip_html};
use crate::citation::{CitationRecord, bluebook_citation};
use crate::document::{Document, DocumentType, SourceMetadata};
use crate::error::FetchError;

/// Minimum inter-request interval (authenticated tier).
const MIN_INTERVAL: Duration = Duration::from_millis(100);
/// Source tag recorded on produced documents.
const SOURCE: &str = "courtlistener";
/// Production API root.
const DEFAULT_BASE_URL: &str = "https://www.courtlistener.com/api/rest/v4";

#[derive(Debug, Deserialize)]
struct OpinionListPage {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<OpinionListItem>,
}

#[derive(Debug, Deserialize)]
struct OpinionListItem {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct OpinionDetail {
    id: i64,
    #[serde(default)]
    absolute_url: Option<String>,
    #[serde(default)]
    html_with_citations: Option<String>,
    #[serde(default)]
    plain_text: Option<String>,
    /// Hyperlink to the cluster record.
    #[serde(default)]
    cluster: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClusterDetail {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    case_name: String,
    #[serde(default)]
    date_filed: String,
    #[serde(default)]
    citations: Vec<CitationRecord>,
}

/// Supreme Court opinion fetcher backed by CourtListener.
#[derive(Debug)]
pub struct CourtListenerFetcher {
    http: HttpSource,
    base_url: String,
}

impl CourtListenerFetcher {
    /// Creates a fetcher with the given API token.
    #[must_use]
    pub fn new(api_token: &str, max_retries: u32, request_timeout: Duration) -> Self {
        Self {
            http: HttpSource::new(SOURCE, MIN_INTERVAL, max_retries, request_timeout)
                .with_header("Authorization", format!("Token {api_token}")),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Overrides the API root (tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_cluster(&self, url: &str) -> Result<ClusterDetail, FetchError> {
        self.http.get_json(url, &[]).await
    }
}

#[async_trait]
impl DocumentFetcher for CourtListenerFetcher {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn doc_type(&self) -> DocumentType {
        DocumentType::CourtOpinion
    }

    fn rate_limit(&self) -> Duration {
        MIN_INTERVAL
    }

    async fn list_ids(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<String>, FetchError> {
        let mut ids = Vec::new();
        let mut url = format!("{}/opinions/", self.base_url);
        let mut query: Vec<(&str, String)> = vec![
            ("cluster__date_filed__gte", start.to_string()),
            ("cluster__date_filed__lte", end.to_string()),
            ("cluster__docket__court", "scotus".to_string()),
            ("order_by", "cluster__date_filed".to_string()),
            ("fields", "id".to_string()),
        ];

        loop {
            let page: OpinionListPage = self.http.get_json(&url, &query).await?;
            ids.extend(page.results.iter().map(|item| item.id.to_string()));
            match page.next {
                // The `next` link already carries the query string.
                Some(next) => {
                    url = next;
                    query.clear();
                }
                None => break,
            }
        }
        debug!(count = ids.len(), %start, %end, "listed opinion ids");
        Ok(ids)
    }

    async fn fetch(&self, id: &str) -> Result<Document, FetchError> {
        let detail_url = format!("{}/opinions/{id}/", self.base_url);
        let detail: OpinionDetail = self.http.get_json(&detail_url, &[]).await?;

        let cluster = match &detail.cluster {
            Some(cluster_url) => self.fetch_cluster(cluster_url).await?,
            None => ClusterDetail {
                id: None,
                case_name: String::new(),
                date_filed: String::new(),
                citations: Vec::new(),
            },
        };

        let text = detail
            .html_with_citations
            .as_deref()
            .filter(|html| !html.trim().is_empty())
            .map(strip_html)
            .or_else(|| detail.plain_text.clone())
            .unwrap_or_default();

        let date = NaiveDate::parse_from_str(&cluster.date_filed, "%Y-%m-%d").map_err(|_| {
            FetchError::MalformedResponse {
                source_name: SOURCE,
                message: format!(
                    "opinion {id}: unparseable cluster date_filed {:?}",
                    cluster.date_filed
                ),
            }
        })?;

        let citation = bluebook_citation(&cluster.citations, &cluster.date_filed);
        let url = detail.absolute_url.map_or_else(
            || format!("https://www.courtlistener.com/opinion/{id}/"),
            |path| format!("https://www.courtlistener.com{path}"),
        );

        Ok(Document {
            id: detail.id.to_string(),
            title: cluster.case_name.clone(),
            date,
            doc_type: DocumentType::CourtOpinion,
            source: SOURCE,
            text,
            url,
            metadata: SourceMetadata::Opinion {
                case_name: cluster.case_name,
                citation,
                cluster_id: cluster.id,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_page_deserialization() {
        let json = r#"{
            "count": 2,
            "next": "https://www.courtlistener.com/api/rest/v4/opinions/?page=2",
            "previous": null,
            "results": [{"id": 9506542}, {"id": 9506543}]
        }"#;
        let page: OpinionListPage = serde_json::from_str(json).unwrap_or_else(|_| {
            OpinionListPage {
                next: None,
                results: Vec::new(),
            }
        });
        assert_eq!(page.results.len(), 2);
        assert!(page.next.is_some());
    }

    #[test]
    fn test_cluster_deserialization_with_citations() {
        let json = r#"{
            "id": 123,
            "case_name": "CFPB v. CFSA",
            "date_filed": "2024-05-16",
            "citations": [
                {"volume": 601, "reporter": "U.S.", "page": "416", "type": 1},
                {"volume": 144, "reporter": "S. Ct.", "page": "1474", "type": 2}
            ]
        }"#;
        let cluster: ClusterDetail = serde_json::from_str(json).unwrap_or_else(|_| ClusterDetail {
            id: None,
            case_name: String::new(),
            date_filed: String::new(),
            citations: Vec::new(),
        });
        assert_eq!(cluster.case_name, "CFPB v. CFSA");
        assert_eq!(
            bluebook_citation(&cluster.citations, &cluster.date_filed),
            "601 U.S. 416 (2024)"
        );
    }

    #[test]
    fn test_detail_missing_fields_tolerated() {
        let json = r#"{"id": 1}"#;
        let detail: OpinionDetail = serde_json::from_str(json).unwrap_or_else(|_| OpinionDetail {
            id: 0,
            absolute_url: None,
            html_with_citations: None,
            plain_text: None,
            cluster: None,
        });
        assert_eq!(detail.id, 1);
        assert!(detail.cluster.is_none());
    }

    #[test]
    fn test_fetcher_declares_contract() {
        let fetcher = CourtListenerFetcher::new("tok", 3, Duration::from_secs(30));
        assert_eq!(fetcher.name(), "courtlistener");
        assert_eq!(fetcher.doc_type(), DocumentType::CourtOpinion);
        assert_eq!(fetcher.rate_limit(), Duration::from_millis(100));
    }
}
