//! LLM-driven document-level metadata extraction.
//!
//! One JSON-mode request per document. The response is schema-validated and
//! every citation or agency code that cannot be found as a literal substring
//! of the source text (after whitespace normalization) is dropped, so the
//! stored metadata never contains hallucinated references.
//!
//! Enrichment never fails a document: a response that still fails schema
//! validation after one stricter retry degrades to an empty record with a
//! warning.

use std::sync::Arc;

use tracing::warn;

use crate::document::{Document, DocumentType, Enrichment, OpinionEnrichment, OrderEnrichment};
use crate::error::EnrichError;
use crate::llm::{ChatRequest, LlmProvider, system_message, user_message};

/// Ceiling on the document text sent to the model.
const MAX_PROMPT_CHARS: usize = 48_000;
/// Response token budget; enrichment records are small.
const MAX_RESPONSE_TOKENS: u32 = 2_048;

const OPINION_SYSTEM_PROMPT: &str = "\
You are a legal metadata extractor for Supreme Court opinions. Given the text \
of an opinion, return a JSON object with exactly these fields:\n\
  summary: a 1-2 sentence technical summary of the decision\n\
  topics: array of legal topic strings\n\
  constitutional_provisions: array of constitutional provisions cited verbatim in the text\n\
  statute_citations: array of statute citations appearing verbatim in the text\n\
  key_questions: array of the key legal questions presented\n\
  holding: the holding as a single sentence, or null\n\
  vote_breakdown: the vote split such as \"7-2\", or null\n\
Only include citations that literally appear in the text. Return JSON only.";

const ORDER_SYSTEM_PROMPT: &str = "\
You are a policy metadata extractor for presidential executive orders. Given \
the text of an order, return a JSON object with exactly these fields:\n\
  summary: a 1-2 sentence policy summary\n\
  policy_topics: array of policy topic strings\n\
  agencies: array of impacted agency codes or names appearing verbatim in the text\n\
  legal_authorities: array of U.S. Code / CFR citations appearing verbatim in the text\n\
  related_orders: array of prior executive orders referenced, revoked, or amended\n\
  economic_sectors: array of affected economic sectors\n\
Only include citations and agency codes that literally appear in the text. \
Return JSON only.";

const STRICT_SUFFIX: &str = "\n\nIMPORTANT: Respond with ONLY a single JSON object. \
No prose, no markdown fences, no trailing commentary. Every field must be present; \
use null or [] when a value is unknown.";

/// Extracts a document-level [`Enrichment`] record via a chat provider.
pub struct Enricher {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl Enricher {
    /// Creates an enricher using the given provider and model.
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Enriches a document, degrading to an empty record on any failure.
    ///
    /// The first attempt uses the standard prompt; a schema failure triggers
    /// one retry with a stricter prompt. Both outcomes are validated against
    /// the source text before being returned.
    pub async fn enrich(&self, doc: &Document) -> Enrichment {
        match self.attempt(doc, false).await {
            Ok(enrichment) => validate(&doc.text, enrichment),
            Err(first_err) => match self.attempt(doc, true).await {
                Ok(enrichment) => validate(&doc.text, enrichment),
                Err(second_err) => {
                    warn!(
                        document_id = %doc.id,
                        first = %first_err,
                        second = %second_err,
                        "enrichment failed after strict retry; proceeding with empty record"
                    );
                    Enrichment::empty(doc.doc_type)
                }
            },
        }
    }

    async fn attempt(&self, doc: &Document, strict: bool) -> Result<Enrichment, EnrichError> {
        let mut system = match doc.doc_type {
            DocumentType::CourtOpinion => OPINION_SYSTEM_PROMPT.to_string(),
            DocumentType::ExecutiveOrder => ORDER_SYSTEM_PROMPT.to_string(),
        };
        if strict {
            system.push_str(STRICT_SUFFIX);
        }

        let text = truncate_chars(&doc.text, MAX_PROMPT_CHARS);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                system_message(&system),
                user_message(&format!("Title: {}\n\n{}", doc.title, text)),
            ],
            temperature: Some(0.0),
            max_tokens: Some(MAX_RESPONSE_TOKENS),
            json_mode: true,
        };

        let response =
            self.provider
                .chat(&request)
                .await
                .map_err(|e| EnrichError::ApiRequest {
                    message: e.to_string(),
                })?;

        parse_response(doc.doc_type, &response.content)
    }
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Parses the model output, tolerating markdown code fences.
fn parse_response(doc_type: DocumentType, content: &str) -> Result<Enrichment, EnrichError> {
    let trimmed = content.trim();
    let json_str = if trimmed.starts_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    };

    let map_err = |e: serde_json::Error| EnrichError::SchemaValidation {
        message: format!(
            "{e}; response length {} bytes, preview: {:?}",
            json_str.len(),
            truncate_chars(json_str, 200)
        ),
    };

    match doc_type {
        DocumentType::CourtOpinion => serde_json::from_str::<OpinionEnrichment>(json_str)
            .map(Enrichment::Opinion)
            .map_err(map_err),
        DocumentType::ExecutiveOrder => serde_json::from_str::<OrderEnrichment>(json_str)
            .map(Enrichment::Order)
            .map_err(map_err),
    }
}

/// Drops extracted references that do not occur in the source text.
fn validate(text: &str, enrichment: Enrichment) -> Enrichment {
    let haystack = normalize_ws(text);
    let mut keep = |field: &'static str, values: Vec<String>| -> Vec<String> {
        let (kept, dropped): (Vec<String>, Vec<String>) = values
            .into_iter()
            .partition(|v| haystack.contains(&normalize_ws(v)));
        if !dropped.is_empty() {
            warn!(field, dropped = ?dropped, "dropping references not found in source text");
        }
        kept
    };

    match enrichment {
        Enrichment::Opinion(mut e) => {
            e.constitutional_provisions =
                keep("constitutional_provisions", e.constitutional_provisions);
            e.statute_citations = keep("statute_citations", e.statute_citations);
            Enrichment::Opinion(e)
        }
        Enrichment::Order(mut e) => {
            e.agencies = keep("agencies", e.agencies);
            e.legal_authorities = keep("legal_authorities", e.legal_authorities);
            e.related_orders = keep("related_orders", e.related_orders);
            Enrichment::Order(e)
        }
    }
}

/// Collapses runs of whitespace to single spaces.
fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates at a char boundary near `limit` bytes.
fn truncate_chars(s: &str, limit: usize) -> &str {
    if s.len() <= limit {
        return s;
    }
    let mut end = limit;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::document::SourceMetadata;
    use crate::error::LlmError;
    use crate::llm::ChatResponse;

    /// Provider returning a scripted sequence of responses.
    struct ScriptedProvider {
        responses: Mutex<Vec<String>>,
        calls: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().map(|c| *c).unwrap_or(0)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, LlmError> {
            if let Ok(mut calls) = self.calls.lock() {
                *calls += 1;
            }
            let content = self
                .responses
                .lock()
                .ok()
                .and_then(|mut r| r.pop())
                .unwrap_or_default();
            Ok(ChatResponse {
                content,
                finish_reason: Some("stop".to_string()),
            })
        }
    }

    fn opinion_doc(text: &str) -> Document {
        Document {
            id: "op-1".to_string(),
            title: "Test v. Case".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap_or_default(),
            doc_type: DocumentType::CourtOpinion,
            source: "courtlistener",
            text: text.to_string(),
            url: String::new(),
            metadata: SourceMetadata::Opinion {
                case_name: "Test v. Case".to_string(),
                citation: String::new(),
                cluster_id: None,
            },
        }
    }

    #[tokio::test]
    async fn test_valid_response_parsed() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"summary": "The Court held X.", "topics": ["appropriations"],
                "constitutional_provisions": ["Appropriations Clause"],
                "statute_citations": [], "key_questions": [], "holding": null,
                "vote_breakdown": "7-2"}"#,
        ]));
        let enricher = Enricher::new(provider.clone(), "test-model");
        let doc = opinion_doc("The Appropriations Clause controls this case.");
        match enricher.enrich(&doc).await {
            Enrichment::Opinion(e) => {
                assert_eq!(e.summary.as_deref(), Some("The Court held X."));
                assert_eq!(e.constitutional_provisions, vec!["Appropriations Clause"]);
                assert_eq!(e.vote_breakdown.as_deref(), Some("7-2"));
            }
            Enrichment::Order(_) => unreachable!(),
        }
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_hallucinated_citation_dropped() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"summary": "s", "constitutional_provisions":
                ["Appropriations Clause", "Third Amendment"],
                "statute_citations": ["12 U.S.C. 5497"]}"#,
        ]));
        let enricher = Enricher::new(provider, "test-model");
        let doc = opinion_doc("The Appropriations   Clause and 12 U.S.C. 5497 appear here.");
        match enricher.enrich(&doc).await {
            Enrichment::Opinion(e) => {
                // Whitespace-normalized match keeps the first, drops the hallucination
                assert_eq!(e.constitutional_provisions, vec!["Appropriations Clause"]);
                assert_eq!(e.statute_citations, vec!["12 U.S.C. 5497"]);
            }
            Enrichment::Order(_) => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_retries_then_empty() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "this is not json",
            "still not json",
        ]));
        let enricher = Enricher::new(provider.clone(), "test-model");
        let doc = opinion_doc("text");
        match enricher.enrich(&doc).await {
            Enrichment::Opinion(e) => assert_eq!(e, OpinionEnrichment::default()),
            Enrichment::Order(_) => unreachable!(),
        }
        assert_eq!(provider.call_count(), 2, "expected one strict retry");
    }

    #[tokio::test]
    async fn test_code_fence_tolerated() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "```json\n{\"summary\": \"fenced\"}\n```",
        ]));
        let enricher = Enricher::new(provider, "test-model");
        let doc = opinion_doc("text");
        match enricher.enrich(&doc).await {
            Enrichment::Opinion(e) => assert_eq!(e.summary.as_deref(), Some("fenced")),
            Enrichment::Order(_) => unreachable!(),
        }
    }

    #[test]
    fn test_normalize_ws() {
        assert_eq!(normalize_ws("a  b\n\tc"), "a b c");
    }

    #[test]
    fn test_truncate_chars_boundary() {
        let s = "héllo wörld";
        let t = truncate_chars(s, 3);
        assert!(t.len() <= 3);
        assert!(s.starts_with(t));
    }
}
