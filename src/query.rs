//! Result shaping for MCP tool responses.
//!
//! Stateless transformation from raw search hits to the text block handed
//! back to the LLM: ranked headers with scores, hierarchical context lines,
//! truncated chunk text, document-level metadata, and — when a search comes
//! back small and confident — a hint naming the resource URIs that return
//! the complete documents.

use std::fmt::Write as _;

use crate::document::{ChunkPayload, OpinionPayload, OrderPayload};
use crate::vector::{CollectionSummary, ScoredChunk};

/// Truncation marker appended to over-ceiling chunk text.
const TRUNCATION_MARKER: &str = "… [truncated]";

/// Shaping knobs, sourced from [`AppConfig`](crate::config::AppConfig).
#[derive(Debug, Clone, Copy)]
pub struct ShaperConfig {
    /// Per-hit character ceiling for chunk text.
    pub char_ceiling: usize,
    /// Minimum score every hit must reach before the hint is emitted.
    pub hint_score_threshold: f32,
    /// Maximum number of hits for the hint to be emitted.
    pub hint_max_hits: usize,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            char_ceiling: 2000,
            hint_score_threshold: 0.4,
            hint_max_hits: 3,
        }
    }
}

/// Renders ranked search results.
#[must_use]
pub fn shape_search_results(query: &str, hits: &[ScoredChunk], config: &ShaperConfig) -> String {
    if hits.is_empty() {
        return format!("No results for query: {query}");
    }

    let mut ordered: Vec<&ScoredChunk> = hits.iter().collect();
    ordered.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut out = format!("Results for query: {query}\n");
    for (rank, hit) in ordered.iter().enumerate() {
        let _ = writeln!(
            out,
            "\n[{}] score={:.2} — {}",
            rank + 1,
            hit.score,
            title_line(&hit.payload)
        );
        out.push_str("    ");
        out.push_str(&context_line(&hit.payload));
        out.push('\n');
        out.push_str(&truncate_text(hit.payload.text(), config.char_ceiling));
        out.push('\n');
        out.push_str(&metadata_lines(&hit.payload));
    }

    if let Some(hint) = full_document_hint(&ordered, config) {
        out.push('\n');
        out.push_str(&hint);
    }
    out
}

/// Renders one payload without ranking (`get_document_by_id`).
#[must_use]
pub fn shape_single(payload: &ChunkPayload) -> String {
    let mut out = format!("{}\n", title_line(payload));
    out.push_str(&context_line(payload));
    out.push('\n');
    let _ = writeln!(out, "chunk {} · {} tokens", payload.chunk_index(), token_count(payload));
    out.push('\n');
    out.push_str(payload.text());
    out.push('\n');
    out.push_str(&metadata_lines(payload));
    out
}

/// Renders the collection inventory as a compact table.
#[must_use]
pub fn shape_collections(collections: &[CollectionSummary]) -> String {
    if collections.is_empty() {
        return "No collections.".to_string();
    }
    let name_width = collections
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(0)
        .max("collection".len());
    let mut out = format!("{:<name_width$}  {:>8}  {:>5}  metric\n", "collection", "count", "dim");
    for c in collections {
        let _ = writeln!(
            out,
            "{:<name_width$}  {:>8}  {:>5}  {}",
            c.name, c.count, c.dim, c.metric
        );
    }
    out
}

fn token_count(payload: &ChunkPayload) -> usize {
    match payload {
        ChunkPayload::CourtOpinion(p) => p.token_count,
        ChunkPayload::ExecutiveOrder(p) => p.token_count,
    }
}

/// Title line: case name + citation for opinions, order number + title for
/// executive orders.
fn title_line(payload: &ChunkPayload) -> String {
    match payload {
        ChunkPayload::CourtOpinion(p) => {
            if p.citation.is_empty() {
                format!("{} ({})", display_title(&p.title, &p.case_name), p.date)
            } else {
                format!("{}, {}", display_title(&p.title, &p.case_name), p.citation)
            }
        }
        ChunkPayload::ExecutiveOrder(p) => {
            if p.executive_order_number.is_empty() {
                format!("{} ({})", p.title, p.date)
            } else {
                format!(
                    "Executive Order {}: {} ({})",
                    p.executive_order_number, p.title, p.date
                )
            }
        }
    }
}

fn display_title<'a>(title: &'a str, case_name: &'a str) -> &'a str {
    if case_name.is_empty() { title } else { case_name }
}

/// Hierarchical context: opinion type + section, or order block + section
/// title + subsection.
fn context_line(payload: &ChunkPayload) -> String {
    match payload {
        ChunkPayload::CourtOpinion(p) => opinion_context(p),
        ChunkPayload::ExecutiveOrder(p) => order_context(p),
    }
}

fn opinion_context(p: &OpinionPayload) -> String {
    let mut parts = vec![format!("{} opinion", p.opinion_type.as_str().replace('_', " "))];
    if let Some(justice) = &p.authoring_justice {
        parts.push(format!("by Justice {justice}"));
    }
    if let Some(section) = &p.section_label {
        parts.push(format!("section {section}"));
    }
    parts.join(" · ")
}

fn order_context(p: &OrderPayload) -> String {
    let mut parts = vec![p.chunk_type.as_str().to_string()];
    if let Some(title) = &p.section_title {
        parts.push(title.clone());
    }
    if let Some(sub) = &p.subsection_label {
        parts.push(sub.clone());
    }
    parts.join(" · ")
}

/// Document-level metadata lines (topics, cited provisions, agencies).
fn metadata_lines(payload: &ChunkPayload) -> String {
    let mut out = String::new();
    match payload {
        ChunkPayload::CourtOpinion(p) => {
            if let Some(summary) = &p.enrichment.summary {
                let _ = writeln!(out, "    Summary: {summary}");
            }
            if !p.enrichment.topics.is_empty() {
                let _ = writeln!(out, "    Topics: {}", p.enrichment.topics.join(", "));
            }
            if !p.enrichment.constitutional_provisions.is_empty() {
                let _ = writeln!(
                    out,
                    "    Provisions: {}",
                    p.enrichment.constitutional_provisions.join("; ")
                );
            }
            if let Some(holding) = &p.enrichment.holding {
                let _ = writeln!(out, "    Holding: {holding}");
            }
        }
        ChunkPayload::ExecutiveOrder(p) => {
            if let Some(summary) = &p.enrichment.summary {
                let _ = writeln!(out, "    Summary: {summary}");
            }
            if !p.enrichment.policy_topics.is_empty() {
                let _ = writeln!(out, "    Topics: {}", p.enrichment.policy_topics.join(", "));
            }
            if !p.enrichment.agencies.is_empty() {
                let _ = writeln!(out, "    Agencies: {}", p.enrichment.agencies.join(", "));
            }
        }
    }
    out
}

/// When every hit clears the threshold and the result set is small, name the
/// resource URIs that return the complete documents.
fn full_document_hint(ordered: &[&ScoredChunk], config: &ShaperConfig) -> Option<String> {
    if ordered.is_empty() || ordered.len() > config.hint_max_hits {
        return None;
    }
    if ordered.iter().any(|h| h.score < config.hint_score_threshold) {
        return None;
    }

    let mut seen = std::collections::HashSet::new();
    let mut uris = Vec::new();
    for hit in ordered {
        let uri = match &hit.payload {
            ChunkPayload::CourtOpinion(p) => format!("opinion://{}", p.document_id),
            ChunkPayload::ExecutiveOrder(p) => format!("order://{}", p.document_id),
        };
        if seen.insert(uri.clone()) {
            uris.push(uri);
        }
    }
    let mut hint =
        String::from("These results are strong matches. Full documents are available via:\n");
    for uri in uris {
        let _ = writeln!(hint, "  {uri}");
    }
    Some(hint)
}

/// Truncates at a char boundary under the ceiling, appending the marker.
fn truncate_text(text: &str, ceiling: usize) -> String {
    if text.len() <= ceiling {
        return text.to_string();
    }
    let mut end = ceiling;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{TRUNCATION_MARKER}", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{
        OpinionEnrichment, OpinionType, OrderChunkType, OrderEnrichment, chunk_id,
    };

    fn opinion_hit(score: f32, doc_id: &str, index: usize, text: &str) -> ScoredChunk {
        let payload = ChunkPayload::CourtOpinion(OpinionPayload {
            chunk_id: chunk_id(doc_id, index),
            document_id: doc_id.to_string(),
            title: "CFPB v. CFSA".to_string(),
            date: "2024-05-16".to_string(),
            date_num: 20_240_516,
            url: String::new(),
            source: "courtlistener".to_string(),
            text: text.to_string(),
            chunk_index: index,
            token_count: 42,
            opinion_type: OpinionType::Majority,
            authoring_justice: Some("Thomas".to_string()),
            section_label: Some("II.A".to_string()),
            case_name: "CFPB v. CFSA".to_string(),
            citation: "601 U.S. 416 (2024)".to_string(),
            enrichment: OpinionEnrichment {
                summary: Some("Funding mechanism upheld.".to_string()),
                topics: vec!["appropriations".to_string()],
                ..OpinionEnrichment::default()
            },
        });
        ScoredChunk {
            id: chunk_id(doc_id, index),
            score,
            payload,
        }
    }

    fn order_hit(score: f32, doc_id: &str) -> ScoredChunk {
        let payload = ChunkPayload::ExecutiveOrder(OrderPayload {
            chunk_id: chunk_id(doc_id, 0),
            document_id: doc_id.to_string(),
            title: "AI Safety".to_string(),
            date: "2023-11-01".to_string(),
            date_num: 20_231_101,
            url: String::new(),
            source: "federal_register".to_string(),
            text: "Sec. 1. Purpose.".to_string(),
            chunk_index: 0,
            token_count: 10,
            chunk_type: OrderChunkType::Section,
            section_title: Some("Sec. 1. Purpose.".to_string()),
            subsection_label: None,
            executive_order_number: "14110".to_string(),
            president: "Biden".to_string(),
            signing_date: None,
            enrichment: OrderEnrichment::default(),
        });
        ScoredChunk {
            id: chunk_id(doc_id, 0),
            score,
            payload,
        }
    }

    #[test]
    fn test_results_ordered_by_score() {
        let hits = vec![
            opinion_hit(0.5, "op-1", 0, "lower"),
            opinion_hit(0.9, "op-1", 1, "higher"),
        ];
        let text = shape_search_results("q", &hits, &ShaperConfig::default());
        let first = text.find("higher").unwrap_or(usize::MAX);
        let second = text.find("lower").unwrap_or(0);
        assert!(first < second);
        assert!(text.contains("[1] score=0.90"));
        assert!(text.contains("[2] score=0.50"));
    }

    #[test]
    fn test_header_and_context() {
        let hits = vec![opinion_hit(0.9, "op-1", 0, "body")];
        let text = shape_search_results("q", &hits, &ShaperConfig::default());
        assert!(text.contains("CFPB v. CFSA, 601 U.S. 416 (2024)"));
        assert!(text.contains("majority opinion · by Justice Thomas · section II.A"));
        assert!(text.contains("Summary: Funding mechanism upheld."));
        assert!(text.contains("Topics: appropriations"));
    }

    #[test]
    fn test_truncation() {
        let long = "x".repeat(3000);
        let hits = vec![opinion_hit(0.9, "op-1", 0, &long)];
        let config = ShaperConfig::default();
        let text = shape_search_results("q", &hits, &config);
        assert!(text.contains(TRUNCATION_MARKER));
        // The rendered chunk text is bounded
        assert!(!text.contains(&"x".repeat(2500)));
    }

    #[test]
    fn test_hint_emitted_for_small_confident_results() {
        let hits = vec![
            opinion_hit(0.8, "op-1", 0, "a"),
            order_hit(0.6, "2023-24283"),
        ];
        let text = shape_search_results("q", &hits, &ShaperConfig::default());
        assert!(text.contains("opinion://op-1"));
        assert!(text.contains("order://2023-24283"));
    }

    #[test]
    fn test_hint_suppressed_below_threshold() {
        let hits = vec![opinion_hit(0.8, "op-1", 0, "a"), opinion_hit(0.2, "op-1", 1, "b")];
        let text = shape_search_results("q", &hits, &ShaperConfig::default());
        assert!(!text.contains("opinion://"));
    }

    #[test]
    fn test_hint_suppressed_for_large_result_sets() {
        let hits: Vec<ScoredChunk> = (0..4).map(|i| opinion_hit(0.9, "op-1", i, "t")).collect();
        let text = shape_search_results("q", &hits, &ShaperConfig::default());
        assert!(!text.contains("opinion://"));
    }

    #[test]
    fn test_hint_dedupes_documents() {
        let hits = vec![opinion_hit(0.8, "op-1", 0, "a"), opinion_hit(0.7, "op-1", 1, "b")];
        let text = shape_search_results("q", &hits, &ShaperConfig::default());
        assert_eq!(text.matches("opinion://op-1").count(), 1);
    }

    #[test]
    fn test_empty_results() {
        let text = shape_search_results("nothing", &[], &ShaperConfig::default());
        assert!(text.contains("No results"));
    }

    #[test]
    fn test_shape_single() {
        let hit = order_hit(0.9, "2023-24283");
        let text = shape_single(&hit.payload);
        assert!(text.contains("Executive Order 14110: AI Safety"));
        assert!(text.contains("section · Sec. 1. Purpose."));
        assert!(!text.contains("score="));
    }

    #[test]
    fn test_shape_collections_table() {
        let collections = vec![
            CollectionSummary {
                name: "court_opinions".to_string(),
                count: 1234,
                dim: 1536,
                metric: "cosine".to_string(),
            },
            CollectionSummary {
                name: "executive_orders".to_string(),
                count: 56,
                dim: 1536,
                metric: "cosine".to_string(),
            },
        ];
        let text = shape_collections(&collections);
        assert!(text.contains("court_opinions"));
        assert!(text.contains("1234"));
        assert!(text.contains("cosine"));
        assert!(shape_collections(&[]).contains("No collections"));
    }
}
