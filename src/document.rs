//! Core data model: documents, chunks, and persisted payloads.
//!
//! The vector-store payload is a discriminated union with one variant per
//! document type. Serialization uses an internal `document_type` tag so the
//! stored map stays flat and every field is directly addressable by the
//! filter translation layer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The two document types the system ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// A Supreme Court opinion.
    CourtOpinion,
    /// A presidential executive order.
    ExecutiveOrder,
}

impl DocumentType {
    /// Returns the canonical snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CourtOpinion => "court_opinion",
            Self::ExecutiveOrder => "executive_order",
        }
    }

    /// Returns the vector-store collection name for this type.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::CourtOpinion => "court_opinions",
            Self::ExecutiveOrder => "executive_orders",
        }
    }

    /// Parses a type name, accepting both singular and collection forms.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "court_opinion" | "court_opinions" | "opinion" | "opinions" => {
                Some(Self::CourtOpinion)
            }
            "executive_order" | "executive_orders" | "order" | "orders" => {
                Some(Self::ExecutiveOrder)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific document metadata attached by the fetcher.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceMetadata {
    /// CourtListener opinion metadata.
    Opinion {
        /// Case name from the cluster record, e.g. "CFPB v. CFSA".
        case_name: String,
        /// Bluebook citation assembled from the cluster, possibly empty.
        citation: String,
        /// CourtListener cluster id.
        cluster_id: Option<i64>,
    },
    /// Federal Register executive-order metadata.
    Order {
        /// Executive order number, e.g. "14110".
        executive_order_number: String,
        /// Signing president's name.
        president: String,
        /// Signing date, if published.
        signing_date: Option<NaiveDate>,
    },
}

/// An ingestible document produced by a fetcher.
///
/// Immutable after construction; the chunker consumes it by reference.
#[derive(Debug, Clone)]
pub struct Document {
    /// Stable source-assigned id.
    pub id: String,
    /// Document title.
    pub title: String,
    /// Publication date.
    pub date: NaiveDate,
    /// Document type.
    pub doc_type: DocumentType,
    /// Source tag, e.g. "courtlistener" or "federal_register".
    pub source: &'static str,
    /// Plain text (markup stripped by the fetcher).
    pub text: String,
    /// Authoritative URL.
    pub url: String,
    /// Type-specific metadata.
    pub metadata: SourceMetadata,
}

/// Opinion-type label for a chunk of a Supreme Court opinion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpinionType {
    /// The syllabus prepared by the Reporter of Decisions.
    Syllabus,
    /// The opinion of the Court (including per curiam).
    Majority,
    /// A concurring opinion.
    Concurring,
    /// A dissenting opinion.
    Dissenting,
    /// An opinion concurring in part and dissenting in part.
    #[serde(rename = "concurring_in_part_dissenting_in_part")]
    Mixed,
}

impl OpinionType {
    /// Returns the serialized form used in payloads and filters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Syllabus => "syllabus",
            Self::Majority => "majority",
            Self::Concurring => "concurring",
            Self::Dissenting => "dissenting",
            Self::Mixed => "concurring_in_part_dissenting_in_part",
        }
    }
}

/// Structural block type for a chunk of an executive order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderChunkType {
    /// Title and preamble up to and including "it is hereby ordered".
    Header,
    /// A numbered `Sec. N.` block.
    Section,
    /// Signature and filing blocks.
    Tail,
}

impl OrderChunkType {
    /// Returns the serialized form used in payloads and filters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Section => "section",
            Self::Tail => "tail",
        }
    }
}

/// Structural labels attached to a chunk by the type-specific chunker.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkLabels {
    /// Labels for a court-opinion chunk.
    Opinion {
        /// Which opinion this chunk belongs to.
        opinion_type: OpinionType,
        /// Authoring justice, when the opinion-type marker names one.
        authoring_justice: Option<String>,
        /// Roman-numeral / lettered section label, e.g. "II" or "II.A".
        section_label: Option<String>,
    },
    /// Labels for an executive-order chunk.
    Order {
        /// Structural block type.
        chunk_type: OrderChunkType,
        /// Section heading, e.g. "Sec. 2. Policy.".
        section_title: Option<String>,
        /// Subsection label, e.g. "(a)" or "(1)".
        subsection_label: Option<String>,
    },
}

/// A contiguous span of a document emitted by the chunker.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Chunk text.
    pub text: String,
    /// Monotone index within the parent document.
    pub chunk_index: usize,
    /// Exact token count under the embedding tokenizer.
    pub token_count: usize,
    /// Structural labels.
    pub labels: ChunkLabels,
}

/// Deterministic chunk id: `hex(md5(document_id || "_chunk_" || chunk_index))`.
#[must_use]
pub fn chunk_id(document_id: &str, chunk_index: usize) -> String {
    format!(
        "{:x}",
        md5::compute(format!("{document_id}_chunk_{chunk_index}"))
    )
}

/// Formats the same 16 md5 bytes as a UUID for stores that require
/// integer-or-UUID point ids. The mapping is bijective with [`chunk_id`].
#[must_use]
pub fn chunk_point_uuid(document_id: &str, chunk_index: usize) -> String {
    let digest = md5::compute(format!("{document_id}_chunk_{chunk_index}"));
    let b = digest.0;
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12], b[13],
        b[14], b[15]
    )
}

/// Numeric shadow of an ISO date (`YYYYMMDD`) stored alongside the string
/// form so date-range filters translate to integer range conditions.
#[must_use]
pub fn date_num(date: NaiveDate) -> i64 {
    use chrono::Datelike;
    i64::from(date.year()) * 10_000 + i64::from(date.month()) * 100 + i64::from(date.day())
}

/// LLM-extracted document-level metadata for a court opinion.
///
/// All fields default to empty; a document whose enrichment failed proceeds
/// with `OpinionEnrichment::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpinionEnrichment {
    /// 1-2 sentence technical summary.
    #[serde(default)]
    pub summary: Option<String>,
    /// Legal topics, e.g. "separation of powers".
    #[serde(default)]
    pub topics: Vec<String>,
    /// Constitutional provisions cited, validated against the text.
    #[serde(default)]
    pub constitutional_provisions: Vec<String>,
    /// Statute citations, validated against the text.
    #[serde(default)]
    pub statute_citations: Vec<String>,
    /// Key legal questions presented.
    #[serde(default)]
    pub key_questions: Vec<String>,
    /// The holding, if extractable.
    #[serde(default)]
    pub holding: Option<String>,
    /// Vote breakdown, e.g. "7-2".
    #[serde(default)]
    pub vote_breakdown: Option<String>,
}

/// LLM-extracted document-level metadata for an executive order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEnrichment {
    /// 1-2 sentence policy summary.
    #[serde(default)]
    pub summary: Option<String>,
    /// Policy topics, e.g. "immigration".
    #[serde(default)]
    pub policy_topics: Vec<String>,
    /// Impacted agency codes, validated against the text.
    #[serde(default)]
    pub agencies: Vec<String>,
    /// U.S. Code / CFR citations, validated against the text.
    #[serde(default)]
    pub legal_authorities: Vec<String>,
    /// Prior orders referenced, revoked, or amended.
    #[serde(default)]
    pub related_orders: Vec<String>,
    /// Economic sectors affected.
    #[serde(default)]
    pub economic_sectors: Vec<String>,
}

/// Document-level enrichment record, one variant per document type.
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    /// Court-opinion enrichment.
    Opinion(OpinionEnrichment),
    /// Executive-order enrichment.
    Order(OrderEnrichment),
}

impl Enrichment {
    /// Returns the empty enrichment record for a document type.
    #[must_use]
    pub fn empty(doc_type: DocumentType) -> Self {
        match doc_type {
            DocumentType::CourtOpinion => Self::Opinion(OpinionEnrichment::default()),
            DocumentType::ExecutiveOrder => Self::Order(OrderEnrichment::default()),
        }
    }
}

/// Persisted payload for a court-opinion chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpinionPayload {
    /// Deterministic chunk id (md5 hex).
    pub chunk_id: String,
    /// Parent document id.
    pub document_id: String,
    /// Document title.
    pub title: String,
    /// Publication date, ISO-8601.
    pub date: String,
    /// Numeric date shadow for range filters.
    pub date_num: i64,
    /// Authoritative URL.
    pub url: String,
    /// Source tag.
    pub source: String,
    /// Chunk text.
    pub text: String,
    /// Monotone chunk index.
    pub chunk_index: usize,
    /// Exact token count.
    pub token_count: usize,
    /// Opinion-type label.
    pub opinion_type: OpinionType,
    /// Authoring justice, when known.
    #[serde(default)]
    pub authoring_justice: Option<String>,
    /// Section label within the opinion.
    #[serde(default)]
    pub section_label: Option<String>,
    /// Case name.
    pub case_name: String,
    /// Bluebook citation, possibly empty.
    pub citation: String,
    /// Document-level enrichment.
    #[serde(flatten)]
    pub enrichment: OpinionEnrichment,
}

/// Persisted payload for an executive-order chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPayload {
    /// Deterministic chunk id (md5 hex).
    pub chunk_id: String,
    /// Parent document id.
    pub document_id: String,
    /// Document title.
    pub title: String,
    /// Publication date, ISO-8601.
    pub date: String,
    /// Numeric date shadow for range filters.
    pub date_num: i64,
    /// Authoritative URL.
    pub url: String,
    /// Source tag.
    pub source: String,
    /// Chunk text.
    pub text: String,
    /// Monotone chunk index.
    pub chunk_index: usize,
    /// Exact token count.
    pub token_count: usize,
    /// Structural block type.
    pub chunk_type: OrderChunkType,
    /// Section heading.
    #[serde(default)]
    pub section_title: Option<String>,
    /// Subsection label.
    #[serde(default)]
    pub subsection_label: Option<String>,
    /// Executive order number.
    pub executive_order_number: String,
    /// Signing president.
    pub president: String,
    /// Signing date, ISO-8601.
    #[serde(default)]
    pub signing_date: Option<String>,
    /// Document-level enrichment.
    #[serde(flatten)]
    pub enrichment: OrderEnrichment,
}

/// What gets persisted in the vector store, one variant per document type.
///
/// The internal `document_type` tag keeps the serialized map flat so the
/// filter layer can address every field by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "document_type", rename_all = "snake_case")]
pub enum ChunkPayload {
    /// Court-opinion chunk payload.
    CourtOpinion(OpinionPayload),
    /// Executive-order chunk payload.
    ExecutiveOrder(OrderPayload),
}

impl ChunkPayload {
    /// Builds the payload for one chunk of a document.
    ///
    /// The labels variant must match the document type; a mismatch falls
    /// back to unlabeled defaults rather than panicking (the chunkers never
    /// produce one in practice).
    #[must_use]
    pub fn build(doc: &Document, chunk: &Chunk, enrichment: &Enrichment) -> Self {
        let id = chunk_id(&doc.id, chunk.chunk_index);
        match doc.doc_type {
            DocumentType::CourtOpinion => {
                let (opinion_type, authoring_justice, section_label) = match &chunk.labels {
                    ChunkLabels::Opinion {
                        opinion_type,
                        authoring_justice,
                        section_label,
                    } => (
                        *opinion_type,
                        authoring_justice.clone(),
                        section_label.clone(),
                    ),
                    ChunkLabels::Order { .. } => (OpinionType::Majority, None, None),
                };
                let (case_name, citation) = match &doc.metadata {
                    SourceMetadata::Opinion {
                        case_name,
                        citation,
                        ..
                    } => (case_name.clone(), citation.clone()),
                    SourceMetadata::Order { .. } => (String::new(), String::new()),
                };
                let enrichment = match enrichment {
                    Enrichment::Opinion(e) => e.clone(),
                    Enrichment::Order(_) => OpinionEnrichment::default(),
                };
                Self::CourtOpinion(OpinionPayload {
                    chunk_id: id,
                    document_id: doc.id.clone(),
                    title: doc.title.clone(),
                    date: doc.date.to_string(),
                    date_num: date_num(doc.date),
                    url: doc.url.clone(),
                    source: doc.source.to_string(),
                    text: chunk.text.clone(),
                    chunk_index: chunk.chunk_index,
                    token_count: chunk.token_count,
                    opinion_type,
                    authoring_justice,
                    section_label,
                    case_name,
                    citation,
                    enrichment,
                })
            }
            DocumentType::ExecutiveOrder => {
                let (chunk_type, section_title, subsection_label) = match &chunk.labels {
                    ChunkLabels::Order {
                        chunk_type,
                        section_title,
                        subsection_label,
                    } => (*chunk_type, section_title.clone(), subsection_label.clone()),
                    ChunkLabels::Opinion { .. } => (OrderChunkType::Section, None, None),
                };
                let (executive_order_number, president, signing_date) = match &doc.metadata {
                    SourceMetadata::Order {
                        executive_order_number,
                        president,
                        signing_date,
                    } => (
                        executive_order_number.clone(),
                        president.clone(),
                        signing_date.map(|d| d.to_string()),
                    ),
                    SourceMetadata::Opinion { .. } => (String::new(), String::new(), None),
                };
                let enrichment = match enrichment {
                    Enrichment::Order(e) => e.clone(),
                    Enrichment::Opinion(_) => OrderEnrichment::default(),
                };
                Self::ExecutiveOrder(OrderPayload {
                    chunk_id: id,
                    document_id: doc.id.clone(),
                    title: doc.title.clone(),
                    date: doc.date.to_string(),
                    date_num: date_num(doc.date),
                    url: doc.url.clone(),
                    source: doc.source.to_string(),
                    text: chunk.text.clone(),
                    chunk_index: chunk.chunk_index,
                    token_count: chunk.token_count,
                    chunk_type,
                    section_title,
                    subsection_label,
                    executive_order_number,
                    president,
                    signing_date,
                    enrichment,
                })
            }
        }
    }

    /// Deterministic chunk id.
    #[must_use]
    pub fn chunk_id(&self) -> &str {
        match self {
            Self::CourtOpinion(p) => &p.chunk_id,
            Self::ExecutiveOrder(p) => &p.chunk_id,
        }
    }

    /// Parent document id.
    #[must_use]
    pub fn document_id(&self) -> &str {
        match self {
            Self::CourtOpinion(p) => &p.document_id,
            Self::ExecutiveOrder(p) => &p.document_id,
        }
    }

    /// Chunk text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::CourtOpinion(p) => &p.text,
            Self::ExecutiveOrder(p) => &p.text,
        }
    }

    /// Monotone chunk index.
    #[must_use]
    pub const fn chunk_index(&self) -> usize {
        match self {
            Self::CourtOpinion(p) => p.chunk_index,
            Self::ExecutiveOrder(p) => p.chunk_index,
        }
    }

    /// Document type of this payload.
    #[must_use]
    pub const fn doc_type(&self) -> DocumentType {
        match self {
            Self::CourtOpinion(_) => DocumentType::CourtOpinion,
            Self::ExecutiveOrder(_) => DocumentType::ExecutiveOrder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_opinion_doc() -> Document {
        Document {
            id: "op-9000".to_string(),
            title: "CFPB v. CFSA".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 16).unwrap_or_default(),
            doc_type: DocumentType::CourtOpinion,
            source: "courtlistener",
            text: "The Appropriations Clause ...".to_string(),
            url: "https://www.courtlistener.com/opinion/9000/".to_string(),
            metadata: SourceMetadata::Opinion {
                case_name: "CFPB v. CFSA".to_string(),
                citation: "601 U.S. 416 (2024)".to_string(),
                cluster_id: Some(123),
            },
        }
    }

    #[test]
    fn test_chunk_id_deterministic() {
        let a = chunk_id("op-9000", 0);
        let b = chunk_id("op-9000", 0);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, chunk_id("op-9000", 1));
        assert_ne!(a, chunk_id("op-9001", 0));
    }

    #[test]
    fn test_chunk_point_uuid_shape() {
        let uuid = chunk_point_uuid("op-9000", 0);
        assert_eq!(uuid.len(), 36);
        assert_eq!(uuid.matches('-').count(), 4);
        // Same bytes as the hex id, reformatted
        let hex = chunk_id("op-9000", 0);
        assert_eq!(uuid.replace('-', ""), hex);
    }

    #[test]
    fn test_date_num() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 16).unwrap_or_default();
        assert_eq!(date_num(d), 20_240_516);
    }

    #[test]
    fn test_document_type_parse() {
        assert_eq!(
            DocumentType::parse("opinions"),
            Some(DocumentType::CourtOpinion)
        );
        assert_eq!(
            DocumentType::parse("court_opinions"),
            Some(DocumentType::CourtOpinion)
        );
        assert_eq!(
            DocumentType::parse("executive_order"),
            Some(DocumentType::ExecutiveOrder)
        );
        assert_eq!(DocumentType::parse("statute"), None);
    }

    #[test]
    fn test_payload_roundtrip_flat_tag() {
        let doc = sample_opinion_doc();
        let chunk = Chunk {
            text: "The Appropriations Clause ...".to_string(),
            chunk_index: 0,
            token_count: 7,
            labels: ChunkLabels::Opinion {
                opinion_type: OpinionType::Majority,
                authoring_justice: Some("Thomas".to_string()),
                section_label: Some("II".to_string()),
            },
        };
        let payload = ChunkPayload::build(&doc, &chunk, &Enrichment::empty(doc.doc_type));

        let json = serde_json::to_value(&payload).unwrap_or_default();
        assert_eq!(json["document_type"], "court_opinion");
        assert_eq!(json["opinion_type"], "majority");
        assert_eq!(json["authoring_justice"], "Thomas");
        assert_eq!(json["date_num"], 20_240_516);
        // Enrichment flattens to the top level
        assert!(json.get("topics").is_some());

        let back: ChunkPayload = serde_json::from_value(json).unwrap_or_else(|_| {
            ChunkPayload::CourtOpinion(OpinionPayload {
                chunk_id: String::new(),
                document_id: String::new(),
                title: String::new(),
                date: String::new(),
                date_num: 0,
                url: String::new(),
                source: String::new(),
                text: String::new(),
                chunk_index: 99,
                token_count: 0,
                opinion_type: OpinionType::Syllabus,
                authoring_justice: None,
                section_label: None,
                case_name: String::new(),
                citation: String::new(),
                enrichment: OpinionEnrichment::default(),
            })
        });
        assert_eq!(back, payload);
    }

    #[test]
    fn test_mixed_opinion_type_serialization() {
        let json = serde_json::to_string(&OpinionType::Mixed).unwrap_or_default();
        assert_eq!(json, "\"concurring_in_part_dissenting_in_part\"");
    }

    #[test]
    fn test_enrichment_empty() {
        match Enrichment::empty(DocumentType::CourtOpinion) {
            Enrichment::Opinion(e) => assert!(e.topics.is_empty() && e.summary.is_none()),
            Enrichment::Order(_) => unreachable!(),
        }
    }
}
