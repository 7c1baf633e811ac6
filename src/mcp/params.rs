//! MCP tool parameter types.
//!
//! Defines the input schemas for MCP tools using `schemars` for automatic
//! JSON Schema generation required by the MCP protocol.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `search_government_documents` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GovSearchParams {
    /// Natural-language search query.
    pub query: String,

    /// Restrict to document types: `"court_opinion"`, `"executive_order"`.
    /// Absent means both.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_types: Option<Vec<String>>,

    /// Maximum results to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Parameters for the `search_court_opinions` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OpinionSearchParams {
    /// Natural-language search query.
    pub query: String,

    /// Opinion type: `"syllabus"`, `"majority"`, `"concurring"`,
    /// `"dissenting"`, or `"concurring_in_part_dissenting_in_part"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opinion_type: Option<String>,

    /// Authoring justice's last name, e.g. `"Thomas"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authoring_justice: Option<String>,

    /// Earliest publication date, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,

    /// Latest publication date, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,

    /// Maximum results to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Parameters for the `search_executive_orders` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OrderSearchParams {
    /// Natural-language search query.
    pub query: String,

    /// Signing president's name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub president: Option<String>,

    /// Impacted agencies (any match).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agencies: Option<Vec<String>>,

    /// Policy topics (any match).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_topics: Option<Vec<String>>,

    /// Earliest publication date, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,

    /// Latest publication date, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,

    /// Maximum results to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Parameters for the `get_document_by_id` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetDocumentParams {
    /// Deterministic chunk id (md5 hex) as returned by search results.
    pub id: String,

    /// Collection name: `"court_opinions"` or `"executive_orders"`.
    pub collection: String,
}
