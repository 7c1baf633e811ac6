//! MCP server implementation for govreporter.
//!
//! Exposes the stored collections as typed search tools and the upstream
//! sources as URI-addressable resources. Tool arguments translate into the
//! typed filter AST; resource reads dispatch on URI scheme to the matching
//! fetcher so returned documents are always fresh rather than served from
//! the vector store.

use std::sync::Arc;
use std::time::Duration;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    AnnotateAble, CallToolResult, Content, ErrorCode, Implementation, ListResourceTemplatesResult,
    ListResourcesResult, PaginatedRequestParams, ProtocolVersion, RawResourceTemplate,
    ReadResourceRequestParams, ReadResourceResult, ResourceContents, ServerCapabilities,
    ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, tool, tool_handler, tool_router};

use super::params::{GetDocumentParams, GovSearchParams, OpinionSearchParams, OrderSearchParams};
use crate::app::Application;
use crate::document::DocumentType;
use crate::query::{shape_collections, shape_search_results, shape_single};
use crate::vector::{Filter, ScoredChunk};

/// Deadline applied to every tool handler.
const REQUEST_DEADLINE: Duration = Duration::from_secs(60);

/// JSON-RPC error code for upstream (external API) failures.
const UPSTREAM_ERROR: ErrorCode = ErrorCode(-32000);

/// Govreporter MCP server.
///
/// Handlers treat their inputs as owned and share no mutable state; the
/// [`Application`] behind the `Arc` is immutable wiring.
#[derive(Clone)]
pub struct GovMcpServer {
    tool_router: ToolRouter<Self>,
    app: Arc<Application>,
}

#[tool_router]
impl GovMcpServer {
    /// Cross-collection semantic search.
    #[tool(
        name = "search_government_documents",
        description = "Semantic search across all indexed US federal documents (Supreme Court opinions and executive orders). Returns ranked chunks with hierarchical context and document metadata."
    )]
    async fn search_government_documents(
        &self,
        Parameters(params): Parameters<GovSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        self.with_deadline(async {
            let collections = resolve_collections(params.document_types.as_deref())?;
            let limit = self.clamp_limit(params.limit);
            let hits = self
                .search_collections(&params.query, &collections, None, limit)
                .await?;
            Ok(self.shaped(&params.query, hits))
        })
        .await
    }

    /// Filtered search over Supreme Court opinions.
    #[tool(
        name = "search_court_opinions",
        description = "Semantic search over Supreme Court opinions with optional filters: opinion_type (syllabus, majority, concurring, dissenting, concurring_in_part_dissenting_in_part), authoring_justice, and a publication date range."
    )]
    async fn search_court_opinions(
        &self,
        Parameters(params): Parameters<OpinionSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        self.with_deadline(async {
            let mut filter = Filter::new();
            if let Some(opinion_type) = &params.opinion_type {
                filter = filter.eq("opinion_type", normalize_opinion_type(opinion_type)?);
            }
            if let Some(justice) = &params.authoring_justice {
                filter = filter.eq("authoring_justice", justice.clone());
            }
            filter = filter.date_range(
                parse_date_param("date_from", params.date_from.as_deref())?,
                parse_date_param("date_to", params.date_to.as_deref())?,
            );

            let limit = self.clamp_limit(params.limit);
            let hits = self
                .search_collections(
                    &params.query,
                    &[DocumentType::CourtOpinion.collection()],
                    Some(&filter),
                    limit,
                )
                .await?;
            Ok(self.shaped(&params.query, hits))
        })
        .await
    }

    /// Filtered search over executive orders.
    #[tool(
        name = "search_executive_orders",
        description = "Semantic search over presidential executive orders with optional filters: president, agencies (any match), policy_topics (any match), and a publication date range."
    )]
    async fn search_executive_orders(
        &self,
        Parameters(params): Parameters<OrderSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        self.with_deadline(async {
            let mut filter = Filter::new();
            if let Some(president) = &params.president {
                filter = filter.eq("president", president.clone());
            }
            if let Some(agencies) = params.agencies.clone() {
                filter = filter.any_of("agencies", agencies);
            }
            if let Some(topics) = params.policy_topics.clone() {
                filter = filter.any_of("policy_topics", topics);
            }
            filter = filter.date_range(
                parse_date_param("date_from", params.date_from.as_deref())?,
                parse_date_param("date_to", params.date_to.as_deref())?,
            );

            let limit = self.clamp_limit(params.limit);
            let hits = self
                .search_collections(
                    &params.query,
                    &[DocumentType::ExecutiveOrder.collection()],
                    Some(&filter),
                    limit,
                )
                .await?;
            Ok(self.shaped(&params.query, hits))
        })
        .await
    }

    /// Fetch one stored chunk payload by id.
    #[tool(
        name = "get_document_by_id",
        description = "Retrieve a single stored chunk by its id and collection. Returns the chunk text with its structural labels and document metadata."
    )]
    async fn get_document_by_id(
        &self,
        Parameters(params): Parameters<GetDocumentParams>,
    ) -> Result<CallToolResult, McpError> {
        self.with_deadline(async {
            let collection = DocumentType::parse(&params.collection)
                .map(DocumentType::collection)
                .ok_or_else(|| {
                    McpError::invalid_params(
                        format!("unknown collection: {}", params.collection),
                        None,
                    )
                })?;
            let payload = self
                .app
                .store
                .get_by_id(collection, &params.id)
                .await
                .map_err(internal)?
                .ok_or_else(|| {
                    McpError::invalid_params(
                        format!("no chunk {} in {collection}", params.id),
                        None,
                    )
                })?;
            Ok(CallToolResult::success(vec![Content::text(shape_single(
                &payload,
            ))]))
        })
        .await
    }

    /// Collection inventory.
    #[tool(
        name = "list_collections",
        description = "List the vector-store collections with document chunk counts, vector dimensions, and distance metric."
    )]
    async fn list_collections(&self) -> Result<CallToolResult, McpError> {
        self.with_deadline(async {
            let collections = self.app.store.list_collections().await.map_err(internal)?;
            Ok(CallToolResult::success(vec![Content::text(
                shape_collections(&collections),
            )]))
        })
        .await
    }
}

impl GovMcpServer {
    /// Creates the server around an application.
    #[must_use]
    pub fn new(app: Arc<Application>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            app,
        }
    }

    /// Applies the per-request deadline; on expiry the handler returns a
    /// protocol error and the server keeps serving.
    async fn with_deadline(
        &self,
        fut: impl Future<Output = Result<CallToolResult, McpError>>,
    ) -> Result<CallToolResult, McpError> {
        tokio::time::timeout(REQUEST_DEADLINE, fut)
            .await
            .map_err(|_| {
                McpError::internal_error(
                    format!("request deadline {}s elapsed", REQUEST_DEADLINE.as_secs()),
                    None,
                )
            })?
    }

    fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.app.config.default_search_limit)
            .clamp(1, self.app.config.max_search_limit)
    }

    /// Embeds the query once and searches each collection, merging by score.
    async fn search_collections(
        &self,
        query: &str,
        collections: &[&str],
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, McpError> {
        if query.trim().is_empty() {
            return Err(McpError::invalid_params("query cannot be empty", None));
        }
        let vector = self
            .app
            .embed_query(query)
            .await
            .map_err(|e| McpError::new(UPSTREAM_ERROR, e.to_string(), None))?;

        let mut hits = Vec::new();
        for collection in collections {
            let found = self
                .app
                .store
                .semantic_search(collection, vector.clone(), limit, filter)
                .await
                .map_err(internal)?;
            hits.extend(found);
        }
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    fn shaped(&self, query: &str, hits: Vec<ScoredChunk>) -> CallToolResult {
        let text = shape_search_results(query, &hits, &self.app.shaper_config());
        CallToolResult::success(vec![Content::text(text)])
    }
}

#[tool_handler]
impl ServerHandler for GovMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "govreporter".to_string(),
                title: Some("US Government Document Search".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: Some("https://github.com/govreporter/govreporter-rs".to_string()),
            },
            instructions: Some(
                "Semantic search over US federal legal documents. Use the search tools \
                 for ranked chunk retrieval with filters; read opinion://{id} or \
                 order://{document_number} resources for complete, freshly fetched \
                 documents."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        // Documents are addressable through the URI templates; enumerating
        // every stored document here would be unbounded.
        Ok(ListResourcesResult {
            resources: Vec::new(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParams { uri, .. }: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let (doc_type, id) = if let Some(id) = uri.strip_prefix("opinion://") {
            (DocumentType::CourtOpinion, id)
        } else if let Some(id) = uri.strip_prefix("order://") {
            (DocumentType::ExecutiveOrder, id)
        } else {
            return Err(McpError::invalid_params(
                format!("invalid URI scheme, expected opinion:// or order://: {uri}"),
                None,
            ));
        };
        if id.is_empty() {
            return Err(McpError::invalid_params(
                format!("missing document id in URI: {uri}"),
                None,
            ));
        }

        let fetcher = self
            .app
            .fetcher(doc_type)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        // Resources bypass the vector store so the text is always current.
        let document = tokio::time::timeout(self.app.config.timeouts.fetch, fetcher.fetch(id))
            .await
            .map_err(|_| {
                McpError::new(
                    UPSTREAM_ERROR,
                    format!("fetch deadline elapsed for {uri}"),
                    None,
                )
            })?
            .map_err(|e| McpError::new(UPSTREAM_ERROR, e.to_string(), None))?;

        let header = format!(
            "{} ({}, {})\n{}\n\n",
            document.title, document.date, document.source, document.url
        );
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(
                format!("{header}{}", document.text),
                uri,
            )],
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        let opinion_template = RawResourceTemplate {
            uri_template: "opinion://{id}".to_string(),
            name: "Supreme Court opinion".to_string(),
            title: None,
            description: Some(
                "Fetches the complete, current text of an opinion from CourtListener by its \
                 opinion id. Bypasses the vector store."
                    .to_string(),
            ),
            mime_type: Some("text/plain".to_string()),
            icons: None,
        };

        let order_template = RawResourceTemplate {
            uri_template: "order://{document_number}".to_string(),
            name: "Executive order".to_string(),
            title: None,
            description: Some(
                "Fetches the complete, current text of an executive order from the Federal \
                 Register by its document number. Bypasses the vector store."
                    .to_string(),
            ),
            mime_type: Some("text/plain".to_string()),
            icons: None,
        };

        Ok(ListResourceTemplatesResult {
            resource_templates: vec![
                opinion_template.no_annotation(),
                order_template.no_annotation(),
            ],
            next_cursor: None,
            meta: None,
        })
    }
}

fn internal(e: impl std::fmt::Display) -> McpError {
    McpError::internal_error(e.to_string(), None)
}

/// Maps `document_types` arguments to collection names; absent means both.
fn resolve_collections(types: Option<&[String]>) -> Result<Vec<&'static str>, McpError> {
    let Some(types) = types.filter(|t| !t.is_empty()) else {
        return Ok(vec![
            DocumentType::CourtOpinion.collection(),
            DocumentType::ExecutiveOrder.collection(),
        ]);
    };
    let mut collections = Vec::new();
    for t in types {
        let doc_type = DocumentType::parse(t).ok_or_else(|| {
            McpError::invalid_params(format!("unknown document type: {t}"), None)
        })?;
        let collection = doc_type.collection();
        if !collections.contains(&collection) {
            collections.push(collection);
        }
    }
    Ok(collections)
}

/// Validates an opinion-type argument against the known labels.
fn normalize_opinion_type(raw: &str) -> Result<String, McpError> {
    let normalized = raw.trim().to_lowercase().replace([' ', '-'], "_");
    match normalized.as_str() {
        "syllabus" | "majority" | "concurring" | "dissenting"
        | "concurring_in_part_dissenting_in_part" => Ok(normalized),
        "concurring_in_part_and_dissenting_in_part" => {
            Ok("concurring_in_part_dissenting_in_part".to_string())
        }
        _ => Err(McpError::invalid_params(
            format!("unknown opinion_type: {raw}"),
            None,
        )),
    }
}

/// Parses a `YYYY-MM-DD` date argument.
fn parse_date_param(
    name: &str,
    value: Option<&str>,
) -> Result<Option<chrono::NaiveDate>, McpError> {
    value
        .map(|v| {
            chrono::NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| {
                McpError::invalid_params(format!("{name} must be YYYY-MM-DD, got {v:?}"), None)
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_collections_default_is_both() {
        let collections = resolve_collections(None).unwrap_or_default();
        assert_eq!(collections, vec!["court_opinions", "executive_orders"]);
        let collections = resolve_collections(Some(&[])).unwrap_or_default();
        assert_eq!(collections.len(), 2);
    }

    #[test]
    fn test_resolve_collections_dedupes() {
        let types = vec!["opinion".to_string(), "court_opinions".to_string()];
        let collections = resolve_collections(Some(&types)).unwrap_or_default();
        assert_eq!(collections, vec!["court_opinions"]);
    }

    #[test]
    fn test_resolve_collections_rejects_unknown() {
        let types = vec!["statutes".to_string()];
        assert!(resolve_collections(Some(&types)).is_err());
    }

    #[test]
    fn test_normalize_opinion_type() {
        assert_eq!(
            normalize_opinion_type("Majority").unwrap_or_default(),
            "majority"
        );
        assert_eq!(
            normalize_opinion_type("concurring in part and dissenting in part")
                .unwrap_or_default(),
            "concurring_in_part_dissenting_in_part"
        );
        assert!(normalize_opinion_type("plurality").is_err());
    }

    #[test]
    fn test_parse_date_param() {
        assert_eq!(
            parse_date_param("date_from", Some("2024-01-01")).unwrap_or_default(),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert!(parse_date_param("date_from", Some("01/01/2024")).is_err());
        assert_eq!(parse_date_param("date_from", None).unwrap_or(None), None);
    }
}
