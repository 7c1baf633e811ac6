//! MCP (Model Context Protocol) server for govreporter.
//!
//! Exposes the vector-store collections and the upstream document sources
//! to LLM clients over a line-delimited JSON-RPC 2.0 stdio channel.
//!
//! # Architecture
//!
//! ```text
//! MCP client (LLM host)
//!   ├── tools: search_government_documents / search_court_opinions /
//!   │          search_executive_orders / get_document_by_id /
//!   │          list_collections
//!   │     ↓ embed query → filtered vector search → shaped text result
//!   └── resources: opinion://{id}, order://{document_number}
//!         ↓ URI-scheme dispatch → live fetch from the source
//! ```

pub mod params;
pub mod server;
pub mod transport;

pub use params::{GetDocumentParams, GovSearchParams, OpinionSearchParams, OrderSearchParams};
pub use server::GovMcpServer;
pub use transport::serve_stdio;
