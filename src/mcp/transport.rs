//! MCP transport layer.
//!
//! Starts the server on stdio: one JSON-RPC message per line in on stdin,
//! responses out on stdout. Logging must go to stderr — stdout belongs to
//! the protocol.

use rmcp::ServiceExt;
use rmcp::transport::io::stdio;

use super::server::GovMcpServer;

/// Runs the MCP server over stdio until the client disconnects.
///
/// # Errors
///
/// Returns an error if the server fails to start or encounters a runtime
/// error on the transport.
pub async fn serve_stdio(server: GovMcpServer) -> anyhow::Result<()> {
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
