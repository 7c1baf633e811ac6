//! Provider abstraction for chat completions.
//!
//! The enricher depends on this trait rather than a concrete SDK; the MCP
//! server and pipeline receive a provider through the application wiring,
//! and tests inject canned implementations.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use crate::error::LlmError;

/// A chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Sends a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] on API failures.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;
}
