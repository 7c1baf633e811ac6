//! LLM provider abstraction for metadata enrichment.
//!
//! One chat-capable provider seam, backed by `OpenAI`-compatible APIs.

pub mod message;
pub mod openai;
pub mod provider;

pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, system_message, user_message};
pub use openai::OpenAiProvider;
pub use provider::LlmProvider;
