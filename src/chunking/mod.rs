//! Structurally-aware document segmentation.
//!
//! Both chunkers share one token-budgeted sliding-window primitive and a
//! BPE tokenizer aligned with the embedding model:
//!
//! ```text
//! Document text
//!   ├── opinion::chunk_opinion  (opinion-type spans → I/II/A sections)
//!   └── order::chunk_order      (header → Sec. N. blocks → tail)
//!         ↓ per structural section
//! window::sliding_window        (accumulate → emit → overlap tail)
//!         ↓
//! Vec<Chunk> with exact token counts and structural labels
//! ```
//!
//! Malformed input is never fatal: text without structural markers becomes
//! a single unlabeled span, and empty text yields no chunks.

pub mod opinion;
pub mod order;
pub mod tokenizer;
pub mod window;

pub use opinion::chunk_opinion;
pub use order::chunk_order;
pub use tokenizer::Tokenizer;
pub use window::{WindowChunk, sliding_window};

use crate::config::ChunkingConfig;
use crate::document::{Chunk, DocumentType};

/// Chunks a document of the given type with its resolved token budget.
#[must_use]
pub fn chunk_document(
    doc_type: DocumentType,
    text: &str,
    config: &ChunkingConfig,
    tok: &Tokenizer,
) -> Vec<Chunk> {
    match doc_type {
        DocumentType::CourtOpinion => chunk_opinion(text, config, tok),
        DocumentType::ExecutiveOrder => chunk_order(text, config, tok),
    }
}
