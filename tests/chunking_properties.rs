//! Property and round-trip tests for the chunking layer.

use std::sync::LazyLock;

use proptest::prelude::*;

use govreporter::chunking::{Tokenizer, chunk_order, sliding_window};
use govreporter::config::ChunkingConfig;

static TOKENIZER: LazyLock<Tokenizer> =
    LazyLock::new(|| Tokenizer::new().unwrap_or_else(|_| unreachable!()));

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Every emitted chunk respects the token budget; only the final chunk
    /// may fall below the minimum.
    #[test]
    fn window_respects_token_bounds(
        // Paragraphs stay under max - min tokens, so an overflow emission
        // always carries at least min_tokens.
        paragraph_sizes in prop::collection::vec(1usize..10, 1..20),
        overlap in 0u32..30,
    ) {
        let config = ChunkingConfig {
            min_tokens: 30,
            target_tokens: 60,
            max_tokens: 100,
            overlap_ratio: overlap as f32 / 100.0,
        };
        let paragraphs: Vec<String> = paragraph_sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                (0..n).map(|j| format!("tok{}x{}", i, j)).collect::<Vec<_>>().join(" ")
            })
            .collect();

        let chunks = sliding_window(&paragraphs, &config, &TOKENIZER);
        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert!(chunk.token_count <= config.max_tokens,
                "chunk {} over budget: {}", i, chunk.token_count);
            if i + 1 < chunks.len() {
                prop_assert!(chunk.token_count >= config.min_tokens,
                    "non-final chunk {} under budget: {}", i, chunk.token_count);
            }
            prop_assert_eq!(chunk.token_count, TOKENIZER.count(&chunk.text));
        }
    }

    /// With zero overlap, concatenating chunk texts reproduces the input up
    /// to whitespace normalization.
    #[test]
    fn window_zero_overlap_roundtrip(
        paragraph_sizes in prop::collection::vec(3usize..40, 1..15),
    ) {
        let config = ChunkingConfig {
            min_tokens: 20,
            target_tokens: 50,
            max_tokens: 90,
            overlap_ratio: 0.0,
        };
        let paragraphs: Vec<String> = paragraph_sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                (0..n).map(|j| format!("w{}p{}", j, i)).collect::<Vec<_>>().join(" ")
            })
            .collect();

        let chunks = sliding_window(&paragraphs, &config, &TOKENIZER);
        let joined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        prop_assert_eq!(normalize(&joined), normalize(&paragraphs.join(" ")));
    }
}

/// Executive-order chunking with zero overlap loses no text: header,
/// sections, and tail cover the whole document.
#[test]
fn order_chunking_roundtrip_up_to_whitespace() {
    let text = "Executive Order 14200 of February 1, 2025\n\n\
                Strengthening Interagency Data Practices\n\n\
                By the authority vested in me as President by the Constitution and the \
                laws of the United States of America, it is hereby ordered as follows:\n\n\
                Sec. 1. Purpose. Federal data practices require consistent standards \
                across agencies, and this order establishes them.\n\n\
                (a) Each agency shall designate a data officer.\n\n\
                (b) Officers shall report quarterly.\n\n\
                Sec. 2. Policy. It is the policy of the United States to publish \
                machine-readable data wherever practicable.\n\n\
                THE WHITE HOUSE,\n    February 1, 2025.\n\n\
                [FR Doc. 2025-01234 Filed 2-4-25; 8:45 am]";

    let config = ChunkingConfig {
        min_tokens: 5,
        target_tokens: 60,
        max_tokens: 120,
        overlap_ratio: 0.0,
    };
    let chunks = chunk_order(text, &config, &TOKENIZER);
    assert!(chunks.len() >= 3);

    let joined = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    assert_eq!(normalize(&joined), normalize(text));

    // Chunk indices are dense and monotone.
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
    }
}
