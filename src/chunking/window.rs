//! Token-budgeted sliding window over paragraph sequences.
//!
//! The shared primitive behind both document chunkers. Paragraphs are
//! accumulated greedily; oversized paragraphs split at sentence boundaries,
//! oversized sentences at whitespace. Consecutive chunks within one call
//! share an overlap tail of `round(overlap_ratio × target_tokens)` tokens
//! taken on a paragraph-or-sentence boundary. Callers invoke the window once
//! per structural section, which is what keeps overlap from crossing
//! section boundaries.

use unicode_segmentation::UnicodeSegmentation;

use super::tokenizer::Tokenizer;
use crate::config::ChunkingConfig;

/// One emitted window with its exact token count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowChunk {
    /// Joined chunk text.
    pub text: String,
    /// Exact token count of `text`.
    pub token_count: usize,
    /// Index (into the caller's paragraph slice) of the first fresh
    /// paragraph in this chunk, i.e. excluding the overlap seed.
    pub start_paragraph: usize,
}

/// An indivisible accumulation unit: a paragraph, or a piece of one.
#[derive(Debug, Clone)]
struct Unit {
    text: String,
    tokens: usize,
    /// Paragraph index this unit came from.
    paragraph: usize,
    /// Joined with a space instead of a blank line (sentence/word pieces).
    space_joined: bool,
}

/// Separator token cost charged when estimating the joined size.
const SEP_COST: usize = 1;

/// Segments `paragraphs` into token-bounded chunks.
///
/// Empty or whitespace-only input yields an empty list. Every chunk's token
/// count lies within `[min_tokens, max_tokens]` except a final short tail
/// that could not be merged without breaching `max_tokens`.
#[must_use]
pub fn sliding_window(
    paragraphs: &[String],
    config: &ChunkingConfig,
    tok: &Tokenizer,
) -> Vec<WindowChunk> {
    let units = build_units(paragraphs, config.max_tokens, tok);
    if units.is_empty() {
        return Vec::new();
    }

    let overlap_budget = config.overlap_tokens();
    let mut chunks: Vec<WindowChunk> = Vec::new();
    // Units currently accumulated: (unit, is_fresh)
    let mut current: Vec<(Unit, bool)> = Vec::new();
    let mut current_tokens = 0usize;

    for unit in units {
        let sep = if current.is_empty() { 0 } else { SEP_COST };
        if !current.is_empty() && current_tokens + sep + unit.tokens > config.max_tokens {
            emit(&mut chunks, &current, tok);
            seed_overlap(&mut current, &mut current_tokens, overlap_budget);
        }
        let sep = if current.is_empty() { 0 } else { SEP_COST };
        current_tokens += sep + unit.tokens;
        current.push((unit, true));

        if current_tokens >= config.target_tokens {
            emit(&mut chunks, &current, tok);
            seed_overlap(&mut current, &mut current_tokens, overlap_budget);
        }
    }

    // Trailing units: emit only if any fresh content remains (a pure overlap
    // seed would duplicate the previous chunk's tail).
    if current.iter().any(|(_, fresh)| *fresh) {
        emit(&mut chunks, &current, tok);
    }

    merge_short_tail(&mut chunks, config, tok);
    chunks
}

/// Splits paragraphs into units no larger than `max_tokens`.
fn build_units(paragraphs: &[String], max_tokens: usize, tok: &Tokenizer) -> Vec<Unit> {
    let mut units = Vec::new();
    for (idx, paragraph) in paragraphs.iter().enumerate() {
        let trimmed = paragraph.trim();
        if trimmed.is_empty() {
            continue;
        }
        let tokens = tok.count(trimmed);
        if tokens <= max_tokens {
            units.push(Unit {
                text: trimmed.to_string(),
                tokens,
                paragraph: idx,
                space_joined: false,
            });
            continue;
        }
        // Paragraph exceeds the ceiling: split at sentence boundaries.
        for sentence in trimmed.unicode_sentences() {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            let tokens = tok.count(sentence);
            if tokens <= max_tokens {
                units.push(Unit {
                    text: sentence.to_string(),
                    tokens,
                    paragraph: idx,
                    space_joined: true,
                });
            } else {
                // Sentence still exceeds: split at whitespace.
                split_words(sentence, idx, max_tokens, tok, &mut units);
            }
        }
    }
    units
}

/// Greedily groups whitespace-separated words into units under the ceiling.
fn split_words(
    sentence: &str,
    paragraph: usize,
    max_tokens: usize,
    tok: &Tokenizer,
    units: &mut Vec<Unit>,
) {
    let mut piece = String::new();
    let mut piece_tokens = 0usize;
    for word in sentence.split_whitespace() {
        let word_tokens = tok.count(word);
        let sep = if piece.is_empty() { 0 } else { SEP_COST };
        if !piece.is_empty() && piece_tokens + sep + word_tokens > max_tokens {
            units.push(Unit {
                text: std::mem::take(&mut piece),
                tokens: piece_tokens,
                paragraph,
                space_joined: true,
            });
            piece_tokens = 0;
        }
        if !piece.is_empty() {
            piece.push(' ');
            piece_tokens += SEP_COST;
        }
        piece.push_str(word);
        piece_tokens += word_tokens;
    }
    if !piece.is_empty() {
        units.push(Unit {
            text: piece,
            tokens: piece_tokens,
            paragraph,
            space_joined: true,
        });
    }
}

/// Joins the accumulated units and appends the chunk with an exact recount.
fn emit(chunks: &mut Vec<WindowChunk>, current: &[(Unit, bool)], tok: &Tokenizer) {
    let Some(start_paragraph) = current
        .iter()
        .find(|(_, fresh)| *fresh)
        .or_else(|| current.first())
        .map(|(u, _)| u.paragraph)
    else {
        return;
    };
    let mut text = String::new();
    for (unit, _) in current {
        if !text.is_empty() {
            text.push_str(if unit.space_joined { " " } else { "\n\n" });
        }
        text.push_str(&unit.text);
    }
    let token_count = tok.count(&text);
    chunks.push(WindowChunk {
        text,
        token_count,
        start_paragraph,
    });
}

/// Replaces the accumulator with the trailing units of the just-emitted
/// chunk, up to the overlap budget. Units become non-fresh so a trailing
/// pure-overlap accumulator is never emitted.
fn seed_overlap(current: &mut Vec<(Unit, bool)>, current_tokens: &mut usize, budget: usize) {
    if budget == 0 {
        current.clear();
        *current_tokens = 0;
        return;
    }
    let mut tail: Vec<(Unit, bool)> = Vec::new();
    let mut total = 0usize;
    for (unit, _) in current.iter().rev() {
        let sep = if tail.is_empty() { 0 } else { SEP_COST };
        if total + sep + unit.tokens > budget {
            break;
        }
        total += sep + unit.tokens;
        tail.push((unit.clone(), false));
    }
    tail.reverse();
    *current_tokens = total;
    *current = tail;
}

/// Merges a sub-minimum final chunk into its predecessor when the combined
/// size stays within the ceiling.
fn merge_short_tail(chunks: &mut Vec<WindowChunk>, config: &ChunkingConfig, tok: &Tokenizer) {
    if chunks.len() < 2 {
        return;
    }
    let Some(last) = chunks.last() else { return };
    if last.token_count >= config.min_tokens {
        return;
    }
    let prev = &chunks[chunks.len() - 2];
    let merged_text = format!("{}\n\n{}", prev.text, last.text);
    let merged_tokens = tok.count(&merged_text);
    if merged_tokens <= config.max_tokens {
        let start = prev.start_paragraph;
        chunks.pop();
        chunks.pop();
        chunks.push(WindowChunk {
            text: merged_text,
            token_count: merged_tokens,
            start_paragraph: start,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok() -> Tokenizer {
        Tokenizer::new().unwrap_or_else(|_| unreachable!())
    }

    fn config(min: usize, target: usize, max: usize, overlap: f32) -> ChunkingConfig {
        ChunkingConfig {
            min_tokens: min,
            target_tokens: target,
            max_tokens: max,
            overlap_ratio: overlap,
        }
    }

    /// A paragraph of roughly `n` tokens of filler prose.
    fn paragraph(n: usize, seed: usize) -> String {
        (0..n)
            .map(|i| format!("word{}", (seed * 31 + i) % 97))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_empty_input() {
        let t = tok();
        assert!(sliding_window(&[], &config(10, 20, 30, 0.1), &t).is_empty());
        assert!(
            sliding_window(
                &["   ".to_string(), "\n".to_string()],
                &config(10, 20, 30, 0.1),
                &t
            )
            .is_empty()
        );
    }

    #[test]
    fn test_single_small_paragraph() {
        let t = tok();
        let chunks = sliding_window(
            &["short paragraph".to_string()],
            &config(1, 20, 30, 0.0),
            &t,
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short paragraph");
        assert_eq!(chunks[0].start_paragraph, 0);
    }

    #[test]
    fn test_token_bounds_hold() {
        let t = tok();
        let cfg = config(50, 80, 120, 0.1);
        let paragraphs: Vec<String> = (0..12).map(|i| paragraph(30, i)).collect();
        let chunks = sliding_window(&paragraphs, &cfg, &t);
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(
                chunk.token_count <= cfg.max_tokens,
                "chunk {i} exceeds max: {}",
                chunk.token_count
            );
            if i + 1 < chunks.len() {
                assert!(
                    chunk.token_count >= cfg.min_tokens,
                    "non-final chunk {i} below min: {}",
                    chunk.token_count
                );
            }
        }
    }

    #[test]
    fn test_overlap_tail_repeats_content() {
        let t = tok();
        // Overlap budget is round(0.25 × 60) = 15 tokens; paragraphs of 5
        // words stay under it so the tail paragraph carries over.
        let cfg = config(40, 60, 100, 0.25);
        let paragraphs: Vec<String> = (0..16).map(|i| paragraph(5, i)).collect();
        let chunks = sliding_window(&paragraphs, &cfg, &t);
        assert!(chunks.len() >= 2);
        // The second chunk starts with the tail paragraph of the first.
        let first_tail = chunks[0]
            .text
            .rsplit("\n\n")
            .next()
            .unwrap_or_default()
            .to_string();
        assert!(
            chunks[1].text.starts_with(&first_tail),
            "expected overlap tail to lead the next chunk"
        );
    }

    #[test]
    fn test_zero_overlap() {
        let t = tok();
        let cfg = config(40, 60, 100, 0.0);
        let paragraphs: Vec<String> = (0..8).map(|i| paragraph(25, i)).collect();
        let chunks = sliding_window(&paragraphs, &cfg, &t);
        assert!(chunks.len() >= 2);
        // No chunk repeats its predecessor's tail.
        let first_tail = chunks[0].text.rsplit("\n\n").next().unwrap_or_default();
        assert!(!chunks[1].text.starts_with(first_tail));
        // Concatenation with no overlap reproduces every paragraph once.
        let joined: String = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        for p in &paragraphs {
            assert_eq!(joined.matches(p.as_str()).count(), 1);
        }
    }

    #[test]
    fn test_oversized_paragraph_splits_at_sentences() {
        let t = tok();
        let cfg = config(10, 40, 60, 0.0);
        // One paragraph of many sentences, far above max_tokens.
        let big: String = (0..30)
            .map(|i| format!("Sentence number {i} talks about appropriations. "))
            .collect();
        let chunks = sliding_window(&[big], &cfg, &t);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= cfg.max_tokens);
        }
    }

    #[test]
    fn test_oversized_sentence_splits_at_whitespace() {
        let t = tok();
        let cfg = config(5, 20, 30, 0.0);
        // A single "sentence" with no punctuation, above max_tokens.
        let big = paragraph(200, 7);
        let chunks = sliding_window(&[big], &cfg, &t);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= cfg.max_tokens);
        }
    }

    #[test]
    fn test_short_tail_merges() {
        let t = tok();
        // Generous max so the tail merge always fits.
        let cfg = config(25, 30, 200, 0.0);
        let paragraphs = vec![paragraph(30, 1), paragraph(3, 2)];
        let chunks = sliding_window(&paragraphs, &cfg, &t);
        assert_eq!(chunks.len(), 1, "short tail should merge into predecessor");
    }

    #[test]
    fn test_short_tail_kept_when_merge_would_overflow() {
        let t = tok();
        // First paragraph fills a chunk; merging the short tail back in
        // would breach max_tokens, so the tail stays.
        let cfg = config(25, 30, 70, 0.0);
        let paragraphs = vec![paragraph(30, 1), paragraph(8, 2)];
        let chunks = sliding_window(&paragraphs, &cfg, &t);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].token_count < cfg.min_tokens);
    }

    #[test]
    fn test_start_paragraph_tracks_fresh_content() {
        let t = tok();
        let cfg = config(20, 28, 40, 0.2);
        let paragraphs: Vec<String> = (0..6).map(|i| paragraph(25, i)).collect();
        let chunks = sliding_window(&paragraphs, &cfg, &t);
        assert_eq!(chunks[0].start_paragraph, 0);
        let mut last = 0;
        for chunk in &chunks {
            assert!(chunk.start_paragraph >= last);
            last = chunk.start_paragraph;
        }
    }
}
