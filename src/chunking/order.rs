//! Structural chunker for presidential executive orders.
//!
//! Partitions the plain text into a header (title and preamble through
//! "it is hereby ordered"), numbered `Sec. N.` sections with lettered or
//! numbered subsections, and a signature/filing tail. Each block goes
//! through the shared sliding window independently; overlap never crosses
//! a section boundary.

use std::sync::LazyLock;

use regex::Regex;

use super::tokenizer::Tokenizer;
use super::window::sliding_window;
use crate::config::ChunkingConfig;
use crate::document::{Chunk, ChunkLabels, OrderChunkType};

/// End of the preamble: "… it is hereby ordered [as follows:]".
#[allow(clippy::unwrap_used)]
static HEREBY_ORDERED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)it is hereby ordered[^\n]*").unwrap()
});

/// Section marker: `Sec. N.` (the Federal Register also prints `Section 1.`).
#[allow(clippy::unwrap_used)]
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*((?:Sec\.|Section)\s+\d+\.)").unwrap()
});

/// Start of the signature/filing tail.
#[allow(clippy::unwrap_used)]
static TAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:THE WHITE HOUSE|\[FR Doc\.)").unwrap()
});

/// Lettered `(a)` or numbered `(1)` subsection marker at line start.
#[allow(clippy::unwrap_used)]
static SUBSECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\([a-z]\)|\(\d{1,2}\))").unwrap()
});

/// Chunks an executive order.
///
/// Empty input yields an empty list; input without any structural marker is
/// chunked as a single unlabeled span.
#[must_use]
pub fn chunk_order(text: &str, config: &ChunkingConfig, tok: &Tokenizer) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let header_end = HEREBY_ORDERED_RE.find(text).map(|m| m.end());
    let section_starts: Vec<usize> = SECTION_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.start()))
        .filter(|&start| header_end.is_none_or(|end| start >= end))
        .collect();

    if header_end.is_none() && section_starts.is_empty() {
        // No structural markers: one unlabeled span through the generic window.
        return chunk_block(
            text,
            OrderChunkType::Section,
            None,
            config,
            tok,
            &mut 0usize,
        );
    }

    let body_start = header_end.unwrap_or(0);
    let tail_start = TAIL_RE
        .find_at(text, section_starts.last().copied().unwrap_or(body_start))
        .map(|m| m.start())
        .filter(|&t| t > body_start);
    let body_end = tail_start.unwrap_or(text.len());

    let mut chunks = Vec::new();
    let mut chunk_index = 0usize;

    // Header: everything before the first section (which includes the
    // "it is hereby ordered" line and anything trailing it), or just the
    // preamble when no sections were found.
    let header_text = match (header_end, section_starts.first()) {
        (_, Some(&first)) => &text[..first],
        (Some(end), None) => &text[..end],
        (None, None) => "",
    };
    chunks.extend(chunk_block(
        header_text,
        OrderChunkType::Header,
        None,
        config,
        tok,
        &mut chunk_index,
    ));

    if section_starts.is_empty() {
        // Preamble found but no sections: the remaining body is one block.
        chunks.extend(chunk_block(
            &text[body_start..body_end],
            OrderChunkType::Section,
            None,
            config,
            tok,
            &mut chunk_index,
        ));
    } else {
        for (i, &start) in section_starts.iter().enumerate() {
            let end = section_starts
                .get(i + 1)
                .copied()
                .unwrap_or(body_end)
                .max(start);
            let section_text = &text[start..end.min(text.len())];
            let title = section_title(section_text);
            chunks.extend(chunk_block(
                section_text,
                OrderChunkType::Section,
                title,
                config,
                tok,
                &mut chunk_index,
            ));
        }
    }

    if let Some(tail) = tail_start {
        chunks.extend(chunk_block(
            &text[tail..],
            OrderChunkType::Tail,
            None,
            config,
            tok,
            &mut chunk_index,
        ));
    }

    chunks
}

/// Extracts `"Sec. N. <Title>."` from the first line of a section block:
/// the marker plus the following words up to and including the first period.
fn section_title(section_text: &str) -> Option<String> {
    let first_line = section_text.lines().next()?.trim();
    let marker = SECTION_RE.captures(first_line)?.get(1)?;
    let rest = first_line[marker.end()..].trim();
    let title_part = rest
        .find('.')
        .map_or(rest, |dot| &rest[..=dot]);
    if title_part.is_empty() {
        Some(marker.as_str().trim().to_string())
    } else {
        Some(format!("{} {}", marker.as_str().trim(), title_part.trim()))
    }
}

/// Windows one structural block, mapping each chunk back to the subsection
/// label active at its first fresh paragraph.
fn chunk_block(
    block_text: &str,
    chunk_type: OrderChunkType,
    section_title: Option<String>,
    config: &ChunkingConfig,
    tok: &Tokenizer,
    chunk_index: &mut usize,
) -> Vec<Chunk> {
    let (paragraphs, labels) = split_labeled_paragraphs(block_text);
    let mut chunks = Vec::new();
    for window in sliding_window(&paragraphs, config, tok) {
        let subsection_label = labels.get(window.start_paragraph).cloned().flatten();
        chunks.push(Chunk {
            text: window.text,
            chunk_index: *chunk_index,
            token_count: window.token_count,
            labels: ChunkLabels::Order {
                chunk_type,
                section_title: section_title.clone(),
                subsection_label,
            },
        });
        *chunk_index += 1;
    }
    chunks
}

/// Splits a block into paragraphs, starting a fresh paragraph at blank lines
/// and at subsection markers, and records the subsection label in effect at
/// each paragraph.
fn split_labeled_paragraphs(block_text: &str) -> (Vec<String>, Vec<Option<String>>) {
    let mut paragraphs = Vec::new();
    let mut labels = Vec::new();
    let mut current = String::new();
    let mut current_label: Option<String> = None;

    let mut flush =
        |current: &mut String, label: &Option<String>, paragraphs: &mut Vec<String>, labels: &mut Vec<Option<String>>| {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                paragraphs.push(trimmed.to_string());
                labels.push(label.clone());
            }
            current.clear();
        };

    for line in block_text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush(&mut current, &current_label, &mut paragraphs, &mut labels);
            continue;
        }
        if let Some(caps) = SUBSECTION_RE.captures(trimmed) {
            flush(&mut current, &current_label, &mut paragraphs, &mut labels);
            current_label = caps.get(1).map(|m| m.as_str().to_string());
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(trimmed);
    }
    flush(&mut current, &current_label, &mut paragraphs, &mut labels);
    (paragraphs, labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok() -> Tokenizer {
        Tokenizer::new().unwrap_or_else(|_| unreachable!())
    }

    fn small_config() -> ChunkingConfig {
        ChunkingConfig {
            min_tokens: 5,
            target_tokens: 60,
            max_tokens: 120,
            overlap_ratio: 0.1,
        }
    }

    fn order_labels(chunk: &Chunk) -> (OrderChunkType, Option<String>, Option<String>) {
        match &chunk.labels {
            ChunkLabels::Order {
                chunk_type,
                section_title,
                subsection_label,
            } => (*chunk_type, section_title.clone(), subsection_label.clone()),
            ChunkLabels::Opinion { .. } => unreachable!(),
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk_order("", &small_config(), &tok()).is_empty());
    }

    #[test]
    fn test_header_and_sections() {
        let text = "By the authority vested in me as President by the Constitution \
                    and the laws of the United States of America, it is hereby ordered:\n\
                    Sec. 1. Purpose. This order strengthens reporting requirements.\n\
                    Sec. 2. Policy. It is the policy of the United States to publish data.";
        let chunks = chunk_order(text, &small_config(), &tok());
        assert_eq!(chunks.len(), 3);

        let (t0, s0, _) = order_labels(&chunks[0]);
        assert_eq!(t0, OrderChunkType::Header);
        assert!(s0.is_none());

        let (t1, s1, _) = order_labels(&chunks[1]);
        assert_eq!(t1, OrderChunkType::Section);
        assert_eq!(s1.as_deref(), Some("Sec. 1. Purpose."));

        let (t2, s2, _) = order_labels(&chunks[2]);
        assert_eq!(t2, OrderChunkType::Section);
        assert_eq!(s2.as_deref(), Some("Sec. 2. Policy."));
    }

    #[test]
    fn test_subsection_labels() {
        let text = "It is hereby ordered:\n\
                    Sec. 1. Definitions. For purposes of this order:\n\
                    (a) the term agency has the meaning given in section 3502;\n\
                    (b) the term rule has the meaning given in section 551.";
        let chunks = chunk_order(
            text,
            &ChunkingConfig {
                min_tokens: 2,
                target_tokens: 12,
                max_tokens: 24,
                overlap_ratio: 0.0,
            },
            &tok(),
        );
        let subsections: Vec<Option<String>> = chunks
            .iter()
            .map(|c| order_labels(c).2)
            .collect();
        assert!(subsections.contains(&Some("(a)".to_string())));
        assert!(subsections.contains(&Some("(b)".to_string())));
    }

    #[test]
    fn test_tail_detection() {
        let text = "It is hereby ordered:\n\
                    Sec. 1. Purpose. Improve coordination across agencies.\n\
                    THE WHITE HOUSE,\n    January 20, 2025.\n\
                    [FR Doc. 2025-01234 Filed 1-24-25; 8:45 am]";
        let chunks = chunk_order(text, &small_config(), &tok());
        let types: Vec<OrderChunkType> = chunks.iter().map(|c| order_labels(c).0).collect();
        assert!(types.contains(&OrderChunkType::Header));
        assert!(types.contains(&OrderChunkType::Section));
        assert!(types.contains(&OrderChunkType::Tail));
        // The tail never carries a section title.
        for chunk in &chunks {
            let (t, title, _) = order_labels(chunk);
            if t == OrderChunkType::Tail {
                assert!(title.is_none());
            }
        }
    }

    #[test]
    fn test_no_markers_single_span() {
        let text = "A short memorandum with no order structure at all.";
        let chunks = chunk_order(text, &small_config(), &tok());
        assert_eq!(chunks.len(), 1);
        let (t, title, sub) = order_labels(&chunks[0]);
        assert_eq!(t, OrderChunkType::Section);
        assert!(title.is_none());
        assert!(sub.is_none());
    }

    #[test]
    fn test_section_without_title_period() {
        let text = "It is hereby ordered:\nSec. 3. General provisions";
        let chunks = chunk_order(text, &small_config(), &tok());
        let titles: Vec<Option<String>> =
            chunks.iter().map(|c| order_labels(c).1).collect();
        assert!(titles.contains(&Some("Sec. 3. General provisions".to_string())));
    }

    #[test]
    fn test_chunk_indices_monotone() {
        let text = "It is hereby ordered:\n\
                    Sec. 1. Purpose. First section text.\n\
                    Sec. 2. Policy. Second section text.";
        let chunks = chunk_order(text, &small_config(), &tok());
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
        }
    }
}
