//! Structural chunker for Supreme Court opinions.
//!
//! Partitions the plain text by opinion-type markers (syllabus, majority,
//! per curiam, concurrences, dissents, mixed), then by Roman-numeral and
//! capital-letter section markers within each opinion. Each section is fed
//! to the shared sliding window independently, so overlap never crosses a
//! section boundary.
//!
//! Marker detection runs on plain text; the fetcher strips HTML and
//! citation markup upstream. The regex crate has no lookahead, so the
//! "concurring in part and dissenting in part" exclusions are handled by
//! ordering the keyword alternation longest-first and discarding the
//! `dissenting in part` form.

use std::sync::LazyLock;

use regex::Regex;

use super::tokenizer::Tokenizer;
use super::window::sliding_window;
use crate::config::ChunkingConfig;
use crate::document::{Chunk, ChunkLabels, OpinionType};

/// `Justice <Name> delivered the opinion of the Court`.
#[allow(clippy::unwrap_used)]
static MAJORITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?:JUSTICE|Justice)\s+([A-Z][A-Za-z.'-]+)\s+delivered\s+the\s+opinion\s+of\s+the\s+Court",
    )
    .unwrap()
});

/// `Per Curiam` as an opinion header.
#[allow(clippy::unwrap_used)]
static PER_CURIAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:PER CURIAM|Per Curiam)\b").unwrap()
});

/// Standalone word `Syllabus` on its own line.
#[allow(clippy::unwrap_used)]
static SYLLABUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\s*syllabus\s*$").unwrap()
});

/// `Justice <Name>[, with whom … joins], <keyword>` where the keyword
/// alternation is ordered longest-first so the mixed form wins over the
/// simple forms at the same position.
#[allow(clippy::unwrap_used)]
static SEPARATE_OPINION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?:JUSTICE|Justice)\s+([A-Z][A-Za-z.'-]+)(?:,[^\n]*?)?,\s+(concurring in part and dissenting in part|concurring in the judgment|concurring|dissenting in part|dissenting)\b",
    )
    .unwrap()
});

/// A Roman-numeral or single-capital section marker on its own line.
#[allow(clippy::unwrap_used)]
static SECTION_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([IVXLC]+|[A-Z])$").unwrap()
});

/// One opinion-type span of the document.
struct OpinionSpan {
    start: usize,
    opinion_type: OpinionType,
    authoring_justice: Option<String>,
}

/// Chunks a Supreme Court opinion.
///
/// Empty input yields an empty list; input without any opinion-type marker
/// is chunked as a single unlabeled span.
#[must_use]
pub fn chunk_opinion(text: &str, config: &ChunkingConfig, tok: &Tokenizer) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut spans = detect_spans(text);
    let mut chunks = Vec::new();
    let mut chunk_index = 0usize;

    if spans.is_empty() {
        // No structural markers: one unlabeled span through the generic window.
        let paragraphs = split_paragraphs(text);
        for window in sliding_window(&paragraphs, config, tok) {
            chunks.push(Chunk {
                text: window.text,
                chunk_index,
                token_count: window.token_count,
                labels: ChunkLabels::Opinion {
                    opinion_type: OpinionType::Majority,
                    authoring_justice: None,
                    section_label: None,
                },
            });
            chunk_index += 1;
        }
        return chunks;
    }

    // Caption/front matter before the first marker stays with the first span.
    if let Some(first) = spans.first_mut() {
        first.start = 0;
    }

    for i in 0..spans.len() {
        let span = &spans[i];
        let end = spans.get(i + 1).map_or(text.len(), |next| next.start);
        let span_text = &text[span.start..end];

        for (section_label, paragraphs) in split_sections(span_text) {
            for window in sliding_window(&paragraphs, config, tok) {
                chunks.push(Chunk {
                    text: window.text,
                    chunk_index,
                    token_count: window.token_count,
                    labels: ChunkLabels::Opinion {
                        opinion_type: span.opinion_type,
                        authoring_justice: span.authoring_justice.clone(),
                        section_label: section_label.clone(),
                    },
                });
                chunk_index += 1;
            }
        }
    }
    chunks
}

/// Locates opinion-type markers and returns spans sorted by offset.
fn detect_spans(text: &str) -> Vec<OpinionSpan> {
    let mut spans: Vec<OpinionSpan> = Vec::new();

    for m in SYLLABUS_RE.find_iter(text) {
        spans.push(OpinionSpan {
            start: m.start(),
            opinion_type: OpinionType::Syllabus,
            authoring_justice: None,
        });
    }
    for caps in MAJORITY_RE.captures_iter(text) {
        if let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) {
            spans.push(OpinionSpan {
                start: whole.start(),
                opinion_type: OpinionType::Majority,
                authoring_justice: Some(normalize_justice(name.as_str())),
            });
        }
    }
    for m in PER_CURIAM_RE.find_iter(text) {
        spans.push(OpinionSpan {
            start: m.start(),
            opinion_type: OpinionType::Majority,
            authoring_justice: None,
        });
    }
    for caps in SEPARATE_OPINION_RE.captures_iter(text) {
        let (Some(whole), Some(name), Some(keyword)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let opinion_type = match keyword.as_str() {
            "concurring in part and dissenting in part" => OpinionType::Mixed,
            // "Concur in judgment" keeps the simple concurring label.
            "concurring in the judgment" | "concurring" => OpinionType::Concurring,
            "dissenting" => OpinionType::Dissenting,
            // `dissenting in part` outside the mixed phrase is not a span marker.
            _ => continue,
        };
        spans.push(OpinionSpan {
            start: whole.start(),
            opinion_type,
            authoring_justice: Some(normalize_justice(name.as_str())),
        });
    }

    spans.sort_by_key(|s| s.start);
    spans.dedup_by_key(|s| s.start);
    spans
}

/// Title-cases an all-caps justice name ("THOMAS" → "Thomas").
fn normalize_justice(name: &str) -> String {
    if name.chars().any(|c| c.is_ascii_lowercase()) {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len());
    let mut start_of_word = true;
    for c in name.chars() {
        if start_of_word {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        start_of_word = !c.is_alphabetic();
    }
    out
}

/// Splits a span into `(section_label, paragraphs)` groups.
///
/// A line holding only a Roman numeral opens a new top-level section; a line
/// holding only a capital letter opens a lettered subsection beneath it
/// ("II" + "A" → "II.A"). Text before the first marker carries no label.
fn split_sections(span_text: &str) -> Vec<(Option<String>, Vec<String>)> {
    let mut groups: Vec<(Option<String>, Vec<String>)> = Vec::new();
    let mut current_label: Option<String> = None;
    let mut current_roman: Option<String> = None;
    let mut paragraphs: Vec<String> = Vec::new();
    let mut paragraph = String::new();

    let mut flush_paragraph = |paragraph: &mut String, paragraphs: &mut Vec<String>| {
        let trimmed = paragraph.trim();
        if !trimmed.is_empty() {
            paragraphs.push(trimmed.to_string());
        }
        paragraph.clear();
    };

    let lines: Vec<&str> = span_text.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut paragraphs);
            continue;
        }
        if SECTION_MARKER_RE.is_match(trimmed) && followed_by_uppercase(&lines, i) {
            flush_paragraph(&mut paragraph, &mut paragraphs);
            if !paragraphs.is_empty() {
                groups.push((current_label.clone(), std::mem::take(&mut paragraphs)));
            }
            if trimmed.len() > 1 || trimmed.chars().all(|c| "IVXLC".contains(c)) {
                // Roman numeral: new top-level section.
                current_roman = Some(trimmed.to_string());
                current_label = Some(trimmed.to_string());
            } else {
                // Single capital: lettered subsection under the current section.
                current_label = Some(current_roman.as_ref().map_or_else(
                    || trimmed.to_string(),
                    |roman| format!("{roman}.{trimmed}"),
                ));
            }
            continue;
        }
        if !paragraph.is_empty() {
            paragraph.push('\n');
        }
        paragraph.push_str(trimmed);
    }
    flush_paragraph(&mut paragraph, &mut paragraphs);
    if !paragraphs.is_empty() {
        groups.push((current_label, paragraphs));
    }
    groups
}

/// Whether some following non-empty line opens with an uppercase letter,
/// which is what distinguishes a section marker from a stray capital.
fn followed_by_uppercase(lines: &[&str], marker_idx: usize) -> bool {
    lines
        .iter()
        .skip(marker_idx + 1)
        .find(|l| !l.trim().is_empty())
        .and_then(|l| l.trim().chars().next())
        .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit() || c == '"' || c == '\u{201c}')
}

/// Splits plain text into blank-line-separated paragraphs.
fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
