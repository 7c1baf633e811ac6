//! Markup stripping and whitespace normalization.
//!
//! CourtListener's `html_with_citations` variant and the occasional markup
//! in Federal Register raw text are reduced to plain text before chunking:
//! block-level tags become paragraph breaks, remaining tags are removed,
//! HTML entities are decoded, and whitespace is normalized while paragraph
//! structure is preserved.

use std::sync::LazyLock;

use regex::Regex;

/// Block-level closers and breaks that imply a paragraph boundary.
#[allow(clippy::unwrap_used)]
static BLOCK_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*(?:br\s*/?|/p|/div|/h[1-6]|/blockquote|/li|/tr)\s*>").unwrap()
});

/// Any remaining tag.
#[allow(clippy::unwrap_used)]
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[^>]*>").unwrap()
});

/// Numeric character references, decimal and hex.
#[allow(clippy::unwrap_used)]
static NUMERIC_ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(x[0-9a-fA-F]+|\d+);").unwrap()
});

/// Three or more consecutive newlines.
#[allow(clippy::unwrap_used)]
static EXCESS_NEWLINES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n{3,}").unwrap()
});

/// Runs of spaces and tabs.
#[allow(clippy::unwrap_used)]
static SPACE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]{2,}").unwrap()
});

/// Strips HTML to plain text suitable for the chunkers.
#[must_use]
pub fn strip_html(html: &str) -> String {
    let text = BLOCK_BREAK_RE.replace_all(html, "\n\n");
    let text = TAG_RE.replace_all(&text, " ");
    let text = decode_entities(&text);
    let text = SPACE_RUN_RE.replace_all(&text, " ");
    // Trim spaces hugging newlines so paragraph splitting stays clean.
    let text = text
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    let text = EXCESS_NEWLINES_RE.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Decodes the named entities that occur in practice plus numeric references.
fn decode_entities(text: &str) -> String {
    let replaced = text
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&ldquo;", "\u{201c}")
        .replace("&rdquo;", "\u{201d}")
        .replace("&lsquo;", "\u{2018}")
        .replace("&rsquo;", "\u{2019}")
        .replace("&mdash;", "\u{2014}")
        .replace("&ndash;", "\u{2013}")
        .replace("&sect;", "\u{a7}")
        .replace("&amp;", "&");

    NUMERIC_ENTITY_RE
        .replace_all(&replaced, |caps: &regex::Captures<'_>| {
            let body = caps.get(1).map_or("", |m| m.as_str());
            let code = if let Some(hex) = body.strip_prefix('x') {
                u32::from_str_radix(hex, 16).ok()
            } else {
                body.parse().ok()
            };
            code.and_then(char::from_u32)
                .map_or_else(String::new, |c| c.to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_removed() {
        let html = "<p>The <em>Appropriations</em> Clause</p>";
        let text = strip_html(html);
        assert_eq!(text, "The Appropriations Clause");
    }

    #[test]
    fn test_block_tags_become_paragraph_breaks() {
        let html = "<p>First paragraph.</p><p>Second paragraph.</p>";
        let text = strip_html(html);
        assert_eq!(text, "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(
            strip_html("Smith &amp; Jones, &sect;&nbsp;5497 &#8212; &quot;cited&quot;"),
            "Smith & Jones, \u{a7} 5497 \u{2014} \"cited\""
        );
        assert_eq!(strip_html("&#x27;quoted&#x27;"), "'quoted'");
    }

    #[test]
    fn test_excess_whitespace_collapsed() {
        let html = "a    b\n\n\n\n\nc";
        assert_eq!(strip_html(html), "a b\n\nc");
    }

    #[test]
    fn test_plain_text_unchanged() {
        let text = "Sec. 1. Purpose.\n\nPlain text stays as-is.";
        assert_eq!(strip_html(text), text);
    }
}
