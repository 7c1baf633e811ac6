//! Bluebook citation assembly from CourtListener cluster records.
//!
//! A cluster carries zero or more reporter citations; the formatter picks the
//! primary one and renders `"<volume> <reporter> <page> (<year>)"`, e.g.
//! `601 U.S. 416 (2024)`.

use serde::Deserialize;

/// CourtListener's tag for an official (primary) reporter citation.
const PRIMARY_CITATION_TYPE: i64 = 1;

/// One citation record from a cluster response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CitationRecord {
    /// Reporter volume.
    pub volume: i64,
    /// Reporter abbreviation, taken verbatim (e.g. "U.S.", "S. Ct.").
    pub reporter: String,
    /// First page.
    pub page: String,
    /// Source citation-type tag; `1` marks the official reporter.
    #[serde(rename = "type")]
    pub citation_type: i64,
}

/// Renders a Bluebook citation string from the cluster's citation list and
/// its filing date.
///
/// Selection: the citation tagged as primary wins; failing that, the first
/// U.S.-reporter citation; failing that, the empty string. The year is parsed
/// from an ISO date (`2024-05-16`) or a bare year (`2024`).
#[must_use]
pub fn bluebook_citation(citations: &[CitationRecord], date_filed: &str) -> String {
    let Some(chosen) = citations
        .iter()
        .find(|c| c.citation_type == PRIMARY_CITATION_TYPE)
        .or_else(|| citations.iter().find(|c| c.reporter == "U.S."))
    else {
        return String::new();
    };

    parse_year(date_filed).map_or_else(
        || format!("{} {} {}", chosen.volume, chosen.reporter, chosen.page),
        |year| {
            format!(
                "{} {} {} ({year})",
                chosen.volume, chosen.reporter, chosen.page
            )
        },
    )
}

/// Extracts a four-digit year from an ISO-8601 date or a bare year.
fn parse_year(date: &str) -> Option<i32> {
    let head = date.trim().split('-').next()?;
    if head.len() == 4 {
        head.parse().ok()
    } else {
        None
    }
}
