//! Data models shared across the feed pipeline.
//!
//! - [`Article`]: canonical record produced from one upstream JSON object
//! - [`PageDiagnostic`] / [`AttemptRecord`]: per-page fetch trail for operators
//! - [`RunReport`]: run-level totals written alongside the diagnostics
//!
//! Articles are rebuilt from upstream JSON on every run and never persisted
//! directly; only their rendered feed item (keyed by [`Article::id`]) survives
//! between runs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// A normalized article, independent of which upstream shape it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    /// Stable identifier. Source-provided when present, otherwise a content hash.
    pub id: String,
    /// Headline, never empty.
    pub title: String,
    /// Excerpt or summary; may be empty.
    pub summary: String,
    /// Absolute article URL.
    pub url: String,
    /// First publication instant, if the source supplied a parseable one.
    pub published_at: Option<DateTime<Utc>>,
    /// Whether the upstream record is published. Absent upstream means `true`.
    pub live: bool,
    /// The upstream record exactly as received.
    pub raw: Value,
}

/// Which query parameterization a cascade attempt used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptVariant {
    /// Query for the edition date.
    Primary,
    /// Query with the date parameter omitted.
    NoDate,
    /// Query for the civil day before the edition date.
    PreviousDay,
}

impl fmt::Display for AttemptVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttemptVariant::Primary => "primary",
            AttemptVariant::NoDate => "no_date",
            AttemptVariant::PreviousDay => "previous_day",
        };
        f.write_str(s)
    }
}

/// Outcome of one cascade step for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub variant: AttemptVariant,
    pub url: String,
    /// True when the response parsed as JSON.
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Failure classification, if the fetch did not produce JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Raw records located by the shape extractor.
    pub extracted: usize,
    /// Normalized articles still marked live.
    pub live: usize,
    /// Truncated body sample, recorded for failures only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
}

/// Everything that happened while resolving one logical page.
///
/// Built once by the cascade and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageDiagnostic {
    pub page: u32,
    pub attempts: Vec<AttemptRecord>,
    /// The variant that yielded articles, if any did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<AttemptVariant>,
    /// Articles the page contributed (before cross-page dedup).
    pub articles: usize,
}

impl PageDiagnostic {
    /// A page is a warning when no variant produced a single article.
    pub fn is_warning(&self) -> bool {
        self.resolved_by.is_none()
    }
}

/// Run-level summary written into the diagnostics artifact.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// RFC-3339 build timestamp.
    pub generated_at: String,
    /// Edition date the primary queries used.
    pub edition_date: String,
    pub pages_requested: usize,
    pub pages_with_articles: usize,
    pub warnings: usize,
    /// Items in the feed that was written.
    pub feed_items: usize,
    pub pages: Vec<PageDiagnostic>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostic(resolved_by: Option<AttemptVariant>) -> PageDiagnostic {
        PageDiagnostic {
            page: 3,
            attempts: vec![AttemptRecord {
                variant: AttemptVariant::Primary,
                url: "https://example.com/api/print-edition-page/3".to_string(),
                succeeded: false,
                status: Some(403),
                failure: Some("unexpected HTML content (status 403)".to_string()),
                extracted: 0,
                live: 0,
                sample: Some("<html>blocked</html>".to_string()),
            }],
            resolved_by,
            articles: 0,
        }
    }

    #[test]
    fn test_variant_display_matches_serialized_name() {
        for variant in [
            AttemptVariant::Primary,
            AttemptVariant::NoDate,
            AttemptVariant::PreviousDay,
        ] {
            let json = serde_json::to_string(&variant).unwrap();
            assert_eq!(json, format!("\"{variant}\""));
        }
    }

    #[test]
    fn test_unresolved_page_is_warning() {
        assert!(diagnostic(None).is_warning());
        assert!(!diagnostic(Some(AttemptVariant::NoDate)).is_warning());
    }

    #[test]
    fn test_diagnostic_serialization_skips_empty_fields() {
        let mut diag = diagnostic(None);
        diag.attempts[0].status = None;
        diag.attempts[0].sample = None;

        let json = serde_json::to_value(&diag).unwrap();
        let attempt = &json["attempts"][0];
        assert!(attempt.get("status").is_none());
        assert!(attempt.get("sample").is_none());
        assert_eq!(attempt["variant"], "primary");
        assert!(json.get("resolved_by").is_none());
    }
}
