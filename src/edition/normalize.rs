//! Mapping raw upstream records onto [`Article`].
//!
//! Upstream field names drift between endpoints, so every target attribute
//! reads the first present, non-empty value from a short list of synonyms.
//! Nothing here can fail: each attribute has a default.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::models::Article;

/// Title used when the record has none.
pub const UNTITLED: &str = "No title";

const ID_FIELDS: [&str; 1] = ["id"];
const TITLE_FIELDS: [&str; 3] = ["title", "sub_title", "slug"];
const SUMMARY_FIELDS: [&str; 3] = ["summary", "excerpt", "description"];
const PATH_FIELDS: [&str; 3] = ["url_path", "path", "slug"];
const PUBLISHED_FIELDS: [&str; 3] = ["first_published_at", "published_at", "published"];

static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("valid scheme regex"));

/// Converts raw records into articles for one site.
#[derive(Debug, Clone)]
pub struct Normalizer {
    base_url: String,
    legacy_prefix: String,
    /// Timezone assumed for timestamps that carry no offset.
    site_offset: FixedOffset,
}

impl Normalizer {
    pub fn new(base_url: &str, legacy_prefix: &str, site_offset: FixedOffset) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            legacy_prefix: legacy_prefix.trim_end_matches('/').to_string(),
            site_offset,
        }
    }

    /// Build an [`Article`] from any JSON value. Non-objects yield an all-default article.
    pub fn normalize(&self, raw: Value) -> Article {
        let title = first_text(&raw, &TITLE_FIELDS).unwrap_or_else(|| UNTITLED.to_string());
        let summary = first_text(&raw, &SUMMARY_FIELDS).unwrap_or_default();
        let url = self.resolve_url(first_text(&raw, &PATH_FIELDS).as_deref().unwrap_or(""));
        let published_raw = first_text(&raw, &PUBLISHED_FIELDS);
        let published_at = published_raw
            .as_deref()
            .and_then(|s| parse_timestamp(s, self.site_offset));
        let live = parse_live(raw.get("live"));
        let id = first_text(&raw, &ID_FIELDS).unwrap_or_else(|| {
            content_id(&title, &summary, published_raw.as_deref().unwrap_or(""))
        });

        Article {
            id,
            title,
            summary,
            url,
            published_at,
            live,
            raw,
        }
    }

    /// Absolute paths pass through; relative ones are joined to the base URL
    /// after the legacy prefix is removed.
    pub fn resolve_url(&self, path: &str) -> String {
        let path = path.trim();
        if SCHEME_RE.is_match(path) {
            return path.to_string();
        }

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let path = match path.strip_prefix(&self.legacy_prefix) {
            Some(rest) if !self.legacy_prefix.is_empty() && (rest.is_empty() || rest.starts_with('/')) => {
                rest.to_string()
            }
            _ => path,
        };
        if path.is_empty() || path == "/" {
            return format!("{}/", self.base_url);
        }
        format!("{}{}", self.base_url, path)
    }
}

/// First synonym holding a non-empty string or a number, as text.
fn first_text(raw: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match raw.get(*field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Explicit booleans win; `"false"`/`0` also count as unpublished. Anything else is live.
fn parse_live(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.trim().eq_ignore_ascii_case("false"),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        _ => true,
    }
}

/// Deterministic id from content: same title, excerpt and timestamp give the same id.
pub fn content_id(title: &str, summary: &str, published: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [title, summary, published] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    let digest = hasher.finalize();
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

/// Parse the timestamp formats seen upstream.
///
/// Offset-less values are read in the site's timezone. Bare numbers are epoch
/// seconds, or milliseconds when too large to be seconds.
pub fn parse_timestamp(s: &str, site_offset: FixedOffset) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return local_to_utc(naive, site_offset);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return local_to_utc(date.and_hms_opt(0, 0, 0)?, site_offset);
    }
    if let Ok(n) = s.parse::<i64>() {
        return if n.abs() >= 100_000_000_000 {
            DateTime::from_timestamp_millis(n)
        } else {
            DateTime::from_timestamp(n, 0)
        };
    }
    None
}

fn local_to_utc(naive: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
