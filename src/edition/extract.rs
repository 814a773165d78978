//! Locating the article list inside a listing response.
//!
//! The API has no stable schema: depending on endpoint and deploy, articles sit
//! at `.posts`, `.content.items`, under per-section containers, or somewhere
//! deeper. [`extract_articles`] checks the known locations first and then
//! falls back to a bounded scan of the whole tree.

use serde_json::{Map, Value};

/// Keys whose presence marks an object as article-like.
pub const ARTICLE_KEYS: [&str; 4] = ["id", "title", "url_path", "first_published_at"];

/// Deepest nesting level the scan descends to (the root is level 0).
pub const MAX_SCAN_DEPTH: usize = 4;

/// Upper bound on JSON nodes inspected by one scan.
pub const MAX_SCAN_NODES: usize = 50_000;

/// Return the best-guess list of raw article records in `json`.
///
/// An empty result means the page carried no articles, which is a normal
/// outcome (no edition that day), not an error.
pub fn extract_articles(json: &Value) -> Vec<Value> {
    if let Some(items) = direct_path(json) {
        return items;
    }

    let mut scan = Scan {
        budget: MAX_SCAN_NODES,
        best: None,
    };
    scan.visit(json, 0);
    scan.best.map(|arr| arr.to_vec()).unwrap_or_default()
}

/// Well-known locations, in priority order.
fn direct_path(json: &Value) -> Option<Vec<Value>> {
    let root = json.as_object()?;

    if let Some(Value::Array(arr)) = root.get("posts") {
        return Some(arr.clone());
    }
    if let Some(Value::Array(arr)) = root.get("items") {
        return Some(arr.clone());
    }
    if let Some(Value::Object(content)) = root.get("content") {
        if let Some(Value::Array(arr)) = content.get("items") {
            return Some(arr.clone());
        }
        if let Some(Value::Array(arr)) = content.get("posts") {
            return Some(arr.clone());
        }
        if let Some(Value::Array(sections)) = content.get("sections") {
            return Some(
                sections
                    .iter()
                    .filter_map(|section| section.get("items").and_then(Value::as_array))
                    .flatten()
                    .cloned()
                    .collect(),
            );
        }
    }
    if let Some(Value::Array(arr)) = root
        .get("data")
        .and_then(|data| data.get("print_edition_page_items"))
    {
        return Some(arr.clone());
    }
    None
}

fn is_article_like(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| ARTICLE_KEYS.iter().any(|k| obj.contains_key(*k)))
}

/// A non-empty array made only of article-like objects.
fn is_candidate(arr: &[Value]) -> bool {
    !arr.is_empty() && arr.iter().all(is_article_like)
}

struct Scan<'a> {
    budget: usize,
    best: Option<&'a [Value]>,
}

impl<'a> Scan<'a> {
    /// Keep the longest candidate; on a tie the first one found stays.
    fn offer(&mut self, arr: &'a [Value]) {
        if self.best.is_none_or(|best| arr.len() > best.len()) {
            self.best = Some(arr);
        }
    }

    fn visit(&mut self, value: &'a Value, depth: usize) {
        if depth > MAX_SCAN_DEPTH || self.budget == 0 {
            return;
        }
        self.budget -= 1;

        match value {
            Value::Array(arr) => {
                if is_candidate(arr) {
                    self.offer(arr);
                    return;
                }
                for el in arr {
                    self.visit(el, depth + 1);
                }
            }
            Value::Object(obj) => self.visit_object(obj, depth),
            _ => {}
        }
    }

    fn visit_object(&mut self, obj: &'a Map<String, Value>, depth: usize) {
        for val in obj.values() {
            match val {
                Value::Array(arr) if is_candidate(arr) => self.offer(arr),
                Value::Array(_) | Value::Object(_) => self.visit(val, depth + 1),
                _ => {}
            }
        }
    }
}
