//! Cross-page dedup and deterministic ordering.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::debug;

use crate::models::Article;

/// Filter unpublished articles, collapse duplicate ids and sort newest first.
///
/// On an id collision the incoming article replaces the kept one only when it
/// brings a publication time the kept one lacks, or a strictly longer summary.
/// The replacement takes over the kept entry's position. Articles without a
/// timestamp sort last; the sort is stable, so equal timestamps keep input order.
pub fn merge_and_order(articles: impl IntoIterator<Item = Article>) -> Vec<Article> {
    let mut kept: Vec<Article> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut dropped_unpublished = 0usize;
    let mut replaced = 0usize;

    for article in articles {
        if !article.live {
            dropped_unpublished += 1;
            continue;
        }
        match by_id.entry(article.id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(kept.len());
                kept.push(article);
            }
            Entry::Occupied(slot) => {
                let existing = &mut kept[*slot.get()];
                if is_richer(&article, existing) {
                    *existing = article;
                    replaced += 1;
                }
            }
        }
    }

    kept.sort_by_key(|a| std::cmp::Reverse(sort_key(a)));
    debug!(
        kept = kept.len(),
        dropped_unpublished, replaced, "Merged articles"
    );
    kept
}

fn is_richer(incoming: &Article, existing: &Article) -> bool {
    (existing.published_at.is_none() && incoming.published_at.is_some())
        || incoming.summary.chars().count() > existing.summary.chars().count()
}

fn sort_key(article: &Article) -> DateTime<Utc> {
    article.published_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
