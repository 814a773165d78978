//! Collecting one edition from the print-edition API.
//!
//! # Pipeline
//!
//! | Step | Module | Output |
//! |------|--------|--------|
//! | Fetch with fallback per page | [`cascade`] | raw JSON per attempt |
//! | Locate article arrays | [`extract`] | raw records |
//! | Map to canonical records | [`normalize`] | [`Article`]s |
//! | Dedup and order | [`merge`] | final article list |
//!
//! Pages are resolved in fixed-size batches: every page in a batch settles
//! (success or failure) before the next batch is issued.

pub mod cascade;
pub mod extract;
pub mod merge;
pub mod normalize;

use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{info, instrument};

use crate::fetch::Fetcher;
use crate::models::{Article, PageDiagnostic};
use cascade::Cascade;

/// Articles gathered for one edition, before dedup, plus the per-page trail.
#[derive(Debug, Default)]
pub struct Collected {
    pub articles: Vec<Article>,
    pub diagnostics: Vec<PageDiagnostic>,
}

impl Collected {
    pub fn warnings(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_warning()).count()
    }
}

/// Resolve every page, `batch_size` at a time, keeping page order in the output.
#[instrument(level = "info", skip(cascade, pages), fields(pages = pages.len()))]
pub async fn collect_edition<F: Fetcher>(
    cascade: &Cascade<'_, F>,
    pages: &[u32],
    date: NaiveDate,
    batch_size: usize,
) -> Collected {
    let mut collected = Collected::default();

    for (batch_no, batch) in pages.chunks(batch_size.max(1)).enumerate() {
        info!(batch = batch_no, pages = ?batch, "Fetching batch");
        let results = join_all(batch.iter().map(|&page| cascade.resolve_page(page, date))).await;
        for (articles, diagnostic) in results {
            collected.articles.extend(articles);
            collected.diagnostics.push(diagnostic);
        }
    }

    info!(
        articles = collected.articles.len(),
        warnings = collected.warnings(),
        "Edition collected"
    );
    collected
}
