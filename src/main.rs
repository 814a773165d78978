//! # Edition Feed
//!
//! Builds an RSS feed from a news site's print-edition JSON API.
//!
//! ## Features
//!
//! - Fetches every print-edition page with retry, timeout and HTML-block detection
//! - Finds the article array in whatever shape the API returns that day
//! - Falls back across date parameters when the edition date yields nothing
//! - Deduplicates and orders articles so repeated runs produce a stable feed
//! - Rebuilds `feed.xml`, or accretes onto it with an item cap
//! - Optional `index.html` and `diagnostics.json`
//!
//! ## Usage
//!
//! ```sh
//! edition_feed -o ./public --accretive --diagnostics
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: each page URL goes through the date fallback cascade, in batches
//! 2. **Extraction**: article arrays are located and normalized per response
//! 3. **Merge**: unpublished items dropped, duplicates collapsed, newest first
//! 4. **Output**: feed rendered and written; a failed feed write fails the run

use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod clock;
mod config;
mod edition;
mod fetch;
mod models;
mod outputs;
mod utils;

use cli::Cli;
use clock::{FixedClock, SiteClock, TimeProvider};
use config::FeedConfig;
use edition::cascade::{Cascade, Endpoint};
use edition::merge::merge_and_order;
use edition::normalize::Normalizer;
use edition::collect_edition;
use fetch::http::HttpFetcher;
use fetch::retry::RetryPolicy;
use models::RunReport;
use outputs::rss::{self, ChannelMeta};
use outputs::sink::{FileSink, Sink};
use outputs::{html, json};
use utils::ensure_writable_dir;

const INDEX_FILE: &str = "index.html";

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("edition_feed starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Config ----
    let mut config = FeedConfig::load(args.config.as_deref().map(Path::new)).await?;
    if let Some(ua) = &args.user_agent {
        config.user_agent = ua.clone();
    }

    // Early check: output dir must be writable before any network work
    let output_dir = Path::new(&args.output_dir);
    if let Err(e) = ensure_writable_dir(output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }
    let sink = FileSink::new(output_dir);

    // One build time and one edition date for the whole run
    let site_clock = SiteClock::new(config.utc_offset_minutes);
    let clock = FixedClock {
        today: args.date.unwrap_or_else(|| site_clock.today()),
        now: site_clock.now(),
    };
    let edition_date = clock.today();
    info!(%edition_date, accretive = args.accretive, "Edition selected");

    // Snapshot of the previous feed, loaded once up front
    let prior = if args.accretive {
        match sink.read(&config.feed.file_name).await {
            Ok(Some(text)) => Some(text),
            Ok(None) => {
                info!(file = %config.feed.file_name, "No previous feed; starting fresh");
                None
            }
            Err(e) => {
                warn!(error = %e, "Could not read previous feed; starting fresh");
                None
            }
        }
    } else {
        None
    };

    // ---- Fetch ----
    let fetcher = HttpFetcher::new(config.user_agent.clone())?;
    let policy = RetryPolicy::from_config(&config);
    let endpoint = Endpoint {
        base_url: config.base_url.clone(),
        path: config.endpoint.clone(),
        root_path: config.root_path.clone(),
    };
    let normalizer = Normalizer::new(&config.base_url, &config.legacy_prefix, site_clock.offset());
    let cascade = Cascade {
        fetcher: &fetcher,
        policy: &policy,
        endpoint: &endpoint,
        normalizer: &normalizer,
    };

    let pages = config.pages();
    let collected = collect_edition(&cascade, &pages, edition_date, config.concurrency).await;
    let warnings = collected.warnings();
    let pages_with_articles = collected.diagnostics.len() - warnings;

    // ---- Merge ----
    let articles = merge_and_order(collected.articles);
    info!(count = articles.len(), "Articles after merge");

    // ---- Feed ----
    let channel = ChannelMeta::from_config(&config.feed, clock.now());
    let document = rss::render(&articles, prior.as_deref(), channel, config.feed.max_items)?;
    let xml = document.to_xml()?;
    if let Err(e) = sink.write(&config.feed.file_name, xml.as_bytes()).await {
        error!(file = %config.feed.file_name, error = %e, "Failed to write feed");
        return Err(e);
    }
    info!(items = document.items.len(), file = %config.feed.file_name, "Feed written");

    // ---- Optional artifacts ----
    if args.html {
        let page = html::render_index(&config.feed.title, &articles, site_clock.offset());
        if let Err(e) = sink.write(INDEX_FILE, page.as_bytes()).await {
            error!(error = %e, "Failed to write HTML index");
        }
    }

    if args.diagnostics {
        let report = RunReport {
            generated_at: clock.now().to_rfc3339(),
            edition_date: edition_date.to_string(),
            pages_requested: pages.len(),
            pages_with_articles,
            warnings,
            feed_items: document.items.len(),
            pages: collected.diagnostics,
        };
        if let Err(e) = json::write_report(&report, &sink).await {
            error!(error = %e, "Failed to write diagnostics");
        }
    }

    if warnings > 0 {
        warn!(warnings, pages = pages.len(), "Some pages produced no articles");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
