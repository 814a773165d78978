//! Command-line interface definitions for the edition feed builder.
//!
//! All arguments can be provided via command-line flags or environment variables.

use chrono::NaiveDate;
use clap::Parser;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Rebuild the feed from today's edition
/// edition_feed -o ./public
///
/// # Keep older items, write the HTML index and diagnostics
/// edition_feed -o ./public --accretive --html --diagnostics
///
/// # Rebuild a specific edition with a custom config
/// edition_feed -o ./public -c feed.yaml --date 2024-03-01
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for feed.xml and the optional artifacts
    #[arg(short, long, env = "EDITION_FEED_OUTPUT_DIR")]
    pub output_dir: String,

    /// Optional path to a YAML config file
    #[arg(short, long, env = "EDITION_FEED_CONFIG")]
    pub config: Option<String>,

    /// Merge new articles into the existing feed instead of rebuilding it
    #[arg(short, long)]
    pub accretive: bool,

    /// Also write a plain index.html
    #[arg(long)]
    pub html: bool,

    /// Also write diagnostics.json with per-page fetch details
    #[arg(long)]
    pub diagnostics: bool,

    /// Edition date (YYYY-MM-DD); defaults to today in the site's timezone
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// User-Agent header override
    #[arg(long, env = "EDITION_FEED_USER_AGENT")]
    pub user_agent: Option<String>,
}
