//! Output generation: the RSS feed plus optional HTML and JSON artifacts.
//!
//! # Submodules
//!
//! - [`rss`]: renders ordered articles into an RSS 2.0 document, optionally
//!   accreting onto the previous feed
//! - [`html`]: plain `index.html` listing of the same articles
//! - [`json`]: `diagnostics.json` with per-page fetch trails
//! - [`sink`]: where rendered bytes end up
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── feed.xml           # always
//! ├── index.html         # --html
//! └── diagnostics.json   # --diagnostics
//! ```

pub mod html;
pub mod json;
pub mod rss;
pub mod sink;
