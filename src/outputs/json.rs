//! Run diagnostics as JSON.
//!
//! The report lists every page with every attempt made for it, so an empty
//! page can be traced to the variant, status and body sample that caused it.

use std::error::Error;
use tracing::{info, instrument};

use super::sink::Sink;
use crate::models::RunReport;

pub const DIAGNOSTICS_FILE: &str = "diagnostics.json";

/// Serialize `report` and hand it to the sink.
#[instrument(level = "info", skip_all, fields(pages = report.pages.len(), warnings = report.warnings))]
pub async fn write_report<S: Sink>(report: &RunReport, sink: &S) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;
    sink.write(DIAGNOSTICS_FILE, json.as_bytes()).await?;
    info!(file = DIAGNOSTICS_FILE, "Wrote diagnostics");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttemptRecord, AttemptVariant, PageDiagnostic};
    use crate::outputs::sink::FileSink;
    use serde_json::Value;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_report_is_written_as_json() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        let report = RunReport {
            generated_at: "2024-03-01T00:00:00+00:00".to_string(),
            edition_date: "2024-03-01".to_string(),
            pages_requested: 1,
            pages_with_articles: 0,
            warnings: 1,
            feed_items: 0,
            pages: vec![PageDiagnostic {
                page: 3,
                attempts: vec![AttemptRecord {
                    variant: AttemptVariant::NoDate,
                    url: "https://example.com/api/3".to_string(),
                    succeeded: false,
                    status: Some(403),
                    failure: Some("unexpected HTML content (status 403)".to_string()),
                    extracted: 0,
                    live: 0,
                    sample: Some("<html>".to_string()),
                }],
                resolved_by: None,
                articles: 0,
            }],
        };

        write_report(&report, &sink).await.unwrap();

        let text = sink.read(DIAGNOSTICS_FILE).await.unwrap().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["warnings"], 1);
        assert_eq!(value["pages"][0]["page"], 3);
        assert_eq!(value["pages"][0]["attempts"][0]["variant"], "no_date");
        assert_eq!(value["pages"][0]["attempts"][0]["status"], 403);
    }
}
