//! Per-page fallback across date parameterizations.
//!
//! The print-edition API sometimes returns nothing for today's date (edition
//! not published yet, or indexed under a different day). Each page therefore
//! tries, in order, until one yields at least one article:
//!
//! 1. the edition date
//! 2. no date parameter at all
//! 3. the previous civil day
//!
//! Every attempt is written into the page's [`PageDiagnostic`], whatever the
//! branch taken. A page that stays empty is a diagnostic, not a run failure.

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use super::extract::extract_articles;
use super::normalize::Normalizer;
use crate::clock::previous_day;
use crate::fetch::retry::RetryPolicy;
use crate::fetch::{FetchOutcome, Fetcher};
use crate::models::{Article, AttemptRecord, AttemptVariant, PageDiagnostic};

/// Builds listing URLs for the print-edition endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub base_url: String,
    pub path: String,
    pub root_path: String,
}

impl Endpoint {
    /// `{base}{path}/{page}?root_path={root}[&date=YYYY-MM-DD]`
    pub fn page_url(&self, page: u32, date: Option<NaiveDate>) -> String {
        let base = format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_matches('/'),
            page
        );
        let mut url = match url::Url::parse(&base) {
            Ok(url) => url,
            Err(_) => return base,
        };
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("root_path", &self.root_path);
            if let Some(date) = date {
                query.append_pair("date", &date.format("%Y-%m-%d").to_string());
            }
        }
        url.into()
    }
}

/// Everything one page resolution needs, borrowed for the run.
pub struct Cascade<'a, F> {
    pub fetcher: &'a F,
    pub policy: &'a RetryPolicy,
    pub endpoint: &'a Endpoint,
    pub normalizer: &'a Normalizer,
}

impl<F: Fetcher> Cascade<'_, F> {
    /// Resolve one logical page, falling back across date variants.
    #[instrument(level = "info", skip(self))]
    pub async fn resolve_page(
        &self,
        page: u32,
        primary_date: NaiveDate,
    ) -> (Vec<Article>, PageDiagnostic) {
        let variants = [
            (AttemptVariant::Primary, Some(primary_date)),
            (AttemptVariant::NoDate, None),
            (AttemptVariant::PreviousDay, Some(previous_day(primary_date))),
        ];

        let mut attempts = Vec::with_capacity(variants.len());
        for (variant, date) in variants {
            let url = self.endpoint.page_url(page, date);
            let (articles, record) = self.attempt(variant, url).await;
            attempts.push(record);

            if !articles.is_empty() {
                info!(page, %variant, count = articles.len(), "Page resolved");
                let diagnostic = PageDiagnostic {
                    page,
                    attempts,
                    resolved_by: Some(variant),
                    articles: articles.len(),
                };
                return (articles, diagnostic);
            }
        }

        warn!(page, "No articles after all fallbacks");
        (
            Vec::new(),
            PageDiagnostic {
                page,
                attempts,
                resolved_by: None,
                articles: 0,
            },
        )
    }

    async fn attempt(&self, variant: AttemptVariant, url: String) -> (Vec<Article>, AttemptRecord) {
        let outcome = self.policy.fetch_resilient(self.fetcher, &url).await;
        let status = outcome.status();

        let payload = match outcome {
            FetchOutcome::Success { payload, .. } => payload,
            failed => {
                let failure = failed.failure().map(|f| f.to_string());
                warn!(%variant, %url, ?status, failure = ?failure, "Attempt failed");
                let record = AttemptRecord {
                    variant,
                    url,
                    succeeded: false,
                    status,
                    failure,
                    extracted: 0,
                    live: 0,
                    sample: failed.sample(),
                };
                return (Vec::new(), record);
            }
        };

        let raw_items = extract_articles(&payload);
        let extracted = raw_items.len();
        let articles: Vec<Article> = raw_items
            .into_iter()
            .map(|raw| self.normalizer.normalize(raw))
            .collect();
        let live = articles.iter().filter(|a| a.live).count();
        info!(%variant, %url, extracted, live, "Attempt parsed");

        let record = AttemptRecord {
            variant,
            url,
            succeeded: true,
            status,
            failure: None,
            extracted,
            live,
            sample: None,
        };
        (articles, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::TransportError;
    use crate::fetch::retry::tests::{ScriptedFetcher, ok_json, with_status};
    use chrono::FixedOffset;
    use std::time::Duration;

    fn endpoint() -> Endpoint {
        Endpoint {
            base_url: "https://bonikbarta.com".to_string(),
            path: "/api/print-edition-page".to_string(),
            root_path: "00000000010000000001".to_string(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    async fn resolve(fetcher: &ScriptedFetcher) -> (Vec<Article>, PageDiagnostic) {
        let policy = RetryPolicy::new(2, Duration::from_secs(1), Duration::ZERO);
        let endpoint = endpoint();
        let normalizer = Normalizer::new(
            "https://bonikbarta.com",
            "/home",
            FixedOffset::east_opt(6 * 3600).unwrap(),
        );
        let cascade = Cascade {
            fetcher,
            policy: &policy,
            endpoint: &endpoint,
            normalizer: &normalizer,
        };
        cascade.resolve_page(5, date()).await
    }

    const ONE_POST: &str = r#"{"posts":[{"title":"A","url_path":"/home/a"}]}"#;

    #[test]
    fn test_page_urls() {
        let ep = endpoint();
        assert_eq!(
            ep.page_url(3, Some(date())),
            "https://bonikbarta.com/api/print-edition-page/3?root_path=00000000010000000001&date=2024-03-01"
        );
        assert_eq!(
            ep.page_url(3, None),
            "https://bonikbarta.com/api/print-edition-page/3?root_path=00000000010000000001"
        );
    }

    #[tokio::test]
    async fn test_primary_success_stops_cascade() {
        let fetcher = ScriptedFetcher::new(vec![ok_json(ONE_POST)]);
        let (articles, diag) = resolve(&fetcher).await;

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://bonikbarta.com/a");
        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(diag.resolved_by, Some(AttemptVariant::Primary));
        assert_eq!(diag.attempts.len(), 1);
        assert_eq!(diag.attempts[0].extracted, 1);
        assert_eq!(diag.attempts[0].live, 1);
        assert!(diag.attempts[0].url.contains("date=2024-03-01"));
    }

    #[tokio::test]
    async fn test_empty_object_falls_through_to_no_date() {
        let fetcher = ScriptedFetcher::new(vec![ok_json("{}"), ok_json(ONE_POST)]);
        let (articles, diag) = resolve(&fetcher).await;

        assert_eq!(articles.len(), 1);
        assert_eq!(diag.resolved_by, Some(AttemptVariant::NoDate));
        assert_eq!(diag.attempts.len(), 2);
        assert!(diag.attempts[0].succeeded);
        assert_eq!(diag.attempts[0].extracted, 0);
        assert!(!diag.attempts[1].url.contains("date="));
    }

    #[tokio::test]
    async fn test_failures_fall_through_to_previous_day() {
        let fetcher = ScriptedFetcher::new(vec![
            with_status(404, r#"{"message":"not found"}"#),
            with_status(200, "<html>blocked</html>"),
            ok_json(ONE_POST),
        ]);
        let (articles, diag) = resolve(&fetcher).await;

        assert_eq!(articles.len(), 1);
        assert_eq!(diag.resolved_by, Some(AttemptVariant::PreviousDay));
        assert_eq!(diag.attempts.len(), 3);
        assert_eq!(diag.attempts[0].status, Some(404));
        assert_eq!(
            diag.attempts[1].failure.as_deref(),
            Some("unexpected HTML content (status 200)")
        );
        assert!(diag.attempts[2].url.contains("date=2024-02-29"));
        let calls = fetcher.calls.borrow();
        assert_eq!(calls.len(), 3);
    }

    #[tokio::test]
    async fn test_html_block_everywhere_is_diagnostic_only() {
        let fetcher = ScriptedFetcher::new(vec![with_status(200, "<html>blocked</html>")]);
        let (articles, diag) = resolve(&fetcher).await;

        assert!(articles.is_empty());
        assert!(diag.is_warning());
        assert_eq!(diag.attempts.len(), 3);
        // HTML with status 200 is terminal: one request per variant.
        assert_eq!(fetcher.call_count(), 3);
        for attempt in &diag.attempts {
            assert!(!attempt.succeeded);
            assert_eq!(attempt.sample.as_deref(), Some("<html>blocked</html>"));
        }
    }

    #[tokio::test]
    async fn test_network_failures_retry_within_each_variant() {
        let fetcher = ScriptedFetcher::new(vec![Err(TransportError::Network("reset".into()))]);
        let (articles, diag) = resolve(&fetcher).await;

        assert!(articles.is_empty());
        assert_eq!(diag.attempts.len(), 3);
        // Two attempts per variant under the test policy.
        assert_eq!(fetcher.call_count(), 6);
        assert_eq!(
            diag.attempts[0].failure.as_deref(),
            Some("transient network failure")
        );
    }

    #[tokio::test]
    async fn test_unpublished_only_page_still_resolves() {
        // The cascade counts extracted articles; filtering happens at merge time.
        let fetcher = ScriptedFetcher::new(vec![ok_json(r#"{"posts":[{"title":"A","live":false}]}"#)]);
        let (articles, diag) = resolve(&fetcher).await;

        assert_eq!(articles.len(), 1);
        assert_eq!(diag.attempts[0].live, 0);
        assert_eq!(diag.resolved_by, Some(AttemptVariant::Primary));
    }
}
