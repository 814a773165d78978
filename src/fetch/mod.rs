//! Fetching upstream listings and classifying what came back.
//!
//! The pipeline only talks to the network through the [`Fetcher`] trait, so a
//! plain HTTP client ([`http::HttpFetcher`]) and anything else able to return
//! status, content type and body text are interchangeable.
//!
//! A response is classified into a [`FetchOutcome`] before anyone looks at the
//! data: HTML bodies are recognized first and never handed to the JSON parser.
//! [`FetchOutcome::failure`] maps every non-success outcome onto the
//! [`FetchFailure`] taxonomy that drives retry decisions in [`retry`].

pub mod http;
pub mod retry;

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::utils::truncate_for_log;

/// Maximum characters of a response body kept for diagnostics.
pub const SNIPPET_LEN: usize = 400;

/// What a [`Fetcher`] hands back for a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Failures below the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
}

/// Issues a GET and returns the raw response.
///
/// Implementations send an `Accept` header preferring JSON and the configured
/// `User-Agent`. `timeout` bounds the whole request; callers enforce it again
/// around the returned future.
pub trait Fetcher {
    async fn get(&self, url: &str, timeout: Duration) -> Result<RawResponse, TransportError>;
}

/// Classified result of a single fetch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Parsed JSON.
    Success { payload: Value, status: u16 },
    /// HTML where JSON was expected.
    HtmlDetected { snippet: String, status: u16 },
    /// Non-2xx response whose body is not HTML.
    HttpStatus { snippet: String, status: u16 },
    /// Successful status but a body that is not JSON.
    InvalidJson { snippet: String, status: u16 },
    NetworkError(String),
    Timeout,
}

/// Why a fetch attempt did not yield data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("transient network failure")]
    TransientNetwork,
    #[error("request timed out")]
    Timeout,
    #[error("server error (status {status})")]
    ServerError { status: u16 },
    #[error("client error (status {status})")]
    ClientError { status: u16 },
    #[error("unexpected HTML content (status {status})")]
    UnexpectedContentType { status: u16 },
    #[error("malformed JSON payload")]
    MalformedPayload,
}

impl FetchFailure {
    /// Only failures that can clear up on their own are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchFailure::TransientNetwork
                | FetchFailure::Timeout
                | FetchFailure::ServerError { .. }
        )
    }
}

impl FetchOutcome {
    /// Classify a completed response.
    pub fn from_response(response: RawResponse) -> Self {
        let RawResponse {
            status,
            content_type,
            body,
        } = response;

        if looks_like_html(&body, content_type.as_deref()) {
            return FetchOutcome::HtmlDetected {
                snippet: snippet(&body),
                status,
            };
        }
        if !(200..300).contains(&status) {
            return FetchOutcome::HttpStatus {
                snippet: snippet(&body),
                status,
            };
        }
        match serde_json::from_str::<Value>(&body) {
            Ok(payload) => FetchOutcome::Success { payload, status },
            Err(_) => FetchOutcome::InvalidJson {
                snippet: snippet(&body),
                status,
            },
        }
    }

    pub fn from_transport(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => FetchOutcome::Timeout,
            TransportError::Network(cause) => FetchOutcome::NetworkError(cause),
        }
    }

    /// `None` for [`FetchOutcome::Success`].
    pub fn failure(&self) -> Option<FetchFailure> {
        match self {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::HtmlDetected { status, .. } if *status >= 500 => {
                Some(FetchFailure::ServerError { status: *status })
            }
            FetchOutcome::HtmlDetected { status, .. } => {
                Some(FetchFailure::UnexpectedContentType { status: *status })
            }
            FetchOutcome::HttpStatus { status, .. } if *status >= 500 => {
                Some(FetchFailure::ServerError { status: *status })
            }
            FetchOutcome::HttpStatus { status, .. } => {
                Some(FetchFailure::ClientError { status: *status })
            }
            FetchOutcome::InvalidJson { .. } => Some(FetchFailure::MalformedPayload),
            FetchOutcome::NetworkError(_) => Some(FetchFailure::TransientNetwork),
            FetchOutcome::Timeout => Some(FetchFailure::Timeout),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchOutcome::Success { status, .. }
            | FetchOutcome::HtmlDetected { status, .. }
            | FetchOutcome::HttpStatus { status, .. }
            | FetchOutcome::InvalidJson { status, .. } => Some(*status),
            FetchOutcome::NetworkError(_) | FetchOutcome::Timeout => None,
        }
    }

    /// Body sample or transport cause, for diagnostics.
    pub fn sample(&self) -> Option<String> {
        match self {
            FetchOutcome::Success { .. } | FetchOutcome::Timeout => None,
            FetchOutcome::HtmlDetected { snippet, .. } => Some(match html_title(snippet) {
                Some(title) => format!("[title: {title}] {snippet}"),
                None => snippet.clone(),
            }),
            FetchOutcome::HttpStatus { snippet, .. } | FetchOutcome::InvalidJson { snippet, .. } => {
                Some(snippet.clone())
            }
            FetchOutcome::NetworkError(cause) => Some(cause.clone()),
        }
    }
}

/// HTML by content type, or by a leading `<` once whitespace is trimmed.
/// `<!DOCTYPE` and `<html` both start with `<`.
pub fn looks_like_html(body: &str, content_type: Option<&str>) -> bool {
    if let Some(ct) = content_type {
        let ct = ct.to_ascii_lowercase();
        if ct.contains("text/html") || ct.contains("application/html") {
            return true;
        }
    }
    body.trim_start_matches('\u{feff}').trim_start().starts_with('<')
}

fn snippet(body: &str) -> String {
    truncate_for_log(body.trim(), SNIPPET_LEN)
}

/// `<title>` text of an HTML fragment, if present and non-empty.
pub fn html_title(html: &str) -> Option<String> {
    let document = scraper::Html::parse_document(html);
    let selector = scraper::Selector::parse("title").ok()?;
    let title = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    (!title.is_empty()).then_some(title)
}
