//! [`Fetcher`] backed by `reqwest`.

use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use super::{Fetcher, RawResponse, TransportError};

/// `Accept` value sent with every request: JSON first, text tolerated.
pub const ACCEPT_JSON: &str = "application/json, text/*;q=0.2";

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(user_agent: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            user_agent: user_agent.into(),
        })
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get(&self, url: &str, timeout: Duration) -> Result<RawResponse, TransportError> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, ACCEPT_JSON)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(transport_error)?;

        debug!(
            status,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "GET completed"
        );
        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

fn transport_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        warn!(error = %e, "Transport failure");
        TransportError::Network(e.to_string())
    }
}
