use chrono::Utc;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER},
    StatusCode,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::{config::UpstreamConfig, types::RawPage};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request failed after {attempts} attempt(s): {source}")]
    Request {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("upstream returned HTTP {status} after {attempts} attempt(s)")]
    Status { attempts: u32, status: StatusCode },
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
}

enum AttemptError {
    Request(reqwest::Error),
    Status(StatusCode),
}

impl AttemptError {
    fn into_fetch_error(self, attempts: u32) -> FetchError {
        match self {
            AttemptError::Request(source) => FetchError::Request { attempts, source },
            AttemptError::Status(status) => FetchError::Status { attempts, status },
        }
    }
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptError::Request(e) => write!(f, "{}", e),
            AttemptError::Status(status) => write!(f, "HTTP {}", status),
        }
    }
}

/// HTTP client for the upstream stats page with linear retry backoff.
pub struct Fetcher {
    client: reqwest::Client,
    max_attempts: u32,
    backoff_step: Duration,
}

impl Fetcher {
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        if let Ok(value) = HeaderValue::from_str(&config.accept_language) {
            headers.insert(ACCEPT_LANGUAGE, value);
        }
        if let Ok(value) = HeaderValue::from_str(&config.referer) {
            headers.insert(REFERER, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            max_attempts: config.max_attempts.max(1),
            backoff_step: config.backoff_step(),
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<RawPage, FetchError> {
        let mut attempt = 1;

        loop {
            match self.attempt(url).await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let html = response.text().await.map_err(FetchError::Body)?;
                    info!("Fetched {} ({} bytes) on attempt {}", url, html.len(), attempt);
                    return Ok(RawPage {
                        html,
                        status,
                        fetched_at: Utc::now(),
                    });
                }
                Err(e) => {
                    if attempt >= self.max_attempts {
                        return Err(e.into_fetch_error(attempt));
                    }
                    let delay = self.backoff_step.saturating_mul(attempt);
                    warn!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt, self.max_attempts, url, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, url: &str) -> Result<reqwest::Response, AttemptError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(AttemptError::Request)?;

        if response.status() != StatusCode::OK {
            return Err(AttemptError::Status(response.status()));
        }
        Ok(response)
    }
}
