//! Reference hashes served over HTTP, with retry and backoff.
//!
//! Fetches `<base_url>/<locale>.json`. Connection failures, timeouts and
//! 429/502/503/504 responses are retried with exponential backoff; a 404 means
//! the locale is not published.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use super::format::{hash_file_name, parse_hash_file};
use super::set::LocaleHashes;
use super::source::HashSource;
use crate::error::{CardMatchError, Result};

/// Configuration for an [`HttpSource`].
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// Base URL the locale files live under.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors.
    pub max_retries: u32,
    /// Initial retry interval.
    pub initial_interval: Duration,
    /// Maximum retry interval.
    pub max_interval: Duration,
}

impl HttpSourceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(15),
            max_retries: 3,
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(4),
        }
    }
}

/// Loads hash files from a static file server or CDN.
pub struct HttpSource {
    client: Client,
    config: HttpSourceConfig,
}

impl HttpSource {
    pub fn new(config: HttpSourceConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn url_for(&self, locale: &str) -> Result<String> {
        Ok(format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            hash_file_name(locale)?
        ))
    }

    async fn fetch_once(
        &self,
        url: &str,
        locale: &str,
    ) -> std::result::Result<Option<LocaleHashes>, backoff::Error<CardMatchError>> {
        let start = Instant::now();

        let response = self.client.get(url).send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if is_transient_error(&e) {
                warn!(error = %e, latency_ms, "Transient error, will retry");
                backoff::Error::transient(CardMatchError::Http(e))
            } else {
                warn!(error = %e, latency_ms, "Permanent error, aborting");
                backoff::Error::permanent(CardMatchError::Http(e))
            }
        })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let err = CardMatchError::ServiceStatus {
                url: url.to_string(),
                status: status.as_u16(),
            };
            return if is_transient_status(status) {
                warn!(status = %status, "Transient HTTP status, will retry");
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            };
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| backoff::Error::transient(CardMatchError::Http(e)))?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            bytes = bytes.len(),
            "Request completed successfully"
        );

        parse_hash_file(locale, &bytes)
            .map(Some)
            .map_err(backoff::Error::permanent)
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries.max(1)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl HashSource for HttpSource {
    #[instrument(skip(self))]
    async fn load(&self, locale: &str) -> Result<Option<LocaleHashes>> {
        let url = self.url_for(locale)?;
        retry_notify(
            self.build_backoff(),
            || {
                let url = &url;
                async move { self.fetch_once(url, locale).await }
            },
            |err: CardMatchError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    fn describe(&self) -> String {
        format!("http {}", self.config.base_url)
    }
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
