// src/sources/http.rs
//! Shared outbound HTTP client. GETs retry transport failures, 429 and 5xx with
//! exponential backoff (1s, 2s, 4s, ... capped at 10s); existence checks (`head_ok`, `try_get`)
//! are single-shot.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::ScrapingConfig;

const BASE_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_attempts: u32,
    base_backoff: Duration,
    max_backoff: Duration,
}

impl HttpFetcher {
    pub fn from_config(cfg: &ScrapingConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            max_attempts: cfg.max_retries.max(1),
            base_backoff: BASE_BACKOFF,
            max_backoff: MAX_BACKOFF,
        })
    }

    /// Override the backoff schedule (tests use millisecond delays).
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1), capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Send with retries. Returns the last response even when its status is an error,
    /// so callers can inspect 4xx/429 themselves.
    pub async fn send_with_retry<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match build().send().await {
                Ok(resp) if !is_retryable(resp.status()) || attempt >= self.max_attempts => {
                    return Ok(resp);
                }
                Ok(resp) => {
                    tracing::debug!(
                        status = %resp.status(),
                        url = %resp.url(),
                        attempt,
                        "retryable status"
                    );
                }
                Err(e) if attempt >= self.max_attempts => {
                    counter!("scan_http_failures_total").increment(1);
                    return Err(e).context("http request failed after retries");
                }
                Err(e) => {
                    tracing::debug!(error = %e, attempt, "http transport error, retrying");
                }
            }
            tokio::time::sleep(self.backoff_delay(attempt)).await;
        }
    }

    /// GET with retries; non-2xx after retries is an error.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let resp = self.send_with_retry(|| self.client.get(url)).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("GET {url} returned {status}"));
        }
        Ok(resp)
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.get(url)
            .await?
            .text()
            .await
            .with_context(|| format!("reading body of {url}"))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.get(url)
            .await?
            .json::<T>()
            .await
            .with_context(|| format!("decoding json from {url}"))
    }

    /// Single HEAD request (redirects followed). True only for a 2xx final status.
    pub async fn head_ok(&self, url: &str, timeout: Duration) -> bool {
        match self.client.head(url).timeout(timeout).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::trace!(error = %e, url, "head request failed");
                false
            }
        }
    }

    /// Single GET with no retry and no status check.
    pub async fn try_get(&self, url: &str, timeout: Duration) -> Result<Response> {
        self.client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("GET {url}"))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::from_config(&ScrapingConfig::default()).unwrap()
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let f = fetcher();
        assert_eq!(f.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(f.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(f.backoff_delay(3), Duration::from_secs(4));
        assert_eq!(f.backoff_delay(4), Duration::from_secs(8));
        assert_eq!(f.backoff_delay(5), Duration::from_secs(10));
        assert_eq!(f.backoff_delay(40), Duration::from_secs(10));
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
        assert!(!is_retryable(StatusCode::OK));
    }

    #[test]
    fn zero_retries_still_tries_once() {
        let cfg = ScrapingConfig {
            max_retries: 0,
            ..ScrapingConfig::default()
        };
        let f = HttpFetcher::from_config(&cfg).unwrap();
        assert_eq!(f.max_attempts, 1);
    }
}
