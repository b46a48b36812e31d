//! Page retrieval with exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`PageSource`]: core trait, "GET this URL and hand me the body"
//! - [`HttpSource`]: `reqwest`-backed implementation with the catalog headers
//! - [`RetrySource`]: decorator that adds retry logic to any `PageSource`
//!
//! # Retry Strategy
//!
//! - 3 attempts in total by default
//! - Exponential backoff starting at 2 seconds
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd
//!
//! Non-200 responses count as failures and are retried like transport errors.

use crate::config::Config;
use crate::error::{Error, Result};
use rand::{Rng, rng};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Anything that can turn a URL into a page body.
pub trait PageSource {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Plain HTTP client carrying the catalog's User-Agent, Referer and timeout.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    /// Build a client from the request settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Header`] when the configured referer is not a valid
    /// header value, or [`Error::Http`] when the TLS backend cannot start.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_str(&config.referer)?);
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client })
    }
}

impl PageSource for HttpSource {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String> {
        let t0 = Instant::now();
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = resp.text().await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`PageSource`].
///
/// The delay before retry `n` (1-based) is:
/// ```text
/// delay = min(base_delay * 2^(n-1), max_delay) + random_jitter(0..=jitter)
/// ```
pub struct RetrySource<T> {
    inner: T,
    /// Total attempts, including the first.
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
    jitter: Duration,
}

impl<T: PageSource> RetrySource<T> {
    /// Wrap a source with retry logic.
    ///
    /// # Arguments
    ///
    /// * `inner` - The source to wrap
    /// * `max_attempts` - Total attempts per fetch; 0 is treated as 1
    /// * `base_delay` - Delay before the first retry, doubled on each further one
    ///
    /// The delay cap defaults to 30 seconds and the jitter to 250 ms; see
    /// [`with_max_delay`](Self::with_max_delay) and [`with_jitter`](Self::with_jitter).
    pub fn new(inner: T, max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
        }
    }

    pub fn from_config(inner: T, config: &Config) -> Self {
        Self::new(inner, config.max_attempts, config.base_delay())
            .with_max_delay(config.max_delay())
            .with_jitter(config.jitter())
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let shift = (attempt - 1).min(16) as u32;
        let delay = self
            .base_delay
            .saturating_mul(1 << shift)
            .min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=self.jitter.as_millis() as u64);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetrySource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySource")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T: PageSource> PageSource for RetrySource<T> {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if attempt >= self.max_attempts {
                        error!(
                            attempt,
                            max = self.max_attempts,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
