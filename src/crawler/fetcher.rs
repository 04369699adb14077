//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent
//! - Single raw GET requests with failure classification (`http_fetch`)
//! - The per-job fetcher pool: robots compliance, per-host politeness and retries

use crate::config::{SiteConfig, UserAgentConfig};
use crate::crawler::politeness::HostLimiter;
use crate::crawler::retry::{random_jitter, RetryDecision, RetryPolicy};
use crate::robots::RobotsCache;
use reqwest::{redirect::Policy, Client};
use std::borrow::Cow;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

/// Maximum redirect hops followed for one request
const MAX_REDIRECTS: usize = 10;

/// Largest response body read; anything bigger fails the URL
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Classified fetch failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("HTTP status {status}")]
    HttpError { status: u16 },

    #[error("disallowed by robots.txt")]
    RobotsDisallowed,

    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

impl FetchError {
    /// HTTP 404 or 410: the resource is confirmed gone
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::HttpError { status: 404 | 410 })
    }

    /// Any 4xx status
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::HttpError { status } if (400..500).contains(status))
    }

    fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::HttpError {
                status: status.as_u16(),
            }
        } else {
            Self::ConnectionError(e.to_string())
        }
    }
}

/// A successful (2xx) HTTP response
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value (empty when absent)
    pub content_type: String,
    /// Response body, after any transfer decoding
    pub body: Vec<u8>,
}

impl RawResponse {
    /// The body as text; invalid UTF-8 sequences are replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Builds an HTTP client with proper configuration
///
/// The user agent is `Name/Version (+ContactURL)`. Redirects are followed up to ten hops.
///
/// # Example
///
/// ```no_run
/// use site_indexer::config::UserAgentConfig;
/// use site_indexer::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs one GET request with no retry logic
///
/// Non-2xx statuses are returned as `FetchError::HttpError`. Bodies larger than
/// [`MAX_BODY_BYTES`] are rejected without being buffered.
pub async fn http_fetch(
    client: &Client,
    url: &Url,
    timeout: Duration,
) -> Result<RawResponse, FetchError> {
    let mut response = client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(&e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpError {
            status: status.as_u16(),
        });
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let limit = MAX_BODY_BYTES;
    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(FetchError::BodyTooLarge { limit });
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| FetchError::from_reqwest(&e))?
    {
        if body.len() + chunk.len() > limit {
            return Err(FetchError::BodyTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(RawResponse {
        final_url,
        status: status.as_u16(),
        content_type,
        body,
    })
}

/// Politeness-constrained fetcher shared by the workers of one job
///
/// Owns the job's HTTP client, robots cache, host limiter and retry policy; nothing here is
/// process-wide, so concurrent jobs never interfere.
#[derive(Debug)]
pub struct FetcherPool {
    client: Client,
    timeout: Duration,
    robots: Option<RobotsCache>,
    agent_token: String,
    limiter: HostLimiter,
    retry: RetryPolicy,
}

impl FetcherPool {
    /// Creates the pool for one job from the site configuration
    pub fn new(config: &SiteConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.fetch.timeout_secs);
        let client = build_http_client(&config.user_agent, timeout)?;

        let robots = config
            .politeness
            .respect_robots
            .then(|| RobotsCache::new(client.clone(), timeout));

        Ok(Self {
            client,
            timeout,
            robots,
            agent_token: config.user_agent.crawler_name.clone(),
            limiter: HostLimiter::new(
                config.politeness.per_host_limit() as usize,
                Duration::from_millis(config.politeness.delay_ms),
            ),
            retry: RetryPolicy::from_config(&config.fetch),
        })
    }

    /// Sitemap URLs the host's robots.txt announces (none when robots are not respected)
    pub async fn robots_sitemaps(&self, url: &Url) -> Vec<String> {
        match &self.robots {
            Some(cache) => cache.rules_for(url).await.sitemaps(),
            None => Vec::new(),
        }
    }

    /// Fetches a URL honouring robots.txt, per-host limits and the retry policy
    ///
    /// # Returns
    ///
    /// * `Ok(RawResponse)` - A 2xx response
    /// * `Err(FetchError)` - The final classified failure once retries are exhausted
    pub async fn fetch(&self, url: &Url) -> Result<RawResponse, FetchError> {
        let crawl_delay = match &self.robots {
            Some(cache) => {
                let rules = cache.rules_for(url).await;
                if !rules.is_allowed(url, &self.agent_token) {
                    return Err(FetchError::RobotsDisallowed);
                }
                rules.crawl_delay(&self.agent_token)
            }
            None => None,
        };

        let mut attempt = 1;
        loop {
            let result = {
                let _permit = self.limiter.acquire(url, crawl_delay).await;
                trace!("GET {} (attempt {})", url, attempt);
                http_fetch(&self.client, url, self.timeout).await
            };

            let error = match result {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            match self.retry.decide(attempt, &error, random_jitter()) {
                RetryDecision::RetryAfter(delay) => {
                    debug!(
                        "Retrying {} after {:?} (attempt {} failed: {})",
                        url, delay, attempt, error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::GiveUp => return Err(error),
            }
        }
    }
}
