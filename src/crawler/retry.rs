//! Retry policy for fetches
//!
//! The policy is a pure function of the attempt count and the failure; the fetcher pool owns
//! the loop and the sleeping.

use crate::config::FetchConfig;
use crate::crawler::FetchError;
use rand::Rng;
use std::time::Duration;

/// Upper bound (exclusive) of the random jitter fraction added to each backoff
pub const MAX_JITTER: f64 = 0.25;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDecision {
    /// Try again after waiting this long
    RetryAfter(Duration),
    /// The failure is terminal for this URL in this job
    GiveUp,
}

/// Exponential backoff retry policy
///
/// | Failure | Attempts |
/// |---------|----------|
/// | Timeout, connection error | up to `max_attempts` in total |
/// | HTTP 5xx | 1 + `server_error_retries` |
/// | HTTP 404/410, other HTTP errors, robots | never retried |
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub server_error_retries: u32,
    pub base_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            server_error_retries: config.server_error_retries,
            base_delay: Duration::from_millis(config.retry_base_ms),
            factor: config.retry_factor,
        }
    }

    /// Decides whether to retry after `attempt` attempts (1-based) failed with `error`
    ///
    /// `jitter` is a fraction in `[0, MAX_JITTER)` added on top of the exponential delay;
    /// pass `0.0` for a deterministic answer.
    pub fn decide(&self, attempt: u32, error: &FetchError, jitter: f64) -> RetryDecision {
        let allowed = match error {
            FetchError::Timeout | FetchError::ConnectionError(_) => self.max_attempts,
            FetchError::HttpError { status } if *status >= 500 => 1 + self.server_error_retries,
            FetchError::HttpError { .. }
            | FetchError::RobotsDisallowed
            | FetchError::BodyTooLarge { .. } => 1,
        };

        if attempt >= allowed {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter(self.backoff(attempt, jitter))
        }
    }

    /// Delay before attempt `attempt + 1`: `base × factor^(attempt−1) × (1 + jitter)`
    pub fn backoff(&self, attempt: u32, jitter: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let multiplier = self.factor.max(1).saturating_pow(exponent);
        let delay = self.base_delay.saturating_mul(multiplier);
        delay.mul_f64(1.0 + jitter.clamp(0.0, MAX_JITTER))
    }
}

/// Draws a random jitter fraction in `[0, MAX_JITTER)`
pub fn random_jitter() -> f64 {
    rand::thread_rng().gen_range(0.0..MAX_JITTER)
}
