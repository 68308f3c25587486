//! Retry budgets and exponential backoff for page submissions.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::PageError;

/// How often, and how patiently, a single page is retried.
///
/// Budgets count every submission of the page, the first one included.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Budget for `Network` and `Timeout` failures.
    pub max_attempts: u32,
    /// Budget for `Endpoint` and `MalformedResponse` failures.
    pub endpoint_error_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_factor: f64,
    /// Upper bound of the random-ish delay added to every backoff.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            endpoint_error_attempts: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            backoff_factor: 2.0,
            max_jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32, endpoint_error_attempts: u32) -> Self {
        Self {
            max_attempts,
            endpoint_error_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_factor: 1.0,
            max_jitter: Duration::ZERO,
        }
    }

    /// Total attempts allowed for a page whose latest failure is `err`.
    pub fn budget_for(&self, err: &PageError) -> u32 {
        let budget = match err {
            PageError::Network(_) | PageError::Timeout(_) => self.max_attempts,
            PageError::Endpoint { .. } | PageError::MalformedResponse(_) => {
                self.endpoint_error_attempts.min(self.max_attempts)
            }
            PageError::InvalidShape(_) => 1,
        };
        budget.max(1)
    }

    /// Whether another attempt is allowed after `attempts` submissions ended in `err`.
    pub fn should_retry(&self, err: &PageError, attempts: u32) -> bool {
        attempts < self.budget_for(err)
    }

    /// Delay before retry number `retry` (1-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(32) as i32;
        let delay = self.initial_backoff.as_secs_f64() * self.backoff_factor.powi(exp);
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff(retry) + self.jitter()
    }

    // Jitter without rand: use nanosecond fraction of current time
    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as u64;
        Duration::from_millis(nanos % (max_ms + 1))
    }
}
