use std::time::Duration;

use reqwest::StatusCode;

/// Statuses that are retried when no explicit list is given.
pub const DEFAULT_STATUS_FORCELIST: [u16; 4] = [408, 502, 503, 504];

/// How transient failures are retried.
///
/// Every request issued by the client, including the token request, goes
/// through this policy. The delay before the `n`th retry is
/// `backoff_factor * 2^(n-1)`, capped at `max_backoff`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: Duration,
    pub max_backoff: Duration,
    pub status_forcelist: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: Duration::from_secs(1),
            max_backoff: Duration::from_secs(120),
            status_forcelist: DEFAULT_STATUS_FORCELIST.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub(crate) fn retries_status(&self, status: StatusCode) -> bool {
        self.status_forcelist.contains(&status.as_u16())
    }

    pub(crate) fn retries_error(&self, err: &reqwest::Error) -> bool {
        err.is_connect() || err.is_timeout()
    }

    /// Delay before retry number `retry` (1-based).
    pub(crate) fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        self.backoff_factor
            .checked_mul(1u32 << exp)
            .map_or(self.max_backoff, |wait| wait.min(self.max_backoff))
    }
}
