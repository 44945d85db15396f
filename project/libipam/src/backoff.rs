use std::future::Future;
use std::time::Duration;

use rand::{RngCore, rng};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::{IpamError, Result};

/// How the allocator retries after losing a compare-and-swap race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt; `None` retries forever.
    pub max_retries: Option<u64>,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            base_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(200),
            jitter: Duration::from_millis(20),
        }
    }
}

impl RetryPolicy {
    /// Retry forever without sleeping between attempts.
    pub fn immediate() -> Self {
        Self {
            max_retries: None,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u64) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sleep before retry number `retry` (zero based): exponential growth
    /// capped at `max_delay`, plus up to `jitter`.
    pub fn delay(&self, retry: u64) -> Duration {
        let factor = 1u32.checked_shl(retry.min(31) as u32).unwrap_or(u32::MAX);
        let exp = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            exp
        } else {
            exp + Duration::from_millis(rng().next_u64() % jitter_ms)
        }
    }
}

/// Retry settings as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub max_retries: Option<u64>,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    /// Deadline for a whole allocation; `None` waits as long as it takes.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_base_delay_ms() -> u64 {
    2
}

fn default_max_delay_ms() -> u64 {
    200
}

fn default_jitter_ms() -> u64 {
    20
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
            timeout_secs: None,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            jitter: Duration::from_millis(cfg.jitter_ms),
        }
    }
}

/// Run `f` until it succeeds or fails with a terminal error.
///
/// `f` receives the zero based attempt number. The token is checked before
/// every attempt and while sleeping between attempts.
pub(crate) async fn backoff<F, Fut, R>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut f: F,
) -> Result<R>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(IpamError::Cancelled);
        }

        match f(attempt).await {
            Ok(r) => return Ok(r),
            Err(e) if e.is_terminal() => return Err(e),
            Err(_) => {}
        }

        if policy.max_retries.is_some_and(|max| attempt >= max) {
            return Err(IpamError::MaxRetriesExceeded);
        }

        let delay = policy.delay(attempt);
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::select! {
                _ = cancel.cancelled() => return Err(IpamError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        attempt += 1;
    }
}
