//! Request pacing and retry utilities for the storefront scraper.
//!
//! [`DomainPacer`] spaces requests to the same domain by a minimum delay plus
//! random jitter. [`BackoffWindow`] draws the random sleep used before a
//! retry, and [`retry_with_backoff`] applies it to single-page fetches.
//! Non-retriable errors (404s, malformed URLs) are propagated immediately.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::ScraperError;

/// Inclusive range of whole seconds to sleep before retrying a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffWindow {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl BackoffWindow {
    /// The 10–89s window the storefront tolerates between retries.
    pub const DEFAULT: Self = Self {
        min_secs: 10,
        max_secs: 89,
    };

    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs: min_secs.min(max_secs),
            max_secs: max_secs.max(min_secs),
        }
    }

    /// Draws a uniformly random delay from the window.
    #[must_use]
    pub fn sample(&self) -> Duration {
        if self.max_secs == 0 {
            return Duration::ZERO;
        }
        let secs = rand::rng().random_range(self.min_secs..=self.max_secs);
        Duration::from_secs(secs)
    }
}

/// Per-domain request pacing.
///
/// Each call to [`DomainPacer::wait`] reserves the next free slot for the
/// domain, so concurrent callers queue up behind each other instead of
/// bursting.
#[derive(Debug)]
pub struct DomainPacer {
    min_delay: Duration,
    jitter_ms: u64,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl DomainPacer {
    #[must_use]
    pub fn new(min_delay_ms: u64, jitter_ms: u64) -> Self {
        Self {
            min_delay: Duration::from_millis(min_delay_ms),
            jitter_ms,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Sleeps until `domain` may be hit again.
    pub async fn wait(&self, domain: &str) {
        let jitter = if self.jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=self.jitter_ms))
        };
        let delay = self.reserve(domain, Instant::now(), jitter);
        if !delay.is_zero() {
            tracing::debug!(
                domain,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "pacing request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Reserves the next slot for `domain` and returns how long the caller
    /// must wait for it, measured from `now`.
    fn reserve(&self, domain: &str, now: Instant, jitter: Duration) -> Duration {
        let mut slots = self
            .next_slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let slot = slots.entry(domain.to_string()).or_insert(now);
        let start = (*slot).max(now);
        *slot = start + self.min_delay + jitter;
        start.saturating_duration_since(now)
    }
}

/// Returns `true` if `err` is worth another attempt after rotating identity
/// and backing off. Everything except the 404 family and malformed URLs is.
fn is_retriable(err: &ScraperError) -> bool {
    !matches!(
        err,
        ScraperError::NotFound { .. }
            | ScraperError::ShopNotFound { .. }
            | ScraperError::InvalidUrl { .. }
    )
}

/// Executes `operation`, retrying transient errors up to `max_retries`
/// additional times with a random sleep drawn from `window` between attempts.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    window: BackoffWindow,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay = window.sample();
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "transient scraper error, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
