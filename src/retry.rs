//! Retry and politeness timing for outbound requests.
//!
//! - [`RetryPolicy`]: how many attempts a fetch gets and how long to back off
//!   between them
//! - [`PolitenessDelay`]: the randomized pause taken before every request so
//!   concurrent workers do not hit the origin in lock-step
//!
//! # Backoff Strategy
//!
//! For [`Backoff::Exponential`] the delay before retry `n` (1-based) is:
//! ```text
//! delay = min(base_delay * 2^(n-1), max_delay) + random_jitter(0..=jitter)
//! ```
//! [`Backoff::Fixed`] uses `base_delay` for every retry, still capped and
//! jittered.

use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shape of the delay curve between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    #[default]
    Exponential,
    Fixed,
}

/// Attempt budget and backoff curve for a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff: Backoff,
    /// Upper bound of the random jitter added to every backoff.
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Create a policy with the default 30 second cap and 250 ms of jitter.
    ///
    /// ```ignore
    /// let policy = RetryPolicy::new(3, Duration::from_secs(1), Backoff::Exponential);
    /// ```
    pub fn new(max_attempts: usize, base_delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(30),
            backoff,
            jitter: Duration::from_millis(250),
        }
    }

    /// A policy that never waits. Used by tests.
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff: Backoff::Fixed,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Whether another attempt is allowed after `attempts_made` failures.
    pub fn should_retry(&self, attempts_made: usize) -> bool {
        attempts_made < self.max_attempts
    }

    /// Deterministic part of the delay before retry number `retry` (1-based).
    pub fn base_delay_for(&self, retry: usize) -> Duration {
        let delay = match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential => {
                let shift = retry.saturating_sub(1).min(31) as u32;
                self.base_delay.saturating_mul(1u32 << shift)
            }
        };
        delay.min(self.max_delay)
    }

    /// Full delay before retry number `retry`, jitter included.
    pub fn delay_for(&self, retry: usize) -> Duration {
        self.base_delay_for(retry) + random_between(Duration::ZERO, self.jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Backoff::Exponential)
    }
}

/// Randomized pause taken before every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolitenessDelay {
    pub min: Duration,
    pub max: Duration,
}

impl PolitenessDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn sample(&self) -> Duration {
        random_between(self.min, self.max)
    }
}

impl Default for PolitenessDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_millis(800))
    }
}

fn random_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let lo = min.as_millis() as u64;
    let hi = max.as_millis() as u64;
    Duration::from_millis(rng().random_range(lo..=hi))
}
