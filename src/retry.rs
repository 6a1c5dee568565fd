//! Retry decisions with exponential backoff and jitter.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::{OilPriceError, OutcomeKind, Result};

/// Configures how many attempts a logical call gets and how long to wait
/// between them.
///
/// A policy is pure data: [`RetryPolicy::delay_for`] and
/// [`RetryPolicy::should_retry`] perform no I/O and can be called from any
/// number of threads or tasks.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per logical call, including the first one.
    pub max_attempts: u32,
    /// Classified outcomes that may be retried.
    pub retryable: BTreeSet<OutcomeKind>,
    /// Delay before the second attempt; doubles for each later attempt.
    pub base_delay: Duration,
    /// Cap applied to the exponential delay before jitter is added.
    pub max_delay: Duration,
    /// Upper bound of the random jitter, as a fraction of the capped delay.
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retryable: BTreeSet::from([OutcomeKind::Server, OutcomeKind::Timeout]),
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_fraction: 0.3,
        }
    }
}

impl RetryPolicy {
    /// Default policy with a different attempt budget.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// A single attempt; nothing is ever retried.
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter_fraction: f64) -> Self {
        self.jitter_fraction = jitter_fraction;
        self
    }

    /// Replaces the set of retryable outcomes.
    pub fn retry_on<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = OutcomeKind>,
    {
        self.retryable = kinds.into_iter().collect();
        self
    }

    /// Checks the invariants a façade relies on.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts < 1 {
            return Err(OilPriceError::Configuration(
                "max_attempts must be at least 1".to_owned(),
            ));
        }
        if !self.jitter_fraction.is_finite() || !(0.0..1.0).contains(&self.jitter_fraction) {
            return Err(OilPriceError::Configuration(format!(
                "jitter_fraction must be in [0, 1), got {}",
                self.jitter_fraction
            )));
        }
        Ok(())
    }

    /// Exponential delay for `attempt_index`, capped at `max_delay`.
    pub fn capped_delay(&self, attempt_index: u32) -> Duration {
        let base = self.base_delay.as_nanos();
        let max = self.max_delay.as_nanos();
        let exponential = 1u128
            .checked_shl(attempt_index)
            .and_then(|factor| base.checked_mul(factor))
            .unwrap_or(u128::MAX);
        nanos_to_duration(exponential.min(max))
    }

    /// Wait before the attempt following `attempt_index`.
    ///
    /// Jitter is added after the cap, so the result can exceed `max_delay`
    /// by up to `jitter_fraction * max_delay`.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let capped = self.capped_delay(attempt_index);
        if self.jitter_fraction <= 0.0 {
            return capped;
        }
        let jitter = capped.as_nanos() as f64 * self.jitter_fraction * fastrand::f64();
        capped.saturating_add(nanos_to_duration(jitter as u128))
    }

    /// Whether a failure classified as `kind` on `attempt_index` gets
    /// another attempt.
    pub fn should_retry(&self, attempt_index: u32, kind: OutcomeKind) -> bool {
        if attempt_index.saturating_add(1) >= self.max_attempts {
            return false;
        }
        self.retryable.contains(&kind)
    }
}

fn nanos_to_duration(nanos: u128) -> Duration {
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}
