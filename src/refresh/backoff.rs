//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RefreshConfig;
use crate::fetch::FailureClass;

/// Calculate exponential backoff delay with jitter.
///
/// Jittered delays never exceed `max_ms`, so the sequence for attempts
/// `1, 2, 3, ...` is non-decreasing: doubling always outruns the 10% jitter
/// and once the cap is reached every delay equals the cap.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64, jitter: bool) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter_ms = if jitter && jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay.saturating_add(jitter_ms).min(max_ms))
}

/// Backoff settings for the refresh loop.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base_ms: u64,
    max_ms: u64,
    persistent_multiplier: u64,
    jitter: bool,
}

impl BackoffPolicy {
    pub fn new(base_ms: u64, max_ms: u64, persistent_multiplier: u32, jitter: bool) -> Self {
        Self {
            base_ms,
            max_ms: max_ms.max(base_ms),
            persistent_multiplier: u64::from(persistent_multiplier.max(1)),
            jitter,
        }
    }

    pub fn from_config(config: &RefreshConfig) -> Self {
        Self::new(
            config.base_backoff_ms,
            config.max_backoff_ms,
            config.error_backoff_multiplier,
            config.jitter,
        )
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Delay before retrying after the `attempt`-th consecutive failure.
    pub fn delay(&self, attempt: u32, class: FailureClass) -> Duration {
        let base_ms = match class {
            FailureClass::Transient => self.base_ms,
            FailureClass::Persistent => self.base_ms.saturating_mul(self.persistent_multiplier),
        };
        calculate_backoff(attempt, base_ms, self.max_ms, self.jitter)
    }
}
