use catalog_config::{BackoffKind, QueueConfig};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Maps the 1-based number of a failed attempt to the wait before the next
/// one.
pub type RetryDelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Retry ceiling plus the delay function the dispatcher consults after a
/// transient failure.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retry: u32,
    delay: RetryDelayFn,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retry", &self.max_retry)
            .field("delay", &std::any::type_name::<RetryDelayFn>())
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(5))
    }
}

impl RetryPolicy {
    pub fn new<F>(max_retry: u32, delay: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self {
            max_retry,
            delay: Arc::new(delay),
        }
    }

    pub fn fixed(max_retry: u32, delay: Duration) -> Self {
        Self::new(max_retry, move |_| delay)
    }

    pub fn exponential(max_retry: u32, base: Duration, max: Duration) -> Self {
        Self::new(max_retry, move |attempt| exponential_delay(attempt, base, max))
    }

    /// Exponential backoff spread by up to `jitter_ratio` in either
    /// direction, never exceeding `max`.
    pub fn exponential_jittered(
        max_retry: u32,
        base: Duration,
        max: Duration,
        jitter_ratio: f64,
    ) -> Self {
        let ratio = jitter_ratio.clamp(0.0, 1.0);
        Self::new(max_retry, move |attempt| {
            let anchor = exponential_delay(attempt, base, max).as_secs_f64();
            let span = anchor * ratio;
            if span <= 0.0 {
                return Duration::from_secs_f64(anchor);
            }
            let jittered = rand::rng().random_range(anchor - span..=anchor + span);
            Duration::from_secs_f64(jittered.clamp(0.0, max.as_secs_f64()))
        })
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        match config.backoff {
            BackoffKind::Fixed => Self::fixed(config.max_retry, config.retry_delay),
            BackoffKind::Exponential => Self::exponential_jittered(
                config.max_retry,
                config.retry_delay,
                config.backoff_max,
                0.25,
            ),
        }
    }

    pub fn max_retry(&self) -> u32 {
        self.max_retry
    }

    /// Whether a task that has already failed `previous_failures` times may
    /// be retried after failing once more.
    pub fn allows_retry(&self, previous_failures: u32) -> bool {
        previous_failures < self.max_retry
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        (self.delay)(attempt.max(1))
    }
}

/// `base * 2^(attempt - 1)`, capped at `max`.
pub fn exponential_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.checked_mul(1u32 << exponent)
        .map_or(max, |delay| delay.min(max))
}
