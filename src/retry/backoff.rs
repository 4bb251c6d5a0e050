use rand::Rng;
use std::time::Duration;
use tracing::trace;

/// Delay policy between checkpoint attempts
pub trait Backoff: Send + Sync {
    /// Delay to wait after the given (1-based) failed attempt
    fn next_delay(&self, attempt: u32) -> Duration;
}

/// Exponential backoff with jitter, capped at a maximum delay
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter_factor: f64,
}

impl ExponentialBackoff {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self::builder()
            .initial_delay(initial_delay)
            .max_delay(max_delay)
            .build()
    }

    pub fn builder() -> ExponentialBackoffBuilder {
        ExponentialBackoffBuilder::default()
    }
}

impl Backoff for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let max_ms = self.max_delay.as_millis() as f64;
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_ms = (self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent))
            .min(max_ms);

        let jitter_range = base_ms * self.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let delay_ms = (base_ms + jitter).clamp(0.0, max_ms);

        trace!(
            attempt = attempt,
            base_delay_ms = base_ms,
            jitter_ms = jitter,
            delay_ms = delay_ms,
            "Calculated checkpoint backoff"
        );

        Duration::from_millis(delay_ms as u64)
    }
}

#[derive(Debug)]
pub struct ExponentialBackoffBuilder {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter_factor: f64,
}

impl Default for ExponentialBackoffBuilder {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl ExponentialBackoffBuilder {
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Clamped to `0.0..=1.0`
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    pub fn build(self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            multiplier: self.multiplier,
            jitter_factor: self.jitter_factor,
        }
    }
}

/// Same delay after every attempt
#[derive(Debug, Clone)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Backoff for FixedBackoff {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}
