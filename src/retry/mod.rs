//! Checkpointing with retry and backoff
//!
//! The daemon reports why a checkpoint failed. `ThrottlingException` is worth
//! retrying after a pause, `ShutdownException` means the lease is going away
//! and checkpointing should simply stop, and anything else is fatal for the
//! shard.

mod backoff;
mod error;

pub use backoff::{Backoff, ExponentialBackoff, ExponentialBackoffBuilder, FixedBackoff};
pub use error::RetryError;

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::checkpoint::Checkpointer;
use crate::error::CheckpointError;

/// Configuration for checkpoint retries
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (None for infinite)
    pub max_retries: Option<u32>,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: Some(5),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            jitter_factor: 0.1,
        }
    }
}

/// How a retried checkpoint ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointOutcome {
    Checkpointed { attempts: u32 },
    /// The daemon answered `ShutdownException`; nothing was recorded
    SkippedShutdown,
}

/// Retries throttled checkpoints with backoff
pub struct CheckpointRetry<B: Backoff> {
    config: RetryConfig,
    backoff: B,
    attempts: u32,
}

impl CheckpointRetry<ExponentialBackoff> {
    pub fn from_config(config: RetryConfig) -> Self {
        let backoff = ExponentialBackoff::builder()
            .initial_delay(config.initial_backoff)
            .max_delay(config.max_backoff)
            .jitter_factor(config.jitter_factor)
            .build();
        Self::new(config, backoff)
    }
}

impl Default for CheckpointRetry<ExponentialBackoff> {
    fn default() -> Self {
        Self::from_config(RetryConfig::default())
    }
}

impl<B: Backoff> CheckpointRetry<B> {
    pub fn new(config: RetryConfig, backoff: B) -> Self {
        Self {
            config,
            backoff,
            attempts: 0,
        }
    }

    /// Attempts made by the most recent [`CheckpointRetry::checkpoint`] call
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Checkpoints, retrying while the daemon reports throttling
    ///
    /// # Errors
    ///
    /// * [`RetryError::MaxRetriesExceeded`] when still throttled after the
    ///   configured number of attempts
    /// * [`RetryError::Checkpoint`] for any other rejection or channel
    ///   failure, without retrying
    pub async fn checkpoint(
        &mut self,
        checkpointer: &mut Checkpointer<'_>,
        sequence_number: Option<&str>,
        sub_sequence_number: Option<i64>,
    ) -> Result<CheckpointOutcome, RetryError> {
        self.attempts = 0;

        loop {
            self.attempts += 1;

            let kind = match checkpointer
                .checkpoint(sequence_number, sub_sequence_number)
                .await
            {
                Ok(()) => {
                    debug!(attempts = self.attempts, "Checkpoint succeeded");
                    return Ok(CheckpointOutcome::Checkpointed {
                        attempts: self.attempts,
                    });
                }
                Err(CheckpointError::Rejected(kind)) if kind.is_shutdown() => {
                    info!("Encountered shutdown exception, skipping checkpoint");
                    return Ok(CheckpointOutcome::SkippedShutdown);
                }
                Err(CheckpointError::Rejected(kind)) if kind.is_retryable() => kind,
                Err(e) => {
                    warn!(
                        attempts = self.attempts,
                        error = %e,
                        "Checkpoint failed and will not be retried"
                    );
                    return Err(e.into());
                }
            };

            if let Some(max) = self.config.max_retries {
                if self.attempts >= max {
                    warn!(
                        attempts = self.attempts,
                        "Failed to checkpoint after maximum attempts, giving up"
                    );
                    return Err(RetryError::MaxRetriesExceeded(self.attempts, kind));
                }
            }

            let delay = self.backoff.next_delay(self.attempts);
            warn!(
                attempt = self.attempts,
                delay_ms = ?delay.as_millis(),
                "Throttled while checkpointing, retrying after delay"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
