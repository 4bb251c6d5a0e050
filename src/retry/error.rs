use thiserror::Error;

use crate::error::{CheckpointError, CheckpointErrorKind, ProcessingError};

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("Checkpoint still throttled after {0} attempts: {1}")]
    MaxRetriesExceeded(u32, CheckpointErrorKind),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl RetryError {
    pub fn is_max_retries(&self) -> bool {
        matches!(self, RetryError::MaxRetriesExceeded(_, _))
    }

    /// Exception kind of the last rejected attempt, if the daemon rejected it
    pub fn kind(&self) -> Option<&CheckpointErrorKind> {
        match self {
            RetryError::MaxRetriesExceeded(_, kind) => Some(kind),
            RetryError::Checkpoint(err) => err.kind(),
        }
    }
}

impl From<RetryError> for ProcessingError {
    fn from(err: RetryError) -> Self {
        ProcessingError::Failure(err.into())
    }
}
