//! Error types for the MultiLangDaemon bridge

use std::time::Duration;
use thiserror::Error;

/// Structural problem with an inbound action line
///
/// Raised by the decoder. The dispatch loop treats it as fatal because the
/// daemon never sends malformed messages outside of fault scenarios.
#[derive(Debug, Error)]
pub enum MalformedAction {
    #[error("Action line is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Action {0} was expected to be a JSON object")]
    NotAnObject(String),

    #[error("Action {line} was expected to have key \"action\" -- Allowed {allowed}")]
    MissingAction { line: String, allowed: String },

    #[error(
        "Received an action which couldn't be understood. Action was '{action}' -- Allowed {allowed}"
    )]
    UnknownAction { action: String, allowed: String },

    #[error("Action '{action}' is missing required field \"{field}\"")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },

    #[error("Action '{action}' has invalid field \"{field}\": expected {expected}")]
    InvalidField {
        action: &'static str,
        field: &'static str,
        expected: &'static str,
    },
}

/// Exception name reported by the daemon in a failed checkpoint response
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CheckpointErrorKind {
    /// The lease was lost or the worker is shutting down; stop checkpointing
    Shutdown,
    /// A dependency of the daemon is throttled; retry with backoff
    Throttling,
    /// The daemon or this bridge is out of sync; do not retry
    InvalidState,
    /// Any other exception name, carried verbatim
    Other(String),
}

impl CheckpointErrorKind {
    pub const SHUTDOWN: &'static str = "ShutdownException";
    pub const THROTTLING: &'static str = "ThrottlingException";
    pub const INVALID_STATE: &'static str = "InvalidStateException";

    pub fn from_name(name: &str) -> Self {
        match name {
            Self::SHUTDOWN => CheckpointErrorKind::Shutdown,
            Self::THROTTLING => CheckpointErrorKind::Throttling,
            Self::INVALID_STATE => CheckpointErrorKind::InvalidState,
            other => CheckpointErrorKind::Other(other.to_string()),
        }
    }

    /// The exception name exactly as the daemon sent it
    pub fn as_str(&self) -> &str {
        match self {
            CheckpointErrorKind::Shutdown => Self::SHUTDOWN,
            CheckpointErrorKind::Throttling => Self::THROTTLING,
            CheckpointErrorKind::InvalidState => Self::INVALID_STATE,
            CheckpointErrorKind::Other(name) => name,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckpointErrorKind::Throttling)
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, CheckpointErrorKind::Shutdown)
    }

    /// Invalid state and unrecognized names end processing of the shard
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CheckpointErrorKind::InvalidState | CheckpointErrorKind::Other(_)
        )
    }
}

impl std::fmt::Display for CheckpointErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned from a checkpoint round-trip
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint failed: {0}")]
    Rejected(CheckpointErrorKind),

    #[error("Checkpoint response not received within {0:?}")]
    Timeout(Duration),

    #[error("Checkpoint response could not be decoded: {0}")]
    Malformed(#[from] MalformedAction),

    #[error("I/O error during checkpoint: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckpointError {
    pub(crate) fn invalid_state() -> Self {
        CheckpointError::Rejected(CheckpointErrorKind::InvalidState)
    }

    /// Exception kind reported by the daemon, if the daemon rejected the checkpoint
    pub fn kind(&self) -> Option<&CheckpointErrorKind> {
        match self {
            CheckpointError::Rejected(kind) => Some(kind),
            _ => None,
        }
    }

    /// Exception name carried by a rejected checkpoint
    pub fn value(&self) -> Option<&str> {
        self.kind().map(CheckpointErrorKind::as_str)
    }
}

/// Error raised from inside a record processor method
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Reported on the error channel; the dispatch loop keeps running
    #[error("Record processor failure: {0}")]
    Failure(#[source] anyhow::Error),

    /// Stops the dispatch loop immediately so the process can exit
    #[error("Record processor requested process exit with code {0}")]
    Exit(i32),
}

impl ProcessingError {
    pub fn failure(err: impl Into<anyhow::Error>) -> Self {
        ProcessingError::Failure(err.into())
    }

    pub fn exit(code: i32) -> Self {
        ProcessingError::Exit(code)
    }
}

impl From<anyhow::Error> for ProcessingError {
    fn from(err: anyhow::Error) -> Self {
        ProcessingError::Failure(err)
    }
}

impl From<CheckpointError> for ProcessingError {
    fn from(err: CheckpointError) -> Self {
        ProcessingError::Failure(err.into())
    }
}

/// Main error type returned by the dispatch loop
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Malformed(#[from] MalformedAction),

    #[error("I/O error on the daemon channel: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected '{0}' action outside of a checkpoint exchange")]
    UnexpectedAction(&'static str),

    #[error("Record processor requested process exit with code {0}")]
    ExitRequested(i32),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for dispatch loop operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Result type for record processor methods
pub type ProcessingResult = std::result::Result<(), ProcessingError>;
