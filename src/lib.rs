//! Kinesis MultiLang - write Kinesis record processors in Rust
//!
//! The Kinesis Client Library's MultiLangDaemon runs a record processor as a
//! child process and talks to it over stdin/stdout, one JSON message per
//! line. This crate implements the child side of that protocol: it decodes
//! the daemon's actions, drives a [`RecordProcessor`], reports a status for
//! every action and lets the processor checkpoint through the same channel.
//!
//! Processors written against older contracts are adapted to the current one
//! through [`VersionedProcessor`].

pub mod checkpoint;
pub mod error;
pub mod io;
pub mod logging;
pub mod messages;
pub mod process;
pub mod processor;
pub mod retry;

// Make test utilities available for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test;

pub use checkpoint::Checkpointer;
pub use error::{
    BridgeError, CheckpointError, CheckpointErrorKind, MalformedAction, ProcessingError,
    ProcessingResult, Result,
};
pub use io::{IoHandler, LineChannel, StdioHandler};
pub use messages::{Action, Record};
pub use process::{KclProcess, ProcessConfig, ProcessState};
pub use retry::{CheckpointOutcome, CheckpointRetry, RetryConfig};

// Re-export main traits
pub use crate::processor::{RecordProcessor, VersionedProcessor};
