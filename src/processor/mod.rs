//! Record processor contracts
//!
//! [`RecordProcessor`] is the current contract. Processors written against
//! the two older contracts ([`v1::RecordProcessor`] and
//! [`v2::RecordProcessor`]) are wrapped in adapters that translate calls
//! into the older shapes, so the dispatch loop only ever talks to the
//! current one.
//!
//! A processor's lifecycle is strictly ordered: `initialize` once, then
//! `process_records` zero or more times interleaved with optional
//! `shutdown_requested` calls, then exactly one of `lease_lost` or
//! `shard_ended`.

pub mod v1;
pub mod v2;

use async_trait::async_trait;
use tracing::debug;

use crate::checkpoint::Checkpointer;
use crate::error::ProcessingResult;
use crate::messages::{Record, ShutdownReason};

pub use crate::messages::InitializeInput;
pub use v1::V1ToV2Processor;
pub use v2::V2ToV3Processor;

/// Implement this to process the records of one shard
///
/// Errors returned as [`ProcessingError::Failure`](crate::ProcessingError::Failure)
/// are written to the error stream and processing continues with the next
/// message. [`ProcessingError::Exit`](crate::ProcessingError::Exit) stops the
/// dispatch loop.
///
/// # Examples
///
/// ```rust
/// use kinesis_multilang::processor::{
///     InitializeInput, LeaseLostInput, ProcessRecordsInput, RecordProcessor, ShardEndedInput,
///     ShutdownRequestedInput,
/// };
/// use kinesis_multilang::ProcessingResult;
///
/// struct Counter {
///     seen: usize,
/// }
///
/// #[async_trait::async_trait]
/// impl RecordProcessor for Counter {
///     async fn initialize(&mut self, _input: &InitializeInput) -> ProcessingResult {
///         Ok(())
///     }
///
///     async fn process_records(
///         &mut self,
///         mut input: ProcessRecordsInput<'_>,
///     ) -> ProcessingResult {
///         self.seen += input.records.len();
///         input.checkpointer.checkpoint_latest().await?;
///         Ok(())
///     }
///
///     async fn lease_lost(&mut self, _input: LeaseLostInput<'_>) -> ProcessingResult {
///         Ok(())
///     }
///
///     async fn shard_ended(&mut self, mut input: ShardEndedInput<'_>) -> ProcessingResult {
///         input.checkpointer.checkpoint_latest().await?;
///         Ok(())
///     }
///
///     async fn shutdown_requested(
///         &mut self,
///         _input: ShutdownRequestedInput<'_>,
///     ) -> ProcessingResult {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait RecordProcessor: Send {
    /// Called once before any records are delivered
    async fn initialize(&mut self, input: &InitializeInput) -> ProcessingResult;

    async fn process_records(&mut self, input: ProcessRecordsInput<'_>) -> ProcessingResult;

    /// The lease is gone; checkpoints made from here will fail
    async fn lease_lost(&mut self, input: LeaseLostInput<'_>) -> ProcessingResult;

    /// End of shard; the processor must checkpoint so child shards can start
    async fn shard_ended(&mut self, input: ShardEndedInput<'_>) -> ProcessingResult;

    /// The worker is shutting down; last chance to checkpoint before the lease is released
    async fn shutdown_requested(&mut self, input: ShutdownRequestedInput<'_>)
        -> ProcessingResult;
}

/// A batch of records plus the checkpointer that covers it
#[derive(Debug)]
pub struct ProcessRecordsInput<'a> {
    pub records: Vec<Record>,
    /// Approximately how far behind the tip of the stream this batch is
    pub millis_behind_latest: i64,
    pub checkpointer: Checkpointer<'a>,
}

#[derive(Debug)]
pub struct LeaseLostInput<'a> {
    /// Every checkpoint attempted through this will be rejected by the daemon
    pub checkpointer: Checkpointer<'a>,
}

#[derive(Debug)]
pub struct ShardEndedInput<'a> {
    pub checkpointer: Checkpointer<'a>,
}

#[derive(Debug)]
pub struct ShutdownRequestedInput<'a> {
    pub checkpointer: Checkpointer<'a>,
}

/// Legacy shutdown notification used by the older contracts
#[derive(Debug)]
pub struct ShutdownInput<'a> {
    pub reason: ShutdownReason,
    pub checkpointer: Checkpointer<'a>,
}

impl<'a> ShutdownInput<'a> {
    pub fn zombie(checkpointer: Checkpointer<'a>) -> Self {
        Self {
            reason: ShutdownReason::Zombie,
            checkpointer,
        }
    }

    pub fn terminate(checkpointer: Checkpointer<'a>) -> Self {
        Self {
            reason: ShutdownReason::Terminate,
            checkpointer,
        }
    }
}

/// A processor tagged with the contract version it implements
///
/// The version is fixed when the processor is handed to the dispatch loop,
/// which builds the adapter chain once with [`VersionedProcessor::into_current`].
pub enum VersionedProcessor {
    V1(Box<dyn v1::RecordProcessor>),
    V2(Box<dyn v2::RecordProcessor>),
    V3(Box<dyn RecordProcessor>),
}

impl VersionedProcessor {
    pub fn v1(processor: impl v1::RecordProcessor + 'static) -> Self {
        VersionedProcessor::V1(Box::new(processor))
    }

    pub fn v2(processor: impl v2::RecordProcessor + 'static) -> Self {
        VersionedProcessor::V2(Box::new(processor))
    }

    pub fn v3(processor: impl RecordProcessor + 'static) -> Self {
        VersionedProcessor::V3(Box::new(processor))
    }

    /// 1 is the oldest contract, 3 the current one
    pub fn version(&self) -> u8 {
        match self {
            VersionedProcessor::V1(_) => 1,
            VersionedProcessor::V2(_) => 2,
            VersionedProcessor::V3(_) => 3,
        }
    }

    /// Wraps the processor in whatever adapters its version needs
    pub fn into_current(self) -> Box<dyn RecordProcessor> {
        debug!(version = self.version(), "Building record processor adapter chain");
        match self {
            VersionedProcessor::V1(processor) => Box::new(V2ToV3Processor::new(Box::new(
                V1ToV2Processor::new(processor),
            ))),
            VersionedProcessor::V2(processor) => Box::new(V2ToV3Processor::new(processor)),
            VersionedProcessor::V3(processor) => processor,
        }
    }
}

impl std::fmt::Debug for VersionedProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedProcessor")
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}
