//! Intermediate record processor contract
//!
//! Structured inputs, but a single `shutdown` carrying a reason instead of
//! separate lease-lost and shard-ended notifications.

use async_trait::async_trait;
use tracing::trace;

use super::{
    InitializeInput, LeaseLostInput, ProcessRecordsInput, ShardEndedInput, ShutdownInput,
    ShutdownRequestedInput,
};
use crate::error::ProcessingResult;

#[async_trait]
pub trait RecordProcessor: Send {
    async fn initialize(&mut self, input: &InitializeInput) -> ProcessingResult;

    async fn process_records(&mut self, input: ProcessRecordsInput<'_>) -> ProcessingResult;

    /// Inspect `input.reason`: on `ZOMBIE` the lease is gone and checkpointing
    /// will fail, on `TERMINATE` the shard has ended and a checkpoint is required
    async fn shutdown(&mut self, input: ShutdownInput<'_>) -> ProcessingResult;

    async fn shutdown_requested(&mut self, _input: ShutdownRequestedInput<'_>) -> ProcessingResult {
        Ok(())
    }
}

/// Presents an intermediate-contract processor as a current one
///
/// `lease_lost` becomes `shutdown(ZOMBIE)` and `shard_ended` becomes
/// `shutdown(TERMINATE)` with the shard-ended checkpointer. Everything else
/// passes straight through.
pub struct V2ToV3Processor {
    delegate: Box<dyn RecordProcessor>,
}

impl V2ToV3Processor {
    pub fn new(delegate: Box<dyn RecordProcessor>) -> Self {
        Self { delegate }
    }
}

#[async_trait]
impl super::RecordProcessor for V2ToV3Processor {
    async fn initialize(&mut self, input: &InitializeInput) -> ProcessingResult {
        self.delegate.initialize(input).await
    }

    async fn process_records(&mut self, input: ProcessRecordsInput<'_>) -> ProcessingResult {
        self.delegate.process_records(input).await
    }

    async fn lease_lost(&mut self, input: LeaseLostInput<'_>) -> ProcessingResult {
        trace!("Translating lease lost to ZOMBIE shutdown");
        self.delegate
            .shutdown(ShutdownInput::zombie(input.checkpointer))
            .await
    }

    async fn shard_ended(&mut self, input: ShardEndedInput<'_>) -> ProcessingResult {
        trace!("Translating shard ended to TERMINATE shutdown");
        self.delegate
            .shutdown(ShutdownInput::terminate(input.checkpointer))
            .await
    }

    async fn shutdown_requested(&mut self, input: ShutdownRequestedInput<'_>) -> ProcessingResult {
        self.delegate.shutdown_requested(input).await
    }
}
