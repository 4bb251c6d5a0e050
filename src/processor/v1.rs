//! Oldest record processor contract
//!
//! Methods take plain values: the shard id, the records as raw JSON maps,
//! and the shutdown reason as text.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{InitializeInput, ProcessRecordsInput, ShutdownInput, ShutdownRequestedInput};
use crate::checkpoint::Checkpointer;
use crate::error::ProcessingResult;

#[async_trait]
pub trait RecordProcessor: Send {
    async fn initialize(&mut self, shard_id: &str) -> ProcessingResult;

    /// `data` in each record is base64 text and is not decoded for you
    async fn process_records(
        &mut self,
        records: &[Map<String, Value>],
        checkpointer: &mut Checkpointer<'_>,
    ) -> ProcessingResult;

    /// `reason` is `"TERMINATE"` or `"ZOMBIE"`
    async fn shutdown(&mut self, checkpointer: &mut Checkpointer<'_>, reason: &str)
        -> ProcessingResult;

    async fn shutdown_requested(
        &mut self,
        _checkpointer: &mut Checkpointer<'_>,
    ) -> ProcessingResult {
        Ok(())
    }
}

/// Presents an oldest-contract processor as an intermediate one by
/// unwrapping structured inputs into plain arguments
pub struct V1ToV2Processor {
    delegate: Box<dyn RecordProcessor>,
}

impl V1ToV2Processor {
    pub fn new(delegate: Box<dyn RecordProcessor>) -> Self {
        Self { delegate }
    }
}

#[async_trait]
impl super::v2::RecordProcessor for V1ToV2Processor {
    async fn initialize(&mut self, input: &InitializeInput) -> ProcessingResult {
        self.delegate.initialize(&input.shard_id).await
    }

    async fn process_records(&mut self, mut input: ProcessRecordsInput<'_>) -> ProcessingResult {
        let records: Vec<Map<String, Value>> = input
            .records
            .iter()
            .map(|record| record.as_map().clone())
            .collect();
        self.delegate
            .process_records(&records, &mut input.checkpointer)
            .await
    }

    async fn shutdown(&mut self, mut input: ShutdownInput<'_>) -> ProcessingResult {
        self.delegate
            .shutdown(&mut input.checkpointer, input.reason.as_str())
            .await
    }

    async fn shutdown_requested(
        &mut self,
        mut input: ShutdownRequestedInput<'_>,
    ) -> ProcessingResult {
        self.delegate
            .shutdown_requested(&mut input.checkpointer)
            .await
    }
}
