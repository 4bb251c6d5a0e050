// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use kinesis_multilang::processor::{
    v1, InitializeInput, LeaseLostInput, ProcessRecordsInput, RecordProcessor, ShardEndedInput,
    ShutdownRequestedInput,
};
use kinesis_multilang::retry::FixedBackoff;
use kinesis_multilang::{
    Checkpointer, CheckpointOutcome, CheckpointRetry, IoHandler, ProcessingError,
    ProcessingResult, RetryConfig,
};
use serde_json::{json, Map, Value};
use std::io::Cursor;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};
use tokio::sync::Mutex;

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("kinesis_multilang=debug".parse().unwrap())
                    .add_directive("test=debug".parse().unwrap()),
            )
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .try_init()
            .ok();
    });
}

pub type ScriptedHandler = IoHandler<Cursor<Vec<u8>>, Vec<u8>, Vec<u8>>;

/// Handler that reads the given daemon messages, one per line
pub fn scripted(messages: &[Value]) -> ScriptedHandler {
    let input = messages
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    IoHandler::new(Cursor::new(input.into_bytes()), Vec::new(), Vec::new())
}

pub fn parse_output(output: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(output)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

pub fn status(response_for: &str) -> Value {
    json!({ "action": "status", "responseFor": response_for })
}

pub fn checkpoint_request(sequence_number: Option<&str>) -> Value {
    json!({
        "action": "checkpoint",
        "sequenceNumber": sequence_number,
        "subSequenceNumber": null,
    })
}

pub fn record(sequence_number: &str) -> Value {
    json!({
        "action": "record",
        "data": "bWVvdw==",
        "partitionKey": "cat",
        "sequenceNumber": sequence_number,
        "subSequenceNumber": 0,
        "approximateArrivalTimestamp": 1_476_889_707_000_i64,
    })
}

pub type DuplexHandler = IoHandler<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>, Vec<u8>>;

/// The daemon's end of a live connection
pub struct FakeDaemon {
    responses: Lines<BufReader<ReadHalf<DuplexStream>>>,
    requests: WriteHalf<DuplexStream>,
}

impl FakeDaemon {
    /// Connects a daemon to a handler the bridge can run on
    pub fn connect() -> (FakeDaemon, DuplexHandler) {
        let (ours, theirs) = tokio::io::duplex(4096);
        let (our_read, our_write) = tokio::io::split(ours);
        let (their_read, their_write) = tokio::io::split(theirs);

        let daemon = FakeDaemon {
            responses: BufReader::new(our_read).lines(),
            requests: our_write,
        };
        (daemon, IoHandler::new(their_read, their_write, Vec::new()))
    }

    pub async fn send(&mut self, message: Value) {
        let line = format!("{message}\n");
        self.requests.write_all(line.as_bytes()).await.unwrap();
    }

    /// Next non-blank message the bridge wrote
    pub async fn receive(&mut self) -> Value {
        loop {
            let line = self
                .responses
                .next_line()
                .await
                .unwrap()
                .expect("bridge closed its output");
            if !line.trim().is_empty() {
                return serde_json::from_str(&line).unwrap();
            }
        }
    }

    /// Ends the bridge's input
    pub async fn close(&mut self) {
        self.requests.shutdown().await.unwrap();
    }
}

/// Shared, ordered log of what a test processor saw
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub async fn push(&self, event: impl Into<String>) {
        self.events.lock().await.push(event.into());
    }

    pub async fn events(&self) -> Vec<String> {
        self.events.lock().await.clone()
    }
}

/// Oldest-contract processor that retries a rejected checkpoint once
pub struct RetryOnceProcessor {
    pub expected_shard_id: String,
    pub expected_sequence_number: String,
    pub log: EventLog,
}

#[async_trait]
impl v1::RecordProcessor for RetryOnceProcessor {
    async fn initialize(&mut self, shard_id: &str) -> ProcessingResult {
        assert_eq!(shard_id, self.expected_shard_id);
        self.log.push(format!("initialize:{shard_id}")).await;
        Ok(())
    }

    async fn process_records(
        &mut self,
        records: &[Map<String, Value>],
        checkpointer: &mut Checkpointer<'_>,
    ) -> ProcessingResult {
        let sequence_number = records[0]
            .get("sequenceNumber")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        assert_eq!(sequence_number, self.expected_sequence_number);

        if let Err(e) = checkpointer.checkpoint(Some(&sequence_number), None).await {
            self.log.push(format!("checkpoint_failed:{}", e)).await;
            checkpointer.checkpoint(Some(&sequence_number), None).await?;
        }
        self.log.push("checkpointed").await;
        Ok(())
    }

    async fn shutdown(
        &mut self,
        checkpointer: &mut Checkpointer<'_>,
        reason: &str,
    ) -> ProcessingResult {
        self.log.push(format!("shutdown:{reason}")).await;
        if reason == "TERMINATE" {
            checkpointer.checkpoint(None, None).await?;
        }
        Ok(())
    }
}

/// What [`ScriptedProcessor`] does when a method is called
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub fail_initialize: Option<String>,
    pub exit_on_records: Option<i32>,
    pub checkpoint_on_shard_end: bool,
    /// Checkpoint each batch through a [`CheckpointRetry`]
    pub retry_checkpoints: bool,
}

/// Current-contract processor driven by a [`Script`]
#[derive(Debug, Clone, Default)]
pub struct ScriptedProcessor {
    pub script: Script,
    pub log: EventLog,
}

impl ScriptedProcessor {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            log: EventLog::default(),
        }
    }
}

#[async_trait]
impl RecordProcessor for ScriptedProcessor {
    async fn initialize(&mut self, input: &InitializeInput) -> ProcessingResult {
        self.log.push(format!("initialize:{}", input.shard_id)).await;
        if let Some(message) = &self.script.fail_initialize {
            return Err(ProcessingError::failure(anyhow::anyhow!("{message}")));
        }
        Ok(())
    }

    async fn process_records(&mut self, mut input: ProcessRecordsInput<'_>) -> ProcessingResult {
        self.log
            .push(format!("process_records:{}", input.records.len()))
            .await;
        if let Some(code) = self.script.exit_on_records {
            return Err(ProcessingError::exit(code));
        }

        if self.script.retry_checkpoints {
            let last = input
                .records
                .last()
                .map(|record| record.sequence_number().to_string());
            let mut retry = CheckpointRetry::new(
                RetryConfig {
                    max_retries: Some(3),
                    ..Default::default()
                },
                FixedBackoff::new(Duration::from_millis(1)),
            );
            let outcome = retry
                .checkpoint(&mut input.checkpointer, last.as_deref(), None)
                .await?;
            if let CheckpointOutcome::Checkpointed { attempts } = outcome {
                self.log.push(format!("checkpointed:{attempts}")).await;
            }
        }
        Ok(())
    }

    async fn lease_lost(&mut self, _input: LeaseLostInput<'_>) -> ProcessingResult {
        self.log.push("lease_lost").await;
        Ok(())
    }

    async fn shard_ended(&mut self, mut input: ShardEndedInput<'_>) -> ProcessingResult {
        self.log.push("shard_ended").await;
        if self.script.checkpoint_on_shard_end {
            input.checkpointer.checkpoint_latest().await?;
        }
        Ok(())
    }

    async fn shutdown_requested(&mut self, _input: ShutdownRequestedInput<'_>) -> ProcessingResult {
        self.log.push("shutdown_requested").await;
        Ok(())
    }
}
