//! Dispatch loop driving a record processor from daemon messages
//!
//! Each iteration reads one line, decodes it, hands it to the record
//! processor and then reports a `status` back to the daemon. Everything runs
//! in sequence on the calling task: one action is dispatched at a time and
//! any checkpoints a processor makes are nested inside that dispatch.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::checkpoint::Checkpointer;
use crate::error::{BridgeError, ProcessingError, ProcessingResult, Result};
use crate::io::{LineChannel, StdioHandler};
use crate::messages::{
    decode, Action, InitializeInput, OutboundMessage, RecordBatch, ShutdownReason,
};
use crate::processor::{
    LeaseLostInput, ProcessRecordsInput, RecordProcessor, ShardEndedInput, ShutdownRequestedInput,
    VersionedProcessor,
};

/// Configuration for the dispatch loop
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// How long a checkpoint waits for the daemon's response (None waits forever)
    ///
    /// A timed-out checkpoint fails with `CheckpointError::Timeout`. The
    /// daemon's late response is discarded when it arrives.
    pub checkpoint_timeout: Option<Duration>,
    /// Ignore whitespace-only inbound lines instead of decoding them
    pub skip_blank_lines: bool,
    /// Report processor panics on the error stream and keep going
    pub report_panics: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            checkpoint_timeout: None,
            skip_blank_lines: true,
            report_panics: true,
        }
    }
}

impl ProcessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.checkpoint_timeout == Some(Duration::ZERO) {
            return Err(BridgeError::Config(
                "checkpoint_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Input ended or an unrecoverable error stopped the loop
    Terminated,
}

/// Where the processor is in its initialize / process / end lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initialized,
    Ended,
}

/// The subset of actions that reach a record processor
enum Dispatch {
    Initialize(InitializeInput),
    ProcessRecords(RecordBatch),
    LeaseLost,
    ShardEnded,
    ShutdownRequested,
}

impl TryFrom<Action> for Dispatch {
    type Error = BridgeError;

    fn try_from(action: Action) -> Result<Self> {
        match action {
            Action::Initialize(input) => Ok(Dispatch::Initialize(input)),
            Action::ProcessRecords(batch) => Ok(Dispatch::ProcessRecords(batch)),
            Action::Shutdown(ShutdownReason::Zombie) | Action::LeaseLost => Ok(Dispatch::LeaseLost),
            Action::Shutdown(ShutdownReason::Terminate) | Action::ShardEnded => {
                Ok(Dispatch::ShardEnded)
            }
            Action::ShutdownRequested => Ok(Dispatch::ShutdownRequested),
            Action::Checkpoint(_) | Action::Record(_) => {
                Err(BridgeError::UnexpectedAction(action.name()))
            }
        }
    }
}

/// Bridges one record processor to the MultiLangDaemon
///
/// # Examples
///
/// ```rust,no_run
/// use kinesis_multilang::{KclProcess, VersionedProcessor};
/// # use kinesis_multilang::processor::RecordProcessor;
///
/// async fn serve(processor: impl RecordProcessor + 'static) -> kinesis_multilang::Result<()> {
///     let mut process = KclProcess::stdio(VersionedProcessor::v3(processor));
///     match process.run().await {
///         Err(kinesis_multilang::BridgeError::ExitRequested(code)) => std::process::exit(code),
///         other => other,
///     }
/// }
/// ```
pub struct KclProcess<C: LineChannel> {
    channel: C,
    processor: Box<dyn RecordProcessor>,
    config: ProcessConfig,
    state: ProcessState,
    lifecycle: Lifecycle,
    /// Checkpoint responses owed for requests that timed out
    late_checkpoint_responses: usize,
}

impl KclProcess<StdioHandler> {
    /// Reads from stdin, answers on stdout and reports errors on stderr
    pub fn stdio(processor: VersionedProcessor) -> Self {
        Self::new(processor, StdioHandler::stdio())
    }
}

impl<C: LineChannel> KclProcess<C> {
    pub fn new(processor: VersionedProcessor, channel: C) -> Self {
        Self::with_config(processor, channel, ProcessConfig::default())
    }

    /// Creates a dispatch loop, building the adapter chain for the processor's version
    ///
    /// # Arguments
    ///
    /// * `processor` - The record processor, tagged with its contract version
    /// * `channel` - Line channel to the daemon
    /// * `config` - Dispatch loop configuration
    pub fn with_config(processor: VersionedProcessor, channel: C, config: ProcessConfig) -> Self {
        info!(
            version = processor.version(),
            checkpoint_timeout = ?config.checkpoint_timeout,
            "Creating record processor bridge"
        );

        Self {
            channel,
            processor: processor.into_current(),
            config,
            state: ProcessState::Running,
            lifecycle: Lifecycle::Uninitialized,
            late_checkpoint_responses: 0,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Runs until the daemon closes our input
    ///
    /// # Returns
    ///
    /// Returns Ok(()) at end of input. Malformed messages, channel failures
    /// and a processor's [`ProcessingError::Exit`] end the loop with an error;
    /// ordinary processor failures do not.
    pub async fn run(&mut self) -> Result<()> {
        self.config.validate()?;
        info!("Starting record processor dispatch loop");

        let result = self.run_loop().await;
        self.state = ProcessState::Terminated;

        match &result {
            Ok(()) => info!("End of input, dispatch loop finished"),
            Err(e) => error!(error = %e, "Dispatch loop stopped"),
        }
        result
    }

    async fn run_loop(&mut self) -> Result<()> {
        while let Some(line) = self
            .channel
            .read_message(self.config.skip_blank_lines)
            .await?
        {
            self.handle_line(&line).await?;
        }
        Ok(())
    }

    /// Decodes one line, dispatches it and reports completion
    pub async fn handle_line(&mut self, line: &str) -> Result<()> {
        let action = decode(line)?;
        if matches!(action, Action::Checkpoint(_)) && self.late_checkpoint_responses > 0 {
            self.late_checkpoint_responses -= 1;
            debug!(
                remaining = self.late_checkpoint_responses,
                "Discarding late response to an abandoned checkpoint"
            );
            return Ok(());
        }

        let name = action.name();
        debug!(action = %name, "Dispatching action");

        self.perform_action(action).await?;
        self.report_done(name).await
    }

    async fn perform_action(&mut self, action: Action) -> Result<()> {
        let name = action.name();
        let dispatch = Dispatch::try_from(action).inspect_err(|_| {
            error!(
                action = %name,
                "Received an action that only belongs inside a checkpoint exchange"
            );
        })?;
        self.track_lifecycle(&dispatch, name);

        let call = dispatch_to(
            self.processor.as_mut(),
            &mut self.channel,
            &self.config,
            &mut self.late_checkpoint_responses,
            dispatch,
        );
        let result = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(panic) if self.config.report_panics => Err(ProcessingError::failure(
                anyhow::anyhow!("record processor panicked: {}", panic_message(panic.as_ref())),
            )),
            Err(panic) => std::panic::resume_unwind(panic),
        };

        match result {
            Ok(()) => Ok(()),
            Err(ProcessingError::Exit(code)) => {
                info!(action = %name, code = code, "Record processor requested exit");
                Err(BridgeError::ExitRequested(code))
            }
            Err(ProcessingError::Failure(err)) => {
                warn!(action = %name, error = %err, "Record processor raised an error");
                self.channel
                    .write_error(&format!(
                        "Caught error from action dispatch: {err:#}\n{err:?}"
                    ))
                    .await?;
                Ok(())
            }
        }
    }

    async fn report_done(&mut self, response_for: &str) -> Result<()> {
        self.channel
            .write_action(&OutboundMessage::status(response_for))
            .await?;
        Ok(())
    }

    fn track_lifecycle(&mut self, dispatch: &Dispatch, name: &str) {
        let next = match (self.lifecycle, dispatch) {
            (Lifecycle::Uninitialized, Dispatch::Initialize(_)) => Lifecycle::Initialized,
            (Lifecycle::Initialized, Dispatch::LeaseLost | Dispatch::ShardEnded) => {
                Lifecycle::Ended
            }
            (Lifecycle::Initialized, Dispatch::ProcessRecords(_) | Dispatch::ShutdownRequested) => {
                Lifecycle::Initialized
            }
            (current, _) => {
                warn!(
                    action = %name,
                    lifecycle = ?current,
                    "Action arrived out of lifecycle order; dispatching anyway"
                );
                match dispatch {
                    Dispatch::Initialize(_) => Lifecycle::Initialized,
                    Dispatch::LeaseLost | Dispatch::ShardEnded => Lifecycle::Ended,
                    _ => current,
                }
            }
        };
        self.lifecycle = next;
    }
}

/// Routes one action to the matching processor method
///
/// Every method except `initialize` gets a fresh checkpointer bound to the channel.
async fn dispatch_to(
    processor: &mut dyn RecordProcessor,
    channel: &mut dyn LineChannel,
    config: &ProcessConfig,
    late_responses: &mut usize,
    dispatch: Dispatch,
) -> ProcessingResult {
    let checkpointer = Checkpointer::new(channel)
        .with_response_timeout(config.checkpoint_timeout)
        .with_skip_blank_lines(config.skip_blank_lines)
        .with_late_responses(late_responses);

    match dispatch {
        Dispatch::Initialize(input) => processor.initialize(&input).await,
        Dispatch::ProcessRecords(batch) => {
            processor
                .process_records(ProcessRecordsInput {
                    records: batch.records,
                    millis_behind_latest: batch.millis_behind_latest,
                    checkpointer,
                })
                .await
        }
        Dispatch::LeaseLost => processor.lease_lost(LeaseLostInput { checkpointer }).await,
        Dispatch::ShardEnded => processor.shard_ended(ShardEndedInput { checkpointer }).await,
        Dispatch::ShutdownRequested => {
            processor
                .shutdown_requested(ShutdownRequestedInput { checkpointer })
                .await
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
