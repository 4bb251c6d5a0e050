//! Checkpoint request/response exchange
//!
//! A checkpoint writes a `checkpoint` request to the daemon and then blocks
//! until the next inbound line arrives. That line must be the matching
//! `checkpoint` response; anything else means the two sides are out of sync.

use std::io;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{CheckpointError, CheckpointErrorKind};
use crate::io::LineChannel;
use crate::messages::{decode, Action, CheckpointResponse, OutboundMessage, Record};

/// Responses still owed by the daemon for requests whose wait timed out
///
/// The daemon answers checkpoint requests in order, so the next that many
/// `checkpoint` lines belong to abandoned requests and are discarded.
#[derive(Debug)]
enum LateResponses<'a> {
    Local(usize),
    Shared(&'a mut usize),
}

impl LateResponses<'_> {
    fn count(&mut self) -> &mut usize {
        match self {
            LateResponses::Local(count) => count,
            LateResponses::Shared(count) => count,
        }
    }
}

/// Records progress within a shard by round-tripping through the daemon
///
/// Handed to the processor for the duration of one dispatch. Every call is a
/// fresh request and response, and `&mut self` keeps calls strictly
/// serialized. After a lease is lost every checkpoint fails, but the request
/// is still sent so the daemon can say why.
pub struct Checkpointer<'a> {
    channel: &'a mut dyn LineChannel,
    late_responses: LateResponses<'a>,
    response_timeout: Option<Duration>,
    skip_blank_lines: bool,
}

impl<'a> Checkpointer<'a> {
    pub fn new(channel: &'a mut dyn LineChannel) -> Self {
        Self {
            channel,
            late_responses: LateResponses::Local(0),
            response_timeout: None,
            skip_blank_lines: true,
        }
    }

    /// Bounds the wait for the daemon's response; `None` waits forever
    ///
    /// A request whose wait times out is still answered by the daemon later.
    /// That response is skipped by the next checkpoint on this checkpointer,
    /// or by the dispatch loop once the dispatch has returned.
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_skip_blank_lines(mut self, skip: bool) -> Self {
        self.skip_blank_lines = skip;
        self
    }

    /// Shares the count of outstanding late responses with the dispatch loop
    pub(crate) fn with_late_responses(mut self, count: &'a mut usize) -> Self {
        self.late_responses = LateResponses::Shared(count);
        self
    }

    /// Checkpoints at the given position
    ///
    /// Passing `None` for both values checkpoints at the farthest record
    /// delivered so far.
    ///
    /// # Errors
    ///
    /// * [`CheckpointError::Rejected`] with the daemon's exception name, or
    ///   with `InvalidStateException` if the next message was not a
    ///   checkpoint response
    /// * [`CheckpointError::Timeout`] if a response timeout is configured
    ///   and elapses
    /// * [`CheckpointError::Io`] / [`CheckpointError::Malformed`] when the
    ///   channel fails or the response cannot be decoded
    pub async fn checkpoint(
        &mut self,
        sequence_number: Option<&str>,
        sub_sequence_number: Option<i64>,
    ) -> Result<(), CheckpointError> {
        debug!(
            sequence_number = ?sequence_number,
            sub_sequence_number = ?sub_sequence_number,
            "Requesting checkpoint"
        );

        self.channel
            .write_action(&OutboundMessage::checkpoint(
                sequence_number,
                sub_sequence_number,
            ))
            .await?;

        let response = match self.response_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.await_response()).await {
                Ok(response) => response?,
                Err(_) => {
                    *self.late_responses.count() += 1;
                    warn!(
                        sequence_number = ?sequence_number,
                        timeout = ?limit,
                        "No checkpoint response in time; its late response will be skipped"
                    );
                    return Err(CheckpointError::Timeout(limit));
                }
            },
            None => self.await_response().await?,
        };

        match response {
            CheckpointResponse { error: None, .. } => {
                debug!(sequence_number = ?sequence_number, "Checkpoint succeeded");
                Ok(())
            }
            CheckpointResponse {
                error: Some(name), ..
            } => {
                debug!(
                    sequence_number = ?sequence_number,
                    error = %name,
                    "Checkpoint rejected by daemon"
                );
                Err(CheckpointError::Rejected(CheckpointErrorKind::from_name(
                    &name,
                )))
            }
        }
    }

    /// Checkpoints at the farthest record delivered so far
    pub async fn checkpoint_latest(&mut self) -> Result<(), CheckpointError> {
        self.checkpoint(None, None).await
    }

    /// Checkpoints at exactly this record
    pub async fn checkpoint_record(&mut self, record: &Record) -> Result<(), CheckpointError> {
        self.checkpoint(
            Some(record.sequence_number()),
            Some(record.sub_sequence_number()),
        )
        .await
    }

    /// Reads up to the response for the request just written
    async fn await_response(&mut self) -> Result<CheckpointResponse, CheckpointError> {
        loop {
            let line = self
                .channel
                .read_message(self.skip_blank_lines)
                .await?
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "input closed while awaiting checkpoint response",
                    )
                })?;

            match decode(&line)? {
                Action::Checkpoint(_) if *self.late_responses.count() > 0 => {
                    *self.late_responses.count() -= 1;
                    debug!("Discarding late response to an abandoned checkpoint");
                }
                Action::Checkpoint(response) => return Ok(response),
                other => {
                    warn!(
                        received = %other.name(),
                        "Expected a checkpoint response; protocol is out of sync"
                    );
                    return Err(CheckpointError::invalid_state());
                }
            }
        }
    }
}

impl std::fmt::Debug for Checkpointer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkpointer")
            .field("late_responses", &self.late_responses)
            .field("response_timeout", &self.response_timeout)
            .finish_non_exhaustive()
    }
}
