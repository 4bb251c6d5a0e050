//! Line channel to the MultiLangDaemon
//!
//! The daemon writes one JSON message per line to our input and reads our
//! responses from the output stream. Outbound lines are wrapped in a leading
//! and trailing newline so that anything else the application prints to the
//! same stream stays on separate lines and the daemon can still parse ours.

use async_trait::async_trait;
use std::io;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stderr, Stdin, Stdout,
};
use tracing::trace;

use crate::messages::OutboundMessage;

/// Line-oriented access to the daemon's streams
///
/// Every write is flushed before the call returns; the daemon blocks on our
/// responses and must see them immediately.
#[async_trait]
pub trait LineChannel: Send {
    /// Next inbound line without its line terminator, or `None` at end of input
    async fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Writes `\n<line>\n` to the outbound stream and flushes
    async fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Writes a single line to the error stream and flushes
    async fn write_error(&mut self, message: &str) -> io::Result<()>;

    /// Serializes and writes one outbound message
    async fn write_action(&mut self, message: &OutboundMessage) -> io::Result<()> {
        let line = message.to_json()?;
        trace!(line = %line, "Writing action");
        self.write_line(&line).await
    }

    /// Like [`LineChannel::read_line`], optionally skipping whitespace-only lines
    async fn read_message(&mut self, skip_blank: bool) -> io::Result<Option<String>> {
        loop {
            match self.read_line().await? {
                Some(line) if skip_blank && line.trim().is_empty() => {
                    trace!("Skipping blank inbound line");
                }
                other => return Ok(other),
            }
        }
    }
}

/// [`LineChannel`] over an input stream, an output stream and an error stream
#[derive(Debug)]
pub struct IoHandler<R, W, E> {
    input: BufReader<R>,
    /// Partial line kept across a cancelled read
    line: String,
    output: W,
    error: E,
}

impl<R, W, E> IoHandler<R, W, E>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
    E: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W, error: E) -> Self {
        Self {
            input: BufReader::new(input),
            line: String::new(),
            output,
            error,
        }
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn error_output(&self) -> &E {
        &self.error
    }

    pub fn into_parts(self) -> (R, W, E) {
        (self.input.into_inner(), self.output, self.error)
    }
}

/// Handler bound to the process's own standard streams
pub type StdioHandler = IoHandler<Stdin, Stdout, Stderr>;

impl StdioHandler {
    pub fn stdio() -> Self {
        IoHandler::new(tokio::io::stdin(), tokio::io::stdout(), tokio::io::stderr())
    }
}

#[async_trait]
impl<R, W, E> LineChannel for IoHandler<R, W, E>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
    E: AsyncWrite + Unpin + Send,
{
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        if self.input.read_line(&mut self.line).await? == 0 && self.line.is_empty() {
            return Ok(None);
        }

        let mut line = std::mem::take(&mut self.line);
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        let framed = format!("\n{line}\n");
        self.output.write_all(framed.as_bytes()).await?;
        self.output.flush().await
    }

    async fn write_error(&mut self, message: &str) -> io::Result<()> {
        let line = format!("{message}\n");
        self.error.write_all(line.as_bytes()).await?;
        self.error.flush().await
    }
}
