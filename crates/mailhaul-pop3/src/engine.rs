//! The protocol engine.
//!
//! The engine exclusively owns the transport, the capability set, and the
//! session state. It serializes command execution, concatenates pipelined
//! groups into single writes, and consumes responses in FIFO order. All
//! I/O goes through [`FramedStream`], which enforces the per-primitive
//! timeout and the cancellation token; the engine poisons the session on
//! any fatal error so that callers see a consistent `Disconnected` state.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::command::Command;
use crate::connection::{FramedStream, PayloadReader, TlsUpgrade};
use crate::logger::ProtocolLogger;
use crate::pipeline;
use crate::types::{Capability, CapabilitySet, SessionState, StatusLine};
use crate::{Error, Result};

pub(crate) struct Engine<S> {
    /// Only vacated transiently while STLS swaps the transport.
    framed: Option<FramedStream<S>>,
    state: SessionState,
    caps: CapabilitySet,
    cancel: CancellationToken,
}

impl<S> Engine<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(stream: S, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            framed: Some(FramedStream::new(stream, timeout, cancel.clone())),
            state: SessionState::Disconnected,
            caps: CapabilitySet::new(),
            cancel,
        }
    }

    pub(crate) fn set_logger(&mut self, logger: ProtocolLogger) {
        if let Some(framed) = &mut self.framed {
            framed.set_logger(logger);
        }
    }

    pub(crate) const fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub(crate) const fn capabilities(&self) -> &CapabilitySet {
        &self.caps
    }

    pub(crate) fn capabilities_mut(&mut self) -> &mut CapabilitySet {
        &mut self.caps
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn framed_mut(&mut self) -> Result<&mut FramedStream<S>> {
        self.framed.as_mut().ok_or(Error::NotConnected)
    }

    /// Poisons the session on fatal errors, including cancellation observed
    /// mid-I/O.
    fn check<T>(&mut self, res: Result<T>) -> Result<T> {
        if let Err(err) = &res {
            if err.is_fatal() || matches!(err, Error::Cancelled) {
                tracing::debug!(error = %err, "session closed");
                self.state = SessionState::Disconnected;
            }
        }
        res
    }

    /// Reads one raw response line.
    pub(crate) async fn read_line(&mut self) -> Result<Vec<u8>> {
        let res = self.framed_mut()?.read_line().await;
        self.check(res)
    }

    /// Reads and parses one status line.
    pub(crate) async fn read_status(&mut self) -> Result<StatusLine> {
        let line = self.read_line().await?;
        let parsed = StatusLine::parse(&line);
        self.check(parsed)
    }

    /// Writes one or more commands as a single flush.
    pub(crate) async fn send(&mut self, cmds: &[Command]) -> Result<()> {
        let mut buf = Vec::new();
        {
            let framed = self.framed_mut()?;
            for cmd in cmds {
                let bytes = cmd.serialize();
                framed.log_client(&bytes[..bytes.len() - 2], cmd.redaction());
                buf.extend_from_slice(&bytes);
            }
        }
        let res = self.framed_mut()?.write_command(&buf).await;
        self.check(res)
    }

    /// Sends a command and reads its status line.
    pub(crate) async fn execute(&mut self, cmd: &Command) -> Result<StatusLine> {
        self.send(std::slice::from_ref(cmd)).await?;
        self.read_status().await
    }

    /// Sends a command, mapping `-ERR` to a command error.
    pub(crate) async fn execute_ok(&mut self, cmd: &Command) -> Result<StatusLine> {
        let status = self.execute(cmd).await?;
        if status.is_ok() {
            Ok(status)
        } else {
            Err(Error::command(status.message, status.code))
        }
    }

    /// Collects a multi-line payload into one buffer.
    pub(crate) async fn read_payload(&mut self) -> Result<Vec<u8>> {
        let res = {
            let framed = self.framed_mut()?;
            framed.payload().collect().await
        };
        self.check(res)
    }

    /// Collects a multi-line payload as individual lines.
    pub(crate) async fn read_payload_lines(&mut self) -> Result<Vec<Vec<u8>>> {
        let res = {
            let framed = self.framed_mut()?;
            let mut payload = framed.payload();
            let mut lines = Vec::new();
            loop {
                match payload.next_line().await {
                    Ok(Some(line)) => lines.push(line),
                    Ok(None) => break Ok(lines),
                    Err(err) => break Err(err),
                }
            }
        };
        self.check(res)
    }

    /// Opens a lazy stream over the payload of the response just accepted.
    pub(crate) fn open_stream(&mut self) -> Result<MessageStream<'_, S>> {
        let Self { framed, state, .. } = self;
        let framed = framed.as_mut().ok_or(Error::NotConnected)?;
        Ok(MessageStream {
            payload: framed.payload(),
            state,
        })
    }

    /// Reads the greeting, capturing any APOP timestamp.
    ///
    /// A negative greeting is a protocol error: the server is refusing
    /// service before any command was sent.
    pub(crate) async fn read_greeting(&mut self) -> Result<()> {
        let line = self.read_line().await?;
        let status = self.check(StatusLine::parse(&line))?;
        if !status.is_ok() {
            self.state = SessionState::Disconnected;
            return Err(Error::Protocol(format!(
                "negative greeting: {}",
                status.message
            )));
        }

        if let Some(timestamp) = extract_apop_timestamp(&line) {
            self.caps.set_apop_timestamp(timestamp);
        }
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Issues `CAPA` and replaces the capability set with the result.
    ///
    /// The old set is discarded entirely (mechanisms included); only the
    /// greeting's APOP timestamp is carried over. Servers that reject
    /// `CAPA` are assumed to support USER/PASS only.
    pub(crate) async fn refresh_capabilities(&mut self) -> Result<()> {
        let status = self.execute(&Command::Capa).await?;
        let timestamp = self.caps.take_apop_timestamp();

        self.caps = if status.is_ok() {
            let lines = self.read_payload_lines().await?;
            CapabilitySet::parse(lines.iter().map(Vec::as_slice))
        } else {
            CapabilitySet::fallback()
        };

        if let Some(ts) = timestamp {
            self.caps.set_apop_timestamp(ts);
        }
        Ok(())
    }

    /// Runs a command sequence, pipelining when the server allows it, and
    /// consumes each response according to the command's declared shape:
    /// a command that [`expects_multiline`](Command::expects_multiline)
    /// has its payload collected, anything else yields its status text.
    /// Results are in submission order.
    ///
    /// A single `-ERR` does not abort the flush: the remaining responses
    /// of the group are still consumed before the error is surfaced.
    pub(crate) async fn run_batch(&mut self, cmds: Vec<Command>) -> Result<Vec<Vec<u8>>> {
        let pipelining = self.caps.has(Capability::Pipelining);
        let mut results = Vec::with_capacity(cmds.len());
        let mut first_err = None;

        for group in pipeline::batch_commands(cmds, pipelining) {
            self.send(&group).await?;
            for cmd in &group {
                let status = self.read_status().await?;
                if !status.is_ok() {
                    if first_err.is_none() {
                        first_err = Some(Error::command(status.message, status.code));
                    }
                } else if cmd.expects_multiline() {
                    results.push(self.read_payload().await?);
                } else {
                    results.push(status.message.into_bytes());
                }
            }
            if first_err.is_some() {
                break;
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }

    /// Closes the transport, best effort, and marks the session dead.
    pub(crate) async fn shutdown(&mut self) {
        if let Some(framed) = &mut self.framed {
            framed.shutdown().await;
        }
        self.state = SessionState::Disconnected;
    }
}

impl<S> Engine<S>
where
    S: AsyncRead + AsyncWrite + Unpin + TlsUpgrade,
{
    pub(crate) fn is_secure(&self) -> bool {
        self.framed
            .as_ref()
            .is_some_and(|framed| framed.get_ref().is_tls())
    }

    /// Issues `STLS`, performs the TLS handshake, and re-queries
    /// capabilities over the encrypted transport.
    pub(crate) async fn upgrade_tls(&mut self, host: &str) -> Result<()> {
        self.execute_ok(&Command::Stls).await?;

        let Some(framed) = self.framed.take() else {
            return Err(Error::NotConnected);
        };
        let (stream, logger, timeout, cancel) = framed.into_parts();

        match stream.start_tls(host).await {
            Ok(tls) => {
                self.framed = Some(FramedStream::from_parts(tls, logger, timeout, cancel));
                self.refresh_capabilities().await
            }
            Err(err) => {
                self.state = SessionState::Disconnected;
                Err(err)
            }
        }
    }
}

/// Extracts the raw `<...@...>` timestamp from a greeting line, brackets
/// included and whitespace untouched.
fn extract_apop_timestamp(line: &[u8]) -> Option<Vec<u8>> {
    let start = line.iter().position(|&b| b == b'<')?;
    let end = start + line[start..].iter().position(|&b| b == b'>')?;
    let candidate = &line[start..=end];
    candidate.contains(&b'@').then(|| candidate.to_vec())
}

/// A lazy byte stream over one message payload.
///
/// Lines come out dot-unstuffed with terminators stripped; the stream ends
/// at the `.` sentinel, leaving the session positioned at the next
/// response. Dropping the stream early leaves unread payload on the wire,
/// so callers that abandon a message should [`discard`](Self::discard)
/// first.
pub struct MessageStream<'a, S> {
    payload: PayloadReader<'a, S>,
    state: &'a mut SessionState,
}

impl<S> MessageStream<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the next payload line, or `None` at the end of the message.
    ///
    /// # Errors
    ///
    /// Fatal I/O or protocol errors close the session.
    pub async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        let res = self.payload.next_line().await;
        if let Err(err) = &res {
            if err.is_fatal() || matches!(err, Error::Cancelled) {
                *self.state = SessionState::Disconnected;
            }
        }
        res
    }

    /// Reads the remaining payload into one buffer with CRLF line endings.
    ///
    /// # Errors
    ///
    /// Fatal I/O or protocol errors close the session.
    pub async fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(line) = self.next_line().await? {
            out.extend_from_slice(&line);
            out.extend_from_slice(b"\r\n");
        }
        Ok(out)
    }

    /// Consumes the rest of the payload without keeping it.
    ///
    /// # Errors
    ///
    /// Fatal I/O or protocol errors close the session.
    pub async fn discard(&mut self) -> Result<()> {
        while self.next_line().await?.is_some() {}
        Ok(())
    }
}
