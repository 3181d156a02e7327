//! Framed I/O for the POP3 protocol.
//!
//! POP3 responses are either a single CRLF-terminated line or a status
//! line followed by a dot-stuffed multi-line payload ending with a line
//! containing only `.`. This module provides buffered line reading that
//! tolerates bare-LF servers, a lazy payload reader that unstuffs dots,
//! and a write path that feeds the protocol logger.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::logger::{ProtocolLogger, Redaction};
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum response line length to prevent memory exhaustion.
pub const MAX_LINE_LENGTH: usize = 65536;

/// Framed connection for the POP3 protocol.
///
/// Every read and write observes the session cancellation token and the
/// per-primitive I/O timeout.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    logger: Option<ProtocolLogger>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            logger: None,
            timeout,
            cancel,
        }
    }

    /// Attaches a protocol logger observing both directions.
    pub fn set_logger(&mut self, logger: ProtocolLogger) {
        self.logger = Some(logger);
    }

    /// Reads a single response line, without its terminator.
    ///
    /// Lines end at CRLF; a bare LF is tolerated on inbound lines since
    /// some servers are lax about terminators.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] at EOF, [`Error::Protocol`] past [`MAX_LINE_LENGTH`],
    /// [`Error::Timeout`] / [`Error::Cancelled`] from the session guards.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let cancel = self.cancel.clone();
        let line = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            res = tokio::time::timeout(self.timeout, read_line_inner(&mut self.reader)) => {
                match res {
                    Ok(line) => line?,
                    Err(_) => return Err(Error::Timeout(self.timeout)),
                }
            }
        };
        if let Some(logger) = &mut self.logger {
            logger.server(&line);
        }
        Ok(line)
    }

    /// Writes command bytes (already CRLF terminated) as one flush.
    ///
    /// # Errors
    ///
    /// [`Error::Io`], [`Error::Timeout`], or [`Error::Cancelled`].
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);

        let cancel = self.cancel.clone();
        let stream = self.reader.get_mut();
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            res = tokio::time::timeout(self.timeout, async {
                stream.write_all(&self.write_buffer).await?;
                stream.flush().await?;
                Ok::<(), Error>(())
            }) => {
                match res {
                    Ok(inner) => inner,
                    Err(_) => Err(Error::Timeout(self.timeout)),
                }
            }
        }
    }

    /// Records a client line in the protocol log.
    pub fn log_client(&mut self, line: &[u8], redaction: Redaction) {
        if let Some(logger) = &mut self.logger {
            logger.client(line, redaction);
        }
    }

    /// Opens a lazy reader over a multi-line payload.
    pub fn payload(&mut self) -> PayloadReader<'_, S> {
        PayloadReader {
            framed: self,
            done: false,
        }
    }

    /// Shuts down the underlying transport, best effort.
    pub async fn shutdown(&mut self) {
        let _ = self.reader.get_mut().shutdown().await;
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Splits the framed stream for a TLS upgrade.
    ///
    /// Note: any buffered inbound data is dropped; STLS guarantees the
    /// server sends nothing between its `+OK` and the handshake.
    pub fn into_parts(self) -> (S, Option<ProtocolLogger>, Duration, CancellationToken) {
        (
            self.reader.into_inner(),
            self.logger,
            self.timeout,
            self.cancel,
        )
    }

    /// Reassembles a framed stream after a TLS upgrade.
    pub fn from_parts(
        stream: S,
        logger: Option<ProtocolLogger>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            logger,
            timeout,
            cancel,
        }
    }
}

/// Reads one line (terminator stripped) from the buffered reader.
async fn read_line_inner<S>(reader: &mut BufReader<S>) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut line = Vec::new();

    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            )));
        }

        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&buf[..pos]);
            reader.consume(pos + 1);
            break;
        }

        let len = buf.len();
        line.extend_from_slice(buf);
        reader.consume(len);

        if line.len() > MAX_LINE_LENGTH {
            return Err(Error::Protocol("response line too long".to_string()));
        }
    }

    if line.len() > MAX_LINE_LENGTH {
        return Err(Error::Protocol("response line too long".to_string()));
    }

    if line.last() == Some(&b'\r') {
        line.pop();
    }

    Ok(line)
}

/// A lazy view over one dot-stuffed multi-line payload.
///
/// Yields lines with the terminator stripped and any leading dot
/// unstuffed; stops at the `.` sentinel line, leaving the framed reader
/// positioned immediately after it.
pub struct PayloadReader<'a, S> {
    framed: &'a mut FramedStream<S>,
    done: bool,
}

impl<S> PayloadReader<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the next payload line, or `None` at the sentinel.
    ///
    /// # Errors
    ///
    /// Propagates [`FramedStream::read_line`] errors.
    pub async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }

        let mut line = self.framed.read_line().await?;
        if line.as_slice() == b"." {
            self.done = true;
            return Ok(None);
        }

        if line.first() == Some(&b'.') {
            line.remove(0);
        }
        Ok(Some(line))
    }

    /// Reads the remaining payload into one buffer, CRLF line endings.
    ///
    /// # Errors
    ///
    /// Propagates [`FramedStream::read_line`] errors.
    pub async fn collect(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(line) = self.next_line().await? {
            out.extend_from_slice(&line);
            out.extend_from_slice(b"\r\n");
        }
        Ok(out)
    }

    /// Reads and discards the remaining payload.
    ///
    /// # Errors
    ///
    /// Propagates [`FramedStream::read_line`] errors.
    pub async fn discard(&mut self) -> Result<()> {
        while self.next_line().await?.is_some() {}
        Ok(())
    }

    /// Returns true once the sentinel has been consumed.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }
}
