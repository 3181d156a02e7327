//! Protocol traffic logging with secret redaction.
//!
//! The logger records the client/server exchange with `C:`/`S:` direction
//! tags. Redaction is declared by the command type (see
//! [`Command::redaction`](crate::command::Command::redaction)), never
//! recovered by scanning the logged text: the wire bytes are untouched,
//! only the log output is masked.

use std::io::Write;

/// Replacement token for redacted material.
pub const MASK: &str = "********";

/// How much of a client line must be masked in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redaction {
    /// Nothing on the line is secret.
    None,
    /// Every whitespace-separated argument after the verb is secret
    /// (`USER`, `PASS`, `APOP`, `AUTH` with arguments).
    Arguments,
    /// The whole line is secret (SASL continuation data).
    FullLine,
}

/// A scoped sink for protocol traffic.
///
/// Lines are written with a direction tag; when `redact` is on, secret
/// material is replaced with [`MASK`] before it reaches the sink. Sink
/// write failures are ignored so that logging can never break a session.
pub struct ProtocolLogger {
    sink: Box<dyn Write + Send>,
    redact: bool,
}

impl std::fmt::Debug for ProtocolLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolLogger")
            .field("redact", &self.redact)
            .finish_non_exhaustive()
    }
}

impl ProtocolLogger {
    /// Creates a logger writing to the given sink.
    #[must_use]
    pub fn new(sink: Box<dyn Write + Send>, redact: bool) -> Self {
        Self { sink, redact }
    }

    /// Records a client command line (terminator already stripped).
    pub fn client(&mut self, line: &[u8], redaction: Redaction) {
        let text = String::from_utf8_lossy(line);
        let rendered = if self.redact {
            redact_line(&text, redaction)
        } else {
            text.into_owned()
        };
        tracing::trace!(direction = "client", line = %rendered);
        let _ = writeln!(self.sink, "C: {rendered}");
    }

    /// Records a server response line (terminator already stripped).
    pub fn server(&mut self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        tracing::trace!(direction = "server", line = %text);
        let _ = writeln!(self.sink, "S: {text}");
    }
}

/// Applies a redaction declaration to a single client line.
fn redact_line(line: &str, redaction: Redaction) -> String {
    match redaction {
        Redaction::None => line.to_string(),
        Redaction::FullLine => MASK.to_string(),
        Redaction::Arguments => {
            let mut parts = line.split_whitespace();
            let Some(verb) = parts.next() else {
                return line.to_string();
            };
            let mut out = verb.to_string();
            for _ in parts {
                out.push(' ');
                out.push_str(MASK);
            }
            out
        }
    }
}
