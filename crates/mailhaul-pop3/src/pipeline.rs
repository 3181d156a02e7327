//! Command pipelining (RFC 2449).
//!
//! When the server advertises `PIPELINING`, independent commands can be
//! concatenated into a single network write and their responses consumed
//! in FIFO order, saving one round trip per command.
//!
//! ## When to Pipeline
//!
//! Only commands whose execution does not branch on an earlier command's
//! result may be grouped: `RETR`, `TOP`, `DELE`, `LIST n`, `UIDL n`.
//!
//! ## When NOT to Pipeline
//!
//! `USER`/`PASS` and `AUTH` continuations are never grouped with unrelated
//! commands, and neither is anything whose response shape depends on
//! negotiation (`CAPA`, `STLS`, `UTF8`).

use crate::command::Command;

/// Upper bound on commands per pipelined flush, capping the memory held
/// for queued responses.
pub const MAX_GROUP_LEN: usize = 100;

impl Command {
    /// Returns true if this command may be grouped with other independent
    /// commands in a single write.
    #[must_use]
    pub const fn is_pipelineable(&self) -> bool {
        matches!(
            self,
            Self::Retr { .. }
                | Self::Top { .. }
                | Self::Dele { .. }
                | Self::List { message: Some(_) }
                | Self::Uidl { message: Some(_) }
        )
    }
}

/// Splits commands into groups that are safe to flush as one write.
///
/// With `pipelining` off every command is its own group. With it on,
/// pipelineable commands are grouped up to [`MAX_GROUP_LEN`]; a
/// non-pipelineable command always forms a singleton group.
#[must_use]
pub fn batch_commands(commands: Vec<Command>, pipelining: bool) -> Vec<Vec<Command>> {
    if !pipelining {
        return commands.into_iter().map(|cmd| vec![cmd]).collect();
    }

    let mut batches = Vec::new();
    let mut current = Vec::new();

    for cmd in commands {
        if cmd.is_pipelineable() {
            if current.len() == MAX_GROUP_LEN {
                batches.push(std::mem::take(&mut current));
            }
            current.push(cmd);
        } else {
            if !current.is_empty() {
                batches.push(std::mem::take(&mut current));
            }
            batches.push(vec![cmd]);
        }
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}
