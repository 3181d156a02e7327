//! POP3 command builder.

use crate::logger::Redaction;

/// POP3 command.
///
/// Message numbers here are the wire's 1-based sequence numbers; the
/// client facade translates from its 0-based indexes before building
/// commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// USER - name the mailbox owner.
    User {
        /// Mailbox user name.
        name: String,
    },
    /// PASS - plaintext password.
    Pass {
        /// Password.
        password: String,
    },
    /// APOP - digest authentication from the greeting timestamp.
    Apop {
        /// Mailbox user name.
        name: String,
        /// Lower-case hex MD5 digest of timestamp + secret.
        digest: String,
    },
    /// AUTH - begin a SASL exchange (RFC 5034).
    Auth {
        /// Mechanism name.
        mechanism: String,
        /// Base64 initial response, if the mechanism supports one.
        initial_response: Option<String>,
    },
    /// A client continuation line inside a SASL exchange.
    AuthData {
        /// Base64 response data (may be empty).
        line: String,
    },
    /// CAPA - query capabilities.
    Capa,
    /// STLS - upgrade to TLS.
    Stls,
    /// UTF8 - enable UTF-8 mode (RFC 6856).
    Utf8,
    /// STAT - message count and maildrop size.
    Stat,
    /// LIST - message size(s).
    List {
        /// Specific message, or `None` for the whole maildrop.
        message: Option<u32>,
    },
    /// UIDL - unique id(s).
    Uidl {
        /// Specific message, or `None` for the whole maildrop.
        message: Option<u32>,
    },
    /// RETR - retrieve a full message.
    Retr {
        /// Message number.
        message: u32,
    },
    /// TOP - retrieve headers plus the first n body lines.
    Top {
        /// Message number.
        message: u32,
        /// Number of body lines.
        lines: u32,
    },
    /// DELE - mark a message as deleted.
    Dele {
        /// Message number.
        message: u32,
    },
    /// RSET - unmark all deleted messages.
    Rset,
    /// NOOP - keep-alive.
    Noop,
    /// LANG - list or select response languages (RFC 6856).
    Lang {
        /// Language tag, or `None` to list available languages.
        tag: Option<String>,
    },
    /// QUIT - commit deletions and close.
    Quit,
}

impl Command {
    /// Serializes the command to wire bytes, CRLF terminated.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::User { name } => {
                buf.extend_from_slice(b"USER ");
                buf.extend_from_slice(name.as_bytes());
            }
            Self::Pass { password } => {
                buf.extend_from_slice(b"PASS ");
                buf.extend_from_slice(password.as_bytes());
            }
            Self::Apop { name, digest } => {
                buf.extend_from_slice(b"APOP ");
                buf.extend_from_slice(name.as_bytes());
                buf.push(b' ');
                buf.extend_from_slice(digest.as_bytes());
            }
            Self::Auth {
                mechanism,
                initial_response,
            } => {
                buf.extend_from_slice(b"AUTH ");
                buf.extend_from_slice(mechanism.as_bytes());
                if let Some(resp) = initial_response {
                    buf.push(b' ');
                    buf.extend_from_slice(resp.as_bytes());
                }
            }
            Self::AuthData { line } => {
                buf.extend_from_slice(line.as_bytes());
            }
            Self::Capa => {
                buf.extend_from_slice(b"CAPA");
            }
            Self::Stls => {
                buf.extend_from_slice(b"STLS");
            }
            Self::Utf8 => {
                buf.extend_from_slice(b"UTF8");
            }
            Self::Stat => {
                buf.extend_from_slice(b"STAT");
            }
            Self::List { message } => {
                buf.extend_from_slice(b"LIST");
                if let Some(n) = message {
                    buf.extend_from_slice(format!(" {n}").as_bytes());
                }
            }
            Self::Uidl { message } => {
                buf.extend_from_slice(b"UIDL");
                if let Some(n) = message {
                    buf.extend_from_slice(format!(" {n}").as_bytes());
                }
            }
            Self::Retr { message } => {
                buf.extend_from_slice(format!("RETR {message}").as_bytes());
            }
            Self::Top { message, lines } => {
                buf.extend_from_slice(format!("TOP {message} {lines}").as_bytes());
            }
            Self::Dele { message } => {
                buf.extend_from_slice(format!("DELE {message}").as_bytes());
            }
            Self::Rset => {
                buf.extend_from_slice(b"RSET");
            }
            Self::Noop => {
                buf.extend_from_slice(b"NOOP");
            }
            Self::Lang { tag } => {
                buf.extend_from_slice(b"LANG");
                if let Some(tag) = tag {
                    buf.push(b' ');
                    buf.extend_from_slice(tag.as_bytes());
                }
            }
            Self::Quit => {
                buf.extend_from_slice(b"QUIT");
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Returns true if a `+OK` to this command is followed by a dot-stuffed
    /// multi-line payload.
    #[must_use]
    pub const fn expects_multiline(&self) -> bool {
        matches!(
            self,
            Self::Capa
                | Self::List { message: None }
                | Self::Uidl { message: None }
                | Self::Retr { .. }
                | Self::Top { .. }
                | Self::Lang { tag: None }
        )
    }

    /// Declares how this command must appear in the protocol log.
    #[must_use]
    pub const fn redaction(&self) -> Redaction {
        match self {
            Self::User { .. } | Self::Pass { .. } | Self::Apop { .. } | Self::Auth { .. } => {
                Redaction::Arguments
            }
            Self::AuthData { .. } => Redaction::FullLine,
            _ => Redaction::None,
        }
    }
}
