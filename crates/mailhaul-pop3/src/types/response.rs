//! Status-line parsing and response codes.

use crate::error::{Error, Result};

/// Response status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `+OK` - command completed successfully.
    Ok,
    /// `-ERR` - command failed.
    Err,
}

impl Status {
    /// Returns true if this is a successful status.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Bracketed response code following `+OK`/`-ERR` (RFC 2449, RFC 3206).
///
/// Servers only send these once the `RESP-CODES` capability is negotiated,
/// but the parser accepts them unconditionally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// `[IN-USE]` - the maildrop is locked by another session.
    InUse,
    /// `[LOGIN-DELAY]` - logins are rate limited.
    LoginDelay,
    /// `[SYS/TEMP]` - temporary server-side failure.
    SysTemp,
    /// `[SYS/PERM]` - permanent server-side failure.
    SysPerm,
    /// `[AUTH]` - credentials rejected.
    Auth,
    /// `[UTF8]` - response relates to UTF8 mode (RFC 6856).
    Utf8,
    /// Unrecognized code, kept verbatim.
    Other(String),
}

impl ResponseCode {
    /// Parses the content of a bracketed response code.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "IN-USE" => Self::InUse,
            "LOGIN-DELAY" => Self::LoginDelay,
            "SYS/TEMP" => Self::SysTemp,
            "SYS/PERM" => Self::SysPerm,
            "AUTH" => Self::Auth,
            "UTF8" => Self::Utf8,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InUse => write!(f, "IN-USE"),
            Self::LoginDelay => write!(f, "LOGIN-DELAY"),
            Self::SysTemp => write!(f, "SYS/TEMP"),
            Self::SysPerm => write!(f, "SYS/PERM"),
            Self::Auth => write!(f, "AUTH"),
            Self::Utf8 => write!(f, "UTF8"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// A parsed single-line response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// `+OK` or `-ERR`.
    pub status: Status,
    /// Bracketed response code, if the server sent one.
    pub code: Option<ResponseCode>,
    /// Human-readable text after the status (and code).
    pub message: String,
}

impl StatusLine {
    /// Parses a response line (terminator already stripped).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the line starts with neither `+OK`
    /// nor `-ERR`.
    pub fn parse(line: &[u8]) -> Result<Self> {
        let (status, rest) = if let Some(rest) = strip_token(line, b"+OK") {
            (Status::Ok, rest)
        } else if let Some(rest) = strip_token(line, b"-ERR") {
            (Status::Err, rest)
        } else {
            return Err(Error::Protocol(format!(
                "unexpected response: {}",
                String::from_utf8_lossy(line)
            )));
        };

        let rest = String::from_utf8_lossy(rest).into_owned();
        let rest = rest.trim_start();

        // Optional bracketed response code right after the status token.
        if let Some(inner) = rest.strip_prefix('[') {
            if let Some(end) = inner.find(']') {
                let code = ResponseCode::parse(&inner[..end]);
                let message = inner[end + 1..].trim_start().to_string();
                return Ok(Self {
                    status,
                    code: Some(code),
                    message,
                });
            }
        }

        Ok(Self {
            status,
            code: None,
            message: rest.to_string(),
        })
    }

    /// Returns true if the status is `+OK`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

/// Strips a leading status token followed by a space or end of line.
fn strip_token<'a>(line: &'a [u8], token: &[u8]) -> Option<&'a [u8]> {
    let (head, rest) = line.split_at_checked(token.len())?;
    if !head.eq_ignore_ascii_case(token) {
        return None;
    }
    match rest.first() {
        None => Some(rest),
        Some(&b' ') => Some(&rest[1..]),
        Some(_) => None,
    }
}
