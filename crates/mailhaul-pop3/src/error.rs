//! Error types for POP3 operations.

use std::io;
use std::time::Duration;

use crate::types::ResponseCode;

/// Result type alias for POP3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// POP3 error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// An I/O primitive exceeded the session timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Server sent an unparsable or out-of-sequence response.
    ///
    /// The session is closed when this is raised from the wire; raised from
    /// response-token parsing (e.g. a garbled STAT line) the session stays
    /// open.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server returned `-ERR` to a specific command. The session remains
    /// usable.
    #[error("Server returned -ERR: {message}")]
    Command {
        /// Error text sent by the server.
        message: String,
        /// Bracketed response code, when the server sent one.
        code: Option<ResponseCode>,
    },

    /// Credential rejection or SASL failure. The session remains in the
    /// connected (pre-authentication) state and may retry.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Feature absent from the negotiated capabilities.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Operation requires an established session.
    #[error("Client is not connected")]
    NotConnected,

    /// Operation requires an authenticated session.
    #[error("Client is not authenticated")]
    NotAuthenticated,

    /// Connection attempted on an already-connected client.
    #[error("Client is already connected")]
    AlreadyConnected,

    /// Authentication attempted on an already-authenticated session.
    #[error("Client is already authenticated")]
    AlreadyAuthenticated,

    /// Operation aborted via its cancellation token.
    #[error("Operation was cancelled")]
    Cancelled,
}

impl Error {
    /// Creates a command error from server text and an optional response code.
    #[must_use]
    pub fn command(message: impl Into<String>, code: Option<ResponseCode>) -> Self {
        Self::Command {
            message: message.into(),
            code,
        }
    }

    /// Returns true if this error closes the session.
    ///
    /// Transport failures, timeouts, and wire-level protocol violations are
    /// fatal; command rejections, authentication failures, and client-side
    /// state violations leave the session usable.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Tls(_) | Self::InvalidDnsName(_) | Self::Timeout(_) | Self::Protocol(_)
        )
    }
}
