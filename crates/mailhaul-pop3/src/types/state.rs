//! Session state types.
//!
//! This module defines the states a POP3 session can be in, following
//! RFC 1939 section 3.

/// POP3 session state.
///
/// A session moves through four states:
/// - `Disconnected`: no transport, or the transport failed
/// - `Connected`: greeting received, not yet authenticated (AUTHORIZATION)
/// - `Transaction`: authenticated, messages can be read and deleted
/// - `Closing`: QUIT has been sent (UPDATE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection is established.
    ///
    /// Entered from any state on transport failure or explicit disconnect.
    #[default]
    Disconnected,

    /// Greeting received; only authentication commands (and CAPA, STLS,
    /// UTF8, QUIT) are valid.
    Connected,

    /// Authenticated; the maildrop is locked and the full command set is
    /// valid.
    Transaction,

    /// QUIT has been issued; the server is committing deletions.
    Closing,
}

impl SessionState {
    /// Returns `true` if a transport is established.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Returns `true` if the session is authenticated.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Transaction | Self::Closing)
    }
}
