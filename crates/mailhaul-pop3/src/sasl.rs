//! SASL mechanisms for the AUTH command (RFC 5034).
//!
//! The engine drives any [`SaslMechanism`] through the challenge/response
//! exchange; `Plain`, `Login`, and `XOAuth2` are built in, and external
//! mechanisms (NTLM, GSSAPI, ...) plug in through the same trait.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// A pluggable SASL mechanism.
///
/// The engine base64-encodes whatever `initial_response`/`challenge`
/// return; implementations work with raw bytes.
pub trait SaslMechanism: Send {
    /// The mechanism name as it appears in `AUTH <name>`.
    fn name(&self) -> &'static str;

    /// Returns true if the mechanism can send data on the `AUTH` line
    /// itself (SASL-IR).
    fn supports_initial_response(&self) -> bool {
        false
    }

    /// The initial response, if the mechanism has one.
    fn initial_response(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// Computes the response to a decoded server challenge.
    fn challenge(&mut self, server_data: &[u8]) -> Vec<u8>;

    /// Returns true once the mechanism has sent everything it needs to.
    ///
    /// A complete mechanism still answers further server challenges with
    /// an empty response until the server terminates the exchange.
    fn is_complete(&self) -> bool;
}

/// The PLAIN mechanism (RFC 4616): `\0user\0password` in one response.
#[derive(Debug)]
pub struct Plain {
    username: String,
    password: String,
    sent: bool,
}

impl Plain {
    /// Creates a PLAIN mechanism for the given credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            sent: false,
        }
    }

    fn response(&self) -> Vec<u8> {
        format!("\0{}\0{}", self.username, self.password).into_bytes()
    }
}

impl SaslMechanism for Plain {
    fn name(&self) -> &'static str {
        "PLAIN"
    }

    fn supports_initial_response(&self) -> bool {
        true
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        self.sent = true;
        Some(self.response())
    }

    fn challenge(&mut self, _server_data: &[u8]) -> Vec<u8> {
        if self.sent {
            return Vec::new();
        }
        self.sent = true;
        self.response()
    }

    fn is_complete(&self) -> bool {
        self.sent
    }
}

/// The LOGIN mechanism: user name and password in separate responses.
///
/// The server's prompts (`Username:`/`Password:`) are ignored; the
/// exchange order is fixed.
#[derive(Debug)]
pub struct Login {
    username: String,
    password: String,
    step: u8,
}

impl Login {
    /// Creates a LOGIN mechanism for the given credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            step: 0,
        }
    }
}

impl SaslMechanism for Login {
    fn name(&self) -> &'static str {
        "LOGIN"
    }

    fn challenge(&mut self, _server_data: &[u8]) -> Vec<u8> {
        match self.step {
            0 => {
                self.step = 1;
                self.username.clone().into_bytes()
            }
            1 => {
                self.step = 2;
                self.password.clone().into_bytes()
            }
            _ => Vec::new(),
        }
    }

    fn is_complete(&self) -> bool {
        self.step >= 2
    }
}

/// The XOAUTH2 mechanism (Google/Microsoft proprietary).
///
/// Initial response format: `user=<user>\x01auth=Bearer <token>\x01\x01`.
#[derive(Debug)]
pub struct XOAuth2 {
    username: String,
    access_token: String,
    sent: bool,
}

impl XOAuth2 {
    /// Creates an XOAUTH2 mechanism for the given account and token.
    #[must_use]
    pub fn new(username: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            access_token: access_token.into(),
            sent: false,
        }
    }

    fn response(&self) -> Vec<u8> {
        format!(
            "user={}\x01auth=Bearer {}\x01\x01",
            self.username, self.access_token
        )
        .into_bytes()
    }
}

impl SaslMechanism for XOAuth2 {
    fn name(&self) -> &'static str {
        "XOAUTH2"
    }

    fn supports_initial_response(&self) -> bool {
        true
    }

    fn initial_response(&mut self) -> Option<Vec<u8>> {
        self.sent = true;
        Some(self.response())
    }

    fn challenge(&mut self, _server_data: &[u8]) -> Vec<u8> {
        // After a failure the server sends a JSON error challenge and
        // expects an empty reply before its final -ERR.
        if self.sent {
            return Vec::new();
        }
        self.sent = true;
        self.response()
    }

    fn is_complete(&self) -> bool {
        self.sent
    }
}

/// Encodes mechanism output for the wire.
#[must_use]
pub(crate) fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes a server challenge.
pub(crate) fn decode(data: &str) -> Option<Vec<u8>> {
    STANDARD.decode(data.trim()).ok()
}
