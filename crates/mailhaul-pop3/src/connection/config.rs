//! Connection configuration types.

use std::time::Duration;

/// Default POP3 port (plaintext / STLS).
pub const POP3_PORT: u16 = 110;

/// Default POP3-over-TLS port (implicit TLS).
pub const POP3S_PORT: u16 = 995;

/// Default per-primitive I/O timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 110). **Not recommended for production.**
    None,
    /// TLS from the start (port 995).
    Implicit,
    /// Start with plaintext, require an STLS upgrade (port 110).
    StartTls,
    /// Start with plaintext, upgrade with STLS if the server offers it.
    StartTlsWhenAvailable,
    /// Port 995 means implicit TLS, anything else means opportunistic
    /// STLS. **Recommended.**
    #[default]
    Auto,
}

/// What to do about STLS once connected on a plaintext port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Never upgrade (already TLS, or plaintext requested).
    Never,
    /// Upgrade or fail: missing STLS capability is an error.
    Required,
    /// Upgrade when the server advertises STLS, continue otherwise.
    WhenAvailable,
}

/// Resolves the effective URI, port, and STLS policy for a connection.
///
/// A `port` of 0 selects the default for the security mode.
#[must_use]
pub fn compute_defaults(host: &str, port: u16, security: Security) -> (String, u16, TlsPolicy) {
    let (scheme, port, policy) = match security {
        Security::None => (
            "pop",
            if port == 0 { POP3_PORT } else { port },
            TlsPolicy::Never,
        ),
        Security::Implicit => (
            "pops",
            if port == 0 { POP3S_PORT } else { port },
            TlsPolicy::Never,
        ),
        Security::StartTls => (
            "pop",
            if port == 0 { POP3_PORT } else { port },
            TlsPolicy::Required,
        ),
        Security::StartTlsWhenAvailable => (
            "pop",
            if port == 0 { POP3_PORT } else { port },
            TlsPolicy::WhenAvailable,
        ),
        Security::Auto if port == POP3S_PORT => ("pops", POP3S_PORT, TlsPolicy::Never),
        Security::Auto => (
            "pop",
            if port == 0 { POP3_PORT } else { port },
            TlsPolicy::WhenAvailable,
        ),
    };

    (format!("{scheme}://{host}:{port}"), port, policy)
}

/// POP3 connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port; 0 selects the default for the security mode.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Per-primitive read/write timeout.
    pub timeout: Duration,
}

impl Config {
    /// Creates a new configuration with `Auto` security and default ports.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 0,
            security: Security::Auto,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: u16,
    security: Security,
    timeout: Duration,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 0,
            security: Security::Auto,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port,
            security: self.security,
            timeout: self.timeout,
        }
    }
}
