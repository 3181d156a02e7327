//! Server capabilities (RFC 2449).

use std::collections::HashSet;

/// A capability advertised via `CAPA` (or implied by the greeting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// USER/PASS authentication is permitted.
    User,
    /// APOP digest authentication (greeting carried a timestamp).
    Apop,
    /// SASL authentication via the AUTH command (RFC 5034).
    Sasl,
    /// STLS - TLS upgrade on the plaintext port (RFC 2595).
    Stls,
    /// TOP command support.
    Top,
    /// UIDL command support.
    Uidl,
    /// PIPELINING - batched commands (RFC 2449).
    Pipelining,
    /// RESP-CODES - bracketed response codes (RFC 2449).
    ResponseCodes,
    /// EXPIRE - message retention policy advertised.
    Expire,
    /// LOGIN-DELAY - minimum delay between logins advertised.
    LoginDelay,
    /// LANG - response language negotiation (RFC 6856).
    Lang,
    /// UTF8 mode (RFC 6856).
    Utf8,
    /// UTF8 USER argument: UTF-8 user names are accepted pre-UTF8.
    Utf8User,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "USER"),
            Self::Apop => write!(f, "APOP"),
            Self::Sasl => write!(f, "SASL"),
            Self::Stls => write!(f, "STLS"),
            Self::Top => write!(f, "TOP"),
            Self::Uidl => write!(f, "UIDL"),
            Self::Pipelining => write!(f, "PIPELINING"),
            Self::ResponseCodes => write!(f, "RESP-CODES"),
            Self::Expire => write!(f, "EXPIRE"),
            Self::LoginDelay => write!(f, "LOGIN-DELAY"),
            Self::Lang => write!(f, "LANG"),
            Self::Utf8 => write!(f, "UTF8"),
            Self::Utf8User => write!(f, "UTF8 USER"),
        }
    }
}

/// Expire policy value meaning "messages are never expired".
pub const EXPIRE_NEVER: i64 = -1;

/// Expire policy value meaning "the server did not advertise EXPIRE".
pub const EXPIRE_UNSET: i64 = 0;

/// The parsed result of a `CAPA` exchange.
///
/// The set is rebuilt from scratch after STLS and after authentication;
/// old and new sets are never unioned. The APOP timestamp originates in
/// the greeting and is carried across rebuilds by the engine.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    flags: HashSet<Capability>,
    auth_mechanisms: Vec<String>,
    expire_policy: i64,
    login_delay: u32,
    implementation: Option<String>,
    apop_timestamp: Option<Vec<u8>>,
    extensions: Vec<String>,
}

impl CapabilitySet {
    /// Creates an empty capability set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The assumed capabilities of a server that rejects `CAPA` outright:
    /// USER/PASS only. UIDL support is probed separately at first use.
    #[must_use]
    pub fn fallback() -> Self {
        let mut set = Self::new();
        set.flags.insert(Capability::User);
        set
    }

    /// Parses the payload lines of a `CAPA` response into a fresh set.
    #[must_use]
    pub fn parse<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut set = Self::new();
        for line in lines {
            set.parse_line(&String::from_utf8_lossy(line));
        }
        set
    }

    /// Parses a single `CAPA` response line into the set.
    pub fn parse_line(&mut self, line: &str) {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            return;
        };

        match keyword.to_uppercase().as_str() {
            "USER" => {
                self.flags.insert(Capability::User);
            }
            "APOP" => {
                self.flags.insert(Capability::Apop);
            }
            "SASL" => {
                self.flags.insert(Capability::Sasl);
                for mech in parts {
                    self.auth_mechanisms.push(mech.to_uppercase());
                }
            }
            "STLS" => {
                self.flags.insert(Capability::Stls);
            }
            "TOP" => {
                self.flags.insert(Capability::Top);
            }
            "UIDL" => {
                self.flags.insert(Capability::Uidl);
            }
            "PIPELINING" => {
                self.flags.insert(Capability::Pipelining);
            }
            "RESP-CODES" => {
                self.flags.insert(Capability::ResponseCodes);
            }
            "EXPIRE" => {
                self.flags.insert(Capability::Expire);
                match parts.next() {
                    Some(arg) if arg.eq_ignore_ascii_case("NEVER") => {
                        self.expire_policy = EXPIRE_NEVER;
                    }
                    Some(arg) => {
                        if let Ok(days) = arg.parse::<i64>() {
                            self.expire_policy = days;
                        }
                    }
                    None => {}
                }
            }
            "LOGIN-DELAY" => {
                self.flags.insert(Capability::LoginDelay);
                if let Some(seconds) = parts.next().and_then(|s| s.parse().ok()) {
                    self.login_delay = seconds;
                }
            }
            "IMPLEMENTATION" => {
                let rest = line[keyword.len()..].trim_start();
                if !rest.is_empty() {
                    self.implementation = Some(rest.to_string());
                }
            }
            "LANG" => {
                self.flags.insert(Capability::Lang);
            }
            "UTF8" => {
                self.flags.insert(Capability::Utf8);
                if parts.next().is_some_and(|a| a.eq_ignore_ascii_case("USER")) {
                    self.flags.insert(Capability::Utf8User);
                }
            }
            _ => {
                self.extensions.push(line.to_string());
            }
        }
    }

    /// Checks whether a capability is present.
    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        self.flags.contains(&capability)
    }

    /// Adds a capability (used when a probe confirms support).
    pub fn insert(&mut self, capability: Capability) {
        self.flags.insert(capability);
    }

    /// SASL mechanism names advertised by the server, in advertisement order.
    #[must_use]
    pub fn auth_mechanisms(&self) -> &[String] {
        &self.auth_mechanisms
    }

    /// Returns true if the server advertised the given SASL mechanism.
    #[must_use]
    pub fn has_auth_mechanism(&self, name: &str) -> bool {
        self.auth_mechanisms
            .iter()
            .any(|m| m.eq_ignore_ascii_case(name))
    }

    /// Message retention in days; [`EXPIRE_NEVER`] for `EXPIRE NEVER`,
    /// [`EXPIRE_UNSET`] when the server did not advertise EXPIRE.
    #[must_use]
    pub const fn expire_policy(&self) -> i64 {
        self.expire_policy
    }

    /// Minimum seconds between logins, 0 when not advertised.
    #[must_use]
    pub const fn login_delay(&self) -> u32 {
        self.login_delay
    }

    /// Server implementation string, if advertised.
    #[must_use]
    pub fn implementation(&self) -> Option<&str> {
        self.implementation.as_deref()
    }

    /// The raw `<...@...>` timestamp from the greeting, if any.
    #[must_use]
    pub fn apop_timestamp(&self) -> Option<&[u8]> {
        self.apop_timestamp.as_deref()
    }

    /// Records the greeting timestamp, byte-for-byte as received, and marks
    /// APOP as available.
    pub fn set_apop_timestamp(&mut self, timestamp: Vec<u8>) {
        self.apop_timestamp = Some(timestamp);
        self.flags.insert(Capability::Apop);
    }

    /// Removes the greeting timestamp so it can be carried into a rebuilt set.
    pub fn take_apop_timestamp(&mut self) -> Option<Vec<u8>> {
        self.apop_timestamp.take()
    }

    /// Unrecognized `CAPA` lines, verbatim.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}
