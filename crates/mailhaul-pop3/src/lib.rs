//! # mailhaul-pop3
//!
//! A production-quality POP3 client library implementing RFC 1939 with the
//! CAPA (RFC 2449), SASL (RFC 5034), and UTF8/LANG (RFC 6856) extensions.
//!
//! ## Features
//!
//! - **State-gated operations**: every operation checks the session state
//!   (`Disconnected` → `Connected` → `Transaction`) before touching the
//!   wire and returns typed errors on violations
//! - **Full protocol support**: USER/PASS, APOP, AUTH (SASL), CAPA, STLS,
//!   STAT, LIST, UIDL, RETR, TOP, DELE, RSET, NOOP, UTF8, LANG, QUIT
//! - **Pipelining**: bulk retrievals and deletes collapse into single
//!   writes when the server advertises `PIPELINING`, with responses
//!   consumed in order
//! - **Streaming payloads**: messages can be read lazily, line by line,
//!   with dot-unstuffing applied on the fly
//! - **TLS via rustls**: implicit TLS (port 995) and STLS upgrades
//! - **Redacting protocol log**: transcripts mask credentials and SASL
//!   exchanges without altering wire traffic
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailhaul_pop3::{Config, Pop3Client, Security};
//!
//! #[tokio::main]
//! async fn main() -> mailhaul_pop3::Result<()> {
//!     let config = Config::builder("pop.example.com")
//!         .security(Security::Implicit)
//!         .build();
//!
//!     let mut client = Pop3Client::connect(config).await?;
//!     client.authenticate("user@example.com", "password").await?;
//!
//!     let count = client.message_count().await?;
//!     println!("{count} messages waiting");
//!
//!     for index in 0..count as usize {
//!         let message = client.get_message(index).await?;
//!         println!("message {index}: {} bytes", message.len());
//!     }
//!
//!     client.disconnect(true).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//!        greeting +OK          auth +OK            QUIT
//! Disconnected ────► Connected ────► Transaction ────► Disconnected
//!        ▲               │                 │
//!        │    STLS +OK   │ (re-CAPA)       │ transport error
//!        └───────────────┴─────────────────┘
//! ```
//!
//! `CAPA` is re-issued automatically after the greeting, after a
//! successful STLS upgrade, and after authentication; each time the
//! capability set is replaced, never merged.
//!
//! ## Modules
//!
//! - [`command`]: POP3 command builders
//! - [`connection`]: transports, framing, configuration
//! - [`logger`]: redacting protocol transcript logging
//! - [`pipeline`]: command batching rules
//! - [`sasl`]: SASL mechanisms for the AUTH command
//! - [`types`]: capabilities, responses, session state

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
pub mod command;
pub mod connection;
mod engine;
mod error;
pub mod events;
pub mod logger;
pub mod pipeline;
pub mod sasl;
pub mod types;

pub use client::Pop3Client;
pub use command::Command;
pub use connection::{
    Config, ConfigBuilder, DEFAULT_TIMEOUT, FramedStream, MAX_LINE_LENGTH, POP3_PORT, POP3S_PORT,
    PayloadReader, Pop3Stream, Security, TlsPolicy, TlsUpgrade, compute_defaults, connect_plain,
    connect_tls,
};
pub use engine::MessageStream;
pub use error::{Error, Result};
pub use events::Pop3EventHandler;
pub use logger::{MASK, ProtocolLogger, Redaction};
pub use sasl::{Login, Plain, SaslMechanism, XOAuth2};
pub use types::{
    Capability, CapabilitySet, EXPIRE_NEVER, EXPIRE_UNSET, ResponseCode, SessionState, Status,
    StatusLine,
};

/// POP3 protocol version supported.
pub const POP3_VERSION: &str = "POP3 (RFC 1939)";
