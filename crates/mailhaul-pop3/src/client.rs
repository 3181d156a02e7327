//! High-level POP3 client.
//!
//! [`Pop3Client`] layers argument translation, state gating, mechanism
//! selection, and event emission over the protocol engine. Message
//! indexes at this boundary are 0-based; the wire's 1-based sequence
//! numbers never escape the crate.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::command::Command;
use crate::connection::{
    Config, Pop3Stream, Security, TlsPolicy, TlsUpgrade, compute_defaults, connect_plain,
    connect_tls,
};
use crate::engine::{Engine, MessageStream};
use crate::events::Pop3EventHandler;
use crate::logger::ProtocolLogger;
use crate::sasl::{self, Login, Plain, SaslMechanism};
use crate::types::{Capability, CapabilitySet, SessionState, StatusLine};
use crate::{Error, Result};

/// An authenticated-session mechanism choice, resolved from the
/// capability set in preference order.
enum AuthChoice {
    Apop,
    SaslPlain,
    SaslLogin,
    UserPass,
}

/// POP3 client.
///
/// Generic over the transport so sessions can run against TCP, TLS, or
/// test streams; [`Pop3Client::connect`] produces the real-network
/// variant.
pub struct Pop3Client<S = Pop3Stream> {
    engine: Engine<S>,
    host: String,
    port: u16,
    security: Security,
    handler: Option<Box<dyn Pop3EventHandler>>,
    /// True between the Connected event and its matching Disconnected.
    connected_event_live: bool,
    count: u32,
    size: u64,
    uidl_probed: bool,
    utf8_enabled: bool,
}

impl Pop3Client<Pop3Stream> {
    /// Connects to a POP3 server and performs the initial handshake:
    /// greeting, `CAPA`, and an STLS upgrade when the security mode calls
    /// for one (followed by a second `CAPA`).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, greeting, or required TLS
    /// upgrade fails.
    pub async fn connect(config: Config) -> Result<Self> {
        Self::connect_with(config, None).await
    }

    /// Like [`connect`](Self::connect), with an event handler installed
    /// before the Connected event fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, greeting, or required TLS
    /// upgrade fails.
    pub async fn connect_with(
        config: Config,
        handler: Option<Box<dyn Pop3EventHandler>>,
    ) -> Result<Self> {
        let (uri, port, policy) = compute_defaults(&config.host, config.port, config.security);
        tracing::debug!(%uri, "connecting");

        let stream = if uri.starts_with("pops://") {
            connect_tls(&config.host, port).await?
        } else {
            connect_plain(&config.host, port).await?
        };

        Self::handshake(stream, config, port, policy, handler).await
    }
}

impl<S> Pop3Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin + TlsUpgrade,
{
    /// Builds a client over an already-connected transport and performs
    /// the initial handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting or a required TLS upgrade fails.
    pub async fn from_stream(stream: S, config: Config) -> Result<Self> {
        let (_, port, policy) = compute_defaults(&config.host, config.port, config.security);
        Self::handshake(stream, config, port, policy, None).await
    }

    /// Like [`from_stream`](Self::from_stream), with an event handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting or a required TLS upgrade fails.
    pub async fn from_stream_with(
        stream: S,
        config: Config,
        handler: Option<Box<dyn Pop3EventHandler>>,
    ) -> Result<Self> {
        let (_, port, policy) = compute_defaults(&config.host, config.port, config.security);
        Self::handshake(stream, config, port, policy, handler).await
    }

    async fn handshake(
        stream: S,
        config: Config,
        port: u16,
        policy: TlsPolicy,
        handler: Option<Box<dyn Pop3EventHandler>>,
    ) -> Result<Self> {
        let cancel = CancellationToken::new();
        let mut client = Self {
            engine: Engine::new(stream, config.timeout, cancel),
            host: config.host,
            port,
            security: config.security,
            handler,
            connected_event_live: false,
            count: 0,
            size: 0,
            uidl_probed: false,
            utf8_enabled: false,
        };

        client.engine.read_greeting().await?;
        client.engine.refresh_capabilities().await?;

        match policy {
            TlsPolicy::Never => {}
            TlsPolicy::Required => {
                if !client.engine.is_secure() {
                    if !client.engine.capabilities().has(Capability::Stls) {
                        client.engine.shutdown().await;
                        return Err(Error::NotSupported("STLS".to_string()));
                    }
                    client.engine.upgrade_tls(&client.host).await?;
                }
            }
            TlsPolicy::WhenAvailable => {
                if !client.engine.is_secure()
                    && client.engine.capabilities().has(Capability::Stls)
                {
                    client.engine.upgrade_tls(&client.host).await?;
                }
            }
        }

        client.connected_event_live = true;
        if let Some(handler) = &mut client.handler {
            handler.on_connected(&client.host, client.port, client.security);
        }
        Ok(client)
    }

    // === Session accessors ===

    /// Current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.engine.state()
    }

    /// Returns true if a transport is established.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.engine.state().is_connected()
    }

    /// Returns true if the session is authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.engine.state().is_authenticated()
    }

    /// Returns true if the transport is TLS-encrypted.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.engine.is_secure()
    }

    /// The negotiated capability set.
    #[must_use]
    pub const fn capabilities(&self) -> &CapabilitySet {
        self.engine.capabilities()
    }

    /// Message count from the last `STAT`.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Maildrop size in octets from the last `STAT`.
    #[must_use]
    pub const fn maildrop_size(&self) -> u64 {
        self.size
    }

    /// The session cancellation token; cancelling it aborts in-flight and
    /// future operations.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.engine.cancellation_token()
    }

    /// Installs an event handler.
    pub fn set_event_handler(&mut self, handler: Box<dyn Pop3EventHandler>) {
        self.handler = Some(handler);
    }

    /// Attaches a protocol transcript logger.
    ///
    /// With `redact` on, arguments of secret-bearing commands and SASL
    /// continuation lines are masked before reaching the sink; wire
    /// traffic is never altered.
    pub fn set_protocol_logger(&mut self, sink: Box<dyn std::io::Write + Send>, redact: bool) {
        self.engine.set_logger(ProtocolLogger::new(sink, redact));
    }

    // === Preconditions and event plumbing ===

    fn ensure_connected(&self) -> Result<()> {
        if self.engine.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if self.engine.state().is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn ensure_transaction(&self) -> Result<()> {
        self.ensure_connected()?;
        match self.engine.state() {
            SessionState::Transaction => Ok(()),
            _ => Err(Error::NotAuthenticated),
        }
    }

    fn ensure_auth_ready(&self) -> Result<()> {
        if self.engine.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match self.engine.state() {
            SessionState::Disconnected => Err(Error::NotConnected),
            SessionState::Connected => Ok(()),
            SessionState::Transaction | SessionState::Closing => Err(Error::AlreadyAuthenticated),
        }
    }

    /// Emits the Disconnected event when the engine poisoned the session.
    fn note_failure(&mut self) {
        if !self.engine.state().is_connected() && self.connected_event_live {
            self.connected_event_live = false;
            if let Some(handler) = &mut self.handler {
                handler.on_disconnected(&self.host, self.port, self.security, false);
            }
        }
    }

    fn finish<T>(&mut self, res: Result<T>) -> Result<T> {
        if res.is_err() {
            self.note_failure();
        }
        res
    }

    // === Authentication ===

    /// Authenticates with a user name and password.
    ///
    /// The mechanism is selected from the negotiated capabilities in
    /// preference order: APOP (when the greeting carried a timestamp),
    /// then an advertised SASL mechanism this crate implements, then
    /// USER/PASS. On success `CAPA` is re-issued, since servers commonly
    /// reveal more capabilities post-login.
    ///
    /// # Errors
    ///
    /// [`Error::Auth`] on rejected credentials (the session stays
    /// connected for another attempt); [`Error::AlreadyAuthenticated`]
    /// when called twice.
    pub async fn authenticate(&mut self, user: &str, password: &str) -> Result<()> {
        self.ensure_auth_ready()?;
        let res = self.authenticate_inner(user, password).await;
        self.finish(res)
    }

    async fn authenticate_inner(&mut self, user: &str, password: &str) -> Result<()> {
        let choice = {
            let caps = self.engine.capabilities();
            if caps.has(Capability::Apop) && caps.apop_timestamp().is_some() {
                Some(AuthChoice::Apop)
            } else if caps.has(Capability::Sasl) && caps.has_auth_mechanism("PLAIN") {
                Some(AuthChoice::SaslPlain)
            } else if caps.has(Capability::Sasl) && caps.has_auth_mechanism("LOGIN") {
                Some(AuthChoice::SaslLogin)
            } else if caps.has(Capability::User) {
                Some(AuthChoice::UserPass)
            } else {
                None
            }
        };

        match choice {
            Some(AuthChoice::Apop) => self.auth_apop(user, password).await?,
            Some(AuthChoice::SaslPlain) => {
                let mut mechanism = Plain::new(user, password);
                self.run_sasl(&mut mechanism).await?;
            }
            Some(AuthChoice::SaslLogin) => {
                let mut mechanism = Login::new(user, password);
                self.run_sasl(&mut mechanism).await?;
            }
            Some(AuthChoice::UserPass) => self.auth_user_pass(user, password).await?,
            None => {
                return Err(Error::Auth(
                    "no supported authentication mechanism".to_string(),
                ));
            }
        }

        self.finish_authentication().await
    }

    /// Authenticates with an explicitly chosen SASL mechanism.
    ///
    /// # Errors
    ///
    /// [`Error::Auth`] when the server rejects the exchange.
    pub async fn authenticate_sasl(&mut self, mechanism: &mut dyn SaslMechanism) -> Result<()> {
        self.ensure_auth_ready()?;
        let res = self.authenticate_sasl_inner(mechanism).await;
        self.finish(res)
    }

    async fn authenticate_sasl_inner(
        &mut self,
        mechanism: &mut dyn SaslMechanism,
    ) -> Result<()> {
        self.run_sasl(mechanism).await?;
        self.finish_authentication().await
    }

    async fn auth_user_pass(&mut self, user: &str, password: &str) -> Result<()> {
        let status = self
            .engine
            .execute(&Command::User {
                name: user.to_string(),
            })
            .await?;
        if !status.is_ok() {
            return Err(Error::Auth(status.message));
        }

        let status = self
            .engine
            .execute(&Command::Pass {
                password: password.to_string(),
            })
            .await?;
        if !status.is_ok() {
            return Err(Error::Auth(status.message));
        }
        Ok(())
    }

    async fn auth_apop(&mut self, user: &str, password: &str) -> Result<()> {
        // The digest covers the raw timestamp bytes, angle brackets and all.
        let mut seed = self
            .engine
            .capabilities()
            .apop_timestamp()
            .ok_or_else(|| Error::Auth("greeting carried no APOP timestamp".to_string()))?
            .to_vec();
        seed.extend_from_slice(password.as_bytes());
        let digest = format!("{:x}", md5::compute(&seed));

        let status = self
            .engine
            .execute(&Command::Apop {
                name: user.to_string(),
                digest,
            })
            .await?;
        if status.is_ok() {
            Ok(())
        } else {
            Err(Error::Auth(status.message))
        }
    }

    /// Drives a SASL mechanism through the AUTH exchange (RFC 5034).
    async fn run_sasl(&mut self, mechanism: &mut dyn SaslMechanism) -> Result<()> {
        let initial_response = if mechanism.supports_initial_response() {
            mechanism.initial_response().map(|ir| sasl::encode(&ir))
        } else {
            None
        };

        self.engine
            .send(&[Command::Auth {
                mechanism: mechanism.name().to_string(),
                initial_response,
            }])
            .await?;

        loop {
            let line = self.engine.read_line().await?;

            if line.as_slice() == b"+" || line.starts_with(b"+ ") {
                let encoded = String::from_utf8_lossy(line.get(2..).unwrap_or_default());
                let Some(server_data) = sasl::decode(&encoded) else {
                    self.engine.set_state(SessionState::Disconnected);
                    return Err(Error::Protocol(
                        "invalid base64 in SASL challenge".to_string(),
                    ));
                };

                // A mechanism that finished early still answers with empty
                // responses until the server terminates the exchange.
                let response = if mechanism.is_complete() {
                    Vec::new()
                } else {
                    mechanism.challenge(&server_data)
                };

                self.engine
                    .send(&[Command::AuthData {
                        line: sasl::encode(&response),
                    }])
                    .await?;
            } else {
                let status = match StatusLine::parse(&line) {
                    Ok(status) => status,
                    Err(err) => {
                        self.engine.set_state(SessionState::Disconnected);
                        return Err(err);
                    }
                };
                if status.is_ok() {
                    return Ok(());
                }
                return Err(Error::Auth(status.message));
            }
        }
    }

    async fn finish_authentication(&mut self) -> Result<()> {
        self.engine.set_state(SessionState::Transaction);
        self.engine.refresh_capabilities().await
    }

    // === STLS and UTF8 ===

    /// Upgrades the session to TLS via `STLS` and re-queries capabilities.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyConnected`] when the transport is already
    /// encrypted; [`Error::NotSupported`] without the STLS capability;
    /// [`Error::AlreadyAuthenticated`] post-login. None of these touch
    /// the wire.
    pub async fn starttls(&mut self) -> Result<()> {
        self.ensure_auth_ready()?;
        if self.engine.is_secure() {
            return Err(Error::AlreadyConnected);
        }
        if !self.engine.capabilities().has(Capability::Stls) {
            return Err(Error::NotSupported("STLS".to_string()));
        }
        let res = self.engine.upgrade_tls(&self.host).await;
        self.finish(res)
    }

    /// Enables UTF-8 mode (RFC 6856). Only valid before authentication;
    /// idempotent within the pre-auth phase.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyAuthenticated`] post-login, [`Error::NotSupported`]
    /// without the UTF8 capability.
    pub async fn enable_utf8(&mut self) -> Result<()> {
        self.ensure_auth_ready()?;
        if !self.engine.capabilities().has(Capability::Utf8) {
            return Err(Error::NotSupported("UTF8".to_string()));
        }
        if self.utf8_enabled {
            return Ok(());
        }

        let res = self.engine.execute_ok(&Command::Utf8).await.map(|_| ());
        if res.is_ok() {
            self.utf8_enabled = true;
        }
        self.finish(res)
    }

    // === Transaction operations ===

    /// Sends `NOOP`.
    ///
    /// # Errors
    ///
    /// Requires the transaction state.
    pub async fn noop(&mut self) -> Result<()> {
        self.ensure_transaction()?;
        let res = self.engine.execute_ok(&Command::Noop).await.map(|_| ());
        self.finish(res)
    }

    /// Issues `STAT` and returns the message count; the count and maildrop
    /// size accessors are refreshed as a side effect.
    ///
    /// # Errors
    ///
    /// A garbled `STAT` line is a [`Error::Protocol`] that leaves the
    /// session open.
    pub async fn message_count(&mut self) -> Result<u32> {
        self.ensure_transaction()?;
        let res = self.stat_inner().await;
        self.finish(res)
    }

    async fn stat_inner(&mut self) -> Result<u32> {
        let status = self.engine.execute_ok(&Command::Stat).await?;
        let mut tokens = status.message.split_whitespace();
        let count = tokens.next().and_then(|t| t.parse().ok());
        let size = tokens.next().and_then(|t| t.parse().ok());

        match (count, size) {
            (Some(count), Some(size)) => {
                self.count = count;
                self.size = size;
                Ok(count)
            }
            _ => Err(Error::Protocol(format!(
                "malformed STAT response: {}",
                status.message
            ))),
        }
    }

    /// Returns the size of one message in octets (`LIST n`).
    ///
    /// # Errors
    ///
    /// Requires the transaction state.
    pub async fn message_size(&mut self, index: usize) -> Result<u64> {
        self.ensure_transaction()?;
        let message = seq(index)?;
        let res = self.message_size_inner(message).await;
        self.finish(res)
    }

    async fn message_size_inner(&mut self, message: u32) -> Result<u64> {
        let status = self
            .engine
            .execute_ok(&Command::List {
                message: Some(message),
            })
            .await?;
        parse_size_line(&status.message)
    }

    /// Returns the sizes of all messages in maildrop order (`LIST`).
    ///
    /// # Errors
    ///
    /// Requires the transaction state.
    pub async fn message_sizes(&mut self) -> Result<Vec<u64>> {
        self.ensure_transaction()?;
        let res = self.message_sizes_inner().await;
        self.finish(res)
    }

    async fn message_sizes_inner(&mut self) -> Result<Vec<u64>> {
        self.engine
            .execute_ok(&Command::List { message: None })
            .await?;
        let lines = self.engine.read_payload_lines().await?;
        lines
            .iter()
            .map(|line| parse_size_line(&String::from_utf8_lossy(line)))
            .collect()
    }

    /// Returns the unique id of one message (`UIDL n`), probing for UIDL
    /// support if `CAPA` did not advertise it.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] when the probe fails; the session stays
    /// connected.
    pub async fn message_uid(&mut self, index: usize) -> Result<String> {
        self.ensure_transaction()?;
        let message = seq(index)?;
        let res = self.message_uid_inner(message).await;
        self.finish(res)
    }

    async fn message_uid_inner(&mut self, message: u32) -> Result<String> {
        self.ensure_uidl().await?;
        let status = self
            .engine
            .execute_ok(&Command::Uidl {
                message: Some(message),
            })
            .await?;
        parse_uid_line(&status.message)
    }

    /// Returns the unique ids of all messages in maildrop order (`UIDL`).
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] when the probe fails; the session stays
    /// connected.
    pub async fn message_uids(&mut self) -> Result<Vec<String>> {
        self.ensure_transaction()?;
        let res = self.message_uids_inner().await;
        self.finish(res)
    }

    async fn message_uids_inner(&mut self) -> Result<Vec<String>> {
        self.ensure_uidl().await?;
        self.engine
            .execute_ok(&Command::Uidl { message: None })
            .await?;
        let lines = self.engine.read_payload_lines().await?;
        lines
            .iter()
            .map(|line| parse_uid_line(&String::from_utf8_lossy(line)))
            .collect()
    }

    /// Confirms UIDL support, probing with `UIDL 1` on first use when the
    /// capability was not advertised.
    async fn ensure_uidl(&mut self) -> Result<()> {
        if self.engine.capabilities().has(Capability::Uidl) {
            return Ok(());
        }
        if self.uidl_probed {
            return Err(Error::NotSupported("UIDL".to_string()));
        }
        self.uidl_probed = true;

        let status = self
            .engine
            .execute(&Command::Uidl { message: Some(1) })
            .await?;
        if status.is_ok() {
            self.engine.capabilities_mut().insert(Capability::Uidl);
            Ok(())
        } else {
            Err(Error::NotSupported("UIDL".to_string()))
        }
    }

    /// Retrieves a full message (`RETR`).
    ///
    /// # Errors
    ///
    /// Requires the transaction state.
    pub async fn get_message(&mut self, index: usize) -> Result<Vec<u8>> {
        self.ensure_transaction()?;
        let message = seq(index)?;
        let res = self.fetch_inner(Command::Retr { message }).await;
        self.finish(res)
    }

    /// Retrieves the headers of a message (`TOP n 0`).
    ///
    /// # Errors
    ///
    /// Requires the transaction state.
    pub async fn get_message_headers(&mut self, index: usize) -> Result<Vec<u8>> {
        self.ensure_transaction()?;
        let message = seq(index)?;
        let res = self.fetch_inner(Command::Top { message, lines: 0 }).await;
        self.finish(res)
    }

    /// Retrieves the headers plus the first `lines` body lines of a
    /// message (`TOP`).
    ///
    /// # Errors
    ///
    /// Requires the transaction state.
    pub async fn get_message_preview(&mut self, index: usize, lines: u32) -> Result<Vec<u8>> {
        self.ensure_transaction()?;
        let message = seq(index)?;
        let res = self.fetch_inner(Command::Top { message, lines }).await;
        self.finish(res)
    }

    async fn fetch_inner(&mut self, cmd: Command) -> Result<Vec<u8>> {
        self.engine.execute_ok(&cmd).await?;
        self.engine.read_payload().await
    }

    /// Opens a lazy stream over a message (`RETR`) so large payloads never
    /// have to be buffered whole; hand it to a MIME parser line by line.
    ///
    /// # Errors
    ///
    /// Requires the transaction state.
    pub async fn get_stream(&mut self, index: usize) -> Result<MessageStream<'_, S>> {
        self.ensure_transaction()?;
        let message = seq(index)?;
        match self.engine.execute_ok(&Command::Retr { message }).await {
            Ok(_) => self.engine.open_stream(),
            Err(err) => {
                self.note_failure();
                Err(err)
            }
        }
    }

    /// Retrieves several messages, pipelined into a single write when the
    /// server advertises `PIPELINING`. Results match input order;
    /// duplicates are preserved; an empty input returns without touching
    /// the wire.
    ///
    /// # Errors
    ///
    /// Requires the transaction state.
    pub async fn get_messages(&mut self, indexes: &[usize]) -> Result<Vec<Vec<u8>>> {
        self.ensure_transaction()?;
        if indexes.is_empty() {
            return Ok(Vec::new());
        }
        let cmds = indexes
            .iter()
            .map(|&index| Ok(Command::Retr {
                message: seq(index)?,
            }))
            .collect::<Result<Vec<_>>>()?;
        let res = self.engine.run_batch(cmds).await;
        self.finish(res)
    }

    /// Retrieves the headers of several messages; pipelined like
    /// [`get_messages`](Self::get_messages).
    ///
    /// # Errors
    ///
    /// Requires the transaction state.
    pub async fn get_headers(&mut self, indexes: &[usize]) -> Result<Vec<Vec<u8>>> {
        self.ensure_transaction()?;
        if indexes.is_empty() {
            return Ok(Vec::new());
        }
        let cmds = indexes
            .iter()
            .map(|&index| Ok(Command::Top {
                message: seq(index)?,
                lines: 0,
            }))
            .collect::<Result<Vec<_>>>()?;
        let res = self.engine.run_batch(cmds).await;
        self.finish(res)
    }

    /// Marks a message as deleted (`DELE`).
    ///
    /// # Errors
    ///
    /// Requires the transaction state.
    pub async fn delete_message(&mut self, index: usize) -> Result<()> {
        self.ensure_transaction()?;
        let message = seq(index)?;
        let res = self
            .engine
            .execute_ok(&Command::Dele { message })
            .await
            .map(|_| ());
        self.finish(res)
    }

    /// Marks several messages as deleted; pipelined like
    /// [`get_messages`](Self::get_messages).
    ///
    /// # Errors
    ///
    /// Requires the transaction state.
    pub async fn delete_messages(&mut self, indexes: &[usize]) -> Result<()> {
        self.ensure_transaction()?;
        if indexes.is_empty() {
            return Ok(());
        }
        let cmds = indexes
            .iter()
            .map(|&index| Ok(Command::Dele {
                message: seq(index)?,
            }))
            .collect::<Result<Vec<_>>>()?;
        let res = self.engine.run_batch(cmds).await.map(|_| ());
        self.finish(res)
    }

    /// Unmarks every message deleted in this session (`RSET`).
    ///
    /// # Errors
    ///
    /// Requires the transaction state.
    pub async fn reset(&mut self) -> Result<()> {
        self.ensure_transaction()?;
        let res = self.engine.execute_ok(&Command::Rset).await.map(|_| ());
        self.finish(res)
    }

    // === Languages (RFC 6856) ===

    /// Lists the response languages the server offers (`LANG`), as
    /// `(tag, description)` pairs.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] without the LANG capability.
    pub async fn languages(&mut self) -> Result<Vec<(String, String)>> {
        self.ensure_connected()?;
        if !self.engine.capabilities().has(Capability::Lang) {
            return Err(Error::NotSupported("LANG".to_string()));
        }
        let res = self.languages_inner().await;
        self.finish(res)
    }

    async fn languages_inner(&mut self) -> Result<Vec<(String, String)>> {
        self.engine.execute_ok(&Command::Lang { tag: None }).await?;
        let lines = self.engine.read_payload_lines().await?;
        Ok(lines
            .iter()
            .map(|line| {
                let text = String::from_utf8_lossy(line);
                let text = text.trim();
                match text.split_once(char::is_whitespace) {
                    Some((tag, description)) => {
                        (tag.to_string(), description.trim_start().to_string())
                    }
                    None => (text.to_string(), String::new()),
                }
            })
            .collect())
    }

    /// Selects a response language (`LANG <tag>`).
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] without the LANG capability.
    pub async fn set_language(&mut self, tag: &str) -> Result<()> {
        self.ensure_connected()?;
        if !self.engine.capabilities().has(Capability::Lang) {
            return Err(Error::NotSupported("LANG".to_string()));
        }
        let res = self
            .engine
            .execute_ok(&Command::Lang {
                tag: Some(tag.to_string()),
            })
            .await
            .map(|_| ());
        self.finish(res)
    }

    // === Disconnect ===

    /// Closes the session.
    ///
    /// With `quit` true and an authenticated session, `QUIT` is sent first
    /// so the server commits deletions; otherwise the transport is simply
    /// closed. Always emits the Disconnected event with
    /// `requested = true`. Disconnecting an already-closed client is a
    /// no-op.
    pub async fn disconnect(&mut self, quit: bool) -> Result<()> {
        if !self.engine.state().is_connected() {
            return Ok(());
        }

        if quit && self.engine.state() == SessionState::Transaction {
            self.engine.set_state(SessionState::Closing);
            // A -ERR or I/O failure here changes nothing; the transport is
            // going away either way.
            if self.engine.send(&[Command::Quit]).await.is_ok() {
                let _ = self.engine.read_status().await;
            }
        }

        self.engine.shutdown().await;
        self.connected_event_live = false;
        if let Some(handler) = &mut self.handler {
            handler.on_disconnected(&self.host, self.port, self.security, true);
        }
        Ok(())
    }
}

impl<S> std::fmt::Debug for Pop3Client<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pop3Client")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("state", &self.engine.state())
            .finish_non_exhaustive()
    }
}

/// Translates a 0-based boundary index into a 1-based wire number.
fn seq(index: usize) -> Result<u32> {
    index
        .checked_add(1)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| Error::Protocol("message index out of range".to_string()))
}

/// Parses the `n size` shape shared by LIST responses.
fn parse_size_line(text: &str) -> Result<u64> {
    let mut tokens = text.split_whitespace();
    let number = tokens.next();
    let size = tokens.next().and_then(|t| t.parse().ok());
    match (number, size) {
        (Some(_), Some(size)) => Ok(size),
        _ => Err(Error::Protocol(format!("malformed LIST response: {text}"))),
    }
}

/// Parses the `n uid` shape shared by UIDL responses.
fn parse_uid_line(text: &str) -> Result<String> {
    let mut tokens = text.split_whitespace();
    let number = tokens.next();
    let uid = tokens.next();
    match (number, uid) {
        (Some(_), Some(uid)) => Ok(uid.to_string()),
        _ => Err(Error::Protocol(format!("malformed UIDL response: {text}"))),
    }
}
