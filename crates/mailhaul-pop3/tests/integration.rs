//! Integration tests for the POP3 client.
//!
//! These tests drive the full client against a scripted mock stream, so
//! every scenario exercises the real handshake, authentication, and
//! command paths without a network.

use std::io::{self, Cursor, Write};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailhaul_pop3::{
    Capability, Config, Error, Pop3Client, Pop3EventHandler, Result, Security, SessionState,
    TlsUpgrade,
};

/// Shared view of everything the client wrote.
#[derive(Clone, Default)]
struct WireLog {
    sent: Arc<Mutex<Vec<u8>>>,
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl WireLog {
    fn sent(&self) -> Vec<u8> {
        self.sent.lock().unwrap().clone()
    }

    fn chunks(&self) -> Vec<Vec<u8>> {
        self.chunks.lock().unwrap().clone()
    }
}

/// Mock stream returning scripted responses and capturing writes.
struct MockStream {
    responses: Cursor<Vec<u8>>,
    log: WireLog,
    tls: bool,
}

impl MockStream {
    fn new(responses: &[u8], log: WireLog) -> Self {
        Self {
            responses: Cursor::new(responses.to_vec()),
            log,
            tls: false,
        }
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let pos = usize::try_from(self.responses.position()).unwrap();
        let data = self.responses.get_ref();

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.responses.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.log.sent.lock().unwrap().extend_from_slice(buf);
        self.log.chunks.lock().unwrap().push(buf.to_vec());
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl TlsUpgrade for MockStream {
    fn is_tls(&self) -> bool {
        self.tls
    }

    async fn start_tls(mut self, _host: &str) -> Result<Self> {
        self.tls = true;
        Ok(self)
    }
}

/// Sink capturing protocol log output.
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Event handler recording lifecycle callbacks.
#[derive(Clone, Default)]
struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Pop3EventHandler for EventLog {
    fn on_connected(&mut self, host: &str, port: u16, _security: Security) {
        self.0.lock().unwrap().push(format!("connected {host}:{port}"));
    }

    fn on_disconnected(&mut self, host: &str, port: u16, _security: Security, requested: bool) {
        self.0
            .lock()
            .unwrap()
            .push(format!("disconnected {host}:{port} requested={requested}"));
    }
}

fn test_config() -> Config {
    Config::builder("localhost").security(Security::None).build()
}

async fn connect(responses: &[u8]) -> (Pop3Client<MockStream>, WireLog) {
    let log = WireLog::default();
    let stream = MockStream::new(responses, log.clone());
    let client = Pop3Client::from_stream(stream, test_config()).await.unwrap();
    (client, log)
}

// === S1: basic session ===

#[tokio::test]
async fn basic_session() {
    let script = concat!(
        "+OK Hello there.\r\n",
        "+OK\r\nUSER\r\nEXPIRE 31\r\nTOP\r\nUIDL\r\n.\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK\r\nUSER\r\nEXPIRE 31\r\nTOP\r\nUIDL\r\nRESP-CODES\r\n.\r\n",
        "+OK 7 1800662\r\n",
        "+OK\r\n1 1024\r\n2 2048\r\n3 3072\r\n4 4096\r\n5 5120\r\n6 6144\r\n7 7168\r\n.\r\n",
    );
    let (mut client, wire) = connect(script.as_bytes()).await;

    assert_eq!(client.state(), SessionState::Connected);
    assert_eq!(client.capabilities().expire_policy(), 31);
    assert!(client.capabilities().has(Capability::Top));
    assert!(client.capabilities().has(Capability::Uidl));

    client.authenticate("username", "password").await.unwrap();
    assert_eq!(client.state(), SessionState::Transaction);
    // Post-auth CAPA revealed more.
    assert!(client.capabilities().has(Capability::ResponseCodes));

    let count = client.message_count().await.unwrap();
    assert_eq!(count, 7);
    assert_eq!(client.count(), 7);
    assert_eq!(client.maildrop_size(), 1_800_662);

    let sizes = client.message_sizes().await.unwrap();
    assert_eq!(sizes, vec![1024, 2048, 3072, 4096, 5120, 6144, 7168]);

    assert_eq!(
        wire.sent(),
        b"CAPA\r\nUSER username\r\nPASS password\r\nCAPA\r\nSTAT\r\nLIST\r\n"
    );
}

// === S2: pipelined RETR ===

#[tokio::test]
async fn pipelined_retr_uses_one_write() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\nPIPELINING\r\n.\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK\r\nUSER\r\nPIPELINING\r\n.\r\n",
        "+OK\r\nbody one\r\n.\r\n",
        "+OK\r\nbody two\r\n.\r\n",
        "+OK\r\nbody three\r\n.\r\n",
    );
    let (mut client, wire) = connect(script.as_bytes()).await;
    client.authenticate("u", "p").await.unwrap();

    let messages = client.get_messages(&[0, 1, 2]).await.unwrap();
    assert_eq!(
        messages,
        vec![
            b"body one\r\n".to_vec(),
            b"body two\r\n".to_vec(),
            b"body three\r\n".to_vec(),
        ]
    );

    // The three RETRs went out as exactly one write.
    let chunks = wire.chunks();
    assert_eq!(chunks.last().unwrap(), b"RETR 1\r\nRETR 2\r\nRETR 3\r\n");
}

#[tokio::test]
async fn sequential_retr_without_pipelining_matches() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\n.\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK\r\nUSER\r\n.\r\n",
        "+OK\r\nbody one\r\n.\r\n",
        "+OK\r\nbody two\r\n.\r\n",
        "+OK\r\nbody three\r\n.\r\n",
    );
    let (mut client, wire) = connect(script.as_bytes()).await;
    client.authenticate("u", "p").await.unwrap();

    // Same observable results as the pipelined variant, one write each.
    let messages = client.get_messages(&[0, 1, 2]).await.unwrap();
    assert_eq!(
        messages,
        vec![
            b"body one\r\n".to_vec(),
            b"body two\r\n".to_vec(),
            b"body three\r\n".to_vec(),
        ]
    );

    let retr_chunks: Vec<_> = wire
        .chunks()
        .into_iter()
        .filter(|c| c.starts_with(b"RETR"))
        .collect();
    assert_eq!(retr_chunks.len(), 3);
}

#[tokio::test]
async fn pipelined_error_is_drained_and_session_survives() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\nPIPELINING\r\n.\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK\r\nUSER\r\nPIPELINING\r\n.\r\n",
        "+OK\r\nbody one\r\n.\r\n",
        "-ERR no such message\r\n",
        "+OK\r\nbody three\r\n.\r\n",
        "+OK 3 6144\r\n",
    );
    let (mut client, _wire) = connect(script.as_bytes()).await;
    client.authenticate("u", "p").await.unwrap();

    let err = client.get_messages(&[0, 1, 2]).await.unwrap_err();
    assert!(matches!(err, Error::Command { .. }));
    assert!(client.is_connected());

    // The response for command 3 was consumed: the next command sees the
    // next scripted response, not a leftover payload.
    let count = client.message_count().await.unwrap();
    assert_eq!(count, 3);
}

// === S3/S4: UIDL probe ===

#[tokio::test]
async fn uidl_probe_success() {
    let script = concat!(
        "+OK ready\r\n",
        "-ERR no CAPA here\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "-ERR no CAPA here\r\n",
        "+OK 1 abc123\r\n",
        "+OK\r\n1 abc123\r\n.\r\n",
    );
    let (mut client, wire) = connect(script.as_bytes()).await;
    client.authenticate("u", "p").await.unwrap();
    assert!(!client.capabilities().has(Capability::Uidl));

    let uids = client.message_uids().await.unwrap();
    assert_eq!(uids, vec!["abc123".to_string()]);
    assert!(client.capabilities().has(Capability::Uidl));

    // The probe went to the wire before the full UIDL.
    let sent = wire.sent();
    let text = String::from_utf8(sent).unwrap();
    let probe = text.find("UIDL 1\r\n").unwrap();
    let full = text.rfind("UIDL\r\n").unwrap();
    assert!(probe < full);
}

#[tokio::test]
async fn uidl_probe_failure_is_not_supported() {
    let script = concat!(
        "+OK ready\r\n",
        "-ERR no CAPA here\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "-ERR no CAPA here\r\n",
        "-ERR unknown command\r\n",
    );
    let (mut client, _wire) = connect(script.as_bytes()).await;
    client.authenticate("u", "p").await.unwrap();

    let err = client.message_uids().await.unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
    assert!(client.is_connected());
}

// === S5: auth failure preserves session ===

#[tokio::test]
async fn auth_failure_allows_retry() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\n.\r\n",
        "+OK\r\n",
        "-ERR bad pass\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK\r\nUSER\r\n.\r\n",
    );
    let (mut client, _wire) = connect(script.as_bytes()).await;

    let err = client.authenticate("u", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(client.is_connected());
    assert_eq!(client.state(), SessionState::Connected);

    client.authenticate("u", "right").await.unwrap();
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn second_authenticate_is_rejected_without_wire_traffic() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\n.\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK\r\nUSER\r\n.\r\n",
    );
    let (mut client, wire) = connect(script.as_bytes()).await;
    client.authenticate("u", "p").await.unwrap();

    let before = wire.sent().len();
    let err = client.authenticate("u", "p").await.unwrap_err();
    assert!(matches!(err, Error::AlreadyAuthenticated));
    assert_eq!(wire.sent().len(), before);
}

// === S6: APOP ===

#[tokio::test]
async fn apop_digest_and_redaction() {
    let script = concat!(
        "+OK <d99894e8@example>\r\n",
        "-ERR no CAPA here\r\n",
        "+OK\r\n",
        "-ERR no CAPA here\r\n",
    );
    let (mut client, wire) = connect(script.as_bytes()).await;

    let capture = LogCapture::default();
    client.set_protocol_logger(Box::new(capture.clone()), true);

    client.authenticate("username", "password").await.unwrap();
    assert!(client.is_authenticated());

    // hex(md5(b"<d99894e8@example>password")), raw timestamp bytes included.
    let sent = String::from_utf8(wire.sent()).unwrap();
    assert!(sent.contains("APOP username d8027446a343b66d54736012dd06667f\r\n"));

    // The wire carries the real digest; the log does not.
    let log = capture.contents();
    assert!(log.contains("C: APOP ******** ********\n"));
    assert!(!log.contains("d8027446a343b66d54736012dd06667f"));
}

#[tokio::test]
async fn apop_matches_rfc1939_example() {
    let script = concat!(
        "+OK POP3 server ready <1896.697170952@dbc.mtview.ca.us>\r\n",
        "-ERR\r\n",
        "+OK maildrop has 1 message (369 octets)\r\n",
        "-ERR\r\n",
    );
    let (mut client, wire) = connect(script.as_bytes()).await;

    client.authenticate("mrose", "tanstaaf").await.unwrap();

    let sent = String::from_utf8(wire.sent()).unwrap();
    assert!(sent.contains("APOP mrose c4c9334bac560ecc979e58001b3e22fb\r\n"));
}

// === S7: SASL LOGIN ===

#[tokio::test]
async fn sasl_login_exchange_is_fully_redacted() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nSASL LOGIN\r\n.\r\n",
        "+ \r\n",
        "+ \r\n",
        "+OK\r\n",
        "+OK\r\nSASL LOGIN\r\n.\r\n",
    );
    let (mut client, wire) = connect(script.as_bytes()).await;

    let capture = LogCapture::default();
    client.set_protocol_logger(Box::new(capture.clone()), true);

    client.authenticate("username", "password").await.unwrap();
    assert!(client.is_authenticated());

    let sent = String::from_utf8(wire.sent()).unwrap();
    assert!(sent.contains("AUTH LOGIN\r\ndXNlcm5hbWU=\r\ncGFzc3dvcmQ=\r\n"));

    let log = capture.contents();
    assert!(log.contains("C: AUTH ********\n"));
    assert_eq!(log.matches("C: ********\n").count(), 2);
    assert!(!log.contains("dXNlcm5hbWU="));
    assert!(!log.contains("cGFzc3dvcmQ="));
}

// === STLS ===

#[tokio::test]
async fn stls_upgrades_and_replaces_capabilities() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\nSTLS\r\nSASL PLAIN\r\n.\r\n",
        "+OK begin TLS\r\n",
        "+OK\r\nUSER\r\nSASL PLAIN LOGIN\r\n.\r\n",
    );
    let log = WireLog::default();
    let stream = MockStream::new(script.as_bytes(), log.clone());
    let config = Config::builder("localhost")
        .security(Security::StartTls)
        .build();

    let client = Pop3Client::from_stream(stream, config).await.unwrap();
    assert!(client.is_secure());
    assert_eq!(client.state(), SessionState::Connected);

    // The post-upgrade CAPA replaced the set: STLS is no longer listed and
    // the mechanism list was rebuilt.
    assert!(!client.capabilities().has(Capability::Stls));
    assert_eq!(client.capabilities().auth_mechanisms(), &["PLAIN", "LOGIN"]);

    assert_eq!(log.sent(), b"CAPA\r\nSTLS\r\nCAPA\r\n");
}

#[tokio::test]
async fn starttls_on_secured_session_is_already_connected() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\nSTLS\r\n.\r\n",
        "+OK begin TLS\r\n",
        "+OK\r\nUSER\r\n.\r\n",
    );
    let log = WireLog::default();
    let stream = MockStream::new(script.as_bytes(), log.clone());
    let config = Config::builder("localhost")
        .security(Security::StartTls)
        .build();

    let mut client = Pop3Client::from_stream(stream, config).await.unwrap();
    assert!(client.is_secure());

    let before = log.sent().len();
    let err = client.starttls().await.unwrap_err();
    assert!(matches!(err, Error::AlreadyConnected));
    assert_eq!(log.sent().len(), before);
    assert!(client.is_connected());
}

#[tokio::test]
async fn required_stls_fails_without_capability() {
    let script = concat!("+OK ready\r\n", "+OK\r\nUSER\r\n.\r\n");
    let log = WireLog::default();
    let stream = MockStream::new(script.as_bytes(), log.clone());
    let config = Config::builder("localhost")
        .security(Security::StartTls)
        .build();

    let err = Pop3Client::from_stream(stream, config).await.unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
}

// === UTF8 ===

#[tokio::test]
async fn enable_utf8_pre_auth_is_idempotent() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\nUTF8\r\n.\r\n",
        "+OK\r\n",
    );
    let (mut client, wire) = connect(script.as_bytes()).await;

    client.enable_utf8().await.unwrap();
    let before = wire.sent().len();
    // Second call within the pre-auth phase is a no-op.
    client.enable_utf8().await.unwrap();
    assert_eq!(wire.sent().len(), before);
}

#[tokio::test]
async fn enable_utf8_post_auth_is_rejected() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\nUTF8\r\n.\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK\r\nUSER\r\nUTF8\r\n.\r\n",
    );
    let (mut client, wire) = connect(script.as_bytes()).await;
    client.authenticate("u", "p").await.unwrap();

    let before = wire.sent().len();
    let err = client.enable_utf8().await.unwrap_err();
    assert!(matches!(err, Error::AlreadyAuthenticated));
    assert_eq!(wire.sent().len(), before);
}

// === State gating ===

#[tokio::test]
async fn transaction_operations_require_authentication() {
    let script = concat!("+OK ready\r\n", "+OK\r\nUSER\r\n.\r\n");
    let (mut client, wire) = connect(script.as_bytes()).await;

    let before = wire.sent().len();
    assert!(matches!(
        client.message_count().await.unwrap_err(),
        Error::NotAuthenticated
    ));
    assert!(matches!(
        client.get_message(0).await.unwrap_err(),
        Error::NotAuthenticated
    ));
    assert!(matches!(
        client.delete_message(0).await.unwrap_err(),
        Error::NotAuthenticated
    ));
    assert_eq!(wire.sent().len(), before);
}

#[tokio::test]
async fn command_error_keeps_session_usable() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\n.\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK\r\nUSER\r\n.\r\n",
        "-ERR no such message\r\n",
        "+OK 0 0\r\n",
    );
    let (mut client, _wire) = connect(script.as_bytes()).await;
    client.authenticate("u", "p").await.unwrap();

    let err = client.delete_message(41).await.unwrap_err();
    assert!(matches!(err, Error::Command { .. }));
    assert!(client.is_connected());

    assert_eq!(client.message_count().await.unwrap(), 0);
}

#[tokio::test]
async fn empty_bulk_inputs_never_touch_the_wire() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\nPIPELINING\r\n.\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK\r\nUSER\r\nPIPELINING\r\n.\r\n",
    );
    let (mut client, wire) = connect(script.as_bytes()).await;
    client.authenticate("u", "p").await.unwrap();

    let before = wire.sent().len();
    assert!(client.get_messages(&[]).await.unwrap().is_empty());
    assert!(client.get_headers(&[]).await.unwrap().is_empty());
    client.delete_messages(&[]).await.unwrap();
    assert_eq!(wire.sent().len(), before);
}

#[tokio::test]
async fn duplicate_bulk_indexes_are_preserved() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\nPIPELINING\r\n.\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK\r\nUSER\r\nPIPELINING\r\n.\r\n",
        "+OK\r\nsame\r\n.\r\n",
        "+OK\r\nsame\r\n.\r\n",
    );
    let (mut client, wire) = connect(script.as_bytes()).await;
    client.authenticate("u", "p").await.unwrap();

    let messages = client.get_messages(&[0, 0]).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0], messages[1]);
    assert!(String::from_utf8(wire.sent())
        .unwrap()
        .contains("RETR 1\r\nRETR 1\r\n"));
}

// === Streaming ===

#[tokio::test]
async fn message_stream_reads_lazily() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\n.\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK\r\nUSER\r\n.\r\n",
        "+OK message follows\r\n",
        "Subject: hi\r\n",
        "\r\n",
        "..leading dot\r\n",
        "body\r\n",
        ".\r\n",
        "+OK 1 512\r\n",
    );
    let (mut client, _wire) = connect(script.as_bytes()).await;
    client.authenticate("u", "p").await.unwrap();

    let mut stream = client.get_stream(0).await.unwrap();
    assert_eq!(stream.next_line().await.unwrap().unwrap(), b"Subject: hi");
    assert_eq!(stream.next_line().await.unwrap().unwrap(), b"");
    assert_eq!(stream.next_line().await.unwrap().unwrap(), b".leading dot");
    assert_eq!(stream.next_line().await.unwrap().unwrap(), b"body");
    assert_eq!(stream.next_line().await.unwrap(), None);

    // The session is positioned cleanly after the payload.
    assert_eq!(client.message_size(0).await.unwrap(), 512);
}

// === TOP / headers ===

#[tokio::test]
async fn get_message_headers_uses_top_zero() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\nTOP\r\n.\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK\r\nUSER\r\nTOP\r\n.\r\n",
        "+OK\r\nSubject: hi\r\n\r\n.\r\n",
    );
    let (mut client, wire) = connect(script.as_bytes()).await;
    client.authenticate("u", "p").await.unwrap();

    let headers = client.get_message_headers(0).await.unwrap();
    assert_eq!(headers, b"Subject: hi\r\n\r\n");
    assert!(String::from_utf8(wire.sent()).unwrap().contains("TOP 1 0\r\n"));
}

// === LANG ===

#[tokio::test]
async fn languages_require_capability() {
    let script = concat!("+OK ready\r\n", "+OK\r\nUSER\r\n.\r\n");
    let (mut client, wire) = connect(script.as_bytes()).await;

    let before = wire.sent().len();
    assert!(matches!(
        client.languages().await.unwrap_err(),
        Error::NotSupported(_)
    ));
    assert_eq!(wire.sent().len(), before);
}

#[tokio::test]
async fn languages_parse_tag_and_description() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\nLANG\r\n.\r\n",
        "+OK\r\nen English\r\nsv Svenska\r\n.\r\n",
        "+OK en is now the language\r\n",
    );
    let (mut client, _wire) = connect(script.as_bytes()).await;

    let languages = client.languages().await.unwrap();
    assert_eq!(
        languages,
        vec![
            ("en".to_string(), "English".to_string()),
            ("sv".to_string(), "Svenska".to_string()),
        ]
    );

    client.set_language("en").await.unwrap();
}

// === Events and disconnect ===

#[tokio::test]
async fn connect_and_disconnect_events() {
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\n.\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK\r\nUSER\r\n.\r\n",
        "+OK bye\r\n",
    );
    let events = EventLog::default();
    let log = WireLog::default();
    let stream = MockStream::new(script.as_bytes(), log.clone());
    let mut client =
        Pop3Client::from_stream_with(stream, test_config(), Some(Box::new(events.clone())))
            .await
            .unwrap();
    assert_eq!(events.events(), vec!["connected localhost:110".to_string()]);

    client.authenticate("u", "p").await.unwrap();
    client.disconnect(true).await.unwrap();

    assert!(!client.is_connected());
    assert!(String::from_utf8(log.sent()).unwrap().ends_with("QUIT\r\n"));
    assert_eq!(
        events.events(),
        vec![
            "connected localhost:110".to_string(),
            "disconnected localhost:110 requested=true".to_string(),
        ]
    );

    // A second disconnect is a no-op.
    client.disconnect(true).await.unwrap();
    assert_eq!(events.events().len(), 2);
}

#[tokio::test]
async fn transport_failure_emits_unrequested_disconnect() {
    // Script ends right after login; STAT hits EOF mid-session.
    let script = concat!(
        "+OK ready\r\n",
        "+OK\r\nUSER\r\n.\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+OK\r\nUSER\r\n.\r\n",
    );
    let events = EventLog::default();
    let log = WireLog::default();
    let stream = MockStream::new(script.as_bytes(), log);
    let mut client =
        Pop3Client::from_stream_with(stream, test_config(), Some(Box::new(events.clone())))
            .await
            .unwrap();
    client.authenticate("u", "p").await.unwrap();

    let err = client.message_count().await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(!client.is_connected());
    assert_eq!(
        events.events().last().unwrap(),
        "disconnected localhost:110 requested=false"
    );
}

// === Cancellation ===

#[tokio::test]
async fn cancellation_between_commands_is_clean() {
    let script = concat!("+OK ready\r\n", "+OK\r\nUSER\r\n.\r\n");
    let (mut client, wire) = connect(script.as_bytes()).await;

    client.cancellation_token().cancel();
    let before = wire.sent().len();
    let err = client.enable_utf8().await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    // Clean cancellation: nothing was sent and the session stays up.
    assert_eq!(wire.sent().len(), before);
    assert!(client.is_connected());
}
