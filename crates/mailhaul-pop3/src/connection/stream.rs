//! Stream types for POP3 connections.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::{Error, Result};

/// The TLS-upgrade capability the engine drives for STLS.
///
/// Implemented by [`Pop3Stream`] for real connections and by test
/// transports that simulate the upgrade.
#[allow(async_fn_in_trait)]
pub trait TlsUpgrade: Sized {
    /// Returns true if the transport is already encrypted.
    fn is_tls(&self) -> bool;

    /// Performs the TLS handshake over the existing transport.
    async fn start_tls(self, host: &str) -> Result<Self>;
}

/// A stream that can be either plaintext or TLS.
pub enum Pop3Stream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

/// Forwards an I/O poll to whichever transport is live.
macro_rules! delegate_io {
    ($self:ident, $stream:ident => $call:expr) => {
        match $self.get_mut() {
            Pop3Stream::Plain($stream) => $call,
            Pop3Stream::Tls($stream) => $call,
        }
    };
}

impl TlsUpgrade for Pop3Stream {
    fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    async fn start_tls(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => {
                let server_name = ServerName::try_from(host.to_string())?;
                let tls = create_tls_connector().connect(server_name, tcp).await?;
                Ok(Self::Tls(Box::new(tls)))
            }
            Self::Tls(_) => Err(Error::AlreadyConnected),
        }
    }
}

impl AsyncRead for Pop3Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        delegate_io!(self, stream => Pin::new(stream).poll_read(cx, buf))
    }
}

impl AsyncWrite for Pop3Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        delegate_io!(self, stream => Pin::new(stream).poll_write(cx, buf))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        delegate_io!(self, stream => Pin::new(stream).poll_flush(cx))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        delegate_io!(self, stream => Pin::new(stream).poll_shutdown(cx))
    }
}

/// Creates a TLS connector with the bundled webpki roots.
fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

async fn dial(host: &str, port: u16) -> Result<TcpStream> {
    let addr = format!("{host}:{port}");
    Ok(TcpStream::connect(&addr).await?)
}

/// Connects to a server without TLS (for STLS or plaintext sessions).
pub async fn connect_plain(host: &str, port: u16) -> Result<Pop3Stream> {
    Ok(Pop3Stream::Plain(dial(host, port).await?))
}

/// Connects to a server with TLS from the start (implicit TLS, port 995).
pub async fn connect_tls(host: &str, port: u16) -> Result<Pop3Stream> {
    Pop3Stream::Plain(dial(host, port).await?)
        .start_tls(host)
        .await
}
