//! Transport for POP3 connections.

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

use crate::Result;

/// A POP3 connection, plaintext (port 110, possibly upgraded with STLS
/// later) or implicit TLS (port 995).
pub enum PopStream {
    /// Plaintext TCP.
    Plain(TcpStream),
    /// TLS, implicit or after STLS.
    Tls(Box<TlsStream<TcpStream>>),
}

impl PopStream {
    /// Opens a connection, with TLS from the first byte when `tls` is set.
    pub async fn connect(host: &str, port: u16, tls: bool) -> Result<Self> {
        let tcp = TcpStream::connect((host, port)).await?;
        tracing::debug!(host, port, tls, "POP3 transport connected");
        let stream = Self::Plain(tcp);
        if tls {
            stream.upgrade(host).await
        } else {
            Ok(stream)
        }
    }

    /// Runs the TLS handshake on a plaintext stream.
    ///
    /// An already encrypted stream is returned unchanged.
    pub async fn upgrade(self, host: &str) -> Result<Self> {
        let tcp = match self {
            Self::Plain(tcp) => tcp,
            tls @ Self::Tls(_) => return Ok(tls),
        };
        let server_name = ServerName::try_from(host.to_string())?;
        let stream = tls_connector().connect(server_name, tcp).await?;
        Ok(Self::Tls(Box::new(stream)))
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for PopStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for PopStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

fn tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}
