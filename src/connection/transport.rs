//! Transport abstraction (TCP with optional TLS vs Unix socket)

use crate::{Error, Result};
use bytes::BytesMut;
use rustls::ClientConfig;
use rustls_pki_types::ServerName;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};

/// TCP stream variant: plain or TLS-encrypted
#[allow(clippy::large_enum_variant)]
pub enum TcpVariant {
    /// Plain TCP connection
    Plain(TcpStream),
    /// TLS-encrypted TCP connection
    Tls(tokio_rustls::client::TlsStream<TcpStream>),
}

impl std::fmt::Debug for TcpVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TcpVariant::Plain(_) => f.write_str("TcpVariant::Plain(TcpStream)"),
            TcpVariant::Tls(_) => f.write_str("TcpVariant::Tls(TlsStream)"),
        }
    }
}

impl TcpVariant {
    /// Write all bytes to the stream
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        match self {
            TcpVariant::Plain(stream) => stream.write_all(buf).await?,
            TcpVariant::Tls(stream) => stream.write_all(buf).await?,
        }
        Ok(())
    }

    /// Flush the stream
    pub async fn flush(&mut self) -> Result<()> {
        match self {
            TcpVariant::Plain(stream) => stream.flush().await?,
            TcpVariant::Tls(stream) => stream.flush().await?,
        }
        Ok(())
    }

    /// Read into buffer
    pub async fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let n = match self {
            TcpVariant::Plain(stream) => stream.read_buf(buf).await?,
            TcpVariant::Tls(stream) => stream.read_buf(buf).await?,
        };
        Ok(n)
    }

    /// Shutdown the stream
    pub async fn shutdown(&mut self) -> Result<()> {
        match self {
            TcpVariant::Plain(stream) => stream.shutdown().await?,
            TcpVariant::Tls(stream) => stream.shutdown().await?,
        }
        Ok(())
    }

    /// Negotiated TLS protocol version, if encrypted
    pub fn tls_version(&self) -> Option<rustls::ProtocolVersion> {
        match self {
            TcpVariant::Plain(_) => None,
            TcpVariant::Tls(stream) => stream.get_ref().1.protocol_version(),
        }
    }
}

/// Transport layer abstraction
#[derive(Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Transport {
    /// TCP socket (plain or TLS)
    Tcp(TcpVariant),
    /// Unix domain socket
    Unix(UnixStream),
}

impl Transport {
    /// Connect via plain TCP, optionally bounded by `timeout`
    pub async fn connect_tcp(host: &str, port: u16, timeout: Option<Duration>) -> Result<Self> {
        let dial = TcpStream::connect((host, port));
        let stream = match timeout {
            Some(limit) => tokio::time::timeout(limit, dial).await.map_err(|_| {
                Error::Connection(format!(
                    "dial {}:{} timed out after {:?}",
                    host, port, limit
                ))
            })??,
            None => dial.await?,
        };
        stream.set_nodelay(true)?;
        Ok(Transport::Tcp(TcpVariant::Plain(stream)))
    }

    /// Connect via Unix socket, optionally bounded by `timeout`
    pub async fn connect_unix(path: &Path, timeout: Option<Duration>) -> Result<Self> {
        let dial = UnixStream::connect(path);
        let stream = match timeout {
            Some(limit) => tokio::time::timeout(limit, dial).await.map_err(|_| {
                Error::Connection(format!(
                    "dial {} timed out after {:?}",
                    path.display(),
                    limit
                ))
            })??,
            None => dial.await?,
        };
        Ok(Transport::Unix(stream))
    }

    /// Write bytes to the transport
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        match self {
            Transport::Tcp(variant) => variant.write_all(buf).await?,
            Transport::Unix(stream) => stream.write_all(buf).await?,
        }
        Ok(())
    }

    /// Flush the transport
    pub async fn flush(&mut self) -> Result<()> {
        match self {
            Transport::Tcp(variant) => variant.flush().await?,
            Transport::Unix(stream) => stream.flush().await?,
        }
        Ok(())
    }

    /// Read bytes into buffer
    pub async fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let n = match self {
            Transport::Tcp(variant) => variant.read_buf(buf).await?,
            Transport::Unix(stream) => stream.read_buf(buf).await?,
        };
        Ok(n)
    }

    /// Upgrade a plain TCP transport to TLS after the SSL request.
    ///
    /// Consumes `self` and returns a new `Transport` with a TLS-encrypted stream.
    /// `server_name` is both sent as SNI and verified against the certificate.
    pub async fn upgrade_to_tls(
        self,
        client_config: Arc<ClientConfig>,
        server_name: ServerName<'static>,
    ) -> Result<Self> {
        match self {
            Transport::Tcp(TcpVariant::Plain(tcp_stream)) => {
                let tls_connector = tokio_rustls::TlsConnector::from(client_config);
                let tls_stream = tls_connector
                    .connect(server_name, tcp_stream)
                    .await
                    .map_err(|e| Error::Connection(format!("TLS handshake failed: {}", e)))?;

                Ok(Transport::Tcp(TcpVariant::Tls(tls_stream)))
            }
            Transport::Tcp(TcpVariant::Tls(_)) => Err(Error::Connection(
                "transport is already TLS-encrypted".into(),
            )),
            Transport::Unix(_) => Err(Error::Connection(
                "cannot upgrade Unix socket to TLS".into(),
            )),
        }
    }

    /// Whether traffic is encrypted
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tcp(TcpVariant::Tls(_)))
    }

    /// Negotiated TLS protocol version, if encrypted
    pub fn tls_version(&self) -> Option<rustls::ProtocolVersion> {
        match self {
            Transport::Tcp(variant) => variant.tls_version(),
            Transport::Unix(_) => None,
        }
    }

    /// Shutdown the transport
    pub async fn shutdown(&mut self) -> Result<()> {
        match self {
            Transport::Tcp(variant) => variant.shutdown().await?,
            Transport::Unix(stream) => stream.shutdown().await?,
        }
        Ok(())
    }
}
