//! Opening connections to an [`Endpoint`].
//!
//! [`EndpointConnector`] hides the addressing mode: plain TCP, TLS over TCP (rustls with
//! the webpki root store) or a Unix domain socket. It hands out raw byte streams, used
//! directly for WebSocket upgrades, and HTTP/1.1 connections for the pool.

use super::pool::{Connect, PooledConnection};
use crate::error::{Result, TransportError};
use crate::types::{Endpoint, Scheme};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::http1::{self, SendRequest};
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

/// A bidirectional byte stream to the endpoint.
pub trait Io: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Io for T {}

/// Opens streams and HTTP connections to one endpoint.
#[derive(Clone)]
pub struct EndpointConnector {
    endpoint: Endpoint,
    tls: Option<TlsConnector>,
    connect_timeout: Duration,
}

impl std::fmt::Debug for EndpointConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConnector")
            .field("endpoint", &self.endpoint)
            .field("tls", &self.tls.is_some())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl EndpointConnector {
    /// Connector for `endpoint`. HTTPS endpoints get a rustls client trusting the
    /// webpki roots.
    pub fn new(endpoint: Endpoint, connect_timeout: Duration) -> Self {
        let tls = (endpoint.scheme() == Scheme::Https).then(|| {
            let mut roots = rustls::RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            let config = rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth();
            TlsConnector::from(Arc::new(config))
        });
        Self {
            endpoint,
            tls,
            connect_timeout,
        }
    }

    /// Use a custom rustls configuration (private CA, client certificates).
    pub fn with_tls_config(mut self, config: Arc<rustls::ClientConfig>) -> Self {
        self.tls = Some(TlsConnector::from(config));
        self
    }

    /// Target endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Open a raw stream, bounded by the connect timeout.
    pub async fn open_stream(&self) -> Result<Box<dyn Io>> {
        match tokio::time::timeout(self.connect_timeout, self.open_stream_inner()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Unreachable(format!(
                "connecting to {} timed out after {:?}",
                self.endpoint, self.connect_timeout
            ))
            .into()),
        }
    }

    async fn open_stream_inner(&self) -> Result<Box<dyn Io>> {
        let unreachable =
            |err: std::io::Error| TransportError::Unreachable(format!("{}: {}", self.endpoint, err));

        match &self.endpoint {
            Endpoint::Tcp { host, port, .. } => {
                let tcp = TcpStream::connect((host.as_str(), *port))
                    .await
                    .map_err(unreachable)?;
                let _ = tcp.set_nodelay(true);
                match &self.tls {
                    Some(tls) => {
                        let server_name = ServerName::try_from(host.clone()).map_err(|err| {
                            TransportError::Unreachable(format!("invalid TLS server name '{}': {}", host, err))
                        })?;
                        let stream = tls.connect(server_name, tcp).await.map_err(unreachable)?;
                        Ok(Box::new(stream))
                    }
                    None => Ok(Box::new(tcp)),
                }
            }
            #[cfg(unix)]
            Endpoint::Unix { path } => {
                let stream = tokio::net::UnixStream::connect(path)
                    .await
                    .map_err(unreachable)?;
                Ok(Box::new(stream))
            }
            #[cfg(not(unix))]
            Endpoint::Unix { .. } => Err(TransportError::Unreachable(
                "unix domain sockets are not supported on this platform".into(),
            )
            .into()),
        }
    }
}

#[async_trait]
impl Connect for EndpointConnector {
    type Connection = HttpConnection;

    async fn connect(&self) -> Result<HttpConnection> {
        let stream = self.open_stream().await?;
        let (sender, connection) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|err| TransportError::Unreachable(format!("HTTP handshake failed: {}", err)))?;

        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::debug!(%endpoint, error = %err, "HTTP connection closed with error");
            }
        });

        tracing::debug!(endpoint = %self.endpoint, "opened HTTP connection");
        Ok(HttpConnection { sender })
    }
}

/// One HTTP/1.1 connection, driven by a background task.
#[derive(Debug)]
pub struct HttpConnection {
    sender: SendRequest<Full<Bytes>>,
}

impl HttpConnection {
    /// Wait until the connection can take a request. Fails once the peer has closed it.
    pub async fn ready(&mut self) -> Result<()> {
        self.sender
            .ready()
            .await
            .map_err(|err| TransportError::Unreachable(err.to_string()).into())
    }

    /// Send one request and wait for the response head.
    pub async fn send(&mut self, request: Request<Full<Bytes>>) -> Result<Response<Incoming>> {
        self.ready().await?;
        Ok(self
            .sender
            .send_request(request)
            .await
            .map_err(|err| TransportError::Unreachable(err.to_string()))?)
    }
}

impl PooledConnection for HttpConnection {
    fn is_reusable(&self) -> bool {
        !self.sender.is_closed()
    }
}
