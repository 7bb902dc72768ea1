//! HTTP/1.1 transport over a bounded connection pool.

use super::connector::{EndpointConnector, HttpConnection};
use super::pool::{ConnectionPool, Lease, PoolStats};
use super::{ByteStream, Transport};
use crate::error::{BodySnapshot, Result, TransportError, WebstackError};
use crate::types::Endpoint;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderValue, HOST};
use http::uri::{PathAndQuery, Uri};
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use std::sync::Arc;
use std::time::Duration;

/// [`Transport`] speaking HTTP/1.1 to one endpoint.
///
/// Every call leases a connection for its whole duration. A connection goes back to
/// the idle list only once its response body has been read to the end; a call that
/// fails or times out midway drops its connection.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    pool: Arc<ConnectionPool<EndpointConnector>>,
    host: HeaderValue,
}

impl HttpTransport {
    /// Transport with a pool of `pool_size` connections.
    pub fn new(endpoint: Endpoint, pool_size: usize, connect_timeout: Duration) -> Result<Self> {
        Self::with_connector(EndpointConnector::new(endpoint, connect_timeout), pool_size)
    }

    /// Transport over an existing connector.
    pub fn with_connector(connector: EndpointConnector, pool_size: usize) -> Result<Self> {
        let host = HeaderValue::from_str(&connector.endpoint().authority())
            .map_err(|err| WebstackError::Config(format!("invalid host: {}", err)))?;
        Ok(Self {
            pool: ConnectionPool::new(connector, pool_size)?,
            host,
        })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Arc<ConnectionPool<EndpointConnector>> {
        &self.pool
    }

    /// The endpoint requests go to.
    pub fn endpoint(&self) -> &Endpoint {
        self.pool.connector().endpoint()
    }

    /// Rewrite the request into origin form with a `Host` header.
    fn prepare(&self, request: Request<Bytes>) -> Result<Request<Full<Bytes>>> {
        let (mut parts, body) = request.into_parts();
        let path = parts
            .uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        parts.uri = Uri::from(path);
        if !parts.headers.contains_key(HOST) {
            parts.headers.insert(HOST, self.host.clone());
        }
        Ok(Request::from_parts(parts, Full::new(body)))
    }

    async fn send(
        &self,
        request: Request<Bytes>,
    ) -> Result<(Lease<EndpointConnector>, Response<Incoming>)> {
        let request = self.prepare(request)?;
        let mut lease = self.pool.lease().await?;
        if let Err(err) = lease.ready().await {
            if !lease.is_reused() {
                return Err(err);
            }
            // closed by the server while idle; nothing was sent on it
            tracing::debug!(error = %err, "idle connection is gone, opening a new one");
            drop(lease);
            lease = self.pool.lease_new().await?;
        }
        let response = HttpConnection::send(&mut lease, request).await?;
        Ok((lease, response))
    }

    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let (mut lease, response) = self.send(request).await?;
        let (parts, body) = response.into_parts();
        let bytes = read_body(body).await?;
        lease.mark_reusable();

        if !parts.status.is_success() {
            return Err(TransportError::ServerError {
                status: parts.status.as_u16(),
                body: BodySnapshot::new(bytes),
            }
            .into());
        }
        Ok(Response::from_parts(parts, bytes))
    }
}

async fn read_body(body: Incoming) -> Result<Bytes> {
    Ok(body
        .collect()
        .await
        .map_err(|err| TransportError::Unreachable(format!("reading response body: {}", err)))?
        .to_bytes())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request<Bytes>, timeout: Duration) -> Result<Response<Bytes>> {
        let method = request.method().clone();
        let uri = request.uri().clone();
        tracing::trace!(%method, %uri, "sending request");

        match tokio::time::timeout(timeout, self.round_trip(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(%method, %uri, ?timeout, "request timed out");
                Err(TransportError::Timeout(timeout).into())
            }
        }
    }

    async fn execute_streaming(
        &self,
        request: Request<Bytes>,
        timeout: Duration,
    ) -> Result<ByteStream> {
        let (mut lease, response) = match tokio::time::timeout(timeout, self.send(request)).await {
            Ok(result) => result?,
            Err(_) => return Err(TransportError::Timeout(timeout).into()),
        };

        let (parts, body) = response.into_parts();
        if !parts.status.is_success() {
            let bytes = read_body(body).await?;
            lease.mark_reusable();
            return Err(TransportError::ServerError {
                status: parts.status.as_u16(),
                body: BodySnapshot::new(bytes),
            }
            .into());
        }

        let stream = futures::stream::try_unfold((body, lease), |(mut body, mut lease)| async move {
            loop {
                match body.frame().await {
                    None => {
                        lease.mark_reusable();
                        return Ok(None);
                    }
                    Some(Err(err)) => {
                        return Err(WebstackError::from(TransportError::Unreachable(format!(
                            "reading response body: {}",
                            err
                        ))))
                    }
                    Some(Ok(frame)) => {
                        if let Ok(data) = frame.into_data() {
                            if !data.is_empty() {
                                return Ok(Some((data, (body, lease))));
                            }
                        }
                    }
                }
            }
        });
        Ok(Box::pin(stream))
    }

    fn pool_stats(&self) -> Option<PoolStats> {
        Some(self.pool.stats())
    }
}
