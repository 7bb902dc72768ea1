//! Request transport.
//!
//! - [`Transport`] - the seam the client sends requests through
//! - [`HttpTransport`] - HTTP/1.1 over TCP, TLS or a Unix socket, using a [`ConnectionPool`]
//! - [`EndpointConnector`] - opens raw streams and HTTP connections to an endpoint

mod connector;
mod http;
mod pool;

pub use self::connector::{EndpointConnector, HttpConnection, Io};
pub use self::http::HttpTransport;
pub use self::pool::{Connect, ConnectionPool, Lease, PoolStats, PooledConnection};

use crate::error::Result;
use ::http::{Request, Response};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::time::Duration;

/// A lazily consumed response body.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Executes HTTP requests against one endpoint.
///
/// Implementations report non-2xx responses as
/// [`TransportError::ServerError`](crate::TransportError::ServerError) and never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and read the whole response, all within `timeout`.
    async fn execute(&self, request: Request<Bytes>, timeout: Duration) -> Result<Response<Bytes>>;

    /// Send a request and stream the response body. `timeout` bounds the wait for the
    /// response head; the body is read as the caller pulls it.
    async fn execute_streaming(&self, request: Request<Bytes>, timeout: Duration)
        -> Result<ByteStream>;

    /// Pool counters, for transports that pool connections.
    fn pool_stats(&self) -> Option<PoolStats> {
        None
    }
}
