//! A bounded pool of reusable connections.
//!
//! The pool owns at most `size` live connections. Capacity is a [`Semaphore`] with
//! `size` permits; a [`Lease`] holds one permit for as long as it lives, so no more than
//! `size` connections are ever leased at once and excess callers wait for a release.
//! Idle connections sit in a mutex-protected list and are reused before new ones are
//! opened.

use crate::error::{Result, TransportError, WebstackError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A connection the pool can hand out again.
pub trait PooledConnection: Send + 'static {
    /// Whether the connection can carry another request.
    fn is_reusable(&self) -> bool;
}

/// Produces new connections for a pool.
#[async_trait]
pub trait Connect: Send + Sync + 'static {
    /// Connection type produced.
    type Connection: PooledConnection;

    /// Open a new connection.
    async fn connect(&self) -> Result<Self::Connection>;
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Configured maximum.
    pub size: usize,
    /// Connections currently leased.
    pub leased: usize,
    /// Connections waiting in the idle list.
    pub idle: usize,
    /// Highest number of simultaneous leases observed.
    pub peak_leased: usize,
}

/// Bounded connection pool. See the [module docs](self).
pub struct ConnectionPool<C: Connect> {
    connector: C,
    idle: Mutex<Vec<C::Connection>>,
    permits: Arc<Semaphore>,
    size: usize,
    leased: AtomicUsize,
    peak_leased: AtomicUsize,
}

impl<C: Connect> fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        write!(
            f,
            "ConnectionPool[size: {}, leased: {}, idle: {}, available: {}]",
            stats.size,
            stats.leased,
            stats.idle,
            self.permits.available_permits(),
        )
    }
}

impl<C: Connect> ConnectionPool<C> {
    /// Create a pool of at most `size` connections. `size` must be positive.
    pub fn new(connector: C, size: usize) -> Result<Arc<Self>> {
        if size == 0 {
            return Err(WebstackError::Config(
                "connection pool size must be at least 1".into(),
            ));
        }
        Ok(Arc::new(Self {
            connector,
            idle: Mutex::new(Vec::with_capacity(size)),
            permits: Arc::new(Semaphore::new(size)),
            size,
            leased: AtomicUsize::new(0),
            peak_leased: AtomicUsize::new(0),
        }))
    }

    /// The connector new connections come from.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Lease a connection, waiting while all `size` are in use.
    ///
    /// An idle connection is reused when one is still usable; otherwise a new one is
    /// opened. Connect failures release the slot again.
    pub async fn lease(self: &Arc<Self>) -> Result<Lease<C>> {
        self.acquire(true).await
    }

    /// Lease a newly opened connection, leaving the idle list untouched.
    ///
    /// For replacing an idle connection that turned out to be dead.
    pub async fn lease_new(self: &Arc<Self>) -> Result<Lease<C>> {
        self.acquire(false).await
    }

    async fn acquire(self: &Arc<Self>, reuse_idle: bool) -> Result<Lease<C>> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Unreachable("connection pool is shut down".into()))?;

        let reused = if reuse_idle {
            let mut idle = self.idle.lock();
            let mut found = None;
            while let Some(conn) = idle.pop() {
                if conn.is_reusable() {
                    found = Some(conn);
                    break;
                }
            }
            found
        } else {
            None
        };

        let (conn, reused) = match reused {
            Some(conn) => (conn, true),
            None => (self.connector.connect().await?, false),
        };

        let now = self.leased.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_leased.fetch_max(now, Ordering::SeqCst);

        Ok(Lease {
            conn: Some(conn),
            reusable: false,
            reused,
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    /// Current counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.size,
            leased: self.leased.load(Ordering::SeqCst),
            idle: self.idle.lock().len(),
            peak_leased: self.peak_leased.load(Ordering::SeqCst),
        }
    }

    /// Drop every idle connection.
    pub fn clear_idle(&self) {
        self.idle.lock().clear();
    }
}

/// A leased connection. Dropping it hands the slot back to the pool.
///
/// The connection itself only returns to the idle list if the holder called
/// [`mark_reusable`](Lease::mark_reusable), i.e. the exchange finished cleanly;
/// otherwise it is discarded.
pub struct Lease<C: Connect> {
    conn: Option<C::Connection>,
    reusable: bool,
    reused: bool,
    pool: Arc<ConnectionPool<C>>,
    // released after Drop::drop has returned the connection
    _permit: OwnedSemaphorePermit,
}

impl<C: Connect> Lease<C> {
    /// Allow the connection to be reused once the lease is dropped.
    pub fn mark_reusable(&mut self) {
        self.reusable = true;
    }

    /// Whether the connection came from the idle list rather than a fresh connect.
    pub fn is_reused(&self) -> bool {
        self.reused
    }
}

impl<C: Connect> Deref for Lease<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .unwrap_or_else(|| unreachable!("connection is present until drop"))
    }
}

impl<C: Connect> DerefMut for Lease<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .unwrap_or_else(|| unreachable!("connection is present until drop"))
    }
}

impl<C: Connect> Drop for Lease<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.reusable && conn.is_reusable() {
                self.pool.idle.lock().push(conn);
            } else {
                tracing::debug!("discarding pooled connection");
            }
        }
        self.pool.leased.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct CountingConnector {
        opened: AtomicUsize,
    }

    struct FakeConnection {
        id: usize,
        healthy: bool,
    }

    impl PooledConnection for FakeConnection {
        fn is_reusable(&self) -> bool {
            self.healthy
        }
    }

    #[async_trait]
    impl Connect for CountingConnector {
        type Connection = FakeConnection;

        async fn connect(&self) -> Result<FakeConnection> {
            let id = self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakeConnection { id, healthy: true })
        }
    }

    fn pool(size: usize) -> Arc<ConnectionPool<CountingConnector>> {
        ConnectionPool::new(
            CountingConnector {
                opened: AtomicUsize::new(0),
            },
            size,
        )
        .unwrap()
    }

    #[test]
    fn test_zero_size_rejected() {
        let result = ConnectionPool::new(
            CountingConnector {
                opened: AtomicUsize::new(0),
            },
            0,
        );
        assert!(matches!(result, Err(WebstackError::Config(_))));
    }

    #[tokio::test]
    async fn test_reuses_connection_marked_reusable() {
        let pool = pool(2);
        {
            let mut lease = pool.lease().await.unwrap();
            assert_eq!(lease.id, 0);
            lease.mark_reusable();
        }
        let lease = pool.lease().await.unwrap();
        assert_eq!(lease.id, 0);
        assert_eq!(pool.connector().opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_discards_unmarked_and_broken_connections() {
        let pool = pool(2);
        drop(pool.lease().await.unwrap());
        assert_eq!(pool.stats().idle, 0);

        {
            let mut lease = pool.lease().await.unwrap();
            lease.healthy = false;
            lease.mark_reusable();
        }
        assert_eq!(pool.stats().idle, 0);
        assert_eq!(pool.connector().opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lease_new_bypasses_idle_list() {
        let pool = pool(2);
        {
            let mut lease = pool.lease().await.unwrap();
            assert!(!lease.is_reused());
            lease.mark_reusable();
        }
        assert_eq!(pool.stats().idle, 1);

        let fresh = pool.lease_new().await.unwrap();
        assert_eq!(fresh.id, 1);
        assert!(!fresh.is_reused());
        assert_eq!(pool.stats().idle, 1);

        let idle = pool.lease().await.unwrap();
        assert_eq!(idle.id, 0);
        assert!(idle.is_reused());
        assert_eq!(pool.stats().peak_leased, 2);
    }

    #[tokio::test]
    async fn test_excess_callers_wait_for_release() {
        let pool = pool(1);
        let first = pool.lease().await.unwrap();

        let waiting = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.lease().await.map(|lease| lease.id) })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());
        assert_eq!(pool.stats().leased, 1);

        drop(first);
        let id = tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(pool.stats().peak_leased, 1);
    }
}
