//! Connection Pool
//!
//! A bounded pool of RESP connections. Admission is a semaphore sized to
//! `max_active`: up to that many exchanges run concurrently, further
//! callers queue inside the semaphore rather than failing fast.
//!
//! One connection is dialed eagerly at construction so that an unreachable
//! server fails `connect` instead of the first operation; the remaining
//! connections dial lazily on demand and are parked in an idle queue
//! between uses.
//!
//! The RAII guard returns a healthy connection to the idle queue on drop.
//! A connection whose exchange failed is dropped on the floor instead,
//! since after an I/O error or timeout the stream position is unknown.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::StoreConfig;
use crate::connection::Connection;
use crate::error::{StoreError, StoreResult};
use crate::protocol::Reply;

struct PoolInner {
    config: StoreConfig,
    idle: Mutex<VecDeque<Connection>>,
    permits: Arc<Semaphore>,
}

/// Bounded pool of connections to one server.
pub(crate) struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Builds a pool and validates reachability with one eager dial.
    pub(crate) async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let first = Connection::dial(config).await?;

        let mut idle = VecDeque::with_capacity(config.max_active);
        idle.push_back(first);

        Ok(ConnectionPool {
            inner: Arc::new(PoolInner {
                config: config.clone(),
                idle: Mutex::new(idle),
                permits: Arc::new(Semaphore::new(config.max_active)),
            }),
        })
    }

    /// Acquires a connection, queueing when all `max_active` are in use.
    pub(crate) async fn acquire(&self) -> StoreResult<PooledConn> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| StoreError::Closed)?;

        let idle = self.pop_idle();
        let conn = match idle {
            Some(conn) => conn,
            None => Connection::dial(&self.inner.config).await?,
        };

        Ok(PooledConn {
            inner: Arc::clone(&self.inner),
            conn: Some(conn),
            broken: false,
            _permit: permit,
        })
    }

    fn pop_idle(&self) -> Option<Connection> {
        let mut idle = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        idle.pop_front()
    }
}

/// RAII guard for one pooled connection.
pub(crate) struct PooledConn {
    inner: Arc<PoolInner>,
    conn: Option<Connection>,
    broken: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConn {
    /// Executes one command round-trip on this connection.
    pub(crate) async fn exec(&mut self, args: &[&[u8]]) -> StoreResult<Reply> {
        let timeout = self.inner.config.io_timeout();
        let conn = self.conn.as_mut().ok_or(StoreError::Closed)?;

        let result = conn.exec(args, timeout).await;
        if matches!(
            result,
            Err(StoreError::Io(_))
                | Err(StoreError::Timeout(_))
                | Err(StoreError::Protocol(_))
        ) {
            // Stream position unknown; never reuse this connection.
            self.broken = true;
        }
        result
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if self.broken {
            return;
        }
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => return,
        };
        let mut idle = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if idle.len() < self.inner.config.max_active {
            idle.push_back(conn);
        }
    }
}
