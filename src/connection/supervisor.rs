//! Connection Supervisor
//!
//! A background task that keeps exactly one live pool available and
//! repairs it autonomously. On a fixed interval it checks liveness with a
//! PING round-trip; on failure it rebuilds the pool from the last-known
//! configuration and swaps it into the shared slot. A failed rebuild is
//! retried on the next tick, a bounded-rate, retry-forever policy.
//!
//! Operations in flight when a swap happens may fail; they are not retried
//! here. The supervisor is the only writer of the pool slot; data-path
//! callers clone the current `Arc` once per call.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::connection::ConnectionPool;
use crate::error::{StoreError, StoreResult};
use crate::protocol::Reply;

/// Connection health as observed by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HealthState {
    /// A live pool is installed.
    Connected = 0,
    /// The pool is gone or suspect; a rebuild is pending.
    ReconnectNeeded = 1,
    /// A rebuild is currently running.
    Reconnecting = 2,
    /// The store was shut down; terminal.
    Closed = 3,
}

impl HealthState {
    fn from_u8(raw: u8) -> HealthState {
        match raw {
            0 => HealthState::Connected,
            1 => HealthState::ReconnectNeeded,
            2 => HealthState::Reconnecting,
            _ => HealthState::Closed,
        }
    }
}

/// State shared between the facade and the supervision task.
pub(crate) struct Shared {
    pub(crate) config: StoreConfig,
    // Single writer (the supervisor); every operation reads it once.
    pool: RwLock<Option<Arc<ConnectionPool>>>,
    health: AtomicU8,
}

impl Shared {
    pub(crate) fn new(config: StoreConfig) -> Self {
        Shared {
            config,
            pool: RwLock::new(None),
            health: AtomicU8::new(HealthState::ReconnectNeeded as u8),
        }
    }

    pub(crate) fn health(&self) -> HealthState {
        HealthState::from_u8(self.health.load(Ordering::Acquire))
    }

    fn set_health(&self, state: HealthState) {
        self.health.store(state as u8, Ordering::Release);
    }

    /// Captures the current pool for one operation.
    pub(crate) fn current_pool(&self) -> StoreResult<Arc<ConnectionPool>> {
        if self.health() == HealthState::Closed {
            return Err(StoreError::Closed);
        }
        let slot = self
            .pool
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.clone().ok_or_else(|| {
            StoreError::Connection("no live connection pool".to_string())
        })
    }

    /// Marks the pool suspect after an operation-level I/O failure.
    pub(crate) fn flag_reconnect(&self) {
        let _ = self.health.compare_exchange(
            HealthState::Connected as u8,
            HealthState::ReconnectNeeded as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Builds a fresh pool and swaps it in. The old pool is dropped,
    /// closing its connections; it is never reused.
    pub(crate) async fn establish(&self) -> StoreResult<()> {
        if self.health() == HealthState::Closed {
            return Err(StoreError::Closed);
        }
        self.set_health(HealthState::Reconnecting);

        match ConnectionPool::connect(&self.config).await {
            Ok(pool) => {
                let mut slot = self
                    .pool
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                // `release` may have run while the dial was in flight;
                // the write lock serializes the two, so re-checking here
                // keeps `Closed` terminal.
                if self.health() == HealthState::Closed {
                    return Err(StoreError::Closed);
                }
                *slot = Some(Arc::new(pool));
                self.set_health(HealthState::Connected);
                drop(slot);
                info!(addr = %self.config.addr, "connection pool established");
                Ok(())
            }
            Err(err) => {
                self.set_health(HealthState::ReconnectNeeded);
                warn!(addr = %self.config.addr, error = %err, "connection attempt failed");
                Err(err)
            }
        }
    }

    /// PING round-trip; any error or non-PONG reply counts as failure.
    pub(crate) async fn check_liveness(&self) -> bool {
        let pool = match self.current_pool() {
            Ok(pool) => pool,
            Err(_) => return false,
        };
        let mut conn = match pool.acquire().await {
            Ok(conn) => conn,
            Err(_) => return false,
        };
        match conn.exec(&[b"PING"]).await {
            Ok(Reply::Simple(msg)) => msg == "PONG",
            _ => false,
        }
    }

    /// Drops the pool and moves to the terminal state. Takes the slot's
    /// write lock before flipping health so an `establish` that already
    /// dialed cannot swap a pool in afterwards.
    pub(crate) fn release(&self) {
        let mut slot = self
            .pool
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.set_health(HealthState::Closed);
        *slot = None;
    }
}

/// Handle to the running supervision task.
///
/// Dropping the handle stops the task and releases the pool.
pub(crate) struct Supervisor {
    shutdown_tx: watch::Sender<bool>,
}

impl Supervisor {
    /// Spawns the supervision loop for `shared`.
    pub(crate) fn start(shared: Arc<Shared>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(supervise(shared, shutdown_rx));
        debug!("connection supervisor started");
        Supervisor { shutdown_tx }
    }

    /// Signals the loop to terminate.
    pub(crate) fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn supervise(shared: Arc<Shared>, mut shutdown_rx: watch::Receiver<bool>) {
    let interval = shared.config.health_interval;

    loop {
        // Timer tick or shutdown, whichever fires first.
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }

        match shared.health() {
            HealthState::Closed => break,
            HealthState::Connected => {
                if !shared.check_liveness().await {
                    warn!("liveness check failed, rebuilding pool");
                    shared.flag_reconnect();
                    let _ = shared.establish().await;
                }
            }
            // ReconnectNeeded or a Reconnecting left over from an
            // interrupted attempt: try again this tick.
            _ => {
                let _ = shared.establish().await;
            }
        }
    }

    shared.release();
    debug!("connection supervisor stopped");
}
