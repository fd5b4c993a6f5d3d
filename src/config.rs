//! Client Configuration
//!
//! [`StoreConfig`] collects everything the embedding application supplies at
//! startup: where the store lives, how to authenticate, how large the pool
//! may grow, and how the supervisor and marshaller should behave.
//!
//! Configuration is immutable once a pool has been built from it; the
//! supervisor reuses the same normalized config for every reconnect.

use std::time::Duration;

use crate::error::{StoreError, StoreResult};
use crate::marshal::MarshalMode;

/// Default server address, same as Redis.
pub const DEFAULT_ADDR: &str = "127.0.0.1:6379";

/// Default pool size.
pub const DEFAULT_MAX_ACTIVE: usize = 10;

/// Default I/O timeout for connect, read, and write.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default key delimiter.
pub const DEFAULT_DELIM: &str = "-";

/// Default interval between supervisor liveness checks.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Default cap on SCAN rounds before an enumeration is abandoned.
pub const DEFAULT_SCAN_ROUND_LIMIT: u32 = 10_000;

/// Network transport used to reach the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Stream-oriented TCP socket (the default).
    Tcp,
    /// Unix domain socket; `addr` is interpreted as a filesystem path.
    #[cfg(unix)]
    Unix,
}

impl Default for Transport {
    fn default() -> Self {
        Transport::Tcp
    }
}

/// Connection and behavior settings for a [`Store`](crate::Store).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Transport used to dial the server.
    pub transport: Transport,
    /// Server address, e.g. `127.0.0.1:6379`. Defaults when empty.
    pub addr: String,
    /// Password sent via AUTH on each new connection. None skips AUTH.
    pub password: Option<String>,
    /// Logical database selected via SELECT on each new connection.
    pub database: Option<u32>,
    /// Maximum concurrent in-flight connections. 0 means the default.
    pub max_active: usize,
    /// Timeout for connect, write, and read. Zero disables the timeout.
    pub timeout: Duration,
    /// Prefix prepended to every caller-supplied key.
    pub prefix: String,
    /// Delimiter available to callers composing keys. Defaults to `-`.
    pub delim: String,
    /// Interval between supervisor liveness checks.
    pub health_interval: Duration,
    /// Whether malformed hash fields error out or are silently skipped.
    pub marshal_mode: MarshalMode,
    /// Upper bound on SCAN iterations per enumeration.
    pub scan_round_limit: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            transport: Transport::default(),
            addr: DEFAULT_ADDR.to_string(),
            password: None,
            database: None,
            max_active: DEFAULT_MAX_ACTIVE,
            timeout: DEFAULT_TIMEOUT,
            prefix: String::new(),
            delim: DEFAULT_DELIM.to_string(),
            health_interval: DEFAULT_HEALTH_INTERVAL,
            marshal_mode: MarshalMode::Lenient,
            scan_round_limit: DEFAULT_SCAN_ROUND_LIMIT,
        }
    }
}

impl StoreConfig {
    /// Creates a config for the given address with everything else
    /// defaulted.
    pub fn new(addr: impl Into<String>) -> Self {
        StoreConfig {
            addr: addr.into(),
            ..StoreConfig::default()
        }
    }

    /// Returns a copy with unset fields filled in, or an error for values
    /// that cannot be repaired.
    pub fn normalized(&self) -> StoreResult<StoreConfig> {
        let mut config = self.clone();

        if config.addr.is_empty() {
            config.addr = DEFAULT_ADDR.to_string();
        }
        if config.max_active == 0 {
            config.max_active = DEFAULT_MAX_ACTIVE;
        }
        if config.delim.is_empty() {
            config.delim = DEFAULT_DELIM.to_string();
        }
        if config.scan_round_limit == 0 {
            config.scan_round_limit = DEFAULT_SCAN_ROUND_LIMIT;
        }
        if config.health_interval.is_zero() {
            return Err(StoreError::Config(
                "health_interval must be non-zero".to_string(),
            ));
        }

        Ok(config)
    }

    /// The effective round-trip timeout, or None when disabled.
    pub fn io_timeout(&self) -> Option<Duration> {
        if self.timeout.is_zero() {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Prepends the configured prefix to a caller-supplied key.
    pub fn prefixed(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}", self.prefix, key)
        }
    }

    /// Joins key parts with the configured delimiter.
    pub fn join_key(&self, parts: &[&str]) -> String {
        parts.join(&self.delim)
    }
}
