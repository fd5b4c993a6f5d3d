//! Error Taxonomy
//!
//! All failures surfaced by the facade are variants of [`StoreError`].
//! The taxonomy distinguishes four situations a caller must handle
//! differently:
//!
//! - **Connectivity** (`Connection`): the pool could not be established.
//!   The supervisor keeps retrying in the background; callers decide
//!   whether this is fatal at startup.
//! - **Operation failure** (`Io`, `Timeout`, `Server`, `Protocol`,
//!   `UnexpectedReply`): a single round-trip failed. Never retried
//!   automatically; the caller owns the retry decision.
//! - **Expected outcomes** (`NotFound`, `NoTtl`): the store answered, the
//!   answer just wasn't what the caller hoped for.
//! - **Local failures** (`Config`, `Marshal`, `ScanTimeout`, `Closed`):
//!   nothing was wrong with the store itself.

use std::time::Duration;

use thiserror::Error;

use crate::marshal::MarshalError;
use crate::protocol::ProtocolError;

/// Result type used throughout the crate.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by [`Store`](crate::Store) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The configuration was rejected at construction time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Establishing the connection pool failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Network or I/O failure during a round-trip.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The round-trip did not complete within the configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The server replied with an error.
    #[error("server error: {0}")]
    Server(String),

    /// RESP framing could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The reply type did not match what the command expects.
    #[error("unexpected reply for {command}")]
    UnexpectedReply { command: &'static str },

    /// The key (or hash field) does not exist.
    #[error("key not found: {0}")]
    NotFound(String),

    /// An expiration refresh was refused. The underlying EXPIRE reply
    /// cannot distinguish "key exists without a ttl" from "key absent";
    /// callers that need the distinction should check `exists` first.
    #[error("key '{0}' was stored without a ttl")]
    NoTtl(String),

    /// Record marshalling failed.
    #[error(transparent)]
    Marshal(#[from] MarshalError),

    /// An enumeration did not reach cursor 0 within the round budget.
    #[error("scan did not terminate within {rounds} rounds")]
    ScanTimeout { rounds: u32 },

    /// The store has been shut down and its pool released.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// True for the recoverable "key absent" outcome, as opposed to a
    /// transport or server failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
