//! Connection Management Module
//!
//! Everything between the facade and the wire lives here:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Store (facade)                       │
//! └────────────┬─────────────────────────────────┬──────────────┘
//!              │ current_pool()                   │
//!              ▼                                  │
//! ┌────────────────────────┐          ┌──────────┴────────────┐
//! │     ConnectionPool     │◀─swap────│      Supervisor       │
//! │  (semaphore admission, │          │ (background task:     │
//! │   idle queue, RAII)    │          │  ping, re-establish)  │
//! └────────────┬───────────┘          └───────────────────────┘
//!              │ acquire()
//!              ▼
//! ┌────────────────────────┐
//! │       Connection       │  dial + AUTH/SELECT handshake,
//! │  (one RESP exchange    │  bounded by the configured timeout
//! │   at a time)           │
//! └────────────────────────┘
//! ```
//!
//! The pool is owned by a single shared slot; the supervisor is its only
//! writer and replaces it wholesale on reconnect. Data-path callers read
//! the slot once per operation, so a swap never leaves anyone holding a
//! half-updated pool; at worst their in-flight exchange fails and the
//! failure propagates.

pub mod conn;
pub mod pool;
pub mod supervisor;

pub(crate) use conn::Connection;
pub(crate) use pool::ConnectionPool;
pub(crate) use supervisor::{Shared, Supervisor};
pub use supervisor::HealthState;
