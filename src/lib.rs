//! # steadykv
//!
//! A resilient, self-healing client for Redis-compatible key-value
//! stores, built for long-lived services that must survive backend
//! outages without restarting.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                        Store                            │
//! │   get/set/delete · entities · enumeration · rankings    │
//! └──────────┬──────────────────┬──────────────┬────────────┘
//!            │                  │              │
//!    ┌───────▼───────┐  ┌───────▼──────┐  ┌────▼─────┐
//!    │  Supervisor   │  │  Marshaller  │  │   Scan   │
//!    │ health ticks, │  │  record <->  │  │ cursored │
//!    │ pool rebuild  │  │  string hash │  │ drains   │
//!    └───────┬───────┘  └──────────────┘  └──────────┘
//!            │
//!    ┌───────▼───────┐
//!    │     Pool      │──── RESP wire codec ───► server
//!    └───────────────┘
//! ```
//!
//! ## Features
//!
//! - **Self-healing connectivity**: a background supervision loop pings
//!   the pool on an interval and rebuilds it after failures; data calls
//!   fail fast during the outage window instead of hanging.
//! - **Pooled connections** with bounded concurrency; callers queue for
//!   a permit rather than opening unbounded sockets.
//! - **Typed entities**: declare a record once with [`impl_record!`] and
//!   round-trip it through a flat string hash.
//! - **Prefix enumeration** via cursor scans with a bounded round count.
//! - **Ordered-set rankings** whose read paths degrade to empty results
//!   instead of failing a caller that only renders a scoreboard.
//!
//! ## Quick start
//!
//! ```no_run
//! use steadykv::{Store, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> steadykv::StoreResult<()> {
//!     let config = StoreConfig::new("127.0.0.1:6379");
//!     let store = Store::open(config).await?;
//!
//!     store.set("greeting", "hello", Some(60)).await?;
//!     let value = store.get("greeting").await?;
//!     assert_eq!(value, "hello");
//!
//!     store.close();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod marshal;
pub mod protocol;
pub mod scan;
pub mod store;

pub use config::{StoreConfig, Transport};
pub use connection::HealthState;
pub use error::{StoreError, StoreResult};
pub use marshal::{FieldValue, Kind, MarshalError, MarshalMode, Record};
pub use protocol::{ProtocolError, Reply};
pub use scan::ScanPage;
pub use store::{Store, TtlState};

/// Crate version, from the package manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
