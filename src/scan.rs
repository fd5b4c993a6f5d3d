//! Key Enumerator
//!
//! Enumeration is built on the store's incremental SCAN primitive: each
//! round-trip returns a bounded batch of keys plus a continuation cursor,
//! with cursor 0 meaning both "start" and "done".
//!
//! ## Consistency contract
//!
//! SCAN is not a point-in-time snapshot. A key that exists for the entire
//! duration of the enumeration is returned at least once (possibly more
//! than once), but a key inserted or deleted mid-scan may or may not
//! appear. Callers that need exactness over a mutating keyspace must
//! arrange it at a higher layer.
//!
//! ## Termination
//!
//! A well-behaved server drives the cursor back to 0. Because a broken or
//! adversarial server could hand out cursors forever, the full drain is
//! capped at a configurable number of rounds and fails with
//! [`StoreError::ScanTimeout`] instead of looping indefinitely.

use crate::connection::ConnectionPool;
use crate::error::{StoreError, StoreResult};

/// One page of an externally-resumable enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    /// Keys returned by this round.
    pub keys: Vec<String>,
    /// Continuation cursor; 0 means the enumeration is complete.
    pub cursor: u64,
}

/// Drains the enumeration from `start`, returning all matching keys.
pub(crate) async fn scan_all(
    pool: &ConnectionPool,
    start: u64,
    pattern: &str,
    page_size: u32,
    round_limit: u32,
) -> StoreResult<Vec<String>> {
    let mut cursor = start;
    let mut keys = Vec::new();

    for _ in 0..round_limit {
        let page = scan_page(pool, cursor, pattern, page_size).await?;
        keys.extend(page.keys);
        cursor = page.cursor;
        if cursor == 0 {
            return Ok(keys);
        }
    }

    Err(StoreError::ScanTimeout {
        rounds: round_limit,
    })
}

/// Issues a single SCAN round and surfaces the continuation cursor.
pub(crate) async fn scan_page(
    pool: &ConnectionPool,
    cursor: u64,
    pattern: &str,
    page_size: u32,
) -> StoreResult<ScanPage> {
    let cursor_arg = cursor.to_string();
    let count_arg = page_size.to_string();

    let mut conn = pool.acquire().await?;
    let reply = conn
        .exec(&[
            b"SCAN",
            cursor_arg.as_bytes(),
            b"MATCH",
            pattern.as_bytes(),
            b"COUNT",
            count_arg.as_bytes(),
        ])
        .await?;

    let (cursor, keys) = reply
        .into_scan()
        .ok_or(StoreError::UnexpectedReply { command: "SCAN" })?;

    Ok(ScanPage { keys, cursor })
}
