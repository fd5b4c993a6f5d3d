//! Store Facade
//!
//! [`Store`] is the public surface of the crate. It composes the three
//! underlying capabilities:
//!
//! - the connection supervisor, which owns the pool and self-heals it
//! - the entity marshaller, for structured reads and writes
//! - the key enumerator, for bulk operations across a prefix
//!
//! One `Store` is constructed at startup and lives for the process; all
//! tasks share it by reference. Every data operation is a single
//! round-trip through the current pool and fails fast during an outage
//! window; the supervisor repairs connectivity in the background.
//!
//! ## Error policy
//!
//! Write paths and point reads fail loud: any transport or server failure
//! surfaces as a [`StoreError`]. The ordered-set *read* paths instead
//! degrade to a zero value or empty collection on failure (logged via
//! `tracing`), so a scoreboard render never takes a page down.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::connection::{HealthState, Shared, Supervisor};
use crate::error::{StoreError, StoreResult};
use crate::marshal::{
    assign_one, capture_one, from_hash, to_hash, Hash, MarshalError, Record,
};
use crate::protocol::Reply;
use crate::scan::{self, ScanPage};

/// Remaining time-to-live of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlState {
    /// The key does not exist (or already expired).
    Missing,
    /// The key exists but carries no expiration.
    NoExpiry,
    /// The key expires after this many seconds.
    ExpiresIn(u64),
}

/// Resilient client facade over the backing key-value store.
///
/// Construct once with [`Store::open`] (connection failure is fatal) or
/// [`Store::open_lazy`] (the supervisor establishes in the background),
/// then share freely across tasks.
pub struct Store {
    shared: Arc<Shared>,
    supervisor: Supervisor,
}

impl Store {
    /// Opens a store and eagerly establishes the connection pool.
    ///
    /// A dial failure is returned to the caller; use [`Store::open_lazy`]
    /// to treat startup unreachability as a transient condition instead.
    pub async fn open(config: StoreConfig) -> StoreResult<Store> {
        let store = Store::open_lazy(config)?;
        store.shared.establish().await?;
        Ok(store)
    }

    /// Opens a store without dialing. Health starts at
    /// [`HealthState::ReconnectNeeded`]; the supervision loop establishes
    /// the pool on its first tick and keeps retrying after failures.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open_lazy(config: StoreConfig) -> StoreResult<Store> {
        let config = config.normalized()?;
        let shared = Arc::new(Shared::new(config));
        let supervisor = Supervisor::start(Arc::clone(&shared));
        Ok(Store { shared, supervisor })
    }

    /// Current connection health.
    pub fn health(&self) -> HealthState {
        self.shared.health()
    }

    /// The normalized configuration this store runs with.
    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// Stops the supervision loop and releases the pool.
    pub fn close(self) {
        self.supervisor.stop();
        self.shared.release();
    }

    /// PING round-trip. True on a PONG reply.
    pub async fn ping(&self) -> StoreResult<bool> {
        let reply = self.round_trip(&[b"PING"]).await?;
        Ok(reply.as_str() == Some("PONG"))
    }

    // ------------------------------------------------------------------
    // Basic operations (keys are prefixed with `config.prefix`)
    // ------------------------------------------------------------------

    /// Fetches a value as text. [`StoreError::NotFound`] when absent.
    pub async fn get(&self, key: &str) -> StoreResult<String> {
        let full = self.shared.config.prefixed(key);
        let reply = self.round_trip(&[b"GET", full.as_bytes()]).await?;
        match reply {
            Reply::Bulk(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            Reply::Null => Err(StoreError::NotFound(key.to_string())),
            _ => Err(StoreError::UnexpectedReply { command: "GET" }),
        }
    }

    /// Fetches a value as raw bytes. [`StoreError::NotFound`] when absent.
    pub async fn get_bytes(&self, key: &str) -> StoreResult<Vec<u8>> {
        let full = self.shared.config.prefixed(key);
        let reply = self.round_trip(&[b"GET", full.as_bytes()]).await?;
        match reply {
            Reply::Bulk(data) => Ok(data.to_vec()),
            Reply::Null => Err(StoreError::NotFound(key.to_string())),
            _ => Err(StoreError::UnexpectedReply { command: "GET" }),
        }
    }

    /// Stores a value, optionally with an expiration in seconds.
    pub async fn set(
        &self,
        key: &str,
        value: impl AsRef<[u8]>,
        expire_seconds: Option<u64>,
    ) -> StoreResult<()> {
        let full = self.shared.config.prefixed(key);
        match expire_seconds {
            Some(seconds) if seconds > 0 => {
                let seconds = seconds.to_string();
                self.round_trip(&[
                    b"SETEX",
                    full.as_bytes(),
                    seconds.as_bytes(),
                    value.as_ref(),
                ])
                .await?;
            }
            _ => {
                self.round_trip(&[b"SET", full.as_bytes(), value.as_ref()])
                    .await?;
            }
        }
        Ok(())
    }

    /// Deletes a key. Deleting an absent key is not an error.
    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        let full = self.shared.config.prefixed(key);
        self.round_trip(&[b"DEL", full.as_bytes()]).await?;
        Ok(())
    }

    /// Increments a counter key, returning the new value.
    pub async fn incr(&self, key: &str) -> StoreResult<i64> {
        let full = self.shared.config.prefixed(key);
        let reply = self.round_trip(&[b"INCR", full.as_bytes()]).await?;
        reply
            .as_integer()
            .ok_or(StoreError::UnexpectedReply { command: "INCR" })
    }

    /// True when the key exists.
    pub async fn exists(&self, key: &str) -> StoreResult<bool> {
        let full = self.shared.config.prefixed(key);
        self.exists_raw(&full).await
    }

    /// Queries the remaining time-to-live of a key.
    pub async fn ttl(&self, key: &str) -> StoreResult<TtlState> {
        let full = self.shared.config.prefixed(key);
        let reply = self.round_trip(&[b"TTL", full.as_bytes()]).await?;
        match reply.as_integer() {
            Some(-2) => Ok(TtlState::Missing),
            Some(-1) => Ok(TtlState::NoExpiry),
            Some(seconds) if seconds >= 0 => {
                Ok(TtlState::ExpiresIn(seconds as u64))
            }
            _ => Err(StoreError::UnexpectedReply { command: "TTL" }),
        }
    }

    // ------------------------------------------------------------------
    // TTL refresh
    // ------------------------------------------------------------------

    /// Refreshes the expiration of a key.
    ///
    /// A `0` reply from the refresh command means the key either exists
    /// without a ttl or does not exist at all; the protocol cannot tell
    /// the two apart, so both surface as [`StoreError::NoTtl`]. Callers
    /// that need the distinction should call [`Store::exists`] first.
    pub async fn update_ttl(&self, key: &str, seconds: u64) -> StoreResult<()> {
        let full = self.shared.config.prefixed(key);
        self.update_ttl_raw(&full, key, seconds).await
    }

    /// Refreshes the expiration of every key starting with `prefix`,
    /// aborting on the first failure.
    pub async fn update_ttl_many(
        &self,
        prefix: &str,
        seconds: u64,
    ) -> StoreResult<()> {
        let keys = self.scan_keys(prefix, SCAN_DEFAULT_PAGE).await?;
        for key in &keys {
            // Enumerated keys are already fully prefixed.
            self.update_ttl_raw(key, key, seconds).await?;
        }
        Ok(())
    }

    async fn update_ttl_raw(
        &self,
        full_key: &str,
        display_key: &str,
        seconds: u64,
    ) -> StoreResult<()> {
        let seconds = seconds.to_string();
        let reply = self
            .round_trip(&[b"EXPIRE", full_key.as_bytes(), seconds.as_bytes()])
            .await?;
        match reply.as_integer() {
            Some(1) => Ok(()),
            Some(0) => Err(StoreError::NoTtl(display_key.to_string())),
            _ => Err(StoreError::UnexpectedReply { command: "EXPIRE" }),
        }
    }

    // ------------------------------------------------------------------
    // Enumeration and bulk maintenance
    // ------------------------------------------------------------------

    /// Returns every key starting with `prefix` (on top of the configured
    /// key prefix). See the [`scan`](crate::scan) module for the weak
    /// consistency contract; the result is a full drain bounded by the
    /// configured round limit.
    pub async fn scan_keys(
        &self,
        prefix: &str,
        page_size: u32,
    ) -> StoreResult<Vec<String>> {
        let pattern = self.scan_pattern(prefix);
        let pool = self.shared.current_pool()?;
        scan::scan_all(
            &pool,
            0,
            &pattern,
            page_size,
            self.shared.config.scan_round_limit,
        )
        .await
    }

    /// One enumeration round, surfacing the continuation cursor for
    /// resumable pagination across separate calls. Start at cursor 0; a
    /// returned cursor of 0 means the enumeration is complete.
    pub async fn scan_page(
        &self,
        cursor: u64,
        prefix: &str,
        page_size: u32,
    ) -> StoreResult<ScanPage> {
        let pattern = self.scan_pattern(prefix);
        let pool = self.shared.current_pool()?;
        scan::scan_page(&pool, cursor, &pattern, page_size).await
    }

    /// Deletes every key starting with `prefix`, returning how many were
    /// removed. Not atomic: a concurrent writer can reintroduce a key
    /// between enumeration and deletion. Individual delete failures are
    /// logged and skipped.
    pub async fn delete_prefix(&self, prefix: &str) -> StoreResult<usize> {
        let keys = self.scan_keys(prefix, SCAN_DEFAULT_PAGE).await?;
        let mut deleted = 0;
        for key in &keys {
            match self.round_trip(&[b"DEL", key.as_bytes()]).await {
                Ok(_) => deleted += 1,
                Err(err) => {
                    warn!(key = %key, error = %err, "delete_prefix: delete failed");
                }
            }
        }
        Ok(deleted)
    }

    fn scan_pattern(&self, prefix: &str) -> String {
        format!("{}{}*", self.shared.config.prefix, prefix)
    }

    // ------------------------------------------------------------------
    // Entity operations (hash representation; keys are not prefixed)
    // ------------------------------------------------------------------

    /// Persists every declared field of `record` under `key` as a hash.
    pub async fn save_entity<R: Record>(
        &self,
        key: &str,
        record: &R,
    ) -> StoreResult<()> {
        let hash = to_hash(record);
        if hash.is_empty() {
            return Ok(());
        }

        let mut args: Vec<Vec<u8>> = Vec::with_capacity(2 + hash.len() * 2);
        args.push(b"HSET".to_vec());
        args.push(key.as_bytes().to_vec());
        for (field, value) in &hash {
            args.push(field.as_bytes().to_vec());
            args.push(value.as_bytes().to_vec());
        }

        let borrowed: Vec<&[u8]> = args.iter().map(|a| a.as_slice()).collect();
        self.round_trip(&borrowed).await?;
        Ok(())
    }

    /// Loads the hash stored under `key` into `record`.
    ///
    /// Returns [`StoreError::NotFound`] when the key is absent, leaving
    /// `record` untouched. Malformed values follow the configured
    /// marshal mode.
    pub async fn load_entity<R: Record>(
        &self,
        key: &str,
        record: &mut R,
    ) -> StoreResult<()> {
        if !self.exists_raw(key).await? {
            return Err(StoreError::NotFound(key.to_string()));
        }

        let reply = self.round_trip(&[b"HGETALL", key.as_bytes()]).await?;
        let hash = reply_to_hash(reply)
            .ok_or(StoreError::UnexpectedReply { command: "HGETALL" })?;

        from_hash(record, &hash, self.shared.config.marshal_mode)?;
        Ok(())
    }

    /// Reads a single hash field into the matching field of `record`.
    ///
    /// A missing hash field leaves the record field at its current value.
    pub async fn get_field<R: Record>(
        &self,
        key: &str,
        record: &mut R,
        field: &str,
    ) -> StoreResult<()> {
        if !R::descriptor().iter().any(|d| d.name == field) {
            return Err(MarshalError::UnknownField(field.to_string()).into());
        }
        if !self.exists_raw(key).await? {
            return Err(StoreError::NotFound(key.to_string()));
        }

        let reply = self
            .round_trip(&[b"HGET", key.as_bytes(), field.as_bytes()])
            .await?;
        match reply {
            Reply::Null => Ok(()),
            Reply::Bulk(data) => {
                let raw = String::from_utf8_lossy(&data);
                assign_one(record, field, &raw, self.shared.config.marshal_mode)?;
                Ok(())
            }
            _ => Err(StoreError::UnexpectedReply { command: "HGET" }),
        }
    }

    /// Writes a single field of `record` into the hash stored at `key`.
    pub async fn set_field<R: Record>(
        &self,
        key: &str,
        record: &R,
        field: &str,
    ) -> StoreResult<()> {
        if !self.exists_raw(key).await? {
            return Err(StoreError::NotFound(key.to_string()));
        }

        let encoded = capture_one(record, field)?;
        self.round_trip(&[
            b"HSET",
            key.as_bytes(),
            field.as_bytes(),
            encoded.as_bytes(),
        ])
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Ordered-set operations (keys are prefixed)
    // ------------------------------------------------------------------

    /// Adds a member with a score. Returns how many members were newly
    /// added (0 when the score of an existing member was updated).
    pub async fn rank_add(
        &self,
        key: &str,
        score: f64,
        member: &str,
    ) -> StoreResult<i64> {
        let full = self.shared.config.prefixed(key);
        let score = format!("{}", score);
        let reply = self
            .round_trip(&[
                b"ZADD",
                full.as_bytes(),
                score.as_bytes(),
                member.as_bytes(),
            ])
            .await?;
        reply
            .as_integer()
            .ok_or(StoreError::UnexpectedReply { command: "ZADD" })
    }

    /// Removes a member. Returns how many members were removed.
    pub async fn rank_remove(&self, key: &str, member: &str) -> StoreResult<i64> {
        let full = self.shared.config.prefixed(key);
        let reply = self
            .round_trip(&[b"ZREM", full.as_bytes(), member.as_bytes()])
            .await?;
        reply
            .as_integer()
            .ok_or(StoreError::UnexpectedReply { command: "ZREM" })
    }

    /// The member's score, or None when absent.
    pub async fn score(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        let full = self.shared.config.prefixed(key);
        let reply = self
            .round_trip(&[b"ZSCORE", full.as_bytes(), member.as_bytes()])
            .await?;
        match reply {
            Reply::Null => Ok(None),
            Reply::Bulk(data) => {
                let text = String::from_utf8_lossy(&data);
                text.parse()
                    .map(Some)
                    .map_err(|_| StoreError::UnexpectedReply { command: "ZSCORE" })
            }
            _ => Err(StoreError::UnexpectedReply { command: "ZSCORE" }),
        }
    }

    /// Ascending rank of a member. Degrades to 0 on any failure.
    pub async fn rank(&self, key: &str, member: &str) -> i64 {
        let full = self.shared.config.prefixed(key);
        self.degraded_int(&[b"ZRANK", full.as_bytes(), member.as_bytes()], "ZRANK")
            .await
    }

    /// Descending rank of a member. Degrades to 0 on any failure.
    pub async fn reverse_rank(&self, key: &str, member: &str) -> i64 {
        let full = self.shared.config.prefixed(key);
        self.degraded_int(
            &[b"ZREVRANK", full.as_bytes(), member.as_bytes()],
            "ZREVRANK",
        )
        .await
    }

    /// Total number of members. Degrades to 0 on any failure.
    pub async fn count(&self, key: &str) -> i64 {
        let full = self.shared.config.prefixed(key);
        self.degraded_int(
            &[b"ZCOUNT", full.as_bytes(), b"-inf", b"+inf"],
            "ZCOUNT",
        )
        .await
    }

    /// Members between two ascending ranks. Degrades to empty on failure.
    pub async fn range_by_rank(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Vec<String> {
        let full = self.shared.config.prefixed(key);
        let (start, stop) = (start.to_string(), stop.to_string());
        self.degraded_list(
            &[
                b"ZRANGE",
                full.as_bytes(),
                start.as_bytes(),
                stop.as_bytes(),
            ],
            "ZRANGE",
        )
        .await
    }

    /// Members between two descending ranks. Degrades to empty on failure.
    pub async fn reverse_range_by_rank(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Vec<String> {
        let full = self.shared.config.prefixed(key);
        let (start, stop) = (start.to_string(), stop.to_string());
        self.degraded_list(
            &[
                b"ZREVRANGE",
                full.as_bytes(),
                start.as_bytes(),
                stop.as_bytes(),
            ],
            "ZREVRANGE",
        )
        .await
    }

    /// Members with scores below `max` (exclusive) down to `min`,
    /// starting at `offset`, at most `limit` members. Degrades to empty
    /// on failure.
    pub async fn reverse_range_by_score(
        &self,
        key: &str,
        max: f64,
        min: f64,
        offset: u64,
        limit: u64,
    ) -> Vec<String> {
        let full = self.shared.config.prefixed(key);
        let max = format!("({}", max);
        let min = format!("{}", min);
        let (offset, limit) = (offset.to_string(), limit.to_string());
        self.degraded_list(
            &[
                b"ZREVRANGEBYSCORE",
                full.as_bytes(),
                max.as_bytes(),
                min.as_bytes(),
                b"LIMIT",
                offset.as_bytes(),
                limit.as_bytes(),
            ],
            "ZREVRANGEBYSCORE",
        )
        .await
    }

    // ------------------------------------------------------------------
    // Unordered-set operations (keys are prefixed)
    // ------------------------------------------------------------------

    /// Adds members to a set.
    pub async fn set_add(&self, key: &str, members: &[&str]) -> StoreResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let full = self.shared.config.prefixed(key);
        let mut args: Vec<&[u8]> = Vec::with_capacity(2 + members.len());
        args.push(b"SADD");
        args.push(full.as_bytes());
        for member in members {
            args.push(member.as_bytes());
        }
        self.round_trip(&args).await?;
        Ok(())
    }

    /// True when the set exists and contains `member`.
    pub async fn set_contains(&self, key: &str, member: &str) -> StoreResult<bool> {
        let full = self.shared.config.prefixed(key);
        if !self.exists_raw(&full).await? {
            return Ok(false);
        }
        let reply = self
            .round_trip(&[b"SISMEMBER", full.as_bytes(), member.as_bytes()])
            .await?;
        Ok(reply.as_integer() == Some(1))
    }

    /// All members of a set; empty for an absent key.
    pub async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let full = self.shared.config.prefixed(key);
        let reply = self.round_trip(&[b"SMEMBERS", full.as_bytes()]).await?;
        reply
            .into_strings()
            .ok_or(StoreError::UnexpectedReply { command: "SMEMBERS" })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// One round-trip through the current pool. An I/O failure flags the
    /// pool for reconnection; the error still propagates to the caller.
    async fn round_trip(&self, args: &[&[u8]]) -> StoreResult<Reply> {
        let pool = self.shared.current_pool()?;
        let mut conn = pool.acquire().await?;
        let result = conn.exec(args).await;
        if let Err(StoreError::Io(_)) = &result {
            self.shared.flag_reconnect();
        }
        result
    }

    async fn exists_raw(&self, full_key: &str) -> StoreResult<bool> {
        let reply = self.round_trip(&[b"EXISTS", full_key.as_bytes()]).await?;
        match reply.as_integer() {
            Some(n) => Ok(n > 0),
            None => Err(StoreError::UnexpectedReply { command: "EXISTS" }),
        }
    }

    async fn degraded_int(&self, args: &[&[u8]], command: &'static str) -> i64 {
        match self.round_trip(args).await {
            Ok(reply) => reply.as_integer().unwrap_or(0),
            Err(err) => {
                debug!(command, error = %err, "read degraded to zero");
                0
            }
        }
    }

    async fn degraded_list(
        &self,
        args: &[&[u8]],
        command: &'static str,
    ) -> Vec<String> {
        match self.round_trip(args).await {
            Ok(reply) => reply.into_strings().unwrap_or_default(),
            Err(err) => {
                debug!(command, error = %err, "read degraded to empty");
                Vec::new()
            }
        }
    }
}

/// Default page size for internal full drains.
const SCAN_DEFAULT_PAGE: u32 = 1000;

/// Converts an HGETALL reply (alternating field/value bulks) to a hash.
fn reply_to_hash(reply: Reply) -> Option<Hash> {
    let items = match reply {
        Reply::Array(items) => items,
        _ => return None,
    };
    if items.len() % 2 != 0 {
        return None;
    }

    let mut hash = Hash::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        let field = field.as_str()?.to_string();
        let value = match value {
            Reply::Bulk(data) => String::from_utf8_lossy(&data).into_owned(),
            Reply::Simple(text) => text,
            _ => return None,
        };
        hash.insert(field, value);
    }
    Some(hash)
}
