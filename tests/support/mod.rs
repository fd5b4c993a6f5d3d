//! In-process test server speaking just enough of the wire protocol for
//! the integration suite. State lives in plain maps behind a mutex; no
//! real expiration runs, but ttl bookkeeping is tracked so deadline
//! behavior can be asserted.
//!
//! One deliberate quirk: the ttl-refresh command only succeeds for keys
//! that already carry a ttl, so the "no ttl to refresh" reply path is
//! reachable from tests.

// Not every test binary touches every helper.
#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use steadykv::protocol::{decode_reply, Reply};
use steadykv::StoreConfig;

#[derive(Default)]
struct State {
    strings: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
    zsets: HashMap<String, Vec<(f64, String)>>,
    sets: HashMap<String, BTreeSet<String>>,
    ttls: HashMap<String, u64>,
    fail_pings: u32,
}

impl State {
    fn key_exists(&self, key: &str) -> bool {
        self.strings.contains_key(key)
            || self.hashes.contains_key(key)
            || self.zsets.contains_key(key)
            || self.sets.contains_key(key)
    }

    fn remove_key(&mut self, key: &str) -> bool {
        let mut removed = false;
        removed |= self.strings.remove(key).is_some();
        removed |= self.hashes.remove(key).is_some();
        removed |= self.zsets.remove(key).is_some();
        removed |= self.sets.remove(key).is_some();
        self.ttls.remove(key);
        removed
    }

    fn all_keys_sorted(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .strings
            .keys()
            .chain(self.hashes.keys())
            .chain(self.zsets.keys())
            .chain(self.sets.keys())
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

pub struct TestServer {
    pub addr: String,
    state: Arc<Mutex<State>>,
    connections: Arc<AtomicUsize>,
    conn_tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    accept_task: JoinHandle<()>,
}

/// Installs a tracing subscriber once per test binary, honoring
/// `RUST_LOG` so a failing test can be rerun with client logs visible.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

impl TestServer {
    pub async fn start() -> TestServer {
        TestServer::start_on("127.0.0.1:0").await
    }

    /// Binds a specific address. Rebinding the address of a dropped
    /// server simulates a store coming back after an outage.
    pub async fn start_on(addr: &str) -> TestServer {
        init_tracing();
        let listener = TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let state = Arc::new(Mutex::new(State::default()));
        let connections = Arc::new(AtomicUsize::new(0));
        let conn_tasks: Arc<Mutex<Vec<JoinHandle<()>>>> =
            Arc::new(Mutex::new(Vec::new()));

        let accept_state = Arc::clone(&state);
        let accept_count = Arc::clone(&connections);
        let accept_tasks = Arc::clone(&conn_tasks);
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                accept_count.fetch_add(1, Ordering::Relaxed);
                let conn_state = Arc::clone(&accept_state);
                let handler = tokio::spawn(handle_conn(socket, conn_state));
                accept_tasks
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .push(handler);
            }
        });

        TestServer {
            addr,
            state,
            connections,
            conn_tasks,
            accept_task,
        }
    }

    /// How many connections have been accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Config pointing at this server with a short supervision interval
    /// so health transitions are observable within a test.
    pub fn config(&self) -> StoreConfig {
        let mut config = StoreConfig::new(&self.addr);
        config.health_interval = std::time::Duration::from_millis(50);
        config
    }

    /// Makes the next `n` liveness probes fail with a server error.
    pub fn fail_pings(&self, n: u32) {
        self.lock().fail_pings = n;
    }

    /// The recorded ttl of a key, in seconds.
    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        self.lock().ttls.get(key).copied()
    }

    /// Writes a hash field directly, bypassing the wire protocol. Used
    /// to plant malformed values a well-behaved client would not write.
    pub fn set_hash_field(&self, key: &str, field: &str, value: &str) {
        self.lock()
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Kill live connection handlers too, so dropping the server
        // severs established clients and not just the listener.
        let handlers = std::mem::take(
            &mut *self
                .conn_tasks
                .lock()
                .unwrap_or_else(|p| p.into_inner()),
        );
        for handler in handlers {
            handler.abort();
        }
        self.accept_task.abort();
    }
}

async fn handle_conn(mut socket: TcpStream, state: Arc<Mutex<State>>) {
    use tokio::io::AsyncReadExt;

    let mut buf = BytesMut::with_capacity(4096);
    loop {
        let command = loop {
            match decode_reply(&buf) {
                Ok(Some((reply, consumed))) => {
                    let _ = buf.split_to(consumed);
                    break reply;
                }
                Ok(None) => {
                    let n = match socket.read_buf(&mut buf).await {
                        Ok(n) => n,
                        Err(_) => return,
                    };
                    if n == 0 {
                        return;
                    }
                }
                Err(_) => return,
            }
        };

        let Some(args) = command_args(command) else {
            return;
        };
        let response = {
            let mut guard = state.lock().unwrap_or_else(|p| p.into_inner());
            dispatch(&mut guard, &args)
        };
        if socket.write_all(&response).await.is_err() {
            return;
        }
    }
}

/// Client commands arrive as arrays of bulk strings.
fn command_args(reply: Reply) -> Option<Vec<String>> {
    let items = match reply {
        Reply::Array(items) => items,
        _ => return None,
    };
    items
        .into_iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn dispatch(state: &mut State, args: &[String]) -> Vec<u8> {
    let command = args[0].to_ascii_uppercase();
    match command.as_str() {
        "PING" => {
            if state.fail_pings > 0 {
                state.fail_pings -= 1;
                error_reply("LOADING server is starting up")
            } else {
                simple("PONG")
            }
        }
        "GET" => match state.strings.get(&args[1]) {
            Some(value) => bulk(value),
            None => nil(),
        },
        "SET" => {
            state.strings.insert(args[1].clone(), args[2].clone());
            state.ttls.remove(&args[1]);
            simple("OK")
        }
        "SETEX" => {
            let seconds: u64 = args[2].parse().unwrap();
            state.strings.insert(args[1].clone(), args[3].clone());
            state.ttls.insert(args[1].clone(), seconds);
            simple("OK")
        }
        "DEL" => {
            let removed = args[1..]
                .iter()
                .filter(|key| state.remove_key(key))
                .count();
            integer(removed as i64)
        }
        "INCR" => {
            let current: i64 = state
                .strings
                .get(&args[1])
                .map(|v| v.parse().unwrap_or(0))
                .unwrap_or(0);
            let next = current + 1;
            state.strings.insert(args[1].clone(), next.to_string());
            integer(next)
        }
        "EXISTS" => {
            let found = args[1..]
                .iter()
                .filter(|key| state.key_exists(key))
                .count();
            integer(found as i64)
        }
        "EXPIRE" => {
            // Refreshes only; a key without a ttl is reported as 0.
            let key = &args[1];
            if state.key_exists(key) && state.ttls.contains_key(key) {
                let seconds: u64 = args[2].parse().unwrap();
                state.ttls.insert(key.clone(), seconds);
                integer(1)
            } else {
                integer(0)
            }
        }
        "TTL" => {
            let key = &args[1];
            if !state.key_exists(key) {
                integer(-2)
            } else {
                match state.ttls.get(key) {
                    Some(seconds) => integer(*seconds as i64),
                    None => integer(-1),
                }
            }
        }
        "SCAN" => scan(state, args),
        "HSET" => {
            let hash = state.hashes.entry(args[1].clone()).or_default();
            let mut added = 0;
            for pair in args[2..].chunks(2) {
                if hash.insert(pair[0].clone(), pair[1].clone()).is_none() {
                    added += 1;
                }
            }
            integer(added)
        }
        "HGETALL" => {
            let mut items = Vec::new();
            if let Some(hash) = state.hashes.get(&args[1]) {
                for (field, value) in hash {
                    items.push(bulk(field));
                    items.push(bulk(value));
                }
            }
            array(items)
        }
        "HGET" => match state.hashes.get(&args[1]).and_then(|h| h.get(&args[2])) {
            Some(value) => bulk(value),
            None => nil(),
        },
        "ZADD" => {
            let score: f64 = args[2].parse().unwrap();
            let zset = state.zsets.entry(args[1].clone()).or_default();
            match zset.iter_mut().find(|(_, m)| *m == args[3]) {
                Some(entry) => {
                    entry.0 = score;
                    integer(0)
                }
                None => {
                    zset.push((score, args[3].clone()));
                    integer(1)
                }
            }
        }
        "ZREM" => {
            let removed = match state.zsets.get_mut(&args[1]) {
                Some(zset) => {
                    let before = zset.len();
                    zset.retain(|(_, m)| *m != args[2]);
                    before - zset.len()
                }
                None => 0,
            };
            integer(removed as i64)
        }
        "ZSCORE" => {
            match state
                .zsets
                .get(&args[1])
                .and_then(|z| z.iter().find(|(_, m)| *m == args[2]))
            {
                Some((score, _)) => bulk(&format!("{}", score)),
                None => nil(),
            }
        }
        "ZRANK" => match member_rank(state, &args[1], &args[2], false) {
            Some(rank) => integer(rank),
            None => nil(),
        },
        "ZREVRANK" => match member_rank(state, &args[1], &args[2], true) {
            Some(rank) => integer(rank),
            None => nil(),
        },
        "ZCOUNT" => {
            let (min, _) = parse_score(&args[2]);
            let (max, _) = parse_score(&args[3]);
            let count = state
                .zsets
                .get(&args[1])
                .map(|z| z.iter().filter(|(s, _)| *s >= min && *s <= max).count())
                .unwrap_or(0);
            integer(count as i64)
        }
        "ZRANGE" => range_by_rank(state, args, false),
        "ZREVRANGE" => range_by_rank(state, args, true),
        "ZREVRANGEBYSCORE" => rev_range_by_score(state, args),
        "SADD" => {
            let set = state.sets.entry(args[1].clone()).or_default();
            let added = args[2..]
                .iter()
                .filter(|m| set.insert((*m).clone()))
                .count();
            integer(added as i64)
        }
        "SISMEMBER" => {
            let found = state
                .sets
                .get(&args[1])
                .is_some_and(|s| s.contains(&args[2]));
            integer(found as i64)
        }
        "SMEMBERS" => {
            let items = state
                .sets
                .get(&args[1])
                .map(|s| s.iter().map(|m| bulk(m)).collect())
                .unwrap_or_default();
            array(items)
        }
        other => error_reply(&format!("ERR unknown command '{}'", other)),
    }
}

fn scan(state: &mut State, args: &[String]) -> Vec<u8> {
    let cursor: usize = args[1].parse().unwrap();
    let mut pattern = String::new();
    let mut count = 10usize;
    let mut i = 2;
    while i + 1 < args.len() {
        match args[i].to_ascii_uppercase().as_str() {
            "MATCH" => pattern = args[i + 1].clone(),
            "COUNT" => count = args[i + 1].parse().unwrap(),
            _ => {}
        }
        i += 2;
    }
    let prefix = pattern.strip_suffix('*').unwrap_or(&pattern);

    let keys = state.all_keys_sorted();
    let window_end = (cursor + count).min(keys.len());
    let matched: Vec<Vec<u8>> = keys[cursor..window_end]
        .iter()
        .filter(|key| key.starts_with(prefix))
        .map(|key| bulk(key))
        .collect();
    let next_cursor = if window_end >= keys.len() { 0 } else { window_end };

    let mut out = Vec::new();
    out.extend_from_slice(b"*2\r\n");
    out.extend_from_slice(&bulk(&next_cursor.to_string()));
    out.extend_from_slice(&array(matched));
    out
}

fn sorted_members(state: &State, key: &str, descending: bool) -> Vec<String> {
    let mut entries: Vec<(f64, String)> = state
        .zsets
        .get(key)
        .cloned()
        .unwrap_or_default();
    entries.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });
    if descending {
        entries.reverse();
    }
    entries.into_iter().map(|(_, m)| m).collect()
}

fn member_rank(
    state: &State,
    key: &str,
    member: &str,
    descending: bool,
) -> Option<i64> {
    sorted_members(state, key, descending)
        .iter()
        .position(|m| m == member)
        .map(|p| p as i64)
}

fn range_by_rank(state: &State, args: &[String], descending: bool) -> Vec<u8> {
    let members = sorted_members(state, &args[1], descending);
    let len = members.len() as i64;
    let norm = |raw: i64| -> i64 {
        if raw < 0 {
            (len + raw).max(0)
        } else {
            raw.min(len)
        }
    };
    let start = norm(args[2].parse().unwrap());
    let stop = norm(args[3].parse().unwrap());
    let items = if start <= stop && start < len {
        members[start as usize..=(stop.min(len - 1)) as usize]
            .iter()
            .map(|m| bulk(m))
            .collect()
    } else {
        Vec::new()
    };
    array(items)
}

fn rev_range_by_score(state: &State, args: &[String]) -> Vec<u8> {
    let (max, max_exclusive) = parse_score(&args[2]);
    let (min, _) = parse_score(&args[3]);
    let mut offset = 0usize;
    let mut limit = usize::MAX;
    if args.len() >= 7 && args[4].eq_ignore_ascii_case("LIMIT") {
        offset = args[5].parse().unwrap();
        limit = args[6].parse().unwrap();
    }

    let mut entries: Vec<(f64, String)> = state
        .zsets
        .get(&args[1])
        .cloned()
        .unwrap_or_default();
    entries.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.1.cmp(&a.1))
    });

    let items: Vec<Vec<u8>> = entries
        .into_iter()
        .filter(|(score, _)| {
            let below_max = if max_exclusive { *score < max } else { *score <= max };
            below_max && *score >= min
        })
        .skip(offset)
        .take(limit)
        .map(|(_, m)| bulk(&m))
        .collect();
    array(items)
}

/// Parses a score bound; a leading '(' marks it exclusive.
fn parse_score(raw: &str) -> (f64, bool) {
    let (text, exclusive) = match raw.strip_prefix('(') {
        Some(rest) => (rest, true),
        None => (raw, false),
    };
    let value = match text {
        "-inf" => f64::NEG_INFINITY,
        "+inf" | "inf" => f64::INFINITY,
        other => other.parse().unwrap(),
    };
    (value, exclusive)
}

fn simple(text: &str) -> Vec<u8> {
    format!("+{}\r\n", text).into_bytes()
}

fn error_reply(text: &str) -> Vec<u8> {
    format!("-{}\r\n", text).into_bytes()
}

fn integer(value: i64) -> Vec<u8> {
    format!(":{}\r\n", value).into_bytes()
}

fn bulk(data: &str) -> Vec<u8> {
    format!("${}\r\n{}\r\n", data.len(), data).into_bytes()
}

fn nil() -> Vec<u8> {
    b"$-1\r\n".to_vec()
}

fn array(items: Vec<Vec<u8>>) -> Vec<u8> {
    let mut out = format!("*{}\r\n", items.len()).into_bytes();
    for item in items {
        out.extend_from_slice(&item);
    }
    out
}
