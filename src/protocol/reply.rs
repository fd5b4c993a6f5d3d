//! RESP Reply Values
//!
//! A server reply is one of five RESP2 types. [`Reply`] carries the decoded
//! form plus the typed accessors the facade needs: most commands expect one
//! specific shape and treat anything else as [`UnexpectedReply`]
//! (`crate::StoreError::UnexpectedReply`).

use bytes::Bytes;
use std::fmt;

/// A decoded RESP2 server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK` style non-binary status line.
    Simple(String),
    /// `-ERR ...` error line.
    Error(String),
    /// `:123` signed 64-bit integer.
    Integer(i64),
    /// `$<len>` binary-safe bulk string.
    Bulk(Bytes),
    /// Null bulk string or null array (`$-1` / `*-1`).
    Null,
    /// `*<count>` array of nested replies.
    Array(Vec<Reply>),
}

impl Reply {
    /// True when the server signalled "no such key".
    pub fn is_null(&self) -> bool {
        matches!(self, Reply::Null)
    }

    /// Extracts text from a simple or bulk reply.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reply::Simple(s) => Some(s),
            Reply::Bulk(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Extracts the raw bytes of a bulk reply.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Reply::Bulk(b) => Some(b),
            _ => None,
        }
    }

    /// Extracts an integer reply.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Consumes an array reply of bulk strings into owned text.
    ///
    /// Non-bulk elements are dropped; the store only returns homogeneous
    /// key/member arrays for the commands this client issues.
    pub fn into_strings(self) -> Option<Vec<String>> {
        match self {
            Reply::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Reply::Bulk(b) => {
                            Some(String::from_utf8_lossy(&b).into_owned())
                        }
                        Reply::Simple(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Decodes a SCAN reply: a two-element array of the continuation
    /// cursor and a batch of keys.
    pub fn into_scan(self) -> Option<(u64, Vec<String>)> {
        let mut items = match self {
            Reply::Array(items) if items.len() == 2 => items.into_iter(),
            _ => return None,
        };
        let cursor = items.next()?.as_str()?.parse().ok()?;
        let keys = items.next()?.into_strings()?;
        Some((cursor, keys))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Simple(s) => write!(f, "\"{}\"", s),
            Reply::Error(s) => write!(f, "(error) {}", s),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::Bulk(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            Reply::Null => write!(f, "(nil)"),
            Reply::Array(items) => {
                if items.is_empty() {
                    return write!(f, "(empty array)");
                }
                writeln!(f)?;
                for (i, item) in items.iter().enumerate() {
                    writeln!(f, "{}) {}", i + 1, item)?;
                }
                Ok(())
            }
        }
    }
}
