//! RESP Command Encoding and Reply Decoding
//!
//! The decoder is incremental: the connection appends network bytes to a
//! buffer and calls [`decode_reply`] until it yields a complete value.
//!
//! - `Ok(Some((reply, consumed)))` — a full reply; advance the buffer
//! - `Ok(None)` — incomplete, read more bytes
//! - `Err(_)` — the stream is no longer trustworthy; drop the connection
//!
//! Commands are always flat arrays of bulk strings, so encoding is a
//! single pass with no intermediate tree.

use bytes::Bytes;
use std::num::ParseIntError;
use thiserror::Error;

/// The CRLF terminator used by RESP.
const CRLF: &[u8] = b"\r\n";

/// Maximum size of a single bulk reply (512 MB, same as the server cap).
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum reply nesting depth.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Errors raised while decoding a server reply.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// Unknown type prefix byte.
    #[error("unknown reply prefix: {0:#04x}")]
    UnknownPrefix(u8),

    /// A length or integer line was not a valid number.
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// A status or error line was not UTF-8.
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Negative length other than the null marker.
    #[error("invalid length: {0}")]
    InvalidLength(i64),

    /// Framing violation (missing CRLF, nesting too deep, ...).
    #[error("malformed reply: {0}")]
    Malformed(String),

    /// The reply exceeds the maximum allowed size.
    #[error("reply too large: {size} bytes (max: {max})")]
    ReplyTooLarge { size: usize, max: usize },
}

/// Result type for decoding operations.
pub type DecodeResult = Result<Option<(super::Reply, usize)>, ProtocolError>;

/// Encodes a command as a RESP array of bulk strings into `out`.
pub fn encode_command(args: &[&[u8]], out: &mut Vec<u8>) {
    out.push(b'*');
    out.extend_from_slice(args.len().to_string().as_bytes());
    out.extend_from_slice(CRLF);
    for arg in args {
        out.push(b'$');
        out.extend_from_slice(arg.len().to_string().as_bytes());
        out.extend_from_slice(CRLF);
        out.extend_from_slice(arg);
        out.extend_from_slice(CRLF);
    }
}

/// Attempts to decode one complete reply from the front of `buf`.
pub fn decode_reply(buf: &[u8]) -> DecodeResult {
    decode_value(buf, 0)
}

fn decode_value(buf: &[u8], depth: usize) -> DecodeResult {
    use super::Reply;

    if buf.is_empty() {
        return Ok(None);
    }
    if depth > MAX_NESTING_DEPTH {
        return Err(ProtocolError::Malformed(format!(
            "nesting deeper than {}",
            MAX_NESTING_DEPTH
        )));
    }

    match buf[0] {
        b'+' => decode_line(buf).map(|opt| {
            opt.map(|(text, consumed)| (Reply::Simple(text), consumed))
        }),
        b'-' => decode_line(buf).map(|opt| {
            opt.map(|(text, consumed)| (Reply::Error(text), consumed))
        }),
        b':' => {
            let (text, consumed) = match decode_line(buf)? {
                Some(parts) => parts,
                None => return Ok(None),
            };
            let n: i64 = text.parse().map_err(|e: ParseIntError| {
                ProtocolError::InvalidInteger(e.to_string())
            })?;
            Ok(Some((Reply::Integer(n), consumed)))
        }
        b'$' => decode_bulk(buf),
        b'*' => decode_array(buf, depth),
        other => Err(ProtocolError::UnknownPrefix(other)),
    }
}

/// Decodes a `+...` / `-...` / `:...` line, returning its UTF-8 content.
fn decode_line(buf: &[u8]) -> Result<Option<(String, usize)>, ProtocolError> {
    let pos = match find_crlf(&buf[1..]) {
        Some(pos) => pos,
        None => return Ok(None),
    };
    let text = std::str::from_utf8(&buf[1..1 + pos])
        .map_err(|e| ProtocolError::InvalidUtf8(e.to_string()))?;
    // prefix byte + content + CRLF
    Ok(Some((text.to_string(), 1 + pos + 2)))
}

fn decode_bulk(buf: &[u8]) -> DecodeResult {
    use super::Reply;

    let len_end = match find_crlf(&buf[1..]) {
        Some(pos) => pos,
        None => return Ok(None),
    };
    let len = parse_i64(&buf[1..1 + len_end])?;
    let header = 1 + len_end + 2;

    if len == -1 {
        return Ok(Some((Reply::Null, header)));
    }
    if len < 0 {
        return Err(ProtocolError::InvalidLength(len));
    }
    let len = len as usize;
    if len > MAX_BULK_SIZE {
        return Err(ProtocolError::ReplyTooLarge {
            size: len,
            max: MAX_BULK_SIZE,
        });
    }

    let total = header + len + 2;
    if buf.len() < total {
        return Ok(None);
    }
    if &buf[header + len..total] != CRLF {
        return Err(ProtocolError::Malformed(
            "bulk reply missing trailing CRLF".to_string(),
        ));
    }

    let data = Bytes::copy_from_slice(&buf[header..header + len]);
    Ok(Some((Reply::Bulk(data), total)))
}

fn decode_array(buf: &[u8], depth: usize) -> DecodeResult {
    use super::Reply;

    let count_end = match find_crlf(&buf[1..]) {
        Some(pos) => pos,
        None => return Ok(None),
    };
    let count = parse_i64(&buf[1..1 + count_end])?;
    let mut consumed = 1 + count_end + 2;

    if count == -1 {
        return Ok(Some((Reply::Null, consumed)));
    }
    if count < 0 {
        return Err(ProtocolError::InvalidLength(count));
    }

    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        match decode_value(&buf[consumed..], depth + 1)? {
            Some((item, item_consumed)) => {
                items.push(item);
                consumed += item_consumed;
            }
            None => return Ok(None),
        }
    }

    Ok(Some((Reply::Array(items), consumed)))
}

fn parse_i64(data: &[u8]) -> Result<i64, ProtocolError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| ProtocolError::InvalidUtf8(e.to_string()))?;
    text.parse()
        .map_err(|e: ParseIntError| ProtocolError::InvalidInteger(e.to_string()))
}

#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == CRLF)
}
