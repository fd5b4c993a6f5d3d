//! Field Kinds and String Codecs
//!
//! Every supported field kind has exactly one string encoding, chosen to
//! match what the store's hash commands persist:
//!
//! | Kind      | Encoding                                   |
//! |-----------|--------------------------------------------|
//! | Int/Uint  | decimal                                    |
//! | Float     | shortest round-tripping decimal            |
//! | Str       | verbatim                                   |
//! | Bool      | `"1"` / `"0"`                              |
//! | Bytes     | raw bytes reinterpreted as text (lossy)    |
//! | Timestamp | Unix epoch seconds, decimal                |
//!
//! Byte sequences are *not* base64-encoded; non-UTF-8 payloads do not
//! survive the reinterpretation. Callers storing binary blobs should use
//! the plain byte operations on the facade instead of a hash field.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Semantic kind of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Signed integer up to 64 bits.
    Int,
    /// Unsigned integer up to 64 bits.
    Uint,
    /// 32- or 64-bit floating point.
    Float,
    /// UTF-8 text.
    Str,
    /// Boolean, persisted as `"1"` / `"0"`.
    Bool,
    /// Byte sequence, persisted as reinterpreted text.
    Bytes,
    /// Point in time, persisted as Unix epoch seconds.
    Timestamp,
}

/// A captured field value, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bool(bool),
    Bytes(Vec<u8>),
    Timestamp(SystemTime),
}

impl FieldValue {
    /// Encodes the value into its hash string form.
    pub fn encode(&self) -> String {
        match self {
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Uint(v) => v.to_string(),
            // `{}` is shortest round-trip formatting for floats.
            FieldValue::Float(v) => format!("{}", v),
            FieldValue::Str(v) => v.clone(),
            FieldValue::Bool(v) => if *v { "1" } else { "0" }.to_string(),
            FieldValue::Bytes(v) => String::from_utf8_lossy(v).into_owned(),
            FieldValue::Timestamp(v) => epoch_seconds(*v).to_string(),
        }
    }
}

impl Kind {
    /// Decodes a hash string into a value of this kind.
    ///
    /// Returns None for strings that do not parse under the kind's
    /// encoding. Booleans are the exception: any string other than `"1"`
    /// decodes as false, matching the persisted `"1"`/`"0"` convention.
    /// Strict-mode callers pre-reject non-`"0"`/`"1"` booleans via
    /// [`Kind::is_well_formed`].
    pub fn decode(&self, raw: &str) -> Option<FieldValue> {
        match self {
            Kind::Int => raw.parse().ok().map(FieldValue::Int),
            Kind::Uint => raw.parse().ok().map(FieldValue::Uint),
            Kind::Float => raw.parse().ok().map(FieldValue::Float),
            Kind::Str => Some(FieldValue::Str(raw.to_string())),
            Kind::Bool => Some(FieldValue::Bool(raw == "1")),
            Kind::Bytes => Some(FieldValue::Bytes(raw.as_bytes().to_vec())),
            Kind::Timestamp => raw.parse().ok().map(|secs: u64| {
                FieldValue::Timestamp(UNIX_EPOCH + Duration::from_secs(secs))
            }),
        }
    }

    /// True when `raw` is a canonical encoding for this kind.
    pub fn is_well_formed(&self, raw: &str) -> bool {
        match self {
            Kind::Bool => raw == "0" || raw == "1",
            _ => self.decode(raw).is_some(),
        }
    }
}

/// Seconds since the Unix epoch; times before the epoch clamp to zero.
fn epoch_seconds(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_roundtrip() {
        let encoded = FieldValue::Int(-77).encode();
        assert_eq!(encoded, "-77");
        assert_eq!(Kind::Int.decode(&encoded), Some(FieldValue::Int(-77)));

        let encoded = FieldValue::Uint(u64::MAX).encode();
        assert_eq!(Kind::Uint.decode(&encoded), Some(FieldValue::Uint(u64::MAX)));
    }

    #[test]
    fn floats_use_shortest_roundtrip() {
        let encoded = FieldValue::Float(0.1).encode();
        assert_eq!(encoded, "0.1");
        assert_eq!(Kind::Float.decode(&encoded), Some(FieldValue::Float(0.1)));
    }

    #[test]
    fn bools_encode_as_digits() {
        assert_eq!(FieldValue::Bool(true).encode(), "1");
        assert_eq!(FieldValue::Bool(false).encode(), "0");
        assert_eq!(Kind::Bool.decode("1"), Some(FieldValue::Bool(true)));
        // Anything that is not "1" is false, by convention.
        assert_eq!(Kind::Bool.decode("yes"), Some(FieldValue::Bool(false)));
        assert!(!Kind::Bool.is_well_formed("yes"));
    }

    #[test]
    fn timestamps_use_epoch_seconds() {
        let at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let encoded = FieldValue::Timestamp(at).encode();
        assert_eq!(encoded, "1700000000");
        assert_eq!(
            Kind::Timestamp.decode(&encoded),
            Some(FieldValue::Timestamp(at))
        );
    }

    #[test]
    fn pre_epoch_timestamps_clamp_to_zero() {
        let before = UNIX_EPOCH - Duration::from_secs(5);
        assert_eq!(FieldValue::Timestamp(before).encode(), "0");
    }

    #[test]
    fn malformed_numbers_decode_to_none() {
        assert_eq!(Kind::Int.decode("abc"), None);
        assert_eq!(Kind::Uint.decode("-1"), None);
        assert_eq!(Kind::Float.decode(""), None);
        assert_eq!(Kind::Timestamp.decode("later"), None);
    }

    #[test]
    fn bytes_reinterpret_as_text() {
        let encoded = FieldValue::Bytes(b"blob".to_vec()).encode();
        assert_eq!(encoded, "blob");
        assert_eq!(
            Kind::Bytes.decode(&encoded),
            Some(FieldValue::Bytes(b"blob".to_vec()))
        );
    }
}
