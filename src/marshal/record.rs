//! Record Trait and Hash Conversion
//!
//! [`Record`] is the seam between caller-defined types and the store's
//! hash representation. A type declares an ordered, static descriptor of
//! its persistable fields; `capture` reads them out, `assign` writes one
//! back. [`to_hash`] and [`from_hash`] walk the descriptor and dispatch to
//! the per-kind codecs, so no per-type marshalling code exists anywhere.
//!
//! Fields of unsupported types are simply left out of the descriptor and
//! are therefore invisible to persistence: the record still saves, just
//! without those fields.

use std::collections::HashMap;

use thiserror::Error;

use super::value::{FieldValue, Kind};

/// The flat representation a record is persisted as.
pub type Hash = HashMap<String, String>;

/// One entry of a record's static field descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Declared field name, used as the hash key.
    pub name: &'static str,
    /// Semantic kind driving the codec.
    pub kind: Kind,
}

/// Controls how malformed hash values are handled during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarshalMode {
    /// Skip malformed values; the field keeps its zero value.
    #[default]
    Lenient,
    /// Fail with [`MarshalError::Malformed`] on the first bad value.
    Strict,
}

/// Errors raised by the marshalling entry points.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarshalError {
    /// A hash value did not decode under the field's kind (strict mode).
    #[error("field '{field}' does not decode as {kind:?}: {value:?}")]
    Malformed {
        field: &'static str,
        kind: Kind,
        value: String,
    },

    /// The record declares no field with the requested name.
    #[error("record has no field named '{0}'")]
    UnknownField(String),
}

/// A type whose fields can be captured into and restored from a [`Hash`].
///
/// Implement via [`impl_record!`](crate::impl_record) rather than by hand.
pub trait Record {
    /// Ordered list of persistable fields.
    fn descriptor() -> &'static [FieldDescriptor];

    /// Appends (name, current value) for every declared field.
    fn capture(&self, out: &mut Vec<(&'static str, FieldValue)>);

    /// Writes a decoded value into the named field. Unknown names are
    /// ignored; the value's variant always matches the declared kind.
    fn assign(&mut self, name: &str, value: FieldValue);
}

/// Encodes every declared field of `record` into a hash.
pub fn to_hash<R: Record>(record: &R) -> Hash {
    let mut fields = Vec::with_capacity(R::descriptor().len());
    record.capture(&mut fields);

    fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.encode()))
        .collect()
}

/// Decodes hash entries into the matching fields of `record`.
///
/// Entries with no matching field name are ignored. Malformed values are
/// skipped in [`MarshalMode::Lenient`] (the field keeps its zero value)
/// and abort with an error in [`MarshalMode::Strict`].
pub fn from_hash<R: Record>(
    record: &mut R,
    hash: &Hash,
    mode: MarshalMode,
) -> Result<(), MarshalError> {
    for field in R::descriptor() {
        let raw = match hash.get(field.name) {
            Some(raw) => raw,
            None => continue,
        };

        if mode == MarshalMode::Strict && !field.kind.is_well_formed(raw) {
            return Err(MarshalError::Malformed {
                field: field.name,
                kind: field.kind,
                value: raw.clone(),
            });
        }

        if let Some(value) = field.kind.decode(raw) {
            record.assign(field.name, value);
        }
    }
    Ok(())
}

/// Captures and encodes a single named field of `record`.
pub fn capture_one<R: Record>(
    record: &R,
    field: &str,
) -> Result<String, MarshalError> {
    let mut fields = Vec::with_capacity(R::descriptor().len());
    record.capture(&mut fields);
    fields
        .into_iter()
        .find(|(name, _)| *name == field)
        .map(|(_, value)| value.encode())
        .ok_or_else(|| MarshalError::UnknownField(field.to_string()))
}

/// Decodes a raw string into a single named field of `record`.
pub fn assign_one<R: Record>(
    record: &mut R,
    field: &str,
    raw: &str,
    mode: MarshalMode,
) -> Result<(), MarshalError> {
    let descriptor = R::descriptor()
        .iter()
        .find(|d| d.name == field)
        .ok_or_else(|| MarshalError::UnknownField(field.to_string()))?;

    if mode == MarshalMode::Strict && !descriptor.kind.is_well_formed(raw) {
        return Err(MarshalError::Malformed {
            field: descriptor.name,
            kind: descriptor.kind,
            value: raw.to_string(),
        });
    }

    if let Some(value) = descriptor.kind.decode(raw) {
        record.assign(descriptor.name, value);
    }
    Ok(())
}

/// Implements [`Record`] for a struct by listing its fields and kinds.
///
/// ```
/// use steadykv::impl_record;
///
/// #[derive(Default)]
/// struct Player {
///     id: u64,
///     name: String,
///     rating: f64,
/// }
///
/// impl_record!(Player { id: Uint, name: Str, rating: Float });
/// ```
///
/// Supported kinds: `Int`, `Uint`, `Float`, `Str`, `Bool`, `Bytes`
/// (`Vec<u8>` fields), `Timestamp` (`std::time::SystemTime` fields).
/// Fields not listed here are not persisted.
#[macro_export]
macro_rules! impl_record {
    ($ty:ty { $($field:ident: $kind:ident),+ $(,)? }) => {
        impl $crate::marshal::Record for $ty {
            fn descriptor() -> &'static [$crate::marshal::FieldDescriptor] {
                &[$($crate::marshal::FieldDescriptor {
                    name: stringify!($field),
                    kind: $crate::marshal::Kind::$kind,
                }),+]
            }

            fn capture(
                &self,
                out: &mut Vec<(&'static str, $crate::marshal::FieldValue)>,
            ) {
                $(out.push((
                    stringify!($field),
                    $crate::__record_capture!($kind, self.$field),
                ));)+
            }

            fn assign(&mut self, name: &str, value: $crate::marshal::FieldValue) {
                match name {
                    $(stringify!($field) => {
                        $crate::__record_assign!($kind, self.$field, value)
                    })+
                    _ => {}
                }
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_capture {
    (Int, $field:expr) => {
        $crate::marshal::FieldValue::Int($field as i64)
    };
    (Uint, $field:expr) => {
        $crate::marshal::FieldValue::Uint($field as u64)
    };
    (Float, $field:expr) => {
        $crate::marshal::FieldValue::Float($field as f64)
    };
    (Str, $field:expr) => {
        $crate::marshal::FieldValue::Str($field.clone())
    };
    (Bool, $field:expr) => {
        $crate::marshal::FieldValue::Bool($field)
    };
    (Bytes, $field:expr) => {
        $crate::marshal::FieldValue::Bytes($field.clone())
    };
    (Timestamp, $field:expr) => {
        $crate::marshal::FieldValue::Timestamp($field)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_assign {
    (Int, $field:expr, $value:expr) => {
        if let $crate::marshal::FieldValue::Int(v) = $value {
            $field = v as _;
        }
    };
    (Uint, $field:expr, $value:expr) => {
        if let $crate::marshal::FieldValue::Uint(v) = $value {
            $field = v as _;
        }
    };
    (Float, $field:expr, $value:expr) => {
        if let $crate::marshal::FieldValue::Float(v) = $value {
            $field = v as _;
        }
    };
    (Str, $field:expr, $value:expr) => {
        if let $crate::marshal::FieldValue::Str(v) = $value {
            $field = v;
        }
    };
    (Bool, $field:expr, $value:expr) => {
        if let $crate::marshal::FieldValue::Bool(v) = $value {
            $field = v;
        }
    };
    (Bytes, $field:expr, $value:expr) => {
        if let $crate::marshal::FieldValue::Bytes(v) = $value {
            $field = v;
        }
    };
    (Timestamp, $field:expr, $value:expr) => {
        if let $crate::marshal::FieldValue::Timestamp(v) = $value {
            $field = v;
        }
    };
}
