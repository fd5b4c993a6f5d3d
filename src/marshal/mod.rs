//! Entity Marshalling Module
//!
//! Maps a typed record to and from the flat field-name→string hash the
//! store persists under a single key. No runtime reflection is involved;
//! the genericity comes from a capability-based split:
//!
//! - [`Kind`] names the supported semantic kinds and owns one
//!   encode/decode codec per kind (`value` submodule)
//! - [`Record`] exposes a type's declared fields as a static descriptor
//!   plus capture/assign hooks (`record` submodule)
//! - [`impl_record!`](crate::impl_record) generates the `Record` impl so
//!   callers write zero per-type marshalling code
//!
//! ## Leniency
//!
//! The marshaller is deliberately forgiving by default: hash entries with
//! no matching field are ignored, and malformed values leave the field at
//! its zero value. [`MarshalMode::Strict`] turns the latter into
//! [`MarshalError::Malformed`] for callers that would rather know.
//!
//! ## Example
//!
//! ```
//! use steadykv::impl_record;
//! use steadykv::marshal::{from_hash, to_hash, MarshalMode};
//!
//! #[derive(Default, PartialEq, Debug)]
//! struct Session {
//!     user_id: u64,
//!     name: String,
//!     premium: bool,
//! }
//!
//! impl_record!(Session { user_id: Uint, name: Str, premium: Bool });
//!
//! let session = Session { user_id: 42, name: "kira".into(), premium: true };
//! let hash = to_hash(&session);
//! assert_eq!(hash["premium"], "1");
//!
//! let mut restored = Session::default();
//! from_hash(&mut restored, &hash, MarshalMode::Lenient).unwrap();
//! assert_eq!(restored, session);
//! ```

pub mod record;
pub mod value;

// Re-export commonly used types
pub use record::{
    assign_one, capture_one, from_hash, to_hash, FieldDescriptor, Hash,
    MarshalError, MarshalMode, Record,
};
pub use value::{FieldValue, Kind};
