//! RESP Protocol Implementation (client side)
//!
//! The backing store speaks RESP2, a simple binary-safe request/reply
//! protocol. A client only ever *encodes* command arrays of bulk strings
//! and *decodes* server replies, so that is all this module implements.
//!
//! ## Modules
//!
//! - `reply`: the [`Reply`] enum and typed accessors
//! - `codec`: command encoding and incremental reply decoding
//!
//! ## Example
//!
//! ```
//! use steadykv::protocol::{decode_reply, encode_command, Reply};
//!
//! let mut buf = Vec::new();
//! encode_command(&[b"GET", b"name"], &mut buf);
//! assert_eq!(buf, b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n");
//!
//! let (reply, consumed) = decode_reply(b"+PONG\r\n").unwrap().unwrap();
//! assert_eq!(reply, Reply::Simple("PONG".to_string()));
//! assert_eq!(consumed, 7);
//! ```

pub mod codec;
pub mod reply;

// Re-export commonly used types for convenience
pub use codec::{decode_reply, encode_command, ProtocolError};
pub use reply::Reply;
