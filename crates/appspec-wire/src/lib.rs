//! appspec-wire — transport encoding for app specifications.
//!
//! Specifications travel as protobuf bytes (see [`proto`]) and, inside JSON
//! request/response bodies, as standard base64 text. Both layers round-trip
//! exactly: `decode(encode(x)) == x` for every valid specification.

pub mod codec;
pub mod error;
pub mod proto;

pub use codec::{decode, decode_text, encode, encode_text, fingerprint};
pub use error::{CodecError, CodecResult};
