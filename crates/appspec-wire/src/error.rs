//! Wire codec errors.
//!
//! A codec error means the payload is corrupt, truncated, or was produced by
//! an incompatible contract version. None of them are retryable.

use appspec_core::ServiceKind;
use thiserror::Error;

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty payload")]
    Empty,

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("malformed protobuf payload: {0}")]
    Protobuf(#[from] prost::DecodeError),

    #[error("{path}: required field is missing")]
    MissingField { path: String },

    #[error("{path}: unknown service type {value}")]
    UnknownKind { path: String, value: i32 },

    #[error("{path}: service type {declared} does not match its {found} config")]
    KindMismatch {
        path: String,
        declared: ServiceKind,
        found: ServiceKind,
    },

    #[error("build.method: unknown build method `{0}`")]
    UnknownBuildMethod(String),

    #[error("ambiguous app source: payload declares {0}")]
    AmbiguousSource(&'static str),
}
