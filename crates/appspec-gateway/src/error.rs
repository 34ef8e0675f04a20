//! Validation and session errors.

use std::time::Duration;

use appspec_core::SemanticError;
use appspec_wire::CodecError;
use thiserror::Error;

/// The remote authority rejected the specification.
///
/// Not retryable: the same submission will be rejected again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation rejected with status {status}: {message}")]
pub struct ValidationError {
    pub status: u16,
    pub message: String,
}

/// The validation call itself failed.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation timed out after {0:?}")]
    Timeout(Duration),

    #[error("validation endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("validation endpoint failed with status {status}: {message}")]
    Server { status: u16, message: String },

    /// A success status with no specification in the body.
    #[error("validation response carried no app specification")]
    EmptyResponse,

    #[error("validation response is not valid JSON: {0}")]
    MalformedResponse(String),

    #[error("validation response could not be decoded: {0}")]
    Decode(#[from] CodecError),

    #[error("invalid validation request: {0}")]
    Request(String),

    #[error("validation cancelled by a newer submission")]
    Cancelled,
}

impl GatewayError {
    /// Whether resubmitting unchanged input may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Timeout(_)
            | GatewayError::Unreachable(_)
            | GatewayError::Server { .. }
            | GatewayError::EmptyResponse => true,
            GatewayError::MalformedResponse(_)
            | GatewayError::Decode(_)
            | GatewayError::Request(_)
            | GatewayError::Cancelled => false,
        }
    }
}

/// Outcome of a failed validation call.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Rejected(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ValidateError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ValidateError::Rejected(_) => false,
            ValidateError::Gateway(err) => err.is_retryable(),
        }
    }
}

/// An editing session refused an operation.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The form model does not describe a valid specification. Nothing was
    /// sent.
    #[error("submission refused: {0}")]
    Semantic(#[from] SemanticError),

    #[error("cannot {action} while the session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid gateway config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize gateway config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid duration `{0}` (expected e.g. \"10s\", \"500ms\", \"2m\")")]
    InvalidDuration(String),

    #[error("invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}
