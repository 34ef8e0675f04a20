//! Error types for document parsing and canonicalization.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{BuildMethod, ServiceKind};

/// Result type alias for canonicalization.
pub type SemanticResult<T> = Result<T, SemanticError>;

/// Position in the source document (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// The document is not well-formed, or lacks a required top-level key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub location: Option<Location>,
    pub cause: String,
}

impl ParseError {
    pub fn new(location: Option<Location>, cause: impl Into<String>) -> Self {
        Self {
            location,
            cause: cause.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(location) => write!(f, "parse error at {location}: {}", self.cause),
            None => write!(f, "parse error: {}", self.cause),
        }
    }
}

impl std::error::Error for ParseError {}

/// The document is well-formed but violates the app schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticError {
    #[error("{}: app name must not be empty", crate::path::NAME)]
    EmptyName,

    #[error("{}: app declares no services", crate::path::SERVICES)]
    NoServices,

    #[error("{path}: unknown service type `{kind}` (expected web, worker, or job)")]
    UnknownKind { path: String, kind: String },

    #[error("{path}: no type provided and could not infer the kind from the service name")]
    KindUndeterminable { path: String },

    #[error("{path}: field is not applicable to {kind} services")]
    FieldNotApplicableToKind { path: String, kind: ServiceKind },

    #[error("{path}: field is not applicable to {method} builds")]
    FieldNotApplicableToBuildMethod { path: String, method: BuildMethod },

    #[error("ambiguous app source: {reason}")]
    AmbiguousSource { reason: &'static str },

    #[error("{path}: required field is missing")]
    MissingField { path: String },

    #[error("{path}: unknown build method `{method}` (expected pack or docker)")]
    UnknownBuildMethod { path: String, method: String },

    #[error("{path}: build method `{method}` is not supported here; declare registry images under `image`")]
    UnsupportedBuildMethod { path: String, method: String },

    #[error("{}: predeploy must be a job, found type `{kind}`", crate::path::PREDEPLOY)]
    PredeployNotJob { kind: String },

    #[error("{path}: {reason}")]
    InvalidValue { path: String, reason: String },

    #[error("{path}: declared kind {declared} does not match its {found} configuration")]
    KindMismatch {
        path: String,
        declared: ServiceKind,
        found: ServiceKind,
    },
}

impl SemanticError {
    /// Path of the offending field.
    pub fn path(&self) -> &str {
        match self {
            SemanticError::EmptyName => crate::path::NAME,
            SemanticError::NoServices => crate::path::SERVICES,
            SemanticError::AmbiguousSource { .. } => "",
            SemanticError::PredeployNotJob { .. } => crate::path::PREDEPLOY,
            SemanticError::UnknownKind { path, .. }
            | SemanticError::KindUndeterminable { path }
            | SemanticError::FieldNotApplicableToKind { path, .. }
            | SemanticError::FieldNotApplicableToBuildMethod { path, .. }
            | SemanticError::MissingField { path }
            | SemanticError::UnknownBuildMethod { path, .. }
            | SemanticError::UnsupportedBuildMethod { path, .. }
            | SemanticError::InvalidValue { path, .. }
            | SemanticError::KindMismatch { path, .. } => path,
        }
    }
}

/// Failure to turn document text into an [`AppSpecification`](crate::AppSpecification).
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_includes_location() {
        let err = ParseError::new(Some(Location { line: 3, column: 7 }), "unexpected key");
        assert_eq!(err.to_string(), "parse error at line 3, column 7: unexpected key");
        let err = ParseError::new(None, "missing required key `name`");
        assert_eq!(err.to_string(), "parse error: missing required key `name`");
    }

    #[test]
    fn semantic_error_reports_path() {
        let err = SemanticError::FieldNotApplicableToKind {
            path: "services.api.cron".to_string(),
            kind: ServiceKind::Web,
        };
        assert_eq!(err.path(), "services.api.cron");
        assert_eq!(
            err.to_string(),
            "services.api.cron: field is not applicable to web services"
        );
        assert_eq!(SemanticError::NoServices.path(), "services");
    }
}
