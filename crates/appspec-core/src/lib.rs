//! appspec-core — declarative app documents and canonical app specifications.
//!
//! # Pipeline
//!
//! ```text
//! YAML bytes ──parse_document()──▶ RawDocument ──canonicalize()──▶ AppSpecification
//! ```
//!
//! The parser only checks syntax and required top-level keys. The
//! canonicalizer resolves service kinds, enforces the per-kind field schema,
//! selects the image source, and fills defaults. The resulting
//! [`AppSpecification`] is a strict sum type: a service's kind is the
//! variant of its config, so no spec can carry fields of another kind.

pub mod canonical;
pub mod document;
pub mod error;
pub mod path;
pub mod types;

use std::path::Path;

pub use canonical::{KindResolution, KindSource, canonicalize, resolve_kind};
pub use document::{RawDocument, RawService, parse_document};
pub use error::{DocumentError, Location, ParseError, SemanticError, SemanticResult};
pub use types::*;

impl AppSpecification {
    /// Parse and canonicalize a YAML app document.
    pub fn from_yaml(bytes: &[u8]) -> Result<Self, DocumentError> {
        let raw = parse_document(bytes)?;
        Ok(canonicalize(&raw)?)
    }

    /// Read, parse, and canonicalize an app document from disk.
    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let bytes = std::fs::read(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&bytes)
    }
}
