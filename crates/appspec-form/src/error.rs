//! Client form errors.

use thiserror::Error;

pub type FormResult<T> = Result<T, FormError>;

/// A local edit the form model refuses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{path}: field is locked by the app document")]
    FieldLocked { path: String },

    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("service name `{0}` must not contain `.`")]
    InvalidServiceName(String),

    #[error("service `{0}` already exists")]
    DuplicateService(String),

    #[error("service `{0}` does not exist")]
    UnknownService(String),

    #[error("service `{0}` is declared by the app document and cannot be removed")]
    SourceDeclared(String),
}
