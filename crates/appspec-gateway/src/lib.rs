//! appspec-gateway — remote validation and the editing session.
//!
//! A [`ValidationGateway`] sends a canonical specification to the remote
//! authority and returns the authoritative, possibly amended, result. The
//! [`EditingSession`] owns a form model and runs the submit cycle:
//!
//! ```text
//! Draft ──begin_submission──▶ Validating ──complete──▶ Validated ──apply──▶ Applied
//!                                  │                       │
//!                                  └──────▶ ValidationFailed ◀── (edit → Draft)
//! ```
//!
//! Only the latest submission's result is applied.

pub mod config;
pub mod error;
pub mod gateway;
pub mod remote;
pub mod session;

pub use config::{GatewayConfig, parse_duration};
pub use error::{ConfigError, GatewayError, SessionError, ValidateError, ValidationError};
pub use gateway::{GatewayFuture, ValidateAppRequest, ValidateAppResponse, ValidationGateway, ValidationRequest};
pub use remote::HttpValidationGateway;
pub use session::{Completion, EditingSession, SessionState, Submission, ValidationTarget};
