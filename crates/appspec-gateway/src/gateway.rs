//! The remote validation contract.

use std::future::Future;
use std::pin::Pin;

use appspec_core::AppSpecification;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::ValidateError;

/// Boxed future returned by [`ValidationGateway::validate`].
pub type GatewayFuture<'a> = Pin<Box<dyn Future<Output = Result<AppSpecification, ValidateError>> + Send + 'a>>;

/// Everything the authority needs to validate one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRequest {
    pub project_id: u64,
    pub deployment_target_id: String,
    pub commit_sha: String,
    pub app: AppSpecification,
}

/// A remote authority that validates, and may amend, a specification.
///
/// The returned specification is authoritative. Implementations must stop
/// and resolve to [`GatewayError::Cancelled`](crate::GatewayError::Cancelled)
/// once `cancel` turns `true`.
pub trait ValidationGateway: Send + Sync {
    fn validate<'a>(&'a self, request: &'a ValidationRequest, cancel: watch::Receiver<bool>) -> GatewayFuture<'a>;
}

/// JSON body of a validation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateAppRequest {
    pub b64_app_proto: String,
    pub deployment_target_id: String,
    pub commit_sha: String,
}

/// JSON body of a validation response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateAppResponse {
    #[serde(default)]
    pub validate_b64_app_proto: String,
}

impl ValidateAppRequest {
    pub fn new(request: &ValidationRequest) -> Self {
        Self {
            b64_app_proto: appspec_wire::encode_text(&request.app),
            deployment_target_id: request.deployment_target_id.clone(),
            commit_sha: request.commit_sha.clone(),
        }
    }
}

/// Resolve once `cancel` turns `true`. Never resolves if the sender is
/// dropped first.
pub async fn cancelled(mut cancel: watch::Receiver<bool>) {
    let closed = cancel.wait_for(|cancelled| *cancelled).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
