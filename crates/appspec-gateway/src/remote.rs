//! HTTP validation gateway.
//!
//! Posts the base64-encoded specification as JSON to
//! `{endpoint}/api/v1/projects/{project_id}/apps/validate` over a plain
//! HTTP/1.1 connection and decodes the authority's answer.

use appspec_core::AppSpecification;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::error::{ConfigError, GatewayError, ValidateError, ValidationError};
use crate::gateway::{
    GatewayFuture, ValidateAppRequest, ValidateAppResponse, ValidationGateway, ValidationRequest, cancelled,
};

#[derive(Debug, Clone)]
pub struct HttpValidationGateway {
    /// `host:port` to connect to.
    authority: String,
    /// Path prefix of the endpoint, without a trailing slash.
    base_path: String,
    user_agent: String,
}

impl HttpValidationGateway {
    pub fn new(endpoint: &str, user_agent: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };
        let uri: Uri = endpoint.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => return Err(invalid(&format!("unsupported scheme `{other}`"))),
            None => return Err(invalid("missing scheme")),
        }
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;
        let port = uri.port_u16().unwrap_or(80);
        Ok(Self {
            authority: format!("{host}:{port}"),
            base_path: uri.path().trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        Self::new(&config.gateway.endpoint, config.user_agent())
    }

    fn validate_path(&self, project_id: u64) -> String {
        format!("{}/api/v1/projects/{project_id}/apps/validate", self.base_path)
    }

    async fn call(&self, request: &ValidationRequest) -> Result<AppSpecification, ValidateError> {
        let body = serde_json::to_vec(&ValidateAppRequest::new(request))
            .map_err(|e| GatewayError::Request(e.to_string()))?;
        let path = self.validate_path(request.project_id);
        debug!(
            authority = %self.authority,
            %path,
            commit = %request.commit_sha,
            "posting app for validation"
        );
        self.post(&path, body).await
    }

    async fn post(&self, path: &str, body: Vec<u8>) -> Result<AppSpecification, ValidateError> {
        let stream = TcpStream::connect(&self.authority).await.map_err(|e| {
            debug!(error = %e, authority = %self.authority, "validation connection failed");
            GatewayError::Unreachable(e.to_string())
        })?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "validation connection closed with error");
            }
        });

        let request = http::Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(HOST, &self.authority)
            .header(USER_AGENT, &self.user_agent)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?
            .to_bytes();

        if status.is_client_error() {
            let message = error_message(status, &body);
            debug!(status = status.as_u16(), %message, "validation rejected");
            return Err(ValidationError {
                status: status.as_u16(),
                message,
            }
            .into());
        }
        if !status.is_success() {
            let message = error_message(status, &body);
            warn!(status = status.as_u16(), %message, "validation endpoint error");
            return Err(GatewayError::Server {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let parsed: ValidateAppResponse = if body.is_empty() {
            ValidateAppResponse::default()
        } else {
            serde_json::from_slice(&body).map_err(|e| GatewayError::MalformedResponse(e.to_string()))?
        };
        if parsed.validate_b64_app_proto.trim().is_empty() {
            return Err(GatewayError::EmptyResponse.into());
        }
        let app = appspec_wire::decode_text(&parsed.validate_b64_app_proto).map_err(GatewayError::from)?;
        Ok(app)
    }
}

impl ValidationGateway for HttpValidationGateway {
    fn validate<'a>(&'a self, request: &'a ValidationRequest, cancel: watch::Receiver<bool>) -> GatewayFuture<'a> {
        Box::pin(async move {
            tokio::select! {
                result = self.call(request) => result,
                _ = cancelled(cancel) => Err(GatewayError::Cancelled.into()),
            }
        })
    }
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        status.canonical_reason().unwrap_or("no message").to_string()
    } else {
        text
    }
}
