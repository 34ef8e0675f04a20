//! appspec.toml gateway configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_TIMEOUT: &str = "30s";
pub const DEFAULT_USER_AGENT: &str = concat!("appspec/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub gateway: EndpointConfig,
    pub target: TargetConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL of the validation API, e.g. `http://127.0.0.1:8080`.
    pub endpoint: String,
    #[serde(default = "default_timeout")]
    pub timeout: String,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub project_id: u64,
    pub deployment_target_id: String,
}

fn default_timeout() -> String {
    DEFAULT_TIMEOUT.to_string()
}

impl GatewayConfig {
    pub fn new(endpoint: &str, project_id: u64, deployment_target_id: &str) -> Self {
        Self {
            gateway: EndpointConfig {
                endpoint: endpoint.to_string(),
                timeout: default_timeout(),
                user_agent: None,
            },
            target: TargetConfig {
                project_id,
                deployment_target_id: deployment_target_id.to_string(),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig = toml::from_str(content)?;
        config.timeout()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Per-submission timeout.
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.gateway.timeout).ok_or_else(|| ConfigError::InvalidDuration(self.gateway.timeout.clone()))
    }

    pub fn user_agent(&self) -> &str {
        self.gateway.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok()?.checked_mul(60).map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
