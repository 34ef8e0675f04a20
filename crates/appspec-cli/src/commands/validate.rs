use std::path::Path;

use anyhow::Context;
use appspec_core::{canonicalize, parse_document};
use appspec_form::FieldLocks;
use appspec_gateway::{
    Completion, EditingSession, GatewayConfig, HttpValidationGateway, SessionState, ValidationTarget,
};
use tracing::info;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub timeout: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut GatewayConfig) {
        if let Some(endpoint) = self.endpoint {
            config.gateway.endpoint = endpoint;
        }
        if let Some(timeout) = self.timeout {
            config.gateway.timeout = timeout;
        }
    }
}

pub async fn validate(path: &Path, commit: &str, config_path: &Path, overrides: Overrides) -> anyhow::Result<()> {
    let mut config = GatewayConfig::from_file(config_path)?;
    overrides.apply(&mut config);
    let timeout = config.timeout()?;
    let gateway = HttpValidationGateway::from_config(&config)?;

    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let raw = parse_document(&bytes)?;
    let spec = canonicalize(&raw)?;

    let target = ValidationTarget {
        project_id: config.target.project_id,
        deployment_target_id: config.target.deployment_target_id.clone(),
    };
    let mut session = EditingSession::new(target, &spec, &FieldLocks::declared_in(&raw), timeout);

    match session.submit(&gateway, commit).await? {
        Completion::Validated(summary) => {
            info!(
                kept = summary.kept.len(),
                added = summary.added.len(),
                dropped = summary.dropped.len(),
                "app validated"
            );
            let validated = session.apply()?;
            println!("{}", serde_json::to_string_pretty(&validated)?);
            Ok(())
        }
        Completion::Failed { retryable } => match session.state() {
            SessionState::ValidationFailed { error } if retryable => {
                anyhow::bail!("{error} (retryable)")
            }
            SessionState::ValidationFailed { error } => anyhow::bail!("{error}"),
            other => anyhow::bail!("validation failed (session is {})", other.label()),
        },
        Completion::Reopened(_) => anyhow::bail!("app changed during validation; resubmit"),
        Completion::Discarded => anyhow::bail!("validation result was superseded"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let mut config = GatewayConfig::new("http://127.0.0.1:8080", 1, "dt");
        Overrides {
            endpoint: Some("http://10.0.0.5:9000".into()),
            timeout: None,
        }
        .apply(&mut config);
        assert_eq!(config.gateway.endpoint, "http://10.0.0.5:9000");
        assert_eq!(config.gateway.timeout, "30s");
    }

    #[tokio::test]
    async fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("porter.yaml");
        std::fs::write(&doc, "name: a\nservices:\n  web:\n    run: x\nimage:\n  repository: nginx\n").unwrap();
        let err = validate(&doc, "abc", &dir.path().join("appspec.toml"), Overrides::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("appspec.toml"), "{err}");
    }
}
