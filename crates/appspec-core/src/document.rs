//! Declarative app document parser.
//!
//! Turns YAML text into a [`RawDocument`]: a loosely-typed mirror of the
//! document schema where every key is optional. Only syntax and the presence
//! of the required top-level keys (`name`, `services`) are checked here;
//! everything else is the canonicalizer's job.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Location, ParseError};
use crate::types::KindField;

/// A parsed but unvalidated app document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocument {
    pub name: Option<String>,
    pub services: Option<BTreeMap<String, RawService>>,
    pub image: Option<RawImage>,
    pub build: Option<RawBuild>,
    pub env: Option<BTreeMap<String, EnvValue>>,
    pub predeploy: Option<RawService>,
}

/// One entry under `services` (or the `predeploy` entry).
///
/// Numbers stay signed here so that negative values reach the
/// canonicalizer and are reported with their field path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawService {
    pub run: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub instances: Option<i64>,
    pub cpu_cores: Option<f64>,
    pub ram_megabytes: Option<i64>,
    pub port: Option<i64>,
    pub autoscaling: Option<RawAutoscaling>,
    pub domains: Option<Vec<RawDomain>>,
    pub health_check: Option<RawHealthCheck>,
    pub allow_concurrent: Option<bool>,
    pub cron: Option<String>,
}

impl RawService {
    /// Whether the entry declares the given kind-specific field.
    pub fn declares(&self, field: KindField) -> bool {
        match field {
            KindField::Autoscaling => self.autoscaling.is_some(),
            KindField::Domains => self.domains.is_some(),
            KindField::HealthCheck => self.health_check.is_some(),
            KindField::Cron => self.cron.is_some(),
            KindField::AllowConcurrent => self.allow_concurrent.is_some(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAutoscaling {
    pub enabled: Option<bool>,
    pub min_instances: Option<i64>,
    pub max_instances: Option<i64>,
    pub cpu_threshold_percent: Option<i64>,
    pub memory_threshold_percent: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDomain {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHealthCheck {
    pub enabled: Option<bool>,
    pub http_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawImage {
    pub repository: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBuild {
    pub context: Option<String>,
    pub method: Option<String>,
    pub builder: Option<String>,
    pub buildpacks: Option<Vec<String>>,
    pub dockerfile: Option<String>,
}

/// Scalar value of an `env` entry.
///
/// YAML authors routinely write `PORT: 8080` unquoted; any scalar is
/// accepted and rendered back to its textual form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Bool(b) => write!(f, "{b}"),
            EnvValue::Integer(i) => write!(f, "{i}"),
            EnvValue::Float(x) => write!(f, "{x}"),
            EnvValue::String(s) => f.write_str(s),
        }
    }
}

/// Parse document bytes into a [`RawDocument`].
pub fn parse_document(bytes: &[u8]) -> Result<RawDocument, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|e| {
        ParseError::new(
            Some(location_of_offset(bytes, e.valid_up_to())),
            format!("document is not valid UTF-8: {e}"),
        )
    })?;

    let raw: RawDocument = serde_norway::from_str(text).map_err(|e| {
        let location = e.location().map(|l| Location {
            line: l.line(),
            column: l.column(),
        });
        ParseError::new(location, e.to_string())
    })?;

    if raw.name.is_none() {
        return Err(ParseError::new(None, "missing required key `name`"));
    }
    if raw.services.is_none() {
        return Err(ParseError::new(None, "missing required key `services`"));
    }

    debug!(
        name = raw.name.as_deref().unwrap_or_default(),
        services = raw.services.as_ref().map_or(0, BTreeMap::len),
        "parsed app document"
    );
    Ok(raw)
}

/// 1-based line/column of a byte offset.
fn location_of_offset(bytes: &[u8], offset: usize) -> Location {
    let before = &bytes[..offset.min(bytes.len())];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    Location {
        line,
        column: offset - line_start + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document() {
        let yaml = r#"
name: demo
services:
  web:
    run: node index.js
    port: 8080
"#;
        let raw = parse_document(yaml.as_bytes()).unwrap();
        assert_eq!(raw.name.as_deref(), Some("demo"));
        let web = &raw.services.as_ref().unwrap()["web"];
        assert_eq!(web.run.as_deref(), Some("node index.js"));
        assert_eq!(web.port, Some(8080));
        assert!(web.kind.is_none());
        assert!(raw.image.is_none());
    }

    #[test]
    fn missing_name_is_a_parse_error() {
        let err = parse_document(b"services:\n  web:\n    port: 80\n").unwrap_err();
        assert!(err.cause.contains("`name`"));
        assert!(err.location.is_none());
    }

    #[test]
    fn missing_services_is_a_parse_error() {
        let err = parse_document(b"name: demo\n").unwrap_err();
        assert!(err.cause.contains("`services`"));
    }

    #[test]
    fn malformed_yaml_reports_location() {
        let yaml = "name: demo\nservices:\n  web: [unclosed\n";
        let err = parse_document(yaml.as_bytes()).unwrap_err();
        assert!(err.location.is_some());
    }

    #[test]
    fn invalid_utf8_reports_location() {
        let mut bytes = b"name: demo\nservices: ".to_vec();
        bytes.push(0xff);
        let err = parse_document(&bytes).unwrap_err();
        assert_eq!(err.location, Some(Location { line: 2, column: 11 }));
    }

    #[test]
    fn env_scalars_are_stringified() {
        let yaml = r#"
name: demo
services: {}
env:
  PORT: 8080
  DEBUG: true
  NODE_ENV: production
"#;
        let raw = parse_document(yaml.as_bytes()).unwrap();
        let env = raw.env.unwrap();
        assert_eq!(env["PORT"].to_string(), "8080");
        assert_eq!(env["DEBUG"].to_string(), "true");
        assert_eq!(env["NODE_ENV"].to_string(), "production");
    }

    #[test]
    fn tracks_kind_specific_keys() {
        let yaml = r#"
name: demo
services:
  nightly:
    cron: "0 0 * * *"
    allowConcurrent: false
"#;
        let raw = parse_document(yaml.as_bytes()).unwrap();
        let nightly = &raw.services.unwrap()["nightly"];
        assert!(nightly.declares(KindField::Cron));
        assert!(nightly.declares(KindField::AllowConcurrent));
        assert!(!nightly.declares(KindField::Domains));
    }
}
