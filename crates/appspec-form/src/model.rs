//! Client form model.
//!
//! Mirrors [`AppSpecification`](appspec_core::AppSpecification) leaf for
//! leaf, with every editable leaf wrapped in a [`FieldProvenance`]. The model
//! serializes to the JSON shape the form UI renders.

use std::collections::BTreeMap;

use appspec_core::{BuildMethod, ServiceKind, path};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FormError, FormResult};
use crate::locks::FieldLocks;
use crate::provenance::FieldProvenance;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAppModel {
    pub name: FieldProvenance<String>,
    #[serde(default)]
    pub env: BTreeMap<String, FieldProvenance<String>>,
    pub source: ClientSource,
    pub services: BTreeMap<String, ClientServiceModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predeploy: Option<ClientServiceModel>,
}

/// Where a service entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceOrigin {
    /// Present in the declarative source or the validated specification.
    DetectedFromSource,
    /// Created in the form and not yet seen in any specification.
    UserAdded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientServiceModel {
    pub origin: ServiceOrigin,
    /// Identity of the entry. Must agree with the variant of `config`.
    pub kind: ServiceKind,
    pub run: FieldProvenance<String>,
    pub instances: FieldProvenance<u32>,
    pub cpu_cores: FieldProvenance<f32>,
    pub ram_megabytes: FieldProvenance<u32>,
    pub port: FieldProvenance<u32>,
    pub config: ClientServiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientServiceConfig {
    Web(ClientWebConfig),
    Worker(ClientWorkerConfig),
    Job(ClientJobConfig),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientWebConfig {
    pub domains: FieldProvenance<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<ClientHealthCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<ClientAutoscaling>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientWorkerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<ClientAutoscaling>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientJobConfig {
    pub cron: FieldProvenance<String>,
    pub allow_concurrent: FieldProvenance<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAutoscaling {
    pub enabled: FieldProvenance<bool>,
    pub min_instances: FieldProvenance<u32>,
    pub max_instances: FieldProvenance<u32>,
    pub cpu_threshold_percent: FieldProvenance<u32>,
    pub memory_threshold_percent: FieldProvenance<u32>,
}

impl ClientAutoscaling {
    pub(crate) fn has_locked_field(&self) -> bool {
        self.enabled.is_source_locked()
            || self.min_instances.is_source_locked()
            || self.max_instances.is_source_locked()
            || self.cpu_threshold_percent.is_source_locked()
            || self.memory_threshold_percent.is_source_locked()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientHealthCheck {
    pub enabled: FieldProvenance<bool>,
    pub http_path: FieldProvenance<String>,
}

impl ClientHealthCheck {
    pub(crate) fn has_locked_field(&self) -> bool {
        self.enabled.is_source_locked() || self.http_path.is_source_locked()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientSource {
    Image {
        repository: FieldProvenance<String>,
        tag: FieldProvenance<String>,
    },
    Pack {
        context: FieldProvenance<String>,
        builder: FieldProvenance<String>,
        buildpacks: FieldProvenance<Vec<String>>,
    },
    Docker {
        context: FieldProvenance<String>,
        dockerfile: FieldProvenance<String>,
    },
}

impl ClientSource {
    pub fn build_method(&self) -> Option<BuildMethod> {
        match self {
            ClientSource::Image { .. } => None,
            ClientSource::Pack { .. } => Some(BuildMethod::Pack),
            ClientSource::Docker { .. } => Some(BuildMethod::Docker),
        }
    }

    /// Whether any leaf of the selected source is owned by the document.
    pub fn is_source_locked(&self) -> bool {
        match self {
            ClientSource::Image { repository, tag } => {
                repository.is_source_locked() || tag.is_source_locked()
            }
            ClientSource::Pack {
                context,
                builder,
                buildpacks,
            } => {
                context.is_source_locked()
                    || builder.is_source_locked()
                    || buildpacks.is_source_locked()
            }
            ClientSource::Docker {
                context,
                dockerfile,
            } => context.is_source_locked() || dockerfile.is_source_locked(),
        }
    }

    /// Switch to a build of the given method, keeping the build context.
    ///
    /// Refused while the document declares the source, since the next
    /// refresh would put the declared variant back.
    pub fn select_build_method(&mut self, method: BuildMethod) -> FormResult<()> {
        if self.is_source_locked() {
            return Err(FormError::FieldLocked {
                path: path::BUILD_METHOD.to_string(),
            });
        }
        if self.build_method() == Some(method) {
            return Ok(());
        }
        let context = match self {
            ClientSource::Pack { context, .. } | ClientSource::Docker { context, .. } => {
                context.value().clone()
            }
            ClientSource::Image { .. } => String::new(),
        };
        *self = match method {
            BuildMethod::Pack => ClientSource::Pack {
                context: FieldProvenance::editable(context),
                builder: FieldProvenance::default(),
                buildpacks: FieldProvenance::default(),
            },
            BuildMethod::Docker => ClientSource::Docker {
                context: FieldProvenance::editable(context),
                dockerfile: FieldProvenance::default(),
            },
        };
        Ok(())
    }
}

impl ClientServiceConfig {
    pub fn empty(kind: ServiceKind) -> Self {
        match kind {
            ServiceKind::Web => ClientServiceConfig::Web(ClientWebConfig::default()),
            ServiceKind::Worker => ClientServiceConfig::Worker(ClientWorkerConfig::default()),
            ServiceKind::Job => ClientServiceConfig::Job(ClientJobConfig::default()),
        }
    }

    pub fn kind(&self) -> ServiceKind {
        match self {
            ClientServiceConfig::Web(_) => ServiceKind::Web,
            ClientServiceConfig::Worker(_) => ServiceKind::Worker,
            ClientServiceConfig::Job(_) => ServiceKind::Job,
        }
    }
}

impl ClientServiceModel {
    /// A blank service of the given kind, as created from the form.
    pub fn user_added(kind: ServiceKind) -> Self {
        Self {
            origin: ServiceOrigin::UserAdded,
            kind,
            run: FieldProvenance::default(),
            instances: FieldProvenance::editable(1),
            cpu_cores: FieldProvenance::default(),
            ram_megabytes: FieldProvenance::default(),
            port: FieldProvenance::default(),
            config: ClientServiceConfig::empty(kind),
        }
    }
}

impl ClientAppModel {
    pub fn service(&self, name: &str) -> Option<&ClientServiceModel> {
        self.services.get(name)
    }

    pub fn service_mut(&mut self, name: &str) -> Option<&mut ClientServiceModel> {
        self.services.get_mut(name)
    }

    /// Paths of every leaf currently locked by the source.
    pub fn locks(&self) -> FieldLocks {
        FieldLocks::locked_in(self)
    }

    /// Create a blank service of the given kind.
    pub fn add_service(&mut self, name: &str, kind: ServiceKind) -> FormResult<&mut ClientServiceModel> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FormError::EmptyServiceName);
        }
        if name.contains(path::SEPARATOR) {
            return Err(FormError::InvalidServiceName(name.to_string()));
        }
        if self.services.contains_key(name) {
            return Err(FormError::DuplicateService(name.to_string()));
        }
        debug!(service = %name, kind = %kind, "service added in form");
        Ok(self
            .services
            .entry(name.to_string())
            .or_insert_with(|| ClientServiceModel::user_added(kind)))
    }

    /// Remove a service created in the form.
    ///
    /// Services detected from the source cannot be removed here; they go
    /// away when the document stops declaring them.
    pub fn remove_service(&mut self, name: &str) -> FormResult<ClientServiceModel> {
        match self.services.get(name) {
            None => Err(FormError::UnknownService(name.to_string())),
            Some(service) if service.origin == ServiceOrigin::DetectedFromSource => {
                Err(FormError::SourceDeclared(name.to_string()))
            }
            Some(_) => {
                debug!(service = %name, "service removed in form");
                self.services
                    .remove(name)
                    .ok_or_else(|| FormError::UnknownService(name.to_string()))
            }
        }
    }

    /// Set an environment variable, unless the document declares it.
    pub fn set_env(&mut self, key: &str, value: String) -> FormResult<()> {
        match self.env.get_mut(key) {
            Some(field) => field.set(value).map_err(|_| FormError::FieldLocked {
                path: path::env(key),
            }),
            None => {
                self.env.insert(key.to_string(), FieldProvenance::editable(value));
                Ok(())
            }
        }
    }

    pub fn remove_env(&mut self, key: &str) -> FormResult<Option<String>> {
        if self.env.get(key).is_some_and(FieldProvenance::is_source_locked) {
            return Err(FormError::FieldLocked {
                path: path::env(key),
            });
        }
        Ok(self.env.remove(key).map(FieldProvenance::into_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ClientAppModel {
        let mut services = BTreeMap::new();
        let mut web = ClientServiceModel::user_added(ServiceKind::Web);
        web.origin = ServiceOrigin::DetectedFromSource;
        web.port = FieldProvenance::locked(8080);
        services.insert("api".to_string(), web);
        ClientAppModel {
            name: FieldProvenance::locked("demo".to_string()),
            env: BTreeMap::from([(
                "PORT".to_string(),
                FieldProvenance::locked("8080".to_string()),
            )]),
            source: ClientSource::Image {
                repository: FieldProvenance::locked("nginx".to_string()),
                tag: FieldProvenance::editable("latest".to_string()),
            },
            services,
            predeploy: None,
        }
    }

    #[test]
    fn adds_and_removes_user_services() {
        let mut model = model();
        let added = model.add_service("cron", ServiceKind::Job).unwrap();
        assert_eq!(added.origin, ServiceOrigin::UserAdded);
        assert_eq!(added.config.kind(), ServiceKind::Job);

        assert_eq!(
            model.add_service("cron", ServiceKind::Worker).unwrap_err(),
            FormError::DuplicateService("cron".into())
        );
        assert_eq!(
            model.add_service("  ", ServiceKind::Worker).unwrap_err(),
            FormError::EmptyServiceName
        );
        assert_eq!(
            model.add_service("api.healthCheck", ServiceKind::Web).unwrap_err(),
            FormError::InvalidServiceName("api.healthCheck".into())
        );

        let removed = model.remove_service("cron").unwrap();
        assert_eq!(removed.kind, ServiceKind::Job);
        assert!(model.service("cron").is_none());
    }

    #[test]
    fn detected_services_cannot_be_removed() {
        let mut model = model();
        assert_eq!(
            model.remove_service("api").unwrap_err(),
            FormError::SourceDeclared("api".into())
        );
        assert_eq!(
            model.remove_service("ghost").unwrap_err(),
            FormError::UnknownService("ghost".into())
        );
    }

    #[test]
    fn declared_env_is_read_only() {
        let mut model = model();
        assert_eq!(
            model.set_env("PORT", "9090".into()).unwrap_err(),
            FormError::FieldLocked {
                path: "env.PORT".into()
            }
        );
        assert!(model.remove_env("PORT").is_err());

        model.set_env("DEBUG", "1".into()).unwrap();
        model.set_env("DEBUG", "0".into()).unwrap();
        assert_eq!(model.env["DEBUG"].value(), "0");
        assert_eq!(model.remove_env("DEBUG").unwrap(), Some("0".to_string()));
    }

    #[test]
    fn declared_source_refuses_method_switch() {
        let mut model = model();
        assert!(matches!(
            model.source.select_build_method(BuildMethod::Docker),
            Err(FormError::FieldLocked { .. })
        ));
    }

    #[test]
    fn editable_source_switches_method_and_keeps_context() {
        let mut source = ClientSource::Pack {
            context: FieldProvenance::editable("./app".to_string()),
            builder: FieldProvenance::editable("heroku/builder:22".to_string()),
            buildpacks: FieldProvenance::default(),
        };
        source.select_build_method(BuildMethod::Docker).unwrap();
        match &source {
            ClientSource::Docker {
                context,
                dockerfile,
            } => {
                assert_eq!(context.value(), "./app");
                assert!(dockerfile.value().is_empty());
            }
            other => panic!("expected docker source, got {other:?}"),
        }
    }
}
