//! Translation between canonical specifications and the client form model.

use std::collections::BTreeMap;

use appspec_core::{
    AppSource, AppSpecification, Autoscaling, BuildStrategy, HealthCheck, ImageRef, JobConfig, SemanticError,
    SemanticResult, ServiceConfig, ServiceKind, ServiceSpec, WebConfig, WorkerConfig, path,
};
use tracing::debug;

use crate::locks::FieldLocks;
use crate::model::{
    ClientAppModel, ClientAutoscaling, ClientHealthCheck, ClientJobConfig, ClientServiceConfig, ClientServiceModel,
    ClientSource, ClientWebConfig, ClientWorkerConfig, ServiceOrigin,
};
use crate::provenance::FieldProvenance;

/// Project a canonical specification onto the form model.
///
/// Leaves in `locks` take the specification's value and are source-locked.
/// Other leaves keep the user's value from `prior` when it has one, and
/// otherwise take the specification's value as an editable default. Entries
/// present only in `prior` are dropped, and a service whose kind changed is
/// rebuilt from the specification.
pub fn to_client_model(
    spec: &AppSpecification,
    locks: &FieldLocks,
    prior: Option<&ClientAppModel>,
) -> ClientAppModel {
    let merge = Merge { locks };

    let env = spec
        .env
        .iter()
        .map(|(key, value)| {
            let field = merge.field(
                &path::env(key),
                value.clone(),
                prior.and_then(|prior| prior.env.get(key)),
            );
            (key.clone(), field)
        })
        .collect();

    let services = spec
        .services
        .iter()
        .map(|(name, service)| {
            let previous = prior
                .and_then(|prior| prior.services.get(name))
                .filter(|previous| previous.kind == service.kind());
            let model = merge.service(service, &path::service(name), previous);
            (name.clone(), model)
        })
        .collect();

    let predeploy = spec.predeploy.as_ref().map(|service| {
        let previous = prior
            .and_then(|prior| prior.predeploy.as_ref())
            .filter(|previous| previous.kind == service.kind());
        merge.service(service, path::PREDEPLOY, previous)
    });

    let model = ClientAppModel {
        name: merge.field(path::NAME, spec.name.clone(), prior.map(|prior| &prior.name)),
        env,
        source: merge.source(&spec.source, prior.map(|prior| &prior.source)),
        services,
        predeploy,
    };
    debug!(
        app = %spec.name,
        services = model.services.len(),
        locked = locks.len(),
        "projected specification onto form model"
    );
    model
}

/// Rebuild a canonical specification from the form model.
///
/// Provenance is discarded. Fails when a service's declared kind disagrees
/// with its configuration, or when a leaf the canonical form requires is
/// empty or out of range.
pub fn from_client_model(model: &ClientAppModel) -> SemanticResult<AppSpecification> {
    let name = model.name.value().trim();
    if name.is_empty() {
        return Err(SemanticError::EmptyName);
    }
    if model.services.is_empty() {
        return Err(SemanticError::NoServices);
    }

    let mut services = BTreeMap::new();
    for (service_name, service) in &model.services {
        let spec = service_spec(service, &path::service(service_name))?;
        services.insert(service_name.clone(), spec);
    }

    let predeploy = match &model.predeploy {
        Some(service) if service.kind != ServiceKind::Job => {
            return Err(SemanticError::PredeployNotJob {
                kind: service.kind.to_string(),
            });
        }
        Some(service) => Some(service_spec(service, path::PREDEPLOY)?),
        None => None,
    };

    let env = model
        .env
        .iter()
        .map(|(key, value)| (key.clone(), value.value().clone()))
        .collect();

    Ok(AppSpecification {
        name: name.to_string(),
        env,
        source: app_source(&model.source)?,
        services,
        predeploy,
    })
}

struct Merge<'a> {
    locks: &'a FieldLocks,
}

impl Merge<'_> {
    fn field<T: Clone>(&self, path: &str, spec_value: T, prior: Option<&FieldProvenance<T>>) -> FieldProvenance<T> {
        if self.locks.contains(path) {
            return FieldProvenance::locked(spec_value);
        }
        match prior {
            // A value the source used to own is not a user edit.
            Some(prior) if !prior.is_source_locked() => FieldProvenance::editable(prior.value().clone()),
            _ => FieldProvenance::editable(spec_value),
        }
    }

    fn source(&self, spec: &AppSource, prior: Option<&ClientSource>) -> ClientSource {
        match spec {
            AppSource::Image(ImageRef { repository, tag }) => {
                let (prior_repository, prior_tag) = match prior {
                    Some(ClientSource::Image { repository, tag }) => (Some(repository), Some(tag)),
                    _ => (None, None),
                };
                ClientSource::Image {
                    repository: self.field(path::IMAGE_REPOSITORY, repository.clone(), prior_repository),
                    tag: self.field(path::IMAGE_TAG, tag.clone(), prior_tag),
                }
            }
            AppSource::Build(BuildStrategy::Pack {
                context,
                builder,
                buildpacks,
            }) => {
                let (prior_context, prior_builder, prior_buildpacks) = match prior {
                    Some(ClientSource::Pack {
                        context,
                        builder,
                        buildpacks,
                    }) => (Some(context), Some(builder), Some(buildpacks)),
                    _ => (None, None, None),
                };
                ClientSource::Pack {
                    context: self.field(path::BUILD_CONTEXT, context.clone(), prior_context),
                    builder: self.field(path::BUILD_BUILDER, builder.clone(), prior_builder),
                    buildpacks: self.field(path::BUILD_BUILDPACKS, buildpacks.clone(), prior_buildpacks),
                }
            }
            AppSource::Build(BuildStrategy::Docker {
                context,
                dockerfile,
            }) => {
                let (prior_context, prior_dockerfile) = match prior {
                    Some(ClientSource::Docker {
                        context,
                        dockerfile,
                    }) => (Some(context), Some(dockerfile)),
                    _ => (None, None),
                };
                ClientSource::Docker {
                    context: self.field(path::BUILD_CONTEXT, context.clone(), prior_context),
                    dockerfile: self.field(path::BUILD_DOCKERFILE, dockerfile.clone(), prior_dockerfile),
                }
            }
        }
    }

    fn service(&self, spec: &ServiceSpec, root: &str, prior: Option<&ClientServiceModel>) -> ClientServiceModel {
        let at = |key: &str| path::join(root, key);
        let config = match (&spec.config, prior.map(|prior| &prior.config)) {
            (ServiceConfig::Web(web), prior) => {
                let prior = match prior {
                    Some(ClientServiceConfig::Web(prior)) => Some(prior),
                    _ => None,
                };
                ClientServiceConfig::Web(ClientWebConfig {
                    domains: self.field(&at(path::DOMAINS), web.domains.clone(), prior.map(|p| &p.domains)),
                    health_check: self.health_check(
                        web.health_check.as_ref(),
                        prior.and_then(|p| p.health_check.as_ref()),
                        root,
                    ),
                    autoscaling: self.autoscaling(
                        web.autoscaling.as_ref(),
                        prior.and_then(|p| p.autoscaling.as_ref()),
                        root,
                    ),
                })
            }
            (ServiceConfig::Worker(worker), prior) => {
                let prior = match prior {
                    Some(ClientServiceConfig::Worker(prior)) => prior.autoscaling.as_ref(),
                    _ => None,
                };
                ClientServiceConfig::Worker(ClientWorkerConfig {
                    autoscaling: self.autoscaling(worker.autoscaling.as_ref(), prior, root),
                })
            }
            (ServiceConfig::Job(job), prior) => {
                let prior = match prior {
                    Some(ClientServiceConfig::Job(prior)) => Some(prior),
                    _ => None,
                };
                ClientServiceConfig::Job(ClientJobConfig {
                    cron: self.field(&at(path::CRON), job.cron.clone(), prior.map(|p| &p.cron)),
                    allow_concurrent: self.field(
                        &at(path::ALLOW_CONCURRENT),
                        job.allow_concurrent,
                        prior.map(|p| &p.allow_concurrent),
                    ),
                })
            }
        };

        ClientServiceModel {
            origin: prior.map_or(ServiceOrigin::DetectedFromSource, |prior| prior.origin),
            kind: spec.kind(),
            run: self.field(&at(path::RUN), spec.run.clone(), prior.map(|p| &p.run)),
            instances: self.field(&at(path::INSTANCES), spec.instances, prior.map(|p| &p.instances)),
            cpu_cores: self.field(&at(path::CPU_CORES), spec.cpu_cores, prior.map(|p| &p.cpu_cores)),
            ram_megabytes: self.field(
                &at(path::RAM_MEGABYTES),
                spec.ram_megabytes,
                prior.map(|p| &p.ram_megabytes),
            ),
            port: self.field(&at(path::PORT), spec.port, prior.map(|p| &p.port)),
            config,
        }
    }

    /// An absent block in the specification keeps a block the user added,
    /// but not one the source used to declare or one whose leaves are
    /// locked as removed.
    fn health_check(
        &self,
        spec: Option<&HealthCheck>,
        prior: Option<&ClientHealthCheck>,
        root: &str,
    ) -> Option<ClientHealthCheck> {
        let Some(spec) = spec else {
            return prior
                .filter(|prior| !prior.has_locked_field())
                .filter(|_| !self.locks.contains_under(&path::join(root, path::HEALTH_CHECK)))
                .cloned();
        };
        let at = |key: &str| path::join(root, key);
        Some(ClientHealthCheck {
            enabled: self.field(&at(path::HEALTH_CHECK_ENABLED), spec.enabled, prior.map(|p| &p.enabled)),
            http_path: self.field(
                &at(path::HEALTH_CHECK_HTTP_PATH),
                spec.http_path.clone(),
                prior.map(|p| &p.http_path),
            ),
        })
    }

    fn autoscaling(
        &self,
        spec: Option<&Autoscaling>,
        prior: Option<&ClientAutoscaling>,
        root: &str,
    ) -> Option<ClientAutoscaling> {
        let Some(spec) = spec else {
            return prior
                .filter(|prior| !prior.has_locked_field())
                .filter(|_| !self.locks.contains_under(&path::join(root, path::AUTOSCALING)))
                .cloned();
        };
        let at = |key: &str| path::join(root, key);
        Some(ClientAutoscaling {
            enabled: self.field(&at(path::AUTOSCALING_ENABLED), spec.enabled, prior.map(|p| &p.enabled)),
            min_instances: self.field(
                &at(path::AUTOSCALING_MIN_INSTANCES),
                spec.min_instances,
                prior.map(|p| &p.min_instances),
            ),
            max_instances: self.field(
                &at(path::AUTOSCALING_MAX_INSTANCES),
                spec.max_instances,
                prior.map(|p| &p.max_instances),
            ),
            cpu_threshold_percent: self.field(
                &at(path::AUTOSCALING_CPU_THRESHOLD),
                spec.cpu_threshold_percent,
                prior.map(|p| &p.cpu_threshold_percent),
            ),
            memory_threshold_percent: self.field(
                &at(path::AUTOSCALING_MEMORY_THRESHOLD),
                spec.memory_threshold_percent,
                prior.map(|p| &p.memory_threshold_percent),
            ),
        })
    }
}

fn service_spec(service: &ClientServiceModel, root: &str) -> SemanticResult<ServiceSpec> {
    let found = service.config.kind();
    if service.kind != found {
        return Err(SemanticError::KindMismatch {
            path: root.to_string(),
            declared: service.kind,
            found,
        });
    }

    let cpu_cores = *service.cpu_cores.value();
    if !cpu_cores.is_finite() || cpu_cores < 0.0 {
        return Err(SemanticError::InvalidValue {
            path: path::join(root, path::CPU_CORES),
            reason: format!("expected a non-negative number of cores, found {cpu_cores}"),
        });
    }

    let config = match &service.config {
        ClientServiceConfig::Web(web) => ServiceConfig::Web(WebConfig {
            domains: web.domains.value().clone(),
            health_check: web.health_check.as_ref().map(|health| HealthCheck {
                enabled: *health.enabled.value(),
                http_path: health.http_path.value().clone(),
            }),
            autoscaling: web.autoscaling.as_ref().map(autoscaling_spec),
        }),
        ClientServiceConfig::Worker(worker) => ServiceConfig::Worker(WorkerConfig {
            autoscaling: worker.autoscaling.as_ref().map(autoscaling_spec),
        }),
        ClientServiceConfig::Job(job) => ServiceConfig::Job(JobConfig {
            cron: job.cron.value().clone(),
            allow_concurrent: *job.allow_concurrent.value(),
        }),
    };

    Ok(ServiceSpec {
        run: service.run.value().clone(),
        instances: *service.instances.value(),
        cpu_cores,
        ram_megabytes: *service.ram_megabytes.value(),
        port: *service.port.value(),
        config,
    })
}

fn autoscaling_spec(autoscaling: &ClientAutoscaling) -> Autoscaling {
    Autoscaling {
        enabled: *autoscaling.enabled.value(),
        min_instances: *autoscaling.min_instances.value(),
        max_instances: *autoscaling.max_instances.value(),
        cpu_threshold_percent: *autoscaling.cpu_threshold_percent.value(),
        memory_threshold_percent: *autoscaling.memory_threshold_percent.value(),
    }
}

fn app_source(source: &ClientSource) -> SemanticResult<AppSource> {
    let required = |value: &FieldProvenance<String>, field_path: &str| {
        if value.value().trim().is_empty() {
            Err(SemanticError::MissingField {
                path: field_path.to_string(),
            })
        } else {
            Ok(value.value().clone())
        }
    };
    Ok(match source {
        ClientSource::Image { repository, tag } => AppSource::Image(ImageRef {
            repository: required(repository, path::IMAGE_REPOSITORY)?,
            tag: tag.value().clone(),
        }),
        ClientSource::Pack {
            context,
            builder,
            buildpacks,
        } => AppSource::Build(BuildStrategy::Pack {
            context: context.value().clone(),
            builder: required(builder, path::BUILD_BUILDER)?,
            buildpacks: buildpacks.value().clone(),
        }),
        ClientSource::Docker {
            context,
            dockerfile,
        } => AppSource::Build(BuildStrategy::Docker {
            context: context.value().clone(),
            dockerfile: required(dockerfile, path::BUILD_DOCKERFILE)?,
        }),
    })
}
