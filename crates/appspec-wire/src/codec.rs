//! Conversion between [`AppSpecification`] and its wire forms.
//!
//! `encode` is total and lossless: every canonical field has a protobuf
//! counterpart, optional blocks map to optional messages, and maps are
//! written in key order. `decode` rejects payloads that could not have come
//! from `encode`: unknown service types, a declared type that disagrees with
//! the config variant, or a missing/duplicated image source.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use prost::Message;
use sha2::{Digest, Sha256};
use tracing::trace;

use appspec_core::path;
use appspec_core::*;

use crate::error::{CodecError, CodecResult};
use crate::proto;

/// Encode a specification to protobuf bytes.
pub fn encode(spec: &AppSpecification) -> Vec<u8> {
    let bytes = app_to_proto(spec).encode_to_vec();
    trace!(app = %spec.name, bytes = bytes.len(), "encoded app specification");
    bytes
}

/// Decode protobuf bytes into a specification.
pub fn decode(bytes: &[u8]) -> CodecResult<AppSpecification> {
    if bytes.is_empty() {
        return Err(CodecError::Empty);
    }
    let app = proto::App::decode(bytes)?;
    app_from_proto(app)
}

/// Encode to base64 text for embedding in JSON payloads.
pub fn encode_text(spec: &AppSpecification) -> String {
    STANDARD.encode(encode(spec))
}

/// Decode base64 text produced by [`encode_text`].
pub fn decode_text(text: &str) -> CodecResult<AppSpecification> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CodecError::Empty);
    }
    let bytes = STANDARD.decode(text)?;
    decode(&bytes)
}

/// Hex SHA-256 of the encoded specification.
///
/// Identical specifications always have identical fingerprints because the
/// encoding is deterministic.
pub fn fingerprint(spec: &AppSpecification) -> String {
    hex::encode(Sha256::digest(encode(spec)))
}

// ── To proto ──────────────────────────────────────────────────────

fn app_to_proto(spec: &AppSpecification) -> proto::App {
    let (image, build) = match &spec.source {
        AppSource::Image(image) => (
            Some(proto::AppImage {
                repository: image.repository.clone(),
                tag: image.tag.clone(),
            }),
            None,
        ),
        AppSource::Build(strategy) => (None, Some(build_to_proto(strategy))),
    };

    proto::App {
        name: spec.name.clone(),
        services: spec
            .services
            .iter()
            .map(|(name, service)| (name.clone(), service_to_proto(service)))
            .collect(),
        image,
        build,
        env: spec.env.clone(),
        predeploy: spec.predeploy.as_ref().map(service_to_proto),
    }
}

fn build_to_proto(strategy: &BuildStrategy) -> proto::Build {
    match strategy {
        BuildStrategy::Pack {
            context,
            builder,
            buildpacks,
        } => proto::Build {
            context: context.clone(),
            method: BuildMethod::Pack.as_str().to_string(),
            builder: builder.clone(),
            buildpacks: buildpacks.clone(),
            dockerfile: String::new(),
        },
        BuildStrategy::Docker { context, dockerfile } => proto::Build {
            context: context.clone(),
            method: BuildMethod::Docker.as_str().to_string(),
            builder: String::new(),
            buildpacks: Vec::new(),
            dockerfile: dockerfile.clone(),
        },
    }
}

fn service_to_proto(service: &ServiceSpec) -> proto::Service {
    let config = match &service.config {
        ServiceConfig::Web(web) => proto::service::Config::WebConfig(proto::WebServiceConfig {
            autoscaling: web.autoscaling.as_ref().map(autoscaling_to_proto),
            domains: web
                .domains
                .iter()
                .map(|name| proto::Domain { name: name.clone() })
                .collect(),
            health_check: web.health_check.as_ref().map(|hc| proto::HealthCheck {
                enabled: hc.enabled,
                http_path: hc.http_path.clone(),
            }),
        }),
        ServiceConfig::Worker(worker) => {
            proto::service::Config::WorkerConfig(proto::WorkerServiceConfig {
                autoscaling: worker.autoscaling.as_ref().map(autoscaling_to_proto),
            })
        }
        ServiceConfig::Job(job) => proto::service::Config::JobConfig(proto::JobServiceConfig {
            allow_concurrent: job.allow_concurrent,
            cron: job.cron.clone(),
        }),
    };

    proto::Service {
        run: service.run.clone(),
        instances: service.instances,
        cpu_cores: service.cpu_cores,
        ram_megabytes: service.ram_megabytes,
        port: service.port,
        service_type: kind_to_proto(service.kind()) as i32,
        config: Some(config),
    }
}

fn autoscaling_to_proto(a: &Autoscaling) -> proto::Autoscaling {
    proto::Autoscaling {
        enabled: a.enabled,
        min_instances: a.min_instances,
        max_instances: a.max_instances,
        cpu_threshold_percent: a.cpu_threshold_percent,
        memory_threshold_percent: a.memory_threshold_percent,
    }
}

fn kind_to_proto(kind: ServiceKind) -> proto::ServiceType {
    match kind {
        ServiceKind::Web => proto::ServiceType::Web,
        ServiceKind::Worker => proto::ServiceType::Worker,
        ServiceKind::Job => proto::ServiceType::Job,
    }
}

// ── From proto ────────────────────────────────────────────────────

fn app_from_proto(app: proto::App) -> CodecResult<AppSpecification> {
    let source = match (app.image, app.build) {
        (Some(_), Some(_)) => return Err(CodecError::AmbiguousSource("both image and build")),
        (None, None) => return Err(CodecError::AmbiguousSource("neither image nor build")),
        (Some(image), None) => AppSource::Image(ImageRef {
            repository: image.repository,
            tag: image.tag,
        }),
        (None, Some(build)) => AppSource::Build(build_from_proto(build)?),
    };

    let mut services = BTreeMap::new();
    for (name, service) in app.services {
        let spec = service_from_proto(service, &path::service(&name))?;
        services.insert(name, spec);
    }

    let predeploy = match app.predeploy {
        Some(service) => {
            let spec = service_from_proto(service, path::PREDEPLOY)?;
            if spec.kind() != ServiceKind::Job {
                return Err(CodecError::KindMismatch {
                    path: path::PREDEPLOY.to_string(),
                    declared: ServiceKind::Job,
                    found: spec.kind(),
                });
            }
            Some(spec)
        }
        None => None,
    };

    Ok(AppSpecification {
        name: app.name,
        env: app.env,
        source,
        services,
        predeploy,
    })
}

/// Fields of the method that was not selected are cleared.
fn build_from_proto(build: proto::Build) -> CodecResult<BuildStrategy> {
    match build.method.as_str() {
        "pack" => Ok(BuildStrategy::Pack {
            context: build.context,
            builder: build.builder,
            buildpacks: build.buildpacks,
        }),
        "docker" => Ok(BuildStrategy::Docker {
            context: build.context,
            dockerfile: build.dockerfile,
        }),
        _ => Err(CodecError::UnknownBuildMethod(build.method)),
    }
}

fn service_from_proto(service: proto::Service, root: &str) -> CodecResult<ServiceSpec> {
    let declared = match proto::ServiceType::try_from(service.service_type) {
        Ok(proto::ServiceType::Web) => ServiceKind::Web,
        Ok(proto::ServiceType::Worker) => ServiceKind::Worker,
        Ok(proto::ServiceType::Job) => ServiceKind::Job,
        Ok(proto::ServiceType::Unspecified) | Err(_) => {
            return Err(CodecError::UnknownKind {
                path: path::join(root, path::TYPE),
                value: service.service_type,
            });
        }
    };

    let config = match service.config {
        None => {
            return Err(CodecError::MissingField {
                path: path::join(root, "config"),
            });
        }
        Some(proto::service::Config::WebConfig(web)) => ServiceConfig::Web(WebConfig {
            domains: web.domains.into_iter().map(|d| d.name).collect(),
            health_check: web.health_check.map(|hc| HealthCheck {
                enabled: hc.enabled,
                http_path: hc.http_path,
            }),
            autoscaling: web.autoscaling.map(autoscaling_from_proto),
        }),
        Some(proto::service::Config::WorkerConfig(worker)) => ServiceConfig::Worker(WorkerConfig {
            autoscaling: worker.autoscaling.map(autoscaling_from_proto),
        }),
        Some(proto::service::Config::JobConfig(job)) => ServiceConfig::Job(JobConfig {
            cron: job.cron,
            allow_concurrent: job.allow_concurrent,
        }),
    };

    if config.kind() != declared {
        return Err(CodecError::KindMismatch {
            path: root.to_string(),
            declared,
            found: config.kind(),
        });
    }

    Ok(ServiceSpec {
        run: service.run,
        instances: service.instances,
        cpu_cores: service.cpu_cores,
        ram_megabytes: service.ram_megabytes,
        port: service.port,
        config,
    })
}

fn autoscaling_from_proto(a: proto::Autoscaling) -> Autoscaling {
    Autoscaling {
        enabled: a.enabled,
        min_instances: a.min_instances,
        max_instances: a.max_instances,
        cpu_threshold_percent: a.cpu_threshold_percent,
        memory_threshold_percent: a.memory_threshold_percent,
    }
}
