//! Canonicalizer — raw document to typed [`AppSpecification`].
//!
//! Resolves each service's kind, projects only the fields that belong to
//! that kind, applies defaults (zero, empty, false) and selects the app's
//! image source.
//!
//! # Kind inference
//!
//! An explicit `type` always wins and must be one of the exact literals
//! `web`, `worker`, `job`. Without one, the service name is matched against
//! substrings in a fixed order: `web`, then `wkr`, then `job`. The first
//! match wins, so `web-job` is a web service. Downstream consumers rely on
//! this order.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::document::{RawAutoscaling, RawBuild, RawDocument, RawHealthCheck, RawImage, RawService};
use crate::error::{SemanticError, SemanticResult};
use crate::path;
use crate::types::*;

/// Ordered name-substring rules used when a service has no explicit `type`.
pub const NAME_INFERENCE_RULES: [(&str, ServiceKind); 3] = [
    ("web", ServiceKind::Web),
    ("wkr", ServiceKind::Worker),
    ("job", ServiceKind::Job),
];

/// How a service's kind was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindSource {
    /// From the `type` key.
    Explicit,
    /// From a substring of the service name.
    NameSubstring(&'static str),
    /// Fixed by position (the predeploy slot).
    Predeploy,
}

/// Resolved kind of one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindResolution {
    pub kind: ServiceKind,
    pub source: KindSource,
}

/// Canonicalize a raw document.
pub fn canonicalize(raw: &RawDocument) -> SemanticResult<AppSpecification> {
    let name = raw.name.clone().unwrap_or_default();
    if name.trim().is_empty() {
        return Err(SemanticError::EmptyName);
    }

    let source = resolve_source(raw.image.as_ref(), raw.build.as_ref())?;

    let raw_services = match &raw.services {
        Some(services) if !services.is_empty() => services,
        _ => return Err(SemanticError::NoServices),
    };

    let mut services = BTreeMap::new();
    for (service_name, entry) in raw_services {
        let root = path::service(service_name);
        if service_name.contains(path::SEPARATOR) {
            return Err(SemanticError::InvalidValue {
                path: root,
                reason: format!("service names must not contain `{}`", path::SEPARATOR),
            });
        }
        let resolution = resolve_kind(service_name, entry.kind.as_deref())?;
        debug!(
            app = %name,
            service = %service_name,
            kind = %resolution.kind,
            source = ?resolution.source,
            "resolved service kind"
        );
        let spec = project_service(entry, resolution.kind, &root)?;
        services.insert(service_name.clone(), spec);
    }

    let predeploy = raw
        .predeploy
        .as_ref()
        .map(canonicalize_predeploy)
        .transpose()?;

    let env = raw
        .env
        .iter()
        .flatten()
        .map(|(key, value)| (key.clone(), value.to_string()))
        .collect();

    info!(
        app = %name,
        services = services.len(),
        predeploy = predeploy.is_some(),
        "canonicalized app document"
    );

    Ok(AppSpecification {
        name,
        env,
        source,
        services,
        predeploy,
    })
}

/// Resolve a service kind from its declared `type` or, failing that, its name.
pub fn resolve_kind(service_name: &str, declared: Option<&str>) -> SemanticResult<KindResolution> {
    if let Some(literal) = declared {
        return ServiceKind::from_literal(literal)
            .map(|kind| KindResolution {
                kind,
                source: KindSource::Explicit,
            })
            .ok_or_else(|| SemanticError::UnknownKind {
                path: path::join(&path::service(service_name), path::TYPE),
                kind: literal.to_string(),
            });
    }

    NAME_INFERENCE_RULES
        .iter()
        .find(|(needle, _)| service_name.contains(needle))
        .map(|&(needle, kind)| KindResolution {
            kind,
            source: KindSource::NameSubstring(needle),
        })
        .ok_or_else(|| SemanticError::KindUndeterminable {
            path: path::service(service_name),
        })
}

/// The predeploy entry is always a job.
fn canonicalize_predeploy(entry: &RawService) -> SemanticResult<ServiceSpec> {
    match entry.kind.as_deref() {
        Some(literal) if literal != ServiceKind::Job.as_str() => {
            return Err(SemanticError::PredeployNotJob {
                kind: literal.to_string(),
            });
        }
        _ => {}
    }
    debug!(source = ?KindSource::Predeploy, "resolved predeploy kind");
    project_service(entry, ServiceKind::Job, path::PREDEPLOY)
}

/// Build a [`ServiceSpec`] of `kind`, rejecting fields of any other kind.
fn project_service(entry: &RawService, kind: ServiceKind, root: &str) -> SemanticResult<ServiceSpec> {
    for field in KindField::ALL {
        if entry.declares(field) && !field.applies_to(kind) {
            return Err(SemanticError::FieldNotApplicableToKind {
                path: path::join(root, field.key()),
                kind,
            });
        }
    }

    let config = match kind {
        ServiceKind::Web => ServiceConfig::Web(WebConfig {
            domains: project_domains(entry, root)?,
            health_check: entry.health_check.as_ref().map(project_health_check),
            autoscaling: project_autoscaling(entry.autoscaling.as_ref(), root)?,
        }),
        ServiceKind::Worker => ServiceConfig::Worker(WorkerConfig {
            autoscaling: project_autoscaling(entry.autoscaling.as_ref(), root)?,
        }),
        ServiceKind::Job => ServiceConfig::Job(JobConfig {
            cron: entry.cron.clone().unwrap_or_default(),
            allow_concurrent: entry.allow_concurrent.unwrap_or(false),
        }),
    };

    Ok(ServiceSpec {
        run: entry.run.clone().unwrap_or_default(),
        instances: non_negative(entry.instances, &path::join(root, path::INSTANCES))?,
        cpu_cores: cpu_cores(entry.cpu_cores, &path::join(root, path::CPU_CORES))?,
        ram_megabytes: non_negative(entry.ram_megabytes, &path::join(root, path::RAM_MEGABYTES))?,
        port: non_negative(entry.port, &path::join(root, path::PORT))?,
        config,
    })
}

fn project_domains(entry: &RawService, root: &str) -> SemanticResult<Vec<String>> {
    let domains_path = path::join(root, path::DOMAINS);
    entry
        .domains
        .iter()
        .flatten()
        .enumerate()
        .map(|(i, domain)| match domain.name.as_deref() {
            Some(name) if !name.trim().is_empty() => Ok(name.to_string()),
            _ => Err(SemanticError::InvalidValue {
                path: format!("{domains_path}[{i}].name"),
                reason: "domain name must not be empty".to_string(),
            }),
        })
        .collect()
}

fn project_health_check(raw: &RawHealthCheck) -> HealthCheck {
    HealthCheck {
        enabled: raw.enabled.unwrap_or(false),
        http_path: raw.http_path.clone().unwrap_or_default(),
    }
}

fn project_autoscaling(raw: Option<&RawAutoscaling>, root: &str) -> SemanticResult<Option<Autoscaling>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let field = |key: &str| path::join(root, key);
    Ok(Some(Autoscaling {
        enabled: raw.enabled.unwrap_or(false),
        min_instances: non_negative(raw.min_instances, &field(path::AUTOSCALING_MIN_INSTANCES))?,
        max_instances: non_negative(raw.max_instances, &field(path::AUTOSCALING_MAX_INSTANCES))?,
        cpu_threshold_percent: non_negative(
            raw.cpu_threshold_percent,
            &field(path::AUTOSCALING_CPU_THRESHOLD),
        )?,
        memory_threshold_percent: non_negative(
            raw.memory_threshold_percent,
            &field(path::AUTOSCALING_MEMORY_THRESHOLD),
        )?,
    }))
}

/// Select the image source: exactly one of `image` or `build`.
fn resolve_source(image: Option<&RawImage>, build: Option<&RawBuild>) -> SemanticResult<AppSource> {
    match (image, build) {
        (Some(_), Some(_)) => Err(SemanticError::AmbiguousSource {
            reason: "both `image` and `build` are declared",
        }),
        (None, None) => Err(SemanticError::AmbiguousSource {
            reason: "neither `image` nor `build` is declared",
        }),
        (Some(image), None) => {
            let repository = image.repository.clone().unwrap_or_default();
            if repository.trim().is_empty() {
                return Err(SemanticError::MissingField {
                    path: path::IMAGE_REPOSITORY.to_string(),
                });
            }
            Ok(AppSource::Image(ImageRef {
                repository,
                tag: image.tag.clone().unwrap_or_default(),
            }))
        }
        (None, Some(build)) => resolve_build(build).map(AppSource::Build),
    }
}

fn resolve_build(build: &RawBuild) -> SemanticResult<BuildStrategy> {
    let method = match build.method.as_deref() {
        None => {
            return Err(SemanticError::MissingField {
                path: path::BUILD_METHOD.to_string(),
            });
        }
        Some("pack") => BuildMethod::Pack,
        Some("docker") => BuildMethod::Docker,
        Some(other @ "registry") => {
            return Err(SemanticError::UnsupportedBuildMethod {
                path: path::BUILD_METHOD.to_string(),
                method: other.to_string(),
            });
        }
        Some(other) => {
            return Err(SemanticError::UnknownBuildMethod {
                path: path::BUILD_METHOD.to_string(),
                method: other.to_string(),
            });
        }
    };

    let context = build.context.clone().unwrap_or_default();
    let not_applicable = |path: &str| SemanticError::FieldNotApplicableToBuildMethod {
        path: path.to_string(),
        method,
    };

    match method {
        BuildMethod::Pack => {
            if build.dockerfile.is_some() {
                return Err(not_applicable(path::BUILD_DOCKERFILE));
            }
            let builder = required(build.builder.as_deref(), path::BUILD_BUILDER)?;
            Ok(BuildStrategy::Pack {
                context,
                builder,
                buildpacks: build.buildpacks.clone().unwrap_or_default(),
            })
        }
        BuildMethod::Docker => {
            if build.builder.is_some() {
                return Err(not_applicable(path::BUILD_BUILDER));
            }
            if build.buildpacks.is_some() {
                return Err(not_applicable(path::BUILD_BUILDPACKS));
            }
            let dockerfile = required(build.dockerfile.as_deref(), path::BUILD_DOCKERFILE)?;
            Ok(BuildStrategy::Docker { context, dockerfile })
        }
    }
}

fn required(value: Option<&str>, field_path: &str) -> SemanticResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(SemanticError::MissingField {
            path: field_path.to_string(),
        }),
    }
}

fn non_negative(value: Option<i64>, field_path: &str) -> SemanticResult<u32> {
    let value = value.unwrap_or(0);
    if value < 0 {
        return Err(SemanticError::InvalidValue {
            path: field_path.to_string(),
            reason: format!("must not be negative, got {value}"),
        });
    }
    u32::try_from(value).map_err(|_| SemanticError::InvalidValue {
        path: field_path.to_string(),
        reason: format!("{value} is out of range"),
    })
}

fn cpu_cores(value: Option<f64>, field_path: &str) -> SemanticResult<f32> {
    let value = value.unwrap_or(0.0);
    if !value.is_finite() || value < 0.0 {
        return Err(SemanticError::InvalidValue {
            path: field_path.to_string(),
            reason: format!("must be a non-negative number, got {value}"),
        });
    }
    Ok(value as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_document;

    fn canon(yaml: &str) -> SemanticResult<AppSpecification> {
        canonicalize(&parse_document(yaml.as_bytes()).unwrap())
    }

    const IMAGE: &str = "image:\n  repository: nginx\n  tag: latest\n";

    #[test]
    fn explicit_type_wins_over_name() {
        let resolution = resolve_kind("my-web", Some("job")).unwrap();
        assert_eq!(resolution.kind, ServiceKind::Job);
        assert_eq!(resolution.source, KindSource::Explicit);
    }

    #[test]
    fn unknown_type_literal_is_rejected() {
        let err = resolve_kind("api", Some("cron")).unwrap_err();
        assert_eq!(
            err,
            SemanticError::UnknownKind {
                path: "services.api.type".to_string(),
                kind: "cron".to_string(),
            }
        );
    }

    #[test]
    fn infers_each_kind_from_name() {
        assert_eq!(resolve_kind("example-web", None).unwrap().kind, ServiceKind::Web);
        assert_eq!(resolve_kind("example-wkr", None).unwrap().kind, ServiceKind::Worker);
        assert_eq!(resolve_kind("example-job", None).unwrap().kind, ServiceKind::Job);
    }

    // Name inference is first-match, not most-specific. Changing the rule
    // order would silently re-kind existing services.
    #[test]
    fn name_inference_is_first_match() {
        let resolution = resolve_kind("web-job", None).unwrap();
        assert_eq!(resolution.kind, ServiceKind::Web);
        assert_eq!(resolution.source, KindSource::NameSubstring("web"));
        assert_eq!(resolve_kind("job-wkr", None).unwrap().kind, ServiceKind::Worker);
    }

    #[test]
    fn undeterminable_kind_is_rejected() {
        let err = resolve_kind("api", None).unwrap_err();
        assert_eq!(
            err,
            SemanticError::KindUndeterminable {
                path: "services.api".to_string()
            }
        );
    }

    #[test]
    fn web_rejects_job_fields() {
        let yaml = format!("name: a\n{IMAGE}services:\n  api:\n    type: web\n    cron: '* * * * *'\n");
        let err = canon(&yaml).unwrap_err();
        assert_eq!(
            err,
            SemanticError::FieldNotApplicableToKind {
                path: "services.api.cron".to_string(),
                kind: ServiceKind::Web,
            }
        );
    }

    #[test]
    fn worker_rejects_web_fields() {
        let yaml = format!(
            "name: a\n{IMAGE}services:\n  queue:\n    type: worker\n    domains:\n      - name: a.example.com\n"
        );
        let err = canon(&yaml).unwrap_err();
        assert_eq!(err.path(), "services.queue.domains");

        let yaml = format!(
            "name: a\n{IMAGE}services:\n  queue:\n    type: worker\n    healthCheck:\n      enabled: true\n"
        );
        assert_eq!(canon(&yaml).unwrap_err().path(), "services.queue.healthCheck");
    }

    #[test]
    fn job_rejects_autoscaling() {
        let yaml = format!(
            "name: a\n{IMAGE}services:\n  nightly:\n    type: job\n    autoscaling:\n      enabled: true\n"
        );
        let err = canon(&yaml).unwrap_err();
        assert_eq!(
            err,
            SemanticError::FieldNotApplicableToKind {
                path: "services.nightly.autoscaling".to_string(),
                kind: ServiceKind::Job,
            }
        );
    }

    #[test]
    fn explicit_false_still_counts_as_declared() {
        let yaml = format!("name: a\n{IMAGE}services:\n  api-web:\n    allowConcurrent: false\n");
        assert!(matches!(
            canon(&yaml),
            Err(SemanticError::FieldNotApplicableToKind { .. })
        ));
    }

    #[test]
    fn absent_fields_default_to_zero_values() {
        let yaml = format!("name: a\n{IMAGE}services:\n  example-wkr: {{}}\n");
        let spec = canon(&yaml).unwrap();
        let worker = spec.service("example-wkr").unwrap();
        assert_eq!(worker, &ServiceSpec::empty(ServiceKind::Worker));
    }

    #[test]
    fn both_or_neither_source_is_ambiguous() {
        let both = "name: a\nimage:\n  repository: nginx\nbuild:\n  method: docker\n  dockerfile: Dockerfile\nservices:\n  web: {}\n";
        assert!(matches!(canon(both), Err(SemanticError::AmbiguousSource { .. })));

        let neither = "name: a\nservices:\n  web: {}\n";
        assert!(matches!(canon(neither), Err(SemanticError::AmbiguousSource { .. })));
    }

    #[test]
    fn pack_build_requires_builder() {
        let yaml = "name: a\nbuild:\n  method: pack\n  context: .\nservices:\n  web: {}\n";
        assert_eq!(
            canon(yaml).unwrap_err(),
            SemanticError::MissingField {
                path: "build.builder".to_string()
            }
        );

        let yaml = "name: a\nbuild:\n  method: pack\n  context: .\n  builder: heroku/builder:22\n  buildpacks: [heroku/nodejs]\nservices:\n  web: {}\n";
        let spec = canon(yaml).unwrap();
        assert_eq!(
            spec.source,
            AppSource::Build(BuildStrategy::Pack {
                context: ".".to_string(),
                builder: "heroku/builder:22".to_string(),
                buildpacks: vec!["heroku/nodejs".to_string()],
            })
        );
    }

    #[test]
    fn docker_build_rejects_pack_fields() {
        let yaml = "name: a\nbuild:\n  method: docker\n  dockerfile: Dockerfile\n  builder: heroku/builder:22\nservices:\n  web: {}\n";
        assert_eq!(
            canon(yaml).unwrap_err(),
            SemanticError::FieldNotApplicableToBuildMethod {
                path: "build.builder".to_string(),
                method: BuildMethod::Docker,
            }
        );

        // Declaring the key is enough, even when empty.
        let yaml = "name: a\nbuild:\n  method: docker\n  dockerfile: Dockerfile\n  buildpacks: []\nservices:\n  web: {}\n";
        assert_eq!(
            canon(yaml).unwrap_err(),
            SemanticError::FieldNotApplicableToBuildMethod {
                path: "build.buildpacks".to_string(),
                method: BuildMethod::Docker,
            }
        );
    }

    #[test]
    fn service_names_cannot_contain_the_path_separator() {
        let yaml = format!("name: a\n{IMAGE}services:\n  x.healthCheck:\n    type: web\n");
        assert!(matches!(
            canon(&yaml),
            Err(SemanticError::InvalidValue { ref path, .. }) if path == "services.x.healthCheck"
        ));
    }

    #[test]
    fn build_method_must_be_known() {
        let yaml = "name: a\nbuild:\n  method: nix\nservices:\n  web: {}\n";
        assert!(matches!(canon(yaml), Err(SemanticError::UnknownBuildMethod { .. })));

        let yaml = "name: a\nbuild:\n  method: registry\nservices:\n  web: {}\n";
        assert!(matches!(canon(yaml), Err(SemanticError::UnsupportedBuildMethod { .. })));

        let yaml = "name: a\nbuild:\n  dockerfile: Dockerfile\nservices:\n  web: {}\n";
        assert_eq!(canon(yaml).unwrap_err().path(), "build.method");
    }

    #[test]
    fn negative_numbers_are_rejected_with_path() {
        let yaml = format!("name: a\n{IMAGE}services:\n  web:\n    instances: -1\n");
        let err = canon(&yaml).unwrap_err();
        assert_eq!(err.path(), "services.web.instances");

        let yaml = format!(
            "name: a\n{IMAGE}services:\n  web:\n    autoscaling:\n      maxInstances: -3\n"
        );
        assert_eq!(
            canon(&yaml).unwrap_err().path(),
            "services.web.autoscaling.maxInstances"
        );

        let yaml = format!("name: a\n{IMAGE}services:\n  web:\n    cpuCores: -0.5\n");
        assert_eq!(canon(&yaml).unwrap_err().path(), "services.web.cpuCores");
    }

    #[test]
    fn empty_name_and_services_are_rejected() {
        let yaml = format!("name: ''\n{IMAGE}services:\n  web: {{}}\n");
        assert_eq!(canon(&yaml).unwrap_err(), SemanticError::EmptyName);

        let yaml = format!("name: a\n{IMAGE}services: {{}}\n");
        assert_eq!(canon(&yaml).unwrap_err(), SemanticError::NoServices);
    }

    #[test]
    fn predeploy_is_always_a_job() {
        let yaml = format!("name: a\n{IMAGE}services:\n  web: {{}}\npredeploy:\n  run: ./migrate\n");
        let spec = canon(&yaml).unwrap();
        let predeploy = spec.predeploy.unwrap();
        assert_eq!(predeploy.kind(), ServiceKind::Job);
        assert_eq!(predeploy.run, "./migrate");

        let yaml = format!(
            "name: a\n{IMAGE}services:\n  web: {{}}\npredeploy:\n  type: web\n  run: ./migrate\n"
        );
        assert_eq!(
            canon(&yaml).unwrap_err(),
            SemanticError::PredeployNotJob {
                kind: "web".to_string()
            }
        );

        let yaml = format!(
            "name: a\n{IMAGE}services:\n  web: {{}}\npredeploy:\n  run: ./migrate\n  port: 80\n  domains: []\n"
        );
        assert_eq!(canon(&yaml).unwrap_err().path(), "predeploy.domains");
    }
}
