//! Source lock sets.
//!
//! A [`FieldLocks`] is the set of leaf paths owned by the declarative source.
//! A canonical specification alone cannot say whether `port: 0` was written
//! or defaulted, so locks are derived from what carries that knowledge:
//! the raw document, a diff between a submitted and a validated
//! specification, or the provenance already recorded in a form model.

use std::collections::{BTreeMap, BTreeSet};

use appspec_core::document::{RawAutoscaling, RawHealthCheck};
use appspec_core::{AppSource, AppSpecification, BuildStrategy, RawDocument, RawService, ServiceConfig, ServiceSpec, path};

use crate::model::{ClientAppModel, ClientAutoscaling, ClientServiceConfig, ClientServiceModel, ClientSource};
use crate::provenance::FieldProvenance;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldLocks {
    paths: BTreeSet<String>,
}

/// The value of one specification leaf, for comparing specifications.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafValue {
    Text(String),
    Count(u32),
    Cores(f32),
    Flag(bool),
    List(Vec<String>),
}

impl LeafValue {
    fn is_zero(&self) -> bool {
        match self {
            LeafValue::Text(text) => text.is_empty(),
            LeafValue::Count(count) => *count == 0,
            LeafValue::Cores(cores) => *cores == 0.0,
            LeafValue::Flag(flag) => !flag,
            LeafValue::List(items) => items.is_empty(),
        }
    }
}

impl FieldLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every leaf the document explicitly writes, including explicit zeros.
    pub fn declared_in(raw: &RawDocument) -> Self {
        let mut locks = Self::new();
        if raw.name.is_some() {
            locks.insert(path::NAME);
        }
        for key in raw.env.iter().flatten().map(|(key, _)| key) {
            locks.insert(path::env(key));
        }
        if let Some(image) = &raw.image {
            locks.insert_if(image.repository.is_some(), path::IMAGE_REPOSITORY);
            locks.insert_if(image.tag.is_some(), path::IMAGE_TAG);
        }
        if let Some(build) = &raw.build {
            locks.insert_if(build.context.is_some(), path::BUILD_CONTEXT);
            locks.insert_if(build.builder.is_some(), path::BUILD_BUILDER);
            locks.insert_if(build.buildpacks.is_some(), path::BUILD_BUILDPACKS);
            locks.insert_if(build.dockerfile.is_some(), path::BUILD_DOCKERFILE);
        }
        for (name, service) in raw.services.iter().flatten() {
            locks.declare_service(service, &path::service(name));
        }
        if let Some(predeploy) = &raw.predeploy {
            locks.declare_service(predeploy, path::PREDEPLOY);
        }
        locks
    }

    /// Every leaf of `spec` that differs from its zero value.
    ///
    /// Used when no document is at hand, e.g. a specification decoded from
    /// the wire.
    pub fn present_in(spec: &AppSpecification) -> Self {
        let paths = leaves(spec)
            .into_iter()
            .filter(|(_, value)| !value.is_zero())
            .map(|(path, _)| path)
            .collect();
        Self { paths }
    }

    /// Leaves the remote validator set, changed or removed relative to
    /// what was submitted.
    pub fn amended(submitted: &AppSpecification, validated: &AppSpecification) -> Self {
        let before = leaves(submitted);
        let after = leaves(validated);
        let removed = before.keys().filter(|path| !after.contains_key(*path)).cloned();
        let paths = after
            .iter()
            .filter(|(path, value)| before.get(*path) != Some(*value))
            .map(|(path, _)| path.clone())
            .chain(removed)
            .collect();
        Self { paths }
    }

    /// Leaves recorded as source-locked in a form model.
    pub fn locked_in(model: &ClientAppModel) -> Self {
        let mut locks = Self::new();
        locks.mark(path::NAME.to_string(), &model.name);
        for (key, value) in &model.env {
            locks.mark(path::env(key), value);
        }
        match &model.source {
            ClientSource::Image { repository, tag } => {
                locks.mark(path::IMAGE_REPOSITORY.to_string(), repository);
                locks.mark(path::IMAGE_TAG.to_string(), tag);
            }
            ClientSource::Pack {
                context,
                builder,
                buildpacks,
            } => {
                locks.mark(path::BUILD_CONTEXT.to_string(), context);
                locks.mark(path::BUILD_BUILDER.to_string(), builder);
                locks.mark(path::BUILD_BUILDPACKS.to_string(), buildpacks);
            }
            ClientSource::Docker {
                context,
                dockerfile,
            } => {
                locks.mark(path::BUILD_CONTEXT.to_string(), context);
                locks.mark(path::BUILD_DOCKERFILE.to_string(), dockerfile);
            }
        }
        for (name, service) in &model.services {
            locks.mark_service(service, &path::service(name));
        }
        if let Some(predeploy) = &model.predeploy {
            locks.mark_service(predeploy, path::PREDEPLOY);
        }
        locks
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Whether any locked leaf lies below `root`.
    pub fn contains_under(&self, root: &str) -> bool {
        let prefix = format!("{root}.");
        self.paths
            .range(prefix.clone()..)
            .next()
            .is_some_and(|path| path.starts_with(&prefix))
    }

    pub fn insert(&mut self, path: impl Into<String>) {
        self.paths.insert(path.into());
    }

    pub fn union(mut self, other: &FieldLocks) -> Self {
        self.paths.extend(other.paths.iter().cloned());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn insert_if(&mut self, present: bool, path: impl Into<String>) {
        if present {
            self.insert(path);
        }
    }

    fn declare_service(&mut self, service: &RawService, root: &str) {
        let at = |key: &str| path::join(root, key);
        self.insert_if(service.run.is_some(), at(path::RUN));
        self.insert_if(service.instances.is_some(), at(path::INSTANCES));
        self.insert_if(service.cpu_cores.is_some(), at(path::CPU_CORES));
        self.insert_if(service.ram_megabytes.is_some(), at(path::RAM_MEGABYTES));
        self.insert_if(service.port.is_some(), at(path::PORT));
        self.insert_if(service.domains.is_some(), at(path::DOMAINS));
        self.insert_if(service.cron.is_some(), at(path::CRON));
        self.insert_if(service.allow_concurrent.is_some(), at(path::ALLOW_CONCURRENT));
        if let Some(RawHealthCheck { enabled, http_path }) = &service.health_check {
            self.insert_if(enabled.is_some(), at(path::HEALTH_CHECK_ENABLED));
            self.insert_if(http_path.is_some(), at(path::HEALTH_CHECK_HTTP_PATH));
        }
        if let Some(RawAutoscaling {
            enabled,
            min_instances,
            max_instances,
            cpu_threshold_percent,
            memory_threshold_percent,
        }) = &service.autoscaling
        {
            self.insert_if(enabled.is_some(), at(path::AUTOSCALING_ENABLED));
            self.insert_if(min_instances.is_some(), at(path::AUTOSCALING_MIN_INSTANCES));
            self.insert_if(max_instances.is_some(), at(path::AUTOSCALING_MAX_INSTANCES));
            self.insert_if(cpu_threshold_percent.is_some(), at(path::AUTOSCALING_CPU_THRESHOLD));
            self.insert_if(memory_threshold_percent.is_some(), at(path::AUTOSCALING_MEMORY_THRESHOLD));
        }
    }

    fn mark<T>(&mut self, path: String, field: &FieldProvenance<T>) {
        self.insert_if(field.is_source_locked(), path);
    }

    fn mark_service(&mut self, service: &ClientServiceModel, root: &str) {
        let at = |key: &str| path::join(root, key);
        self.mark(at(path::RUN), &service.run);
        self.mark(at(path::INSTANCES), &service.instances);
        self.mark(at(path::CPU_CORES), &service.cpu_cores);
        self.mark(at(path::RAM_MEGABYTES), &service.ram_megabytes);
        self.mark(at(path::PORT), &service.port);
        match &service.config {
            ClientServiceConfig::Web(web) => {
                self.mark(at(path::DOMAINS), &web.domains);
                if let Some(health) = &web.health_check {
                    self.mark(at(path::HEALTH_CHECK_ENABLED), &health.enabled);
                    self.mark(at(path::HEALTH_CHECK_HTTP_PATH), &health.http_path);
                }
                self.mark_autoscaling(web.autoscaling.as_ref(), root);
            }
            ClientServiceConfig::Worker(worker) => {
                self.mark_autoscaling(worker.autoscaling.as_ref(), root);
            }
            ClientServiceConfig::Job(job) => {
                self.mark(at(path::CRON), &job.cron);
                self.mark(at(path::ALLOW_CONCURRENT), &job.allow_concurrent);
            }
        }
    }

    fn mark_autoscaling(&mut self, autoscaling: Option<&ClientAutoscaling>, root: &str) {
        let Some(autoscaling) = autoscaling else {
            return;
        };
        let at = |key: &str| path::join(root, key);
        self.mark(at(path::AUTOSCALING_ENABLED), &autoscaling.enabled);
        self.mark(at(path::AUTOSCALING_MIN_INSTANCES), &autoscaling.min_instances);
        self.mark(at(path::AUTOSCALING_MAX_INSTANCES), &autoscaling.max_instances);
        self.mark(at(path::AUTOSCALING_CPU_THRESHOLD), &autoscaling.cpu_threshold_percent);
        self.mark(at(path::AUTOSCALING_MEMORY_THRESHOLD), &autoscaling.memory_threshold_percent);
    }
}

impl<S: Into<String>> FromIterator<S> for FieldLocks {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Flatten a specification into its leaf paths and values.
pub fn leaves(spec: &AppSpecification) -> BTreeMap<String, LeafValue> {
    let mut out = BTreeMap::new();
    out.insert(path::NAME.to_string(), LeafValue::Text(spec.name.clone()));
    for (key, value) in &spec.env {
        out.insert(path::env(key), LeafValue::Text(value.clone()));
    }
    match &spec.source {
        AppSource::Image(image) => {
            out.insert(path::IMAGE_REPOSITORY.into(), LeafValue::Text(image.repository.clone()));
            out.insert(path::IMAGE_TAG.into(), LeafValue::Text(image.tag.clone()));
        }
        AppSource::Build(BuildStrategy::Pack {
            context,
            builder,
            buildpacks,
        }) => {
            out.insert(path::BUILD_CONTEXT.into(), LeafValue::Text(context.clone()));
            out.insert(path::BUILD_BUILDER.into(), LeafValue::Text(builder.clone()));
            out.insert(path::BUILD_BUILDPACKS.into(), LeafValue::List(buildpacks.clone()));
        }
        AppSource::Build(BuildStrategy::Docker {
            context,
            dockerfile,
        }) => {
            out.insert(path::BUILD_CONTEXT.into(), LeafValue::Text(context.clone()));
            out.insert(path::BUILD_DOCKERFILE.into(), LeafValue::Text(dockerfile.clone()));
        }
    }
    for (name, service) in &spec.services {
        service_leaves(service, &path::service(name), &mut out);
    }
    if let Some(predeploy) = &spec.predeploy {
        service_leaves(predeploy, path::PREDEPLOY, &mut out);
    }
    out
}

fn service_leaves(service: &ServiceSpec, root: &str, out: &mut BTreeMap<String, LeafValue>) {
    let mut put = |key: &str, value: LeafValue| {
        out.insert(path::join(root, key), value);
    };
    put(path::RUN, LeafValue::Text(service.run.clone()));
    put(path::INSTANCES, LeafValue::Count(service.instances));
    put(path::CPU_CORES, LeafValue::Cores(service.cpu_cores));
    put(path::RAM_MEGABYTES, LeafValue::Count(service.ram_megabytes));
    put(path::PORT, LeafValue::Count(service.port));
    match &service.config {
        ServiceConfig::Web(web) => {
            put(path::DOMAINS, LeafValue::List(web.domains.clone()));
            if let Some(health) = &web.health_check {
                put(path::HEALTH_CHECK_ENABLED, LeafValue::Flag(health.enabled));
                put(path::HEALTH_CHECK_HTTP_PATH, LeafValue::Text(health.http_path.clone()));
            }
        }
        ServiceConfig::Worker(_) => {}
        ServiceConfig::Job(job) => {
            put(path::CRON, LeafValue::Text(job.cron.clone()));
            put(path::ALLOW_CONCURRENT, LeafValue::Flag(job.allow_concurrent));
        }
    }
    if let Some(autoscaling) = service.config.autoscaling() {
        put(path::AUTOSCALING_ENABLED, LeafValue::Flag(autoscaling.enabled));
        put(path::AUTOSCALING_MIN_INSTANCES, LeafValue::Count(autoscaling.min_instances));
        put(path::AUTOSCALING_MAX_INSTANCES, LeafValue::Count(autoscaling.max_instances));
        put(path::AUTOSCALING_CPU_THRESHOLD, LeafValue::Count(autoscaling.cpu_threshold_percent));
        put(path::AUTOSCALING_MEMORY_THRESHOLD, LeafValue::Count(autoscaling.memory_threshold_percent));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appspec_core::{canonicalize, parse_document};

    const DOC: &str = r#"
name: demo
image:
  repository: nginx
services:
  api:
    type: web
    port: 0
    healthCheck:
      httpPath: /healthz
  nightly-job:
    cron: "0 3 * * *"
env:
  PORT: 8080
"#;

    #[test]
    fn declared_locks_follow_document_keys() {
        let raw = parse_document(DOC.as_bytes()).unwrap();
        let locks = FieldLocks::declared_in(&raw);
        let expected: FieldLocks = [
            "name",
            "image.repository",
            "env.PORT",
            "services.api.port",
            "services.api.healthCheck.httpPath",
            "services.nightly-job.cron",
        ]
        .into_iter()
        .collect();
        assert_eq!(locks, expected);
        assert!(!locks.contains("image.tag"));
    }

    #[test]
    fn present_locks_skip_zero_values() {
        let spec = canonicalize(&parse_document(DOC.as_bytes()).unwrap()).unwrap();
        let locks = FieldLocks::present_in(&spec);
        assert!(locks.contains("services.api.healthCheck.httpPath"));
        assert!(!locks.contains("services.api.port"));
        assert!(!locks.contains("services.api.healthCheck.enabled"));
    }

    #[test]
    fn amended_locks_are_the_remote_diff() {
        let submitted = canonicalize(&parse_document(DOC.as_bytes()).unwrap()).unwrap();
        let mut validated = submitted.clone();
        validated.services.get_mut("api").unwrap().port = 80;
        validated.env.insert("NODE_ENV".into(), "production".into());

        let locks = FieldLocks::amended(&submitted, &validated);
        let expected: FieldLocks = ["services.api.port", "env.NODE_ENV"].into_iter().collect();
        assert_eq!(locks, expected);
        assert!(FieldLocks::amended(&submitted, &submitted).is_empty());
    }

    #[test]
    fn amended_locks_include_removed_leaves() {
        let submitted = canonicalize(&parse_document(DOC.as_bytes()).unwrap()).unwrap();
        let mut validated = submitted.clone();
        validated.env.remove("PORT");
        if let ServiceConfig::Web(web) = &mut validated.services.get_mut("api").unwrap().config {
            web.health_check = None;
        }

        let locks = FieldLocks::amended(&submitted, &validated);
        let expected: FieldLocks = [
            "env.PORT",
            "services.api.healthCheck.enabled",
            "services.api.healthCheck.httpPath",
        ]
        .into_iter()
        .collect();
        assert_eq!(locks, expected);
        assert!(locks.contains_under("services.api.healthCheck"));
        assert!(!locks.contains_under("services.api.autoscaling"));
        assert!(!locks.contains_under("services.ap"));
    }

    #[test]
    fn union_merges_paths() {
        let a: FieldLocks = ["name"].into_iter().collect();
        let b: FieldLocks = ["env.PORT", "name"].into_iter().collect();
        let merged = a.union(&b);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.iter().collect::<Vec<_>>(), vec!["env.PORT", "name"]);
    }
}
