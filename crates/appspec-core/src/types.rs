//! Canonical application specification types.
//!
//! These are the typed, kind-disambiguated form of a declarative app
//! document. A value of these types is what gets encoded on the wire, sent
//! to the validation authority, and projected into the client form model.
//! Values are never mutated in place: every parse or remote response builds
//! a fresh `AppSpecification`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique service name within an app. Doubles as the service's identity.
pub type ServiceName = String;

// ── App ───────────────────────────────────────────────────────────

/// Root of the canonical specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSpecification {
    pub name: String,
    /// Environment variables injected into every service.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Where the app's image comes from.
    pub source: AppSource,
    pub services: BTreeMap<ServiceName, ServiceSpec>,
    /// Job run once before each rollout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predeploy: Option<ServiceSpec>,
}

impl AppSpecification {
    /// Look up a service by name.
    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.get(name)
    }

    /// Services of the given kind, in name order.
    pub fn services_of_kind(&self, kind: ServiceKind) -> impl Iterator<Item = (&str, &ServiceSpec)> {
        self.services
            .iter()
            .filter(move |(_, spec)| spec.kind() == kind)
            .map(|(name, spec)| (name.as_str(), spec))
    }
}

/// Exactly one of a prebuilt image or a build strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppSource {
    Image(ImageRef),
    Build(BuildStrategy),
}

/// Registry reference for a prebuilt image.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            f.write_str(&self.repository)
        } else {
            write!(f, "{}:{}", self.repository, self.tag)
        }
    }
}

// ── Build ─────────────────────────────────────────────────────────

/// How to build the app image from source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BuildStrategy {
    /// Cloud Native Buildpacks.
    Pack {
        context: String,
        builder: String,
        buildpacks: Vec<String>,
    },
    /// Plain `docker build`.
    Docker { context: String, dockerfile: String },
}

impl BuildStrategy {
    pub fn method(&self) -> BuildMethod {
        match self {
            BuildStrategy::Pack { .. } => BuildMethod::Pack,
            BuildStrategy::Docker { .. } => BuildMethod::Docker,
        }
    }

    pub fn context(&self) -> &str {
        match self {
            BuildStrategy::Pack { context, .. } | BuildStrategy::Docker { context, .. } => context,
        }
    }

    /// An empty strategy for the given method, keeping only the build context.
    pub fn empty(method: BuildMethod, context: String) -> Self {
        match method {
            BuildMethod::Pack => BuildStrategy::Pack {
                context,
                builder: String::new(),
                buildpacks: Vec::new(),
            },
            BuildMethod::Docker => BuildStrategy::Docker {
                context,
                dockerfile: String::new(),
            },
        }
    }
}

/// Discriminant of [`BuildStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMethod {
    Pack,
    Docker,
}

impl BuildMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildMethod::Pack => "pack",
            BuildMethod::Docker => "docker",
        }
    }
}

impl fmt::Display for BuildMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Service ───────────────────────────────────────────────────────

/// A single service of the app.
///
/// The service kind is not stored separately: it is the variant of
/// `config`, so a spec can never carry fields of another kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub run: String,
    pub instances: u32,
    pub cpu_cores: f32,
    pub ram_megabytes: u32,
    pub port: u32,
    pub config: ServiceConfig,
}

impl ServiceSpec {
    /// A service of the given kind with every field at its default.
    pub fn empty(kind: ServiceKind) -> Self {
        Self {
            run: String::new(),
            instances: 0,
            cpu_cores: 0.0,
            ram_megabytes: 0,
            port: 0,
            config: ServiceConfig::empty(kind),
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.config.kind()
    }
}

/// Kind-specific service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceConfig {
    Web(WebConfig),
    Worker(WorkerConfig),
    Job(JobConfig),
}

impl ServiceConfig {
    pub fn empty(kind: ServiceKind) -> Self {
        match kind {
            ServiceKind::Web => ServiceConfig::Web(WebConfig::default()),
            ServiceKind::Worker => ServiceConfig::Worker(WorkerConfig::default()),
            ServiceKind::Job => ServiceConfig::Job(JobConfig::default()),
        }
    }

    pub fn kind(&self) -> ServiceKind {
        match self {
            ServiceConfig::Web(_) => ServiceKind::Web,
            ServiceConfig::Worker(_) => ServiceKind::Worker,
            ServiceConfig::Job(_) => ServiceKind::Job,
        }
    }

    /// Autoscaling policy, for the kinds that support one.
    pub fn autoscaling(&self) -> Option<&Autoscaling> {
        match self {
            ServiceConfig::Web(web) => web.autoscaling.as_ref(),
            ServiceConfig::Worker(worker) => worker.autoscaling.as_ref(),
            ServiceConfig::Job(_) => None,
        }
    }
}

/// Configuration for an HTTP-serving service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WebConfig {
    /// Custom hostnames, in declaration order.
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<Autoscaling>,
}

/// Configuration for a long-running background service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<Autoscaling>,
}

/// Configuration for a run-to-completion service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobConfig {
    /// Cron expression; empty for jobs that only run on demand.
    #[serde(default)]
    pub cron: String,
    #[serde(default)]
    pub allow_concurrent: bool,
}

/// Horizontal autoscaling policy shared by web and worker services.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Autoscaling {
    pub enabled: bool,
    pub min_instances: u32,
    pub max_instances: u32,
    pub cpu_threshold_percent: u32,
    pub memory_threshold_percent: u32,
}

/// HTTP health probe for a web service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HealthCheck {
    pub enabled: bool,
    pub http_path: String,
}

/// The three service kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Web,
    Worker,
    Job,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [ServiceKind::Web, ServiceKind::Worker, ServiceKind::Job];

    /// Exact literal used by the `type` key of a document.
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Web => "web",
            ServiceKind::Worker => "worker",
            ServiceKind::Job => "job",
        }
    }

    /// Map a `type` literal. Matching is exact: `"Web"` is not a kind.
    pub fn from_literal(literal: &str) -> Option<Self> {
        match literal {
            "web" => Some(ServiceKind::Web),
            "worker" => Some(ServiceKind::Worker),
            "job" => Some(ServiceKind::Job),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service fields that only exist for some kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindField {
    Autoscaling,
    Domains,
    HealthCheck,
    Cron,
    AllowConcurrent,
}

impl KindField {
    pub const ALL: [KindField; 5] = [
        KindField::Autoscaling,
        KindField::Domains,
        KindField::HealthCheck,
        KindField::Cron,
        KindField::AllowConcurrent,
    ];

    /// Document key of the field.
    pub fn key(self) -> &'static str {
        match self {
            KindField::Autoscaling => crate::path::AUTOSCALING,
            KindField::Domains => crate::path::DOMAINS,
            KindField::HealthCheck => crate::path::HEALTH_CHECK,
            KindField::Cron => crate::path::CRON,
            KindField::AllowConcurrent => crate::path::ALLOW_CONCURRENT,
        }
    }

    pub fn applies_to(self, kind: ServiceKind) -> bool {
        match kind {
            ServiceKind::Web => matches!(
                self,
                KindField::Autoscaling | KindField::Domains | KindField::HealthCheck
            ),
            ServiceKind::Worker => matches!(self, KindField::Autoscaling),
            ServiceKind::Job => matches!(self, KindField::Cron | KindField::AllowConcurrent),
        }
    }
}
