//! Protobuf messages for the app specification contract.
//!
//! Declared with `prost` derives rather than generated from `.proto`
//! files. Tag numbers are the wire contract and must never be reused.
//! Map fields use `btree_map` so that encoding is deterministic.

use std::collections::BTreeMap;

/// Root message: one application.
#[derive(Clone, PartialEq, prost::Message)]
pub struct App {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(btree_map = "string, message", tag = "2")]
    pub services: BTreeMap<String, Service>,
    #[prost(message, optional, tag = "3")]
    pub image: Option<AppImage>,
    #[prost(message, optional, tag = "4")]
    pub build: Option<Build>,
    #[prost(btree_map = "string, string", tag = "5")]
    pub env: BTreeMap<String, String>,
    #[prost(message, optional, tag = "6")]
    pub predeploy: Option<Service>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppImage {
    #[prost(string, tag = "1")]
    pub repository: String,
    #[prost(string, tag = "2")]
    pub tag: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Build {
    #[prost(string, tag = "1")]
    pub context: String,
    /// `pack` or `docker`.
    #[prost(string, tag = "2")]
    pub method: String,
    #[prost(string, tag = "3")]
    pub builder: String,
    #[prost(string, repeated, tag = "4")]
    pub buildpacks: Vec<String>,
    #[prost(string, tag = "5")]
    pub dockerfile: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Service {
    #[prost(string, tag = "1")]
    pub run: String,
    #[prost(uint32, tag = "2")]
    pub instances: u32,
    #[prost(float, tag = "3")]
    pub cpu_cores: f32,
    #[prost(uint32, tag = "4")]
    pub ram_megabytes: u32,
    #[prost(uint32, tag = "5")]
    pub port: u32,
    #[prost(enumeration = "ServiceType", tag = "6")]
    pub service_type: i32,
    #[prost(oneof = "service::Config", tags = "7, 8, 9")]
    pub config: Option<service::Config>,
}

pub mod service {
    /// Kind-specific configuration.
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Config {
        #[prost(message, tag = "7")]
        WebConfig(super::WebServiceConfig),
        #[prost(message, tag = "8")]
        WorkerConfig(super::WorkerServiceConfig),
        #[prost(message, tag = "9")]
        JobConfig(super::JobServiceConfig),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ServiceType {
    Unspecified = 0,
    Web = 1,
    Worker = 2,
    Job = 3,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WebServiceConfig {
    #[prost(message, optional, tag = "1")]
    pub autoscaling: Option<Autoscaling>,
    #[prost(message, repeated, tag = "2")]
    pub domains: Vec<Domain>,
    #[prost(message, optional, tag = "3")]
    pub health_check: Option<HealthCheck>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WorkerServiceConfig {
    #[prost(message, optional, tag = "1")]
    pub autoscaling: Option<Autoscaling>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct JobServiceConfig {
    #[prost(bool, tag = "1")]
    pub allow_concurrent: bool,
    #[prost(string, tag = "2")]
    pub cron: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Autoscaling {
    #[prost(bool, tag = "1")]
    pub enabled: bool,
    #[prost(uint32, tag = "2")]
    pub min_instances: u32,
    #[prost(uint32, tag = "3")]
    pub max_instances: u32,
    #[prost(uint32, tag = "4")]
    pub cpu_threshold_percent: u32,
    #[prost(uint32, tag = "5")]
    pub memory_threshold_percent: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Domain {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HealthCheck {
    #[prost(bool, tag = "1")]
    pub enabled: bool,
    #[prost(string, tag = "2")]
    pub http_path: String,
}
