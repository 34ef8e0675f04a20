//! Field paths.
//!
//! Paths name leaves of an app specification using the document's own key
//! names (`services.api.healthCheck.httpPath`, `env.PORT`). Semantic errors
//! report them, and the form model uses them to track which leaves are
//! locked by the source.

/// Separates the segments of a path. Service names may not contain it.
pub const SEPARATOR: char = '.';

pub const NAME: &str = "name";
pub const SERVICES: &str = "services";
pub const PREDEPLOY: &str = "predeploy";
pub const ENV: &str = "env";

pub const IMAGE_REPOSITORY: &str = "image.repository";
pub const IMAGE_TAG: &str = "image.tag";
pub const BUILD_METHOD: &str = "build.method";
pub const BUILD_CONTEXT: &str = "build.context";
pub const BUILD_BUILDER: &str = "build.builder";
pub const BUILD_BUILDPACKS: &str = "build.buildpacks";
pub const BUILD_DOCKERFILE: &str = "build.dockerfile";

pub const TYPE: &str = "type";
pub const RUN: &str = "run";
pub const INSTANCES: &str = "instances";
pub const CPU_CORES: &str = "cpuCores";
pub const RAM_MEGABYTES: &str = "ramMegabytes";
pub const PORT: &str = "port";
pub const DOMAINS: &str = "domains";
pub const HEALTH_CHECK: &str = "healthCheck";
pub const HEALTH_CHECK_ENABLED: &str = "healthCheck.enabled";
pub const HEALTH_CHECK_HTTP_PATH: &str = "healthCheck.httpPath";
pub const AUTOSCALING: &str = "autoscaling";
pub const AUTOSCALING_ENABLED: &str = "autoscaling.enabled";
pub const AUTOSCALING_MIN_INSTANCES: &str = "autoscaling.minInstances";
pub const AUTOSCALING_MAX_INSTANCES: &str = "autoscaling.maxInstances";
pub const AUTOSCALING_CPU_THRESHOLD: &str = "autoscaling.cpuThresholdPercent";
pub const AUTOSCALING_MEMORY_THRESHOLD: &str = "autoscaling.memoryThresholdPercent";
pub const CRON: &str = "cron";
pub const ALLOW_CONCURRENT: &str = "allowConcurrent";

/// Root path of a named service.
pub fn service(name: &str) -> String {
    format!("{SERVICES}{SEPARATOR}{name}")
}

/// Path of an environment variable.
pub fn env(key: &str) -> String {
    format!("{ENV}{SEPARATOR}{key}")
}

/// Join a root path and a relative key.
pub fn join(root: &str, key: &str) -> String {
    format!("{root}{SEPARATOR}{key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_service_leaf_paths() {
        let root = service("example-web");
        assert_eq!(root, "services.example-web");
        assert_eq!(
            join(&root, HEALTH_CHECK_HTTP_PATH),
            "services.example-web.healthCheck.httpPath"
        );
        assert_eq!(env("PORT"), "env.PORT");
        assert_eq!(join(PREDEPLOY, RUN), "predeploy.run");
    }
}
