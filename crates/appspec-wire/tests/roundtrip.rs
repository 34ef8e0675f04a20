//! Property tests for the wire round-trip law.

use std::collections::BTreeMap;

use appspec_core::*;
use proptest::prelude::*;

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,12}"
}

fn text() -> impl Strategy<Value = String> {
    "[ -~]{0,24}"
}

fn autoscaling() -> impl Strategy<Value = Autoscaling> {
    (any::<bool>(), any::<u32>(), any::<u32>(), 0u32..=100, 0u32..=100).prop_map(
        |(enabled, min_instances, max_instances, cpu, mem)| Autoscaling {
            enabled,
            min_instances,
            max_instances,
            cpu_threshold_percent: cpu,
            memory_threshold_percent: mem,
        },
    )
}

fn config() -> impl Strategy<Value = ServiceConfig> {
    prop_oneof![
        (
            prop::collection::vec(name(), 0..3),
            prop::option::of((any::<bool>(), text())),
            prop::option::of(autoscaling()),
        )
            .prop_map(|(domains, health_check, autoscaling)| {
                ServiceConfig::Web(WebConfig {
                    domains,
                    health_check: health_check.map(|(enabled, http_path)| HealthCheck {
                        enabled,
                        http_path,
                    }),
                    autoscaling,
                })
            }),
        prop::option::of(autoscaling())
            .prop_map(|autoscaling| ServiceConfig::Worker(WorkerConfig { autoscaling })),
        (text(), any::<bool>()).prop_map(|(cron, allow_concurrent)| {
            ServiceConfig::Job(JobConfig {
                cron,
                allow_concurrent,
            })
        }),
    ]
}

fn service() -> impl Strategy<Value = ServiceSpec> {
    (text(), any::<u32>(), 0.0f32..64.0, any::<u32>(), any::<u32>(), config()).prop_map(
        |(run, instances, cpu_cores, ram_megabytes, port, config)| ServiceSpec {
            run,
            instances,
            cpu_cores,
            ram_megabytes,
            port,
            config,
        },
    )
}

fn job() -> impl Strategy<Value = ServiceSpec> {
    (text(), text(), any::<bool>()).prop_map(|(run, cron, allow_concurrent)| ServiceSpec {
        run,
        config: ServiceConfig::Job(JobConfig {
            cron,
            allow_concurrent,
        }),
        ..ServiceSpec::empty(ServiceKind::Job)
    })
}

fn source() -> impl Strategy<Value = AppSource> {
    prop_oneof![
        (name(), text()).prop_map(|(repository, tag)| AppSource::Image(ImageRef { repository, tag })),
        (text(), text(), prop::collection::vec(name(), 0..3)).prop_map(
            |(context, builder, buildpacks)| AppSource::Build(BuildStrategy::Pack {
                context,
                builder,
                buildpacks,
            })
        ),
        (text(), text()).prop_map(|(context, dockerfile)| {
            AppSource::Build(BuildStrategy::Docker { context, dockerfile })
        }),
    ]
}

fn app() -> impl Strategy<Value = AppSpecification> {
    (
        name(),
        prop::collection::btree_map("[A-Z_]{1,8}", text(), 0..4),
        source(),
        prop::collection::btree_map(name(), service(), 1..5),
        prop::option::of(job()),
    )
        .prop_map(|(name, env, source, services, predeploy)| AppSpecification {
            name,
            env,
            source,
            services,
            predeploy,
        })
}

proptest! {
    #[test]
    fn binary_round_trip(spec in app()) {
        let bytes = appspec_wire::encode(&spec);
        prop_assert_eq!(appspec_wire::decode(&bytes).unwrap(), spec);
    }

    #[test]
    fn text_round_trip(spec in app()) {
        let text = appspec_wire::encode_text(&spec);
        prop_assert!(text.is_ascii());
        prop_assert_eq!(appspec_wire::decode_text(&text).unwrap(), spec);
    }
}

#[test]
fn fixture_scenario_round_trips() {
    let yaml = include_bytes!("../../appspec-core/tests/fixtures/js-test-app.yaml");
    let spec = AppSpecification::from_yaml(yaml).unwrap();
    let back = appspec_wire::decode_text(&appspec_wire::encode_text(&spec)).unwrap();
    assert_eq!(back, spec);
    assert_eq!(back.env, BTreeMap::from([
        ("NODE_ENV".to_string(), "production".to_string()),
        ("PORT".to_string(), "8080".to_string()),
    ]));
}
