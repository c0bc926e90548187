use kafka_demo::conf::{AppConfig, DemoConfigError, SecurityProtocol};

use std::io::Write;
use std::path::Path;

fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_repository_config() {
    let config = AppConfig::load(Some(Path::new("config.yaml"))).unwrap();
    assert_eq!(config.topic.name, "demo-events");
    assert_eq!(config.topic.retention_ms, 21_600_000);
    assert_eq!(config.topic.retention_bytes, 5_368_709_120);
    assert_eq!(config.consumer.group_id, "cli");
    assert_eq!(config.producer.interval_ms, 10);
    assert_eq!(config.kafka.security_protocol, SecurityProtocol::SaslSsl);
}

#[test]
fn test_load_without_file_uses_defaults() {
    let config = AppConfig::load(None).unwrap();
    assert_eq!(config.topic.name, "demo-events");
    assert_eq!(config.producer.max_records_per_batch, 100);
    assert_eq!(config.kafka.sasl_mechanism, "SCRAM-SHA-512");
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let file = write_config(
        ".yaml",
        "producer:\n  interval_ms: 250\nkafka:\n  security_protocol: SASL_PLAINTEXT\n",
    );
    let config = AppConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.producer.interval_ms, 250);
    assert_eq!(config.producer.max_records_per_batch, 100);
    assert_eq!(
        config.kafka.security_protocol,
        SecurityProtocol::SaslPlaintext
    );
    assert_eq!(config.topic.name, "demo-events");
}

#[test]
fn test_placeholders_are_expanded() {
    let file = write_config(
        ".yaml",
        "topic:\n  name: ${KAFKA_DEMO_TEST_UNSET_TOPIC:-expanded-topic}\n",
    );
    let config = AppConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.topic.name, "expanded-topic");
}

#[test]
fn test_missing_placeholder_variable_fails() {
    let file = write_config(
        ".yaml",
        "kafka:\n  ssl_ca_location: ${KAFKA_DEMO_TEST_UNSET_CA}\n",
    );
    let error = AppConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(error, DemoConfigError::EnvExpansionError(_)));
}

#[test]
fn test_toml_config() {
    let file = write_config(".toml", "[consumer]\ngroup_id = \"audit\"\n");
    let config = AppConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.consumer.group_id, "audit");
}

#[test]
fn test_invalid_batch_bound_is_rejected() {
    let file = write_config(".yaml", "producer:\n  max_records_per_batch: 0\n");
    let error = AppConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(error, DemoConfigError::InvalidValue { .. }));
}

#[test]
fn test_missing_file_is_an_error() {
    let error = AppConfig::load(Some(Path::new("tests/does-not-exist.yaml"))).unwrap_err();
    assert!(matches!(error, DemoConfigError::ConfigFileNotFound(_)));
}

#[test]
fn test_out_of_range_jitter_is_rejected() {
    let file = write_config(
        ".yaml",
        "producer:\n  timestamp_jitter_secs: 9000000000000000\n",
    );
    let error = AppConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(
        error,
        DemoConfigError::InvalidValue {
            key: "producer.timestamp_jitter_secs",
            ..
        }
    ));
}
