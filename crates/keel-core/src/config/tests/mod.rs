#![cfg(test)]

use std::sync::Arc;
use std::time::Duration;

use crate::config::{
    ConfigChannel, ConfigError, ConfigSnapshot, HostConfig, KEY_FAILURE_POLICY,
};
use crate::module_system::lifecycle::FailurePolicy;

const DOC: &str = r#"{
    "plugin": {
        "directories": ["/opt/keel/modules", "./modules"],
        "failurePolicy": "fail-fast",
        "enableUnloading": false,
        "shellVersion": "2.1.0",
        "stopGracePeriod": 10
    },
    "shell": { "environment": "staging" },
    "logging": { "level": "debug" }
}"#;

#[test]
fn nested_objects_flatten_into_dotted_keys() {
    let snapshot = ConfigSnapshot::from_json(DOC).unwrap();
    assert_eq!(snapshot.get_str("logging.level"), Some("debug"));
    assert_eq!(snapshot.get_str("plugin.failurePolicy"), Some("fail-fast"));
    assert_eq!(snapshot.get_bool("plugin.enableUnloading"), Some(false));
    assert_eq!(snapshot.get_u64("plugin.stopGracePeriod"), Some(10));
    assert_eq!(
        snapshot.get_string_array("plugin.directories"),
        Some(vec!["/opt/keel/modules".to_string(), "./modules".to_string()])
    );
}

#[test]
fn host_config_reads_the_documented_keys() {
    let snapshot = ConfigSnapshot::from_json(DOC).unwrap();
    let config = HostConfig::from_snapshot(&snapshot).unwrap();

    assert_eq!(config.module_directories.len(), 2);
    assert_eq!(config.failure_policy, FailurePolicy::FailFast);
    assert!(!config.enable_unloading);
    assert_eq!(config.shell_version.unwrap().to_string(), "2.1.0");
    assert_eq!(config.stop_grace, Duration::from_secs(10));
    assert_eq!(config.environment, "staging");
}

#[test]
fn missing_keys_fall_back_to_defaults() {
    let snapshot = ConfigSnapshot::from_json("{}").unwrap();
    let config = HostConfig::from_snapshot(&snapshot).unwrap();

    assert!(config.module_directories.is_empty());
    assert_eq!(config.failure_policy, FailurePolicy::Continue);
    assert!(config.enable_unloading);
    assert!(config.shell_version.is_none());
    assert_eq!(config.stop_grace, Duration::from_secs(30));
    assert_eq!(config.environment, "production");
}

#[test]
fn invalid_policy_value_is_rejected() {
    let snapshot =
        ConfigSnapshot::from_json(r#"{"plugin": {"failurePolicy": "explode"}}"#).unwrap();
    let err = HostConfig::from_snapshot(&snapshot).unwrap_err();
    match err {
        ConfigError::InvalidValue { key, .. } => assert_eq!(key, KEY_FAILURE_POLICY),
        other => panic!("expected InvalidValue, got {other}"),
    }
}

#[test]
fn invalid_shell_version_is_rejected() {
    let snapshot =
        ConfigSnapshot::from_json(r#"{"plugin": {"shellVersion": "two"}}"#).unwrap();
    assert!(HostConfig::from_snapshot(&snapshot).is_err());
}

#[test]
fn malformed_document_is_a_parse_error() {
    let err = ConfigSnapshot::from_json("{ nope").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[tokio::test]
async fn channel_delivers_snapshots_to_subscribers() {
    let channel = ConfigChannel::new();
    let mut receiver = channel.subscribe();

    let snapshot = Arc::new(ConfigSnapshot::from_json(r#"{"a": 1}"#).unwrap());
    let delivered = channel.publish(snapshot.clone());
    assert_eq!(delivered, 1);

    let received = receiver.recv().await.unwrap();
    assert_eq!(received.get_u64("a"), Some(1));
}

#[test]
fn publish_without_subscribers_is_harmless() {
    let channel = ConfigChannel::new();
    let snapshot = Arc::new(ConfigSnapshot::default());
    assert_eq!(channel.publish(snapshot), 0);
}
