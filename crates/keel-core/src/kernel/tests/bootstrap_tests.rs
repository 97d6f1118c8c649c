#![cfg(test)]

use std::sync::Arc;

use crate::config::{ConfigSnapshot, HostConfig};
use crate::kernel::bootstrap::ShellApplication;

#[tokio::test]
async fn empty_host_brings_up_and_shuts_down_cleanly() {
    let mut shell = ShellApplication::new(HostConfig::default()).unwrap();

    let (provider, load_report) = shell.bring_up().await.unwrap();
    assert_eq!(load_report.discovered, 0);
    assert!(load_report.loaded.is_empty());

    // The host publishes its own configuration as a shared service.
    let config = provider.resolve::<HostConfig>().unwrap();
    assert!(config.module_directories.is_empty());

    let health = shell.report_health().await;
    assert_eq!(health.healthy + health.degraded + health.unhealthy, 0);

    shell.shut_down().await;
    assert!(!shell.has_failed_modules().await);
}

#[tokio::test]
async fn missing_module_root_surfaces_as_warning() {
    let config = HostConfig {
        module_directories: vec!["/definitely/not/here".into()],
        ..HostConfig::default()
    };
    let shell = ShellApplication::new(config).unwrap();

    let report = shell.load_modules().await.unwrap();
    assert!(report.warnings.iter().any(|w| w.contains("does not exist")));
}

#[tokio::test]
async fn config_publication_reaches_the_channel() {
    let shell = ShellApplication::new(HostConfig::default()).unwrap();
    let mut receiver = shell.config_channel().subscribe();

    let snapshot = Arc::new(ConfigSnapshot::from_json(r#"{"logging": {"level": "warn"}}"#).unwrap());
    shell.publish_config(snapshot).await;

    let received = receiver.recv().await.unwrap();
    assert_eq!(received.get_str("logging.level"), Some("warn"));
}
