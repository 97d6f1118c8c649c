//! Host configuration: a read-only key/value view over a JSON document
//! plus a change-notification stream.
//!
//! Loading, secret resolution, and file watching live outside the core;
//! whatever produces a new document publishes it through [`ConfigChannel`]
//! and the kernel forwards the snapshot to every loaded module.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use semver::Version;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::module_system::lifecycle::FailurePolicy;

pub const KEY_MODULE_DIRECTORIES: &str = "plugin.directories";
pub const KEY_FAILURE_POLICY: &str = "plugin.failurePolicy";
pub const KEY_ENABLE_UNLOADING: &str = "plugin.enableUnloading";
pub const KEY_SHELL_VERSION: &str = "plugin.shellVersion";
pub const KEY_STOP_GRACE_PERIOD: &str = "plugin.stopGracePeriod";
pub const KEY_ENVIRONMENT: &str = "shell.environment";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Configuration key '{key}' is invalid: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read configuration file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An immutable key/value view of the configuration at one point in time.
///
/// Nested objects flatten into dot-separated keys, so
/// `{"plugin": {"failurePolicy": "continue"}}` is read as
/// `plugin.failurePolicy`. Arrays and scalars stay as JSON values.
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    values: BTreeMap<String, Value>,
}

impl ConfigSnapshot {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_json::from_str(content)?;
        let mut values = BTreeMap::new();
        flatten("", &root, &mut values);
        Ok(Self { values })
    }

    pub async fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&content)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    pub fn get_string_array(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten(&key, v, out);
            }
        }
        other => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), other.clone());
            }
        }
    }
}

/// The host-side settings the module system consumes.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Discovery roots
    pub module_directories: Vec<PathBuf>,
    pub failure_policy: FailurePolicy,
    /// Attempt collectible isolation contexts
    pub enable_unloading: bool,
    /// Override the version advertised to modules
    pub shell_version: Option<Version>,
    pub stop_grace: Duration,
    pub environment: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            module_directories: Vec::new(),
            failure_policy: FailurePolicy::default(),
            enable_unloading: true,
            shell_version: None,
            stop_grace: Duration::from_secs(crate::kernel::constants::DEFAULT_STOP_GRACE_SECS),
            environment: "production".to_string(),
        }
    }
}

impl HostConfig {
    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(dirs) = snapshot.get_string_array(KEY_MODULE_DIRECTORIES) {
            config.module_directories = dirs.into_iter().map(PathBuf::from).collect();
        }
        if let Some(policy) = snapshot.get_str(KEY_FAILURE_POLICY) {
            config.failure_policy =
                policy
                    .parse()
                    .map_err(|message| ConfigError::InvalidValue {
                        key: KEY_FAILURE_POLICY.to_string(),
                        message,
                    })?;
        }
        if let Some(enable) = snapshot.get_bool(KEY_ENABLE_UNLOADING) {
            config.enable_unloading = enable;
        }
        if let Some(version) = snapshot.get_str(KEY_SHELL_VERSION) {
            config.shell_version =
                Some(
                    Version::parse(version).map_err(|e| ConfigError::InvalidValue {
                        key: KEY_SHELL_VERSION.to_string(),
                        message: e.to_string(),
                    })?,
                );
        }
        if let Some(secs) = snapshot.get_u64(KEY_STOP_GRACE_PERIOD) {
            config.stop_grace = Duration::from_secs(secs);
        }
        if let Some(environment) = snapshot.get_str(KEY_ENVIRONMENT) {
            config.environment = environment.to_string();
        }

        Ok(config)
    }
}

/// Broadcast channel configuration changes fan out over.
#[derive(Debug, Clone)]
pub struct ConfigChannel {
    sender: broadcast::Sender<std::sync::Arc<ConfigSnapshot>>,
}

impl Default for ConfigChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigChannel {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender }
    }

    /// Publish a new snapshot. Returns how many subscribers saw it.
    pub fn publish(&self, snapshot: std::sync::Arc<ConfigSnapshot>) -> usize {
        self.sender.send(snapshot).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<std::sync::Arc<ConfigSnapshot>> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests;
