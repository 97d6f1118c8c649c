use std::collections::HashMap;

use async_trait::async_trait;
use semver::Version;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::ConfigSnapshot;
use crate::kernel::app::AppBuilder;
use crate::module_system::dependency::ModuleDependency;
use crate::module_system::error::ModuleSystemError;
use crate::module_system::initializer::InitializationContext;
use crate::services::ServiceCollection;

/// Health verdict a module reports for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleHealth {
    pub state: HealthState,
    pub description: Option<String>,
}

impl ModuleHealth {
    pub fn healthy() -> Self {
        Self {
            state: HealthState::Healthy,
            description: None,
        }
    }

    pub fn degraded(description: impl Into<String>) -> Self {
        Self {
            state: HealthState::Degraded,
            description: Some(description.into()),
        }
    }

    pub fn unhealthy(description: impl Into<String>) -> Self {
        Self {
            state: HealthState::Unhealthy,
            description: Some(description.into()),
        }
    }
}

/// Contract every module entry point implements.
///
/// Identity getters mirror the manifest; the hooks are invoked by the host
/// in lifecycle order. Every hook takes a cancellation token and is
/// expected to observe it between units of work; a module that ignores
/// cancellation past the stop grace period is failed and force-disposed.
///
/// All hooks except the identity getters have default implementations, so
/// a minimal module only supplies `name` and `version`.
#[async_trait]
pub trait ShellModule: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn author(&self) -> Option<&str> {
        None
    }

    fn dependencies(&self) -> Vec<ModuleDependency> {
        Vec::new()
    }

    fn minimum_shell_version(&self) -> Option<Version> {
        None
    }

    fn metadata(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    fn is_enabled(&self) -> bool {
        true
    }

    /// Pre-start validation against the host context. A failure here
    /// short-circuits every later stage for this module.
    async fn validate(
        &self,
        _context: &InitializationContext,
        _token: CancellationToken,
    ) -> Result<(), ModuleSystemError> {
        Ok(())
    }

    /// Register the module's services into its own collection.
    async fn on_initialize(
        &self,
        _services: &mut ServiceCollection,
        _token: CancellationToken,
    ) -> Result<(), ModuleSystemError> {
        Ok(())
    }

    /// Append routes and middleware to the application pipeline.
    async fn on_configure(
        &self,
        _app: &mut AppBuilder,
        _token: CancellationToken,
    ) -> Result<(), ModuleSystemError> {
        Ok(())
    }

    async fn on_start(&self, _token: CancellationToken) -> Result<(), ModuleSystemError> {
        Ok(())
    }

    async fn on_stop(&self, _token: CancellationToken) -> Result<(), ModuleSystemError> {
        Ok(())
    }

    async fn on_unload(&self, _token: CancellationToken) -> Result<(), ModuleSystemError> {
        Ok(())
    }

    async fn on_configuration_changed(
        &self,
        _snapshot: &ConfigSnapshot,
        _token: CancellationToken,
    ) -> Result<(), ModuleSystemError> {
        Ok(())
    }

    async fn check_health(&self, _token: CancellationToken) -> ModuleHealth {
        ModuleHealth::healthy()
    }
}
