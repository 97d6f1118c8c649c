use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{ConfigChannel, ConfigSnapshot, HostConfig};
use crate::kernel::app::AppBuilder;
use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::module_system::manager::{
    HealthReport, LifecycleReport, LoadReport, ManagerSettings, ModuleManager,
};
use crate::services::{ServiceCollection, ServiceProvider};

/// The application shell: composes configuration, the host service
/// collection, and the module manager, and drives the bring-up and
/// shutdown sweeps.
pub struct ShellApplication {
    config: HostConfig,
    manager: Arc<ModuleManager>,
    app: AppBuilder,
    config_channel: ConfigChannel,
    shutdown: CancellationToken,
    started: bool,
}

impl ShellApplication {
    /// Build a shell from an already-materialized configuration.
    pub fn new(config: HostConfig) -> Result<Self> {
        let settings = ManagerSettings::from_config(&config)?;
        log::info!(
            "{} v{} starting (policy: {}, unloading: {})",
            constants::SHELL_NAME,
            settings.shell_version,
            settings.failure_policy,
            settings.enable_unloading
        );

        let mut shared = ServiceCollection::new();
        shared.add_instance::<HostConfig>(Arc::new(config.clone()));

        let manager = Arc::new(ModuleManager::new(settings, shared));
        Ok(Self {
            config,
            manager,
            app: AppBuilder::new(),
            config_channel: ConfigChannel::new(),
            shutdown: CancellationToken::new(),
            started: false,
        })
    }

    /// Build a shell from a JSON configuration document on disk.
    pub async fn from_config_file(path: &Path) -> Result<Self> {
        let snapshot = ConfigSnapshot::from_file(path).await?;
        let config = HostConfig::from_snapshot(&snapshot)?;
        Self::new(config)
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<ModuleManager> {
        &self.manager
    }

    pub fn app(&self) -> &AppBuilder {
        &self.app
    }

    pub fn config_channel(&self) -> &ConfigChannel {
        &self.config_channel
    }

    /// Token cancelled when shutdown begins; threaded into every module
    /// hook.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Discover and load every module, then validate the candidate graph.
    /// Stops before module containers are touched; `bring_up` continues
    /// from here.
    pub async fn load_modules(&self) -> Result<LoadReport> {
        let token = self.shutdown.child_token();
        let report = self
            .manager
            .load_all(&self.config.module_directories, token)
            .await?;
        for warning in &report.warnings {
            log::warn!("{}", warning);
        }
        Ok(report)
    }

    /// Full bring-up: load, merge and validate service containers,
    /// configure the pipeline, start modules in dependency order.
    pub async fn bring_up(&mut self) -> Result<(Arc<ServiceProvider>, LoadReport)> {
        let token = self.shutdown.child_token();

        let load_report = self.load_modules().await?;

        let host_services = {
            let mut host = ServiceCollection::new();
            host.add_instance::<HostConfig>(Arc::new(self.config.clone()));
            host
        };
        let (provider, _validation) = self
            .manager
            .initialize_containers(host_services, token.clone())
            .await?;

        self.manager.configure(&mut self.app, token.clone()).await?;
        self.manager.start(token).await?;
        self.started = true;

        log::info!(
            "{} up: {} modules loaded, {} routes registered",
            constants::SHELL_NAME,
            load_report.loaded.len(),
            self.app.routes().len()
        );
        Ok((provider, load_report))
    }

    /// Push a new configuration snapshot to every loaded module.
    pub async fn publish_config(&self, snapshot: Arc<ConfigSnapshot>) {
        self.config_channel.publish(snapshot.clone());
        let token = self.shutdown.child_token();
        self.manager.on_config_change(snapshot, token).await;
    }

    pub async fn report_health(&self) -> HealthReport {
        self.manager.report_health(self.shutdown.child_token()).await
    }

    pub async fn lifecycle_report(&self) -> LifecycleReport {
        self.manager.lifecycle_report().await
    }

    /// Reverse-order stop of every started module.
    pub async fn shut_down(&mut self) {
        if !self.started {
            return;
        }
        log::info!("{} shutting down", constants::SHELL_NAME);
        self.shutdown.cancel();
        self.manager.stop(CancellationToken::new()).await;
        self.started = false;
    }

    /// Whether the last bring-up left any module in a failed state.
    pub async fn has_failed_modules(&self) -> bool {
        self.lifecycle_report()
            .await
            .entries
            .iter()
            .any(|entry| matches!(entry.state, crate::module_system::lifecycle::ModuleState::Failed { .. }))
    }
}
