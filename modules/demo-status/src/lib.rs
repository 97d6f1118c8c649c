//! Example Keel module: registers a status service and a status route.
//!
//! Doubles as the reference for the export conventions module binaries
//! follow: the `module_entry_*` constructor and the `module_version_*`
//! marker the host's metadata reader corroborates without executing
//! anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use keel_core::config::ConfigSnapshot;
use keel_core::kernel::AppBuilder;
use keel_core::module_system::{
    InitializationContext, ModuleHealth, ModuleSystemError, ShellModule,
};
use keel_core::services::{ServiceCollection, ServiceLifetime};

/// Minimal service other modules can resolve to ask how the demo is doing.
pub trait StatusSource: Send + Sync {
    fn status_line(&self) -> String;
}

struct DemoStatusSource;

impl StatusSource for DemoStatusSource {
    fn status_line(&self) -> String {
        "demo-status: ok".to_string()
    }
}

pub struct DemoStatusModule {
    running: AtomicBool,
}

impl DemoStatusModule {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }
}

impl Default for DemoStatusModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShellModule for DemoStatusModule {
    fn name(&self) -> &str {
        "demo-status"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "Reports host status over a demo route"
    }

    async fn validate(
        &self,
        context: &InitializationContext,
        _token: CancellationToken,
    ) -> Result<(), ModuleSystemError> {
        log::debug!(
            "demo-status validating against shell {} ({})",
            context.shell_version(),
            context.environment()
        );
        Ok(())
    }

    async fn on_initialize(
        &self,
        services: &mut ServiceCollection,
        _token: CancellationToken,
    ) -> Result<(), ModuleSystemError> {
        services.add::<dyn StatusSource, _>(ServiceLifetime::Singleton, Vec::new(), |_ctx| {
            Ok(Arc::new(DemoStatusSource) as Arc<dyn StatusSource>)
        });
        Ok(())
    }

    async fn on_configure(
        &self,
        app: &mut AppBuilder,
        _token: CancellationToken,
    ) -> Result<(), ModuleSystemError> {
        app.map_route(self.name(), "/status/demo", "Demo status line");
        Ok(())
    }

    async fn on_start(&self, _token: CancellationToken) -> Result<(), ModuleSystemError> {
        self.running.store(true, Ordering::Release);
        log::info!("demo-status running");
        Ok(())
    }

    async fn on_stop(&self, _token: CancellationToken) -> Result<(), ModuleSystemError> {
        self.running.store(false, Ordering::Release);
        Ok(())
    }

    async fn on_configuration_changed(
        &self,
        snapshot: &ConfigSnapshot,
        _token: CancellationToken,
    ) -> Result<(), ModuleSystemError> {
        log::debug!("demo-status saw {} config keys", snapshot.len());
        Ok(())
    }

    async fn check_health(&self, _token: CancellationToken) -> ModuleHealth {
        if self.running.load(Ordering::Acquire) {
            ModuleHealth::healthy()
        } else {
            ModuleHealth::degraded("not started")
        }
    }
}

/// Entry-point constructor named by the manifest's `entryPoint`.
#[no_mangle]
#[allow(improper_ctypes_definitions)]
pub extern "C" fn module_entry_demo_status() -> *mut dyn ShellModule {
    Box::into_raw(Box::new(DemoStatusModule::new()))
}

/// Version marker the host's metadata reader decodes from the export
/// table; must track `Cargo.toml`.
#[no_mangle]
#[allow(non_upper_case_globals)]
pub static module_version_0_1_0: u8 = 0;
