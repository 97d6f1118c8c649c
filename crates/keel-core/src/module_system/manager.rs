use std::collections::{BinaryHeap, HashMap, HashSet};
use std::cmp::Reverse;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use semver::Version;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigSnapshot, HostConfig};
use crate::kernel::app::AppBuilder;
use crate::module_system::dependency::DependencyError;
use crate::module_system::discovery::{DiscoveredModule, ModuleDiscovery};
use crate::module_system::error::ModuleSystemError;
use crate::module_system::initializer::InitializationContext;
use crate::module_system::isolation::IsolationContext;
use crate::module_system::lifecycle::{FailurePolicy, LifecycleStage, ModuleState};
use crate::module_system::loader::{guard_hook, LoadedModule, ModuleLoader};
use crate::module_system::traits::{HealthState, ModuleHealth, ShellModule};
use crate::module_system::validator::{HostContext, ModuleValidator};
use crate::services::{
    ServiceCollection, ServiceGraphValidator, ServiceProvider, ServiceValidationReport,
};

/// Host-side knobs the manager runs with, derived from [`HostConfig`].
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub shell_version: Version,
    pub platform: String,
    pub environment: String,
    pub failure_policy: FailurePolicy,
    pub stop_grace: Duration,
    pub enable_unloading: bool,
}

impl ManagerSettings {
    pub fn from_config(config: &HostConfig) -> Result<Self, ModuleSystemError> {
        let shell_version = match &config.shell_version {
            Some(version) => version.clone(),
            None => crate::module_system::version::parse_version(
                crate::kernel::constants::SHELL_VERSION,
            )?,
        };
        Ok(Self {
            shell_version,
            platform: std::env::consts::OS.to_string(),
            environment: config.environment.clone(),
            failure_policy: config.failure_policy,
            stop_grace: config.stop_grace,
            enable_unloading: config.enable_unloading,
        })
    }
}

/// One failed module in a report.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleFailure {
    pub module_id: String,
    pub stage: LifecycleStage,
    pub error: String,
}

/// Outcome of a `load_all` sweep.
#[derive(Debug, Default, Serialize)]
pub struct LoadReport {
    pub discovered: usize,
    pub loaded: Vec<String>,
    pub failed: Vec<ModuleFailure>,
    pub warnings: Vec<String>,
}

/// Final per-module states for operators.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleReportEntry {
    pub module_id: String,
    pub version: String,
    #[serde(flatten)]
    pub state: ModuleState,
}

#[derive(Debug, Default, Serialize)]
pub struct LifecycleReport {
    pub entries: Vec<LifecycleReportEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleHealthEntry {
    pub module_id: String,
    #[serde(flatten)]
    pub health: ModuleHealth,
}

/// Aggregate health over every started module.
#[derive(Debug, Default, Serialize)]
pub struct HealthReport {
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub modules: Vec<ModuleHealthEntry>,
}

#[derive(Default)]
struct ModuleTable {
    modules: HashMap<String, LoadedModule>,
    /// Topological order from the last `load_all`
    order: Vec<String>,
}

/// Fleet orchestrator over every loaded module.
///
/// Lifecycle operations (load, containers, configure, start, stop, unload)
/// are serialized by one internal lock, so at most one transition is in
/// progress at any time. Config-change delivery and health polling run
/// without that lock and never call module code while holding it.
pub struct ModuleManager {
    settings: ManagerSettings,
    loader: ModuleLoader,
    shared_services: Arc<ServiceCollection>,
    lifecycle_lock: Mutex<()>,
    table: Mutex<ModuleTable>,
    /// Candidates that never became loaded modules, for reporting
    failures: std::sync::Mutex<Vec<ModuleFailure>>,
    /// Final states of modules that were unloaded or parked
    retired: std::sync::Mutex<Vec<LifecycleReportEntry>>,
    provider: std::sync::Mutex<Option<Arc<ServiceProvider>>>,
    /// Exact order the last start sweep used; stop replays it reversed
    start_order: std::sync::Mutex<Vec<String>>,
    /// `id@version` pairs whose code stayed resident after a failed unload
    resident: std::sync::Mutex<HashSet<String>>,
    parked_contexts: std::sync::Mutex<Vec<Arc<IsolationContext>>>,
}

impl ModuleManager {
    pub fn new(settings: ManagerSettings, shared_services: ServiceCollection) -> Self {
        let host = HostContext {
            shell_version: settings.shell_version.clone(),
            platform: settings.platform.clone(),
        };
        let host_symbols: HashSet<String> = crate::kernel::constants::HOST_BRIDGE_SYMBOLS
            .iter()
            .map(|s| s.to_string())
            .collect();
        let loader = ModuleLoader::new(ModuleValidator::new(host), settings.enable_unloading)
            .with_host_symbols(host_symbols);
        Self {
            settings,
            loader,
            shared_services: Arc::new(shared_services),
            lifecycle_lock: Mutex::new(()),
            table: Mutex::new(ModuleTable::default()),
            failures: std::sync::Mutex::new(Vec::new()),
            retired: std::sync::Mutex::new(Vec::new()),
            provider: std::sync::Mutex::new(None),
            start_order: std::sync::Mutex::new(Vec::new()),
            resident: std::sync::Mutex::new(HashSet::new()),
            parked_contexts: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// The built provider, once `initialize_containers` has run.
    pub fn provider(&self) -> Option<Arc<ServiceProvider>> {
        self.provider.lock().expect("provider lock poisoned").clone()
    }

    fn init_context(&self, token: &CancellationToken) -> InitializationContext {
        InitializationContext::new(
            self.settings.shell_version.clone(),
            self.settings.environment.clone(),
            self.shared_services.clone(),
            token.clone(),
        )
    }

    fn record_failure(&self, failure: ModuleFailure) {
        self.failures
            .lock()
            .expect("failure list poisoned")
            .push(failure);
    }

    /// Discover, graph-validate, and load every module under `roots`.
    ///
    /// A graph-level rejection aborts before any isolation context exists.
    /// Individual load failures accumulate in the report; dependents of a
    /// failed candidate are skipped and marked failed on its account.
    pub async fn load_all(
        &self,
        roots: &[PathBuf],
        token: CancellationToken,
    ) -> Result<LoadReport, ModuleSystemError> {
        let _guard = self.lifecycle_lock.lock().await;

        let discovery = ModuleDiscovery::new(roots.to_vec());
        let report = discovery.discover().await?;
        let mut warnings = report.warnings;
        let candidates = self.filter_resident(report.modules, &mut warnings);

        self.load_candidates(candidates, HashMap::new(), warnings, token)
            .await
    }

    /// Same pipeline as [`load_all`](ModuleManager::load_all) for
    /// in-process module instances (static registration).
    pub async fn load_all_static(
        &self,
        entries: Vec<(DiscoveredModule, Arc<dyn ShellModule>)>,
        token: CancellationToken,
    ) -> Result<LoadReport, ModuleSystemError> {
        let _guard = self.lifecycle_lock.lock().await;

        let mut warnings = Vec::new();
        let mut candidates = Vec::with_capacity(entries.len());
        let mut instances: HashMap<String, Arc<dyn ShellModule>> = HashMap::new();
        for (discovered, instance) in entries {
            instances.insert(discovered.id().to_string(), instance);
            candidates.push(discovered);
        }
        let candidates = self.filter_resident(candidates, &mut warnings);

        self.load_candidates(candidates, instances, warnings, token)
            .await
    }

    fn filter_resident(
        &self,
        candidates: Vec<DiscoveredModule>,
        warnings: &mut Vec<String>,
    ) -> Vec<DiscoveredModule> {
        let resident = self.resident.lock().expect("resident set poisoned");
        candidates
            .into_iter()
            .filter(|c| {
                let key = format!("{}@{}", c.manifest.id, c.manifest.version);
                if resident.contains(&key) {
                    warnings.push(format!(
                        "module {} is still resident from a previous unload; skipped until restart",
                        key
                    ));
                    false
                } else {
                    true
                }
            })
            .collect()
    }

    async fn load_candidates(
        &self,
        candidates: Vec<DiscoveredModule>,
        mut instances: HashMap<String, Arc<dyn ShellModule>>,
        warnings: Vec<String>,
        token: CancellationToken,
    ) -> Result<LoadReport, ModuleSystemError> {
        let mut load_report = LoadReport {
            discovered: candidates.len(),
            warnings,
            ..LoadReport::default()
        };

        let graph = self.loader.validator().validate_graph(&candidates);
        load_report.warnings.extend(graph.warnings.clone());
        if !graph.is_valid() {
            return Err(ModuleSystemError::GraphInvalid {
                errors: graph.errors,
            });
        }

        let order = topological_order(&candidates).map_err(|e| {
            ModuleSystemError::GraphInvalid {
                errors: vec![e.to_string()],
            }
        })?;

        let mut by_id: HashMap<String, DiscoveredModule> = candidates
            .into_iter()
            .map(|c| (c.id().to_string(), c))
            .collect();

        let init_ctx = self.init_context(&token);
        let mut table = self.table.lock().await;
        let mut failed_ids: HashSet<String> = HashSet::new();

        for id in order {
            let Some(candidate) = by_id.remove(&id) else {
                continue;
            };

            if let Some(dep) = candidate
                .manifest
                .dependencies
                .iter()
                .find(|d| d.required && failed_ids.contains(&d.id))
            {
                let failure = ModuleFailure {
                    module_id: id.clone(),
                    stage: LifecycleStage::Dependency,
                    error: format!("required dependency '{}' failed to load", dep.id),
                };
                log::warn!("skipping module '{}': {}", id, failure.error);
                self.record_failure(failure.clone());
                load_report.failed.push(failure);
                failed_ids.insert(id);
                continue;
            }

            let outcome = match instances.remove(&id) {
                Some(instance) => self.loader.load_static(candidate, instance, &init_ctx).await,
                None => self.loader.load(candidate, &init_ctx).await,
            };

            match outcome {
                Ok(loaded) => {
                    table.order.push(id.clone());
                    table.modules.insert(id.clone(), loaded);
                    load_report.loaded.push(id);
                }
                Err(failure) => {
                    let failure = ModuleFailure {
                        module_id: failure.module_id,
                        stage: failure.stage,
                        error: failure.error.to_string(),
                    };
                    log::error!(
                        "module '{}' failed during {}: {}",
                        failure.module_id,
                        failure.stage,
                        failure.error
                    );
                    self.record_failure(failure.clone());
                    failed_ids.insert(failure.module_id.clone());
                    load_report.failed.push(failure);
                }
            }
        }

        Ok(load_report)
    }

    /// Collect module service registrations, merge them into the host
    /// collection, gate the merged set through the service-graph
    /// validator, and build the frozen provider.
    ///
    /// An invalid merged graph fails the whole operation: no provider is
    /// built and every live module is failed at the configuration stage.
    pub async fn initialize_containers(
        &self,
        host: ServiceCollection,
        token: CancellationToken,
    ) -> Result<(Arc<ServiceProvider>, ServiceValidationReport), ModuleSystemError> {
        let _guard = self.lifecycle_lock.lock().await;
        let mut table = self.table.lock().await;

        let mut merged = host;
        let mut overrides: HashSet<String> = HashSet::new();

        for id in table.order.clone() {
            let Some(module) = table.modules.get_mut(&id) else {
                continue;
            };
            if module.state() != &ModuleState::Initialized {
                continue;
            }
            if module.discovered.manifest.allows_service_override() {
                overrides.insert(id.clone());
            }

            let mut module_services = ServiceCollection::for_module(&id);
            let hook = module.instance.on_initialize(&mut module_services, token.clone());
            let outcome = guard_hook(&id, LifecycleStage::Initialization, hook).await;
            match outcome {
                Ok(()) => {
                    module.set_registrations(module_services.clone());
                    merged.merge(module_services);
                }
                Err(e) => {
                    log::error!("module '{}' failed to register services: {}", id, e);
                    module.fail(LifecycleStage::Initialization, e.to_string());
                }
            }
        }

        let report = ServiceGraphValidator::new()
            .with_override_modules(overrides)
            .validate(&merged);
        for warning in report.warnings() {
            log::warn!("service graph: {}", warning);
        }

        if !report.is_valid() {
            for id in table.order.clone() {
                if let Some(module) = table.modules.get_mut(&id) {
                    module.fail(
                        LifecycleStage::Configuration,
                        "merged service registrations failed validation",
                    );
                }
            }
            return Err(ModuleSystemError::ServiceGraphInvalid {
                errors: report.errors().to_vec(),
            });
        }

        let provider = ServiceProvider::build(merged, &report).map_err(|e| {
            ModuleSystemError::ServiceGraphInvalid {
                errors: vec![e.to_string()],
            }
        })?;
        *self.provider.lock().expect("provider lock poisoned") = Some(provider.clone());
        Ok((provider, report))
    }

    /// Let each module append to the application pipeline, in dependency
    /// order.
    pub async fn configure(
        &self,
        app: &mut AppBuilder,
        token: CancellationToken,
    ) -> Result<(), ModuleSystemError> {
        let _guard = self.lifecycle_lock.lock().await;
        let mut table = self.table.lock().await;

        for id in table.order.clone() {
            if let Some(dep_failure) = self.dependency_failure(&table, &id) {
                if let Some(module) = table.modules.get_mut(&id) {
                    if module.state() == &ModuleState::Initialized {
                        module.fail(LifecycleStage::Dependency, dep_failure);
                    }
                }
                continue;
            }
            let Some(module) = table.modules.get_mut(&id) else {
                continue;
            };
            if module.state() != &ModuleState::Initialized {
                continue;
            }

            let hook = module.instance.on_configure(app, token.clone());
            let outcome = guard_hook(&id, LifecycleStage::Configuration, hook).await;
            match outcome {
                Ok(()) => {
                    module.transition(ModuleState::Configured)?;
                }
                Err(e) => {
                    log::error!("module '{}' failed to configure: {}", id, e);
                    module.fail(LifecycleStage::Configuration, e.to_string());
                    if self.settings.failure_policy == FailurePolicy::FailFast {
                        return Err(e);
                    }
                }
            }
        }
        Ok(())
    }

    /// Start every configured module in dependency order.
    ///
    /// Under `fail-fast`, the first failure stops already-started modules
    /// in reverse order and surfaces the error. Under `continue`, the
    /// failing module is marked failed, its dependents are skipped, and
    /// the sweep goes on.
    pub async fn start(&self, token: CancellationToken) -> Result<(), ModuleSystemError> {
        let _guard = self.lifecycle_lock.lock().await;
        let mut table = self.table.lock().await;
        let mut started: Vec<String> = Vec::new();

        for id in table.order.clone() {
            if let Some(dep_failure) = self.dependency_failure(&table, &id) {
                if let Some(module) = table.modules.get_mut(&id) {
                    if !module.state().is_terminal() {
                        log::warn!("skipping module '{}': {}", id, dep_failure);
                        module.fail(LifecycleStage::Dependency, dep_failure);
                    }
                }
                continue;
            }
            let Some(module) = table.modules.get_mut(&id) else {
                continue;
            };
            if module.state() != &ModuleState::Configured {
                continue;
            }

            let hook = module.instance.on_start(token.clone());
            let outcome = guard_hook(&id, LifecycleStage::Start, hook).await;
            match outcome {
                Ok(()) => {
                    module.transition(ModuleState::Started)?;
                    started.push(id.clone());
                    log::info!("module '{}' started", id);
                }
                Err(e) => {
                    log::error!("module '{}' failed to start: {}", id, e);
                    module.fail(LifecycleStage::Start, e.to_string());
                    if self.settings.failure_policy == FailurePolicy::FailFast {
                        for sid in started.iter().rev() {
                            self.stop_module(&mut table, sid, &token).await;
                        }
                        self.start_order
                            .lock()
                            .expect("start order poisoned")
                            .clear();
                        return Err(e);
                    }
                }
            }
        }

        *self.start_order.lock().expect("start order poisoned") = started;
        Ok(())
    }

    /// Stop started modules in the exact reverse of the start order.
    /// Per-module errors are logged; the sweep never aborts.
    pub async fn stop(&self, token: CancellationToken) {
        let _guard = self.lifecycle_lock.lock().await;
        let mut table = self.table.lock().await;

        let order: Vec<String> = {
            let mut start_order = self.start_order.lock().expect("start order poisoned");
            let order = start_order.clone();
            start_order.clear();
            order
        };

        for id in order.iter().rev() {
            self.stop_module(&mut table, id, &token).await;
        }
    }

    async fn stop_module(&self, table: &mut ModuleTable, id: &str, token: &CancellationToken) {
        let Some(module) = table.modules.get_mut(id) else {
            return;
        };
        if module.state() != &ModuleState::Started {
            return;
        }

        let hook = module.instance.on_stop(token.clone());
        let guarded = guard_hook(id, LifecycleStage::Stop, hook);
        let outcome = timeout(self.settings.stop_grace, guarded).await;
        match outcome {
            Ok(Ok(())) => {
                if let Err(e) = module.transition(ModuleState::Stopped) {
                    log::error!("module '{}': {}", id, e);
                } else {
                    log::info!("module '{}' stopped", id);
                }
            }
            Ok(Err(e)) => {
                log::error!("module '{}' failed to stop: {}", id, e);
                module.fail(LifecycleStage::Stop, e.to_string());
            }
            Err(_) => {
                let e = ModuleSystemError::StoppingTimeout {
                    module_id: id.to_string(),
                    grace_secs: self.settings.stop_grace.as_secs(),
                };
                log::error!("{}", e);
                module.fail(LifecycleStage::StopTimeout, e.to_string());
                module.dispose_context();
            }
        }
    }

    /// Unload a stopped module: run its unload hook, dispose its context,
    /// and remove its service contributions from the merged container.
    ///
    /// On a platform (or configuration) that cannot reclaim code, the
    /// module degrades to "stopped, resident": its services and instance
    /// go away, its context is parked, and its `id@version` is refused
    /// for re-load until process restart.
    pub async fn unload(
        &self,
        id: &str,
        token: CancellationToken,
    ) -> Result<(), ModuleSystemError> {
        let _guard = self.lifecycle_lock.lock().await;
        let mut table = self.table.lock().await;

        let module = table
            .modules
            .get_mut(id)
            .ok_or_else(|| ModuleSystemError::UnknownModule(id.to_string()))?;
        if module.state() != &ModuleState::Stopped {
            return Err(ModuleSystemError::IllegalTransition {
                module_id: id.to_string(),
                from: module.state().to_string(),
                to: ModuleState::Unloaded.to_string(),
            });
        }

        let hook = module.instance.on_unload(token.clone());
        let hook_result = guard_hook(id, LifecycleStage::Unload, hook).await;

        if let Some(provider) = self.provider() {
            let removed = provider.remove_module(id);
            log::debug!("removed {} service registrations of module '{}'", removed, id);
        }

        let version = module.discovered.manifest.version.clone();
        let collectible = module
            .context()
            .map(|c| c.is_collectible())
            // Statically registered modules have no context to reclaim.
            .unwrap_or(true);

        if let Err(e) = hook_result {
            log::error!("module '{}' unload hook failed: {}", id, e);
            module.fail(LifecycleStage::Unload, e.to_string());
            let entry = Self::report_entry(module);
            module.dispose_context();
            table.modules.remove(id);
            table.order.retain(|m| m != id);
            self.retired.lock().expect("retired list poisoned").push(entry);
            return Err(e);
        }

        if collectible {
            module.transition(ModuleState::Unloaded)?;
            let entry = Self::report_entry(module);
            module.dispose_context();
            table.modules.remove(id);
            table.order.retain(|m| m != id);
            self.retired.lock().expect("retired list poisoned").push(entry);
            log::info!("module '{}' unloaded", id);
            Ok(())
        } else {
            let warning = ModuleSystemError::UnloadUnsupported {
                module_id: id.to_string(),
            };
            log::warn!("{}", warning);
            let entry = Self::report_entry(module);
            // Parked undisposed: the context keeps the module's code
            // mapped until process restart.
            if let Some(context) = module.take_context() {
                self.parked_contexts
                    .lock()
                    .expect("parked contexts poisoned")
                    .push(context);
            }
            table.modules.remove(id);
            table.order.retain(|m| m != id);
            self.resident
                .lock()
                .expect("resident set poisoned")
                .insert(format!("{}@{}", id, version));
            self.retired.lock().expect("retired list poisoned").push(entry);
            Ok(())
        }
    }

    /// Poll every started module's health and aggregate the verdicts.
    pub async fn report_health(&self, token: CancellationToken) -> HealthReport {
        let targets: Vec<(String, Arc<dyn ShellModule>)> = {
            let table = self.table.lock().await;
            table
                .order
                .iter()
                .filter_map(|id| {
                    table.modules.get(id).and_then(|m| {
                        (m.state() == &ModuleState::Started)
                            .then(|| (id.clone(), m.instance.clone()))
                    })
                })
                .collect()
        };

        let mut report = HealthReport::default();
        for (id, instance) in targets {
            let checked = futures::FutureExt::catch_unwind(std::panic::AssertUnwindSafe(
                instance.check_health(token.clone()),
            ))
            .await
            .unwrap_or_else(|payload| {
                ModuleHealth::unhealthy(format!(
                    "health check panicked: {}",
                    crate::module_system::loader::panic_message(payload)
                ))
            });

            match checked.state {
                HealthState::Healthy => report.healthy += 1,
                HealthState::Degraded => report.degraded += 1,
                HealthState::Unhealthy => report.unhealthy += 1,
            }
            report.modules.push(ModuleHealthEntry {
                module_id: id,
                health: checked,
            });
        }

        let mut table = self.table.lock().await;
        for entry in &report.modules {
            if let Some(module) = table.modules.get_mut(&entry.module_id) {
                module.record_health(entry.health.clone());
            }
        }
        report
    }

    /// Forward a configuration snapshot to every loaded module. Deliveries
    /// run concurrently across modules; a failure in one module never
    /// affects another, and the lifecycle lock is not held while module
    /// code runs.
    pub async fn on_config_change(&self, snapshot: Arc<ConfigSnapshot>, token: CancellationToken) {
        let targets: Vec<(String, Arc<dyn ShellModule>)> = {
            let table = self.table.lock().await;
            table
                .order
                .iter()
                .filter_map(|id| {
                    table.modules.get(id).and_then(|m| {
                        (!m.state().is_terminal()).then(|| (id.clone(), m.instance.clone()))
                    })
                })
                .collect()
        };

        let deliveries = targets.into_iter().map(|(id, instance)| {
            let snapshot = snapshot.clone();
            let token = token.clone();
            async move {
                let hook = instance.on_configuration_changed(&snapshot, token);
                if let Err(e) = guard_hook(&id, LifecycleStage::Configuration, hook).await {
                    log::error!("module '{}' rejected configuration change: {}", id, e);
                }
            }
        });
        futures::future::join_all(deliveries).await;
    }

    /// Per-module final state, stage of failure, and error text.
    pub async fn lifecycle_report(&self) -> LifecycleReport {
        let table = self.table.lock().await;
        let mut entries: Vec<LifecycleReportEntry> = table
            .order
            .iter()
            .filter_map(|id| table.modules.get(id).map(Self::report_entry))
            .collect();
        for failure in self.failures.lock().expect("failure list poisoned").iter() {
            entries.push(LifecycleReportEntry {
                module_id: failure.module_id.clone(),
                version: String::new(),
                state: ModuleState::failed(failure.stage, failure.error.clone()),
            });
        }
        entries.extend(
            self.retired
                .lock()
                .expect("retired list poisoned")
                .iter()
                .cloned(),
        );
        LifecycleReport { entries }
    }

    /// State history of one module, for transition assertions.
    pub async fn module_history(&self, id: &str) -> Option<Vec<ModuleState>> {
        let table = self.table.lock().await;
        table.modules.get(id).map(|m| m.history().to_vec())
    }

    pub async fn module_state(&self, id: &str) -> Option<ModuleState> {
        let table = self.table.lock().await;
        table.modules.get(id).map(|m| m.state().clone())
    }

    fn report_entry(module: &LoadedModule) -> LifecycleReportEntry {
        LifecycleReportEntry {
            module_id: module.id().to_string(),
            version: module.discovered.manifest.version.to_string(),
            state: module.state().clone(),
        }
    }

    /// A message when any required dependency of `id` is not in a state
    /// that allows `id` to proceed.
    fn dependency_failure(&self, table: &ModuleTable, id: &str) -> Option<String> {
        let module = table.modules.get(id)?;
        for dep in &module.discovered.manifest.dependencies {
            if !dep.required {
                continue;
            }
            if let Some(target) = table.modules.get(&dep.id) {
                if target.state().is_failed() {
                    return Some(format!("required dependency '{}' failed", dep.id));
                }
            }
        }
        None
    }
}

impl std::fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleManager")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Kahn's algorithm over required dependencies, popping lexicographically
/// smallest ids first so independent modules keep a stable order.
pub fn topological_order(candidates: &[DiscoveredModule]) -> Result<Vec<String>, DependencyError> {
    let ids: HashSet<&str> = candidates.iter().map(|c| c.id()).collect();
    let mut in_degree: HashMap<&str, usize> = ids.iter().map(|id| (*id, 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for candidate in candidates {
        for dep in &candidate.manifest.dependencies {
            if dep.required && ids.contains(dep.id.as_str()) {
                *in_degree.entry(candidate.id()).or_insert(0) += 1;
                dependents
                    .entry(dep.id.as_str())
                    .or_default()
                    .push(candidate.id());
            }
        }
    }

    let mut heap: BinaryHeap<Reverse<&str>> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| Reverse(*id))
        .collect();

    let mut order = Vec::with_capacity(candidates.len());
    while let Some(Reverse(id)) = heap.pop() {
        order.push(id.to_string());
        if let Some(deps) = dependents.get(id) {
            for dependent in deps {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        heap.push(Reverse(*dependent));
                    }
                }
            }
        }
    }

    if order.len() != ids.len() {
        let stuck: Vec<String> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(id, _)| id.to_string())
            .collect();
        return Err(DependencyError::CyclicDependency(stuck));
    }
    Ok(order)
}
