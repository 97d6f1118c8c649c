use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use libloading::{Library, Symbol};

use crate::module_system::discovery::DiscoveredModule;
use crate::module_system::error::ModuleSystemError;
use crate::module_system::initializer::InitializationContext;
use crate::module_system::isolation::IsolationContext;
use crate::module_system::lifecycle::{LifecycleStage, ModuleState};
use crate::module_system::metadata;
use crate::module_system::traits::{ModuleHealth, ShellModule};
use crate::module_system::validator::ModuleValidator;
use crate::services::ServiceCollection;

/// Constructor signature every entry-point symbol must have.
type ModuleCtor = unsafe extern "C" fn() -> *mut dyn ShellModule;

/// Render a caught panic payload into a message.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run a module hook, converting panics into `ModuleThrew` so module code
/// can never take the host down.
pub(crate) async fn guard_hook<T>(
    module_id: &str,
    stage: LifecycleStage,
    hook: impl Future<Output = Result<T, ModuleSystemError>>,
) -> Result<T, ModuleSystemError> {
    match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(ModuleSystemError::ModuleThrew {
            module_id: module_id.to_string(),
            stage,
            message: format!("panic: {}", panic_message(payload)),
        }),
    }
}

/// A module the loader has brought up to `Initialized`.
///
/// Owned by the manager; destroyed on unload. The isolation context and
/// library handle are absent for statically registered modules.
///
/// Field order is load-bearing: `instance` is declared before `library`
/// and `context`, so the entry object is destroyed while its code is
/// still mapped.
pub struct LoadedModule {
    pub discovered: DiscoveredModule,
    pub instance: Arc<dyn ShellModule>,
    /// Keeps the main binary mapped for as long as the instance exists,
    /// independent of context disposal.
    library: Option<Arc<Library>>,
    context: Option<Arc<IsolationContext>>,
    state: ModuleState,
    history: Vec<ModuleState>,
    /// Snapshot of what the module registered during `on_initialize`
    registrations: Option<ServiceCollection>,
    health_history: Vec<ModuleHealth>,
}

impl LoadedModule {
    fn new(
        discovered: DiscoveredModule,
        context: Option<Arc<IsolationContext>>,
        library: Option<Arc<Library>>,
        instance: Arc<dyn ShellModule>,
        history: Vec<ModuleState>,
    ) -> Self {
        let state = history
            .last()
            .cloned()
            .unwrap_or(ModuleState::Discovered);
        Self {
            discovered,
            instance,
            library,
            context,
            state,
            history,
            registrations: None,
            health_history: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        self.discovered.id()
    }

    pub fn state(&self) -> &ModuleState {
        &self.state
    }

    /// Every state this module has passed through, in order.
    pub fn history(&self) -> &[ModuleState] {
        &self.history
    }

    pub fn context(&self) -> Option<&Arc<IsolationContext>> {
        self.context.as_ref()
    }

    pub fn registrations(&self) -> Option<&ServiceCollection> {
        self.registrations.as_ref()
    }

    pub(crate) fn set_registrations(&mut self, registrations: ServiceCollection) {
        self.registrations = Some(registrations);
    }

    pub fn health_history(&self) -> &[ModuleHealth] {
        &self.health_history
    }

    pub(crate) fn record_health(&mut self, health: ModuleHealth) {
        self.health_history.push(health);
    }

    /// Advance to `next`, enforcing the legal transition diagram.
    pub(crate) fn transition(&mut self, next: ModuleState) -> Result<(), ModuleSystemError> {
        if !self.state.can_transition_to(&next) {
            return Err(ModuleSystemError::IllegalTransition {
                module_id: self.id().to_string(),
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.history.push(next.clone());
        self.state = next;
        Ok(())
    }

    /// Mark the module failed at `stage`. A no-op when already terminal.
    pub(crate) fn fail(&mut self, stage: LifecycleStage, error: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        let failed = ModuleState::failed(stage, error);
        self.history.push(failed.clone());
        self.state = failed;
    }

    /// Drop the isolation context, forcing disposal. The module's own
    /// library handle stays alive, so a live instance never loses its
    /// code.
    pub(crate) fn dispose_context(&mut self) -> Option<Arc<IsolationContext>> {
        if let Some(context) = self.context.take() {
            context.dispose();
            Some(context)
        } else {
            None
        }
    }

    /// Take the context without disposing it, leaving its cached binaries
    /// mapped. Used when unloading degrades to stopped-but-resident.
    pub(crate) fn take_context(&mut self) -> Option<Arc<IsolationContext>> {
        self.context.take()
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("id", &self.id())
            .field("state", &self.state)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// A failed load attempt: the stage that broke and the cause.
#[derive(Debug)]
pub struct LoadFailure {
    pub module_id: String,
    pub stage: LifecycleStage,
    pub error: ModuleSystemError,
}

impl LoadFailure {
    fn new(module_id: &str, stage: LifecycleStage, error: ModuleSystemError) -> Self {
        Self {
            module_id: module_id.to_string(),
            stage,
            error,
        }
    }
}

/// Single-module pipeline: validate, isolate, instantiate, run the
/// module's own validation.
///
/// Failures never propagate module panics and always dispose the isolation
/// context they created.
pub struct ModuleLoader {
    validator: ModuleValidator,
    enable_unloading: bool,
    host_symbols: HashSet<String>,
}

impl ModuleLoader {
    pub fn new(validator: ModuleValidator, enable_unloading: bool) -> Self {
        Self {
            validator,
            enable_unloading,
            host_symbols: HashSet::new(),
        }
    }

    /// Symbols the host publishes across the isolation boundary.
    pub fn with_host_symbols(mut self, host_symbols: HashSet<String>) -> Self {
        self.host_symbols = host_symbols;
        self
    }

    pub fn validator(&self) -> &ModuleValidator {
        &self.validator
    }

    /// Load a module from its binary and drive it to `Initialized`.
    pub async fn load(
        &self,
        discovered: DiscoveredModule,
        init_ctx: &InitializationContext,
    ) -> Result<LoadedModule, LoadFailure> {
        let module_id = discovered.id().to_string();
        let mut history = vec![ModuleState::Discovered];

        self.run_validation(&discovered, &module_id)?;
        history.push(ModuleState::Validated);

        let context = Arc::new(IsolationContext::new(
            &module_id,
            discovered.root_dir.clone(),
            self.enable_unloading,
            self.host_symbols.clone(),
        ));

        let (instance, library) = match self.instantiate(&discovered, &context) {
            Ok(pair) => pair,
            Err(error) => {
                context.dispose();
                return Err(LoadFailure::new(&module_id, LifecycleStage::Load, error));
            }
        };
        history.push(ModuleState::Loaded);

        if instance.name() != discovered.manifest.id {
            log::warn!(
                "module '{}' reports name '{}' different from its manifest id",
                module_id,
                instance.name()
            );
        }

        if let Err(error) = self.run_module_validate(&module_id, &*instance, init_ctx).await {
            context.dispose();
            return Err(LoadFailure::new(&module_id, LifecycleStage::Validation, error));
        }
        history.push(ModuleState::Initialized);

        log::info!(
            "loaded module '{}' v{} in context #{}",
            module_id,
            discovered.manifest.version,
            context.context_id()
        );
        Ok(LoadedModule::new(
            discovered,
            Some(context),
            Some(library),
            instance,
            history,
        ))
    }

    /// Bring an in-process instance through the same pipeline, minus the
    /// binary stages. Used for statically registered modules and tests.
    pub async fn load_static(
        &self,
        discovered: DiscoveredModule,
        instance: Arc<dyn ShellModule>,
        init_ctx: &InitializationContext,
    ) -> Result<LoadedModule, LoadFailure> {
        let module_id = discovered.id().to_string();
        let mut history = vec![ModuleState::Discovered];

        let structural = self.validator.validate_manifest(&discovered.manifest);
        if !structural.is_valid() {
            return Err(LoadFailure::new(
                &module_id,
                LifecycleStage::Validation,
                ModuleSystemError::ManifestInvalid {
                    path: discovered
                        .root_dir
                        .join(crate::kernel::constants::MANIFEST_FILE_NAME),
                    message: structural.errors.join("; "),
                    source: None,
                },
            ));
        }
        let compat = self.validator.validate_compatibility(&discovered.manifest);
        if !compat.is_valid() {
            return Err(LoadFailure::new(
                &module_id,
                LifecycleStage::Validation,
                ModuleSystemError::VersionIncompatible {
                    module_id: module_id.clone(),
                    message: compat.errors.join("; "),
                },
            ));
        }
        history.push(ModuleState::Validated);
        history.push(ModuleState::Loaded);

        self.run_module_validate(&module_id, &*instance, init_ctx)
            .await
            .map_err(|error| LoadFailure::new(&module_id, LifecycleStage::Validation, error))?;
        history.push(ModuleState::Initialized);

        Ok(LoadedModule::new(discovered, None, None, instance, history))
    }

    /// Ordered typed checks: manifest structure, host compatibility,
    /// binary presence, metadata coherence.
    fn run_validation(
        &self,
        discovered: &DiscoveredModule,
        module_id: &str,
    ) -> Result<(), LoadFailure> {
        let manifest = &discovered.manifest;

        let structural = self.validator.validate_manifest(manifest);
        if !structural.is_valid() {
            return Err(LoadFailure::new(
                module_id,
                LifecycleStage::Validation,
                ModuleSystemError::ManifestInvalid {
                    path: discovered.root_dir.join(crate::kernel::constants::MANIFEST_FILE_NAME),
                    message: structural.errors.join("; "),
                    source: None,
                },
            ));
        }

        let compat = self.validator.validate_compatibility(manifest);
        if !compat.is_valid() {
            return Err(LoadFailure::new(
                module_id,
                LifecycleStage::Validation,
                ModuleSystemError::VersionIncompatible {
                    module_id: module_id.to_string(),
                    message: compat.errors.join("; "),
                },
            ));
        }

        if !discovered.main_binary_path.is_file() {
            return Err(LoadFailure::new(
                module_id,
                LifecycleStage::Validation,
                ModuleSystemError::BinaryMissing {
                    module_id: module_id.to_string(),
                    path: discovered.main_binary_path.clone(),
                },
            ));
        }

        let meta = metadata::read_binary_metadata(&discovered.main_binary_path)
            .map_err(|error| LoadFailure::new(module_id, LifecycleStage::Validation, error))?;
        let coherence = self.validator.corroborate(manifest, &meta);
        for warning in &coherence.warnings {
            log::warn!("{}", warning);
        }
        if !coherence.is_valid() {
            return Err(LoadFailure::new(
                module_id,
                LifecycleStage::Validation,
                ModuleSystemError::BinaryIncoherent {
                    module_id: module_id.to_string(),
                    path: discovered.main_binary_path.clone(),
                    message: coherence.errors.join("; "),
                },
            ));
        }
        Ok(())
    }

    /// Load the main binary inside the context and call the entry-point
    /// constructor. Panics in the constructor are caught. The returned
    /// library handle must be kept alive alongside the instance.
    fn instantiate(
        &self,
        discovered: &DiscoveredModule,
        context: &IsolationContext,
    ) -> Result<(Arc<dyn ShellModule>, Arc<Library>), ModuleSystemError> {
        let library = context.load_binary(&discovered.manifest.main_binary)?;
        let entry_point = &discovered.manifest.entry_point;

        let ctor: Symbol<'_, ModuleCtor> =
            unsafe { context.resolve_entry(&library, entry_point) }?;
        let ctor: ModuleCtor = *ctor;

        let raw = match panic::catch_unwind(|| unsafe { ctor() }) {
            Ok(ptr) => ptr,
            Err(payload) => {
                return Err(ModuleSystemError::ModuleThrew {
                    module_id: discovered.id().to_string(),
                    stage: LifecycleStage::Load,
                    message: format!("entry point panicked: {}", panic_message(payload)),
                });
            }
        };
        if raw.is_null() {
            return Err(ModuleSystemError::LoadingError {
                module_id: discovered.id().to_string(),
                path: Some(discovered.main_binary_path.clone()),
                message: format!("entry point '{}' returned null", entry_point),
            });
        }

        let boxed: Box<dyn ShellModule> = unsafe { Box::from_raw(raw) };
        Ok((Arc::from(boxed), library))
    }

    async fn run_module_validate(
        &self,
        module_id: &str,
        instance: &dyn ShellModule,
        init_ctx: &InitializationContext,
    ) -> Result<(), ModuleSystemError> {
        init_ctx.ensure_not_cancelled(module_id, LifecycleStage::Validation)?;
        let token = init_ctx.cancellation_token();
        guard_hook(
            module_id,
            LifecycleStage::Validation,
            instance.validate(init_ctx, token),
        )
        .await
    }
}
