//! Per-module loading and linking contexts.
//!
//! Each module loads its binaries through its own [`IsolationContext`], so
//! one module's libraries never leak into another's symbol space. The
//! context is the teardown seam: disposing it drops every cached library
//! handle, which lets the platform reclaim the code where it supports
//! unloading.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use libloading::{Library, Symbol};

use crate::module_system::error::ModuleSystemError;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Whether this build target is expected to reclaim unloaded code.
pub fn platform_supports_unload() -> bool {
    cfg!(any(target_os = "linux", target_os = "windows", target_os = "macos"))
}

/// A named linking scope for one module.
///
/// `context_id` is unique within the process; re-loading the same module
/// file always produces a context with a fresh id. The allow-list is the
/// bridge to host-published symbols: anything not on it is not considered
/// shared host surface.
pub struct IsolationContext {
    context_id: u64,
    module_id: String,
    root_dir: PathBuf,
    collectible: bool,
    host_symbols: HashSet<String>,
    libraries: Mutex<HashMap<PathBuf, Arc<Library>>>,
    disposed: AtomicBool,
}

impl IsolationContext {
    pub fn new(
        module_id: &str,
        root_dir: PathBuf,
        collectible: bool,
        host_symbols: HashSet<String>,
    ) -> Self {
        Self {
            context_id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            module_id: module_id.to_string(),
            root_dir,
            collectible: collectible && platform_supports_unload(),
            host_symbols,
            libraries: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn context_id(&self) -> u64 {
        self.context_id
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Whether disposing this context can actually reclaim the code.
    pub fn is_collectible(&self) -> bool {
        self.collectible
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Whether `symbol` is part of the host-published shared surface.
    pub fn publishes(&self, symbol: &str) -> bool {
        self.host_symbols.contains(symbol)
    }

    /// Whether the module may claim `symbol` for itself. Host-published
    /// symbols reach modules through the bridge only; a module entry
    /// point must not shadow one.
    pub(crate) fn ensure_module_local(&self, symbol: &str) -> Result<(), ModuleSystemError> {
        if self.publishes(symbol) {
            return Err(ModuleSystemError::LoadingError {
                module_id: self.module_id.clone(),
                path: None,
                message: format!(
                    "entry point '{}' collides with a host-published symbol",
                    symbol
                ),
            });
        }
        Ok(())
    }

    /// Resolve an entry-point symbol in a binary this context loaded.
    ///
    /// Symbols on the host allow-list are refused here; they belong to
    /// the bridge, not to the module.
    ///
    /// # Safety
    /// `T` must match the actual signature of the exported symbol.
    pub unsafe fn resolve_entry<'lib, T>(
        &self,
        library: &'lib Library,
        symbol: &str,
    ) -> Result<Symbol<'lib, T>, ModuleSystemError> {
        if self.is_disposed() {
            return Err(ModuleSystemError::LoadingError {
                module_id: self.module_id.clone(),
                path: None,
                message: "isolation context is disposed".to_string(),
            });
        }
        self.ensure_module_local(symbol)?;

        let name = format!("{}\0", symbol);
        unsafe { library.get(name.as_bytes()) }.map_err(|e| {
            ModuleSystemError::LoadingError {
                module_id: self.module_id.clone(),
                path: None,
                message: format!("missing entry point symbol '{}': {}", symbol, e),
            }
        })
    }

    /// Load a binary by path relative to the context root.
    ///
    /// Paths that are absolute or traverse upwards are rejected so a
    /// manifest cannot reach outside its module directory. Handles are
    /// cached per path for the lifetime of the context.
    pub fn load_binary(&self, relative: &str) -> Result<Arc<Library>, ModuleSystemError> {
        if self.is_disposed() {
            return Err(ModuleSystemError::LoadingError {
                module_id: self.module_id.clone(),
                path: None,
                message: "isolation context is disposed".to_string(),
            });
        }

        let rel = Path::new(relative);
        if rel.is_absolute() || rel.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(ModuleSystemError::LoadingError {
                module_id: self.module_id.clone(),
                path: Some(rel.to_path_buf()),
                message: format!(
                    "binary path '{}' must be relative and must not traverse upwards",
                    relative
                ),
            });
        }

        let full_path = self.root_dir.join(rel);
        let mut libraries = self.libraries.lock().expect("library cache poisoned");
        if let Some(existing) = libraries.get(&full_path) {
            return Ok(existing.clone());
        }

        let library = unsafe { Library::new(&full_path) }.map_err(|e| {
            ModuleSystemError::LoadingError {
                module_id: self.module_id.clone(),
                path: Some(full_path.clone()),
                message: format!("libloading error: {}", e),
            }
        })?;
        let library = Arc::new(library);
        libraries.insert(full_path, library.clone());
        Ok(library)
    }

    /// Detach the allow-list bridge and drop cached library handles.
    ///
    /// Idempotent. Whether the code is actually reclaimed afterwards
    /// depends on `is_collectible` and on no other `Arc<Library>` clones
    /// being alive.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Runs from Drop as well, where a poisoned lock must not panic.
        if let Ok(mut libraries) = self.libraries.lock() {
            log::debug!(
                "disposing isolation context #{} for module '{}' ({} cached binaries)",
                self.context_id,
                self.module_id,
                libraries.len()
            );
            libraries.clear();
        }
    }
}

impl Drop for IsolationContext {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for IsolationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolationContext")
            .field("context_id", &self.context_id)
            .field("module_id", &self.module_id)
            .field("root_dir", &self.root_dir)
            .field("collectible", &self.collectible)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
