//! Error types for the module system.
//!
//! [`ModuleSystemError`] covers the failure categories the host
//! distinguishes: manifest problems, binary problems, version and graph
//! incompatibilities, service-graph rejection, errors thrown by module code,
//! stop timeouts, and unsupported unloading.

use std::path::PathBuf;

use crate::module_system::dependency::DependencyError;
use crate::module_system::lifecycle::LifecycleStage;
use crate::module_system::version::VersionError;

#[derive(Debug, thiserror::Error)]
pub enum ModuleSystemError {
    #[error("Invalid manifest at '{path}': {message}")]
    ManifestInvalid {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Module '{module_id}': binary not found at '{path}'")]
    BinaryMissing { module_id: String, path: PathBuf },

    #[error("Module '{module_id}': binary '{path}' does not match its manifest: {message}")]
    BinaryIncoherent {
        module_id: String,
        path: PathBuf,
        message: String,
    },

    #[error("Module '{module_id}' is not compatible with this host: {message}")]
    VersionIncompatible { module_id: String, message: String },

    #[error("Module dependency graph is invalid: {}", .errors.join("; "))]
    GraphInvalid { errors: Vec<String> },

    #[error("Merged service registrations are invalid: {}", .errors.join("; "))]
    ServiceGraphInvalid { errors: Vec<String> },

    #[error("Module '{module_id}' failed during {stage}: {message}")]
    ModuleThrew {
        module_id: String,
        stage: LifecycleStage,
        message: String,
    },

    #[error("Module '{module_id}' ignored cancellation for more than {grace_secs}s while stopping")]
    StoppingTimeout { module_id: String, grace_secs: u64 },

    #[error("Module '{module_id}': this platform cannot reclaim the module's code; it stays resident until restart")]
    UnloadUnsupported { module_id: String },

    #[error("Module loading failed for '{module_id}': {message}")]
    LoadingError {
        module_id: String,
        path: Option<PathBuf>,
        message: String,
    },

    #[error("Module '{module_id}' cannot move from {from} to {to}")]
    IllegalTransition {
        module_id: String,
        from: String,
        to: String,
    },

    #[error("No module with id '{0}' is loaded")]
    UnknownModule(String),

    #[error("Dependency resolution failed: {0}")]
    Dependency(#[from] DependencyError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("Lifecycle operation cancelled for module '{module_id}' during {stage}")]
    Cancelled {
        module_id: String,
        stage: LifecycleStage,
    },
}
