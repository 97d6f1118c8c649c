use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::services::error::ServiceGraphError;
use crate::services::provider::ResolveCtx;

/// A resolved service handle as stored by the container.
///
/// The boxed value is always the `Arc<T>` of the registered service type, so
/// resolution downcasts to `Arc<T>` rather than to `T` itself. This is what
/// lets trait-object services (`Arc<dyn Trait>`) live in the container.
pub type SharedInstance = Arc<dyn Any + Send + Sync>;

/// Constructor or factory body: resolves its dependencies through the
/// context and produces the shared handle.
pub type BuildFn =
    Arc<dyn Fn(&ResolveCtx<'_>) -> Result<SharedInstance, ServiceGraphError> + Send + Sync>;

/// Identifies a service by the type it is resolved as.
#[derive(Debug, Clone, Copy)]
pub struct ServiceId {
    type_id: TypeId,
    type_name: &'static str,
}

impl ServiceId {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Short name used in diagnostics: the last path segment of the type.
    pub fn display_name(&self) -> &'static str {
        self.type_name.rsplit("::").next().unwrap_or(self.type_name)
    }
}

impl PartialEq for ServiceId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ServiceId {}

impl Hash for ServiceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// How long a resolved instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceLifetime {
    /// A fresh instance per resolution
    Transient,
    /// One instance per scope
    Scoped,
    /// One instance per provider
    Singleton,
}

impl ServiceLifetime {
    /// Lifetime compatibility rule: a singleton must not capture anything
    /// shorter-lived than itself. Everything else may depend on anything.
    pub fn can_depend_on(self, dependency: ServiceLifetime) -> bool {
        !(self == ServiceLifetime::Singleton && dependency != ServiceLifetime::Singleton)
    }
}

impl fmt::Display for ServiceLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceLifetime::Transient => write!(f, "Transient"),
            ServiceLifetime::Scoped => write!(f, "Scoped"),
            ServiceLifetime::Singleton => write!(f, "Singleton"),
        }
    }
}

/// A dependency a constructor or factory declares on another registration.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub id: ServiceId,
    pub key: Option<String>,
    /// Opted-in optional parameter: unresolved is a warning, not an error
    pub optional: bool,
}

impl ServiceRequest {
    pub fn new<T: ?Sized + 'static>() -> Self {
        Self {
            id: ServiceId::of::<T>(),
            key: None,
            optional: false,
        }
    }

    pub fn keyed<T: ?Sized + 'static>(key: &str) -> Self {
        Self {
            id: ServiceId::of::<T>(),
            key: Some(key.to_string()),
            optional: false,
        }
    }

    pub fn optional<T: ?Sized + 'static>() -> Self {
        Self {
            id: ServiceId::of::<T>(),
            key: None,
            optional: true,
        }
    }
}

/// How a registration produces its instance.
#[derive(Clone)]
pub enum ServiceImplementation {
    /// A concrete type built through its declared constructor
    Constructor {
        dependencies: Vec<ServiceRequest>,
        build: BuildFn,
    },
    /// An opaque factory; declared dependencies inform graph checks only
    Factory {
        dependencies: Vec<ServiceRequest>,
        build: BuildFn,
    },
    /// An instance supplied up front
    Instance(SharedInstance),
}

impl ServiceImplementation {
    pub fn dependencies(&self) -> &[ServiceRequest] {
        match self {
            ServiceImplementation::Constructor { dependencies, .. } => dependencies,
            ServiceImplementation::Factory { dependencies, .. } => dependencies,
            ServiceImplementation::Instance(_) => &[],
        }
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self, ServiceImplementation::Constructor { .. })
    }
}

impl fmt::Debug for ServiceImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceImplementation::Constructor { dependencies, .. } => f
                .debug_struct("Constructor")
                .field("dependencies", dependencies)
                .finish_non_exhaustive(),
            ServiceImplementation::Factory { dependencies, .. } => f
                .debug_struct("Factory")
                .field("dependencies", dependencies)
                .finish_non_exhaustive(),
            ServiceImplementation::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

/// Which container a registration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceProvenance {
    Host,
    Module(String),
}

impl ServiceProvenance {
    pub fn module_id(&self) -> Option<&str> {
        match self {
            ServiceProvenance::Host => None,
            ServiceProvenance::Module(id) => Some(id),
        }
    }
}

/// A single service registration.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub(crate) descriptor_id: u64,
    pub service: ServiceId,
    pub implementation: ServiceImplementation,
    pub lifetime: ServiceLifetime,
    pub key: Option<String>,
    /// Multiple keyed registrations under one `(service, key)` pair are a
    /// conflict unless every one of them sets this flag
    pub multi_bind: bool,
    pub provenance: ServiceProvenance,
}

impl ServiceDescriptor {
    /// Stable identity of this registration within the process; survives
    /// merging and is what instance caches key on.
    pub fn descriptor_id(&self) -> u64 {
        self.descriptor_id
    }
}
