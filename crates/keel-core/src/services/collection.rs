use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::services::descriptor::{
    BuildFn, ServiceDescriptor, ServiceId, ServiceImplementation, ServiceLifetime,
    ServiceProvenance, ServiceRequest, SharedInstance,
};
use crate::services::error::ServiceGraphError;
use crate::services::provider::ResolveCtx;

static NEXT_DESCRIPTOR_ID: AtomicU64 = AtomicU64::new(1);

fn next_descriptor_id() -> u64 {
    NEXT_DESCRIPTOR_ID.fetch_add(1, Ordering::Relaxed)
}

/// An ordered set of service registrations.
///
/// The host owns one collection; each module registers into its own, and the
/// manager merges the module collections into the host's while preserving
/// provenance, so module-private registrations stay distinguishable and can
/// be removed again at unload.
#[derive(Debug, Clone, Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
    provenance: Option<ServiceProvenance>,
}

impl ServiceCollection {
    /// A collection whose registrations belong to the host.
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            provenance: Some(ServiceProvenance::Host),
        }
    }

    /// A collection whose registrations belong to the named module.
    pub fn for_module(module_id: &str) -> Self {
        Self {
            descriptors: Vec::new(),
            provenance: Some(ServiceProvenance::Module(module_id.to_string())),
        }
    }

    fn provenance(&self) -> ServiceProvenance {
        self.provenance.clone().unwrap_or(ServiceProvenance::Host)
    }

    /// Register a raw descriptor. The typed helpers below are preferred.
    pub fn register(&mut self, mut descriptor: ServiceDescriptor) {
        if descriptor.descriptor_id == 0 {
            descriptor.descriptor_id = next_descriptor_id();
        }
        self.descriptors.push(descriptor);
    }

    fn push(
        &mut self,
        service: ServiceId,
        implementation: ServiceImplementation,
        lifetime: ServiceLifetime,
        key: Option<String>,
        multi_bind: bool,
    ) {
        self.descriptors.push(ServiceDescriptor {
            descriptor_id: next_descriptor_id(),
            service,
            implementation,
            lifetime,
            key,
            multi_bind,
            provenance: self.provenance(),
        });
    }

    fn build_fn<T, F>(build: F) -> BuildFn
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolveCtx<'_>) -> Result<Arc<T>, ServiceGraphError> + Send + Sync + 'static,
    {
        Arc::new(move |ctx| {
            let handle: Arc<T> = build(ctx)?;
            Ok(Arc::new(handle) as SharedInstance)
        })
    }

    /// Register a constructed service under lifetime `lifetime`. The
    /// declared `dependencies` are what the graph validator checks; the
    /// `build` closure is the constructor and should resolve exactly those.
    pub fn add<T, F>(
        &mut self,
        lifetime: ServiceLifetime,
        dependencies: Vec<ServiceRequest>,
        build: F,
    ) where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolveCtx<'_>) -> Result<Arc<T>, ServiceGraphError> + Send + Sync + 'static,
    {
        self.push(
            ServiceId::of::<T>(),
            ServiceImplementation::Constructor {
                dependencies,
                build: Self::build_fn(build),
            },
            lifetime,
            None,
            false,
        );
    }

    pub fn add_singleton<T, F>(&mut self, dependencies: Vec<ServiceRequest>, build: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolveCtx<'_>) -> Result<Arc<T>, ServiceGraphError> + Send + Sync + 'static,
    {
        self.add::<T, F>(ServiceLifetime::Singleton, dependencies, build);
    }

    pub fn add_scoped<T, F>(&mut self, dependencies: Vec<ServiceRequest>, build: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolveCtx<'_>) -> Result<Arc<T>, ServiceGraphError> + Send + Sync + 'static,
    {
        self.add::<T, F>(ServiceLifetime::Scoped, dependencies, build);
    }

    pub fn add_transient<T, F>(&mut self, dependencies: Vec<ServiceRequest>, build: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolveCtx<'_>) -> Result<Arc<T>, ServiceGraphError> + Send + Sync + 'static,
    {
        self.add::<T, F>(ServiceLifetime::Transient, dependencies, build);
    }

    /// Register an already-built instance. Instances are singletons.
    pub fn add_instance<T>(&mut self, instance: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.push(
            ServiceId::of::<T>(),
            ServiceImplementation::Instance(Arc::new(instance) as SharedInstance),
            ServiceLifetime::Singleton,
            None,
            false,
        );
    }

    /// Register an opaque factory. Structural constructor checks are
    /// skipped for factories; the declared dependencies still feed cycle
    /// and lifetime analysis.
    pub fn add_factory<T, F>(
        &mut self,
        lifetime: ServiceLifetime,
        dependencies: Vec<ServiceRequest>,
        build: F,
    ) where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolveCtx<'_>) -> Result<Arc<T>, ServiceGraphError> + Send + Sync + 'static,
    {
        self.push(
            ServiceId::of::<T>(),
            ServiceImplementation::Factory {
                dependencies,
                build: Self::build_fn(build),
            },
            lifetime,
            None,
            false,
        );
    }

    /// Register a keyed service resolvable through
    /// [`resolve_keyed`](crate::services::provider::ServiceProvider::resolve_keyed).
    pub fn add_keyed<T, F>(
        &mut self,
        key: &str,
        lifetime: ServiceLifetime,
        dependencies: Vec<ServiceRequest>,
        build: F,
    ) where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolveCtx<'_>) -> Result<Arc<T>, ServiceGraphError> + Send + Sync + 'static,
    {
        self.push(
            ServiceId::of::<T>(),
            ServiceImplementation::Constructor {
                dependencies,
                build: Self::build_fn(build),
            },
            lifetime,
            Some(key.to_string()),
            false,
        );
    }

    /// Mark the most recent registration as multi-bind, allowing it to
    /// share its `(service, key)` pair with other multi-bind registrations.
    pub fn as_multi_bind(&mut self) -> &mut Self {
        if let Some(last) = self.descriptors.last_mut() {
            last.multi_bind = true;
        }
        self
    }

    /// Move every descriptor of `other` into this collection, keeping the
    /// other collection's provenance on each descriptor.
    pub fn merge(&mut self, other: ServiceCollection) {
        self.descriptors.extend(other.descriptors);
    }

    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Whether any registration resolves the given service type.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        let id = ServiceId::of::<T>();
        self.descriptors.iter().any(|d| d.service == id)
    }
}
