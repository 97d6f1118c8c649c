use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::services::collection::ServiceCollection;
use crate::services::descriptor::{
    ServiceDescriptor, ServiceId, ServiceImplementation, ServiceLifetime, SharedInstance,
};
use crate::services::error::ServiceGraphError;
use crate::services::validator::ServiceValidationReport;

/// Resolution context handed to constructors and factories.
///
/// Carries the provider plus the active scope, so a scoped constructor can
/// resolve its own scoped dependencies.
pub struct ResolveCtx<'a> {
    provider: &'a ServiceProvider,
    scope: Option<&'a ServiceScope<'a>>,
}

impl<'a> ResolveCtx<'a> {
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ServiceGraphError> {
        self.provider.resolve_inner::<T>(None, self.scope)
    }

    pub fn resolve_keyed<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: &str,
    ) -> Result<Arc<T>, ServiceGraphError> {
        self.provider.resolve_inner::<T>(Some(key), self.scope)
    }

    /// Resolve an optional dependency; absence is not an error.
    pub fn resolve_optional<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.provider.resolve_inner::<T>(None, self.scope).ok()
    }

    pub fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        self.provider.resolve_all_inner::<T>(self.scope)
    }
}

/// The built, frozen container over a validated registration set.
///
/// Only [`build`](ServiceProvider::build) creates a provider, and it
/// demands a passing validation report, so an invalid registration graph
/// can never start resolving. No registration happens after build; the
/// only post-build mutation is removing a module's contributions at
/// unload.
pub struct ServiceProvider {
    descriptors: RwLock<Vec<ServiceDescriptor>>,
    singletons: Mutex<HashMap<u64, SharedInstance>>,
}

impl ServiceProvider {
    /// Build a provider from a validated collection. Fails when the report
    /// carries errors.
    pub fn build(
        collection: ServiceCollection,
        report: &ServiceValidationReport,
    ) -> Result<Arc<Self>, ServiceGraphError> {
        if !report.is_valid() {
            return Err(ServiceGraphError::ValidationRejected {
                errors: report.errors().to_vec(),
            });
        }
        Ok(Arc::new(Self {
            descriptors: RwLock::new(collection.descriptors().to_vec()),
            singletons: Mutex::new(HashMap::new()),
        }))
    }

    /// Default resolution: the last keyless descriptor registered for the
    /// service. Earlier keyless registrations remain reachable through
    /// [`resolve_all`](ServiceProvider::resolve_all).
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ServiceGraphError> {
        self.resolve_inner::<T>(None, None)
    }

    pub fn resolve_keyed<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: &str,
    ) -> Result<Arc<T>, ServiceGraphError> {
        self.resolve_inner::<T>(Some(key), None)
    }

    /// Every keyless registration for the service, in registration order.
    pub fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        self.resolve_all_inner::<T>(None)
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        let id = ServiceId::of::<T>();
        self.descriptors
            .read()
            .expect("descriptor lock poisoned")
            .iter()
            .any(|d| d.service == id)
    }

    pub fn create_scope(&self) -> ServiceScope<'_> {
        ServiceScope {
            provider: self,
            scoped: Mutex::new(HashMap::new()),
        }
    }

    /// Drop every descriptor contributed by `module_id` along with any
    /// cached instances built from them. Returns how many registrations
    /// were removed.
    pub fn remove_module(&self, module_id: &str) -> usize {
        let removed_ids: Vec<u64> = {
            let mut descriptors = self.descriptors.write().expect("descriptor lock poisoned");
            let before = descriptors.len();
            let mut removed = Vec::new();
            descriptors.retain(|d| {
                if d.provenance.module_id() == Some(module_id) {
                    removed.push(d.descriptor_id);
                    false
                } else {
                    true
                }
            });
            debug_assert_eq!(before, descriptors.len() + removed.len());
            removed
        };
        let mut singletons = self.singletons.lock().expect("singleton lock poisoned");
        for id in &removed_ids {
            singletons.remove(id);
        }
        removed_ids.len()
    }

    fn find_descriptor(&self, id: &ServiceId, key: Option<&str>) -> Option<ServiceDescriptor> {
        let descriptors = self.descriptors.read().expect("descriptor lock poisoned");
        descriptors
            .iter()
            .rev()
            .find(|d| d.service == *id && d.key.as_deref() == key)
            .cloned()
    }

    fn resolve_inner<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: Option<&str>,
        scope: Option<&ServiceScope>,
    ) -> Result<Arc<T>, ServiceGraphError> {
        let id = ServiceId::of::<T>();
        let descriptor = self.find_descriptor(&id, key).ok_or_else(|| match key {
            Some(key) => ServiceGraphError::KeyNotRegistered {
                service: id.display_name().to_string(),
                key: key.to_string(),
            },
            None => ServiceGraphError::NotRegistered {
                service: id.display_name().to_string(),
            },
        })?;
        let instance = self.instantiate(&descriptor, scope)?;
        Self::downcast::<T>(&id, instance)
    }

    fn resolve_all_inner<T: ?Sized + Send + Sync + 'static>(
        &self,
        scope: Option<&ServiceScope>,
    ) -> Vec<Arc<T>> {
        let id = ServiceId::of::<T>();
        let matching: Vec<ServiceDescriptor> = {
            let descriptors = self.descriptors.read().expect("descriptor lock poisoned");
            descriptors
                .iter()
                .filter(|d| d.service == id && d.key.is_none())
                .cloned()
                .collect()
        };
        matching
            .iter()
            .filter_map(|d| {
                self.instantiate(d, scope)
                    .and_then(|i| Self::downcast::<T>(&id, i))
                    .ok()
            })
            .collect()
    }

    fn instantiate(
        &self,
        descriptor: &ServiceDescriptor,
        scope: Option<&ServiceScope>,
    ) -> Result<SharedInstance, ServiceGraphError> {
        match descriptor.lifetime {
            ServiceLifetime::Singleton => {
                if let Some(cached) = self
                    .singletons
                    .lock()
                    .expect("singleton lock poisoned")
                    .get(&descriptor.descriptor_id)
                    .cloned()
                {
                    return Ok(cached);
                }
                // Built outside the lock: the constructor may itself
                // resolve singleton dependencies through this provider.
                let built = self.build_instance(descriptor, scope)?;
                let mut singletons = self.singletons.lock().expect("singleton lock poisoned");
                Ok(singletons
                    .entry(descriptor.descriptor_id)
                    .or_insert(built)
                    .clone())
            }
            ServiceLifetime::Scoped => {
                let scope = scope.ok_or_else(|| ServiceGraphError::ScopeRequired {
                    service: descriptor.service.display_name().to_string(),
                })?;
                if let Some(cached) = scope.cached(descriptor.descriptor_id) {
                    return Ok(cached);
                }
                let built = self.build_instance(descriptor, Some(scope))?;
                Ok(scope.cache(descriptor.descriptor_id, built))
            }
            ServiceLifetime::Transient => self.build_instance(descriptor, scope),
        }
    }

    fn build_instance(
        &self,
        descriptor: &ServiceDescriptor,
        scope: Option<&ServiceScope>,
    ) -> Result<SharedInstance, ServiceGraphError> {
        match &descriptor.implementation {
            ServiceImplementation::Instance(instance) => Ok(instance.clone()),
            ServiceImplementation::Constructor { build, .. }
            | ServiceImplementation::Factory { build, .. } => {
                let ctx = ResolveCtx {
                    provider: self,
                    scope,
                };
                build(&ctx)
            }
        }
    }

    fn downcast<T: ?Sized + Send + Sync + 'static>(
        id: &ServiceId,
        instance: SharedInstance,
    ) -> Result<Arc<T>, ServiceGraphError> {
        instance
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or_else(|| ServiceGraphError::TypeMismatch {
                service: id.display_name().to_string(),
            })
    }
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .descriptors
            .read()
            .map(|d| d.len())
            .unwrap_or_default();
        f.debug_struct("ServiceProvider")
            .field("descriptors", &count)
            .finish_non_exhaustive()
    }
}

/// A resolution scope: scoped services live once per scope and die with it.
pub struct ServiceScope<'a> {
    provider: &'a ServiceProvider,
    scoped: Mutex<HashMap<u64, SharedInstance>>,
}

impl ServiceScope<'_> {
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ServiceGraphError> {
        self.provider.resolve_inner::<T>(None, Some(self))
    }

    pub fn resolve_keyed<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: &str,
    ) -> Result<Arc<T>, ServiceGraphError> {
        self.provider.resolve_inner::<T>(Some(key), Some(self))
    }

    pub fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        self.provider.resolve_all_inner::<T>(Some(self))
    }

    fn cached(&self, descriptor_id: u64) -> Option<SharedInstance> {
        self.scoped
            .lock()
            .expect("scope lock poisoned")
            .get(&descriptor_id)
            .cloned()
    }

    fn cache(&self, descriptor_id: u64, instance: SharedInstance) -> SharedInstance {
        self.scoped
            .lock()
            .expect("scope lock poisoned")
            .entry(descriptor_id)
            .or_insert(instance)
            .clone()
    }
}
