#![cfg(test)]

use std::collections::HashSet;
use std::sync::Arc;

use crate::services::collection::ServiceCollection;
use crate::services::descriptor::{
    ServiceDescriptor, ServiceId, ServiceImplementation, ServiceLifetime, ServiceProvenance,
    ServiceRequest, SharedInstance,
};
use crate::services::validator::ServiceGraphValidator;

struct Repo;
struct Cache;
struct Api;

fn ok<T: Send + Sync + 'static>(value: fn() -> T) -> impl Fn(&crate::services::ResolveCtx<'_>) -> Result<Arc<T>, crate::services::ServiceGraphError> {
    move |_| Ok(Arc::new(value()))
}

#[test]
fn empty_collection_is_valid() {
    let report = ServiceGraphValidator::new().validate(&ServiceCollection::new());
    assert!(report.is_valid());
    assert!(report.warnings().is_empty());
}

#[test]
fn missing_constructor_dependency_is_an_error() {
    let mut services = ServiceCollection::new();
    services.add_singleton::<Api, _>(vec![ServiceRequest::new::<Repo>()], ok(|| Api));

    let report = ServiceGraphValidator::new().validate(&services);
    assert!(!report.is_valid());
    assert!(report.errors()[0].contains("Repo"));
    assert!(report.errors()[0].contains("not registered"));
}

#[test]
fn optional_unresolved_dependency_is_a_warning() {
    let mut services = ServiceCollection::new();
    services.add_singleton::<Api, _>(vec![ServiceRequest::optional::<Cache>()], ok(|| Api));

    let report = ServiceGraphValidator::new().validate(&services);
    assert!(report.is_valid());
    assert!(report.warnings()[0].contains("Optional dependency"));
}

#[test]
fn factory_with_unresolved_declared_dependency_only_warns() {
    let mut services = ServiceCollection::new();
    services.add_factory::<Api, _>(
        ServiceLifetime::Singleton,
        vec![ServiceRequest::new::<Repo>()],
        ok(|| Api),
    );

    let report = ServiceGraphValidator::new().validate(&services);
    assert!(report.is_valid());
    assert!(report.warnings()[0].contains("Factory"));
}

#[test]
fn constructor_cycle_reports_full_path() {
    let mut services = ServiceCollection::new();
    services.add_singleton::<Repo, _>(vec![ServiceRequest::new::<Api>()], ok(|| Repo));
    services.add_singleton::<Api, _>(vec![ServiceRequest::new::<Repo>()], ok(|| Api));

    let report = ServiceGraphValidator::new().validate(&services);
    assert!(!report.is_valid());
    let cycle = report
        .errors()
        .iter()
        .find(|e| e.contains("cycle"))
        .expect("cycle error");
    assert!(cycle.contains("->"), "{cycle}");
    assert!(cycle.contains("Repo") && cycle.contains("Api"), "{cycle}");
}

#[test]
fn singleton_depending_on_scoped_is_an_error() {
    let mut services = ServiceCollection::new();
    services.add_scoped::<Repo, _>(Vec::new(), ok(|| Repo));
    services.add_singleton::<Api, _>(vec![ServiceRequest::new::<Repo>()], ok(|| Api));

    let report = ServiceGraphValidator::new().validate(&services);
    assert!(!report.is_valid());
    assert!(report.errors()[0].contains("Singleton Api depends on Scoped Repo"));
}

#[test]
fn singleton_depending_on_transient_is_an_error() {
    let mut services = ServiceCollection::new();
    services.add_transient::<Repo, _>(Vec::new(), ok(|| Repo));
    services.add_singleton::<Api, _>(vec![ServiceRequest::new::<Repo>()], ok(|| Api));

    let report = ServiceGraphValidator::new().validate(&services);
    assert!(!report.is_valid());
    assert!(report.errors()[0].contains("Transient"));
}

#[test]
fn scoped_depending_on_transient_is_allowed() {
    let mut services = ServiceCollection::new();
    services.add_transient::<Repo, _>(Vec::new(), ok(|| Repo));
    services.add_scoped::<Api, _>(vec![ServiceRequest::new::<Repo>()], ok(|| Api));

    let report = ServiceGraphValidator::new().validate(&services);
    assert!(report.is_valid(), "{:?}", report.errors());
}

#[test]
fn anything_may_depend_on_a_singleton() {
    let mut services = ServiceCollection::new();
    services.add_singleton::<Repo, _>(Vec::new(), ok(|| Repo));
    services.add_transient::<Api, _>(vec![ServiceRequest::new::<Repo>()], ok(|| Api));
    services.add_scoped::<Cache, _>(vec![ServiceRequest::new::<Repo>()], ok(|| Cache));

    let report = ServiceGraphValidator::new().validate(&services);
    assert!(report.is_valid(), "{:?}", report.errors());
}

#[test]
fn duplicate_keyed_registrations_conflict_unless_multi_bind() {
    let mut services = ServiceCollection::new();
    services.add_keyed::<Repo, _>("primary", ServiceLifetime::Singleton, Vec::new(), ok(|| Repo));
    services.add_keyed::<Repo, _>("primary", ServiceLifetime::Singleton, Vec::new(), ok(|| Repo));

    let report = ServiceGraphValidator::new().validate(&services);
    assert!(!report.is_valid());
    assert!(report.errors()[0].contains("key 'primary'"));

    let mut multi = ServiceCollection::new();
    multi.add_keyed::<Repo, _>("primary", ServiceLifetime::Singleton, Vec::new(), ok(|| Repo));
    multi.as_multi_bind();
    multi.add_keyed::<Repo, _>("primary", ServiceLifetime::Singleton, Vec::new(), ok(|| Repo));
    multi.as_multi_bind();

    let report = ServiceGraphValidator::new().validate(&multi);
    assert!(report.is_valid(), "{:?}", report.errors());
}

#[test]
fn empty_key_is_an_error() {
    let mut services = ServiceCollection::new();
    services.add_keyed::<Repo, _>("", ServiceLifetime::Singleton, Vec::new(), ok(|| Repo));

    let report = ServiceGraphValidator::new().validate(&services);
    assert!(!report.is_valid());
    assert!(report.errors()[0].contains("empty key"));
}

#[test]
fn keyless_conflict_across_modules_is_an_error_without_override() {
    let mut merged = ServiceCollection::new();
    let mut first = ServiceCollection::for_module("billing");
    first.add_singleton::<Repo, _>(Vec::new(), ok(|| Repo));
    let mut second = ServiceCollection::for_module("inventory");
    second.add_singleton::<Repo, _>(Vec::new(), ok(|| Repo));
    merged.merge(first);
    merged.merge(second);

    let report = ServiceGraphValidator::new().validate(&merged);
    assert!(!report.is_valid());
    assert!(report.errors()[0].contains("none allows overrides"));

    let overrides: HashSet<String> = ["inventory".to_string()].into();
    let report = ServiceGraphValidator::new()
        .with_override_modules(overrides)
        .validate(&merged);
    assert!(report.is_valid());
    assert!(report.warnings()[0].contains("overrides"));
}

#[test]
fn host_may_register_the_same_service_twice_as_enumeration() {
    let mut services = ServiceCollection::new();
    services.add_singleton::<Repo, _>(Vec::new(), ok(|| Repo));
    services.add_singleton::<Repo, _>(Vec::new(), ok(|| Repo));

    let report = ServiceGraphValidator::new().validate(&services);
    assert!(report.is_valid(), "{:?}", report.errors());
}

#[test]
fn non_singleton_instance_lifetime_is_a_warning() {
    let mut services = ServiceCollection::new();
    let instance: SharedInstance = Arc::new(Arc::new(Repo));
    services.register(ServiceDescriptor {
        descriptor_id: 0,
        service: ServiceId::of::<Repo>(),
        implementation: ServiceImplementation::Instance(instance),
        lifetime: ServiceLifetime::Transient,
        key: None,
        multi_bind: false,
        provenance: ServiceProvenance::Host,
    });

    let report = ServiceGraphValidator::new().validate(&services);
    assert!(report.is_valid());
    assert!(report.warnings()[0].contains("singletons"));
}
