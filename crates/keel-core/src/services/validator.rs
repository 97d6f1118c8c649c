//! Static analysis over a service-registration set.
//!
//! Runs before any provider is built. A failing report must prevent
//! provider construction; [`ServiceProvider::build`] enforces that.
//!
//! [`ServiceProvider::build`]: crate::services::provider::ServiceProvider::build

use std::collections::{HashMap, HashSet};

use crate::services::collection::ServiceCollection;
use crate::services::descriptor::{
    ServiceDescriptor, ServiceId, ServiceImplementation, ServiceLifetime,
};

/// Outcome of validating a registration set.
#[derive(Debug, Clone, Default)]
pub struct ServiceValidationReport {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ServiceValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    fn warning(&mut self, message: String) {
        self.warnings.push(message);
    }
}

/// Analyses descriptors for missing dependencies, constructor cycles,
/// lifetime mismatches, and keyed-registration conflicts.
#[derive(Debug, Default)]
pub struct ServiceGraphValidator {
    /// Modules whose manifests opt into keyless overrides
    override_modules: HashSet<String>,
}

impl ServiceGraphValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override_modules(mut self, modules: HashSet<String>) -> Self {
        self.override_modules = modules;
        self
    }

    pub fn validate(&self, collection: &ServiceCollection) -> ServiceValidationReport {
        let mut report = ServiceValidationReport::default();
        let descriptors = collection.descriptors();

        let mut by_service: HashMap<ServiceId, Vec<&ServiceDescriptor>> = HashMap::new();
        for d in descriptors {
            by_service.entry(d.service).or_default().push(d);
        }

        for d in descriptors {
            self.check_descriptor(d, &by_service, &mut report);
        }
        self.check_keyed_conflicts(descriptors, &mut report);
        self.check_keyless_conflicts(&by_service, &mut report);
        self.check_cycles(descriptors, &by_service, &mut report);

        report
    }

    fn check_descriptor(
        &self,
        d: &ServiceDescriptor,
        by_service: &HashMap<ServiceId, Vec<&ServiceDescriptor>>,
        report: &mut ServiceValidationReport,
    ) {
        if let Some(key) = &d.key {
            if key.is_empty() {
                report.error(format!(
                    "Keyed registration for {} has an empty key",
                    d.service
                ));
            }
        }

        if matches!(d.implementation, ServiceImplementation::Instance(_))
            && d.lifetime != ServiceLifetime::Singleton
        {
            report.warning(format!(
                "Instance registration for {} declared {} but instances behave as singletons",
                d.service, d.lifetime
            ));
        }

        let is_constructor = d.implementation.is_constructor();
        for request in d.implementation.dependencies() {
            let candidates: Vec<&&ServiceDescriptor> = by_service
                .get(&request.id)
                .map(|list| {
                    list.iter()
                        .filter(|c| c.key == request.key)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();

            if candidates.is_empty() {
                let target = match &request.key {
                    Some(key) => format!("{} (key '{}')", request.id, key),
                    None => request.id.to_string(),
                };
                if request.optional {
                    report.warning(format!(
                        "Optional dependency {} of {} is not registered",
                        target, d.service
                    ));
                } else if is_constructor {
                    report.error(format!(
                        "Dependency {} of {} is not registered",
                        target, d.service
                    ));
                } else {
                    // Factories skip structural checks; an undeclared input
                    // surfaces at construction time instead.
                    report.warning(format!(
                        "Factory for {} declares dependency {} which is not registered",
                        d.service, target
                    ));
                }
                continue;
            }

            for candidate in candidates {
                if !d.lifetime.can_depend_on(candidate.lifetime) {
                    report.error(format!(
                        "{} {} depends on {} {}",
                        d.lifetime, d.service, candidate.lifetime, candidate.service
                    ));
                }
            }
        }
    }

    fn check_keyed_conflicts(
        &self,
        descriptors: &[ServiceDescriptor],
        report: &mut ServiceValidationReport,
    ) {
        let mut keyed: HashMap<(ServiceId, &str), Vec<&ServiceDescriptor>> = HashMap::new();
        for d in descriptors {
            if let Some(key) = &d.key {
                keyed.entry((d.service, key.as_str())).or_default().push(d);
            }
        }
        for ((service, key), group) in keyed {
            if group.len() > 1 && !group.iter().all(|d| d.multi_bind) {
                report.error(format!(
                    "Conflicting registrations for {} with key '{}': {} registrations but not all are multi-bind",
                    service, key, group.len()
                ));
            }
        }
    }

    /// Two modules registering keyless descriptors for the same service is
    /// an error unless one of them carries the allow-override capability.
    fn check_keyless_conflicts(
        &self,
        by_service: &HashMap<ServiceId, Vec<&ServiceDescriptor>>,
        report: &mut ServiceValidationReport,
    ) {
        for (service, group) in by_service {
            let module_owners: Vec<&str> = group
                .iter()
                .filter(|d| d.key.is_none())
                .filter_map(|d| d.provenance.module_id())
                .collect();
            let distinct: HashSet<&str> = module_owners.iter().copied().collect();
            if distinct.len() > 1 {
                if distinct.iter().any(|m| self.override_modules.contains(*m)) {
                    report.warning(format!(
                        "Service {} is registered by modules {:?}; the later registration overrides",
                        service, distinct
                    ));
                } else {
                    report.error(format!(
                        "Modules {:?} both register {} without a key and none allows overrides",
                        distinct, service
                    ));
                }
            }
        }
    }

    /// Depth-first colouring over the depends-on graph; cycles are reported
    /// with the full path.
    fn check_cycles(
        &self,
        descriptors: &[ServiceDescriptor],
        by_service: &HashMap<ServiceId, Vec<&ServiceDescriptor>>,
        report: &mut ServiceValidationReport,
    ) {
        fn visit(
            service: ServiceId,
            by_service: &HashMap<ServiceId, Vec<&ServiceDescriptor>>,
            visiting: &mut HashSet<ServiceId>,
            visited: &mut HashSet<ServiceId>,
            path: &mut Vec<ServiceId>,
            cycles: &mut Vec<Vec<ServiceId>>,
        ) {
            visiting.insert(service);
            path.push(service);

            let mut edges: Vec<ServiceId> = Vec::new();
            if let Some(group) = by_service.get(&service) {
                for d in group {
                    for request in d.implementation.dependencies() {
                        if by_service.contains_key(&request.id) {
                            edges.push(request.id);
                        }
                    }
                }
            }

            for dep in edges {
                if visiting.contains(&dep) {
                    let start = path.iter().position(|s| *s == dep).unwrap_or(0);
                    let mut cycle: Vec<ServiceId> = path[start..].to_vec();
                    cycle.push(dep);
                    cycles.push(cycle);
                } else if !visited.contains(&dep) {
                    visit(dep, by_service, visiting, visited, path, cycles);
                }
            }

            path.pop();
            visiting.remove(&service);
            visited.insert(service);
        }

        let mut visiting = HashSet::new();
        let mut visited = HashSet::new();
        let mut cycles = Vec::new();
        for d in descriptors {
            if !visited.contains(&d.service) {
                let mut path = Vec::new();
                visit(
                    d.service,
                    by_service,
                    &mut visiting,
                    &mut visited,
                    &mut path,
                    &mut cycles,
                );
            }
        }

        for cycle in cycles {
            let rendered: Vec<&str> = cycle.iter().map(|s| s.display_name()).collect();
            report.error(format!(
                "Service constructor cycle: {}",
                rendered.join(" -> ")
            ));
        }
    }
}
