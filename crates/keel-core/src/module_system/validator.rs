use std::collections::{HashMap, HashSet};

use semver::Version;

use crate::module_system::dependency::DependencyError;
use crate::module_system::discovery::DiscoveredModule;
use crate::module_system::manifest::ModuleManifest;
use crate::module_system::metadata::{self, BinaryMetadata};

/// The host facts modules are validated against.
#[derive(Debug, Clone)]
pub struct HostContext {
    pub shell_version: Version,
    pub platform: String,
}

impl HostContext {
    /// Host context for the running process and platform.
    pub fn current(shell_version: Version) -> Self {
        Self {
            shell_version,
            platform: std::env::consts::OS.to_string(),
        }
    }
}

/// Accumulated validation outcome.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Structural, compatibility, and graph checks over discovered modules.
///
/// Everything here runs before any module code; a candidate that fails
/// validation never gets an isolation context.
#[derive(Debug, Clone)]
pub struct ModuleValidator {
    host: HostContext,
}

impl ModuleValidator {
    pub fn new(host: HostContext) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &HostContext {
        &self.host
    }

    /// Structural manifest checks (required fields, parseable versions,
    /// coherent bounds).
    pub fn validate_manifest(&self, manifest: &ModuleManifest) -> ValidationResult {
        let mut result = ValidationResult::default();
        for message in manifest.validate() {
            result.error(message);
        }
        result
    }

    /// Host compatibility: shell-version bounds and platform support.
    pub fn validate_compatibility(&self, manifest: &ModuleManifest) -> ValidationResult {
        let mut result = ValidationResult::default();
        if !manifest.is_compatible_with(&self.host.shell_version) {
            result.error(format!(
                "module '{}' requires shell {} but the host is {}",
                manifest.id,
                manifest.shell_constraint(),
                self.host.shell_version
            ));
        }
        if !manifest.supports_platform(&self.host.platform) {
            result.error(format!(
                "module '{}' supports platforms {:?}, not '{}'",
                manifest.id, manifest.supported_platforms, self.host.platform
            ));
        }
        result
    }

    /// Full per-module validation: manifest, compatibility, and binary
    /// coherence via the metadata reader.
    pub fn validate_module(&self, discovered: &DiscoveredModule) -> ValidationResult {
        let mut result = self.validate_manifest(&discovered.manifest);
        result.merge(self.validate_compatibility(&discovered.manifest));
        if !result.is_valid() {
            return result;
        }

        if !discovered.main_binary_path.is_file() {
            result.error(format!(
                "module '{}': main binary '{}' not found",
                discovered.manifest.id,
                discovered.main_binary_path.display()
            ));
            return result;
        }

        match metadata::read_binary_metadata(&discovered.main_binary_path) {
            Ok(meta) => result.merge(self.corroborate(&discovered.manifest, &meta)),
            Err(e) => result.error(e.to_string()),
        }
        result
    }

    /// Check the binary's export table against the manifest's claims.
    pub fn corroborate(
        &self,
        manifest: &ModuleManifest,
        meta: &BinaryMetadata,
    ) -> ValidationResult {
        let mut result = ValidationResult::default();
        if !meta.has_entry_point(&manifest.entry_point) {
            result.error(format!(
                "module '{}': entry point '{}' is not exported by '{}' (exports: {:?})",
                manifest.id, manifest.entry_point, meta.file_name, meta.entry_points
            ));
        }
        match &meta.declared_version {
            Some(declared) if declared != &manifest.version => {
                result.error(format!(
                    "module '{}': binary declares version {} but the manifest says {}",
                    manifest.id, declared, manifest.version
                ));
            }
            Some(_) => {}
            None => result.warning(format!(
                "module '{}': binary '{}' carries no version marker",
                manifest.id, meta.file_name
            )),
        }
        result
    }

    /// Graph-level validation over a candidate set: duplicate ids,
    /// dependency satisfaction, and cycles (reported with the full path).
    pub fn validate_graph(&self, candidates: &[DiscoveredModule]) -> ValidationResult {
        let mut result = ValidationResult::default();

        let mut by_id: HashMap<&str, &DiscoveredModule> = HashMap::new();
        for candidate in candidates {
            if by_id.insert(candidate.id(), candidate).is_some() {
                result.error(DependencyError::DuplicateId(candidate.id().to_string()).to_string());
            }
        }

        for candidate in candidates {
            for dep in &candidate.manifest.dependencies {
                match by_id.get(dep.id.as_str()) {
                    Some(target) => {
                        if !dep.is_satisfied_by(&target.manifest.version) {
                            let err = DependencyError::UnsatisfiedVersion {
                                module_id: candidate.id().to_string(),
                                dependency_id: dep.id.clone(),
                                constraint: dep
                                    .constraint()
                                    .map(|c| c.to_string())
                                    .unwrap_or_else(|e| e.to_string()),
                                actual: target.manifest.version.clone(),
                            };
                            if dep.required {
                                result.error(err.to_string());
                            } else {
                                result.warning(err.to_string());
                            }
                        }
                    }
                    None => {
                        let err = DependencyError::MissingModule(dep.id.clone());
                        if dep.required {
                            result.error(err.to_string());
                        } else {
                            result.warning(format!("optional {}", err));
                        }
                    }
                }
            }
        }

        if let Err(cycle) = Self::detect_cycles(&by_id) {
            result.error(cycle.to_string());
        }

        result
    }

    /// Depth-first colouring over required dependencies. Returns the first
    /// cycle found, path included.
    fn detect_cycles(by_id: &HashMap<&str, &DiscoveredModule>) -> Result<(), DependencyError> {
        fn visit<'a>(
            id: &'a str,
            by_id: &HashMap<&'a str, &'a DiscoveredModule>,
            visiting: &mut HashSet<&'a str>,
            visited: &mut HashSet<&'a str>,
            path: &mut Vec<&'a str>,
        ) -> Result<(), DependencyError> {
            visiting.insert(id);
            path.push(id);

            if let Some(module) = by_id.get(id) {
                for dep in &module.manifest.dependencies {
                    if !dep.required {
                        continue;
                    }
                    let Some(dep_id) = by_id.get_key_value(dep.id.as_str()).map(|(k, _)| *k)
                    else {
                        continue;
                    };
                    if visiting.contains(dep_id) {
                        let start = path.iter().position(|p| *p == dep_id).unwrap_or(0);
                        let mut cycle: Vec<String> =
                            path[start..].iter().map(|s| s.to_string()).collect();
                        cycle.push(dep_id.to_string());
                        return Err(DependencyError::CyclicDependency(cycle));
                    }
                    if !visited.contains(dep_id) {
                        visit(dep_id, by_id, visiting, visited, path)?;
                    }
                }
            }

            path.pop();
            visiting.remove(id);
            visited.insert(id);
            Ok(())
        }

        let mut visiting = HashSet::new();
        let mut visited = HashSet::new();
        let mut ids: Vec<&&str> = by_id.keys().collect();
        ids.sort();
        for id in ids {
            if !visited.contains(*id) {
                let mut path = Vec::new();
                visit(id, by_id, &mut visiting, &mut visited, &mut path)?;
            }
        }
        Ok(())
    }
}
