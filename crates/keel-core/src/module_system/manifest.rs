use std::collections::BTreeMap;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::module_system::dependency::{ModuleDependency, RuntimeDependency};
use crate::module_system::version::VersionConstraint;

/// Capability key a module sets to allow its keyless service registrations
/// to be overridden by (or to override) another module's.
pub const CAPABILITY_ALLOW_OVERRIDE: &str = "allow-override";

/// Declarative description a module ships with.
///
/// Serialized as the `manifest.json` document in the module directory.
/// Shell-version and dependency bounds are inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleManifest {
    /// Stable unique identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Module version
    pub version: Version,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Filename of the primary binary, relative to the module directory
    #[serde(rename = "mainAssembly")]
    pub main_binary: String,

    /// Exported constructor symbol implementing the module contract
    pub entry_point: String,

    /// Lowest shell version the module runs on (inclusive)
    pub minimum_shell_version: Version,

    /// Highest shell version the module runs on (inclusive), or any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_shell_version: Option<Version>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ModuleDependency>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtime_dependencies: Vec<RuntimeDependency>,

    /// Platform tags the module supports; empty means any platform
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_platforms: Vec<String>,

    /// Free-form capability hints
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capabilities: BTreeMap<String, String>,
}

impl ModuleManifest {
    /// Create a minimal manifest; the remaining fields start empty.
    pub fn new(id: &str, name: &str, version: Version, entry_point: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            version,
            description: None,
            author: None,
            license: None,
            tags: Vec::new(),
            category: None,
            main_binary: format!("lib{}.so", id),
            entry_point: entry_point.to_string(),
            minimum_shell_version: Version::new(0, 1, 0),
            maximum_shell_version: None,
            dependencies: Vec::new(),
            runtime_dependencies: Vec::new(),
            supported_platforms: Vec::new(),
            capabilities: BTreeMap::new(),
        }
    }

    /// Parse a manifest document from JSON.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Serialize the manifest back to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Structural validation. Returns one message per violation; an empty
    /// list means the manifest is well-formed.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.id.trim().is_empty() {
            errors.push("manifest field 'id' must not be empty".to_string());
        }
        if self.name.trim().is_empty() {
            errors.push("manifest field 'name' must not be empty".to_string());
        }
        if self.main_binary.trim().is_empty() {
            errors.push("manifest field 'mainAssembly' must not be empty".to_string());
        }
        if self.entry_point.trim().is_empty() {
            errors.push("manifest field 'entryPoint' must not be empty".to_string());
        }
        if let Some(max) = &self.maximum_shell_version {
            if &self.minimum_shell_version > max {
                errors.push(format!(
                    "minimumShellVersion {} is greater than maximumShellVersion {}",
                    self.minimum_shell_version, max
                ));
            }
        }
        for dep in &self.dependencies {
            if dep.id.trim().is_empty() {
                errors.push("dependency with empty 'id'".to_string());
            }
            if let Some(max) = &dep.maximum_version {
                if &dep.minimum_version > max {
                    errors.push(format!(
                        "dependency '{}': minimumVersion {} is greater than maximumVersion {}",
                        dep.id, dep.minimum_version, max
                    ));
                }
            }
        }
        errors
    }

    /// The declared shell-version bounds as a constraint.
    ///
    /// Falls back to `>= minimum` when the bounds are inverted; `validate`
    /// reports that case separately.
    pub fn shell_constraint(&self) -> VersionConstraint {
        VersionConstraint::new(
            self.minimum_shell_version.clone(),
            self.maximum_shell_version.clone(),
        )
        .unwrap_or_else(|_| VersionConstraint::at_least(self.minimum_shell_version.clone()))
    }

    /// Whether the module accepts the given host version.
    pub fn is_compatible_with(&self, host_version: &Version) -> bool {
        self.shell_constraint().contains(host_version)
    }

    /// Whether the module supports the given platform tag. An empty
    /// `supportedPlatforms` list means any platform.
    pub fn supports_platform(&self, platform: &str) -> bool {
        self.supported_platforms.is_empty()
            || self.supported_platforms.iter().any(|p| p == platform)
    }

    /// Whether the manifest opts into keyless service overrides.
    pub fn allows_service_override(&self) -> bool {
        self.capabilities
            .get(CAPABILITY_ALLOW_OVERRIDE)
            .map(|v| v == "true")
            .unwrap_or(false)
    }
}

/// Builder for creating a module manifest
pub struct ManifestBuilder {
    manifest: ModuleManifest,
}

impl ManifestBuilder {
    pub fn new(id: &str, name: &str, version: Version) -> Self {
        let entry_point = format!("module_entry_{}", id.replace('-', "_"));
        Self {
            manifest: ModuleManifest::new(id, name, version, &entry_point),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.manifest.description = Some(description.to_string());
        self
    }

    pub fn author(mut self, author: &str) -> Self {
        self.manifest.author = Some(author.to_string());
        self
    }

    pub fn license(mut self, license: &str) -> Self {
        self.manifest.license = Some(license.to_string());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.manifest.category = Some(category.to_string());
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.manifest.tags.push(tag.to_string());
        self
    }

    pub fn main_binary(mut self, main_binary: &str) -> Self {
        self.manifest.main_binary = main_binary.to_string();
        self
    }

    pub fn entry_point(mut self, entry_point: &str) -> Self {
        self.manifest.entry_point = entry_point.to_string();
        self
    }

    pub fn shell_versions(mut self, minimum: Version, maximum: Option<Version>) -> Self {
        self.manifest.minimum_shell_version = minimum;
        self.manifest.maximum_shell_version = maximum;
        self
    }

    pub fn dependency(mut self, dependency: ModuleDependency) -> Self {
        self.manifest.dependencies.push(dependency);
        self
    }

    pub fn runtime_dependency(mut self, dependency: RuntimeDependency) -> Self {
        self.manifest.runtime_dependencies.push(dependency);
        self
    }

    pub fn platform(mut self, platform: &str) -> Self {
        self.manifest.supported_platforms.push(platform.to_string());
        self
    }

    pub fn capability(mut self, key: &str, value: &str) -> Self {
        self.manifest
            .capabilities
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> ModuleManifest {
        self.manifest
    }
}
