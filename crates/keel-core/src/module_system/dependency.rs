use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::module_system::version::{VersionConstraint, VersionError};

/// A declared dependency on another module.
///
/// Version bounds are inclusive on both ends; see
/// [`VersionConstraint`](crate::module_system::version::VersionConstraint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDependency {
    /// Identifier of the required module
    pub id: String,

    /// Lowest acceptable version (inclusive)
    pub minimum_version: Version,

    /// Highest acceptable version (inclusive), or any when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_version: Option<Version>,

    /// Hard requirement or optional dependency
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl ModuleDependency {
    /// Create a required dependency on `id` at or above `minimum_version`.
    pub fn required(id: &str, minimum_version: Version) -> Self {
        Self {
            id: id.to_string(),
            minimum_version,
            maximum_version: None,
            required: true,
        }
    }

    /// Create an optional dependency on `id` at or above `minimum_version`.
    pub fn optional(id: &str, minimum_version: Version) -> Self {
        Self {
            id: id.to_string(),
            minimum_version,
            maximum_version: None,
            required: false,
        }
    }

    /// Restrict the dependency to an inclusive maximum version.
    pub fn up_to(mut self, maximum_version: Version) -> Self {
        self.maximum_version = Some(maximum_version);
        self
    }

    /// The declared bounds as a constraint, or an error when inverted.
    pub fn constraint(&self) -> Result<VersionConstraint, VersionError> {
        VersionConstraint::new(self.minimum_version.clone(), self.maximum_version.clone())
    }

    /// Whether a concrete `version` of the target module satisfies this
    /// dependency.
    pub fn is_satisfied_by(&self, version: &Version) -> bool {
        match self.constraint() {
            Ok(constraint) => constraint.contains(version),
            Err(_) => false,
        }
    }
}

impl fmt::Display for ModuleDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.required { "requires" } else { "optionally uses" };
        match &self.maximum_version {
            Some(max) => write!(f, "{} {} >={}, <={}", kind, self.id, self.minimum_version, max),
            None => write!(f, "{} {} >={}", kind, self.id, self.minimum_version),
        }
    }
}

/// An external package the module expects to find at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeDependency {
    pub package_id: String,
    pub version: String,
    #[serde(default)]
    pub optional: bool,
}

/// Error that can occur when resolving the module dependency graph
#[derive(Debug, Clone, Error)]
pub enum DependencyError {
    /// The required module was not found in the candidate set
    #[error("Required module not found: '{0}'")]
    MissingModule(String),

    /// The module was found but no candidate version satisfies the bounds
    #[error("Module '{module_id}' requires '{dependency_id}' {constraint}, but found version {actual}")]
    UnsatisfiedVersion {
        module_id: String,
        dependency_id: String,
        constraint: String,
        actual: Version,
    },

    /// Dependency cycle, reported with the full path
    #[error("Circular module dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    /// Two candidates share the same id
    #[error("Duplicate module id '{0}' in candidate set")]
    DuplicateId(String),
}
