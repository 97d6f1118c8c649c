#![cfg(test)]

use std::path::PathBuf;

use semver::Version;

use crate::module_system::dependency::ModuleDependency;
use crate::module_system::discovery::DiscoveredModule;
use crate::module_system::manifest::{ManifestBuilder, ModuleManifest};
use crate::module_system::validator::{HostContext, ModuleValidator};

fn host(version: &str) -> HostContext {
    HostContext {
        shell_version: Version::parse(version).unwrap(),
        platform: "linux".to_string(),
    }
}

fn discovered(manifest: ModuleManifest) -> DiscoveredModule {
    let root_dir = PathBuf::from("/modules").join(&manifest.id);
    let main_binary_path = root_dir.join(&manifest.main_binary);
    DiscoveredModule {
        manifest,
        root_dir,
        main_binary_path,
    }
}

fn module(id: &str, version: &str, deps: Vec<ModuleDependency>) -> DiscoveredModule {
    let mut builder = ManifestBuilder::new(id, id, Version::parse(version).unwrap())
        .shell_versions(Version::new(0, 1, 0), None);
    for dep in deps {
        builder = builder.dependency(dep);
    }
    discovered(builder.build())
}

#[test]
fn shell_version_outside_bounds_is_an_error() {
    let validator = ModuleValidator::new(host("1.5.0"));
    let manifest = ManifestBuilder::new("a", "A", Version::new(1, 0, 0))
        .shell_versions(Version::new(2, 0, 0), None)
        .build();

    let result = validator.validate_compatibility(&manifest);
    assert!(!result.is_valid());
    assert!(result.errors[0].contains("requires shell"));
}

#[test]
fn platform_mismatch_is_an_error() {
    let validator = ModuleValidator::new(host("1.5.0"));
    let manifest = ManifestBuilder::new("a", "A", Version::new(1, 0, 0))
        .shell_versions(Version::new(1, 0, 0), None)
        .platform("windows")
        .build();

    let result = validator.validate_compatibility(&manifest);
    assert!(!result.is_valid());
    assert!(result.errors[0].contains("platform"));
}

#[test]
fn compatible_module_passes() {
    let validator = ModuleValidator::new(host("1.2.0"));
    let manifest = ManifestBuilder::new("a", "A", Version::new(1, 0, 0))
        .shell_versions(Version::new(1, 0, 0), None)
        .build();

    assert!(validator.validate_manifest(&manifest).is_valid());
    assert!(validator.validate_compatibility(&manifest).is_valid());
}

#[test]
fn graph_rejects_cycles_with_full_path() {
    let validator = ModuleValidator::new(host("1.0.0"));
    let a = module(
        "a",
        "1.0.0",
        vec![ModuleDependency::required("b", Version::new(1, 0, 0))],
    );
    let b = module(
        "b",
        "1.0.0",
        vec![ModuleDependency::required("a", Version::new(1, 0, 0))],
    );

    let result = validator.validate_graph(&[a, b]);
    assert!(!result.is_valid());
    let cycle = result
        .errors
        .iter()
        .find(|e| e.contains("Circular"))
        .expect("cycle error");
    assert!(cycle.contains("a -> b -> a") || cycle.contains("b -> a -> b"), "{cycle}");
}

#[test]
fn graph_rejects_duplicate_ids() {
    let validator = ModuleValidator::new(host("1.0.0"));
    let first = module("dup", "1.0.0", vec![]);
    let second = module("dup", "1.0.0", vec![]);

    let result = validator.validate_graph(&[first, second]);
    assert!(result.errors.iter().any(|e| e.contains("Duplicate")));
}

#[test]
fn missing_required_dependency_is_an_error() {
    let validator = ModuleValidator::new(host("1.0.0"));
    let a = module(
        "a",
        "1.0.0",
        vec![ModuleDependency::required("ghost", Version::new(1, 0, 0))],
    );

    let result = validator.validate_graph(&[a]);
    assert!(!result.is_valid());
    assert!(result.errors[0].contains("ghost"));
}

#[test]
fn missing_optional_dependency_is_a_warning() {
    let validator = ModuleValidator::new(host("1.0.0"));
    let a = module(
        "a",
        "1.0.0",
        vec![ModuleDependency::optional("ghost", Version::new(1, 0, 0))],
    );

    let result = validator.validate_graph(&[a]);
    assert!(result.is_valid());
    assert!(result.warnings[0].contains("ghost"));
}

#[test]
fn unsatisfied_version_range_is_an_error() {
    let validator = ModuleValidator::new(host("1.0.0"));
    let a = module(
        "a",
        "1.0.0",
        vec![ModuleDependency::required("b", Version::new(2, 0, 0))],
    );
    let b = module("b", "1.0.0", vec![]);

    let result = validator.validate_graph(&[a, b]);
    assert!(!result.is_valid());
    assert!(result.errors[0].contains("requires 'b'"));
}

#[test]
fn satisfied_graph_is_valid() {
    let validator = ModuleValidator::new(host("1.0.0"));
    let a = module(
        "a",
        "1.0.0",
        vec![ModuleDependency::required("b", Version::new(1, 0, 0))
            .up_to(Version::new(1, 9, 0))],
    );
    let b = module("b", "1.4.0", vec![]);

    let result = validator.validate_graph(&[a, b]);
    assert!(result.is_valid(), "{:?}", result.errors);
}

#[test]
fn missing_binary_is_reported_by_module_validation() {
    let validator = ModuleValidator::new(host("1.0.0"));
    let a = module("a", "1.0.0", vec![]);

    let result = validator.validate_module(&a);
    assert!(!result.is_valid());
    assert!(result.errors[0].contains("not found"));
}
