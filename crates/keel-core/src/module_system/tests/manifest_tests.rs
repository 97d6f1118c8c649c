#![cfg(test)]

use semver::Version;

use crate::module_system::dependency::ModuleDependency;
use crate::module_system::manifest::{ManifestBuilder, ModuleManifest};

const SAMPLE: &str = r#"{
    "id": "inventory",
    "name": "Inventory",
    "version": "1.4.0",
    "description": "Tracks stock levels",
    "author": "Acme",
    "mainAssembly": "libinventory.so",
    "entryPoint": "module_entry_inventory",
    "minimumShellVersion": "1.0.0",
    "maximumShellVersion": "2.0.0",
    "dependencies": [
        { "id": "storage", "minimumVersion": "1.2.0" },
        { "id": "metrics", "minimumVersion": "0.5.0", "required": false }
    ],
    "runtimeDependencies": [
        { "packageId": "openssl", "version": "3.0" }
    ],
    "supportedPlatforms": ["linux", "macos"],
    "tags": ["inventory", "warehouse"],
    "category": "business",
    "capabilities": { "allow-override": "true" }
}"#;

#[test]
fn parses_full_document() {
    let manifest = ModuleManifest::from_json(SAMPLE).unwrap();
    assert_eq!(manifest.id, "inventory");
    assert_eq!(manifest.version, Version::new(1, 4, 0));
    assert_eq!(manifest.main_binary, "libinventory.so");
    assert_eq!(manifest.entry_point, "module_entry_inventory");
    assert_eq!(manifest.minimum_shell_version, Version::new(1, 0, 0));
    assert_eq!(manifest.maximum_shell_version, Some(Version::new(2, 0, 0)));
    assert_eq!(manifest.dependencies.len(), 2);
    assert_eq!(manifest.runtime_dependencies[0].package_id, "openssl");
    assert_eq!(manifest.supported_platforms, vec!["linux", "macos"]);
    assert!(manifest.allows_service_override());
}

#[test]
fn dependency_required_defaults_to_true() {
    let manifest = ModuleManifest::from_json(SAMPLE).unwrap();
    let storage = &manifest.dependencies[0];
    assert!(storage.required);
    let metrics = &manifest.dependencies[1];
    assert!(!metrics.required);
}

#[test]
fn json_round_trip_preserves_equality() {
    let manifest = ManifestBuilder::new("inventory", "Inventory", Version::new(1, 4, 0))
        .description("Tracks stock levels")
        .author("Acme")
        .license("MIT")
        .category("business")
        .tag("inventory")
        .main_binary("libinventory.so")
        .shell_versions(Version::new(1, 0, 0), Some(Version::new(2, 0, 0)))
        .dependency(
            ModuleDependency::required("storage", Version::new(1, 2, 0))
                .up_to(Version::new(1, 9, 0)),
        )
        .platform("linux")
        .capability("allow-override", "true")
        .build();

    let rendered = manifest.to_json().unwrap();
    let reparsed = ModuleManifest::from_json(&rendered).unwrap();
    assert_eq!(manifest, reparsed);
}

#[test]
fn missing_required_field_fails_to_parse() {
    // No entryPoint.
    let doc = r#"{
        "id": "x", "name": "X", "version": "1.0.0",
        "mainAssembly": "libx.so", "minimumShellVersion": "1.0.0"
    }"#;
    assert!(ModuleManifest::from_json(doc).is_err());
}

#[test]
fn unparseable_version_fails_to_parse() {
    let doc = r#"{
        "id": "x", "name": "X", "version": "one point oh",
        "mainAssembly": "libx.so", "entryPoint": "module_entry_x",
        "minimumShellVersion": "1.0.0"
    }"#;
    assert!(ModuleManifest::from_json(doc).is_err());
}

#[test]
fn validate_flags_empty_fields_and_inverted_bounds() {
    let mut manifest = ManifestBuilder::new("x", "X", Version::new(1, 0, 0)).build();
    manifest.id = "  ".to_string();
    manifest.entry_point = String::new();
    manifest.minimum_shell_version = Version::new(3, 0, 0);
    manifest.maximum_shell_version = Some(Version::new(2, 0, 0));
    manifest.dependencies.push(
        ModuleDependency::required("dep", Version::new(2, 0, 0)).up_to(Version::new(1, 0, 0)),
    );

    let errors = manifest.validate();
    assert!(errors.iter().any(|e| e.contains("'id'")));
    assert!(errors.iter().any(|e| e.contains("'entryPoint'")));
    assert!(errors.iter().any(|e| e.contains("minimumShellVersion")));
    assert!(errors.iter().any(|e| e.contains("dependency 'dep'")));
}

#[test]
fn shell_compatibility_is_inclusive() {
    let manifest = ManifestBuilder::new("x", "X", Version::new(1, 0, 0))
        .shell_versions(Version::new(1, 0, 0), Some(Version::new(2, 0, 0)))
        .build();

    assert!(manifest.is_compatible_with(&Version::new(1, 0, 0)));
    assert!(manifest.is_compatible_with(&Version::new(1, 2, 0)));
    assert!(manifest.is_compatible_with(&Version::new(2, 0, 0)));
    assert!(!manifest.is_compatible_with(&Version::new(2, 0, 1)));
    assert!(!manifest.is_compatible_with(&Version::new(0, 9, 0)));
}

#[test]
fn empty_platform_list_means_any() {
    let manifest = ManifestBuilder::new("x", "X", Version::new(1, 0, 0)).build();
    assert!(manifest.supports_platform("linux"));
    assert!(manifest.supports_platform("anything"));

    let restricted = ManifestBuilder::new("y", "Y", Version::new(1, 0, 0))
        .platform("linux")
        .build();
    assert!(restricted.supports_platform("linux"));
    assert!(!restricted.supports_platform("windows"));
}

#[test]
fn builder_defaults_derive_entry_point_from_id() {
    let manifest = ManifestBuilder::new("status-echo", "Status Echo", Version::new(0, 1, 0)).build();
    assert_eq!(manifest.entry_point, "module_entry_status_echo");
    assert_eq!(manifest.main_binary, "libstatus-echo.so");
    assert!(manifest.validate().is_empty());
}
