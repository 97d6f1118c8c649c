#![cfg(test)]

use std::collections::HashSet;
use std::path::Path;

use semver::Version;

use crate::module_system::error::ModuleSystemError;
use crate::module_system::manifest::ManifestBuilder;
use crate::module_system::metadata::{
    read_binary_metadata, version_marker_symbol, BinaryMetadata,
};
use crate::module_system::validator::{HostContext, ModuleValidator};

#[test]
fn version_marker_encodes_dots_and_hyphens() {
    assert_eq!(
        version_marker_symbol(&Version::new(1, 2, 0)),
        "module_version_1_2_0"
    );
    assert_eq!(
        version_marker_symbol(&Version::parse("2.0.0-rc.1").unwrap()),
        "module_version_2_0_0_rc_1"
    );
}

#[test]
fn missing_binary_maps_to_binary_missing() {
    let err = read_binary_metadata(Path::new("/no/such/libmodule.so")).unwrap_err();
    assert!(matches!(err, ModuleSystemError::BinaryMissing { .. }));
}

#[test]
fn unparseable_binary_maps_to_incoherent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("libgarbage.so");
    std::fs::write(&path, b"this is not an object file").unwrap();

    let err = read_binary_metadata(&path).unwrap_err();
    assert!(matches!(err, ModuleSystemError::BinaryIncoherent { .. }));
}

fn metadata(symbols: &[&str]) -> BinaryMetadata {
    let exported_symbols: HashSet<String> = symbols.iter().map(|s| s.to_string()).collect();
    let mut entry_points: Vec<String> = exported_symbols
        .iter()
        .filter(|s| s.starts_with("module_entry_"))
        .cloned()
        .collect();
    entry_points.sort();
    let declared_version = if symbols.contains(&"module_version_1_0_0") {
        Some(Version::new(1, 0, 0))
    } else {
        None
    };
    BinaryMetadata {
        file_name: "libx.so".to_string(),
        declared_version,
        entry_points,
        exported_symbols,
    }
}

fn validator() -> ModuleValidator {
    ModuleValidator::new(HostContext {
        shell_version: Version::new(1, 0, 0),
        platform: "linux".to_string(),
    })
}

#[test]
fn corroborate_accepts_matching_binary() {
    let manifest = ManifestBuilder::new("x", "X", Version::new(1, 0, 0))
        .entry_point("module_entry_x")
        .shell_versions(Version::new(0, 1, 0), None)
        .build();
    let meta = metadata(&["module_entry_x", "module_version_1_0_0"]);

    let result = validator().corroborate(&manifest, &meta);
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn corroborate_rejects_missing_entry_point() {
    let manifest = ManifestBuilder::new("x", "X", Version::new(1, 0, 0))
        .entry_point("module_entry_x")
        .build();
    let meta = metadata(&["module_entry_other", "module_version_1_0_0"]);

    let result = validator().corroborate(&manifest, &meta);
    assert!(!result.is_valid());
    assert!(result.errors[0].contains("module_entry_x"));
}

#[test]
fn corroborate_rejects_version_mismatch() {
    let manifest = ManifestBuilder::new("x", "X", Version::new(2, 0, 0))
        .entry_point("module_entry_x")
        .build();
    let meta = metadata(&["module_entry_x", "module_version_1_0_0"]);

    let result = validator().corroborate(&manifest, &meta);
    assert!(!result.is_valid());
    assert!(result.errors[0].contains("declares version 1.0.0"));
}

#[test]
fn absent_version_marker_is_a_warning() {
    let manifest = ManifestBuilder::new("x", "X", Version::new(1, 0, 0))
        .entry_point("module_entry_x")
        .build();
    let meta = metadata(&["module_entry_x"]);

    let result = validator().corroborate(&manifest, &meta);
    assert!(result.is_valid());
    assert!(result.warnings[0].contains("no version marker"));
}
