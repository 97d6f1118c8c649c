#![cfg(test)]

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::module_system::discovery::ModuleDiscovery;

fn write_module(root: &Path, dir: &str, id: &str, version: &str) {
    let module_dir = root.join(dir);
    fs::create_dir_all(&module_dir).unwrap();
    let manifest = format!(
        r#"{{
            "id": "{id}",
            "name": "{id}",
            "version": "{version}",
            "mainAssembly": "lib{id}.so",
            "entryPoint": "module_entry_{id}",
            "minimumShellVersion": "0.1.0"
        }}"#
    );
    fs::write(module_dir.join("manifest.json"), manifest).unwrap();
}

#[tokio::test]
async fn finds_modules_in_immediate_subdirectories() {
    let root = TempDir::new().unwrap();
    write_module(root.path(), "alpha", "alpha", "1.0.0");
    write_module(root.path(), "beta", "beta", "2.1.0");
    fs::create_dir_all(root.path().join("empty")).unwrap();

    let discovery = ModuleDiscovery::new(vec![root.path().to_path_buf()]);
    let report = discovery.discover().await.unwrap();

    let ids: HashSet<&str> = report.modules.iter().map(|m| m.id()).collect();
    assert_eq!(ids, HashSet::from(["alpha", "beta"]));
    for module in &report.modules {
        assert_eq!(
            module.main_binary_path,
            module.root_dir.join(format!("lib{}.so", module.id()))
        );
    }
}

#[tokio::test]
async fn nested_modules_need_a_deeper_scan() {
    let root = TempDir::new().unwrap();
    write_module(root.path(), "group/nested", "nested", "1.0.0");

    let shallow = ModuleDiscovery::new(vec![root.path().to_path_buf()]);
    let report = shallow.discover().await.unwrap();
    assert!(report.modules.is_empty());

    let deep = ModuleDiscovery::new(vec![root.path().to_path_buf()]).with_max_depth(2);
    let report = deep.discover().await.unwrap();
    assert_eq!(report.modules.len(), 1);
    assert_eq!(report.modules[0].id(), "nested");
}

#[tokio::test]
async fn malformed_manifest_is_a_warning_not_an_abort() {
    let root = TempDir::new().unwrap();
    write_module(root.path(), "good", "good", "1.0.0");

    let bad_dir = root.path().join("bad");
    fs::create_dir_all(&bad_dir).unwrap();
    fs::write(bad_dir.join("manifest.json"), "{ not json").unwrap();

    let discovery = ModuleDiscovery::new(vec![root.path().to_path_buf()]);
    let report = discovery.discover().await.unwrap();

    assert_eq!(report.modules.len(), 1);
    assert_eq!(report.modules[0].id(), "good");
    assert!(report.warnings.iter().any(|w| w.contains("bad")));
}

#[tokio::test]
async fn structurally_invalid_manifest_is_skipped() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("noentry");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("manifest.json"),
        r#"{"id": "noentry", "name": "No Entry", "version": "1.0.0",
            "mainAssembly": "lib.so", "entryPoint": "", "minimumShellVersion": "0.1.0"}"#,
    )
    .unwrap();

    let discovery = ModuleDiscovery::new(vec![root.path().to_path_buf()]);
    let report = discovery.discover().await.unwrap();
    assert!(report.modules.is_empty());
    assert!(report.warnings.iter().any(|w| w.contains("entryPoint")));
}

#[tokio::test]
async fn duplicates_by_id_and_version_are_reported() {
    let root = TempDir::new().unwrap();
    write_module(root.path(), "first", "dup", "1.0.0");
    write_module(root.path(), "second", "dup", "1.0.0");
    // A different version of the same id is not a duplicate.
    write_module(root.path(), "third", "dup", "2.0.0");

    let discovery = ModuleDiscovery::new(vec![root.path().to_path_buf()]);
    let report = discovery.discover().await.unwrap();

    assert_eq!(report.modules.len(), 2);
    assert!(report.warnings.iter().any(|w| w.contains("Duplicate")));
}

#[tokio::test]
async fn repeated_discovery_yields_equal_sets() {
    let root = TempDir::new().unwrap();
    write_module(root.path(), "alpha", "alpha", "1.0.0");
    write_module(root.path(), "beta", "beta", "2.0.0");

    let discovery = ModuleDiscovery::new(vec![root.path().to_path_buf()]);
    let first = discovery.discover().await.unwrap();
    let second = discovery.discover().await.unwrap();

    let key = |report: &crate::module_system::discovery::DiscoveryReport| -> HashSet<(String, String)> {
        report
            .modules
            .iter()
            .map(|m| (m.manifest.id.clone(), m.manifest.version.to_string()))
            .collect()
    };
    assert_eq!(key(&first), key(&second));
}

#[tokio::test]
async fn missing_root_is_a_warning() {
    let discovery = ModuleDiscovery::new(vec!["/definitely/not/here".into()]);
    let report = discovery.discover().await.unwrap();
    assert!(report.modules.is_empty());
    assert!(report.warnings.iter().any(|w| w.contains("does not exist")));
}
