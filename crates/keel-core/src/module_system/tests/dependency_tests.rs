#![cfg(test)]

use semver::Version;

use crate::module_system::dependency::{DependencyError, ModuleDependency};

#[test]
fn satisfied_within_bounds() {
    let dep = ModuleDependency::required("storage", Version::new(1, 2, 0))
        .up_to(Version::new(1, 9, 0));

    assert!(dep.is_satisfied_by(&Version::new(1, 2, 0)));
    assert!(dep.is_satisfied_by(&Version::new(1, 9, 0)));
    assert!(!dep.is_satisfied_by(&Version::new(1, 1, 9)));
    assert!(!dep.is_satisfied_by(&Version::new(2, 0, 0)));
}

#[test]
fn open_ended_dependency_accepts_newer_versions() {
    let dep = ModuleDependency::required("storage", Version::new(1, 0, 0));
    assert!(dep.is_satisfied_by(&Version::new(7, 0, 0)));
}

#[test]
fn inverted_bounds_never_satisfy() {
    let dep = ModuleDependency::required("storage", Version::new(2, 0, 0))
        .up_to(Version::new(1, 0, 0));
    assert!(!dep.is_satisfied_by(&Version::new(1, 5, 0)));
    assert!(dep.constraint().is_err());
}

#[test]
fn optional_flag_survives_construction() {
    let dep = ModuleDependency::optional("metrics", Version::new(0, 5, 0));
    assert!(!dep.required);
    assert!(dep.to_string().contains("optionally uses"));
}

#[test]
fn display_renders_bounds() {
    let dep = ModuleDependency::required("auth", Version::new(1, 0, 0))
        .up_to(Version::new(2, 0, 0));
    assert_eq!(dep.to_string(), "requires auth >=1.0.0, <=2.0.0");
}

#[test]
fn cycle_error_renders_full_path() {
    let err = DependencyError::CyclicDependency(vec![
        "a".to_string(),
        "b".to_string(),
        "a".to_string(),
    ]);
    assert_eq!(
        err.to_string(),
        "Circular module dependency: a -> b -> a"
    );
}
