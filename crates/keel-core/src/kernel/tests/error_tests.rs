#![cfg(test)]

use crate::config::ConfigError;
use crate::kernel::error::{
    Error, EXIT_CONFIG_INVALID, EXIT_GRAPH_INVALID, EXIT_MODULES_FAILED,
};
use crate::module_system::error::ModuleSystemError;
use crate::module_system::lifecycle::LifecycleStage;

#[test]
fn config_errors_exit_with_one() {
    let err = Error::Config(ConfigError::InvalidValue {
        key: "plugin.failurePolicy".to_string(),
        message: "unknown".to_string(),
    });
    assert_eq!(err.exit_code(), EXIT_CONFIG_INVALID);
}

#[test]
fn graph_errors_exit_with_two() {
    let err = Error::ModuleSystem(ModuleSystemError::GraphInvalid {
        errors: vec!["cycle".to_string()],
    });
    assert_eq!(err.exit_code(), EXIT_GRAPH_INVALID);

    let err = Error::ModuleSystem(ModuleSystemError::ServiceGraphInvalid {
        errors: vec!["lifetime".to_string()],
    });
    assert_eq!(err.exit_code(), EXIT_GRAPH_INVALID);
}

#[test]
fn module_failures_exit_with_three() {
    let err = Error::ModuleSystem(ModuleSystemError::ModuleThrew {
        module_id: "a".to_string(),
        stage: LifecycleStage::Start,
        message: "boom".to_string(),
    });
    assert_eq!(err.exit_code(), EXIT_MODULES_FAILED);
}
