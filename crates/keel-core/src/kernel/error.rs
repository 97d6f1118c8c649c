//! Kernel-level errors.
//!
//! [`Error`] wraps the subsystem error types and carries the mapping to
//! the process exit codes drivers use: 0 normal, 1 configuration invalid,
//! 2 graph invalid, 3 required modules failed.

use thiserror::Error as ThisError;

use crate::config::ConfigError;
use crate::module_system::error::ModuleSystemError;
use crate::services::ServiceGraphError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Module system error: {0}")]
    ModuleSystem(#[from] ModuleSystemError),

    #[error("Service graph error: {0}")]
    ServiceGraph(#[from] ServiceGraphError),

    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with the kernel error type
pub type Result<T> = std::result::Result<T, Error>;

pub const EXIT_OK: i32 = 0;
pub const EXIT_CONFIG_INVALID: i32 = 1;
pub const EXIT_GRAPH_INVALID: i32 = 2;
pub const EXIT_MODULES_FAILED: i32 = 3;

impl Error {
    /// Exit code for process drivers wrapping the core.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => EXIT_CONFIG_INVALID,
            Error::ModuleSystem(ModuleSystemError::GraphInvalid { .. })
            | Error::ModuleSystem(ModuleSystemError::ServiceGraphInvalid { .. })
            | Error::ModuleSystem(ModuleSystemError::Dependency(_))
            | Error::ServiceGraph(_) => EXIT_GRAPH_INVALID,
            Error::ModuleSystem(_) => EXIT_MODULES_FAILED,
            Error::Other(_) => EXIT_MODULES_FAILED,
        }
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Other(message)
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Other(message.to_string())
    }
}
