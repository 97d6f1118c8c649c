//! # keel-core
//!
//! Core library of the Keel modular application host. A Keel process
//! loads independently-built modules at runtime, validates them against
//! the host version and each other, merges their service registrations
//! into one validated container, and drives their lifecycles in
//! dependency order while keeping each module's failures its own.

pub mod config;
pub mod kernel;
pub mod module_system;
pub mod services;

pub use kernel::{Error, Result, ShellApplication};
pub use module_system::{ModuleManager, ShellModule};
pub use services::{ServiceCollection, ServiceProvider};
