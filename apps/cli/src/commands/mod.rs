//! Command implementations for the Keystone CLI.

pub mod config;
pub mod module;
pub mod types;

pub use types::ModuleCommand;
