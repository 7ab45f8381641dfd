//! Keystone Core - module lifecycle management for host applications.
//!
//! This crate provides:
//! - The module data model (manifests, descriptors, persisted state)
//! - Package acquisition from disk, archives and the marketplace
//! - The lifecycle manager: install, upgrade, enable/disable, reset, uninstall
//! - Configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use keystone_core::{ImplementationCatalog, KeystoneConfig, ModuleManager};
//! use std::path::Path;
//!
//! fn main() -> keystone_core::Result<()> {
//!     let config = KeystoneConfig::load(Path::new("keystone.toml"))?;
//!     let manager = ModuleManager::from_config(&config, ImplementationCatalog::new())?;
//!     manager.install("mailalert")?;
//!     Ok(())
//! }
//! ```

pub mod acquisition;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod modules;

pub use acquisition::{
    AcquisitionError, AcquisitionService, LocalAcquisition, MarketplaceClient, MarketplaceError,
    MarketplaceModule,
};
pub use config::{ConfigError, KeystoneConfig, MarketplaceConfig, PermissionConfig};
pub use error::{LifecycleError, Result};
pub use lifecycle::{
    ActionLinker, ActionOptions, ActionSet, AllowAll, Batch, CacheDirInvalidator,
    CacheInvalidator, EventBus, EventKind, EventNotifier, INVALID_MODULE_MESSAGE, InstallSource,
    LifecycleEvent, ModuleAction, ModuleCollection, ModuleManager, ModuleNotifications,
    NO_DETAILS_MESSAGE, NoopInvalidator, NotificationBuckets, NotificationCounts, PermissionGate,
    PolicyGate, PrimaryAction, StepUpgradeRunner, TracingNotifier, UpgradeRunner,
    available_actions,
};
pub use modules::{
    DeclarativeHooks, FnMigration, HookError, HookResult, ImplementationCatalog, LifecycleHooks,
    LocalRegistry, MemoryStateStore, Migration, Module, ModuleDescriptor, ModuleManifest,
    ModuleRegistry, Origin, Resettable, SqliteStateStore, StateStore,
};
