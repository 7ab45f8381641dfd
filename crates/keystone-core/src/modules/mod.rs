//! Module data model: manifests, descriptors, hooks, persisted state and the
//! registry that ties them together.

pub mod builder;
pub mod descriptor;
pub mod hooks;
pub mod manifest;
pub mod origin;
pub mod registry;
pub mod store;

pub use builder::ModuleBuilder;
pub use descriptor::{
    Capabilities, DatabaseState, DiskState, Module, ModuleAttributes, ModuleDescriptor,
    ModuleInstance,
};
pub use hooks::{
    DeclarativeHooks, FnMigration, HookError, HookResult, ImplementationCatalog, LifecycleHooks,
    Migration, Resettable,
};
pub use manifest::{MANIFEST_FILE, ManifestError, ModuleKind, ModuleManifest, is_valid_module_name};
pub use origin::Origin;
pub use registry::{LocalRegistry, ModuleRegistry, RegistryError};
pub use store::{MemoryStateStore, ModuleRecord, SqliteStateStore, StateStore, StoreError};
