//! Module descriptors and the hook-carrying module handle.

use crate::modules::hooks::{HookResult, LifecycleHooks};
use crate::modules::manifest::ModuleManifest;
use crate::modules::origin::Origin;
use crate::modules::store::{ModuleRecord, StateStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// What is known about a module's files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskState {
    /// Whether the module directory holds a manifest.
    pub present: bool,
    /// Manifest modification time in unix seconds, 0 when absent.
    pub filemtime: i64,
    /// Module directory.
    pub path: PathBuf,
    /// Whether an implementation loaded for the module.
    pub valid: bool,
    /// Version declared on disk.
    pub version: Option<String>,
}

impl DiskState {
    /// State for a module with no files at `path`.
    pub fn absent(path: PathBuf) -> Self {
        Self { present: false, filemtime: 0, path, valid: false, version: None }
    }
}

/// What the state store knows about a module.
///
/// `installed == false` implies both activation flags are false.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseState {
    /// Whether a record exists.
    pub installed: bool,
    /// Primary activation flag.
    pub active: bool,
    /// Variant activation flag.
    pub active_on_variant: bool,
    /// Installed version.
    pub version: Option<String>,
}

impl DatabaseState {
    /// State of a module that is not installed.
    pub fn not_installed() -> Self {
        Self::default()
    }

    /// Derives the state from an optional record.
    pub fn from_record(record: Option<&ModuleRecord>) -> Self {
        match record {
            Some(record) => Self {
                installed: true,
                active: record.active,
                active_on_variant: record.active_on_variant,
                version: record.version.clone(),
            },
            None => Self::not_installed(),
        }
    }
}

/// Attributes copied from the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleAttributes {
    pub display_name: String,
    pub description: String,
    pub author: String,
    pub tab: Option<String>,
    pub warning: Option<String>,
    pub need_instance: bool,
    pub confirm_uninstall: Option<String>,
    pub limited_countries: Vec<String>,
}

impl ModuleAttributes {
    /// Copies the operator-facing attributes of a manifest.
    pub fn from_manifest(manifest: &ModuleManifest) -> Self {
        Self {
            display_name: manifest.display_name().to_string(),
            description: manifest.description.clone(),
            author: manifest.author.clone(),
            tab: manifest.tab.clone(),
            warning: manifest.warning.clone(),
            need_instance: manifest.need_instance,
            confirm_uninstall: manifest.confirm_uninstall.clone(),
            limited_countries: manifest.limited_countries.clone(),
        }
    }
}

/// Flags derived once when the descriptor is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub is_configurable: bool,
    pub is_payment_module: bool,
    pub can_be_upgraded: bool,
    pub can_be_upgraded_from_marketplace: bool,
}

impl Capabilities {
    /// Computes the upgrade capabilities from disk and database state.
    pub fn compute(
        disk: &DiskState,
        database: &DatabaseState,
        origin: Origin,
        is_configurable: bool,
        is_payment_module: bool,
    ) -> Self {
        let can_be_upgraded = database.installed
            && disk.present
            && is_newer(disk.version.as_deref(), database.version.as_deref());

        Self {
            is_configurable,
            is_payment_module,
            can_be_upgraded,
            can_be_upgraded_from_marketplace: origin.allows_marketplace_upgrade(),
        }
    }
}

/// Whether `candidate` is a strictly newer semver than `current`.
fn is_newer(candidate: Option<&str>, current: Option<&str>) -> bool {
    let (Some(candidate), Some(current)) = (candidate, current) else {
        return false;
    };
    match (semver::Version::parse(candidate), semver::Version::parse(current)) {
        (Ok(candidate), Ok(current)) => candidate > current,
        _ => false,
    }
}

/// Canonical in-memory description of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub disk: DiskState,
    pub database: DatabaseState,
    pub origin: Origin,
    pub attributes: ModuleAttributes,
    pub capabilities: Capabilities,
}

impl ModuleDescriptor {
    /// Version to display: installed version, else the one on disk.
    pub fn version(&self) -> Option<&str> {
        self.database.version.as_deref().or(self.disk.version.as_deref())
    }
}

/// The implementation backing a module.
#[derive(Clone)]
pub enum ModuleInstance {
    /// Implementation loaded.
    Valid(Arc<dyn LifecycleHooks>),
    /// Implementation missing or broken.
    Invalid {
        /// Why loading failed.
        reason: String,
    },
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid(_) => f.write_str("Valid(..)"),
            Self::Invalid { reason } => f.debug_struct("Invalid").field("reason", reason).finish(),
        }
    }
}

/// A resolved module: descriptor, implementation and state handle.
///
/// The `on_*` wrappers call the implementation and persist the resulting
/// state only when the hook reported success. An invalid instance makes
/// every wrapper return `Ok(false)` without touching state.
#[derive(Clone)]
pub struct Module {
    descriptor: ModuleDescriptor,
    instance: ModuleInstance,
    store: Arc<dyn StateStore>,
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("descriptor", &self.descriptor)
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

impl Module {
    /// Assembles a module.
    pub fn new(
        descriptor: ModuleDescriptor,
        instance: ModuleInstance,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self { descriptor, instance, store }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn instance(&self) -> &ModuleInstance {
        &self.instance
    }

    pub fn has_valid_instance(&self) -> bool {
        matches!(self.instance, ModuleInstance::Valid(_))
    }

    /// The loaded implementation, if any.
    pub fn hooks(&self) -> Option<&Arc<dyn LifecycleHooks>> {
        match &self.instance {
            ModuleInstance::Valid(hooks) => Some(hooks),
            ModuleInstance::Invalid { .. } => None,
        }
    }

    /// Whether the implementation exposes a reset capability.
    pub fn supports_reset(&self) -> bool {
        self.hooks().is_some_and(|hooks| hooks.as_resettable().is_some())
    }

    fn valid_hooks(&self) -> Option<Arc<dyn LifecycleHooks>> {
        self.hooks().cloned()
    }

    fn refresh_database(&mut self) -> HookResult {
        let record = self.store.get(&self.descriptor.name)?;
        self.descriptor.database = DatabaseState::from_record(record.as_ref());
        Ok(true)
    }

    pub fn on_install(&mut self) -> HookResult {
        let Some(hooks) = self.valid_hooks() else {
            return Ok(false);
        };
        if !hooks.install()? {
            return Ok(false);
        }
        let record = self.store.insert(&self.descriptor.name, self.descriptor.disk.version.as_deref())?;
        self.descriptor.database = DatabaseState::from_record(Some(&record));
        debug!(module = %self.descriptor.name, "Install hook succeeded");
        Ok(true)
    }

    pub fn on_post_install(&mut self) -> HookResult {
        match self.valid_hooks() {
            Some(hooks) => hooks.post_install(),
            None => Ok(false),
        }
    }

    pub fn on_uninstall(&mut self) -> HookResult {
        let Some(hooks) = self.valid_hooks() else {
            return Ok(false);
        };
        if !hooks.uninstall()? {
            return Ok(false);
        }
        self.store.remove(&self.descriptor.name)?;
        self.descriptor.database = DatabaseState::not_installed();
        Ok(true)
    }

    pub fn on_upgrade(&mut self, version: &str) -> HookResult {
        let Some(hooks) = self.valid_hooks() else {
            return Ok(false);
        };
        if !hooks.upgrade(version)? {
            return Ok(false);
        }
        if let Some(disk_version) = self.descriptor.disk.version.clone() {
            self.store.set_version(&self.descriptor.name, &disk_version)?;
        }
        self.refresh_database()
    }

    pub fn on_enable(&mut self) -> HookResult {
        let Some(hooks) = self.valid_hooks() else {
            return Ok(false);
        };
        if !hooks.enable()? {
            return Ok(false);
        }
        self.store.set_active(&self.descriptor.name, true)?;
        self.refresh_database()
    }

    pub fn on_disable(&mut self) -> HookResult {
        let Some(hooks) = self.valid_hooks() else {
            return Ok(false);
        };
        if !hooks.disable()? {
            return Ok(false);
        }
        self.store.set_active(&self.descriptor.name, false)?;
        self.refresh_database()
    }

    pub fn on_variant_enable(&mut self) -> HookResult {
        let Some(hooks) = self.valid_hooks() else {
            return Ok(false);
        };
        if !hooks.enable_variant()? {
            return Ok(false);
        }
        self.store.set_active_on_variant(&self.descriptor.name, true)?;
        self.refresh_database()
    }

    pub fn on_variant_disable(&mut self) -> HookResult {
        let Some(hooks) = self.valid_hooks() else {
            return Ok(false);
        };
        if !hooks.disable_variant()? {
            return Ok(false);
        }
        self.store.set_active_on_variant(&self.descriptor.name, false)?;
        self.refresh_database()
    }

    /// Runs the reset capability; `Ok(false)` when there is none.
    pub fn on_reset(&mut self) -> HookResult {
        let Some(hooks) = self.valid_hooks() else {
            return Ok(false);
        };
        match hooks.as_resettable() {
            Some(resettable) => resettable.reset(),
            None => Ok(false),
        }
    }
}
