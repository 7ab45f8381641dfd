//! Builds [`Module`] values from disk, database state and the catalog.

use crate::modules::descriptor::{
    Capabilities, DatabaseState, DiskState, Module, ModuleAttributes, ModuleDescriptor,
    ModuleInstance,
};
use crate::modules::hooks::{DeclarativeHooks, ImplementationCatalog, LifecycleHooks};
use crate::modules::manifest::{MANIFEST_FILE, ModuleKind, ModuleManifest, is_valid_module_name};
use crate::modules::origin::Origin;
use crate::modules::store::{ModuleRecord, StateStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::error;

/// Assembles modules. Load failures never error: they produce an invalid
/// instance and are logged.
pub struct ModuleBuilder {
    modules_dir: PathBuf,
    catalog: ImplementationCatalog,
    store: Arc<dyn StateStore>,
}

impl ModuleBuilder {
    pub fn new(
        modules_dir: PathBuf,
        catalog: ImplementationCatalog,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self { modules_dir, catalog, store }
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Directory a module lives in.
    pub fn module_path(&self, name: &str) -> PathBuf {
        self.modules_dir.join(name)
    }

    /// Whether `name` has a manifest on disk.
    pub fn is_present(&self, name: &str) -> bool {
        is_valid_module_name(name) && self.module_path(name).join(MANIFEST_FILE).is_file()
    }

    pub fn build(&self, name: &str, record: Option<&ModuleRecord>) -> Module {
        let path = self.module_path(name);
        let database = DatabaseState::from_record(record);
        let present = self.is_present(name);

        let mut disk = DiskState::absent(path.clone());
        if present {
            disk.present = true;
            disk.filemtime = manifest_mtime(&path.join(MANIFEST_FILE));
        }

        let (instance, manifest) = self.load_instance(name, present);

        let (attributes, origin) = match &manifest {
            Some(manifest) => {
                disk.version = Some(manifest.version.clone());
                (ModuleAttributes::from_manifest(manifest), manifest.origin_flags())
            }
            None => (ModuleAttributes::default(), Origin::empty()),
        };
        disk.valid = matches!(instance, ModuleInstance::Valid(_));

        let (is_configurable, is_payment_module) = match (&instance, &manifest) {
            (ModuleInstance::Valid(hooks), Some(manifest)) => (
                manifest.configurable || hooks.is_configurable(),
                manifest.payment || hooks.is_payment_module(),
            ),
            _ => (false, false),
        };

        let capabilities =
            Capabilities::compute(&disk, &database, origin, is_configurable, is_payment_module);

        let descriptor = ModuleDescriptor {
            name: name.to_string(),
            disk,
            database,
            origin,
            attributes,
            capabilities,
        };

        Module::new(descriptor, instance, Arc::clone(&self.store))
    }

    fn load_instance(&self, name: &str, present: bool) -> (ModuleInstance, Option<ModuleManifest>) {
        if !is_valid_module_name(name) {
            return (invalid(format!("invalid module name: {name}")), None);
        }
        if !present {
            return (invalid("module files are missing"), None);
        }

        let manifest = match ModuleManifest::load_from_dir(&self.module_path(name)) {
            Ok(manifest) => manifest,
            Err(e) => {
                error!(module = %name, error = %e, "Failed to load module manifest");
                return (invalid(e.to_string()), None);
            }
        };

        if manifest.name != name {
            error!(
                module = %name,
                declared = %manifest.name,
                "Module manifest declares a different name"
            );
            return (invalid(format!("manifest declares module '{}'", manifest.name)), Some(manifest));
        }

        let hooks: Option<Arc<dyn LifecycleHooks>> = match manifest.kind {
            ModuleKind::Declarative => Some(Arc::new(DeclarativeHooks::from_manifest(&manifest))),
            ModuleKind::Native => self.catalog.get(name),
        };

        match hooks {
            Some(hooks) => (ModuleInstance::Valid(hooks), Some(manifest)),
            None => {
                error!(module = %name, "No implementation registered for native module");
                (invalid("no implementation registered"), Some(manifest))
            }
        }
    }
}

fn invalid(reason: impl Into<String>) -> ModuleInstance {
    ModuleInstance::Invalid { reason: reason.into() }
}

fn manifest_mtime(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}
