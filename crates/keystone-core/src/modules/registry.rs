//! Module registry: the single source of truth consulted before and after
//! every lifecycle transition.

use crate::modules::builder::ModuleBuilder;
use crate::modules::descriptor::Module;
use crate::modules::hooks::ImplementationCatalog;
use crate::modules::manifest::is_valid_module_name;
use crate::modules::store::{StateStore, StoreError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// State store error.
    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error while scanning the modules directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Resolves module names to modules.
pub trait ModuleRegistry: Send + Sync {
    /// Resolves a module. Unknown modules resolve to an invalid instance.
    fn get_module(&self, name: &str) -> Result<Module>;

    fn is_installed(&self, name: &str) -> Result<bool>;

    fn is_enabled(&self, name: &str) -> Result<bool>;

    fn is_on_disk(&self, name: &str) -> Result<bool>;

    /// All installed modules, freshly resolved.
    fn installed_modules(&self) -> Result<Vec<Module>>;

    /// Every module that is on disk or installed, ordered by name.
    fn available_modules(&self) -> Result<Vec<Module>>;

    /// Numeric id of an installed module, 0 when unknown.
    fn id_by_name(&self, name: &str) -> Result<i64>;
}

/// Registry over a modules directory and a state store.
pub struct LocalRegistry {
    builder: ModuleBuilder,
    store: Arc<dyn StateStore>,
}

impl LocalRegistry {
    pub fn new(
        modules_dir: PathBuf,
        store: Arc<dyn StateStore>,
        catalog: ImplementationCatalog,
    ) -> Self {
        let builder = ModuleBuilder::new(modules_dir, catalog, Arc::clone(&store));
        Self { builder, store }
    }

    pub fn modules_dir(&self) -> &Path {
        self.builder.modules_dir()
    }
}

impl ModuleRegistry for LocalRegistry {
    fn get_module(&self, name: &str) -> Result<Module> {
        let record = self.store.get(name)?;
        Ok(self.builder.build(name, record.as_ref()))
    }

    fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(self.store.get(name)?.is_some())
    }

    fn is_enabled(&self, name: &str) -> Result<bool> {
        Ok(self.store.get(name)?.is_some_and(|record| record.active))
    }

    fn is_on_disk(&self, name: &str) -> Result<bool> {
        Ok(self.builder.is_present(name))
    }

    fn installed_modules(&self) -> Result<Vec<Module>> {
        Ok(self
            .store
            .list()?
            .iter()
            .map(|record| self.builder.build(&record.name, Some(record)))
            .collect())
    }

    fn available_modules(&self) -> Result<Vec<Module>> {
        let mut names: BTreeSet<String> =
            self.store.list()?.into_iter().map(|record| record.name).collect();

        if self.modules_dir().is_dir() {
            for entry in std::fs::read_dir(self.modules_dir())? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                if is_valid_module_name(&name) && self.builder.is_present(&name) {
                    names.insert(name);
                }
            }
        }

        names.iter().map(|name| self.get_module(name)).collect()
    }

    fn id_by_name(&self, name: &str) -> Result<i64> {
        Ok(self.store.get(name)?.map_or(0, |record| record.id))
    }
}
