//! Lifecycle hook capability interface.
//!
//! Every module implementation satisfies [`LifecycleHooks`]. Optional
//! capabilities (reset, migrations) are discovered through explicit
//! accessors instead of runtime reflection.

use crate::modules::manifest::ModuleManifest;
use crate::modules::store::StoreError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error raised by a module's own hook code.
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook reported a failure with a message.
    #[error("{0}")]
    Failed(String),

    /// I/O error inside the hook.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisting the new module state failed.
    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    /// Any other implementation-defined error.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HookError {
    /// Creates a hook failure from a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Result of a lifecycle hook: `Ok(false)` means the hook ran but declined.
pub type HookResult = std::result::Result<bool, HookError>;

/// Optional reset capability.
pub trait Resettable: Send + Sync {
    /// Restores default settings while keeping the module installed.
    fn reset(&self) -> HookResult;
}

/// A versioned migration step applied during upgrades.
pub trait Migration: Send + Sync {
    /// Version this step upgrades the module to.
    fn version(&self) -> &semver::Version;

    /// Applies the step.
    fn apply(&self) -> HookResult;
}

/// Hooks a module implementation exposes to the lifecycle manager.
pub trait LifecycleHooks: Send + Sync {
    /// Installs the module.
    fn install(&self) -> HookResult;

    /// Uninstalls the module.
    fn uninstall(&self) -> HookResult;

    /// Follow-up work after a successful install.
    fn post_install(&self) -> HookResult {
        Ok(true)
    }

    /// Called once migrations ran, with the requested target version.
    fn upgrade(&self, _version: &str) -> HookResult {
        Ok(true)
    }

    /// Enables the module.
    fn enable(&self) -> HookResult {
        Ok(true)
    }

    /// Disables the module.
    fn disable(&self) -> HookResult {
        Ok(true)
    }

    /// Enables the module on the variant context.
    fn enable_variant(&self) -> HookResult {
        Ok(true)
    }

    /// Disables the module on the variant context.
    fn disable_variant(&self) -> HookResult {
        Ok(true)
    }

    /// Reset capability, if the implementation has one.
    fn as_resettable(&self) -> Option<&dyn Resettable> {
        None
    }

    /// Advisory shown while the module still needs configuration.
    fn warning(&self) -> Option<String> {
        None
    }

    /// Errors accumulated by the implementation, oldest first.
    fn errors(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the module exposes a configuration page.
    fn is_configurable(&self) -> bool {
        false
    }

    /// Whether the module is a payment module.
    fn is_payment_module(&self) -> bool {
        false
    }

    /// Versioned migration steps, in any order.
    fn migrations(&self) -> Vec<Arc<dyn Migration>> {
        Vec::new()
    }
}

/// Migration step backed by a closure.
pub struct FnMigration {
    version: semver::Version,
    step: Box<dyn Fn() -> HookResult + Send + Sync>,
}

impl FnMigration {
    /// Creates a migration step for `version`.
    pub fn new<F>(version: semver::Version, step: F) -> Self
    where
        F: Fn() -> HookResult + Send + Sync + 'static,
    {
        Self { version, step: Box::new(step) }
    }
}

impl fmt::Debug for FnMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMigration").field("version", &self.version).finish_non_exhaustive()
    }
}

impl Migration for FnMigration {
    fn version(&self) -> &semver::Version {
        &self.version
    }

    fn apply(&self) -> HookResult {
        (self.step)()
    }
}

/// Hooks for data-only modules: every transition succeeds.
#[derive(Debug, Clone, Default)]
pub struct DeclarativeHooks {
    warning: Option<String>,
    configurable: bool,
    payment: bool,
}

impl DeclarativeHooks {
    /// Builds declarative hooks from a manifest.
    pub fn from_manifest(manifest: &ModuleManifest) -> Self {
        Self {
            warning: manifest.warning.clone(),
            configurable: manifest.configurable,
            payment: manifest.payment,
        }
    }
}

impl LifecycleHooks for DeclarativeHooks {
    fn install(&self) -> HookResult {
        Ok(true)
    }

    fn uninstall(&self) -> HookResult {
        Ok(true)
    }

    fn as_resettable(&self) -> Option<&dyn Resettable> {
        Some(self)
    }

    fn warning(&self) -> Option<String> {
        self.warning.clone()
    }

    fn is_configurable(&self) -> bool {
        self.configurable
    }

    fn is_payment_module(&self) -> bool {
        self.payment
    }
}

impl Resettable for DeclarativeHooks {
    fn reset(&self) -> HookResult {
        Ok(true)
    }
}

/// Compiled-in hook implementations, keyed by module name.
#[derive(Clone, Default)]
pub struct ImplementationCatalog {
    entries: HashMap<String, Arc<dyn LifecycleHooks>>,
}

impl fmt::Debug for ImplementationCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("ImplementationCatalog").field("modules", &names).finish()
    }
}

impl ImplementationCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the implementation for `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, hooks: Arc<dyn LifecycleHooks>) {
        self.entries.insert(name.into(), hooks);
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, hooks: Arc<dyn LifecycleHooks>) -> Self {
        self.register(name, hooks);
        self
    }

    /// Looks up an implementation.
    pub fn get(&self, name: &str) -> Option<Arc<dyn LifecycleHooks>> {
        self.entries.get(name).cloned()
    }

    /// Number of registered implementations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
