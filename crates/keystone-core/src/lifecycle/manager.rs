//! Lifecycle orchestration.
//!
//! [`ModuleManager`] owns the collaborators. Operations run inside a
//! [`Batch`], which fixes the [`ActionOptions`] and clears the host cache at
//! most once, however many operations succeed.

use crate::acquisition::{AcquisitionService, LocalAcquisition};
use crate::config::KeystoneConfig;
use crate::error::{LifecycleError, Result};
use crate::lifecycle::cache::{CacheDirInvalidator, CacheInvalidator, NoopInvalidator};
use crate::lifecycle::events::{EventKind, EventNotifier, TracingNotifier};
use crate::lifecycle::notifications::{
    ActionLinker, ModuleCollection, ModuleNotifications, NotificationBuckets, NotificationCounts,
    NotificationKind,
};
use crate::lifecycle::options::{ActionOptions, InstallSource, LATEST_VERSION};
use crate::lifecycle::permission::{AllowAll, ModuleAction, PermissionGate, PolicyGate};
use crate::lifecycle::upgrade::{StepUpgradeRunner, UpgradeRunner};
use crate::modules::descriptor::Module;
use crate::modules::hooks::{HookResult, ImplementationCatalog};
use crate::modules::registry::{LocalRegistry, ModuleRegistry};
use crate::modules::store::{SqliteStateStore, StateStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Returned by [`ModuleManager::last_error`] when the module reported nothing.
pub const NO_DETAILS_MESSAGE: &str = "Unfortunately, the module did not return additional details.";

/// Returned by [`ModuleManager::last_error`] when no implementation loads.
pub const INVALID_MODULE_MESSAGE: &str = "The module is invalid and cannot be loaded.";

/// Module lifecycle manager.
pub struct ModuleManager {
    registry: Arc<dyn ModuleRegistry>,
    acquisition: Arc<dyn AcquisitionService>,
    upgrader: Arc<dyn UpgradeRunner>,
    permissions: Arc<dyn PermissionGate>,
    cache: Arc<dyn CacheInvalidator>,
    events: Arc<dyn EventNotifier>,
}

/// Builder for [`ModuleManager`].
pub struct ModuleManagerBuilder {
    registry: Arc<dyn ModuleRegistry>,
    acquisition: Arc<dyn AcquisitionService>,
    upgrader: Option<Arc<dyn UpgradeRunner>>,
    permissions: Arc<dyn PermissionGate>,
    cache: Arc<dyn CacheInvalidator>,
    events: Arc<dyn EventNotifier>,
}

impl ModuleManagerBuilder {
    #[must_use]
    pub fn upgrader(mut self, upgrader: Arc<dyn UpgradeRunner>) -> Self {
        self.upgrader = Some(upgrader);
        self
    }

    #[must_use]
    pub fn permissions(mut self, permissions: Arc<dyn PermissionGate>) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn events(mut self, events: Arc<dyn EventNotifier>) -> Self {
        self.events = events;
        self
    }

    /// Builds the manager. Without an explicit runner, migrations are applied
    /// by a [`StepUpgradeRunner`] over the same registry.
    pub fn build(self) -> ModuleManager {
        let upgrader = self.upgrader.unwrap_or_else(|| {
            Arc::new(StepUpgradeRunner::new(Arc::clone(&self.registry))) as Arc<dyn UpgradeRunner>
        });
        ModuleManager {
            registry: self.registry,
            acquisition: self.acquisition,
            upgrader,
            permissions: self.permissions,
            cache: self.cache,
            events: self.events,
        }
    }
}

impl ModuleManager {
    /// Starts a builder with permissive, silent defaults.
    pub fn builder(
        registry: Arc<dyn ModuleRegistry>,
        acquisition: Arc<dyn AcquisitionService>,
    ) -> ModuleManagerBuilder {
        ModuleManagerBuilder {
            registry,
            acquisition,
            upgrader: None,
            permissions: Arc::new(AllowAll),
            cache: Arc::new(NoopInvalidator),
            events: Arc::new(TracingNotifier),
        }
    }

    /// Wires the default local collaborators from configuration.
    pub fn from_config(config: &KeystoneConfig, catalog: ImplementationCatalog) -> Result<Self> {
        if let Some(parent) = config.state_db.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let store: Arc<dyn StateStore> = Arc::new(SqliteStateStore::open(&config.state_db)?);
        let registry: Arc<dyn ModuleRegistry> =
            Arc::new(LocalRegistry::new(config.modules_dir.clone(), store, catalog));
        let acquisition = Arc::new(LocalAcquisition::from_config(config)?);

        info!(
            modules_dir = %config.modules_dir.display(),
            state_db = %config.state_db.display(),
            "Module manager initialized"
        );

        Ok(Self::builder(registry, acquisition)
            .permissions(Arc::new(PolicyGate::from_config(&config.permissions)))
            .cache(Arc::new(CacheDirInvalidator::new(config.cache_dirs.clone())))
            .build())
    }

    pub fn registry(&self) -> &Arc<dyn ModuleRegistry> {
        &self.registry
    }

    /// Opens a batch with default options.
    pub fn batch(&self) -> Batch<'_> {
        self.batch_with(ActionOptions::default())
    }

    pub fn batch_with(&self, options: ActionOptions) -> Batch<'_> {
        Batch { manager: self, options, cache_cleared: false }
    }

    pub fn install(&self, source: impl Into<InstallSource>) -> Result<bool> {
        self.batch().install(source)
    }

    pub fn post_install(&self, name: &str) -> Result<bool> {
        self.batch().post_install(name)
    }

    pub fn uninstall(&self, name: &str) -> Result<bool> {
        self.batch().uninstall(name)
    }

    pub fn upgrade(&self, name: &str, version: &str, source: Option<&Path>) -> Result<bool> {
        self.batch().upgrade(name, version, source)
    }

    pub fn enable(&self, name: &str) -> Result<bool> {
        self.batch().enable(name)
    }

    pub fn disable(&self, name: &str) -> Result<bool> {
        self.batch().disable(name)
    }

    pub fn enable_on_variant(&self, name: &str) -> Result<bool> {
        self.batch().enable_on_variant(name)
    }

    pub fn disable_on_variant(&self, name: &str) -> Result<bool> {
        self.batch().disable_on_variant(name)
    }

    pub fn reset(&self, name: &str, keep_data: bool) -> Result<bool> {
        self.batch().reset(name, keep_data)
    }

    pub fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(self.registry.is_installed(name)?)
    }

    pub fn is_enabled(&self, name: &str) -> Result<bool> {
        Ok(self.registry.is_enabled(name)?)
    }

    /// Numeric id of an installed module, 0 when unknown.
    pub fn module_id_by_name(&self, name: &str) -> Result<i64> {
        Ok(self.registry.id_by_name(name)?)
    }

    /// Deletes the module's files; `false` (logged) when that fails.
    pub fn remove_module_from_disk(&self, name: &str) -> bool {
        match self.acquisition.delete_from_disk(name) {
            Ok(()) => true,
            Err(e) => {
                error!(module = %name, error = %e, "Failed to delete module files");
                false
            }
        }
    }

    /// Latest error reported by the module, or a fixed explanation.
    pub fn last_error(&self, name: &str) -> String {
        let module = match self.registry.get_module(name) {
            Ok(module) => module,
            Err(e) => {
                warn!(module = %name, error = %e, "Failed to resolve module");
                return INVALID_MODULE_MESSAGE.to_string();
            }
        };
        match module.hooks() {
            Some(hooks) => hooks
                .errors()
                .pop()
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| NO_DETAILS_MESSAGE.to_string()),
            None => INVALID_MODULE_MESSAGE.to_string(),
        }
    }

    /// Installed modules that need configuration or have an update on disk.
    pub fn group_modules_by_notification(&self) -> Result<ModuleNotifications> {
        Ok(ModuleNotifications::group(self.registry.installed_modules()?))
    }

    /// Presents each notification bucket through `presenter`.
    pub fn modules_with_notifications<T, P>(
        &self,
        linker: &dyn ActionLinker,
        presenter: P,
    ) -> Result<NotificationBuckets<T>>
    where
        P: Fn(ModuleCollection) -> T,
    {
        let notifications = self.group_modules_by_notification()?;
        Ok(NotificationBuckets {
            to_configure: presenter(ModuleCollection::present(
                NotificationKind::ToConfigure,
                &notifications.to_configure,
                linker,
            )),
            to_update: presenter(ModuleCollection::present(
                NotificationKind::ToUpdate,
                &notifications.to_update,
                linker,
            )),
        })
    }

    pub fn count_modules_with_notifications(&self) -> Result<NotificationCounts> {
        Ok(self.group_modules_by_notification()?.counts())
    }
}

/// A sequence of lifecycle operations sharing one set of options.
pub struct Batch<'m> {
    manager: &'m ModuleManager,
    options: ActionOptions,
    cache_cleared: bool,
}

impl Batch<'_> {
    pub fn options(&self) -> ActionOptions {
        self.options
    }

    /// Whether this batch already cleared the host cache.
    pub fn cache_cleared(&self) -> bool {
        self.cache_cleared
    }

    fn check(&self, action: ModuleAction, module: Option<&str>) -> Result<()> {
        if self.manager.permissions.is_allowed(action, module) {
            return Ok(());
        }
        warn!(action = %action, module = ?module, "Permission denied");
        Err(LifecycleError::PermissionDenied { action, module: module.map(str::to_string) })
    }

    fn require_installed(&self, name: &str) -> Result<()> {
        if self.manager.registry.is_installed(name)? {
            Ok(())
        } else {
            Err(LifecycleError::NotInstalled(name.to_string()))
        }
    }

    fn clear_cache_if_needed(&mut self, result: bool) {
        if !result || !self.options.cache_clear_enabled || self.cache_cleared {
            return;
        }
        self.manager.cache.clear();
        self.cache_cleared = true;
        debug!("Host cache cleared");
    }

    /// Installs a module by name or from a package location. Installing an
    /// installed module upgrades it instead.
    pub fn install(&mut self, source: impl Into<InstallSource>) -> Result<bool> {
        self.check(ModuleAction::Install, None)?;

        let source = source.into();
        let location = source.location();
        let name = match &source {
            InstallSource::Name(name) => name.clone(),
            InstallSource::Location(path) => {
                self.manager.acquisition.resolve_name_from_package(path)?
            }
        };

        if self.manager.registry.is_installed(&name)? {
            info!(module = %name, "Module already installed, upgrading instead");
            return self.upgrade(&name, LATEST_VERSION, location);
        }

        let acquisition = &self.manager.acquisition;
        if let Some(location) = location {
            acquisition.materialize_from_location(location)?;
        } else if !self.manager.registry.is_on_disk(&name)? {
            acquisition.pull_from_marketplace(&name).map_err(|e| {
                warn!(module = %name, error = %e, "Marketplace pull failed");
                LifecycleError::PackageNotFound(name.clone())
            })?;
        }

        let mut module = self.manager.registry.get_module(&name)?;
        let result = module.on_install()?;
        info!(module = %name, result, "Install finished");

        self.clear_cache_if_needed(result);
        self.manager.events.publish(EventKind::Install, module.descriptor());
        Ok(result)
    }

    /// Runs the follow-up hook of an installed module.
    pub fn post_install(&mut self, name: &str) -> Result<bool> {
        let registry = &self.manager.registry;
        if !registry.is_installed(name)? || !registry.is_on_disk(name)? {
            debug!(module = %name, "Skipping post-install: module not installed or not on disk");
            return Ok(false);
        }

        let mut module = registry.get_module(name)?;
        let result = module.on_post_install()?;

        self.clear_cache_if_needed(result);
        self.manager.events.publish(EventKind::PostInstall, module.descriptor());
        Ok(result)
    }

    /// Uninstalls a module, deleting its files when the batch says so.
    pub fn uninstall(&mut self, name: &str) -> Result<bool> {
        self.check(ModuleAction::Uninstall, Some(name))?;
        self.require_installed(name)?;

        let mut module = self.manager.registry.get_module(name)?;
        let mut result = module.on_uninstall()?;
        info!(module = %name, result, "Uninstall finished");

        if result && self.options.deletion {
            result = self.manager.remove_module_from_disk(name);
        }

        self.clear_cache_if_needed(result);
        self.manager.events.publish(EventKind::Uninstall, module.descriptor());
        Ok(result)
    }

    /// Upgrades an installed module, optionally from a package location.
    pub fn upgrade(&mut self, name: &str, version: &str, source: Option<&Path>) -> Result<bool> {
        self.check(ModuleAction::Upgrade, Some(name))?;
        self.require_installed(name)?;

        let registry = &self.manager.registry;
        let acquisition = &self.manager.acquisition;
        let module = registry.get_module(name)?;

        if let Some(source) = source {
            acquisition.materialize_from_location(source)?;
        } else if module.descriptor().capabilities.can_be_upgraded_from_marketplace {
            let refreshed = acquisition.pull_from_marketplace(name);
            if let Err(e) = refreshed {
                warn!(module = %name, error = %e, "Marketplace refresh failed, using files on disk");
            }
        }

        let mut module = registry.get_module(name)?;
        let result = self.manager.upgrader.run_migrations(name)? && module.on_upgrade(version)?;
        info!(module = %name, version = %version, result, "Upgrade finished");

        self.clear_cache_if_needed(result);
        self.manager.events.publish(EventKind::Upgrade, module.descriptor());
        Ok(result)
    }

    pub fn enable(&mut self, name: &str) -> Result<bool> {
        let (result, module) = self.toggle(ModuleAction::Enable, name, Module::on_enable)?;
        self.manager.events.publish(EventKind::Enable, module.descriptor());
        Ok(result)
    }

    pub fn disable(&mut self, name: &str) -> Result<bool> {
        let (result, module) = self.toggle(ModuleAction::Disable, name, Module::on_disable)?;
        self.manager.events.publish(EventKind::Disable, module.descriptor());
        Ok(result)
    }

    /// Enables a module on the variant context. Publishes no event.
    pub fn enable_on_variant(&mut self, name: &str) -> Result<bool> {
        Ok(self.toggle(ModuleAction::EnableOnVariant, name, Module::on_variant_enable)?.0)
    }

    /// Disables a module on the variant context. Publishes no event.
    pub fn disable_on_variant(&mut self, name: &str) -> Result<bool> {
        Ok(self.toggle(ModuleAction::DisableOnVariant, name, Module::on_variant_disable)?.0)
    }

    /// Runs `hook` for `action`, wrapping hook errors as `OperationFailed`.
    fn toggle(
        &mut self,
        action: ModuleAction,
        name: &str,
        hook: fn(&mut Module) -> HookResult,
    ) -> Result<(bool, Module)> {
        self.check(action, Some(name))?;
        self.require_installed(name)?;

        let mut module = self.manager.registry.get_module(name)?;
        let result =
            hook(&mut module).map_err(|e| LifecycleError::operation_failed(action, name, e))?;
        debug!(module = %name, action = %action, result, "Toggle finished");

        self.clear_cache_if_needed(result);
        Ok((result, module))
    }

    /// Resets a module. With `keep_data` and a reset capability the module
    /// stays installed; otherwise it is uninstalled and installed again.
    pub fn reset(&mut self, name: &str, keep_data: bool) -> Result<bool> {
        let permissions = &self.manager.permissions;
        if !permissions.is_allowed(ModuleAction::Install, None)
            || !permissions.is_allowed(ModuleAction::Uninstall, Some(name))
        {
            warn!(module = %name, "Permission denied for reset");
            return Err(LifecycleError::PermissionDenied {
                action: ModuleAction::Reset,
                module: Some(name.to_string()),
            });
        }
        self.require_installed(name)?;

        self.reset_installed(name, keep_data)
            .map_err(|e| LifecycleError::operation_failed(ModuleAction::Reset, name, e))
    }

    fn reset_installed(&mut self, name: &str, keep_data: bool) -> Result<bool> {
        let mut module = self.manager.registry.get_module(name)?;

        if keep_data && module.supports_reset() {
            let events = &self.manager.events;
            events.publish(EventKind::Uninstall, module.descriptor());
            let result = module.on_reset()?;
            events.publish(EventKind::Install, module.descriptor());
            info!(module = %name, result, "Reset finished, data kept");
            return Ok(result);
        }

        debug!(module = %name, "Resetting by reinstalling");
        Ok(self.uninstall(name)? && self.install(name)?)
    }
}
