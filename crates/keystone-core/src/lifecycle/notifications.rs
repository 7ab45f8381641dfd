//! Installed modules that need operator attention.

use crate::lifecycle::actions::{ActionSet, available_actions};
use crate::lifecycle::permission::ModuleAction;
use crate::modules::descriptor::{Module, ModuleDescriptor};
use serde::Serialize;
use std::collections::BTreeMap;

/// Installed modules split into attention buckets. A module may appear in
/// both.
#[derive(Debug, Clone, Default)]
pub struct ModuleNotifications {
    /// Modules whose implementation reports a warning.
    pub to_configure: Vec<Module>,
    /// Modules with a newer version on disk.
    pub to_update: Vec<Module>,
}

impl ModuleNotifications {
    /// Sorts modules into buckets in a single pass.
    pub fn group(modules: impl IntoIterator<Item = Module>) -> Self {
        let mut notifications = Self::default();
        for module in modules {
            let needs_configuration = module
                .hooks()
                .and_then(|hooks| hooks.warning())
                .is_some_and(|warning| !warning.is_empty());
            let needs_update = module.descriptor().capabilities.can_be_upgraded;

            if needs_configuration && needs_update {
                notifications.to_update.push(module.clone());
                notifications.to_configure.push(module);
            } else if needs_configuration {
                notifications.to_configure.push(module);
            } else if needs_update {
                notifications.to_update.push(module);
            }
        }
        notifications
    }

    pub fn counts(&self) -> NotificationCounts {
        NotificationCounts::new(self.to_configure.len(), self.to_update.len())
    }
}

/// Which bucket a collection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ToConfigure,
    ToUpdate,
}

/// Builds the link for an action on a module.
pub trait ActionLinker {
    fn link(&self, action: ModuleAction, module: &ModuleDescriptor) -> String;
}

impl<F> ActionLinker for F
where
    F: Fn(ModuleAction, &ModuleDescriptor) -> String,
{
    fn link(&self, action: ModuleAction, module: &ModuleDescriptor) -> String {
        self(action, module)
    }
}

/// A descriptor enriched with its actions and their links.
#[derive(Debug, Clone, Serialize)]
pub struct PresentedModule {
    pub descriptor: ModuleDescriptor,
    pub actions: ActionSet,
    pub links: BTreeMap<ModuleAction, String>,
    /// Warning reported by the implementation, if any.
    pub warning: Option<String>,
}

impl PresentedModule {
    pub fn new(module: &Module, linker: &dyn ActionLinker) -> Self {
        let descriptor = module.descriptor().clone();
        let actions = available_actions(&descriptor);
        let links = actions
            .actions
            .iter()
            .map(|action| (*action, linker.link(*action, &descriptor)))
            .collect();
        let warning = module.hooks().and_then(|hooks| hooks.warning());
        Self { descriptor, actions, links, warning }
    }
}

/// One bucket of presented modules.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleCollection {
    pub kind: NotificationKind,
    pub items: Vec<PresentedModule>,
}

impl ModuleCollection {
    pub fn present(kind: NotificationKind, modules: &[Module], linker: &dyn ActionLinker) -> Self {
        Self { kind, items: modules.iter().map(|module| PresentedModule::new(module, linker)).collect() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Presenter output per bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationBuckets<T> {
    pub to_configure: T,
    pub to_update: T,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationCounts {
    pub to_configure: usize,
    pub to_update: usize,
    /// Sum of both buckets.
    pub count: usize,
}

impl NotificationCounts {
    pub fn new(to_configure: usize, to_update: usize) -> Self {
        Self { to_configure, to_update, count: to_configure + to_update }
    }
}
