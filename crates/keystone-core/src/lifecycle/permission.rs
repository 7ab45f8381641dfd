//! Operator permission checks.

use crate::config::PermissionConfig;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// A lifecycle action an operator can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleAction {
    Install,
    Uninstall,
    Enable,
    Disable,
    EnableOnVariant,
    DisableOnVariant,
    Reset,
    Upgrade,
    Configure,
}

impl ModuleAction {
    /// Every action, in display order.
    pub const ALL: [ModuleAction; 9] = [
        ModuleAction::Install,
        ModuleAction::Uninstall,
        ModuleAction::Enable,
        ModuleAction::Disable,
        ModuleAction::EnableOnVariant,
        ModuleAction::DisableOnVariant,
        ModuleAction::Reset,
        ModuleAction::Upgrade,
        ModuleAction::Configure,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::EnableOnVariant => "enable_on_variant",
            Self::DisableOnVariant => "disable_on_variant",
            Self::Reset => "reset",
            Self::Upgrade => "upgrade",
            Self::Configure => "configure",
        }
    }
}

impl fmt::Display for ModuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown module action: {}", s))
    }
}

/// Decides whether the current operator may perform an action.
pub trait PermissionGate: Send + Sync {
    /// `module` is `None` for checks that are not tied to one module.
    fn is_allowed(&self, action: ModuleAction, module: Option<&str>) -> bool;
}

/// Gate that allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionGate for AllowAll {
    fn is_allowed(&self, _action: ModuleAction, _module: Option<&str>) -> bool {
        true
    }
}

/// Configuration-driven gate.
#[derive(Debug, Clone, Default)]
pub struct PolicyGate {
    allowed: HashSet<ModuleAction>,
    denied: HashMap<String, HashSet<ModuleAction>>,
    protected: HashSet<String>,
}

impl PolicyGate {
    pub fn from_config(config: &PermissionConfig) -> Self {
        Self {
            allowed: config.allowed_actions.iter().copied().collect(),
            denied: config
                .denied_modules
                .iter()
                .map(|(module, actions)| (module.clone(), actions.iter().copied().collect()))
                .collect(),
            protected: config.protected_modules.iter().cloned().collect(),
        }
    }
}

impl PermissionGate for PolicyGate {
    fn is_allowed(&self, action: ModuleAction, module: Option<&str>) -> bool {
        if !self.allowed.contains(&action) {
            return false;
        }
        let Some(module) = module else {
            return true;
        };
        if action == ModuleAction::Uninstall && self.protected.contains(module) {
            return false;
        }
        !self.denied.get(module).is_some_and(|denied| denied.contains(&action))
    }
}
