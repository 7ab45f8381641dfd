//! Which actions an operator can take on a module right now.

use crate::lifecycle::permission::ModuleAction;
use crate::modules::descriptor::ModuleDescriptor;
use serde::Serialize;

/// The action highlighted for a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryAction {
    Action(ModuleAction),
    /// The module has to be purchased before it can be installed.
    Buy,
}

/// Available actions in display order, plus the primary one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSet {
    pub actions: Vec<ModuleAction>,
    pub primary: PrimaryAction,
}

impl ActionSet {
    pub fn contains(&self, action: ModuleAction) -> bool {
        self.actions.contains(&action)
    }
}

const LIFECYCLE_ACTIONS: [ModuleAction; 8] = [
    ModuleAction::Install,
    ModuleAction::Uninstall,
    ModuleAction::Enable,
    ModuleAction::Disable,
    ModuleAction::EnableOnVariant,
    ModuleAction::DisableOnVariant,
    ModuleAction::Reset,
    ModuleAction::Upgrade,
];

/// Computes the actions offered for a module.
pub fn available_actions(descriptor: &ModuleDescriptor) -> ActionSet {
    let database = &descriptor.database;
    let capabilities = &descriptor.capabilities;

    if !database.installed {
        let installable = descriptor.disk.present || descriptor.origin.is_freely_installable();
        return if installable {
            ActionSet {
                actions: vec![ModuleAction::Install],
                primary: PrimaryAction::Action(ModuleAction::Install),
            }
        } else {
            ActionSet { actions: LIFECYCLE_ACTIONS.to_vec(), primary: PrimaryAction::Buy }
        };
    }

    let mut actions: Vec<ModuleAction> = LIFECYCLE_ACTIONS.to_vec();
    actions.push(ModuleAction::Configure);

    let mut removed: Vec<ModuleAction> = Vec::new();
    let mut primary = if !database.active {
        removed.extend([ModuleAction::Install, ModuleAction::Disable]);
        ModuleAction::Enable
    } else if capabilities.is_configurable {
        removed.extend([ModuleAction::Enable, ModuleAction::Install]);
        ModuleAction::Configure
    } else {
        removed.extend([ModuleAction::Install, ModuleAction::Enable, ModuleAction::Configure]);
        ModuleAction::Disable
    };

    if !capabilities.is_configurable {
        removed.push(ModuleAction::Configure);
    }

    if capabilities.can_be_upgraded {
        primary = ModuleAction::Upgrade;
    } else {
        removed.push(ModuleAction::Upgrade);
    }

    if database.active_on_variant {
        removed.push(ModuleAction::EnableOnVariant);
    } else {
        removed.push(ModuleAction::DisableOnVariant);
    }

    actions.retain(|action| !removed.contains(action));

    if !actions.contains(&primary) {
        primary = actions.first().copied().unwrap_or(primary);
    }

    ActionSet { actions, primary: PrimaryAction::Action(primary) }
}
