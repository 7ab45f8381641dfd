//! Lifecycle orchestration and its collaborators.

pub mod actions;
pub mod cache;
pub mod events;
pub mod manager;
pub mod notifications;
pub mod options;
pub mod permission;
pub mod upgrade;

pub use actions::{ActionSet, PrimaryAction, available_actions};
pub use cache::{CacheDirInvalidator, CacheInvalidator, NoopInvalidator};
pub use events::{EventBus, EventKind, EventNotifier, LifecycleEvent, TracingNotifier};
pub use manager::{
    Batch, INVALID_MODULE_MESSAGE, ModuleManager, ModuleManagerBuilder, NO_DETAILS_MESSAGE,
};
pub use notifications::{
    ActionLinker, ModuleCollection, ModuleNotifications, NotificationBuckets, NotificationCounts,
    NotificationKind, PresentedModule,
};
pub use options::{ActionOptions, InstallSource, LATEST_VERSION};
pub use permission::{AllowAll, ModuleAction, PermissionGate, PolicyGate};
pub use upgrade::{StepUpgradeRunner, UpgradeError, UpgradeRunner};
