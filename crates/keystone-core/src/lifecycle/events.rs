//! Lifecycle event publication.

use crate::modules::descriptor::ModuleDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;
use tracing::{info, warn};

/// Kind of lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Install,
    PostInstall,
    Uninstall,
    Upgrade,
    Enable,
    Disable,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::PostInstall => "post_install",
            Self::Uninstall => "uninstall",
            Self::Upgrade => "upgrade",
            Self::Enable => "enable",
            Self::Disable => "disable",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published lifecycle event.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    /// Descriptor as it was after the transition.
    pub module: ModuleDescriptor,
    pub occurred_at: DateTime<Utc>,
}

/// Receives lifecycle events.
pub trait EventNotifier: Send + Sync {
    fn publish(&self, kind: EventKind, module: &ModuleDescriptor);
}

/// Logs every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl EventNotifier for TracingNotifier {
    fn publish(&self, kind: EventKind, module: &ModuleDescriptor) {
        info!(event = %kind, module = %module.name, installed = module.database.installed, "Module event");
    }
}

type Subscriber = Box<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Fans events out to subscribers in subscription order.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.subscribers.read().map_or(0, |subscribers| subscribers.len());
        f.debug_struct("EventBus").field("subscribers", &count).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber.
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        match self.subscribers.write() {
            Ok(mut subscribers) => subscribers.push(Box::new(subscriber)),
            Err(_) => warn!("Event bus lock poisoned, subscriber dropped"),
        }
    }
}

impl EventNotifier for EventBus {
    fn publish(&self, kind: EventKind, module: &ModuleDescriptor) {
        let event = LifecycleEvent { kind, module: module.clone(), occurred_at: Utc::now() };
        match self.subscribers.read() {
            Ok(subscribers) => {
                for subscriber in subscribers.iter() {
                    subscriber(&event);
                }
            }
            Err(_) => warn!(event = %kind, module = %module.name, "Event bus lock poisoned, event dropped"),
        }
    }
}
