//! Error types for Keystone lifecycle operations.

use crate::acquisition::AcquisitionError;
use crate::config::ConfigError;
use crate::lifecycle::permission::ModuleAction;
use crate::lifecycle::upgrade::UpgradeError;
use crate::modules::hooks::HookError;
use crate::modules::registry::RegistryError;
use crate::modules::store::StoreError;
use thiserror::Error;

/// Boxed source error carried by [`LifecycleError::OperationFailed`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Core error type for lifecycle operations.
///
/// `Ok(false)` from an operation is a logical failure, not an error.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The operator may not perform the action. Raised before any side effect.
    #[error("permission denied: cannot {action}{}", module_suffix(.module))]
    PermissionDenied { action: ModuleAction, module: Option<String> },

    /// The module has to be installed first.
    #[error("module '{0}' is not installed")]
    NotInstalled(String),

    /// No local source and the marketplace pull failed.
    #[error("module package not found: {0}")]
    PackageNotFound(String),

    /// A wrapped hook failure.
    #[error("failed to {action} module '{module}': {message}")]
    OperationFailed {
        action: ModuleAction,
        module: String,
        message: String,
        #[source]
        source: BoxError,
    },

    /// Hook error propagated as-is.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// Registry errors
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Acquisition errors
    #[error("acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// Storage errors
    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    /// Upgrade runner errors
    #[error("upgrade error: {0}")]
    Upgrade(#[from] UpgradeError),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LifecycleError {
    /// Wraps `source` as a failure of `action` on `module`.
    pub fn operation_failed(
        action: ModuleAction,
        module: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        let source = source.into();
        Self::OperationFailed { action, module: module.into(), message: source.to_string(), source }
    }
}

#[allow(clippy::ref_option)]
fn module_suffix(module: &Option<String>) -> String {
    module.as_deref().map(|m| format!(" module '{}'", m)).unwrap_or_default()
}

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_permission_denied_display() {
        let err = LifecycleError::PermissionDenied {
            action: ModuleAction::Uninstall,
            module: Some("core".to_string()),
        };
        assert_eq!(err.to_string(), "permission denied: cannot uninstall module 'core'");

        let err = LifecycleError::PermissionDenied { action: ModuleAction::Install, module: None };
        assert_eq!(err.to_string(), "permission denied: cannot install");
    }

    #[test]
    fn test_operation_failed_keeps_source() {
        let err = LifecycleError::operation_failed(
            ModuleAction::Enable,
            "stats",
            HookError::failed("table missing"),
        );
        match &err {
            LifecycleError::OperationFailed { message, .. } => assert_eq!(message, "table missing"),
            _ => panic!("Expected OperationFailed error variant"),
        }
        assert_eq!(err.to_string(), "failed to enable module 'stats': table missing");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_hook_error_is_transparent() {
        let err: LifecycleError = HookError::failed("boom").into();
        assert_eq!(err.to_string(), "boom");
    }
}
