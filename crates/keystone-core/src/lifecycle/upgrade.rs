//! Upgrade migrations.

use crate::modules::hooks::HookError;
use crate::modules::registry::{ModuleRegistry, RegistryError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Upgrade runner errors.
#[derive(Debug, Error)]
pub enum UpgradeError {
    /// Registry error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A migration step raised an error.
    #[error("migration {version} of {module} failed: {source}")]
    Migration {
        module: String,
        version: semver::Version,
        #[source]
        source: HookError,
    },
}

/// Runs whatever migrations a module needs to reach its on-disk version.
pub trait UpgradeRunner: Send + Sync {
    /// `Ok(true)` when every needed step succeeded or none was needed.
    fn run_migrations(&self, name: &str) -> Result<bool, UpgradeError>;
}

/// Applies a module's [`Migration`](crate::modules::hooks::Migration) steps
/// with `installed < step <= on disk`, in ascending version order.
pub struct StepUpgradeRunner {
    registry: Arc<dyn ModuleRegistry>,
}

impl StepUpgradeRunner {
    pub fn new(registry: Arc<dyn ModuleRegistry>) -> Self {
        Self { registry }
    }
}

fn parse_or_zero(version: Option<&str>) -> semver::Version {
    version
        .and_then(|v| semver::Version::parse(v).ok())
        .unwrap_or_else(|| semver::Version::new(0, 0, 0))
}

impl UpgradeRunner for StepUpgradeRunner {
    fn run_migrations(&self, name: &str) -> Result<bool, UpgradeError> {
        let module = self.registry.get_module(name)?;
        let Some(hooks) = module.hooks() else {
            warn!(module = %name, "Cannot run migrations without a valid implementation");
            return Ok(false);
        };

        let descriptor = module.descriptor();
        let installed = parse_or_zero(descriptor.database.version.as_deref());
        let Some(target) =
            descriptor.disk.version.as_deref().and_then(|v| semver::Version::parse(v).ok())
        else {
            debug!(module = %name, "No on-disk version, nothing to migrate");
            return Ok(true);
        };

        let mut steps: Vec<_> = hooks
            .migrations()
            .into_iter()
            .filter(|step| *step.version() > installed && *step.version() <= target)
            .collect();
        steps.sort_by(|a, b| a.version().cmp(b.version()));

        for step in steps {
            let version = step.version().clone();
            let applied = step.apply().map_err(|source| UpgradeError::Migration {
                module: name.to_string(),
                version: version.clone(),
                source,
            })?;
            if !applied {
                warn!(module = %name, version = %version, "Migration step declined");
                return Ok(false);
            }
            info!(module = %name, version = %version, "Migration step applied");
        }

        Ok(true)
    }
}
