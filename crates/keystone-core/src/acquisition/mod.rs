//! Package acquisition: getting module files onto disk and off it again.
//!
//! [`AcquisitionService`] is the seam the lifecycle manager talks to.
//! [`LocalAcquisition`] handles module directories and `.tar.gz` archives
//! and pulls packages from the marketplace.

pub mod archive;
pub mod marketplace;

pub use marketplace::{MarketplaceClient, MarketplaceError, MarketplaceModule};

use crate::config::KeystoneConfig;
use crate::modules::manifest::{ManifestError, ModuleManifest, is_valid_module_name};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

/// Acquisition errors.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest error.
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Marketplace error.
    #[error("marketplace error: {0}")]
    Marketplace(#[from] MarketplaceError),

    /// The marketplace has no package for the module.
    #[error("module not available on the marketplace: {0}")]
    NotOnMarketplace(String),

    /// Marketplace pulls are turned off.
    #[error("marketplace is disabled")]
    MarketplaceDisabled,

    /// The package layout is not usable.
    #[error("invalid package: {0}")]
    InvalidPackage(String),

    /// Nothing to delete.
    #[error("module not found on disk: {0}")]
    NotOnDisk(String),

    /// Invalid module name.
    #[error("invalid module name: {0}")]
    InvalidName(String),

    /// Marketplace client lock poisoned.
    #[error("marketplace client lock poisoned")]
    LockPoisoned,
}

/// Result type for acquisition operations.
pub type Result<T> = std::result::Result<T, AcquisitionError>;

/// Moves module packages between sources and the modules directory.
pub trait AcquisitionService: Send + Sync {
    /// Reads the canonical module name from a package location.
    fn resolve_name_from_package(&self, location: &Path) -> Result<String>;

    /// Copies or unpacks the package at `location` into the modules directory.
    fn materialize_from_location(&self, location: &Path) -> Result<()>;

    /// Downloads the module from the marketplace into the modules directory.
    fn pull_from_marketplace(&self, name: &str) -> Result<()>;

    /// Removes the module's files.
    fn delete_from_disk(&self, name: &str) -> Result<()>;
}

/// Acquisition backed by the local filesystem and an optional marketplace.
pub struct LocalAcquisition {
    modules_dir: PathBuf,
    marketplace: Option<Mutex<MarketplaceClient>>,
}

impl LocalAcquisition {
    /// Creates an acquisition service without marketplace access.
    pub fn new(modules_dir: PathBuf) -> Self {
        Self { modules_dir, marketplace: None }
    }

    /// Enables marketplace pulls through `client`.
    #[must_use]
    pub fn with_marketplace(mut self, client: MarketplaceClient) -> Self {
        self.marketplace = Some(Mutex::new(client));
        self
    }

    /// Builds the service from configuration.
    pub fn from_config(config: &KeystoneConfig) -> Result<Self> {
        let acquisition = Self::new(config.modules_dir.clone());
        if !config.marketplace.enabled {
            return Ok(acquisition);
        }
        let client = MarketplaceClient::from_config(&config.marketplace)?;
        Ok(acquisition.with_marketplace(client))
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Stages `root` next to its destination, then swaps it into place.
    fn install_tree(&self, root: &Path, manifest: &ModuleManifest) -> Result<()> {
        std::fs::create_dir_all(&self.modules_dir)?;
        let staging = tempfile::Builder::new().prefix(".staging-").tempdir_in(&self.modules_dir)?;
        let staged = staging.path().join(&manifest.name);
        archive::copy_dir_all(root, &staged)?;

        let dest = self.modules_dir.join(&manifest.name);
        if dest.exists() {
            std::fs::remove_dir_all(&dest)?;
        }
        std::fs::rename(&staged, &dest)?;

        info!(module = %manifest.name, version = %manifest.version, path = %dest.display(), "Module files in place");
        Ok(())
    }

    fn install_unpacked(&self, unpacked: &Path, expected: Option<&str>) -> Result<()> {
        let root = archive::package_root(unpacked)?;
        let manifest = ModuleManifest::load_from_dir(&root)?;
        if let Some(expected) = expected.filter(|expected| manifest.name != *expected) {
            return Err(AcquisitionError::InvalidPackage(format!(
                "package declares module '{}', expected '{}'",
                manifest.name, expected
            )));
        }
        self.install_tree(&root, &manifest)
    }
}

impl AcquisitionService for LocalAcquisition {
    fn resolve_name_from_package(&self, location: &Path) -> Result<String> {
        Ok(archive::read_manifest(location)?.name)
    }

    fn materialize_from_location(&self, location: &Path) -> Result<()> {
        debug!(location = %location.display(), "Materializing module package");

        if location.is_dir() {
            return self.install_unpacked(location, None);
        }

        if location.is_file() && archive::is_archive(location) {
            let unpacked = tempfile::tempdir()?;
            archive::unpack(location, unpacked.path())?;
            return self.install_unpacked(unpacked.path(), None);
        }

        Err(AcquisitionError::InvalidPackage(format!(
            "{} is neither a module directory nor a .tar.gz archive",
            location.display()
        )))
    }

    fn pull_from_marketplace(&self, name: &str) -> Result<()> {
        if !is_valid_module_name(name) {
            return Err(AcquisitionError::InvalidName(name.to_string()));
        }
        let Some(marketplace) = &self.marketplace else {
            return Err(AcquisitionError::MarketplaceDisabled);
        };

        let bytes = {
            let mut client = marketplace.lock().map_err(|_| AcquisitionError::LockPoisoned)?;
            let module = client
                .get_module_info(name)?
                .ok_or_else(|| AcquisitionError::NotOnMarketplace(name.to_string()))?;
            info!(module = %name, version = %module.version, "Pulling module from marketplace");
            client.download(&module.download_url)?
        };

        let unpacked = tempfile::tempdir()?;
        archive::unpack_bytes(&bytes, unpacked.path())?;
        self.install_unpacked(unpacked.path(), Some(name))
    }

    fn delete_from_disk(&self, name: &str) -> Result<()> {
        if !is_valid_module_name(name) {
            return Err(AcquisitionError::InvalidName(name.to_string()));
        }
        let path = self.modules_dir.join(name);
        if !path.is_dir() {
            return Err(AcquisitionError::NotOnDisk(name.to_string()));
        }
        std::fs::remove_dir_all(&path)?;
        info!(module = %name, "Module files deleted");
        Ok(())
    }
}
