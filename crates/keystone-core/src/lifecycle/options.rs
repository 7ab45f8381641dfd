//! Per-batch action options and install sources.

use crate::modules::manifest::MANIFEST_FILE;
use std::path::{Path, PathBuf};

/// Version requested when the caller does not name one.
pub const LATEST_VERSION: &str = "latest";

/// Options fixed for the lifetime of a [`Batch`](super::manager::Batch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOptions {
    /// Delete module files after a successful uninstall.
    pub deletion: bool,
    /// Whether successful operations clear the host cache.
    pub cache_clear_enabled: bool,
}

impl Default for ActionOptions {
    fn default() -> Self {
        Self { deletion: false, cache_clear_enabled: true }
    }
}

impl ActionOptions {
    #[must_use]
    pub fn with_deletion(mut self, deletion: bool) -> Self {
        self.deletion = deletion;
        self
    }

    #[must_use]
    pub fn with_cache_clear(mut self, enabled: bool) -> Self {
        self.cache_clear_enabled = enabled;
        self
    }
}

/// What to install: a module name or a package location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallSource {
    Name(String),
    Location(PathBuf),
}

impl InstallSource {
    /// Treats an existing file, or a directory holding a module manifest, as
    /// a location. Anything else is a module name.
    pub fn parse(source: &str) -> Self {
        let path = Path::new(source);
        let is_package = path.is_file() || (path.is_dir() && path.join(MANIFEST_FILE).is_file());
        if is_package { Self::Location(path.to_path_buf()) } else { Self::Name(source.to_string()) }
    }

    /// The module name, when the source is one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Location(_) => None,
        }
    }

    pub fn location(&self) -> Option<&Path> {
        match self {
            Self::Name(_) => None,
            Self::Location(path) => Some(path),
        }
    }
}

impl From<&str> for InstallSource {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<PathBuf> for InstallSource {
    fn from(path: PathBuf) -> Self {
        Self::Location(path)
    }
}
