//! Configuration for Keystone.

use crate::lifecycle::permission::ModuleAction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variable overriding the marketplace URL.
pub const MARKETPLACE_URL_ENV: &str = "KEYSTONE_MARKETPLACE_URL";

/// Environment variable overriding the modules directory.
pub const MODULES_DIR_ENV: &str = "KEYSTONE_MODULES_DIR";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Marketplace configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    /// Base URL of the marketplace API.
    #[serde(default = "default_marketplace_url")]
    pub url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Lifetime of cached module metadata in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Retries on network and server errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Whether marketplace pulls are allowed at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_marketplace_url() -> String {
    "https://marketplace.keystone.dev/api/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            url: default_marketplace_url(),
            timeout_secs: default_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_retries: default_max_retries(),
            enabled: true,
        }
    }
}

/// Permission policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionConfig {
    /// Actions the operator may perform.
    #[serde(default = "default_allowed_actions")]
    pub allowed_actions: Vec<ModuleAction>,
    /// Actions denied for specific modules.
    #[serde(default)]
    pub denied_modules: HashMap<String, Vec<ModuleAction>>,
    /// Modules that can never be uninstalled.
    #[serde(default)]
    pub protected_modules: Vec<String>,
}

fn default_allowed_actions() -> Vec<ModuleAction> {
    ModuleAction::ALL.to_vec()
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            allowed_actions: default_allowed_actions(),
            denied_modules: HashMap::new(),
            protected_modules: Vec::new(),
        }
    }
}

/// Root configuration for Keystone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoneConfig {
    /// Directory holding one subdirectory per module.
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,
    /// SQLite database with the installed module records.
    #[serde(default = "default_state_db")]
    pub state_db: PathBuf,
    /// Directories emptied when the host cache is invalidated.
    #[serde(default)]
    pub cache_dirs: Vec<PathBuf>,
    /// Marketplace configuration.
    #[serde(default)]
    pub marketplace: MarketplaceConfig,
    /// Permission policy.
    #[serde(default)]
    pub permissions: PermissionConfig,
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("./modules")
}

fn default_state_db() -> PathBuf {
    PathBuf::from("./keystone.db")
}

impl Default for KeystoneConfig {
    fn default() -> Self {
        Self {
            modules_dir: default_modules_dir(),
            state_db: default_state_db(),
            cache_dirs: Vec::new(),
            marketplace: MarketplaceConfig::default(),
            permissions: PermissionConfig::default(),
        }
    }
}

impl KeystoneConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Loads configuration from a TOML file and the environment.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)?
        } else {
            debug!(path = %path.display(), "Configuration file not found, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(MARKETPLACE_URL_ENV).filter(|v| !v.is_empty()) {
            self.marketplace.url = url;
        }
        if let Some(dir) = lookup(MODULES_DIR_ENV).filter(|v| !v.is_empty()) {
            self.modules_dir = PathBuf::from(dir);
        }
    }
}
