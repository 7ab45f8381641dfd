//! Module manifest format and validation.
//!
//! Every module directory carries a `keystone-module.json` manifest that
//! names the module, its version and the attributes shown to operators.

use crate::modules::origin::Origin;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Manifest file name.
pub const MANIFEST_FILE: &str = "keystone-module.json";

static MODULE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]+$").expect("module name pattern is valid")
});

/// Module manifest errors.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// Invalid module name.
    #[error("invalid module name: '{0}' (must be alphanumeric with dashes/underscores)")]
    InvalidName(String),

    /// Invalid version format.
    #[error("invalid version format: {0}")]
    InvalidVersion(String),

    /// Manifest file not found.
    #[error("manifest file not found: {0}")]
    NotFound(String),
}

/// Result type for manifest operations.
pub type Result<T> = std::result::Result<T, ManifestError>;

/// How a module's lifecycle hooks are provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// Hooks are compiled into the host and registered in the catalog.
    #[default]
    Native,
    /// Data-only module; lifecycle hooks always succeed.
    Declarative,
}

/// Module manifest structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Technical module name (must be unique).
    pub name: String,

    /// Module version (semver format).
    pub version: String,

    /// Human-readable name.
    #[serde(default)]
    pub display_name: String,

    /// Module description.
    #[serde(default)]
    pub description: String,

    /// Module author.
    #[serde(default)]
    pub author: String,

    /// Admin tab/category the module belongs to.
    #[serde(default)]
    pub tab: Option<String>,

    /// Origin labels (`disk`, `service`, `native`, ...).
    #[serde(default = "default_origin")]
    pub origin: Vec<String>,

    /// How hooks are provided.
    #[serde(default)]
    pub kind: ModuleKind,

    /// Static advisory shown until the module is configured.
    #[serde(default)]
    pub warning: Option<String>,

    /// Whether the module needs an instance loaded on every request.
    #[serde(default)]
    pub need_instance: bool,

    /// Confirmation message shown before uninstalling.
    #[serde(default)]
    pub confirm_uninstall: Option<String>,

    /// Countries the module is limited to (empty means everywhere).
    #[serde(default)]
    pub limited_countries: Vec<String>,

    /// Whether the module exposes a configuration page.
    #[serde(default)]
    pub configurable: bool,

    /// Whether the module is a payment module.
    #[serde(default)]
    pub payment: bool,
}

fn default_origin() -> Vec<String> {
    vec!["disk".to_string()]
}

impl ModuleManifest {
    /// Creates a minimal manifest with the given name and version.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            display_name: String::new(),
            description: String::new(),
            author: String::new(),
            tab: None,
            origin: default_origin(),
            kind: ModuleKind::default(),
            warning: None,
            need_instance: false,
            confirm_uninstall: None,
            limited_countries: Vec::new(),
            configurable: false,
            payment: false,
        }
    }

    /// Loads a module manifest from a JSON file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed, or validated
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ManifestError::NotFound(path.to_string_lossy().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads the manifest of a module directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load(&dir.join(MANIFEST_FILE))
    }

    /// Parses and validates a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: ModuleManifest = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validates the manifest structure and content.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ManifestError::MissingField("name".to_string()));
        }

        if self.version.is_empty() {
            return Err(ManifestError::MissingField("version".to_string()));
        }

        if !is_valid_module_name(&self.name) {
            return Err(ManifestError::InvalidName(self.name.clone()));
        }

        if semver::Version::parse(&self.version).is_err() {
            return Err(ManifestError::InvalidVersion(self.version.clone()));
        }

        Ok(())
    }

    /// Origin flags declared by the manifest.
    pub fn origin_flags(&self) -> Origin {
        Origin::from_labels(&self.origin)
    }

    /// Display name, falling back to the technical name.
    pub fn display_name(&self) -> &str {
        if self.display_name.is_empty() { &self.name } else { &self.display_name }
    }
}

/// Checks a technical module name.
pub fn is_valid_module_name(name: &str) -> bool {
    MODULE_NAME.is_match(name)
}
