//! Command type definitions for the CLI.

use clap::Subcommand;
use std::path::PathBuf;

/// Module subcommands
#[derive(Subcommand, Debug)]
pub enum ModuleCommand {
    /// Install a module by name, from a module directory or from a .tar.gz archive
    ///
    /// Installing a module that is already installed upgrades it instead.
    ///
    /// # Examples
    ///
    /// Install a module found in the modules directory or on the marketplace:
    ///   $ keystone-cli module install mailalert
    ///
    /// Install from a local archive:
    ///   $ keystone-cli module install ./mailalert-2.1.0.tar.gz
    Install {
        /// Module name, package directory or archive
        source: String,
    },

    /// Run the follow-up step of an installed module
    PostInstall {
        /// Module name
        name: String,
    },

    /// Uninstall a module
    ///
    /// # Examples
    ///
    /// Uninstall but keep the files:
    ///   $ keystone-cli module uninstall mailalert
    ///
    /// Uninstall and delete the module directory:
    ///   $ keystone-cli module uninstall mailalert --delete
    Uninstall {
        /// Module name
        name: String,

        /// Delete the module files as well
        #[arg(long)]
        delete: bool,
    },

    /// Upgrade an installed module
    Upgrade {
        /// Module name
        name: String,

        /// Target version
        #[arg(long, default_value = "latest")]
        version: String,

        /// Package directory or archive to upgrade from
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Enable an installed module
    Enable {
        /// Module name
        name: String,
    },

    /// Disable an installed module
    Disable {
        /// Module name
        name: String,
    },

    /// Enable a module on the variant surface
    EnableVariant {
        /// Module name
        name: String,
    },

    /// Disable a module on the variant surface
    DisableVariant {
        /// Module name
        name: String,
    },

    /// Reset a module
    ///
    /// Without --keep-data the module is uninstalled and installed again.
    Reset {
        /// Module name
        name: String,

        /// Reset through the module's own reset step, keeping its data
        #[arg(long)]
        keep_data: bool,
    },

    /// List modules on disk or installed
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Only show installed modules
        #[arg(long)]
        installed: bool,
    },

    /// Show detailed information about a module
    Info {
        /// Module name
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show installed modules that need configuration or have an update
    Notifications {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Only print the counts
        #[arg(long)]
        count: bool,
    },

    /// Show the latest error reported by a module
    Error {
        /// Module name
        name: String,
    },
}
