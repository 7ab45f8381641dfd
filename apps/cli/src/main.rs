//! Keystone CLI - Command-line interface for Keystone module management
//!
//! This CLI provides a `keystone-cli` command for installing, upgrading,
//! toggling and inspecting the modules of a host application.

mod commands;

use clap::{Parser, Subcommand};
use commands::{ModuleCommand, config, module};
use keystone_core::{ActionOptions, KeystoneConfig};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Keystone CLI - module lifecycle management
#[derive(Parser, Debug)]
#[command(
    name = "keystone-cli",
    author,
    version,
    about = "Keystone - module lifecycle management",
    long_about = "Keystone manages the modules of a host application.\nModules are installed from disk, archives or the marketplace, then enabled, upgraded, reset and uninstalled."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Configuration file
    #[arg(short, long, default_value = "keystone.toml", global = true)]
    config: PathBuf,

    /// Modules directory (overrides the configuration file)
    #[arg(long, global = true)]
    modules_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Module lifecycle operations
    ///
    /// Install, uninstall, upgrade, enable, disable and reset modules, and
    /// inspect their state.
    Module {
        /// Do not clear the host cache after successful operations
        #[arg(long)]
        no_cache_clear: bool,

        #[command(subcommand)]
        command: ModuleCommand,
    },

    /// Show the effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut keystone_config = KeystoneConfig::load(&args.config)?;
    if let Some(modules_dir) = args.modules_dir {
        keystone_config.modules_dir = modules_dir;
    }

    match args.command {
        Command::Module { no_cache_clear, command } => {
            let options = ActionOptions::default().with_cache_clear(!no_cache_clear);
            module::execute(command, &keystone_config, options)
        }
        Command::Config { json } => config::execute(&keystone_config, json),
    }
}
