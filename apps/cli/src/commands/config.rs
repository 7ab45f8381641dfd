//! Config command implementation.

use keystone_core::KeystoneConfig;

/// Prints the effective configuration.
pub fn execute(config: &KeystoneConfig, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}
