//! Module command implementation.
//!
//! Every subcommand runs against a manager wired from the configuration. A
//! lifecycle step that reports failure exits with a non-zero status.

use super::ModuleCommand;
use colored::Colorize;
use keystone_core::{
    ActionOptions, ImplementationCatalog, InstallSource, KeystoneConfig, Module, ModuleAction,
    ModuleDescriptor, ModuleManager, PrimaryAction, available_actions,
};
use serde_json::json;
use tabled::{Table, Tabled, settings::Style};

/// Execute the module command.
pub fn execute(
    command: ModuleCommand,
    config: &KeystoneConfig,
    options: ActionOptions,
) -> anyhow::Result<()> {
    let manager = ModuleManager::from_config(config, ImplementationCatalog::new())?;
    let options = match &command {
        ModuleCommand::Uninstall { delete, .. } => options.with_deletion(*delete),
        _ => options,
    };
    let mut batch = manager.batch_with(options);

    match command {
        ModuleCommand::Install { source } => {
            let source = InstallSource::parse(&source);
            let label = match &source {
                InstallSource::Name(name) => name.clone(),
                InstallSource::Location(path) => path.display().to_string(),
            };
            report("install", &label, batch.install(source)?)
        }
        ModuleCommand::PostInstall { name } => {
            report("post-install", &name, batch.post_install(&name)?)
        }
        ModuleCommand::Uninstall { name, .. } => report("uninstall", &name, batch.uninstall(&name)?),
        ModuleCommand::Upgrade { name, version, source } => {
            report("upgrade", &name, batch.upgrade(&name, &version, source.as_deref())?)
        }
        ModuleCommand::Enable { name } => report("enable", &name, batch.enable(&name)?),
        ModuleCommand::Disable { name } => report("disable", &name, batch.disable(&name)?),
        ModuleCommand::EnableVariant { name } => {
            report("enable-variant", &name, batch.enable_on_variant(&name)?)
        }
        ModuleCommand::DisableVariant { name } => {
            report("disable-variant", &name, batch.disable_on_variant(&name)?)
        }
        ModuleCommand::Reset { name, keep_data } => {
            report("reset", &name, batch.reset(&name, keep_data)?)
        }
        ModuleCommand::List { json, installed } => list_modules(&manager, json, installed),
        ModuleCommand::Info { name, json } => show_module_info(&manager, &name, json),
        ModuleCommand::Notifications { json, count } => show_notifications(&manager, json, count),
        ModuleCommand::Error { name } => {
            println!("{}", manager.last_error(&name));
            Ok(())
        }
    }
}

fn report(operation: &str, module: &str, result: bool) -> anyhow::Result<()> {
    if result {
        println!("{}", format!("✓ {} '{}' succeeded", operation, module).green());
        Ok(())
    } else {
        println!("{}", format!("✗ {} '{}' did not complete", operation, module).red());
        println!("{}", "  Run 'keystone-cli module error <name>' for details.".bright_black());
        anyhow::bail!("{} of module '{}' failed", operation, module)
    }
}

/// CLI spelling of an action.
fn command_name(action: ModuleAction) -> &'static str {
    match action {
        ModuleAction::EnableOnVariant => "enable-variant",
        ModuleAction::DisableOnVariant => "disable-variant",
        ModuleAction::Configure => "info",
        other => other.as_str(),
    }
}

fn command_link(action: ModuleAction, module: &ModuleDescriptor) -> String {
    format!("keystone-cli module {} {}", command_name(action), module.name)
}

fn primary_label(primary: PrimaryAction) -> &'static str {
    match primary {
        PrimaryAction::Action(action) => command_name(action),
        PrimaryAction::Buy => "buy",
    }
}

#[derive(Tabled)]
struct ModuleRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Installed")]
    installed: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Next")]
    next: String,
}

impl ModuleRow {
    fn new(module: &Module) -> Self {
        let descriptor = module.descriptor();
        let yes_no = |value: bool| String::from(if value { "yes" } else { "no" });
        Self {
            name: descriptor.name.clone(),
            version: descriptor.disk.version.clone().unwrap_or_else(|| "-".to_string()),
            installed: descriptor.database.version.clone().unwrap_or_else(|| "-".to_string()),
            enabled: yes_no(descriptor.database.active),
            next: primary_label(available_actions(descriptor).primary).to_string(),
        }
    }
}

fn module_json(module: &Module) -> serde_json::Value {
    let descriptor = module.descriptor();
    json!({
        "name": descriptor.name,
        "version": descriptor.disk.version,
        "installed_version": descriptor.database.version,
        "installed": descriptor.database.installed,
        "enabled": descriptor.database.active,
        "enabled_on_variant": descriptor.database.active_on_variant,
        "valid": module.has_valid_instance(),
    })
}

/// List modules.
fn list_modules(manager: &ModuleManager, json_output: bool, installed_only: bool) -> anyhow::Result<()> {
    let modules = if installed_only {
        manager.registry().installed_modules()?
    } else {
        manager.registry().available_modules()?
    };

    if json_output {
        let list: Vec<_> = modules.iter().map(module_json).collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    if modules.is_empty() {
        println!("{}", "No modules found.".yellow());
        println!();
        println!("{}", "Get started:".bright_black());
        println!("  Install from a local archive:");
        println!("    $ keystone-cli module install ./my-module.tar.gz");
        return Ok(());
    }

    println!();
    println!("{}", format!("Modules ({})", modules.len()).bold().green());
    println!();
    let rows: Vec<ModuleRow> = modules.iter().map(ModuleRow::new).collect();
    let table = Table::new(rows).with(Style::modern()).to_string();
    println!("{}", table);
    Ok(())
}

/// Show detailed information about a module.
fn show_module_info(manager: &ModuleManager, name: &str, json_output: bool) -> anyhow::Result<()> {
    let module = manager.registry().get_module(name)?;
    let descriptor = module.descriptor();
    if !descriptor.disk.present && !descriptor.database.installed {
        anyhow::bail!(
            "Module not found: {}. Use 'keystone-cli module list' to see available modules.",
            name
        );
    }

    let actions = available_actions(descriptor);
    if json_output {
        let info = json!({
            "module": descriptor,
            "id": manager.module_id_by_name(name)?,
            "valid": module.has_valid_instance(),
            "actions": actions,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let attributes = &descriptor.attributes;
    println!();
    println!("{}", attributes.display_name.bold().green());
    println!("  Name:        {}", descriptor.name);
    if !attributes.description.is_empty() {
        println!("  Description: {}", attributes.description.bright_black());
    }
    if !attributes.author.is_empty() {
        println!("  Author:      {}", attributes.author.bright_black());
    }
    println!("  On disk:     {}", descriptor.disk.version.as_deref().unwrap_or("-"));
    println!("  Installed:   {}", descriptor.database.version.as_deref().unwrap_or("-"));
    println!("  Enabled:     {}", descriptor.database.active);
    println!("  Variant:     {}", descriptor.database.active_on_variant);
    if !module.has_valid_instance() {
        println!("  {}", "No usable implementation found.".red());
    }
    if let Some(warning) = &attributes.warning {
        println!("  {}", format!("⚠ {}", warning).yellow());
    }
    let names: Vec<&str> = actions.actions.iter().map(|a| command_name(*a)).collect();
    println!("  Actions:     {}", names.join(", "));
    println!("  Primary:     {}", primary_label(actions.primary));
    Ok(())
}

/// Show installed modules that need attention.
fn show_notifications(manager: &ModuleManager, json_output: bool, count_only: bool) -> anyhow::Result<()> {
    if count_only {
        let counts = manager.count_modules_with_notifications()?;
        if json_output {
            println!("{}", serde_json::to_string_pretty(&counts)?);
        } else {
            println!("to configure: {}", counts.to_configure);
            println!("to update:    {}", counts.to_update);
            println!("total:        {}", counts.count);
        }
        return Ok(());
    }

    let buckets = manager.modules_with_notifications(&command_link, |collection| collection)?;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&buckets)?);
        return Ok(());
    }

    if buckets.to_configure.is_empty() && buckets.to_update.is_empty() {
        println!("{}", "No modules need attention.".green());
        return Ok(());
    }
    for (title, collection) in [("To configure", &buckets.to_configure), ("To update", &buckets.to_update)] {
        if collection.is_empty() {
            continue;
        }
        println!("{}", format!("{} ({})", title, collection.len()).bold().yellow());
        for item in &collection.items {
            println!("  {}", item.descriptor.name.bold());
            for link in item.links.values() {
                println!("    $ {}", link.bright_black());
            }
            if let Some(warning) = &item.warning {
                println!("    {}", format!("⚠ {}", warning).yellow());
            }
        }
    }
    Ok(())
}
