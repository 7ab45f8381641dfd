//! Integration tests for the `keystone-cli module` command.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes an offline configuration and returns its path.
fn init_workspace(temp_dir: &TempDir) -> PathBuf {
    let root = temp_dir.path();
    let config = format!(
        "modules_dir = {:?}\nstate_db = {:?}\n\n[marketplace]\nenabled = false\n",
        root.join("modules"),
        root.join("state").join("keystone.db"),
    );
    let path = root.join("keystone.toml");
    fs::write(&path, config).unwrap();
    fs::create_dir_all(root.join("modules")).unwrap();
    path
}

fn write_module(temp_dir: &TempDir, name: &str, version: &str) {
    let dir = temp_dir.path().join("modules").join(name);
    fs::create_dir_all(&dir).unwrap();
    let manifest = serde_json::json!({
        "name": name,
        "version": version,
        "display_name": format!("{name} module"),
        "description": "Sends alerts",
        "origin": ["disk"],
        "kind": "declarative",
    });
    fs::write(dir.join("keystone-module.json"), manifest.to_string()).unwrap();
}

fn keystone(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("keystone-cli").unwrap();
    cmd.env_remove("KEYSTONE_MODULES_DIR").arg("--config").arg(config);
    cmd
}

#[test]
fn test_module_list_empty() {
    let temp_dir = TempDir::new().unwrap();
    let config = init_workspace(&temp_dir);

    keystone(&config)
        .args(["module", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No modules found"));
}

#[test]
fn test_module_install_enable_disable() {
    let temp_dir = TempDir::new().unwrap();
    let config = init_workspace(&temp_dir);
    write_module(&temp_dir, "mailalert", "1.0.0");

    keystone(&config)
        .args(["module", "install", "mailalert"])
        .assert()
        .success()
        .stdout(predicate::str::contains("succeeded"));

    keystone(&config).args(["module", "disable", "mailalert"]).assert().success();

    let output = keystone(&config).args(["module", "list", "--json"]).output().unwrap();
    assert!(output.status.success());
    let list: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(list[0]["name"], "mailalert");
    assert_eq!(list[0]["installed"], true);
    assert_eq!(list[0]["enabled"], false);

    keystone(&config).args(["module", "enable", "mailalert"]).assert().success();
    keystone(&config)
        .args(["module", "list", "--installed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mailalert"));
}

#[test]
fn test_module_install_unknown_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = init_workspace(&temp_dir);

    keystone(&config)
        .args(["module", "install", "nonexistent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nonexistent"));
}

#[test]
fn test_module_enable_not_installed_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = init_workspace(&temp_dir);
    write_module(&temp_dir, "mailalert", "1.0.0");

    keystone(&config)
        .args(["module", "enable", "mailalert"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not installed"));
}

#[test]
fn test_module_uninstall_with_delete() {
    let temp_dir = TempDir::new().unwrap();
    let config = init_workspace(&temp_dir);
    write_module(&temp_dir, "mailalert", "1.0.0");

    keystone(&config).args(["module", "install", "mailalert"]).assert().success();
    keystone(&config)
        .args(["module", "uninstall", "mailalert", "--delete"])
        .assert()
        .success();

    assert!(!temp_dir.path().join("modules").join("mailalert").exists());
    keystone(&config)
        .args(["module", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No modules found"));
}

#[test]
fn test_module_info() {
    let temp_dir = TempDir::new().unwrap();
    let config = init_workspace(&temp_dir);
    write_module(&temp_dir, "mailalert", "1.0.0");

    keystone(&config)
        .args(["module", "info", "mailalert"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mailalert module"))
        .stdout(predicate::str::contains("install"));

    let output = keystone(&config).args(["module", "info", "mailalert", "--json"]).output().unwrap();
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["module"]["name"], "mailalert");
    assert_eq!(info["id"], 0);
    assert_eq!(info["actions"]["primary"]["action"], "install");
}

#[test]
fn test_module_info_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let config = init_workspace(&temp_dir);

    keystone(&config).args(["module", "info", "nonexistent"]).assert().failure();
}

#[test]
fn test_module_notifications_after_disk_update() {
    let temp_dir = TempDir::new().unwrap();
    let config = init_workspace(&temp_dir);
    write_module(&temp_dir, "mailalert", "1.0.0");
    keystone(&config).args(["module", "install", "mailalert"]).assert().success();

    keystone(&config)
        .args(["module", "notifications"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No modules need attention"));

    write_module(&temp_dir, "mailalert", "1.1.0");
    let output =
        keystone(&config).args(["module", "notifications", "--count", "--json"]).output().unwrap();
    let counts: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(counts["to_update"], 1);
    assert_eq!(counts["count"], 1);

    keystone(&config)
        .args(["module", "notifications"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keystone-cli module upgrade mailalert"));

    keystone(&config).args(["module", "upgrade", "mailalert"]).assert().success();
    keystone(&config)
        .args(["module", "notifications", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("total:        0"));
}

#[test]
fn test_module_error_without_details() {
    let temp_dir = TempDir::new().unwrap();
    let config = init_workspace(&temp_dir);
    write_module(&temp_dir, "mailalert", "1.0.0");

    keystone(&config)
        .args(["module", "error", "mailalert"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_module_no_cache_clear() {
    let temp_dir = TempDir::new().unwrap();
    let config = init_workspace(&temp_dir);
    let cache = temp_dir.path().join("cache");
    fs::create_dir_all(&cache).unwrap();
    fs::write(cache.join("index.json"), "{}").unwrap();
    let mut content = fs::read_to_string(&config).unwrap();
    content = format!("cache_dirs = [{:?}]\n{}", cache, content);
    fs::write(&config, content).unwrap();
    write_module(&temp_dir, "mailalert", "1.0.0");

    keystone(&config)
        .args(["module", "--no-cache-clear", "install", "mailalert"])
        .assert()
        .success();
    assert!(cache.join("index.json").exists());

    keystone(&config).args(["module", "disable", "mailalert"]).assert().success();
    assert!(!cache.join("index.json").exists());
}

#[test]
fn test_config_shows_effective_values() {
    let temp_dir = TempDir::new().unwrap();
    let config = init_workspace(&temp_dir);

    keystone(&config)
        .args(["config", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"enabled\": false"));
}
