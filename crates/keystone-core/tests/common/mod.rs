//! Shared fixtures for Keystone Core integration tests.

#![allow(dead_code)]

use keystone_core::acquisition::{AcquisitionError, archive};
use keystone_core::lifecycle::{ModuleManagerBuilder, UpgradeError};
use keystone_core::modules::MANIFEST_FILE;
use keystone_core::{
    AcquisitionService, CacheInvalidator, EventKind, EventNotifier, HookError, HookResult,
    ImplementationCatalog, LifecycleHooks, LocalRegistry, MemoryStateStore, ModuleAction,
    ModuleDescriptor, ModuleManager, ModuleRegistry, PermissionGate, Resettable, StateStore,
    UpgradeRunner,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::TempDir;

/// Hook implementation that records every call.
pub struct RecordingHooks {
    install_result: bool,
    install_error: Option<String>,
    enable_error: Option<String>,
    resettable: bool,
    warning: Option<String>,
    errors: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self {
            install_result: true,
            install_error: None,
            enable_error: None,
            resettable: false,
            warning: None,
            errors: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn declining_install(mut self) -> Self {
        self.install_result = false;
        self
    }

    pub fn failing_install(mut self, message: &str) -> Self {
        self.install_error = Some(message.to_string());
        self
    }

    pub fn failing_enable(mut self, message: &str) -> Self {
        self.enable_error = Some(message.to_string());
        self
    }

    pub fn resettable(mut self) -> Self {
        self.resettable = true;
        self
    }

    pub fn with_warning(mut self, warning: &str) -> Self {
        self.warning = Some(warning.to_string());
        self
    }

    pub fn with_errors(mut self, errors: &[&str]) -> Self {
        self.errors = errors.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl LifecycleHooks for RecordingHooks {
    fn install(&self) -> HookResult {
        self.record("install");
        match &self.install_error {
            Some(message) => Err(HookError::failed(message.clone())),
            None => Ok(self.install_result),
        }
    }

    fn uninstall(&self) -> HookResult {
        self.record("uninstall");
        Ok(true)
    }

    fn post_install(&self) -> HookResult {
        self.record("post_install");
        Ok(true)
    }

    fn upgrade(&self, version: &str) -> HookResult {
        self.record(format!("upgrade:{}", version));
        Ok(true)
    }

    fn enable(&self) -> HookResult {
        self.record("enable");
        match &self.enable_error {
            Some(message) => Err(HookError::failed(message.clone())),
            None => Ok(true),
        }
    }

    fn disable(&self) -> HookResult {
        self.record("disable");
        Ok(true)
    }

    fn enable_variant(&self) -> HookResult {
        self.record("enable_variant");
        Ok(true)
    }

    fn disable_variant(&self) -> HookResult {
        self.record("disable_variant");
        Ok(true)
    }

    fn as_resettable(&self) -> Option<&dyn Resettable> {
        if self.resettable { Some(self) } else { None }
    }

    fn warning(&self) -> Option<String> {
        self.warning.clone()
    }

    fn errors(&self) -> Vec<String> {
        self.errors.clone()
    }
}

impl Resettable for RecordingHooks {
    fn reset(&self) -> HookResult {
        self.record("reset");
        Ok(true)
    }
}

/// Acquisition double that writes packages into the modules directory and
/// records every call.
pub struct StubAcquisition {
    modules_dir: PathBuf,
    marketplace: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
    fail_deletes: AtomicBool,
}

impl StubAcquisition {
    pub fn new(modules_dir: PathBuf) -> Self {
        Self {
            modules_dir,
            marketplace: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Makes every later deletion fail.
    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    /// Publishes a manifest the next pull of `name` will write to disk.
    pub fn publish(&self, name: &str, manifest_json: &str) {
        self.marketplace.lock().unwrap().insert(name.to_string(), manifest_json.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl AcquisitionService for StubAcquisition {
    fn resolve_name_from_package(&self, location: &Path) -> keystone_core::acquisition::Result<String> {
        self.record(format!("resolve:{}", location.display()));
        Ok(archive::read_manifest(location)?.name)
    }

    fn materialize_from_location(&self, location: &Path) -> keystone_core::acquisition::Result<()> {
        self.record(format!("materialize:{}", location.display()));
        let name = archive::read_manifest(location)?.name;
        archive::copy_dir_all(location, &self.modules_dir.join(name))?;
        Ok(())
    }

    fn pull_from_marketplace(&self, name: &str) -> keystone_core::acquisition::Result<()> {
        self.record(format!("pull:{}", name));
        let manifest = self.marketplace.lock().unwrap().get(name).cloned();
        match manifest {
            Some(json) => {
                let dir = self.modules_dir.join(name);
                std::fs::create_dir_all(&dir)?;
                std::fs::write(dir.join(MANIFEST_FILE), json)?;
                Ok(())
            }
            None => Err(AcquisitionError::NotOnMarketplace(name.to_string())),
        }
    }

    fn delete_from_disk(&self, name: &str) -> keystone_core::acquisition::Result<()> {
        self.record(format!("delete:{}", name));
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AcquisitionError::Io(std::io::Error::other("permission denied")));
        }
        let dir = self.modules_dir.join(name);
        if !dir.is_dir() {
            return Err(AcquisitionError::NotOnDisk(name.to_string()));
        }
        std::fs::remove_dir_all(dir)?;
        Ok(())
    }
}

/// Counts cache clears.
#[derive(Default)]
pub struct CountingInvalidator {
    clears: AtomicUsize,
}

impl CountingInvalidator {
    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl CacheInvalidator for CountingInvalidator {
    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records published events as `(kind, module name)`.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(EventKind, String)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(EventKind, String)> {
        self.events.lock().unwrap().clone()
    }
}

impl EventNotifier for RecordingNotifier {
    fn publish(&self, kind: EventKind, module: &ModuleDescriptor) {
        self.events.lock().unwrap().push((kind, module.name.clone()));
    }
}

/// Denies listed actions; a rule without a module applies to every module.
pub struct DenyGate {
    rules: Vec<(ModuleAction, Option<String>)>,
}

impl DenyGate {
    pub fn new(rules: &[(ModuleAction, Option<&str>)]) -> Self {
        Self { rules: rules.iter().map(|(a, m)| (*a, m.map(str::to_string))).collect() }
    }
}

impl PermissionGate for DenyGate {
    fn is_allowed(&self, action: ModuleAction, module: Option<&str>) -> bool {
        !self.rules.iter().any(|(denied, denied_module)| {
            *denied == action && (denied_module.is_none() || denied_module.as_deref() == module)
        })
    }
}

/// Upgrade runner with a fixed answer.
pub struct ScriptedRunner {
    result: bool,
    calls: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new(result: bool) -> Self {
        Self { result, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl UpgradeRunner for ScriptedRunner {
    fn run_migrations(&self, _name: &str) -> Result<bool, UpgradeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result)
    }
}

/// A modules directory, an in-memory store and recording collaborators.
pub struct Fixture {
    pub temp_dir: TempDir,
    pub store: Arc<MemoryStateStore>,
    pub acquisition: Arc<StubAcquisition>,
    pub cache: Arc<CountingInvalidator>,
    pub events: Arc<RecordingNotifier>,
    catalog: ImplementationCatalog,
}

impl Fixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let modules_dir = temp_dir.path().join("modules");
        std::fs::create_dir_all(&modules_dir).unwrap();
        Self {
            acquisition: Arc::new(StubAcquisition::new(modules_dir)),
            temp_dir,
            store: Arc::new(MemoryStateStore::new()),
            cache: Arc::new(CountingInvalidator::default()),
            events: Arc::new(RecordingNotifier::default()),
            catalog: ImplementationCatalog::new(),
        }
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.temp_dir.path().join("modules")
    }

    pub fn register(&mut self, name: &str, hooks: Arc<dyn LifecycleHooks>) {
        self.catalog.register(name, hooks);
    }

    /// Writes `<modules>/<name>/keystone-module.json`.
    pub fn write_module(&self, name: &str, version: &str, origin: &[&str], kind: &str) {
        write_manifest(&self.modules_dir().join(name), name, version, origin, kind);
    }

    /// Marks a module installed at `version` without running hooks.
    pub fn install_record(&self, name: &str, version: &str) {
        self.store.insert(name, Some(version)).unwrap();
    }

    pub fn registry(&self) -> Arc<dyn ModuleRegistry> {
        Arc::new(LocalRegistry::new(
            self.modules_dir(),
            Arc::clone(&self.store) as Arc<dyn StateStore>,
            self.catalog.clone(),
        ))
    }

    pub fn builder(&self) -> ModuleManagerBuilder {
        ModuleManager::builder(self.registry(), Arc::clone(&self.acquisition) as Arc<dyn AcquisitionService>)
            .cache(Arc::clone(&self.cache) as Arc<dyn CacheInvalidator>)
            .events(Arc::clone(&self.events) as Arc<dyn EventNotifier>)
    }

    pub fn manager(&self) -> ModuleManager {
        self.builder().build()
    }
}

/// Writes a manifest into `dir`.
pub fn write_manifest(dir: &Path, name: &str, version: &str, origin: &[&str], kind: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(MANIFEST_FILE), manifest_json(name, version, origin, kind)).unwrap();
}

pub fn manifest_json(name: &str, version: &str, origin: &[&str], kind: &str) -> String {
    serde_json::json!({
        "name": name,
        "version": version,
        "display_name": name,
        "origin": origin,
        "kind": kind,
    })
    .to_string()
}
