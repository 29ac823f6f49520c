//! Mod manager
//!
//! Orchestrates every mod controlled by this loader: registration,
//! validation and dependency checks, scheduling, the load and unload arms,
//! the disable protocol and failure reporting. All operations run to
//! completion on the calling thread.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::events::Event;
use crate::mods::descriptor::{LifecycleState, ModDescriptor};
use crate::mods::loader::{ImportedModule, LifecycleEngine, LoadScheduler, Selection};
use crate::mods::registry::{DiscoveredMod, ModDependencies, ModDiscovery, ModManifest, ModRegistry};
use crate::mods::report::{FailureEntry, FailureKind, FailureNotice, FailureReport};
use crate::mods::traits::{LoadCause, LoadFailureKind, ModError, ScriptImporter, UnloadCause};
use crate::mods::validation::{ManifestValidator, ValidationResult};
use crate::utils::is_valid_namespace;

/// Payload of [`ModManager::mod_loaded`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModLoadedArgs {
    pub namespace: String,
    pub cause: LoadCause,
}

/// Payload of [`ModManager::mod_unloaded`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModUnloadedArgs {
    pub namespace: String,
    pub cause: UnloadCause,
}

/// Mod manager coordinates all mods of one controller
pub struct ModManager {
    /// Loader configuration
    config: LoaderConfig,
    /// Every registered mod
    registry: ModRegistry,
    validator: ManifestValidator,
    importer: Box<dyn ScriptImporter>,
    scheduler: LoadScheduler,
    /// Information tables waiting for validation (namespace -> table)
    pending_information: HashMap<String, Option<toml::Table>>,
    /// Imported modules per mod
    modules: HashMap<String, Vec<ImportedModule>>,
    /// Namespaces in the order their loads were attempted
    load_order: Vec<String>,
    report: FailureReport,
    prepared: bool,
    mod_loaded: Arc<Event<ModLoadedArgs>>,
    mod_unloaded: Arc<Event<ModUnloadedArgs>>,
    failures: Arc<Event<FailureNotice>>,
}

impl ModManager {
    /// Create a new mod manager
    pub fn new(config: LoaderConfig, importer: Box<dyn ScriptImporter>) -> Self {
        let scheduler = LoadScheduler::new(!config.auto_load);
        Self {
            config,
            registry: ModRegistry::new(),
            validator: ManifestValidator::new(),
            importer,
            scheduler,
            pending_information: HashMap::new(),
            modules: HashMap::new(),
            load_order: Vec::new(),
            report: FailureReport::new(),
            prepared: false,
            mod_loaded: Arc::new(Event::new("mod_loaded")),
            mod_unloaded: Arc::new(Event::new("mod_unloaded")),
            failures: Arc::new(Event::new("failures")),
        }
    }

    /// Namespace of the orchestrating mod
    pub fn controller(&self) -> &str {
        &self.config.controller_namespace
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModRegistry {
        &self.registry
    }

    pub fn report(&self) -> &FailureReport {
        &self.report
    }

    pub fn scheduler(&self) -> &LoadScheduler {
        &self.scheduler
    }

    /// Published after every successful load
    pub fn mod_loaded(&self) -> &Arc<Event<ModLoadedArgs>> {
        &self.mod_loaded
    }

    /// Published after every unload
    pub fn mod_unloaded(&self) -> &Arc<Event<ModUnloadedArgs>> {
        &self.mod_unloaded
    }

    /// Published once per non-empty failure bucket at the end of a load run
    pub fn failures(&self) -> &Arc<Event<FailureNotice>> {
        &self.failures
    }

    /// Namespaces in the order their loads were attempted
    pub fn load_order(&self) -> &[String] {
        &self.load_order
    }

    /// Fully loaded mods, in load order
    pub fn list_mods(&self) -> Vec<String> {
        self.load_order
            .iter()
            .filter(|ns| self.registry.get(ns).map_or(false, |d| d.is_loaded()))
            .cloned()
            .collect()
    }

    /// Lifecycle state of a mod
    pub fn get_mod_state(&self, namespace: &str) -> Option<LifecycleState> {
        self.registry.get(namespace).map(|d| d.state())
    }

    /// Register one mod from its manifest and raw information table
    pub fn register(
        &mut self,
        manifest: ModManifest,
        directory: PathBuf,
        information: Option<toml::Table>,
    ) -> Result<(), ModError> {
        if !is_valid_namespace(&manifest.namespace) {
            return Err(ModError::InvalidManifest(format!(
                "invalid namespace '{}'",
                manifest.namespace
            )));
        }

        let namespace = manifest.namespace.clone();
        let mut descriptor = ModDescriptor::new(
            manifest.namespace,
            manifest.name,
            manifest.load_controller,
            directory,
        );
        if self.config.disabled_auto_load.contains(&namespace) {
            descriptor.set_auto_load(false);
        }

        self.registry.register(descriptor)?;
        self.pending_information.insert(namespace.clone(), information);
        self.prepared = false;
        debug!("Registered mod {}", namespace);
        Ok(())
    }

    /// Register a mod found by [`ModDiscovery`]
    pub fn register_discovered(&mut self, discovered: DiscoveredMod) -> Result<(), ModError> {
        self.register(discovered.manifest, discovered.directory, discovered.information)
    }

    /// Discover and register every mod in the configured mods directory
    ///
    /// Duplicate or invalid namespaces are logged and dropped. Returns the
    /// number of mods registered.
    pub fn discover(&mut self) -> Result<usize, ModError> {
        let discovery = ModDiscovery::new(
            &self.config.mods_dir,
            &self.config.manifest_file,
            &self.config.information_file,
        );

        let mut registered = 0;
        for discovered in discovery.discover_mods()? {
            let directory = discovered.directory.clone();
            match self.register_discovered(discovered) {
                Ok(()) => registered += 1,
                Err(e) => warn!("Dropping mod in {:?}: {}", directory, e),
            }
        }
        Ok(registered)
    }

    /// Validate pending manifests and run the dependency checks
    ///
    /// Runs again only after new registrations. Order: manifest validation,
    /// setup checks, required-mod cycles, then the cascade pass until no
    /// further mod is disabled.
    pub fn prepare(&mut self) {
        if self.prepared {
            return;
        }
        let controller = self.config.controller_namespace.clone();

        for namespace in self.registry.namespaces() {
            let Some(information) = self.pending_information.remove(&namespace) else {
                continue;
            };
            let Some(descriptor) = self.registry.get_mut(&namespace) else {
                continue;
            };
            if descriptor.is_blocked() {
                continue;
            }

            match self.validator.validate(descriptor, information.as_ref()) {
                ValidationResult::Valid => descriptor.mark_read_information(),
                ValidationResult::Invalid(errors) => {
                    if descriptor.load_controller == controller {
                        let entry = FailureEntry::new(
                            descriptor,
                            format!("invalid information: {}", errors.join("; ")),
                        );
                        self.report.record(FailureKind::InvalidSetup, entry);
                        self.disable_inner(&namespace, true);
                    }
                }
            }
        }

        for namespace in self.registry.namespaces() {
            let Some(descriptor) = self.registry.get(&namespace) else {
                continue;
            };
            if !descriptor.is_available() || descriptor.load_controller != controller {
                continue;
            }
            if let Err(reason) = ModDependencies::check_setup(&self.registry, descriptor) {
                warn!("Mod {} has an invalid setup: {}", namespace, reason);
                let entry = FailureEntry::new(descriptor, reason);
                self.report.record(FailureKind::InvalidSetup, entry);
                self.disable_inner(&namespace, false);
            }
        }

        for namespace in ModDependencies::find_requirement_cycles(&self.registry) {
            let Some(descriptor) = self.registry.get(&namespace) else {
                continue;
            };
            if descriptor.load_controller != controller {
                continue;
            }
            let entry = FailureEntry::new(descriptor, "required mods form a cycle");
            self.report.record(FailureKind::InvalidSetup, entry);
            self.disable_inner(&namespace, false);
        }

        while let Some(broken) = ModDependencies::find_broken_requirement(&self.registry, &controller) {
            if let Some(descriptor) = self.registry.get(&broken.dependent) {
                let entry = FailureEntry::new(
                    descriptor,
                    format!("required mod {} is unavailable", broken.required),
                );
                self.report.record(FailureKind::Cascade, entry);
            }
            self.disable_inner(&broken.dependent, true);
        }

        self.prepared = true;
    }

    /// Load every pending mod whose load order can be honoured
    ///
    /// Returns the number of mods loaded by this run.
    pub fn load_all(&mut self) -> Result<usize, ModError> {
        self.run_load_all(false)
    }

    /// Like [`ModManager::load_all`], but loads ready mods even when their
    /// load order hints cannot be honoured
    pub fn force_load_all(&mut self) -> Result<usize, ModError> {
        self.run_load_all(true)
    }

    fn run_load_all(&mut self, force: bool) -> Result<usize, ModError> {
        let _run = self.scheduler.begin_run()?;
        self.prepare();

        let controller = self.config.controller_namespace.clone();
        let mut pool = LoadScheduler::candidates(&self.registry, &controller);
        info!("Loading mods: {} candidates", pool.len());

        let mut loaded = 0;
        while let Some(selection) = self.scheduler.select(&self.registry, &pool, force) {
            let namespace = selection.namespace().to_string();
            if let Selection::Forced(_) = selection {
                warn!("Force loading mod {}", namespace);
            }
            pool.retain(|ns| *ns != namespace);

            match self.load_one(&namespace, LoadCause::Normal) {
                Ok(()) => loaded += 1,
                Err(e) => warn!("Mod {} failed to load: {}", namespace, e),
            }

            pool.retain(|ns| self.registry.get(ns).map_or(false, |d| d.is_loadable()));
        }

        if !pool.is_empty() {
            info!("{} mods left pending: {:?}", pool.len(), pool);
        }
        self.notify_failures();

        info!("Loaded {} mods", loaded);
        Ok(loaded)
    }

    /// Load one mod on demand
    ///
    /// The mod must be ready (loadable, required mods loaded). Load order
    /// prerequisites are enforced unless `load_if_unsafe` is set.
    pub fn load_mod(&mut self, namespace: &str, load_if_unsafe: bool) -> Result<(), LoadFailureKind> {
        self.prepare();

        let descriptor = self.registry.get(namespace).ok_or(LoadFailureKind::NotFound)?;
        self.check_loadable(descriptor)?;

        if !self.registry.is_ready_to_load(descriptor) {
            return Err(LoadFailureKind::NotReady);
        }
        if !self.registry.prerequisite_mods_loaded(descriptor) {
            if !load_if_unsafe {
                return Err(LoadFailureKind::PrerequisitesNotLoaded);
            }
            warn!(
                "Loading mod {} before its load order prerequisites",
                namespace
            );
        }

        let result = self.load_one(namespace, LoadCause::Normal);
        self.notify_failures();
        result
    }

    fn check_loadable(&self, descriptor: &ModDescriptor) -> Result<(), LoadFailureKind> {
        if descriptor.load_controller != self.config.controller_namespace {
            return Err(LoadFailureKind::NotControlled);
        }
        if descriptor.is_blocked() {
            return Err(LoadFailureKind::Blocked);
        }
        if descriptor.flags().loading() || descriptor.flags().imported() {
            return Err(LoadFailureKind::AlreadyLoaded);
        }
        if !descriptor.is_available() {
            return Err(LoadFailureKind::NotReady);
        }
        Ok(())
    }

    /// Run the load arm for one mod, handling success and failure
    fn load_one(&mut self, namespace: &str, cause: LoadCause) -> Result<(), LoadFailureKind> {
        let descriptor = self.registry.get(namespace).ok_or(LoadFailureKind::NotFound)?;
        self.check_loadable(descriptor)?;

        let Some(descriptor) = self.registry.get_mut(namespace) else {
            return Err(LoadFailureKind::NotFound);
        };
        descriptor.set_loading(true);
        self.load_order.push(namespace.to_string());

        let mut modules = Vec::new();
        let result = LifecycleEngine::load(descriptor, self.importer.as_mut(), &mut modules, cause);
        self.modules.insert(namespace.to_string(), modules);

        match result {
            Ok(()) => {
                descriptor.set_loading(false);
                self.mod_loaded.invoke(
                    &self.config.controller_namespace,
                    &ModLoadedArgs {
                        namespace: namespace.to_string(),
                        cause,
                    },
                );
                self.auto_schedule();
                Ok(())
            }
            Err(kind) => {
                let entry = FailureEntry::new(descriptor, kind.to_string());
                self.report.record(FailureKind::Loading, entry);
                // Still flagged as loading, so the disable does not unload it
                self.disable_inner(namespace, true);
                if let Some(descriptor) = self.registry.get_mut(namespace) {
                    descriptor.set_loading(false);
                }
                Err(kind)
            }
        }
    }

    /// Re-run scheduling after a successful load unless paused or already
    /// inside a load-all run
    fn auto_schedule(&mut self) {
        if self.scheduler.is_paused() || self.scheduler.is_running() {
            return;
        }
        if let Err(e) = self.run_load_all(false) {
            debug!("Auto-load skipped: {}", e);
        }
    }

    /// Unload a loaded (or partially loaded) mod
    ///
    /// Returns the hook failures of the best-effort unload.
    pub fn unload_mod(&mut self, namespace: &str) -> Result<Vec<String>, ModError> {
        let descriptor = self.controlled(namespace)?;
        if !descriptor.is_unloadable() {
            return Err(ModError::NotUnloadable(namespace.to_string()));
        }
        Ok(self.unload_inner(namespace, UnloadCause::Normal))
    }

    /// Reloading is not supported; always fails
    pub fn reload_mod(&mut self, namespace: &str) -> Result<(), ModError> {
        self.controlled(namespace)?;
        warn!("Reload requested for mod {}, which is not supported", namespace);
        Err(ModError::ReloadUnsupported(namespace.to_string()))
    }

    /// Disable a mod for the rest of the session
    ///
    /// Already disabled mods are left alone. A loaded mod is unloaded. With
    /// `cascade`, every controlled mod requiring it is disabled as well.
    pub fn disable_mod(&mut self, namespace: &str, cascade: bool) -> Result<(), ModError> {
        let descriptor = self.controlled(namespace)?;
        if descriptor.is_blocked() {
            debug!("Mod {} is already disabled", namespace);
            return Ok(());
        }
        self.disable_inner(namespace, cascade);
        self.notify_failures();
        Ok(())
    }

    /// Exclude a mod from automatic loading
    pub fn disable_mod_auto_load(&mut self, namespace: &str) -> Result<(), ModError> {
        self.controlled(namespace)?;
        if let Some(descriptor) = self.registry.get_mut(namespace) {
            descriptor.set_auto_load(false);
        }
        Ok(())
    }

    /// Include a mod in automatic loading again
    pub fn enable_mod_auto_load(&mut self, namespace: &str) -> Result<(), ModError> {
        self.controlled(namespace)?;
        if let Some(descriptor) = self.registry.get_mut(namespace) {
            descriptor.set_auto_load(true);
        }
        Ok(())
    }

    /// Stop re-scheduling after successful loads
    pub fn pause_auto_load(&mut self) {
        self.scheduler.pause();
    }

    pub fn unpause_auto_load(&mut self) {
        self.scheduler.unpause();
    }

    /// Unload every unloadable mod in reverse load order
    pub fn shutdown(&mut self) {
        info!("Shutting down mod manager");

        let order: Vec<String> = self.load_order.iter().rev().cloned().collect();
        for namespace in order {
            let unloadable = self
                .registry
                .get(&namespace)
                .map_or(false, |d| d.is_unloadable());
            if !unloadable {
                continue;
            }
            let failures = self.unload_inner(&namespace, UnloadCause::Exiting);
            if !failures.is_empty() {
                warn!("Error unloading mod {}: {}", namespace, failures.join("; "));
            }
        }

        info!("Mod manager shut down");
    }

    fn controlled(&self, namespace: &str) -> Result<&ModDescriptor, ModError> {
        let descriptor = self
            .registry
            .get(namespace)
            .ok_or_else(|| ModError::ModNotFound(namespace.to_string()))?;
        if descriptor.load_controller != self.config.controller_namespace {
            return Err(ModError::NotControlled {
                namespace: namespace.to_string(),
                controller: descriptor.load_controller.clone(),
            });
        }
        Ok(descriptor)
    }

    /// Disable protocol; cascaded mods are recorded in the cascade bucket
    ///
    /// The whole cascade is blocked first, then unloaded in reverse
    /// discovery order so dependents stop before the mods they require.
    fn disable_inner(&mut self, namespace: &str, cascade: bool) {
        let controller = self.config.controller_namespace.clone();
        let mut queue: VecDeque<(String, Option<String>)> = VecDeque::new();
        queue.push_back((namespace.to_string(), None));
        let mut disabled: Vec<String> = Vec::new();

        while let Some((current, cascade_reason)) = queue.pop_front() {
            let Some(descriptor) = self.registry.get_mut(&current) else {
                continue;
            };
            if descriptor.is_blocked() || descriptor.load_controller != controller {
                continue;
            }

            descriptor.block();
            if let Some(reason) = cascade_reason {
                warn!("Disabled mod {}: {}", current, reason);
                let entry = FailureEntry::new(descriptor, reason);
                self.report.record(FailureKind::Cascade, entry);
            } else {
                warn!("Disabled mod {}", current);
            }

            if cascade {
                for dependent in self.registry.dependents_of(&current) {
                    queue.push_back((dependent, Some(format!("required mod {} was disabled", current))));
                }
            }
            disabled.push(current);
        }

        for current in disabled.iter().rev() {
            let unloadable = self
                .registry
                .get(current)
                .map_or(false, |d| d.is_unloadable());
            if unloadable {
                self.unload_inner(current, UnloadCause::Normal);
            }
        }
    }

    fn unload_inner(&mut self, namespace: &str, cause: UnloadCause) -> Vec<String> {
        let Some(descriptor) = self.registry.get_mut(namespace) else {
            return Vec::new();
        };
        let mut modules = self.modules.remove(namespace).unwrap_or_default();
        let failures = LifecycleEngine::unload(descriptor, &mut modules, cause);
        drop(modules);

        self.mod_unloaded.invoke(
            &self.config.controller_namespace,
            &ModUnloadedArgs {
                namespace: namespace.to_string(),
                cause,
            },
        );
        failures
    }

    fn notify_failures(&mut self) {
        for notice in self.report.take_new_notices() {
            let listing: Vec<String> = notice.entries.iter().map(|e| e.to_string()).collect();
            warn!(
                "{} mods in {}: {}",
                notice.entries.len(),
                notice.kind,
                listing.join(", ")
            );
            self.failures
                .invoke(&self.config.controller_namespace, &notice);
        }
    }
}
