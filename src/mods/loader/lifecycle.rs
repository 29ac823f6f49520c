//! Phased lifecycle engine
//!
//! Drives one mod through the load arm (Import, Initiate, InitiateLate,
//! Start, StartLate) and the unload arm (StopEarly, Stop, UnloadEarly,
//! Unload). Load stops at the first failure and never rolls back; unload is
//! best effort and always runs every sweep.

use tracing::{debug, error, info, warn};

use crate::mods::descriptor::{LifecycleState, ModDescriptor};
use crate::mods::traits::{
    LoadCause, LoadFailureKind, ModError, Phase, Phases, ScriptImporter, ScriptModule,
    UnloadCause,
};
use crate::utils::guard_call;

/// A module imported for a mod, with the hook set it declared at import time
pub struct ImportedModule {
    id: String,
    phases: Phases,
    module: Box<dyn ScriptModule>,
}

impl ImportedModule {
    pub fn new(id: impl Into<String>, module: Box<dyn ScriptModule>) -> Self {
        let phases = module.phases();
        Self {
            id: id.into(),
            phases,
            module,
        }
    }

    /// Module identifier the mod declared
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phases(&self) -> Phases {
        self.phases
    }

    /// Run `phase` if this module declared it
    fn run(&mut self, phase: Phase, load: LoadCause, unload: UnloadCause) -> Result<(), ModError> {
        if !self.phases.contains(phase.flag()) {
            return Ok(());
        }

        let module = &mut self.module;
        guard_call(
            || match phase {
                Phase::Initiate => module.initiate(load),
                Phase::InitiateLate => module.initiate_late(load),
                Phase::Start => module.start(load),
                Phase::StartLate => module.start_late(load),
                Phase::StopEarly => module.stop_early(unload),
                Phase::Stop => module.stop(unload),
                Phase::UnloadEarly => module.unload_early(unload),
                Phase::Unload => module.unload(unload),
            },
            ModError::HookPanicked,
        )
    }
}

/// Lifecycle engine
pub struct LifecycleEngine;

impl LifecycleEngine {
    /// Run the load arm for `descriptor`
    ///
    /// The caller must have set the `Loading` flag. Imported modules are
    /// appended to `modules` as they are imported, so on failure the modules
    /// that made it in are still available to a later unload.
    pub fn load(
        descriptor: &mut ModDescriptor,
        importer: &mut dyn ScriptImporter,
        modules: &mut Vec<ImportedModule>,
        cause: LoadCause,
    ) -> Result<(), LoadFailureKind> {
        let namespace = descriptor.namespace().to_string();
        info!("Loading mod: {}", namespace);

        descriptor.set_state(LifecycleState::Importing);
        if !descriptor.mark_imported() {
            return Err(LoadFailureKind::NotReady);
        }

        for id in descriptor.modules.clone() {
            let imported = guard_call(
                || importer.import_module(descriptor, &id),
                ModError::HookPanicked,
            );
            match imported {
                Ok(module) => {
                    debug!("Imported module {} of mod {}", id, namespace);
                    modules.push(ImportedModule::new(id, module));
                }
                Err(e) => {
                    error!("Failed to import module {} of mod {}: {}", id, namespace, e);
                    return Err(LoadFailureKind::Import {
                        module: id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        descriptor.set_state(LifecycleState::Initiating);
        Self::load_sweep(&namespace, modules, Phase::Initiate, cause)?;
        descriptor.set_state(LifecycleState::InitiatedEarly);
        Self::load_sweep(&namespace, modules, Phase::InitiateLate, cause)?;
        descriptor.mark_initiated();

        descriptor.set_state(LifecycleState::Starting);
        Self::load_sweep(&namespace, modules, Phase::Start, cause)?;
        Self::load_sweep(&namespace, modules, Phase::StartLate, cause)?;
        descriptor.mark_started();
        descriptor.set_state(LifecycleState::Started);

        info!("Mod {} loaded ({} modules)", namespace, modules.len());
        Ok(())
    }

    fn load_sweep(
        namespace: &str,
        modules: &mut [ImportedModule],
        phase: Phase,
        cause: LoadCause,
    ) -> Result<(), LoadFailureKind> {
        for module in modules.iter_mut() {
            if let Err(e) = module.run(phase, cause, UnloadCause::Normal) {
                error!(
                    "{} hook of module {} (mod {}) failed: {}",
                    phase, module.id, namespace, e
                );
                return Err(LoadFailureKind::Hook {
                    phase,
                    module: module.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Run the unload arm for `descriptor`
    ///
    /// Every sweep runs over every module regardless of earlier failures.
    /// Returns one message per failed hook.
    pub fn unload(
        descriptor: &mut ModDescriptor,
        modules: &mut [ImportedModule],
        cause: UnloadCause,
    ) -> Vec<String> {
        let namespace = descriptor.namespace().to_string();
        info!("Unloading mod: {} ({:?})", namespace, cause);

        let mut failures = Vec::new();

        descriptor.set_state(LifecycleState::Stopping);
        Self::unload_sweep(&namespace, modules, Phase::StopEarly, cause, &mut failures);
        descriptor.set_state(LifecycleState::StoppedEarly);
        Self::unload_sweep(&namespace, modules, Phase::Stop, cause, &mut failures);

        descriptor.set_state(LifecycleState::Unloading);
        Self::unload_sweep(&namespace, modules, Phase::UnloadEarly, cause, &mut failures);
        Self::unload_sweep(&namespace, modules, Phase::Unload, cause, &mut failures);
        descriptor.set_state(LifecycleState::NotLoaded);

        if failures.is_empty() {
            info!("Mod {} unloaded", namespace);
        } else {
            warn!(
                "Mod {} unloaded with {} failed hooks",
                namespace,
                failures.len()
            );
        }
        failures
    }

    fn unload_sweep(
        namespace: &str,
        modules: &mut [ImportedModule],
        phase: Phase,
        cause: UnloadCause,
        failures: &mut Vec<String>,
    ) {
        for module in modules.iter_mut() {
            if let Err(e) = module.run(phase, LoadCause::Normal, cause) {
                warn!(
                    "{} hook of module {} (mod {}) failed: {}",
                    phase, module.id, namespace, e
                );
                failures.push(format!("{} hook of module {} failed: {}", phase, module.id, e));
            }
        }
    }
}
