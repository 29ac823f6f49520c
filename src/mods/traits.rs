//! Mod system traits and interfaces
//!
//! Defines the contract between the loader and the code a mod ships: the
//! per-module lifecycle hooks, the host importer that turns module
//! identifiers into live modules, and the error types of the subsystem.

use bitflags::bitflags;
use std::fmt;
use thiserror::Error;

use crate::mods::descriptor::ModDescriptor;

/// Why a mod is being loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadCause {
    /// Regular load
    Normal,
    /// Load as part of a reload
    Reloading,
}

/// Why a mod is being unloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnloadCause {
    /// Regular unload (disable, explicit request)
    Normal,
    /// Unload as part of a reload
    Reloading,
    /// The host is shutting down
    Exiting,
}

/// Lifecycle hook phases, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Initiate,
    InitiateLate,
    Start,
    StartLate,
    StopEarly,
    Stop,
    UnloadEarly,
    Unload,
}

impl Phase {
    /// Load arm phases in execution order
    pub const LOAD: [Phase; 4] = [
        Phase::Initiate,
        Phase::InitiateLate,
        Phase::Start,
        Phase::StartLate,
    ];

    /// Unload arm phases in execution order
    pub const UNLOAD: [Phase; 4] = [
        Phase::StopEarly,
        Phase::Stop,
        Phase::UnloadEarly,
        Phase::Unload,
    ];

    /// The bit representing this phase in a [`Phases`] set
    pub fn flag(self) -> Phases {
        match self {
            Phase::Initiate => Phases::INITIATE,
            Phase::InitiateLate => Phases::INITIATE_LATE,
            Phase::Start => Phases::START,
            Phase::StartLate => Phases::START_LATE,
            Phase::StopEarly => Phases::STOP_EARLY,
            Phase::Stop => Phases::STOP,
            Phase::UnloadEarly => Phases::UNLOAD_EARLY,
            Phase::Unload => Phases::UNLOAD,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Initiate => "Initiate",
            Phase::InitiateLate => "InitiateLate",
            Phase::Start => "Start",
            Phase::StartLate => "StartLate",
            Phase::StopEarly => "StopEarly",
            Phase::Stop => "Stop",
            Phase::UnloadEarly => "UnloadEarly",
            Phase::Unload => "Unload",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Set of lifecycle hooks a script module implements
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Phases: u16 {
        const INITIATE = 1 << 0;
        const INITIATE_LATE = 1 << 1;
        const START = 1 << 2;
        const START_LATE = 1 << 3;
        const STOP_EARLY = 1 << 4;
        const STOP = 1 << 5;
        const UNLOAD_EARLY = 1 << 6;
        const UNLOAD = 1 << 7;
    }
}

/// One imported unit of mod code
///
/// Every hook defaults to a no-op. [`ScriptModule::phases`] is read once
/// when the module is imported; hooks outside that set are never called.
pub trait ScriptModule: Send {
    /// Module identifier (as resolved from the mod's script paths)
    fn name(&self) -> &str;

    /// Hooks this module wants to receive
    fn phases(&self) -> Phases {
        Phases::all()
    }

    fn initiate(&mut self, _cause: LoadCause) -> Result<(), ModError> {
        Ok(())
    }

    fn initiate_late(&mut self, _cause: LoadCause) -> Result<(), ModError> {
        Ok(())
    }

    fn start(&mut self, _cause: LoadCause) -> Result<(), ModError> {
        Ok(())
    }

    fn start_late(&mut self, _cause: LoadCause) -> Result<(), ModError> {
        Ok(())
    }

    fn stop_early(&mut self, _cause: UnloadCause) -> Result<(), ModError> {
        Ok(())
    }

    fn stop(&mut self, _cause: UnloadCause) -> Result<(), ModError> {
        Ok(())
    }

    fn unload_early(&mut self, _cause: UnloadCause) -> Result<(), ModError> {
        Ok(())
    }

    fn unload(&mut self, _cause: UnloadCause) -> Result<(), ModError> {
        Ok(())
    }
}

/// Host side importer
///
/// Resolves and executes one module of a mod, returning the live module.
/// Called in script-path declaration order during the Import phase.
pub trait ScriptImporter {
    fn import_module(
        &mut self,
        descriptor: &ModDescriptor,
        module: &str,
    ) -> Result<Box<dyn ScriptModule>, ModError>;
}

/// Reason a single load attempt did not complete
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadFailureKind {
    #[error("mod is not registered")]
    NotFound,

    #[error("mod is blocked")]
    Blocked,

    #[error("mod is not controlled by this loader")]
    NotControlled,

    #[error("mod is already loaded or loading")]
    AlreadyLoaded,

    #[error("mod is not ready to load (information missing or required mods not loaded)")]
    NotReady,

    #[error("load order prerequisites are not loaded")]
    PrerequisitesNotLoaded,

    #[error("import of module {module} failed: {reason}")]
    Import { module: String, reason: String },

    #[error("{phase} hook of module {module} failed: {reason}")]
    Hook {
        phase: Phase,
        module: String,
        reason: String,
    },
}

impl LoadFailureKind {
    /// True for failures raised by the mod's own code
    pub fn is_lifecycle_failure(&self) -> bool {
        matches!(self, LoadFailureKind::Import { .. } | LoadFailureKind::Hook { .. })
    }
}

/// Mod system errors
#[derive(Debug, Error)]
pub enum ModError {
    #[error("Mod not found: {0}")]
    ModNotFound(String),

    #[error("Mod {namespace} is controlled by '{controller}', not by this loader")]
    NotControlled {
        namespace: String,
        controller: String,
    },

    #[error("Mod {0} is blocked")]
    Blocked(String),

    #[error("Mod {0} is not unloadable in its current state")]
    NotUnloadable(String),

    #[error("Invalid mod manifest: {0}")]
    InvalidManifest(String),

    #[error("Duplicate mod namespace: {0}")]
    DuplicateNamespace(String),

    #[error("A load-all run is already in progress")]
    LoadAllInProgress,

    #[error("Reloading mod {0} is not supported")]
    ReloadUnsupported(String),

    #[error("Module import failed: {0}")]
    ImportFailed(String),

    #[error("Hook failed: {0}")]
    HookFailed(String),

    #[error("Hook panicked: {0}")]
    HookPanicked(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<toml::de::Error> for ModError {
    fn from(e: toml::de::Error) -> Self {
        ModError::SerializationError(e.to_string())
    }
}

impl From<anyhow::Error> for ModError {
    fn from(e: anyhow::Error) -> Self {
        ModError::HookFailed(e.to_string())
    }
}
