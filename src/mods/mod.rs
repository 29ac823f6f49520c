//! Mod system
//!
//! Discovers independently authored mods, validates their information,
//! resolves dependencies and load order, and drives each mod through its
//! phased load and unload lifecycle.
//!
//! ## Architecture
//!
//! - **Registry**: every discovered mod keeps one descriptor for the session
//! - **Validation**: information fields are checked one by one; any failure disables the mod
//! - **Dependencies**: missing, incompatible or out-of-range mods disable locally, broken requirements cascade
//! - **Scheduling**: mods load once their requirements and load order hints are satisfied
//! - **Failure containment**: a failing or panicking hook disables its own mod only

pub mod descriptor;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod report;
pub mod traits;
pub mod validation;

pub use descriptor::{
    CompatibilityRange, Distribution, LifecycleFlags, LifecycleState, ModDescriptor, Rating,
};
pub use loader::{ImportedModule, LifecycleEngine, LoadScheduler, RunGuard, Selection, StaticImporter};
pub use manager::{ModLoadedArgs, ModManager, ModUnloadedArgs};
pub use registry::{DiscoveredMod, ModDependencies, ModDiscovery, ModManifest, ModRegistry};
pub use report::{FailureEntry, FailureKind, FailureNotice, FailureReport};
pub use traits::{
    LoadCause, LoadFailureKind, ModError, Phase, Phases, ScriptImporter, ScriptModule, UnloadCause,
};
pub use validation::{ManifestValidator, ValidationResult};
