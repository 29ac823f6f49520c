//! Mod Loader - dependency resolution, phased lifecycle and function
//! interception for third-party mods of a closed game runtime
//!
//! This crate discovers independently authored mods, validates their
//! information files, resolves required/incompatible mods and load order
//! hints, and drives every mod through a phased load and unload lifecycle.
//! Mods may intercept host functions through the patch engine, and the
//! loader publishes lifecycle notifications on weakly held events.
//!
//! ## Components
//!
//! 1. Event bus (`events`)
//! 2. Mod registry, manifest validator and dependency checker (`mods`)
//! 3. Load scheduler and lifecycle engine (`mods::loader`)
//! 4. Mod manager orchestrating all of the above (`mods::manager`)
//! 5. Function interception and announcers (`patch`)
//!
//! ## Design Principles
//!
//! 1. **Single controller**: a mod is only loaded, unloaded or disabled by the loader it names
//! 2. **Monotonic state**: a disabled mod stays disabled for the session
//! 3. **Failure containment**: mod code that fails or panics takes down its own mod only

pub mod config;
pub mod events;
pub mod mods;
pub mod patch;
pub mod utils;

// Re-export config module
pub use config::*;

pub use events::{Event, EventError, Subscription, SubscriptionId};
pub use mods::{
    LoadCause, LoadFailureKind, ModDescriptor, ModError, ModManager, ScriptImporter, ScriptModule,
    StaticImporter, UnloadCause,
};
pub use patch::{CallError, HookSlot, HostObject, PatchKind, Patcher, Replacement};
