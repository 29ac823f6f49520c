//! Mod loading
//!
//! Script import, the phased lifecycle engine and the load scheduler.

pub mod importer;
pub mod lifecycle;
pub mod scheduler;

pub use importer::{ModuleFactory, StaticImporter};
pub use lifecycle::{ImportedModule, LifecycleEngine};
pub use scheduler::{LoadScheduler, RunGuard, Selection};
