//! Mod registry and discovery
//!
//! Handles mod discovery, manifest parsing, the session registry and
//! dependency checking.

pub mod dependencies;
pub mod discovery;
pub mod manifest;
pub mod store;

pub use dependencies::{BrokenRequirement, ModDependencies};
pub use discovery::{DiscoveredMod, ModDiscovery};
pub use manifest::{load_information, ModManifest};
pub use store::ModRegistry;
