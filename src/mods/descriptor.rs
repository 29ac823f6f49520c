//! Mod descriptor
//!
//! The record the loader keeps for every discovered mod: identity, the
//! information read from its manifest, and its lifecycle flags.

use semver::Version;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Content rating declared by a mod
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Rating {
    #[default]
    Normal,
    Nsfw,
}

/// Where a mod is distributed and checked for updates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Distribution {
    /// Update platform identifier
    pub platform: Option<String>,
    /// Download / project page
    pub url: Option<String>,
}

/// Version interval a mod requires of another installed mod
///
/// Missing bounds are unbounded; present bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityRange {
    pub namespace: String,
    pub lowest_version: Option<Version>,
    pub highest_version: Option<Version>,
}

impl CompatibilityRange {
    /// Whether `version` falls within this range
    pub fn contains(&self, version: &Version) -> bool {
        if let Some(lowest) = &self.lowest_version {
            if version < lowest {
                return false;
            }
        }
        if let Some(highest) = &self.highest_version {
            if version > highest {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for CompatibilityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lowest = self
            .lowest_version
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "*".to_string());
        let highest = self
            .highest_version
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "*".to_string());
        write!(f, "{} [{}, {}]", self.namespace, lowest, highest)
    }
}

/// Lifecycle state machine position
///
/// Load arm: NotLoaded → Importing → Initiating → InitiatedEarly → Starting → Started.
/// Unload arm: Stopping → StoppedEarly → Unloading → NotLoaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    #[default]
    NotLoaded,
    Importing,
    Initiating,
    InitiatedEarly,
    Starting,
    Started,
    Stopping,
    StoppedEarly,
    Unloading,
}

/// Session flags; none of them is ever cleared once set, except `loading`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleFlags {
    blocked: bool,
    loading: bool,
    read_information: bool,
    imported: bool,
    initiated: bool,
    started: bool,
}

impl LifecycleFlags {
    pub fn blocked(&self) -> bool {
        self.blocked
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn read_information(&self) -> bool {
        self.read_information
    }

    pub fn imported(&self) -> bool {
        self.imported
    }

    pub fn initiated(&self) -> bool {
        self.initiated
    }

    pub fn started(&self) -> bool {
        self.started
    }

    /// Started ⇒ Initiated ⇒ Imported
    pub fn is_consistent(&self) -> bool {
        (!self.started || self.initiated) && (!self.initiated || self.imported)
    }
}

/// Everything the loader knows about one mod
#[derive(Debug, Clone)]
pub struct ModDescriptor {
    // Identity (from the manifest, immutable)
    namespace: String,
    pub name: String,
    pub load_controller: String,
    pub directory: PathBuf,

    // Information (filled by the manifest validator)
    pub author: String,
    pub version: Version,
    pub version_display: String,
    pub rating: Rating,
    pub distribution: Distribution,
    pub build_date: Option<String>,
    pub build_game_version: Option<String>,

    // Dependencies
    pub required_mods: BTreeSet<String>,
    pub incompatible_mods: BTreeSet<String>,
    pub load_after: BTreeSet<String>,
    pub load_before: BTreeSet<String>,
    pub compatibility: Vec<CompatibilityRange>,

    // Loadability
    pub script_paths: Vec<PathBuf>,
    pub modules: Vec<String>,

    flags: LifecycleFlags,
    state: LifecycleState,
    auto_load: bool,
}

impl ModDescriptor {
    /// Create a descriptor with default information
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        load_controller: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            load_controller: load_controller.into(),
            directory: directory.into(),
            author: String::new(),
            version: Version::new(0, 0, 0),
            version_display: String::new(),
            rating: Rating::default(),
            distribution: Distribution::default(),
            build_date: None,
            build_game_version: None,
            required_mods: BTreeSet::new(),
            incompatible_mods: BTreeSet::new(),
            load_after: BTreeSet::new(),
            load_before: BTreeSet::new(),
            compatibility: Vec::new(),
            script_paths: Vec::new(),
            modules: Vec::new(),
            flags: LifecycleFlags::default(),
            state: LifecycleState::NotLoaded,
            auto_load: true,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn flags(&self) -> LifecycleFlags {
        self.flags
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether the scheduler may pick this mod on its own
    pub fn auto_load(&self) -> bool {
        self.auto_load
    }

    pub fn is_blocked(&self) -> bool {
        self.flags.blocked
    }

    /// Information read and not blocked: usable as a dependency
    pub fn is_available(&self) -> bool {
        !self.flags.blocked && self.flags.read_information
    }

    /// Available and never imported: a load may be attempted
    pub fn is_loadable(&self) -> bool {
        self.is_available() && !self.flags.loading && !self.flags.imported
    }

    /// Fully through the load arm
    pub fn is_loaded(&self) -> bool {
        self.flags.started && self.state == LifecycleState::Started
    }

    /// Imported, not mid-load and not already back at NotLoaded
    pub fn is_unloadable(&self) -> bool {
        self.flags.imported && !self.flags.loading && self.state != LifecycleState::NotLoaded
    }

    /// "name version" for user-facing reports
    pub fn display_label(&self) -> String {
        if self.version_display.is_empty() {
            format!("{} {}", self.name, self.version)
        } else {
            format!("{} {}", self.name, self.version_display)
        }
    }

    pub(crate) fn set_auto_load(&mut self, enabled: bool) {
        self.auto_load = enabled;
    }

    pub(crate) fn set_state(&mut self, state: LifecycleState) {
        self.state = state;
    }

    /// Sticky: there is no way to clear it again
    pub(crate) fn block(&mut self) {
        self.flags.blocked = true;
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.flags.loading = loading;
    }

    pub(crate) fn mark_read_information(&mut self) {
        self.flags.read_information = true;
    }

    /// Returns false (and changes nothing) when no load is in progress
    pub(crate) fn mark_imported(&mut self) -> bool {
        if !self.flags.loading {
            return false;
        }
        self.flags.imported = true;
        true
    }

    pub(crate) fn mark_initiated(&mut self) -> bool {
        if !self.flags.imported {
            return false;
        }
        self.flags.initiated = true;
        true
    }

    pub(crate) fn mark_started(&mut self) -> bool {
        if !self.flags.initiated {
            return false;
        }
        self.flags.started = true;
        true
    }

    /// Reset every information, dependency and loadability field to its
    /// empty default. Used when the manifest fails validation.
    pub(crate) fn reset_information(&mut self) {
        self.author.clear();
        self.version = Version::new(0, 0, 0);
        self.version_display.clear();
        self.rating = Rating::default();
        self.distribution = Distribution::default();
        self.build_date = None;
        self.build_game_version = None;
        self.required_mods.clear();
        self.incompatible_mods.clear();
        self.load_after.clear();
        self.load_before.clear();
        self.compatibility.clear();
        self.script_paths.clear();
        self.modules.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ModDescriptor {
        ModDescriptor::new("Alpha", "Alpha Mod", "Main", "/mods/alpha")
    }

    #[test]
    fn test_compatibility_range_bounds() {
        let range = CompatibilityRange {
            namespace: "Beta".into(),
            lowest_version: Some(Version::new(1, 0, 0)),
            highest_version: Some(Version::new(2, 0, 0)),
        };
        assert!(range.contains(&Version::new(1, 0, 0)));
        assert!(range.contains(&Version::new(2, 0, 0)));
        assert!(!range.contains(&Version::new(0, 9, 9)));
        assert!(!range.contains(&Version::new(2, 0, 1)));

        let open = CompatibilityRange {
            namespace: "Beta".into(),
            lowest_version: None,
            highest_version: None,
        };
        assert!(open.contains(&Version::new(99, 0, 0)));
        assert_eq!(open.to_string(), "Beta [*, *]");
    }

    #[test]
    fn test_flags_cannot_skip_phases() {
        let mut d = descriptor();
        assert!(!d.mark_imported());
        assert!(!d.mark_initiated());
        assert!(!d.mark_started());
        assert!(d.flags().is_consistent());

        d.set_loading(true);
        assert!(d.mark_imported());
        assert!(d.mark_initiated());
        assert!(d.mark_started());
        assert!(d.flags().is_consistent());
    }

    #[test]
    fn test_loadability_predicates() {
        let mut d = descriptor();
        assert!(!d.is_available());
        d.mark_read_information();
        assert!(d.is_loadable());

        d.block();
        assert!(!d.is_available());
        assert!(!d.is_loadable());
        assert!(d.is_blocked());
    }

    #[test]
    fn test_reset_information_clears_dependencies() {
        let mut d = descriptor();
        d.required_mods.insert("Beta".into());
        d.load_after.insert("Gamma".into());
        d.modules.push("alpha.main".into());
        d.version = Version::new(1, 2, 3);

        d.reset_information();
        assert!(d.required_mods.is_empty());
        assert!(d.load_after.is_empty());
        assert!(d.modules.is_empty());
        assert_eq!(d.version, Version::new(0, 0, 0));
        assert_eq!(d.namespace(), "Alpha");
    }
}
