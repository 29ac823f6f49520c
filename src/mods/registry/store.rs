//! Mod registry
//!
//! Owns every [`ModDescriptor`] for the session, keyed by namespace and kept
//! in registration order. Descriptors are never removed.

use std::collections::HashMap;

use crate::mods::descriptor::ModDescriptor;
use crate::mods::traits::ModError;

/// Registry of discovered mods
#[derive(Debug, Default)]
pub struct ModRegistry {
    mods: Vec<ModDescriptor>,
    index: HashMap<String, usize>,
}

impl ModRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor; the first registration of a namespace wins
    pub fn register(&mut self, descriptor: ModDescriptor) -> Result<(), ModError> {
        let namespace = descriptor.namespace().to_string();
        if self.index.contains_key(&namespace) {
            return Err(ModError::DuplicateNamespace(namespace));
        }
        self.index.insert(namespace, self.mods.len());
        self.mods.push(descriptor);
        Ok(())
    }

    pub fn get(&self, namespace: &str) -> Option<&ModDescriptor> {
        self.index.get(namespace).map(|&i| &self.mods[i])
    }

    pub(crate) fn get_mut(&mut self, namespace: &str) -> Option<&mut ModDescriptor> {
        match self.index.get(namespace) {
            Some(&i) => Some(&mut self.mods[i]),
            None => None,
        }
    }

    /// Whether a mod with this namespace is installed
    pub fn contains(&self, namespace: &str) -> bool {
        self.index.contains_key(namespace)
    }

    /// Descriptors in registration order
    pub fn iter(&self) -> impl Iterator<Item = &ModDescriptor> {
        self.mods.iter()
    }

    /// Namespaces in registration order
    pub fn namespaces(&self) -> Vec<String> {
        self.mods.iter().map(|d| d.namespace().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    /// Required mods that are not installed
    pub fn missing_required_mods(&self, descriptor: &ModDescriptor) -> Vec<String> {
        descriptor
            .required_mods
            .iter()
            .filter(|ns| !self.contains(ns))
            .cloned()
            .collect()
    }

    /// Every required mod is installed
    pub fn required_mods_installed(&self, descriptor: &ModDescriptor) -> bool {
        descriptor.required_mods.iter().all(|ns| self.contains(ns))
    }

    /// Incompatible mods that are installed
    pub fn installed_incompatible_mods(&self, descriptor: &ModDescriptor) -> Vec<String> {
        descriptor
            .incompatible_mods
            .iter()
            .filter(|ns| self.contains(ns))
            .cloned()
            .collect()
    }

    /// Some incompatible mod is installed
    pub fn incompatible_mods_installed(&self, descriptor: &ModDescriptor) -> bool {
        descriptor.incompatible_mods.iter().any(|ns| self.contains(ns))
    }

    /// Mods listing `namespace` as required, in registration order
    pub fn dependents_of(&self, namespace: &str) -> Vec<String> {
        self.mods
            .iter()
            .filter(|d| d.required_mods.contains(namespace))
            .map(|d| d.namespace().to_string())
            .collect()
    }

    fn is_loaded(&self, namespace: &str) -> bool {
        self.get(namespace).map_or(false, |d| d.is_loaded())
    }

    /// Every required mod has completed its load
    pub fn required_mods_loaded(&self, descriptor: &ModDescriptor) -> bool {
        descriptor.required_mods.iter().all(|ns| self.is_loaded(ns))
    }

    /// Loadable, and every required mod is loaded
    pub fn is_ready_to_load(&self, descriptor: &ModDescriptor) -> bool {
        descriptor.is_loadable() && self.required_mods_loaded(descriptor)
    }

    /// Load order hints are satisfied
    ///
    /// Every mod named in `load_after` is loaded, and every non-blocked mod
    /// naming this one in its `load_before` is loaded. A blocked mod never
    /// loads, so its `load_before` hints are ignored.
    pub fn prerequisite_mods_loaded(&self, descriptor: &ModDescriptor) -> bool {
        if !descriptor.load_after.iter().all(|ns| self.is_loaded(ns)) {
            return false;
        }

        self.mods
            .iter()
            .filter(|other| !other.is_blocked())
            .filter(|other| other.load_before.contains(descriptor.namespace()))
            .all(|other| other.is_loaded())
    }
}
