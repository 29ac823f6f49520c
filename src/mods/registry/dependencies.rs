//! Mod dependency checking
//!
//! Decides whether installed mods can be loaded at all: required mods must
//! be installed, incompatible mods must not be, compatibility ranges must
//! hold and required-mod edges must not form a cycle. The checks are pure;
//! the manager applies the resulting disablements.

use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use crate::mods::descriptor::ModDescriptor;
use crate::mods::registry::store::ModRegistry;

/// A requirement edge that can no longer be satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenRequirement {
    /// Mod that must be disabled
    pub dependent: String,
    /// Required mod that is missing, blocked or without information
    pub required: String,
}

/// Dependency checker
pub struct ModDependencies;

impl ModDependencies {
    /// Check one mod's setup against the installed set
    ///
    /// In order: required mods installed, incompatible mods absent,
    /// compatibility ranges satisfied by installed mods. Returns the reason
    /// of the first failed check.
    pub fn check_setup(registry: &ModRegistry, descriptor: &ModDescriptor) -> Result<(), String> {
        let missing = registry.missing_required_mods(descriptor);
        if !missing.is_empty() {
            return Err(format!("required mods not installed: {}", missing.join(", ")));
        }

        let incompatible = registry.installed_incompatible_mods(descriptor);
        if !incompatible.is_empty() {
            return Err(format!(
                "incompatible mods installed: {}",
                incompatible.join(", ")
            ));
        }

        for range in &descriptor.compatibility {
            let Some(other) = registry.get(&range.namespace) else {
                continue;
            };
            // Version of a mod that failed validation is a placeholder
            if !other.flags().read_information() {
                continue;
            }
            if !range.contains(&other.version) {
                return Err(format!(
                    "{} {} is outside the supported range {}",
                    other.namespace(),
                    other.version,
                    range
                ));
            }
        }

        Ok(())
    }

    /// First available mod (in registration order) controlled by
    /// `controller` whose required mod is no longer available
    pub fn find_broken_requirement(
        registry: &ModRegistry,
        controller: &str,
    ) -> Option<BrokenRequirement> {
        registry
            .iter()
            .filter(|d| d.is_available() && d.load_controller == controller)
            .find_map(|d| {
                d.required_mods
                    .iter()
                    .find(|ns| !registry.get(ns).map_or(false, |r| r.is_available()))
                    .map(|required| BrokenRequirement {
                        dependent: d.namespace().to_string(),
                        required: required.clone(),
                    })
            })
    }

    /// Available mods that sit on a required-mod cycle
    ///
    /// Kahn's algorithm over the required-mod graph of available mods; every
    /// node left with a non-zero in-degree sits on or behind a cycle. Only
    /// the nodes that can reach themselves again are returned, in
    /// registration order. Mods that merely require a cycle member are left
    /// to the cascade pass.
    pub fn find_requirement_cycles(registry: &ModRegistry) -> Vec<String> {
        let available: Vec<&ModDescriptor> = registry.iter().filter(|d| d.is_available()).collect();

        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for d in &available {
            in_degree.entry(d.namespace()).or_insert(0);
        }

        for d in &available {
            for required in &d.required_mods {
                if !in_degree.contains_key(required.as_str()) {
                    continue;
                }
                dependents
                    .entry(required.as_str())
                    .or_default()
                    .push(d.namespace());
                if let Some(degree) = in_degree.get_mut(d.namespace()) {
                    *degree += 1;
                }
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(&ns, _)| ns)
            .collect();

        while let Some(ns) = queue.pop_front() {
            if let Some(next) = dependents.get(ns) {
                for &dependent in next {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        let remaining: HashMap<&str, &ModDescriptor> = available
            .iter()
            .filter(|d| in_degree.get(d.namespace()).map_or(false, |&deg| deg > 0))
            .map(|d| (d.namespace(), *d))
            .collect();

        let cyclic: Vec<String> = available
            .iter()
            .filter(|d| remaining.contains_key(d.namespace()))
            .filter(|d| Self::reaches_itself(&remaining, d.namespace()))
            .map(|d| d.namespace().to_string())
            .collect();

        if !cyclic.is_empty() {
            debug!("Required-mod cycle involves: {:?}", cyclic);
        }

        cyclic
    }

    /// Depth-first walk of required-mod edges inside `graph` starting at
    /// `start`'s requirements
    fn reaches_itself(graph: &HashMap<&str, &ModDescriptor>, start: &str) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![start];

        while let Some(ns) = stack.pop() {
            let Some(descriptor) = graph.get(ns) else {
                continue;
            };
            for required in &descriptor.required_mods {
                let required = required.as_str();
                if required == start {
                    return true;
                }
                if graph.contains_key(required) && visited.insert(required) {
                    stack.push(required);
                }
            }
        }

        false
    }
}
