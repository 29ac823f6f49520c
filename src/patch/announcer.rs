//! Announcers
//!
//! Priority-ordered callbacks hung off one host hook. Preemptive announcers
//! run before the host behaviour, reactive ones after it; both are driven by
//! patches installed through the [`Patcher`].

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

use super::host::{CallError, HookSlot};
use super::patcher::{PatchError, PatchId, Patcher, Replacement};
use crate::utils::guard_call;

/// Announcer callback
pub type AnnouncerFn<A> = dyn Fn(&A) -> Result<(), CallError> + Send + Sync;

struct Announcer<A: 'static> {
    name: String,
    priority: i32,
    preemptive: bool,
    callback: Arc<AnnouncerFn<A>>,
}

/// Announcers attached to one hook
pub struct Announcers<A: 'static> {
    entries: Arc<RwLock<Vec<Announcer<A>>>>,
}

impl<A: 'static> Announcers<A> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Add an announcer
    ///
    /// Lower priority values run first; equal priorities keep registration
    /// order.
    pub fn register<F>(&self, name: &str, priority: i32, preemptive: bool, callback: F)
    where
        F: Fn(&A) -> Result<(), CallError> + Send + Sync + 'static,
    {
        let mut entries = self.entries.write();
        let at = entries.partition_point(|a| a.priority <= priority);
        entries.insert(
            at,
            Announcer {
                name: name.to_string(),
                priority,
                preemptive,
                callback: Arc::new(callback),
            },
        );
        debug!("Registered announcer {} (priority {})", name, priority);
    }

    /// Remove every announcer named `name`
    pub fn remove(&self, name: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|a| a.name != name);
        before != entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Run the preemptive or the reactive announcers; returns how many succeeded
    pub fn announce(&self, args: &A, preemptive: bool) -> usize {
        announce(&self.entries, args, preemptive)
    }

    /// Attach to `slot`: a Before patch for preemptive announcers and an
    /// After patch for reactive ones, both permanent
    pub fn attach<R: 'static>(
        &self,
        patcher: &Patcher,
        owner: &str,
        slot: &HookSlot<A, R>,
    ) -> Result<(PatchId, PatchId), PatchError> {
        let preemptive = {
            let entries = Arc::clone(&self.entries);
            patcher.patch_directly(
                owner,
                slot,
                Replacement::before(move |args: &A| {
                    announce(&entries, args, true);
                    Ok(())
                }),
                true,
            )?
        };
        let reactive = {
            let entries = Arc::clone(&self.entries);
            patcher.patch_directly(
                owner,
                slot,
                Replacement::after(move |args: &A, _: &R| {
                    announce(&entries, args, false);
                    Ok(())
                }),
                true,
            )?
        };
        Ok((preemptive, reactive))
    }
}

impl<A: 'static> Default for Announcers<A> {
    fn default() -> Self {
        Self::new()
    }
}

fn announce<A: 'static>(entries: &RwLock<Vec<Announcer<A>>>, args: &A, preemptive: bool) -> usize {
    let snapshot: Vec<(String, Arc<AnnouncerFn<A>>)> = entries
        .read()
        .iter()
        .filter(|a| a.preemptive == preemptive)
        .map(|a| (a.name.clone(), Arc::clone(&a.callback)))
        .collect();

    let mut succeeded = 0;
    for (name, callback) in snapshot {
        match guard_call(|| callback(args), CallError::Panicked) {
            Ok(()) => succeeded += 1,
            Err(e) => warn!("Announcer {} failed: {}", name, e),
        }
    }
    succeeded
}
