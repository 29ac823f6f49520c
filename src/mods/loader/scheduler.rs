//! Load scheduler
//!
//! Picks the next mod to load from a candidate pool. Safe picks honour both
//! load order hint directions; a forced run falls back to the first ready
//! candidate when nothing is safe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::mods::registry::ModRegistry;
use crate::mods::traits::ModError;

/// Outcome of one scheduling step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Ready and every load order prerequisite is loaded
    Safe(String),
    /// Ready, but load order could not be honoured
    Forced(String),
}

impl Selection {
    pub fn namespace(&self) -> &str {
        match self {
            Selection::Safe(ns) | Selection::Forced(ns) => ns,
        }
    }
}

/// Marks a load-all run as in progress until dropped
#[derive(Debug)]
pub struct RunGuard {
    in_progress: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.in_progress.store(false, Ordering::SeqCst);
    }
}

/// Load scheduler state
#[derive(Debug)]
pub struct LoadScheduler {
    in_progress: Arc<AtomicBool>,
    paused: bool,
}

impl LoadScheduler {
    pub fn new(paused: bool) -> Self {
        Self {
            in_progress: Arc::new(AtomicBool::new(false)),
            paused,
        }
    }

    /// Start a load-all run
    ///
    /// Fails with [`ModError::LoadAllInProgress`] while another run holds
    /// its guard.
    pub fn begin_run(&self) -> Result<RunGuard, ModError> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Refusing to start a load-all run inside another one");
            return Err(ModError::LoadAllInProgress);
        }
        Ok(RunGuard {
            in_progress: Arc::clone(&self.in_progress),
        })
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Whether successful loads re-trigger scheduling
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn unpause(&mut self) {
        self.paused = false;
    }

    /// Candidate pool, in registration order
    ///
    /// Mods controlled by `controller` that are loadable, have every required
    /// mod installed, no incompatible mod installed and auto-load enabled.
    pub fn candidates(registry: &ModRegistry, controller: &str) -> Vec<String> {
        registry
            .iter()
            .filter(|d| d.load_controller == controller)
            .filter(|d| d.auto_load() && d.is_loadable())
            .filter(|d| registry.required_mods_installed(d))
            .filter(|d| !registry.incompatible_mods_installed(d))
            .map(|d| d.namespace().to_string())
            .collect()
    }

    /// Pick the next mod from `pool`
    ///
    /// Returns `None` when nothing is safe and `force` is off, or when no
    /// candidate is even ready.
    pub fn select(&self, registry: &ModRegistry, pool: &[String], force: bool) -> Option<Selection> {
        let ready: Vec<&String> = pool
            .iter()
            .filter(|ns| registry.get(ns).map_or(false, |d| registry.is_ready_to_load(d)))
            .collect();

        if let Some(ns) = ready.iter().find(|ns| {
            registry
                .get(ns)
                .map_or(false, |d| registry.prerequisite_mods_loaded(d))
        }) {
            debug!("Scheduler picked {} (safe)", ns);
            return Some(Selection::Safe((*ns).clone()));
        }

        if force {
            if let Some(ns) = ready.first() {
                warn!(
                    "Load order of mod {} cannot be honoured; loading it anyway",
                    ns
                );
                return Some(Selection::Forced((*ns).clone()));
            }
        }

        None
    }
}
