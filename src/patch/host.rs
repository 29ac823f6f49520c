//! Host callables and patchable slots
//!
//! A [`HookSlot`] is a shared, swappable reference to one host callable.
//! Host code always calls through the slot, so whatever is installed in it
//! (the original or a patch wrapper) is what runs. A [`HostObject`] groups
//! slots under names for lookup by patchers.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::patcher::PatchId;

/// A host function taking `A` and returning `R`
pub type Callable<A, R> = dyn Fn(&A) -> Result<R, CallError> + Send + Sync;

/// Failure raised by a call through a slot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("call failed: {0}")]
    Failed(String),

    #[error("call panicked: {0}")]
    Panicked(String),

    #[error("patch {patch} of {target} was unlinked when mod {owner} unloaded")]
    Unlinked {
        patch: PatchId,
        target: String,
        owner: String,
    },
}

/// Shared slot holding the callable currently installed under a name
pub struct HookSlot<A: 'static, R: 'static> {
    name: Arc<str>,
    current: Arc<RwLock<Arc<Callable<A, R>>>>,
}

impl<A: 'static, R: 'static> HookSlot<A, R> {
    /// Create a slot holding `original`
    pub fn new<F>(name: &str, original: F) -> Self
    where
        F: Fn(&A) -> Result<R, CallError> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            current: Arc::new(RwLock::new(Arc::new(original))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call whatever is installed
    ///
    /// The lock is released before the call, so the callee may patch this
    /// same slot.
    pub fn call(&self, args: &A) -> Result<R, CallError> {
        let callable = self.current();
        callable(args)
    }

    /// The callable currently installed
    pub fn current(&self) -> Arc<Callable<A, R>> {
        Arc::clone(&self.current.read())
    }

    /// Install `callable`, returning the one it replaces
    pub fn replace(&self, callable: Arc<Callable<A, R>>) -> Arc<Callable<A, R>> {
        std::mem::replace(&mut *self.current.write(), callable)
    }
}

impl<A: 'static, R: 'static> Clone for HookSlot<A, R> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            current: Arc::clone(&self.current),
        }
    }
}

impl<A: 'static, R: 'static> fmt::Debug for HookSlot<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSlot").field("name", &self.name).finish()
    }
}

/// Named table of patchable slots belonging to one host object
pub struct HostObject {
    name: String,
    slots: BTreeMap<String, Box<dyn Any + Send + Sync>>,
}

impl HostObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Define (or redefine) the slot `name` and return a handle to it
    pub fn define<A, R, F>(&mut self, name: &str, original: F) -> HookSlot<A, R>
    where
        A: 'static,
        R: 'static,
        F: Fn(&A) -> Result<R, CallError> + Send + Sync + 'static,
    {
        let slot = HookSlot::new(&format!("{}.{}", self.name, name), original);
        self.slots.insert(name.to_string(), Box::new(slot.clone()));
        slot
    }

    /// Look up a slot by name and signature
    ///
    /// `None` when the name is unknown or the slot has another signature.
    pub fn slot<A: 'static, R: 'static>(&self, name: &str) -> Option<HookSlot<A, R>> {
        self.slots
            .get(name)
            .and_then(|slot| slot.downcast_ref::<HookSlot<A, R>>())
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Slot names, sorted
    pub fn names(&self) -> Vec<String> {
        self.slots.keys().cloned().collect()
    }

    /// Call the slot `name`
    pub fn call<A: 'static, R: 'static>(&self, name: &str, args: &A) -> Result<R, CallError> {
        let slot = self.slot::<A, R>(name).ok_or_else(|| {
            CallError::Failed(format!("{} has no callable {} with this signature", self.name, name))
        })?;
        slot.call(args)
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("name", &self.name)
            .field("slots", &self.names())
            .finish()
    }
}
