//! Function interception
//!
//! Installs a dispatching wrapper in a [`HookSlot`] that combines the
//! callable it found there with a replacement, according to the patch kind:
//!
//! - **Before**: replacement, then original; original's result is returned
//! - **After**: original, then replacement; original's result is returned
//! - **Replace**: replacement only
//! - **Custom**: replacement receives the original and decides whether to call it
//!
//! Replacement failures are always logged. Before and After swallow them;
//! Replace and Custom return them to the caller. Patches that are not
//! permanent are unlinked when the mod that installed them unloads, after
//! which every call through the wrapper fails with [`CallError::Unlinked`].

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::host::{CallError, Callable, HookSlot, HostObject};
use crate::events::{Event, Subscription};
use crate::mods::{ModManager, ModUnloadedArgs};
use crate::utils::{guard_call, is_valid_namespace};

/// Identifies one installed patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchId(u64);

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a replacement is combined with the original
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchKind {
    Before,
    After,
    Replace,
    Custom,
}

/// Runs before the original with the same arguments
pub type BeforeFn<A> = dyn Fn(&A) -> Result<(), CallError> + Send + Sync;
/// Runs after the original with the arguments and the original's result
pub type AfterFn<A, R> = dyn Fn(&A, &R) -> Result<(), CallError> + Send + Sync;
/// Receives the original callable and the arguments
pub type CustomFn<A, R> = dyn Fn(&Callable<A, R>, &A) -> Result<R, CallError> + Send + Sync;

/// A replacement callable together with its patch kind
pub enum Replacement<A: 'static, R: 'static> {
    Before(Arc<BeforeFn<A>>),
    After(Arc<AfterFn<A, R>>),
    Replace(Arc<Callable<A, R>>),
    Custom(Arc<CustomFn<A, R>>),
}

impl<A: 'static, R: 'static> Replacement<A, R> {
    pub fn before<F>(f: F) -> Self
    where
        F: Fn(&A) -> Result<(), CallError> + Send + Sync + 'static,
    {
        Replacement::Before(Arc::new(f))
    }

    pub fn after<F>(f: F) -> Self
    where
        F: Fn(&A, &R) -> Result<(), CallError> + Send + Sync + 'static,
    {
        Replacement::After(Arc::new(f))
    }

    pub fn replace<F>(f: F) -> Self
    where
        F: Fn(&A) -> Result<R, CallError> + Send + Sync + 'static,
    {
        Replacement::Replace(Arc::new(f))
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Callable<A, R>, &A) -> Result<R, CallError> + Send + Sync + 'static,
    {
        Replacement::Custom(Arc::new(f))
    }

    pub fn kind(&self) -> PatchKind {
        match self {
            Replacement::Before(_) => PatchKind::Before,
            Replacement::After(_) => PatchKind::After,
            Replacement::Replace(_) => PatchKind::Replace,
            Replacement::Custom(_) => PatchKind::Custom,
        }
    }
}

impl<A: 'static, R: 'static> Clone for Replacement<A, R> {
    fn clone(&self) -> Self {
        match self {
            Replacement::Before(f) => Replacement::Before(Arc::clone(f)),
            Replacement::After(f) => Replacement::After(Arc::clone(f)),
            Replacement::Replace(f) => Replacement::Replace(Arc::clone(f)),
            Replacement::Custom(f) => Replacement::Custom(Arc::clone(f)),
        }
    }
}

/// Failure to install a patch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("{object} has no callable named {name}")]
    NoSuchCallable { object: String, name: String },

    #[error("{object}.{name} has a different signature")]
    SignatureMismatch { object: String, name: String },

    #[error("invalid patch owner namespace: '{0}'")]
    InvalidOwner(String),
}

/// Type-erased view of an installed patch
trait PatchHandle: Send + Sync {
    /// Drop the references to the original and the replacement
    fn clear(&self);

    fn is_linked(&self) -> bool;
}

struct Link<A: 'static, R: 'static> {
    original: Arc<Callable<A, R>>,
    replacement: Replacement<A, R>,
}

/// State shared between a patch record and its installed wrapper
struct PatchState<A: 'static, R: 'static> {
    id: PatchId,
    owner: String,
    target: String,
    link: RwLock<Option<Link<A, R>>>,
}

impl<A: 'static, R: 'static> PatchState<A, R> {
    fn dispatch(&self, args: &A) -> Result<R, CallError> {
        let (original, replacement) = match &*self.link.read() {
            Some(link) => (Arc::clone(&link.original), link.replacement.clone()),
            None => {
                error!(
                    "Call through unlinked patch {} of {} (owner {})",
                    self.id, self.target, self.owner
                );
                return Err(CallError::Unlinked {
                    patch: self.id,
                    target: self.target.clone(),
                    owner: self.owner.clone(),
                });
            }
        };

        match replacement {
            Replacement::Before(f) => {
                if let Err(e) = guard_call(|| f(args), CallError::Panicked) {
                    warn!("Before patch {} of {} failed: {}", self.id, self.target, e);
                }
                original(args)
            }
            Replacement::After(f) => {
                let result = original(args)?;
                if let Err(e) = guard_call(|| f(args, &result), CallError::Panicked) {
                    warn!("After patch {} of {} failed: {}", self.id, self.target, e);
                }
                Ok(result)
            }
            Replacement::Replace(f) => guard_call(|| f(args), CallError::Panicked).map_err(|e| {
                error!("Replace patch {} of {} failed: {}", self.id, self.target, e);
                e
            }),
            Replacement::Custom(f) => {
                guard_call(|| f(&*original, args), CallError::Panicked).map_err(|e| {
                    error!("Custom patch {} of {} failed: {}", self.id, self.target, e);
                    e
                })
            }
        }
    }
}

impl<A: 'static, R: 'static> PatchHandle for PatchState<A, R> {
    fn clear(&self) {
        *self.link.write() = None;
    }

    fn is_linked(&self) -> bool {
        self.link.read().is_some()
    }
}

/// One installed patch
#[derive(Clone)]
pub struct PatchRecord {
    id: PatchId,
    owner: String,
    target: String,
    kind: PatchKind,
    permanent: bool,
    handle: Arc<dyn PatchHandle>,
}

impl PatchRecord {
    pub fn id(&self) -> PatchId {
        self.id
    }

    /// Namespace of the mod that installed the patch
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Qualified name of the patched callable
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn kind(&self) -> PatchKind {
        self.kind
    }

    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    /// False once the owner unloaded a non-permanent patch
    pub fn is_linked(&self) -> bool {
        self.handle.is_linked()
    }
}

impl fmt::Debug for PatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchRecord")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("permanent", &self.permanent)
            .field("linked", &self.is_linked())
            .finish()
    }
}

/// Patch registry
///
/// Records are never removed; unlinking is one way.
pub struct Patcher {
    records: Arc<Mutex<Vec<PatchRecord>>>,
    next_id: AtomicU64,
    unload_subscription: Option<Subscription<ModUnloadedArgs>>,
}

impl Patcher {
    /// Patcher that is not tied to any manager; use [`Patcher::unlink_owner`]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
            unload_subscription: None,
        }
    }

    /// Patcher whose non-permanent patches are unlinked when their owner
    /// unloads from `manager`
    pub fn for_manager(manager: &ModManager) -> Self {
        let mut patcher = Self::new();
        patcher.watch(manager.mod_unloaded());
        patcher
    }

    /// Unlink non-permanent patches whenever `event` reports an unload
    ///
    /// Replaces any previous subscription.
    pub fn watch(&mut self, event: &Event<ModUnloadedArgs>) {
        let records = Arc::downgrade(&self.records);
        let subscription = event.subscribe(move |_, args: &ModUnloadedArgs| {
            if let Some(records) = records.upgrade() {
                unlink(&records, &args.namespace);
            }
            Ok(())
        });
        self.unload_subscription = Some(subscription);
    }

    /// Whether unloads are being watched
    pub fn is_watching(&self) -> bool {
        self.unload_subscription.is_some()
    }

    /// Patch the callable `name` of `host`
    pub fn patch<A: 'static, R: 'static>(
        &self,
        owner: &str,
        host: &HostObject,
        name: &str,
        replacement: Replacement<A, R>,
        permanent: bool,
    ) -> Result<PatchId, PatchError> {
        let slot = host.slot::<A, R>(name).ok_or_else(|| {
            if host.contains(name) {
                PatchError::SignatureMismatch {
                    object: host.name().to_string(),
                    name: name.to_string(),
                }
            } else {
                PatchError::NoSuchCallable {
                    object: host.name().to_string(),
                    name: name.to_string(),
                }
            }
        })?;
        self.patch_directly(owner, &slot, replacement, permanent)
    }

    /// Patch whatever is currently installed in `slot`
    pub fn patch_directly<A: 'static, R: 'static>(
        &self,
        owner: &str,
        slot: &HookSlot<A, R>,
        replacement: Replacement<A, R>,
        permanent: bool,
    ) -> Result<PatchId, PatchError> {
        if !is_valid_namespace(owner) {
            return Err(PatchError::InvalidOwner(owner.to_string()));
        }

        let id = PatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let kind = replacement.kind();
        let state = Arc::new(PatchState {
            id,
            owner: owner.to_string(),
            target: slot.name().to_string(),
            link: RwLock::new(Some(Link {
                original: slot.current(),
                replacement,
            })),
        });

        let wrapper = {
            let state = Arc::clone(&state);
            Arc::new(move |args: &A| state.dispatch(args)) as Arc<Callable<A, R>>
        };
        slot.replace(wrapper);

        self.records.lock().push(PatchRecord {
            id,
            owner: owner.to_string(),
            target: slot.name().to_string(),
            kind,
            permanent,
            handle: state,
        });

        debug!(
            "Mod {} patched {} ({:?}, permanent: {}) as {}",
            owner,
            slot.name(),
            kind,
            permanent,
            id
        );
        Ok(id)
    }

    /// Unlink every non-permanent patch installed by `owner`
    ///
    /// Returns the number of patches unlinked by this call.
    pub fn unlink_owner(&self, owner: &str) -> usize {
        unlink(&self.records, owner)
    }

    /// Snapshot of every record, in installation order
    pub fn records(&self) -> Vec<PatchRecord> {
        self.records.lock().clone()
    }

    pub fn get(&self, id: PatchId) -> Option<PatchRecord> {
        self.records.lock().iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Default for Patcher {
    fn default() -> Self {
        Self::new()
    }
}

fn unlink(records: &Mutex<Vec<PatchRecord>>, owner: &str) -> usize {
    let records = records.lock();
    let mut unlinked = 0;
    for record in records.iter().filter(|r| r.owner == owner && !r.permanent) {
        if record.handle.is_linked() {
            record.handle.clear();
            unlinked += 1;
        }
    }
    if unlinked > 0 {
        info!("Unlinked {} patches of mod {}", unlinked, owner);
    }
    unlinked
}
