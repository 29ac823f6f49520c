//! Function interception
//!
//! Host callables live in [`HookSlot`]s; mods patch them through a
//! [`Patcher`] with Before, After, Replace or Custom semantics. Announcers
//! build priority-ordered notifications on top of Before and After patches.

pub mod announcer;
pub mod host;
pub mod patcher;

pub use announcer::{AnnouncerFn, Announcers};
pub use host::{CallError, Callable, HookSlot, HostObject};
pub use patcher::{
    AfterFn, BeforeFn, CustomFn, PatchError, PatchId, PatchKind, PatchRecord, Patcher, Replacement,
};
