//! Error handling helpers for running third-party code
//!
//! Mod hooks, event subscribers and patch replacements are foreign code. A
//! failure inside one of them must be contained and logged, never allowed to
//! take the loader down with it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Run `operation`, turning a panic into an `Err` built by `on_panic`
///
/// The panic payload is rendered to a message when it is a string.
pub fn guard_call<T, E, F, P>(operation: F, on_panic: P) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    P: FnOnce(String) -> E,
{
    match catch_unwind(AssertUnwindSafe(operation)) {
        Ok(result) => result,
        Err(payload) => Err(on_panic(panic_message(payload.as_ref()))),
    }
}

/// Extract a readable message from a panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Execute an operation and log errors without failing
///
/// Returns `Some(T)` on success, `None` on error (after logging).
pub fn log_error<F, T, E>(operation: F, context: &str) -> Option<T>
where
    F: FnOnce() -> Result<T, E>,
    E: std::fmt::Display,
{
    match operation() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{}: {}", context, e);
            None
        }
    }
}
