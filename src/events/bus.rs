//! Multi-subscriber event with weak subscriptions
//!
//! The bus never keeps a subscriber alive. [`Event::subscribe`] hands back a
//! [`Subscription`] that owns the handler; dropping it kills the subscription
//! and the dead entry is pruned on the next [`Event::invoke`]. Handlers owned
//! elsewhere can be attached with [`Event::add`] and detached with
//! [`Event::remove`]. Subscriber lifetime is entirely the caller's business.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tracing::{debug, warn};

use crate::utils::guard_call;

/// Subscriber callback: `(owner, args)`
pub type Handler<A> = dyn Fn(&str, &A) -> Result<(), EventError> + Send + Sync;

/// Failure reported by a single subscriber
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("subscriber failed: {0}")]
    Failed(String),

    #[error("subscriber panicked: {0}")]
    Panicked(String),
}

/// Identifies one subscription on one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscriber<A: 'static> {
    id: SubscriptionId,
    handler: Weak<Handler<A>>,
}

/// Strong handle returned by [`Event::subscribe`]
///
/// The subscription lives exactly as long as this value.
pub struct Subscription<A: 'static> {
    id: SubscriptionId,
    _handler: Arc<Handler<A>>,
}

impl<A: 'static> Subscription<A> {
    /// Id of this subscription, usable with [`Event::remove`]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl<A: 'static> fmt::Debug for Subscription<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// A named event with any number of weakly held subscribers
pub struct Event<A: 'static> {
    name: &'static str,
    subscribers: Mutex<Vec<Subscriber<A>>>,
    next_id: AtomicU64,
}

impl<A: 'static> Event<A> {
    /// Create an event with no subscribers
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Event name, used in log output
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Attach a handler owned by the caller
    ///
    /// Only a weak reference is stored; once every strong reference to
    /// `handler` is gone the subscriber is silently skipped and pruned.
    pub fn add(&self, handler: &Arc<Handler<A>>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push(Subscriber {
            id,
            handler: Arc::downgrade(handler),
        });
        debug!("Event {}: added subscriber {:?}", self.name, id);
        id
    }

    /// Attach a closure and return the handle that keeps it alive
    pub fn subscribe<F>(&self, handler: F) -> Subscription<A>
    where
        F: Fn(&str, &A) -> Result<(), EventError> + Send + Sync + 'static,
    {
        let handler: Arc<Handler<A>> = Arc::new(handler);
        let id = self.add(&handler);
        Subscription {
            id,
            _handler: handler,
        }
    }

    /// Detach a subscriber; returns false if it was not attached
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        before != subscribers.len()
    }

    /// Whether `id` is still attached (alive or not yet pruned)
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.subscribers.lock().iter().any(|s| s.id == id)
    }

    /// Currently alive handlers, in subscription order
    pub fn handlers(&self) -> Vec<Arc<Handler<A>>> {
        self.subscribers
            .lock()
            .iter()
            .filter_map(|s| s.handler.upgrade())
            .collect()
    }

    /// Number of alive subscribers
    pub fn len(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|s| s.handler.strong_count() > 0)
            .count()
    }

    /// True when no alive subscriber is attached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every alive subscriber in subscription order
    ///
    /// A failing or panicking subscriber is logged and the remaining ones
    /// still run. The subscriber list is snapshotted first, so handlers may
    /// add or remove subscriptions on this same event; a subscriber removed
    /// mid-invoke is not called, one added mid-invoke waits for the next
    /// invoke. Returns the number of subscribers that completed successfully.
    pub fn invoke(&self, owner: &str, args: &A) -> usize {
        let snapshot: Vec<(SubscriptionId, Weak<Handler<A>>)> = self
            .subscribers
            .lock()
            .iter()
            .map(|s| (s.id, s.handler.clone()))
            .collect();

        let mut delivered = 0;
        let mut saw_dead = false;

        for (id, weak) in snapshot {
            let Some(handler) = weak.upgrade() else {
                saw_dead = true;
                continue;
            };
            if !self.contains(id) {
                continue;
            }

            match guard_call(|| handler(owner, args), EventError::Panicked) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    "Event {} subscriber {:?} failed for {}: {}",
                    self.name, id, owner, e
                ),
            }
        }

        if saw_dead {
            self.prune();
        }

        delivered
    }

    /// Drop entries whose handler is gone
    fn prune(&self) {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.handler.strong_count() > 0);
        let pruned = before - subscribers.len();
        if pruned > 0 {
            debug!("Event {}: pruned {} dead subscribers", self.name, pruned);
        }
    }
}

impl<A: 'static> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}
