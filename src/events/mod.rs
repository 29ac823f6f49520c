//! Event bus
//!
//! Weakly held, multi-subscriber events used to publish mod lifecycle
//! notifications (loaded, unloaded, failures) to interested collaborators.

pub mod bus;

pub use bus::{Event, EventError, Handler, Subscription, SubscriptionId};
