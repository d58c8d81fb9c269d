// src/events.rs

//! Fan-out of inbound `Event` messages to subscribers.
//!
//! Subscribers are keyed by event name and invoked in registration order.
//! Events with no subscriber are dropped silently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::{lock_ignore_poison, Message};

/// Callback invoked with every matching event message.
pub type EventCallback = Arc<dyn Fn(&Message) + Send + Sync>;

type SubscriberMap = HashMap<String, Vec<(u64, EventCallback)>>;

/// One or several event names to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventNames(Vec<String>);

impl EventNames {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for EventNames {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for EventNames {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for EventNames {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for EventNames {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for EventNames {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|n| n.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for EventNames {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|n| n.to_string()).collect())
    }
}

/// Registry of event subscribers.
pub struct EventDispatcher {
    // ---
    table: Arc<Mutex<SubscriberMap>>,
    next_id: AtomicU64,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    // ---

    pub fn new() -> Self {
        // ---
        Self {
            table: Arc::new(Mutex::new(SubscriberMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback` under every name in `names`.
    ///
    /// Subscribing the same callback to several names yields one handle that
    /// removes all of those registrations at once.
    pub fn subscribe(&self, names: EventNames, callback: EventCallback) -> EventSubscription {
        // ---
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut table = lock_ignore_poison(&self.table);

        let registrations: Vec<String> = names
            .iter()
            .map(|name| {
                table
                    .entry(name.to_string())
                    .or_default()
                    .push((id, callback.clone()));
                name.to_string()
            })
            .collect();

        EventSubscription {
            table: Arc::downgrade(&self.table),
            id,
            names: registrations,
            active: AtomicBool::new(true),
        }
    }

    /// Invoke every subscriber of `msg.name`, in registration order.
    ///
    /// Returns how many subscribers were called. The lock is released
    /// before callbacks run, so callbacks may subscribe or unsubscribe.
    pub fn dispatch(&self, msg: &Message) -> usize {
        // ---
        let callbacks: Vec<EventCallback> = {
            let table = lock_ignore_poison(&self.table);
            match table.get(&msg.name) {
                Some(subscribers) => subscribers.iter().map(|(_, cb)| cb.clone()).collect(),
                None => return 0,
            }
        };

        for callback in &callbacks {
            callback(msg);
        }
        callbacks.len()
    }

    /// Number of live subscribers for `name`.
    pub fn subscriber_count(&self, name: &str) -> usize {
        // ---
        lock_ignore_poison(&self.table)
            .get(name)
            .map_or(0, Vec::len)
    }
}

/// Handle returned by a subscription.
///
/// Dropping the handle keeps the subscription alive; call
/// [`EventSubscription::unsubscribe`] to remove it.
pub struct EventSubscription {
    // ---
    table: Weak<Mutex<SubscriberMap>>,
    id: u64,
    names: Vec<String>,
    active: AtomicBool,
}

impl EventSubscription {
    // ---

    /// Remove this subscription. Calling it again has no effect.
    pub fn unsubscribe(&self) {
        // ---
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        let Some(table) = self.table.upgrade() else {
            return;
        };

        let mut table = lock_ignore_poison(&table);
        for name in &self.names {
            if let Some(subscribers) = table.get_mut(name) {
                subscribers.retain(|(id, _)| *id != self.id);
                if subscribers.is_empty() {
                    table.remove(name);
                }
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
