//! Listener and observer bookkeeping for the realtime client.
//!
//! Every registration gets its own [`ListenerId`], so removing one never
//! disturbs another registration of the same closure or event name.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;
use serde_json::Value;

use super::types::RealtimeMessage;

/// Listener bound to one event name.
pub(crate) type EventListener = Arc<dyn Fn(&Value) + Send + Sync>;
/// Observer of everything the base `on_message` handler sees.
pub(crate) type MessageObserver = Arc<dyn Fn(&RealtimeMessage) + Send + Sync>;
pub(crate) type OpenObserver = Arc<dyn Fn() + Send + Sync>;
pub(crate) type ReconnectObserver = Arc<dyn Fn(u32) + Send + Sync>;

pub(crate) type SharedRegistry = Arc<Mutex<SubscriptionRegistry>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ListenerId(u64);

/// Insertion-ordered list of callbacks.
struct ObserverList<F: ?Sized> {
    entries: Vec<(ListenerId, Arc<F>)>,
}

impl<F: ?Sized> Default for ObserverList<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized> ObserverList<F> {
    fn push(&mut self, id: ListenerId, callback: Arc<F>) {
        self.entries.push((id, callback));
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Cloned callbacks so they can run after the lock is released.
    fn snapshot(&self) -> Vec<Arc<F>> {
        self.entries.iter().map(|(_, cb)| Arc::clone(cb)).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Identifies a single registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SubscriptionKey {
    Event { name: String, id: ListenerId },
    Message(ListenerId),
    Open(ListenerId),
    Reconnect(ListenerId),
}

#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    next_id: u64,
    events: HashMap<String, ObserverList<dyn Fn(&Value) + Send + Sync>>,
    message: ObserverList<dyn Fn(&RealtimeMessage) + Send + Sync>,
    open: ObserverList<dyn Fn() + Send + Sync>,
    reconnect: ObserverList<dyn Fn(u32) + Send + Sync>,
}

impl SubscriptionRegistry {
    fn next_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    pub(crate) fn add_event_listener(
        &mut self,
        name: &str,
        listener: EventListener,
    ) -> SubscriptionKey {
        let id = self.next_id();
        self.events
            .entry(name.to_owned())
            .or_default()
            .push(id, listener);
        SubscriptionKey::Event {
            name: name.to_owned(),
            id,
        }
    }

    pub(crate) fn add_message_observer(&mut self, observer: MessageObserver) -> SubscriptionKey {
        let id = self.next_id();
        self.message.push(id, observer);
        SubscriptionKey::Message(id)
    }

    pub(crate) fn add_open_observer(&mut self, observer: OpenObserver) -> SubscriptionKey {
        let id = self.next_id();
        self.open.push(id, observer);
        SubscriptionKey::Open(id)
    }

    pub(crate) fn add_reconnect_observer(
        &mut self,
        observer: ReconnectObserver,
    ) -> SubscriptionKey {
        let id = self.next_id();
        self.reconnect.push(id, observer);
        SubscriptionKey::Reconnect(id)
    }

    /// Remove one registration. Returns `false` if it was already gone.
    pub(crate) fn remove(&mut self, key: &SubscriptionKey) -> bool {
        match key {
            SubscriptionKey::Event { name, id } => {
                let Some(list) = self.events.get_mut(name) else {
                    return false;
                };
                let removed = list.remove(*id);
                if list.is_empty() {
                    self.events.remove(name);
                }
                removed
            }
            SubscriptionKey::Message(id) => self.message.remove(*id),
            SubscriptionKey::Open(id) => self.open.remove(*id),
            SubscriptionKey::Reconnect(id) => self.reconnect.remove(*id),
        }
    }

    pub(crate) fn event_listeners(&self, name: &str) -> Vec<EventListener> {
        self.events
            .get(name)
            .map(ObserverList::snapshot)
            .unwrap_or_default()
    }

    pub(crate) fn message_observers(&self) -> Vec<MessageObserver> {
        self.message.snapshot()
    }

    pub(crate) fn open_observers(&self) -> Vec<OpenObserver> {
        self.open.snapshot()
    }

    pub(crate) fn reconnect_observers(&self) -> Vec<ReconnectObserver> {
        self.reconnect.snapshot()
    }

    pub(crate) fn listener_count(&self, name: &str) -> usize {
        self.events.get(name).map_or(0, ObserverList::len)
    }
}

/// Handle to one registered listener or observer.
///
/// Dropping the handle leaves the registration in place; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
pub struct Subscription {
    registry: Weak<Mutex<SubscriptionRegistry>>,
    key: SubscriptionKey,
    active: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(registry: &SharedRegistry, key: SubscriptionKey) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            key,
            active: AtomicBool::new(true),
        }
    }

    /// Remove exactly this registration.
    ///
    /// Returns `true` the first time it removes something; later calls are
    /// no-ops returning `false`.
    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        match self.registry.upgrade() {
            Some(registry) => registry.lock().remove(&self.key),
            None => false,
        }
    }

    /// Whether [`unsubscribe`](Subscription::unsubscribe) has not been called yet.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// The event name for listeners created by `subscribe` and its wrappers.
    pub fn event_name(&self) -> Option<&str> {
        match &self.key {
            SubscriptionKey::Event { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("active", &self.is_active())
            .finish()
    }
}
