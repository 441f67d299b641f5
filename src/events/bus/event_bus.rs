// src/events/bus/event_bus.rs
//
// Core event bus implementation.
//
// DESIGN PRINCIPLES:
// 1. Synchronous - handlers execute immediately in subscription order
// 2. Typed - one closed event enum per bus, routed by its topic
// 3. Observable - every emission is logged
// 4. Registry keyed by token - destroy invalidates tokens, emit re-checks them
// 5. No lock is held while a handler runs

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::listener::{Listener, ListenerId};
use crate::events::types::{DomainEvent, Tip};

type EventHandler<E> = Arc<dyn Fn(&E) + Send + Sync>;
type TipHandler = Arc<dyn Fn(&Tip) + Send + Sync>;

struct Registration<E: DomainEvent> {
    topic: E::Topic,
    handler: EventHandler<E>,
    listener: Listener,
}

struct TipRegistration {
    handler: TipHandler,
    listener: Listener,
}

struct Registry<E: DomainEvent> {
    next_id: u64,
    handlers: BTreeMap<ListenerId, Registration<E>>,
    tip_handlers: BTreeMap<ListenerId, TipRegistration>,
    /// Listeners this bus registered on other buses
    owned: Vec<Listener>,
    destroyed: bool,
}

impl<E: DomainEvent> Registry<E> {
    fn allocate_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }
}

/// The Event Bus
///
/// Every stateful object embeds one. Besides its own topics, each bus carries
/// a tip channel so any object can surface a notice without declaring it.
///
/// Cloning yields another handle to the same registry.
pub struct EventBus<E: DomainEvent> {
    name: &'static str,
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: DomainEvent> EventBus<E> {
    /// Create a new event bus; `name` only shows up in logs
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                handlers: BTreeMap::new(),
                tip_handlers: BTreeMap::new(),
                owned: Vec::new(),
                destroyed: false,
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Subscribe to one topic.
    ///
    /// Handlers for the same topic run in the order they were registered.
    /// On a destroyed bus this returns an inert listener.
    pub fn on<F>(&self, topic: E::Topic, handler: F) -> Listener
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        if registry.destroyed {
            log::warn!("[EVENT] {}: subscription to {:?} after destroy ignored", self.name, topic);
            return Listener::inert();
        }

        let id = registry.allocate_id();
        let listener = self.detach_handle(id);
        registry.handlers.insert(
            id,
            Registration {
                topic,
                handler: Arc::new(handler),
                listener: listener.clone(),
            },
        );
        listener
    }

    /// Remove one exact registration. Returns false if `id` is not registered for `topic`.
    pub fn off(&self, topic: E::Topic, id: ListenerId) -> bool {
        let mut registry = self.registry.lock();
        let matches = registry
            .handlers
            .get(&id)
            .map_or(false, |registration| registration.topic == topic);
        if !matches {
            return false;
        }
        if let Some(registration) = registry.handlers.remove(&id) {
            registration.listener.disarm();
        }
        true
    }

    /// Emit an event
    ///
    /// Handlers registered for the event's topic are snapshotted, then each is
    /// invoked if its token is still registered. A panicking handler is logged
    /// and the remaining handlers still run.
    pub fn emit(&self, event: E) {
        let topic = event.topic();
        let snapshot: Vec<(ListenerId, EventHandler<E>)> = {
            let registry = self.registry.lock();
            if registry.destroyed {
                return;
            }
            registry
                .handlers
                .iter()
                .filter(|(_, registration)| registration.topic == topic)
                .map(|(id, registration)| (*id, Arc::clone(&registration.handler)))
                .collect()
        };

        log::debug!(
            "[EVENT] {}::{} | {} handlers",
            self.name,
            event.event_type(),
            snapshot.len()
        );

        for (idx, (id, handler)) in snapshot.into_iter().enumerate() {
            if !self.is_registered(id) {
                continue;
            }
            let result = catch_unwind(AssertUnwindSafe(|| handler(&event)));
            if let Err(panic) = result {
                log::error!(
                    "Handler {} for {}::{} panicked: {}",
                    idx,
                    self.name,
                    event.event_type(),
                    panic_message(panic.as_ref())
                );
            }
        }
    }

    /// Subscribe to the tip side channel
    pub fn on_tip<F>(&self, handler: F) -> Listener
    where
        F: Fn(&Tip) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        if registry.destroyed {
            return Listener::inert();
        }

        let id = registry.allocate_id();
        let listener = self.detach_handle(id);
        registry.tip_handlers.insert(
            id,
            TipRegistration {
                handler: Arc::new(handler),
                listener: listener.clone(),
            },
        );
        listener
    }

    pub fn off_tip(&self, id: ListenerId) -> bool {
        let removed = self.registry.lock().tip_handlers.remove(&id);
        match removed {
            Some(registration) => {
                registration.listener.disarm();
                true
            }
            None => false,
        }
    }

    /// Publish a one-shot notice to every tip subscriber
    pub fn tip(&self, tip: impl Into<Tip>) {
        let tip = tip.into();
        let snapshot: Vec<(ListenerId, TipHandler)> = {
            let registry = self.registry.lock();
            if registry.destroyed {
                return;
            }
            registry
                .tip_handlers
                .iter()
                .map(|(id, registration)| (*id, Arc::clone(&registration.handler)))
                .collect()
        };

        log::debug!("[TIP] {} ({:?}): {}", self.name, tip.level, tip.message);

        for (id, handler) in snapshot {
            if !self.is_tip_registered(id) {
                continue;
            }
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(&tip))) {
                log::error!(
                    "Tip handler on {} panicked: {}",
                    self.name,
                    panic_message(panic.as_ref())
                );
            }
        }
    }

    /// Subscribe on another bus and record the listener as owned by this one,
    /// so `destroy` tears it down too.
    pub fn listen_to<O, F>(&self, other: &EventBus<O>, topic: O::Topic, handler: F) -> Listener
    where
        O: DomainEvent,
        F: Fn(&O) + Send + Sync + 'static,
    {
        let listener = other.on(topic, handler);
        self.own(listener.clone());
        listener
    }

    /// Take ownership of a listener registered elsewhere
    pub fn own(&self, listener: Listener) {
        let mut registry = self.registry.lock();
        if registry.destroyed {
            drop(registry);
            listener.unsubscribe();
            return;
        }
        registry.owned.retain(Listener::is_active);
        registry.owned.push(listener);
    }

    /// Unregister everything this bus holds and everything it owns elsewhere.
    /// Idempotent.
    pub fn destroy(&self) {
        let owned = {
            let mut registry = self.registry.lock();
            if registry.destroyed {
                return;
            }
            registry.destroyed = true;

            for registration in registry.handlers.values() {
                registration.listener.disarm();
            }
            for registration in registry.tip_handlers.values() {
                registration.listener.disarm();
            }
            registry.handlers.clear();
            registry.tip_handlers.clear();
            std::mem::take(&mut registry.owned)
        };

        log::debug!(
            "[EVENT] {} destroyed, releasing {} foreign listeners",
            self.name,
            owned.len()
        );

        for listener in owned {
            listener.unsubscribe();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.registry.lock().destroyed
    }

    /// Number of handlers registered for a topic
    pub fn listener_count(&self, topic: E::Topic) -> usize {
        self.registry
            .lock()
            .handlers
            .values()
            .filter(|registration| registration.topic == topic)
            .count()
    }

    pub fn tip_listener_count(&self) -> usize {
        self.registry.lock().tip_handlers.len()
    }

    fn is_registered(&self, id: ListenerId) -> bool {
        let registry = self.registry.lock();
        !registry.destroyed && registry.handlers.contains_key(&id)
    }

    fn is_tip_registered(&self, id: ListenerId) -> bool {
        let registry = self.registry.lock();
        !registry.destroyed && registry.tip_handlers.contains_key(&id)
    }

    fn detach_handle(&self, id: ListenerId) -> Listener {
        let registry = Arc::downgrade(&self.registry);
        Listener::new(id, move || {
            if let Some(registry) = registry.upgrade() {
                let mut registry = registry.lock();
                registry.handlers.remove(&id);
                registry.tip_handlers.remove(&id);
            }
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<E: DomainEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new("bus")
    }
}

// Cloning shares the registry
impl<E: DomainEvent> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E: DomainEvent> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("EventBus")
            .field("name", &self.name)
            .field("handlers", &registry.handlers.len())
            .field("tip_handlers", &registry.tip_handlers.len())
            .field("owned", &registry.owned.len())
            .field("destroyed", &registry.destroyed)
            .finish()
    }
}
