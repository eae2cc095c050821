//! Pub/Sub event bus with scoped subscriptions.
//!
//! Architecture:
//! - Sources (pointer capture, window focus, toolbar) emit typed events
//! - Handlers subscribe per event type and get a [`Subscription`] back
//! - Dropping the [`Subscription`] tears the handler down, so a view's
//!   handlers live exactly as long as the view holds its subscriptions
//!
//! Callback order: FIFO (first-subscribed, first-called) within same event type.
//! Cross-type order undefined - don't rely on ordering between different event types.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Marker trait for events. Events must be Send + Sync + 'static.
pub trait Event: Any + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

// Blanket impl for all qualifying types
impl<T: Any + Send + Sync + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Type-erased callback
type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

type Registry = RwLock<HashMap<TypeId, Vec<(u64, Callback)>>>;

/// Pub/Sub bus. Cheap to clone; clones share subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Registry>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_types", &self.subscribers.read().map(|s| s.len()).unwrap_or(0))
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events of type E.
    ///
    /// The handler stays registered while the returned [`Subscription`] lives.
    ///
    /// # Example
    /// ```ignore
    /// let editor = Arc::new(Mutex::new(editor));
    /// let e = Arc::clone(&editor);
    /// let _sub = bus.subscribe::<PointerReleasedEvent, _>(move |ev| {
    ///     e.lock().unwrap().pointer_released(ev.x);
    /// });
    /// ```
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe<E, F>(&self, callback: F) -> Subscription
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<E>();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let wrapped: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(type_id)
            .or_default()
            .push((id, wrapped));
        log::trace!("EventBus: subscribed #{} to {}", id, std::any::type_name::<E>());

        Subscription {
            registry: Arc::downgrade(&self.subscribers),
            type_id,
            id,
        }
    }

    /// Emit event: invoke every live handler for its type synchronously.
    pub fn emit<E: Event>(&self, event: E) {
        // Clone the handler list so handlers may subscribe/unsubscribe re-entrantly
        let callbacks: Vec<Callback> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
            .map(|cbs| cbs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        if callbacks.is_empty() {
            log::trace!("EventBus: no handler for {}", event.type_name());
        }
        for cb in callbacks {
            cb(&event);
        }
    }

    /// Check if there are subscribers for event type E
    pub fn has_subscribers<E: Event>(&self) -> bool {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }
}

/// Registration handle; unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Registry>,
    type_id: TypeId,
    id: u64,
}

impl Subscription {
    /// Tear down now (same as dropping).
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut map = registry.write().unwrap_or_else(|e| e.into_inner());
        if let Some(cbs) = map.get_mut(&self.type_id) {
            cbs.retain(|(id, _)| *id != self.id);
            if cbs.is_empty() {
                map.remove(&self.type_id);
            }
        }
        log::trace!("EventBus: unsubscribed #{}", self.id);
    }
}
