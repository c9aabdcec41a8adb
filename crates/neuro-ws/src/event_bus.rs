//! In-process publish/subscribe.
//!
//! Delivery is synchronous and, within one topic, in registration order.
//! `publish` dispatches over a snapshot of the topic's handlers, so handlers
//! may subscribe or unsubscribe (themselves or others) while being invoked.
//! A handler removed mid-dispatch is skipped if it has not run yet.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::error;

type Handler<P> = Arc<dyn Fn(&P) + Send + Sync>;

struct Registration<P> {
    id: u64,
    active: Arc<AtomicBool>,
    handler: Handler<P>,
}

impl<P> Clone for Registration<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            active: Arc::clone(&self.active),
            handler: Arc::clone(&self.handler),
        }
    }
}

struct BusInner<P> {
    topics: Mutex<HashMap<String, Vec<Registration<P>>>>,
    next_id: AtomicU64,
}

trait Detach: Send + Sync {
    fn detach(&self, topic: &str, id: u64);
}

impl<P> Detach for BusInner<P> {
    fn detach(&self, topic: &str, id: u64) {
        let mut topics = self.topics.lock();
        if let Some(handlers) = topics.get_mut(topic) {
            handlers.retain(|r| r.id != id);
            if handlers.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

/// Topic-keyed publish/subscribe channel.
///
/// Cloning yields another handle to the same bus.
pub struct EventBus<P> {
    inner: Arc<BusInner<P>>,
}

impl<P> Clone for EventBus<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: 'static> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static> EventBus<P> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `handler` on `topic`. The returned capability removes it.
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> Unsubscribe
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.inner
            .topics
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(Registration {
                id,
                active: Arc::clone(&active),
                handler: Arc::new(handler),
            });

        let bus: Weak<dyn Detach> = Arc::downgrade(&self.inner) as Weak<dyn Detach>;
        Unsubscribe {
            topic: topic.to_string(),
            id,
            active,
            bus,
        }
    }

    /// Deliver `payload` to every handler registered on `topic`.
    ///
    /// Returns the number of handlers invoked. A panicking handler is logged
    /// and does not prevent delivery to the remaining handlers.
    pub fn publish(&self, topic: &str, payload: &P) -> usize {
        let snapshot: Vec<Registration<P>> = match self.inner.topics.lock().get(topic) {
            Some(handlers) => handlers.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for registration in snapshot {
            if !registration.active.load(Ordering::Acquire) {
                continue;
            }
            let handler = &registration.handler;
            if catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
                error!(topic, handler_id = registration.id, "Event handler panicked");
            }
            delivered += 1;
        }
        delivered
    }

    /// Number of handlers currently registered on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .lock()
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Capability to remove one handler from an [`EventBus`].
///
/// Idempotent; cloneable so a handler can hold a copy and remove itself.
/// Outliving the bus is harmless.
#[derive(Clone)]
pub struct Unsubscribe {
    topic: String,
    id: u64,
    active: Arc<AtomicBool>,
    bus: Weak<dyn Detach>,
}

impl Unsubscribe {
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.detach(&self.topic, self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&u32) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let make = move |name: &str| {
            let log = Arc::clone(&log_clone);
            let name = name.to_string();
            Box::new(move |v: &u32| log.lock().push(format!("{name}:{v}")))
                as Box<dyn Fn(&u32) + Send + Sync>
        };
        (log, make)
    }

    #[test]
    fn test_delivers_in_registration_order() {
        let bus = EventBus::<u32>::new();
        let (log, make) = recorder();
        let _a = bus.subscribe("anomaly", make("a"));
        let _b = bus.subscribe("anomaly", make("b"));
        let _c = bus.subscribe("anomaly", make("c"));

        assert_eq!(bus.publish("anomaly", &1), 3);
        assert_eq!(*log.lock(), vec!["a:1", "b:1", "c:1"]);
    }

    #[test]
    fn test_topics_are_isolated() {
        let bus = EventBus::<u32>::new();
        let (log, make) = recorder();
        let _a = bus.subscribe("samples", make("a"));
        let _b = bus.subscribe("anomaly", make("b"));

        bus.publish("anomaly", &7);
        assert_eq!(*log.lock(), vec!["b:7"]);
        assert_eq!(bus.publish("nobody", &7), 0);
    }

    #[test]
    fn test_self_unsubscribe_during_publish_keeps_others() {
        let bus = EventBus::<u32>::new();
        let (log, make) = recorder();

        let slot: Arc<Mutex<Option<Unsubscribe>>> = Arc::new(Mutex::new(None));
        let slot_clone = Arc::clone(&slot);
        let first_log = Arc::clone(&log);
        let first = bus.subscribe("anomaly", move |v: &u32| {
            first_log.lock().push(format!("first:{v}"));
            if let Some(handle) = slot_clone.lock().take() {
                handle.unsubscribe();
            }
        });
        *slot.lock() = Some(first.clone());
        let _second = bus.subscribe("anomaly", make("second"));

        assert_eq!(bus.publish("anomaly", &1), 2);
        assert_eq!(*log.lock(), vec!["first:1", "second:1"]);
        assert!(!first.is_active());

        bus.publish("anomaly", &2);
        assert_eq!(*log.lock(), vec!["first:1", "second:1", "second:2"]);
        assert_eq!(bus.subscriber_count("anomaly"), 1);
    }

    #[test]
    fn test_handler_removed_mid_dispatch_is_skipped() {
        let bus = EventBus::<u32>::new();
        let (log, make) = recorder();

        let victim_slot: Arc<Mutex<Option<Unsubscribe>>> = Arc::new(Mutex::new(None));
        let slot_clone = Arc::clone(&victim_slot);
        let _killer = bus.subscribe("t", move |_: &u32| {
            if let Some(handle) = slot_clone.lock().take() {
                handle.unsubscribe();
            }
        });
        let victim = bus.subscribe("t", make("victim"));
        *victim_slot.lock() = Some(victim);

        assert_eq!(bus.publish("t", &1), 1);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_subscribe_during_publish_not_invoked_this_round() {
        let bus = EventBus::<u32>::new();
        let (log, make) = recorder();
        let bus_clone = bus.clone();
        let late: Arc<Mutex<Vec<Unsubscribe>>> = Arc::new(Mutex::new(Vec::new()));
        let late_clone = Arc::clone(&late);
        let make = Arc::new(make);
        let make_clone = Arc::clone(&make);
        let _adder = bus.subscribe("t", move |_: &u32| {
            late_clone
                .lock()
                .push(bus_clone.subscribe("t", make_clone("late")));
        });

        bus.publish("t", &1);
        assert!(log.lock().is_empty());
        bus.publish("t", &2);
        assert_eq!(*log.lock(), vec!["late:2"]);
    }

    #[test]
    fn test_unsubscribe_is_idempotent_and_outlives_bus() {
        let bus = EventBus::<u32>::new();
        let handle = bus.subscribe("t", |_: &u32| {});
        handle.unsubscribe();
        handle.unsubscribe();
        assert_eq!(bus.subscriber_count("t"), 0);

        let orphan = bus.subscribe("t", |_: &u32| {});
        drop(bus);
        orphan.unsubscribe();
        assert!(!orphan.is_active());
    }

    #[test]
    fn test_panicking_handler_does_not_stop_delivery() {
        let bus = EventBus::<u32>::new();
        let (log, make) = recorder();
        let _bad = bus.subscribe("t", |_: &u32| panic!("boom"));
        let _good = bus.subscribe("t", make("good"));

        assert_eq!(bus.publish("t", &3), 2);
        assert_eq!(*log.lock(), vec!["good:3"]);
    }
}
