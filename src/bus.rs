//! Event bus.
//!
//! Publish/subscribe between the sync layer and components that must not
//! depend on it directly. Delivery is synchronous: `publish` returns after
//! every current subscriber of the topic ran, in subscription order.
//! Subscribers that join later do not see earlier events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::model::{Key, WriteSource};

/// Event categories subscribers can listen to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    RefreshCompleted,
    BookingSelectionChanged,
    RecordChanged,
}

/// An event published on the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A full refresh finished; `keys` were re-read from the remote store.
    RefreshCompleted { keys: Vec<Key>, at: DateTime<Utc> },
    /// The booking selected in the UI changed.
    BookingSelectionChanged { booking: Option<String> },
    /// The cached content of a record changed.
    RecordChanged { key: Key, source: WriteSource },
}

impl SyncEvent {
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::RefreshCompleted { .. } => Topic::RefreshCompleted,
            Self::BookingSelectionChanged { .. } => Topic::BookingSelectionChanged,
            Self::RecordChanged { .. } => Topic::RecordChanged,
        }
    }
}

type Handler = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

struct Subscriber {
    id: u64,
    topic: Topic,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl Registry {
    fn subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64) {
        self.subscribers().retain(|s| s.id != id);
    }
}

/// Shared event bus. Clones publish to the same subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.registry.subscribers().len())
            .finish()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one topic.
    ///
    /// The handler stays registered until the returned [`Subscription`] is
    /// dropped or unsubscribed.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.subscribers().push(Subscriber {
            id,
            topic,
            handler: Arc::new(handler),
        });
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver an event to every subscriber of its topic.
    ///
    /// Returns the number of handlers that ran. Handlers run outside the
    /// registry lock, so they may publish or subscribe themselves.
    pub fn publish(&self, event: &SyncEvent) -> usize {
        let topic = event.topic();
        let handlers: Vec<Handler> = self
            .registry
            .subscribers()
            .iter()
            .filter(|s| s.topic == topic)
            .map(|s| Arc::clone(&s.handler))
            .collect();

        trace!(?topic, subscribers = handlers.len(), "Publishing event");
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    /// Number of live subscribers of a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.registry
            .subscribers()
            .iter()
            .filter(|s| s.topic == topic)
            .count()
    }
}

/// Handle of a registered handler. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Remove the handler now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed(key: &str) -> SyncEvent {
        SyncEvent::RecordChanged {
            key: key.parse().unwrap(),
            source: WriteSource::Local,
        }
    }

    #[test]
    fn test_delivery_in_subscription_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let seen = Arc::clone(&seen);
            bus.subscribe(Topic::RecordChanged, move |_| seen.lock().unwrap().push("first"))
        };
        let second = {
            let seen = Arc::clone(&seen);
            bus.subscribe(Topic::RecordChanged, move |_| seen.lock().unwrap().push("second"))
        };

        assert_eq!(bus.publish(&changed("vessel:7")), 2);
        assert_eq!(*seen.lock().unwrap(), ["first", "second"]);
        drop((first, second));
    }

    #[test]
    fn test_topics_are_isolated() {
        let bus = EventBus::new();
        let hits = Arc::new(Mutex::new(0));
        let _sub = {
            let hits = Arc::clone(&hits);
            bus.subscribe(Topic::RefreshCompleted, move |_| *hits.lock().unwrap() += 1)
        };

        assert_eq!(bus.publish(&changed("vessel:7")), 0);
        bus.publish(&SyncEvent::RefreshCompleted {
            keys: vec![],
            at: Utc::now(),
        });
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn test_unsubscribe_and_drop() {
        let bus = EventBus::new();
        let sub = bus.subscribe(Topic::BookingSelectionChanged, |_| {});
        let other = bus.subscribe(Topic::BookingSelectionChanged, |_| {});
        assert_eq!(bus.subscriber_count(Topic::BookingSelectionChanged), 2);

        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(Topic::BookingSelectionChanged), 1);

        drop(other);
        assert_eq!(bus.subscriber_count(Topic::BookingSelectionChanged), 0);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.publish(&SyncEvent::BookingSelectionChanged {
            booking: Some("NAY-001".to_string()),
        });

        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = Arc::clone(&seen);
            bus.subscribe(Topic::BookingSelectionChanged, move |e| {
                seen.lock().unwrap().push(e.clone());
            })
        };
        assert!(seen.lock().unwrap().is_empty());

        bus.publish(&SyncEvent::BookingSelectionChanged { booking: None });
        assert_eq!(
            *seen.lock().unwrap(),
            [SyncEvent::BookingSelectionChanged { booking: None }]
        );
    }

    #[test]
    fn test_handler_may_publish() {
        let bus = EventBus::new();
        let inner_hits = Arc::new(Mutex::new(0));

        let _inner = {
            let hits = Arc::clone(&inner_hits);
            bus.subscribe(Topic::RefreshCompleted, move |_| *hits.lock().unwrap() += 1)
        };
        let _outer = {
            let bus = bus.clone();
            bus.clone().subscribe(Topic::RecordChanged, move |_| {
                bus.publish(&SyncEvent::RefreshCompleted {
                    keys: vec![],
                    at: Utc::now(),
                });
            })
        };

        bus.publish(&changed("archive:A1"));
        assert_eq!(*inner_hits.lock().unwrap(), 1);
    }
}
