//! Domain events
//!
//! The archive store and settings service publish `ArchiveEvent`s on an
//! `EventBus`; observers (list models, tag filters, theme switchers)
//! subscribe without the publishers knowing about them.
//!
//! Dispatch goes through a table keyed by `EventKind`, plus catch-all
//! handlers that see every event. Delivery is synchronous on the
//! publishing thread, in subscription order.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ArchiveEntry, Tag};

/// Events emitted by the archive store and settings service
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveEvent {
    /// A document was added to the archive
    EntryAdded(ArchiveEntry),
    /// A document was removed from the archive
    DocumentDeleted(Uuid),
    /// A document's description changed
    DescriptionChanged { id: Uuid, text: String },
    /// A tag was added to a document
    TagAdded { tag: Tag, id: Uuid },
    /// The union of all tags, after a change that may have affected it
    AllTagsChanged(BTreeSet<Tag>),
    /// The archive was persisted with this modification time
    ArchiveModified(DateTime<Utc>),
    /// The light theme setting changed
    LightThemeChanged(bool),
}

/// Discriminant of an `ArchiveEvent`, used as the dispatch key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    EntryAdded,
    DocumentDeleted,
    DescriptionChanged,
    TagAdded,
    AllTagsChanged,
    ArchiveModified,
    LightThemeChanged,
}

impl ArchiveEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ArchiveEvent::EntryAdded(_) => EventKind::EntryAdded,
            ArchiveEvent::DocumentDeleted(_) => EventKind::DocumentDeleted,
            ArchiveEvent::DescriptionChanged { .. } => EventKind::DescriptionChanged,
            ArchiveEvent::TagAdded { .. } => EventKind::TagAdded,
            ArchiveEvent::AllTagsChanged(_) => EventKind::AllTagsChanged,
            ArchiveEvent::ArchiveModified(_) => EventKind::ArchiveModified,
            ArchiveEvent::LightThemeChanged(_) => EventKind::LightThemeChanged,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&ArchiveEvent) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    by_kind: HashMap<EventKind, Vec<(SubscriptionId, Handler)>>,
    all: Vec<(SubscriptionId, Handler)>,
}

/// Publish/subscribe channel for `ArchiveEvent`s
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<Handlers>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one kind of event
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ArchiveEvent) + Send + Sync + 'static,
    {
        let id = self.next_subscription();
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers
            .by_kind
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Subscribe to every event
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ArchiveEvent) + Send + Sync + 'static,
    {
        let id = self.next_subscription();
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.all.push((id, Arc::new(handler)));
        id
    }

    /// Remove a subscription; returns false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        let before = handlers.all.len()
            + handlers.by_kind.values().map(Vec::len).sum::<usize>();

        handlers.all.retain(|(sub, _)| *sub != id);
        for list in handlers.by_kind.values_mut() {
            list.retain(|(sub, _)| *sub != id);
        }

        let after = handlers.all.len()
            + handlers.by_kind.values().map(Vec::len).sum::<usize>();
        after < before
    }

    /// Deliver an event to its kind-specific handlers, then catch-all handlers
    pub fn publish(&self, event: ArchiveEvent) {
        // Snapshot under the lock, call outside it, so handlers may subscribe
        let targets: Vec<Handler> = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers
                .by_kind
                .get(&event.kind())
                .into_iter()
                .flatten()
                .chain(handlers.all.iter())
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };

        for handler in targets {
            handler(&event);
        }
    }

    fn next_subscription(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("EventBus")
            .field("kinds", &handlers.by_kind.len())
            .field("catch_all", &handlers.all.len())
            .finish()
    }
}

/// Records every published event; handy for observers that poll
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<std::sync::Mutex<Vec<ArchiveEvent>>>,
}

impl EventLog {
    /// Create a log attached to `bus`
    pub fn attach(bus: &EventBus) -> Self {
        let log = Self::default();
        let sink = Arc::clone(&log.events);
        bus.subscribe_all(move |event| {
            sink.lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event.clone());
        });
        log
    }

    /// Take every recorded event, leaving the log empty
    pub fn drain(&self) -> Vec<ArchiveEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Kinds of the recorded events, in order
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(ArchiveEvent::kind)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_kind_dispatch_only_reaches_matching_handlers() {
        let bus = EventBus::new();
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&deleted);
        bus.subscribe(EventKind::DocumentDeleted, move |event| {
            if let ArchiveEvent::DocumentDeleted(id) = event {
                sink.lock().unwrap().push(*id);
            }
        });

        let id = Uuid::new_v4();
        bus.publish(ArchiveEvent::LightThemeChanged(true));
        bus.publish(ArchiveEvent::DocumentDeleted(id));

        assert_eq!(*deleted.lock().unwrap(), vec![id]);
    }

    #[test]
    fn test_catch_all_sees_every_event_in_order() {
        let bus = EventBus::new();
        let log = EventLog::attach(&bus);

        bus.publish(ArchiveEvent::LightThemeChanged(false));
        bus.publish(ArchiveEvent::AllTagsChanged(BTreeSet::new()));

        assert_eq!(
            log.kinds(),
            vec![EventKind::LightThemeChanged, EventKind::AllTagsChanged]
        );
        assert_eq!(log.drain().len(), 2);
        assert!(log.drain().is_empty());
    }

    #[test]
    fn test_kind_handlers_run_before_catch_all() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&order);
        bus.subscribe_all(move |_| sink.lock().unwrap().push("all"));
        let sink = Arc::clone(&order);
        bus.subscribe(EventKind::LightThemeChanged, move |_| {
            sink.lock().unwrap().push("kind")
        });

        bus.publish(ArchiveEvent::LightThemeChanged(true));
        assert_eq!(*order.lock().unwrap(), vec!["kind", "all"]);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let id = bus.subscribe_all(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(ArchiveEvent::LightThemeChanged(true));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(ArchiveEvent::LightThemeChanged(false));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_may_subscribe_during_delivery() {
        let bus = Arc::new(EventBus::new());
        let inner_bus = Arc::clone(&bus);
        bus.subscribe(EventKind::LightThemeChanged, move |_| {
            inner_bus.subscribe_all(|_| {});
        });

        // Would deadlock if handlers ran under the lock
        bus.publish(ArchiveEvent::LightThemeChanged(true));
    }
}
