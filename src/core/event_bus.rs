//! Pub/Sub Event Bus for decoupled component communication.
//!
//! Architecture:
//! - Components subscribe to an [`EventKind`] with callbacks (immediate invocation)
//! - emit() invokes callbacks synchronously AND appends the event to a bounded history log
//! - event_history() returns the log for inspection
//!
//! Callback order: FIFO (first-subscribed, first-called) within same event kind.
//! Cross-kind order undefined - don't rely on ordering between different kinds.
//!
//! A failing callback (returned `Err` or panicked) is isolated: it is logged and
//! counted, remaining callbacks still run, and emit() itself never fails.
//! Callbacks may emit again; nested emissions run depth-first.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use log::warn;

use super::effect_events::{Event, EventKind, EventPayload};
use crate::config::DEFAULT_EVENT_HISTORY_LIMIT;
use crate::error::EngineError;

/// Result returned by subscriber callbacks
pub type HandlerResult = anyhow::Result<()>;

/// Shared callback
type Callback = Arc<dyn Fn(&Event) -> HandlerResult + Send + Sync>;

type SubscriberMap = HashMap<EventKind, Vec<(u64, Callback)>>;

/// Pub/Sub Event Bus with an inspection log.
///
/// Cloning is cheap and yields a handle onto the same subscribers and history,
/// so one bus can be injected into several services.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<SubscriberMap>>,
    history: Arc<Mutex<Vec<Event>>>,
    history_limit: usize,
    next_id: Arc<AtomicU64>,
    handler_errors: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_kinds", &self.subscribers.read().map(|s| s.len()).unwrap_or(0))
            .field("history_len", &self.history.lock().map(|h| h.len()).unwrap_or(0))
            .field("history_limit", &self.history_limit)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_EVENT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(Mutex::new(Vec::new())),
            history_limit: history_limit.max(1),
            next_id: Arc::new(AtomicU64::new(1)),
            handler_errors: Arc::new(AtomicU64::new(0)),
        }
    }

    // ========== Pub/Sub (immediate) ==========

    /// Subscribe to events of `kind`.
    ///
    /// Callback is invoked synchronously on every matching emit(). Keep the
    /// returned [`Subscription`] to unsubscribe later; dropping it does not.
    ///
    /// # Example
    /// ```ignore
    /// let seen = Arc::new(Mutex::new(Vec::new()));
    /// let seen_clone = Arc::clone(&seen);
    /// bus.subscribe(EventKind::EffectCreated, move |e| {
    ///     seen_clone.lock().unwrap().push(e.clone());
    ///     Ok(())
    /// });
    /// ```
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        Subscription {
            id,
            kind,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Emit event: record it, then invoke current subscribers in subscription order.
    ///
    /// Returns the number of callbacks invoked.
    pub fn emit(&self, payload: EventPayload) -> usize {
        self.emit_with_meta(payload, None)
    }

    /// Emit with caller-supplied metadata attached to the event.
    pub fn emit_with_meta(&self, payload: EventPayload, meta: Option<serde_json::Value>) -> usize {
        let event = Event::new(payload, meta);
        let kind = event.kind;
        self.record(event.clone());

        // Snapshot callbacks and release the lock: callbacks may subscribe or emit.
        let callbacks: Vec<Callback> = {
            let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            subscribers
                .get(&kind)
                .map(|cbs| cbs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                .unwrap_or_default()
        };

        for cb in &callbacks {
            match panic::catch_unwind(AssertUnwindSafe(|| cb(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => self.isolate(kind, err.to_string()),
                Err(panic) => self.isolate(kind, panic_message(panic.as_ref())),
            }
        }
        callbacks.len()
    }

    fn isolate(&self, kind: EventKind, message: String) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
        warn!("{}", EngineError::Handler { kind, message });
    }

    fn record(&self, event: Event) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        if history.len() >= self.history_limit {
            let evict_count = (history.len() / 2).max(1);
            warn!("EventBus history full ({} events), evicting oldest {}", history.len(), evict_count);
            history.drain(0..evict_count);
        }
        history.push(event);
    }

    // ========== Inspection & Utilities ==========

    /// Copy of the recorded events, oldest first.
    pub fn event_history(&self) -> Vec<Event> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of callbacks that failed since creation or the last clear().
    pub fn handler_error_count(&self) -> u64 {
        self.handler_errors.load(Ordering::Relaxed)
    }

    /// Clear subscribers for `kind`
    pub fn unsubscribe_all(&self, kind: EventKind) {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner()).remove(&kind);
    }

    /// Clear all subscribers, history and error count
    pub fn clear(&self) {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.handler_errors.store(0, Ordering::Relaxed);
    }

    /// Check if there are subscribers for `kind`
    pub fn has_subscribers(&self, kind: EventKind) -> bool {
        self.subscriber_count(kind) > 0
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    kind: EventKind,
    subscribers: Weak<RwLock<SubscriberMap>>,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Remove this callback. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(subscribers) = self.subscribers.upgrade() else {
            return false;
        };
        let mut subscribers = subscribers.write().unwrap_or_else(|e| e.into_inner());
        let Some(cbs) = subscribers.get_mut(&self.kind) else {
            return false;
        };
        let before = cbs.len();
        cbs.retain(|(id, _)| *id != self.id);
        before != cbs.len()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    fn reordered(from: usize, to: usize) -> EventPayload {
        EventPayload::EffectsReordered { from, to }
    }

    #[test]
    fn test_subscribe_emit_immediate() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicI32::new(0));
        let c = Arc::clone(&counter);

        bus.subscribe(EventKind::EffectsReordered, move |e| {
            if let EventPayload::EffectsReordered { to, .. } = e.payload {
                c.fetch_add(to as i32, Ordering::SeqCst);
            }
            Ok(())
        });

        assert_eq!(bus.emit(reordered(0, 10)), 1);
        // Callback was invoked immediately
        assert_eq!(counter.load(Ordering::SeqCst), 10);

        bus.emit(reordered(0, 5));
        assert_eq!(counter.load(Ordering::SeqCst), 15);
    }

    #[test]
    fn test_emit_records_history() {
        let bus = EventBus::new();

        bus.emit(reordered(1, 2));
        bus.emit(EventPayload::CommandExecuted { description: "x".into(), undo_depth: 1 });

        let events = bus.event_history();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::EffectsReordered);
        assert_eq!(events[1].kind, EventKind::CommandExecuted);
    }

    #[test]
    fn test_multiple_subscribers_in_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let o = Arc::clone(&order);
            bus.subscribe(EventKind::EffectsReordered, move |_| {
                o.lock().unwrap().push(tag);
                Ok(())
            });
        }

        bus.emit(reordered(0, 1));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_failing_subscriber_is_isolated() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicI32::new(0));

        bus.subscribe(EventKind::EffectsReordered, |_| anyhow::bail!("boom"));
        bus.subscribe(EventKind::EffectsReordered, |_| panic!("handler exploded"));
        let c = Arc::clone(&counter);
        bus.subscribe(EventKind::EffectsReordered, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(bus.emit(reordered(0, 1)), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_error_count(), 2);
        assert_eq!(bus.history_len(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicI32::new(0));
        let c = Arc::clone(&counter);

        let sub = bus.subscribe(EventKind::EffectsReordered, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let c2 = Arc::clone(&counter);
        bus.subscribe(EventKind::EffectsReordered, move |_| {
            c2.fetch_add(100, Ordering::SeqCst);
            Ok(())
        });

        bus.emit(reordered(0, 1));
        assert_eq!(counter.load(Ordering::SeqCst), 101);

        assert_eq!(sub.kind(), EventKind::EffectsReordered);
        assert!(sub.unsubscribe());
        bus.emit(reordered(0, 1));
        // Only the second subscriber remains
        assert_eq!(counter.load(Ordering::SeqCst), 201);

        bus.unsubscribe_all(EventKind::EffectsReordered);
        assert!(!bus.has_subscribers(EventKind::EffectsReordered));
        assert_eq!(bus.emit(reordered(0, 1)), 0);
        // But event still recorded
        assert_eq!(bus.history_len(), 3);
    }

    #[test]
    fn test_nested_emit_is_depth_first() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let inner_bus = bus.clone();
        let o = Arc::clone(&order);
        bus.subscribe(EventKind::EffectsReordered, move |_| {
            o.lock().unwrap().push("outer-1");
            inner_bus.emit(EventPayload::CommandExecuted { description: "nested".into(), undo_depth: 0 });
            Ok(())
        });
        let o = Arc::clone(&order);
        bus.subscribe(EventKind::EffectsReordered, move |_| {
            o.lock().unwrap().push("outer-2");
            Ok(())
        });
        let o = Arc::clone(&order);
        bus.subscribe(EventKind::CommandExecuted, move |_| {
            o.lock().unwrap().push("nested");
            Ok(())
        });

        bus.emit(reordered(0, 1));
        assert_eq!(*order.lock().unwrap(), vec!["outer-1", "nested", "outer-2"]);

        let kinds: Vec<EventKind> = bus.event_history().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::EffectsReordered, EventKind::CommandExecuted]);
    }

    #[test]
    fn test_history_is_bounded() {
        let bus = EventBus::with_history_limit(4);
        for i in 0..10 {
            bus.emit(reordered(i, i + 1));
        }
        assert!(bus.history_len() <= 4);
        // Newest event always kept
        let last = bus.event_history().pop().unwrap();
        assert_eq!(last.payload, reordered(9, 10));
    }

    #[test]
    fn test_clear_resets_everything() {
        let bus = EventBus::new();
        bus.subscribe(EventKind::EffectsReordered, |_| anyhow::bail!("nope"));
        bus.emit_with_meta(reordered(0, 1), Some(serde_json::json!({"origin": "test"})));
        assert_eq!(bus.event_history()[0].meta, Some(serde_json::json!({"origin": "test"})));

        bus.clear();
        assert_eq!(bus.history_len(), 0);
        assert_eq!(bus.handler_error_count(), 0);
        assert!(!bus.has_subscribers(EventKind::EffectsReordered));
    }

    #[test]
    fn test_clones_share_state() {
        let bus = EventBus::new();
        let handle = bus.clone();
        let counter = Arc::new(AtomicI32::new(0));
        let c = Arc::clone(&counter);
        bus.subscribe(EventKind::EffectsReordered, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        handle.emit(reordered(0, 1));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(bus.history_len(), 1);
    }
}
