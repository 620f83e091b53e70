//! Named-event bus with per-registration numeric handles.
//!
//! Host domain events (window, subtitle) reach scripts through this bus.
//! Listeners for one name are delivered in registration order. Dispatch works
//! on a snapshot of the listener list taken before the first callback runs, so
//! callbacks may add or remove listeners freely without affecting the current
//! firing.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicI64, Ordering},
};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::callback::{CallbackRef, invoke_guarded};

/// Well-known event names fired by the host.
pub mod names {
    /// Window opacity, click-through, topmost or bounds changed.
    pub const WINDOW_STATE_CHANGED: &str = "window.state_changed";
    /// A subtitle track was loaded.
    pub const SUBTITLE_LOADED: &str = "subtitle.loaded";
    /// The active subtitle entry changed (payload is the entry or null).
    pub const SUBTITLE_CHANGED: &str = "subtitle.changed";
    /// The subtitle track was cleared.
    pub const SUBTITLE_CLEARED: &str = "subtitle.cleared";

    /// Prefixes reserved for host-fired events.
    pub const RESERVED_PREFIXES: &[&str] = &["window.", "subtitle."];

    /// Whether `name` belongs to a host-reserved namespace.
    pub fn is_reserved(name: &str) -> bool {
        RESERVED_PREFIXES.iter().any(|p| name.starts_with(p))
    }
}

/// Sentinel returned by [`EventManager::on`] when registration is rejected.
pub const INVALID_ID: i64 = -1;

/// A single listener registration.
#[derive(Clone)]
struct Listener {
    /// Registration id.
    id: i64,
    /// Callback to run on delivery.
    callback: CallbackRef,
}

/// Listener tables guarded together so the id index and name lists agree.
#[derive(Default)]
struct Tables {
    /// Ordered listeners per event name.
    by_name: HashMap<String, Vec<Listener>>,
    /// Registration id to event name.
    by_id: HashMap<i64, String>,
}

/// Pub/sub bus shared by every plugin context.
pub struct EventManager {
    /// Next registration id; ids are never reused.
    next_id: AtomicI64,
    /// Listener tables.
    tables: Mutex<Tables>,
}

impl Default for EventManager {
    fn default() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            tables: Mutex::new(Tables::default()),
        }
    }
}

impl EventManager {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `callback` to `event`. A missing callback returns [`INVALID_ID`].
    pub fn on(&self, event: &str, callback: Option<CallbackRef>) -> i64 {
        let Some(callback) = callback else {
            warn!(event, "event_on_null_callback");
            return INVALID_ID;
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut tables = self.tables.lock();
        tables
            .by_name
            .entry(event.to_string())
            .or_default()
            .push(Listener { id, callback });
        tables.by_id.insert(id, event.to_string());
        debug!(event, id, "event_on");
        id
    }

    /// Remove exactly one registration. Returns whether it existed.
    pub fn off(&self, id: i64) -> bool {
        let mut tables = self.tables.lock();
        let Some(event) = tables.by_id.remove(&id) else {
            return false;
        };
        if let Some(list) = tables.by_name.get_mut(&event) {
            list.retain(|l| l.id != id);
            if list.is_empty() {
                tables.by_name.remove(&event);
            }
        }
        debug!(event = %event, id, "event_off");
        true
    }

    /// Remove every registration for `event`. Returns how many were removed.
    pub fn off_event(&self, event: &str) -> usize {
        let mut tables = self.tables.lock();
        let Some(list) = tables.by_name.remove(event) else {
            return 0;
        };
        for l in &list {
            tables.by_id.remove(&l.id);
        }
        debug!(event, removed = list.len(), "event_off_all");
        list.len()
    }

    /// Name of the event a registration belongs to.
    pub fn event_of(&self, id: i64) -> Option<String> {
        self.tables.lock().by_id.get(&id).cloned()
    }

    /// Number of listeners currently registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.tables
            .lock()
            .by_name
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Total number of registrations across all events.
    pub fn total_listeners(&self) -> usize {
        self.tables.lock().by_id.len()
    }

    /// Deliver `payload` to a snapshot of `event`'s listeners, in registration
    /// order. Faulting listeners are logged and skipped; returns how many
    /// listeners were invoked.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        let snapshot: Vec<Listener> = self
            .tables
            .lock()
            .by_name
            .get(event)
            .cloned()
            .unwrap_or_default();
        trace!(event, listeners = snapshot.len(), "event_emit");
        for listener in &snapshot {
            invoke_guarded(listener.callback.as_ref(), event, Some(payload));
        }
        snapshot.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::callback::{CallbackFault, FnCallback};

    fn recorder(tag: &'static str, log: &Arc<Mutex<Vec<String>>>) -> CallbackRef {
        let log = log.clone();
        FnCallback::new("test", move |_| {
            log.lock().push(tag.to_string());
            Ok(())
        })
    }

    #[test]
    fn delivery_in_registration_order() {
        let bus = EventManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on("e", Some(recorder("a", &log)));
        bus.on("e", Some(recorder("b", &log)));
        bus.on("other", Some(recorder("x", &log)));
        assert_eq!(bus.emit("e", &json!(null)), 2);
        assert_eq!(*log.lock(), ["a", "b"]);
    }

    #[test]
    fn null_callback_is_rejected() {
        let bus = EventManager::new();
        assert_eq!(bus.on("e", None), INVALID_ID);
        assert_eq!(bus.total_listeners(), 0);
    }

    #[test]
    fn ids_are_unique_across_events() {
        let bus = EventManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = bus.on("a", Some(recorder("a", &log)));
        let b = bus.on("b", Some(recorder("b", &log)));
        assert_ne!(a, b);
        assert_eq!(bus.event_of(b).as_deref(), Some("b"));
    }

    #[test]
    fn off_is_idempotent() {
        let bus = EventManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = bus.on("e", Some(recorder("a", &log)));
        assert!(bus.off(id));
        assert!(!bus.off(id));
        assert!(!bus.off(999));
        assert_eq!(bus.off_event("e"), 0);
        assert_eq!(bus.emit("e", &json!(1)), 0);
    }

    #[test]
    fn off_event_removes_all() {
        let bus = EventManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = bus.on("e", Some(recorder("a", &log)));
        bus.on("e", Some(recorder("b", &log)));
        bus.on("f", Some(recorder("f", &log)));
        assert_eq!(bus.off_event("e"), 2);
        assert!(!bus.off(a));
        assert_eq!(bus.emit("e", &json!(1)), 0);
        assert_eq!(bus.total_listeners(), 1);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn self_removal_during_dispatch_still_delivers_once() {
        let bus = Arc::new(EventManager::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let id_slot = Arc::new(AtomicI64::new(INVALID_ID));
        let (b, c, slot) = (Arc::downgrade(&bus), calls.clone(), id_slot.clone());
        let id = bus.on(
            "e",
            Some(FnCallback::new("test", move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                if let Some(bus) = b.upgrade() {
                    bus.off(slot.load(Ordering::SeqCst));
                }
                Ok(())
            })),
        );
        id_slot.store(id, Ordering::SeqCst);

        assert_eq!(bus.emit("e", &json!(null)), 1);
        assert_eq!(bus.emit("e", &json!(null)), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_added_during_dispatch_waits_for_next_firing() {
        let bus = Arc::new(EventManager::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let (b, l) = (Arc::downgrade(&bus), log.clone());
        bus.on(
            "e",
            Some(FnCallback::new("test", move |_| {
                l.lock().push("outer".to_string());
                if let Some(bus) = b.upgrade() {
                    bus.on("e", Some(recorder("inner", &l)));
                }
                Ok(())
            })),
        );
        assert_eq!(bus.emit("e", &json!(null)), 1);
        assert_eq!(*log.lock(), ["outer"]);
    }

    #[test]
    fn faulting_listener_does_not_block_others() {
        let bus = EventManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.on(
            "e",
            Some(FnCallback::new("bad", |_| Err(CallbackFault::new("boom")))),
        );
        bus.on("e", Some(recorder("good", &log)));
        assert_eq!(bus.emit("e", &json!({"k": 1})), 2);
        assert_eq!(*log.lock(), ["good"]);
    }

    #[test]
    fn reserved_names() {
        assert!(names::is_reserved(names::WINDOW_STATE_CHANGED));
        assert!(names::is_reserved("subtitle.anything"));
        assert!(!names::is_reserved("plugin.custom"));
    }
}
