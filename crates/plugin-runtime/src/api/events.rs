//! Event API: generic subscriptions and plugin-defined events.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::Listeners;
use crate::{callback::CallbackRef, events::names};

/// The `events` capability.
pub struct EventApi {
    /// Owning plugin id.
    plugin: String,
    /// This plugin's subscriptions.
    listeners: Arc<Listeners>,
}

impl EventApi {
    /// Build the capability for `plugin`.
    pub fn new(plugin: &str, listeners: Arc<Listeners>) -> Self {
        Self {
            plugin: plugin.to_string(),
            listeners,
        }
    }

    /// Subscribe to any event, host-fired or plugin-defined.
    pub fn on(&self, event: &str, callback: Option<CallbackRef>) -> i64 {
        if event.trim().is_empty() {
            warn!(plugin = %self.plugin, "events_on_empty_name");
            return -1;
        }
        self.listeners.on(event, callback)
    }

    /// Remove one of this plugin's subscriptions.
    pub fn off(&self, id: i64) -> bool {
        self.listeners.off(id)
    }

    /// Remove this plugin's subscriptions to `event`.
    pub fn off_all(&self, event: &str) -> usize {
        self.listeners.off_event(event)
    }

    /// Fire a plugin-defined event. Names in the host namespaces are refused.
    /// Returns the number of listeners reached, or `None` if refused.
    pub fn emit(&self, event: &str, payload: &Value) -> Option<usize> {
        if event.trim().is_empty() {
            warn!(plugin = %self.plugin, "events_emit_empty_name");
            return None;
        }
        if names::is_reserved(event) {
            warn!(plugin = %self.plugin, event, "events_emit_reserved");
            return None;
        }
        let reached = self.listeners.bus().emit(event, payload);
        debug!(plugin = %self.plugin, event, reached, "events_emit");
        Some(reached)
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::{callback::FnCallback, events::EventManager};

    #[test]
    fn plugins_talk_through_custom_events() {
        let bus = Arc::new(EventManager::new());
        let a = EventApi::new("a", Arc::new(Listeners::new("a", bus.clone())));
        let b = EventApi::new("b", Arc::new(Listeners::new("b", bus)));
        let got = Arc::new(Mutex::new(Vec::new()));
        let g = got.clone();
        let id = b.on(
            "a.ping",
            Some(FnCallback::new("b", move |p| {
                g.lock().push(p.cloned());
                Ok(())
            })),
        );
        assert_eq!(a.emit("a.ping", &json!({"n": 1})), Some(1));
        assert_eq!(got.lock()[0], Some(json!({"n": 1})));
        assert!(!a.off(id));
        assert!(b.off(id));
        assert_eq!(a.emit("a.ping", &json!(null)), Some(0));
    }

    #[test]
    fn reserved_and_empty_names_are_refused() {
        let bus = Arc::new(EventManager::new());
        let a = EventApi::new("a", Arc::new(Listeners::new("a", bus)));
        assert_eq!(a.emit("window.state_changed", &json!({})), None);
        assert_eq!(a.emit("subtitle.loaded", &json!({})), None);
        assert_eq!(a.emit("", &json!({})), None);
        assert_eq!(a.on(" ", Some(FnCallback::new("a", |_| Ok(())))), -1);
    }

    #[test]
    fn off_all_counts_own_registrations() {
        let bus = Arc::new(EventManager::new());
        let a = EventApi::new("a", Arc::new(Listeners::new("a", bus.clone())));
        for _ in 0..3 {
            a.on("x", Some(FnCallback::new("a", |_| Ok(()))));
        }
        assert_eq!(a.off_all("x"), 3);
        assert_eq!(a.off_all("x"), 0);
        assert_eq!(bus.total_listeners(), 0);
    }
}
