//! Capability objects handed to a plugin.
//!
//! One family of API objects is built per plugin context, each holding only
//! the references that capability needs. Everything a plugin subscribes to on
//! the shared [`EventManager`] goes through its [`Listeners`] so teardown can
//! remove exactly that plugin's registrations.

use std::{collections::BTreeMap, mem, sync::Arc};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    callback::CallbackRef,
    events::{EventManager, INVALID_ID},
    hotkey::HotkeyRegistry,
};

pub mod config;
pub mod events;
pub mod log;
pub mod subtitle;
pub mod webview;
pub mod window;

pub use config::ConfigApi;
pub use events::EventApi;
pub use log::LogApi;
pub use subtitle::SubtitleApi;
pub use webview::{InjectOptions, InjectTiming, WebViewApi};
pub use window::WindowApi;

/// The event registrations owned by one plugin.
pub struct Listeners {
    /// Owning plugin id.
    plugin: String,
    /// Shared bus.
    events: Arc<EventManager>,
    /// Registration id to event name, for this plugin only.
    owned: Mutex<BTreeMap<i64, String>>,
}

impl Listeners {
    /// Track registrations for `plugin` on `events`.
    pub fn new(plugin: &str, events: Arc<EventManager>) -> Self {
        Self {
            plugin: plugin.to_string(),
            events,
            owned: Mutex::new(BTreeMap::new()),
        }
    }

    /// The shared bus.
    pub fn bus(&self) -> &Arc<EventManager> {
        &self.events
    }

    /// Subscribe and remember the id. Returns [`INVALID_ID`] on rejection.
    pub fn on(&self, event: &str, callback: Option<CallbackRef>) -> i64 {
        let id = self.events.on(event, callback);
        if id != INVALID_ID {
            self.owned.lock().insert(id, event.to_string());
        }
        id
    }

    /// Remove one of this plugin's registrations. Ids owned by other plugins
    /// are left alone and report false.
    pub fn off(&self, id: i64) -> bool {
        if self.owned.lock().remove(&id).is_none() {
            return false;
        }
        self.events.off(id)
    }

    /// Remove this plugin's registrations for `event`. Returns how many.
    pub fn off_event(&self, event: &str) -> usize {
        let ids: Vec<i64> = {
            let mut owned = self.owned.lock();
            let ids: Vec<i64> = owned
                .iter()
                .filter(|(_, name)| name.as_str() == event)
                .map(|(id, _)| *id)
                .collect();
            for id in &ids {
                owned.remove(id);
            }
            ids
        };
        ids.into_iter().filter(|id| self.events.off(*id)).count()
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.owned.lock().len()
    }

    /// Whether there are no live registrations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every registration this plugin made.
    pub fn cleanup(&self) {
        let owned = mem::take(&mut *self.owned.lock());
        let count = owned.len();
        for id in owned.into_keys() {
            self.events.off(id);
        }
        if count > 0 {
            debug!(plugin = %self.plugin, count, "listeners_cleaned_up");
        }
    }
}

/// The API objects granted to one plugin. Absent entries are capabilities
/// the manifest did not request.
pub struct PluginApis {
    /// Always present.
    pub log: LogApi,
    /// Every subscription the plugin makes, whichever API it goes through.
    pub listeners: Arc<Listeners>,
    /// `window`.
    pub window: Option<Arc<WindowApi>>,
    /// `webview`.
    pub webview: Option<Arc<WebViewApi>>,
    /// `hotkey`.
    pub hotkey: Option<Arc<HotkeyRegistry>>,
    /// `subtitle`.
    pub subtitle: Option<Arc<SubtitleApi>>,
    /// `events`.
    pub events: Option<Arc<EventApi>>,
    /// `config`.
    pub config: Option<Arc<ConfigApi>>,
}

impl PluginApis {
    /// Release everything the plugin registered with the host.
    pub fn cleanup(&self) {
        if let Some(hotkey) = &self.hotkey {
            hotkey.cleanup();
        }
        self.listeners.cleanup();
        if let Some(webview) = &self.webview {
            webview.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::callback::FnCallback;

    fn noop() -> Option<CallbackRef> {
        Some(FnCallback::new("test", |_| Ok(())))
    }

    #[test]
    fn off_only_touches_own_ids() {
        let bus = Arc::new(EventManager::new());
        let a = Listeners::new("a", bus.clone());
        let b = Listeners::new("b", bus.clone());
        let ida = a.on("e", noop());
        let idb = b.on("e", noop());
        assert!(!a.off(idb));
        assert_eq!(bus.listener_count("e"), 2);
        assert!(a.off(ida));
        assert!(!a.off(ida));
        assert_eq!(bus.listener_count("e"), 1);
    }

    #[test]
    fn off_event_and_cleanup_are_scoped() {
        let bus = Arc::new(EventManager::new());
        let a = Listeners::new("a", bus.clone());
        let b = Listeners::new("b", bus.clone());
        a.on("e", noop());
        a.on("e", noop());
        a.on("f", noop());
        b.on("e", noop());
        assert_eq!(a.off_event("e"), 2);
        assert_eq!(bus.listener_count("e"), 1);
        a.cleanup();
        assert!(a.is_empty());
        assert_eq!(bus.total_listeners(), 1);
        assert_eq!(bus.emit("e", &Value::Null), 1);
    }

    #[test]
    fn rejected_subscription_is_not_tracked() {
        let bus = Arc::new(EventManager::new());
        let a = Listeners::new("a", bus);
        assert_eq!(a.on("e", None), INVALID_ID);
        assert!(a.is_empty());
    }
}
