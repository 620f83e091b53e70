//! Window API: read and write the floating window's state.
//!
//! Reads fall back to [`WindowState::default`] when no window exists. Writes
//! are posted to the UI thread; when they change anything, the window's new
//! state is published as `window.state_changed`.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::Listeners;
use crate::{
    callback::CallbackRef,
    events::{EventManager, names},
    host::{Bounds, HostServices, HostWindow, WindowState},
};

/// Publish `state` on `window.state_changed`.
pub fn publish_state(events: &EventManager, state: &WindowState) -> usize {
    let payload = serde_json::to_value(state).unwrap_or(Value::Null);
    events.emit(names::WINDOW_STATE_CHANGED, &payload)
}

/// The `window` capability.
pub struct WindowApi {
    /// Owning plugin id.
    plugin: String,
    /// Host services.
    host: Arc<dyn HostServices>,
    /// This plugin's subscriptions.
    listeners: Arc<Listeners>,
}

impl WindowApi {
    /// Build the capability for `plugin`.
    pub fn new(plugin: &str, host: Arc<dyn HostServices>, listeners: Arc<Listeners>) -> Self {
        Self {
            plugin: plugin.to_string(),
            host,
            listeners,
        }
    }

    /// Current state, or defaults when there is no window.
    pub fn state(&self) -> WindowState {
        self.host
            .window()
            .map(|w| w.state())
            .unwrap_or_default()
    }

    /// Current opacity (1.0 without a window).
    pub fn opacity(&self) -> f64 {
        self.state().opacity
    }

    /// Current click-through flag (false without a window).
    pub fn click_through(&self) -> bool {
        self.state().click_through
    }

    /// Current topmost flag (true without a window).
    pub fn topmost(&self) -> bool {
        self.state().topmost
    }

    /// Current bounds (zero without a window).
    pub fn bounds(&self) -> Bounds {
        self.state().bounds
    }

    /// Set opacity, clamped to `0.0..=1.0`. NaN is rejected.
    pub fn set_opacity(&self, opacity: f64) -> bool {
        if opacity.is_nan() {
            warn!(plugin = %self.plugin, "window_opacity_nan");
            return false;
        }
        let opacity = opacity.clamp(0.0, 1.0);
        self.apply("set_opacity", move |w| w.set_opacity(opacity))
    }

    /// Enable or disable click-through.
    pub fn set_click_through(&self, enabled: bool) -> bool {
        self.apply("set_click_through", move |w| w.set_click_through(enabled))
    }

    /// Enable or disable topmost.
    pub fn set_topmost(&self, enabled: bool) -> bool {
        self.apply("set_topmost", move |w| w.set_topmost(enabled))
    }

    /// Move and resize the window. Negative sizes are rejected.
    pub fn set_bounds(&self, bounds: Bounds) -> bool {
        if bounds.width < 0 || bounds.height < 0 {
            warn!(plugin = %self.plugin, %bounds, "window_bounds_negative");
            return false;
        }
        self.apply("set_bounds", move |w| w.set_bounds(bounds))
    }

    /// Subscribe to `window.state_changed`.
    pub fn on_state_changed(&self, callback: Option<CallbackRef>) -> i64 {
        self.listeners.on(names::WINDOW_STATE_CHANGED, callback)
    }

    /// Remove a subscription made through this plugin.
    pub fn off(&self, id: i64) -> bool {
        self.listeners.off(id)
    }

    /// Post `change` to the UI thread and publish the new state if it differs.
    fn apply<F>(&self, op: &'static str, change: F) -> bool
    where
        F: FnOnce(&dyn HostWindow) + Send + 'static,
    {
        let Some(window) = self.host.window() else {
            warn!(plugin = %self.plugin, op, "window_unavailable");
            return false;
        };
        let events = self.listeners.bus().clone();
        let plugin = self.plugin.clone();
        let posted = self.host.ui().post(Box::new(move || {
            let before = window.state();
            change(window.as_ref());
            let after = window.state();
            if before != after {
                debug!(plugin = %plugin, op, "window_state_changed");
                publish_state(&events, &after);
            }
        }));
        if !posted {
            warn!(plugin = %self.plugin, op, "ui_thread_unavailable");
        }
        posted
    }
}
