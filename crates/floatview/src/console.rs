//! Window and content surface stand-ins that report to the log.

use std::{
    collections::BTreeMap,
    result::Result as StdResult,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use plugin_runtime::host::{Bounds, ContentSurface, HostWindow, ScriptCompletion, WindowState};
use tracing::info;

/// Log target for window writes.
const WINDOW_TARGET: &str = "floatview::window";
/// Log target for content surface calls.
const SURFACE_TARGET: &str = "floatview::surface";

/// A window with no pixels; every write is logged.
pub struct ConsoleWindow {
    /// Current properties.
    state: Mutex<WindowState>,
}

impl ConsoleWindow {
    /// Create a window at `bounds` with default properties.
    pub fn new(bounds: Bounds) -> Self {
        Self {
            state: Mutex::new(WindowState {
                bounds,
                ..WindowState::default()
            }),
        }
    }
}

impl HostWindow for ConsoleWindow {
    fn opacity(&self) -> f64 {
        self.state.lock().opacity
    }

    fn click_through(&self) -> bool {
        self.state.lock().click_through
    }

    fn topmost(&self) -> bool {
        self.state.lock().topmost
    }

    fn bounds(&self) -> Bounds {
        self.state.lock().bounds
    }

    fn set_opacity(&self, opacity: f64) {
        info!(target: WINDOW_TARGET, opacity, "set_opacity");
        self.state.lock().opacity = opacity;
    }

    fn set_click_through(&self, enabled: bool) {
        info!(target: WINDOW_TARGET, enabled, "set_click_through");
        self.state.lock().click_through = enabled;
    }

    fn set_topmost(&self, enabled: bool) {
        info!(target: WINDOW_TARGET, enabled, "set_topmost");
        self.state.lock().topmost = enabled;
    }

    fn set_bounds(&self, bounds: Bounds) {
        info!(target: WINDOW_TARGET, %bounds, "set_bounds");
        self.state.lock().bounds = bounds;
    }
}

/// A content surface without a web engine. Scripts are logged, and
/// `execute_script` always yields `null`.
#[derive(Default)]
pub struct ConsoleSurface {
    /// Registered document scripts by id.
    documents: Mutex<BTreeMap<String, String>>,
    /// Next document script id.
    next: AtomicU64,
}

impl ConsoleSurface {
    /// Number of registered document scripts.
    pub fn document_scripts(&self) -> usize {
        self.documents.lock().len()
    }
}

impl ContentSurface for ConsoleSurface {
    fn post_script(&self, script: &str) {
        info!(target: SURFACE_TARGET, len = script.len(), "post_script");
    }

    fn execute_script(&self, script: &str, done: ScriptCompletion) {
        info!(target: SURFACE_TARGET, len = script.len(), "execute_script");
        let result: StdResult<String, String> = Ok("null".to_string());
        done(result);
    }

    fn add_document_script(&self, script: &str) -> Option<String> {
        let id = format!("console-{}", self.next.fetch_add(1, Ordering::Relaxed) + 1);
        info!(target: SURFACE_TARGET, id = %id, len = script.len(), "add_document_script");
        self.documents.lock().insert(id.clone(), script.to_string());
        Some(id)
    }

    fn remove_document_script(&self, id: &str) {
        if self.documents.lock().remove(id).is_some() {
            info!(target: SURFACE_TARGET, id, "remove_document_script");
        }
    }
}
