//! Narrow contracts with the host application's UI, window and web surface.
//!
//! The runtime never renders anything itself. Everything it needs from the
//! shell is expressed here as small traits so the headless binary and the test
//! suite can provide their own implementations.

use std::{fmt, result::Result as StdResult, sync::Arc};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A unit of work to run on the UI thread.
pub type UiJob = Box<dyn FnOnce() + Send + 'static>;

/// Completion handed to [`ContentSurface::execute_script`]. Receives the
/// engine's raw JSON result text, or an error message.
pub type ScriptCompletion = Box<dyn FnOnce(StdResult<String, String>) + Send + 'static>;

/// Access to the thread that owns window and content state.
pub trait UiThread: Send + Sync {
    /// Queue `job`. Returns false if the UI thread is gone.
    fn post(&self, job: UiJob) -> bool;

    /// Whether the caller is running on the UI thread.
    fn is_current(&self) -> bool {
        false
    }
}

/// Screen rectangle of the floating window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Snapshot of the window properties exposed to plugins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowState {
    /// Opacity in `0.0..=1.0`.
    pub opacity: f64,
    /// Whether mouse input passes through the window.
    pub click_through: bool,
    /// Whether the window stays above others.
    pub topmost: bool,
    /// Window rectangle.
    pub bounds: Bounds,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            click_through: false,
            topmost: true,
            bounds: Bounds::default(),
        }
    }
}

/// The floating window. Setters are only called from the UI thread.
pub trait HostWindow: Send + Sync {
    /// Current opacity.
    fn opacity(&self) -> f64;
    /// Current click-through flag.
    fn click_through(&self) -> bool;
    /// Current topmost flag.
    fn topmost(&self) -> bool;
    /// Current bounds.
    fn bounds(&self) -> Bounds;
    /// Apply opacity.
    fn set_opacity(&self, opacity: f64);
    /// Apply click-through.
    fn set_click_through(&self, enabled: bool);
    /// Apply topmost.
    fn set_topmost(&self, enabled: bool);
    /// Apply bounds.
    fn set_bounds(&self, bounds: Bounds);

    /// Snapshot of every property.
    fn state(&self) -> WindowState {
        WindowState {
            opacity: self.opacity(),
            click_through: self.click_through(),
            topmost: self.topmost(),
            bounds: self.bounds(),
        }
    }
}

/// The embedded web content surface. Methods are only called from the UI thread.
pub trait ContentSurface: Send + Sync {
    /// Run `script` in the current document without waiting for a result.
    fn post_script(&self, script: &str);

    /// Run `script` and report its JSON-encoded result through `done`.
    fn execute_script(&self, script: &str, done: ScriptCompletion);

    /// Register `script` to run whenever a new document is created. Returns an
    /// id for later removal, or `None` when the surface refused it.
    fn add_document_script(&self, script: &str) -> Option<String>;

    /// Remove a script registered with [`ContentSurface::add_document_script`].
    fn remove_document_script(&self, id: &str);
}

/// Everything a plugin context needs from the host.
pub trait HostServices: Send + Sync {
    /// The UI thread.
    fn ui(&self) -> Arc<dyn UiThread>;
    /// The floating window, if one exists.
    fn window(&self) -> Option<Arc<dyn HostWindow>>;
    /// The content surface, if one is ready.
    fn content(&self) -> Option<Arc<dyn ContentSurface>>;
}

/// A [`HostServices`] implementation whose window and surface can be attached
/// and detached at runtime.
pub struct HostSlots {
    /// UI thread.
    ui: Arc<dyn UiThread>,
    /// Window slot.
    window: RwLock<Option<Arc<dyn HostWindow>>>,
    /// Surface slot.
    content: RwLock<Option<Arc<dyn ContentSurface>>>,
}

impl HostSlots {
    /// Create slots bound to `ui` with no window or surface attached.
    pub fn new(ui: Arc<dyn UiThread>) -> Self {
        Self {
            ui,
            window: RwLock::new(None),
            content: RwLock::new(None),
        }
    }

    /// Attach or detach the window.
    pub fn set_window(&self, window: Option<Arc<dyn HostWindow>>) {
        *self.window.write() = window;
    }

    /// Attach or detach the content surface.
    pub fn set_content(&self, content: Option<Arc<dyn ContentSurface>>) {
        *self.content.write() = content;
    }
}

impl HostServices for HostSlots {
    fn ui(&self) -> Arc<dyn UiThread> {
        self.ui.clone()
    }

    fn window(&self) -> Option<Arc<dyn HostWindow>> {
        self.window.read().clone()
    }

    fn content(&self) -> Option<Arc<dyn ContentSurface>> {
        self.content.read().clone()
    }
}
