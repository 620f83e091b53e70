//! In-process host doubles for tests and headless embedding.

use std::{
    mem,
    result::Result as StdResult,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;

use crate::{
    host::{
        Bounds, ContentSurface, HostServices, HostSlots, HostWindow, ScriptCompletion, UiJob,
        UiThread, WindowState,
    },
    ui::InlineUi,
};

/// A window that only stores its properties.
#[derive(Debug, Default)]
pub struct FakeWindow {
    /// Current properties.
    state: Mutex<WindowState>,
}

impl HostWindow for FakeWindow {
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
        self.state.lock().opacity = opacity;
    }

    fn set_click_through(&self, enabled: bool) {
        self.state.lock().click_through = enabled;
    }

    fn set_topmost(&self, enabled: bool) {
        self.state.lock().topmost = enabled;
    }

    fn set_bounds(&self, bounds: Bounds) {
        self.state.lock().bounds = bounds;
    }
}

/// One call made on a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    /// `post_script`.
    Post(String),
    /// `execute_script`.
    Execute(String),
    /// `add_document_script`, with the id handed out.
    AddDocument(String, String),
    /// `remove_document_script`.
    RemoveDocument(String),
}

/// A content surface that records every call and answers `execute_script`
/// with a canned result.
#[derive(Debug)]
pub struct RecordingSurface {
    /// Calls in order.
    calls: Mutex<Vec<SurfaceCall>>,
    /// Live document scripts as (id, script).
    documents: Mutex<Vec<(String, String)>>,
    /// Next document script id.
    next_id: AtomicU64,
    /// Result handed to `execute_script` completions.
    response: Mutex<StdResult<String, String>>,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            documents: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            response: Mutex::new(Ok("null".to_string())),
        }
    }
}

impl RecordingSurface {
    /// Every call so far.
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().clone()
    }

    /// Scripts passed to `post_script`.
    pub fn posted(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::Post(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    /// Document scripts still registered, oldest first.
    pub fn document_scripts(&self) -> Vec<String> {
        self.documents.lock().iter().map(|(_, s)| s.clone()).collect()
    }

    /// Answer future `execute_script` calls with `response`.
    pub fn respond_with(&self, response: StdResult<String, String>) {
        *self.response.lock() = response;
    }
}

impl ContentSurface for RecordingSurface {
    fn post_script(&self, script: &str) {
        self.calls.lock().push(SurfaceCall::Post(script.to_string()));
    }

    fn execute_script(&self, script: &str, done: ScriptCompletion) {
        self.calls.lock().push(SurfaceCall::Execute(script.to_string()));
        let response = self.response.lock().clone();
        done(response);
    }

    fn add_document_script(&self, script: &str) -> Option<String> {
        let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.calls
            .lock()
            .push(SurfaceCall::AddDocument(id.clone(), script.to_string()));
        self.documents.lock().push((id.clone(), script.to_string()));
        Some(id)
    }

    fn remove_document_script(&self, id: &str) {
        self.calls.lock().push(SurfaceCall::RemoveDocument(id.to_string()));
        self.documents.lock().retain(|(doc, _)| doc != id);
    }
}

/// Host services running every UI job inline, with a [`FakeWindow`] and a
/// [`RecordingSurface`] attached.
pub struct InlineHost {
    /// Slots handed to plugins.
    pub slots: Arc<HostSlots>,
    /// The attached window.
    pub window: Arc<FakeWindow>,
    /// The attached surface.
    pub surface: Arc<RecordingSurface>,
}

impl Default for InlineHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InlineHost {
    /// Slots with a fresh window and surface attached, run inline.
    pub fn new() -> Self {
        Self::with_ui(Arc::new(InlineUi))
    }

    /// Slots with a fresh window and surface attached, served by `ui`.
    pub fn with_ui(ui: Arc<dyn UiThread>) -> Self {
        let slots = Arc::new(HostSlots::new(ui));
        let window = Arc::new(FakeWindow::default());
        let surface = Arc::new(RecordingSurface::default());
        slots.set_window(Some(window.clone()));
        slots.set_content(Some(surface.clone()));
        Self {
            slots,
            window,
            surface,
        }
    }

    /// The slots as [`HostServices`].
    pub fn services(&self) -> Arc<dyn HostServices> {
        self.slots.clone()
    }
}

/// A UI thread that holds jobs until [`QueuedUi::run_pending`] is called.
#[derive(Default)]
pub struct QueuedUi {
    /// Jobs in posting order.
    jobs: Mutex<Vec<UiJob>>,
}

impl QueuedUi {
    /// Number of queued jobs.
    pub fn pending(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Run every queued job, including jobs they queue. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let jobs = mem::take(&mut *self.jobs.lock());
            if jobs.is_empty() {
                return ran;
            }
            for job in jobs {
                job();
                ran += 1;
            }
        }
    }
}

impl UiThread for QueuedUi {
    fn post(&self, job: UiJob) -> bool {
        self.jobs.lock().push(job);
        true
    }
}
