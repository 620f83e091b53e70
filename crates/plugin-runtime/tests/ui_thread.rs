use std::{sync::Arc, time::Duration};

use crossbeam_channel::bounded;
use parking_lot::Mutex;
use plugin_runtime::{
    PluginManager, PluginManifest,
    api::WebViewApi,
    callback::FnCallback,
    host::{HostSlots, HostWindow, UiThread},
    settings::SandboxLimits,
    store::MemoryStore,
    test_support::{FakeWindow, RecordingSurface},
    ui::ChannelUiThread,
    value::ScriptValue,
};
use serde_json::{Value, json};

/// Host slots served by a real UI thread.
struct Threaded {
    /// UI worker.
    ui: Arc<ChannelUiThread>,
    /// Slots handed to plugins.
    slots: Arc<HostSlots>,
    /// Attached window.
    window: Arc<FakeWindow>,
    /// Attached surface.
    surface: Arc<RecordingSurface>,
}

/// Spawn a UI thread and attach a fake window and surface.
fn threaded() -> Threaded {
    let ui = Arc::new(ChannelUiThread::spawn("floatview-ui-test").expect("spawn ui"));
    let slots = Arc::new(HostSlots::new(ui.clone()));
    let window = Arc::new(FakeWindow::default());
    let surface = Arc::new(RecordingSurface::default());
    slots.set_window(Some(window.clone()));
    slots.set_content(Some(surface.clone()));
    Threaded {
        ui,
        slots,
        window,
        surface,
    }
}

#[test]
fn script_calls_are_marshalled_in_order() {
    let t = threaded();
    let mut m = PluginManager::new(
        t.slots.clone(),
        Arc::new(MemoryStore::new()),
        SandboxLimits::default(),
    );
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    m.events().on(
        "r",
        Some(FnCallback::new("test", move |p| {
            s.lock().push(p.cloned().unwrap_or_default());
            Ok(())
        })),
    );
    t.surface.respond_with(Ok("[1,\"two\"]".to_string()));
    let manifest = PluginManifest::from_json(r#"{"id":"ui","name":"ui","version":"1"}"#, None)
        .expect("manifest");
    m.load_source(
        manifest,
        r#"
        window.set_opacity(0.5);
        let r = webview.execute_script("[1, 'two']");
        events.emit("r", r);
        "#,
    )
    .expect("load");

    // The opacity job was queued before the script and the script was awaited.
    assert_eq!(t.window.opacity(), 0.5);
    assert_eq!(*seen.lock(), vec![json!([1, "two"])]);
    assert!(t.surface.calls().len() >= 1);
}

#[test]
fn execute_script_on_the_ui_thread_does_not_deadlock() {
    let t = threaded();
    let api = Arc::new(WebViewApi::new("ui", t.slots.clone()));
    t.surface.respond_with(Ok("7".to_string()));
    let (tx, rx) = bounded(1);
    let job_api = api.clone();
    assert!(t.ui.post(Box::new(move || {
        let _ignored = tx.send(job_api.execute_script_blocking("3+4"));
    })));
    let result = rx.recv_timeout(Duration::from_secs(5)).expect("no deadlock");
    assert_eq!(result.expect("value"), ScriptValue::Int(7));
}

#[test]
fn shutdown_stops_accepting_jobs() {
    let t = threaded();
    let (tx, rx) = bounded::<Value>(1);
    assert!(t.ui.post(Box::new(move || {
        let _ignored = tx.send(Value::Bool(true));
    })));
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).expect("ran"), Value::Bool(true));
    t.ui.shutdown();
    assert!(!t.ui.post(Box::new(|| {})));
    assert!(!t.ui.is_current());
}
