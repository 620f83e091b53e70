use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use plugin_runtime::{
    PluginManager,
    callback::FnCallback,
    host::HostWindow,
    settings::SandboxLimits,
    store::JsonFileStore,
    subtitle::SubtitleData,
    test_support::{InlineHost, QueuedUi},
};
use serde_json::{Value, json};
use tempfile::TempDir;

/// The demo plugins shipped with the repository.
fn demos_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/plugins")
}

/// A manager with every demo loaded and config persisted under `data`.
fn load_demos(host: &InlineHost, data: &Path) -> PluginManager {
    let mut manager = PluginManager::new(
        host.services(),
        Arc::new(JsonFileStore::new(data)),
        SandboxLimits::default(),
    );
    let failures = manager.load_all(&demos_dir());
    assert!(failures.is_empty(), "demo load failures: {:?}", failures);
    manager
}

/// Collect payloads of `event`.
fn record(manager: &PluginManager, event: &str) -> Arc<Mutex<Vec<Value>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    manager.events().on(
        event,
        Some(FnCallback::new("test", move |p| {
            s.lock().push(p.cloned().unwrap_or_default());
            Ok(())
        })),
    );
    seen
}

#[test]
fn all_demos_load_in_directory_order() {
    let data = TempDir::new().expect("tempdir");
    let host = InlineHost::new();
    let manager = load_demos(&host, data.path());
    assert_eq!(manager.plugin_ids(), ["greeter", "opacity-keys", "subtitle-overlay"]);
    assert_eq!(manager.dispatcher().len(), 3);
    assert_eq!(
        manager.dispatcher().names_with_prefix("Plugin:opacity-keys:").len(),
        3
    );
}

#[test]
fn opacity_keys_fade_and_persist() {
    let data = TempDir::new().expect("tempdir");
    let host = InlineHost::new();
    let mut manager = load_demos(&host, data.path());

    assert_eq!(manager.keys().press("Ctrl+Down"), 1);
    assert_eq!(manager.keys().press("Ctrl+Down"), 1);
    assert!((host.window.opacity() - 0.8).abs() < 1e-9);

    assert_eq!(manager.keys().press("Ctrl+Shift+T"), 1);
    assert!(!host.window.topmost());

    host.window.set_opacity(1.0);
    manager.reload("opacity-keys").expect("reload");
    assert!((host.window.opacity() - 0.8).abs() < 1e-9);
    assert!(data.path().join("opacity-keys.json").is_file());
}

#[test]
fn opacity_keys_store_the_requested_level_before_the_ui_applies_it() {
    let data = TempDir::new().expect("tempdir");
    let ui = Arc::new(QueuedUi::default());
    let host = InlineHost::with_ui(ui.clone());
    let manager = load_demos(&host, data.path());
    ui.run_pending();

    assert_eq!(manager.keys().press("Ctrl+Down"), 1);
    assert_eq!(ui.pending(), 1);
    assert_eq!(host.window.opacity(), 1.0);
    let config = manager
        .get("opacity-keys")
        .and_then(|p| p.apis().config.clone())
        .expect("config");
    let saved = config.get("opacity").and_then(|v| v.as_f64()).expect("saved");
    assert!((saved - 0.9).abs() < 1e-9, "saved {}", saved);

    ui.run_pending();
    assert!((host.window.opacity() - 0.9).abs() < 1e-9);

    assert_eq!(manager.keys().press("Ctrl+Up"), 1);
    assert_eq!(manager.keys().press("Ctrl+Up"), 1);
    ui.run_pending();
    let saved = config.get("opacity").and_then(|v| v.as_f64()).expect("saved");
    assert_eq!(saved, 1.0);
    assert_eq!(host.window.opacity(), 1.0);
}

#[test]
fn greeter_replies_through_imported_module() {
    let data = TempDir::new().expect("tempdir");
    let host = InlineHost::new();
    let manager = load_demos(&host, data.path());
    let replies = record(&manager, "greeter.reply");

    manager.events().emit("greeter.hello", &json!("Ada"));
    manager.events().emit("greeter.hello", &json!("Ada"));
    assert_eq!(
        *replies.lock(),
        vec![json!("Hello, Ada!"), json!("Hello again, Ada (#2)")]
    );
}

#[test]
fn subtitle_overlay_renders_escaped_lines() {
    let data = TempDir::new().expect("tempdir");
    let host = InlineHost::new();
    let manager = load_demos(&host, data.path());
    assert_eq!(host.surface.document_scripts().len(), 2);

    let track = SubtitleData::from_json(
        r#"{"body":[{"from":0.0,"to":2.0,"content":"It's here"},{"from":5.0,"to":6.0,"content":"later"}],"lang":"en"}"#,
    )
    .expect("track");
    manager.subtitles().load(track);
    assert!(manager.subtitles().update_time(1.0));
    assert!(!manager.subtitles().update_time(1.5));

    let posted = host.surface.posted();
    let last = posted.last().expect("render posted");
    assert!(last.contains(r"textContent='It\\'s here'"), "{}", last);

    assert!(manager.subtitles().update_time(3.0));
    let posted = host.surface.posted();
    assert!(posted.last().is_some_and(|s| s.contains("textContent=''")));
}

#[test]
fn unloading_demos_removes_everything() {
    let data = TempDir::new().expect("tempdir");
    let host = InlineHost::new();
    let mut manager = load_demos(&host, data.path());
    manager.unload_all();
    assert!(manager.dispatcher().is_empty());
    assert_eq!(manager.events().total_listeners(), 0);
    assert!(host.surface.document_scripts().is_empty());
    assert!(host
        .surface
        .posted()
        .iter()
        .any(|s| s.contains(r#"style[data-floatview-plugin="subtitle-overlay"]"#)));
    assert_eq!(manager.keys().press("Ctrl+Up"), 0);
}
