//! A loaded plugin: its sandbox plus the API objects it was granted.
//!
//! Loading builds the granted APIs, runs the script's top level and then its
//! `on_load` hook. Unloading reverses everything in a fixed order: the
//! `on_unload` hook, hotkeys, event listeners, injected page content and
//! finally the sandbox itself.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;
use rhai::{Array, Dynamic, Map};
use tracing::{error, info, warn};

use crate::{
    ActionDispatcher, Error, Result,
    api::{ConfigApi, EventApi, Listeners, LogApi, PluginApis, SubtitleApi, WebViewApi, WindowApi},
    events::EventManager,
    host::HostServices,
    hotkey::{HotkeyRegistry, Owner},
    keyhook::KeyHook,
    manifest::{Capability, PluginManifest},
    script::{ON_LOAD, ON_UNLOAD, Sandbox, SandboxSpec},
    settings::SandboxLimits,
    store::ConfigStore,
    subtitle::SubtitleTracker,
};

/// Host-side objects shared by every plugin.
#[derive(Clone)]
pub struct HostContext {
    /// Action table shared by plugin and host hotkeys.
    pub dispatcher: Arc<ActionDispatcher>,
    /// Event bus.
    pub events: Arc<EventManager>,
    /// Physical key input.
    pub hook: Arc<dyn KeyHook>,
    /// Subtitle state.
    pub subtitles: Arc<SubtitleTracker>,
    /// Window, content surface and UI thread.
    pub host: Arc<dyn HostServices>,
    /// Persistence for the `config` capability.
    pub store: Arc<dyn ConfigStore>,
    /// Sandbox limits.
    pub limits: SandboxLimits,
}

/// A running plugin.
pub struct PluginContext {
    /// Parsed manifest.
    manifest: PluginManifest,
    /// Plugin directory, when loaded from disk.
    dir: Option<PathBuf>,
    /// Script source.
    source: String,
    /// Granted APIs.
    apis: PluginApis,
    /// The sandbox, taken on unload.
    sandbox: Mutex<Option<Arc<Sandbox>>>,
    /// Set once teardown has started.
    unloaded: AtomicBool,
}

impl PluginContext {
    /// Load the plugin in `dir` described by `manifest`.
    pub fn load(manifest: PluginManifest, dir: &Path, host: &HostContext) -> Result<Self> {
        let main = manifest.main_path(dir);
        let source = fs::read_to_string(&main).map_err(|e| Error::Script {
            plugin: manifest.id.clone(),
            path: Some(main.clone()),
            line: None,
            col: None,
            message: format!("cannot read {}: {}", main.display(), e),
            excerpt: None,
        })?;
        Self::start(manifest, Some(dir.to_path_buf()), source, host)
    }

    /// Load a plugin from in-memory source. Imports are unavailable.
    pub fn from_source(manifest: PluginManifest, source: &str, host: &HostContext) -> Result<Self> {
        Self::start(manifest, None, source.to_string(), host)
    }

    /// Build the APIs, run the script and its `on_load` hook.
    fn start(
        manifest: PluginManifest,
        dir: Option<PathBuf>,
        source: String,
        host: &HostContext,
    ) -> Result<Self> {
        let apis = build_apis(&manifest, host);
        let ctx = Self {
            manifest,
            dir,
            source,
            apis,
            sandbox: Mutex::new(None),
            unloaded: AtomicBool::new(false),
        };
        let main = ctx.dir.as_ref().map(|d| ctx.manifest.main_path(d));
        let spec = SandboxSpec {
            plugin: &ctx.manifest.id,
            source: &ctx.source,
            path: main.as_deref(),
            dir: ctx.dir.as_deref(),
            limits: &host.limits,
            info: plugin_info(&ctx.manifest, ctx.dir.as_deref()),
        };
        let sandbox = match Sandbox::start(spec, &ctx.apis) {
            Ok(sandbox) => sandbox,
            Err(e) => {
                ctx.release(false);
                return Err(e);
            }
        };
        *ctx.sandbox.lock() = Some(sandbox.clone());
        let hooked = sandbox.call_hook(ON_LOAD);
        drop(sandbox);
        if let Err(e) = hooked {
            ctx.release(false);
            return Err(e);
        }
        info!(
            plugin = %ctx.manifest.id,
            version = %ctx.manifest.version,
            capabilities = ?ctx.manifest.granted(),
            "plugin_loaded"
        );
        Ok(ctx)
    }

    /// Plugin id.
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    /// Parsed manifest.
    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    /// Plugin directory, when loaded from disk.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Script source the plugin was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Granted APIs.
    pub fn apis(&self) -> &PluginApis {
        &self.apis
    }

    /// Whether the plugin is still running.
    pub fn is_loaded(&self) -> bool {
        !self.unloaded.load(Ordering::SeqCst)
    }

    /// Run `on_unload` and release every registration. Idempotent.
    pub fn unload(&self) {
        if self.release(true) {
            info!(plugin = %self.manifest.id, "plugin_unloaded");
        }
    }

    /// Tear down once. Returns whether this call did the work.
    fn release(&self, run_hook: bool) -> bool {
        if self.unloaded.swap(true, Ordering::SeqCst) {
            return false;
        }
        let sandbox = self.sandbox.lock().take();
        if run_hook
            && let Some(sandbox) = &sandbox
            && let Err(e) = sandbox.call_hook(ON_UNLOAD)
        {
            error!(plugin = %self.manifest.id, error = %e.pretty(), "plugin_on_unload_failed");
        }
        self.apis.cleanup();
        if let Some(sandbox) = sandbox
            && Arc::strong_count(&sandbox) > 1
        {
            warn!(plugin = %self.manifest.id, "sandbox_still_referenced");
        }
        true
    }
}

impl Drop for PluginContext {
    fn drop(&mut self) {
        self.unload();
    }
}

/// Instantiate the APIs `manifest` is granted.
fn build_apis(manifest: &PluginManifest, host: &HostContext) -> PluginApis {
    let id = manifest.id.as_str();
    let listeners = Arc::new(Listeners::new(id, host.events.clone()));
    let grant = |cap| manifest.grants(cap);
    PluginApis {
        log: LogApi::new(id),
        window: grant(Capability::Window)
            .then(|| Arc::new(WindowApi::new(id, host.host.clone(), listeners.clone()))),
        webview: grant(Capability::Webview).then(|| Arc::new(WebViewApi::new(id, host.host.clone()))),
        hotkey: grant(Capability::Hotkey).then(|| {
            Arc::new(HotkeyRegistry::new(
                Owner::Plugin(id.to_string()),
                host.dispatcher.clone(),
                host.hook.clone(),
            ))
        }),
        subtitle: grant(Capability::Subtitle)
            .then(|| Arc::new(SubtitleApi::new(host.subtitles.clone(), listeners.clone()))),
        events: grant(Capability::Events).then(|| Arc::new(EventApi::new(id, listeners.clone()))),
        config: grant(Capability::Config).then(|| Arc::new(ConfigApi::new(id, host.store.clone()))),
        listeners,
    }
}

/// The `plugin` global: manifest fields plus the directory.
fn plugin_info(manifest: &PluginManifest, dir: Option<&Path>) -> Map {
    let mut info = Map::new();
    info.insert("id".into(), manifest.id.clone().into());
    info.insert("name".into(), manifest.name.clone().into());
    info.insert("version".into(), manifest.version.clone().into());
    info.insert(
        "author".into(),
        manifest.author.clone().map_or(Dynamic::UNIT, Dynamic::from),
    );
    info.insert(
        "dir".into(),
        dir.map_or(Dynamic::UNIT, |d| Dynamic::from(d.display().to_string())),
    );
    let caps: Array = manifest
        .granted()
        .into_iter()
        .map(|c| Dynamic::from(c.name().to_string()))
        .collect();
    info.insert("capabilities".into(), caps.into());
    info
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use super::*;
    use crate::{
        callback::FnCallback, host::HostWindow, keyhook::SoftwareKeyHook, store::MemoryStore,
        test_support::InlineHost,
    };

    struct Fixture {
        host: InlineHost,
        keys: Arc<SoftwareKeyHook>,
        shared: HostContext,
    }

    fn fixture() -> Fixture {
        let host = InlineHost::new();
        let dispatcher = Arc::new(ActionDispatcher::new());
        let keys = Arc::new(SoftwareKeyHook::new(dispatcher.clone()));
        let events = Arc::new(EventManager::new());
        let shared = HostContext {
            dispatcher,
            events: events.clone(),
            hook: keys.clone(),
            subtitles: Arc::new(SubtitleTracker::new(events)),
            host: host.services(),
            store: Arc::new(MemoryStore::new()),
            limits: SandboxLimits::default(),
        };
        Fixture { host, keys, shared }
    }

    fn manifest(id: &str, caps: Option<&[Capability]>) -> PluginManifest {
        PluginManifest {
            id: id.to_string(),
            name: id.to_string(),
            version: "1.0.0".to_string(),
            author: None,
            description: None,
            main: "main.rhai".to_string(),
            capabilities: caps.map(|c| c.iter().copied().collect::<BTreeSet<_>>()),
        }
    }

    #[test]
    fn unload_reverses_every_registration() {
        let f = fixture();
        let ctx = PluginContext::from_source(
            manifest("demo", None),
            r#"
            hotkey.register("Ctrl+K", || window.set_opacity(0.25));
            events.on("custom", |p| log.info(p));
            window.on_state_changed(|s| log.info(s.opacity));
            webview.inject_css("body{}", #{ timing: "onload" });
            "#,
            &f.shared,
        )
        .expect("load");

        assert_eq!(f.keys.press("ctrl+k"), 1);
        assert_eq!(f.host.window.state().opacity, 0.25);
        assert_eq!(f.shared.dispatcher.len(), 1);
        assert_eq!(f.shared.events.total_listeners(), 2);
        assert_eq!(f.host.surface.document_scripts().len(), 1);

        ctx.unload();
        assert!(!ctx.is_loaded());
        assert!(f.shared.dispatcher.is_empty());
        assert_eq!(f.shared.events.total_listeners(), 0);
        assert!(f.host.surface.document_scripts().is_empty());
        assert_eq!(f.keys.press("Ctrl+K"), 0);
        ctx.unload();
    }

    #[test]
    fn hooks_run_at_load_and_unload() {
        let f = fixture();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        f.shared.events.on(
            "demo.lifecycle",
            Some(FnCallback::new("host", move |p| {
                s.lock().push(p.cloned().unwrap_or_default());
                Ok(())
            })),
        );
        let ctx = PluginContext::from_source(
            manifest("demo", None),
            r#"
            fn on_load() { events.emit("demo.lifecycle", "load"); }
            fn on_unload() { events.emit("demo.lifecycle", "unload"); }
            "#,
            &f.shared,
        )
        .expect("load");
        drop(ctx);
        assert_eq!(*seen.lock(), vec![json!("load"), json!("unload")]);
    }

    #[test]
    fn failed_load_releases_partial_registrations() {
        let f = fixture();
        let err = PluginContext::from_source(
            manifest("demo", None),
            r#"
            hotkey.register("F5", || 1);
            events.on("x", || 1);
            throw "broken";
            "#,
            &f.shared,
        )
        .map(|_| ())
        .expect_err("load fails");
        assert!(matches!(err, Error::Script { .. }));
        assert!(f.shared.dispatcher.is_empty());
        assert_eq!(f.shared.events.total_listeners(), 0);
        assert_eq!(f.keys.press("F5"), 0);
    }

    #[test]
    fn failing_on_load_also_cleans_up() {
        let f = fixture();
        let res = PluginContext::from_source(
            manifest("demo", None),
            r#"
            hotkey.register("F6", || 1);
            fn on_load() { throw "nope"; }
            "#,
            &f.shared,
        );
        assert!(res.is_err());
        assert!(f.shared.dispatcher.is_empty());
    }

    #[test]
    fn capabilities_limit_globals() {
        let f = fixture();
        let caps = [Capability::Events];
        let ok = PluginContext::from_source(
            manifest("limited", Some(&caps)),
            r#"events.emit("limited.x"); log.info(plugin.capabilities);"#,
            &f.shared,
        );
        assert!(ok.is_ok());
        let denied = PluginContext::from_source(
            manifest("limited2", Some(&caps)),
            "window.set_opacity(0.5);",
            &f.shared,
        );
        assert!(denied.is_err());
        assert_eq!(f.host.window.state().opacity, 1.0);
    }

    #[test]
    fn late_callbacks_after_unload_are_contained() {
        let f = fixture();
        let ctx = PluginContext::from_source(
            manifest("demo", None),
            r#"events.on("tick", || log.info("tick"));"#,
            &f.shared,
        )
        .expect("load");
        let sandbox = ctx.sandbox.lock().clone().expect("sandbox");
        let weak = Arc::downgrade(&sandbox);
        drop(sandbox);
        ctx.unload();
        assert!(weak.upgrade().is_none());
        assert_eq!(f.shared.events.emit("tick", &json!(null)), 0);
    }
}
