//! The host API as seen from Rhai.
//!
//! Each granted capability becomes a global handle (`window`, `webview`,
//! `hotkey`, `subtitle`, `events`, `config`) next to the always-present `log`
//! and `plugin`. Handles are thin wrappers over the API objects; callbacks
//! passed from scripts are turned into host callbacks through [`Callbacks`].

use std::sync::Arc;

use rhai::{
    Array, Dynamic, Engine, EvalAltResult, FLOAT, INT, Map, Module, NativeCallContext,
    serde::from_dynamic,
};
use serde_json::Value;
use tracing::warn;

use super::{
    callback::Callbacks,
    convert::{dynamic_of, json_of, optional},
    engine::boxed_runtime_error,
};
use crate::{
    api::{
        ConfigApi, EventApi, InjectOptions, InjectTiming, LogApi, PluginApis, SubtitleApi,
        WebViewApi, WindowApi,
    },
    host::Bounds,
    hotkey::{HotkeyRegistry, INVALID_ID},
};

/// Result type of fallible bindings.
type RhaiResult<T> = Result<T, Box<EvalAltResult>>;

/// `window` global.
#[derive(Clone)]
struct WindowHandle {
    /// Capability.
    api: Arc<WindowApi>,
    /// Callback factory.
    callbacks: Callbacks,
}

/// `webview` global.
#[derive(Clone)]
struct WebViewHandle {
    /// Capability.
    api: Arc<WebViewApi>,
}

/// `hotkey` global.
#[derive(Clone)]
struct HotkeyHandle {
    /// Capability.
    api: Arc<HotkeyRegistry>,
    /// Callback factory.
    callbacks: Callbacks,
}

/// `subtitle` global.
#[derive(Clone)]
struct SubtitleHandle {
    /// Capability.
    api: Arc<SubtitleApi>,
    /// Callback factory.
    callbacks: Callbacks,
}

/// `events` global.
#[derive(Clone)]
struct EventsHandle {
    /// Capability.
    api: Arc<EventApi>,
    /// Callback factory.
    callbacks: Callbacks,
}

/// `config` global.
#[derive(Clone)]
struct ConfigHandle {
    /// Capability.
    api: Arc<ConfigApi>,
}

/// `log` global.
#[derive(Clone)]
struct LogHandle {
    /// Capability.
    api: LogApi,
}

/// Register handle types and install the globals for `apis`. `info` becomes
/// the `plugin` map.
pub fn register(engine: &mut Engine, apis: &PluginApis, callbacks: &Callbacks, info: Map) {
    register_window(engine);
    register_webview(engine);
    register_hotkey(engine);
    register_subtitle(engine);
    register_events(engine);
    register_config(engine);
    register_log(engine);

    let mut globals = Module::new();
    globals.set_var("plugin", info);
    globals.set_var("log", LogHandle { api: apis.log.clone() });
    if let Some(api) = &apis.window {
        globals.set_var(
            "window",
            WindowHandle {
                api: api.clone(),
                callbacks: callbacks.clone(),
            },
        );
    }
    if let Some(api) = &apis.webview {
        globals.set_var("webview", WebViewHandle { api: api.clone() });
    }
    if let Some(api) = &apis.hotkey {
        globals.set_var(
            "hotkey",
            HotkeyHandle {
                api: api.clone(),
                callbacks: callbacks.clone(),
            },
        );
    }
    if let Some(api) = &apis.subtitle {
        globals.set_var(
            "subtitle",
            SubtitleHandle {
                api: api.clone(),
                callbacks: callbacks.clone(),
            },
        );
    }
    if let Some(api) = &apis.events {
        globals.set_var(
            "events",
            EventsHandle {
                api: api.clone(),
                callbacks: callbacks.clone(),
            },
        );
    }
    if let Some(api) = &apis.config {
        globals.set_var("config", ConfigHandle { api: api.clone() });
    }
    engine.register_global_module(globals.into());
}

/// Narrow a script integer to `i32`.
fn to_i32(ctx: &NativeCallContext, what: &str, v: INT) -> RhaiResult<i32> {
    i32::try_from(v).map_err(|_| {
        boxed_runtime_error(format!("{} out of range: {}", what, v), ctx.call_position())
    })
}

/// Decode an options map, falling back to defaults with a warning.
fn inject_options(map: Map) -> InjectOptions {
    match from_dynamic::<InjectOptions>(&Dynamic::from_map(map)) {
        Ok(opts) => opts,
        Err(e) => {
            warn!(error = %e, "inject_options_invalid");
            InjectOptions::default()
        }
    }
}

/// Register `Window` methods.
fn register_window(engine: &mut Engine) {
    engine.register_type_with_name::<WindowHandle>("Window");
    engine.register_get("opacity", |w: &mut WindowHandle| w.api.opacity());
    engine.register_get("click_through", |w: &mut WindowHandle| w.api.click_through());
    engine.register_get("topmost", |w: &mut WindowHandle| w.api.topmost());
    engine.register_get("bounds", |w: &mut WindowHandle| dynamic_of(&w.api.bounds()));
    engine.register_fn("state", |w: &mut WindowHandle| dynamic_of(&w.api.state()));

    engine.register_fn("set_opacity", |w: &mut WindowHandle, v: FLOAT| w.api.set_opacity(v));
    engine.register_fn("set_opacity", |w: &mut WindowHandle, v: INT| {
        w.api.set_opacity(v as FLOAT)
    });
    engine.register_fn("set_click_through", |w: &mut WindowHandle, v: bool| {
        w.api.set_click_through(v)
    });
    engine.register_fn("set_topmost", |w: &mut WindowHandle, v: bool| w.api.set_topmost(v));
    engine.register_fn(
        "set_bounds",
        |ctx: NativeCallContext,
         w: &mut WindowHandle,
         x: INT,
         y: INT,
         width: INT,
         height: INT|
         -> RhaiResult<bool> {
            let bounds = Bounds {
                x: to_i32(&ctx, "x", x)?,
                y: to_i32(&ctx, "y", y)?,
                width: to_i32(&ctx, "width", width)?,
                height: to_i32(&ctx, "height", height)?,
            };
            Ok(w.api.set_bounds(bounds))
        },
    );
    engine.register_fn(
        "set_bounds",
        |ctx: NativeCallContext, w: &mut WindowHandle, map: Map| -> RhaiResult<bool> {
            let bounds = from_dynamic::<Bounds>(&Dynamic::from_map(map)).map_err(|e| {
                boxed_runtime_error(format!("invalid bounds: {}", e), ctx.call_position())
            })?;
            Ok(w.api.set_bounds(bounds))
        },
    );

    engine.register_fn("on_state_changed", |w: &mut WindowHandle, f: Dynamic| {
        w.api.on_state_changed(w.callbacks.wrap(f))
    });
    engine.register_fn("off", |w: &mut WindowHandle, id: INT| w.api.off(id));
}

/// Register `WebView` methods.
fn register_webview(engine: &mut Engine) {
    engine.register_type_with_name::<WebViewHandle>("WebView");
    engine.register_fn("inject_css", |w: &mut WebViewHandle, css: &str| {
        w.api.inject_css(css, InjectOptions::default())
    });
    engine.register_fn("inject_css", |w: &mut WebViewHandle, css: &str, opts: Map| {
        w.api.inject_css(css, inject_options(opts))
    });
    engine.register_fn("inject_css", |w: &mut WebViewHandle, css: &str, timing: &str| {
        w.api
            .inject_css(css, InjectOptions::timing(InjectTiming::parse(timing)))
    });
    engine.register_fn("inject_script", |w: &mut WebViewHandle, script: &str| {
        w.api.inject_script(script, InjectOptions::default())
    });
    engine.register_fn(
        "inject_script",
        |w: &mut WebViewHandle, script: &str, opts: Map| {
            w.api.inject_script(script, inject_options(opts))
        },
    );
    engine.register_fn(
        "inject_script",
        |w: &mut WebViewHandle, script: &str, timing: &str| {
            w.api
                .inject_script(script, InjectOptions::timing(InjectTiming::parse(timing)))
        },
    );
    engine.register_fn(
        "execute_script",
        |ctx: NativeCallContext, w: &mut WebViewHandle, script: &str| -> RhaiResult<Dynamic> {
            w.api
                .execute_script_blocking(script)
                .map(|v| dynamic_of(&v))
                .map_err(|e| boxed_runtime_error(e.to_string(), ctx.call_position()))
        },
    );
}

/// Register `Hotkey` methods.
fn register_hotkey(engine: &mut Engine) {
    engine.register_type_with_name::<HotkeyHandle>("Hotkey");
    engine.register_fn("register", |h: &mut HotkeyHandle, combo: &str, f: Dynamic| {
        match h.callbacks.wrap(f) {
            Some(cb) => h.api.register(combo, Some(cb)),
            None => {
                warn!(owner = %h.api.owner(), combo, "hotkey_callback_not_callable");
                INVALID_ID
            }
        }
    });
    engine.register_fn("unregister", |h: &mut HotkeyHandle, combo: &str| {
        h.api.unregister(combo)
    });
    engine.register_fn("unregister", |h: &mut HotkeyHandle, id: INT| {
        h.api.unregister_by_id(id)
    });
    engine.register_fn("unregister_by_id", |h: &mut HotkeyHandle, id: INT| {
        h.api.unregister_by_id(id)
    });
    engine.register_fn("is_available", |h: &mut HotkeyHandle, combo: &str| {
        h.api.is_available(combo)
    });
    engine.register_fn("registered", |h: &mut HotkeyHandle| -> Array {
        h.api
            .registrations()
            .into_iter()
            .map(|r| Dynamic::from(r.combo.to_string()))
            .collect()
    });
}

/// Register `Subtitle` methods.
fn register_subtitle(engine: &mut Engine) {
    engine.register_type_with_name::<SubtitleHandle>("Subtitle");
    engine.register_fn("has_subtitles", |s: &mut SubtitleHandle| s.api.has_subtitles());
    engine.register_fn("all", |s: &mut SubtitleHandle| -> Array {
        s.api.all().iter().map(dynamic_of).collect()
    });
    engine.register_fn("at", |s: &mut SubtitleHandle, t: FLOAT| optional(s.api.at(t)));
    engine.register_fn("at", |s: &mut SubtitleHandle, t: INT| {
        optional(s.api.at(t as FLOAT))
    });
    engine.register_fn("current", |s: &mut SubtitleHandle| optional(s.api.current()));
    engine.register_fn("on_loaded", |s: &mut SubtitleHandle, f: Dynamic| {
        s.api.on_loaded(s.callbacks.wrap(f))
    });
    engine.register_fn("on_changed", |s: &mut SubtitleHandle, f: Dynamic| {
        s.api.on_changed(s.callbacks.wrap(f))
    });
    engine.register_fn("on_cleared", |s: &mut SubtitleHandle, f: Dynamic| {
        s.api.on_cleared(s.callbacks.wrap(f))
    });
    engine.register_fn("off", |s: &mut SubtitleHandle, id: INT| s.api.off(id));
}

/// Register `Events` methods.
fn register_events(engine: &mut Engine) {
    engine.register_type_with_name::<EventsHandle>("Events");
    engine.register_fn("on", |e: &mut EventsHandle, name: &str, f: Dynamic| {
        e.api.on(name, e.callbacks.wrap(f))
    });
    engine.register_fn("off", |e: &mut EventsHandle, id: INT| e.api.off(id));
    engine.register_fn("off_all", |e: &mut EventsHandle, name: &str| {
        e.api.off_all(name) as INT
    });
    engine.register_fn("emit", |e: &mut EventsHandle, name: &str| {
        e.api.emit(name, &Value::Null).map_or(-1, |n| n as INT)
    });
    engine.register_fn("emit", |e: &mut EventsHandle, name: &str, payload: Dynamic| {
        e.api.emit(name, &json_of(&payload)).map_or(-1, |n| n as INT)
    });
}

/// Register `Config` methods.
fn register_config(engine: &mut Engine) {
    engine.register_type_with_name::<ConfigHandle>("Config");
    engine.register_fn("get", |c: &mut ConfigHandle, key: &str| optional(c.api.get(key)));
    engine.register_fn("get", |c: &mut ConfigHandle, key: &str, default: Dynamic| {
        match c.api.get(key) {
            Some(v) => dynamic_of(&v),
            None => default,
        }
    });
    engine.register_fn("set", |c: &mut ConfigHandle, key: &str, value: Dynamic| {
        c.api.set(key, json_of(&value))
    });
    engine.register_fn("remove", |c: &mut ConfigHandle, key: &str| c.api.remove(key));
    engine.register_fn("keys", |c: &mut ConfigHandle| -> Array {
        c.api.keys().into_iter().map(Dynamic::from).collect()
    });
}

/// Register `Log` methods. `debug` is a Rhai keyword, so the debug level is
/// reached through `log.verbose`.
fn register_log(engine: &mut Engine) {
    engine.register_type_with_name::<LogHandle>("Log");
    engine.register_fn("verbose", |l: &mut LogHandle, msg: Dynamic| {
        l.api.debug(&msg.to_string());
    });
    engine.register_fn("info", |l: &mut LogHandle, msg: Dynamic| {
        l.api.info(&msg.to_string());
    });
    engine.register_fn("warn", |l: &mut LogHandle, msg: Dynamic| {
        l.api.warn(&msg.to_string());
    });
    engine.register_fn("error", |l: &mut LogHandle, msg: Dynamic| {
        l.api.error(&msg.to_string());
    });
}
