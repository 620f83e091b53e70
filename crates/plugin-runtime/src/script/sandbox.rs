//! One plugin's script engine, compiled script and top-level scope.

use std::{
    path::{Path, PathBuf},
    result::Result as StdResult,
    sync::Arc,
};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rhai::{AST, CallFnOptions, Dynamic, Engine, EvalAltResult, FnPtr, Map, Scope};
use serde_json::Value;
use tracing::{debug, info};

use super::{
    bindings,
    callback::Callbacks,
    convert::dynamic_of,
    engine::{compile, configure_engine, error_from_rhai, pos_to_line_col},
};
use crate::{Result, api::PluginApis, settings::SandboxLimits};

/// Hook run after the top-level script completes.
pub const ON_LOAD: &str = "on_load";
/// Hook run before the plugin's registrations are released.
pub const ON_UNLOAD: &str = "on_unload";

/// Everything needed to start a sandbox.
pub struct SandboxSpec<'a> {
    /// Plugin id.
    pub plugin: &'a str,
    /// Script source.
    pub source: &'a str,
    /// Script file, for error messages.
    pub path: Option<&'a Path>,
    /// Plugin directory; imports resolve inside it.
    pub dir: Option<&'a Path>,
    /// Execution limits.
    pub limits: &'a SandboxLimits,
    /// Exposed as the `plugin` global.
    pub info: Map,
}

/// An isolated Rhai engine running one plugin.
///
/// Each plugin gets its own engine, so globals, limits and imported modules
/// never leak between plugins.
pub struct Sandbox {
    /// Plugin id.
    plugin: String,
    /// Engine with the plugin's bindings installed.
    engine: Engine,
    /// Compiled script, including its functions and closures.
    ast: AST,
    /// Top-level variables, kept for the hooks.
    scope: Mutex<Scope<'static>>,
    /// Source for error excerpts.
    source: String,
    /// Script file.
    path: Option<PathBuf>,
}

impl Sandbox {
    /// Compile and run `spec`'s script with `apis` bound as globals.
    ///
    /// Compile errors and errors raised by top-level code are returned as
    /// [`crate::Error::Script`]. Hooks are not run here.
    pub fn start(spec: SandboxSpec<'_>, apis: &PluginApis) -> Result<Arc<Self>> {
        let slot = Arc::new(OnceCell::new());
        let mut engine = Engine::new();
        configure_engine(&mut engine, spec.plugin, spec.dir, spec.limits);
        bindings::register(
            &mut engine,
            apis,
            &Callbacks::new(spec.plugin, slot.clone()),
            spec.info,
        );
        let ast = compile(&engine, spec.plugin, spec.source, spec.path)?;

        let sandbox = Arc::new(Self {
            plugin: spec.plugin.to_string(),
            engine,
            ast,
            scope: Mutex::new(Scope::new()),
            source: spec.source.to_string(),
            path: spec.path.map(Path::to_path_buf),
        });
        if slot.set(Arc::downgrade(&sandbox)).is_err() {
            debug!(plugin = %sandbox.plugin, "sandbox_slot_already_set");
        }
        sandbox.run()?;
        Ok(sandbox)
    }

    /// Plugin id.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Run the top-level statements.
    fn run(&self) -> Result<()> {
        let mut scope = self.scope.lock();
        self.engine
            .run_ast_with_scope(&mut scope, &self.ast)
            .map_err(|err| error_from_rhai(&self.plugin, &self.source, &err, self.path.as_deref()))?;
        info!(plugin = %self.plugin, "plugin_script_ran");
        Ok(())
    }

    /// Call the zero-argument hook `name` if the script defines it. Returns
    /// whether it was defined.
    pub fn call_hook(&self, name: &str) -> Result<bool> {
        let mut scope = self.scope.lock();
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        match self
            .engine
            .call_fn_with_options::<Dynamic>(options, &mut scope, &self.ast, name, ())
        {
            Ok(_) => {
                debug!(plugin = %self.plugin, hook = name, "plugin_hook_ran");
                Ok(true)
            }
            Err(err) => match err.as_ref() {
                EvalAltResult::ErrorFunctionNotFound(sig, _) if sig.starts_with(name) => Ok(false),
                _ => Err(error_from_rhai(
                    &self.plugin,
                    &self.source,
                    &err,
                    self.path.as_deref(),
                )),
            },
        }
    }

    /// Call a script function with the payload as its single argument. A
    /// function taking no arguments is called without it.
    pub fn call(&self, func: &FnPtr, payload: Option<&Value>) -> StdResult<Dynamic, String> {
        let Some(payload) = payload else {
            return func
                .call::<Dynamic>(&self.engine, &self.ast, ())
                .map_err(|err| self.format_error(&err));
        };
        match func.call::<Dynamic>(&self.engine, &self.ast, (dynamic_of(payload),)) {
            Ok(v) => Ok(v),
            Err(err) => match err.as_ref() {
                EvalAltResult::ErrorFunctionNotFound(sig, _) if sig.starts_with(func.fn_name()) => func
                    .call::<Dynamic>(&self.engine, &self.ast, ())
                    .map_err(|err| self.format_error(&err)),
                _ => Err(self.format_error(&err)),
            },
        }
    }

    /// Format a runtime error with the script location when known.
    fn format_error(&self, err: &EvalAltResult) -> String {
        match (&self.path, pos_to_line_col(err.position())) {
            (Some(path), Some((line, col))) => {
                format!("{} at {}:{}:{}: {}", self.plugin, path.display(), line, col, err)
            }
            (None, Some((line, col))) => {
                format!("{} at line {}, column {}: {}", self.plugin, line, col, err)
            }
            (_, None) => format!("{}: {}", self.plugin, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        Error,
        api::{EventApi, Listeners, LogApi},
        callback::{FnCallback, ScriptCallback},
        events::EventManager,
    };

    fn apis(bus: &Arc<EventManager>) -> PluginApis {
        let listeners = Arc::new(Listeners::new("t", bus.clone()));
        PluginApis {
            log: LogApi::new("t"),
            events: Some(Arc::new(EventApi::new("t", listeners.clone()))),
            listeners,
            window: None,
            webview: None,
            hotkey: None,
            subtitle: None,
            config: None,
        }
    }

    fn start(source: &str, apis: &PluginApis) -> Result<Arc<Sandbox>> {
        let limits = SandboxLimits::default();
        let mut info = Map::new();
        info.insert("id".into(), "t".into());
        Sandbox::start(
            SandboxSpec {
                plugin: "t",
                source,
                path: None,
                dir: None,
                limits: &limits,
                info,
            },
            apis,
        )
    }

    #[test]
    fn defined_hooks_run_and_absent_hooks_are_skipped() {
        let bus = Arc::new(EventManager::new());
        let apis = apis(&bus);
        let sb = start(
            r#"
            fn on_load() { events.emit("t.loaded", plugin.id); }
            "#,
            &apis,
        )
        .expect("start");
        let got = Arc::new(Mutex::new(None));
        let g = got.clone();
        bus.on(
            "t.loaded",
            Some(FnCallback::new("host", move |p| {
                *g.lock() = p.cloned();
                Ok(())
            })),
        );
        assert!(sb.call_hook(ON_LOAD).expect("hook"));
        assert_eq!(*got.lock(), Some(json!("t")));
        assert!(!sb.call_hook(ON_UNLOAD).expect("absent"));
    }

    #[test]
    fn script_callbacks_receive_payloads() {
        let bus = Arc::new(EventManager::new());
        let apis = apis(&bus);
        let _sandbox = start(
            r#"
            events.on("ping", |p| { events.emit("pong", p.n + 1); });
            events.on("ping", || { events.emit("pong", 0); });
            "#,
            &apis,
        )
        .expect("start");
        let got = Arc::new(Mutex::new(Vec::new()));
        let g = got.clone();
        bus.on(
            "pong",
            Some(FnCallback::new("host", move |p| {
                g.lock().push(p.cloned().unwrap_or_default());
                Ok(())
            })),
        );
        assert_eq!(bus.emit("ping", &json!({"n": 41})), 2);
        assert_eq!(*got.lock(), vec![json!(42), json!(0)]);
    }

    #[test]
    fn runtime_errors_carry_location() {
        let bus = Arc::new(EventManager::new());
        let apis = apis(&bus);
        let Err(err) = start("let a = 1;\nthrow \"boom\";\n", &apis) else {
            panic!("expected failure");
        };
        assert!(matches!(err, Error::Script { line: Some(2), .. }));
    }

    #[test]
    fn callbacks_fault_once_sandbox_is_gone() {
        let bus = Arc::new(EventManager::new());
        let apis = apis(&bus);
        let sb = start(r#"events.on("x", || 1);"#, &apis).expect("start");
        drop(sb);
        // Still registered, but the invocation faults and is contained.
        assert_eq!(bus.emit("x", &json!(null)), 1);

        let unbound = Callbacks::new("t", Arc::new(OnceCell::new()));
        let cb = unbound.wrap(Dynamic::from("f".to_string())).expect("callable name");
        assert!(cb.invoke(None).is_err());
        assert_eq!(cb.owner(), "t");
        assert!(unbound.wrap(Dynamic::from(3_i64)).is_none());
    }

    #[test]
    fn missing_capability_is_an_unknown_variable() {
        let bus = Arc::new(EventManager::new());
        let apis = apis(&bus);
        let err = start("window.set_opacity(0.5);", &apis).map(|_| ()).expect_err("no window");
        assert!(err.to_string().contains("window"));
    }
}
