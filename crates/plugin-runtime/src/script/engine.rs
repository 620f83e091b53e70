//! Engine setup, sandbox limits and error mapping for plugin scripts.

use std::{
    fs,
    path::{Component, Path, PathBuf},
    result::Result as StdResult,
};

use rhai::{
    AST, Dynamic, Engine, EvalAltResult, Module, ModuleResolver, Position, Shared,
    module_resolvers::FileModuleResolver,
};
use tracing::{debug, info};

use crate::{Error, error::excerpt_at, settings::SandboxLimits};

/// Tracing target for `print`/`debug` output from scripts.
const SCRIPT_TARGET: &str = "plugin_runtime::script";

/// Configure `engine` for running `plugin`'s script rooted at `dir`.
pub fn configure_engine(engine: &mut Engine, plugin: &str, dir: Option<&Path>, limits: &SandboxLimits) {
    let id = plugin.to_string();
    engine.on_print(move |s| info!(target: SCRIPT_TARGET, plugin = %id, "{}", s));
    let id = plugin.to_string();
    engine.on_debug(move |s, src, pos| {
        debug!(target: SCRIPT_TARGET, plugin = %id, "{} @ {:?}:{:?}", s, src, pos);
    });

    if let Some(dir) = dir {
        engine.set_module_resolver(PluginImports::new(dir));
    }

    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_expr_depths(limits.max_expr_depth, limits.max_fn_expr_depth);
}

/// Resolves `import` statements against one plugin's directory.
///
/// Import paths must be relative and may not climb out with `..`; the file
/// they name, after following symlinks, must live under the directory too.
struct PluginImports {
    /// Canonical plugin directory.
    dir: PathBuf,
    /// File loading and module caching.
    files: FileModuleResolver,
}

impl PluginImports {
    /// Resolver for the plugin at `dir`.
    fn new(dir: &Path) -> Self {
        Self {
            dir: fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf()),
            files: FileModuleResolver::new_with_path(dir),
        }
    }

    /// Fail unless `path`, imported from `source`, stays inside the plugin.
    fn confine(&self, source: Option<&str>, path: &str, pos: Position) -> StdResult<(), Box<EvalAltResult>> {
        let lexical = Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !lexical {
            return Err(boxed_runtime_error(
                format!("import must be a relative path inside the plugin: {}", path),
                pos,
            ));
        }
        let file = self.files.get_file_path(path, source.map(Path::new));
        // Missing files fall through to the loader's not-found error.
        match fs::canonicalize(&file) {
            Ok(real) if !real.starts_with(&self.dir) => Err(boxed_runtime_error(
                format!("imported module escapes plugin directory: {}", path),
                pos,
            )),
            _ => Ok(()),
        }
    }
}

impl ModuleResolver for PluginImports {
    fn resolve(
        &self,
        engine: &Engine,
        source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> StdResult<Shared<Module>, Box<EvalAltResult>> {
        self.confine(source, path, pos)?;
        self.files.resolve(engine, source, path, pos)
    }

    fn resolve_ast(
        &self,
        engine: &Engine,
        source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> Option<StdResult<AST, Box<EvalAltResult>>> {
        match self.confine(source, path, pos) {
            Ok(()) => self.files.resolve_ast(engine, source, path, pos),
            Err(err) => Some(Err(err)),
        }
    }
}

/// Compile `source`, converting failures into [`Error::Script`].
pub fn compile(engine: &Engine, plugin: &str, source: &str, path: Option<&Path>) -> StdResult<AST, Error> {
    engine.compile(source).map_err(|err| {
        let err: EvalAltResult = err.into();
        error_from_rhai(plugin, source, &err, path)
    })
}

/// Convert a Rhai error into [`Error::Script`] with line, column and excerpt.
pub fn error_from_rhai(plugin: &str, source: &str, err: &EvalAltResult, path: Option<&Path>) -> Error {
    let (line, col, excerpt) = match pos_to_line_col(err.position()) {
        Some((line, col)) => (Some(line), Some(col), Some(excerpt_at(source, line, col))),
        None => (None, None, None),
    };
    Error::Script {
        plugin: plugin.to_string(),
        path: path.map(Path::to_path_buf),
        line,
        col,
        message: err.to_string(),
        excerpt,
    }
}

/// Convert a Rhai `Position` into a 1-based (line, col) pair.
pub fn pos_to_line_col(pos: Position) -> Option<(usize, usize)> {
    let line = pos.line()?;
    let col = pos.position().unwrap_or(1);
    Some((line.max(1), col.max(1)))
}

/// Construct a runtime error raised from a host binding at `pos`.
pub fn boxed_runtime_error(message: String, pos: Position) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(Dynamic::from(message), pos))
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::symlink;

    use tempfile::TempDir;

    use super::*;

    fn engine_in(dir: &Path) -> Engine {
        let mut engine = Engine::new();
        configure_engine(&mut engine, "t", Some(dir), &SandboxLimits::default());
        engine
    }

    #[test]
    fn compile_error_has_location_and_excerpt() {
        let engine = Engine::new();
        let err = compile(&engine, "demo", "let a = 1;\nlet b = ;\n", None).expect_err("syntax");
        let Error::Script { line, excerpt, .. } = &err else {
            panic!("expected script error");
        };
        assert_eq!(*line, Some(2));
        assert!(excerpt.as_deref().is_some_and(|e| e.contains("let b = ;")));
        assert!(err.pretty().starts_with("Plugin demo script error at 2:"));
    }

    #[test]
    fn operation_limit_stops_runaway_scripts() {
        let mut engine = Engine::new();
        let limits = SandboxLimits {
            max_operations: 1_000,
            ..SandboxLimits::default()
        };
        configure_engine(&mut engine, "t", None, &limits);
        let res = engine.run("let x = 0; loop { x += 1; }");
        assert!(matches!(res.map_err(|e| *e), Err(EvalAltResult::ErrorTooManyOperations(_))));
    }

    #[test]
    fn imports_stay_inside_plugin_dir() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().join("plugin");
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(root.join("util.rhai"), "fn twice(x) { x * 2 }").expect("write");
        fs::write(dir.path().join("outside.rhai"), "fn nope() { 1 }").expect("write");
        let engine = engine_in(&root);

        let v: i64 = engine
            .eval(r#"import "util" as u; u::twice(21)"#)
            .expect("import");
        assert_eq!(v, 42);

        let v: i64 = engine
            .eval(r#"import "./util" as u; u::twice(4)"#)
            .expect("current-dir import");
        assert_eq!(v, 8);

        for script in [
            r#"import "../outside" as o;"#,
            r#"import "/etc/passwd" as p;"#,
        ] {
            let err = engine.run(script).expect_err(script);
            assert!(err.to_string().contains("relative path inside the plugin"), "{}", err);
        }
    }

    #[test]
    fn symlink_escape_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().join("plugin");
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(dir.path().join("outside.rhai"), "fn nope() { 1 }").expect("write");
        symlink(dir.path().join("outside.rhai"), root.join("link.rhai")).expect("symlink");
        let engine = engine_in(&root);
        let err = engine.run(r#"import "link" as l;"#).expect_err("escape");
        assert!(err.to_string().contains("escapes plugin directory"));
    }
}
