//! Error types for plugin loading, host API operations and runtime settings.

use std::{
    cmp::{max, min},
    fmt::Write as _,
    io,
    path::{Path, PathBuf},
    result::Result as StdResult,
};

use thiserror::Error;

/// Convenient result type for the runtime crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the plugin runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// A plugin manifest could not be read or is invalid.
    #[error("{message}")]
    Manifest {
        /// Path of the offending `plugin.json`, when known.
        path: Option<PathBuf>,
        /// Human-readable error message.
        message: String,
    },

    /// A plugin script failed to compile or raised an error while loading.
    #[error("{message}")]
    Script {
        /// Owning plugin id.
        plugin: String,
        /// Script path, when loaded from disk.
        path: Option<PathBuf>,
        /// Optional 1-based line number.
        line: Option<usize>,
        /// Optional 1-based column number.
        col: Option<usize>,
        /// Human-readable error message.
        message: String,
        /// Rendered excerpt with a caret at the error location.
        excerpt: Option<String>,
    },

    /// Runtime settings could not be read or parsed.
    #[error("{message}")]
    Settings {
        /// Path of the settings file, when known.
        path: Option<PathBuf>,
        /// Human-readable error message.
        message: String,
    },

    /// A plugin with this id is already loaded.
    #[error("plugin already loaded: {0}")]
    DuplicatePlugin(String),

    /// No loaded plugin has this id.
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),

    /// The action name is already present in the dispatcher.
    #[error("action already registered: {0}")]
    ActionExists(String),

    /// No content surface is currently available.
    #[error("content surface unavailable")]
    SurfaceUnavailable,

    /// The content engine reported a failure while executing a script.
    #[error("script execution failed: {0}")]
    ExecuteScript(String),

    /// The UI thread dropped the completion before the script finished.
    #[error("script execution abandoned before completion")]
    ExecuteAbandoned,

    /// I/O failure while touching plugin files or persisted data.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encode/decode failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Render a human-friendly message including location and excerpt when available.
    pub fn pretty(&self) -> String {
        match self {
            Self::Manifest { path, message } => match path {
                Some(p) => format!("Plugin manifest error at {}: {}", p.display(), message),
                None => format!("Plugin manifest error: {}", message),
            },
            Self::Settings { path, message } => match path {
                Some(p) => format!("Settings error at {}: {}", p.display(), message),
                None => format!("Settings error: {}", message),
            },
            Self::Script {
                plugin,
                path,
                line,
                col,
                message,
                excerpt,
            } => {
                let loc = match (line, col) {
                    (Some(l), Some(c)) => format!("{}:{}", l, c),
                    (Some(l), None) => format!("{}", l),
                    _ => String::new(),
                };
                let head = match (path, loc.is_empty()) {
                    (Some(p), false) => format!("Plugin {} script error at {}:{}", plugin, p.display(), loc),
                    (Some(p), true) => format!("Plugin {} script error in {}", plugin, p.display()),
                    (None, false) => format!("Plugin {} script error at {}", plugin, loc),
                    (None, true) => format!("Plugin {} script error", plugin),
                };
                match excerpt {
                    Some(ex) => format!("{}\n{}\n{}", head, message, ex),
                    None => format!("{}\n{}", head, message),
                }
            }
            other => other.to_string(),
        }
    }

    /// Access the optional path attached to this error.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Manifest { path, .. } | Self::Script { path, .. } | Self::Settings { path, .. } => {
                path.as_deref()
            }
            _ => None,
        }
    }
}

/// Build a small 2-3 line excerpt with a caret at `(line_no, col_no)`.
pub fn excerpt_at(source: &str, line_no: usize, col_no: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let total = lines.len();
    let start = max(1usize, line_no.saturating_sub(2));
    let end = min(total, line_no + 1);

    let mut out = String::new();
    for n in start..=end {
        let text = lines.get(n - 1).copied().unwrap_or("");
        let _ignored = writeln!(out, " {:>4} | {}", n, text);
        if n == line_no {
            let prefix = format!(" {:>4} | ", n);
            let _ignored = writeln!(
                out,
                "{}{}^",
                " ".repeat(prefix.len()),
                " ".repeat(col_no.saturating_sub(1))
            );
        }
    }
    out
}
