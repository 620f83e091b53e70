//! Runtime settings: plugin locations, sandbox limits and host shortcuts.

use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Execution limits applied to every plugin sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxLimits {
    /// Maximum operations per script invocation.
    pub max_operations: u64,
    /// Maximum function call nesting.
    pub max_call_levels: usize,
    /// Maximum expression depth at global level.
    pub max_expr_depth: usize,
    /// Maximum expression depth inside functions.
    pub max_fn_expr_depth: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_operations: 200_000,
            max_call_levels: 64,
            max_expr_depth: 128,
            max_fn_expr_depth: 64,
        }
    }
}

/// Settings file contents. Every field is optional on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSettings {
    /// Directory scanned for plugins (`<dir>/<plugin>/plugin.json`).
    pub plugins_dir: Option<PathBuf>,
    /// Directory holding per-plugin persisted config.
    pub data_dir: Option<PathBuf>,
    /// Sandbox limits.
    pub sandbox: SandboxLimits,
    /// Host action name to key combination.
    pub shortcuts: BTreeMap<String, String>,
}

/// The floatview home directory (`~/.floatview`).
pub fn home_dir() -> PathBuf {
    let mut p = PathBuf::from(env::var_os("HOME").unwrap_or_default());
    p.push(".floatview");
    p
}

/// The preferred settings path (`~/.floatview/settings.json`).
pub fn default_settings_path() -> PathBuf {
    home_dir().join("settings.json")
}

impl RuntimeSettings {
    /// Parse settings from JSON text.
    pub fn from_json(text: &str, path: Option<&Path>) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Settings {
            path: path.map(Path::to_path_buf),
            message: e.to_string(),
        })
    }

    /// Read settings from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::Settings {
            path: Some(path.to_path_buf()),
            message: e.to_string(),
        })?;
        Self::from_json(&text, Some(path))
    }

    /// Resolve settings using the default policy.
    ///
    /// Policy:
    /// 1) Load `explicit` when provided; errors are reported.
    /// 2) Else load `~/.floatview/settings.json` when it exists.
    /// 3) Else use defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let preferred = default_settings_path();
        if preferred.exists() {
            return Self::load(&preferred);
        }
        Ok(Self::default())
    }

    /// Effective plugins directory.
    pub fn plugins_dir(&self) -> PathBuf {
        self.plugins_dir
            .clone()
            .unwrap_or_else(|| home_dir().join("plugins"))
    }

    /// Effective data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| home_dir().join("data"))
    }
}
