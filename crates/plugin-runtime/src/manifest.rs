//! Plugin manifests (`plugin.json`).

use std::{
    collections::BTreeSet,
    fmt, fs,
    path::{Component, Path, PathBuf},
    result::Result as StdResult,
};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// File name of a plugin manifest inside its directory.
pub const MANIFEST_FILE: &str = "plugin.json";

/// Plugin ids end up inside action names, so they are restricted.
static ID_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").ok());

/// A host API family a plugin may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// `window` global.
    Window,
    /// `webview` global.
    Webview,
    /// `hotkey` global.
    Hotkey,
    /// `subtitle` global.
    Subtitle,
    /// `events` global.
    Events,
    /// `config` global.
    Config,
}

impl Capability {
    /// Every capability.
    pub const ALL: [Self; 6] = [
        Self::Window,
        Self::Webview,
        Self::Hotkey,
        Self::Subtitle,
        Self::Events,
        Self::Config,
    ];

    /// Script-visible name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Window => "window",
            Self::Webview => "webview",
            Self::Hotkey => "hotkey",
            Self::Subtitle => "subtitle",
            Self::Events => "events",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Default script entry point.
fn default_main() -> String {
    "main.rhai".to_string()
}

/// Parsed `plugin.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique plugin id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Short description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Script entry point, relative to the plugin directory.
    #[serde(default = "default_main")]
    pub main: String,
    /// Granted capabilities; `None` grants all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<BTreeSet<Capability>>,
}

impl PluginManifest {
    /// Parse and validate manifest JSON.
    pub fn from_json(text: &str, path: Option<&Path>) -> Result<Self> {
        let manifest: Self = serde_json::from_str(text).map_err(|e| Error::Manifest {
            path: path.map(Path::to_path_buf),
            message: e.to_string(),
        })?;
        manifest.validate().map_err(|message| Error::Manifest {
            path: path.map(Path::to_path_buf),
            message,
        })?;
        Ok(manifest)
    }

    /// Read `<dir>/plugin.json`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let text = fs::read_to_string(&path).map_err(|e| Error::Manifest {
            path: Some(path.clone()),
            message: e.to_string(),
        })?;
        Self::from_json(&text, Some(&path))
    }

    /// Check id format and entry point shape.
    fn validate(&self) -> StdResult<(), String> {
        if !is_valid_id(&self.id) {
            return Err(format!("invalid plugin id: {:?}", self.id));
        }
        if self.name.trim().is_empty() {
            return Err("plugin name must not be empty".to_string());
        }
        let main = Path::new(&self.main);
        if self.main.trim().is_empty() || main.is_absolute() {
            return Err(format!("invalid main script path: {}", self.main));
        }
        if main
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(format!("main script must stay inside the plugin directory: {}", self.main));
        }
        Ok(())
    }

    /// Whether `cap` is granted.
    pub fn grants(&self, cap: Capability) -> bool {
        self.capabilities.as_ref().is_none_or(|caps| caps.contains(&cap))
    }

    /// Granted capabilities, in declaration order of [`Capability::ALL`].
    pub fn granted(&self) -> Vec<Capability> {
        Capability::ALL.into_iter().filter(|c| self.grants(*c)).collect()
    }

    /// Absolute path of the entry script for a plugin rooted at `dir`.
    pub fn main_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.main)
    }
}

/// Whether `id` is usable as a plugin id.
pub fn is_valid_id(id: &str) -> bool {
    ID_RE.as_ref().is_some_and(|re| re.is_match(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_manifest_defaults() {
        let m = PluginManifest::from_json(r#"{"id":"demo","name":"Demo","version":"1.0"}"#, None)
            .expect("parse");
        assert_eq!(m.main, "main.rhai");
        assert!(Capability::ALL.iter().all(|c| m.grants(*c)));
        assert_eq!(m.granted().len(), 6);
    }

    #[test]
    fn capability_subset() {
        let m = PluginManifest::from_json(
            r#"{"id":"a.b-c_1","name":"X","version":"0","capabilities":["hotkey","webview"]}"#,
            None,
        )
        .expect("parse");
        assert!(m.grants(Capability::Hotkey));
        assert!(!m.grants(Capability::Window));
        assert_eq!(m.granted(), [Capability::Webview, Capability::Hotkey]);
    }

    #[test]
    fn rejects_bad_ids_and_paths() {
        for text in [
            r#"{"id":"has space","name":"X","version":"0"}"#,
            r#"{"id":"has:colon","name":"X","version":"0"}"#,
            r#"{"id":"-lead","name":"X","version":"0"}"#,
            r#"{"id":"ok","name":"X","version":"0","main":"../escape.rhai"}"#,
            r#"{"id":"ok","name":"X","version":"0","main":"/abs.rhai"}"#,
            r#"{"id":"ok","name":"X","version":"0","capabilities":["filesystem"]}"#,
            r#"{"id":"ok","version":"0"}"#,
        ] {
            let err = PluginManifest::from_json(text, None).expect_err(text);
            assert!(matches!(err, Error::Manifest { .. }), "{}", text);
        }
    }
}
