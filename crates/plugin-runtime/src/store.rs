//! Per-plugin key/value persistence.

use std::{
    collections::{BTreeMap, HashMap},
    fs, io,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::Result;

/// A plugin's persisted values.
pub type ConfigMap = BTreeMap<String, Value>;

/// Backing storage for the Config API.
pub trait ConfigStore: Send + Sync {
    /// Load every value stored for `plugin`. Unknown plugins yield an empty map.
    fn load(&self, plugin: &str) -> Result<ConfigMap>;
    /// Replace everything stored for `plugin`.
    fn save(&self, plugin: &str, values: &ConfigMap) -> Result<()>;
}

/// Stores each plugin's values as `<dir>/<plugin>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    /// Directory holding the files.
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file backing `plugin`.
    pub fn path_for(&self, plugin: &str) -> PathBuf {
        self.dir.join(format!("{}.json", plugin))
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self, plugin: &str) -> Result<ConfigMap> {
        let path = self.path_for(plugin);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ConfigMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, plugin: &str, values: &ConfigMap) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(plugin);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(values)?)?;
        fs::rename(&tmp, &path)?;
        debug!(plugin, path = %path.display(), keys = values.len(), "config_saved");
        Ok(())
    }
}

/// In-memory store for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Values per plugin.
    values: Mutex<HashMap<String, ConfigMap>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self, plugin: &str) -> Result<ConfigMap> {
        Ok(self.values.lock().get(plugin).cloned().unwrap_or_default())
    }

    fn save(&self, plugin: &str, values: &ConfigMap) -> Result<()> {
        self.values.lock().insert(plugin.to_string(), values.clone());
        Ok(())
    }
}
