//! Config API: a plugin's persisted key/value settings.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::store::{ConfigMap, ConfigStore};

/// The `config` capability. Values are loaded once and written through on
/// every change.
pub struct ConfigApi {
    /// Owning plugin id.
    plugin: String,
    /// Backing store.
    store: Arc<dyn ConfigStore>,
    /// Cached values.
    values: Mutex<ConfigMap>,
}

impl ConfigApi {
    /// Load `plugin`'s values from `store`. A failed load starts empty.
    pub fn new(plugin: &str, store: Arc<dyn ConfigStore>) -> Self {
        let values = match store.load(plugin) {
            Ok(v) => v,
            Err(e) => {
                warn!(plugin, error = %e, "config_load_failed");
                ConfigMap::new()
            }
        };
        Self {
            plugin: plugin.to_string(),
            store,
            values: Mutex::new(values),
        }
    }

    /// Value for `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    /// Value for `key`, or `default` when absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Store `value` under `key` and persist. On a failed write the previous
    /// value is restored and false is returned.
    pub fn set(&self, key: &str, value: Value) -> bool {
        if key.trim().is_empty() {
            warn!(plugin = %self.plugin, "config_set_empty_key");
            return false;
        }
        let mut values = self.values.lock();
        let previous = values.insert(key.to_string(), value);
        if self.persist(&values) {
            debug!(plugin = %self.plugin, key, "config_set");
            return true;
        }
        match previous {
            Some(v) => values.insert(key.to_string(), v),
            None => values.remove(key),
        };
        false
    }

    /// Remove `key` and persist. Returns whether it existed and was saved.
    pub fn remove(&self, key: &str) -> bool {
        let mut values = self.values.lock();
        let Some(previous) = values.remove(key) else {
            return false;
        };
        if self.persist(&values) {
            return true;
        }
        values.insert(key.to_string(), previous);
        false
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.values.lock().keys().cloned().collect()
    }

    /// Write `values` to the store.
    fn persist(&self, values: &ConfigMap) -> bool {
        match self.store.save(&self.plugin, values) {
            Ok(()) => true,
            Err(e) => {
                warn!(plugin = %self.plugin, error = %e, "config_save_failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use serde_json::json;

    use super::*;
    use crate::{Error, Result, store::MemoryStore};

    /// A store whose writes always fail.
    struct ReadOnly;

    impl ConfigStore for ReadOnly {
        fn load(&self, _plugin: &str) -> Result<ConfigMap> {
            Ok(ConfigMap::from([("k".to_string(), json!(1))]))
        }

        fn save(&self, _plugin: &str, _values: &ConfigMap) -> Result<()> {
            Err(Error::Io(io::Error::other("read-only")))
        }
    }

    #[test]
    fn set_get_remove_persist() {
        let store = Arc::new(MemoryStore::new());
        let api = ConfigApi::new("demo", store.clone());
        assert_eq!(api.get("x"), None);
        assert_eq!(api.get_or("x", json!(5)), json!(5));
        assert!(api.set("x", json!("v")));
        assert!(api.set("a", json!([1, 2])));
        assert_eq!(api.keys(), ["a", "x"]);
        assert_eq!(store.load("demo").expect("load")["x"], json!("v"));

        let reopened = ConfigApi::new("demo", store.clone());
        assert_eq!(reopened.get("a"), Some(json!([1, 2])));

        assert!(api.remove("x"));
        assert!(!api.remove("x"));
        assert!(!store.load("demo").expect("load").contains_key("x"));
        assert!(!api.set("  ", json!(1)));
    }

    #[test]
    fn failed_writes_roll_back() {
        let api = ConfigApi::new("demo", Arc::new(ReadOnly));
        assert!(!api.set("k", json!(2)));
        assert_eq!(api.get("k"), Some(json!(1)));
        assert!(!api.set("new", json!(2)));
        assert_eq!(api.get("new"), None);
        assert!(!api.remove("k"));
        assert_eq!(api.get("k"), Some(json!(1)));
    }
}
