//! Process-wide action table: unique action name to invocable handler.
//!
//! This is the landing zone for both host shortcuts and plugin hotkeys. The
//! key hook resolves a physical key event to action names and asks the
//! dispatcher to invoke them; registries own the name and its lifecycle.

use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{Error, Result};

/// Prefix for actions owned by the host application.
pub const HOST_ACTION_PREFIX: &str = "Host:";

/// Prefix for actions owned by plugins.
pub const PLUGIN_ACTION_PREFIX: &str = "Plugin:";

/// A dispatchable handler.
pub type ActionHandler = Arc<dyn Fn() + Send + Sync>;

/// Name to handler table shared by every registry.
#[derive(Default)]
pub struct ActionDispatcher {
    /// Registered handlers keyed by full action name.
    actions: Mutex<HashMap<String, ActionHandler>>,
}

impl ActionDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`. Fails if the name is already taken.
    pub fn register_action(&self, name: &str, handler: ActionHandler) -> Result<()> {
        let mut actions = self.actions.lock();
        if actions.contains_key(name) {
            warn!(action = name, "action_already_registered");
            return Err(Error::ActionExists(name.to_string()));
        }
        actions.insert(name.to_string(), handler);
        debug!(action = name, total = actions.len(), "action_registered");
        Ok(())
    }

    /// Remove `name`. Unknown names are a no-op; returns whether anything was removed.
    pub fn unregister_action(&self, name: &str) -> bool {
        let removed = self.actions.lock().remove(name).is_some();
        if removed {
            debug!(action = name, "action_unregistered");
        }
        removed
    }

    /// Invoke the handler registered under `name`, outside the table lock.
    ///
    /// Returns false when no handler is registered.
    pub fn invoke(&self, name: &str) -> bool {
        let handler = self.actions.lock().get(name).cloned();
        match handler {
            Some(h) => {
                trace!(action = name, "action_invoke");
                h();
                true
            }
            None => {
                trace!(action = name, "action_missing");
                false
            }
        }
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.actions.lock().contains_key(name)
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.lock().len()
    }

    /// Whether no actions are registered.
    pub fn is_empty(&self) -> bool {
        self.actions.lock().is_empty()
    }

    /// Sorted snapshot of registered names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered names starting with `prefix`, sorted.
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .actions
            .lock()
            .keys()
            .filter(|n| n.starts_with(prefix))
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("actions", &self.names())
            .finish()
    }
}
