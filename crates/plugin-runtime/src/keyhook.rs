//! Binding between physical key events and action names.
//!
//! The OS keyboard hook is an external collaborator: registries tell it which
//! combination triggers which action via [`KeyHook`], and on a matching
//! key-down it asks the [`ActionDispatcher`] to invoke the action by name.
//! [`SoftwareKeyHook`] is the in-process implementation used by the headless
//! host and the test suite.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use vk_keycode::{KeyCombination, Modifiers};

use crate::ActionDispatcher;

/// Contract with the physical input layer.
pub trait KeyHook: Send + Sync {
    /// Start delivering key-downs of `combo` to `action`.
    fn bind(&self, combo: &KeyCombination, action: &str);
    /// Stop delivering to `action`. Unknown actions are ignored.
    fn unbind(&self, action: &str);
}

/// A key hook driven by explicit calls instead of an OS event tap.
pub struct SoftwareKeyHook {
    /// Dispatcher used to resolve action names.
    dispatcher: Arc<ActionDispatcher>,
    /// Bindings in the order they were made.
    bindings: Mutex<Vec<(KeyCombination, String)>>,
}

impl SoftwareKeyHook {
    /// Create a hook that dispatches through `dispatcher`.
    pub fn new(dispatcher: Arc<ActionDispatcher>) -> Self {
        Self {
            dispatcher,
            bindings: Mutex::new(Vec::new()),
        }
    }

    /// Deliver a key-down. Every action bound to exactly this combination is
    /// invoked in binding order; returns how many handlers ran.
    pub fn handle_key_down(&self, vk_code: u32, modifiers: Modifiers) -> usize {
        let targets: Vec<String> = self
            .bindings
            .lock()
            .iter()
            .filter(|(combo, _)| combo.matches(vk_code, modifiers))
            .map(|(_, action)| action.clone())
            .collect();
        trace!(vk_code, ?modifiers, matched = targets.len(), "key_down");
        targets
            .iter()
            .filter(|action| self.dispatcher.invoke(action))
            .count()
    }

    /// Parse `spec` and deliver it as a key-down. Invalid specs deliver nothing.
    pub fn press(&self, spec: &str) -> usize {
        match KeyCombination::parse(spec) {
            Ok(combo) => self.handle_key_down(combo.vk_code(), combo.modifiers),
            Err(err) => {
                warn!(spec, error = %err, "press_invalid_combo");
                0
            }
        }
    }

    /// Snapshot of (canonical combo, action) pairs.
    pub fn bindings(&self) -> Vec<(String, String)> {
        self.bindings
            .lock()
            .iter()
            .map(|(c, a)| (c.to_string(), a.clone()))
            .collect()
    }
}

impl KeyHook for SoftwareKeyHook {
    fn bind(&self, combo: &KeyCombination, action: &str) {
        debug!(combo = %combo, action, "hook_bind");
        self.bindings.lock().push((*combo, action.to_string()));
    }

    fn unbind(&self, action: &str) {
        let mut bindings = self.bindings.lock();
        let before = bindings.len();
        bindings.retain(|(_, a)| a != action);
        if bindings.len() != before {
            debug!(action, "hook_unbind");
        }
    }
}
