//! Host-owned shortcuts bound from settings.

use std::{collections::BTreeMap, sync::Arc};

use tracing::{info, warn};

use crate::{
    ActionDispatcher,
    action::ActionHandler,
    callback::FnCallback,
    hotkey::{HotkeyRegistry, INVALID_ID, Owner},
    keyhook::KeyHook,
};

/// Named host actions and the combos that trigger them. Registrations use
/// [`Owner::Host`], so they share the dispatcher with plugin hotkeys under
/// `Host:Hotkey:<id>` names.
pub struct HostShortcuts {
    /// Host-owned registry.
    registry: HotkeyRegistry,
    /// Known host actions.
    actions: BTreeMap<String, ActionHandler>,
}

impl HostShortcuts {
    /// Create an empty set bound to `dispatcher` and `hook`.
    pub fn new(dispatcher: Arc<ActionDispatcher>, hook: Arc<dyn KeyHook>) -> Self {
        Self {
            registry: HotkeyRegistry::new(Owner::Host, dispatcher, hook),
            actions: BTreeMap::new(),
        }
    }

    /// Declare the host action `name`.
    pub fn define(&mut self, name: &str, handler: impl Fn() + Send + Sync + 'static) {
        self.actions.insert(name.to_string(), Arc::new(handler));
    }

    /// Names of declared actions.
    pub fn actions(&self) -> Vec<String> {
        self.actions.keys().cloned().collect()
    }

    /// Bind `combo` to the declared action `name`. Returns the registration id
    /// or [`INVALID_ID`].
    pub fn bind(&self, name: &str, combo: &str) -> i64 {
        let Some(handler) = self.actions.get(name).cloned() else {
            warn!(action = name, combo, "host_shortcut_unknown_action");
            return INVALID_ID;
        };
        let id = self.registry.register(
            combo,
            Some(FnCallback::new("host", move |_| {
                handler();
                Ok(())
            })),
        );
        if id != INVALID_ID {
            info!(action = name, combo, id, "host_shortcut_bound");
        }
        id
    }

    /// Bind every `action -> combo` pair. Returns how many were bound.
    pub fn apply(&self, shortcuts: &BTreeMap<String, String>) -> usize {
        shortcuts
            .iter()
            .filter(|(name, combo)| self.bind(name, combo) != INVALID_ID)
            .count()
    }

    /// Remove the binding for `combo`.
    pub fn unbind(&self, combo: &str) -> bool {
        self.registry.unregister(combo)
    }

    /// The underlying registry.
    pub fn registry(&self) -> &HotkeyRegistry {
        &self.registry
    }
}

impl Drop for HostShortcuts {
    fn drop(&mut self) {
        self.registry.cleanup();
    }
}
