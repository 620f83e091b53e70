//! Script functions wrapped as host callbacks.

use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use rhai::{Dynamic, FnPtr};
use serde_json::Value;
use tracing::warn;

use super::Sandbox;
use crate::callback::{CallbackFault, CallbackRef, ScriptCallback};

/// Late-bound link to the sandbox a binding belongs to. Set once the sandbox
/// has been constructed; empty while the engine is still being built.
pub type SandboxSlot = Arc<OnceCell<Weak<Sandbox>>>;

/// A script function held by the host.
struct RhaiCallback {
    /// Owning plugin id.
    plugin: String,
    /// Sandbox to run in. Weak so the registries never keep it alive.
    slot: SandboxSlot,
    /// The function.
    func: FnPtr,
}

impl ScriptCallback for RhaiCallback {
    fn invoke(&self, payload: Option<&Value>) -> Result<(), CallbackFault> {
        let sandbox = self
            .slot
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| CallbackFault::new("plugin is no longer loaded"))?;
        sandbox
            .call(&self.func, payload)
            .map(|_| ())
            .map_err(CallbackFault::new)
    }

    fn owner(&self) -> &str {
        &self.plugin
    }
}

/// Turns script values into host callbacks for one plugin.
#[derive(Clone)]
pub struct Callbacks {
    /// Owning plugin id.
    plugin: String,
    /// Sandbox link shared by every callback.
    slot: SandboxSlot,
}

impl Callbacks {
    /// Factory for `plugin`'s callbacks.
    pub fn new(plugin: &str, slot: SandboxSlot) -> Self {
        Self {
            plugin: plugin.to_string(),
            slot,
        }
    }

    /// Wrap `value` if it is callable: a function pointer, a closure, or the
    /// name of a script function. Anything else is rejected with a warning.
    pub fn wrap(&self, value: Dynamic) -> Option<CallbackRef> {
        let func = if value.is::<FnPtr>() {
            value.cast::<FnPtr>()
        } else if let Some(name) = value.clone().try_cast::<String>() {
            match FnPtr::new(name) {
                Ok(f) => f,
                Err(e) => {
                    warn!(plugin = %self.plugin, error = %e, "callback_name_invalid");
                    return None;
                }
            }
        } else {
            if !value.is_unit() {
                warn!(plugin = %self.plugin, kind = value.type_name(), "callback_not_callable");
            }
            return None;
        };
        Some(Arc::new(RhaiCallback {
            plugin: self.plugin.clone(),
            slot: self.slot.clone(),
            func,
        }))
    }
}
