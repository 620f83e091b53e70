//! Opaque script callbacks and the guarded invocation boundary.
//!
//! The host never assumes how a callback is represented. Script engines
//! implement [`ScriptCallback`]; host code and tests use [`FnCallback`]. Every
//! invocation that originates in the host goes through [`invoke_guarded`], so a
//! fault raised inside plugin code is logged with the owner's identity and
//! swallowed.

use std::{fmt, sync::Arc};

use serde_json::Value;
use thiserror::Error;
use tracing::error;

/// A fault raised while running a callback.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CallbackFault {
    /// Human-readable description of the fault.
    pub message: String,
}

impl CallbackFault {
    /// Construct a fault from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A callable provided by a plugin (or the host) that the runtime can invoke later.
pub trait ScriptCallback: Send + Sync {
    /// Invoke the callback with an optional payload.
    fn invoke(&self, payload: Option<&Value>) -> Result<(), CallbackFault>;

    /// Identity of the owner, used to tag fault logs.
    fn owner(&self) -> &str;
}

/// Shared handle to a callback.
pub type CallbackRef = Arc<dyn ScriptCallback>;

/// Invoke `cb`, logging and swallowing any fault. Returns whether it succeeded.
pub fn invoke_guarded(cb: &dyn ScriptCallback, context: &str, payload: Option<&Value>) -> bool {
    match cb.invoke(payload) {
        Ok(()) => true,
        Err(fault) => {
            error!(owner = %cb.owner(), context, error = %fault, "callback_fault");
            false
        }
    }
}

/// Adapter turning a Rust closure into a [`ScriptCallback`].
pub struct FnCallback<F> {
    /// Owner tag reported in fault logs.
    owner: String,
    /// The wrapped closure.
    f: F,
}

impl<F> FnCallback<F>
where
    F: Fn(Option<&Value>) -> Result<(), CallbackFault> + Send + Sync + 'static,
{
    /// Wrap `f` as a shared callback owned by `owner`.
    pub fn new(owner: impl Into<String>, f: F) -> CallbackRef {
        Arc::new(Self {
            owner: owner.into(),
            f,
        })
    }
}

impl<F> ScriptCallback for FnCallback<F>
where
    F: Fn(Option<&Value>) -> Result<(), CallbackFault> + Send + Sync,
{
    fn invoke(&self, payload: Option<&Value>) -> Result<(), CallbackFault> {
        (self.f)(payload)
    }

    fn owner(&self) -> &str {
        &self.owner
    }
}

impl<F> fmt::Debug for FnCallback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCallback").field("owner", &self.owner).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn guarded_invocation_swallows_faults() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let cb = FnCallback::new("test", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Err(CallbackFault::new("boom"))
        });
        assert!(!invoke_guarded(cb.as_ref(), "unit", None));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn guarded_invocation_passes_payload() {
        let cb = FnCallback::new("test", |p| match p {
            Some(Value::Bool(true)) => Ok(()),
            other => Err(CallbackFault::new(format!("unexpected {:?}", other))),
        });
        assert!(invoke_guarded(cb.as_ref(), "unit", Some(&Value::Bool(true))));
        assert!(!invoke_guarded(cb.as_ref(), "unit", None));
    }
}
