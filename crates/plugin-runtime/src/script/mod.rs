//! Rhai sandboxes for plugin scripts.
//!
//! A plugin's `main.rhai` runs in its own [`Engine`](rhai::Engine) with
//! operation and depth limits, an import resolver confined to the plugin
//! directory, and one global per granted capability. Script functions handed
//! to the host become [`CallbackRef`](crate::callback::CallbackRef)s that hold
//! the sandbox weakly, so unloading a plugin makes any stale callback fail
//! cleanly instead of keeping the engine alive.

mod bindings;
mod callback;
mod convert;
mod engine;
mod sandbox;

pub use sandbox::{ON_LOAD, ON_UNLOAD, Sandbox, SandboxSpec};
