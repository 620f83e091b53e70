//! Plugin runtime core for floatview.
//!
//! Plugins are directories holding a `plugin.json` manifest and a Rhai script.
//! Each one runs in its own sandbox with a capability-scoped host API:
//!
//! - `window`: opacity, click-through, topmost and bounds of the floating window.
//! - `webview`: CSS/script injection into the page and `execute_script`.
//! - `hotkey`: key-combination registrations routed through the [`ActionDispatcher`].
//! - `subtitle`: the host's subtitle track and its change events.
//! - `events`: the shared [`EventManager`](events::EventManager).
//! - `config`: a persisted per-plugin key/value map.
//!
//! Everything a plugin registers is released when it unloads. Faults raised by
//! script callbacks are logged and contained; they never reach the host or
//! other plugins.

mod action;
pub mod api;
pub mod callback;
pub mod context;
mod error;
pub mod events;
pub mod host;
pub mod hotkey;
pub mod keyhook;
pub mod manager;
pub mod manifest;
mod script;
pub mod settings;
pub mod shortcuts;
pub mod store;
pub mod subtitle;
pub mod test_support;
pub mod ui;
pub mod value;

pub use action::{ActionDispatcher, ActionHandler, HOST_ACTION_PREFIX, PLUGIN_ACTION_PREFIX};
pub use context::{HostContext, PluginContext};
pub use error::{Error, Result, excerpt_at};
pub use manager::PluginManager;
pub use manifest::{Capability, PluginManifest};
pub use settings::RuntimeSettings;
pub use vk_keycode::{Key, KeyCombination, Modifiers, ParseError};
