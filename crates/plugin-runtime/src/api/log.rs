//! Log API: plugin messages routed to `tracing`.

use tracing::{debug, error, info, warn};

/// Tracing target for plugin-authored messages.
pub const TARGET: &str = "plugin_runtime::plugin";

/// The `log` capability. Always granted.
#[derive(Debug, Clone)]
pub struct LogApi {
    /// Owning plugin id.
    plugin: String,
}

impl LogApi {
    /// Build the capability for `plugin`.
    pub fn new(plugin: &str) -> Self {
        Self {
            plugin: plugin.to_string(),
        }
    }

    /// Owning plugin id.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Log at debug.
    pub fn debug(&self, msg: &str) {
        debug!(target: TARGET, plugin = %self.plugin, "{}", msg);
    }

    /// Log at info.
    pub fn info(&self, msg: &str) {
        info!(target: TARGET, plugin = %self.plugin, "{}", msg);
    }

    /// Log at warn.
    pub fn warn(&self, msg: &str) {
        warn!(target: TARGET, plugin = %self.plugin, "{}", msg);
    }

    /// Log at error.
    pub fn error(&self, msg: &str) {
        error!(target: TARGET, plugin = %self.plugin, "{}", msg);
    }
}
