//! Render `tracing` events into concise logfmt strings.

use std::fmt::{Debug, Write};

use tracing::{
    Event,
    field::{Field, Visit},
};

/// Level, target and text of a tracing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLog {
    /// Severity level (e.g., INFO, WARN).
    pub level: String,
    /// Event target, usually the module path.
    pub target: String,
    /// The `message` field followed by the remaining fields as `key=value`.
    pub message: String,
}

/// Collects the message and the other fields of an event.
#[derive(Default)]
struct MsgVisitor {
    /// Captured `message` field, if present.
    msg: Option<String>,
    /// Accumulated non-message fields rendered as `key=value`.
    fields: String,
}

impl Visit for MsgVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.msg = Some(value.to_string());
        } else {
            let _ignored = write!(&mut self.fields, " {}=\"{}\"", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.msg = Some(format!("{:?}", value));
        } else {
            let _ignored = write!(&mut self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// Render `event` as a [`RenderedLog`].
///
/// Structured events like `info!(plugin = "x", "plugin_loaded")` render as
/// `plugin_loaded plugin="x"`. Events without a message render their fields only.
pub fn render_event(event: &Event<'_>) -> RenderedLog {
    let meta = event.metadata();
    let mut vis = MsgVisitor::default();
    event.record(&mut vis);
    let message = match vis.msg {
        Some(msg) => format!("{}{}", msg, vis.fields),
        None => vis.fields.trim_start().to_string(),
    };
    RenderedLog {
        level: meta.level().to_string(),
        target: meta.target().to_string(),
        message,
    }
}
