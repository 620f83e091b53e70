//! A bounded in-memory record of recent log events.
//!
//! The floatview shell keeps the tail of its own logs so that plugin output
//! can be inspected without a terminal. Install [`LogBuffer::layer`] in the
//! subscriber and read it back with [`LogBuffer::snapshot`].

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::fmt::{RenderedLog, render_event};

/// Default number of retained events.
pub const DEFAULT_CAPACITY: usize = 2048;

/// Shared ring of rendered events.
#[derive(Clone)]
pub struct LogBuffer {
    /// Retained events, oldest first.
    entries: Arc<Mutex<VecDeque<RenderedLog>>>,
    /// Maximum retained events.
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LogBuffer {
    /// Create a buffer holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest when full.
    pub fn push(&self, entry: RenderedLog) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Copy of the retained events, oldest first.
    pub fn snapshot(&self) -> Vec<RenderedLog> {
        self.entries.lock().iter().cloned().collect()
    }

    /// The last `n` events whose target starts with `prefix`.
    pub fn tail(&self, prefix: &str, n: usize) -> Vec<RenderedLog> {
        let entries = self.entries.lock();
        let mut out: Vec<RenderedLog> = entries
            .iter()
            .rev()
            .filter(|e| e.target.starts_with(prefix))
            .take(n)
            .cloned()
            .collect();
        out.reverse();
        out
    }

    /// Drop every retained event.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// A tracing layer feeding this buffer.
    pub fn layer(&self) -> BufferLayer {
        BufferLayer { buf: self.clone() }
    }
}

/// Tracing layer that records events into a [`LogBuffer`].
pub struct BufferLayer {
    /// Destination buffer.
    buf: LogBuffer,
}

impl<S> Layer<S> for BufferLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.buf.push(render_event(event));
    }
}
