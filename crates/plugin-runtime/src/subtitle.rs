//! Subtitle tracks and playback tracking.
//!
//! The host loads a track parsed from the JSON subtitle format
//! (`{"body":[{"from":1.0,"to":2.5,"content":"..."}]}`), then feeds playback
//! time into [`SubtitleTracker::update_time`]. The tracker fires the subtitle
//! events on the shared [`EventManager`].

use std::{fs, path::Path, sync::Arc};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{
    Result,
    events::{EventManager, names},
};

/// One timed subtitle line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    /// Start time in seconds, inclusive.
    pub from: f64,
    /// End time in seconds, exclusive.
    pub to: f64,
    /// Text to display.
    pub content: String,
}

impl SubtitleEntry {
    /// Whether `time` falls within `[from, to)`.
    pub fn contains_time(&self, time: f64) -> bool {
        self.from <= time && time < self.to
    }
}

/// A loaded subtitle track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleData {
    /// Entries ordered by start time.
    #[serde(rename = "body", default)]
    pub entries: Vec<SubtitleEntry>,
    /// Optional language tag.
    #[serde(default, alias = "lang", skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl SubtitleData {
    /// Parse a track from JSON text. Entries are sorted by start time.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut data: Self = serde_json::from_str(text)?;
        data.entries.sort_by(|a, b| a.from.total_cmp(&b.from));
        Ok(data)
    }

    /// Read and parse a track from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// The first entry containing `time`.
    pub fn entry_at(&self, time: f64) -> Option<&SubtitleEntry> {
        self.entries.iter().find(|e| e.contains_time(time))
    }

    /// Index of the first entry containing `time`.
    fn index_at(&self, time: f64) -> Option<usize> {
        self.entries.iter().position(|e| e.contains_time(time))
    }

    /// Whether the track has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tracker state under one lock.
#[derive(Default)]
struct TrackerState {
    /// The loaded track.
    data: Option<SubtitleData>,
    /// Index of the active entry.
    current: Option<usize>,
}

/// Holds the active track and emits subtitle events as playback advances.
pub struct SubtitleTracker {
    /// Bus that receives subtitle events.
    events: Arc<EventManager>,
    /// Track and active entry.
    state: Mutex<TrackerState>,
}

impl SubtitleTracker {
    /// Create an empty tracker emitting on `events`.
    pub fn new(events: Arc<EventManager>) -> Self {
        Self {
            events,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Replace the active track and fire `subtitle.loaded`.
    pub fn load(&self, data: SubtitleData) {
        let payload = json!({
            "count": data.entries.len(),
            "language": data.language,
        });
        {
            let mut state = self.state.lock();
            state.data = Some(data);
            state.current = None;
        }
        info!(count = %payload["count"], "subtitles_loaded");
        self.events.emit(names::SUBTITLE_LOADED, &payload);
    }

    /// Drop the active track. Fires `subtitle.cleared` if one was loaded.
    pub fn clear(&self) -> bool {
        let had = {
            let mut state = self.state.lock();
            state.current = None;
            state.data.take().is_some()
        };
        if had {
            info!("subtitles_cleared");
            self.events.emit(names::SUBTITLE_CLEARED, &Value::Null);
        }
        had
    }

    /// Advance playback to `time`. Fires `subtitle.changed` with the new entry
    /// (or null) only when the active entry changes; returns whether it did.
    pub fn update_time(&self, time: f64) -> bool {
        let changed = {
            let mut state = self.state.lock();
            let Some(data) = state.data.as_ref() else {
                return false;
            };
            let next = data.index_at(time);
            if next == state.current {
                None
            } else {
                let entry = next.and_then(|i| data.entries.get(i)).cloned();
                state.current = next;
                Some(entry)
            }
        };
        let Some(entry) = changed else {
            return false;
        };
        debug!(time, active = entry.is_some(), "subtitle_changed");
        let payload = serde_json::to_value(&entry).unwrap_or(Value::Null);
        self.events.emit(names::SUBTITLE_CHANGED, &payload);
        true
    }

    /// Whether a non-empty track is loaded.
    pub fn has_subtitles(&self) -> bool {
        self.state
            .lock()
            .data
            .as_ref()
            .is_some_and(|d| !d.is_empty())
    }

    /// Copy of every entry in the active track.
    pub fn all(&self) -> Vec<SubtitleEntry> {
        self.state
            .lock()
            .data
            .as_ref()
            .map(|d| d.entries.clone())
            .unwrap_or_default()
    }

    /// The entry containing `time`, if any.
    pub fn at(&self, time: f64) -> Option<SubtitleEntry> {
        self.state.lock().data.as_ref()?.entry_at(time).cloned()
    }

    /// The entry that was active at the last [`SubtitleTracker::update_time`].
    pub fn current(&self) -> Option<SubtitleEntry> {
        let state = self.state.lock();
        let index = state.current?;
        state.data.as_ref()?.entries.get(index).cloned()
    }
}
