//! Subtitle API: read the active track and follow playback.

use std::sync::Arc;

use super::Listeners;
use crate::{
    callback::CallbackRef,
    events::names,
    subtitle::{SubtitleEntry, SubtitleTracker},
};

/// The `subtitle` capability.
pub struct SubtitleApi {
    /// Shared tracker.
    tracker: Arc<SubtitleTracker>,
    /// This plugin's subscriptions.
    listeners: Arc<Listeners>,
}

impl SubtitleApi {
    /// Build the capability over `tracker`.
    pub fn new(tracker: Arc<SubtitleTracker>, listeners: Arc<Listeners>) -> Self {
        Self { tracker, listeners }
    }

    /// Whether a non-empty track is loaded.
    pub fn has_subtitles(&self) -> bool {
        self.tracker.has_subtitles()
    }

    /// Every entry of the active track.
    pub fn all(&self) -> Vec<SubtitleEntry> {
        self.tracker.all()
    }

    /// The entry containing `time`.
    pub fn at(&self, time: f64) -> Option<SubtitleEntry> {
        self.tracker.at(time)
    }

    /// The entry active at the last playback update.
    pub fn current(&self) -> Option<SubtitleEntry> {
        self.tracker.current()
    }

    /// Subscribe to `subtitle.loaded`.
    pub fn on_loaded(&self, callback: Option<CallbackRef>) -> i64 {
        self.listeners.on(names::SUBTITLE_LOADED, callback)
    }

    /// Subscribe to `subtitle.changed`.
    pub fn on_changed(&self, callback: Option<CallbackRef>) -> i64 {
        self.listeners.on(names::SUBTITLE_CHANGED, callback)
    }

    /// Subscribe to `subtitle.cleared`.
    pub fn on_cleared(&self, callback: Option<CallbackRef>) -> i64 {
        self.listeners.on(names::SUBTITLE_CLEARED, callback)
    }

    /// Remove a subscription made through this plugin.
    pub fn off(&self, id: i64) -> bool {
        self.listeners.off(id)
    }
}
