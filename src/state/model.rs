//! Editor State Model
//!
//! Defines the canonical `EditorState` aggregate. The aggregate is cloned
//! and replaced wholesale on every accepted transition; handlers never hand
//! out mutable references to a committed state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::timeline::{Clip, SnapIndicator};
use crate::types::{ClipId, TimeSec};

// =============================================================================
// Playback / Cursor
// =============================================================================

/// Playback-side state mirrored from the media resource
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    /// Last confirmed media position (seconds)
    pub position: TimeSec,
    pub is_playing: bool,
    /// Playback rate (1.0 = normal)
    pub rate: f64,
    /// Media duration (seconds)
    pub duration: TimeSec,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            position: 0.0,
            is_playing: false,
            rate: 1.0,
            duration: 0.0,
        }
    }
}

/// Timeline cursor state.
///
/// `preview_position` is non-null exactly while `is_being_dragged` is true.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorState {
    pub position: TimeSec,
    pub is_being_dragged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_position: Option<TimeSec>,
}

// =============================================================================
// Selection / Gap Policy / Errors
// =============================================================================

/// Current clip selection; at most one clip shows edit handles
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub selected: BTreeSet<ClipId>,
    /// The one clip showing edit handles, always a member of `selected`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handles_clip: Option<ClipId>,
}

impl Selection {
    /// Replaces the selection; handles follow only if still selected
    pub fn set(&mut self, clip_ids: impl IntoIterator<Item = ClipId>) {
        self.selected = clip_ids.into_iter().collect();
        if let Some(handles) = &self.handles_clip {
            if !self.selected.contains(handles) {
                self.handles_clip = None;
            }
        }
    }

    /// Shows edit handles on one selected clip
    pub fn show_handles(&mut self, clip_id: &str) -> bool {
        if self.selected.contains(clip_id) {
            self.handles_clip = Some(clip_id.to_string());
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.handles_clip = None;
    }

    /// Drops ids that no longer reference a live clip
    pub fn prune(&mut self, live: &[Clip]) {
        self.selected.retain(|id| live.iter().any(|c| &c.id == id));
        if let Some(handles) = &self.handles_clip {
            if !self.selected.contains(handles) {
                self.handles_clip = None;
            }
        }
    }
}

/// Gap behavior when a moved clip is released near a neighbor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GapPolicy {
    /// Close the gap and ripple later clips left
    #[default]
    Magnetic,
    /// Show the snap indicator, move nothing
    Guidance,
    /// No snap detection at all
    Off,
}

/// A failure recorded on the aggregate for subscribers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedError {
    /// Technical message (for logs and debugging UIs)
    pub message: String,
    /// Non-technical message suitable for end users
    pub user_message: String,
    /// RFC 3339 timestamp
    pub at: String,
}

impl RecordedError {
    pub fn new(message: &str, user_message: &str) -> Self {
        Self {
            message: message.to_string(),
            user_message: user_message.to_string(),
            at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// =============================================================================
// Editor State
// =============================================================================

/// The single canonical state aggregate
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorState {
    pub playback: PlaybackState,
    pub cursor: CursorState,
    /// Ordered segment list (track, then start time)
    pub segments: Vec<Clip>,
    pub selection: Selection,
    pub gap_policy: GapPolicy,
    /// Snap zone hit from the most recent move/release, for UI indication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snap_indicator: Option<SnapIndicator>,
    /// Last recorded failure (or none)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<RecordedError>,
}

impl EditorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Immutable snapshot for subscribers
    pub fn snapshot(&self) -> EditorState {
        self.clone()
    }

    /// Looks up a clip by id
    pub fn clip(&self, clip_id: &str) -> Option<&Clip> {
        self.segments.iter().find(|c| c.id == clip_id)
    }

    /// Total timeline extent (end of the last clip)
    pub fn timeline_duration(&self) -> TimeSec {
        self.segments
            .iter()
            .map(|c| c.end_time())
            .fold(0.0, f64::max)
    }

    /// Records a failure on the aggregate
    pub fn record_error(&mut self, message: &str, user_message: &str) {
        self.last_error = Some(RecordedError::new(message, user_message));
    }
}
