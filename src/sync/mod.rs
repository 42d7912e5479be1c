//! Synchronization Monitor
//!
//! Keeps the media position and the timeline cursor in agreement. On every
//! tick while playing it measures drift and picks the cheapest correction
//! that restores agreement: a cosmetic cursor nudge for sub-frame drift, an
//! authoritative media seek past the hard threshold. While a drag is in
//! progress the monitor is suspended; cursor movement instead produces
//! preview seeks that are reverted after frame capture, so the playback
//! position is never permanently altered until the drag releases.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::TimeSec;

// =============================================================================
// Drift Decisions
// =============================================================================

/// Correction chosen for an observed drift
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DriftAction {
    /// Within tolerance; nothing to do
    InSync { drift: TimeSec },
    /// Cosmetic: move the cursor to the media position
    Nudge { cursor_to: TimeSec, drift: TimeSec },
    /// Authoritative: seek the media resource to the cursor position
    CorrectiveSeek { media_to: TimeSec, drift: TimeSec },
}

/// Preview seek issued while dragging: show the frame at `seek_to`, then
/// restore the resource to `revert_to`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreviewSeek {
    pub seek_to: TimeSec,
    pub revert_to: TimeSec,
}

// =============================================================================
// Sync Monitor
// =============================================================================

pub struct SyncMonitor {
    fallback_frame_rate: f64,
    /// Drift at or above this switches from nudge to corrective seek
    hard_drift_sec: TimeSec,
    /// Media position recorded when the current drag began
    pre_drag_position: Option<TimeSec>,
    suspended: bool,
}

impl SyncMonitor {
    pub fn new(fallback_frame_rate: f64, hard_drift_sec: TimeSec) -> Self {
        Self {
            fallback_frame_rate,
            hard_drift_sec,
            pre_drag_position: None,
            suspended: false,
        }
    }

    /// One frame at the effective frame rate
    pub fn tolerance(&self, frame_rate: Option<f64>) -> TimeSec {
        let rate = match frame_rate {
            Some(rate) if rate > 0.0 && rate.is_finite() => rate,
            _ => self.fallback_frame_rate,
        };
        1.0 / rate
    }

    /// Measures drift and picks a correction. Returns `None` while
    /// suspended (a drag owns the cursor).
    pub fn observe(
        &self,
        media_position: TimeSec,
        cursor_position: TimeSec,
        frame_rate: Option<f64>,
    ) -> Option<DriftAction> {
        if self.suspended {
            return None;
        }

        let drift = (media_position - cursor_position).abs();
        let tolerance = self.tolerance(frame_rate);

        let action = if drift <= tolerance {
            DriftAction::InSync { drift }
        } else if drift < self.hard_drift_sec {
            DriftAction::Nudge {
                cursor_to: media_position,
                drift,
            }
        } else {
            DriftAction::CorrectiveSeek {
                media_to: cursor_position,
                drift,
            }
        };

        if !matches!(action, DriftAction::InSync { .. }) {
            debug!(media_position, cursor_position, drift, "drift correction chosen");
        }
        Some(action)
    }

    // =========================================================================
    // Drag Handling
    // =========================================================================

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Suspends monitoring for a drag, remembering the position to revert
    /// preview seeks to.
    pub fn begin_drag(&mut self, media_position: TimeSec) {
        self.pre_drag_position = Some(media_position);
        self.suspended = true;
        debug!(media_position, "sync monitor suspended for drag");
    }

    /// Preview seek for a cursor movement during the drag
    pub fn preview(&self, position: TimeSec) -> Option<PreviewSeek> {
        let revert_to = self.pre_drag_position?;
        Some(PreviewSeek {
            seek_to: position,
            revert_to,
        })
    }

    /// Ends the drag and returns the single permanent seek target
    pub fn end_drag(&mut self, release_position: TimeSec) -> TimeSec {
        self.pre_drag_position = None;
        self.suspended = false;
        debug!(release_position, "sync monitor resumed after drag");
        release_position
    }
}

// =============================================================================
// Tests
// =============================================================================
