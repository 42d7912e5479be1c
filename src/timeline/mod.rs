//! Timeline Model Definitions
//!
//! Defines the clip model and ordering/overlap helpers for the segment list.
//! Clips reference source material non-destructively: trimming only moves
//! the in/out bookkeeping, never the source itself.

mod engine;

pub use engine::*;

use serde::{Deserialize, Serialize};

use crate::types::{ClipId, SourceRef, TimeSec, TIME_EPSILON};

// =============================================================================
// Clip
// =============================================================================

/// Media segment on the timeline.
///
/// Invariant: `trim_start + trim_end + duration == source_duration`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: ClipId,
    /// Track the clip sits on (0 = topmost)
    pub track_index: usize,
    /// Start position on the timeline (seconds)
    pub start_time: TimeSec,
    /// Effective duration on the timeline (seconds)
    pub duration: TimeSec,
    /// Full duration of the referenced source (seconds), never altered
    pub source_duration: TimeSec,
    /// Source material hidden before the clip's in point (seconds)
    pub trim_start: TimeSec,
    /// Source material hidden after the clip's out point (seconds)
    pub trim_end: TimeSec,
    /// Opaque reference to the source asset, never altered
    pub source_ref: SourceRef,
}

impl Clip {
    /// Creates an untrimmed clip covering its whole source
    pub fn new(source_ref: &str, source_duration: TimeSec) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            track_index: 0,
            start_time: 0.0,
            duration: source_duration,
            source_duration,
            trim_start: 0.0,
            trim_end: 0.0,
            source_ref: source_ref.to_string(),
        }
    }

    /// Places the clip on a track
    pub fn on_track(mut self, track_index: usize) -> Self {
        self.track_index = track_index;
        self
    }

    /// Places the clip at a timeline position
    pub fn at(mut self, start_time: TimeSec) -> Self {
        self.start_time = start_time;
        self
    }

    /// Returns the end position on the timeline
    pub fn end_time(&self) -> TimeSec {
        self.start_time + self.duration
    }

    /// Checks if this clip overlaps another placement on the same track
    pub fn overlaps(&self, other: &Clip) -> bool {
        self.track_index == other.track_index
            && self.start_time < other.end_time() - TIME_EPSILON
            && self.end_time() > other.start_time + TIME_EPSILON
    }

    /// Checks if a timeline position falls inside this clip
    pub fn contains_time(&self, time: TimeSec) -> bool {
        time >= self.start_time && time <= self.end_time()
    }

    /// Source material still available for extending the in point
    pub fn head_room(&self) -> TimeSec {
        self.trim_start
    }

    /// Source material still available for extending the out point
    pub fn tail_room(&self) -> TimeSec {
        self.trim_end
    }

    /// True when the non-destructive bookkeeping adds up
    pub fn trim_sum_holds(&self) -> bool {
        (self.trim_start + self.trim_end + self.duration - self.source_duration).abs()
            <= TIME_EPSILON.max(self.source_duration * 1e-12)
    }
}

// =============================================================================
// Segment List Helpers
// =============================================================================

/// Sorts segments by track, then start time, then id for determinism
pub fn sort_segments(segments: &mut [Clip]) {
    segments.sort_by(|a, b| {
        a.track_index
            .cmp(&b.track_index)
            .then_with(|| a.start_time.total_cmp(&b.start_time))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Finds a clip by id
pub fn find_clip<'a>(segments: &'a [Clip], clip_id: &str) -> Option<&'a Clip> {
    segments.iter().find(|c| c.id == clip_id)
}

/// Finds a clip by id, mutable
pub fn find_clip_mut<'a>(segments: &'a mut [Clip], clip_id: &str) -> Option<&'a mut Clip> {
    segments.iter_mut().find(|c| c.id == clip_id)
}

/// Finds the first clip overlapping `candidate` on its track, ignoring `ignore_id`
pub fn find_overlap<'a>(
    segments: &'a [Clip],
    candidate: &Clip,
    ignore_id: Option<&str>,
) -> Option<&'a Clip> {
    segments.iter().find(|existing| {
        if ignore_id.is_some_and(|id| id == existing.id) {
            return false;
        }
        existing.overlaps(candidate)
    })
}
