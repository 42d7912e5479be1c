//! Media Resource Interface
//!
//! The consumed interface to the single playable media resource. The core
//! never owns decoding or rendering; it drives the resource through this
//! trait and treats every call as fallible.

mod controller;
mod recovery;

pub use controller::*;
pub use recovery::*;

use thiserror::Error;

use crate::types::TimeSec;

// =============================================================================
// Media Errors
// =============================================================================

/// Failures surfaced by the underlying media resource
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    #[error("Media resource unavailable: {0}")]
    Unavailable(String),

    #[error("Seek target {target:.3}s outside media bounds (duration {duration:.3}s)")]
    SeekOutOfBounds { target: TimeSec, duration: TimeSec },

    #[error("Media backend error: {0}")]
    Backend(String),
}

/// Media resource result type
pub type MediaResult<T> = Result<T, MediaError>;

// =============================================================================
// Media Resource Trait
// =============================================================================

/// A single playable media resource (e.g. a platform media element).
///
/// Exclusively owned by the `MediaController`; no other component may read
/// or write its position or play state directly.
pub trait MediaResource {
    fn play(&mut self) -> MediaResult<()>;

    fn pause(&mut self) -> MediaResult<()>;

    fn seek(&mut self, position: TimeSec) -> MediaResult<()>;

    fn position(&self) -> MediaResult<TimeSec>;

    fn duration(&self) -> MediaResult<TimeSec>;

    /// Effective frame rate, when the resource can report one
    fn frame_rate(&self) -> MediaResult<Option<f64>>;

    /// Drops and re-opens the underlying handle (recovery ladder step)
    fn reacquire(&mut self) -> MediaResult<()>;
}

// =============================================================================
// Test Support
// =============================================================================
