//! Cueline Error Definitions
//!
//! Defines error types used throughout the crate.

use thiserror::Error;

use crate::state::EditorPhase;
use crate::types::{ClipId, TimeSec};

/// Core controller error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    // =========================================================================
    // State Machine Errors
    // =========================================================================
    #[error("Invalid transition: {from:?} -> {to:?}")]
    InvalidTransition { from: EditorPhase, to: EditorPhase },

    // =========================================================================
    // Media Control Errors
    // =========================================================================
    #[error("Media control failure: {0}")]
    MediaControlFailure(String),

    #[error("Media control circuit is open")]
    CircuitOpen,

    #[error("Sync drift unrecoverable: drift {drift:.3}s at position {position:.3}s")]
    SyncDriftUnrecoverable { drift: TimeSec, position: TimeSec },

    // =========================================================================
    // Edit Errors
    // =========================================================================
    #[error("Edit constraint violation: {0}")]
    EditConstraintViolation(String),

    #[error("Clip not found: {0}")]
    ClipNotFound(ClipId),

    #[error("Clip overlap on track {track_index}: {new_start:.3}~{new_end:.3}s conflicts with clip {existing_clip_id}")]
    ClipOverlap {
        track_index: usize,
        existing_clip_id: ClipId,
        new_start: TimeSec,
        new_end: TimeSec,
    },

    #[error("Invalid time range: {0}~{1} seconds")]
    InvalidTimeRange(TimeSec, TimeSec),

    // =========================================================================
    // Command Errors
    // =========================================================================
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Command superseded by a newer command for the same target")]
    CommandSuperseded,

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Config load failed: {0}")]
    ConfigLoadFailed(String),

    #[error("Config save failed: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core controller result type
pub type EditorResult<T> = Result<T, EditorError>;

impl EditorError {
    /// True for errors that must never abort the session by themselves
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EditorError::CircuitOpen)
    }

    /// Converts to a short, non-technical message suitable for end users
    pub fn to_user_message(&self) -> String {
        match self {
            EditorError::InvalidTransition { .. } => {
                "That action isn't available right now.".to_string()
            }
            EditorError::MediaControlFailure(_)
            | EditorError::CircuitOpen
            | EditorError::SyncDriftUnrecoverable { .. } => {
                "Playback ran into a problem. Your edit is safe.".to_string()
            }
            EditorError::EditConstraintViolation(_)
            | EditorError::ClipOverlap { .. }
            | EditorError::InvalidTimeRange(_, _) => {
                "That edit couldn't be applied.".to_string()
            }
            EditorError::ClipNotFound(_) => "That clip no longer exists.".to_string(),
            _ => "Something went wrong.".to_string(),
        }
    }
}
