//! Editor Phase Machine
//!
//! Holds the current editor phase and validates every requested transition
//! against an explicit, total transition table. Requests outside the table
//! are rejected with `InvalidTransition` and leave the phase untouched.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EditorError, EditorResult};

// =============================================================================
// Phases
// =============================================================================

/// Editor phases
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditorPhase {
    #[default]
    Idle,
    Playing,
    Paused,
    Dragging,
    /// Transient: a seek is in flight; resolves to the phase recorded
    /// before the seek began
    Seeking,
    /// Transient: an authoritative drift correction is in flight
    Syncing,
    Trimming,
    MagneticSnapping,
    Error,
}

impl EditorPhase {
    /// Phases reachable from `self`. The table is the single source of
    /// truth for transition validity.
    ///
    /// `Playing -> Dragging` is deliberately absent: a drag may only start
    /// from `Paused`.
    pub fn successors(self) -> &'static [EditorPhase] {
        use EditorPhase::*;
        match self {
            Idle => &[Playing, Paused, Seeking, Trimming, Error],
            Playing => &[Paused, Seeking, Syncing, Idle, Error],
            Paused => &[Playing, Dragging, Seeking, Trimming, MagneticSnapping, Idle, Error],
            Dragging => &[Paused, Seeking, Error],
            Seeking => &[Playing, Paused, Error],
            Syncing => &[Playing, Paused, Error],
            Trimming => &[Paused, Idle, Error],
            MagneticSnapping => &[Paused, Error],
            Error => &[Idle, Paused],
        }
    }

    /// Checks a single edge against the table
    pub fn can_transition_to(self, to: EditorPhase) -> bool {
        self == to || self.successors().contains(&to)
    }
}

// =============================================================================
// Phase Machine
// =============================================================================

/// Validated phase holder with resume bookkeeping for transient phases
#[derive(Clone, Debug, Default)]
pub struct PhaseMachine {
    phase: EditorPhase,
    /// Phase to resolve to when a transient phase (Seeking/Syncing) confirms
    resume_phase: Option<EditorPhase>,
    /// Whether playback was running before the current drag began
    was_playing_before_drag: bool,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> EditorPhase {
        self.phase
    }

    /// Requests a transition; rejects edges outside the table.
    pub fn request(&mut self, to: EditorPhase) -> EditorResult<EditorPhase> {
        if !self.phase.can_transition_to(to) {
            return Err(EditorError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        let from = self.phase;
        self.phase = to;
        if from != to {
            debug!(?from, ?to, "phase transition");
        }
        Ok(to)
    }

    /// Enters a transient phase, remembering where to resolve back to.
    pub fn begin_transient(&mut self, transient: EditorPhase) -> EditorResult<()> {
        let resume = match self.phase {
            EditorPhase::Playing | EditorPhase::Paused | EditorPhase::Idle => {
                // Idle resolves to Paused: a confirmed seek leaves the
                // editor positioned, not playing.
                if self.phase == EditorPhase::Playing {
                    EditorPhase::Playing
                } else {
                    EditorPhase::Paused
                }
            }
            EditorPhase::Dragging => {
                if self.was_playing_before_drag {
                    EditorPhase::Playing
                } else {
                    EditorPhase::Paused
                }
            }
            _ => EditorPhase::Paused,
        };
        self.request(transient)?;
        self.resume_phase = Some(resume);
        Ok(())
    }

    /// Resolves a transient phase back to its recorded predecessor.
    pub fn resolve_transient(&mut self) -> EditorResult<EditorPhase> {
        let resume = self.resume_phase.take().unwrap_or(EditorPhase::Paused);
        self.request(resume)
    }

    /// Marks the start of a drag; must be called from `Paused`.
    pub fn begin_drag(&mut self, was_playing: bool) -> EditorResult<()> {
        self.request(EditorPhase::Dragging)?;
        self.was_playing_before_drag = was_playing;
        Ok(())
    }

    /// Phase the editor should resume after the current drag releases
    pub fn drag_resume_phase(&self) -> EditorPhase {
        if self.was_playing_before_drag {
            EditorPhase::Playing
        } else {
            EditorPhase::Paused
        }
    }

    /// Forces the Error phase. Entering Error is always permitted except
    /// from Error itself, which is a no-op.
    pub fn fail(&mut self) {
        if self.phase != EditorPhase::Error {
            debug!(from = ?self.phase, "phase forced to Error");
            self.phase = EditorPhase::Error;
            self.resume_phase = None;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
