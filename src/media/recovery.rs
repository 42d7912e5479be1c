//! Media Error Recovery
//!
//! Bounded recovery around media control. A failed operation is retried
//! through an ordered ladder of progressively more invasive strategies with
//! a hard attempt cap. Exhausting the cap opens the circuit breaker,
//! reconstructs a consistent playback snapshot from whatever the resource
//! still reports, and produces a single user-facing notice. The in-memory
//! edit is never touched from here.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::media::{MediaController, MediaResource, MediaResult};
use crate::types::TimeSec;

// =============================================================================
// Recovery Model
// =============================================================================

/// Retried media operation
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MediaOp {
    Play,
    Pause,
    Seek(TimeSec),
}

impl MediaOp {
    fn describe(&self) -> String {
        match self {
            MediaOp::Play => "play".to_string(),
            MediaOp::Pause => "pause".to_string(),
            MediaOp::Seek(target) => format!("seek to {target:.3}s"),
        }
    }
}

/// Ladder rungs, least to most invasive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoveryStrategy {
    /// Retry the operation as-is
    ReissueCommand,
    /// Drop and re-open the resource handle, then retry
    ReacquireHandle,
    /// Abandon the operation; rebuild playback state from authoritative reads
    RebuildPlayback,
    /// Abandon the operation; reset playback to a safe baseline
    FullReset,
}

/// Non-technical, user-facing failure notice
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNotice {
    pub message: String,
    /// RFC 3339 timestamp
    pub at: String,
}

impl UserNotice {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Authoritative playback readings taken during reconstruction
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackReadings {
    pub position: TimeSec,
    pub duration: TimeSec,
}

/// Result of driving an operation through the ladder
#[derive(Clone, Debug, PartialEq)]
pub enum RecoveryOutcome {
    /// Operation succeeded without recovery
    Clean,
    /// Operation succeeded after recovery
    Recovered {
        attempts: u32,
        rung: RecoveryStrategy,
    },
    /// Attempt cap exceeded; editor must enter the Error phase.
    /// `readings` carries the reconstructed playback state when the
    /// resource could still be read (RebuildPlayback), otherwise the
    /// FullReset baseline applies.
    Exhausted {
        attempts: u32,
        notice: UserNotice,
        readings: Option<PlaybackReadings>,
    },
}

// =============================================================================
// Circuit Breaker
// =============================================================================

/// Trips open when recovery is exhausted; while open, media control calls
/// are short-circuited instead of hammering a dead resource.
#[derive(Clone, Debug, Default)]
pub struct CircuitBreaker {
    open: bool,
}

impl CircuitBreaker {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn trip(&mut self) {
        if !self.open {
            warn!("media control circuit opened");
            self.open = true;
        }
    }

    pub fn reset(&mut self) {
        if self.open {
            info!("media control circuit closed");
            self.open = false;
        }
    }
}

// =============================================================================
// Recovery Ladder
// =============================================================================

/// Ordered, bounded recovery driver
#[derive(Clone, Debug)]
pub struct RecoveryLadder {
    /// Hard cap on operation attempts, the initial one included
    max_attempts: u32,
    breaker: CircuitBreaker,
}

impl RecoveryLadder {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            breaker: CircuitBreaker::default(),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Closes the breaker after the editor leaves the Error phase
    pub fn reset_breaker(&mut self) {
        self.breaker.reset();
    }

    /// Drives one operation through the ladder.
    pub fn run<M: MediaResource>(
        &mut self,
        controller: &mut MediaController<M>,
        op: MediaOp,
    ) -> RecoveryOutcome {
        let mut attempts: u32 = 1;
        match Self::attempt(controller, op) {
            Ok(()) => return RecoveryOutcome::Clean,
            Err(e) => warn!(op = %op.describe(), attempts, "media operation failed: {}", e),
        }

        for rung in [
            RecoveryStrategy::ReissueCommand,
            RecoveryStrategy::ReacquireHandle,
        ] {
            if attempts >= self.max_attempts {
                break;
            }
            attempts += 1;

            if rung == RecoveryStrategy::ReacquireHandle {
                if let Err(e) = controller.reacquire() {
                    warn!("handle reacquire failed: {}", e);
                    continue;
                }
            }

            match Self::attempt(controller, op) {
                Ok(()) => {
                    info!(op = %op.describe(), attempts, ?rung, "media operation recovered");
                    return RecoveryOutcome::Recovered { attempts, rung };
                }
                Err(e) => {
                    warn!(op = %op.describe(), attempts, ?rung, "recovery attempt failed: {}", e)
                }
            }
        }

        // Attempt cap reached. Escalate to reconstruction: the operation is
        // abandoned; the goal now is a consistent playback snapshot.
        error!(
            op = %op.describe(),
            attempts, "media recovery exhausted, reconstructing playback state"
        );
        self.breaker.trip();

        let readings = Self::rebuild_playback(controller);
        if readings.is_none() {
            // Full reset baseline: best-effort pause, position zeroed by the
            // caller. Segments and selection stay untouched by contract.
            let _ = controller.pause();
        }

        RecoveryOutcome::Exhausted {
            attempts,
            notice: UserNotice::new("Playback ran into a problem. Your edit is safe."),
            readings,
        }
    }

    fn attempt<M: MediaResource>(
        controller: &mut MediaController<M>,
        op: MediaOp,
    ) -> MediaResult<()> {
        match op {
            MediaOp::Play => controller.play(),
            MediaOp::Pause => controller.pause(),
            MediaOp::Seek(target) => controller.seek_verified(target).map(|_| ()),
        }
    }

    fn rebuild_playback<M: MediaResource>(
        controller: &mut MediaController<M>,
    ) -> Option<PlaybackReadings> {
        let position = controller.position().ok()?;
        let duration = controller.duration().ok()?;
        info!(position, duration, "playback state rebuilt from resource");
        Some(PlaybackReadings { position, duration })
    }
}

// =============================================================================
// Tests
// =============================================================================
