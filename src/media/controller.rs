//! Media Controller
//!
//! Thin wrapper around the single media resource. All playback control goes
//! through here, which is what makes the resource's position the
//! authoritative source of truth: every operation is verified after it
//! completes, and a self-update guard marks operations the controller
//! itself triggered so completion callbacks can tell them apart from
//! independent user events.

use tracing::{debug, warn};

use crate::media::{MediaError, MediaResource, MediaResult};
use crate::types::TimeSec;

/// Exclusive owner of the media resource handle
pub struct MediaController<M: MediaResource> {
    resource: M,
    /// Position tolerance for post-seek verification (seconds)
    verify_tolerance: TimeSec,
    /// Set while a controller-triggered operation is in flight, so a
    /// completion callback can be recognized as self-inflicted
    self_update: bool,
}

impl<M: MediaResource> MediaController<M> {
    pub fn new(resource: M, verify_tolerance: TimeSec) -> Self {
        Self {
            resource,
            verify_tolerance,
            self_update: false,
        }
    }

    /// Consumes the controller and returns the resource handle
    pub fn into_resource(self) -> M {
        self.resource
    }

    /// Direct resource access for tests only; production code goes through
    /// the control operations.
    #[cfg(test)]
    pub(crate) fn resource_mut(&mut self) -> &mut M {
        &mut self.resource
    }

    // =========================================================================
    // Self-Update Guard
    // =========================================================================

    /// True when the most recent media operation was controller-triggered.
    /// Callbacks should consume the flag via `take_self_update`.
    pub fn is_self_update(&self) -> bool {
        self.self_update
    }

    /// Consumes and returns the self-update flag
    pub fn take_self_update(&mut self) -> bool {
        std::mem::take(&mut self.self_update)
    }

    // =========================================================================
    // Control Operations
    // =========================================================================

    pub fn play(&mut self) -> MediaResult<()> {
        self.self_update = true;
        self.resource.play()
    }

    pub fn pause(&mut self) -> MediaResult<()> {
        self.self_update = true;
        self.resource.pause()
    }

    /// Seeks and verifies the landing position.
    ///
    /// Fallback order: re-issue the exact seek once, then retry with the
    /// target clamped into media bounds. A landing still outside tolerance
    /// after that is reported as a backend error.
    pub fn seek_verified(&mut self, target: TimeSec) -> MediaResult<TimeSec> {
        self.self_update = true;

        match self.resource.seek(target) {
            Ok(()) => {
                if let Some(landed) = self.landing_ok(target)? {
                    return Ok(landed);
                }
                warn!(target, "seek landed outside tolerance, re-issuing");
                self.resource.seek(target)?;
                if let Some(landed) = self.landing_ok(target)? {
                    return Ok(landed);
                }
            }
            // A rejected target may still be served by clamping into bounds.
            Err(MediaError::SeekOutOfBounds { .. }) => {}
            Err(e) => return Err(e),
        }

        let duration = self.resource.duration()?;
        let clamped = target.clamp(0.0, duration);
        if clamped != target {
            warn!(target, clamped, "seek target outside media bounds, clamping");
            self.resource.seek(clamped)?;
            if let Some(landed) = self.landing_ok(clamped)? {
                return Ok(landed);
            }
        }

        let landed = self.resource.position()?;
        Err(MediaError::Backend(format!(
            "seek verification failed: requested {target:.3}s, landed {landed:.3}s"
        )))
    }

    fn landing_ok(&self, target: TimeSec) -> MediaResult<Option<TimeSec>> {
        let landed = self.resource.position()?;
        if (landed - target).abs() <= self.verify_tolerance {
            debug!(target, landed, "seek verified");
            Ok(Some(landed))
        } else {
            Ok(None)
        }
    }

    /// Re-opens the underlying handle (recovery ladder step)
    pub fn reacquire(&mut self) -> MediaResult<()> {
        self.self_update = true;
        self.resource.reacquire()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn position(&self) -> MediaResult<TimeSec> {
        self.resource.position()
    }

    pub fn duration(&self) -> MediaResult<TimeSec> {
        self.resource.duration()
    }

    /// Effective frame rate, falling back when the resource can't report one
    pub fn effective_frame_rate(&self, fallback: f64) -> f64 {
        match self.resource.frame_rate() {
            Ok(Some(rate)) if rate > 0.0 => rate,
            Ok(_) => fallback,
            Err(e) => {
                warn!("frame rate query failed: {}, using fallback", e);
                fallback
            }
        }
    }
}
