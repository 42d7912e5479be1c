//! Cueline Control Core
//!
//! The authoritative controller for an interactive media-timeline editor.
//! One `Editor` instance owns all playback/timeline/edit state, arbitrates
//! incoming commands by urgency lane, and keeps the media position and the
//! timeline cursor in agreement to within a fraction of a frame.
//!
//! Everything outside this core (rendering, asset catalogs, persistence,
//! the media element itself) is an external collaborator reached through
//! the interfaces in [`media`] and [`events`].
//!
//! There is no global instance: construct an [`Editor`] with the media
//! resource it should own and drive it with [`Editor::submit`] and
//! [`Editor::tick`].

pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod media;
pub mod state;
pub mod sync;
pub mod timeline;

mod types;
pub use types::*;

#[cfg(test)]
mod tests_scenarios;

use tracing::{debug, info, warn};

use crate::commands::{Command, CommandKind, CommandScheduler, CommandSink};
use crate::config::EditorConfig;
use crate::error::{EditorError, EditorResult};
use crate::events::{NoticeCallback, SnapshotCallback, SubscriberHub, Subscription};
use crate::media::{
    MediaController, MediaOp, MediaResource, PlaybackReadings, RecoveryLadder, RecoveryOutcome,
    UserNotice,
};
use crate::state::{EditorPhase, EditorState, GapPolicy, PhaseMachine};
use crate::sync::{DriftAction, SyncMonitor};
use crate::timeline::ClipEditEngine;

// =============================================================================
// Media Events
// =============================================================================

/// Completion callbacks from the underlying media resource.
///
/// Controller-triggered operations set a self-update guard; their callbacks
/// are recognized and dropped here so a state-triggered media operation can
/// never re-enter the scheduler disguised as a user event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MediaEvent {
    /// The resource finished a seek it performed on its own
    SeekCompleted { position: TimeSec },
    /// The resource reached the end of the media
    PlaybackEnded,
}

// =============================================================================
// Editor Core (command sink)
// =============================================================================

/// Everything the scheduler dispatches into: the canonical state, the phase
/// machine, and the components that effect commands.
struct EditorCore<M: MediaResource> {
    config: EditorConfig,
    state: EditorState,
    machine: PhaseMachine,
    engine: ClipEditEngine,
    controller: MediaController<M>,
    monitor: SyncMonitor,
    ladder: RecoveryLadder,
    hub: SubscriberHub,
    /// Containment data stashed when the recovery ladder exhausts inside a
    /// handler; consumed after rollback so the Error entry survives it
    exhaustion: Option<(UserNotice, Option<PlaybackReadings>)>,
}

impl<M: MediaResource> CommandSink for EditorCore<M> {
    /// Applies one command atomically.
    ///
    /// The canonical aggregate is cloned first and the handler works toward
    /// a replacement; on failure the clone is restored, so a rejected or
    /// half-failed command leaves only error bookkeeping behind.
    fn apply(&mut self, command: &Command) -> EditorResult<()> {
        let state_before = self.state.clone();
        let machine_before = self.machine.clone();

        match self.dispatch(&command.kind) {
            Ok(()) => {
                self.hub.mark_dirty();
                Ok(())
            }
            Err(e) => {
                self.state = state_before;
                self.machine = machine_before;
                self.apply_exhaustion_containment();
                self.state.record_error(&e.to_string(), &e.to_user_message());
                self.hub.mark_dirty();
                Err(e)
            }
        }
    }
}

impl<M: MediaResource> EditorCore<M> {
    // =========================================================================
    // Dispatch
    // =========================================================================

    fn dispatch(&mut self, kind: &CommandKind) -> EditorResult<()> {
        match kind {
            CommandKind::Play => self.handle_play(),
            CommandKind::Pause => self.handle_pause(),
            CommandKind::SeekTo { position } => self.handle_seek_to(*position),
            CommandKind::SetRate { rate } => self.handle_set_rate(*rate),
            CommandKind::BeginDrag { position } => self.handle_begin_drag(*position),
            CommandKind::DragTo { position } => self.handle_drag_to(*position),
            CommandKind::EndDrag { position } => self.handle_end_drag(*position),
            CommandKind::AddClip {
                track_index,
                start_time,
                source_ref,
                source_duration,
            } => self
                .engine
                .add_clip(
                    &mut self.state.segments,
                    *track_index,
                    *start_time,
                    source_ref,
                    *source_duration,
                )
                .map(|_| ()),
            CommandKind::TrimClip {
                clip_id,
                edge,
                delta,
            } => self.handle_trim(clip_id, *edge, *delta),
            CommandKind::SplitClip { clip_id, at_time } => self
                .engine
                .split_clip(&mut self.state.segments, clip_id, *at_time)
                .map(|_| ()),
            CommandKind::MoveClip {
                clip_id,
                new_start_time,
                new_track_index,
            } => self.handle_move(clip_id, *new_start_time, *new_track_index),
            CommandKind::ReleaseClip { clip_id } => self.handle_release(clip_id),
            CommandKind::DeleteClips { clip_ids } => self.handle_delete(clip_ids),
            CommandKind::SelectClips { clip_ids } => self.handle_select(clip_ids),
            CommandKind::ClearSelection => {
                self.state.selection.clear();
                Ok(())
            }
            CommandKind::ShowHandles { clip_id } => {
                if self.state.selection.show_handles(clip_id) {
                    Ok(())
                } else {
                    Err(EditorError::InvalidCommand(format!(
                        "clip {clip_id} is not selected"
                    )))
                }
            }
            CommandKind::SetGapPolicy { policy } => {
                self.state.gap_policy = *policy;
                if *policy == GapPolicy::Off {
                    self.state.snap_indicator = None;
                }
                Ok(())
            }
            CommandKind::ResetError => self.handle_reset_error(),
            CommandKind::Shutdown => self.handle_shutdown(),
            CommandKind::AuditTimeline => self.handle_audit(),
        }
    }

    // =========================================================================
    // Playback Handlers
    // =========================================================================

    fn handle_play(&mut self) -> EditorResult<()> {
        self.machine.request(EditorPhase::Playing)?;
        self.control_media(MediaOp::Play)?;
        self.state.playback.is_playing = true;
        Ok(())
    }

    fn handle_pause(&mut self) -> EditorResult<()> {
        if self.machine.phase() == EditorPhase::Dragging {
            // The drag owns playback until it releases.
            return Err(EditorError::InvalidCommand(
                "cannot pause during a drag".to_string(),
            ));
        }
        self.machine.request(EditorPhase::Paused)?;
        self.control_media(MediaOp::Pause)?;
        self.state.playback.is_playing = false;
        if let Ok(position) = self.controller.position() {
            self.state.playback.position = position;
        }
        Ok(())
    }

    fn handle_seek_to(&mut self, position: TimeSec) -> EditorResult<()> {
        if !is_valid_time_sec(position) {
            return Err(EditorError::ValidationError(
                "seek position must be finite and non-negative".to_string(),
            ));
        }
        if self.machine.phase() == EditorPhase::Dragging {
            // The drag owns the cursor; DragTo is the right command.
            return Err(EditorError::InvalidCommand(
                "cannot seek during a drag".to_string(),
            ));
        }

        self.machine.begin_transient(EditorPhase::Seeking)?;
        self.control_media(MediaOp::Seek(position))?;

        let landed = self.controller.position().unwrap_or(position);
        self.state.playback.position = landed;
        self.state.cursor.position = landed;
        let resumed = self.machine.resolve_transient()?;
        self.state.playback.is_playing = resumed == EditorPhase::Playing;
        Ok(())
    }

    fn handle_set_rate(&mut self, rate: f64) -> EditorResult<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(EditorError::ValidationError(
                "playback rate must be finite and positive".to_string(),
            ));
        }
        self.state.playback.rate = rate;
        Ok(())
    }

    // =========================================================================
    // Drag Handlers
    // =========================================================================

    fn handle_begin_drag(&mut self, position: TimeSec) -> EditorResult<()> {
        if !is_valid_time_sec(position) {
            return Err(EditorError::ValidationError(
                "drag position must be finite and non-negative".to_string(),
            ));
        }

        let was_playing = self.machine.phase() == EditorPhase::Playing;
        if was_playing {
            // The only legal path into a drag from playback: pause first.
            self.machine.request(EditorPhase::Paused)?;
            self.control_media(MediaOp::Pause)?;
            self.state.playback.is_playing = false;
        } else if self.machine.phase() == EditorPhase::Idle {
            self.machine.request(EditorPhase::Paused)?;
        }

        self.machine.begin_drag(was_playing)?;

        let media_position = self
            .controller
            .position()
            .unwrap_or(self.state.playback.position);
        self.monitor.begin_drag(media_position);

        self.state.cursor.is_being_dragged = true;
        self.state.cursor.preview_position = Some(position);
        self.preview_frame(position)?;
        Ok(())
    }

    fn handle_drag_to(&mut self, position: TimeSec) -> EditorResult<()> {
        if !is_valid_time_sec(position) {
            return Err(EditorError::ValidationError(
                "drag position must be finite and non-negative".to_string(),
            ));
        }
        if self.machine.phase() != EditorPhase::Dragging {
            return Err(EditorError::InvalidCommand(
                "no drag in progress".to_string(),
            ));
        }
        self.state.cursor.preview_position = Some(position);
        self.preview_frame(position)?;
        Ok(())
    }

    fn handle_end_drag(&mut self, position: TimeSec) -> EditorResult<()> {
        if !is_valid_time_sec(position) {
            return Err(EditorError::ValidationError(
                "drag position must be finite and non-negative".to_string(),
            ));
        }
        if self.machine.phase() != EditorPhase::Dragging {
            return Err(EditorError::InvalidCommand(
                "no drag in progress".to_string(),
            ));
        }

        let target = self.monitor.end_drag(position);

        // Exactly one permanent seek for the whole drag.
        self.machine.begin_transient(EditorPhase::Seeking)?;
        self.control_media(MediaOp::Seek(target))?;

        self.state.cursor.position = target;
        self.state.cursor.is_being_dragged = false;
        self.state.cursor.preview_position = None;
        self.state.playback.position = self.controller.position().unwrap_or(target);

        let resumed = self.machine.resolve_transient()?;
        if resumed == EditorPhase::Playing {
            self.control_media(MediaOp::Play)?;
            self.state.playback.is_playing = true;
        }
        Ok(())
    }

    /// Preview seek during a drag: show the frame, then put the resource
    /// back where playback left it.
    fn preview_frame(&mut self, position: TimeSec) -> EditorResult<()> {
        let Some(preview) = self.monitor.preview(position) else {
            return Ok(());
        };
        self.control_media(MediaOp::Seek(preview.seek_to))?;
        self.control_media(MediaOp::Seek(preview.revert_to))?;
        Ok(())
    }

    // =========================================================================
    // Edit Handlers
    // =========================================================================

    fn handle_trim(
        &mut self,
        clip_id: &str,
        edge: crate::timeline::TrimEdge,
        delta: TimeSec,
    ) -> EditorResult<()> {
        let prior = self.machine.phase();
        self.machine.request(EditorPhase::Trimming)?;

        let result = self
            .engine
            .trim_clip(&mut self.state.segments, clip_id, edge, delta);

        // The trim phase is transient whatever the outcome.
        let return_to = if prior == EditorPhase::Idle {
            EditorPhase::Idle
        } else {
            EditorPhase::Paused
        };
        self.machine.request(return_to)?;

        result.map(|_| ())
    }

    fn handle_move(
        &mut self,
        clip_id: &str,
        new_start_time: TimeSec,
        new_track_index: Option<usize>,
    ) -> EditorResult<()> {
        self.engine.move_clip(
            &mut self.state.segments,
            clip_id,
            new_start_time,
            new_track_index,
        )?;

        // Live indicator while the clip is in motion, policy permitting.
        self.state.snap_indicator = if self.state.gap_policy == GapPolicy::Off {
            None
        } else {
            self.engine
                .snap_candidate(&self.state.segments, clip_id, self.config.snap_threshold_sec())
        };
        Ok(())
    }

    fn handle_release(&mut self, clip_id: &str) -> EditorResult<()> {
        if self.state.gap_policy == GapPolicy::Off {
            self.state.snap_indicator = None;
            return Ok(());
        }

        let magnetic = self.state.gap_policy == GapPolicy::Magnetic;
        let threshold = self.config.snap_threshold_sec();

        if magnetic {
            if self.machine.phase() == EditorPhase::Idle {
                self.machine.request(EditorPhase::Paused)?;
            }
            self.machine.request(EditorPhase::MagneticSnapping)?;
        }

        let outcome =
            self.engine
                .release_clip(&mut self.state.segments, clip_id, magnetic, threshold);

        if magnetic {
            self.machine.request(EditorPhase::Paused)?;
        }

        match outcome? {
            crate::timeline::SnapOutcome::Closed { .. } | crate::timeline::SnapOutcome::None => {
                self.state.snap_indicator = None;
            }
            crate::timeline::SnapOutcome::Indicated { indicator } => {
                self.state.snap_indicator = Some(indicator);
            }
        }
        Ok(())
    }

    fn handle_delete(&mut self, clip_ids: &[ClipId]) -> EditorResult<()> {
        self.engine.delete_clips(&mut self.state.segments, clip_ids)?;
        self.state.selection.prune(&self.state.segments);
        Ok(())
    }

    fn handle_select(&mut self, clip_ids: &[ClipId]) -> EditorResult<()> {
        for clip_id in clip_ids {
            if self.state.clip(clip_id).is_none() {
                return Err(EditorError::ClipNotFound(clip_id.clone()));
            }
        }
        self.state.selection.set(clip_ids.iter().cloned());
        Ok(())
    }

    // =========================================================================
    // Lifecycle Handlers
    // =========================================================================

    fn handle_reset_error(&mut self) -> EditorResult<()> {
        if self.machine.phase() != EditorPhase::Error {
            return Err(EditorError::InvalidCommand(
                "editor is not in the error phase".to_string(),
            ));
        }
        self.machine.request(EditorPhase::Paused)?;
        self.ladder.reset_breaker();
        self.state.last_error = None;
        info!("error phase cleared, circuit closed");
        Ok(())
    }

    fn handle_shutdown(&mut self) -> EditorResult<()> {
        self.machine.request(EditorPhase::Idle)?;
        if self.state.playback.is_playing {
            self.control_media(MediaOp::Pause)?;
        }
        self.state.playback.is_playing = false;
        Ok(())
    }

    fn handle_audit(&mut self) -> EditorResult<()> {
        self.state.selection.prune(&self.state.segments);
        self.engine.check_invariants(&self.state.segments)?;
        debug!(clips = self.state.segments.len(), "timeline audit passed");
        Ok(())
    }

    // =========================================================================
    // Media Control (recovery-wrapped)
    // =========================================================================

    /// Every media operation goes through the recovery ladder. Exhaustion
    /// stashes containment data; `apply` commits it after rollback.
    fn control_media(&mut self, op: MediaOp) -> EditorResult<()> {
        if self.ladder.breaker().is_open() {
            return Err(EditorError::CircuitOpen);
        }

        match self.ladder.run(&mut self.controller, op) {
            RecoveryOutcome::Clean => Ok(()),
            RecoveryOutcome::Recovered { attempts, rung } => {
                debug!(attempts, ?rung, "media operation recovered");
                Ok(())
            }
            RecoveryOutcome::Exhausted {
                attempts,
                notice,
                readings,
            } => {
                self.exhaustion = Some((notice, readings));
                Err(EditorError::MediaControlFailure(format!(
                    "recovery exhausted after {attempts} attempts"
                )))
            }
        }
    }

    /// Commits stashed exhaustion containment: enter the Error phase,
    /// rebuild playback from authoritative readings where possible, emit
    /// the user notice exactly once. Segments and selection are untouched.
    fn apply_exhaustion_containment(&mut self) {
        let Some((notice, readings)) = self.exhaustion.take() else {
            return;
        };

        self.machine.fail();
        self.state.playback.is_playing = false;
        self.state.cursor.is_being_dragged = false;
        self.state.cursor.preview_position = None;
        if self.monitor.is_suspended() {
            // A drag died with the media; resume monitoring at the cursor.
            let _ = self.monitor.end_drag(self.state.cursor.position);
        }
        match readings {
            Some(PlaybackReadings { position, duration }) => {
                self.state.playback.position = position;
                self.state.playback.duration = duration;
                self.state.cursor.position = position;
            }
            None => {
                // Full reset baseline.
                self.state.playback.position = 0.0;
                self.state.cursor.position = 0.0;
            }
        }
        self.hub.emit_notice(&notice);
    }

    // =========================================================================
    // Sync Tick
    // =========================================================================

    /// Drift observation and correction, run once per tick while playing.
    fn sync_tick(&mut self) {
        if self.machine.phase() != EditorPhase::Playing || self.monitor.is_suspended() {
            return;
        }

        let media_position = match self.controller.position() {
            Ok(position) => position,
            Err(e) => {
                // A single failed read is not worth a correction; the
                // next control operation will hit the ladder.
                warn!("position read failed during sync tick: {}", e);
                return;
            }
        };

        let frame_rate = Some(
            self.controller
                .effective_frame_rate(self.config.fallback_frame_rate),
        );

        let Some(action) = self
            .monitor
            .observe(media_position, self.state.cursor.position, frame_rate)
        else {
            return;
        };

        match action {
            DriftAction::InSync { .. } => {
                if !time_eq(self.state.playback.position, media_position) {
                    self.state.playback.position = media_position;
                    self.hub.mark_dirty();
                }
            }
            DriftAction::Nudge { cursor_to, drift } => {
                debug!(drift, "cosmetic cursor nudge");
                self.state.cursor.position = cursor_to;
                self.state.playback.position = media_position;
                self.hub.mark_dirty();
            }
            DriftAction::CorrectiveSeek { media_to, drift } => {
                warn!(drift, "authoritative drift correction");
                match self.corrective_seek(media_to) {
                    Ok(()) => {
                        self.state.playback.position = media_to;
                        self.state.cursor.position = media_to;
                    }
                    Err(e) => {
                        self.apply_exhaustion_containment();
                        self.state.record_error(
                            &EditorError::SyncDriftUnrecoverable {
                                drift,
                                position: media_position,
                            }
                            .to_string(),
                            &e.to_user_message(),
                        );
                    }
                }
                self.hub.mark_dirty();
            }
        }
    }

    /// Authoritative correction: a transient Syncing phase around one
    /// recovery-wrapped seek.
    fn corrective_seek(&mut self, media_to: TimeSec) -> EditorResult<()> {
        self.machine.begin_transient(EditorPhase::Syncing)?;
        self.control_media(MediaOp::Seek(media_to))?;
        self.machine.resolve_transient()?;
        Ok(())
    }
}

// =============================================================================
// Editor Facade
// =============================================================================

/// The authoritative editor controller.
///
/// Owns the media resource, the canonical state, and the command scheduler.
/// Create one per open editor; drop it to tear everything down.
pub struct Editor<M: MediaResource> {
    scheduler: CommandScheduler,
    core: EditorCore<M>,
}

impl<M: MediaResource> Editor<M> {
    /// Creates an editor owning `resource`, configured by `config`
    pub fn new(resource: M, mut config: EditorConfig) -> Self {
        config.normalize();

        let verify_tolerance = 1.0 / config.fallback_frame_rate;
        let scheduler =
            CommandScheduler::new(config.immediate_budget_ms, config.sequential_budget_ms);
        let mut state = EditorState::new();
        state.gap_policy = config.gap_policy;

        let core = EditorCore {
            state,
            machine: PhaseMachine::new(),
            engine: ClipEditEngine::new(config.min_clip_duration),
            controller: MediaController::new(resource, verify_tolerance),
            monitor: SyncMonitor::new(config.fallback_frame_rate, config.hard_drift_sec),
            ladder: RecoveryLadder::new(config.max_recovery_attempts),
            hub: SubscriberHub::new(),
            exhaustion: None,
            config,
        };

        let mut editor = Self { scheduler, core };
        editor.refresh_duration();
        editor
    }

    /// Creates an editor with default configuration
    pub fn with_defaults(resource: M) -> Self {
        Self::new(resource, EditorConfig::default())
    }

    fn refresh_duration(&mut self) {
        if let Ok(duration) = self.core.controller.duration() {
            self.core.state.playback.duration = duration;
        }
    }

    // =========================================================================
    // Command Submission
    // =========================================================================

    /// Submits a command. Immediate-lane commands complete before this
    /// returns; other lanes are queued and drained by [`Editor::tick`].
    /// Failures are recorded on the state and surfaced to subscribers.
    pub fn submit(&mut self, command: Command) {
        self.scheduler.submit(command, &mut self.core);
    }

    /// Convenience: submits a kind on its default lane
    pub fn submit_kind(&mut self, kind: CommandKind) {
        self.submit(Command::new(kind));
    }

    /// Advances one tick: drains queued work, runs drift correction, and
    /// delivers at most one coalesced snapshot to subscribers.
    pub fn tick(&mut self) {
        self.scheduler.tick(&mut self.core);
        self.core.sync_tick();
        self.core.hub.flush(&self.core.state);
    }

    // =========================================================================
    // Media Completion Callbacks
    // =========================================================================

    /// Entry point for completion callbacks from the media resource.
    ///
    /// Events caused by the controller's own operations are recognized via
    /// the self-update guard and dropped, preventing feedback cycles.
    pub fn on_media_event(&mut self, event: MediaEvent) {
        if self.core.controller.take_self_update() {
            debug!(?event, "self-triggered media event ignored");
            return;
        }

        match event {
            MediaEvent::SeekCompleted { position } => {
                // The resource moved on its own; adopt its position.
                self.core.state.playback.position = position;
                self.core.state.cursor.position = position;
                self.core.hub.mark_dirty();
            }
            MediaEvent::PlaybackEnded => {
                self.submit_kind(CommandKind::Pause);
            }
        }
    }

    // =========================================================================
    // Subscriptions & Queries
    // =========================================================================

    /// Registers a snapshot callback; dropping the handle unsubscribes
    pub fn subscribe(&mut self, callback: SnapshotCallback) -> Subscription {
        self.core.hub.subscribe(callback)
    }

    /// Registers a callback for user-facing notices
    pub fn subscribe_notices(&mut self, callback: NoticeCallback) -> Subscription {
        self.core.hub.subscribe_notices(callback)
    }

    /// Read-only view of the canonical state
    pub fn state(&self) -> &EditorState {
        &self.core.state
    }

    /// Detached snapshot of the canonical state
    pub fn snapshot(&self) -> EditorState {
        self.core.state.snapshot()
    }

    pub fn phase(&self) -> EditorPhase {
        self.core.machine.phase()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.core.config
    }

    /// Scheduler statistics (executed, superseded, budget overruns)
    pub fn scheduler_stats(&self) -> &crate::commands::SchedulerStats {
        self.scheduler.stats()
    }
}

#[cfg(test)]
impl<M: MediaResource> Editor<M> {
    /// Scripted-resource access for tests
    pub(crate) fn media_mut(&mut self) -> &mut M {
        self.core.controller.resource_mut()
    }
}
