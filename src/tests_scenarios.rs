//! Cross-module controller scenarios.
//!
//! Exercises full command flows through the editor facade: drag gestures,
//! drift correction, magnetic gap closure, and recovery exhaustion.

use std::cell::Cell;
use std::rc::Rc;

use crate::commands::{Command, CommandKind, Lane};
use crate::config::EditorConfig;
use crate::media::testing::ScriptedMedia;
use crate::state::{EditorPhase, GapPolicy};
use crate::timeline::TrimEdge;
use crate::Editor;

fn editor() -> Editor<ScriptedMedia> {
    Editor::with_defaults(ScriptedMedia::with_duration(60.0))
}

fn editor_with_snap_threshold(threshold_px: f64) -> Editor<ScriptedMedia> {
    let config = EditorConfig {
        snap_threshold_px: threshold_px,
        pixels_per_second: 100.0,
        ..EditorConfig::default()
    };
    Editor::new(ScriptedMedia::with_duration(60.0), config)
}

fn add_clip(editor: &mut Editor<ScriptedMedia>, track: usize, start: f64, duration: f64) -> String {
    editor.submit_kind(CommandKind::AddClip {
        track_index: track,
        start_time: start,
        source_ref: format!("asset://clip-at-{start}"),
        source_duration: duration,
    });
    editor
        .state()
        .segments
        .iter()
        .find(|c| c.start_time == start && c.track_index == track)
        .expect("clip was added")
        .id
        .clone()
}

// =============================================================================
// Trim Arithmetic
// =============================================================================

#[test]
fn trim_from_both_edges_keeps_source_bookkeeping() {
    // 10s source, 2s off the start then 1s off the end.
    let mut editor = editor();
    let clip_id = add_clip(&mut editor, 0, 0.0, 10.0);

    editor.submit_kind(CommandKind::TrimClip {
        clip_id: clip_id.clone(),
        edge: TrimEdge::Leading,
        delta: 2.0,
    });
    editor.submit_kind(CommandKind::TrimClip {
        clip_id: clip_id.clone(),
        edge: TrimEdge::Trailing,
        delta: 1.0,
    });

    let clip = editor.state().clip(&clip_id).unwrap();
    assert_eq!(clip.duration, 7.0);
    assert_eq!(clip.trim_start, 2.0);
    assert_eq!(clip.trim_end, 1.0);
    assert_eq!(clip.source_duration, 10.0);
    assert!(clip.trim_sum_holds());
    assert!(editor.state().last_error.is_none());
}

#[test]
fn trim_sum_invariant_survives_arbitrary_trim_sequences() {
    let mut editor = editor();
    let clip_id = add_clip(&mut editor, 0, 20.0, 12.0);

    let deltas = [
        (TrimEdge::Leading, 3.0),
        (TrimEdge::Trailing, 5.0),
        (TrimEdge::Leading, -1.5),
        (TrimEdge::Trailing, -2.0),
        (TrimEdge::Leading, 100.0),
        (TrimEdge::Trailing, -100.0),
    ];
    for (edge, delta) in deltas {
        editor.submit_kind(CommandKind::TrimClip {
            clip_id: clip_id.clone(),
            edge,
            delta,
        });
        let clip = editor.state().clip(&clip_id).unwrap();
        assert!(clip.trim_sum_holds(), "trim sum broken after {edge:?} {delta}");
        assert!(clip.duration >= editor.config().min_clip_duration - 1e-9);
    }
}

// =============================================================================
// Drag Gesture
// =============================================================================

#[test]
fn drag_start_while_playing_goes_through_paused() {
    let mut editor = editor();
    editor.submit_kind(CommandKind::Play);
    assert_eq!(editor.phase(), EditorPhase::Playing);

    editor.submit_kind(CommandKind::BeginDrag { position: 5.0 });

    // Playing -> Paused -> Dragging; a direct edge does not exist.
    assert_eq!(editor.phase(), EditorPhase::Dragging);
    assert!(!editor.state().playback.is_playing);
    assert!(editor.state().cursor.is_being_dragged);
    assert_eq!(editor.state().cursor.preview_position, Some(5.0));
    assert!(editor.state().last_error.is_none());
}

#[test]
fn drag_preview_never_permanently_moves_playback() {
    let mut editor = editor();
    editor.submit_kind(CommandKind::SeekTo { position: 2.0 });
    assert_eq!(editor.media_mut().position, 2.0);

    editor.submit_kind(CommandKind::BeginDrag { position: 2.0 });
    editor.submit_kind(CommandKind::DragTo { position: 8.0 });
    editor.submit_kind(CommandKind::DragTo { position: 14.0 });

    // Every preview seek was reverted; playback still sits where it was.
    assert_eq!(editor.media_mut().position, 2.0);
    assert_eq!(editor.state().cursor.preview_position, Some(14.0));

    let seeks_before_release = editor.media_mut().seek_log.len();
    editor.submit_kind(CommandKind::EndDrag { position: 14.0 });

    // Exactly one permanent seek for the whole drag.
    assert_eq!(editor.media_mut().seek_log.len(), seeks_before_release + 1);
    assert_eq!(editor.media_mut().position, 14.0);
    assert_eq!(editor.state().cursor.position, 14.0);
    assert!(!editor.state().cursor.is_being_dragged);
    assert_eq!(editor.state().cursor.preview_position, None);
    assert_eq!(editor.phase(), EditorPhase::Paused);
}

#[test]
fn drag_release_resumes_playback_when_it_was_playing() {
    let mut editor = editor();
    editor.submit_kind(CommandKind::Play);
    editor.submit_kind(CommandKind::BeginDrag { position: 3.0 });
    editor.submit_kind(CommandKind::EndDrag { position: 9.0 });

    assert_eq!(editor.phase(), EditorPhase::Playing);
    assert!(editor.state().playback.is_playing);
    assert_eq!(editor.state().playback.position, 9.0);
}

#[test]
fn drag_commands_without_a_drag_are_rejected() {
    let mut editor = editor();
    editor.submit_kind(CommandKind::DragTo { position: 5.0 });

    assert!(editor.state().last_error.is_some());
    assert_eq!(editor.phase(), EditorPhase::Idle);
    assert!(!editor.state().cursor.is_being_dragged);
}

// =============================================================================
// Drift Correction
// =============================================================================

#[test]
fn small_drift_nudges_cursor_to_media_position() {
    let mut editor = editor();
    editor.submit_kind(CommandKind::Play);

    // Drift above one frame (1/30) but below the hard threshold.
    editor.media_mut().position = 0.05;
    editor.tick();

    assert_eq!(editor.state().cursor.position, 0.05);
    assert_eq!(editor.state().playback.position, 0.05);
    assert_eq!(editor.phase(), EditorPhase::Playing);
}

#[test]
fn hard_drift_issues_authoritative_seek() {
    let mut editor = editor();
    editor.submit_kind(CommandKind::SeekTo { position: 10.0 });
    editor.submit_kind(CommandKind::Play);

    // Media ran far ahead of the cursor.
    editor.media_mut().position = 10.5;
    editor.tick();

    // The media was corrected back to the cursor, and agreement holds.
    let media_position = editor.media_mut().position;
    assert_eq!(media_position, 10.0);
    let drift = (media_position - editor.state().cursor.position).abs();
    assert!(drift <= 1.0 / 30.0);
    assert_eq!(editor.phase(), EditorPhase::Playing);
}

#[test]
fn playing_cursor_stays_within_tolerance_across_ticks() {
    let mut editor = editor();
    editor.submit_kind(CommandKind::Play);

    // Simulate media advancing between ticks.
    for step in 1..=50u32 {
        let media_position = step as f64 * 0.033;
        editor.media_mut().position = media_position;
        editor.tick();

        let state = editor.state();
        if !state.cursor.is_being_dragged && state.playback.is_playing {
            let drift = (media_position - state.cursor.position).abs();
            assert!(drift <= 1.0 / 30.0 + 1e-9, "drift {drift} at step {step}");
        }
    }
}

// =============================================================================
// Magnetic Snap
// =============================================================================

#[test]
fn magnetic_release_closes_gap_and_ripples_track() {
    // Threshold 50px at 100px/s = 0.5s.
    let mut editor = editor_with_snap_threshold(50.0);
    let _a = add_clip(&mut editor, 0, 0.0, 4.0);
    let b = add_clip(&mut editor, 0, 4.5, 4.0);
    let c = add_clip(&mut editor, 0, 9.0, 1.0);

    editor.submit_kind(CommandKind::ReleaseClip { clip_id: b.clone() });

    assert_eq!(editor.state().clip(&b).unwrap().start_time, 4.0);
    assert_eq!(editor.state().clip(&c).unwrap().start_time, 8.5);
    assert!(editor.state().snap_indicator.is_none());
    assert_eq!(editor.phase(), EditorPhase::Paused);
    assert!(editor.state().last_error.is_none());
}

#[test]
fn guidance_release_indicates_without_moving() {
    let mut editor = editor_with_snap_threshold(50.0);
    editor.submit_kind(CommandKind::SetGapPolicy {
        policy: GapPolicy::Guidance,
    });
    let _a = add_clip(&mut editor, 0, 0.0, 4.0);
    let b = add_clip(&mut editor, 0, 4.3, 4.0);

    editor.submit_kind(CommandKind::ReleaseClip { clip_id: b.clone() });

    assert_eq!(editor.state().clip(&b).unwrap().start_time, 4.3);
    let indicator = editor.state().snap_indicator.as_ref().unwrap();
    assert!((indicator.gap - 0.3).abs() < 1e-9);
}

#[test]
fn gap_policy_off_disables_detection() {
    let mut editor = editor_with_snap_threshold(50.0);
    editor.submit_kind(CommandKind::SetGapPolicy {
        policy: GapPolicy::Off,
    });
    let _a = add_clip(&mut editor, 0, 0.0, 4.0);
    let b = add_clip(&mut editor, 0, 4.3, 4.0);

    editor.submit_kind(CommandKind::MoveClip {
        clip_id: b.clone(),
        new_start_time: 4.2,
        new_track_index: None,
    });
    editor.submit_kind(CommandKind::ReleaseClip { clip_id: b.clone() });

    assert_eq!(editor.state().clip(&b).unwrap().start_time, 4.2);
    assert!(editor.state().snap_indicator.is_none());
}

#[test]
fn move_shows_live_snap_indicator() {
    let mut editor = editor_with_snap_threshold(50.0);
    let _a = add_clip(&mut editor, 0, 0.0, 4.0);
    let b = add_clip(&mut editor, 0, 6.0, 4.0);

    editor.submit_kind(CommandKind::MoveClip {
        clip_id: b.clone(),
        new_start_time: 4.4,
        new_track_index: None,
    });

    let indicator = editor.state().snap_indicator.as_ref().unwrap();
    assert_eq!(indicator.clip_id, b);
    // The clip itself hasn't snapped yet.
    assert_eq!(editor.state().clip(&b).unwrap().start_time, 4.4);
}

// =============================================================================
// Atomic Batch Delete
// =============================================================================

#[test]
fn batch_delete_is_all_or_nothing() {
    let mut editor = editor();
    let a = add_clip(&mut editor, 0, 0.0, 4.0);
    let b = add_clip(&mut editor, 0, 5.0, 4.0);

    // A missing id anywhere in the batch aborts the whole delete.
    editor.submit_kind(CommandKind::DeleteClips {
        clip_ids: vec![a.clone(), "clip_missing".to_string(), b.clone()],
    });
    assert_eq!(editor.state().segments.len(), 2);
    assert!(editor.state().last_error.is_some());

    editor.submit_kind(CommandKind::DeleteClips {
        clip_ids: vec![a, b],
    });
    assert!(editor.state().segments.is_empty());
}

#[test]
fn delete_prunes_selection() {
    let mut editor = editor();
    let a = add_clip(&mut editor, 0, 0.0, 4.0);
    let b = add_clip(&mut editor, 0, 5.0, 4.0);

    editor.submit_kind(CommandKind::SelectClips {
        clip_ids: vec![a.clone(), b.clone()],
    });
    editor.submit_kind(CommandKind::ShowHandles { clip_id: a.clone() });
    editor.submit_kind(CommandKind::DeleteClips {
        clip_ids: vec![a],
    });

    let selection = &editor.state().selection;
    assert_eq!(selection.selected.len(), 1);
    assert!(selection.selected.contains(&b));
    assert!(selection.handles_clip.is_none());
}

// =============================================================================
// Recovery Exhaustion
// =============================================================================

#[test]
fn repeated_seek_failure_enters_error_and_notifies_once() {
    let mut editor = editor();
    let clip_id = add_clip(&mut editor, 0, 0.0, 10.0);

    let notices = Rc::new(Cell::new(0u32));
    let counter = notices.clone();
    let _sub = editor.subscribe_notices(Box::new(move |_| counter.set(counter.get() + 1)));

    editor.media_mut().fail_seeks = 10;
    editor.media_mut().reacquire_heals = false;

    editor.submit_kind(CommandKind::SeekTo { position: 5.0 });

    assert_eq!(editor.phase(), EditorPhase::Error);
    assert_eq!(notices.get(), 1);
    // The in-memory edit is preserved untouched.
    assert_eq!(editor.state().segments.len(), 1);
    assert!(editor.state().clip(&clip_id).is_some());
    assert!(editor.state().last_error.is_some());
    assert!(!editor.state().playback.is_playing);

    // The circuit is open: further media commands fail fast, no new notice.
    editor.submit_kind(CommandKind::SeekTo { position: 6.0 });
    assert_eq!(notices.get(), 1);
    assert_eq!(editor.phase(), EditorPhase::Error);
}

#[test]
fn reset_error_closes_circuit_and_restores_control() {
    let mut editor = editor();
    editor.media_mut().fail_seeks = 10;
    editor.media_mut().reacquire_heals = false;
    editor.submit_kind(CommandKind::SeekTo { position: 5.0 });
    assert_eq!(editor.phase(), EditorPhase::Error);

    // The resource comes back; the user dismisses the notice.
    editor.media_mut().fail_seeks = 0;
    editor.submit_kind(CommandKind::ResetError);

    assert_eq!(editor.phase(), EditorPhase::Paused);
    assert!(editor.state().last_error.is_none());

    editor.submit_kind(CommandKind::SeekTo { position: 7.0 });
    assert_eq!(editor.media_mut().position, 7.0);
    assert!(editor.state().last_error.is_none());
}

#[test]
fn transient_seek_failure_recovers_silently() {
    let mut editor = editor();
    let notices = Rc::new(Cell::new(0u32));
    let counter = notices.clone();
    let _sub = editor.subscribe_notices(Box::new(move |_| counter.set(counter.get() + 1)));

    editor.media_mut().fail_seeks = 1;
    editor.submit_kind(CommandKind::SeekTo { position: 5.0 });

    assert_eq!(editor.phase(), EditorPhase::Paused);
    assert_eq!(editor.media_mut().position, 5.0);
    assert_eq!(notices.get(), 0);
    assert!(editor.state().last_error.is_none());
}

// =============================================================================
// Scheduling Properties
// =============================================================================

#[test]
fn identical_immediate_command_is_idempotent() {
    let mut editor = editor();
    editor.submit_kind(CommandKind::SeekTo { position: 5.0 });
    let after_once = editor.snapshot();

    editor.submit_kind(CommandKind::SeekTo { position: 5.0 });
    let after_twice = editor.snapshot();

    assert_eq!(after_once, after_twice);
}

#[test]
fn invalid_transition_rejected_with_state_intact() {
    let mut editor = editor();
    let clip_id = add_clip(&mut editor, 0, 0.0, 10.0);
    editor.submit_kind(CommandKind::Play);

    // Trimming while playing is not an edge in the table.
    editor.submit_kind(CommandKind::TrimClip {
        clip_id: clip_id.clone(),
        edge: TrimEdge::Leading,
        delta: 2.0,
    });

    assert_eq!(editor.phase(), EditorPhase::Playing);
    let clip = editor.state().clip(&clip_id).unwrap();
    assert_eq!(clip.duration, 10.0);
    assert_eq!(clip.trim_start, 0.0);
    assert!(editor.state().last_error.is_some());
}

#[test]
fn snapshots_are_coalesced_per_tick() {
    let mut editor = editor();
    let deliveries = Rc::new(Cell::new(0u32));
    let counter = deliveries.clone();
    let _sub = editor.subscribe(Box::new(move |_| counter.set(counter.get() + 1)));

    add_clip(&mut editor, 0, 0.0, 4.0);
    add_clip(&mut editor, 0, 5.0, 4.0);
    add_clip(&mut editor, 0, 10.0, 4.0);
    assert_eq!(deliveries.get(), 0);

    editor.tick();
    assert_eq!(deliveries.get(), 1);

    // Nothing changed: no delivery.
    editor.tick();
    assert_eq!(deliveries.get(), 1);
}

#[test]
fn deferred_audit_runs_only_when_idle() {
    let mut editor = editor();
    add_clip(&mut editor, 0, 0.0, 4.0);

    editor.submit(Command::new(CommandKind::AuditTimeline));
    assert_eq!(editor.scheduler_stats().executed, 1); // just the AddClip

    editor.tick();
    assert_eq!(editor.scheduler_stats().executed, 2);
    assert!(editor.state().last_error.is_none());
}

#[test]
fn deferred_lane_override_is_honored() {
    let mut editor = editor();

    editor.submit(
        Command::new(CommandKind::AddClip {
            track_index: 0,
            start_time: 0.0,
            source_ref: "asset://late".to_string(),
            source_duration: 4.0,
        })
        .with_lane(Lane::Deferred),
    );
    assert!(editor.state().segments.is_empty());

    editor.tick();
    assert_eq!(editor.state().segments.len(), 1);
}

// =============================================================================
// Media Callbacks
// =============================================================================

#[test]
fn self_triggered_media_events_are_ignored() {
    let mut editor = editor();
    editor.submit_kind(CommandKind::SeekTo { position: 5.0 });

    // The resource confirms the seek the controller itself issued; the
    // guard keeps it from being treated as a user event.
    editor.on_media_event(crate::MediaEvent::SeekCompleted { position: 5.0 });
    editor.submit_kind(CommandKind::SeekTo { position: 9.0 });
    editor.on_media_event(crate::MediaEvent::SeekCompleted { position: 9.0 });

    assert_eq!(editor.state().cursor.position, 9.0);
    assert!(editor.state().last_error.is_none());
}

#[test]
fn external_seek_event_adopts_resource_position() {
    let mut editor = editor();
    editor.submit_kind(CommandKind::SeekTo { position: 5.0 });
    editor.core.controller.take_self_update();

    editor.on_media_event(crate::MediaEvent::SeekCompleted { position: 12.0 });

    assert_eq!(editor.state().cursor.position, 12.0);
    assert_eq!(editor.state().playback.position, 12.0);
}

#[test]
fn playback_ended_pauses_editor() {
    let mut editor = editor();
    editor.submit_kind(CommandKind::Play);
    editor.core.controller.take_self_update();

    editor.on_media_event(crate::MediaEvent::PlaybackEnded);

    assert_eq!(editor.phase(), EditorPhase::Paused);
    assert!(!editor.state().playback.is_playing);
}
