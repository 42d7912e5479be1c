//! Command Definitions
//!
//! Every external request enters the core as a `Command`: a kind with its
//! payload, a scheduling lane, and an issue timestamp. Commands are
//! serializable so embedders can log or replay them.

mod scheduler;

pub use scheduler::*;

use serde::{Deserialize, Serialize};

use crate::state::GapPolicy;
use crate::timeline::TrimEdge;
use crate::types::{ClipId, CommandId, SourceRef, TimeSec};

// =============================================================================
// Lanes
// =============================================================================

/// Scheduling lane, highest urgency first
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Lane {
    /// Queued behind everything else; no ordering guarantee against other
    /// lanes, cooperative (one unit per tick)
    Deferred = 0,
    /// FIFO, apply-or-rollback per command
    #[default]
    Sequential = 1,
    /// Executes synchronously on submit; latest-wins per logical target
    Immediate = 2,
}

/// Logical target a command acts on, used for immediate-lane supersession
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandTarget {
    Playback,
    Cursor,
    Clip(ClipId),
    Selection,
    Policy,
    Timeline,
}

// =============================================================================
// Command Kinds
// =============================================================================

/// Command payloads
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CommandKind {
    // Playback control
    Play,
    Pause,
    SeekTo { position: TimeSec },
    SetRate { rate: f64 },

    // Cursor drag
    BeginDrag { position: TimeSec },
    DragTo { position: TimeSec },
    EndDrag { position: TimeSec },

    // Clip edits
    AddClip {
        track_index: usize,
        start_time: TimeSec,
        source_ref: SourceRef,
        source_duration: TimeSec,
    },
    TrimClip {
        clip_id: ClipId,
        edge: TrimEdge,
        delta: TimeSec,
    },
    SplitClip { clip_id: ClipId, at_time: TimeSec },
    MoveClip {
        clip_id: ClipId,
        new_start_time: TimeSec,
        #[serde(skip_serializing_if = "Option::is_none")]
        new_track_index: Option<usize>,
    },
    /// Drop of a moved clip; applies the gap policy
    ReleaseClip { clip_id: ClipId },
    DeleteClips { clip_ids: Vec<ClipId> },

    // Selection
    SelectClips { clip_ids: Vec<ClipId> },
    ClearSelection,
    ShowHandles { clip_id: ClipId },

    // Policy / lifecycle
    SetGapPolicy { policy: GapPolicy },
    /// Leave the Error phase, closing the circuit breaker
    ResetError,
    /// Stop playback and return to Idle
    Shutdown,
    /// Housekeeping: prune stale selection, audit timeline invariants
    AuditTimeline,
}

impl CommandKind {
    /// Lane this kind runs on unless the submitter overrides it.
    ///
    /// Interactive gestures are immediate, edits are sequential, and
    /// housekeeping is deferred.
    pub fn default_lane(&self) -> Lane {
        use CommandKind::*;
        match self {
            Play | Pause | SeekTo { .. } | SetRate { .. } | BeginDrag { .. } | DragTo { .. }
            | EndDrag { .. } => Lane::Immediate,
            SelectClips { .. } | ClearSelection | ShowHandles { .. } => Lane::Immediate,
            AddClip { .. } | TrimClip { .. } | SplitClip { .. } | MoveClip { .. }
            | ReleaseClip { .. } | DeleteClips { .. } | SetGapPolicy { .. } | ResetError
            | Shutdown => Lane::Sequential,
            AuditTimeline => Lane::Deferred,
        }
    }

    /// Logical target for latest-wins supersession
    pub fn target(&self) -> CommandTarget {
        use CommandKind::*;
        match self {
            Play | Pause | SeekTo { .. } | SetRate { .. } | ResetError | Shutdown => {
                CommandTarget::Playback
            }
            BeginDrag { .. } | DragTo { .. } | EndDrag { .. } => CommandTarget::Cursor,
            TrimClip { clip_id, .. }
            | SplitClip { clip_id, .. }
            | MoveClip { clip_id, .. }
            | ReleaseClip { clip_id } => CommandTarget::Clip(clip_id.clone()),
            SelectClips { .. } | ClearSelection | ShowHandles { .. } => CommandTarget::Selection,
            SetGapPolicy { .. } => CommandTarget::Policy,
            AddClip { .. } | DeleteClips { .. } | AuditTimeline => CommandTarget::Timeline,
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        use CommandKind::*;
        match self {
            Play => "Play",
            Pause => "Pause",
            SeekTo { .. } => "SeekTo",
            SetRate { .. } => "SetRate",
            BeginDrag { .. } => "BeginDrag",
            DragTo { .. } => "DragTo",
            EndDrag { .. } => "EndDrag",
            AddClip { .. } => "AddClip",
            TrimClip { .. } => "TrimClip",
            SplitClip { .. } => "SplitClip",
            MoveClip { .. } => "MoveClip",
            ReleaseClip { .. } => "ReleaseClip",
            DeleteClips { .. } => "DeleteClips",
            SelectClips { .. } => "SelectClips",
            ClearSelection => "ClearSelection",
            ShowHandles { .. } => "ShowHandles",
            SetGapPolicy { .. } => "SetGapPolicy",
            ResetError => "ResetError",
            Shutdown => "Shutdown",
            AuditTimeline => "AuditTimeline",
        }
    }
}

// =============================================================================
// Command Envelope
// =============================================================================

/// A scheduled unit of work
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: CommandId,
    pub kind: CommandKind,
    pub lane: Lane,
    /// RFC 3339 issue timestamp
    pub issued_at: String,
}

impl Command {
    /// Creates a command on its kind's default lane
    pub fn new(kind: CommandKind) -> Self {
        let lane = kind.default_lane();
        Self {
            id: ulid::Ulid::new().to_string(),
            kind,
            lane,
            issued_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Overrides the lane
    pub fn with_lane(mut self, lane: Lane) -> Self {
        self.lane = lane;
        self
    }

    pub fn target(&self) -> CommandTarget {
        self.kind.target()
    }
}
