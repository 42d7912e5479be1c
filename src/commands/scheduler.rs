//! Command Scheduler
//!
//! Arbitrates all incoming commands by lane. Immediate-lane commands run
//! synchronously during `submit`, with latest-wins supersession per logical
//! target for anything that piles up while a dispatch is already running.
//! Sequential-lane commands drain FIFO, one at a time. Deferred-lane
//! commands run one unit per tick, only when nothing else is pending.
//!
//! The scheduler owns ordering and timing policy only; applying a command
//! to state (including apply-or-rollback) is the sink's job.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::{debug, warn};

use crate::commands::{Command, Lane};
use crate::error::EditorResult;

// =============================================================================
// Command Sink
// =============================================================================

/// Receiver of scheduled commands.
///
/// `apply` must be atomic: on error the canonical state is unchanged apart
/// from error bookkeeping.
pub trait CommandSink {
    fn apply(&mut self, command: &Command) -> EditorResult<()>;
}

// =============================================================================
// Scheduler
// =============================================================================

#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub executed: u64,
    pub superseded: u64,
    pub budget_overruns: u64,
}

pub struct CommandScheduler {
    sequential: VecDeque<Command>,
    deferred: VecDeque<Command>,
    /// Immediate commands that arrived while a dispatch was running
    parked_immediate: VecDeque<Command>,
    dispatching: bool,
    immediate_budget_ms: u64,
    sequential_budget_ms: u64,
    stats: SchedulerStats,
}

impl CommandScheduler {
    pub fn new(immediate_budget_ms: u64, sequential_budget_ms: u64) -> Self {
        Self {
            sequential: VecDeque::new(),
            deferred: VecDeque::new(),
            parked_immediate: VecDeque::new(),
            dispatching: false,
            immediate_budget_ms,
            sequential_budget_ms,
            stats: SchedulerStats::default(),
        }
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// True when any lane still holds work
    pub fn has_pending(&self) -> bool {
        !self.sequential.is_empty()
            || !self.deferred.is_empty()
            || !self.parked_immediate.is_empty()
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submits a command. Immediate-lane commands complete (or are
    /// superseded) before this returns; other lanes are queued.
    pub fn submit(&mut self, command: Command, sink: &mut dyn CommandSink) {
        match command.lane {
            Lane::Immediate => {
                if self.dispatching {
                    // Re-entrant submission: park it, superseding any older
                    // parked command for the same target.
                    self.park_immediate(command);
                    return;
                }
                self.dispatching = true;
                self.run_one(&command, sink);
                self.drain_parked(sink);
                self.drain_sequential(sink);
                self.dispatching = false;
            }
            Lane::Sequential => {
                self.sequential.push_back(command);
                if !self.dispatching {
                    self.dispatching = true;
                    self.drain_sequential(sink);
                    self.drain_parked(sink);
                    self.dispatching = false;
                }
            }
            Lane::Deferred => {
                self.deferred.push_back(command);
            }
        }
    }

    /// Runs queued work for one tick: all pending sequential commands, then
    /// at most one deferred unit. Deferred work never runs while higher
    /// lanes hold anything.
    pub fn tick(&mut self, sink: &mut dyn CommandSink) {
        if self.dispatching {
            return;
        }
        self.dispatching = true;

        self.drain_sequential(sink);
        self.drain_parked(sink);

        if self.sequential.is_empty() && self.parked_immediate.is_empty() {
            if let Some(command) = self.deferred.pop_front() {
                self.run_one(&command, sink);
            }
        }

        self.dispatching = false;
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn park_immediate(&mut self, command: Command) {
        let target = command.target();
        let before = self.parked_immediate.len();
        self.parked_immediate.retain(|parked| parked.target() != target);
        let dropped = before - self.parked_immediate.len();
        if dropped > 0 {
            self.stats.superseded += dropped as u64;
            debug!(
                kind = command.kind.name(),
                dropped, "older immediate command superseded"
            );
        }
        self.parked_immediate.push_back(command);
    }

    fn drain_parked(&mut self, sink: &mut dyn CommandSink) {
        while let Some(command) = self.parked_immediate.pop_front() {
            // A later arrival for the same target wins.
            let superseded = self
                .parked_immediate
                .iter()
                .any(|newer| newer.target() == command.target());
            if superseded {
                self.stats.superseded += 1;
                debug!(kind = command.kind.name(), "immediate command dropped, newer pending");
                continue;
            }
            self.run_one(&command, sink);
        }
    }

    fn drain_sequential(&mut self, sink: &mut dyn CommandSink) {
        while let Some(command) = self.sequential.pop_front() {
            self.run_one(&command, sink);
        }
    }

    fn run_one(&mut self, command: &Command, sink: &mut dyn CommandSink) {
        let budget_ms = match command.lane {
            Lane::Immediate => self.immediate_budget_ms,
            Lane::Sequential | Lane::Deferred => self.sequential_budget_ms,
        };

        let started = Instant::now();
        let result = sink.apply(command);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        self.stats.executed += 1;
        if elapsed_ms > budget_ms {
            // Overruns are logged, never aborted.
            self.stats.budget_overruns += 1;
            warn!(
                kind = command.kind.name(),
                lane = ?command.lane,
                elapsed_ms,
                budget_ms,
                "command exceeded its lane budget"
            );
        }

        if let Err(e) = result {
            debug!(kind = command.kind.name(), "command rejected: {}", e);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
