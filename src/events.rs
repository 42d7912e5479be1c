//! Subscriber Notifications
//!
//! Delivers immutable `EditorState` snapshots to registered callbacks.
//! Deliveries are coalesced: however many transitions a tick accepts,
//! subscribers hear at most once per tick. User notices (recovery
//! exhaustion) are delivered immediately and exactly once per failure.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::media::UserNotice;
use crate::state::EditorState;

pub type SnapshotCallback = Box<dyn FnMut(&EditorState)>;
pub type NoticeCallback = Box<dyn FnMut(&UserNotice)>;

// =============================================================================
// Registry
// =============================================================================

#[derive(Default)]
struct Registry {
    next_id: u64,
    snapshot_subs: Vec<(u64, SnapshotCallback)>,
    notice_subs: Vec<(u64, NoticeCallback)>,
}

impl Registry {
    fn remove(&mut self, id: u64) {
        self.snapshot_subs.retain(|(sub_id, _)| *sub_id != id);
        self.notice_subs.retain(|(sub_id, _)| *sub_id != id);
    }
}

// =============================================================================
// Subscription Handle
// =============================================================================

/// RAII subscription; dropping it unsubscribes
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().remove(self.id);
        }
    }
}

// =============================================================================
// Subscriber Hub
// =============================================================================

pub struct SubscriberHub {
    registry: Rc<RefCell<Registry>>,
    dirty: bool,
}

impl Default for SubscriberHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberHub {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry::default())),
            dirty: false,
        }
    }

    /// Registers a snapshot callback
    pub fn subscribe(&mut self, callback: SnapshotCallback) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.snapshot_subs.push((id, callback));
        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Registers a user-notice callback
    pub fn subscribe_notices(&mut self, callback: NoticeCallback) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.notice_subs.push((id, callback));
        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Marks the canonical state as changed since the last flush
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Delivers one coalesced snapshot if anything changed since the last
    /// flush
    pub fn flush(&mut self, state: &EditorState) {
        if !self.dirty {
            return;
        }
        self.dirty = false;

        let mut registry = self.registry.borrow_mut();
        let count = registry.snapshot_subs.len();
        for (_, callback) in registry.snapshot_subs.iter_mut() {
            callback(state);
        }
        debug!(subscribers = count, "snapshot delivered");
    }

    /// Delivers a user notice immediately
    pub fn emit_notice(&mut self, notice: &UserNotice) {
        let mut registry = self.registry.borrow_mut();
        for (_, callback) in registry.notice_subs.iter_mut() {
            callback(notice);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
