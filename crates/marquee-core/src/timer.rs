//! Cancellable timers
//!
//! Timers are owned by the host (a tokio task, `window.setTimeout`, a
//! manual clock in tests). The player only hands out [`TimerId`]s and gets
//! them back through the inbox when they fire.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// What a timer is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    /// Transport controls inactivity auto-hide
    ControlsHide,
    /// Network retry backoff
    RetryBackoff,
}

/// One scheduled firing of a timer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId {
    pub kind: TimerKind,
    pub generation: u64,
}

/// Host-side timer facility
pub trait Scheduler {
    /// Deliver `timer` back to the player after `delay`
    fn schedule(&mut self, timer: TimerId, delay: Duration);

    /// Drop a pending timer; unknown or already-fired ids are ignored
    fn cancel(&mut self, timer: TimerId);
}

/// A timer slot holding at most one pending firing
#[derive(Debug)]
pub struct CancellableTimer {
    kind: TimerKind,
    generation: u64,
    pending: Option<TimerId>,
}

impl CancellableTimer {
    pub fn new(kind: TimerKind) -> Self {
        Self {
            kind,
            generation: 0,
            pending: None,
        }
    }

    /// Cancel any pending firing, then schedule a new one
    pub fn arm(&mut self, scheduler: &mut dyn Scheduler, delay: Duration) -> TimerId {
        self.cancel(scheduler);
        self.generation += 1;
        let id = TimerId {
            kind: self.kind,
            generation: self.generation,
        };
        scheduler.schedule(id, delay);
        self.pending = Some(id);
        id
    }

    /// Cancel the pending firing, if any
    pub fn cancel(&mut self, scheduler: &mut dyn Scheduler) {
        if let Some(id) = self.pending.take() {
            scheduler.cancel(id);
        }
    }

    /// Accept a delivered firing. Returns false for stale ids.
    pub fn fire(&mut self, id: TimerId) -> bool {
        if self.pending == Some(id) {
            self.pending = None;
            true
        } else {
            debug!(kind = ?id.kind, generation = id.generation, "Ignoring stale timer");
            false
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
