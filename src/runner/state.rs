use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::WorkItem;

/// Coarse lifecycle of a runner.
///
/// Runs flow through: INITIALIZED → PROCESSING → COMPLETED.
/// DESTROYED is reachable from any phase through explicit teardown, and
/// `reset` returns the runner to INITIALIZED.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Initialized,
    Processing,
    Completed,
    Destroyed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Initialized => write!(f, "INITIALIZED"),
            Phase::Processing => write!(f, "PROCESSING"),
            Phase::Completed => write!(f, "COMPLETED"),
            Phase::Destroyed => write!(f, "DESTROYED"),
        }
    }
}

/// An informational error recorded during a run. Never alters control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub message: String,
    pub item: Option<WorkItem>,
    pub at: DateTime<Utc>,
}

impl RunError {
    pub fn new(message: impl Into<String>, item: Option<WorkItem>) -> Self {
        Self {
            message: message.into(),
            item,
            at: Utc::now(),
        }
    }
}

/// Snapshot of a run. The engine owns the live copy; callers only ever see clones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub total: usize,
    pub processed: usize,
    pub remaining: usize,
    /// Number of items started so far.
    pub r_index: usize,
    pub current_data: Option<WorkItem>,
    pub pendings_data: VecDeque<WorkItem>,
    pub completed_data: Vec<WorkItem>,
    pub skipped_data: Vec<WorkItem>,
    pub errors: Vec<RunError>,
    pub phase: Phase,
}

impl RunState {
    /// Whether the counters agree with each other and with the item collections.
    pub fn check_invariants(&self) -> bool {
        let current = usize::from(self.current_data.is_some());
        let settled = self.completed_data.len() + self.skipped_data.len();

        self.total == self.processed + self.remaining
            && self.processed == settled
            && self.remaining == self.pendings_data.len() + current
            && self.r_index == settled + current
    }

    /// Every item the run knows about, in no particular order.
    pub fn all_items(&self) -> impl Iterator<Item = &WorkItem> {
        self.pendings_data
            .iter()
            .chain(self.current_data.iter())
            .chain(self.completed_data.iter())
            .chain(self.skipped_data.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_display() {
        assert_eq!(Phase::Initialized.to_string(), "INITIALIZED");
        assert_eq!(Phase::Processing.to_string(), "PROCESSING");
        assert_eq!(Phase::Completed.to_string(), "COMPLETED");
        assert_eq!(Phase::Destroyed.to_string(), "DESTROYED");
    }

    #[test]
    fn blank_state_is_consistent() {
        let state = RunState::default();
        assert_eq!(state.phase, Phase::Initialized);
        assert!(state.check_invariants());
        assert_eq!(state.all_items().count(), 0);
    }

    #[test]
    fn invariants_catch_lost_items() {
        let mut state = RunState {
            total: 2,
            remaining: 2,
            pendings_data: VecDeque::from(vec![WorkItem::new(), WorkItem::new()]),
            ..Default::default()
        };
        assert!(state.check_invariants());

        state.pendings_data.pop_front();
        assert!(!state.check_invariants());
    }

    #[test]
    fn invariants_track_current_and_settled() {
        let state = RunState {
            total: 3,
            processed: 1,
            remaining: 2,
            r_index: 2,
            current_data: Some(WorkItem::new()),
            pendings_data: VecDeque::from(vec![WorkItem::new()]),
            skipped_data: vec![WorkItem::new()],
            ..Default::default()
        };
        assert!(state.check_invariants());
        assert_eq!(state.all_items().count(), 3);
    }
}
