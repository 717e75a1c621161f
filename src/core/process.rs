//! # Process model.
//!
//! A process owns one task tree, a continuation stack, and a mailbox; it is
//! the unit the scheduler steps. External code never touches a process
//! directly — it holds an opaque [`ProcessId`] and goes through the
//! [`Scheduler`](super::Scheduler) to send messages or request a kill.
//!
//! ## Continuation stack
//! Pending `and_then` / `on_error` continuations are kept in an explicit
//! [`Frame`] vector, deliberately not on the host call stack: a million-link
//! `and_then` chain unwinds iteratively without overflowing anything.
//!
//! ## Lifecycle
//! A slot lives in the scheduler's table from spawn until kill. While queued
//! or suspended it is `Parked`; while the stepper works on it, its task tree
//! is checked out and the slot reads `Running` (the mailbox stays in place so
//! senders are never blocked by a step in progress).

use std::collections::VecDeque;
use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::tasks::{Callback, Task, Value};

/// Opaque handle to a scheduled process.
///
/// Ids are unique per scheduler instance and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(u64);

impl ProcessId {
    /// Builds a handle from a raw id.
    ///
    /// Useful for diagnostics and tests; a fabricated id simply names no live
    /// process, and every operation on it is a no-op.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric id.
    #[must_use]
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which combinator created a continuation frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FrameKind {
    AndThen,
    OnError,
}

/// One pending continuation.
pub(crate) struct Frame {
    pub(crate) kind: FrameKind,
    pub(crate) callback: Callback,
}

/// Execution state of a slot.
pub(crate) enum SlotState {
    /// Waiting in the queue, suspended, or idle; task tree is in place.
    Parked { root: Task, stack: Vec<Frame> },
    /// Checked out by the stepper within the current tick.
    Running,
}

/// Table entry for one live process.
pub(crate) struct ProcessSlot {
    pub(crate) state: SlotState,
    /// Append-only FIFO; any sender may append, only the owner drains.
    pub(crate) mailbox: VecDeque<Value>,
    /// Incremented on every binding suspension; guards stale resumes and
    /// stale cancel thunks.
    pub(crate) binding_seq: u64,
    /// Kill signal, also observed mid-step by the stepper.
    pub(crate) killed: CancellationToken,
}

impl ProcessSlot {
    pub(crate) fn new(root: Task) -> Self {
        Self {
            state: SlotState::Parked { root, stack: Vec::new() },
            mailbox: VecDeque::new(),
            binding_seq: 0,
            killed: CancellationToken::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::succeed;

    #[test]
    fn test_process_id_display() {
        assert_eq!(ProcessId::from_raw(12).to_string(), "#12");
        assert_eq!(ProcessId::from_raw(12).as_raw(), 12);
    }

    #[test]
    fn test_new_slot_is_parked_with_empty_stack() {
        let slot = ProcessSlot::new(succeed(()));
        assert!(slot.mailbox.is_empty());
        assert_eq!(slot.binding_seq, 0);
        assert!(matches!(slot.state, SlotState::Parked { ref stack, .. } if stack.is_empty()));
    }
}
