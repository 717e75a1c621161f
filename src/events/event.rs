//! # Diagnostics events emitted by the scheduler and dispatcher.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Process events**: spawn, completion, kill, unhandled failure,
//!   callback panic
//! - **Scheduler events**: work deferred to the next tick
//! - **Dispatch/subscriber events**: manager registration, fan-out trouble
//!
//! The [`Event`] struct carries optional metadata such as the process id,
//! manager home, a human-readable reason, and step counts.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use taskloom::{Event, EventKind, ProcessId};
//!
//! let ev = Event::new(EventKind::UnhandledFailure)
//!     .with_pid(ProcessId::from_raw(7))
//!     .with_reason("dropped at top level");
//!
//! assert_eq!(ev.kind, EventKind::UnhandledFailure);
//! assert_eq!(ev.reason.as_deref(), Some("dropped at top level"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::core::ProcessId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of diagnostics events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Process lifecycle ===
    /// A process was spawned and enqueued.
    ///
    /// Sets: `pid`, `at`, `seq`.
    ProcessSpawned,

    /// A process ran to completion (`Succeed` or `Fail` with no continuation
    /// frames left) and its slot was reclaimed.
    ///
    /// Sets: `pid`, `at`, `seq`.
    ProcessCompleted,

    /// A process was killed (its cancel thunk, if any, already ran).
    ///
    /// Sets: `pid`, `at`, `seq`.
    ProcessKilled,

    /// A `Fail` reached the top of a process with no handler left.
    ///
    /// Published only under `FailurePolicy::Report`; the value itself is
    /// dropped either way.
    ///
    /// Sets: `pid`, `reason`, `at`, `seq`.
    UnhandledFailure,

    /// A user callback panicked while the process was stepped; the process
    /// was aborted.
    ///
    /// Sets: `pid`, `reason` (panic payload), `at`, `seq`.
    ProcessPanicked,

    // === Scheduler ===
    /// The tick budget ran out with runnable processes still queued; a fresh
    /// tick was scheduled.
    ///
    /// Sets: `steps` (budget spent), `at`, `seq`.
    TickDeferred,

    // === Effect dispatch ===
    /// An effect manager was registered under a home.
    ///
    /// Sets: `home`, `at`, `seq`.
    ManagerRegistered,

    // === Subscriber fan-out ===
    /// A diagnostics subscriber dropped an event (queue full or closed).
    ///
    /// Sets: `reason` (subscriber name + cause), `at`, `seq`.
    SubscriberOverflow,

    /// A diagnostics subscriber panicked during event processing.
    ///
    /// Sets: `reason` (subscriber name + panic info), `at`, `seq`.
    SubscriberPanicked,
}

/// Diagnostics event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Process the event concerns, if any.
    pub pid: Option<ProcessId>,
    /// Effect manager home, if applicable.
    pub home: Option<Arc<str>>,
    /// Human-readable reason (panics, drops, overflow details).
    pub reason: Option<Arc<str>>,
    /// Step count (budget spent) for scheduler events.
    pub steps: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            pid: None,
            home: None,
            reason: None,
            steps: None,
        }
    }

    /// Attaches a process id.
    #[inline]
    pub fn with_pid(mut self, pid: ProcessId) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches a manager home.
    #[inline]
    pub fn with_home(mut self, home: impl Into<Arc<str>>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a step count.
    #[inline]
    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = Some(steps.min(u32::MAX as usize) as u32);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, cause: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} cause={cause}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} panic={info}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::ProcessSpawned);
        let b = Event::new(EventKind::ProcessSpawned);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builder_sets_fields() {
        let ev = Event::new(EventKind::ManagerRegistered)
            .with_home("Time")
            .with_steps(42);
        assert_eq!(ev.home.as_deref(), Some("Time"));
        assert_eq!(ev.steps, Some(42));
    }
}
