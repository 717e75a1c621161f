//! # Scheduler: work queue, budgeted ticks, and the process table.
//!
//! The [`Scheduler`] is an explicit value (cheap-clone handle) owning every
//! process of one runtime instance — no globals, so independent schedulers
//! coexist and tests stay hermetic.
//!
//! ## Architecture
//! ```text
//!  spawn/send/resume ──► work queue (FIFO of ProcessId)
//!                             │
//!                         tick():  pop ─► step(process, shared budget)
//!                             │            │ Done / UnhandledFailure → slot reclaimed
//!                             │            │ Suspended (Binding/Receive) → parked
//!                             │            │ BudgetExhausted → re-enqueued at tail
//!                             │            └ Panicked → removed (policy decides more)
//!                             │
//!                     queue still non-empty?
//!                             └─► schedule a fresh tick on the ambient tokio
//!                                 runtime (yield in between — never a busy
//!                                 loop, host I/O is never starved)
//! ```
//!
//! ## Rules
//! - One tick shares one step budget ([`Config::max_steps`]) across all
//!   runnable processes; a process that exhausts it resumes next tick.
//! - A process that runs to completion (Succeed or Fail with no frames left)
//!   gives its table slot back; `alive` turns false.
//! - Stepping or enqueueing a killed process is a safe no-op.
//! - Failures and panics are isolated per process; the queue and the other
//!   processes are never affected.
//! - Without an ambient tokio runtime there is no auto-pump; the embedder
//!   drives [`Scheduler::tick`] / [`Scheduler::run_until_idle`] manually.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, FailurePolicy, PanicPolicy};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{binding, succeed, Cancel, Task, Value};

use super::process::{Frame, ProcessId, ProcessSlot, SlotState};
use super::stepper::{step, StepOutcome};

/// Result of draining one mailbox slot.
pub(crate) enum MailboxPop {
    Message(Value),
    Empty,
    Dead,
}

/// Outcome of one budgeted pass over the work queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickReport {
    /// Steps consumed out of the per-tick budget.
    pub steps: usize,
    /// True if runnable processes remained when the tick ended (budget
    /// exhausted); a fresh tick was scheduled if a tokio runtime is present.
    pub deferred: bool,
}

struct SchedState {
    table: HashMap<ProcessId, ProcessSlot>,
    queue: VecDeque<ProcessId>,
    next_pid: u64,
    /// Async pump active; at most one pending tick task at a time.
    working: bool,
    /// Re-entrancy guard: a callback calling `tick()` gets a no-op.
    ticking: bool,
}

struct SchedulerInner {
    state: Mutex<SchedState>,
    bus: Bus,
    config: Config,
}

/// Cooperative, budget-fair process scheduler.
///
/// Clones share the same instance. See the module docs for the scheduling
/// model.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Creates a scheduler with its own diagnostics bus.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let bus = Bus::new(config.bus_capacity);
        Self::with_bus(config, bus)
    }

    /// Creates a scheduler publishing on an existing bus (shared with the
    /// surrounding runtime).
    #[must_use]
    pub fn with_bus(config: Config, bus: Bus) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                state: Mutex::new(SchedState {
                    table: HashMap::new(),
                    queue: VecDeque::new(),
                    next_pid: 0,
                    working: false,
                    ticking: false,
                }),
                bus,
                config,
            }),
        }
    }

    /// This instance's configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        self.inner.config
    }

    /// Handle to the diagnostics bus.
    #[must_use]
    pub fn bus(&self) -> Bus {
        self.inner.bus.clone()
    }

    // ---------------------------
    // Spawning and messaging
    // ---------------------------

    /// Spawns a process running `task` and enqueues it.
    pub fn spawn(&self, task: Task) -> ProcessId {
        self.spawn_with(|_| task)
    }

    /// Spawns a process whose root task may capture its own id.
    ///
    /// Used wherever a long-running loop needs a self-handle (effect managers
    /// messaging themselves, the application process).
    pub fn spawn_with(&self, build: impl FnOnce(ProcessId) -> Task) -> ProcessId {
        let pid = {
            let mut st = self.lock();
            let pid = ProcessId::from_raw(st.next_pid);
            st.next_pid += 1;
            pid
        };
        let root = build(pid);
        {
            let mut st = self.lock();
            st.table.insert(pid, ProcessSlot::new(root));
            st.queue.push_back(pid);
        }
        self.inner.bus.publish(Event::new(EventKind::ProcessSpawned).with_pid(pid));
        self.schedule_work();
        pid
    }

    /// Appends a message to a process's mailbox and makes it runnable.
    ///
    /// A dead or unknown `pid` is a safe no-op.
    pub fn send(&self, pid: ProcessId, msg: Value) {
        {
            let mut st = self.lock();
            let Some(slot) = st.table.get_mut(&pid) else { return };
            slot.mailbox.push_back(msg);
            st.queue.push_back(pid);
        }
        self.schedule_work();
    }

    /// A task that spawns `task` as a new process and succeeds with its
    /// [`ProcessId`].
    #[must_use]
    pub fn spawn_task(&self, task: Task) -> Task {
        let me = self.clone();
        binding(move |resume| {
            let pid = me.spawn(task);
            resume.resolve(succeed(pid));
            None
        })
    }

    /// A task that sends `msg` to `pid` and succeeds with unit.
    #[must_use]
    pub fn send_task(&self, pid: ProcessId, msg: Value) -> Task {
        let me = self.clone();
        binding(move |resume| {
            me.send(pid, msg);
            resume.resolve(succeed(()));
            None
        })
    }

    /// A task that kills `pid` and succeeds with unit, so callers can
    /// sequence "cancel, then X" with `and_then`.
    ///
    /// If the process is suspended on a binding with a stored cancel thunk,
    /// the thunk runs exactly once. Killing a process blocked on `receive`
    /// just stops it from ever being re-enqueued. Killing a dead process is a
    /// no-op.
    #[must_use]
    pub fn kill(&self, pid: ProcessId) -> Task {
        let me = self.clone();
        binding(move |resume| {
            me.raw_kill(pid);
            resume.resolve(succeed(()));
            None
        })
    }

    /// A task that resolves with unit after `dur` on the ambient tokio timer.
    ///
    /// Killing the owning process while it sleeps cancels the timer. Without
    /// a tokio runtime the task resolves immediately (a yield, not a wait).
    #[must_use]
    pub fn sleep(&self, dur: Duration) -> Task {
        binding(move |resume| {
            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                resume.resolve(succeed(()));
                return None;
            };
            let token = CancellationToken::new();
            let guard = token.clone();
            handle.spawn(async move {
                select! {
                    _ = tokio::time::sleep(dur) => resume.resolve(succeed(())),
                    _ = guard.cancelled() => {}
                }
            });
            Some(Box::new(move || token.cancel()) as Cancel)
        })
    }

    /// True while `pid` names a live process: spawned, not yet finished,
    /// not killed.
    #[must_use]
    pub fn alive(&self, pid: ProcessId) -> bool {
        self.lock().table.contains_key(&pid)
    }

    // ---------------------------
    // Ticking
    // ---------------------------

    /// Runs one budgeted pass over the work queue.
    ///
    /// Pops runnable processes and steps each with the shared, shrinking
    /// budget. Stepping a process costs at least one step, so a tick always
    /// makes progress. Returns [`RuntimeError::ProcessPanicked`] only under
    /// [`PanicPolicy::AbortRuntime`].
    pub fn tick(&self) -> Result<TickReport, RuntimeError> {
        {
            let mut st = self.lock();
            if st.ticking {
                return Ok(TickReport { steps: 0, deferred: false });
            }
            st.ticking = true;
        }

        let total = self.inner.config.budget();
        let mut budget = total;
        let mut fatal = None;

        while budget > 0 {
            let Some((pid, killed, root, stack)) = self.checkout_next() else { break };
            let before = budget;
            let remaining = match step(self, pid, &killed, root, stack, budget) {
                StepOutcome::Done { budget } | StepOutcome::Suspended { budget } => budget,
                StepOutcome::UnhandledFailure { budget } => {
                    if self.inner.config.failure_policy == FailurePolicy::Report {
                        self.inner.bus.publish(
                            Event::new(EventKind::UnhandledFailure)
                                .with_pid(pid)
                                .with_reason("failure reached top level uncaught"),
                        );
                    }
                    budget
                }
                StepOutcome::Killed { budget } => budget,
                StepOutcome::BudgetExhausted => 0,
                StepOutcome::Panicked { budget, reason } => {
                    self.inner.bus.publish(
                        Event::new(EventKind::ProcessPanicked)
                            .with_pid(pid)
                            .with_reason(reason.clone()),
                    );
                    if self.inner.config.panic_policy == PanicPolicy::AbortRuntime {
                        fatal = Some(RuntimeError::ProcessPanicked { pid, reason });
                    }
                    budget
                }
            };
            // Minimum charge of one per stepped process keeps admission fair
            // even for processes that finish without a single transition.
            budget = remaining.min(before.saturating_sub(1));

            if fatal.is_some() {
                break;
            }
        }

        let deferred = {
            let mut st = self.lock();
            st.ticking = false;
            !st.queue.is_empty()
        };
        let report = TickReport { steps: total - budget, deferred };

        if deferred && fatal.is_none() {
            self.inner
                .bus
                .publish(Event::new(EventKind::TickDeferred).with_steps(report.steps));
            self.schedule_work();
        }

        match fatal {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Ticks until the work queue drains; returns the number of ticks run.
    ///
    /// Intended for manual drivers and tests. Processes suspended on bindings
    /// or empty mailboxes are not runnable and do not keep this loop alive —
    /// but a process that re-enqueues itself forever does.
    pub fn run_until_idle(&self) -> Result<usize, RuntimeError> {
        let mut ticks = 0;
        loop {
            let report = self.tick()?;
            ticks += 1;
            if !report.deferred {
                return Ok(ticks);
            }
        }
    }

    // ---------------------------
    // Stepper support (crate-internal)
    // ---------------------------

    /// Pops queue entries until a live parked process is found; checks its
    /// task tree out for stepping.
    fn checkout_next(&self) -> Option<(ProcessId, CancellationToken, Task, Vec<Frame>)> {
        let mut st = self.lock();
        loop {
            let pid = st.queue.pop_front()?;
            let Some(slot) = st.table.get_mut(&pid) else { continue };
            match std::mem::replace(&mut slot.state, SlotState::Running) {
                SlotState::Parked { root, stack } => {
                    return Some((pid, slot.killed.clone(), root, stack));
                }
                SlotState::Running => continue,
            }
        }
    }

    /// Checks a stepped task tree back in without re-enqueueing.
    pub(crate) fn park(&self, pid: ProcessId, root: Task, stack: Vec<Frame>) {
        let mut st = self.lock();
        if let Some(slot) = st.table.get_mut(&pid) {
            slot.state = SlotState::Parked { root, stack };
        }
    }

    /// Parks a budget-exhausted process and re-enqueues it at the tail.
    pub(crate) fn park_and_requeue(&self, pid: ProcessId, root: Task, stack: Vec<Frame>) {
        let mut st = self.lock();
        if let Some(slot) = st.table.get_mut(&pid) {
            slot.state = SlotState::Parked { root, stack };
            st.queue.push_back(pid);
        }
    }

    /// Parks a process suspending on a binding; bumps and returns the binding
    /// sequence that guards its resume and cancel thunk. `None` if the
    /// process died.
    pub(crate) fn park_for_binding(
        &self,
        pid: ProcessId,
        cancel: Option<Cancel>,
        stack: Vec<Frame>,
    ) -> Option<u64> {
        let mut st = self.lock();
        let slot = st.table.get_mut(&pid)?;
        slot.binding_seq += 1;
        let seq = slot.binding_seq;
        slot.state = SlotState::Parked { root: Task::Binding { start: None, cancel }, stack };
        Some(seq)
    }

    /// Delivers a binding's result: replaces the suspended root and makes the
    /// process runnable. Stale resumes (killed process, or a later
    /// suspension) are no-ops.
    pub(crate) fn resolve_binding(&self, pid: ProcessId, seq: u64, task: Task) {
        {
            let mut st = self.lock();
            let Some(slot) = st.table.get_mut(&pid) else { return };
            if slot.binding_seq != seq {
                return;
            }
            let SlotState::Parked { root, .. } = &mut slot.state else { return };
            if !matches!(root, Task::Binding { .. }) {
                return;
            }
            *root = task;
            st.queue.push_back(pid);
        }
        self.schedule_work();
    }

    /// Stores the cancel thunk a binding's `start` returned.
    ///
    /// If the process died while `start` ran, the thunk is invoked right away
    /// so external resources are released; if the binding already resolved,
    /// the thunk is stale and dropped.
    pub(crate) fn store_cancel(&self, pid: ProcessId, seq: u64, cancel: Cancel) {
        let run_now = {
            let mut st = self.lock();
            match st.table.get_mut(&pid) {
                None => true,
                Some(slot) => {
                    if slot.binding_seq == seq {
                        if let SlotState::Parked { root: Task::Binding { cancel: slot_cancel, .. }, .. } =
                            &mut slot.state
                        {
                            *slot_cancel = Some(cancel);
                            return;
                        }
                    }
                    false
                }
            }
        };
        if run_now {
            cancel();
        }
    }

    /// Pops one mailbox message for a `receive` transition.
    pub(crate) fn pop_mailbox(&self, pid: ProcessId) -> MailboxPop {
        let mut st = self.lock();
        match st.table.get_mut(&pid) {
            None => MailboxPop::Dead,
            Some(slot) => match slot.mailbox.pop_front() {
                Some(msg) => MailboxPop::Message(msg),
                None => MailboxPop::Empty,
            },
        }
    }

    /// Drops a process's slot after a kill or panic observed mid-step.
    pub(crate) fn discard(&self, pid: ProcessId) {
        self.lock().table.remove(&pid);
    }

    /// Reclaims the slot of a process that ran to completion.
    ///
    /// A `Succeed` or `Fail` with no frames left ends the process; nothing
    /// can make it runnable again, so the slot (mailbox included) is removed
    /// rather than parked.
    pub(crate) fn complete(&self, pid: ProcessId) {
        self.lock().table.remove(&pid);
        self.inner.bus.publish(Event::new(EventKind::ProcessCompleted).with_pid(pid));
    }

    /// Kills a process immediately: runs a suspended binding's cancel thunk
    /// (exactly once) and removes the slot.
    pub(crate) fn raw_kill(&self, pid: ProcessId) {
        let cancel = {
            let mut st = self.lock();
            let Some(mut slot) = st.table.remove(&pid) else { return };
            slot.killed.cancel();
            match &mut slot.state {
                SlotState::Parked { root: Task::Binding { cancel, .. }, .. } => cancel.take(),
                _ => None,
            }
        };
        if let Some(cancel) = cancel {
            cancel();
        }
        self.inner.bus.publish(Event::new(EventKind::ProcessKilled).with_pid(pid));
    }

    // ---------------------------
    // Async pump
    // ---------------------------

    /// Schedules a tick on the ambient tokio runtime unless one is already
    /// pending. No-op outside tokio.
    fn schedule_work(&self) {
        {
            let mut st = self.lock();
            if st.working || st.queue.is_empty() {
                return;
            }
            let Ok(handle) = tokio::runtime::Handle::try_current() else { return };
            st.working = true;
            let me = self.clone();
            handle.spawn(async move { me.pump().await });
        }
    }

    /// Tick, yield, repeat — until the queue drains or the panic policy
    /// aborts the runtime. The yield keeps host I/O ahead of runtime churn.
    async fn pump(self) {
        loop {
            let result = self.tick();
            let stop = {
                let mut st = self.lock();
                if result.is_err() || st.queue.is_empty() {
                    st.working = false;
                    true
                } else {
                    false
                }
            };
            if stop {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SchedState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
