//! # The process stepper.
//!
//! [`step`] advances one checked-out process until it finishes, suspends, is
//! killed, panics, or the shared tick budget runs out. It is the state
//! machine at the center of the runtime; every transition below mirrors one
//! arm of the task algebra.
//!
//! ## Transition table
//! - `Succeed(v)` — pop frames, skipping `on_error` frames, until an
//!   `and_then` frame applies `v`; an empty stack means the process finished
//!   and its slot is reclaimed.
//! - `Fail(e)` — symmetric: skip `and_then` frames, apply the first
//!   `on_error`; an empty stack means the failure is unhandled and dropped,
//!   and the process finished all the same.
//! - `AndThen`/`OnError` — push a continuation frame and descend.
//! - `Binding` — park the process first, hand a one-shot resume to `start`,
//!   store any returned cancel thunk, and suspend regardless of remaining
//!   budget.
//! - `Receive` — pop one mailbox message or suspend until one arrives.
//!
//! The loop is iterative: continuations live in the frame vector, never on
//! the host call stack. User callbacks run under `catch_unwind`; a panic
//! aborts only this process and is surfaced to the caller.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio_util::sync::CancellationToken;

use crate::tasks::{Resume, Task, Value};

use super::process::{Frame, FrameKind, ProcessId};
use super::scheduler::{MailboxPop, Scheduler};

/// How a call to [`step`] left the process.
pub(crate) enum StepOutcome {
    /// Reached `Succeed` with an empty stack; slot reclaimed.
    Done { budget: usize },
    /// Reached `Fail` with an empty stack; slot reclaimed, failure value
    /// dropped.
    UnhandledFailure { budget: usize },
    /// Suspended on a binding or an empty mailbox; parked, re-enqueued by
    /// resume or send.
    Suspended { budget: usize },
    /// Shared budget ran out mid-chain; parked and re-enqueued at the tail.
    BudgetExhausted,
    /// The process was killed while stepping; state dropped.
    Killed { budget: usize },
    /// A user callback panicked; the process was removed.
    Panicked { budget: usize, reason: String },
}

/// Advances one process with the remaining shared budget.
///
/// `root`/`stack` are the checked-out task tree; the slot itself stays in the
/// scheduler's table (state `Running`) so the mailbox remains reachable.
pub(crate) fn step(
    sched: &Scheduler,
    pid: ProcessId,
    killed: &CancellationToken,
    mut root: Task,
    mut stack: Vec<Frame>,
    mut budget: usize,
) -> StepOutcome {
    loop {
        // A kill may land at any point between transitions, including from a
        // callback this very loop just ran.
        if killed.is_cancelled() {
            sched.discard(pid);
            return StepOutcome::Killed { budget };
        }
        if budget == 0 {
            sched.park_and_requeue(pid, root, stack);
            return StepOutcome::BudgetExhausted;
        }

        match root {
            Task::Succeed(v) => {
                while matches!(stack.last(), Some(f) if f.kind == FrameKind::OnError) {
                    stack.pop();
                }
                match stack.pop() {
                    None => {
                        sched.complete(pid);
                        return StepOutcome::Done { budget };
                    }
                    Some(frame) => match apply(frame.callback, v) {
                        Ok(next) => {
                            root = next;
                            budget -= 1;
                        }
                        Err(reason) => {
                            sched.discard(pid);
                            return StepOutcome::Panicked { budget, reason };
                        }
                    },
                }
            }

            Task::Fail(e) => {
                while matches!(stack.last(), Some(f) if f.kind == FrameKind::AndThen) {
                    stack.pop();
                }
                match stack.pop() {
                    None => {
                        sched.complete(pid);
                        return StepOutcome::UnhandledFailure { budget };
                    }
                    Some(frame) => match apply(frame.callback, e) {
                        Ok(next) => {
                            root = next;
                            budget -= 1;
                        }
                        Err(reason) => {
                            sched.discard(pid);
                            return StepOutcome::Panicked { budget, reason };
                        }
                    },
                }
            }

            Task::AndThen { callback, inner } => {
                stack.push(Frame { kind: FrameKind::AndThen, callback });
                root = *inner;
                budget -= 1;
            }

            Task::OnError { handler, inner } => {
                stack.push(Frame { kind: FrameKind::OnError, callback: handler });
                root = *inner;
                budget -= 1;
            }

            Task::Binding { mut start, cancel } => {
                let Some(start) = start.take() else {
                    // Already started earlier (stale queue entry); keep
                    // waiting without disturbing the pending resume.
                    sched.park(pid, Task::Binding { start: None, cancel }, stack);
                    return StepOutcome::Suspended { budget };
                };

                // Park before invoking start: a resume may fire synchronously
                // from inside it, and kills must find the suspended binding.
                let Some(seq) = sched.park_for_binding(pid, cancel, stack) else {
                    return StepOutcome::Killed { budget };
                };

                let resume = {
                    let sched = sched.clone();
                    Resume::new(move |task| sched.resolve_binding(pid, seq, task))
                };

                match catch_unwind(AssertUnwindSafe(move || start(resume))) {
                    Ok(Some(cancel)) => sched.store_cancel(pid, seq, cancel),
                    Ok(None) => {}
                    Err(payload) => {
                        sched.discard(pid);
                        return StepOutcome::Panicked { budget, reason: panic_reason(payload) };
                    }
                }
                return StepOutcome::Suspended { budget };
            }

            Task::Receive(handler) => match sched.pop_mailbox(pid) {
                MailboxPop::Message(msg) => match apply(handler, msg) {
                    Ok(next) => {
                        root = next;
                        budget -= 1;
                    }
                    Err(reason) => {
                        sched.discard(pid);
                        return StepOutcome::Panicked { budget, reason };
                    }
                },
                MailboxPop::Empty => {
                    sched.park(pid, Task::Receive(handler), stack);
                    return StepOutcome::Suspended { budget };
                }
                MailboxPop::Dead => {
                    return StepOutcome::Killed { budget };
                }
            },
        }
    }
}

/// Runs a user continuation under `catch_unwind`.
fn apply(
    callback: Box<dyn FnOnce(Value) -> Task + Send>,
    v: Value,
) -> Result<Task, String> {
    catch_unwind(AssertUnwindSafe(move || callback(v))).map_err(panic_reason)
}

/// Best-effort panic payload description.
fn panic_reason(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
