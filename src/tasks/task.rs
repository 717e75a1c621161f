//! # The task algebra.
//!
//! A [`Task`] is an immutable description of a suspendable success/failure
//! computation. It does nothing by itself; a [`Scheduler`] steps it inside a
//! process. The variant set is closed and matched exhaustively by the stepper.
//!
//! ## Variants
//! - `Succeed(v)` / `Fail(e)` — finished with a value or an error value.
//! - `Binding` — awaits an external asynchronous callback; the only place a
//!   cancel thunk can live.
//! - `AndThen` / `OnError` — the two continuation-creating operations.
//! - `Receive` — awaits one message from the owning process's mailbox.
//!
//! ## Laws
//! - `and_then(f, fail(e))` never invokes `f`; `on_error(f, succeed(v))`
//!   never invokes `f` (short-circuit).
//! - `and_then(g, and_then(f, t))` behaves identically to
//!   `and_then(|x| and_then(g, f(x)), t)` (associativity).
//!
//! Continuations are captured as `FnOnce` closures: each callback fires at
//! most once, and the chain is unwound iteratively by the stepper, never on
//! the host call stack.
//!
//! [`Scheduler`]: crate::core::Scheduler

use std::any::Any;
use std::fmt;

use super::value::{expect_value, value, Value};

/// Continuation invoked with a finished value, producing the next task.
pub type Callback = Box<dyn FnOnce(Value) -> Task + Send>;

/// Thunk that cancels a suspended binding's external work.
pub type Cancel = Box<dyn FnOnce() + Send>;

/// Function starting a binding's external work.
///
/// Receives a one-shot [`Resume`] and may return a cancel thunk. It must
/// resolve the resume exactly once — immediately, before returning, or later
/// from any thread.
pub type Start = Box<dyn FnOnce(Resume) -> Option<Cancel> + Send>;

/// One-shot capability to deliver a binding's result.
///
/// The "resolve at most once" guard is ownership: `resolve` consumes the
/// value, so a second invocation does not compile. A resume that outlives its
/// process (killed, or already resolved through another path) is a no-op.
pub struct Resume {
    deliver: Box<dyn FnOnce(Task) + Send>,
}

impl Resume {
    pub(crate) fn new(deliver: impl FnOnce(Task) + Send + 'static) -> Self {
        Self { deliver: Box::new(deliver) }
    }

    /// Delivers the task the suspended process should continue with and
    /// re-enqueues that process on its scheduler's work queue.
    pub fn resolve(self, task: Task) {
        (self.deliver)(task);
    }
}

impl fmt::Debug for Resume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Resume")
    }
}

/// Description of a suspendable success/failure computation.
///
/// Build with the free constructors ([`succeed`], [`fail`], [`binding`],
/// [`receive`]) and chain with [`Task::and_then`] / [`Task::on_error`].
pub enum Task {
    /// Finished successfully with a value.
    Succeed(Value),
    /// Finished with an application error value.
    Fail(Value),
    /// Awaiting an external asynchronous callback.
    ///
    /// `start` is taken exactly once when the stepper suspends here; `cancel`
    /// is filled in afterwards if `start` returned a thunk, and consumed by
    /// `kill`.
    Binding {
        start: Option<Start>,
        cancel: Option<Cancel>,
    },
    /// Run `inner`, then feed its success value to `callback`.
    AndThen { callback: Callback, inner: Box<Task> },
    /// Run `inner`, recovering a failure value with `handler`.
    OnError { handler: Callback, inner: Box<Task> },
    /// Awaiting one message from the owning process's mailbox.
    Receive(Callback),
}

impl Task {
    /// Sequences `self`, feeding its success value (downcast to `A`) to `f`.
    ///
    /// # Example
    /// ```
    /// use taskloom::{succeed, Task};
    ///
    /// let t: Task = succeed(41_i64).and_then(|n: i64| succeed(n + 1));
    /// ```
    #[must_use]
    pub fn and_then<A: Any>(self, f: impl FnOnce(A) -> Task + Send + 'static) -> Task {
        self.and_then_value(|v| f(expect_value(v, "and_then")))
    }

    /// Untyped [`Task::and_then`]: the callback receives the raw [`Value`].
    #[must_use]
    pub fn and_then_value(self, f: impl FnOnce(Value) -> Task + Send + 'static) -> Task {
        Task::AndThen { callback: Box::new(f), inner: Box::new(self) }
    }

    /// Recovers a failure of `self`, feeding the error value (downcast to
    /// `E`) to `f`. Success values pass through untouched.
    #[must_use]
    pub fn on_error<E: Any>(self, f: impl FnOnce(E) -> Task + Send + 'static) -> Task {
        self.on_error_value(|v| f(expect_value(v, "on_error")))
    }

    /// Untyped [`Task::on_error`]: the handler receives the raw [`Value`].
    #[must_use]
    pub fn on_error_value(self, f: impl FnOnce(Value) -> Task + Send + 'static) -> Task {
        Task::OnError { handler: Box::new(f), inner: Box::new(self) }
    }

    /// Variant name, for diagnostics.
    #[must_use]
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Task::Succeed(_) => "succeed",
            Task::Fail(_) => "fail",
            Task::Binding { .. } => "binding",
            Task::AndThen { .. } => "and_then",
            Task::OnError { .. } => "on_error",
            Task::Receive(_) => "receive",
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind_name())
    }
}

/// A task that immediately succeeds with `v`.
#[must_use]
pub fn succeed<T: Any + Send>(v: T) -> Task {
    Task::Succeed(value(v))
}

/// [`succeed`] over an already-erased [`Value`].
#[must_use]
pub fn succeed_value(v: Value) -> Task {
    Task::Succeed(v)
}

/// A task that immediately fails with the error value `e`.
#[must_use]
pub fn fail<E: Any + Send>(e: E) -> Task {
    Task::Fail(value(e))
}

/// [`fail`] over an already-erased [`Value`].
#[must_use]
pub fn fail_value(v: Value) -> Task {
    Task::Fail(v)
}

/// A task awaiting external asynchronous work.
///
/// `start` is invoked once when the owning process suspends here. It receives
/// a one-shot [`Resume`] and may return a cancel thunk, which `kill` will run
/// if the process dies while still suspended.
///
/// # Example
/// ```
/// use taskloom::{binding, succeed};
///
/// // Resolve synchronously, nothing to cancel.
/// let t = binding(|resume| {
///     resume.resolve(succeed(()));
///     None
/// });
/// # let _ = t;
/// ```
#[must_use]
pub fn binding(start: impl FnOnce(Resume) -> Option<Cancel> + Send + 'static) -> Task {
    Task::Binding { start: Some(Box::new(start)), cancel: None }
}

/// A task awaiting one mailbox message, downcast to `M`.
#[must_use]
pub fn receive<M: Any>(handler: impl FnOnce(M) -> Task + Send + 'static) -> Task {
    receive_value(|v| handler(expect_value(v, "receive")))
}

/// Untyped [`receive`]: the handler gets the raw [`Value`].
#[must_use]
pub fn receive_value(handler: impl FnOnce(Value) -> Task + Send + 'static) -> Task {
    Task::Receive(Box::new(handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_build_expected_variants() {
        assert!(matches!(succeed(1_u8), Task::Succeed(_)));
        assert!(matches!(fail("boom"), Task::Fail(_)));
        assert!(matches!(receive(|_: u8| succeed(())), Task::Receive(_)));
        assert!(matches!(
            binding(|_| None),
            Task::Binding { start: Some(_), cancel: None }
        ));
    }

    #[test]
    fn test_chaining_nests_inner_first() {
        let t = succeed(1_u8).and_then(|n: u8| succeed(n)).on_error(|_: u8| succeed(0_u8));
        let Task::OnError { inner, .. } = t else { panic!("expected on_error") };
        assert!(matches!(*inner, Task::AndThen { .. }));
    }

    #[test]
    fn test_debug_prints_kind() {
        assert_eq!(format!("{:?}", succeed(())), "succeed");
        assert_eq!(format!("{:?}", fail(())), "fail");
    }
}
