//! # Global runtime configuration.
//!
//! Provides [`Config`], centralized settings for a [`Scheduler`] instance.
//!
//! Config is consumed in two places:
//! 1. **Scheduler creation**: `Scheduler::new(config)`
//! 2. **Runtime bootstrap**: `Runtime::builder(config)`
//!
//! ## Sentinel values
//! - `max_steps = 0` → clamped to 1 (a tick always makes progress)
//! - `bus_capacity = 0` → clamped to 1 by the Bus
//!
//! [`Scheduler`]: crate::core::Scheduler
//! [`Runtime`]: crate::program::Runtime

/// What to do when a `Fail` reaches the top of a process with no `on_error`
/// frame left to catch it.
///
/// The default is to drop the value: an unhandled failure at top
/// level indicates a logic gap in the program, not a scheduler bug. Reporting
/// makes that gap visible on the diagnostics bus instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Silently drop the unhandled failure value.
    #[default]
    Drop,
    /// Drop the value but publish an `UnhandledFailure` event.
    Report,
}

/// What to do when a user callback panics while its process is stepped.
///
/// A panic here is the closed-enum analogue of stepper corruption: the task
/// tree itself cannot be malformed, but a callback (or a payload downcast)
/// can still blow up. Either way the offending process never runs again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PanicPolicy {
    /// Abort only the offending process and publish a `ProcessPanicked`
    /// event; other processes and the scheduler are unaffected.
    #[default]
    AbortProcess,
    /// Abort the offending process **and** surface
    /// [`RuntimeError::ProcessPanicked`](crate::RuntimeError) from
    /// [`Scheduler::tick`](crate::core::Scheduler::tick).
    AbortRuntime,
}

/// Global configuration for one scheduler/runtime instance.
///
/// Defines:
/// - **Fairness**: the shared per-tick step budget
/// - **Diagnostics**: bus capacity for event delivery
/// - **Policies**: unhandled-failure and callback-panic handling
///
/// ## Field semantics
/// - `max_steps`: total task transitions per tick, shared across all runnable
///   processes (min 1; clamped by the scheduler)
/// - `bus_capacity`: diagnostics bus ring buffer size (min 1; clamped by Bus)
/// - `failure_policy`: see [`FailurePolicy`]
/// - `panic_policy`: see [`PanicPolicy`]
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Shared step budget for one tick of the work queue.
    ///
    /// A process that exhausts the remaining budget mid-chain is re-enqueued
    /// at the tail and resumes on the next tick; this is observable only as
    /// latency, never as lost work.
    pub max_steps: usize,

    /// Capacity of the diagnostics bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` events will
    /// observe `Lagged` and skip older items. Minimum value is 1.
    pub bus_capacity: usize,

    /// Handling of failures that reach the top of a process uncaught.
    pub failure_policy: FailurePolicy,

    /// Handling of panicking user callbacks.
    pub panic_policy: PanicPolicy,
}

impl Default for Config {
    /// Returns a configuration with:
    /// - `max_steps = 10_000`;
    /// - `bus_capacity = 256`;
    /// - `failure_policy = Drop`;
    /// - `panic_policy = AbortProcess`.
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            bus_capacity: 256,
            failure_policy: FailurePolicy::Drop,
            panic_policy: PanicPolicy::AbortProcess,
        }
    }
}

impl Config {
    /// Effective per-tick budget (sentinel-safe).
    #[inline]
    #[must_use]
    pub fn budget(&self) -> usize {
        self.max_steps.max(1)
    }
}
