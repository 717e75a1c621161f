//! # Scheduler core: processes, stepping, and the work queue.
//!
//! The only public API from this module is the [`Scheduler`] (plus the
//! [`ProcessId`] handle and [`TickReport`]); it owns the process table and
//! multiplexes all processes cooperatively on one logical thread.
//!
//! Internal modules:
//! - [`process`]: the process slot (task tree, continuation stack, mailbox);
//! - [`stepper`]: the budgeted state machine advancing one process;
//! - [`scheduler`]: work queue, ticks, spawn/send/kill/sleep, async pump.

mod process;
mod scheduler;
mod stepper;

pub use process::ProcessId;
pub use scheduler::{Scheduler, TickReport};
