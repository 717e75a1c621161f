//! # Task algebra and payload types.
//!
//! This module provides the core computation-description types:
//! - [`Task`] — closed variant set describing a suspendable computation
//! - [`Resume`] — one-shot delivery capability handed to bindings
//! - [`Value`] — type-erased payload moved between processes
//!
//! Tasks are pure data; they run only when spawned into a process on a
//! [`Scheduler`](crate::core::Scheduler).

mod task;
mod value;

pub use task::{
    binding, fail, fail_value, receive, receive_value, succeed, succeed_value, Callback, Cancel,
    Resume, Start, Task,
};
pub use value::{from_value, value, Value};

pub(crate) use value::expect_value;
