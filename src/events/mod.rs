//! # Diagnostics event system.
//!
//! Provides the advisory observability layer of the runtime:
//! - [`Event`] / [`EventKind`] — what happened, with a global sequence number
//! - [`Bus`] — bounded broadcast channel the scheduler publishes into
//!
//! Everything here is fire-and-forget: the scheduler never blocks on, or
//! depends on, a diagnostics consumer.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
