//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! This is primarily useful for development, debugging, and examples.
//!
//! ## Output format
//! ```text
//! [spawned] pid=#1
//! [completed] pid=#1
//! [killed] pid=#3
//! [unhandled-failure] pid=#2
//! [panicked] pid=#2 reason="payload is not a i32"
//! [tick-deferred] steps=10000
//! [manager-registered] home=ports.prices
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions to stdout for debugging and demonstration purposes.
///
/// Not intended for production use - implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::ProcessSpawned => {
                if let Some(pid) = e.pid {
                    println!("[spawned] pid={pid}");
                }
            }
            EventKind::ProcessCompleted => {
                if let Some(pid) = e.pid {
                    println!("[completed] pid={pid}");
                }
            }
            EventKind::ProcessKilled => {
                if let Some(pid) = e.pid {
                    println!("[killed] pid={pid}");
                }
            }
            EventKind::UnhandledFailure => {
                println!("[unhandled-failure] pid={:?}", e.pid);
            }
            EventKind::ProcessPanicked => {
                println!("[panicked] pid={:?} reason={:?}", e.pid, e.reason);
            }
            EventKind::TickDeferred => {
                println!("[tick-deferred] steps={:?}", e.steps);
            }
            EventKind::ManagerRegistered => {
                println!("[manager-registered] home={:?}", e.home);
            }
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] {:?}", e.reason);
            }
            EventKind::SubscriberPanicked => {
                println!("[subscriber-panicked] {:?}", e.reason);
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
