//! # Program bootstrap and ports.
//!
//! [`Program`] describes an application; [`RuntimeBuilder`] wires it to a
//! scheduler and its effect managers. [`ports`](self) provide the typed
//! JSON boundary between the running program and its host.

mod ports;
mod runtime;

pub use ports::{incoming, outgoing, IncomingPort, OutgoingPort, PortSubscription};
pub use runtime::{Program, Runtime, RuntimeBuilder};
