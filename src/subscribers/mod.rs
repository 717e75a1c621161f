//! # Subscribers: pluggable diagnostics consumers.
//!
//! The scheduler and dispatcher publish [`Event`](crate::events::Event)s on
//! the bus; a [`SubscriberSet`] fans them out to [`Subscribe`]
//! implementations without ever blocking the runtime.

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
