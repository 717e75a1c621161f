//! Error types used by the taskloom runtime and ports.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] — errors raised by the scheduling/dispatch runtime itself.
//! - [`PortError`] — errors raised at the port boundary (host payload decoding).
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging and
//! diagnostics.
//!
//! An application-level task failure is **not** represented here: a failing
//! task carries an arbitrary error *value* through `Task::Fail` (recovered by
//! the nearest `on_error`, or dropped at the top). Budget exhaustion is not an
//! error either; a deferred process is just latency.

use thiserror::Error;

use crate::core::ProcessId;

/// # Errors produced by the taskloom runtime.
///
/// These represent failures in the scheduling and effect-dispatch machinery,
/// such as wiring a command to a manager key nobody registered.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// An effect manager (or port) was registered twice under the same home.
    ///
    /// Fatal at setup time: each home maps to exactly one manager process for
    /// the program's lifetime.
    #[error("effect manager already registered for home {home:?}")]
    DuplicateHome {
        /// The colliding manager key.
        home: String,
    },

    /// A command/subscription leaf targeted a home with no registered manager.
    ///
    /// Fatal at dispatch time: the bag was built against a manager that does
    /// not exist, so there is nowhere to deliver it.
    #[error("no effect manager registered for home {home:?}")]
    UnknownHome {
        /// The unresolved manager key.
        home: String,
    },

    /// A user callback panicked while its process was being stepped.
    ///
    /// Only surfaced by [`Scheduler::tick`] under
    /// [`PanicPolicy::AbortRuntime`]; the default policy aborts just the
    /// offending process and publishes a `ProcessPanicked` event instead.
    ///
    /// [`Scheduler::tick`]: crate::core::Scheduler::tick
    /// [`PanicPolicy::AbortRuntime`]: crate::config::PanicPolicy
    #[error("process {pid} panicked while stepping: {reason}")]
    ProcessPanicked {
        /// The aborted process.
        pid: ProcessId,
        /// Best-effort panic payload description.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskloom::RuntimeError;
    ///
    /// let err = RuntimeError::UnknownHome { home: "Http".into() };
    /// assert_eq!(err.as_label(), "runtime_unknown_home");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::DuplicateHome { .. } => "runtime_duplicate_home",
            RuntimeError::UnknownHome { .. } => "runtime_unknown_home",
            RuntimeError::ProcessPanicked { .. } => "runtime_process_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::DuplicateHome { home } => format!("duplicate home: {home}"),
            RuntimeError::UnknownHome { home } => format!("unknown home: {home}"),
            RuntimeError::ProcessPanicked { pid, reason } => {
                format!("process {pid} panicked: {reason}")
            }
        }
    }
}

/// # Errors produced at the port boundary.
///
/// Ports carry opaque host payloads into and out of the runtime; the only
/// thing that can go wrong inside the core is decoding an incoming payload.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PortError {
    /// An incoming payload did not decode into the port's expected type.
    #[error("port {port:?} rejected incoming payload: {reason}")]
    Decode {
        /// Name of the incoming port.
        port: String,
        /// Decoder error description.
        reason: String,
    },

    /// A send on an incoming port before its runtime started.
    ///
    /// The port is connected during the first dispatch cycle after
    /// [`RuntimeBuilder::start`](crate::program::RuntimeBuilder::start).
    #[error("port {port:?} is not connected to a running program")]
    NotConnected {
        /// Name of the incoming port.
        port: String,
    },
}

impl PortError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PortError::Decode { .. } => "port_decode",
            PortError::NotConnected { .. } => "port_not_connected",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            PortError::Decode { port, reason } => format!("port {port}: {reason}"),
            PortError::NotConnected { port } => format!("port {port}: not connected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        let dup = RuntimeError::DuplicateHome { home: "Time".into() };
        assert_eq!(dup.as_label(), "runtime_duplicate_home");

        let decode = PortError::Decode {
            port: "prices".into(),
            reason: "expected number".into(),
        };
        assert_eq!(decode.as_label(), "port_decode");
        assert!(decode.as_message().contains("prices"));
    }
}
