//! # Untyped payload currency.
//!
//! The scheduler moves values between heterogeneous processes: task results,
//! failure values, mailbox messages, and effect payloads all flow through the
//! same channels. [`Value`] erases their types (`Box<dyn Any + Send>`); typed
//! combinators downcast at the boundary.
//!
//! ## Contract
//! - A payload is immutable once enqueued: ownership moves with the message,
//!   there is no sharing across processes.
//! - A failed downcast in a typed combinator is a wiring bug, not a runtime
//!   condition; it panics and the stepper isolates the offending process.

use std::any::Any;

/// Type-erased payload moved between tasks, mailboxes, and effect managers.
pub type Value = Box<dyn Any + Send>;

/// Erases a concrete payload into a [`Value`].
///
/// # Example
/// ```
/// use taskloom::{value, from_value};
///
/// let v = value(41_i64);
/// assert_eq!(from_value::<i64>(v), Some(41));
/// ```
#[inline]
#[must_use]
pub fn value<T: Any + Send>(v: T) -> Value {
    Box::new(v)
}

/// Recovers a concrete payload from a [`Value`].
///
/// Returns `None` if the payload holds a different type; the original box is
/// dropped in that case.
#[inline]
#[must_use]
pub fn from_value<T: Any>(v: Value) -> Option<T> {
    v.downcast::<T>().ok().map(|b| *b)
}

/// Downcasts or panics with a diagnosable message.
///
/// Used by the typed task combinators, where a mismatch means the task tree
/// was wired with incompatible types. The panic is caught by the stepper and
/// handled per the configured panic policy.
#[inline]
pub(crate) fn expect_value<T: Any>(v: Value, context: &'static str) -> T {
    match v.downcast::<T>() {
        Ok(b) => *b,
        Err(_) => panic!(
            "{context}: payload is not a {}",
            std::any::type_name::<T>()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let v = value(String::from("hello"));
        assert_eq!(from_value::<String>(v).as_deref(), Some("hello"));
    }

    #[test]
    fn test_mismatch_is_none() {
        let v = value(1_u8);
        assert!(from_value::<String>(v).is_none());
    }

    #[test]
    #[should_panic(expected = "payload is not a")]
    fn test_expect_value_panics_on_mismatch() {
        let v = value(1_u8);
        let _: String = expect_value(v, "test");
    }
}
