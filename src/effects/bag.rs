//! # Effect bags: declarative batches of commands and subscriptions.
//!
//! A [`Bag`] is an immutable tree built fresh by application code on every
//! update cycle and discarded after gathering. It describes *what* effects to
//! run; effect managers decide *how*.
//!
//! ## Shape
//! - `Leaf(home, value)` — one command or subscription owned by the manager
//!   registered under `home`;
//! - `Batch(children)` — several bags declared together;
//! - `Map(tagger, child)` — re-tags the messages the child's effects will
//!   eventually produce (component composition).
//!
//! ## Tagger composition
//! Taggers collected on the way down from the root compose from the leaf
//! outward: the outermost `map` is applied last. [`TaggerChain::apply`]
//! implements exactly that order.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::tasks::{expect_value, value, Value};

/// Key naming the effect manager a leaf belongs to.
pub type Home = Arc<str>;

/// Message re-tagging function collected from `map` nodes.
pub type Tagger = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Declarative batch of commands or subscriptions.
pub enum Bag {
    /// One effect for the manager registered under `home`.
    Leaf { home: Home, value: Value },
    /// Several bags declared together; gathered in declaration order.
    Batch(Vec<Bag>),
    /// Applies `tagger` to every message produced under `bag`.
    Map { tagger: Tagger, bag: Box<Bag> },
}

impl fmt::Debug for Bag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bag::Leaf { home, .. } => write!(f, "leaf({home})"),
            Bag::Batch(children) => {
                write!(f, "batch[")?;
                for (i, c) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{c:?}")?;
                }
                write!(f, "]")
            }
            Bag::Map { bag, .. } => write!(f, "map({bag:?})"),
        }
    }
}

/// One effect targeting the manager registered under `home`.
#[must_use]
pub fn leaf(home: impl Into<Home>, payload: impl Any + Send) -> Bag {
    Bag::Leaf { home: home.into(), value: value(payload) }
}

/// Several bags declared together.
#[must_use]
pub fn batch(bags: Vec<Bag>) -> Bag {
    Bag::Batch(bags)
}

/// The empty bag: no commands, no subscriptions.
#[must_use]
pub fn none() -> Bag {
    Bag::Batch(Vec::new())
}

/// Re-tags every message produced under `bag`.
///
/// Typed sugar over [`map_value`]: the tagger maps one message type to
/// another.
#[must_use]
pub fn map<A, B>(tagger: impl Fn(A) -> B + Send + Sync + 'static, bag: Bag) -> Bag
where
    A: Any + Send,
    B: Any + Send,
{
    map_value(move |v| value(tagger(expect_value::<A>(v, "bag tagger"))), bag)
}

/// Untyped [`map`]: the tagger works on raw [`Value`]s.
#[must_use]
pub fn map_value(tagger: impl Fn(Value) -> Value + Send + Sync + 'static, bag: Bag) -> Bag {
    Bag::Map { tagger: Arc::new(tagger), bag: Box::new(bag) }
}

/// Taggers collected while descending from the bag root to a leaf.
///
/// Pushed in descent order (outermost first); applied leaf-outward, so the
/// outermost `map` runs last.
#[derive(Clone, Default)]
pub struct TaggerChain(Vec<Tagger>);

impl TaggerChain {
    pub(crate) fn push(&mut self, tagger: Tagger) {
        self.0.push(tagger);
    }

    /// Applies the whole chain to one message value.
    #[must_use]
    pub fn apply(&self, v: Value) -> Value {
        self.0.iter().rev().fold(v, |v, tagger| tagger(v))
    }

    /// True when no `map` wrapped the leaf.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::from_value;

    #[test]
    fn test_none_is_empty_batch() {
        assert!(matches!(none(), Bag::Batch(v) if v.is_empty()));
    }

    #[test]
    fn test_chain_applies_outermost_last() {
        // map(outer, map(inner, leaf)): descending pushes outer then inner.
        let mut chain = TaggerChain::default();
        chain.push(Arc::new(|v| value(format!("outer({})", from_value::<String>(v).unwrap()))));
        chain.push(Arc::new(|v| value(format!("inner({})", from_value::<i32>(v).unwrap()))));

        let out = chain.apply(value(7_i32));
        assert_eq!(from_value::<String>(out).as_deref(), Some("outer(inner(7))"));
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let chain = TaggerChain::default();
        assert!(chain.is_empty());
        assert_eq!(from_value::<i32>(chain.apply(value(3_i32))), Some(3));
    }

    #[test]
    fn test_typed_map_wraps_bag() {
        let bag = map(|n: i32| n + 1, leaf("demo", 1_i32));
        assert!(matches!(bag, Bag::Map { .. }));
    }
}
