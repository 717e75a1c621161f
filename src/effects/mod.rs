//! # Effects: declarative bags, managers, and dispatch.
//!
//! Applications declare effects as [`Bag`] trees; registered
//! [`EffectManager`]s interpret them. The [`Router`] is the narrow channel a
//! manager speaks back on. Gathering and per-cycle delivery live in
//! [`dispatch`](self).

mod bag;
mod dispatch;
mod manager;
mod router;

pub use bag::{batch, leaf, map, map_value, none, Bag, Home, Tagger, TaggerChain};
pub use manager::{EffectManager, EffectMap, OnEffects, OnSelfMsg, Registry};
pub use router::Router;

pub(crate) use dispatch::dispatch_effects;
pub(crate) use manager::{instantiate, ManagerInstance};
