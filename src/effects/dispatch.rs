//! # Gathering and dispatch.
//!
//! One dispatch cycle turns the command and subscription bags produced by an
//! update into exactly one `Effects` message per registered manager:
//!
//! ```text
//!  cmd bag ─┐
//!           ├─ gather ──▶ {home → (cmds, subs)} ──▶ send to every manager
//!  sub bag ─┘
//! ```
//!
//! ## Rules
//! - Leaves are collected in declaration order within each home.
//! - Tagger chains from `map` nodes are resolved here, at gathering time;
//!   managers only ever see final payloads.
//! - Every registered manager receives a message each cycle, even when both
//!   of its lists are empty, so managers can treat "no subscriptions" as a
//!   signal to tear state down.
//! - Managers are mailed in registration order, so a cycle's deliveries are
//!   reproducible run to run.
//! - A leaf naming an unregistered home aborts the cycle with
//!   [`RuntimeError::UnknownHome`]; nothing is delivered.

use std::collections::HashMap;

use crate::core::Scheduler;
use crate::error::RuntimeError;
use crate::tasks::{value, Value};

use super::bag::{Bag, Home, TaggerChain};
use super::manager::{ManagerInstance, ManagerMsg};

#[derive(Default)]
struct Gathered {
    cmds: Vec<Value>,
    subs: Vec<Value>,
}

/// Runs one dispatch cycle over the registered managers, in registration
/// order.
pub(crate) fn dispatch_effects(
    sched: &Scheduler,
    instances: &[(Home, ManagerInstance)],
    cmd_bag: Bag,
    sub_bag: Bag,
) -> Result<(), RuntimeError> {
    let mut gathered: HashMap<Home, Gathered> = HashMap::new();
    gather(true, cmd_bag, &TaggerChain::default(), instances, &mut gathered)?;
    gather(false, sub_bag, &TaggerChain::default(), instances, &mut gathered)?;

    for (home, inst) in instances {
        let fx = gathered.remove(home).unwrap_or_default();
        sched.send(inst.pid, value(ManagerMsg::Effects { cmds: fx.cmds, subs: fx.subs }));
    }
    Ok(())
}

/// Walks one bag tree, translating leaf payloads through the home's effect
/// map (or the bare tagger chain) and bucketing them per home.
fn gather(
    is_cmd: bool,
    bag: Bag,
    chain: &TaggerChain,
    instances: &[(Home, ManagerInstance)],
    gathered: &mut HashMap<Home, Gathered>,
) -> Result<(), RuntimeError> {
    match bag {
        Bag::Leaf { home, value: payload } => {
            let Some(inst) = instances.iter().find(|(h, _)| *h == home).map(|(_, i)| i) else {
                return Err(RuntimeError::UnknownHome { home: home.to_string() });
            };
            let effect_map = if is_cmd { &inst.cmd_map } else { &inst.sub_map };
            let translated = match effect_map {
                Some(map) => map(chain, payload),
                None => chain.apply(payload),
            };
            let bucket = gathered.entry(home).or_default();
            if is_cmd {
                bucket.cmds.push(translated);
            } else {
                bucket.subs.push(translated);
            }
            Ok(())
        }

        Bag::Batch(children) => {
            for child in children {
                gather(is_cmd, child, chain, instances, gathered)?;
            }
            Ok(())
        }

        Bag::Map { tagger, bag } => {
            let mut chain = chain.clone();
            chain.push(tagger);
            gather(is_cmd, *bag, &chain, instances, gathered)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::effects::bag::{batch, leaf, map, none};
    use crate::effects::manager::{instantiate, EffectManager};
    use crate::tasks::{from_value, succeed, succeed_value};
    use std::sync::{Arc, Mutex};

    type BatchLog = Arc<Mutex<Vec<(Vec<i32>, Vec<i32>)>>>;

    /// Manager that records every gathered batch as plain integers.
    fn recording_manager(log: BatchLog) -> EffectManager {
        EffectManager::new(
            succeed(()),
            move |_router, cmds, subs, state| {
                let ints = |vs: Vec<Value>| {
                    vs.into_iter().map(|v| from_value::<i32>(v).unwrap()).collect::<Vec<_>>()
                };
                log.lock().unwrap().push((ints(cmds), ints(subs)));
                succeed_value(state)
            },
            |_router, _msg, state| succeed_value(state),
        )
    }

    fn setup(homes: &[&str]) -> (Scheduler, Vec<(Home, ManagerInstance)>, Vec<BatchLog>) {
        let sched = Scheduler::new(Config::default());
        let app = sched.spawn(succeed(()));
        let mut instances = Vec::new();
        let mut logs = Vec::new();
        for home in homes {
            let log: BatchLog = Arc::new(Mutex::new(Vec::new()));
            let inst = instantiate(&sched, app, recording_manager(log.clone()));
            instances.push((Home::from(*home), inst));
            logs.push(log);
        }
        (sched, instances, logs)
    }

    #[test]
    fn test_every_manager_gets_exactly_one_batch() {
        // map over batch[leaf x, leaf y] with a third manager z in scope.
        let (sched, instances, logs) = setup(&["x", "y", "z"]);

        let cmds = map(|n: i32| n + 10, batch(vec![leaf("x", 1_i32), leaf("y", 2_i32)]));
        dispatch_effects(&sched, &instances, cmds, none()).unwrap();
        sched.run_until_idle().unwrap();

        assert_eq!(*logs[0].lock().unwrap(), vec![(vec![11], vec![])]);
        assert_eq!(*logs[1].lock().unwrap(), vec![(vec![12], vec![])]);
        // z was named by no leaf and still hears about the cycle, once.
        assert_eq!(*logs[2].lock().unwrap(), vec![(vec![], vec![])]);
    }

    #[test]
    fn test_leaf_declaration_order_is_preserved_per_home() {
        let (sched, instances, logs) = setup(&["x"]);

        let cmds = batch(vec![leaf("x", 1_i32), leaf("x", 2_i32), leaf("x", 3_i32)]);
        let subs = batch(vec![leaf("x", 9_i32), leaf("x", 8_i32)]);
        dispatch_effects(&sched, &instances, cmds, subs).unwrap();
        sched.run_until_idle().unwrap();

        assert_eq!(*logs[0].lock().unwrap(), vec![(vec![1, 2, 3], vec![9, 8])]);
    }

    #[test]
    fn test_nested_maps_compose_outermost_last() {
        let (sched, instances, logs) = setup(&["x"]);

        let cmds = map(|n: i32| n * 2, map(|n: i32| n + 1, leaf("x", 5_i32)));
        dispatch_effects(&sched, &instances, cmds, none()).unwrap();
        sched.run_until_idle().unwrap();

        // inner first: (5 + 1) * 2
        assert_eq!(*logs[0].lock().unwrap(), vec![(vec![12], vec![])]);
    }

    #[test]
    fn test_managers_are_mailed_in_registration_order() {
        let sched = Scheduler::new(Config::default());
        let app = sched.spawn(succeed(()));
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let mut instances = Vec::new();
        for home in ["gamma", "alpha", "beta"] {
            let order = order.clone();
            let manager = EffectManager::new(
                succeed(()),
                move |_router, _cmds, _subs, state| {
                    order.lock().unwrap().push(home);
                    succeed_value(state)
                },
                |_router, _msg, state| succeed_value(state),
            );
            instances.push((Home::from(home), instantiate(&sched, app, manager)));
        }
        // Park every manager on its receive loop first, so delivery order is
        // decided by the sends below, not by spawn order.
        sched.run_until_idle().unwrap();

        dispatch_effects(&sched, &instances, none(), none()).unwrap();
        sched.run_until_idle().unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["gamma", "alpha", "beta"]);
    }

    #[test]
    fn test_unknown_home_aborts_without_delivering() {
        let (sched, instances, logs) = setup(&["x"]);

        let cmds = batch(vec![leaf("x", 1_i32), leaf("ghost", 2_i32)]);
        let err = dispatch_effects(&sched, &instances, cmds, none()).unwrap_err();
        sched.run_until_idle().unwrap();

        assert!(matches!(err, RuntimeError::UnknownHome { ref home } if home == "ghost"));
        assert!(logs[0].lock().unwrap().is_empty());
    }

    #[test]
    fn test_cmd_map_overrides_chain_application() {
        let sched = Scheduler::new(Config::default());
        let app = sched.spawn(succeed(()));
        let log: BatchLog = Arc::new(Mutex::new(Vec::new()));
        // Port-style manager: taggers are irrelevant to outbound payloads.
        let manager = recording_manager(log.clone()).with_cmd_map(|_chain, payload| payload);
        let instances = vec![(Home::from("out"), instantiate(&sched, app, manager))];

        let cmds = map(|n: i32| n + 100, leaf("out", 7_i32));
        dispatch_effects(&sched, &instances, cmds, none()).unwrap();
        sched.run_until_idle().unwrap();

        assert_eq!(*log.lock().unwrap(), vec![(vec![7], vec![])]);
    }
}
