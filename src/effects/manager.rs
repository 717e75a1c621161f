//! # Effect managers.
//!
//! A manager is the long-lived owner of one effect `home`. It is described
//! declaratively by an [`EffectManager`] record and instantiated as an
//! ordinary scheduled process running a receive loop:
//!
//! ```text
//!  init ──▶ state ──▶ receive ──┬─ Effects{cmds, subs} ─▶ on_effects ─┐
//!                       ▲       └─ SelfMsg(v) ─────────▶ on_self_msg ─┤
//!                       └──────────────── next state ◀────────────────┘
//! ```
//!
//! ## Rules
//! - Managers are single-threaded like every process: `on_effects` and
//!   `on_self_msg` never overlap for one home.
//! - The returned task must succeed with the next state; a failure ends the
//!   loop as an unhandled failure of the manager process.
//! - `cmd_map` / `sub_map` translate leaf payloads when a `map` wraps them
//!   during gathering; a manager without one gets the tagger chain applied
//!   to its payload directly.

use std::sync::Arc;

use crate::core::{ProcessId, Scheduler};
use crate::error::RuntimeError;
use crate::tasks::{receive, Task, Value};

use super::bag::{Home, TaggerChain};
use super::router::Router;

/// Handler for one gathered batch of commands and subscriptions.
pub type OnEffects = Arc<dyn Fn(&Router, Vec<Value>, Vec<Value>, Value) -> Task + Send + Sync>;

/// Handler for one self-message.
pub type OnSelfMsg = Arc<dyn Fn(&Router, Value, Value) -> Task + Send + Sync>;

/// Leaf payload translation applied during gathering when `map` nodes wrap
/// the leaf. Receives the collected tagger chain and the raw payload.
pub type EffectMap = Arc<dyn Fn(&TaggerChain, Value) -> Value + Send + Sync>;

/// Declarative description of an effect manager.
pub struct EffectManager {
    /// Task producing the initial state.
    pub init: Task,
    pub on_effects: OnEffects,
    pub on_self_msg: OnSelfMsg,
    /// Translation for command payloads under `map`; `None` applies the
    /// tagger chain to the payload itself.
    pub cmd_map: Option<EffectMap>,
    /// Translation for subscription payloads under `map`.
    pub sub_map: Option<EffectMap>,
}

impl EffectManager {
    pub fn new(
        init: Task,
        on_effects: impl Fn(&Router, Vec<Value>, Vec<Value>, Value) -> Task + Send + Sync + 'static,
        on_self_msg: impl Fn(&Router, Value, Value) -> Task + Send + Sync + 'static,
    ) -> Self {
        Self {
            init,
            on_effects: Arc::new(on_effects),
            on_self_msg: Arc::new(on_self_msg),
            cmd_map: None,
            sub_map: None,
        }
    }

    #[must_use]
    pub fn with_cmd_map(
        mut self,
        f: impl Fn(&TaggerChain, Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.cmd_map = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_sub_map(
        mut self,
        f: impl Fn(&TaggerChain, Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.sub_map = Some(Arc::new(f));
        self
    }
}

/// Mailbox payload of a manager process.
pub(crate) enum ManagerMsg {
    /// Looped back through [`Router::send_to_self`].
    SelfMsg(Value),
    /// One gathered batch per dispatch cycle, possibly empty on both sides.
    Effects { cmds: Vec<Value>, subs: Vec<Value> },
}

/// Registration set, keyed by home, in registration order.
#[derive(Default)]
pub struct Registry {
    entries: Vec<(Home, EffectManager)>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `manager` under `home`.
    ///
    /// Homes are unique: a second registration under the same name is
    /// rejected and the registry is left unchanged.
    pub fn register(
        &mut self,
        home: impl Into<Home>,
        manager: EffectManager,
    ) -> Result<(), RuntimeError> {
        let home = home.into();
        if self.entries.iter().any(|(h, _)| *h == home) {
            return Err(RuntimeError::DuplicateHome { home: home.to_string() });
        }
        self.entries.push((home, manager));
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(Home, EffectManager)> {
        self.entries
    }
}

/// Live manager process plus the gathering hooks that outlive instantiation.
pub(crate) struct ManagerInstance {
    pub(crate) pid: ProcessId,
    pub(crate) cmd_map: Option<EffectMap>,
    pub(crate) sub_map: Option<EffectMap>,
}

/// Spawns the receive loop for one registered manager.
pub(crate) fn instantiate(
    sched: &Scheduler,
    app: ProcessId,
    manager: EffectManager,
) -> ManagerInstance {
    let EffectManager { init, on_effects, on_self_msg, cmd_map, sub_map } = manager;

    let pid = sched.spawn_with(|self_pid| {
        let router = Router::new(sched.clone(), app, self_pid);
        init.and_then_value(move |state| manager_loop(router, on_effects, on_self_msg, state))
    });

    ManagerInstance { pid, cmd_map, sub_map }
}

fn manager_loop(
    router: Router,
    on_effects: OnEffects,
    on_self_msg: OnSelfMsg,
    state: Value,
) -> Task {
    let next_router = router.clone();
    let next_fx = on_effects.clone();
    let next_self = on_self_msg.clone();

    receive(move |msg: ManagerMsg| match msg {
        ManagerMsg::SelfMsg(v) => on_self_msg(&router, v, state),
        ManagerMsg::Effects { cmds, subs } => on_effects(&router, cmds, subs, state),
    })
    .and_then_value(move |state| manager_loop(next_router, next_fx, next_self, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tasks::{from_value, succeed, succeed_value, value};
    use std::sync::Mutex;

    fn counting_manager(log: Arc<Mutex<Vec<String>>>) -> EffectManager {
        let fx_log = log.clone();
        EffectManager::new(
            succeed(0_u32),
            move |_router, cmds, subs, state| {
                let n = from_value::<u32>(state).unwrap();
                fx_log.lock().unwrap().push(format!(
                    "fx#{n}: {} cmds, {} subs",
                    cmds.len(),
                    subs.len()
                ));
                succeed(n + 1)
            },
            move |_router, msg, state| {
                log.lock().unwrap().push(format!("self: {}", from_value::<&str>(msg).unwrap()));
                succeed_value(state)
            },
        )
    }

    #[test]
    fn test_duplicate_home_is_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = Registry::new();
        registry.register("timers", counting_manager(log.clone())).unwrap();
        let err = registry.register("timers", counting_manager(log)).unwrap_err();
        assert!(matches!(err, RuntimeError::DuplicateHome { ref home } if home == "timers"));
    }

    #[test]
    fn test_manager_loop_threads_state_between_batches() {
        let sched = Scheduler::new(Config::default());
        let app = sched.spawn(succeed(()));
        let log = Arc::new(Mutex::new(Vec::new()));
        let inst = instantiate(&sched, app, counting_manager(log.clone()));

        sched.send(inst.pid, value(ManagerMsg::Effects { cmds: vec![value(1_i32)], subs: vec![] }));
        sched.send(inst.pid, value(ManagerMsg::Effects { cmds: vec![], subs: vec![] }));
        sched.run_until_idle().unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["fx#0: 1 cmds, 0 subs".to_string(), "fx#1: 0 cmds, 0 subs".to_string()]
        );
    }

    #[test]
    fn test_self_message_reaches_on_self_msg() {
        let sched = Scheduler::new(Config::default());
        let app = sched.spawn(succeed(()));
        let log = Arc::new(Mutex::new(Vec::new()));
        let inst = instantiate(&sched, app, counting_manager(log.clone()));

        let router = Router::new(sched.clone(), app, inst.pid);
        sched.spawn(router.send_to_self(value("wake")));
        sched.run_until_idle().unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["self: wake".to_string()]);
    }
}
