//! # Program bootstrap.
//!
//! A [`Program`] is the pure description of an application: initial model and
//! commands, `update`, `subscriptions`, and an optional `view` hook.
//! [`RuntimeBuilder::start`] wires it to a scheduler:
//!
//! ```text
//!  start ──▶ spawn app process ──▶ instantiate managers ──▶ deliver Boot
//!                                                              │
//!            ┌───────────── app process ──────────────────┐    ▼
//!            │ view ─▶ dispatch(cmds, subs) ─▶ receive msg │ ◀─┘
//!            │   ▲                                  │      │
//!            │   └───────────── update ◀────────────┘      │
//!            └─────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - The application is an ordinary scheduled process; `update` and `view`
//!   run single-threaded under the same budget as everything else.
//! - Each cycle dispatches exactly once: initial commands plus initial
//!   subscriptions at boot, then once per received message.
//! - A dispatch error (unknown home) fails the app process; with
//!   [`FailurePolicy::Report`](crate::config::FailurePolicy) it surfaces as
//!   an `UnhandledFailure` event.

use std::any::Any;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::Config;
use crate::core::{ProcessId, Scheduler};
use crate::effects::{dispatch_effects, instantiate, Bag, EffectManager, Home, ManagerInstance, Registry};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::{fail, receive, value, Task};

/// Pure description of an application.
pub struct Program<Model, Msg> {
    /// Initial model and startup commands.
    pub init: (Model, Bag),
    /// Message handler: consumes the model, returns the next one plus
    /// commands to run.
    pub update: Arc<dyn Fn(Msg, Model) -> (Model, Bag) + Send + Sync>,
    /// Active subscriptions for a given model; gathered after every update.
    pub subscriptions: Arc<dyn Fn(&Model) -> Bag + Send + Sync>,
    /// Observer invoked with the model after init and after every update.
    pub view: Option<Arc<dyn Fn(&Model) + Send + Sync>>,
}

impl<Model, Msg> Program<Model, Msg> {
    pub fn new(
        init: (Model, Bag),
        update: impl Fn(Msg, Model) -> (Model, Bag) + Send + Sync + 'static,
        subscriptions: impl Fn(&Model) -> Bag + Send + Sync + 'static,
    ) -> Self {
        Self {
            init,
            update: Arc::new(update),
            subscriptions: Arc::new(subscriptions),
            view: None,
        }
    }

    #[must_use]
    pub fn with_view(mut self, view: impl Fn(&Model) + Send + Sync + 'static) -> Self {
        self.view = Some(Arc::new(view));
        self
    }
}

/// Everything the app process needs per cycle.
struct AppCtx<Model, Msg> {
    sched: Scheduler,
    instances: Arc<Vec<(Home, ManagerInstance)>>,
    update: Arc<dyn Fn(Msg, Model) -> (Model, Bag) + Send + Sync>,
    subscriptions: Arc<dyn Fn(&Model) -> Bag + Send + Sync>,
    view: Option<Arc<dyn Fn(&Model) + Send + Sync>>,
}

impl<Model, Msg> Clone for AppCtx<Model, Msg> {
    fn clone(&self) -> Self {
        Self {
            sched: self.sched.clone(),
            instances: self.instances.clone(),
            update: self.update.clone(),
            subscriptions: self.subscriptions.clone(),
            view: self.view.clone(),
        }
    }
}

/// First message the app process waits for; closes the spawn-order cycle
/// between the app pid (needed by managers) and the manager instances
/// (needed by the app's dispatch).
struct Boot<Model, Msg> {
    ctx: AppCtx<Model, Msg>,
    model: Model,
    cmds: Bag,
}

fn boot_task<Model, Msg>() -> Task
where
    Model: Send + 'static,
    Msg: Any + Send,
{
    receive(move |boot: Boot<Model, Msg>| {
        let Boot { ctx, model, cmds } = boot;
        render_and_dispatch(ctx, model, cmds)
    })
}

fn render_and_dispatch<Model, Msg>(ctx: AppCtx<Model, Msg>, model: Model, cmds: Bag) -> Task
where
    Model: Send + 'static,
    Msg: Any + Send,
{
    if let Some(view) = &ctx.view {
        view(&model);
    }
    let subs = (ctx.subscriptions)(&model);
    match dispatch_effects(&ctx.sched, &ctx.instances, cmds, subs) {
        Ok(()) => app_wait(ctx, model),
        Err(err) => fail(err),
    }
}

fn app_wait<Model, Msg>(ctx: AppCtx<Model, Msg>, model: Model) -> Task
where
    Model: Send + 'static,
    Msg: Any + Send,
{
    receive(move |msg: Msg| {
        let (model, cmds) = (ctx.update)(msg, model);
        render_and_dispatch(ctx, model, cmds)
    })
}

/// Builder wiring a [`Program`] to a scheduler, managers, and subscribers.
pub struct RuntimeBuilder {
    config: Config,
    bus: Option<Bus>,
    registry: Registry,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl RuntimeBuilder {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config, bus: None, registry: Registry::new(), subscribers: Vec::new() }
    }

    /// Uses an existing bus instead of creating one (to share receivers).
    #[must_use]
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Registers an effect manager under a unique home.
    pub fn register(
        mut self,
        home: impl Into<Home>,
        manager: EffectManager,
    ) -> Result<Self, RuntimeError> {
        self.registry.register(home, manager)?;
        Ok(self)
    }

    /// Attaches a diagnostics subscriber (requires a tokio runtime at start).
    #[must_use]
    pub fn subscriber(mut self, sub: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(sub);
        self
    }

    /// Spawns the app process, instantiates every registered manager, and
    /// delivers the boot message carrying the initial model and commands.
    ///
    /// Nothing runs until the scheduler is driven: either automatically by
    /// an ambient tokio runtime, or manually via
    /// [`Scheduler::run_until_idle`].
    pub fn start<Model, Msg>(self, program: Program<Model, Msg>) -> Result<Runtime, RuntimeError>
    where
        Model: Send + 'static,
        Msg: Any + Send,
    {
        let bus = self.bus.unwrap_or_else(|| Bus::new(self.config.bus_capacity));
        let sched = Scheduler::with_bus(self.config, bus.clone());

        // Subscribe the listener before anything publishes: broadcast
        // receivers only see events sent after subscription, and the spawn
        // and registration events below must reach attached subscribers.
        let listener = spawn_listener(&bus, self.subscribers);

        let app = sched.spawn(boot_task::<Model, Msg>());

        let mut instances = Vec::new();
        for (home, manager) in self.registry.into_entries() {
            let inst = instantiate(&sched, app, manager);
            bus.publish(
                Event::new(EventKind::ManagerRegistered)
                    .with_home(home.clone())
                    .with_pid(inst.pid),
            );
            instances.push((home, inst));
        }

        let ctx = AppCtx {
            sched: sched.clone(),
            instances: Arc::new(instances),
            update: program.update,
            subscriptions: program.subscriptions,
            view: program.view,
        };
        let (model, cmds) = program.init;
        sched.send(app, value(Boot { ctx, model, cmds }));

        Ok(Runtime { sched, app, listener })
    }
}

/// Bridges the broadcast bus into a [`SubscriberSet`] fan-out.
///
/// Needs an ambient tokio runtime; without one, subscribers are dropped and
/// the bus remains available for direct `subscribe()` receivers.
fn spawn_listener(bus: &Bus, subs: Vec<Arc<dyn Subscribe>>) -> Option<JoinHandle<()>> {
    if subs.is_empty() || tokio::runtime::Handle::try_current().is_err() {
        return None;
    }
    let mut rx = bus.subscribe();
    let set = SubscriberSet::new(subs, bus.clone());
    Some(tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => set.emit(&ev),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
        set.shutdown().await;
    }))
}

/// Handle to a started program.
pub struct Runtime {
    sched: Scheduler,
    app: ProcessId,
    listener: Option<JoinHandle<()>>,
}

impl Runtime {
    /// Starts building a runtime; alias for [`RuntimeBuilder::new`].
    #[must_use]
    pub fn builder(config: Config) -> RuntimeBuilder {
        RuntimeBuilder::new(config)
    }

    /// The scheduler driving this program.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.sched
    }

    /// Pid of the application process.
    #[must_use]
    pub fn app(&self) -> ProcessId {
        self.app
    }

    /// Enqueues a message for the application's `update`.
    pub fn send(&self, msg: impl Any + Send) {
        self.sched.send(self.app, value(msg));
    }

    /// Drives the scheduler until no runnable work remains.
    ///
    /// Manual alternative to the tokio auto-pump; see
    /// [`Scheduler::run_until_idle`].
    pub fn run_until_idle(&self) -> Result<usize, RuntimeError> {
        self.sched.run_until_idle()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{batch, leaf, none};
    use crate::tasks::{from_value, succeed, succeed_value, Value};
    use std::sync::Mutex;

    #[derive(Debug)]
    enum Msg {
        Add(i32),
    }

    type CmdLog = Arc<Mutex<Vec<i32>>>;

    fn recording_manager(log: CmdLog) -> EffectManager {
        EffectManager::new(
            succeed(()),
            move |_router, cmds, _subs, state| {
                for cmd in cmds {
                    log.lock().unwrap().push(from_value::<i32>(cmd).unwrap());
                }
                succeed_value(state)
            },
            |_router, _msg, state| succeed_value(state),
        )
    }

    fn counter(views: Arc<Mutex<Vec<i32>>>) -> Program<i32, Msg> {
        Program::new(
            (0, leaf("audit", 100_i32)),
            |Msg::Add(n), model| {
                let model = model + n;
                (model, leaf("audit", model))
            },
            |_model| none(),
        )
        .with_view(move |model| views.lock().unwrap().push(*model))
    }

    #[test]
    fn test_boot_renders_and_dispatches_init_commands_once() {
        let views = Arc::new(Mutex::new(Vec::new()));
        let cmds: CmdLog = Arc::new(Mutex::new(Vec::new()));

        let rt = RuntimeBuilder::new(Config::default())
            .register("audit", recording_manager(cmds.clone()))
            .unwrap()
            .start(counter(views.clone()))
            .unwrap();
        rt.run_until_idle().unwrap();

        assert_eq!(*views.lock().unwrap(), vec![0]);
        assert_eq!(*cmds.lock().unwrap(), vec![100]);
    }

    #[test]
    fn test_update_cycle_runs_per_message() {
        let views = Arc::new(Mutex::new(Vec::new()));
        let cmds: CmdLog = Arc::new(Mutex::new(Vec::new()));

        let rt = RuntimeBuilder::new(Config::default())
            .register("audit", recording_manager(cmds.clone()))
            .unwrap()
            .start(counter(views.clone()))
            .unwrap();
        rt.run_until_idle().unwrap();

        rt.send(Msg::Add(3));
        rt.send(Msg::Add(4));
        rt.run_until_idle().unwrap();

        assert_eq!(*views.lock().unwrap(), vec![0, 3, 7]);
        assert_eq!(*cmds.lock().unwrap(), vec![100, 3, 7]);
    }

    #[test]
    fn test_unknown_home_fails_the_app() {
        let program: Program<i32, Msg> = Program::new(
            (0, leaf("nowhere", 1_i32)),
            |Msg::Add(n), model| (model + n, none()),
            |_model| none(),
        );

        let rt = RuntimeBuilder::new(Config::default()).start(program).unwrap();
        rt.run_until_idle().unwrap();

        // The app process failed at boot; its slot was reclaimed and later
        // messages go nowhere.
        assert!(!rt.scheduler().alive(rt.app()));
        rt.send(Msg::Add(1));
        rt.run_until_idle().unwrap();
        assert!(!rt.scheduler().alive(rt.app()));
    }

    #[test]
    fn test_duplicate_home_rejected_at_registration() {
        let log: CmdLog = Arc::new(Mutex::new(Vec::new()));
        let err = RuntimeBuilder::new(Config::default())
            .register("audit", recording_manager(log.clone()))
            .unwrap()
            .register("audit", recording_manager(log))
            .err()
            .expect("second registration under the same home must fail");
        assert!(matches!(err, RuntimeError::DuplicateHome { .. }));
    }

    #[test]
    fn test_subscriptions_are_gathered_each_cycle() {
        let subs_log = Arc::new(Mutex::new(Vec::new()));
        let sink = subs_log.clone();
        let manager = EffectManager::new(
            succeed(()),
            move |_router, _cmds, subs, state| {
                let names: Vec<String> = subs
                    .into_iter()
                    .map(|v: Value| from_value::<&str>(v).unwrap().to_string())
                    .collect();
                sink.lock().unwrap().push(names);
                succeed_value(state)
            },
            |_router, _msg, state| succeed_value(state),
        );

        let program: Program<i32, Msg> = Program::new(
            (0, none()),
            |Msg::Add(n), model| (model + n, none()),
            |model| {
                if *model > 0 {
                    batch(vec![leaf("feed", "active")])
                } else {
                    none()
                }
            },
        );

        let rt = RuntimeBuilder::new(Config::default())
            .register("feed", manager)
            .unwrap()
            .start(program)
            .unwrap();
        rt.run_until_idle().unwrap();
        rt.send(Msg::Add(5));
        rt.run_until_idle().unwrap();

        let log = subs_log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log[0].is_empty());
        assert_eq!(log[1], vec!["active".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_events_reach_attached_subscriber() {
        struct KindLog(Arc<Mutex<Vec<EventKind>>>);

        #[async_trait::async_trait]
        impl Subscribe for KindLog {
            async fn on_event(&self, event: &Event) {
                self.0.lock().unwrap().push(event.kind);
            }
            fn name(&self) -> &'static str {
                "kind-log"
            }
        }

        let kinds = Arc::new(Mutex::new(Vec::new()));
        let views = Arc::new(Mutex::new(Vec::new()));
        let cmds: CmdLog = Arc::new(Mutex::new(Vec::new()));

        let rt = RuntimeBuilder::new(Config::default())
            .register("audit", recording_manager(cmds))
            .unwrap()
            .subscriber(Arc::new(KindLog(kinds.clone())))
            .start(counter(views))
            .unwrap();

        // Let the auto-pump and the listener drain.
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let seen = kinds.lock().unwrap();
        // Boot-time events predate start() returning; the listener must be
        // subscribed early enough to observe them.
        assert!(seen.contains(&EventKind::ProcessSpawned));
        assert!(seen.contains(&EventKind::ManagerRegistered));
        drop(rt);
    }
}
