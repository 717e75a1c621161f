//! # Ports: the typed boundary between the program and its host.
//!
//! Ports come in pairs of directions, each backed by an ordinary effect
//! manager registered under the port's name:
//!
//! - [`outgoing`]: the program emits [`OutgoingPort::command`] bags; the host
//!   observes JSON payloads through [`OutgoingPort::subscribe`].
//! - [`incoming`]: the program declares [`IncomingPort::subscription`] bags;
//!   the host injects JSON payloads through [`IncomingPort::send`], which
//!   decodes them and delivers one app message per active subscription.
//!
//! ## Rules
//! - Payloads cross the boundary as [`serde_json::Value`]; the typed side is
//!   encoded/decoded with serde.
//! - Outgoing ports ignore `map` taggers: the payload already left the
//!   program, there is no message to re-tag.
//! - Incoming decode failures are reported to the caller as
//!   [`PortError::Decode`]; nothing is delivered.
//! - An incoming port connects to its program during the first dispatch
//!   cycle after start; a send before that returns
//!   [`PortError::NotConnected`].

use std::any::Any;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::effects::{leaf, Bag, EffectManager, Home, Router};
use crate::error::PortError;
use crate::tasks::{expect_value, from_value, succeed, succeed_value, value, Value};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Host-side callback observing an outgoing port.
type Listener = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

struct ListenerSlot {
    id: u64,
    listener: Listener,
}

/// Handle returned by [`OutgoingPort::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortSubscription(u64);

/// Program-to-host channel.
pub struct OutgoingPort<T> {
    name: Home,
    listeners: Arc<Mutex<Vec<ListenerSlot>>>,
    next_id: Arc<AtomicU64>,
    _payload: PhantomData<fn(T)>,
}

impl<T> Clone for OutgoingPort<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            listeners: self.listeners.clone(),
            next_id: self.next_id.clone(),
            _payload: PhantomData,
        }
    }
}

/// Creates an outgoing port and the manager backing it.
///
/// Register the manager under the port's name before starting the program.
/// Payloads must encode with serde; an encode failure aborts the port's
/// manager process under the configured panic policy.
pub fn outgoing<T>(name: impl Into<Home>) -> (OutgoingPort<T>, EffectManager)
where
    T: Serialize + Any + Send,
{
    let name = name.into();
    let listeners: Arc<Mutex<Vec<ListenerSlot>>> = Arc::new(Mutex::new(Vec::new()));

    let fanout = listeners.clone();
    let port_name = name.clone();
    let manager = EffectManager::new(
        succeed(()),
        move |_router, cmds, _subs, state| {
            for cmd in cmds {
                let payload = expect_value::<T>(cmd, "outgoing port payload");
                let raw = match serde_json::to_value(&payload) {
                    Ok(raw) => raw,
                    Err(err) => panic!("port {port_name:?} failed to encode payload: {err}"),
                };
                for slot in lock(&fanout).iter() {
                    (slot.listener)(&raw);
                }
            }
            succeed_value(state)
        },
        |_router, _msg, state| succeed_value(state),
    )
    .with_cmd_map(|_chain, payload| payload);

    let port = OutgoingPort {
        name,
        listeners,
        next_id: Arc::new(AtomicU64::new(0)),
        _payload: PhantomData,
    };
    (port, manager)
}

impl<T: Serialize + Any + Send> OutgoingPort<T> {
    /// The home this port's manager must be registered under.
    #[must_use]
    pub fn name(&self) -> Home {
        self.name.clone()
    }

    /// Command bag sending `payload` out through this port.
    #[must_use]
    pub fn command(&self, payload: T) -> Bag {
        leaf(self.name.clone(), payload)
    }

    /// Attaches a host callback; every future command's encoded payload is
    /// passed to it, in emission order.
    pub fn subscribe(
        &self,
        listener: impl Fn(&serde_json::Value) + Send + Sync + 'static,
    ) -> PortSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).push(ListenerSlot { id, listener: Arc::new(listener) });
        PortSubscription(id)
    }

    /// Detaches a previously attached callback; unknown handles are a no-op.
    pub fn unsubscribe(&self, sub: PortSubscription) {
        lock(&self.listeners).retain(|slot| slot.id != sub.0);
    }
}

/// Decoded-payload-to-app-message function carried in subscription leaves.
type SubTagger = Arc<dyn Fn(Value) -> Value + Send + Sync>;

struct IncomingShared {
    router: OnceLock<Router>,
    active: Mutex<Vec<SubTagger>>,
}

/// Host-to-program channel.
pub struct IncomingPort<T> {
    name: Home,
    shared: Arc<IncomingShared>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for IncomingPort<T> {
    fn clone(&self) -> Self {
        Self { name: self.name.clone(), shared: self.shared.clone(), _payload: PhantomData }
    }
}

/// Creates an incoming port and the manager backing it.
///
/// The manager tracks the program's active subscriptions each dispatch
/// cycle; [`IncomingPort::send`] delivers one message per active
/// subscription.
pub fn incoming<T>(name: impl Into<Home>) -> (IncomingPort<T>, EffectManager)
where
    T: DeserializeOwned + Clone + Any + Send,
{
    let name = name.into();
    let shared = Arc::new(IncomingShared {
        router: OnceLock::new(),
        active: Mutex::new(Vec::new()),
    });

    let mgr_shared = shared.clone();
    let manager = EffectManager::new(
        succeed(()),
        move |router, _cmds, subs, state| {
            let _ = mgr_shared.router.set(router.clone());
            *lock(&mgr_shared.active) = subs
                .into_iter()
                .filter_map(|sub| from_value::<SubTagger>(sub))
                .collect();
            succeed_value(state)
        },
        |_router, _msg, state| succeed_value(state),
    )
    .with_sub_map(|chain, payload| {
        // Compose the map taggers over the subscription's own tagger.
        let inner = expect_value::<SubTagger>(payload, "incoming port subscription");
        let chain = chain.clone();
        let composed: SubTagger = Arc::new(move |v| chain.apply(inner(v)));
        value(composed)
    });

    (IncomingPort { name, shared, _payload: PhantomData }, manager)
}

impl<T: DeserializeOwned + Clone + Any + Send> IncomingPort<T> {
    /// The home this port's manager must be registered under.
    #[must_use]
    pub fn name(&self) -> Home {
        self.name.clone()
    }

    /// Subscription bag turning each incoming payload into an app message.
    #[must_use]
    pub fn subscription<Msg>(
        &self,
        tagger: impl Fn(T) -> Msg + Send + Sync + 'static,
    ) -> Bag
    where
        Msg: Any + Send,
    {
        let tag: SubTagger =
            Arc::new(move |v| value(tagger(expect_value::<T>(v, "incoming port payload"))));
        leaf(self.name.clone(), tag)
    }

    /// Decodes `raw` and delivers one message per active subscription.
    ///
    /// With no active subscriptions the payload is still decoded (surfacing
    /// bad host data early) and then discarded.
    pub fn send(&self, raw: &serde_json::Value) -> Result<(), PortError> {
        let Some(router) = self.shared.router.get() else {
            return Err(PortError::NotConnected { port: self.name.to_string() });
        };
        let decoded: T = serde_json::from_value(raw.clone()).map_err(|err| PortError::Decode {
            port: self.name.to_string(),
            reason: err.to_string(),
        })?;

        let taggers: Vec<SubTagger> = lock(&self.shared.active).clone();
        for tag in taggers {
            router.send_to_app_now(tag(value(decoded.clone())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::effects::none;
    use crate::program::{Program, RuntimeBuilder};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug)]
    enum Msg {
        Price(f64),
    }

    #[test]
    fn test_outgoing_port_delivers_encoded_payloads_in_order() {
        let (port, manager) = outgoing::<f64>("prices.out");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        port.subscribe(move |raw| sink.lock().unwrap().push(raw.clone()));

        let emit = port.clone();
        let program: Program<i32, Msg> = Program::new(
            (0, emit.command(1.5)),
            move |Msg::Price(p), model| (model, emit.command(p)),
            |_model| none(),
        );

        let rt = RuntimeBuilder::new(Config::default())
            .register(port.name(), manager)
            .unwrap()
            .start(program)
            .unwrap();
        rt.run_until_idle().unwrap();
        rt.send(Msg::Price(2.5));
        rt.run_until_idle().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![json!(1.5), json!(2.5)]);
    }

    #[test]
    fn test_outgoing_unsubscribe_stops_delivery() {
        let (port, manager) = outgoing::<i32>("audit.out");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = port.subscribe(move |raw| sink.lock().unwrap().push(raw.clone()));

        let emit = port.clone();
        let program: Program<i32, Msg> = Program::new(
            (0, emit.command(1)),
            move |Msg::Price(_), model| (model, emit.command(2)),
            |_model| none(),
        );

        let rt = RuntimeBuilder::new(Config::default())
            .register(port.name(), manager)
            .unwrap()
            .start(program)
            .unwrap();
        rt.run_until_idle().unwrap();

        port.unsubscribe(sub);
        rt.send(Msg::Price(0.0));
        rt.run_until_idle().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![json!(1)]);
    }

    #[test]
    fn test_incoming_port_decodes_and_updates_model() {
        let (port, manager) = incoming::<f64>("prices.in");
        let views = Arc::new(Mutex::new(Vec::new()));

        let sub_port = port.clone();
        let program: Program<f64, Msg> = Program::new(
            (0.0, none()),
            |Msg::Price(p), _model| (p, none()),
            move |_model| sub_port.subscription(Msg::Price),
        )
        .with_view({
            let views = views.clone();
            move |model| views.lock().unwrap().push(*model)
        });

        let rt = RuntimeBuilder::new(Config::default())
            .register(port.name(), manager)
            .unwrap()
            .start(program)
            .unwrap();
        rt.run_until_idle().unwrap();

        port.send(&json!(3.25)).unwrap();
        rt.run_until_idle().unwrap();
        assert_eq!(*views.lock().unwrap(), vec![0.0, 3.25]);
    }

    #[test]
    fn test_incoming_decode_error_is_reported_and_nothing_delivered() {
        let (port, manager) = incoming::<f64>("prices.in");
        let views = Arc::new(Mutex::new(Vec::new()));

        let sub_port = port.clone();
        let program: Program<f64, Msg> = Program::new(
            (0.0, none()),
            |Msg::Price(p), _model| (p, none()),
            move |_model| sub_port.subscription(Msg::Price),
        )
        .with_view({
            let views = views.clone();
            move |model| views.lock().unwrap().push(*model)
        });

        let rt = RuntimeBuilder::new(Config::default())
            .register(port.name(), manager)
            .unwrap()
            .start(program)
            .unwrap();
        rt.run_until_idle().unwrap();

        let err = port.send(&json!("not a number")).unwrap_err();
        assert!(matches!(err, PortError::Decode { ref port, .. } if port == "prices.in"));
        rt.run_until_idle().unwrap();
        assert_eq!(*views.lock().unwrap(), vec![0.0]);
    }

    #[test]
    fn test_send_before_start_is_not_connected() {
        let (port, _manager) = incoming::<f64>("orphan.in");
        let err = port.send(&json!(1.0)).unwrap_err();
        assert!(matches!(err, PortError::NotConnected { ref port } if port == "orphan.in"));
    }

    #[test]
    fn test_json_round_trip_for_structured_payloads() {
        #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
        struct Quote {
            symbol: String,
            bid: f64,
            ask: f64,
        }

        let quote = Quote { symbol: "ACME".into(), bid: 99.5, ask: 100.5 };
        let raw = serde_json::to_value(&quote).unwrap();
        let back: Quote = serde_json::from_value(raw).unwrap();
        assert_eq!(back, quote);
    }
}
