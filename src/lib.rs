//! # taskloom
//!
//! **Taskloom** is a cooperative single-threaded task runtime for Rust.
//!
//! It provides an algebra of suspendable tasks, a budgeted scheduler that
//! multiplexes lightweight processes with mailboxes, and an effect-manager
//! layer that turns declarative command/subscription bags into running work.
//! The crate is designed as the concurrency core for message-driven programs
//! (model / update / subscriptions) embedded in a host.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!       ┌─────────────┐        ┌──────────────────────────────┐
//!       │   Program   │        │    host (outside the loom)   │
//!       │ init/update │        │  ports: JSON in / JSON out   │
//!       └──────┬──────┘        └──────────────┬───────────────┘
//!              │ Bag (cmds, subs)             │ send / subscribe
//!              ▼                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  dispatch (gather leaves, resolve map taggers)               │
//! │  one Effects{cmds, subs} message per registered manager      │
//! └──────┬─────────────────────┬─────────────────────┬───────────┘
//!        ▼                     ▼                     ▼
//! ┌──────────────┐      ┌──────────────┐      ┌──────────────┐
//! │EffectManager │      │EffectManager │      │EffectManager │
//! │ receive loop │      │ receive loop │      │ receive loop │
//! └──────┬───────┘      └──────┬───────┘      └──────┬───────┘
//!        │  Router: send_to_app / send_to_self       │
//!        ▼                     ▼                     ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Scheduler (budgeted cooperative stepper)                    │
//! │  - process table: task tree + frame stack + mailbox          │
//! │  - FIFO work queue, MAX_STEPS budget per tick                │
//! │  - Bus (broadcast diagnostics events)                        │
//! └─────────────────────────────┬────────────────────────────────┘
//!                               ▼
//!                    ┌────────────────────────┐
//!                    │   listener ─► SubscriberSet (per-sub queues)
//!                    └────────────────────────┘
//! ```
//!
//! ### Tick lifecycle
//! ```text
//! tick(budget = max_steps)
//!   loop while budget > 0 and queue non-empty {
//!     ├─► pop pid, check out its task tree (slot stays, mailbox reachable)
//!     ├─► step until Succeed/Fail with empty stack, suspension, kill,
//!     │   panic, or budget exhaustion
//!     ├─► Succeed (empty stack)   ─► completed, slot reclaimed
//!     ├─► Fail (empty stack)      ─► unhandled failure (drop or report),
//!     │                              slot reclaimed
//!     ├─► Binding / empty Receive ─► park suspended (resume/send re-enqueues)
//!     ├─► panic in callback       ─► remove process (or fail the tick)
//!     └─► budget exhausted        ─► park, re-enqueue at tail
//!   }
//!   queue still non-empty ─► publish TickDeferred, schedule next tick
//! ```
//!
//! ## Features
//! | Area            | Description                                                       | Key types / traits                 |
//! |-----------------|-------------------------------------------------------------------|------------------------------------|
//! | **Tasks**       | Composable suspendable computations with typed success/failure.   | [`Task`], [`Resume`]               |
//! | **Scheduling**  | Budgeted cooperative stepping of processes with mailboxes.        | [`Scheduler`], [`ProcessId`]       |
//! | **Effects**     | Declarative command/subscription bags routed to managers.         | [`Bag`], [`EffectManager`], [`Router`] |
//! | **Programs**    | Model/update/subscriptions bootstrap over the scheduler.          | [`Program`], [`RuntimeBuilder`]    |
//! | **Ports**       | Typed JSON boundary to the host.                                  | [`OutgoingPort`], [`IncomingPort`] |
//! | **Diagnostics** | Broadcast events with non-blocking subscriber fan-out.            | [`Event`], [`Subscribe`]           |
//! | **Errors**      | Typed errors for setup, dispatch, and the port boundary.          | [`RuntimeError`], [`PortError`]    |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use taskloom::{leaf, none, succeed, succeed_value};
//! use taskloom::{Config, EffectManager, Program, RuntimeBuilder};
//!
//! #[derive(Debug)]
//! enum Msg {
//!     Tick,
//! }
//!
//! fn main() -> Result<(), taskloom::RuntimeError> {
//!     // A manager that just counts the commands it is handed.
//!     let audit = EffectManager::new(
//!         succeed(()),
//!         |_router, cmds, _subs, state| {
//!             println!("audit: {} command(s)", cmds.len());
//!             succeed_value(state)
//!         },
//!         |_router, _msg, state| succeed_value(state),
//!     );
//!
//!     let program: Program<u32, Msg> = Program::new(
//!         (0, none()),
//!         |Msg::Tick, model| (model + 1, leaf("audit", model + 1)),
//!         |_model| none(),
//!     );
//!
//!     let rt = RuntimeBuilder::new(Config::default())
//!         .register("audit", audit)?
//!         .start(program)?;
//!
//!     // Without an ambient tokio runtime, drive the scheduler manually.
//!     rt.run_until_idle()?;
//!     rt.send(Msg::Tick);
//!     rt.run_until_idle()?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod effects;
mod error;
mod events;
mod program;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use config::{Config, FailurePolicy, PanicPolicy};
pub use crate::core::{ProcessId, Scheduler, TickReport};
pub use effects::{
    batch, leaf, map, map_value, none, Bag, EffectManager, EffectMap, Home, OnEffects, OnSelfMsg,
    Registry, Router, Tagger, TaggerChain,
};
pub use error::{PortError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use program::{
    incoming, outgoing, IncomingPort, OutgoingPort, PortSubscription, Program, Runtime,
    RuntimeBuilder,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    binding, fail, fail_value, from_value, receive, receive_value, succeed, succeed_value, value,
    Callback, Cancel, Resume, Start, Task, Value,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
