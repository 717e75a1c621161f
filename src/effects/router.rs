//! # Router: the two channels an effect manager may speak on.
//!
//! Every manager process is handed a [`Router`] at instantiation. It is
//! deliberately narrow: a manager can notify the application or loop a
//! message back to itself, nothing else. Both operations are tasks, so they
//! compose with the rest of the manager's work and run on the scheduler like
//! everything else.

use crate::core::{ProcessId, Scheduler};
use crate::tasks::{binding, succeed, value, Task, Value};

use super::manager::ManagerMsg;

/// Messaging handle given to an effect manager.
#[derive(Clone)]
pub struct Router {
    sched: Scheduler,
    app: ProcessId,
    manager: ProcessId,
}

impl Router {
    pub(crate) fn new(sched: Scheduler, app: ProcessId, manager: ProcessId) -> Self {
        Self { sched, app, manager }
    }

    /// Task that delivers `msg` to the application's mailbox.
    ///
    /// Succeeds with `()` once the message is enqueued; delivery to a dead
    /// application is a no-op.
    #[must_use]
    pub fn send_to_app(&self, msg: Value) -> Task {
        let sched = self.sched.clone();
        let app = self.app;
        binding(move |resume| {
            sched.send(app, msg);
            resume.resolve(succeed(()));
            None
        })
    }

    /// Task that loops `msg` back to this manager's own receive loop, where
    /// it arrives as a self-message.
    #[must_use]
    pub fn send_to_self(&self, msg: Value) -> Task {
        let sched = self.sched.clone();
        let manager = self.manager;
        binding(move |resume| {
            sched.send(manager, value(ManagerMsg::SelfMsg(msg)));
            resume.resolve(succeed(()));
            None
        })
    }

    /// Immediate (non-task) delivery to the application, for host-driven
    /// entry points that run outside any process.
    pub(crate) fn send_to_app_now(&self, msg: Value) {
        self.sched.send(self.app, msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tasks::{from_value, receive};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_send_to_app_delivers_raw_message() {
        let sched = Scheduler::new(Config::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let app = sched.spawn(receive(move |n: i32| {
            sink.lock().unwrap().push(n);
            succeed(())
        }));
        let mgr = sched.spawn(succeed(()));

        let router = Router::new(sched.clone(), app, mgr);
        sched.spawn(router.send_to_app(value(41_i32)));
        sched.run_until_idle().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![41]);
    }

    #[test]
    fn test_send_to_self_wraps_as_self_message() {
        let sched = Scheduler::new(Config::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let app = sched.spawn(succeed(()));
        let sink = seen.clone();
        let mgr = sched.spawn(receive(move |msg: ManagerMsg| {
            if let ManagerMsg::SelfMsg(v) = msg {
                sink.lock().unwrap().push(from_value::<&str>(v).unwrap());
            }
            succeed(())
        }));

        let router = Router::new(sched.clone(), app, mgr);
        sched.spawn(router.send_to_self(value("tick")));
        sched.run_until_idle().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["tick"]);
    }
}
