//! Command/FSM driver for peer managers.
//!
//! Managers that sit beside components (resource managers, playlist and
//! session controllers) follow the same shape: commands are wrapped in a
//! [`Cmd`] and injected into a state machine, actions run on an
//! [`Operations`] object, and an error raised by an action forces the machine
//! to its terminal state on the same dispatch.

use il_core::{Error, ManagerId, Result};
use tracing::{debug, error, info};

/// The side-effecting half of a manager.
pub trait Operations {
    /// Error raised by an action since the last call, cleared on read.
    fn internal_error(&mut self) -> Option<Error>;

    /// Release everything; called once after the machine terminates.
    fn deinit(&mut self);
}

/// A state machine driven by a [`Manager`].
pub trait ManagedFsm<O: Operations> {
    type Event;

    fn process_event(&mut self, ops: &mut O, event: Self::Event);

    fn is_terminated(&self) -> bool;

    /// The event that drives the machine to termination after `error`.
    fn fatal_event(error: Error) -> Self::Event;
}

/// A command waiting to be injected.
#[derive(Debug, Clone)]
pub struct Cmd<E> {
    event: E,
}

impl<E> Cmd<E> {
    pub fn new(event: E) -> Self {
        Self { event }
    }

    pub fn event(&self) -> &E {
        &self.event
    }

    pub fn inject<F, O>(self, fsm: &mut F, ops: &mut O)
    where
        F: ManagedFsm<O, Event = E>,
        O: Operations,
    {
        fsm.process_event(ops, self.event);
    }
}

pub struct Manager<F, O> {
    id: ManagerId,
    name: String,
    fsm: F,
    ops: O,
    deinitialised: bool,
}

impl<F, O> Manager<F, O>
where
    F: ManagedFsm<O>,
    O: Operations,
{
    pub fn new(name: impl Into<String>, fsm: F, ops: O) -> Self {
        Self {
            id: ManagerId::new(),
            name: name.into(),
            fsm,
            ops,
            deinitialised: false,
        }
    }

    pub fn id(&self) -> ManagerId {
        self.id
    }

    pub fn fsm(&self) -> &F {
        &self.fsm
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    pub fn is_terminated(&self) -> bool {
        self.deinitialised
    }

    pub fn into_parts(self) -> (F, O) {
        (self.fsm, self.ops)
    }

    /// Inject `cmd`, surface any internal error as the fatal event, and
    /// deinitialise once the machine has terminated. Returns whether the
    /// manager is now terminated.
    pub fn dispatch(&mut self, cmd: Cmd<F::Event>) -> Result<bool> {
        if self.deinitialised {
            return Err(Error::InvalidState(format!(
                "manager {} already terminated",
                self.name
            )));
        }
        cmd.inject(&mut self.fsm, &mut self.ops);

        if let Some(err) = self.ops.internal_error() {
            error!(manager = %self.name, id = %self.id, %err, "internal error, terminating");
            self.fsm.process_event(&mut self.ops, F::fatal_event(err));
        }

        if self.fsm.is_terminated() {
            self.ops.deinit();
            self.deinitialised = true;
            info!(manager = %self.name, id = %self.id, "manager terminated");
        } else {
            debug!(manager = %self.name, "command dispatched");
        }
        Ok(self.deinitialised)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Session {
        Inited,
        Connected,
        Terminated,
    }

    enum SessionEvent {
        Connect,
        Fail,
        Disconnect,
        Fatal,
    }

    #[derive(Default)]
    struct Ops {
        pending: Option<Error>,
        actions: Vec<&'static str>,
        deinits: usize,
    }

    impl Operations for Ops {
        fn internal_error(&mut self) -> Option<Error> {
            self.pending.take()
        }

        fn deinit(&mut self) {
            self.deinits += 1;
        }
    }

    impl ManagedFsm<Ops> for Session {
        type Event = SessionEvent;

        fn process_event(&mut self, ops: &mut Ops, event: SessionEvent) {
            match (*self, event) {
                (Session::Inited, SessionEvent::Connect) => {
                    ops.actions.push("connect");
                    *self = Session::Connected;
                }
                (Session::Inited, SessionEvent::Fail) => {
                    ops.actions.push("fail");
                    ops.pending = Some(Error::Hardware("link down".into()));
                }
                (Session::Connected, SessionEvent::Disconnect) | (_, SessionEvent::Fatal) => {
                    ops.actions.push("terminate");
                    *self = Session::Terminated;
                }
                _ => ops.actions.push("ignored"),
            }
        }

        fn is_terminated(&self) -> bool {
            *self == Session::Terminated
        }

        fn fatal_event(_error: Error) -> SessionEvent {
            SessionEvent::Fatal
        }
    }

    #[test]
    fn orderly_termination_deinits_once() {
        let mut m = Manager::new("session", Session::Inited, Ops::default());
        assert!(!m.dispatch(Cmd::new(SessionEvent::Connect)).unwrap());
        assert!(m.dispatch(Cmd::new(SessionEvent::Disconnect)).unwrap());
        assert_eq!(m.ops().deinits, 1);
        assert_eq!(m.ops().actions, vec!["connect", "terminate"]);
        assert_matches!(
            m.dispatch(Cmd::new(SessionEvent::Connect)),
            Err(Error::InvalidState(_))
        );
        assert_eq!(m.ops().deinits, 1);
    }

    #[test]
    fn internal_error_forces_termination_on_same_dispatch() {
        let mut m = Manager::new("session", Session::Inited, Ops::default());
        assert!(m.dispatch(Cmd::new(SessionEvent::Fail)).unwrap());
        assert_eq!(*m.fsm(), Session::Terminated);
        assert_eq!(m.ops().actions, vec!["fail", "terminate"]);
        assert_eq!(m.ops().deinits, 1);
    }
}
