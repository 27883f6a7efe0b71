//! The component state machine.
//!
//! A `StateSet` request moves the machine from a stable state into the
//! compound sub-state for that pair and opens a [`TransitionBarrier`]. The
//! barrier closes once every servant in the [`ServantPlan`] has reported the
//! pending target; the caller then runs the shared completion routine and
//! calls [`Fsm::advance`].

use il_core::{ComponentConfig, Error, IlState, Result};
use std::fmt;
use tracing::trace;

use crate::kernel::Kernel;
use crate::outbox::Outbox;
use crate::state::StateId;

// ---------------------------------------------------------------------------
// Servants
// ---------------------------------------------------------------------------

/// A participant whose acknowledgment gates a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Servant {
    Kernel,
    Processor,
}

impl Servant {
    fn bit(self) -> u8 {
        match self {
            Self::Kernel => 1 << 0,
            Self::Processor => 1 << 1,
        }
    }
}

impl fmt::Display for Servant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kernel => write!(f, "kernel"),
            Self::Processor => write!(f, "processor"),
        }
    }
}

/// The servants taking part in this component's barriers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServantPlan {
    servants: Vec<Servant>,
}

impl ServantPlan {
    pub fn from_config(config: &ComponentConfig) -> Self {
        let mut servants = vec![Servant::Kernel];
        if config.processor {
            servants.push(Servant::Processor);
        }
        Self { servants }
    }

    pub fn servants(&self) -> &[Servant] {
        &self.servants
    }

    pub fn includes(&self, servant: Servant) -> bool {
        self.servants.contains(&servant)
    }

    /// Number of acknowledgments a barrier waits for.
    pub fn expected(&self) -> usize {
        self.servants.len()
    }
}

// ---------------------------------------------------------------------------
// TransitionBarrier
// ---------------------------------------------------------------------------

/// Outcome of one servant arriving at a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// This servant already arrived; nothing changed.
    Duplicate,
    Waiting,
    /// Last servant in. Reported exactly once per barrier.
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionBarrier {
    expected: usize,
    arrived: usize,
    seen: u8,
}

impl TransitionBarrier {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            arrived: 0,
            seen: 0,
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn arrived(&self) -> usize {
        self.arrived
    }

    pub fn has_arrived(&self, servant: Servant) -> bool {
        self.seen & servant.bit() != 0
    }

    pub fn is_complete(&self) -> bool {
        self.arrived == self.expected
    }

    pub fn arrive(&mut self, servant: Servant) -> Arrival {
        if self.has_arrived(servant) || self.is_complete() {
            return Arrival::Duplicate;
        }
        self.seen |= servant.bit();
        self.arrived += 1;
        if self.is_complete() {
            Arrival::Complete
        } else {
            Arrival::Waiting
        }
    }

    pub fn reset(&mut self) {
        self.arrived = 0;
        self.seen = 0;
    }
}

// ---------------------------------------------------------------------------
// Fsm
// ---------------------------------------------------------------------------

/// How an accepted `StateSet` was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Started(StateId),
    /// The in-flight transition was reversed back to its origin.
    Cancelled(StateId),
}

#[derive(Debug, Clone)]
pub struct Fsm {
    current: StateId,
    barrier: Option<TransitionBarrier>,
    plan: ServantPlan,
    alloc_phase: bool,
    buffers_accepted: bool,
}

impl Fsm {
    pub fn new(plan: ServantPlan) -> Self {
        Self {
            current: StateId::Loaded,
            barrier: None,
            plan,
            alloc_phase: false,
            buffers_accepted: false,
        }
    }

    pub fn current(&self) -> StateId {
        self.current
    }

    pub fn plan(&self) -> &ServantPlan {
        &self.plan
    }

    pub fn barrier(&self) -> Option<&TransitionBarrier> {
        self.barrier.as_ref()
    }

    pub fn in_transition(&self) -> bool {
        self.barrier.is_some()
    }

    pub fn pending_target(&self) -> Option<IlState> {
        self.current.target()
    }

    pub fn alloc_phase_started(&self) -> bool {
        self.alloc_phase
    }

    pub fn buffers_accepted(&self) -> bool {
        self.buffers_accepted
    }

    pub fn note_buffer_accepted(&mut self) {
        self.buffers_accepted = true;
    }

    /// Validate `target` against the table and enter the matching sub-state.
    /// The machine is untouched when the request is rejected.
    pub fn request(&mut self, target: IlState) -> Result<Request> {
        let current = self.current;
        if current == StateId::Invalid {
            return Err(Error::InvalidState(format!(
                "StateSet({target}) in Invalid"
            )));
        }
        if !current.allows(target) {
            return Err(Error::transition(current, target));
        }
        if current.is_sub_state() {
            let reverse = current
                .reverse()
                .ok_or_else(|| Error::Internal(format!("{current} has no reverse")))?;
            self.enter(reverse);
            return Ok(Request::Cancelled(reverse));
        }
        let sub = StateId::sub_state(current.reported(), target)
            .ok_or_else(|| Error::transition(current, target))?;
        self.enter(sub);
        Ok(Request::Started(sub))
    }

    fn enter(&mut self, sub: StateId) {
        match &mut self.barrier {
            Some(barrier) => barrier.reset(),
            None => self.barrier = Some(TransitionBarrier::new(self.plan.expected())),
        }
        self.current = sub;
        self.alloc_phase = false;
        self.buffers_accepted = false;
    }

    /// Count `servant` in. Returns the target once the barrier closes.
    pub fn arrive(&mut self, servant: Servant, reached: IlState) -> Result<Option<IlState>> {
        if !self.plan.includes(servant) {
            return Err(Error::bad_parameter(format!(
                "{servant} is not a servant of this component"
            )));
        }
        let current = self.current;
        let target = current.target().ok_or_else(|| {
            Error::state_operation(current, format!("{servant} reported {reached} outside a transition"))
        })?;
        if reached != target {
            return Err(Error::state_operation(
                current,
                format!("{servant} reported {reached}, pending target is {target}"),
            ));
        }
        let barrier = self
            .barrier
            .as_mut()
            .ok_or_else(|| Error::Internal(format!("{current} without a barrier")))?;
        let arrival = barrier.arrive(servant);
        trace!(state = %current, %servant, arrived = barrier.arrived(), expected = barrier.expected(), ?arrival, "servant arrived");
        Ok((arrival == Arrival::Complete).then_some(target))
    }

    /// Settle in the stable `target` after a barrier closed.
    pub fn advance(&mut self, target: IlState) {
        self.current = StateId::stable(target);
        self.barrier = None;
        self.alloc_phase = false;
    }

    pub fn force_invalid(&mut self) {
        self.current = StateId::Invalid;
        self.barrier = None;
    }

    /// Run the kernel work of the active sub-state. Returns whether the kernel
    /// servant may acknowledge. Safe to call any number of times.
    pub fn kernel_work(&mut self, kernel: &mut Kernel, outbox: &mut Outbox) -> Result<bool> {
        match self.current {
            StateId::LoadedToIdle => {
                kernel.advertise_use_buffer(outbox);
                if !self.alloc_phase && kernel.may_init_alloc_phase() {
                    self.alloc_phase = true;
                    kernel.allocate_supplier_buffers(None, outbox)?;
                }
                Ok(self.alloc_phase && kernel.all_enabled_populated())
            }
            StateId::IdleToLoaded => {
                kernel.free_supplier_buffers(None, outbox);
                Ok(kernel.all_enabled_depopulated())
            }
            StateId::ExecutingToIdle | StateId::PauseToIdle => {
                kernel.return_held_buffers(None, outbox);
                kernel.await_buffers_return(outbox);
                Ok(kernel.may_init_exe_to_idle())
            }
            state => Ok(state.is_sub_state()),
        }
    }
}
