//! Lifecycle states and their static metadata.
//!
//! Every state, stable or transitional, is a [`StateId`] tag. What a tag
//! permits (allowed `StateSet` targets, buffer-call and parameter policy, the
//! port flag its barrier clears) lives in one immutable [`STATE_TABLE`]
//! shared by every component instance.

use il_core::{IlState, PortStatus};
use std::fmt;

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Whether `UseBuffer`/`AllocateBuffer` (or `EmptyThisBuffer`/`FillThisBuffer`)
/// may be serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPolicy {
    Allowed,
    /// Only on a port currently being enabled; otherwise IncorrectStateOperation.
    PortBeingEnabled,
    /// Only on a port advertising ACCEPT_USE_BUFFER or once the allocation
    /// phase has begun; otherwise NotImplemented.
    AllocationPhase,
    NotImplemented,
    IncorrectState,
}

/// Whether `SetParameter` may be serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamPolicy {
    Allowed,
    /// Only until the first buffer was accepted.
    BeforeFirstBuffer,
    /// Only for a port-scoped index addressing a disabled port.
    DisabledPortOnly,
    Rejected,
}

/// Whether a state is stable, transitional or terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Stable(IlState),
    Sub { origin: IlState, target: IlState },
}

/// Static description of one state.
#[derive(Debug)]
pub struct StateInfo {
    pub id: StateId,
    pub name: &'static str,
    pub kind: StateKind,
    /// Targets a `StateSet` may request from here.
    pub transitions: &'static [IlState],
    pub use_buffer: BufferPolicy,
    pub buffer_exchange: BufferPolicy,
    pub set_parameter: ParamPolicy,
    /// Port flag broadcast-cleared when this sub-state's barrier completes.
    pub barrier_flag: PortStatus,
}

// ---------------------------------------------------------------------------
// StateId
// ---------------------------------------------------------------------------

/// Tag of the active state. The discriminant indexes [`STATE_TABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateId {
    Loaded,
    WaitForResources,
    Idle,
    Executing,
    Pause,
    Invalid,
    LoadedToIdle,
    LoadedToWaitForResources,
    WaitForResourcesToLoaded,
    IdleToLoaded,
    IdleToExecuting,
    IdleToPause,
    ExecutingToIdle,
    ExecutingToPause,
    PauseToIdle,
    PauseToExecuting,
}

const fn stable(
    id: StateId,
    name: &'static str,
    state: IlState,
    transitions: &'static [IlState],
    use_buffer: BufferPolicy,
    buffer_exchange: BufferPolicy,
    set_parameter: ParamPolicy,
) -> StateInfo {
    StateInfo {
        id,
        name,
        kind: StateKind::Stable(state),
        transitions,
        use_buffer,
        buffer_exchange,
        set_parameter,
        barrier_flag: PortStatus::NONE,
    }
}

#[allow(clippy::too_many_arguments)]
const fn sub(
    id: StateId,
    name: &'static str,
    origin: IlState,
    target: IlState,
    use_buffer: BufferPolicy,
    buffer_exchange: BufferPolicy,
    set_parameter: ParamPolicy,
    barrier_flag: PortStatus,
) -> StateInfo {
    StateInfo {
        id,
        name,
        kind: StateKind::Sub { origin, target },
        transitions: origin_of(origin),
        use_buffer,
        buffer_exchange,
        set_parameter,
        barrier_flag,
    }
}

/// In a sub-state the only acceptable request is a return to the origin.
const fn origin_of(origin: IlState) -> &'static [IlState] {
    match origin {
        IlState::Loaded => &[IlState::Loaded],
        IlState::Idle => &[IlState::Idle],
        IlState::Executing => &[IlState::Executing],
        IlState::Pause => &[IlState::Pause],
        IlState::WaitForResources => &[IlState::WaitForResources],
        IlState::Invalid => &[],
    }
}

use self::BufferPolicy as B;
use self::ParamPolicy as P;
use il_core::IlState as S;

/// Process-wide state metadata, indexed by `StateId as usize`.
pub static STATE_TABLE: [StateInfo; 16] = [
    stable(
        StateId::Loaded,
        "Loaded",
        S::Loaded,
        &[S::Idle, S::WaitForResources],
        B::PortBeingEnabled,
        B::IncorrectState,
        P::Allowed,
    ),
    stable(
        StateId::WaitForResources,
        "WaitForResources",
        S::WaitForResources,
        &[S::Loaded],
        B::PortBeingEnabled,
        B::IncorrectState,
        P::Allowed,
    ),
    stable(
        StateId::Idle,
        "Idle",
        S::Idle,
        &[S::Loaded, S::Executing, S::Pause],
        B::PortBeingEnabled,
        B::Allowed,
        P::DisabledPortOnly,
    ),
    stable(
        StateId::Executing,
        "Executing",
        S::Executing,
        &[S::Idle, S::Pause],
        B::PortBeingEnabled,
        B::Allowed,
        P::DisabledPortOnly,
    ),
    stable(
        StateId::Pause,
        "Pause",
        S::Pause,
        &[S::Idle, S::Executing],
        B::PortBeingEnabled,
        B::Allowed,
        P::DisabledPortOnly,
    ),
    stable(
        StateId::Invalid,
        "Invalid",
        S::Invalid,
        &[],
        B::IncorrectState,
        B::IncorrectState,
        P::Rejected,
    ),
    sub(
        StateId::LoadedToIdle,
        "LoadedToIdle",
        S::Loaded,
        S::Idle,
        B::AllocationPhase,
        B::NotImplemented,
        P::BeforeFirstBuffer,
        PortStatus::ACCEPT_USE_BUFFER,
    ),
    sub(
        StateId::LoadedToWaitForResources,
        "LoadedToWaitForResources",
        S::Loaded,
        S::WaitForResources,
        B::NotImplemented,
        B::NotImplemented,
        P::Allowed,
        PortStatus::NONE,
    ),
    sub(
        StateId::WaitForResourcesToLoaded,
        "WaitForResourcesToLoaded",
        S::WaitForResources,
        S::Loaded,
        B::NotImplemented,
        B::NotImplemented,
        P::Allowed,
        PortStatus::NONE,
    ),
    sub(
        StateId::IdleToLoaded,
        "IdleToLoaded",
        S::Idle,
        S::Loaded,
        B::NotImplemented,
        B::NotImplemented,
        P::DisabledPortOnly,
        PortStatus::ACCEPT_USE_BUFFER,
    ),
    sub(
        StateId::IdleToExecuting,
        "IdleToExecuting",
        S::Idle,
        S::Executing,
        B::PortBeingEnabled,
        B::Allowed,
        P::DisabledPortOnly,
        PortStatus::AWAIT_BUFFERS_RETURN,
    ),
    sub(
        StateId::IdleToPause,
        "IdleToPause",
        S::Idle,
        S::Pause,
        B::PortBeingEnabled,
        B::Allowed,
        P::DisabledPortOnly,
        PortStatus::AWAIT_BUFFERS_RETURN,
    ),
    sub(
        StateId::ExecutingToIdle,
        "ExecutingToIdle",
        S::Executing,
        S::Idle,
        B::NotImplemented,
        B::Allowed,
        P::DisabledPortOnly,
        PortStatus::AWAIT_BUFFERS_RETURN,
    ),
    sub(
        StateId::ExecutingToPause,
        "ExecutingToPause",
        S::Executing,
        S::Pause,
        B::PortBeingEnabled,
        B::Allowed,
        P::DisabledPortOnly,
        PortStatus::NONE,
    ),
    sub(
        StateId::PauseToIdle,
        "PauseToIdle",
        S::Pause,
        S::Idle,
        B::NotImplemented,
        B::Allowed,
        P::DisabledPortOnly,
        PortStatus::AWAIT_BUFFERS_RETURN,
    ),
    sub(
        StateId::PauseToExecuting,
        "PauseToExecuting",
        S::Pause,
        S::Executing,
        B::PortBeingEnabled,
        B::Allowed,
        P::DisabledPortOnly,
        PortStatus::NONE,
    ),
];

impl StateId {
    /// Every tag, in table order.
    pub const ALL: [StateId; 16] = [
        StateId::Loaded,
        StateId::WaitForResources,
        StateId::Idle,
        StateId::Executing,
        StateId::Pause,
        StateId::Invalid,
        StateId::LoadedToIdle,
        StateId::LoadedToWaitForResources,
        StateId::WaitForResourcesToLoaded,
        StateId::IdleToLoaded,
        StateId::IdleToExecuting,
        StateId::IdleToPause,
        StateId::ExecutingToIdle,
        StateId::ExecutingToPause,
        StateId::PauseToIdle,
        StateId::PauseToExecuting,
    ];

    pub fn info(self) -> &'static StateInfo {
        &STATE_TABLE[self as usize]
    }

    /// The stable tag for an externally visible state.
    pub fn stable(state: IlState) -> Self {
        match state {
            IlState::Loaded => Self::Loaded,
            IlState::Idle => Self::Idle,
            IlState::Executing => Self::Executing,
            IlState::Pause => Self::Pause,
            IlState::WaitForResources => Self::WaitForResources,
            IlState::Invalid => Self::Invalid,
        }
    }

    /// The compound sub-state entered for `from -> to`, if that pair is legal.
    pub fn sub_state(from: IlState, to: IlState) -> Option<Self> {
        match (from, to) {
            (IlState::Loaded, IlState::Idle) => Some(Self::LoadedToIdle),
            (IlState::Loaded, IlState::WaitForResources) => Some(Self::LoadedToWaitForResources),
            (IlState::WaitForResources, IlState::Loaded) => Some(Self::WaitForResourcesToLoaded),
            (IlState::Idle, IlState::Loaded) => Some(Self::IdleToLoaded),
            (IlState::Idle, IlState::Executing) => Some(Self::IdleToExecuting),
            (IlState::Idle, IlState::Pause) => Some(Self::IdleToPause),
            (IlState::Executing, IlState::Idle) => Some(Self::ExecutingToIdle),
            (IlState::Executing, IlState::Pause) => Some(Self::ExecutingToPause),
            (IlState::Pause, IlState::Idle) => Some(Self::PauseToIdle),
            (IlState::Pause, IlState::Executing) => Some(Self::PauseToExecuting),
            _ => None,
        }
    }

    /// What `GetState` reports. Sub-states report their origin.
    pub fn reported(self) -> IlState {
        match self.info().kind {
            StateKind::Stable(state) => state,
            StateKind::Sub { origin, .. } => origin,
        }
    }

    pub fn is_sub_state(self) -> bool {
        matches!(self.info().kind, StateKind::Sub { .. })
    }

    pub fn allows(self, target: IlState) -> bool {
        self.info().transitions.contains(&target)
    }

    pub fn origin(self) -> Option<IlState> {
        match self.info().kind {
            StateKind::Sub { origin, .. } => Some(origin),
            StateKind::Stable(_) => None,
        }
    }

    pub fn target(self) -> Option<IlState> {
        match self.info().kind {
            StateKind::Sub { target, .. } => Some(target),
            StateKind::Stable(_) => None,
        }
    }

    /// The sub-state that undoes this one.
    pub fn reverse(self) -> Option<Self> {
        match self.info().kind {
            StateKind::Sub { origin, target } => Self::sub_state(target, origin),
            StateKind::Stable(_) => None,
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().name)
    }
}
