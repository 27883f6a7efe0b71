//! il-component: the generic IL component runtime.
//!
//! A [`Component`] owns a [`Kernel`] (ports, buffers, parameters) and an
//! optional [`Processor`] servant, and moves through the IL lifecycle with an
//! explicit sub-state per transition. A [`Graph`] serializes calls between
//! tunneled components.

pub mod component;
pub mod config_port;
pub mod fsm;
pub mod graph;
pub mod kernel;
pub mod manager;
pub mod outbox;
pub mod port;
pub mod processor;
pub mod state;

pub use component::{Component, FsmEvent};
pub use config_port::ComponentVersion;
pub use fsm::{Servant, ServantPlan, TransitionBarrier};
pub use graph::Graph;
pub use kernel::{ExtensionResolver, Kernel, ParamDelegate};
pub use manager::{Cmd, ManagedFsm, Manager, Operations};
pub use outbox::PeerMessage;
pub use port::{BufferHeader, Holder, Port, TunnelPeer};
pub use processor::{BufferAction, PassthroughProcessor, Processor, ServantReply};
pub use state::StateId;
