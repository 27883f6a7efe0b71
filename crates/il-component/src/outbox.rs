//! Side effects produced while a component services a call.
//!
//! Components never call each other directly. Anything addressed to a tunnel
//! neighbour is queued as a [`PeerMessage`] and delivered by the serializing
//! layer once the current call has returned.

use il_core::{BufferId, EventPayload, PortStatus};

use crate::port::{BufferHeader, TunnelPeer};

/// A message for the component on the other end of a tunnel.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerMessage {
    /// Our port's status changed; the neighbour refreshes its snapshot.
    StatusChanged { to: TunnelPeer, status: PortStatus },
    /// A supplier registers a buffer it allocated on the neighbour's port.
    UseBuffer { to: TunnelPeer, header: BufferHeader },
    /// A supplier withdraws a buffer from the neighbour's port.
    FreeBuffer { to: TunnelPeer, buffer: BufferId },
    /// Hand a buffer across the tunnel (`EmptyThisBuffer` towards an input
    /// port, `FillThisBuffer` towards an output port).
    Deliver { to: TunnelPeer, header: BufferHeader },
}

impl PeerMessage {
    pub fn recipient(&self) -> TunnelPeer {
        match self {
            Self::StatusChanged { to, .. }
            | Self::UseBuffer { to, .. }
            | Self::FreeBuffer { to, .. }
            | Self::Deliver { to, .. } => *to,
        }
    }
}

/// Messages and client events accumulated during one dispatch cycle.
#[derive(Debug, Default)]
pub struct Outbox {
    pub messages: Vec<PeerMessage>,
    pub events: Vec<EventPayload>,
}

impl Outbox {
    pub fn send(&mut self, message: PeerMessage) {
        self.messages.push(message);
    }

    pub fn emit(&mut self, event: EventPayload) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.events.is_empty()
    }
}
