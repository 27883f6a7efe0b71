//! Ports and their buffer bookkeeping.
//!
//! A [`Port`] is seeded from a [`PortConfig`] entry and owns the headers of
//! every buffer registered on it. Each header is held either by the component
//! or by the other side (the IL client, or the tunnel neighbour), and the
//! port only ever hands out clones.

use bytes::BytesMut;
use il_core::{
    BufferId, BufferSupplier, ComponentUuid, Error, Mark, PortConfig, PortDefinition,
    PortDirection, PortDomain, PortStatus, Result,
};
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// TunnelPeer
// ---------------------------------------------------------------------------

/// The other end of a tunnel. A relation only; the peer is never owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TunnelPeer {
    pub component: ComponentUuid,
    pub port: u32,
}

impl fmt::Display for TunnelPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.component, self.port)
    }
}

// ---------------------------------------------------------------------------
// BufferHeader
// ---------------------------------------------------------------------------

/// Header describing one buffer registered on a port.
///
/// Tunneled buffers keep the same [`BufferId`] on both ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferHeader {
    pub id: BufferId,
    pub port: u32,
    pub alloc_len: u32,
    pub filled_len: u32,
    pub mark: Option<Mark>,
    /// Backing memory, present when the buffer was allocated by a component.
    pub data: Option<BytesMut>,
}

impl BufferHeader {
    /// Header for a client-provided buffer (`UseBuffer`).
    pub fn external(port: u32, size: u32) -> Self {
        Self {
            id: BufferId::new(),
            port,
            alloc_len: size,
            filled_len: 0,
            mark: None,
            data: None,
        }
    }

    /// Header backed by freshly allocated, zeroed memory.
    pub fn allocated(port: u32, size: u32) -> Self {
        Self {
            data: Some(BytesMut::zeroed(size as usize)),
            ..Self::external(port, size)
        }
    }

    /// The same buffer as seen from another port (tunnel registration).
    pub fn rebound(&self, port: u32) -> Self {
        Self {
            port,
            ..self.clone()
        }
    }
}

/// Which side currently holds a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holder {
    Component,
    Peer,
}

#[derive(Debug, Clone)]
struct BufferSlot {
    header: BufferHeader,
    holder: Holder,
}

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// One port of a component.
#[derive(Debug, Clone)]
pub struct Port {
    index: u32,
    direction: PortDirection,
    domain: PortDomain,
    buffer_count_min: u32,
    buffer_count_actual: u32,
    buffer_size: u32,
    enabled: bool,
    populated: bool,
    supplier_preference: BufferSupplier,
    status: PortStatus,
    peer_status: PortStatus,
    tunnel: Option<TunnelPeer>,
    supplier: bool,
    buffers: Vec<BufferSlot>,
    marks: VecDeque<Mark>,
}

impl Port {
    pub fn from_config(config: &PortConfig) -> Self {
        Self {
            index: config.index,
            direction: config.direction,
            domain: config.domain,
            buffer_count_min: config.buffer_count_min,
            buffer_count_actual: config.buffer_count_actual,
            buffer_size: config.buffer_size,
            enabled: config.enabled,
            populated: false,
            supplier_preference: config.supplier,
            status: PortStatus::NONE,
            peer_status: PortStatus::NONE,
            tunnel: None,
            supplier: false,
            buffers: Vec::new(),
            marks: VecDeque::new(),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn buffer_count_actual(&self) -> u32 {
        self.buffer_count_actual
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn supplier_preference(&self) -> BufferSupplier {
        self.supplier_preference
    }

    pub fn status(&self) -> PortStatus {
        self.status
    }

    /// Last status snapshot received from the tunnel neighbour.
    pub fn peer_status(&self) -> PortStatus {
        self.peer_status
    }

    pub fn tunnel(&self) -> Option<TunnelPeer> {
        self.tunnel
    }

    pub fn is_tunneled(&self) -> bool {
        self.tunnel.is_some()
    }

    /// Whether this side of the tunnel allocates and frees the buffers.
    pub fn is_supplier(&self) -> bool {
        self.tunnel.is_some() && self.supplier
    }

    pub fn has_buffers(&self) -> bool {
        !self.buffers.is_empty()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Sets `flag`; returns whether the status changed.
    pub fn set_status(&mut self, flag: PortStatus) -> bool {
        let before = self.status;
        self.status.insert(flag);
        before != self.status
    }

    /// Clears `flag`; returns whether the status changed.
    pub fn clear_status(&mut self, flag: PortStatus) -> bool {
        let before = self.status;
        self.status.remove(flag);
        before != self.status
    }

    pub fn set_peer_status(&mut self, status: PortStatus) {
        self.peer_status = status;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn set_supplier_preference(&mut self, supplier: BufferSupplier) {
        self.supplier_preference = supplier;
    }

    pub(crate) fn attach_tunnel(&mut self, peer: TunnelPeer, supplier: bool) {
        self.tunnel = Some(peer);
        self.supplier = supplier;
        self.peer_status = PortStatus::NONE;
    }

    pub(crate) fn detach_tunnel(&mut self) -> Option<TunnelPeer> {
        self.supplier = false;
        self.peer_status = PortStatus::NONE;
        self.tunnel.take()
    }

    /// Snapshot as the `PortDefinition` parameter.
    pub fn definition(&self) -> PortDefinition {
        PortDefinition {
            port_index: self.index,
            direction: self.direction,
            domain: self.domain,
            buffer_count_actual: self.buffer_count_actual,
            buffer_count_min: self.buffer_count_min,
            buffer_size: self.buffer_size,
            enabled: self.enabled,
            populated: self.populated,
        }
    }

    /// Apply the writable fields of a `PortDefinition`.
    pub fn apply_definition(&mut self, def: &PortDefinition) -> Result<()> {
        if def.buffer_count_actual < self.buffer_count_min {
            return Err(Error::bad_parameter(format!(
                "port {}: buffer_count_actual {} < minimum {}",
                self.index, def.buffer_count_actual, self.buffer_count_min
            )));
        }
        if def.buffer_size == 0 {
            return Err(Error::bad_parameter(format!(
                "port {}: buffer_size must be positive",
                self.index
            )));
        }
        if def.direction != self.direction {
            return Err(Error::bad_parameter(format!(
                "port {}: direction is read-only",
                self.index
            )));
        }
        self.buffer_count_actual = def.buffer_count_actual;
        self.buffer_size = def.buffer_size;
        Ok(())
    }

    // -- buffer bookkeeping ---------------------------------------------------

    /// Register a buffer header on this port.
    pub fn add_buffer(&mut self, header: BufferHeader, holder: Holder) -> Result<()> {
        if self.buffers.len() as u32 >= self.buffer_count_actual {
            return Err(Error::bad_parameter(format!(
                "port {} already holds {} buffers",
                self.index, self.buffer_count_actual
            )));
        }
        if header.alloc_len < self.buffer_size {
            return Err(Error::bad_parameter(format!(
                "port {}: buffer of {} bytes is smaller than {}",
                self.index, header.alloc_len, self.buffer_size
            )));
        }
        if self.buffers.iter().any(|s| s.header.id == header.id) {
            return Err(Error::bad_parameter(format!(
                "buffer {} already registered on port {}",
                header.id, self.index
            )));
        }
        self.buffers.push(BufferSlot { header, holder });
        self.populated = self.buffers.len() as u32 == self.buffer_count_actual;
        Ok(())
    }

    /// Unregister a buffer. Any missing buffer leaves the port unpopulated.
    pub fn remove_buffer(&mut self, id: BufferId) -> Result<BufferHeader> {
        let pos = self
            .buffers
            .iter()
            .position(|s| s.header.id == id)
            .ok_or_else(|| {
                Error::bad_parameter(format!("buffer {id} not registered on port {}", self.index))
            })?;
        let slot = self.buffers.remove(pos);
        self.populated = false;
        Ok(slot.header)
    }

    pub fn buffer(&self, id: BufferId) -> Option<&BufferHeader> {
        self.buffers
            .iter()
            .find(|s| s.header.id == id)
            .map(|s| &s.header)
    }

    pub fn holder(&self, id: BufferId) -> Option<Holder> {
        self.buffers
            .iter()
            .find(|s| s.header.id == id)
            .map(|s| s.holder)
    }

    pub fn buffers_held_by_peer(&self) -> usize {
        self.buffers
            .iter()
            .filter(|s| s.holder == Holder::Peer)
            .count()
    }

    pub fn buffers_held_by_component(&self) -> usize {
        self.buffers
            .iter()
            .filter(|s| s.holder == Holder::Component)
            .count()
    }

    /// Ids of the buffers currently held by `holder`, in registration order.
    pub fn buffer_ids(&self, holder: Holder) -> Vec<BufferId> {
        self.buffers
            .iter()
            .filter(|s| s.holder == holder)
            .map(|s| s.header.id)
            .collect()
    }

    /// The peer hands a buffer to the component. Payload fields are copied
    /// from `incoming`; a mark it carries is returned but not kept.
    pub fn receive(&mut self, incoming: &BufferHeader) -> Result<BufferHeader> {
        let index = self.index;
        let slot = self
            .buffers
            .iter_mut()
            .find(|s| s.header.id == incoming.id)
            .ok_or_else(|| {
                Error::bad_parameter(format!(
                    "buffer {} not registered on port {index}",
                    incoming.id
                ))
            })?;
        if slot.holder == Holder::Component {
            return Err(Error::bad_parameter(format!(
                "buffer {} already held by the component",
                incoming.id
            )));
        }
        slot.holder = Holder::Component;
        slot.header.filled_len = incoming.filled_len;
        if incoming.data.is_some() {
            slot.header.data = incoming.data.clone();
        }
        Ok(BufferHeader {
            mark: incoming.mark,
            ..slot.header.clone()
        })
    }

    /// The component hands a buffer back to the peer. A pending mark is
    /// attached on the way out.
    pub fn release(&mut self, id: BufferId) -> Result<BufferHeader> {
        let index = self.index;
        let pending = &mut self.marks;
        let slot = self
            .buffers
            .iter_mut()
            .find(|s| s.header.id == id)
            .ok_or_else(|| {
                Error::bad_parameter(format!("buffer {id} not registered on port {index}"))
            })?;
        if slot.holder == Holder::Peer {
            return Err(Error::bad_parameter(format!(
                "buffer {id} is not held by the component"
            )));
        }
        slot.holder = Holder::Peer;
        Ok(BufferHeader {
            mark: pending.pop_front(),
            ..slot.header.clone()
        })
    }

    pub fn push_mark(&mut self, mark: Mark) {
        self.marks.push_back(mark);
    }

    pub fn pending_marks(&self) -> usize {
        self.marks.len()
    }
}
