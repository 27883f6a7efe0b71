//! The kernel servant: port set, readiness predicates, buffer allocation and
//! parameter dispatch.
//!
//! The kernel never decides a transition on its own. The state machine asks
//! it to do the work of the active sub-state and to evaluate the readiness
//! predicates; every predicate is a pure function of port state, so running it
//! twice with no intervening change gives the same answer.

use il_core::{
    BufferId, BufferSupplierParam, ComponentConfig, Error, EventPayload, Index, ParamStruct,
    ParamValue, PortSelector, PortStatus, Result,
};
use tracing::{debug, trace};

use crate::config_port::ConfigPort;
use crate::outbox::{Outbox, PeerMessage};
use crate::port::{BufferHeader, Holder, Port, TunnelPeer};

/// Collaborator answering vendor-range parameter and config indices.
pub trait ParamDelegate: Send {
    fn get_parameter(&self, index: Index, param: &mut ParamStruct) -> Result<()>;
    fn set_parameter(&mut self, index: Index, param: &ParamStruct) -> Result<()>;
}

/// Collaborator resolving vendor extension names not declared in the config.
pub trait ExtensionResolver: Send {
    fn resolve(&self, name: &str) -> Option<Index>;
}

pub struct Kernel {
    ports: Vec<Port>,
    config_port: ConfigPort,
    delegate: Option<Box<dyn ParamDelegate>>,
    resolver: Option<Box<dyn ExtensionResolver>>,
}

impl Kernel {
    pub fn new(config: &ComponentConfig) -> Self {
        let mut ports: Vec<Port> = config.ports.iter().map(Port::from_config).collect();
        ports.sort_by_key(Port::index);
        Self {
            ports,
            config_port: ConfigPort::new(config),
            delegate: None,
            resolver: None,
        }
    }

    pub fn config_port(&self) -> &ConfigPort {
        &self.config_port
    }

    pub fn set_delegate(&mut self, delegate: Box<dyn ParamDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn set_resolver(&mut self, resolver: Box<dyn ExtensionResolver>) {
        self.resolver = Some(resolver);
    }

    fn name(&self) -> &str {
        self.config_port.name()
    }

    // -- ports ----------------------------------------------------------------

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, index: u32) -> Result<&Port> {
        self.ports
            .iter()
            .find(|p| p.index() == index)
            .ok_or(Error::BadPortIndex(index))
    }

    pub fn port_mut(&mut self, index: u32) -> Result<&mut Port> {
        self.ports
            .iter_mut()
            .find(|p| p.index() == index)
            .ok_or(Error::BadPortIndex(index))
    }

    /// Port indices addressed by a command.
    pub fn select(&self, selector: PortSelector) -> Result<Vec<u32>> {
        match selector {
            PortSelector::All => Ok(self.ports.iter().map(Port::index).collect()),
            PortSelector::Port(index) => self.port(index).map(|p| vec![p.index()]),
        }
    }

    /// Record a tunnel on `index`. The port must not be tunneled already.
    pub fn setup_tunnel(&mut self, index: u32, peer: TunnelPeer, supplier: bool) -> Result<()> {
        let port = self.port_mut(index)?;
        if let Some(existing) = port.tunnel() {
            return Err(Error::bad_parameter(format!(
                "port {index} already tunneled to {existing}"
            )));
        }
        port.attach_tunnel(peer, supplier);
        debug!(component = %self.name(), port = index, %peer, supplier, "tunnel established");
        Ok(())
    }

    pub fn tear_down_tunnel(&mut self, index: u32) -> Result<Option<TunnelPeer>> {
        Ok(self.port_mut(index)?.detach_tunnel())
    }

    // -- port status ----------------------------------------------------------

    /// Set `flag` on one port and tell its neighbour if anything changed.
    pub fn set_port_status(
        &mut self,
        index: u32,
        flag: PortStatus,
        outbox: &mut Outbox,
    ) -> Result<()> {
        let port = self.port_mut(index)?;
        if port.set_status(flag) {
            notify_peer(port, outbox);
        }
        Ok(())
    }

    pub fn clear_port_status(
        &mut self,
        index: u32,
        flag: PortStatus,
        outbox: &mut Outbox,
    ) -> Result<()> {
        let port = self.port_mut(index)?;
        if port.clear_status(flag) {
            notify_peer(port, outbox);
        }
        Ok(())
    }

    /// Clear `flag` on every port in one step. Returns how many ports changed.
    pub fn reset_tunneled_ports_status(&mut self, flag: PortStatus, outbox: &mut Outbox) -> usize {
        let mut changed = 0;
        for port in &mut self.ports {
            if port.clear_status(flag) {
                changed += 1;
                notify_peer(port, outbox);
            }
        }
        trace!(component = %self.name(), %flag, changed, "port status reset");
        changed
    }

    /// Advertise ACCEPT_USE_BUFFER on every enabled port that receives its
    /// buffers from someone else.
    pub fn advertise_use_buffer(&mut self, outbox: &mut Outbox) {
        for port in self.ports.iter_mut().filter(|p| p.is_enabled() && !p.is_supplier()) {
            if port.set_status(PortStatus::ACCEPT_USE_BUFFER) {
                notify_peer(port, outbox);
            }
        }
    }

    /// Flag supplier ports whose neighbour still holds buffers.
    pub fn await_buffers_return(&mut self, outbox: &mut Outbox) {
        for port in self.ports.iter_mut().filter(|p| p.is_enabled() && p.is_supplier()) {
            if port.buffers_held_by_peer() > 0 && port.set_status(PortStatus::AWAIT_BUFFERS_RETURN)
            {
                notify_peer(port, outbox);
            }
        }
    }

    // -- readiness predicates -------------------------------------------------

    fn enabled_suppliers(&self) -> impl Iterator<Item = &Port> {
        self.ports
            .iter()
            .filter(|p| p.is_enabled() && p.is_supplier())
    }

    /// Every neighbour we supply has advertised ACCEPT_USE_BUFFER.
    pub fn may_init_alloc_phase(&self) -> bool {
        self.enabled_suppliers()
            .all(|p| p.peer_status().contains(PortStatus::ACCEPT_USE_BUFFER))
    }

    /// Every buffer we supplied is back with us.
    pub fn may_init_exe_to_idle(&self) -> bool {
        self.enabled_suppliers()
            .all(|p| p.buffers_held_by_peer() == 0)
    }

    pub fn all_enabled_populated(&self) -> bool {
        self.ports
            .iter()
            .filter(|p| p.is_enabled())
            .all(Port::is_populated)
    }

    pub fn all_enabled_depopulated(&self) -> bool {
        self.ports
            .iter()
            .filter(|p| p.is_enabled())
            .all(|p| !p.has_buffers())
    }

    // -- buffer movement ------------------------------------------------------

    /// Allocate the missing buffers of supplier ports and register each on
    /// the neighbour. `only` restricts the work to one port.
    pub fn allocate_supplier_buffers(&mut self, only: Option<u32>, outbox: &mut Outbox) -> Result<()> {
        let name = self.config_port.name().to_string();
        for port in self.ports.iter_mut().filter(|p| p.is_supplier()) {
            if only.is_some_and(|i| i != port.index()) || (only.is_none() && !port.is_enabled()) {
                continue;
            }
            let Some(peer) = port.tunnel() else { continue };
            while (port.buffer_count() as u32) < port.buffer_count_actual() {
                let header = BufferHeader::allocated(port.index(), port.buffer_size());
                port.add_buffer(header.clone(), Holder::Component)?;
                outbox.send(PeerMessage::UseBuffer {
                    to: peer,
                    header: header.rebound(peer.port),
                });
            }
            debug!(component = %name, port = port.index(), count = port.buffer_count(), "supplier buffers allocated");
        }
        Ok(())
    }

    /// Free every buffer a supplier port currently holds and withdraw it from
    /// the neighbour. Buffers still out with the neighbour are left alone.
    pub fn free_supplier_buffers(&mut self, only: Option<u32>, outbox: &mut Outbox) {
        for port in self.ports.iter_mut().filter(|p| p.is_supplier()) {
            if only.is_some_and(|i| i != port.index()) {
                continue;
            }
            let Some(peer) = port.tunnel() else { continue };
            for id in port.buffer_ids(Holder::Component) {
                if port.remove_buffer(id).is_ok() {
                    outbox.send(PeerMessage::FreeBuffer {
                        to: peer,
                        buffer: id,
                    });
                }
            }
        }
    }

    /// Hand back every buffer the component holds on non-supplier ports.
    /// Returns the number of buffers released.
    pub fn return_held_buffers(&mut self, only: Option<u32>, outbox: &mut Outbox) -> usize {
        let mut released = 0;
        let indices: Vec<u32> = self
            .ports
            .iter()
            .filter(|p| !p.is_supplier() && only.map_or(true, |i| i == p.index()))
            .map(Port::index)
            .collect();
        for index in indices {
            let held = match self.port(index) {
                Ok(port) => port.buffer_ids(Holder::Component),
                Err(_) => continue,
            };
            for id in held {
                if self.release_buffer(index, id, outbox).is_ok() {
                    released += 1;
                }
            }
        }
        released
    }

    /// Give one buffer back: across the tunnel, or to the client as a
    /// `BufferDone` event.
    pub fn release_buffer(&mut self, index: u32, id: BufferId, outbox: &mut Outbox) -> Result<()> {
        let port = self.port_mut(index)?;
        let header = port.release(id)?;
        match port.tunnel() {
            Some(peer) => outbox.send(PeerMessage::Deliver {
                to: peer,
                header: header.rebound(peer.port),
            }),
            None => outbox.emit(EventPayload::BufferDone {
                port: index,
                direction: port.direction(),
                buffer: id,
            }),
        }
        Ok(())
    }

    // -- parameters -----------------------------------------------------------

    pub fn get_parameter(&self, index: Index, param: &mut ParamStruct) -> Result<()> {
        param.validate()?;
        match index {
            Index::ParamPortDefinition => {
                let port = self.port(addressed_port(param)?)?;
                param.fill(ParamValue::PortDefinition(port.definition()))
            }
            Index::ParamCompBufferSupplier => {
                let port = self.port(addressed_port(param)?)?;
                param.fill(ParamValue::BufferSupplier(BufferSupplierParam {
                    port_index: port.index(),
                    supplier: port.supplier_preference(),
                }))
            }
            Index::Vendor(raw) => match &self.delegate {
                Some(delegate) => delegate.get_parameter(index, param),
                None => Err(Error::UnsupportedIndex(raw)),
            },
            _ => self.config_port.get_parameter(index, param),
        }
    }

    pub fn set_parameter(&mut self, index: Index, param: &ParamStruct) -> Result<()> {
        param.validate()?;
        match (index, &param.value) {
            (Index::ParamPortDefinition, ParamValue::PortDefinition(def)) => {
                self.port_mut(def.port_index)?.apply_definition(def)
            }
            (Index::ParamCompBufferSupplier, ParamValue::BufferSupplier(sup)) => {
                self.port_mut(sup.port_index)?
                    .set_supplier_preference(sup.supplier);
                Ok(())
            }
            (Index::ParamPortDefinition | Index::ParamCompBufferSupplier, value) => Err(
                Error::bad_parameter(format!("{index} does not take a {} struct", value.type_name())),
            ),
            (Index::Vendor(raw), _) => match &mut self.delegate {
                Some(delegate) => delegate.set_parameter(index, param),
                None => Err(Error::UnsupportedIndex(raw)),
            },
            _ => self.config_port.set_parameter(index, param),
        }
    }

    pub fn get_config(&self, index: Index, param: &mut ParamStruct) -> Result<()> {
        param.validate()?;
        match index {
            Index::Vendor(raw) => match &self.delegate {
                Some(delegate) => delegate.get_parameter(index, param),
                None => Err(Error::UnsupportedIndex(raw)),
            },
            _ => self.config_port.get_config(index, param),
        }
    }

    pub fn set_config(&mut self, index: Index, param: &ParamStruct) -> Result<()> {
        param.validate()?;
        match index {
            Index::Vendor(raw) => match &mut self.delegate {
                Some(delegate) => delegate.set_parameter(index, param),
                None => Err(Error::UnsupportedIndex(raw)),
            },
            _ => self.config_port.set_config(index, param),
        }
    }

    pub fn get_extension_index(&self, name: &str) -> Result<Index> {
        self.config_port
            .extension_index(name)
            .or_else(|| self.resolver.as_ref().and_then(|r| r.resolve(name)))
            .ok_or_else(|| Error::UnsupportedExtension(name.to_string()))
    }
}

fn notify_peer(port: &Port, outbox: &mut Outbox) {
    if let Some(peer) = port.tunnel() {
        outbox.send(PeerMessage::StatusChanged {
            to: peer,
            status: port.status(),
        });
    }
}

fn addressed_port(param: &ParamStruct) -> Result<u32> {
    param.value.port_index().ok_or_else(|| {
        Error::bad_parameter(format!(
            "{} struct does not address a port",
            param.value.type_name()
        ))
    })
}
