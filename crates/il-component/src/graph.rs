//! The serializing layer between components.
//!
//! A [`Graph`] owns a set of components and the tunnels between them. It runs
//! one call at a time and then pumps the peer messages that call produced,
//! first in first out, until every outbox is empty. No component call ever
//! nests inside another.

use il_core::{
    BufferId, BufferSupplier, Command, ComponentConfig, ComponentUuid, Error, EventBus, IlState,
    PortDirection, Result,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::component::Component;
use crate::fsm::Servant;
use crate::outbox::PeerMessage;
use crate::port::{BufferHeader, TunnelPeer};
use crate::processor::Processor;

pub struct Graph {
    bus: Arc<EventBus>,
    components: Vec<Component>,
    by_uuid: HashMap<ComponentUuid, usize>,
    queue: VecDeque<PeerMessage>,
}

impl Graph {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            components: Vec::new(),
            by_uuid: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn add(&mut self, config: ComponentConfig) -> Result<ComponentUuid> {
        let component = Component::new(config, self.bus.clone())?;
        Ok(self.insert(component))
    }

    pub fn add_with_processor(
        &mut self,
        config: ComponentConfig,
        processor: Box<dyn Processor>,
    ) -> Result<ComponentUuid> {
        let component = Component::with_processor(config, self.bus.clone(), processor)?;
        Ok(self.insert(component))
    }

    fn insert(&mut self, component: Component) -> ComponentUuid {
        let uuid = component.uuid();
        self.by_uuid.insert(uuid, self.components.len());
        self.components.push(component);
        uuid
    }

    pub fn component(&self, id: ComponentUuid) -> Result<&Component> {
        self.by_uuid
            .get(&id)
            .map(|&i| &self.components[i])
            .ok_or_else(|| unknown(id))
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    /// Run `f` against one component, then deliver everything it queued.
    pub fn with_component<T>(
        &mut self,
        id: ComponentUuid,
        f: impl FnOnce(&mut Component) -> Result<T>,
    ) -> Result<T> {
        let index = *self.by_uuid.get(&id).ok_or_else(|| unknown(id))?;
        let result = f(&mut self.components[index]);
        self.pump();
        result
    }

    /// Tunnel an output port to an input port. The input side supplies the
    /// buffers only when it asks for it; otherwise the output side does.
    pub fn connect(
        &mut self,
        output: ComponentUuid,
        output_port: u32,
        input: ComponentUuid,
        input_port: u32,
    ) -> Result<()> {
        if output == input {
            return Err(Error::bad_parameter("cannot tunnel a component to itself"));
        }
        let out_dir = self.component(output)?.port(output_port)?.direction();
        let in_port = self.component(input)?.port(input_port)?;
        if out_dir != PortDirection::Output || in_port.direction() != PortDirection::Input {
            return Err(Error::bad_parameter(format!(
                "tunnel must run output -> input, got {out_dir} -> {}",
                in_port.direction()
            )));
        }
        let input_supplies = in_port.supplier_preference() == BufferSupplier::Input;

        let out_peer = TunnelPeer {
            component: input,
            port: input_port,
        };
        let in_peer = TunnelPeer {
            component: output,
            port: output_port,
        };
        self.component_mut(output)?
            .setup_tunnel(output_port, out_peer, !input_supplies)?;
        if let Err(err) = self
            .component_mut(input)?
            .setup_tunnel(input_port, in_peer, input_supplies)
        {
            self.component_mut(output)?.tear_down_tunnel(output_port)?;
            return Err(err);
        }
        info!(output = %in_peer, input = %out_peer, input_supplies, "ports tunneled");
        Ok(())
    }

    /// Remove the tunnel on `port` from both ends.
    pub fn disconnect(&mut self, id: ComponentUuid, port: u32) -> Result<()> {
        let Some(peer) = self.component_mut(id)?.tear_down_tunnel(port)? else {
            return Ok(());
        };
        self.component_mut(peer.component)?
            .tear_down_tunnel(peer.port)?;
        debug!(component = %id, port, %peer, "tunnel removed");
        Ok(())
    }

    fn component_mut(&mut self, id: ComponentUuid) -> Result<&mut Component> {
        let index = *self.by_uuid.get(&id).ok_or_else(|| unknown(id))?;
        Ok(&mut self.components[index])
    }

    // -- serialized calls -----------------------------------------------------

    pub fn send_command(&mut self, id: ComponentUuid, command: Command) -> Result<()> {
        self.with_component(id, |c| c.send_command(command))
    }

    pub fn get_state(&self, id: ComponentUuid) -> Result<IlState> {
        Ok(self.component(id)?.get_state())
    }

    pub fn use_buffer(&mut self, id: ComponentUuid, port: u32, size: u32) -> Result<BufferHeader> {
        self.with_component(id, |c| c.use_buffer(port, size))
    }

    pub fn allocate_buffer(
        &mut self,
        id: ComponentUuid,
        port: u32,
        size: u32,
    ) -> Result<BufferHeader> {
        self.with_component(id, |c| c.allocate_buffer(port, size))
    }

    pub fn free_buffer(&mut self, id: ComponentUuid, port: u32, buffer: BufferId) -> Result<()> {
        self.with_component(id, |c| c.free_buffer(port, buffer))
    }

    pub fn empty_this_buffer(&mut self, id: ComponentUuid, header: &BufferHeader) -> Result<()> {
        self.with_component(id, |c| c.empty_this_buffer(header))
    }

    pub fn fill_this_buffer(&mut self, id: ComponentUuid, header: &BufferHeader) -> Result<()> {
        self.with_component(id, |c| c.fill_this_buffer(header))
    }

    pub fn buffer_done(&mut self, id: ComponentUuid, port: u32, buffer: BufferId) -> Result<()> {
        self.with_component(id, |c| c.buffer_done(port, buffer))
    }

    pub fn servant_complete(
        &mut self,
        id: ComponentUuid,
        servant: Servant,
        reached: IlState,
    ) -> Result<()> {
        self.with_component(id, |c| c.servant_complete(servant, reached))
    }

    /// Deinitialise and drop a component. Its tunnels are torn down on the
    /// neighbours' side as well.
    pub fn remove(&mut self, id: ComponentUuid) -> Result<()> {
        let index = *self.by_uuid.get(&id).ok_or_else(|| unknown(id))?;
        let peers: Vec<TunnelPeer> = self.components[index]
            .ports()
            .iter()
            .filter_map(|p| p.tunnel())
            .collect();
        for peer in peers {
            let result = self
                .component_mut(peer.component)
                .and_then(|neighbour| neighbour.tear_down_tunnel(peer.port));
            if let Err(err) = result {
                warn!(component = %id, %peer, %err, "neighbour tunnel end not torn down");
            }
        }
        let mut component = self.components.remove(index);
        component.deinit();
        self.by_uuid = self
            .components
            .iter()
            .enumerate()
            .map(|(i, c)| (c.uuid(), i))
            .collect();
        self.queue.retain(|m| m.recipient().component != id);
        Ok(())
    }

    /// Deliver queued peer messages until every outbox is empty. Returns the
    /// number of messages delivered.
    pub fn pump(&mut self) -> usize {
        let mut delivered = 0;
        loop {
            for component in &mut self.components {
                self.queue.extend(component.take_outbox());
            }
            let Some(message) = self.queue.pop_front() else {
                break;
            };
            let to = message.recipient();
            match self.by_uuid.get(&to.component) {
                Some(&index) => {
                    trace!(recipient = %to, ?message, "delivering peer message");
                    if let Err(err) = self.components[index].handle_peer_message(message) {
                        warn!(recipient = %to, %err, "peer message rejected");
                    }
                }
                None => warn!(recipient = %to, "peer message for unknown component dropped"),
            }
            delivered += 1;
        }
        delivered
    }
}

fn unknown(id: ComponentUuid) -> Error {
    Error::bad_parameter(format!("unknown component {id}"))
}
