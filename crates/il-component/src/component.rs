//! The component façade.
//!
//! [`Component`] is what an IL client talks to. Every public entry point runs
//! one dispatch cycle: it checks the call against the active state's policy,
//! drives the state machine and the kernel, and finally surfaces any fatal
//! error and publishes the events the cycle produced. Messages for tunnel
//! neighbours are left in the outbox for the serializing layer.

use il_core::{
    BufferId, Command, CommandKind, ComponentConfig, ComponentUuid, Error, EventBus,
    EventPayload, IlState, Index, ParamStruct, PortDirection, PortStatus, Result,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

use crate::config_port::ComponentVersion;
use crate::fsm::{Fsm, Request, Servant, ServantPlan};
use crate::kernel::{ExtensionResolver, Kernel, ParamDelegate};
use crate::outbox::{Outbox, PeerMessage};
use crate::port::{BufferHeader, Holder, Port, TunnelPeer};
use crate::processor::{BufferAction, PassthroughProcessor, Processor, ServantReply};
use crate::state::{BufferPolicy, ParamPolicy, StateId};

/// An event injected into a component from outside a client call.
#[derive(Debug, Clone)]
pub enum FsmEvent {
    Command(Command),
    TransComplete { servant: Servant, state: IlState },
    PortStatus { port: u32, status: PortStatus },
    Fatal(Error),
}

pub struct Component {
    kernel: Kernel,
    fsm: Fsm,
    processor: Box<dyn Processor>,
    deferred: VecDeque<Command>,
    fatal: Option<Error>,
    outbox: Outbox,
    bus: Arc<EventBus>,
    deinitialised: bool,
}

impl Component {
    pub fn new(config: ComponentConfig, bus: Arc<EventBus>) -> Result<Self> {
        Self::with_processor(config, bus, Box::new(PassthroughProcessor))
    }

    pub fn with_processor(
        config: ComponentConfig,
        bus: Arc<EventBus>,
        processor: Box<dyn Processor>,
    ) -> Result<Self> {
        config.validate()?;
        let kernel = Kernel::new(&config);
        let fsm = Fsm::new(ServantPlan::from_config(&config));
        info!(
            component = %kernel.config_port().name(),
            uuid = %kernel.config_port().uuid(),
            ports = kernel.ports().len(),
            servants = fsm.plan().expected(),
            "component instantiated"
        );
        Ok(Self {
            kernel,
            fsm,
            processor,
            deferred: VecDeque::new(),
            fatal: None,
            outbox: Outbox::default(),
            bus,
            deinitialised: false,
        })
    }

    pub fn set_param_delegate(&mut self, delegate: Box<dyn ParamDelegate>) {
        self.kernel.set_delegate(delegate);
    }

    pub fn set_extension_resolver(&mut self, resolver: Box<dyn ExtensionResolver>) {
        self.kernel.set_resolver(resolver);
    }

    // -- introspection --------------------------------------------------------

    pub fn uuid(&self) -> ComponentUuid {
        self.kernel.config_port().uuid()
    }

    pub fn name(&self) -> &str {
        self.kernel.config_port().name()
    }

    /// The externally visible state (`GetState`).
    pub fn get_state(&self) -> IlState {
        self.fsm.current().reported()
    }

    /// The exact state tag, sub-states included.
    pub fn state_id(&self) -> StateId {
        self.fsm.current()
    }

    /// Servants that have acknowledged the open barrier; 0 when none is open.
    pub fn servants_arrived(&self) -> usize {
        self.fsm.barrier().map_or(0, |b| b.arrived())
    }

    pub fn servants_expected(&self) -> usize {
        self.fsm.plan().expected()
    }

    pub fn deferred_commands(&self) -> usize {
        self.deferred.len()
    }

    pub fn port(&self, index: u32) -> Result<&Port> {
        self.kernel.port(index)
    }

    pub fn ports(&self) -> &[Port] {
        self.kernel.ports()
    }

    pub fn is_deinitialised(&self) -> bool {
        self.deinitialised
    }

    // -- commands -------------------------------------------------------------

    pub fn send_command(&mut self, command: Command) -> Result<()> {
        self.ensure_alive()?;
        debug!(component = %self.name(), %command, state = %self.fsm.current(), "command received");
        let result = match command {
            Command::StateSet { target } => self.state_set(target),
            other if self.fsm.in_transition() => self.defer(other),
            other => self.run_port_command(other),
        };
        self.end_cycle();
        result
    }

    fn defer(&mut self, command: Command) -> Result<()> {
        match &command {
            Command::PortEnable { port }
            | Command::PortDisable { port }
            | Command::Flush { port } => {
                self.kernel.select(*port)?;
            }
            Command::MarkBuffer { port, .. } => {
                self.kernel.port(*port)?;
            }
            Command::StateSet { .. } => {}
        }
        trace!(component = %self.name(), %command, state = %self.fsm.current(), "command deferred");
        self.deferred.push_back(command);
        Ok(())
    }

    fn state_set(&mut self, target: IlState) -> Result<()> {
        match self.fsm.request(target)? {
            Request::Started(sub) => {
                debug!(component = %self.name(), state = %sub, %target, "transition started");
            }
            Request::Cancelled(sub) => {
                info!(component = %self.name(), state = %sub, %target, "transition cancelled");
            }
        }
        self.notify_processor(target);
        self.drive();
        Ok(())
    }

    fn notify_processor(&mut self, target: IlState) {
        if !self.fsm.plan().includes(Servant::Processor) {
            return;
        }
        match self.processor.on_state_set(target) {
            Ok(ServantReply::Done) => {
                if let Err(err) = self.arrive(Servant::Processor, target) {
                    self.record_fatal(err);
                }
            }
            Ok(ServantReply::Pending) => {
                trace!(component = %self.name(), %target, "processor completes asynchronously");
            }
            Err(err) => self.record_fatal(err),
        }
    }

    fn run_port_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::StateSet { target } => return self.state_set(target),
            Command::PortEnable { port } => {
                for index in self.kernel.select(port)? {
                    self.enable_port(index)?;
                }
            }
            Command::PortDisable { port } => {
                for index in self.kernel.select(port)? {
                    self.disable_port(index)?;
                }
            }
            Command::Flush { port } => {
                self.require_running("Flush")?;
                for index in self.kernel.select(port)? {
                    self.flush_port(index)?;
                }
            }
            Command::MarkBuffer { port, mark } => {
                self.require_running("MarkBuffer")?;
                self.kernel.port_mut(port)?.push_mark(mark);
                self.complete_command(CommandKind::MarkBuffer, port);
            }
        }
        self.check_port_transitions();
        Ok(())
    }

    fn require_running(&self, operation: &str) -> Result<()> {
        let state = self.fsm.current();
        match state {
            StateId::Idle | StateId::Executing | StateId::Pause => Ok(()),
            _ => Err(Error::state_operation(state, operation)),
        }
    }

    fn enable_port(&mut self, index: u32) -> Result<()> {
        let state = self.fsm.current();
        let port = self.kernel.port_mut(index)?;
        if port.is_enabled() {
            self.complete_command(CommandKind::PortEnable, index);
            return Ok(());
        }
        if matches!(state, StateId::Loaded | StateId::WaitForResources) {
            port.set_enabled(true);
            self.complete_command(CommandKind::PortEnable, index);
            return Ok(());
        }
        let supplier = port.is_supplier();
        self.kernel
            .set_port_status(index, PortStatus::BEING_ENABLED, &mut self.outbox)?;
        if !supplier {
            self.kernel
                .set_port_status(index, PortStatus::ACCEPT_USE_BUFFER, &mut self.outbox)?;
        }
        debug!(component = %self.name(), port = index, "port being enabled");
        Ok(())
    }

    fn disable_port(&mut self, index: u32) -> Result<()> {
        let port = self.kernel.port_mut(index)?;
        let being_enabled = port.status().contains(PortStatus::BEING_ENABLED);
        if !port.is_enabled() && !being_enabled {
            self.complete_command(CommandKind::PortDisable, index);
            return Ok(());
        }
        if !port.has_buffers() {
            port.set_enabled(false);
            port.clear_status(PortStatus::BEING_ENABLED | PortStatus::ACCEPT_USE_BUFFER);
            self.complete_command(CommandKind::PortDisable, index);
            return Ok(());
        }
        self.kernel
            .set_port_status(index, PortStatus::BEING_DISABLED, &mut self.outbox)?;
        self.kernel.return_held_buffers(Some(index), &mut self.outbox);
        self.kernel.free_supplier_buffers(Some(index), &mut self.outbox);
        debug!(component = %self.name(), port = index, "port being disabled");
        Ok(())
    }

    fn flush_port(&mut self, index: u32) -> Result<()> {
        self.kernel
            .set_port_status(index, PortStatus::BEING_FLUSHED, &mut self.outbox)?;
        if let Err(err) = self.processor.on_flush(index) {
            self.record_fatal(err);
        }
        let returned = self
            .kernel
            .return_held_buffers(Some(index), &mut self.outbox);
        self.kernel
            .clear_port_status(index, PortStatus::BEING_FLUSHED, &mut self.outbox)?;
        debug!(component = %self.name(), port = index, returned, "port flushed");
        self.complete_command(CommandKind::Flush, index);
        Ok(())
    }

    /// Finish per-port enable/disable once the buffers have settled.
    fn check_port_transitions(&mut self) {
        let indices: Vec<u32> = self.kernel.ports().iter().map(Port::index).collect();
        for index in indices {
            let Ok(port) = self.kernel.port(index) else {
                continue;
            };
            let status = port.status();
            if status.contains(PortStatus::BEING_DISABLED) {
                if port.is_supplier() && port.buffers_held_by_component() > 0 {
                    self.kernel
                        .free_supplier_buffers(Some(index), &mut self.outbox);
                }
                if let Ok(port) = self.kernel.port_mut(index) {
                    if !port.has_buffers() {
                        port.set_enabled(false);
                        if let Err(err) = self.kernel.clear_port_status(
                            index,
                            PortStatus::BEING_DISABLED | PortStatus::ACCEPT_USE_BUFFER,
                            &mut self.outbox,
                        ) {
                            warn!(component = %self.name(), port = index, %err, "port status not cleared");
                        }
                        self.complete_command(CommandKind::PortDisable, index);
                    }
                }
            } else if status.contains(PortStatus::BEING_ENABLED) {
                let wants_buffers = port.is_supplier()
                    && !port.is_populated()
                    && port.peer_status().contains(PortStatus::ACCEPT_USE_BUFFER);
                if wants_buffers {
                    if let Err(err) = self
                        .kernel
                        .allocate_supplier_buffers(Some(index), &mut self.outbox)
                    {
                        self.record_fatal(err);
                        continue;
                    }
                }
                if let Ok(port) = self.kernel.port_mut(index) {
                    if port.is_populated() {
                        port.set_enabled(true);
                        if let Err(err) = self.kernel.clear_port_status(
                            index,
                            PortStatus::BEING_ENABLED | PortStatus::ACCEPT_USE_BUFFER,
                            &mut self.outbox,
                        ) {
                            warn!(component = %self.name(), port = index, %err, "port status not cleared");
                        }
                        self.complete_command(CommandKind::PortEnable, index);
                    }
                }
            }
        }
    }

    fn complete_command(&mut self, command: CommandKind, port: u32) {
        debug!(component = %self.name(), ?command, port, "command complete");
        self.outbox.emit(EventPayload::CmdComplete {
            command,
            state: None,
            port: Some(port),
        });
    }

    // -- barrier --------------------------------------------------------------

    /// Run the kernel work of the active sub-state and acknowledge for the
    /// kernel when it is ready.
    fn drive(&mut self) {
        if let Some(target) = self.fsm.pending_target() {
            match self.fsm.kernel_work(&mut self.kernel, &mut self.outbox) {
                Ok(true) => {
                    if let Err(err) = self.arrive(Servant::Kernel, target) {
                        self.record_fatal(err);
                    }
                }
                Ok(false) => {}
                Err(err) => self.record_fatal(err),
            }
        }
        self.check_port_transitions();
    }

    fn arrive(&mut self, servant: Servant, reached: IlState) -> Result<()> {
        if let Some(target) = self.fsm.arrive(servant, reached)? {
            self.complete_transition(target);
        }
        Ok(())
    }

    /// Shared completion routine, run once per closed barrier.
    fn complete_transition(&mut self, target: IlState) {
        let flag = self.fsm.current().info().barrier_flag;
        if !flag.is_empty() {
            self.kernel
                .reset_tunneled_ports_status(flag, &mut self.outbox);
        }
        self.fsm.advance(target);
        info!(component = %self.name(), state = %target, "transition complete");
        self.outbox.emit(EventPayload::CmdComplete {
            command: CommandKind::StateSet,
            state: Some(target),
            port: None,
        });
        self.replay_deferred();
    }

    fn replay_deferred(&mut self) {
        while !self.fsm.in_transition() {
            let Some(command) = self.deferred.pop_front() else {
                break;
            };
            trace!(component = %self.name(), %command, "replaying deferred command");
            if let Err(err) = self.run_port_command(command) {
                warn!(component = %self.name(), %err, "deferred command failed");
                self.outbox.emit(EventPayload::Error {
                    code: err.code(),
                    message: err.to_string(),
                });
            }
        }
    }

    // -- servant entry points -------------------------------------------------

    /// A servant reports that it reached `reached`.
    pub fn servant_complete(&mut self, servant: Servant, reached: IlState) -> Result<()> {
        self.ensure_alive()?;
        let result = self.arrive(servant, reached);
        if let Err(err) = &result {
            warn!(component = %self.name(), %servant, %err, "servant completion rejected");
        }
        self.end_cycle();
        result
    }

    /// A servant hit an unrecoverable error.
    pub fn servant_error(&mut self, servant: Servant, err: Error) -> Result<()> {
        self.ensure_alive()?;
        warn!(component = %self.name(), %servant, %err, "servant error");
        self.record_fatal(err);
        self.end_cycle();
        Ok(())
    }

    /// The processor hands a buffer back.
    pub fn buffer_done(&mut self, port: u32, buffer: BufferId) -> Result<()> {
        self.ensure_alive()?;
        let result = self.kernel.release_buffer(port, buffer, &mut self.outbox);
        if result.is_ok() {
            self.drive();
        }
        self.end_cycle();
        result
    }

    // -- buffers --------------------------------------------------------------

    pub fn use_buffer(&mut self, port: u32, size: u32) -> Result<BufferHeader> {
        self.client_buffer(BufferHeader::external(port, size), "UseBuffer")
    }

    pub fn allocate_buffer(&mut self, port: u32, size: u32) -> Result<BufferHeader> {
        self.client_buffer(BufferHeader::allocated(port, size), "AllocateBuffer")
    }

    fn client_buffer(&mut self, header: BufferHeader, operation: &str) -> Result<BufferHeader> {
        self.ensure_alive()?;
        let result = self.register_buffer(header, operation, true);
        self.end_cycle();
        result
    }

    /// Register a buffer offered by the IL client or, with `from_client`
    /// unset, by the supplier across the tunnel.
    fn register_buffer(
        &mut self,
        header: BufferHeader,
        operation: &str,
        from_client: bool,
    ) -> Result<BufferHeader> {
        self.check_use_buffer(header.port, operation)?;
        if from_client && self.kernel.port(header.port)?.is_tunneled() {
            return Err(Error::bad_parameter(format!(
                "{operation} on tunneled port {}",
                header.port
            )));
        }
        self.kernel
            .port_mut(header.port)?
            .add_buffer(header.clone(), Holder::Peer)?;
        self.fsm.note_buffer_accepted();
        trace!(component = %self.name(), port = header.port, buffer = %header.id, operation, "buffer registered");
        self.drive();
        Ok(header)
    }

    fn check_use_buffer(&self, index: u32, operation: &str) -> Result<()> {
        let state = self.fsm.current();
        let policy = state.info().use_buffer;
        if policy == BufferPolicy::NotImplemented {
            return Err(Error::not_implemented(state, operation));
        }
        let port = self.kernel.port(index)?;
        let being_enabled = port.status().contains(PortStatus::BEING_ENABLED);
        if !port.is_enabled() && !being_enabled {
            return Err(Error::state_operation(
                state,
                format!("{operation} on disabled port {index}"),
            ));
        }
        match policy {
            BufferPolicy::Allowed => Ok(()),
            BufferPolicy::PortBeingEnabled if being_enabled => Ok(()),
            BufferPolicy::AllocationPhase
                if port.status().contains(PortStatus::ACCEPT_USE_BUFFER)
                    || self.fsm.alloc_phase_started() =>
            {
                Ok(())
            }
            BufferPolicy::AllocationPhase | BufferPolicy::NotImplemented => {
                Err(Error::not_implemented(state, operation))
            }
            BufferPolicy::PortBeingEnabled | BufferPolicy::IncorrectState => {
                Err(Error::state_operation(state, operation))
            }
        }
    }

    pub fn free_buffer(&mut self, port: u32, buffer: BufferId) -> Result<()> {
        self.ensure_alive()?;
        if self.kernel.port(port)?.is_tunneled() {
            return Err(Error::bad_parameter(format!(
                "FreeBuffer on tunneled port {port}"
            )));
        }
        let result = self.unregister_buffer(port, buffer, true);
        self.end_cycle();
        result
    }

    fn unregister_buffer(&mut self, index: u32, buffer: BufferId, from_client: bool) -> Result<()> {
        let state = self.fsm.current();
        let port = self.kernel.port_mut(index)?;
        port.remove_buffer(buffer)?;
        let deallocating =
            state == StateId::IdleToLoaded || port.status().contains(PortStatus::BEING_DISABLED);
        if from_client && !deallocating && port.is_enabled() {
            let err = Error::PortUnpopulated(index);
            warn!(component = %self.name(), %state, port = index, "buffer freed outside deallocation");
            self.outbox.emit(EventPayload::Error {
                code: err.code(),
                message: err.to_string(),
            });
        }
        trace!(component = %self.name(), port = index, %buffer, "buffer freed");
        self.drive();
        Ok(())
    }

    pub fn empty_this_buffer(&mut self, header: &BufferHeader) -> Result<()> {
        self.client_exchange(header, PortDirection::Input, "EmptyThisBuffer")
    }

    pub fn fill_this_buffer(&mut self, header: &BufferHeader) -> Result<()> {
        self.client_exchange(header, PortDirection::Output, "FillThisBuffer")
    }

    fn client_exchange(
        &mut self,
        header: &BufferHeader,
        direction: PortDirection,
        operation: &str,
    ) -> Result<()> {
        self.ensure_alive()?;
        if self.kernel.port(header.port)?.direction() != direction {
            return Err(Error::BadPortIndex(header.port));
        }
        let result = self.exchange(header, operation);
        self.end_cycle();
        result
    }

    fn exchange(&mut self, header: &BufferHeader, operation: &str) -> Result<()> {
        let state = self.fsm.current();
        let index = header.port;
        let port = self.kernel.port(index)?;
        if !port.is_enabled() {
            return Err(Error::state_operation(
                state,
                format!("{operation} on disabled port {index}"),
            ));
        }
        match state.info().buffer_exchange {
            BufferPolicy::Allowed => {}
            BufferPolicy::NotImplemented | BufferPolicy::AllocationPhase => {
                return Err(Error::not_implemented(state, operation))
            }
            _ => return Err(Error::state_operation(state, operation)),
        }

        let direction = port.direction();
        let received = self.kernel.port_mut(index)?.receive(header)?;
        trace!(component = %self.name(), port = index, buffer = %received.id, operation, "buffer received");
        if let Some(mark) = received.mark {
            self.outbox.emit(EventPayload::MarkReached {
                port: index,
                mark: mark.data,
            });
        }
        // A supplier waiting for its buffers on the way down keeps them.
        let returning = self.kernel.port(index)?;
        let draining = self.fsm.pending_target() == Some(IlState::Idle)
            && returning.is_supplier()
            && returning.status().contains(PortStatus::AWAIT_BUFFERS_RETURN);
        if draining {
            trace!(component = %self.name(), port = index, buffer = %received.id, "supplied buffer returned");
            self.drive();
            return Ok(());
        }
        match self.processor.on_buffer(index, direction, &received) {
            Ok(BufferAction::Release) => {
                self.kernel
                    .release_buffer(index, received.id, &mut self.outbox)?;
            }
            Ok(BufferAction::Hold) => {}
            Err(err) => self.record_fatal(err),
        }
        self.drive();
        Ok(())
    }

    // -- identity and parameters ----------------------------------------------

    pub fn get_component_version(
        &self,
        name_buf: &mut [u8],
        want_uuid: bool,
    ) -> Result<ComponentVersion> {
        self.ensure_alive()?;
        self.kernel
            .config_port()
            .component_version(name_buf, want_uuid)
    }

    pub fn get_parameter(&self, index: Index, param: &mut ParamStruct) -> Result<()> {
        self.ensure_alive()?;
        self.kernel.get_parameter(index, param)
    }

    pub fn set_parameter(&mut self, index: Index, param: &ParamStruct) -> Result<()> {
        self.ensure_alive()?;
        let state = self.fsm.current();
        let allowed = match state.info().set_parameter {
            ParamPolicy::Allowed => true,
            ParamPolicy::BeforeFirstBuffer => !self.fsm.buffers_accepted(),
            ParamPolicy::DisabledPortOnly => match param.value.port_index() {
                Some(port) if index.is_port_scoped() => !self.kernel.port(port)?.is_enabled(),
                _ => false,
            },
            ParamPolicy::Rejected => false,
        };
        if !allowed {
            return Err(Error::state_operation(state, format!("SetParameter({index})")));
        }
        self.kernel.set_parameter(index, param)
    }

    pub fn get_config(&self, index: Index, param: &mut ParamStruct) -> Result<()> {
        self.ensure_alive()?;
        self.kernel.get_config(index, param)
    }

    pub fn set_config(&mut self, index: Index, param: &ParamStruct) -> Result<()> {
        self.ensure_alive()?;
        self.kernel.set_config(index, param)
    }

    pub fn get_extension_index(&self, name: &str) -> Result<Index> {
        self.ensure_alive()?;
        self.kernel.get_extension_index(name)
    }

    // -- tunnels --------------------------------------------------------------

    /// Record one side of a tunnel. Legal in `Loaded` or on a disabled port.
    pub fn setup_tunnel(&mut self, port: u32, peer: TunnelPeer, supplier: bool) -> Result<()> {
        self.ensure_alive()?;
        let state = self.fsm.current();
        if state != StateId::Loaded && self.kernel.port(port)?.is_enabled() {
            return Err(Error::state_operation(
                state,
                format!("tunnel setup on enabled port {port}"),
            ));
        }
        self.kernel.setup_tunnel(port, peer, supplier)
    }

    /// Forget the tunnel on `port`. Part of teardown, so legal in every
    /// state, Invalid and deinitialised included.
    pub fn tear_down_tunnel(&mut self, port: u32) -> Result<Option<TunnelPeer>> {
        self.kernel.tear_down_tunnel(port)
    }

    /// A tunnel neighbour's port status changed. Reentrant and idempotent:
    /// an unchanged status re-runs the readiness check with no effect.
    pub fn tunneled_port_status_changed(&mut self, port: u32, status: PortStatus) -> Result<()> {
        self.ensure_alive()?;
        let result = self.kernel.port_mut(port).map(|p| p.set_peer_status(status));
        if result.is_ok() {
            trace!(component = %self.name(), port, %status, "neighbour status");
            self.drive();
        }
        self.end_cycle();
        result
    }

    /// Service a message from a tunnel neighbour.
    pub fn handle_peer_message(&mut self, message: PeerMessage) -> Result<()> {
        match message {
            PeerMessage::StatusChanged { to, status } => {
                self.tunneled_port_status_changed(to.port, status)
            }
            PeerMessage::UseBuffer { header, .. } => {
                self.ensure_alive()?;
                let result = self.register_buffer(header, "UseBuffer", false).map(|_| ());
                self.end_cycle();
                result
            }
            PeerMessage::FreeBuffer { to, buffer } => {
                self.ensure_alive()?;
                let result = self.unregister_buffer(to.port, buffer, false);
                self.end_cycle();
                result
            }
            PeerMessage::Deliver { header, .. } => {
                self.ensure_alive()?;
                let operation = match self.kernel.port(header.port)?.direction() {
                    PortDirection::Input => "EmptyThisBuffer",
                    PortDirection::Output => "FillThisBuffer",
                };
                let result = self.exchange(&header, operation);
                self.end_cycle();
                result
            }
        }
    }

    /// Drain the messages queued for tunnel neighbours.
    pub fn take_outbox(&mut self) -> Vec<PeerMessage> {
        std::mem::take(&mut self.outbox.messages)
    }

    /// Event-injection entry point shared with peer managers.
    pub fn inject(&mut self, event: FsmEvent) -> Result<()> {
        match event {
            FsmEvent::Command(command) => self.send_command(command),
            FsmEvent::TransComplete { servant, state } => self.servant_complete(servant, state),
            FsmEvent::PortStatus { port, status } => {
                self.tunneled_port_status_changed(port, status)
            }
            FsmEvent::Fatal(err) => self.servant_error(Servant::Kernel, err),
        }
    }

    /// Tear the component down. Legal in every state, including `Invalid`.
    pub fn deinit(&mut self) {
        if self.deinitialised {
            return;
        }
        self.deferred.clear();
        self.outbox = Outbox::default();
        self.deinitialised = true;
        info!(component = %self.name(), state = %self.fsm.current(), "component deinitialised");
    }

    // -- dispatch cycle -------------------------------------------------------

    fn ensure_alive(&self) -> Result<()> {
        if self.deinitialised {
            return Err(Error::InvalidState(format!(
                "{} is deinitialised",
                self.name()
            )));
        }
        if self.fsm.current() == StateId::Invalid {
            return Err(Error::InvalidState(format!("{} is Invalid", self.name())));
        }
        Ok(())
    }

    fn record_fatal(&mut self, err: Error) {
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
    }

    /// Surface a recorded fatal error and publish the cycle's events.
    fn end_cycle(&mut self) {
        if let Some(err) = self.fatal.take() {
            error!(component = %self.name(), state = %self.fsm.current(), %err, "fatal error, entering Invalid");
            self.fsm.force_invalid();
            self.deferred.clear();
            self.outbox.messages.clear();
            self.outbox.emit(EventPayload::Error {
                code: err.code(),
                message: err.to_string(),
            });
        }
        let uuid = self.uuid();
        for payload in self.outbox.events.drain(..) {
            self.bus.publish(uuid, payload);
        }
    }
}
