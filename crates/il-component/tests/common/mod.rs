//! Shared fixtures for il-component integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use il_component::{BufferAction, BufferHeader, Component, Processor, Servant, ServantReply};
use il_core::{
    Command, ComponentConfig, EventBus, EventPayload, IlState, PortConfig, PortDirection, Result,
};

/// Route component logs to the test writer. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("il_component=trace")
        .with_test_writer()
        .try_init();
}

/// A processor that never completes a transition on its own.
pub struct ManualProcessor;

impl Processor for ManualProcessor {
    fn on_state_set(&mut self, _target: IlState) -> Result<ServantReply> {
        Ok(ServantReply::Pending)
    }

    fn on_buffer(
        &mut self,
        _port: u32,
        _direction: PortDirection,
        _header: &BufferHeader,
    ) -> Result<BufferAction> {
        Ok(BufferAction::Hold)
    }
}

/// Completes transitions at once and keeps every buffer it is given.
pub struct HoldingProcessor;

impl Processor for HoldingProcessor {
    fn on_state_set(&mut self, _target: IlState) -> Result<ServantReply> {
        Ok(ServantReply::Done)
    }

    fn on_buffer(
        &mut self,
        _port: u32,
        _direction: PortDirection,
        _header: &BufferHeader,
    ) -> Result<BufferAction> {
        Ok(BufferAction::Hold)
    }
}

/// Fails when asked to enter `fail_on`.
pub struct FailingProcessor {
    pub fail_on: IlState,
}

impl Processor for FailingProcessor {
    fn on_state_set(&mut self, target: IlState) -> Result<ServantReply> {
        if target == self.fail_on {
            return Err(il_core::Error::Hardware(format!("cannot enter {target}")));
        }
        Ok(ServantReply::Done)
    }

    fn on_buffer(
        &mut self,
        _port: u32,
        _direction: PortDirection,
        _header: &BufferHeader,
    ) -> Result<BufferAction> {
        Ok(BufferAction::Release)
    }
}

pub fn bus() -> Arc<EventBus> {
    Arc::new(EventBus::default())
}

/// A two-port component with both ports disabled, so transitions need no
/// buffers.
pub fn disabled_ports() -> ComponentConfig {
    ComponentConfig {
        name: "OMX.test.filter".into(),
        ..ComponentConfig::default()
    }
    .with_port(PortConfig::new(0, PortDirection::Input).disabled())
    .with_port(PortConfig::new(1, PortDirection::Output).disabled())
}

pub fn source() -> ComponentConfig {
    ComponentConfig {
        name: "OMX.test.source".into(),
        ..ComponentConfig::default()
    }
    .with_port(PortConfig::new(0, PortDirection::Output).buffers(2, 128))
}

pub fn sink() -> ComponentConfig {
    ComponentConfig {
        name: "OMX.test.sink".into(),
        ..ComponentConfig::default()
    }
    .with_port(PortConfig::new(0, PortDirection::Input).buffers(2, 128))
}

pub fn manual(config: ComponentConfig) -> (Component, Arc<EventBus>) {
    let bus = bus();
    let c = Component::with_processor(config, bus.clone(), Box::new(ManualProcessor)).unwrap();
    (c, bus)
}

pub fn state_set(target: IlState) -> Command {
    Command::StateSet { target }
}

/// Request `target` and acknowledge for the processor.
pub fn settle(c: &mut Component, target: IlState) {
    c.send_command(state_set(target)).unwrap();
    c.servant_complete(Servant::Processor, target).unwrap();
    assert_eq!(c.get_state(), target);
    assert!(!c.state_id().is_sub_state());
}

/// Walk a fresh manual component from Loaded to `target`.
pub fn reach(c: &mut Component, target: IlState) {
    let path: &[IlState] = match target {
        IlState::Loaded => &[],
        IlState::Idle => &[IlState::Idle],
        IlState::Executing => &[IlState::Idle, IlState::Executing],
        IlState::Pause => &[IlState::Idle, IlState::Pause],
        IlState::WaitForResources => &[IlState::WaitForResources],
        IlState::Invalid => panic!("Invalid is not reachable by request"),
    };
    for &state in path {
        settle(c, state);
    }
}

pub fn state_completions(history: &[EventPayload]) -> Vec<IlState> {
    history
        .iter()
        .filter_map(|e| match e {
            EventPayload::CmdComplete {
                state: Some(state), ..
            } => Some(*state),
            _ => None,
        })
        .collect()
}
