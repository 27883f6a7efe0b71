//! The processor servant.
//!
//! A [`Processor`] is where the actual encode/decode/render work of a
//! component lives. It takes part in every state barrier and sees every
//! buffer handed to the component.

use il_core::{IlState, PortDirection, Result};

use crate::port::BufferHeader;

/// Answer to a state change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServantReply {
    /// The processor reached the target already.
    Done,
    /// The processor will report through `Component::servant_complete`.
    Pending,
}

/// What to do with a buffer the processor was just handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferAction {
    /// Keep it until the owner calls `Component::buffer_done`.
    Hold,
    /// Hand it straight back.
    Release,
}

/// Domain logic plugged into a component.
///
/// Every error returned here is fatal for the component: it is recorded and
/// surfaced as a forced transition to `Invalid` at the end of the call.
pub trait Processor: Send {
    fn on_state_set(&mut self, target: IlState) -> Result<ServantReply>;

    fn on_buffer(
        &mut self,
        port: u32,
        direction: PortDirection,
        buffer: &BufferHeader,
    ) -> Result<BufferAction>;

    fn on_flush(&mut self, _port: u32) -> Result<()> {
        Ok(())
    }
}

/// Acknowledges every transition immediately, consumes input buffers as
/// soon as they arrive and holds output buffers for the owner to fill.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughProcessor;

impl Processor for PassthroughProcessor {
    fn on_state_set(&mut self, _target: IlState) -> Result<ServantReply> {
        Ok(ServantReply::Done)
    }

    fn on_buffer(
        &mut self,
        _port: u32,
        direction: PortDirection,
        _buffer: &BufferHeader,
    ) -> Result<BufferAction> {
        Ok(match direction {
            PortDirection::Input => BufferAction::Release,
            PortDirection::Output => BufferAction::Hold,
        })
    }
}
