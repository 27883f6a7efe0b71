//! Unified error type for the IL component runtime.
//!
//! Every failure the runtime can report funnels into [`Error`]. Each variant
//! maps onto the numeric OMX IL error code via [`Error::code`], so a binding
//! layer can hand the value straight back to a C caller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::IlState;

/// OMX IL error codes as defined by the 1.1.2 headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ErrorCode {
    None = 0,
    InsufficientResources = 0x8000_1000,
    Undefined = 0x8000_1001,
    BadParameter = 0x8000_1005,
    NotImplemented = 0x8000_1006,
    Hardware = 0x8000_1009,
    InvalidState = 0x8000_100A,
    VersionMismatch = 0x8000_100F,
    NotReady = 0x8000_1010,
    IncorrectStateTransition = 0x8000_1017,
    IncorrectStateOperation = 0x8000_1018,
    UnsupportedIndex = 0x8000_101A,
    BadPortIndex = 0x8000_101B,
    PortUnpopulated = 0x8000_101C,
}

impl ErrorCode {
    /// Raw numeric value.
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:08x})", self, self.as_u32())
    }
}

/// Unified error type covering all failure modes of a component.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A parameter struct or argument failed validation.
    #[error("Bad parameter: {0}")]
    BadParameter(String),

    /// The parameter/config index is not handled by this component.
    #[error("Unsupported index: 0x{0:08x}")]
    UnsupportedIndex(u32),

    /// No vendor extension with this name is declared by the component.
    #[error("Unsupported extension: {0}")]
    UnsupportedExtension(String),

    /// A parameter struct carried a version this runtime does not speak.
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version the component implements.
        expected: String,
        /// Version declared by the caller.
        found: String,
    },

    /// The requested state is not reachable from the current state.
    #[error("Incorrect state transition: {from} -> {to}")]
    IncorrectStateTransition {
        /// State the component was in when the request arrived.
        from: String,
        /// Requested target state.
        to: IlState,
    },

    /// The call is not legal in the component's current state.
    #[error("Incorrect state operation [{state}]: {operation}")]
    IncorrectStateOperation {
        /// State the component was in.
        state: String,
        /// The rejected operation.
        operation: String,
    },

    /// The call is never serviced by the active sub-state.
    #[error("Not implemented [{state}]: {operation}")]
    NotImplemented {
        /// Sub-state the component was in.
        state: String,
        /// The rejected operation.
        operation: String,
    },

    /// No port with the given index exists on the component.
    #[error("Bad port index: {0}")]
    BadPortIndex(u32),

    /// A buffer was freed outside a deallocation phase.
    #[error("Port {0} unpopulated")]
    PortUnpopulated(u32),

    /// Buffer or header allocation failed.
    #[error("Insufficient resources: {0}")]
    InsufficientResources(String),

    /// The component reached the terminal state; only teardown is legal.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A servant reported a hardware or peer failure.
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// A collaborator was not ready to service the call.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to its OMX IL error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::BadParameter(_) => ErrorCode::BadParameter,
            Error::UnsupportedIndex(_) | Error::UnsupportedExtension(_) => {
                ErrorCode::UnsupportedIndex
            }
            Error::VersionMismatch { .. } => ErrorCode::VersionMismatch,
            Error::IncorrectStateTransition { .. } => ErrorCode::IncorrectStateTransition,
            Error::IncorrectStateOperation { .. } => ErrorCode::IncorrectStateOperation,
            Error::NotImplemented { .. } => ErrorCode::NotImplemented,
            Error::BadPortIndex(_) => ErrorCode::BadPortIndex,
            Error::PortUnpopulated(_) => ErrorCode::PortUnpopulated,
            Error::InsufficientResources(_) => ErrorCode::InsufficientResources,
            Error::InvalidState(_) => ErrorCode::InvalidState,
            Error::Hardware(_) => ErrorCode::Hardware,
            Error::NotReady(_) => ErrorCode::NotReady,
            Error::Internal(_) => ErrorCode::Undefined,
        }
    }

    /// Whether this error must drive the component into the terminal state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Hardware(_) | Error::InsufficientResources(_) | Error::Internal(_)
        )
    }

    /// Convenience constructor for [`Error::BadParameter`].
    pub fn bad_parameter(msg: impl Into<String>) -> Self {
        Error::BadParameter(msg.into())
    }

    /// Convenience constructor for [`Error::IncorrectStateTransition`].
    pub fn transition(from: impl fmt::Display, to: IlState) -> Self {
        Error::IncorrectStateTransition {
            from: from.to_string(),
            to,
        }
    }

    /// Convenience constructor for [`Error::IncorrectStateOperation`].
    pub fn state_operation(state: impl fmt::Display, operation: impl Into<String>) -> Self {
        Error::IncorrectStateOperation {
            state: state.to_string(),
            operation: operation.into(),
        }
    }

    /// Convenience constructor for [`Error::NotImplemented`].
    pub fn not_implemented(state: impl fmt::Display, operation: impl Into<String>) -> Self {
        Error::NotImplemented {
            state: state.to_string(),
            operation: operation.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
