//! il-core: shared vocabulary of the IL component runtime.
//!
//! This crate is the foundational dependency for `il-component` and the
//! `ilrt` binary. It provides the unified error type with its IL error codes,
//! typed identifiers, lifecycle state and port enums, the command and
//! parameter vocabulary, static component configuration, and the event bus
//! through which components notify their clients.

pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod index;
pub mod param;
pub mod status;
pub mod types;

// Re-export the most commonly used items at the crate root.
pub use command::{Command, CommandKind, Mark, PortSelector, ALL_PORTS};
pub use config::{ComponentConfig, ExtensionConfig, PortConfig, MAX_NAME_LEN};
pub use error::{Error, ErrorCode, Result};
pub use events::{Event, EventBus, EventPayload};
pub use ids::*;
pub use index::Index;
pub use param::*;
pub use status::PortStatus;
pub use types::*;
