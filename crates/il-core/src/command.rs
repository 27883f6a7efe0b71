//! Commands accepted by a component's `SendCommand` surface.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::IlState;

/// Port index value meaning "every port" (`OMX_ALL`).
pub const ALL_PORTS: u32 = 0xFFFF_FFFF;

/// Target of a port-scoped command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortSelector {
    Port(u32),
    All,
}

impl PortSelector {
    /// Decode a raw port index, mapping [`ALL_PORTS`] to [`PortSelector::All`].
    pub fn from_raw(raw: u32) -> Self {
        if raw == ALL_PORTS {
            Self::All
        } else {
            Self::Port(raw)
        }
    }

    pub fn as_raw(&self) -> u32 {
        match self {
            Self::Port(index) => *index,
            Self::All => ALL_PORTS,
        }
    }

    pub fn matches(&self, index: u32) -> bool {
        match self {
            Self::Port(p) => *p == index,
            Self::All => true,
        }
    }
}

impl fmt::Display for PortSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Port(index) => write!(f, "{index}"),
            Self::All => write!(f, "ALL"),
        }
    }
}

/// Buffer mark propagated downstream with the next buffer leaving a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mark {
    /// Opaque mark payload chosen by the client.
    pub data: u64,
}

/// A single command sent to a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    StateSet { target: IlState },
    PortEnable { port: PortSelector },
    PortDisable { port: PortSelector },
    Flush { port: PortSelector },
    MarkBuffer { port: u32, mark: Mark },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::StateSet { .. } => CommandKind::StateSet,
            Command::PortEnable { .. } => CommandKind::PortEnable,
            Command::PortDisable { .. } => CommandKind::PortDisable,
            Command::Flush { .. } => CommandKind::Flush,
            Command::MarkBuffer { .. } => CommandKind::MarkBuffer,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::StateSet { target } => write!(f, "StateSet({target})"),
            Command::PortEnable { port } => write!(f, "PortEnable({port})"),
            Command::PortDisable { port } => write!(f, "PortDisable({port})"),
            Command::Flush { port } => write!(f, "Flush({port})"),
            Command::MarkBuffer { port, mark } => write!(f, "MarkBuffer({port}, {})", mark.data),
        }
    }
}

/// Command discriminant, used in completion events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    StateSet,
    PortEnable,
    PortDisable,
    Flush,
    MarkBuffer,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateSet => write!(f, "StateSet"),
            Self::PortEnable => write!(f, "PortEnable"),
            Self::PortDisable => write!(f, "PortDisable"),
            Self::Flush => write!(f, "Flush"),
            Self::MarkBuffer => write!(f, "MarkBuffer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_raw_roundtrip() {
        assert_eq!(PortSelector::from_raw(ALL_PORTS), PortSelector::All);
        assert_eq!(PortSelector::from_raw(2), PortSelector::Port(2));
        assert_eq!(PortSelector::All.as_raw(), ALL_PORTS);
        assert!(PortSelector::All.matches(7));
        assert!(!PortSelector::Port(1).matches(0));
    }

    #[test]
    fn command_display() {
        let cmd = Command::StateSet {
            target: IlState::Idle,
        };
        assert_eq!(cmd.to_string(), "StateSet(Idle)");
        assert_eq!(cmd.kind(), CommandKind::StateSet);
        let cmd = Command::Flush {
            port: PortSelector::All,
        };
        assert_eq!(cmd.to_string(), "Flush(ALL)");
    }

    #[test]
    fn command_serde_tagged() {
        let cmd: Command =
            serde_json::from_str(r#"{"command":"state_set","target":"idle"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::StateSet {
                target: IlState::Idle
            }
        );
    }
}
