use il_core::{Command, ComponentConfig, ErrorCode, IlState, Mark, PortSelector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A component graph and the script the runner drives it with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub components: Vec<ComponentConfig>,
    pub tunnels: Vec<TunnelConfig>,
    pub script: Vec<Step>,
}

impl GraphConfig {
    pub fn component(&self, name: &str) -> Option<&ComponentConfig> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// A tunnel from an output port to an input port, written as
/// `"component:port"` on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfig {
    pub from: String,
    pub to: String,
}

/// One end of a tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub component: String,
    pub port: u32,
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (component, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("endpoint '{s}' is not of the form component:port"))?;
        if component.is_empty() {
            return Err(format!("endpoint '{s}' has no component name"));
        }
        let port = port
            .parse()
            .map_err(|_| format!("endpoint '{s}' has an invalid port index"))?;
        Ok(Self {
            component: component.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.component, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    StateSet,
    PortEnable,
    PortDisable,
    Flush,
    MarkBuffer,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateSet => write!(f, "state_set"),
            Self::PortEnable => write!(f, "port_enable"),
            Self::PortDisable => write!(f, "port_disable"),
            Self::Flush => write!(f, "flush"),
            Self::MarkBuffer => write!(f, "mark_buffer"),
        }
    }
}

/// One scripted command. `port` is optional for port commands and means
/// every port when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub component: String,
    pub command: StepKind,
    #[serde(default)]
    pub target: Option<IlState>,
    #[serde(default)]
    pub port: Option<u32>,
    #[serde(default)]
    pub mark: Option<u64>,
    /// Error code the command is expected to fail with.
    #[serde(default)]
    pub expect: Option<ErrorCode>,
}

impl Step {
    /// The IL command this step sends.
    pub fn to_command(&self) -> Result<Command, String> {
        let selector = self.port.map_or(PortSelector::All, PortSelector::Port);
        match self.command {
            StepKind::StateSet => self
                .target
                .map(|target| Command::StateSet { target })
                .ok_or_else(|| "state_set needs a target".to_string()),
            StepKind::PortEnable => Ok(Command::PortEnable { port: selector }),
            StepKind::PortDisable => Ok(Command::PortDisable { port: selector }),
            StepKind::Flush => Ok(Command::Flush { port: selector }),
            StepKind::MarkBuffer => match (self.port, self.mark) {
                (Some(port), Some(data)) => Ok(Command::MarkBuffer {
                    port,
                    mark: Mark { data },
                }),
                _ => Err("mark_buffer needs a port and a mark".to_string()),
            },
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_command() {
            Ok(command) => write!(f, "{} <- {command}", self.component),
            Err(_) => write!(f, "{} <- {} (incomplete)", self.component, self.command),
        }
    }
}
