//! Static component description.
//!
//! A [`ComponentConfig`] is the capability table a component is instantiated
//! from: identity, servant layout and the port set. Every field defaults
//! sensibly so an empty `{}` describes a port-less component.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::types::{BufferSupplier, PortDirection, PortDomain, Version};

/// Maximum component name length, terminator included.
pub const MAX_NAME_LEN: usize = 128;

// ---------------------------------------------------------------------------
// ComponentConfig
// ---------------------------------------------------------------------------

/// Root description of one component instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    pub name: String,
    pub version: Version,
    /// Whether a processor servant takes part in state barriers.
    pub processor: bool,
    pub ports: Vec<PortConfig>,
    /// Vendor extensions resolvable through `GetExtensionIndex`.
    pub extensions: Vec<ExtensionConfig>,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            name: "OMX.ilrt.component".into(),
            version: Version::default(),
            processor: true,
            ports: Vec::new(),
            extensions: Vec::new(),
        }
    }
}

impl ComponentConfig {
    /// Deserialize a `ComponentConfig` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json_str)
            .map_err(|e| Error::bad_parameter(format!("component config parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Builder-style helper used by tests and embedders.
    pub fn with_port(mut self, port: PortConfig) -> Self {
        self.ports.push(port);
        self
    }

    /// Reject tables the runtime cannot instantiate.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::bad_parameter("component name is empty"));
        }
        let mut seen = HashSet::new();
        for port in &self.ports {
            if !seen.insert(port.index) {
                return Err(Error::bad_parameter(format!(
                    "duplicate port index {}",
                    port.index
                )));
            }
            if port.buffer_count_actual < port.buffer_count_min {
                return Err(Error::bad_parameter(format!(
                    "port {}: buffer_count_actual {} < buffer_count_min {}",
                    port.index, port.buffer_count_actual, port.buffer_count_min
                )));
            }
            if port.buffer_count_actual == 0 {
                return Err(Error::bad_parameter(format!(
                    "port {}: buffer_count_actual must be positive",
                    port.index
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// One entry of the static port table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    pub index: u32,
    pub direction: PortDirection,
    #[serde(default = "default_domain")]
    pub domain: PortDomain,
    #[serde(default = "default_buffer_count")]
    pub buffer_count_min: u32,
    #[serde(default = "default_buffer_count")]
    pub buffer_count_actual: u32,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub supplier: BufferSupplier,
}

impl PortConfig {
    pub fn new(index: u32, direction: PortDirection) -> Self {
        Self {
            index,
            direction,
            domain: default_domain(),
            buffer_count_min: default_buffer_count(),
            buffer_count_actual: default_buffer_count(),
            buffer_size: default_buffer_size(),
            enabled: true,
            supplier: BufferSupplier::Unspecified,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn buffers(mut self, count: u32, size: u32) -> Self {
        self.buffer_count_min = count;
        self.buffer_count_actual = count;
        self.buffer_size = size;
        self
    }

    pub fn supplier(mut self, supplier: BufferSupplier) -> Self {
        self.supplier = supplier;
        self
    }
}

/// A named vendor extension and the index it resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionConfig {
    pub name: String,
    pub index: u32,
}

fn default_domain() -> PortDomain {
    PortDomain::Audio
}

fn default_buffer_count() -> u32 {
    2
}

fn default_buffer_size() -> u32 {
    8192
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn empty_json_is_valid() {
        let config = ComponentConfig::from_json("{}").unwrap();
        assert!(config.ports.is_empty());
        assert!(config.processor);
        assert_eq!(config.version, Version::default());
    }

    #[test]
    fn port_defaults_fill_in() {
        let config = ComponentConfig::from_json(
            r#"{"name":"OMX.test.decoder","ports":[{"index":0,"direction":"input"}]}"#,
        )
        .unwrap();
        let port = &config.ports[0];
        assert_eq!(port.buffer_count_actual, 2);
        assert_eq!(port.buffer_size, 8192);
        assert!(port.enabled);
        assert_eq!(port.supplier, BufferSupplier::Unspecified);
    }

    #[test]
    fn duplicate_port_rejected() {
        let config = ComponentConfig::default()
            .with_port(PortConfig::new(0, PortDirection::Input))
            .with_port(PortConfig::new(0, PortDirection::Output));
        assert_matches!(config.validate(), Err(Error::BadParameter(_)));
    }

    #[test]
    fn actual_below_min_rejected() {
        let mut port = PortConfig::new(1, PortDirection::Output);
        port.buffer_count_min = 4;
        port.buffer_count_actual = 2;
        let config = ComponentConfig::default().with_port(port);
        assert_matches!(config.validate(), Err(Error::BadParameter(_)));
    }

    #[test]
    fn malformed_json_is_bad_parameter() {
        assert_matches!(
            ComponentConfig::from_json("{\"ports\": 3}"),
            Err(Error::BadParameter(_))
        );
    }
}
