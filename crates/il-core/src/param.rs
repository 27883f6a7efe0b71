//! Parameter and config structs.
//!
//! Every struct travels inside a [`ParamStruct`] whose [`ParamHeader`]
//! carries a declared size and a version tag. Callees call
//! [`ParamStruct::validate`] before copying anything in or out.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{BufferSupplier, PortDirection, PortDomain, Version};

/// Size of the `nSize` + `nVersion` prefix.
const HEADER_SIZE: u32 = 8;

/// Declared size and version carried by every struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamHeader {
    pub size: u32,
    pub version: Version,
}

/// `OMX_PRIORITYMGMTTYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriorityMgmt {
    pub group_priority: u32,
    pub group_id: u32,
}

/// `OMX_PARAM_SUSPENSIONPOLICYTYPE`. The policy is kept raw so that
/// out-of-range values can be rejected by the callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SuspensionPolicyParam {
    pub policy: u32,
}

/// `OMX_RESOURCECONCEALMENTTYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConcealment {
    pub forbidden: bool,
}

impl Default for ResourceConcealment {
    fn default() -> Self {
        Self { forbidden: true }
    }
}

/// `OMX_PARAM_PORTDEFINITIONTYPE`, reduced to the domain-independent fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDefinition {
    pub port_index: u32,
    pub direction: PortDirection,
    pub domain: PortDomain,
    pub buffer_count_actual: u32,
    pub buffer_count_min: u32,
    pub buffer_size: u32,
    pub enabled: bool,
    pub populated: bool,
}

/// `OMX_PARAM_BUFFERSUPPLIERTYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferSupplierParam {
    pub port_index: u32,
    pub supplier: BufferSupplier,
}

/// The payload of a parameter/config call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamValue {
    PriorityMgmt(PriorityMgmt),
    SuspensionPolicy(SuspensionPolicyParam),
    ResourceConcealment(ResourceConcealment),
    PortDefinition(PortDefinition),
    BufferSupplier(BufferSupplierParam),
    /// Vendor payload interpreted by a collaborator.
    Opaque(Bytes),
}

impl ParamValue {
    /// Size of the equivalent C struct, header included.
    pub fn wire_size(&self) -> u32 {
        match self {
            Self::PriorityMgmt(_) => HEADER_SIZE + 8,
            Self::SuspensionPolicy(_) => HEADER_SIZE + 4,
            Self::ResourceConcealment(_) => HEADER_SIZE + 4,
            Self::PortDefinition(_) => HEADER_SIZE + 28,
            Self::BufferSupplier(_) => HEADER_SIZE + 8,
            Self::Opaque(bytes) => HEADER_SIZE + bytes.len() as u32,
        }
    }

    /// Port addressed by a port-scoped struct.
    pub fn port_index(&self) -> Option<u32> {
        match self {
            Self::PortDefinition(def) => Some(def.port_index),
            Self::BufferSupplier(sup) => Some(sup.port_index),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PriorityMgmt(_) => "PriorityMgmt",
            Self::SuspensionPolicy(_) => "SuspensionPolicy",
            Self::ResourceConcealment(_) => "ResourceConcealment",
            Self::PortDefinition(_) => "PortDefinition",
            Self::BufferSupplier(_) => "BufferSupplier",
            Self::Opaque(_) => "Opaque",
        }
    }
}

/// A sized, versioned parameter struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamStruct {
    pub header: ParamHeader,
    pub value: ParamValue,
}

impl ParamStruct {
    /// Wrap `value` with a correct header for the implemented spec version.
    pub fn new(value: ParamValue) -> Self {
        Self {
            header: ParamHeader {
                size: value.wire_size(),
                version: Version::SPEC,
            },
            value,
        }
    }

    /// Check declared size and version before any copy takes place.
    pub fn validate(&self) -> Result<()> {
        let expected = self.value.wire_size();
        if self.header.size != expected {
            return Err(Error::bad_parameter(format!(
                "{} declared size {} != {}",
                self.value.type_name(),
                self.header.size,
                expected
            )));
        }
        if !self.header.version.is_compatible_with(&Version::SPEC) {
            return Err(Error::VersionMismatch {
                expected: Version::SPEC.to_string(),
                found: self.header.version.to_string(),
            });
        }
        Ok(())
    }

    /// Replace the payload in place, keeping the caller's header.
    pub fn fill(&mut self, value: ParamValue) -> Result<()> {
        if std::mem::discriminant(&self.value) != std::mem::discriminant(&value) {
            return Err(Error::bad_parameter(format!(
                "expected {} struct, got {}",
                value.type_name(),
                self.value.type_name()
            )));
        }
        self.value = value;
        Ok(())
    }
}
