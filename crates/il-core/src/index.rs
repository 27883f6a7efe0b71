//! Parameter and config indices.
//!
//! Raw values follow the IL 1.1.2 index layout: component-wide indices start
//! at `0x0100_0000`, port indices at `0x0200_0000`, common configs at
//! `0x0700_0000` and vendor extensions at `0x7F00_0000`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// First raw value of the vendor extension range.
pub const VENDOR_START: u32 = 0x7F00_0000;

/// A parameter/config index drawn from the fixed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Index {
    ParamPriorityMgmt,
    ParamSuspensionPolicy,
    ParamDisableResourceConcealment,
    ParamPortDefinition,
    ParamCompBufferSupplier,
    ConfigPriorityMgmt,
    /// Vendor extension index, resolved by collaborators.
    Vendor(u32),
    /// Any raw value outside the known enumeration.
    Unknown(u32),
}

impl Index {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0x0100_0001 => Self::ParamPriorityMgmt,
            0x0100_0008 => Self::ParamSuspensionPolicy,
            0x0100_000F => Self::ParamDisableResourceConcealment,
            0x0200_0001 => Self::ParamPortDefinition,
            0x0200_0002 => Self::ParamCompBufferSupplier,
            0x0700_0001 => Self::ConfigPriorityMgmt,
            v if v >= VENDOR_START => Self::Vendor(v),
            v => Self::Unknown(v),
        }
    }

    pub fn as_raw(&self) -> u32 {
        match self {
            Self::ParamPriorityMgmt => 0x0100_0001,
            Self::ParamSuspensionPolicy => 0x0100_0008,
            Self::ParamDisableResourceConcealment => 0x0100_000F,
            Self::ParamPortDefinition => 0x0200_0001,
            Self::ParamCompBufferSupplier => 0x0200_0002,
            Self::ConfigPriorityMgmt => 0x0700_0001,
            Self::Vendor(v) | Self::Unknown(v) => *v,
        }
    }

    /// Whether this index addresses a single port rather than the component.
    pub fn is_port_scoped(&self) -> bool {
        matches!(self, Self::ParamPortDefinition | Self::ParamCompBufferSupplier)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParamPriorityMgmt => write!(f, "ParamPriorityMgmt"),
            Self::ParamSuspensionPolicy => write!(f, "ParamSuspensionPolicy"),
            Self::ParamDisableResourceConcealment => write!(f, "ParamDisableResourceConcealment"),
            Self::ParamPortDefinition => write!(f, "ParamPortDefinition"),
            Self::ParamCompBufferSupplier => write!(f, "ParamCompBufferSupplier"),
            Self::ConfigPriorityMgmt => write!(f, "ConfigPriorityMgmt"),
            Self::Vendor(v) => write!(f, "Vendor(0x{v:08x})"),
            Self::Unknown(v) => write!(f, "Unknown(0x{v:08x})"),
        }
    }
}
