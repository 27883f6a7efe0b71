//! Component-model enums: lifecycle states, port directions and domains,
//! suspension policy and version tags.
//!
//! All enums serialize in snake_case and implement `Display` manually for a
//! stable string representation in logs and events.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// IlState
// ---------------------------------------------------------------------------

/// Externally visible (stable) lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IlState {
    Loaded,
    Idle,
    Executing,
    Pause,
    WaitForResources,
    Invalid,
}

impl IlState {
    /// All states a client may request with `StateSet`.
    pub const REQUESTABLE: [IlState; 5] = [
        IlState::Loaded,
        IlState::Idle,
        IlState::Executing,
        IlState::Pause,
        IlState::WaitForResources,
    ];
}

impl fmt::Display for IlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "Loaded"),
            Self::Idle => write!(f, "Idle"),
            Self::Executing => write!(f, "Executing"),
            Self::Pause => write!(f, "Pause"),
            Self::WaitForResources => write!(f, "WaitForResources"),
            Self::Invalid => write!(f, "Invalid"),
        }
    }
}

// ---------------------------------------------------------------------------
// PortDirection
// ---------------------------------------------------------------------------

/// Direction of data flow through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    /// The direction a tunnel peer must have.
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

// ---------------------------------------------------------------------------
// PortDomain
// ---------------------------------------------------------------------------

/// Stream domain a port carries. Domain-specific parameter sets live with
/// collaborator components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDomain {
    Audio,
    Video,
    Image,
    Other,
}

impl fmt::Display for PortDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
            Self::Image => write!(f, "image"),
            Self::Other => write!(f, "other"),
        }
    }
}

// ---------------------------------------------------------------------------
// BufferSupplier
// ---------------------------------------------------------------------------

/// Supplier preference of a port when a tunnel is negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferSupplier {
    #[default]
    Unspecified,
    Input,
    Output,
}

impl fmt::Display for BufferSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => write!(f, "unspecified"),
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

// ---------------------------------------------------------------------------
// SuspensionPolicy
// ---------------------------------------------------------------------------

/// Component suspension policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum SuspensionPolicy {
    Disabled = 0,
    Enabled = 1,
}

impl SuspensionPolicy {
    /// Largest raw value accepted by `SetParameter`.
    pub const MAX: u32 = SuspensionPolicy::Enabled as u32;

    /// Decode a raw policy value, `None` when out of range.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Disabled),
            1 => Some(Self::Enabled),
            _ => None,
        }
    }
}

impl fmt::Display for SuspensionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Enabled => write!(f, "enabled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Four-part version tag carried by components and parameter structs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub revision: u8,
    pub step: u8,
}

impl Version {
    /// The IL specification version implemented by this runtime.
    pub const SPEC: Version = Version::new(1, 1, 2, 0);

    pub const fn new(major: u8, minor: u8, revision: u8, step: u8) -> Self {
        Self {
            major,
            minor,
            revision,
            step,
        }
    }

    /// Packed little-endian representation (`nVersion`).
    pub fn packed(&self) -> u32 {
        u32::from_le_bytes([self.major, self.minor, self.revision, self.step])
    }

    /// Two versions are struct-compatible when major and minor agree.
    pub fn is_compatible_with(&self, other: &Version) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(1, 0, 0, 0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.revision, self.step
        )
    }
}
