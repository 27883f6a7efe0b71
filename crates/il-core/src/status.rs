//! Port status flags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitset of per-port status flags.
///
/// A flag describes a class of pending barrier on the port, so flags are
/// cleared in one broadcast step when that barrier completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortStatus(u32);

impl PortStatus {
    pub const NONE: PortStatus = PortStatus(0);
    /// Non-supplier port ready to receive `UseBuffer` from its tunnel supplier.
    pub const ACCEPT_USE_BUFFER: PortStatus = PortStatus(1 << 0);
    /// Supplier port waiting for its neighbour to hand buffers back.
    pub const AWAIT_BUFFERS_RETURN: PortStatus = PortStatus(1 << 1);
    /// Port ready to exchange buffers (ETB/FTB) with its neighbour.
    pub const ACCEPT_BUFFER_EXCHANGE: PortStatus = PortStatus(1 << 2);
    pub const BEING_ENABLED: PortStatus = PortStatus(1 << 3);
    pub const BEING_DISABLED: PortStatus = PortStatus(1 << 4);
    pub const BEING_FLUSHED: PortStatus = PortStatus(1 << 5);

    const NAMES: [(PortStatus, &'static str); 6] = [
        (Self::ACCEPT_USE_BUFFER, "accept_use_buffer"),
        (Self::AWAIT_BUFFERS_RETURN, "await_buffers_return"),
        (Self::ACCEPT_BUFFER_EXCHANGE, "accept_buffer_exchange"),
        (Self::BEING_ENABLED, "being_enabled"),
        (Self::BEING_DISABLED, "being_disabled"),
        (Self::BEING_FLUSHED, "being_flushed"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: PortStatus) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: PortStatus) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: PortStatus) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: PortStatus) {
        self.0 &= !other.0;
    }
}

impl BitOr for PortStatus {
    type Output = PortStatus;

    fn bitor(self, rhs: Self) -> Self::Output {
        PortStatus(self.0 | rhs.0)
    }
}

impl BitOrAssign for PortStatus {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join("|"))
    }
}
