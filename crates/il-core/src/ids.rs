//! Identifiers handed out by the runtime.
//!
//! Components, buffer headers and peer managers each get a random v4 uuid,
//! wrapped so that one kind can never be passed where another is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($($(#[$meta:meta])* $name:ident;)+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(Uuid);

            impl $name {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self {
                    Self(Uuid::new_v4())
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )+
    };
}

uuid_id! {
    /// The IL uuid of a component instance, reported by `GetComponentVersion`.
    ComponentUuid;
    /// A buffer header. Stable across a tunnel, so both ends name a buffer
    /// the same way.
    BufferId;
    /// A peer protocol manager instance.
    ManagerId;
}
