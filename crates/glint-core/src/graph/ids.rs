//! Identifiers for graph entities.
//!
//! Ids are random v4 UUIDs so that an orchestrator and its worker replicas
//! can refer to the same node, connection or modulation without sharing
//! allocation state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! graph_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the raw UUID.
            #[inline]
            pub fn uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let simple = self.0.simple().to_string();
                write!(f, concat!($label, "({})"), &simple[..8])
            }
        }

        impl core::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

graph_id!(
    /// Unique identifier of a node.
    NodeId,
    "NodeId"
);
graph_id!(
    /// Unique identifier of a connection.
    ConnectionId,
    "ConnectionId"
);
graph_id!(
    /// Unique identifier of a modulation source.
    ModulationSourceId,
    "ModulationSourceId"
);
graph_id!(
    /// Unique identifier of a modulation.
    ModulationId,
    "ModulationId"
);
