//! Directed edge between two node channels.

use serde::{Deserialize, Serialize};

use super::ids::{ConnectionId, NodeId};

/// `(from_node, from_channel) -> (to_node, to_channel)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Unique id.
    pub id: ConnectionId,
    /// Upstream node.
    pub from_node: NodeId,
    /// Output channel on the upstream node.
    pub from_channel: usize,
    /// Downstream node.
    pub to_node: NodeId,
    /// Input channel on the downstream node.
    pub to_channel: usize,
}

impl core::fmt::Display for Connection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}:{} → {}:{}",
            self.from_node, self.from_channel, self.to_node, self.to_channel
        )
    }
}
