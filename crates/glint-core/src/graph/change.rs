//! Change notifications raised by graph mutations.
//!
//! Every successful mutation of a [`FilterGraph`](super::FilterGraph) is
//! reported to its registered [`ChangeListener`]s. The payloads are plain
//! serializable values so that a listener can forward them to another
//! process and replay them on a replica.

use serde::{Deserialize, Serialize};

use crate::effect::EffectState;
use crate::modulation::Modulation;
use crate::signal::OutputSize;

use super::connection::Connection;
use super::ids::{ConnectionId, ModulationId, ModulationSourceId, NodeId};

/// One graph mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "change")]
pub enum GraphChange {
    /// A node was added.
    NodeAdded {
        /// New node id.
        id: NodeId,
        /// Effect snapshot.
        state: EffectState,
    },
    /// A node and its connections/modulations were removed.
    NodeRemoved {
        /// Removed node id.
        id: NodeId,
    },
    /// Base parameter values of a node changed.
    NodeUpdated {
        /// Node id.
        id: NodeId,
        /// Effect snapshot after the change.
        state: EffectState,
    },
    /// A connection was added.
    ConnectionAdded(Connection),
    /// A connection was removed.
    ConnectionRemoved {
        /// Removed connection id.
        id: ConnectionId,
    },
    /// A modulation source was added.
    ModulationSourceAdded {
        /// New source id.
        id: ModulationSourceId,
        /// Source snapshot.
        state: EffectState,
    },
    /// A modulation source and its modulations were removed.
    ModulationSourceRemoved {
        /// Removed source id.
        id: ModulationSourceId,
    },
    /// Parameters of a modulation source changed.
    ModulationSourceUpdated {
        /// Source id.
        id: ModulationSourceId,
        /// Source snapshot after the change.
        state: EffectState,
    },
    /// A modulation was added.
    ModulationAdded(Modulation),
    /// A modulation was removed.
    ModulationRemoved {
        /// Removed modulation id.
        id: ModulationId,
    },
    /// Amount, inversion or target of a modulation changed.
    ModulationUpdated(Modulation),
    /// The sink's output size changed.
    OutputSizeChanged(OutputSize),
}

/// Receives graph change notifications.
pub trait ChangeListener: Send {
    /// Called after each successful mutation.
    fn graph_changed(&self, change: &GraphChange);
}

impl<F> ChangeListener for F
where
    F: Fn(&GraphChange) + Send,
{
    fn graph_changed(&self, change: &GraphChange) {
        self(change)
    }
}

/// Handle returned by [`FilterGraph::add_listener`](super::FilterGraph::add_listener).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u32);
