//! Structural and execution errors of the graph.

use thiserror::Error;

use crate::effect::EffectError;

use super::ids::{ConnectionId, ModulationId, ModulationSourceId, NodeId};

/// A rejected graph mutation. The graph is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The specified node was not found in the graph.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// The specified connection was not found in the graph.
    #[error("connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    /// The specified modulation source was not found in the graph.
    #[error("modulation source {0} not found")]
    ModulationSourceNotFound(ModulationSourceId),

    /// The specified modulation was not found in the graph.
    #[error("modulation {0} not found")]
    ModulationNotFound(ModulationId),

    /// A channel index is outside the node's declared arity.
    #[error("{direction} channel {channel} out of range for {node} ({available} available)")]
    InvalidChannel {
        /// Node the channel belongs to.
        node: NodeId,
        /// `"input"` or `"output"`.
        direction: &'static str,
        /// Requested channel.
        channel: usize,
        /// Declared channel count.
        available: usize,
    },

    /// The target effect has no parameter with this name.
    #[error("node {node} has no parameter '{name}'")]
    UnknownParameter {
        /// Target node.
        node: NodeId,
        /// Requested parameter name.
        name: String,
    },

    /// The modulation source has no parameter with this name.
    #[error("modulation source {id} has no parameter '{name}'")]
    UnknownSourceParameter {
        /// Target source.
        id: ModulationSourceId,
        /// Requested parameter name.
        name: String,
    },

    /// A second output sink was added.
    #[error("graph already has an output sink ({0})")]
    DuplicateSink(NodeId),

    /// A connection from a node to itself.
    #[error("connection from {0} to itself")]
    SelfLoop(NodeId),

    /// Adding this connection would close a cycle.
    #[error("connection {from} → {to} would create a cycle")]
    CycleDetected {
        /// Upstream endpoint of the rejected connection.
        from: NodeId,
        /// Downstream endpoint of the rejected connection.
        to: NodeId,
    },

    /// An entity with this id already exists.
    #[error("id {0} already in use")]
    DuplicateId(String),
}

/// Execution phase a node failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The concurrent `update` phase.
    Update,
    /// The sequential `process` phase.
    Process,
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Phase::Update => write!(f, "update"),
            Phase::Process => write!(f, "process"),
        }
    }
}

/// An effect failed during a tick; tagged with the offending node.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("node {node} ({kind}) failed in {phase}: {source}")]
pub struct NodeExecutionError {
    /// Failing node.
    pub node: NodeId,
    /// Effect kind of the failing node.
    pub kind: &'static str,
    /// Phase the error occurred in.
    pub phase: Phase,
    /// Error raised by the effect.
    #[source]
    pub source: EffectError,
}
