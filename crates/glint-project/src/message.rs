//! Messages exchanged between the orchestrator and its children.
//!
//! Every message is a plain serde value so the same types travel over
//! in-process channels and, as JSON lines, over a child's stdin/stdout.

use std::collections::BTreeMap;

use glint_config::{GraphDescription, SlotId};
use glint_core::{
    Connection, ConnectionId, EffectState, FrameContext, GraphChange, Modulation, ModulationId,
    ModulationSourceId, NodeId,
};
use serde::{Deserialize, Serialize};

/// Orchestrator → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum WorkerMessage {
    /// Liveness probe; answered with [`Reply::ProbeAck`].
    Probe {
        /// Token echoed back.
        token: u64,
    },
    /// Render frame `seq`; answered with [`Reply::TickDone`].
    Tick {
        /// Frame sequence number.
        seq: u64,
        /// Timing and audio for the frame.
        ctx: FrameContext,
    },
    /// Node edit on the graph of `slot`.
    Node {
        /// Slot the edit belongs to.
        slot: SlotId,
        /// The edit.
        op: NodeOp,
    },
    /// Connection edit on the graph of `slot`.
    Connection {
        /// Slot the edit belongs to.
        slot: SlotId,
        /// The edit.
        op: ConnectionOp,
    },
    /// Modulation source edit on the graph of `slot`.
    ModulationSource {
        /// Slot the edit belongs to.
        slot: SlotId,
        /// The edit.
        op: ModulationSourceOp,
    },
    /// Modulation edit on the graph of `slot`.
    Modulation {
        /// Slot the edit belongs to.
        slot: SlotId,
        /// The edit.
        op: ModulationOp,
    },
    /// Discard the current graph and build this one.
    ReplaceGraph {
        /// Device the graph is sized for.
        device: String,
        /// Slot the graph comes from.
        slot: SlotId,
        /// Full graph description.
        graph: GraphDescription,
    },
    /// Drive every controller source named `controller`, if bit
    /// `device_index` of `device_mask` is set.
    ControllerValue {
        /// One bit per configured device.
        device_mask: u64,
        /// Controller name.
        controller: String,
        /// New value.
        value: f32,
    },
    /// Finish and exit.
    Stop,
}

/// Node edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum NodeOp {
    /// Build and insert a node.
    Add {
        /// Node id.
        id: NodeId,
        /// Effect to build.
        state: EffectState,
    },
    /// Remove a node.
    Remove {
        /// Node id.
        id: NodeId,
    },
    /// Set base parameter values.
    Update {
        /// Node id.
        id: NodeId,
        /// Values by parameter name.
        params: BTreeMap<String, f32>,
    },
}

/// Connection edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum ConnectionOp {
    /// Insert a connection with its id.
    Add(Connection),
    /// Remove a connection.
    Remove {
        /// Connection id.
        id: ConnectionId,
    },
}

/// Modulation source edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum ModulationSourceOp {
    /// Build and insert a source.
    Add {
        /// Source id.
        id: ModulationSourceId,
        /// Source to build.
        state: EffectState,
    },
    /// Remove a source.
    Remove {
        /// Source id.
        id: ModulationSourceId,
    },
    /// Set parameter values.
    Update {
        /// Source id.
        id: ModulationSourceId,
        /// Values by parameter name.
        params: BTreeMap<String, f32>,
    },
}

/// Modulation edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum ModulationOp {
    /// Insert a modulation with its id.
    Add(Modulation),
    /// Remove a modulation.
    Remove {
        /// Modulation id.
        id: ModulationId,
    },
    /// Replace amount, inversion and target.
    Update(Modulation),
}

impl WorkerMessage {
    /// The edit that replays `change` on a replica of `slot`.
    ///
    /// Size changes are derived by each replica from its own device and
    /// have no message.
    pub fn from_change(slot: SlotId, change: &GraphChange) -> Option<Self> {
        let message = match change.clone() {
            GraphChange::NodeAdded { id, state } => WorkerMessage::Node {
                slot,
                op: NodeOp::Add { id, state },
            },
            GraphChange::NodeRemoved { id } => WorkerMessage::Node {
                slot,
                op: NodeOp::Remove { id },
            },
            GraphChange::NodeUpdated { id, state } => WorkerMessage::Node {
                slot,
                op: NodeOp::Update {
                    id,
                    params: state.params,
                },
            },
            GraphChange::ConnectionAdded(connection) => WorkerMessage::Connection {
                slot,
                op: ConnectionOp::Add(connection),
            },
            GraphChange::ConnectionRemoved { id } => WorkerMessage::Connection {
                slot,
                op: ConnectionOp::Remove { id },
            },
            GraphChange::ModulationSourceAdded { id, state } => WorkerMessage::ModulationSource {
                slot,
                op: ModulationSourceOp::Add { id, state },
            },
            GraphChange::ModulationSourceRemoved { id } => WorkerMessage::ModulationSource {
                slot,
                op: ModulationSourceOp::Remove { id },
            },
            GraphChange::ModulationSourceUpdated { id, state } => WorkerMessage::ModulationSource {
                slot,
                op: ModulationSourceOp::Update {
                    id,
                    params: state.params,
                },
            },
            GraphChange::ModulationAdded(modulation) => WorkerMessage::Modulation {
                slot,
                op: ModulationOp::Add(modulation),
            },
            GraphChange::ModulationRemoved { id } => WorkerMessage::Modulation {
                slot,
                op: ModulationOp::Remove { id },
            },
            GraphChange::ModulationUpdated(modulation) => WorkerMessage::Modulation {
                slot,
                op: ModulationOp::Update(modulation),
            },
            GraphChange::OutputSizeChanged(_) => return None,
        };
        Some(message)
    }

    /// Slot an edit message targets, `None` for the rest.
    pub fn edit_slot(&self) -> Option<SlotId> {
        match self {
            WorkerMessage::Node { slot, .. }
            | WorkerMessage::Connection { slot, .. }
            | WorkerMessage::ModulationSource { slot, .. }
            | WorkerMessage::Modulation { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}

/// Orchestrator → device writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum WriterMessage {
    /// Liveness probe; answered with [`Reply::ProbeAck`].
    Probe {
        /// Token echoed back.
        token: u64,
    },
    /// Output the frame stored under `seq` in the shared block.
    Show {
        /// Frame sequence number.
        seq: u64,
    },
    /// Change the device brightness.
    Brightness {
        /// Factor in `[0, 1]`.
        value: f32,
    },
    /// Finish and exit.
    Stop,
}

/// Child → orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Reply {
    /// Answer to a probe.
    ProbeAck {
        /// Token from the probe.
        token: u64,
    },
    /// A worker finished frame `seq` and stored it in the shared block.
    TickDone {
        /// Frame sequence number.
        seq: u64,
        /// Node whose effect failed this frame, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failed_node: Option<NodeId>,
    },
    /// A writer output frame `seq`.
    Shown {
        /// Frame sequence number.
        seq: u64,
    },
    /// A message could not be applied. The child keeps running.
    Error {
        /// Human readable description.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_core::OutputSize;

    fn slot() -> SlotId {
        SlotId::new(3).unwrap()
    }

    #[test]
    fn test_node_update_carries_params_only() {
        let id = NodeId::new();
        let state = EffectState {
            kind: "dim".to_string(),
            channels: None,
            params: BTreeMap::from([("level".to_string(), 0.5)]),
        };
        let message = WorkerMessage::from_change(slot(), &GraphChange::NodeUpdated { id, state }).unwrap();
        let WorkerMessage::Node {
            op: NodeOp::Update { params, .. },
            ..
        } = message
        else {
            panic!("expected node update, got {message:?}");
        };
        assert_eq!(params.get("level"), Some(&0.5));
    }

    #[test]
    fn test_size_change_has_no_message() {
        let change = GraphChange::OutputSizeChanged(OutputSize::new(10, 1));
        assert!(WorkerMessage::from_change(slot(), &change).is_none());
    }

    #[test]
    fn test_edit_slot() {
        let change = GraphChange::NodeRemoved { id: NodeId::new() };
        let message = WorkerMessage::from_change(slot(), &change).unwrap();
        assert_eq!(message.edit_slot(), Some(slot()));
        assert_eq!(WorkerMessage::Stop.edit_slot(), None);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&WriterMessage::Show { seq: 9 }).unwrap();
        assert_eq!(json, r#"{"type":"show","seq":9}"#);
        let reply: Reply = serde_json::from_str(r#"{"type":"tick_done","seq":4}"#).unwrap();
        assert_eq!(
            reply,
            Reply::TickDone {
                seq: 4,
                failed_node: None
            }
        );
    }

    #[test]
    fn test_tick_survives_json() {
        let message = WorkerMessage::Tick {
            seq: 12,
            ctx: FrameContext::with_dt(0.02),
        };
        let json = serde_json::to_string(&message).unwrap();
        let parsed: WorkerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, message);
    }
}
