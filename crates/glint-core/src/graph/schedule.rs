//! Execution order derivation.
//!
//! The order is built backwards from the sink: a node becomes eligible once
//! every node it feeds is already scheduled. Passes repeat until one adds
//! nothing; whatever is left cannot reach the sink and is not scheduled.
//! Reversing the discovery list puts sources first and the sink last.
//!
//! Discovery order matters to size propagation: walking it front to back
//! visits every node after all of its downstream nodes.

use super::connection::Connection;
use super::ids::NodeId;

/// Nodes reachable from `sink`, in discovery order (sink first).
///
/// `nodes` lists all nodes in insertion order. Nodes feeding only into
/// unreachable nodes are left out.
pub(crate) fn discovery_order(nodes: &[NodeId], sink: NodeId, connections: &[Connection]) -> Vec<NodeId> {
    let mut order = vec![sink];
    let mut remaining: Vec<NodeId> = nodes.iter().copied().filter(|&n| n != sink).collect();

    loop {
        let before = remaining.len();
        // Eligibility is judged against the order as it stood at the start of the pass.
        let scheduled = order.clone();
        remaining.retain(|&node| {
            let satisfied = connections
                .iter()
                .filter(|c| c.from_node == node)
                .all(|c| scheduled.contains(&c.to_node));
            if satisfied {
                order.push(node);
            }
            !satisfied
        });
        if remaining.is_empty() || remaining.len() == before {
            break;
        }
    }
    order
}
