//! Dataflow graph of LED effects.
//!
//! A [`FilterGraph`] holds effect nodes wired output-channel to input-channel,
//! modulation sources, and modulations binding a source to node parameters.
//! Every mutation goes through the graph, which keeps it acyclic, keeps at
//! most one output sink, and re-derives the execution order and per-node
//! sizes after each structural change.
//!
//! # Frame Execution
//!
//! [`FilterGraph::tick()`] runs one frame in two phases:
//!
//! - **update**: every scheduled node refreshes internal state. Nodes only
//!   touch their own state here, so the phase may run on a rayon pool.
//! - **process**: nodes run one at a time in execution order. Each node's
//!   inputs are reset, filled from upstream outputs, then processed.
//!
//! Signals travel as `Arc` clones, so fan-out never copies pixel data.
//!
//! # Sizing
//!
//! The sink's pixel count is set with
//! [`propagate_num_pixels()`](FilterGraph::propagate_num_pixels). Each node
//! tells its upstream neighbours how many pixels it wants per input channel
//! through [`Effect::input_size()`](crate::Effect::input_size). Nodes that end
//! up unsized, or cannot reach the sink, are left out of the execution order
//! and reported by [`pruned_nodes()`](FilterGraph::pruned_nodes).
//!
//! # Example
//!
//! ```rust,ignore
//! use glint_core::graph::FilterGraph;
//!
//! let mut graph = FilterGraph::new();
//! let color = graph.add_node(Box::new(StaticColor::new([255.0, 0.0, 0.0])))?;
//! let out = graph.add_node(Box::new(LedOutput::new()))?;
//! graph.add_connection(color, 0, out, 0)?;
//! graph.propagate_num_pixels(300, 1);
//! graph.tick(&FrameContext::with_dt(1.0 / 60.0))?;
//! ```

pub mod change;
pub mod connection;
pub mod error;
mod filter_graph;
pub mod ids;
pub mod node;
mod schedule;

pub use change::{ChangeListener, GraphChange, ListenerId};
pub use connection::Connection;
pub use error::{GraphError, NodeExecutionError, Phase};
pub use filter_graph::{FilterGraph, NodeTiming};
pub use ids::{ConnectionId, ModulationId, ModulationSourceId, NodeId};
pub use node::Node;
