//! Glint Core - frame graph engine for LED effects
//!
//! This crate provides the dataflow engine that turns a graph of effects into
//! one frame of pixels per tick.
//!
//! # Core Abstractions
//!
//! ## Effect System
//!
//! - [`Effect`] - Object-safe trait for every processing unit
//! - [`EffectState`] - Serializable snapshot (kind, arity, parameter values)
//! - [`ParameterInfo`] / [`ParamDescriptor`] - Named, bounded parameters
//!
//! ## Signals
//!
//! - [`Signal`] - Payload of one channel (pixels, audio or color)
//! - [`PixelBuffer`] - `[3][N]` RGB frame with values in `[0, 255]`
//! - [`FrameContext`] - Time step, clock and audio snapshot for one frame
//!
//! ## Graph
//!
//! - [`FilterGraph`] - Nodes, connections, modulations and frame execution
//! - [`GraphChange`] / [`ChangeListener`] - Mutation notifications
//!
//! ## Modulation
//!
//! - [`ModulationSource`] - Scalar (or color) source updated every frame
//! - [`Modulation`] - Binding of a source to node parameters
//!
//! # Features
//!
//! - `parallel` (default): run the update phase on the rayon pool
//! - `tracing`: emit `tracing` events for mutations, scheduling and failures
//!
//! # Example
//!
//! ```rust,ignore
//! use glint_core::{FilterGraph, FrameContext};
//!
//! let mut graph = FilterGraph::new();
//! let color = graph.add_node(registry.create("static_color").unwrap())?;
//! let out = graph.add_node(registry.create("led_output").unwrap())?;
//! graph.add_connection(color, 0, out, 0)?;
//! graph.propagate_num_pixels(300, 1);
//!
//! graph.tick(&FrameContext::with_dt(1.0 / 60.0))?;
//! let frame = graph.sink_frame();
//! ```

pub mod effect;
pub mod graph;
pub mod modulation;
pub mod param_info;
pub mod signal;
pub mod timing;

pub use effect::{Effect, EffectError, EffectState, input_audio, input_pixels, pixel_output};
pub use graph::{
    ChangeListener, Connection, ConnectionId, FilterGraph, GraphChange, GraphError, ListenerId,
    ModulationId, ModulationSourceId, Node, NodeExecutionError, NodeId, NodeTiming, Phase,
};
pub use modulation::{ColorTarget, Modulation, ModulationSource, ModulationSourceNode, ModulationTarget};
pub use param_info::{ParamDescriptor, ParamKind, ParameterInfo};
pub use signal::{
    AudioBuffer, Autogain, FrameContext, MAX_CHANNEL_VALUE, OutputSize, PixelBuffer, Signal,
    SignalSlot,
};
pub use timing::{TIMING_WINDOW, Timing};
