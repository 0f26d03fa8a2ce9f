//! Integration tests for the glint-core filter graph.
//!
//! Exercises the graph through its public API with small purpose-built
//! effects: structural validation, execution order, size propagation,
//! signal propagation, modulation, error isolation and change notifications.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use glint_core::{
    ColorTarget, Effect, EffectError, FilterGraph, FrameContext, GraphChange, GraphError,
    ModulationSource, ModulationTarget, NodeId, OutputSize, ParamDescriptor, ParameterInfo, Phase,
    PixelBuffer, Signal, SignalSlot,
};

const DT: f32 = 1.0 / 60.0;

// ============================================================================
// Test effects
// ============================================================================

/// Emits a solid color frame of its own size. `frames` limits how many
/// frames produce output (`None` = unlimited).
struct Solid {
    rgb: [f32; 3],
    frames: Option<usize>,
}

impl Solid {
    fn new(value: f32) -> Box<Self> {
        Box::new(Self {
            rgb: [value; 3],
            frames: None,
        })
    }
}

impl ParameterInfo for Solid {
    fn param_count(&self) -> usize {
        3
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(ParamDescriptor::color_channel("r", 0.0)),
            1 => Some(ParamDescriptor::color_channel("g", 0.0)),
            2 => Some(ParamDescriptor::color_channel("b", 0.0)),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        self.rgb.get(index).copied().unwrap_or(0.0)
    }

    fn set_param(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.rgb.get_mut(index) {
            *slot = value;
        }
    }
}

impl Effect for Solid {
    fn kind(&self) -> &'static str {
        "solid"
    }

    fn num_input_channels(&self) -> usize {
        0
    }

    fn num_output_channels(&self) -> usize {
        1
    }

    fn process(
        &mut self,
        _inputs: &[SignalSlot],
        outputs: &mut [SignalSlot],
        size: OutputSize,
    ) -> Result<(), EffectError> {
        if self.frames == Some(0) {
            outputs[0] = None;
            return Ok(());
        }
        if let Some(n) = self.frames.as_mut() {
            *n -= 1;
        }
        outputs[0] = Some(Arc::new(Signal::Pixels(PixelBuffer::filled(size, self.rgb))));
        Ok(())
    }
}

/// One param `level` in `[0, 100]`, default 50. Copies its input through.
struct Level {
    level: f32,
}

impl ParameterInfo for Level {
    fn param_count(&self) -> usize {
        1
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        (index == 0).then(|| ParamDescriptor::continuous("level", 50.0, 0.0, 100.0, 1.0))
    }

    fn get_param(&self, index: usize) -> f32 {
        if index == 0 { self.level } else { 0.0 }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        if index == 0 {
            self.level = value;
        }
    }
}

impl Effect for Level {
    fn kind(&self) -> &'static str {
        "level"
    }

    fn num_input_channels(&self) -> usize {
        1
    }

    fn num_output_channels(&self) -> usize {
        1
    }

    fn process(
        &mut self,
        inputs: &[SignalSlot],
        outputs: &mut [SignalSlot],
        _size: OutputSize,
    ) -> Result<(), EffectError> {
        outputs[0] = inputs[0].clone();
        Ok(())
    }
}

/// Concatenates `n` inputs, each `pixels / n` wide. Missing inputs are black.
struct Concat {
    n: usize,
}

impl ParameterInfo for Concat {
    fn param_count(&self) -> usize {
        0
    }

    fn param_info(&self, _index: usize) -> Option<ParamDescriptor> {
        None
    }

    fn get_param(&self, _index: usize) -> f32 {
        0.0
    }

    fn set_param(&mut self, _index: usize, _value: f32) {}
}

impl Effect for Concat {
    fn kind(&self) -> &'static str {
        "concat"
    }

    fn num_input_channels(&self) -> usize {
        self.n
    }

    fn num_output_channels(&self) -> usize {
        1
    }

    fn input_size(&self, _channel: usize, own: OutputSize) -> OutputSize {
        OutputSize::new(own.pixels / self.n, own.rows)
    }

    fn process(
        &mut self,
        inputs: &[SignalSlot],
        outputs: &mut [SignalSlot],
        size: OutputSize,
    ) -> Result<(), EffectError> {
        let part = self.input_size(0, size);
        let mut out = PixelBuffer::new(OutputSize::new(0, size.rows));
        for input in inputs {
            match input.as_deref().and_then(Signal::as_pixels) {
                Some(p) => out.extend_from(p),
                None => out.extend_from(&PixelBuffer::new(part)),
            }
        }
        outputs[0] = Some(Arc::new(Signal::Pixels(out)));
        Ok(())
    }
}

/// Fails in the chosen phase every frame.
struct Broken(Phase);

impl ParameterInfo for Broken {
    fn param_count(&self) -> usize {
        0
    }

    fn param_info(&self, _index: usize) -> Option<ParamDescriptor> {
        None
    }

    fn get_param(&self, _index: usize) -> f32 {
        0.0
    }

    fn set_param(&mut self, _index: usize, _value: f32) {}
}

impl Effect for Broken {
    fn kind(&self) -> &'static str {
        "broken"
    }

    fn num_input_channels(&self) -> usize {
        0
    }

    fn num_output_channels(&self) -> usize {
        1
    }

    fn update(&mut self, _ctx: &FrameContext) -> Result<(), EffectError> {
        match self.0 {
            Phase::Update => Err(EffectError::failed("update exploded")),
            Phase::Process => Ok(()),
        }
    }

    fn process(
        &mut self,
        _inputs: &[SignalSlot],
        outputs: &mut [SignalSlot],
        size: OutputSize,
    ) -> Result<(), EffectError> {
        // Write first so the graph has something to clear.
        outputs[0] = Some(Arc::new(Signal::Pixels(PixelBuffer::filled(size, [9.0; 3]))));
        Err(EffectError::failed("process exploded"))
    }
}

/// Output sink keeping the last frame.
#[derive(Default)]
struct Sink {
    frame: Option<PixelBuffer>,
}

impl ParameterInfo for Sink {
    fn param_count(&self) -> usize {
        0
    }

    fn param_info(&self, _index: usize) -> Option<ParamDescriptor> {
        None
    }

    fn get_param(&self, _index: usize) -> f32 {
        0.0
    }

    fn set_param(&mut self, _index: usize, _value: f32) {}
}

impl Effect for Sink {
    fn kind(&self) -> &'static str {
        "sink"
    }

    fn num_input_channels(&self) -> usize {
        1
    }

    fn num_output_channels(&self) -> usize {
        0
    }

    fn is_sink(&self) -> bool {
        true
    }

    fn process(
        &mut self,
        inputs: &[SignalSlot],
        _outputs: &mut [SignalSlot],
        _size: OutputSize,
    ) -> Result<(), EffectError> {
        self.frame = inputs[0].as_deref().and_then(Signal::as_pixels).cloned();
        Ok(())
    }

    fn sink_frame(&self) -> Option<&PixelBuffer> {
        self.frame.as_ref()
    }
}

/// Constant-valued modulation source, optionally with a color target.
struct Constant {
    value: f32,
    color: Option<ColorTarget>,
}

impl ParameterInfo for Constant {
    fn param_count(&self) -> usize {
        1
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        (index == 0).then(|| ParamDescriptor::continuous("value", 0.0, -1000.0, 1000.0, 1.0))
    }

    fn get_param(&self, index: usize) -> f32 {
        if index == 0 { self.value } else { 0.0 }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        if index == 0 {
            self.value = value;
        }
    }
}

impl ModulationSource for Constant {
    fn kind(&self) -> &'static str {
        "constant"
    }

    fn update(&mut self, _dt: f32) {}

    fn value(&self) -> f32 {
        self.value
    }

    fn color_target(&self) -> Option<ColorTarget> {
        self.color
    }
}

fn constant(value: f32) -> Box<Constant> {
    Box::new(Constant { value, color: None })
}

/// `solid(value) → level → sink` sized to `pixels`.
fn chain(value: f32, pixels: usize) -> (FilterGraph, NodeId, NodeId, NodeId) {
    let mut graph = FilterGraph::new();
    let src = graph.add_node(Solid::new(value)).unwrap();
    let level = graph.add_node(Box::new(Level { level: 50.0 })).unwrap();
    let sink = graph.add_node(Box::new(Sink::default())).unwrap();
    graph.add_connection(src, 0, level, 0).unwrap();
    graph.add_connection(level, 0, sink, 0).unwrap();
    graph.propagate_num_pixels(pixels, 1);
    (graph, src, level, sink)
}

// ============================================================================
// 1. Structural validation
// ============================================================================

#[test]
fn self_loop_is_rejected() {
    let mut graph = FilterGraph::new();
    let level = graph.add_node(Box::new(Level { level: 50.0 })).unwrap();
    assert_eq!(
        graph.add_connection(level, 0, level, 0),
        Err(GraphError::SelfLoop(level))
    );
    assert!(graph.connections().is_empty());
}

#[test]
fn cycle_is_rejected_and_graph_unchanged() {
    let mut graph = FilterGraph::new();
    let a = graph.add_node(Box::new(Level { level: 50.0 })).unwrap();
    let b = graph.add_node(Box::new(Level { level: 50.0 })).unwrap();
    let c = graph.add_node(Box::new(Level { level: 50.0 })).unwrap();
    graph.add_connection(a, 0, b, 0).unwrap();
    graph.add_connection(b, 0, c, 0).unwrap();

    let err = graph.add_connection(c, 0, a, 0).unwrap_err();
    assert_eq!(err, GraphError::CycleDetected { from: c, to: a });
    assert_eq!(graph.connection_count(), 2);
}

#[test]
fn out_of_range_channels_are_rejected() {
    let mut graph = FilterGraph::new();
    let src = graph.add_node(Solid::new(1.0)).unwrap();
    let sink = graph.add_node(Box::new(Sink::default())).unwrap();

    assert!(matches!(
        graph.add_connection(src, 1, sink, 0),
        Err(GraphError::InvalidChannel { direction: "output", channel: 1, .. })
    ));
    assert!(matches!(
        graph.add_connection(src, 0, sink, 3),
        Err(GraphError::InvalidChannel { direction: "input", channel: 3, .. })
    ));
    assert!(matches!(
        graph.add_connection(src, 0, NodeId::new(), 0),
        Err(GraphError::NodeNotFound(_))
    ));
}

#[test]
fn second_sink_is_rejected() {
    let mut graph = FilterGraph::new();
    let first = graph.add_node(Box::new(Sink::default())).unwrap();
    let err = graph.add_node(Box::new(Sink::default())).unwrap_err();
    assert_eq!(err, GraphError::DuplicateSink(first));
    assert_eq!(graph.node_count(), 1);
}

#[test]
fn removing_sink_clears_it_and_allows_a_new_one() {
    let (mut graph, _, level, sink) = chain(10.0, 8);
    graph.remove_node(sink).unwrap();
    assert_eq!(graph.sink(), None);
    assert!(graph.execution_order().is_empty());
    // No connections reference the removed node.
    assert!(graph.connections().iter().all(|c| c.to_node != sink));
    assert!(graph.node(level).unwrap().outputs().iter().all(Option::is_none));

    let sink2 = graph.add_node(Box::new(Sink::default())).unwrap();
    assert_eq!(graph.sink(), Some(sink2));
}

#[test]
fn removing_node_cascades_connections_and_modulations() {
    let (mut graph, src, level, _) = chain(10.0, 8);
    let source = graph.add_modulation_source(constant(1.0));
    graph
        .add_modulation(source, level, ModulationTarget::parameter("level"), 1.0, false)
        .unwrap();

    graph.remove_node(level).unwrap();
    assert_eq!(graph.connection_count(), 0);
    assert!(graph.modulations().is_empty());
    assert!(graph.node(src).is_some());
    assert!(graph.pruned_nodes().contains(&src));
}

// ============================================================================
// 2. Scheduling and sizing
// ============================================================================

#[test]
fn execution_order_is_topological_with_sink_last() {
    let mut graph = FilterGraph::new();
    let sink = graph.add_node(Box::new(Sink::default())).unwrap();
    let concat = graph.add_node(Box::new(Concat { n: 2 })).unwrap();
    let level = graph.add_node(Box::new(Level { level: 50.0 })).unwrap();
    let a = graph.add_node(Solid::new(1.0)).unwrap();
    let b = graph.add_node(Solid::new(2.0)).unwrap();
    graph.add_connection(a, 0, level, 0).unwrap();
    graph.add_connection(level, 0, concat, 0).unwrap();
    graph.add_connection(b, 0, concat, 1).unwrap();
    graph.add_connection(concat, 0, sink, 0).unwrap();
    graph.propagate_num_pixels(20, 1);

    let order = graph.execution_order();
    let pos = |id| order.iter().position(|n| *n == id).unwrap();
    assert_eq!(order.len(), 5);
    assert_eq!(*order.last().unwrap(), sink);
    for c in graph.connections() {
        assert!(pos(c.from_node) < pos(c.to_node), "{c} violates order");
    }
}

#[test]
fn concat_splits_sink_size_between_inputs() {
    let mut graph = FilterGraph::new();
    let a = graph.add_node(Solid::new(10.0)).unwrap();
    let b = graph.add_node(Solid::new(20.0)).unwrap();
    let concat = graph.add_node(Box::new(Concat { n: 2 })).unwrap();
    let sink = graph.add_node(Box::new(Sink::default())).unwrap();
    graph.add_connection(a, 0, concat, 0).unwrap();
    graph.add_connection(b, 0, concat, 1).unwrap();
    graph.add_connection(concat, 0, sink, 0).unwrap();
    graph.propagate_num_pixels(300, 1);

    assert_eq!(graph.node(sink).unwrap().output_size(), Some(OutputSize::new(300, 1)));
    assert_eq!(graph.node(concat).unwrap().output_size(), Some(OutputSize::new(300, 1)));
    assert_eq!(graph.node(a).unwrap().output_size(), Some(OutputSize::new(150, 1)));
    assert_eq!(graph.node(b).unwrap().output_size(), Some(OutputSize::new(150, 1)));

    graph.tick(&FrameContext::with_dt(DT)).unwrap();
    let frame = graph.sink_frame().unwrap();
    assert_eq!(frame.len(), 300);
    assert_eq!(frame.pixel(0), Some([10.0; 3]));
    assert_eq!(frame.pixel(299), Some([20.0; 3]));
}

#[test]
fn disconnected_nodes_are_pruned() {
    let (mut graph, _, _, _) = chain(10.0, 8);
    let lonely = graph.add_node(Solid::new(5.0)).unwrap();
    assert!(graph.pruned_nodes().contains(&lonely));
    assert!(!graph.execution_order().contains(&lonely));
    assert_eq!(graph.node(lonely).unwrap().output_size(), None);
}

#[test]
fn graph_without_sink_skips_tick() {
    let mut graph = FilterGraph::new();
    let src = graph.add_node(Solid::new(5.0)).unwrap();
    graph.tick(&FrameContext::with_dt(DT)).unwrap();
    assert!(graph.node(src).unwrap().outputs()[0].is_none());
}

#[test]
fn resizing_reaches_every_upstream_node() {
    let (mut graph, src, level, _) = chain(10.0, 8);
    graph.propagate_num_pixels(64, 2);
    assert_eq!(graph.node(src).unwrap().output_size(), Some(OutputSize::new(64, 2)));
    assert_eq!(graph.node(level).unwrap().output_size(), Some(OutputSize::new(64, 2)));
}

// ============================================================================
// 3. Signal propagation
// ============================================================================

#[test]
fn signal_reaches_sink() {
    let (mut graph, _, _, _) = chain(42.0, 8);
    graph.tick(&FrameContext::with_dt(DT)).unwrap();
    let frame = graph.sink_frame().unwrap();
    assert_eq!(frame.len(), 8);
    assert_eq!(frame.pixel(7), Some([42.0; 3]));
}

#[test]
fn inputs_are_reset_every_frame() {
    let mut graph = FilterGraph::new();
    let src = graph
        .add_node(Box::new(Solid {
            rgb: [7.0; 3],
            frames: Some(1),
        }))
        .unwrap();
    let sink = graph.add_node(Box::new(Sink::default())).unwrap();
    graph.add_connection(src, 0, sink, 0).unwrap();
    graph.propagate_num_pixels(4, 1);

    graph.tick(&FrameContext::with_dt(DT)).unwrap();
    assert!(graph.sink_frame().is_some());

    // Second frame the source emits nothing; the sink must not see frame one.
    graph.tick(&FrameContext::with_dt(DT)).unwrap();
    assert!(graph.node(sink).unwrap().inputs()[0].is_none());
    assert!(graph.sink_frame().is_none());
}

#[test]
fn removed_connection_leaves_input_empty() {
    let (mut graph, _, level, sink) = chain(42.0, 8);
    graph.tick(&FrameContext::with_dt(DT)).unwrap();
    let con = graph.connections().iter().find(|c| c.from_node == level).unwrap().id;
    graph.remove_connection(con).unwrap();
    graph.tick(&FrameContext::with_dt(DT)).unwrap();
    assert!(graph.node(sink).unwrap().inputs()[0].is_none());
}

#[test]
fn fan_out_shares_the_same_payload() {
    let mut graph = FilterGraph::new();
    let src = graph.add_node(Solid::new(3.0)).unwrap();
    let concat = graph.add_node(Box::new(Concat { n: 2 })).unwrap();
    let sink = graph.add_node(Box::new(Sink::default())).unwrap();
    graph.add_connection(src, 0, concat, 0).unwrap();
    graph.add_connection(src, 0, concat, 1).unwrap();
    graph.add_connection(concat, 0, sink, 0).unwrap();
    graph.propagate_num_pixels(10, 1);
    graph.tick(&FrameContext::with_dt(DT)).unwrap();

    let inputs = graph.node(concat).unwrap().inputs();
    let (a, b) = (inputs[0].as_ref().unwrap(), inputs[1].as_ref().unwrap());
    assert!(Arc::ptr_eq(a, b));
}

#[test]
fn sequential_and_parallel_updates_agree() {
    let (mut par, ..) = chain(11.0, 16);
    let (mut seq, ..) = chain(11.0, 16);
    seq.set_parallel_update(false);
    par.tick(&FrameContext::with_dt(DT)).unwrap();
    seq.tick(&FrameContext::with_dt(DT)).unwrap();
    assert_eq!(par.sink_frame(), seq.sink_frame());
}

// ============================================================================
// 4. Modulation
// ============================================================================

#[test]
fn modulated_value_is_clamped_base_plus_offset() {
    for v in [-300.0_f32, -10.0, 0.0, 10.0, 300.0] {
        let (mut graph, _, level, _) = chain(1.0, 4);
        let source = graph.add_modulation_source(constant(v));
        graph
            .add_modulation(source, level, ModulationTarget::parameter("level"), 0.5, false)
            .unwrap();
        graph.tick(&FrameContext::with_dt(DT)).unwrap();

        let node = graph.node(level).unwrap();
        let expected = (50.0 + 0.5 * v).clamp(0.0, 100.0);
        assert_eq!(node.parameter_value("level"), Some(expected), "v = {v}");
        assert_eq!(node.base_value("level"), Some(50.0), "base must not move");
    }
}

#[test]
fn modulation_does_not_accumulate_across_frames() {
    let (mut graph, _, level, _) = chain(1.0, 4);
    let source = graph.add_modulation_source(constant(10.0));
    graph
        .add_modulation(source, level, ModulationTarget::parameter("level"), 1.0, false)
        .unwrap();
    for _ in 0..5 {
        graph.tick(&FrameContext::with_dt(DT)).unwrap();
    }
    assert_eq!(graph.node(level).unwrap().parameter_value("level"), Some(60.0));
}

#[test]
fn inverted_modulations_sum() {
    let (mut graph, _, level, _) = chain(1.0, 4);
    let up = graph.add_modulation_source(constant(20.0));
    let down = graph.add_modulation_source(constant(5.0));
    graph
        .add_modulation(up, level, ModulationTarget::parameter("level"), 1.0, false)
        .unwrap();
    graph
        .add_modulation(down, level, ModulationTarget::parameter("level"), 1.0, true)
        .unwrap();
    graph.tick(&FrameContext::with_dt(DT)).unwrap();
    assert_eq!(graph.node(level).unwrap().parameter_value("level"), Some(65.0));
}

#[test]
fn removing_modulation_restores_base() {
    let (mut graph, _, level, _) = chain(1.0, 4);
    let source = graph.add_modulation_source(constant(10.0));
    let m = graph
        .add_modulation(source, level, ModulationTarget::parameter("level"), 1.0, false)
        .unwrap();
    graph.tick(&FrameContext::with_dt(DT)).unwrap();
    assert_eq!(graph.node(level).unwrap().parameter_value("level"), Some(60.0));

    graph.remove_modulation(m).unwrap();
    assert_eq!(graph.node(level).unwrap().parameter_value("level"), Some(50.0));
}

#[test]
fn removing_source_removes_its_modulations() {
    let (mut graph, _, level, _) = chain(1.0, 4);
    let source = graph.add_modulation_source(constant(10.0));
    graph
        .add_modulation(source, level, ModulationTarget::parameter("level"), 1.0, false)
        .unwrap();
    graph.tick(&FrameContext::with_dt(DT)).unwrap();

    graph.remove_modulation_source(source).unwrap();
    assert!(graph.modulations().is_empty());
    assert_eq!(graph.node(level).unwrap().parameter_value("level"), Some(50.0));
}

#[test]
fn modulation_of_unknown_parameter_is_rejected() {
    let (mut graph, _, level, _) = chain(1.0, 4);
    let source = graph.add_modulation_source(constant(10.0));
    let err = graph
        .add_modulation(source, level, ModulationTarget::parameter("speed"), 1.0, false)
        .unwrap_err();
    assert!(matches!(err, GraphError::UnknownParameter { .. }));
}

#[test]
fn color_modulation_pulls_towards_target() {
    let mut graph = FilterGraph::new();
    let src = graph.add_node(Solid::new(100.0)).unwrap();
    let sink = graph.add_node(Box::new(Sink::default())).unwrap();
    graph.add_connection(src, 0, sink, 0).unwrap();
    graph.propagate_num_pixels(2, 1);
    let source = graph.add_modulation_source(Box::new(Constant {
        value: 0.0,
        color: Some(ColorTarget {
            rgb: [200.0, 100.0, 0.0],
            activation: 1.0,
        }),
    }));
    graph
        .add_modulation(source, src, ModulationTarget::color("r", "g", "b"), 0.5, false)
        .unwrap();
    graph.tick(&FrameContext::with_dt(DT)).unwrap();

    assert_eq!(graph.sink_frame().unwrap().pixel(0), Some([150.0, 100.0, 50.0]));
}

#[test]
fn set_parameter_clamps_and_keeps_offset_layered() {
    let (mut graph, _, level, _) = chain(1.0, 4);
    assert_eq!(graph.set_parameter(level, "level", 500.0), Ok(100.0));
    assert!(matches!(
        graph.set_parameter(level, "nope", 1.0),
        Err(GraphError::UnknownParameter { .. })
    ));

    let mut params = BTreeMap::new();
    params.insert("level".to_string(), 20.0);
    params.insert("bogus".to_string(), 1.0);
    assert!(graph.set_parameters(level, &params).is_err());
    assert_eq!(graph.node(level).unwrap().base_value("level"), Some(100.0));
}

// ============================================================================
// 5. Error isolation
// ============================================================================

#[test]
fn failing_process_is_isolated() {
    let mut graph = FilterGraph::new();
    let bad = graph.add_node(Box::new(Broken(Phase::Process))).unwrap();
    let good = graph.add_node(Solid::new(30.0)).unwrap();
    let concat = graph.add_node(Box::new(Concat { n: 2 })).unwrap();
    let sink = graph.add_node(Box::new(Sink::default())).unwrap();
    graph.add_connection(bad, 0, concat, 0).unwrap();
    graph.add_connection(good, 0, concat, 1).unwrap();
    graph.add_connection(concat, 0, sink, 0).unwrap();
    graph.propagate_num_pixels(4, 1);

    let err = graph.tick(&FrameContext::with_dt(DT)).unwrap_err();
    assert_eq!(err.node, bad);
    assert_eq!(err.phase, Phase::Process);
    assert!(graph.node(bad).unwrap().outputs()[0].is_none());

    // Downstream still ran: black half from the failed node, color from the good one.
    let frame = graph.sink_frame().unwrap();
    assert_eq!(frame.pixel(0), Some([0.0; 3]));
    assert_eq!(frame.pixel(3), Some([30.0; 3]));
}

#[test]
fn failing_update_skips_process() {
    let mut graph = FilterGraph::new();
    let bad = graph.add_node(Box::new(Broken(Phase::Update))).unwrap();
    let sink = graph.add_node(Box::new(Sink::default())).unwrap();
    graph.add_connection(bad, 0, sink, 0).unwrap();
    graph.propagate_num_pixels(4, 1);

    let err = graph.tick(&FrameContext::with_dt(DT)).unwrap_err();
    assert_eq!(err.phase, Phase::Update);
    assert_eq!(err.kind, "broken");
    assert!(graph.node(bad).unwrap().outputs()[0].is_none());
    assert!(graph.sink_frame().is_none());
}

// ============================================================================
// 6. Change notifications and timings
// ============================================================================

#[test]
fn listeners_see_every_mutation() {
    let seen: Arc<Mutex<Vec<GraphChange>>> = Arc::default();
    let mut graph = FilterGraph::new();
    let log = Arc::clone(&seen);
    let listener = graph.add_listener(move |c: &GraphChange| log.lock().unwrap().push(c.clone()));

    let src = graph.add_node(Solid::new(1.0)).unwrap();
    let sink = graph.add_node(Box::new(Sink::default())).unwrap();
    let con = graph.add_connection(src, 0, sink, 0).unwrap();
    graph.set_parameter(src, "r", 12.0).unwrap();
    graph.propagate_num_pixels(4, 1);
    graph.remove_node(src).unwrap();

    let changes = seen.lock().unwrap().clone();
    assert!(matches!(changes[0], GraphChange::NodeAdded { id, .. } if id == src));
    assert!(matches!(changes[1], GraphChange::NodeAdded { id, .. } if id == sink));
    assert!(matches!(changes[2], GraphChange::ConnectionAdded(c) if c.id == con));
    match &changes[3] {
        GraphChange::NodeUpdated { state, .. } => assert_eq!(state.params["r"], 12.0),
        other => panic!("expected NodeUpdated, got {other:?}"),
    }
    assert_eq!(changes[4], GraphChange::OutputSizeChanged(OutputSize::new(4, 1)));
    assert_eq!(changes[5], GraphChange::ConnectionRemoved { id: con });
    assert_eq!(changes[6], GraphChange::NodeRemoved { id: src });

    assert!(graph.remove_listener(listener));
    graph.add_node(Solid::new(1.0)).unwrap();
    assert_eq!(seen.lock().unwrap().len(), 7);
}

#[test]
fn rejected_mutation_is_not_reported() {
    let seen: Arc<Mutex<usize>> = Arc::default();
    let mut graph = FilterGraph::new();
    let count = Arc::clone(&seen);
    graph.add_listener(move |_: &GraphChange| *count.lock().unwrap() += 1);
    let level = graph.add_node(Box::new(Level { level: 50.0 })).unwrap();
    let _ = graph.add_connection(level, 0, level, 0);
    assert_eq!(*seen.lock().unwrap(), 1);
}

#[test]
fn node_state_reports_base_values() {
    let (mut graph, _, level, _) = chain(1.0, 4);
    let source = graph.add_modulation_source(constant(30.0));
    graph
        .add_modulation(source, level, ModulationTarget::parameter("level"), 1.0, false)
        .unwrap();
    graph.tick(&FrameContext::with_dt(DT)).unwrap();
    let state = graph.effect_state(level).unwrap();
    assert_eq!(state.kind, "level");
    assert_eq!(state.params["level"], 50.0);
}

#[test]
fn timings_are_recorded_when_enabled() {
    let (mut graph, ..) = chain(1.0, 4);
    graph.tick(&FrameContext::with_dt(DT)).unwrap();
    assert!(graph.timings().iter().all(|t| t.process.count() == 0));

    graph.set_record_timings(true);
    for _ in 0..3 {
        graph.tick(&FrameContext::with_dt(DT)).unwrap();
    }
    let timings = graph.timings();
    assert_eq!(timings.len(), 3);
    assert!(timings.iter().all(|t| t.process.count() == 3 && t.update.count() == 3));
}
