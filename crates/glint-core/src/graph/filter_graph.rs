//! Filter graph: mutation API, cycle detection, scheduling and frame execution.
//!
//! [`FilterGraph`] owns every node, connection, modulation source and
//! modulation by id. Cross references are ids resolved through the graph;
//! there are no back-pointers.
//!
//! Structural mutations validate first and only then change state, so a
//! rejected call leaves the graph untouched. After every structural change
//! the execution order and per-node sizes are re-derived.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::effect::{Effect, EffectState};
use crate::modulation::{Modulation, ModulationSource, ModulationSourceNode, ModulationTarget};
use crate::signal::{FrameContext, OutputSize, PixelBuffer, SignalSlot};
use crate::timing::Timing;

use super::change::{ChangeListener, GraphChange, ListenerId};
use super::connection::Connection;
use super::error::{GraphError, NodeExecutionError, Phase};
use super::ids::{ConnectionId, ModulationId, ModulationSourceId, NodeId};
use super::node::Node;
use super::schedule::discovery_order;

/// Per-node timing report entry.
#[derive(Debug, Clone, Copy)]
pub struct NodeTiming {
    /// Node id.
    pub node: NodeId,
    /// Effect kind.
    pub kind: &'static str,
    /// Update-phase timing.
    pub update: Timing,
    /// Process-phase timing.
    pub process: Timing,
}

/// Dataflow graph of effects feeding one output sink.
///
/// # Usage
///
/// 1. Create a graph with [`new()`](Self::new)
/// 2. Add nodes with [`add_node()`](Self::add_node); at most one may be a sink
/// 3. Connect channels with [`add_connection()`](Self::add_connection)
/// 4. Size the sink with [`propagate_num_pixels()`](Self::propagate_num_pixels)
/// 5. Run frames with [`tick()`](Self::tick)
pub struct FilterGraph {
    nodes: Vec<Option<Node>>,
    /// Vacant entries of `nodes`, reused before the vector grows.
    free: Vec<usize>,
    index: HashMap<NodeId, usize>,
    connections: Vec<Connection>,
    sources: Vec<ModulationSourceNode>,
    modulations: Vec<Modulation>,
    sink: Option<NodeId>,
    sink_size: Option<OutputSize>,
    order: Vec<NodeId>,
    pruned: Vec<NodeId>,
    listeners: Vec<(ListenerId, Box<dyn ChangeListener>)>,
    next_listener: u32,
    parallel_update: bool,
    record_timings: bool,
    all_update_timing: Timing,
}

impl Default for FilterGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterGraph {
    /// Creates an empty graph with concurrent updates on and timings off.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            connections: Vec::new(),
            sources: Vec::new(),
            modulations: Vec::new(),
            sink: None,
            sink_size: None,
            order: Vec::new(),
            pruned: Vec::new(),
            listeners: Vec::new(),
            next_listener: 0,
            parallel_update: true,
            record_timings: false,
            all_update_timing: Timing::default(),
        }
    }

    /// Enables or disables the concurrent update phase.
    pub fn set_parallel_update(&mut self, enabled: bool) {
        self.parallel_update = enabled;
    }

    /// Enables or disables per-node timing statistics.
    pub fn set_record_timings(&mut self, enabled: bool) {
        self.record_timings = enabled;
    }

    /// Whether timings are recorded.
    pub fn record_timings(&self) -> bool {
        self.record_timings
    }

    // --- Listeners ---

    /// Registers a change listener.
    pub fn add_listener(&mut self, listener: impl ChangeListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn notify(&self, change: GraphChange) {
        for (_, listener) in &self.listeners {
            listener.graph_changed(&change);
        }
    }

    // --- Node mutations ---

    /// Adds a node wrapping `effect`. Returns the new node's id.
    pub fn add_node(&mut self, effect: Box<dyn Effect>) -> Result<NodeId, GraphError> {
        self.add_node_with_id(NodeId::new(), effect)
    }

    /// Adds a node under a caller-chosen id.
    ///
    /// Fails with [`GraphError::DuplicateSink`] if `effect` is a sink and the
    /// graph already has one.
    pub fn add_node_with_id(&mut self, id: NodeId, effect: Box<dyn Effect>) -> Result<NodeId, GraphError> {
        if self.index.contains_key(&id) {
            return Err(GraphError::DuplicateId(id.to_string()));
        }
        if let Some(existing) = self.sink.filter(|_| effect.is_sink()) {
            return Err(GraphError::DuplicateSink(existing));
        }

        let is_sink = effect.is_sink();
        let node = Node::new(id, effect);
        let state = node.state();
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.index.insert(id, slot);
        if is_sink {
            self.sink = Some(id);
        }
        self.update_process_order();

        #[cfg(feature = "tracing")]
        tracing::debug!("graph_add: node {id} ({})", state.kind);
        self.notify(GraphChange::NodeAdded { id, state });
        Ok(id)
    }

    /// Removes a node together with its connections and the modulations
    /// targeting it. Removing the sink clears the sink designation.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        let slot = *self.index.get(&id).ok_or(GraphError::NodeNotFound(id))?;

        let attached: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|c| c.from_node == id || c.to_node == id)
            .map(|c| c.id)
            .collect();
        for con in attached {
            self.detach_connection(con);
            self.notify(GraphChange::ConnectionRemoved { id: con });
        }

        let targeting: Vec<ModulationId> = self
            .modulations
            .iter()
            .filter(|m| m.target_node == id)
            .map(|m| m.id)
            .collect();
        self.modulations.retain(|m| m.target_node != id);
        for modulation in targeting {
            self.notify(GraphChange::ModulationRemoved { id: modulation });
        }

        self.nodes[slot] = None;
        self.free.push(slot);
        self.index.remove(&id);
        if self.sink == Some(id) {
            self.sink = None;
        }
        self.update_process_order();

        #[cfg(feature = "tracing")]
        tracing::debug!("graph_remove: node {id}");
        self.notify(GraphChange::NodeRemoved { id });
        Ok(())
    }

    /// Sets the persisted base value of one parameter.
    ///
    /// Returns the clamped value that was stored.
    pub fn set_parameter(&mut self, id: NodeId, name: &str, value: f32) -> Result<f32, GraphError> {
        let node = self.node_mut(id)?;
        let index = node.param_index(name).ok_or_else(|| GraphError::UnknownParameter {
            node: id,
            name: name.to_string(),
        })?;
        let stored = node.set_base_at(index, value);
        let state = node.state();
        self.notify(GraphChange::NodeUpdated { id, state });
        Ok(stored)
    }

    /// Sets several base values at once. Fails without changing anything if
    /// any name is unknown.
    pub fn set_parameters(&mut self, id: NodeId, params: &BTreeMap<String, f32>) -> Result<(), GraphError> {
        let node = self.node_mut(id)?;
        let mut resolved = Vec::with_capacity(params.len());
        for (name, value) in params {
            let index = node.param_index(name).ok_or_else(|| GraphError::UnknownParameter {
                node: id,
                name: name.clone(),
            })?;
            resolved.push((index, *value));
        }
        for (index, value) in resolved {
            node.set_base_at(index, value);
        }
        let state = node.state();
        self.notify(GraphChange::NodeUpdated { id, state });
        Ok(())
    }

    // --- Connection mutations ---

    /// Connects `from_node`'s output `from_channel` to `to_node`'s input `to_channel`.
    ///
    /// Returns the new connection's id, or an error if:
    /// - Either node doesn't exist
    /// - A channel index is out of range
    /// - `from_node == to_node`
    /// - The connection would create a cycle
    pub fn add_connection(
        &mut self,
        from_node: NodeId,
        from_channel: usize,
        to_node: NodeId,
        to_channel: usize,
    ) -> Result<ConnectionId, GraphError> {
        self.insert_connection(Connection {
            id: ConnectionId::new(),
            from_node,
            from_channel,
            to_node,
            to_channel,
        })
    }

    /// Adds a fully specified connection, keeping its id.
    pub fn insert_connection(&mut self, connection: Connection) -> Result<ConnectionId, GraphError> {
        let Connection {
            id,
            from_node,
            from_channel,
            to_node,
            to_channel,
        } = connection;

        let from = self.node(from_node).ok_or(GraphError::NodeNotFound(from_node))?;
        let to = self.node(to_node).ok_or(GraphError::NodeNotFound(to_node))?;
        if self.connections.iter().any(|c| c.id == id) {
            return Err(GraphError::DuplicateId(id.to_string()));
        }

        let available = from.effect.num_output_channels();
        if from_channel >= available {
            return Err(GraphError::InvalidChannel {
                node: from_node,
                direction: "output",
                channel: from_channel,
                available,
            });
        }
        let available = to.effect.num_input_channels();
        if to_channel >= available {
            return Err(GraphError::InvalidChannel {
                node: to_node,
                direction: "input",
                channel: to_channel,
                available,
            });
        }

        if from_node == to_node {
            return Err(GraphError::SelfLoop(from_node));
        }
        if self.has_predecessor(from_node, to_node) {
            return Err(GraphError::CycleDetected {
                from: from_node,
                to: to_node,
            });
        }

        self.connections.push(connection);
        if let Ok(node) = self.node_mut(to_node) {
            node.incoming.push(id);
        }
        self.update_process_order();

        #[cfg(feature = "tracing")]
        tracing::debug!("graph_connect: {connection}");
        self.notify(GraphChange::ConnectionAdded(connection));
        Ok(id)
    }

    /// Removes a connection.
    pub fn remove_connection(&mut self, id: ConnectionId) -> Result<(), GraphError> {
        if !self.connections.iter().any(|c| c.id == id) {
            return Err(GraphError::ConnectionNotFound(id));
        }
        self.detach_connection(id);
        self.update_process_order();

        #[cfg(feature = "tracing")]
        tracing::debug!("graph_disconnect: connection {id}");
        self.notify(GraphChange::ConnectionRemoved { id });
        Ok(())
    }

    fn detach_connection(&mut self, id: ConnectionId) {
        let Some(pos) = self.connections.iter().position(|c| c.id == id) else {
            return;
        };
        let connection = self.connections.remove(pos);
        if let Ok(node) = self.node_mut(connection.to_node) {
            node.incoming.retain(|c| *c != id);
            if let Some(slot) = node.inputs.get_mut(connection.to_channel) {
                *slot = None;
            }
        }
    }

    /// True if `target` is `start` or a transitive predecessor of `start`.
    ///
    /// Depth-first walk backwards over incoming connections.
    fn has_predecessor(&self, start: NodeId, target: NodeId) -> bool {
        let mut visited = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if visited.contains(&current) {
                continue;
            }
            visited.push(current);
            stack.extend(
                self.connections
                    .iter()
                    .filter(|c| c.to_node == current)
                    .map(|c| c.from_node),
            );
        }
        false
    }

    // --- Modulation mutations ---

    /// Adds a modulation source. Returns its id.
    pub fn add_modulation_source(&mut self, source: Box<dyn ModulationSource>) -> ModulationSourceId {
        let id = ModulationSourceId::new();
        self.sources.push(ModulationSourceNode { id, source });
        self.notify_source_added(id);
        id
    }

    /// Adds a modulation source under a caller-chosen id.
    pub fn add_modulation_source_with_id(
        &mut self,
        id: ModulationSourceId,
        source: Box<dyn ModulationSource>,
    ) -> Result<ModulationSourceId, GraphError> {
        if self.sources.iter().any(|s| s.id == id) {
            return Err(GraphError::DuplicateId(id.to_string()));
        }
        self.sources.push(ModulationSourceNode { id, source });
        self.notify_source_added(id);
        Ok(id)
    }

    fn notify_source_added(&self, id: ModulationSourceId) {
        if let Some(state) = self.source_state(id) {
            #[cfg(feature = "tracing")]
            tracing::debug!("graph_add: modulation source {id} ({})", state.kind);
            self.notify(GraphChange::ModulationSourceAdded { id, state });
        }
    }

    /// Removes a source and every modulation it drives.
    pub fn remove_modulation_source(&mut self, id: ModulationSourceId) -> Result<(), GraphError> {
        let pos = self
            .sources
            .iter()
            .position(|s| s.id == id)
            .ok_or(GraphError::ModulationSourceNotFound(id))?;

        let driven: Vec<ModulationId> = self
            .modulations
            .iter()
            .filter(|m| m.source == id)
            .map(|m| m.id)
            .collect();
        for modulation in driven {
            self.remove_modulation(modulation)?;
        }

        self.sources.remove(pos);
        self.notify(GraphChange::ModulationSourceRemoved { id });
        Ok(())
    }

    /// Sets parameters of a modulation source. Unknown names are rejected
    /// before anything changes.
    pub fn update_modulation_source(
        &mut self,
        id: ModulationSourceId,
        params: &BTreeMap<String, f32>,
    ) -> Result<(), GraphError> {
        let node = self
            .sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(GraphError::ModulationSourceNotFound(id))?;
        let mut resolved = Vec::with_capacity(params.len());
        for (name, value) in params {
            let index = node
                .source
                .find_param_by_name(name)
                .ok_or_else(|| GraphError::UnknownSourceParameter { id, name: name.clone() })?;
            resolved.push((index, *value));
        }
        for (index, value) in resolved {
            let clamped = node
                .source
                .param_info(index)
                .map(|d| d.clamp(value))
                .unwrap_or(value);
            node.source.set_param(index, clamped);
        }
        if let Some(state) = self.source_state(id) {
            self.notify(GraphChange::ModulationSourceUpdated { id, state });
        }
        Ok(())
    }

    /// Binds `source` to `target` on `target_node`.
    pub fn add_modulation(
        &mut self,
        source: ModulationSourceId,
        target_node: NodeId,
        target: ModulationTarget,
        amount: f32,
        inverted: bool,
    ) -> Result<ModulationId, GraphError> {
        self.insert_modulation(Modulation {
            id: ModulationId::new(),
            source,
            target_node,
            target,
            amount,
            inverted,
        })
    }

    /// Adds a fully specified modulation, keeping its id.
    pub fn insert_modulation(&mut self, modulation: Modulation) -> Result<ModulationId, GraphError> {
        if self.modulations.iter().any(|m| m.id == modulation.id) {
            return Err(GraphError::DuplicateId(modulation.id.to_string()));
        }
        self.validate_modulation(&modulation)?;
        let id = modulation.id;
        self.modulations.push(modulation.clone());

        #[cfg(feature = "tracing")]
        tracing::debug!("graph_modulate: {} → {}", modulation.source, modulation.target_node);
        self.notify(GraphChange::ModulationAdded(modulation));
        Ok(id)
    }

    /// Replaces the amount, inversion and target of an existing modulation.
    ///
    /// Offsets the old binding left on its target are cleared.
    pub fn update_modulation(&mut self, updated: Modulation) -> Result<(), GraphError> {
        let pos = self
            .modulations
            .iter()
            .position(|m| m.id == updated.id)
            .ok_or(GraphError::ModulationNotFound(updated.id))?;
        self.validate_modulation(&updated)?;
        let previous = std::mem::replace(&mut self.modulations[pos], updated.clone());
        self.clear_offsets(&previous);
        self.notify(GraphChange::ModulationUpdated(updated));
        Ok(())
    }

    /// Removes a modulation and resets its target parameter offsets.
    pub fn remove_modulation(&mut self, id: ModulationId) -> Result<(), GraphError> {
        let pos = self
            .modulations
            .iter()
            .position(|m| m.id == id)
            .ok_or(GraphError::ModulationNotFound(id))?;
        let removed = self.modulations.remove(pos);
        self.clear_offsets(&removed);
        self.notify(GraphChange::ModulationRemoved { id });
        Ok(())
    }

    fn validate_modulation(&self, modulation: &Modulation) -> Result<(), GraphError> {
        if !self.sources.iter().any(|s| s.id == modulation.source) {
            return Err(GraphError::ModulationSourceNotFound(modulation.source));
        }
        let node = self
            .node(modulation.target_node)
            .ok_or(GraphError::NodeNotFound(modulation.target_node))?;
        for name in modulation.target.parameter_names() {
            if node.param_index(name).is_none() {
                return Err(GraphError::UnknownParameter {
                    node: modulation.target_node,
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn clear_offsets(&mut self, modulation: &Modulation) {
        if let Ok(node) = self.node_mut(modulation.target_node) {
            for name in modulation.target.parameter_names() {
                if let Some(index) = node.param_index(name) {
                    node.clear_offset_at(index);
                }
            }
        }
    }

    /// Routes a live controller value to every source listening on `controller`.
    ///
    /// Returns the number of sources that received it.
    pub fn set_controller_value(&mut self, controller: &str, value: f32) -> usize {
        let mut hits = 0;
        for node in &mut self.sources {
            if node.source.controller() == Some(controller) {
                node.source.set_controller_value(value);
                hits += 1;
            }
        }
        hits
    }

    // --- Sizing and scheduling ---

    /// Sets the sink's output size and re-derives sizes for the whole graph.
    pub fn propagate_num_pixels(&mut self, pixels: usize, rows: usize) {
        let size = OutputSize::new(pixels, rows.max(1));
        self.sink_size = Some(size);
        self.update_process_order();
        self.notify(GraphChange::OutputSizeChanged(size));
    }

    /// Re-derives the execution order and per-node output sizes.
    fn update_process_order(&mut self) {
        let all: Vec<NodeId> = self.nodes.iter().flatten().map(|n| n.id).collect();
        let Some(sink) = self.sink else {
            for node in self.nodes.iter_mut().flatten() {
                node.size = None;
                node.clear_slots();
            }
            self.order.clear();
            self.pruned = all;
            return;
        };

        let discovered = discovery_order(&all, sink, &self.connections);

        for node in self.nodes.iter_mut().flatten() {
            node.size = None;
        }
        let sink_size = self.sink_size;
        if let Ok(node) = self.node_mut(sink) {
            node.size = sink_size;
        }

        // Sink first: every node is visited after all nodes it feeds.
        for &id in &discovered {
            let Some(node) = self.node(id) else { continue };
            let Some(own) = node.size else { continue };
            let requests: Vec<(NodeId, OutputSize)> = node
                .incoming
                .iter()
                .filter_map(|cid| self.connections.iter().find(|c| c.id == *cid))
                .map(|c| (c.from_node, node.effect.input_size(c.to_channel, own)))
                .collect();
            for (upstream, size) in requests {
                if let Ok(up) = self.node_mut(upstream) {
                    up.size = Some(size);
                }
            }
        }

        let mut order: Vec<NodeId> = discovered;
        order.reverse();
        order.retain(|id| self.node(*id).is_some_and(|n| n.size.is_some()));
        self.pruned = all.into_iter().filter(|id| !order.contains(id)).collect();
        self.order = order;

        // Stale signals must not outlive a node's place in the schedule.
        for id in self.pruned.clone() {
            if let Ok(node) = self.node_mut(id) {
                node.clear_slots();
            }
        }

        #[cfg(feature = "tracing")]
        {
            if self.sink_size.is_some() && !self.pruned.is_empty() {
                tracing::warn!(
                    "graph_schedule: {} node(s) unreachable or unsized, not scheduled: {:?}",
                    self.pruned.len(),
                    self.pruned.iter().map(ToString::to_string).collect::<Vec<_>>()
                );
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_schedule: {} nodes in execution order", self.order.len());
    }

    // --- Frame execution ---

    /// Runs one frame.
    ///
    /// 1. advance modulation sources by `ctx.dt`
    /// 2. reset modulated offsets
    /// 3. apply every modulation
    /// 4. `update` every scheduled node (concurrently when enabled)
    /// 5. `process` every scheduled node in execution order
    ///
    /// A failing node does not stop the frame: its outputs are cleared and
    /// the remaining nodes still run. The first failure is returned.
    /// Graphs without a sink skip the frame.
    pub fn tick(&mut self, ctx: &FrameContext) -> Result<(), NodeExecutionError> {
        if self.sink.is_none() {
            return Ok(());
        }
        for node in &mut self.sources {
            node.source.update(ctx.dt);
        }
        self.apply_modulations();

        let update_failures = self.run_update(ctx);
        let process_failure = self.run_process(&update_failures);

        match update_failures.into_iter().next().or(process_failure) {
            Some(err) => {
                #[cfg(feature = "tracing")]
                tracing::error!("graph_tick: {err}");
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Resets offsets on every modulated node, then applies each modulation.
    fn apply_modulations(&mut self) {
        let Self {
            nodes,
            index,
            sources,
            modulations,
            ..
        } = self;

        for modulation in modulations.iter() {
            if let Some(node) = slot_mut(nodes, index, modulation.target_node) {
                node.reset_parameter_offsets();
            }
        }

        for modulation in modulations.iter() {
            let Some(source) = sources.iter().find(|s| s.id == modulation.source) else {
                continue;
            };
            let Some(node) = slot_mut(nodes, index, modulation.target_node) else {
                continue;
            };
            match &modulation.target {
                ModulationTarget::Parameter { name } => {
                    if let Some(i) = node.param_index(name) {
                        let offset = node.offset_at(i) + modulation.scalar_offset(source.source.value());
                        node.set_offset_at(i, offset);
                    }
                }
                ModulationTarget::Color { channels } => {
                    let Some(target) = source.source.color_target() else {
                        continue;
                    };
                    for (c, name) in channels.iter().enumerate() {
                        if let Some(i) = node.param_index(name) {
                            let offset = node.offset_at(i)
                                + modulation.color_offset(node.base_at(i), &target, c);
                            node.set_offset_at(i, offset);
                        }
                    }
                }
            }
        }
    }

    fn scheduled_mask(&self) -> Vec<bool> {
        self.nodes
            .iter()
            .map(|n| n.as_ref().is_some_and(|n| self.order.contains(&n.id)))
            .collect()
    }

    /// Update phase. Returns the failures in no particular order.
    fn run_update(&mut self, ctx: &FrameContext) -> Vec<NodeExecutionError> {
        let mask = self.scheduled_mask();
        let record = self.record_timings;
        let started = Instant::now();

        let run = |node: &mut Node| -> Option<NodeExecutionError> {
            let t0 = record.then(Instant::now);
            let result = node.effect.update(ctx);
            if let Some(t0) = t0 {
                node.update_timing.record(t0.elapsed());
            }
            result.err().map(|source| NodeExecutionError {
                node: node.id,
                kind: node.effect.kind(),
                phase: Phase::Update,
                source,
            })
        };

        #[cfg(feature = "parallel")]
        let failures: Vec<NodeExecutionError> = if self.parallel_update {
            self.nodes
                .par_iter_mut()
                .zip(mask.par_iter())
                .filter_map(|(node, &scheduled)| node.as_mut().filter(|_| scheduled))
                .filter_map(run)
                .collect()
        } else {
            self.nodes
                .iter_mut()
                .zip(mask.iter())
                .filter_map(|(node, &scheduled)| node.as_mut().filter(|_| scheduled))
                .filter_map(run)
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let failures: Vec<NodeExecutionError> = self
            .nodes
            .iter_mut()
            .zip(mask.iter())
            .filter_map(|(node, &scheduled)| node.as_mut().filter(|_| scheduled))
            .filter_map(run)
            .collect();

        if record {
            self.all_update_timing.record(started.elapsed());
        }
        failures
    }

    /// Process phase, strictly in execution order.
    fn run_process(&mut self, update_failures: &[NodeExecutionError]) -> Option<NodeExecutionError> {
        let mut first = None;
        let order = self.order.clone();

        for id in order {
            let Some(&slot) = self.index.get(&id) else { continue };

            // Gather this frame's upstream outputs before borrowing the node mutably.
            let Some(node) = self.nodes[slot].as_ref() else { continue };
            let incoming: Vec<(usize, SignalSlot)> = node
                .incoming
                .iter()
                .filter_map(|cid| self.connections.iter().find(|c| c.id == *cid))
                .map(|c| {
                    let value = self
                        .node(c.from_node)
                        .and_then(|up| up.outputs.get(c.from_channel))
                        .cloned()
                        .flatten();
                    (c.to_channel, value)
                })
                .collect();

            let Some(node) = self.nodes[slot].as_mut() else { continue };
            node.inputs.iter_mut().for_each(|s| *s = None);
            for (channel, value) in incoming {
                if let Some(input) = node.inputs.get_mut(channel) {
                    *input = value;
                }
            }

            if update_failures.iter().any(|f| f.node == id) {
                node.outputs.iter_mut().for_each(|s| *s = None);
                continue;
            }

            let Some(size) = node.size else { continue };
            let t0 = self.record_timings.then(Instant::now);
            let result = node.effect.process(&node.inputs, &mut node.outputs, size);
            if let Some(t0) = t0 {
                node.process_timing.record(t0.elapsed());
            }
            if let Err(source) = result {
                node.outputs.iter_mut().for_each(|s| *s = None);
                let err = NodeExecutionError {
                    node: id,
                    kind: node.effect.kind(),
                    phase: Phase::Process,
                    source,
                };
                #[cfg(feature = "tracing")]
                tracing::warn!("graph_process: {err}");
                first.get_or_insert(err);
            }
        }
        first
    }

    // --- Introspection ---

    /// Node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).and_then(|&i| self.nodes[i].as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        slot_mut(&mut self.nodes, &self.index, id).ok_or(GraphError::NodeNotFound(id))
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    /// All connections in insertion order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Connection by id.
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// All modulation sources in insertion order.
    pub fn modulation_sources(&self) -> &[ModulationSourceNode] {
        &self.sources
    }

    /// Modulation source by id.
    pub fn modulation_source(&self, id: ModulationSourceId) -> Option<&ModulationSourceNode> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Snapshot of a modulation source.
    pub fn source_state(&self, id: ModulationSourceId) -> Option<EffectState> {
        self.modulation_source(id)
            .map(|s| EffectState::from_params(s.source.kind(), s.source.as_ref()))
    }

    /// All modulations in insertion order.
    pub fn modulations(&self) -> &[Modulation] {
        &self.modulations
    }

    /// Modulation by id.
    pub fn modulation(&self, id: ModulationId) -> Option<&Modulation> {
        self.modulations.iter().find(|m| m.id == id)
    }

    /// Snapshot of a node's effect with base parameter values.
    pub fn effect_state(&self, id: NodeId) -> Option<EffectState> {
        self.node(id).map(Node::state)
    }

    /// The sink node, if any.
    pub fn sink(&self) -> Option<NodeId> {
        self.sink
    }

    /// Output size the sink was given.
    pub fn sink_size(&self) -> Option<OutputSize> {
        self.sink_size
    }

    /// Last frame produced by the sink.
    pub fn sink_frame(&self) -> Option<&PixelBuffer> {
        self.sink
            .and_then(|id| self.node(id))
            .and_then(|n| n.effect.sink_frame())
    }

    /// Derived execution order, sources first and the sink last.
    pub fn execution_order(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes present in the graph but left out of the execution order.
    pub fn pruned_nodes(&self) -> &[NodeId] {
        &self.pruned
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    /// Number of connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Per-node timings, in execution order.
    pub fn timings(&self) -> Vec<NodeTiming> {
        self.order
            .iter()
            .filter_map(|id| self.node(*id))
            .map(|n| NodeTiming {
                node: n.id,
                kind: n.effect.kind(),
                update: n.update_timing,
                process: n.process_timing,
            })
            .collect()
    }

    /// Timing of the whole update phase.
    pub fn update_phase_timing(&self) -> &Timing {
        &self.all_update_timing
    }
}

impl core::fmt::Debug for FilterGraph {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FilterGraph")
            .field("nodes", &self.node_count())
            .field("connections", &self.connections.len())
            .field("sources", &self.sources.len())
            .field("modulations", &self.modulations.len())
            .field("sink", &self.sink)
            .field("sink_size", &self.sink_size)
            .finish_non_exhaustive()
    }
}

fn slot_mut<'a>(nodes: &'a mut [Option<Node>], index: &HashMap<NodeId, usize>, id: NodeId) -> Option<&'a mut Node> {
    let slot = *index.get(&id)?;
    nodes.get_mut(slot)?.as_mut()
}
