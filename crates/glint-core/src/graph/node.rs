//! Graph node: one effect plus its input/output slots and parameter layers.
//!
//! A node keeps two parameter layers on top of the effect:
//!
//! - **base** values, the persisted state edited by users and configs;
//! - per-frame **offsets** written by modulations.
//!
//! The effect always sees `clamp(min, max, base + offset)`. Resetting the
//! offsets restores the base value, so modulation never leaks into saved
//! state.

use crate::effect::{Effect, EffectState};
use crate::signal::{OutputSize, SignalSlot};
use crate::timing::Timing;

use super::ids::{ConnectionId, NodeId};

/// One effect instance inside a [`FilterGraph`](super::FilterGraph).
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) effect: Box<dyn Effect>,
    pub(crate) inputs: Vec<SignalSlot>,
    pub(crate) outputs: Vec<SignalSlot>,
    /// Connections whose `to_node` is this node, in insertion order.
    pub(crate) incoming: Vec<ConnectionId>,
    /// Resolved output size; `None` until size propagation reaches the node.
    pub(crate) size: Option<OutputSize>,
    base: Vec<f32>,
    offsets: Vec<Option<f32>>,
    pub(crate) update_timing: Timing,
    pub(crate) process_timing: Timing,
}

impl Node {
    pub(crate) fn new(id: NodeId, effect: Box<dyn Effect>) -> Self {
        let count = effect.param_count();
        let base = (0..count).map(|i| effect.get_param(i)).collect();
        Self {
            id,
            inputs: vec![None; effect.num_input_channels()],
            outputs: vec![None; effect.num_output_channels()],
            incoming: Vec::new(),
            size: None,
            base,
            offsets: vec![None; count],
            update_timing: Timing::default(),
            process_timing: Timing::default(),
            effect,
        }
    }

    /// Node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The wrapped effect.
    pub fn effect(&self) -> &dyn Effect {
        self.effect.as_ref()
    }

    /// Effect kind id.
    pub fn kind(&self) -> &'static str {
        self.effect.kind()
    }

    /// Input slots as seen by the last `process`.
    pub fn inputs(&self) -> &[SignalSlot] {
        &self.inputs
    }

    /// Output slots written by the last `process`.
    pub fn outputs(&self) -> &[SignalSlot] {
        &self.outputs
    }

    /// Resolved output size, `None` if the node is not sized.
    pub fn output_size(&self) -> Option<OutputSize> {
        self.size
    }

    /// Update-phase timing (filled when the graph records timings).
    pub fn update_timing(&self) -> &Timing {
        &self.update_timing
    }

    /// Process-phase timing (filled when the graph records timings).
    pub fn process_timing(&self) -> &Timing {
        &self.process_timing
    }

    /// Index of a named parameter.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.effect.find_param_by_name(name)
    }

    /// Persisted base value of a parameter.
    pub fn base_value(&self, name: &str) -> Option<f32> {
        self.param_index(name).map(|i| self.base[i])
    }

    /// Value the effect currently sees (base plus offset, clamped).
    pub fn parameter_value(&self, name: &str) -> Option<f32> {
        self.param_index(name).map(|i| self.effect.get_param(i))
    }

    /// Offset currently applied to a parameter; `0.0` when unmodulated.
    pub fn parameter_offset(&self, name: &str) -> f32 {
        self.param_index(name)
            .map(|i| self.offset_at(i))
            .unwrap_or(0.0)
    }

    /// Sets the offset of a named parameter and returns the clamped value.
    ///
    /// Returns `None` for unknown parameter names.
    pub fn set_parameter_offset(&mut self, name: &str, offset: f32) -> Option<f32> {
        let index = self.param_index(name)?;
        Some(self.set_offset_at(index, offset))
    }

    /// Drops every offset and restores the base values.
    pub fn reset_parameter_offsets(&mut self) {
        for index in 0..self.offsets.len() {
            if self.offsets[index].take().is_some() {
                self.effect.set_param(index, self.base[index]);
            }
        }
    }

    /// Snapshot of the effect with base (unmodulated) parameter values.
    pub fn state(&self) -> EffectState {
        let mut state = EffectState::capture(self.effect.as_ref());
        for (i, value) in self.base.iter().enumerate() {
            if let Some(desc) = self.effect.param_info(i) {
                state.params.insert(desc.name.to_string(), *value);
            }
        }
        state
    }

    pub(crate) fn base_at(&self, index: usize) -> f32 {
        self.base.get(index).copied().unwrap_or(0.0)
    }

    pub(crate) fn offset_at(&self, index: usize) -> f32 {
        self.offsets.get(index).copied().flatten().unwrap_or(0.0)
    }

    /// Writes a new base value; any active offset stays layered on top.
    pub(crate) fn set_base_at(&mut self, index: usize, value: f32) -> f32 {
        let Some(desc) = self.effect.param_info(index) else {
            return 0.0;
        };
        let clamped = desc.clamp(value);
        self.base[index] = clamped;
        let effective = desc.clamp(clamped + self.offset_at(index));
        self.effect.set_param(index, effective);
        clamped
    }

    pub(crate) fn set_offset_at(&mut self, index: usize, offset: f32) -> f32 {
        let Some(desc) = self.effect.param_info(index) else {
            return 0.0;
        };
        self.offsets[index] = Some(offset);
        let effective = desc.clamp(self.base[index] + offset);
        self.effect.set_param(index, effective);
        effective
    }

    pub(crate) fn clear_offset_at(&mut self, index: usize) {
        if self.offsets.get_mut(index).and_then(Option::take).is_some() {
            self.effect.set_param(index, self.base[index]);
        }
    }

    pub(crate) fn clear_slots(&mut self) {
        self.inputs.iter_mut().for_each(|s| *s = None);
        self.outputs.iter_mut().for_each(|s| *s = None);
    }
}

impl core::fmt::Debug for Node {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.effect.kind())
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
