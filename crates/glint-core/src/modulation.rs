//! Modulation sources and bindings.
//!
//! A [`ModulationSource`] emits one scalar per frame (and optionally a color
//! target). A [`Modulation`] binds a source to a parameter on a node. Every
//! frame the graph resets all offsets and re-applies every modulation, so the
//! node's persisted base value is never changed by modulation.

use serde::{Deserialize, Serialize};

use crate::graph::ids::{ModulationId, ModulationSourceId, NodeId};
use crate::param_info::ParameterInfo;

/// Per-channel target emitted by color sources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorTarget {
    /// Target color, each channel in `[0, 255]`.
    pub rgb: [f32; 3],
    /// How strongly the source currently pulls towards `rgb`, in `[0, 1]`.
    pub activation: f32,
}

/// An external scalar source driving parameter offsets.
pub trait ModulationSource: ParameterInfo + Send {
    /// Registry id of this source kind.
    fn kind(&self) -> &'static str;

    /// Advances the source's clock by `dt` seconds.
    fn update(&mut self, dt: f32);

    /// Current scalar value.
    fn value(&self) -> f32;

    /// Color the source blends towards, for color-channel modulations.
    fn color_target(&self) -> Option<ColorTarget> {
        None
    }

    /// Live controller this source listens to, if any.
    fn controller(&self) -> Option<&str> {
        None
    }

    /// Receives a live controller value.
    fn set_controller_value(&mut self, _value: f32) {}
}

/// What a [`Modulation`] drives on its target node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ModulationTarget {
    /// Scalar offset added to one parameter.
    Parameter {
        /// Parameter name on the target effect.
        name: String,
    },
    /// Blend of three color-channel parameters towards the source's color.
    Color {
        /// Red, green and blue parameter names on the target effect.
        channels: [String; 3],
    },
}

impl ModulationTarget {
    /// Scalar target on `name`.
    pub fn parameter(name: impl Into<String>) -> Self {
        ModulationTarget::Parameter { name: name.into() }
    }

    /// Color target on three parameters.
    pub fn color(r: impl Into<String>, g: impl Into<String>, b: impl Into<String>) -> Self {
        ModulationTarget::Color {
            channels: [r.into(), g.into(), b.into()],
        }
    }

    /// Parameter names touched by this target.
    pub fn parameter_names(&self) -> Vec<&str> {
        match self {
            ModulationTarget::Parameter { name } => vec![name.as_str()],
            ModulationTarget::Color { channels } => channels.iter().map(String::as_str).collect(),
        }
    }
}

/// Binding of a source to a target node's parameter(s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modulation {
    /// Unique id.
    pub id: ModulationId,
    /// Driving source.
    pub source: ModulationSourceId,
    /// Target node.
    pub target_node: NodeId,
    /// Driven parameter(s).
    pub target: ModulationTarget,
    /// Scale applied to the source value.
    pub amount: f32,
    /// Negates the contribution.
    pub inverted: bool,
}

impl Modulation {
    /// `-1.0` when inverted, `1.0` otherwise.
    pub fn sign(&self) -> f32 {
        if self.inverted { -1.0 } else { 1.0 }
    }

    /// Scalar offset contribution of this modulation for `value`.
    pub fn scalar_offset(&self, value: f32) -> f32 {
        value * self.amount * self.sign()
    }

    /// Color offset contribution on one channel given its base value.
    pub fn color_offset(&self, base: f32, target: &ColorTarget, channel: usize) -> f32 {
        (target.rgb[channel.min(2)] - base) * self.amount * target.activation * self.sign()
    }
}

/// Graph-owned wrapper around one source instance.
pub struct ModulationSourceNode {
    pub(crate) id: ModulationSourceId,
    pub(crate) source: Box<dyn ModulationSource>,
}

impl ModulationSourceNode {
    /// Source id.
    pub fn id(&self) -> ModulationSourceId {
        self.id
    }

    /// Wrapped source.
    pub fn source(&self) -> &dyn ModulationSource {
        self.source.as_ref()
    }

    /// Mutable access to the wrapped source.
    pub fn source_mut(&mut self) -> &mut dyn ModulationSource {
        self.source.as_mut()
    }
}

impl core::fmt::Debug for ModulationSourceNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ModulationSourceNode")
            .field("id", &self.id)
            .field("kind", &self.source.kind())
            .finish()
    }
}
