//! The contract every processing unit in a [`FilterGraph`](crate::FilterGraph) implements.
//!
//! An effect declares a fixed number of input and output channels, prepares
//! itself once per frame in [`update`](Effect::update), and turns input slots
//! into output slots in [`process`](Effect::process).
//!
//! `update` must only touch the effect's own state and the frame context. The
//! graph may run the `update` phase of all nodes concurrently. `process` runs
//! strictly in execution order and may read upstream outputs produced earlier
//! in the same frame.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::param_info::ParameterInfo;
use crate::signal::{AudioBuffer, FrameContext, OutputSize, PixelBuffer, Signal, SignalSlot};

/// Error raised by an effect's `update` or `process`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EffectError {
    /// An input carried a payload of the wrong kind.
    #[error("input {channel} expected {expected}")]
    UnexpectedSignal {
        /// Input channel index.
        channel: usize,
        /// Payload kind the effect wanted.
        expected: &'static str,
    },
    /// The effect could not produce a frame.
    #[error("{0}")]
    Failed(String),
}

impl EffectError {
    /// Creates a [`EffectError::Failed`] from any message.
    pub fn failed(msg: impl Into<String>) -> Self {
        EffectError::Failed(msg.into())
    }
}

/// A stateful processing unit wrapped by a graph node.
pub trait Effect: ParameterInfo + Send {
    /// Registry id of this effect kind (for example `"static_color"`).
    fn kind(&self) -> &'static str;

    /// Number of input channels. Fixed for the lifetime of the effect.
    fn num_input_channels(&self) -> usize;

    /// Number of output channels. Fixed for the lifetime of the effect.
    fn num_output_channels(&self) -> usize;

    /// Per-frame preparation. Reads only the effect's own state and `ctx`.
    fn update(&mut self, _ctx: &FrameContext) -> Result<(), EffectError> {
        Ok(())
    }

    /// Reads `inputs`, writes `outputs`.
    ///
    /// `inputs` has [`num_input_channels`](Self::num_input_channels) entries
    /// and `outputs` has [`num_output_channels`](Self::num_output_channels).
    /// An input is `None` when it is unconnected or its upstream produced
    /// nothing this frame, which is different from a black frame.
    fn process(
        &mut self,
        inputs: &[SignalSlot],
        outputs: &mut [SignalSlot],
        size: OutputSize,
    ) -> Result<(), EffectError>;

    /// Size this effect requires on input `channel` given its own output size.
    fn input_size(&self, _channel: usize, own: OutputSize) -> OutputSize {
        own
    }

    /// Input count to record for effects whose arity is chosen at creation.
    fn arity_hint(&self) -> Option<usize> {
        None
    }

    /// True for the output sink. A graph accepts at most one.
    fn is_sink(&self) -> bool {
        false
    }

    /// The last frame a sink produced.
    fn sink_frame(&self) -> Option<&PixelBuffer> {
        None
    }
}

/// Serializable snapshot of an effect: kind, arity hint and parameter values.
///
/// This is what crosses process boundaries; the receiving side rebuilds the
/// effect from its registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectState {
    /// Registry id.
    pub kind: String,
    /// Input channel count for effects with configurable arity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<usize>,
    /// Parameter values by name.
    #[serde(default)]
    pub params: BTreeMap<String, f32>,
}

impl EffectState {
    /// Snapshot of an effect's current parameter values.
    pub fn capture(effect: &dyn Effect) -> Self {
        let mut state = Self::from_params(effect.kind(), effect);
        state.channels = effect.arity_hint();
        state
    }

    /// Snapshot of any parameter holder under `kind`.
    pub fn from_params<P: ParameterInfo + ?Sized>(kind: &str, params: &P) -> Self {
        let params = (0..params.param_count())
            .filter_map(|i| params.param_info(i).map(|d| (d.name.to_string(), params.get_param(i))))
            .collect();
        Self {
            kind: kind.to_string(),
            channels: None,
            params,
        }
    }

    /// Sets the arity hint.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Adds or replaces one parameter value.
    pub fn with_param(mut self, name: impl Into<String>, value: f32) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

/// Pixel frame on input `channel`; `Ok(None)` when there is no signal.
pub fn input_pixels(inputs: &[SignalSlot], channel: usize) -> Result<Option<&PixelBuffer>, EffectError> {
    match inputs.get(channel).and_then(|s| s.as_deref()) {
        None => Ok(None),
        Some(Signal::Pixels(p)) => Ok(Some(p)),
        Some(_) => Err(EffectError::UnexpectedSignal {
            channel,
            expected: "pixels",
        }),
    }
}

/// Audio chunk on input `channel`; `Ok(None)` when there is no signal.
pub fn input_audio(inputs: &[SignalSlot], channel: usize) -> Result<Option<&AudioBuffer>, EffectError> {
    match inputs.get(channel).and_then(|s| s.as_deref()) {
        None => Ok(None),
        Some(Signal::Audio(a)) => Ok(Some(a)),
        Some(_) => Err(EffectError::UnexpectedSignal {
            channel,
            expected: "audio",
        }),
    }
}

/// Wraps a frame for an output slot.
pub fn pixel_output(frame: PixelBuffer) -> SignalSlot {
    Some(Arc::new(Signal::Pixels(frame)))
}
