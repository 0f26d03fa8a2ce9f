//! Two-input blend.

use glint_core::{
    Effect, EffectError, MAX_CHANNEL_VALUE, OutputSize, ParamDescriptor, ParameterInfo,
    PixelBuffer, SignalSlot, input_pixels, pixel_output,
};

const MODES: &[&str] = &["add", "max", "multiply"];

/// How [`Combine`] merges its inputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    /// Channel-wise sum, clamped.
    #[default]
    Add,
    /// Channel-wise maximum.
    Max,
    /// Channel-wise product normalized to `[0, 255]`.
    Multiply,
}

impl BlendMode {
    fn from_index(index: usize) -> Self {
        match index {
            1 => BlendMode::Max,
            2 => BlendMode::Multiply,
            _ => BlendMode::Add,
        }
    }

    fn to_index(self) -> usize {
        match self {
            BlendMode::Add => 0,
            BlendMode::Max => 1,
            BlendMode::Multiply => 2,
        }
    }

    fn blend(self, a: f32, b: f32) -> f32 {
        let v = match self {
            BlendMode::Add => a + b,
            BlendMode::Max => a.max(b),
            BlendMode::Multiply => a * b / MAX_CHANNEL_VALUE,
        };
        v.clamp(0.0, MAX_CHANNEL_VALUE)
    }
}

/// Blends input 0 and input 1 into one frame.
///
/// With only one input present that input is passed through; with none the
/// output is empty.
#[derive(Debug, Clone, Default)]
pub struct Combine {
    mode: BlendMode,
}

impl Combine {
    /// Create a combiner with the given mode.
    pub fn new(mode: BlendMode) -> Self {
        Self { mode }
    }

    /// Current mode.
    pub fn mode(&self) -> BlendMode {
        self.mode
    }
}

impl Effect for Combine {
    fn kind(&self) -> &'static str {
        "combine"
    }

    fn num_input_channels(&self) -> usize {
        2
    }

    fn num_output_channels(&self) -> usize {
        1
    }

    fn process(
        &mut self,
        inputs: &[SignalSlot],
        outputs: &mut [SignalSlot],
        size: OutputSize,
    ) -> Result<(), EffectError> {
        let a = input_pixels(inputs, 0)?;
        let b = input_pixels(inputs, 1)?;
        outputs[0] = match (a, b) {
            (None, None) => None,
            (Some(_), None) => inputs[0].clone(),
            (None, Some(_)) => inputs[1].clone(),
            (Some(a), Some(b)) => {
                let mut out = PixelBuffer::new(size);
                for c in 0..3 {
                    let (ca, cb) = (a.channel(c), b.channel(c));
                    for (i, v) in out.channel_mut(c).iter_mut().enumerate() {
                        let x = ca.get(i).copied().unwrap_or(0.0);
                        let y = cb.get(i).copied().unwrap_or(0.0);
                        *v = self.mode.blend(x, y);
                    }
                }
                pixel_output(out)
            }
        };
        Ok(())
    }
}

impl ParameterInfo for Combine {
    fn param_count(&self) -> usize {
        1
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        (index == 0).then(|| {
            ParamDescriptor::choice("mode", MODES, 0)
                .with_help("Blend mode for combining input 0 and input 1.")
        })
    }

    fn get_param(&self, index: usize) -> f32 {
        if index == 0 { self.mode.to_index() as f32 } else { 0.0 }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        if index == 0 {
            self.mode = BlendMode::from_index(value.max(0.0).round() as usize);
        }
    }
}
