//! Brightness scaler.

use glint_core::{
    Effect, EffectError, OutputSize, ParamDescriptor, ParameterInfo, SignalSlot, input_pixels,
    pixel_output,
};

/// Multiplies every pixel of its input by `level`.
#[derive(Debug, Clone)]
pub struct Dim {
    level: f32,
}

impl Default for Dim {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Dim {
    /// Create a dimmer at `level` (0-1).
    pub fn new(level: f32) -> Self {
        Self {
            level: level.clamp(0.0, 1.0),
        }
    }

    /// Current level.
    pub fn level(&self) -> f32 {
        self.level
    }
}

impl Effect for Dim {
    fn kind(&self) -> &'static str {
        "dim"
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
        outputs[0] = input_pixels(inputs, 0)?.and_then(|p| pixel_output(p.scaled(self.level)));
        Ok(())
    }
}

impl ParameterInfo for Dim {
    fn param_count(&self) -> usize {
        1
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        (index == 0).then(|| {
            ParamDescriptor::continuous("level", 1.0, 0.0, 1.0, 0.01).with_help("Brightness factor.")
        })
    }

    fn get_param(&self, index: usize) -> f32 {
        if index == 0 { self.level } else { 0.0 }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        if index == 0 {
            self.level = value.clamp(0.0, 1.0);
        }
    }
}
