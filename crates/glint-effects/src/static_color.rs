//! Solid color generator.

use glint_core::{
    Effect, EffectError, OutputSize, ParamDescriptor, ParameterInfo, PixelBuffer, SignalSlot,
    pixel_output,
};

/// Outputs every pixel in one static color.
///
/// # Example
///
/// ```rust
/// use glint_core::{Effect, OutputSize};
/// use glint_effects::StaticColor;
///
/// let mut red = StaticColor::new(255.0, 0.0, 0.0);
/// let mut out = vec![None];
/// red.process(&[], &mut out, OutputSize::new(10, 1)).unwrap();
/// assert!(out[0].is_some());
/// ```
#[derive(Debug, Clone)]
pub struct StaticColor {
    rgb: [f32; 3],
    /// Cached frame, rebuilt when size or color changes.
    frame: Option<PixelBuffer>,
}

impl Default for StaticColor {
    fn default() -> Self {
        Self::new(255.0, 255.0, 255.0)
    }
}

impl StaticColor {
    /// Create a generator for the given color (each channel 0-255).
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        let mut color = Self {
            rgb: [0.0; 3],
            frame: None,
        };
        color.set_color([r, g, b]);
        color
    }

    /// Set the color.
    pub fn set_color(&mut self, rgb: [f32; 3]) {
        self.rgb = rgb.map(|c| c.clamp(0.0, 255.0));
        self.frame = None;
    }

    /// Current color.
    pub fn color(&self) -> [f32; 3] {
        self.rgb
    }
}

impl Effect for StaticColor {
    fn kind(&self) -> &'static str {
        "static_color"
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
        let rgb = self.rgb;
        let frame = match self.frame.take() {
            Some(f) if f.size() == size => f,
            _ => PixelBuffer::filled(size, rgb),
        };
        outputs[0] = pixel_output(frame.clone());
        self.frame = Some(frame);
        Ok(())
    }
}

impl ParameterInfo for StaticColor {
    fn param_count(&self) -> usize {
        3
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(ParamDescriptor::color_channel("r", 255.0).with_help("Amount of red.")),
            1 => Some(ParamDescriptor::color_channel("g", 255.0).with_help("Amount of green.")),
            2 => Some(ParamDescriptor::color_channel("b", 255.0).with_help("Amount of blue.")),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        self.rgb.get(index).copied().unwrap_or(0.0)
    }

    fn set_param(&mut self, index: usize, value: f32) {
        if index < 3 {
            let mut rgb = self.rgb;
            rgb[index] = value;
            self.set_color(rgb);
        }
    }
}
