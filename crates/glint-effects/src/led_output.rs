//! The output sink.

use glint_core::{
    Effect, EffectError, OutputSize, ParamDescriptor, ParameterInfo, PixelBuffer, SignalSlot,
    input_pixels,
};

/// Final node of every graph: holds the frame handed to the device.
///
/// The incoming frame is scaled by `brightness`. A graph may contain at most
/// one `LedOutput`.
#[derive(Debug, Clone)]
pub struct LedOutput {
    brightness: f32,
    frame: Option<PixelBuffer>,
}

impl Default for LedOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl LedOutput {
    /// Create a sink at full brightness.
    pub fn new() -> Self {
        Self {
            brightness: 1.0,
            frame: None,
        }
    }

    /// Current brightness (0-1).
    pub fn brightness(&self) -> f32 {
        self.brightness
    }
}

impl Effect for LedOutput {
    fn kind(&self) -> &'static str {
        "led_output"
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
        self.frame = input_pixels(inputs, 0)?.map(|p| p.scaled(self.brightness));
        Ok(())
    }

    fn sink_frame(&self) -> Option<&PixelBuffer> {
        self.frame.as_ref()
    }
}

impl ParameterInfo for LedOutput {
    fn param_count(&self) -> usize {
        1
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        (index == 0).then(|| {
            ParamDescriptor::continuous("brightness", 1.0, 0.0, 1.0, 0.01)
                .with_help("Brightness of all pixels.")
        })
    }

    fn get_param(&self, index: usize) -> f32 {
        if index == 0 { self.brightness } else { 0.0 }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        if index == 0 {
            self.brightness = value.clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_core::pixel_output;

    #[test]
    fn test_led_output_is_a_sink() {
        let out = LedOutput::new();
        assert!(out.is_sink());
        assert_eq!(out.num_input_channels(), 1);
        assert_eq!(out.num_output_channels(), 0);
    }

    #[test]
    fn test_led_output_applies_brightness() {
        let mut out = LedOutput::new();
        out.set_param(0, 0.5);
        let size = OutputSize::new(2, 1);
        let inputs = vec![pixel_output(PixelBuffer::filled(size, [200.0; 3]))];
        out.process(&inputs, &mut [], size).unwrap();
        assert_eq!(out.sink_frame().unwrap().pixel(1), Some([100.0; 3]));

        out.process(&[None], &mut [], size).unwrap();
        assert!(out.sink_frame().is_none());
    }
}
