//! Concatenation of several inputs along the strip.

use glint_core::{
    Effect, EffectError, OutputSize, ParamDescriptor, ParameterInfo, PixelBuffer, SignalSlot,
    input_pixels, pixel_output,
};

/// Largest supported number of inputs.
pub const MAX_APPEND_CHANNELS: usize = 8;

const FLIP: &[&str] = &["off", "on"];

const FLIP_NAMES: [&str; MAX_APPEND_CHANNELS] =
    ["flip0", "flip1", "flip2", "flip3", "flip4", "flip5", "flip6", "flip7"];

/// Joins N inputs into one output, input 0 first.
///
/// Each input is asked for `pixels / N` pixels. Inputs without signal are
/// skipped; when the result is shorter than the output, the last pixel is
/// repeated. Without a signal on input 0 the output is empty.
///
/// The input count is fixed at creation; each input may be reversed with its
/// `flipK` parameter.
#[derive(Debug, Clone)]
pub struct Append {
    channels: usize,
    flip: [bool; MAX_APPEND_CHANNELS],
}

impl Default for Append {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Append {
    /// Create an append with `channels` inputs (clamped to 1-8).
    pub fn new(channels: usize) -> Self {
        Self {
            channels: channels.clamp(1, MAX_APPEND_CHANNELS),
            flip: [false; MAX_APPEND_CHANNELS],
        }
    }

    /// Number of inputs.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Reverse the pixel direction of input `channel`.
    pub fn set_flip(&mut self, channel: usize, flip: bool) {
        if let Some(f) = self.flip.get_mut(channel) {
            *f = flip;
        }
    }
}

fn reversed(frame: &PixelBuffer) -> PixelBuffer {
    let mut channels = frame.channels().clone();
    for c in &mut channels {
        c.reverse();
    }
    PixelBuffer::from_channels(channels, frame.rows()).unwrap_or_else(|| frame.clone())
}

impl Effect for Append {
    fn kind(&self) -> &'static str {
        "append"
    }

    fn num_input_channels(&self) -> usize {
        self.channels
    }

    fn num_output_channels(&self) -> usize {
        1
    }

    fn input_size(&self, _channel: usize, own: OutputSize) -> OutputSize {
        OutputSize::new(own.pixels / self.channels, own.rows)
    }

    fn arity_hint(&self) -> Option<usize> {
        Some(self.channels)
    }

    fn process(
        &mut self,
        inputs: &[SignalSlot],
        outputs: &mut [SignalSlot],
        size: OutputSize,
    ) -> Result<(), EffectError> {
        if input_pixels(inputs, 0)?.is_none() {
            outputs[0] = None;
            return Ok(());
        }

        let mut out = PixelBuffer::new(OutputSize::new(0, size.rows));
        for channel in 0..self.channels {
            if let Some(part) = input_pixels(inputs, channel)? {
                if self.flip[channel] {
                    out.extend_from(&reversed(part));
                } else {
                    out.extend_from(part);
                }
            }
        }

        let filled = out.len();
        let last = filled.checked_sub(1).and_then(|i| out.pixel(i));
        out.resize(size.pixels);
        if let Some(last) = last {
            for i in filled..size.pixels {
                out.set_pixel(i, last);
            }
        }
        outputs[0] = pixel_output(out);
        Ok(())
    }
}

impl ParameterInfo for Append {
    fn param_count(&self) -> usize {
        MAX_APPEND_CHANNELS
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        FLIP_NAMES
            .get(index)
            .map(|&name| ParamDescriptor::choice(name, FLIP, 0).with_help("Reverse the pixel direction of this input."))
    }

    fn get_param(&self, index: usize) -> f32 {
        self.flip.get(index).map_or(0.0, |&f| if f { 1.0 } else { 0.0 })
    }

    fn set_param(&mut self, index: usize, value: f32) {
        self.set_flip(index, value >= 0.5);
    }
}
