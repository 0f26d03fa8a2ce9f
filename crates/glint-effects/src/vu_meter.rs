//! RMS level bar.

use std::collections::VecDeque;

use glint_core::{
    Effect, EffectError, OutputSize, ParamDescriptor, ParameterInfo, PixelBuffer, SignalSlot,
    input_audio, pixel_output,
};

/// Level in dB at which the default gradient starts turning red.
const GREEN_UNTIL_DB: f32 = -24.0;

/// Lights a bar proportional to the audio level on input 0.
///
/// The bar spans `db_range` decibels below full scale. The level is the RMS of
/// the last `n_overlaps + 1` chunk levels, which smooths the motion. Pixels
/// are green up to -24 dB and fade to red above.
#[derive(Debug, Clone)]
pub struct VuMeter {
    db_range: f32,
    n_overlaps: usize,
    hold: VecDeque<f32>,
    gradient: Option<PixelBuffer>,
}

impl Default for VuMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl VuMeter {
    /// Create a meter with a 60 dB range.
    pub fn new() -> Self {
        Self {
            db_range: 60.0,
            n_overlaps: 1,
            hold: VecDeque::new(),
            gradient: None,
        }
    }

    /// Number of lit pixels for a level of `db` on a strip of `pixels`.
    pub fn bar_length(&self, db: f32, pixels: usize) -> usize {
        let scale = ((self.db_range + db) / self.db_range).clamp(0.0, 1.0);
        ((pixels as f32 * scale) as usize).min(pixels)
    }

    fn gradient(&mut self, size: OutputSize) -> &PixelBuffer {
        let stale = self.gradient.as_ref().is_none_or(|g| g.size() != size);
        if stale {
            let mut g = PixelBuffer::new(size);
            let green_len = self.bar_length(GREEN_UNTIL_DB, size.pixels);
            let ramp = (size.pixels - green_len).max(1) as f32;
            for i in 0..size.pixels {
                let t = if i < green_len { 0.0 } else { (i - green_len) as f32 / ramp };
                g.set_pixel(i, [255.0 * t, 255.0 * (1.0 - t), 0.0]);
            }
            self.gradient = Some(g);
        }
        self.gradient.get_or_insert_with(|| PixelBuffer::new(size))
    }
}

impl Effect for VuMeter {
    fn kind(&self) -> &'static str {
        "vu_meter"
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
        size: OutputSize,
    ) -> Result<(), EffectError> {
        let Some(audio) = input_audio(inputs, 0)? else {
            outputs[0] = None;
            return Ok(());
        };

        self.hold.push_front(audio.rms());
        self.hold.truncate(self.n_overlaps + 1);
        let mean_sq = self.hold.iter().map(|v| v * v).sum::<f32>() / self.hold.len() as f32;
        let db = 20.0 * mean_sq.sqrt().max(1e-16).log10();
        let lit = self.bar_length(db, size.pixels);

        let gradient = self.gradient(size);
        let mut bar = PixelBuffer::new(size);
        for i in 0..lit {
            if let Some(rgb) = gradient.pixel(i) {
                bar.set_pixel(i, rgb);
            }
        }
        outputs[0] = pixel_output(bar);
        Ok(())
    }
}

impl ParameterInfo for VuMeter {
    fn param_count(&self) -> usize {
        2
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(
                ParamDescriptor::continuous("db_range", 60.0, 20.0, 100.0, 1.0)
                    .with_help("Range of the meter in decibels."),
            ),
            1 => Some(
                ParamDescriptor::continuous("n_overlaps", 1.0, 0.0, 20.0, 1.0)
                    .with_help("Number of past chunks averaged into the level."),
            ),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.db_range,
            1 => self.n_overlaps as f32,
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => {
                self.db_range = value.clamp(20.0, 100.0);
                self.gradient = None;
            }
            1 => self.n_overlaps = value.clamp(0.0, 20.0).round() as usize,
            _ => {}
        }
    }
}
