//! Audio source: exposes the frame's audio snapshot as a signal.
//!
//! Capture itself happens outside the graph; the orchestrator hands the
//! latest chunk to every worker inside the [`FrameContext`].

use std::sync::Arc;

use glint_core::{
    AudioBuffer, Effect, EffectError, FrameContext, OutputSize, ParamDescriptor, ParameterInfo,
    Signal, SignalSlot,
};

/// Publishes `ctx.audio` on output 0, optionally with automatic gain.
///
/// With autogain enabled in the frame context the gain slowly rises towards
/// `max_gain` (reaching it after about `autogain_time` seconds of quiet input)
/// and drops immediately when the amplified peak would exceed 1.0.
#[derive(Debug, Clone)]
pub struct AudioInput {
    autogain_time: f32,
    gain: f32,
    chunk: Option<AudioBuffer>,
}

impl Default for AudioInput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioInput {
    /// Create an audio input with unity gain.
    pub fn new() -> Self {
        Self {
            autogain_time: 10.0,
            gain: 1.0,
            chunk: None,
        }
    }

    /// Gain applied to the last chunk.
    pub fn gain(&self) -> f32 {
        self.gain
    }

    fn adapt_gain(&mut self, peak: f32, dt: f32, max_gain: f32) {
        let max_gain = max_gain.max(1.0);
        if peak * self.gain > 1.0 {
            self.gain = (1.0 / peak).max(1.0 / max_gain);
            return;
        }
        let steps = (self.autogain_time / dt.max(1e-3)).max(1.0);
        let rate = max_gain.powf(1.0 / steps);
        self.gain = (self.gain * rate).min(max_gain);
    }
}

impl Effect for AudioInput {
    fn kind(&self) -> &'static str {
        "audio_input"
    }

    fn num_input_channels(&self) -> usize {
        0
    }

    fn num_output_channels(&self) -> usize {
        1
    }

    fn update(&mut self, ctx: &FrameContext) -> Result<(), EffectError> {
        let Some(audio) = ctx.audio.as_ref() else {
            self.chunk = None;
            return Ok(());
        };
        if !ctx.autogain.enabled {
            self.gain = 1.0;
            self.chunk = Some(audio.clone());
            return Ok(());
        }

        let peak = audio.samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        self.adapt_gain(peak, ctx.dt, ctx.autogain.max_gain);
        let gain = self.gain;
        self.chunk = Some(AudioBuffer::new(
            audio.sample_rate,
            audio.samples.iter().map(|s| s * gain).collect(),
        ));
        Ok(())
    }

    fn process(
        &mut self,
        _inputs: &[SignalSlot],
        outputs: &mut [SignalSlot],
        _size: OutputSize,
    ) -> Result<(), EffectError> {
        outputs[0] = self.chunk.take().map(|a| Arc::new(Signal::Audio(a)));
        Ok(())
    }
}

impl ParameterInfo for AudioInput {
    fn param_count(&self) -> usize {
        1
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        (index == 0).then(|| {
            ParamDescriptor::continuous("autogain_time", 10.0, 1.0, 60.0, 0.1)
                .with_help("Seconds for the autogain to reach its maximum.")
        })
    }

    fn get_param(&self, index: usize) -> f32 {
        if index == 0 { self.autogain_time } else { 0.0 }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        if index == 0 {
            self.autogain_time = value.clamp(1.0, 60.0);
        }
    }
}
