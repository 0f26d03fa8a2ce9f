//! Sine low-frequency oscillator.

use std::f64::consts::TAU;

use glint_core::{ModulationSource, ParamDescriptor, ParameterInfo};

/// Emits `depth · sin(2π · freq_hz · t)` where `t` accumulates frame time.
#[derive(Debug, Clone)]
pub struct SineLfo {
    depth: f32,
    freq_hz: f32,
    t: f64,
}

impl Default for SineLfo {
    fn default() -> Self {
        Self::new(1.0, 0.01)
    }
}

impl SineLfo {
    /// Create an LFO with the given depth (0-1) and frequency (0-60 Hz).
    pub fn new(depth: f32, freq_hz: f32) -> Self {
        Self {
            depth: depth.clamp(0.0, 1.0),
            freq_hz: freq_hz.clamp(0.0, 60.0),
            t: 0.0,
        }
    }

    /// Seconds accumulated so far.
    pub fn time(&self) -> f64 {
        self.t
    }
}

impl ModulationSource for SineLfo {
    fn kind(&self) -> &'static str {
        "sine_lfo"
    }

    fn update(&mut self, dt: f32) {
        self.t += f64::from(dt);
    }

    fn value(&self) -> f32 {
        self.depth * (TAU * f64::from(self.freq_hz) * self.t).sin() as f32
    }
}

impl ParameterInfo for SineLfo {
    fn param_count(&self) -> usize {
        2
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(
                ParamDescriptor::continuous("depth", 1.0, 0.0, 1.0, 0.001)
                    .with_help("Depth of the LFO."),
            ),
            1 => Some(
                ParamDescriptor::continuous("freq_hz", 0.01, 0.0, 60.0, 0.01)
                    .with_help("LFO frequency in Hz."),
            ),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.depth,
            1 => self.freq_hz,
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.depth = value.clamp(0.0, 1.0),
            1 => self.freq_hz = value.clamp(0.0, 60.0),
            _ => {}
        }
    }
}
