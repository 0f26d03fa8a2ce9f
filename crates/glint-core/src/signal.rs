//! Per-channel signal payloads and the per-frame context.
//!
//! A node's input and output slots hold a [`SignalSlot`]: either "no signal"
//! (`None`) or a shared reference to this frame's value. Propagating a
//! connection clones the `Arc`, never the payload.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Upper bound of a pixel channel value.
pub const MAX_CHANNEL_VALUE: f32 = 255.0;

/// Opaque payload carried on one channel of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Row-major `[3][N]` color frame.
    Pixels(PixelBuffer),
    /// Mono audio chunk.
    Audio(AudioBuffer),
    /// Single RGB color.
    Color([f32; 3]),
}

impl Signal {
    /// Returns the pixel buffer if this signal carries one.
    pub fn as_pixels(&self) -> Option<&PixelBuffer> {
        match self {
            Signal::Pixels(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the audio buffer if this signal carries one.
    pub fn as_audio(&self) -> Option<&AudioBuffer> {
        match self {
            Signal::Audio(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the color if this signal carries one.
    pub fn as_color(&self) -> Option<[f32; 3]> {
        match self {
            Signal::Color(c) => Some(*c),
            _ => None,
        }
    }
}

/// Content of one input or output slot. `None` means "no signal".
pub type SignalSlot = Option<Arc<Signal>>;

/// Required output size of a node: pixel columns and rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputSize {
    /// Number of pixels (columns of the `[3][N]` buffer).
    pub pixels: usize,
    /// Number of rows the pixels are laid out in.
    pub rows: usize,
}

impl OutputSize {
    /// Creates a new size.
    pub const fn new(pixels: usize, rows: usize) -> Self {
        Self { pixels, rows }
    }
}

impl core::fmt::Display for OutputSize {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}px x {} rows", self.pixels, self.rows)
    }
}

/// A `[3][N]` frame of RGB values in `[0, 255]`.
///
/// Channel 0 is red, 1 green, 2 blue. Each channel vector has one entry per
/// pixel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelBuffer {
    channels: [Vec<f32>; 3],
    rows: usize,
}

impl PixelBuffer {
    /// Creates a black buffer of the given size.
    pub fn new(size: OutputSize) -> Self {
        Self {
            channels: [
                vec![0.0; size.pixels],
                vec![0.0; size.pixels],
                vec![0.0; size.pixels],
            ],
            rows: size.rows.max(1),
        }
    }

    /// Creates a buffer with every pixel set to `rgb` (clamped to `[0, 255]`).
    pub fn filled(size: OutputSize, rgb: [f32; 3]) -> Self {
        let mut buf = Self::new(size);
        for (channel, value) in buf.channels.iter_mut().zip(rgb) {
            channel.fill(value.clamp(0.0, MAX_CHANNEL_VALUE));
        }
        buf
    }

    /// Builds a buffer from three equally long channel vectors.
    ///
    /// Returns `None` if the channel lengths differ.
    pub fn from_channels(channels: [Vec<f32>; 3], rows: usize) -> Option<Self> {
        let n = channels[0].len();
        if channels.iter().any(|c| c.len() != n) {
            return None;
        }
        Some(Self {
            channels,
            rows: rows.max(1),
        })
    }

    /// Number of pixels (N).
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    /// True if the buffer has no pixels.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Size of this buffer.
    pub fn size(&self) -> OutputSize {
        OutputSize::new(self.len(), self.rows)
    }

    /// One color channel (0 = red, 1 = green, 2 = blue).
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index.min(2)]
    }

    /// Mutable access to one color channel.
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index.min(2)]
    }

    /// All three channels.
    pub fn channels(&self) -> &[Vec<f32>; 3] {
        &self.channels
    }

    /// RGB triple at `index`, or `None` when out of range.
    pub fn pixel(&self, index: usize) -> Option<[f32; 3]> {
        if index >= self.len() {
            return None;
        }
        Some([
            self.channels[0][index],
            self.channels[1][index],
            self.channels[2][index],
        ])
    }

    /// Sets the RGB triple at `index`. Out-of-range indices are ignored.
    pub fn set_pixel(&mut self, index: usize, rgb: [f32; 3]) {
        if index < self.len() {
            for (channel, value) in self.channels.iter_mut().zip(rgb) {
                channel[index] = value.clamp(0.0, MAX_CHANNEL_VALUE);
            }
        }
    }

    /// Multiplies every value by `factor`, clamping to `[0, 255]`.
    pub fn scale(&mut self, factor: f32) {
        for channel in &mut self.channels {
            for v in channel.iter_mut() {
                *v = (*v * factor).clamp(0.0, MAX_CHANNEL_VALUE);
            }
        }
    }

    /// Returns a copy scaled by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        let mut out = self.clone();
        out.scale(factor);
        out
    }

    /// Appends the pixels of `other` after this buffer's pixels.
    pub fn extend_from(&mut self, other: &PixelBuffer) {
        for (dst, src) in self.channels.iter_mut().zip(other.channels.iter()) {
            dst.extend_from_slice(src);
        }
    }

    /// Resizes to `pixels`, padding with black or truncating.
    pub fn resize(&mut self, pixels: usize) {
        for channel in &mut self.channels {
            channel.resize(pixels, 0.0);
        }
    }
}

/// A snapshot of captured audio handed to effects through [`FrameContext`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioBuffer {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Mono samples in `[-1, 1]`.
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    /// Creates a buffer from samples.
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    /// Root-mean-square level of the snapshot.
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.samples.iter().map(|s| s * s).sum();
        (sum / self.samples.len() as f32).sqrt()
    }
}

/// Global automatic gain settings shared by audio-reactive effects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Autogain {
    /// Whether audio-reactive effects normalize their input level.
    pub enabled: bool,
    /// Upper bound of the applied gain.
    pub max_gain: f32,
}

impl Default for Autogain {
    fn default() -> Self {
        Self {
            enabled: false,
            max_gain: 10.0,
        }
    }
}

/// Everything one frame needs besides the graph itself.
///
/// Passed by value into every worker tick instead of a process-wide audio
/// global.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameContext {
    /// Seconds since the previous frame.
    pub dt: f32,
    /// Seconds since the orchestrator started.
    pub time: f64,
    /// Latest audio snapshot, if audio capture is running.
    #[serde(default)]
    pub audio: Option<AudioBuffer>,
    /// Global autogain configuration.
    #[serde(default)]
    pub autogain: Autogain,
}

impl FrameContext {
    /// Context with only a time step.
    pub fn with_dt(dt: f32) -> Self {
        Self {
            dt,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filled_clamps() {
        let buf = PixelBuffer::filled(OutputSize::new(4, 1), [300.0, -5.0, 10.0]);
        assert_eq!(buf.pixel(3), Some([255.0, 0.0, 10.0]));
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_extend_from_appends_pixels() {
        let mut a = PixelBuffer::filled(OutputSize::new(2, 1), [1.0, 2.0, 3.0]);
        let b = PixelBuffer::filled(OutputSize::new(3, 1), [4.0, 5.0, 6.0]);
        a.extend_from(&b);
        assert_eq!(a.len(), 5);
        assert_eq!(a.pixel(1), Some([1.0, 2.0, 3.0]));
        assert_eq!(a.pixel(2), Some([4.0, 5.0, 6.0]));
    }

    #[test]
    fn test_from_channels_rejects_ragged() {
        let ragged = [vec![0.0; 3], vec![0.0; 2], vec![0.0; 3]];
        assert!(PixelBuffer::from_channels(ragged, 1).is_none());
    }

    #[test]
    fn test_scale() {
        let buf = PixelBuffer::filled(OutputSize::new(1, 1), [200.0, 100.0, 0.0]);
        assert_eq!(buf.scaled(0.5).pixel(0), Some([100.0, 50.0, 0.0]));
        assert_eq!(buf.scaled(2.0).pixel(0), Some([255.0, 200.0, 0.0]));
    }

    #[test]
    fn test_rms() {
        let audio = AudioBuffer::new(44100, vec![1.0, -1.0, 1.0, -1.0]);
        assert!((audio.rms() - 1.0).abs() < 1e-6);
        assert_eq!(AudioBuffer::default().rms(), 0.0);
    }
}
