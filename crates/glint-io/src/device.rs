//! Output device contract and the reference devices.

use std::sync::Arc;

use glint_core::PixelBuffer;
use parking_lot::Mutex;

use crate::{DeviceError, Result};

/// A physical or virtual LED output.
///
/// Frames are `[3][N]` buffers with values in `[0, 255]`. Brightness is
/// applied multiplicatively before the frame reaches the hardware.
pub trait LedDevice: Send {
    /// Output one frame.
    fn show(&mut self, frame: &PixelBuffer) -> Result<()>;

    /// Number of pixels.
    fn num_pixels(&self) -> usize;

    /// Number of rows the pixels are laid out in.
    fn num_rows(&self) -> usize;

    /// Current brightness factor.
    fn brightness(&self) -> f32;

    /// Sets the brightness factor, clamped to `[0, 1]`.
    fn set_brightness(&mut self, brightness: f32);
}

/// `frame` scaled by `brightness`, or `frame` itself when brightness is 1.
pub fn apply_brightness(frame: &PixelBuffer, brightness: f32) -> std::borrow::Cow<'_, PixelBuffer> {
    if brightness >= 1.0 {
        std::borrow::Cow::Borrowed(frame)
    } else {
        std::borrow::Cow::Owned(frame.scaled(brightness.max(0.0)))
    }
}

fn check_size(expected: usize, frame: &PixelBuffer) -> Result<()> {
    if frame.len() == expected {
        Ok(())
    } else {
        Err(DeviceError::FrameSize {
            expected,
            got: frame.len(),
        })
    }
}

/// Discards every frame. Counts how many it was given.
#[derive(Debug)]
pub struct NullDevice {
    num_pixels: usize,
    num_rows: usize,
    brightness: f32,
    frames: u64,
}

impl NullDevice {
    /// A device of the given size.
    pub fn new(num_pixels: usize, num_rows: usize) -> Self {
        Self {
            num_pixels,
            num_rows: num_rows.max(1),
            brightness: 1.0,
            frames: 0,
        }
    }

    /// Frames shown so far.
    pub fn frames_shown(&self) -> u64 {
        self.frames
    }
}

impl LedDevice for NullDevice {
    fn show(&mut self, frame: &PixelBuffer) -> Result<()> {
        check_size(self.num_pixels, frame)?;
        self.frames += 1;
        Ok(())
    }

    fn num_pixels(&self) -> usize {
        self.num_pixels
    }

    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn brightness(&self) -> f32 {
        self.brightness
    }

    fn set_brightness(&mut self, brightness: f32) {
        self.brightness = brightness.clamp(0.0, 1.0);
    }
}

#[derive(Debug, Default)]
struct VirtualState {
    latest: Option<PixelBuffer>,
    frames: u64,
}

/// Keeps the most recent frame (after brightness) in memory.
#[derive(Debug)]
pub struct VirtualDevice {
    num_pixels: usize,
    num_rows: usize,
    brightness: f32,
    state: Arc<Mutex<VirtualState>>,
}

/// Read side of a [`VirtualDevice`], usable from another thread.
#[derive(Debug, Clone)]
pub struct VirtualHandle {
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualDevice {
    /// A device of the given size.
    pub fn new(num_pixels: usize, num_rows: usize) -> Self {
        Self {
            num_pixels,
            num_rows: num_rows.max(1),
            brightness: 1.0,
            state: Arc::default(),
        }
    }

    /// Handle for reading shown frames.
    pub fn handle(&self) -> VirtualHandle {
        VirtualHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl VirtualHandle {
    /// Last shown frame.
    pub fn latest(&self) -> Option<PixelBuffer> {
        self.state.lock().latest.clone()
    }

    /// Frames shown so far.
    pub fn frames_shown(&self) -> u64 {
        self.state.lock().frames
    }
}

impl LedDevice for VirtualDevice {
    fn show(&mut self, frame: &PixelBuffer) -> Result<()> {
        check_size(self.num_pixels, frame)?;
        let shown = apply_brightness(frame, self.brightness).into_owned();
        let mut state = self.state.lock();
        state.latest = Some(shown);
        state.frames += 1;
        Ok(())
    }

    fn num_pixels(&self) -> usize {
        self.num_pixels
    }

    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn brightness(&self) -> f32 {
        self.brightness
    }

    fn set_brightness(&mut self, brightness: f32) {
        self.brightness = brightness.clamp(0.0, 1.0);
    }
}
