//! Output side of glint.
//!
//! This crate provides:
//!
//! - **Device contract**: [`LedDevice`], fed `[3][N]` frames in `[0, 255]`
//! - **Reference devices**: [`NullDevice`] and [`VirtualDevice`]
//! - **Shared frames**: [`SharedFrame`], a fixed-size file block through which
//!   a worker hands each rendered frame to its device writer
//!
//! ## Quick Start
//!
//! ```rust
//! use glint_core::{OutputSize, PixelBuffer};
//! use glint_io::{LedDevice, VirtualDevice};
//!
//! let mut device = VirtualDevice::new(4, 1);
//! let preview = device.handle();
//! device.set_brightness(0.5);
//! device.show(&PixelBuffer::filled(OutputSize::new(4, 1), [200.0; 3])).unwrap();
//! assert_eq!(preview.latest().unwrap().pixel(0), Some([100.0; 3]));
//! ```

mod device;
mod shared_frame;

pub use device::{LedDevice, NullDevice, VirtualDevice, VirtualHandle, apply_brightness};
pub use shared_frame::{HEADER_LEN, SharedFrame};

/// Error types for output operations.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// A frame whose size does not match the device or block.
    #[error("frame has {got} pixels, expected {expected}")]
    FrameSize {
        /// Pixel count of the device or block.
        expected: usize,
        /// Pixel count of the offered frame.
        got: usize,
    },

    /// A shared block laid out differently from the device it feeds.
    #[error("frame block is {got}, device is {expected}")]
    Layout {
        /// Size of the device.
        expected: glint_core::OutputSize,
        /// Size recorded in the block header.
        got: glint_core::OutputSize,
    },

    /// The shared block was being rewritten on every read attempt.
    #[error("shared frame kept changing while being read")]
    TornFrame,

    /// The shared block header is not a glint frame header.
    #[error("invalid shared frame header: {0}")]
    BadHeader(String),

    /// The device is gone.
    #[error("device disconnected: {0}")]
    Disconnected(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for output operations.
pub type Result<T> = std::result::Result<T, DeviceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_display() {
        let err = DeviceError::FrameSize { expected: 300, got: 150 };
        assert_eq!(err.to_string(), "frame has 150 pixels, expected 300");
    }

    #[test]
    fn test_layout_display() {
        let err = DeviceError::Layout {
            expected: glint_core::OutputSize::new(6, 1),
            got: glint_core::OutputSize::new(6, 2),
        };
        assert_eq!(err.to_string(), "frame block is 6px x 2 rows, device is 6px x 1 rows");
    }

    #[test]
    fn test_io_from() {
        let err = DeviceError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(matches!(err, DeviceError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
