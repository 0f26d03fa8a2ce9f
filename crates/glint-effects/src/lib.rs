//! Glint Effects - built-in LED effects and modulation sources
//!
//! This crate provides the effects every installation needs, built on glint-core:
//!
//! - [`AudioInput`] - Publishes the frame's audio snapshot as a signal
//! - [`VuMeter`] - RMS level bar from an audio signal
//! - [`StaticColor`] - Solid RGB frame
//! - [`Append`] - Concatenates N inputs along the strip
//! - [`Combine`] - Blends two frames (add, max, multiply)
//! - [`Dim`] - Scales brightness of a frame
//! - [`LedOutput`] - The output sink
//!
//! Modulation sources:
//!
//! - [`ExternalLinearController`] - Scales a live controller value
//! - [`SineLfo`] - Sine oscillator
//! - [`ColorController`] - Color target with activation
//!
//! ## Example
//!
//! ```rust,ignore
//! use glint_core::FilterGraph;
//! use glint_effects::{LedOutput, StaticColor};
//!
//! let mut graph = FilterGraph::new();
//! let color = graph.add_node(Box::new(StaticColor::new(255.0, 0.0, 0.0)))?;
//! let out = graph.add_node(Box::new(LedOutput::new()))?;
//! graph.add_connection(color, 0, out, 0)?;
//! ```

pub mod append;
pub mod audio_input;
pub mod color_controller;
pub mod combine;
pub mod controller;
pub mod dim;
pub mod led_output;
pub mod sine_lfo;
pub mod static_color;
pub mod vu_meter;

// Re-export main types at crate root
pub use append::{Append, MAX_APPEND_CHANNELS};
pub use audio_input::AudioInput;
pub use color_controller::ColorController;
pub use combine::{BlendMode, Combine};
pub use controller::{CONTROLLERS, ExternalLinearController};
pub use dim::Dim;
pub use led_output::LedOutput;
pub use sine_lfo::SineLfo;
pub use static_color::StaticColor;
pub use vu_meter::VuMeter;
