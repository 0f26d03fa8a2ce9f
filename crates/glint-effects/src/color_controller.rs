//! Color target source for color-channel modulations.

use glint_core::{ColorTarget, ModulationSource, ParamDescriptor, ParameterInfo};

/// Pulls color parameters towards `(r, g, b)` with strength `activation`.
///
/// Its scalar value is the activation, so it can also drive ordinary
/// parameter modulations.
#[derive(Debug, Clone)]
pub struct ColorController {
    rgb: [f32; 3],
    activation: f32,
}

impl Default for ColorController {
    fn default() -> Self {
        Self::new([255.0, 255.0, 255.0], 1.0)
    }
}

impl ColorController {
    /// Create a controller for `rgb` (each 0-255) at `activation` (0-1).
    pub fn new(rgb: [f32; 3], activation: f32) -> Self {
        Self {
            rgb: rgb.map(|c| c.clamp(0.0, 255.0)),
            activation: activation.clamp(0.0, 1.0),
        }
    }
}

impl ModulationSource for ColorController {
    fn kind(&self) -> &'static str {
        "color_controller"
    }

    fn update(&mut self, _dt: f32) {}

    fn value(&self) -> f32 {
        self.activation
    }

    fn color_target(&self) -> Option<ColorTarget> {
        Some(ColorTarget {
            rgb: self.rgb,
            activation: self.activation,
        })
    }
}

impl ParameterInfo for ColorController {
    fn param_count(&self) -> usize {
        4
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(ParamDescriptor::color_channel("r", 255.0)),
            1 => Some(ParamDescriptor::color_channel("g", 255.0)),
            2 => Some(ParamDescriptor::color_channel("b", 255.0)),
            3 => Some(
                ParamDescriptor::continuous("activation", 1.0, 0.0, 1.0, 0.01)
                    .with_help("How strongly targets are pulled towards the color."),
            ),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0..=2 => self.rgb[index],
            3 => self.activation,
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0..=2 => self.rgb[index] = value.clamp(0.0, 255.0),
            3 => self.activation = value.clamp(0.0, 1.0),
            _ => {}
        }
    }
}
