//! Externally driven modulation source.

use glint_core::{ModulationSource, ParamDescriptor, ParameterInfo};

/// Live controllers an [`ExternalLinearController`] can listen to.
pub const CONTROLLERS: &[&str] = &["modulation", "brightness", "speed", "hue"];

/// Emits `amount × controller value`.
///
/// The controller value arrives from outside the graph (a knob, a fader, a
/// remote) through
/// [`FilterGraph::set_controller_value`](glint_core::FilterGraph::set_controller_value)
/// and starts at 1.0, so an untouched controller emits `amount`.
#[derive(Debug, Clone)]
pub struct ExternalLinearController {
    amount: f32,
    controller: usize,
    input: f32,
}

impl Default for ExternalLinearController {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl ExternalLinearController {
    /// Create a controller source scaled by `amount` (0-1).
    pub fn new(amount: f32) -> Self {
        Self {
            amount: amount.clamp(0.0, 1.0),
            controller: 0,
            input: 1.0,
        }
    }

    /// Listen to the controller called `name`. Unknown names are ignored.
    pub fn with_controller(mut self, name: &str) -> Self {
        if let Some(i) = CONTROLLERS.iter().position(|c| *c == name) {
            self.controller = i;
        }
        self
    }
}

impl ModulationSource for ExternalLinearController {
    fn kind(&self) -> &'static str {
        "external_linear_controller"
    }

    fn update(&mut self, _dt: f32) {}

    fn value(&self) -> f32 {
        self.amount * self.input
    }

    fn controller(&self) -> Option<&str> {
        CONTROLLERS.get(self.controller).copied()
    }

    fn set_controller_value(&mut self, value: f32) {
        self.input = value;
    }
}

impl ParameterInfo for ExternalLinearController {
    fn param_count(&self) -> usize {
        2
    }

    fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
        match index {
            0 => Some(
                ParamDescriptor::continuous("amount", 1.0, 0.0, 1.0, 0.001)
                    .with_help("Global scale of the controller."),
            ),
            1 => Some(
                ParamDescriptor::choice("controller", CONTROLLERS, 0)
                    .with_help("Live controller this source follows."),
            ),
            _ => None,
        }
    }

    fn get_param(&self, index: usize) -> f32 {
        match index {
            0 => self.amount,
            1 => self.controller as f32,
            _ => 0.0,
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            0 => self.amount = value.clamp(0.0, 1.0),
            1 => self.controller = (value.max(0.0).round() as usize).min(CONTROLLERS.len() - 1),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_scales_controller_input() {
        let mut c = ExternalLinearController::new(0.5).with_controller("speed");
        assert_eq!(c.controller(), Some("speed"));
        assert_eq!(c.value(), 0.5);
        c.set_controller_value(0.2);
        assert!((c.value() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_controller_param_selects_name() {
        let mut c = ExternalLinearController::default();
        c.set_param(1, 1.0);
        assert_eq!(c.controller(), Some("brightness"));
        c.set_param(1, 99.0);
        assert_eq!(c.controller(), Some("hue"));
    }
}
