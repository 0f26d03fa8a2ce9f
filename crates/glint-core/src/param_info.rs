//! Parameter introspection for effects and modulation sources.
//!
//! Every effect exposes an explicit table of parameters through
//! [`ParameterInfo`]. Each entry is a [`ParamDescriptor`] that is either
//! continuous (`default`, `min`, `max`, `step`) or a discrete choice list.
//! UIs, validation and the modulation layer read this table; nothing inspects
//! constructor signatures at runtime.
//!
//! # Example
//!
//! ```rust
//! use glint_core::{ParameterInfo, ParamDescriptor};
//!
//! struct Level {
//!     level: f32,
//! }
//!
//! impl ParameterInfo for Level {
//!     fn param_count(&self) -> usize { 1 }
//!
//!     fn param_info(&self, index: usize) -> Option<ParamDescriptor> {
//!         match index {
//!             0 => Some(ParamDescriptor::continuous("level", 1.0, 0.0, 1.0, 0.01)),
//!             _ => None,
//!         }
//!     }
//!
//!     fn get_param(&self, index: usize) -> f32 {
//!         match index {
//!             0 => self.level,
//!             _ => 0.0,
//!         }
//!     }
//!
//!     fn set_param(&mut self, index: usize, value: f32) {
//!         if index == 0 {
//!             self.level = value.clamp(0.0, 1.0);
//!         }
//!     }
//! }
//! ```

/// Shape of a parameter's value space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    /// Continuous numeric value.
    Continuous {
        /// Value used when the effect is created.
        default: f32,
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
        /// UI increment.
        step: f32,
    },
    /// One of a fixed list of options, stored as the option index.
    Choice {
        /// Option labels in index order.
        options: &'static [&'static str],
        /// Default option index.
        default: usize,
    },
}

/// Metadata for one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDescriptor {
    /// Stable parameter name, used in configs and modulations.
    pub name: &'static str,
    /// One-line help text for UIs.
    pub help: &'static str,
    /// Value space.
    pub kind: ParamKind,
}

impl ParamDescriptor {
    /// Continuous parameter.
    pub const fn continuous(name: &'static str, default: f32, min: f32, max: f32, step: f32) -> Self {
        Self {
            name,
            help: "",
            kind: ParamKind::Continuous {
                default,
                min,
                max,
                step,
            },
        }
    }

    /// Discrete choice parameter.
    pub const fn choice(name: &'static str, options: &'static [&'static str], default: usize) -> Self {
        Self {
            name,
            help: "",
            kind: ParamKind::Choice { options, default },
        }
    }

    /// Standard `[0, 255]` color channel.
    pub const fn color_channel(name: &'static str, default: f32) -> Self {
        Self::continuous(name, default, 0.0, 255.0, 1.0)
    }

    /// Sets the help text.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = help;
        self
    }

    /// Default value (choice index as `f32` for choice parameters).
    pub fn default_value(&self) -> f32 {
        match self.kind {
            ParamKind::Continuous { default, .. } => default,
            ParamKind::Choice { default, .. } => default as f32,
        }
    }

    /// Lower bound of the value range.
    pub fn min(&self) -> f32 {
        match self.kind {
            ParamKind::Continuous { min, .. } => min,
            ParamKind::Choice { .. } => 0.0,
        }
    }

    /// Upper bound of the value range.
    pub fn max(&self) -> f32 {
        match self.kind {
            ParamKind::Continuous { max, .. } => max,
            ParamKind::Choice { options, .. } => options.len().saturating_sub(1) as f32,
        }
    }

    /// Clamps `value` into range. Choice values are rounded to an index.
    pub fn clamp(&self, value: f32) -> f32 {
        let clamped = value.clamp(self.min(), self.max());
        match self.kind {
            ParamKind::Continuous { .. } => clamped,
            ParamKind::Choice { .. } => clamped.round(),
        }
    }

    /// Label of a choice value, if this is a choice parameter.
    pub fn choice_label(&self, value: f32) -> Option<&'static str> {
        match self.kind {
            ParamKind::Choice { options, .. } => options.get(self.clamp(value) as usize).copied(),
            ParamKind::Continuous { .. } => None,
        }
    }

    /// Index of a choice label (case-insensitive).
    pub fn choice_index(&self, label: &str) -> Option<usize> {
        match self.kind {
            ParamKind::Choice { options, .. } => {
                options.iter().position(|o| o.eq_ignore_ascii_case(label))
            }
            ParamKind::Continuous { .. } => None,
        }
    }
}

/// Index-based parameter access.
pub trait ParameterInfo {
    /// Number of parameters. Valid indices are `0..param_count()`.
    fn param_count(&self) -> usize;

    /// Descriptor at `index`, or `None` when out of range.
    fn param_info(&self, index: usize) -> Option<ParamDescriptor>;

    /// Current value at `index`. Out-of-range indices read as `0.0`.
    fn get_param(&self, index: usize) -> f32;

    /// Sets the value at `index`. Implementations clamp to the declared range.
    fn set_param(&mut self, index: usize, value: f32);

    /// Finds a parameter index by name (case-insensitive).
    fn find_param_by_name(&self, name: &str) -> Option<usize> {
        (0..self.param_count()).find(|&i| {
            self.param_info(i)
                .is_some_and(|desc| desc.name.eq_ignore_ascii_case(name))
        })
    }

    /// All descriptors in index order.
    fn param_table(&self) -> Vec<ParamDescriptor> {
        (0..self.param_count())
            .filter_map(|i| self.param_info(i))
            .collect()
    }
}
