//! Effect registry and factory for glint.
//!
//! This crate provides a centralized registry for discovering and instantiating
//! effects and modulation sources by kind. It is how a worker process turns an
//! [`EffectState`] received over the wire back into a live effect, and how
//! configs and the CLI find parameter metadata.
//!
//! # Features
//!
//! - **Discovery**: List all available effects and sources with metadata
//! - **Factory Pattern**: Create effects and sources by kind at runtime
//! - **State Rebuild**: [`build()`](EffectRegistry::build) applies a saved
//!   parameter map by name
//! - **Category System**: Effects organized by role (input, generator, ...)
//!
//! # Example
//!
//! ```rust
//! use glint_core::Effect;
//! use glint_registry::{EffectCategory, EffectRegistry};
//!
//! let registry = EffectRegistry::new();
//!
//! for effect in registry.all_effects() {
//!     println!("{}: {}", effect.id, effect.description);
//! }
//!
//! let color = registry.create("static_color").unwrap();
//! assert_eq!(color.num_output_channels(), 1);
//!
//! assert_eq!(registry.effects_in_category(EffectCategory::Output).len(), 1);
//! ```

use glint_core::{Effect, EffectState, ModulationSource, ParameterInfo};
use glint_effects::{
    Append, AudioInput, ColorController, Combine, Dim, ExternalLinearController, LedOutput,
    SineLfo, StaticColor, VuMeter,
};
use thiserror::Error;

/// Errors raised when rebuilding effects from saved state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No effect is registered under this kind.
    #[error("unknown effect kind '{0}'")]
    UnknownEffect(String),

    /// No modulation source is registered under this kind.
    #[error("unknown modulation source kind '{0}'")]
    UnknownSource(String),
}

/// Role of an effect, for organization and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectCategory {
    /// Signals entering the graph from outside (audio).
    Input,
    /// Effects producing pixels from nothing or from non-pixel signals.
    Generator,
    /// Effects merging or arranging several frames.
    Composition,
    /// Effects altering colors of one frame.
    Color,
    /// The output sink.
    Output,
    /// Modulation sources.
    Modulation,
}

impl EffectCategory {
    /// Returns a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            EffectCategory::Input => "Input",
            EffectCategory::Generator => "Generator",
            EffectCategory::Composition => "Composition",
            EffectCategory::Color => "Color",
            EffectCategory::Output => "Output",
            EffectCategory::Modulation => "Modulation",
        }
    }
}

/// Describes an effect or modulation source in the registry.
#[derive(Debug, Clone)]
pub struct EffectDescriptor {
    /// Unique kind identifier (lowercase, no spaces).
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description.
    pub description: &'static str,
    /// Category for organization.
    pub category: EffectCategory,
    /// Number of parameters.
    pub param_count: usize,
    /// Whether the input count is chosen at creation.
    pub variable_arity: bool,
}

/// Factory for effects. The argument is the requested input count for
/// variable-arity effects and ignored by the rest.
pub type EffectFactory = fn(Option<usize>) -> Box<dyn Effect>;

/// Factory for modulation sources.
pub type SourceFactory = fn() -> Box<dyn ModulationSource>;

struct RegistryEntry {
    descriptor: EffectDescriptor,
    factory: EffectFactory,
}

struct SourceEntry {
    descriptor: EffectDescriptor,
    factory: SourceFactory,
}

/// Registry of all available effects and modulation sources.
///
/// All built-ins are registered by [`new()`](Self::new). Applications may add
/// their own with [`register()`](Self::register) and
/// [`register_source()`](Self::register_source).
pub struct EffectRegistry {
    entries: Vec<RegistryEntry>,
    sources: Vec<SourceEntry>,
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectRegistry {
    /// Create a new registry with all built-in effects and sources registered.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(7),
            sources: Vec::with_capacity(3),
        };
        registry.register_builtin_effects();
        registry.register_builtin_sources();
        registry
    }

    fn register_builtin_effects(&mut self) {
        self.register(
            EffectDescriptor {
                id: "audio_input",
                name: "Audio Input",
                description: "Publishes the captured audio chunk, with optional autogain",
                category: EffectCategory::Input,
                param_count: 1,
                variable_arity: false,
            },
            |_| Box::new(AudioInput::new()),
        );

        self.register(
            EffectDescriptor {
                id: "vu_meter",
                name: "VU Meter",
                description: "Level bar following the RMS of an audio signal",
                category: EffectCategory::Generator,
                param_count: 2,
                variable_arity: false,
            },
            |_| Box::new(VuMeter::new()),
        );

        self.register(
            EffectDescriptor {
                id: "static_color",
                name: "Static Color",
                description: "Outputs a static color",
                category: EffectCategory::Generator,
                param_count: 3,
                variable_arity: false,
            },
            |_| Box::new(StaticColor::default()),
        );

        self.register(
            EffectDescriptor {
                id: "append",
                name: "Append",
                description: "Concatenates several inputs into one strip",
                category: EffectCategory::Composition,
                param_count: 8,
                variable_arity: true,
            },
            |channels| Box::new(Append::new(channels.unwrap_or(2))),
        );

        self.register(
            EffectDescriptor {
                id: "combine",
                name: "Combine",
                description: "Blends two inputs (add, max, multiply)",
                category: EffectCategory::Composition,
                param_count: 1,
                variable_arity: false,
            },
            |_| Box::new(Combine::default()),
        );

        self.register(
            EffectDescriptor {
                id: "dim",
                name: "Dim",
                description: "Scales the brightness of a frame",
                category: EffectCategory::Color,
                param_count: 1,
                variable_arity: false,
            },
            |_| Box::new(Dim::default()),
        );

        self.register(
            EffectDescriptor {
                id: "led_output",
                name: "LED Output",
                description: "Sends pixels to the LED device",
                category: EffectCategory::Output,
                param_count: 1,
                variable_arity: false,
            },
            |_| Box::new(LedOutput::new()),
        );
    }

    fn register_builtin_sources(&mut self) {
        self.register_source(
            EffectDescriptor {
                id: "external_linear_controller",
                name: "External Controller",
                description: "Scales a live controller value",
                category: EffectCategory::Modulation,
                param_count: 2,
                variable_arity: false,
            },
            || Box::new(ExternalLinearController::default()),
        );

        self.register_source(
            EffectDescriptor {
                id: "sine_lfo",
                name: "Sine LFO",
                description: "Sine oscillator with depth and frequency",
                category: EffectCategory::Modulation,
                param_count: 2,
                variable_arity: false,
            },
            || Box::new(SineLfo::default()),
        );

        self.register_source(
            EffectDescriptor {
                id: "color_controller",
                name: "Color Controller",
                description: "Pulls color parameters towards a target color",
                category: EffectCategory::Modulation,
                param_count: 4,
                variable_arity: false,
            },
            || Box::new(ColorController::default()),
        );
    }

    /// Register an effect. Registering an existing id replaces its factory.
    pub fn register(&mut self, descriptor: EffectDescriptor, factory: EffectFactory) {
        let entry = RegistryEntry {
            descriptor,
            factory,
        };
        match self.entries.iter().position(|e| e.descriptor.id == entry.descriptor.id) {
            Some(i) => self.entries[i] = entry,
            None => self.entries.push(entry),
        }
    }

    /// Register a modulation source. Registering an existing id replaces its factory.
    pub fn register_source(&mut self, descriptor: EffectDescriptor, factory: SourceFactory) {
        let entry = SourceEntry {
            descriptor,
            factory,
        };
        match self.sources.iter().position(|e| e.descriptor.id == entry.descriptor.id) {
            Some(i) => self.sources[i] = entry,
            None => self.sources.push(entry),
        }
    }

    /// Returns descriptors for all registered effects.
    pub fn all_effects(&self) -> Vec<&EffectDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Returns descriptors for all registered modulation sources.
    pub fn all_sources(&self) -> Vec<&EffectDescriptor> {
        self.sources.iter().map(|e| &e.descriptor).collect()
    }

    /// Returns descriptors for effects in a specific category.
    pub fn effects_in_category(&self, category: EffectCategory) -> Vec<&EffectDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.category == category)
            .map(|e| &e.descriptor)
            .collect()
    }

    /// Get an effect descriptor by kind.
    pub fn get(&self, id: &str) -> Option<&EffectDescriptor> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| &e.descriptor)
    }

    /// Get a modulation source descriptor by kind.
    pub fn get_source(&self, id: &str) -> Option<&EffectDescriptor> {
        self.sources
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| &e.descriptor)
    }

    /// Create an effect with default parameters.
    pub fn create(&self, id: &str) -> Option<Box<dyn Effect>> {
        self.create_with_channels(id, None)
    }

    /// Create an effect, passing `channels` to variable-arity factories.
    pub fn create_with_channels(&self, id: &str, channels: Option<usize>) -> Option<Box<dyn Effect>> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| (e.factory)(channels))
    }

    /// Create a modulation source with default parameters.
    pub fn create_source(&self, id: &str) -> Option<Box<dyn ModulationSource>> {
        self.sources
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| (e.factory)())
    }

    /// Rebuild an effect from a snapshot.
    ///
    /// Parameters are matched by name and clamped to their range. Unknown
    /// names are skipped with a warning; missing ones keep their defaults.
    pub fn build(&self, state: &EffectState) -> Result<Box<dyn Effect>, RegistryError> {
        let mut effect = self
            .create_with_channels(&state.kind, state.channels)
            .ok_or_else(|| RegistryError::UnknownEffect(state.kind.clone()))?;
        apply_params(effect.as_mut(), state);
        Ok(effect)
    }

    /// Rebuild a modulation source from a snapshot.
    pub fn build_source(&self, state: &EffectState) -> Result<Box<dyn ModulationSource>, RegistryError> {
        let mut source = self
            .create_source(&state.kind)
            .ok_or_else(|| RegistryError::UnknownSource(state.kind.clone()))?;
        apply_params(source.as_mut(), state);
        Ok(source)
    }

    /// Find a parameter index by name for a given effect or source kind.
    ///
    /// Creates a temporary instance to scan parameter descriptors.
    pub fn param_index_by_name(&self, kind: &str, param_name: &str) -> Option<usize> {
        if let Some(effect) = self.create(kind) {
            return effect.find_param_by_name(param_name);
        }
        self.create_source(kind)?.find_param_by_name(param_name)
    }

    /// Returns the number of registered effects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no effects are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn apply_params<P: ParameterInfo + ?Sized>(target: &mut P, state: &EffectState) {
    for (name, &value) in &state.params {
        let Some(index) = target.find_param_by_name(name) else {
            tracing::warn!(kind = %state.kind, param = %name, "ignoring unknown parameter");
            continue;
        };
        let clamped = target.param_info(index).map_or(value, |d| d.clamp(value));
        target.set_param(index, clamped);
    }
}
