//! Graph and effect validation against the registry.
//!
//! Validation works on descriptions, before anything is instantiated, and
//! reports every problem it finds rather than stopping at the first one.
//!
//! # Example
//!
//! ```rust
//! use glint_config::{EffectConfig, validate_effect_config};
//! use glint_registry::EffectRegistry;
//!
//! let registry = EffectRegistry::new();
//! validate_effect_config(&registry, &EffectConfig::new("dim").with_param("level", 0.5))
//!     .expect("dim should validate");
//! assert!(validate_effect_config(&registry, &EffectConfig::new("laser")).is_err());
//! ```

use std::collections::{HashMap, HashSet};

use glint_core::{ParamDescriptor, ParameterInfo};
use glint_registry::EffectRegistry;
use thiserror::Error;

use crate::effect_config::EffectConfig;
use crate::graph_description::GraphDescription;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Unknown effect kind.
    #[error("unknown effect kind: {0}")]
    UnknownEffect(String),

    /// Unknown modulation source kind.
    #[error("unknown modulation source kind: {0}")]
    UnknownSource(String),

    /// Unknown parameter name.
    #[error("unknown parameter '{param}' for '{kind}'")]
    UnknownParameter {
        /// Effect or source kind.
        kind: String,
        /// Name of the unrecognized parameter.
        param: String,
    },

    /// Parameter value out of range.
    #[error("parameter '{param}' value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Name of the parameter.
        param: String,
        /// The value that was out of range.
        value: f32,
        /// Minimum allowed value.
        min: f32,
        /// Maximum allowed value.
        max: f32,
    },

    /// Channel index outside the endpoint's arity.
    #[error("{direction} channel {channel} out of range for '{kind}' ({available} available)")]
    InvalidChannel {
        /// Kind of the endpoint node.
        kind: String,
        /// `"input"` or `"output"`.
        direction: &'static str,
        /// Requested channel.
        channel: usize,
        /// Declared channel count.
        available: usize,
    },

    /// A reference to an id that is not in the description.
    #[error("{what} refers to missing id {id}")]
    MissingReference {
        /// What holds the reference.
        what: &'static str,
        /// The missing id.
        id: String,
    },

    /// The same id appears twice.
    #[error("duplicate id {0}")]
    DuplicateId(String),

    /// More than one output sink.
    #[error("graph has {0} output sinks, at most one is allowed")]
    MultipleSinks(usize),

    /// An invalid runtime setting.
    #[error("invalid setting '{field}': {reason}")]
    InvalidSetting {
        /// Setting name.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Collapse a list of errors: `Ok` when empty, the error itself when
    /// there is one, [`ValidationError::Multiple`] otherwise.
    pub fn from_list(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn check_params<P: ParameterInfo + ?Sized>(
    kind: &str,
    params: &P,
    config: &EffectConfig,
    errors: &mut Vec<ValidationError>,
) {
    for (name, &value) in &config.params {
        let Some(desc) = params.find_param_by_name(name).and_then(|i| params.param_info(i)) else {
            errors.push(ValidationError::UnknownParameter {
                kind: kind.to_string(),
                param: name.clone(),
            });
            continue;
        };
        check_range(&desc, value, errors);
    }
}

fn check_range(desc: &ParamDescriptor, value: f32, errors: &mut Vec<ValidationError>) {
    let (min, max) = (desc.min(), desc.max());
    if !value.is_finite() || value < min || value > max {
        errors.push(ValidationError::OutOfRange {
            param: desc.name.to_string(),
            value,
            min,
            max,
        });
    }
}

/// Validate an effect configuration: known kind, known parameter names,
/// values in range.
pub fn validate_effect_config(registry: &EffectRegistry, config: &EffectConfig) -> ValidationResult<()> {
    let effect = registry
        .create_with_channels(&config.kind, config.channels)
        .ok_or_else(|| ValidationError::UnknownEffect(config.kind.clone()))?;
    let mut errors = Vec::new();
    check_params(&config.kind, effect.as_ref(), config, &mut errors);
    ValidationError::from_list(errors)
}

/// Validate a modulation source configuration.
pub fn validate_source_config(registry: &EffectRegistry, config: &EffectConfig) -> ValidationResult<()> {
    let source = registry
        .create_source(&config.kind)
        .ok_or_else(|| ValidationError::UnknownSource(config.kind.clone()))?;
    let mut errors = Vec::new();
    check_params(&config.kind, source.as_ref(), config, &mut errors);
    ValidationError::from_list(errors)
}

/// Validate a whole graph description.
///
/// Checks effect and source configs, unique ids, channel indices against
/// each endpoint's arity, modulation references and target parameter
/// names, and the single-sink rule. Cycles are left to
/// [`GraphDescription::build`].
pub fn validate_graph(registry: &EffectRegistry, graph: &GraphDescription) -> ValidationResult<()> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    let mut sinks = 0;

    // (inputs, outputs, param names) per node; `None` when the kind is unknown.
    let mut arity = HashMap::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.uuid()) {
            errors.push(ValidationError::DuplicateId(node.id.to_string()));
        }
        match registry.create_with_channels(&node.effect.kind, node.effect.channels) {
            Some(effect) => {
                check_params(&node.effect.kind, effect.as_ref(), &node.effect, &mut errors);
                if effect.is_sink() {
                    sinks += 1;
                }
                let names: Vec<&'static str> = effect.param_table().iter().map(|d| d.name).collect();
                arity.insert(
                    node.id,
                    Some((effect.num_input_channels(), effect.num_output_channels(), names)),
                );
            }
            None => {
                errors.push(ValidationError::UnknownEffect(node.effect.kind.clone()));
                arity.insert(node.id, None);
            }
        }
    }
    if sinks > 1 {
        errors.push(ValidationError::MultipleSinks(sinks));
    }

    for connection in &graph.connections {
        if !seen.insert(connection.id.uuid()) {
            errors.push(ValidationError::DuplicateId(connection.id.to_string()));
        }
        let ends = [
            (connection.from_node, connection.from_channel, "output"),
            (connection.to_node, connection.to_channel, "input"),
        ];
        for (node, channel, direction) in ends {
            match arity.get(&node) {
                None => errors.push(ValidationError::MissingReference {
                    what: "connection",
                    id: node.to_string(),
                }),
                Some(Some((inputs, outputs, _))) => {
                    let available = if direction == "input" { *inputs } else { *outputs };
                    if channel >= available {
                        let kind = graph.node(node).map(|n| n.effect.kind.clone()).unwrap_or_default();
                        errors.push(ValidationError::InvalidChannel {
                            kind,
                            direction,
                            channel,
                            available,
                        });
                    }
                }
                Some(None) => {}
            }
        }
    }

    for source in &graph.sources {
        if !seen.insert(source.id.uuid()) {
            errors.push(ValidationError::DuplicateId(source.id.to_string()));
        }
        if let Err(err) = validate_source_config(registry, &source.source) {
            errors.push(err);
        }
    }

    for modulation in &graph.modulations {
        if !seen.insert(modulation.id.uuid()) {
            errors.push(ValidationError::DuplicateId(modulation.id.to_string()));
        }
        if !graph.sources.iter().any(|s| s.id == modulation.source) {
            errors.push(ValidationError::MissingReference {
                what: "modulation source",
                id: modulation.source.to_string(),
            });
        }
        match arity.get(&modulation.target_node) {
            None => errors.push(ValidationError::MissingReference {
                what: "modulation target",
                id: modulation.target_node.to_string(),
            }),
            Some(Some((_, _, names))) => {
                for name in modulation.target.parameter_names() {
                    if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                        let kind = graph
                            .node(modulation.target_node)
                            .map(|n| n.effect.kind.clone())
                            .unwrap_or_default();
                        errors.push(ValidationError::UnknownParameter {
                            kind,
                            param: name.to_string(),
                        });
                    }
                }
            }
            Some(None) => {}
        }
    }

    ValidationError::from_list(errors)
}
