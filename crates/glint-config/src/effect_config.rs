//! Versioned effect configuration and load-time migration.

use std::collections::BTreeMap;

use glint_core::EffectState;
use serde::{Deserialize, Serialize};

/// Layout version written by this crate.
pub const CURRENT_VERSION: u32 = 2;

/// Version assumed when a stored config has no `version` field.
const LEGACY_VERSION: u32 = 1;

/// Stored configuration of one effect or modulation source.
///
/// Older layouts are upgraded while deserializing, so every `EffectConfig`
/// observed by callers is at [`CURRENT_VERSION`].
///
/// # TOML Format
///
/// ```toml
/// kind = "append"
/// version = 2
/// channels = 2
/// [params]
/// flip1 = 1.0
/// ```
///
/// # Example
///
/// ```rust
/// use glint_config::EffectConfig;
///
/// let config = EffectConfig::new("dim").with_param("level", 0.5);
/// assert_eq!(config.kind, "dim");
/// assert_eq!(config.get_param("level"), Some(0.5));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEffectConfig")]
pub struct EffectConfig {
    /// Registry id of the effect or source.
    pub kind: String,

    /// Layout version.
    pub version: u32,

    /// Input channel count for effects with configurable arity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<usize>,

    /// Parameter values by name. Missing names keep the effect's defaults.
    pub params: BTreeMap<String, f32>,
}

/// On-disk shape before migration.
#[derive(Deserialize)]
struct RawEffectConfig {
    #[serde(alias = "type")]
    kind: String,
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    channels: Option<usize>,
    #[serde(default)]
    params: BTreeMap<String, f32>,
    #[serde(flatten)]
    unknown: BTreeMap<String, toml::Value>,
}

impl From<RawEffectConfig> for EffectConfig {
    fn from(raw: RawEffectConfig) -> Self {
        for field in raw.unknown.keys() {
            tracing::warn!(kind = %raw.kind, field = %field, "ignoring unknown config field");
        }
        let config = EffectConfig {
            kind: raw.kind,
            version: raw.version.unwrap_or(LEGACY_VERSION),
            channels: raw.channels,
            params: raw.params,
        };
        config.migrate()
    }
}

impl EffectConfig {
    /// Create an empty configuration at the current version.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            version: CURRENT_VERSION,
            channels: None,
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter to the configuration.
    pub fn with_param(mut self, name: impl Into<String>, value: f32) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Set the input channel count.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Get a parameter value.
    pub fn get_param(&self, name: &str) -> Option<f32> {
        self.params.get(name).copied()
    }

    /// Configuration matching a live snapshot.
    pub fn from_state(state: &EffectState) -> Self {
        Self {
            kind: state.kind.clone(),
            version: CURRENT_VERSION,
            channels: state.channels,
            params: state.params.clone(),
        }
    }

    /// Snapshot the registry can build from.
    pub fn to_state(&self) -> EffectState {
        EffectState {
            kind: self.kind.clone(),
            channels: self.channels,
            params: self.params.clone(),
        }
    }

    /// Upgrade to [`CURRENT_VERSION`], one step at a time.
    ///
    /// Configs already at (or beyond) the current version are returned as-is.
    pub fn migrate(mut self) -> Self {
        while self.version < CURRENT_VERSION {
            let from = self.version;
            if from == LEGACY_VERSION {
                self.migrate_v1();
            }
            self.version = from + 1;
            tracing::debug!(kind = %self.kind, from, to = self.version, "migrated effect config");
        }
        self
    }

    /// v1 used camel-case names, 8-bit brightness and kept the append
    /// channel count among the params.
    fn migrate_v1(&mut self) {
        match self.kind.as_str() {
            "sine_lfo" => {
                for old in ["freqHz", "freq"] {
                    rename_param(&mut self.params, old, "freq_hz");
                }
            }
            "led_output" => {
                if let Some(b) = self.params.get_mut("brightness").filter(|b| **b > 1.0) {
                    *b /= 255.0;
                }
            }
            "append" => {
                for old in ["num_channels", "numChannels"] {
                    if let Some(n) = self.params.remove(old) {
                        if self.channels.is_none() && n >= 1.0 {
                            self.channels = Some(n as usize);
                        }
                    }
                }
            }
            "vu_meter" => {
                rename_param(&mut self.params, "dbRange", "db_range");
                rename_param(&mut self.params, "nOverlaps", "n_overlaps");
            }
            "audio_input" => {
                rename_param(&mut self.params, "autogainTime", "autogain_time");
            }
            _ => {}
        }
    }
}

fn rename_param(params: &mut BTreeMap<String, f32>, old: &str, new: &str) {
    if let Some(value) = params.remove(old) {
        params.entry(new.to_string()).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> EffectConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_current_version_passes_through() {
        let config = parse("kind = \"dim\"\nversion = 2\n[params]\nlevel = 0.4\n");
        assert_eq!(config, EffectConfig::new("dim").with_param("level", 0.4));
    }

    #[test]
    fn test_missing_version_is_legacy() {
        let config = parse("kind = \"sine_lfo\"\n[params]\nfreqHz = 2.0\ndepth = 0.5\n");
        assert_eq!(config.version, CURRENT_VERSION);
        assert_eq!(config.get_param("freq_hz"), Some(2.0));
        assert_eq!(config.get_param("freqHz"), None);
        assert_eq!(config.get_param("depth"), Some(0.5));
    }

    #[test]
    fn test_led_brightness_rescaled() {
        let config = parse("kind = \"led_output\"\n[params]\nbrightness = 127.5\n");
        assert!((config.get_param("brightness").unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_led_brightness_in_range_kept() {
        let config = parse("kind = \"led_output\"\n[params]\nbrightness = 0.8\n");
        assert_eq!(config.get_param("brightness"), Some(0.8));
    }

    #[test]
    fn test_append_channels_moved_out_of_params() {
        let config = parse("type = \"append\"\n[params]\nnum_channels = 3.0\nflip0 = 1.0\n");
        assert_eq!(config.kind, "append");
        assert_eq!(config.channels, Some(3));
        assert!(!config.params.contains_key("num_channels"));
        assert_eq!(config.get_param("flip0"), Some(1.0));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let config = parse("kind = \"dim\"\nversion = 2\ncolor_mode = \"hsv\"\n");
        assert_eq!(config, EffectConfig::new("dim"));
    }

    #[test]
    fn test_v2_params_not_renamed() {
        let config = parse("kind = \"sine_lfo\"\nversion = 2\n[params]\nfreq = 2.0\n");
        assert_eq!(config.get_param("freq"), Some(2.0));
    }

    #[test]
    fn test_state_roundtrip() {
        let state = EffectState {
            kind: "append".to_string(),
            channels: Some(2),
            params: BTreeMap::from([("flip1".to_string(), 1.0)]),
        };
        let config = EffectConfig::from_state(&state);
        assert_eq!(config.version, CURRENT_VERSION);
        assert_eq!(config.to_state(), state);
    }

    #[test]
    fn test_serialized_form_carries_version() {
        let text = toml::to_string(&EffectConfig::new("combine").with_param("mode", 2.0)).unwrap();
        assert!(text.contains("version = 2"), "got: {text}");
        assert_eq!(parse(&text), EffectConfig::new("combine").with_param("mode", 2.0));
    }
}
