//! Runtime settings: frame rate, supervision timeouts and output devices.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glint_core::Autogain;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::validation::{ValidationError, ValidationResult};

/// Kind of output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Discards frames.
    #[default]
    Null,
    /// Keeps the latest frame in memory.
    Virtual,
}

/// One output device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device id; scenes refer to devices by this id.
    pub id: String,
    /// Device kind.
    #[serde(default)]
    pub kind: DeviceKind,
    /// Number of pixels.
    #[serde(default = "default_num_pixels")]
    pub num_pixels: usize,
    /// Number of rows the pixels are laid out in.
    #[serde(default = "default_num_rows")]
    pub num_rows: usize,
    /// Brightness factor in `[0, 1]`.
    #[serde(default = "default_brightness")]
    pub brightness: f32,
}

fn default_num_pixels() -> usize {
    300
}

fn default_num_rows() -> usize {
    1
}

fn default_brightness() -> f32 {
    1.0
}

impl DeviceConfig {
    /// A device with the default size.
    pub fn new(id: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            num_pixels: default_num_pixels(),
            num_rows: default_num_rows(),
            brightness: default_brightness(),
        }
    }

    /// Set the pixel and row count.
    pub fn with_size(mut self, num_pixels: usize, num_rows: usize) -> Self {
        self.num_pixels = num_pixels;
        self.num_rows = num_rows;
        self
    }
}

/// Runtime settings of the orchestrator.
///
/// Every field has a default, so an empty file is a valid configuration
/// (with no devices).
///
/// # TOML Format
///
/// ```toml
/// fps = 60
/// startup_timeout_ms = 2000
/// max_start_attempts = 3
///
/// [autogain]
/// enabled = true
/// max_gain = 10.0
///
/// [[devices]]
/// id = "strip"
/// kind = "virtual"
/// num_pixels = 300
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Target frame rate.
    pub fps: f32,
    /// How long a starting worker may take to answer its liveness probe.
    pub startup_timeout_ms: u64,
    /// Spawn attempts before a device is declared unavailable.
    pub max_start_attempts: u32,
    /// Delay before the second spawn attempt; doubles on each retry.
    pub backoff_initial_ms: u64,
    /// How long a tick may take to drain before it counts as a stall.
    pub drain_timeout_ms: u64,
    /// How long shutdown waits for each child before killing it.
    pub join_timeout_ms: u64,
    /// Run the update phase of each graph on the rayon pool.
    pub parallel_update: bool,
    /// Record per-node timing statistics.
    pub record_timings: bool,
    /// Directory for shared frame blocks; `/dev/shm` or the temp dir when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shm_dir: Option<PathBuf>,
    /// Global autogain settings passed with every tick.
    pub autogain: Autogain,
    /// Output devices.
    pub devices: Vec<DeviceConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fps: 60.0,
            startup_timeout_ms: 2000,
            max_start_attempts: 3,
            backoff_initial_ms: 100,
            drain_timeout_ms: 500,
            join_timeout_ms: 2000,
            parallel_update: true,
            record_timings: false,
            shm_dir: None,
            autogain: Autogain::default(),
            devices: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Ok(toml::from_str(&content)?)
    }

    /// Save settings to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Add a device.
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.devices.push(device);
        self
    }

    /// Device by id.
    pub fn device(&self, id: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// Interval between ticks.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(f32::EPSILON)))
    }

    /// Startup probe deadline.
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Initial respawn backoff.
    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    /// Tick drain deadline.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Per-child join deadline at shutdown.
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Check value ranges and device ids.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();
        let mut invalid = |field: &str, reason: &str| {
            errors.push(ValidationError::InvalidSetting {
                field: field.to_string(),
                reason: reason.to_string(),
            });
        };
        if !(self.fps.is_finite() && self.fps > 0.0 && self.fps <= 1000.0) {
            invalid("fps", "must be in (0, 1000]");
        }
        if self.max_start_attempts == 0 {
            invalid("max_start_attempts", "must be at least 1");
        }
        if self.startup_timeout_ms == 0 {
            invalid("startup_timeout_ms", "must be positive");
        }
        if self.drain_timeout_ms == 0 {
            invalid("drain_timeout_ms", "must be positive");
        }
        let mut ids = HashSet::new();
        for device in &self.devices {
            let field = format!("devices.{}", device.id);
            if device.id.is_empty() {
                invalid("devices.id", "must not be empty");
            }
            if !ids.insert(device.id.as_str()) {
                invalid(&field, "duplicate device id");
            }
            if device.num_pixels == 0 || device.num_rows == 0 {
                invalid(&field, "num_pixels and num_rows must be positive");
            } else if device.num_pixels % device.num_rows != 0 {
                invalid(&field, "num_pixels must be a multiple of num_rows");
            }
            if !(0.0..=1.0).contains(&device.brightness) {
                invalid(&field, "brightness must be in [0, 1]");
            }
        }
        ValidationError::from_list(errors)
    }
}
