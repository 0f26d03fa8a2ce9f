//! Configuration for glint: projects, runtime settings and effect configs.
//!
//! # Features
//!
//! - **Versioned effect configs**: [`EffectConfig`] upgrades older layouts at
//!   load time through per-kind migrations
//! - **Graph descriptions**: [`GraphDescription`] captures a live
//!   [`FilterGraph`](glint_core::FilterGraph) and rebuilds it with the same ids
//! - **Projects**: [`ProjectFile`] holds 127 slots, named scenes and the
//!   preview slot
//! - **Runtime**: [`RuntimeConfig`] with frame rate, supervision timeouts and
//!   output devices
//! - **Validation**: check descriptions against the registry before building
//! - **Paths**: platform-specific config and project directories
//!
//! # Example
//!
//! ```rust,no_run
//! use glint_config::{ProjectFile, RuntimeConfig, SlotId};
//! use glint_registry::EffectRegistry;
//!
//! let runtime = RuntimeConfig::load("runtime.toml").unwrap();
//! runtime.validate().unwrap();
//!
//! let project = ProjectFile::load("project.toml").unwrap();
//! let registry = EffectRegistry::new();
//! project.validate(&registry).unwrap();
//!
//! let slot = SlotId::new(0).unwrap();
//! if let Some(entry) = project.slot(slot) {
//!     let graph = entry.graph.build(&registry).unwrap();
//!     println!("{} nodes", graph.node_count());
//! }
//! ```

mod effect_config;
mod error;
mod graph_description;
mod project_file;
mod runtime;

/// Platform-specific paths for projects and configuration.
pub mod paths;

/// Graph and effect validation.
pub mod validation;

pub use effect_config::{CURRENT_VERSION, EffectConfig};
pub use error::ConfigError;
pub use graph_description::{GraphDescription, NodeDescription, SourceDescription};
pub use paths::{
    default_runtime_config, default_shm_dir, find_project, list_user_projects, user_config_dir,
    user_projects_dir,
};
pub use project_file::{NUM_SLOTS, ProjectFile, Scene, SlotEntry, SlotId};
pub use runtime::{DeviceConfig, DeviceKind, RuntimeConfig};
pub use validation::{
    ValidationError, ValidationResult, validate_effect_config, validate_graph,
    validate_source_config,
};
