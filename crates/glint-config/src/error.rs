//! Error types for configuration operations.

use std::path::PathBuf;

use glint_core::GraphError;
use glint_registry::RegistryError;
use thiserror::Error;

/// Errors from loading, saving or building projects and runtime settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A project or runtime file could not be read
    #[error("cannot read {}: {source}", path.display())]
    ReadFile {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A project or runtime file could not be written
    #[error("cannot write {}: {source}", path.display())]
    WriteFile {
        /// File that was being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The parent directory of a file could not be created
    #[error("cannot create directory {}: {source}", path.display())]
    CreateDir {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// File content is not valid TOML for the expected layout
    #[error("bad TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Value could not be written as TOML
    #[error("cannot encode TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Slot index outside `0..NUM_SLOTS`
    #[error("slot {0} out of range (0..=126)")]
    InvalidSlot(usize),

    /// An effect or source kind the registry cannot build
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A description that does not form a valid graph
    #[error("graph rejected: {0}")]
    Graph(#[from] GraphError),

    /// The description failed validation
    #[error("validation failed: {0}")]
    Validation(#[from] crate::validation::ValidationError),
}

impl ConfigError {
    /// [`ConfigError::ReadFile`] for `path`.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// [`ConfigError::WriteFile`] for `path`.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// [`ConfigError::CreateDir`] for `path`.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// File the error is about, for the I/O variants.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::ReadFile { path, .. } | Self::WriteFile { path, .. } | Self::CreateDir { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}
