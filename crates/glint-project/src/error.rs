//! Error types for the orchestrator and its child processes.

use std::time::Duration;

use glint_config::ConfigError;
use glint_core::GraphError;
use glint_io::DeviceError;
use thiserror::Error;

/// Errors raised while running a project.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// A child never acknowledged the liveness probe.
    #[error("{child} did not start after {attempts} attempts")]
    Startup {
        /// Name of the child (`worker:<device>` or `writer:<device>`).
        child: String,
        /// Spawn attempts made.
        attempts: u32,
    },

    /// A worker did not finish a frame within the drain timeout.
    #[error("worker for '{device}' stalled on frame {seq} (waited {waited:?})")]
    SchedulingStall {
        /// Device whose worker stalled.
        device: String,
        /// Frame sequence number that never completed.
        seq: u64,
        /// Time spent waiting.
        waited: Duration,
    },

    /// A child's message channel closed or a message could not be encoded.
    #[error("transport to {child} failed: {reason}")]
    Transport {
        /// Name of the child.
        child: String,
        /// What went wrong.
        reason: String,
    },

    /// Spawning a child failed at the OS level.
    #[error("failed to spawn {child}: {source}")]
    Spawn {
        /// Name of the child.
        child: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A graph mutation was rejected.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Configuration could not be loaded or built.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Output device or shared frame failure.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// No device with this id is configured.
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// No scene with this name exists.
    #[error("unknown scene: {0}")]
    UnknownScene(String),

    /// Children that had to be killed because they did not exit in time.
    #[error("killed {} children that ignored shutdown: {}", .stragglers.len(), .stragglers.join(", "))]
    Shutdown {
        /// Names of the killed children.
        stragglers: Vec<String>,
    },
}

impl ProjectError {
    /// Create a transport error.
    pub fn transport(child: impl Into<String>, reason: impl Into<String>) -> Self {
        ProjectError::Transport {
            child: child.into(),
            reason: reason.into(),
        }
    }

    /// Create a spawn error.
    pub fn spawn(child: impl Into<String>, source: std::io::Error) -> Self {
        ProjectError::Spawn {
            child: child.into(),
            source,
        }
    }
}

/// Convenience result type for orchestration.
pub type Result<T> = std::result::Result<T, ProjectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_display() {
        let err = ProjectError::Startup {
            child: "worker:strip".to_string(),
            attempts: 3,
        };
        assert_eq!(err.to_string(), "worker:strip did not start after 3 attempts");
    }

    #[test]
    fn test_shutdown_lists_stragglers() {
        let err = ProjectError::Shutdown {
            stragglers: vec!["worker:a".to_string(), "writer:b".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("killed 2 children"), "got: {msg}");
        assert!(msg.contains("worker:a, writer:b"), "got: {msg}");
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err: ProjectError = ConfigError::InvalidSlot(200).into();
        assert_eq!(err.to_string(), "slot 200 out of range (0..=126)");
    }
}
