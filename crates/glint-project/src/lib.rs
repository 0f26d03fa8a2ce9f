//! Multi-device orchestration for glint.
//!
//! One [`Project`] holds up to 127 slot graphs and drives one render worker
//! and one device writer per configured output device:
//!
//! - **Workers** keep a replica of the slot graph their device shows,
//!   render a frame per [`WorkerMessage::Tick`] and store it in a
//!   [`SharedFrame`](glint_io::SharedFrame) block.
//! - **Device writers** copy finished frames from the block to the device
//!   on [`WriterMessage::Show`].
//! - **Live edits** to the preview slot reach workers as individual graph
//!   operations; other changes ship whole graphs.
//!
//! Children are started by a [`Launcher`]: [`ProcessLauncher`] for one OS
//! process per child, [`ThreadLauncher`] for threads.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use glint_config::{DeviceConfig, DeviceKind, RuntimeConfig, SlotId};
//! use glint_project::{Project, ThreadLauncher};
//! use glint_registry::EffectRegistry;
//!
//! let registry = Arc::new(EffectRegistry::new());
//! let launcher = Arc::new(ThreadLauncher::new(Arc::clone(&registry)));
//! let config = RuntimeConfig::default()
//!     .with_device(DeviceConfig::new("strip", DeviceKind::Virtual).with_size(60, 1));
//!
//! let mut project = Project::new("demo", config, registry, launcher).unwrap();
//! let slot = SlotId::new(0).unwrap();
//! project.assign("strip", slot).unwrap();
//! project.tick().unwrap();
//! project.shutdown().unwrap();
//! ```

mod error;
mod launcher;
pub mod message;
mod project;
mod supervisor;
pub mod transport;
pub mod worker;
pub mod writer;

pub use error::{ProjectError, Result};
pub use launcher::{ChildHandle, Launcher, ProcessLauncher, ThreadLauncher};
pub use message::{Reply, WorkerMessage, WriterMessage};
pub use project::{
    DeviceFailure, DeviceState, FrameClock, FrameReport, Project, TickOutcome, UpdateGuard,
};
pub use supervisor::{StartPolicy, start_child};
pub use worker::WorkerSpec;
pub use writer::WriterSpec;
