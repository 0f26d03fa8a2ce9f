//! Per-device render worker.
//!
//! A worker owns a replica of one slot graph sized for its device. It
//! applies edits in arrival order, renders a frame on every `Tick` and
//! stores it in the device's shared frame block.

use std::path::PathBuf;

use crossbeam_channel::{Receiver, Sender};
use glint_config::{ConfigError, GraphDescription, SlotId};
use glint_core::{FilterGraph, FrameContext, OutputSize, PixelBuffer};
use glint_io::SharedFrame;
use glint_registry::EffectRegistry;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{ConnectionOp, ModulationOp, ModulationSourceOp, NodeOp, Reply, WorkerMessage};

/// Frames between timing reports when timings are recorded.
const TIMING_REPORT_INTERVAL: u64 = 600;

/// Everything a worker needs to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSpec {
    /// Device id.
    pub device: String,
    /// Position of the device in the runtime config; selects the bit in
    /// controller device masks.
    pub device_index: usize,
    /// Pixel count of the device.
    pub num_pixels: usize,
    /// Row count of the device.
    pub num_rows: usize,
    /// Shared frame block created by the orchestrator.
    pub frame_path: PathBuf,
    /// Run the update phase in parallel.
    #[serde(default)]
    pub parallel_update: bool,
    /// Record per-node timings.
    #[serde(default)]
    pub record_timings: bool,
}

impl WorkerSpec {
    /// Child name used in logs and errors.
    pub fn child_name(&self) -> String {
        format!("worker:{}", self.device)
    }

    fn size(&self) -> OutputSize {
        OutputSize::new(self.num_pixels, self.num_rows.max(1))
    }

    fn listens_to(&self, device_mask: u64) -> bool {
        self.device_index < 64 && device_mask & (1 << self.device_index) != 0
    }
}

/// Run a worker until `Stop` arrives or the orchestrator hangs up.
///
/// Fails only if the shared frame block cannot be opened. Failures while
/// applying a message are reported with [`Reply::Error`] and the worker
/// keeps going.
pub fn run(
    spec: &WorkerSpec,
    registry: &EffectRegistry,
    inbox: Receiver<WorkerMessage>,
    outbox: Sender<Reply>,
) -> Result<()> {
    let mut worker = Worker::new(spec, registry)?;
    tracing::info!(device = %spec.device, pixels = spec.num_pixels, rows = spec.num_rows, "worker started");

    for message in inbox.iter() {
        if matches!(message, WorkerMessage::Stop) {
            break;
        }
        if let Some(reply) = worker.handle(message) {
            if outbox.send(reply).is_err() {
                break;
            }
        }
    }
    tracing::info!(device = %spec.device, frames = worker.frames, "worker stopped");
    Ok(())
}

struct Worker<'a> {
    spec: &'a WorkerSpec,
    registry: &'a EffectRegistry,
    block: SharedFrame,
    graph: FilterGraph,
    slot: Option<SlotId>,
    blank: PixelBuffer,
    frames: u64,
}

impl<'a> Worker<'a> {
    fn new(spec: &'a WorkerSpec, registry: &'a EffectRegistry) -> Result<Self> {
        let block = SharedFrame::open(&spec.frame_path)?;
        let mut worker = Self {
            spec,
            registry,
            block,
            graph: FilterGraph::new(),
            slot: None,
            blank: PixelBuffer::new(spec.size()),
            frames: 0,
        };
        worker.configure_graph();
        Ok(worker)
    }

    fn configure_graph(&mut self) {
        let size = self.spec.size();
        self.graph.set_parallel_update(self.spec.parallel_update);
        self.graph.set_record_timings(self.spec.record_timings);
        self.graph.propagate_num_pixels(size.pixels, size.rows);
    }

    fn handle(&mut self, message: WorkerMessage) -> Option<Reply> {
        match message {
            WorkerMessage::Probe { token } => Some(Reply::ProbeAck { token }),
            WorkerMessage::Tick { seq, ctx } => Some(self.tick(seq, &ctx)),
            WorkerMessage::ReplaceGraph { device, slot, graph } => {
                if device != self.spec.device {
                    tracing::warn!(device = %self.spec.device, target = %device, "ignoring graph meant for another device");
                    return None;
                }
                self.replace(slot, &graph).err().map(error_reply)
            }
            WorkerMessage::ControllerValue {
                device_mask,
                controller,
                value,
            } => {
                if self.spec.listens_to(device_mask) {
                    let hits = self.graph.set_controller_value(&controller, value);
                    tracing::trace!(controller = %controller, value, hits, "controller value");
                }
                None
            }
            WorkerMessage::Stop => None,
            edit => {
                if edit.edit_slot() != self.slot {
                    tracing::debug!(device = %self.spec.device, "ignoring edit for a slot this worker is not running");
                    return None;
                }
                self.apply_edit(edit).err().map(error_reply)
            }
        }
    }

    fn tick(&mut self, seq: u64, ctx: &FrameContext) -> Reply {
        let failed_node = match self.graph.tick(ctx) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(device = %self.spec.device, seq, "{e}");
                Some(e.node)
            }
        };

        let frame = match self.graph.sink_frame() {
            Some(frame) if frame.len() == self.blank.len() => frame,
            Some(frame) => {
                tracing::warn!(
                    device = %self.spec.device,
                    "sink produced {} pixels for a {} pixel device",
                    frame.len(),
                    self.blank.len()
                );
                &self.blank
            }
            None => &self.blank,
        };
        if let Err(e) = self.block.write(seq, frame) {
            tracing::error!(device = %self.spec.device, seq, "failed to store frame: {e}");
        }

        self.frames += 1;
        if self.spec.record_timings && self.frames % TIMING_REPORT_INTERVAL == 0 {
            for timing in self.graph.timings() {
                tracing::debug!(
                    device = %self.spec.device,
                    node = %timing.node,
                    kind = timing.kind,
                    update_avg = ?timing.update.avg(),
                    process_avg = ?timing.process.avg(),
                    "node timing"
                );
            }
        }
        Reply::TickDone { seq, failed_node }
    }

    fn replace(&mut self, slot: SlotId, description: &GraphDescription) -> Result<()> {
        self.graph = description.build(self.registry)?;
        self.slot = Some(slot);
        self.configure_graph();
        tracing::info!(
            device = %self.spec.device,
            %slot,
            nodes = self.graph.node_count(),
            "graph replaced"
        );
        Ok(())
    }

    fn apply_edit(&mut self, message: WorkerMessage) -> Result<()> {
        match message {
            WorkerMessage::Node { op, .. } => match op {
                NodeOp::Add { id, state } => {
                    let effect = self.registry.build(&state).map_err(ConfigError::from)?;
                    self.graph.add_node_with_id(id, effect)?;
                }
                NodeOp::Remove { id } => self.graph.remove_node(id)?,
                NodeOp::Update { id, params } => self.graph.set_parameters(id, &params)?,
            },
            WorkerMessage::Connection { op, .. } => match op {
                ConnectionOp::Add(connection) => {
                    self.graph.insert_connection(connection)?;
                }
                ConnectionOp::Remove { id } => self.graph.remove_connection(id)?,
            },
            WorkerMessage::ModulationSource { op, .. } => match op {
                ModulationSourceOp::Add { id, state } => {
                    let source = self.registry.build_source(&state).map_err(ConfigError::from)?;
                    self.graph.add_modulation_source_with_id(id, source)?;
                }
                ModulationSourceOp::Remove { id } => self.graph.remove_modulation_source(id)?,
                ModulationSourceOp::Update { id, params } => {
                    self.graph.update_modulation_source(id, &params)?;
                }
            },
            WorkerMessage::Modulation { op, .. } => match op {
                ModulationOp::Add(modulation) => {
                    self.graph.insert_modulation(modulation)?;
                }
                ModulationOp::Remove { id } => self.graph.remove_modulation(id)?,
                ModulationOp::Update(modulation) => self.graph.update_modulation(modulation)?,
            },
            _ => {}
        }
        Ok(())
    }
}

fn error_reply(error: crate::ProjectError) -> Reply {
    tracing::warn!("worker rejected message: {error}");
    Reply::Error {
        message: error.to_string(),
    }
}
