//! The orchestrator: slot graphs, scenes and one worker plus one device
//! writer per configured device.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};
use glint_config::{
    ConfigError, DeviceConfig, GraphDescription, NUM_SLOTS, ProjectFile, RuntimeConfig, Scene,
    SlotId, default_shm_dir,
};
use glint_core::{AudioBuffer, FilterGraph, FrameContext, GraphChange, ListenerId, NodeId, OutputSize};
use glint_io::SharedFrame;
use glint_registry::EffectRegistry;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

use crate::error::{ProjectError, Result};
use crate::launcher::{ChildHandle, Launcher};
use crate::message::{Reply, WorkerMessage, WriterMessage};
use crate::supervisor::{StartPolicy, start_child};
use crate::worker::WorkerSpec;
use crate::writer::WriterSpec;

/// Frame counter and clock guarded by the update lock.
#[derive(Debug, Default)]
pub struct FrameClock {
    seq: u64,
    time: f64,
    last: Option<Instant>,
}

impl FrameClock {
    /// Sequence number of the last rendered frame.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Seconds of frame time accumulated so far.
    pub fn time(&self) -> f64 {
        self.time
    }
}

/// Holding this guard makes every [`Project::tick`] skip.
pub type UpdateGuard = ArcMutexGuard<RawMutex, FrameClock>;

/// Lifecycle of one device's worker and writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Nothing started yet.
    NoWorker,
    /// Children are being spawned and probed.
    Starting,
    /// Rendering frames.
    Running,
    /// Live edits were sent; the worker has not finished a frame since.
    EditPending,
    /// A full graph replacement was sent; the worker has not finished a
    /// frame since.
    Replacing,
    /// Children are being stopped.
    Stopping,
    /// Children are gone.
    Stopped,
    /// Children could not be started.
    Failed,
}

/// Result of one [`Project::tick`].
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Another thread held the update lock; nothing was rendered.
    Skipped,
    /// Frame rendered on every running device that answered in time.
    Rendered(FrameReport),
}

/// Details of a rendered frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameReport {
    /// Frame sequence number.
    pub seq: u64,
    /// Devices whose writer was told to show the frame.
    pub shown: Vec<String>,
    /// Devices whose worker stalled and was rebuilt.
    pub stalled: Vec<String>,
    /// Devices whose graph had a failing node, with that node.
    pub failed_nodes: Vec<(String, NodeId)>,
}

/// A device that could not be brought up.
#[derive(Debug)]
pub struct DeviceFailure {
    /// Device id.
    pub device: String,
    /// Why.
    pub error: ProjectError,
}

struct Preview {
    slot: SlotId,
    listener: ListenerId,
    changes: Receiver<GraphChange>,
}

struct DeviceRuntime {
    config: DeviceConfig,
    index: usize,
    state: DeviceState,
    slot: Option<SlotId>,
    block: Option<SharedFrame>,
    worker: Option<ChildHandle<WorkerMessage>>,
    writer: Option<ChildHandle<WriterMessage>>,
}

impl DeviceRuntime {
    fn set_state(&mut self, state: DeviceState) {
        if self.state != state {
            tracing::debug!(device = %self.config.id, from = ?self.state, to = ?state, "device state");
            self.state = state;
        }
    }

    fn is_running(&self) -> bool {
        matches!(
            self.state,
            DeviceState::Running | DeviceState::EditPending | DeviceState::Replacing
        ) && self.worker.is_some()
            && self.writer.is_some()
    }
}

/// A running project.
///
/// Owns the master copy of every slot graph. Workers hold replicas that
/// are kept in sync through edit messages (preview slot) or full
/// replacements (everything else).
pub struct Project {
    name: String,
    config: RuntimeConfig,
    registry: Arc<EffectRegistry>,
    launcher: Arc<dyn Launcher>,
    slots: Vec<Option<FilterGraph>>,
    slot_names: BTreeMap<SlotId, String>,
    scenes: BTreeMap<String, Scene>,
    active_scene: Option<String>,
    preview: Option<Preview>,
    devices: Vec<DeviceRuntime>,
    clock: Arc<Mutex<FrameClock>>,
    skipped: u64,
    audio: Option<AudioBuffer>,
    shm_dir: PathBuf,
    shut_down: bool,
}

impl Project {
    /// An empty project over the devices in `config`. Nothing is started
    /// until a scene is activated or a device assigned.
    pub fn new(
        name: impl Into<String>,
        config: RuntimeConfig,
        registry: Arc<EffectRegistry>,
        launcher: Arc<dyn Launcher>,
    ) -> Result<Self> {
        config.validate().map_err(ConfigError::from)?;
        let devices = config
            .devices
            .iter()
            .enumerate()
            .map(|(index, device)| DeviceRuntime {
                config: device.clone(),
                index,
                state: DeviceState::NoWorker,
                slot: None,
                block: None,
                worker: None,
                writer: None,
            })
            .collect();
        let shm_dir = config.shm_dir.clone().unwrap_or_else(default_shm_dir);
        Ok(Self {
            name: name.into(),
            config,
            registry,
            launcher,
            slots: std::iter::repeat_with(|| None).take(NUM_SLOTS).collect(),
            slot_names: BTreeMap::new(),
            scenes: BTreeMap::new(),
            active_scene: None,
            preview: None,
            devices,
            clock: Arc::new(Mutex::new(FrameClock::default())),
            skipped: 0,
            audio: None,
            shm_dir,
            shut_down: false,
        })
    }

    /// A project with the slots, scenes and preview slot of `file`.
    ///
    /// The file's active scene is remembered but not started; call
    /// [`activate_scene`](Self::activate_scene) for that.
    pub fn load(
        file: &ProjectFile,
        config: RuntimeConfig,
        registry: Arc<EffectRegistry>,
        launcher: Arc<dyn Launcher>,
    ) -> Result<Self> {
        file.validate(&registry).map_err(ConfigError::from)?;
        let mut project = Self::new(file.name.clone(), config, registry, launcher)?;
        for entry in &file.slots {
            let graph = entry.graph.build(&project.registry)?;
            project.slots[entry.id.index()] = Some(graph);
            if let Some(name) = &entry.name {
                project.slot_names.insert(entry.id, name.clone());
            }
        }
        project.scenes = file.scenes.clone();
        project.active_scene = file.active_scene.clone();
        project.set_preview_slot(file.preview_slot);
        tracing::info!(project = %project.name, slots = file.slots.len(), scenes = file.scenes.len(), "project loaded");
        Ok(project)
    }

    /// Snapshot of slots, scenes and preview slot for saving.
    pub fn to_project_file(&self) -> ProjectFile {
        let mut file = ProjectFile::new(self.name.clone());
        for slot in SlotId::all() {
            if let Some(graph) = &self.slots[slot.index()] {
                file.set_slot(slot, GraphDescription::describe(graph));
            }
        }
        for entry in &mut file.slots {
            entry.name = self.slot_names.get(&entry.id).cloned();
        }
        file.scenes = self.scenes.clone();
        file.active_scene = self.active_scene.clone();
        file.preview_slot = self.preview_slot();
        file
    }

    /// Project name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runtime settings in use.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // ── Slots ──────────────────────────────────────────────────────────────

    /// Master graph of `slot`, if the slot is populated.
    pub fn slot(&self, slot: SlotId) -> Option<&FilterGraph> {
        self.slots[slot.index()].as_ref()
    }

    /// Replace the graph of `slot`. Devices running the slot rebuild.
    pub fn set_slot(&mut self, slot: SlotId, graph: FilterGraph) {
        let preview = self.preview.as_ref().is_some_and(|p| p.slot == slot);
        if preview {
            self.set_preview_slot(None);
        }
        self.slots[slot.index()] = Some(graph);
        if preview {
            self.set_preview_slot(Some(slot));
        }
        self.replace_running(slot);
    }

    /// Empty `slot`. Devices running it go dark.
    pub fn clear_slot(&mut self, slot: SlotId) -> Option<FilterGraph> {
        if self.preview.as_ref().is_some_and(|p| p.slot == slot) {
            self.set_preview_slot(None);
        }
        let graph = self.slots[slot.index()].take();
        self.replace_running(slot);
        graph
    }

    /// Edit the graph of `slot` in place, creating an empty graph first if
    /// the slot is unpopulated.
    ///
    /// Edits to the preview slot reach running devices as individual
    /// operations; edits to any other running slot cause a full
    /// replacement.
    pub fn edit_slot<R>(&mut self, slot: SlotId, edit: impl FnOnce(&mut FilterGraph) -> R) -> R {
        let graph = self.slots[slot.index()].get_or_insert_with(FilterGraph::new);
        let result = edit(graph);

        let edits: Option<Vec<WorkerMessage>> = self.preview.as_ref().filter(|p| p.slot == slot).map(|p| {
            p.changes
                .try_iter()
                .filter_map(|change| WorkerMessage::from_change(slot, &change))
                .collect()
        });
        match edits {
            Some(edits) => self.publish_edits(slot, &edits),
            None => self.replace_running(slot),
        }
        result
    }

    /// Name shown for `slot`, if any.
    pub fn slot_name(&self, slot: SlotId) -> Option<&str> {
        self.slot_names.get(&slot).map(String::as_str)
    }

    /// Set or clear the display name of `slot`.
    pub fn set_slot_name(&mut self, slot: SlotId, name: Option<String>) {
        match name {
            Some(name) => self.slot_names.insert(slot, name),
            None => self.slot_names.remove(&slot),
        };
    }

    /// Slot whose edits are forwarded live.
    pub fn preview_slot(&self) -> Option<SlotId> {
        self.preview.as_ref().map(|p| p.slot)
    }

    /// Choose the slot whose edits are forwarded live, or none.
    pub fn set_preview_slot(&mut self, slot: Option<SlotId>) {
        if let Some(old) = self.preview.take() {
            if let Some(graph) = self.slots[old.slot.index()].as_mut() {
                graph.remove_listener(old.listener);
            }
        }
        let Some(slot) = slot else {
            return;
        };
        let graph = self.slots[slot.index()].get_or_insert_with(FilterGraph::new);
        let (tx, changes) = unbounded();
        let listener = graph.add_listener(move |change: &GraphChange| {
            let _ = tx.send(change.clone());
        });
        tracing::debug!(%slot, "preview slot set");
        self.preview = Some(Preview {
            slot,
            listener,
            changes,
        });
    }

    // ── Scenes and assignment ──────────────────────────────────────────────

    /// Scenes by name.
    pub fn scenes(&self) -> &BTreeMap<String, Scene> {
        &self.scenes
    }

    /// Add or replace a scene.
    pub fn set_scene(&mut self, name: impl Into<String>, scene: Scene) {
        self.scenes.insert(name.into(), scene);
    }

    /// Name of the last activated scene.
    pub fn active_scene(&self) -> Option<&str> {
        self.active_scene.as_deref()
    }

    /// Assign every device the slot `name` gives it and stop the devices
    /// the scene leaves out.
    ///
    /// Devices that fail to start are returned; the others keep running.
    pub fn activate_scene(&mut self, name: &str) -> Result<Vec<DeviceFailure>> {
        let scene = self
            .scenes
            .get(name)
            .cloned()
            .ok_or_else(|| ProjectError::UnknownScene(name.to_string()))?;
        tracing::info!(scene = name, "activating scene");

        let mut failures = Vec::new();
        for index in 0..self.devices.len() {
            let id = self.devices[index].config.id.clone();
            match scene.slot_for(&id) {
                Some(slot) => {
                    if let Err(error) = self.assign_index(index, slot) {
                        tracing::error!(device = %id, "{error}");
                        failures.push(DeviceFailure { device: id, error });
                    }
                }
                None => {
                    let stragglers = self.stop_device(index);
                    self.devices[index].slot = None;
                    if !stragglers.is_empty() {
                        tracing::warn!(device = %id, ?stragglers, "killed while leaving scene");
                    }
                }
            }
        }
        self.active_scene = Some(name.to_string());
        Ok(failures)
    }

    /// Show `slot` on `device`, starting the device if needed.
    pub fn assign(&mut self, device: &str, slot: SlotId) -> Result<()> {
        let index = self.device_index(device)?;
        self.assign_index(index, slot)
    }

    fn assign_index(&mut self, index: usize, slot: SlotId) -> Result<()> {
        self.devices[index].slot = Some(slot);
        if self.devices[index].is_running() {
            self.replace_device(index);
            Ok(())
        } else {
            self.start_device(index)
        }
    }

    // ── Live controls ──────────────────────────────────────────────────────

    /// Drive controller sources named `controller` on the devices whose bit
    /// is set in `device_mask` (bit `i` is the `i`th configured device).
    pub fn set_controller_value(&mut self, device_mask: u64, controller: &str, value: f32) {
        let message = WorkerMessage::ControllerValue {
            device_mask,
            controller: controller.to_string(),
            value,
        };
        for device in &self.devices {
            let selected = device.index < 64 && device_mask & (1 << device.index) != 0;
            if let (true, Some(worker)) = (selected && device.is_running(), &device.worker) {
                if let Err(e) = worker.send(message.clone()) {
                    tracing::warn!(device = %device.config.id, "{e}");
                }
            }
        }
    }

    /// Set the brightness of `device`. Kept across restarts.
    pub fn set_brightness(&mut self, device: &str, brightness: f32) -> Result<()> {
        let index = self.device_index(device)?;
        let device = &mut self.devices[index];
        device.config.brightness = brightness.clamp(0.0, 1.0);
        if let Some(writer) = &device.writer {
            writer.send(WriterMessage::Brightness {
                value: device.config.brightness,
            })?;
        }
        Ok(())
    }

    /// Audio snapshot handed to every following frame.
    pub fn set_audio(&mut self, audio: AudioBuffer) {
        self.audio = Some(audio);
    }

    // ── Frames ─────────────────────────────────────────────────────────────

    /// Take the update lock, blocking. While the guard lives every tick is
    /// skipped.
    pub fn lock_updates(&self) -> UpdateGuard {
        self.clock.lock_arc()
    }

    /// Ticks skipped because the update lock was held.
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped
    }

    /// Render one frame, with `dt` measured from the previous tick.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        self.tick_inner(None)
    }

    /// Render one frame with a fixed time step.
    pub fn tick_with_dt(&mut self, dt: f32) -> Result<TickOutcome> {
        self.tick_inner(Some(dt))
    }

    fn tick_inner(&mut self, dt: Option<f32>) -> Result<TickOutcome> {
        let Some(mut clock) = self.clock.try_lock_arc() else {
            self.skipped += 1;
            tracing::debug!(skipped = self.skipped, "update lock busy, skipping frame");
            return Ok(TickOutcome::Skipped);
        };

        let now = Instant::now();
        let interval = self.config.frame_interval();
        let dt = dt.unwrap_or_else(|| clock.last.map_or(interval, |last| now - last).as_secs_f32());
        clock.last = Some(now);
        clock.seq += 1;
        clock.time += f64::from(dt);
        let seq = clock.seq;
        let ctx = FrameContext {
            dt,
            time: clock.time,
            audio: self.audio.clone(),
            autogain: self.config.autogain,
        };

        let mut report = FrameReport {
            seq,
            ..FrameReport::default()
        };
        let mut dispatched = Vec::new();
        let mut stalled = Vec::new();
        for (index, device) in self.devices.iter().enumerate() {
            let (true, Some(worker)) = (device.is_running(), &device.worker) else {
                continue;
            };
            for reply in worker.drain() {
                log_reply(&device.config.id, &reply);
            }
            match worker.send(WorkerMessage::Tick { seq, ctx: ctx.clone() }) {
                Ok(()) => dispatched.push(index),
                Err(e) => {
                    tracing::warn!(device = %device.config.id, "{e}");
                    stalled.push(index);
                }
            }
        }
        drop(clock);

        let deadline = Instant::now() + self.config.drain_timeout();
        let mut settled = Vec::new();
        for index in dispatched {
            let device = &self.devices[index];
            let (Some(worker), Some(writer)) = (&device.worker, &device.writer) else {
                continue;
            };
            match wait_tick_done(worker, seq, deadline) {
                Ok(failed) => {
                    settled.push(index);
                    if let Some(node) = failed {
                        report.failed_nodes.push((device.config.id.clone(), node));
                    }
                    for reply in writer.drain() {
                        log_reply(&device.config.id, &reply);
                    }
                    match writer.send(WriterMessage::Show { seq }) {
                        Ok(()) => report.shown.push(device.config.id.clone()),
                        Err(e) => {
                            tracing::warn!(device = %device.config.id, "{e}");
                            stalled.push(index);
                        }
                    }
                }
                Err(waited) => {
                    let stall = ProjectError::SchedulingStall {
                        device: device.config.id.clone(),
                        seq,
                        waited,
                    };
                    tracing::warn!("{stall}");
                    stalled.push(index);
                }
            }
        }

        // Messages are applied in order, so a finished frame means every
        // earlier edit or replacement has landed.
        for index in settled {
            self.devices[index].set_state(DeviceState::Running);
        }
        for index in stalled {
            report.stalled.push(self.devices[index].config.id.clone());
            if let Err(e) = self.restart_device(index) {
                tracing::error!(device = %self.devices[index].config.id, "rebuild failed: {e}");
            }
        }
        Ok(TickOutcome::Rendered(report))
    }

    // ── Devices ────────────────────────────────────────────────────────────

    /// Configured device ids in order.
    pub fn device_ids(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(|d| d.config.id.as_str())
    }

    /// Lifecycle state of `device`.
    pub fn device_state(&self, device: &str) -> Option<DeviceState> {
        self.devices.iter().find(|d| d.config.id == device).map(|d| d.state)
    }

    /// Slot `device` is showing.
    pub fn device_slot(&self, device: &str) -> Option<SlotId> {
        self.devices.iter().find(|d| d.config.id == device).and_then(|d| d.slot)
    }

    fn device_index(&self, device: &str) -> Result<usize> {
        self.devices
            .iter()
            .position(|d| d.config.id == device)
            .ok_or_else(|| ProjectError::UnknownDevice(device.to_string()))
    }

    fn describe_slot(&self, slot: Option<SlotId>) -> GraphDescription {
        slot.and_then(|slot| self.slots[slot.index()].as_ref())
            .map(GraphDescription::describe)
            .unwrap_or_default()
    }

    fn start_device(&mut self, index: usize) -> Result<()> {
        let policy = StartPolicy::from_config(&self.config);
        let join_timeout = self.config.join_timeout();
        let launcher = Arc::clone(&self.launcher);
        let description = self.describe_slot(self.devices[index].slot);
        let frame_path = self.frame_path(&self.devices[index].config.id);
        let worker_spec = WorkerSpec {
            device: self.devices[index].config.id.clone(),
            device_index: index,
            num_pixels: self.devices[index].config.num_pixels,
            num_rows: self.devices[index].config.num_rows,
            frame_path: frame_path.clone(),
            parallel_update: self.config.parallel_update,
            record_timings: self.config.record_timings,
        };

        let device = &mut self.devices[index];
        device.set_state(DeviceState::Starting);
        let writer_spec = WriterSpec {
            device: device.config.clone(),
            frame_path: frame_path.clone(),
        };
        let size = OutputSize::new(device.config.num_pixels, device.config.num_rows);
        let block = match SharedFrame::create(&frame_path, size) {
            Ok(block) => block,
            Err(e) => {
                device.set_state(DeviceState::Failed);
                return Err(e.into());
            }
        };

        let writer = match start_child(
            &writer_spec.child_name(),
            &policy,
            || launcher.spawn_writer(&writer_spec),
            |token| WriterMessage::Probe { token },
        ) {
            Ok(writer) => writer,
            Err(e) => {
                device.set_state(DeviceState::Failed);
                return Err(e);
            }
        };
        let worker = match start_child(
            &worker_spec.child_name(),
            &policy,
            || launcher.spawn_worker(&worker_spec),
            |token| WorkerMessage::Probe { token },
        ) {
            Ok(worker) => worker,
            Err(e) => {
                if let Err(writer) = writer.join(join_timeout) {
                    writer.kill();
                }
                device.set_state(DeviceState::Failed);
                return Err(e);
            }
        };

        if let Some(slot) = device.slot {
            let replace = WorkerMessage::ReplaceGraph {
                device: device.config.id.clone(),
                slot,
                graph: description,
            };
            if let Err(e) = worker.send(replace) {
                device.set_state(DeviceState::Failed);
                return Err(e);
            }
        }
        device.block = Some(block);
        device.worker = Some(worker);
        device.writer = Some(writer);
        device.set_state(DeviceState::Running);
        tracing::info!(device = %device.config.id, slot = ?device.slot, "device running");
        Ok(())
    }

    /// Stop both children of a device. Returns the names of children that
    /// had to be killed.
    fn stop_device(&mut self, index: usize) -> Vec<String> {
        self.stop_devices(&[index])
    }

    /// Stop the children of every device in `indices`.
    ///
    /// Every child is told to stop before any is joined, and all joins share
    /// one `join_timeout` deadline. Returns the names of children that had
    /// to be killed.
    fn stop_devices(&mut self, indices: &[usize]) -> Vec<String> {
        let mut workers = Vec::new();
        let mut writers = Vec::new();
        for &index in indices {
            let device = &mut self.devices[index];
            device.set_state(DeviceState::Stopping);
            if let Some(mut worker) = device.worker.take() {
                let _ = worker.send(WorkerMessage::Stop);
                worker.close_input();
                workers.push(worker);
            }
            if let Some(mut writer) = device.writer.take() {
                let _ = writer.send(WriterMessage::Stop);
                writer.close_input();
                writers.push(writer);
            }
        }

        let deadline = Instant::now() + self.config.join_timeout();
        let mut stragglers = Vec::new();
        for worker in workers {
            if let Err(worker) = worker.join(deadline.saturating_duration_since(Instant::now())) {
                stragglers.push(worker.name().to_string());
                worker.kill();
            }
        }
        for writer in writers {
            if let Err(writer) = writer.join(deadline.saturating_duration_since(Instant::now())) {
                stragglers.push(writer.name().to_string());
                writer.kill();
            }
        }

        for &index in indices {
            let device = &mut self.devices[index];
            device.block = None;
            device.set_state(DeviceState::Stopped);
        }
        stragglers
    }

    fn restart_device(&mut self, index: usize) -> Result<()> {
        tracing::info!(device = %self.devices[index].config.id, "rebuilding device");
        let stragglers = self.stop_device(index);
        if !stragglers.is_empty() {
            tracing::warn!(?stragglers, "killed during rebuild");
        }
        self.start_device(index)
    }

    /// Send the current graph to every running device showing `slot`.
    fn replace_running(&mut self, slot: SlotId) {
        let targets: Vec<usize> = self
            .devices
            .iter()
            .filter(|d| d.slot == Some(slot) && d.is_running())
            .map(|d| d.index)
            .collect();
        for index in targets {
            self.replace_device(index);
        }
    }

    fn replace_device(&mut self, index: usize) {
        let graph = self.describe_slot(self.devices[index].slot);
        let device = &mut self.devices[index];
        let (Some(slot), Some(worker)) = (device.slot, &device.worker) else {
            return;
        };
        let message = WorkerMessage::ReplaceGraph {
            device: device.config.id.clone(),
            slot,
            graph,
        };
        match worker.send(message) {
            Ok(()) => device.set_state(DeviceState::Replacing),
            Err(e) => {
                tracing::warn!(device = %device.config.id, "{e}");
                if let Err(e) = self.restart_device(index) {
                    tracing::error!("rebuild failed: {e}");
                }
            }
        }
    }

    fn publish_edits(&mut self, slot: SlotId, edits: &[WorkerMessage]) {
        if edits.is_empty() {
            return;
        }
        let mut broken = Vec::new();
        for device in &mut self.devices {
            if device.slot != Some(slot) || !device.is_running() {
                continue;
            }
            let sent = device
                .worker
                .as_ref()
                .map_or(Ok(()), |worker| edits.iter().try_for_each(|edit| worker.send(edit.clone())));
            match sent {
                Ok(()) => device.set_state(DeviceState::EditPending),
                Err(e) => {
                    tracing::warn!(device = %device.config.id, "{e}");
                    broken.push(device.index);
                }
            }
        }
        for index in broken {
            if let Err(e) = self.restart_device(index) {
                tracing::error!("rebuild failed: {e}");
            }
        }
    }

    fn frame_path(&self, device: &str) -> PathBuf {
        let file = format!(
            "glint-{}-{device}-{}.frame",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        );
        self.shm_dir.join(file)
    }

    // ── Shutdown ───────────────────────────────────────────────────────────

    /// Stop every device.
    ///
    /// Children that do not exit within the join timeout are killed and
    /// reported through [`ProjectError::Shutdown`].
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        self.set_preview_slot(None);
        let all: Vec<usize> = (0..self.devices.len()).collect();
        let stragglers = self.stop_devices(&all);
        tracing::info!(project = %self.name, "shut down");
        if stragglers.is_empty() {
            Ok(())
        } else {
            Err(ProjectError::Shutdown { stragglers })
        }
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!("{e}");
        }
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("slots", &self.slots.iter().filter(|s| s.is_some()).count())
            .field("preview_slot", &self.preview_slot())
            .field("active_scene", &self.active_scene)
            .field(
                "devices",
                &self.devices.iter().map(|d| (&d.config.id, d.state)).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Wait for `TickDone(seq)`. Returns the failing node, if any, or the time
/// waited on timeout.
fn wait_tick_done(
    worker: &ChildHandle<WorkerMessage>,
    seq: u64,
    deadline: Instant,
) -> std::result::Result<Option<NodeId>, Duration> {
    let start = Instant::now();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match worker.recv_timeout(remaining) {
            Ok(Reply::TickDone { seq: done, failed_node }) if done == seq => return Ok(failed_node),
            Ok(reply) => log_reply(worker.name(), &reply),
            Err(_) => return Err(start.elapsed()),
        }
    }
}

fn log_reply(child: &str, reply: &Reply) {
    match reply {
        Reply::Error { message } => tracing::warn!(child, "{message}"),
        other => tracing::trace!(child, ?other, "reply"),
    }
}
