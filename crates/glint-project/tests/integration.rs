//! Integration tests for glint-project: a full orchestrator over thread
//! children, including children that misbehave.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::unbounded;
use glint_config::{DeviceConfig, DeviceKind, GraphDescription, ProjectFile, RuntimeConfig, Scene, SlotId};
use glint_core::{FilterGraph, ModulationTarget, NodeId};
use glint_io::VirtualHandle;
use glint_project::{
    ChildHandle, DeviceState, Launcher, Project, ProjectError, Reply, ThreadLauncher, TickOutcome,
    WorkerMessage, WorkerSpec, WriterMessage, WriterSpec,
};
use glint_registry::EffectRegistry;
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

fn runtime(dir: &TempDir) -> RuntimeConfig {
    let mut config = RuntimeConfig::default()
        .with_device(DeviceConfig::new("strip", DeviceKind::Virtual).with_size(8, 1))
        .with_device(DeviceConfig::new("panel", DeviceKind::Virtual).with_size(6, 2));
    config.shm_dir = Some(dir.path().to_path_buf());
    config.startup_timeout_ms = 300;
    config.backoff_initial_ms = 1;
    config.drain_timeout_ms = 300;
    config.join_timeout_ms = 1000;
    config
}

fn slot(n: usize) -> SlotId {
    SlotId::new(n).unwrap()
}

/// `static_color → led_output`, returning the color node.
fn color_graph(rgb: [f32; 3]) -> (FilterGraph, NodeId) {
    let registry = EffectRegistry::new();
    let mut graph = FilterGraph::new();
    let color = graph.add_node(registry.create("static_color").unwrap()).unwrap();
    let out = graph.add_node(registry.create("led_output").unwrap()).unwrap();
    graph.add_connection(color, 0, out, 0).unwrap();
    for (name, value) in ["r", "g", "b"].into_iter().zip(rgb) {
        graph.set_parameter(color, name, value).unwrap();
    }
    (graph, color)
}

/// Poll `preview` until its latest frame's first pixel is `rgb`.
fn wait_for_color(preview: &VirtualHandle, rgb: [f32; 3]) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if preview.latest().and_then(|frame| frame.pixel(0)) == Some(rgb) {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn rendered(outcome: TickOutcome) -> glint_project::FrameReport {
    match outcome {
        TickOutcome::Rendered(report) => report,
        TickOutcome::Skipped => panic!("tick was skipped"),
    }
}

#[derive(Clone, Copy)]
enum Fault {
    /// Never answers anything.
    Mute,
    /// Answers probes but never finishes a frame.
    Hang,
}

/// Thread launcher whose first `faulty_spawns` workers for `device`
/// misbehave.
struct FlakyLauncher {
    inner: ThreadLauncher,
    device: String,
    fault: Fault,
    faulty_spawns: u32,
    worker_spawns: AtomicU32,
}

impl FlakyLauncher {
    fn new(device: &str, fault: Fault, faulty_spawns: u32) -> Self {
        Self {
            inner: ThreadLauncher::default(),
            device: device.to_string(),
            fault,
            faulty_spawns,
            worker_spawns: AtomicU32::new(0),
        }
    }

    fn spawns(&self) -> u32 {
        self.worker_spawns.load(Ordering::SeqCst)
    }
}

impl Launcher for FlakyLauncher {
    fn spawn_worker(&self, spec: &WorkerSpec) -> glint_project::Result<ChildHandle<WorkerMessage>> {
        if spec.device != self.device {
            return self.inner.spawn_worker(spec);
        }
        let n = self.worker_spawns.fetch_add(1, Ordering::SeqCst) + 1;
        if n > self.faulty_spawns {
            return self.inner.spawn_worker(spec);
        }
        let fault = self.fault;
        let (tx, inbox) = unbounded::<WorkerMessage>();
        let (outbox, rx) = unbounded();
        let thread = thread::spawn(move || {
            for message in inbox.iter() {
                if let (Fault::Hang, WorkerMessage::Probe { token }) = (fault, message) {
                    let _ = outbox.send(Reply::ProbeAck { token });
                }
            }
        });
        Ok(ChildHandle::from_thread(spec.child_name(), tx, rx, thread))
    }

    fn spawn_writer(&self, spec: &WriterSpec) -> glint_project::Result<ChildHandle<WriterMessage>> {
        self.inner.spawn_writer(spec)
    }
}

/// Thread launcher whose workers take `linger` to exit after being told
/// to stop.
struct LingeringLauncher {
    inner: ThreadLauncher,
    linger: Duration,
}

impl Launcher for LingeringLauncher {
    fn spawn_worker(&self, spec: &WorkerSpec) -> glint_project::Result<ChildHandle<WorkerMessage>> {
        let linger = self.linger;
        let (tx, inbox) = unbounded::<WorkerMessage>();
        let (outbox, rx) = unbounded();
        let thread = thread::spawn(move || {
            for message in inbox.iter() {
                match message {
                    WorkerMessage::Probe { token } => {
                        let _ = outbox.send(Reply::ProbeAck { token });
                    }
                    WorkerMessage::Stop => break,
                    _ => {}
                }
            }
            thread::sleep(linger);
        });
        Ok(ChildHandle::from_thread(spec.child_name(), tx, rx, thread))
    }

    fn spawn_writer(&self, spec: &WriterSpec) -> glint_project::Result<ChildHandle<WriterMessage>> {
        self.inner.spawn_writer(spec)
    }
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_scene_renders_on_devices() {
    let dir = TempDir::new().unwrap();
    let launcher = Arc::new(ThreadLauncher::default());
    let mut project = Project::new(
        "show",
        runtime(&dir),
        Arc::new(EffectRegistry::new()),
        launcher.clone(),
    )
    .unwrap();
    project.set_slot(slot(0), color_graph([255.0, 0.0, 0.0]).0);
    project.set_slot(slot(1), color_graph([0.0, 0.0, 255.0]).0);
    project.set_scene(
        "main",
        Scene::new().with_device("strip", slot(0)).with_device("panel", slot(1)),
    );

    assert_eq!(project.device_state("strip"), Some(DeviceState::NoWorker));
    let failures = project.activate_scene("main").unwrap();
    assert!(failures.is_empty(), "{failures:?}");
    assert_eq!(project.device_state("strip"), Some(DeviceState::Running));
    assert_eq!(project.active_scene(), Some("main"));

    let report = rendered(project.tick_with_dt(1.0 / 60.0).unwrap());
    assert_eq!(report.seq, 1);
    assert_eq!(report.shown, ["strip", "panel"]);
    assert!(report.stalled.is_empty());

    assert!(wait_for_color(&launcher.preview("strip").unwrap(), [255.0, 0.0, 0.0]));
    let panel = launcher.preview("panel").unwrap();
    assert!(wait_for_color(&panel, [0.0, 0.0, 255.0]));
    assert_eq!(panel.latest().unwrap().len(), 6);

    project.shutdown().unwrap();
    assert_eq!(project.device_state("panel"), Some(DeviceState::Stopped));
}

#[test]
fn test_reassigning_a_device_switches_graphs() {
    let dir = TempDir::new().unwrap();
    let launcher = Arc::new(ThreadLauncher::default());
    let mut project =
        Project::new("show", runtime(&dir), Arc::new(EffectRegistry::new()), launcher.clone()).unwrap();
    project.set_slot(slot(0), color_graph([10.0, 0.0, 0.0]).0);
    project.set_slot(slot(5), color_graph([0.0, 20.0, 0.0]).0);
    let preview = || launcher.preview("strip").unwrap();

    project.assign("strip", slot(0)).unwrap();
    project.tick_with_dt(0.01).unwrap();
    assert!(wait_for_color(&preview(), [10.0, 0.0, 0.0]));

    project.assign("strip", slot(5)).unwrap();
    assert_eq!(project.device_slot("strip"), Some(slot(5)));
    assert_eq!(project.device_state("strip"), Some(DeviceState::Replacing));
    let report = rendered(project.tick_with_dt(0.01).unwrap());
    assert_eq!(report.shown, ["strip"]);
    assert_eq!(project.device_state("strip"), Some(DeviceState::Running));
    assert!(wait_for_color(&preview(), [0.0, 20.0, 0.0]));
    assert_eq!(project.device_state("panel"), Some(DeviceState::NoWorker));
}

#[test]
fn test_brightness_reaches_writer() {
    let dir = TempDir::new().unwrap();
    let launcher = Arc::new(ThreadLauncher::default());
    let mut project =
        Project::new("show", runtime(&dir), Arc::new(EffectRegistry::new()), launcher.clone()).unwrap();
    project.set_slot(slot(0), color_graph([200.0, 100.0, 0.0]).0);
    project.assign("strip", slot(0)).unwrap();

    project.set_brightness("strip", 0.5).unwrap();
    project.tick_with_dt(0.01).unwrap();
    assert!(wait_for_color(&launcher.preview("strip").unwrap(), [100.0, 50.0, 0.0]));
}

// ============================================================================
// Live edits
// ============================================================================

#[test]
fn test_preview_edits_are_forwarded() {
    let dir = TempDir::new().unwrap();
    let launcher = Arc::new(ThreadLauncher::default());
    let mut project =
        Project::new("show", runtime(&dir), Arc::new(EffectRegistry::new()), launcher.clone()).unwrap();
    let (graph, color) = color_graph([255.0, 0.0, 0.0]);
    project.set_slot(slot(3), graph);
    project.set_preview_slot(Some(slot(3)));
    project.assign("strip", slot(3)).unwrap();
    let preview = launcher.preview("strip").unwrap();

    project.tick_with_dt(0.01).unwrap();
    assert!(wait_for_color(&preview, [255.0, 0.0, 0.0]));

    project
        .edit_slot(slot(3), |graph| graph.set_parameter(color, "g", 255.0))
        .unwrap();
    assert_eq!(project.device_state("strip"), Some(DeviceState::EditPending));
    let report = rendered(project.tick_with_dt(0.01).unwrap());
    assert_eq!(report.shown, ["strip"]);
    assert_eq!(project.device_state("strip"), Some(DeviceState::Running));
    assert!(wait_for_color(&preview, [255.0, 255.0, 0.0]));

    // Structural edits replay too: cut the color node off the sink.
    project.edit_slot(slot(3), |graph| graph.remove_node(color)).unwrap();
    project.tick_with_dt(0.01).unwrap();
    assert!(wait_for_color(&preview, [0.0, 0.0, 0.0]));
}

#[test]
fn test_edit_to_running_non_preview_slot_replaces_graph() {
    let dir = TempDir::new().unwrap();
    let launcher = Arc::new(ThreadLauncher::default());
    let mut project =
        Project::new("show", runtime(&dir), Arc::new(EffectRegistry::new()), launcher.clone()).unwrap();
    let (graph, color) = color_graph([0.0, 0.0, 50.0]);
    project.set_slot(slot(9), graph);
    project.assign("strip", slot(9)).unwrap();

    project.edit_slot(slot(9), |graph| graph.set_parameter(color, "r", 70.0)).unwrap();
    project.tick_with_dt(0.01).unwrap();
    assert!(wait_for_color(&launcher.preview("strip").unwrap(), [70.0, 0.0, 50.0]));
}

#[test]
fn test_controller_value_respects_device_mask() {
    let dir = TempDir::new().unwrap();
    let launcher = Arc::new(ThreadLauncher::default());
    let registry = EffectRegistry::new();
    let mut project =
        Project::new("show", runtime(&dir), Arc::new(EffectRegistry::new()), launcher.clone()).unwrap();

    let mut graph = FilterGraph::new();
    let color = graph.add_node(registry.create("static_color").unwrap()).unwrap();
    let dim = graph.add_node(registry.create("dim").unwrap()).unwrap();
    let out = graph.add_node(registry.create("led_output").unwrap()).unwrap();
    graph.add_connection(color, 0, dim, 0).unwrap();
    graph.add_connection(dim, 0, out, 0).unwrap();
    graph.set_parameter(dim, "level", 0.0).unwrap();
    let knob = graph.add_modulation_source(registry.create_source("external_linear_controller").unwrap());
    graph
        .add_modulation(knob, dim, ModulationTarget::parameter("level"), 1.0, false)
        .unwrap();
    project.set_slot(slot(0), graph);
    project.set_scene(
        "both",
        Scene::new().with_device("strip", slot(0)).with_device("panel", slot(0)),
    );
    assert!(project.activate_scene("both").unwrap().is_empty());

    project.tick_with_dt(0.01).unwrap();
    let strip = launcher.preview("strip").unwrap();
    let panel = launcher.preview("panel").unwrap();
    assert!(wait_for_color(&strip, [255.0; 3]));
    assert!(wait_for_color(&panel, [255.0; 3]));

    // Bit 1 is the panel, the second configured device.
    project.set_controller_value(0b10, "modulation", 0.0);
    project.tick_with_dt(0.01).unwrap();
    assert!(wait_for_color(&panel, [0.0; 3]));
    assert!(wait_for_color(&strip, [255.0; 3]));
}

// ============================================================================
// Update lock
// ============================================================================

#[test]
fn test_held_update_lock_skips_ticks() {
    let dir = TempDir::new().unwrap();
    let mut project = Project::new(
        "show",
        runtime(&dir),
        Arc::new(EffectRegistry::new()),
        Arc::new(ThreadLauncher::default()),
    )
    .unwrap();

    let guard = project.lock_updates();
    let started = Instant::now();
    assert_eq!(project.tick().unwrap(), TickOutcome::Skipped);
    assert_eq!(project.tick().unwrap(), TickOutcome::Skipped);
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(project.skipped_ticks(), 2);
    assert_eq!(guard.seq(), 0);
    drop(guard);

    let report = rendered(project.tick().unwrap());
    assert_eq!(report.seq, 1);
    assert_eq!(project.skipped_ticks(), 2);
}

// ============================================================================
// Supervision
// ============================================================================

#[test]
fn test_silent_worker_is_respawned() {
    let dir = TempDir::new().unwrap();
    let launcher = Arc::new(FlakyLauncher::new("strip", Fault::Mute, 1));
    let mut project =
        Project::new("show", runtime(&dir), Arc::new(EffectRegistry::new()), launcher.clone()).unwrap();
    project.set_slot(slot(0), color_graph([1.0, 2.0, 3.0]).0);

    project.assign("strip", slot(0)).unwrap();
    assert_eq!(launcher.spawns(), 2);
    assert_eq!(project.device_state("strip"), Some(DeviceState::Running));
    project.tick_with_dt(0.01).unwrap();
    assert!(wait_for_color(&launcher.inner.preview("strip").unwrap(), [1.0, 2.0, 3.0]));
}

#[test]
fn test_dead_device_does_not_stop_the_others() {
    let dir = TempDir::new().unwrap();
    let launcher = Arc::new(FlakyLauncher::new("panel", Fault::Mute, u32::MAX));
    let mut project =
        Project::new("show", runtime(&dir), Arc::new(EffectRegistry::new()), launcher.clone()).unwrap();
    project.set_slot(slot(0), color_graph([9.0, 9.0, 9.0]).0);
    project.set_scene(
        "main",
        Scene::new().with_device("strip", slot(0)).with_device("panel", slot(0)),
    );

    let failures = project.activate_scene("main").unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].device, "panel");
    assert!(matches!(failures[0].error, ProjectError::Startup { attempts: 3, .. }));
    assert_eq!(launcher.spawns(), 3);
    assert_eq!(project.device_state("panel"), Some(DeviceState::Failed));
    assert_eq!(project.device_state("strip"), Some(DeviceState::Running));

    let report = rendered(project.tick_with_dt(0.01).unwrap());
    assert_eq!(report.shown, ["strip"]);
    assert!(wait_for_color(&launcher.inner.preview("strip").unwrap(), [9.0, 9.0, 9.0]));
}

#[test]
fn test_stalled_worker_is_rebuilt() {
    let dir = TempDir::new().unwrap();
    let launcher = Arc::new(FlakyLauncher::new("strip", Fault::Hang, 1));
    let mut project =
        Project::new("show", runtime(&dir), Arc::new(EffectRegistry::new()), launcher.clone()).unwrap();
    project.set_slot(slot(0), color_graph([0.0, 40.0, 0.0]).0);
    project.assign("strip", slot(0)).unwrap();
    assert_eq!(launcher.spawns(), 1);

    let report = rendered(project.tick_with_dt(0.01).unwrap());
    assert_eq!(report.stalled, ["strip"]);
    assert!(report.shown.is_empty());
    assert_eq!(launcher.spawns(), 2);
    assert_eq!(project.device_state("strip"), Some(DeviceState::Running));

    let report = rendered(project.tick_with_dt(0.01).unwrap());
    assert_eq!(report.seq, 2);
    assert_eq!(report.shown, ["strip"]);
    assert!(wait_for_color(&launcher.inner.preview("strip").unwrap(), [0.0, 40.0, 0.0]));
}

// ============================================================================
// Project files and shutdown
// ============================================================================

#[test]
fn test_project_file_loads_and_runs() {
    let dir = TempDir::new().unwrap();
    let mut file = ProjectFile::new("Stored");
    file.set_slot(slot(4), GraphDescription::describe(&color_graph([5.0, 6.0, 7.0]).0));
    file.scenes
        .insert("evening".to_string(), Scene::new().with_device("strip", slot(4)));
    file.active_scene = Some("evening".to_string());
    file.preview_slot = Some(slot(4));

    let launcher = Arc::new(ThreadLauncher::default());
    let mut project = Project::load(
        &file,
        runtime(&dir),
        Arc::new(EffectRegistry::new()),
        launcher.clone(),
    )
    .unwrap();
    assert_eq!(project.name(), "Stored");
    assert_eq!(project.preview_slot(), Some(slot(4)));
    assert!(project.slot(slot(4)).is_some());

    assert!(project.activate_scene("evening").unwrap().is_empty());
    project.tick_with_dt(0.01).unwrap();
    assert!(wait_for_color(&launcher.preview("strip").unwrap(), [5.0, 6.0, 7.0]));

    let saved = project.to_project_file();
    assert_eq!(saved.slot(slot(4)), file.slot(slot(4)));
    assert_eq!(saved.scenes, file.scenes);
    assert_eq!(saved.preview_slot, file.preview_slot);
}

#[test]
fn test_unknown_names_are_errors() {
    let dir = TempDir::new().unwrap();
    let mut project = Project::new(
        "show",
        runtime(&dir),
        Arc::new(EffectRegistry::new()),
        Arc::new(ThreadLauncher::default()),
    )
    .unwrap();
    assert!(matches!(
        project.assign("nowhere", slot(0)),
        Err(ProjectError::UnknownDevice(_))
    ));
    assert!(matches!(
        project.activate_scene("missing"),
        Err(ProjectError::UnknownScene(_))
    ));
    assert_eq!(project.device_state("nowhere"), None);
}

#[test]
fn test_shutdown_removes_frame_blocks() {
    let dir = TempDir::new().unwrap();
    let mut project = Project::new(
        "show",
        runtime(&dir),
        Arc::new(EffectRegistry::new()),
        Arc::new(ThreadLauncher::default()),
    )
    .unwrap();
    project.set_slot(slot(0), color_graph([1.0; 3]).0);
    project.assign("strip", slot(0)).unwrap();
    project.assign("panel", slot(0)).unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);

    project.shutdown().unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(project.device_state("strip"), Some(DeviceState::Stopped));
    // A second shutdown is a no-op.
    project.shutdown().unwrap();
}

#[test]
fn test_shutdown_waits_one_join_timeout_for_all_devices() {
    let dir = TempDir::new().unwrap();
    let mut config = RuntimeConfig::default();
    for id in ["a", "b", "c", "d"] {
        config = config.with_device(DeviceConfig::new(id, DeviceKind::Virtual).with_size(4, 1));
    }
    config.shm_dir = Some(dir.path().to_path_buf());
    config.startup_timeout_ms = 300;
    config.join_timeout_ms = 200;
    let launcher = Arc::new(LingeringLauncher {
        inner: ThreadLauncher::default(),
        linger: Duration::from_secs(1),
    });
    let mut project = Project::new("show", config, Arc::new(EffectRegistry::new()), launcher).unwrap();
    project.set_slot(slot(0), color_graph([1.0; 3]).0);
    for id in ["a", "b", "c", "d"] {
        project.assign(id, slot(0)).unwrap();
    }

    let started = Instant::now();
    let result = project.shutdown();
    let elapsed = started.elapsed();

    // Four slow workers joined one after another would take 800ms.
    assert!(elapsed < Duration::from_millis(600), "shutdown took {elapsed:?}");
    match result {
        Err(ProjectError::Shutdown { stragglers }) => {
            assert_eq!(stragglers, ["worker:a", "worker:b", "worker:c", "worker:d"]);
        }
        other => panic!("expected stragglers, got {other:?}"),
    }
    assert_eq!(project.device_state("c"), Some(DeviceState::Stopped));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
