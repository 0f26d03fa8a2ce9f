//! Project playback command.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use clap::Args;
use glint_config::{RuntimeConfig, paths};
use glint_project::{Launcher, ProcessLauncher, Project, ThreadLauncher, TickOutcome};
use glint_registry::EffectRegistry;

use super::common::load_project;

#[derive(Args)]
pub struct RunArgs {
    /// Project name or path
    #[arg(short, long)]
    project: String,

    /// Runtime configuration (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scene to start instead of the project's active scene
    #[arg(short, long)]
    scene: Option<String>,

    /// Run workers and writers as threads instead of processes
    #[arg(long)]
    in_process: bool,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let config_path = args.config.unwrap_or_else(paths::default_runtime_config);
    let config = RuntimeConfig::load(&config_path)?;
    if config.devices.is_empty() {
        anyhow::bail!("{} configures no devices", config_path.display());
    }

    let (_, file) = load_project(&args.project)?;
    let scene = args
        .scene
        .or_else(|| file.active_scene.clone())
        .ok_or_else(|| anyhow::anyhow!("no --scene given and the project has no active scene"))?;

    let registry = Arc::new(EffectRegistry::new());
    let launcher: Arc<dyn Launcher> = if args.in_process {
        Arc::new(ThreadLauncher::new(Arc::clone(&registry)))
    } else {
        Arc::new(ProcessLauncher::current_exe()?)
    };
    let mut project = Project::load(&file, config, registry, launcher)?;

    println!("Project: {}", project.name());
    println!("  Scene:   {scene}");
    println!("  Devices: {}", project.device_ids().collect::<Vec<_>>().join(", "));
    println!("  Rate:    {} fps", project.config().fps);

    let failures = project.activate_scene(&scene)?;
    for failure in &failures {
        tracing::error!(device = %failure.device, "{}", failure.error);
    }
    if failures.len() == project.device_ids().count() {
        project.shutdown()?;
        anyhow::bail!("no device could be started");
    }

    println!("\nPress Ctrl+C to stop...\n");
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let interval = project.config().frame_interval();
    let mut next = Instant::now();
    let mut frames = 0u64;
    let mut stalls = 0usize;
    while running.load(Ordering::SeqCst) {
        if let TickOutcome::Rendered(report) = project.tick()? {
            frames += 1;
            stalls += report.stalled.len();
        }
        if args.frames.is_some_and(|limit| frames >= limit) {
            break;
        }

        next += interval;
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        } else {
            next = now;
        }
    }

    println!("Stopping...");
    let skipped = project.skipped_ticks();
    if let Err(e) = project.shutdown() {
        tracing::warn!("{e}");
    }
    println!("Rendered {frames} frames ({skipped} skipped, {stalls} stalls)");
    Ok(())
}
