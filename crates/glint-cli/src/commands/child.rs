//! Entry points for worker and device-writer child processes.

use anyhow::Context;
use clap::Args;
use glint_project::{WorkerSpec, WriterSpec, transport, worker, writer};
use glint_registry::EffectRegistry;

#[derive(Args)]
pub struct ChildArgs {
    /// Child spec as JSON
    #[arg(long)]
    spec: String,
}

pub fn run_worker(args: ChildArgs) -> anyhow::Result<()> {
    ignore_interrupt()?;
    let spec: WorkerSpec = serde_json::from_str(&args.spec).context("invalid worker spec")?;
    let registry = EffectRegistry::new();
    transport::serve_stdio(&spec.child_name(), |inbox, outbox| {
        worker::run(&spec, &registry, inbox, outbox)
    })??;
    Ok(())
}

pub fn run_writer(args: ChildArgs) -> anyhow::Result<()> {
    ignore_interrupt()?;
    let spec: WriterSpec = serde_json::from_str(&args.spec).context("invalid writer spec")?;
    let (device, _) = writer::open_device(&spec.device);
    transport::serve_stdio(&spec.child_name(), |inbox, outbox| {
        writer::run(&spec, device, inbox, outbox)
    })??;
    Ok(())
}

/// Ctrl-C reaches the whole process group; children wait for the parent's
/// `Stop` instead of dying mid-frame.
fn ignore_interrupt() -> anyhow::Result<()> {
    ctrlc::set_handler(|| tracing::debug!("interrupt ignored, waiting for stop"))?;
    Ok(())
}
