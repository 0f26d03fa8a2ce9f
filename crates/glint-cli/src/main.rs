//! glint - render LED frames from effect graphs on one or more devices.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "glint")]
#[command(author, version, about = "LED frame renderer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a project on the configured devices
    Run(commands::run::RunArgs),

    /// Render worker for one device (started by `run`)
    #[command(hide = true)]
    Worker(commands::child::ChildArgs),

    /// Device writer for one device (started by `run`)
    #[command(hide = true)]
    DeviceWriter(commands::child::ChildArgs),

    /// List available effects and modulation sources
    Effects(commands::effects::EffectsArgs),

    /// Check a project file against the effect registry
    Validate(commands::validate::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    // stdout carries the message stream of child processes; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    tracing_log::LogTracer::init().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Worker(args) => commands::child::run_worker(args),
        Commands::DeviceWriter(args) => commands::child::run_writer(args),
        Commands::Effects(args) => commands::effects::run(args),
        Commands::Validate(args) => commands::validate::run(args),
    }
}
