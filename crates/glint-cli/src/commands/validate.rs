//! Project file validation command.

use std::path::PathBuf;

use clap::Args;
use glint_config::{RuntimeConfig, ValidationError};
use glint_registry::EffectRegistry;

use super::common::load_project;

#[derive(Args)]
pub struct ValidateArgs {
    /// Project name or path
    #[arg(value_name = "PROJECT")]
    project: String,

    /// Also check that every scene device exists in this runtime config
    #[arg(short, long)]
    config: Option<PathBuf>,
}

pub fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let (path, project) = load_project(&args.project)?;
    let registry = EffectRegistry::new();

    let mut problems = Vec::new();
    if let Err(e) = project.validate(&registry) {
        problems.push(e);
    }
    if let Some(config_path) = &args.config {
        let config = RuntimeConfig::load(config_path)?;
        for (scene_name, scene) in &project.scenes {
            for device in scene.devices.keys() {
                if config.device(device).is_none() {
                    problems.push(ValidationError::MissingReference {
                        what: "device",
                        id: format!("{device} (scene '{scene_name}')"),
                    });
                }
            }
        }
    }

    if problems.is_empty() {
        println!(
            "{}: OK ({} slots, {} scenes)",
            path.display(),
            project.slots.len(),
            project.scenes.len()
        );
        return Ok(());
    }

    println!("{}:", path.display());
    for problem in &problems {
        match problem {
            ValidationError::Multiple(errors) => {
                for error in errors {
                    println!("  - {error}");
                }
            }
            other => println!("  - {other}"),
        }
    }
    anyhow::bail!("{} is invalid", path.display())
}
