//! Effect and modulation source listing command.

use clap::Args;
use glint_core::{ParamDescriptor, ParamKind};
use glint_registry::EffectRegistry;

#[derive(Args)]
pub struct EffectsArgs {
    /// Show the parameter table of one effect or source
    #[arg(value_name = "KIND")]
    kind: Option<String>,
}

pub fn run(args: EffectsArgs) -> anyhow::Result<()> {
    let registry = EffectRegistry::new();

    let Some(kind) = &args.kind else {
        println!("Effects");
        println!("=======");
        println!();
        for effect in registry.all_effects() {
            println!("  {:14} {:12} {}", effect.id, effect.category.name(), effect.description);
        }
        println!();
        println!("Modulation sources");
        println!("==================");
        println!();
        for source in registry.all_sources() {
            println!("  {:28} {}", source.id, source.description);
        }
        println!();
        println!("Use 'glint effects <kind>' for parameter details.");
        return Ok(());
    };

    let (descriptor, params) = if let Some(effect) = registry.create(kind) {
        (registry.get(kind), effect.param_table())
    } else if let Some(source) = registry.create_source(kind) {
        (registry.get_source(kind), source.param_table())
    } else {
        anyhow::bail!("Unknown effect or source: {kind}");
    };

    let title = descriptor.map_or(kind.as_str(), |d| d.name);
    println!("{title}");
    println!("{}", "=".repeat(title.len()));
    if let Some(descriptor) = descriptor {
        println!();
        println!("{}", descriptor.description);
    }
    println!();
    if params.is_empty() {
        println!("No parameters.");
        return Ok(());
    }
    println!("  {:14}  {:10}  {:24}  Description", "Name", "Default", "Range");
    println!("  {:14}  {:10}  {:24}  -----------", "----", "-------", "-----");
    for param in &params {
        println!(
            "  {:14}  {:10}  {:24}  {}",
            param.name,
            default_label(param),
            range_label(param),
            param.help
        );
    }
    Ok(())
}

fn default_label(param: &ParamDescriptor) -> String {
    match param.kind {
        ParamKind::Continuous { default, .. } => format!("{default}"),
        ParamKind::Choice { options, default } => options.get(default).copied().unwrap_or("?").to_string(),
    }
}

fn range_label(param: &ParamDescriptor) -> String {
    match param.kind {
        ParamKind::Continuous { min, max, .. } => format!("{min} .. {max}"),
        ParamKind::Choice { options, .. } => options.join(" | "),
    }
}
