//! Shared CLI helpers used across multiple commands.

use std::path::PathBuf;

use glint_config::{ProjectFile, paths};

/// Load a project by path or by name from the user projects directory.
///
/// On a miss the error lists the projects that do exist.
pub fn load_project(name: &str) -> anyhow::Result<(PathBuf, ProjectFile)> {
    let Some(path) = paths::find_project(name) else {
        let known: Vec<String> = paths::list_user_projects()
            .iter()
            .filter_map(|p| p.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .collect();
        if known.is_empty() {
            anyhow::bail!("project not found: {name}");
        }
        anyhow::bail!("project not found: {name} (available: {})", known.join(", "));
    };
    let project = ProjectFile::load(&path)?;
    Ok((path, project))
}
