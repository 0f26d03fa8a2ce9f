//! Platform-specific paths for projects and runtime configuration.
//!
//! # Directory Structure
//!
//! - **User config**: `~/.config/glint/` (Linux), `~/Library/Application Support/glint/` (macOS), `%APPDATA%\glint\` (Windows)
//! - **User projects**: `<user config>/projects/`
//! - **Runtime config**: `<user config>/runtime.toml`
//!
//! # Example
//!
//! ```rust,no_run
//! use glint_config::paths;
//!
//! if let Some(path) = paths::find_project("living_room") {
//!     println!("Found project at: {:?}", path);
//! }
//! ```

use std::path::{Path, PathBuf};

/// Application name used for directory paths.
const APP_NAME: &str = "glint";

/// Subdirectory name for projects.
const PROJECTS_SUBDIR: &str = "projects";

/// File name of the runtime configuration.
const RUNTIME_FILE: &str = "runtime.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the user-specific projects directory.
pub fn user_projects_dir() -> PathBuf {
    user_config_dir().join(PROJECTS_SUBDIR)
}

/// Default location of the runtime configuration file.
pub fn default_runtime_config() -> PathBuf {
    user_config_dir().join(RUNTIME_FILE)
}

/// Find a project file by name.
///
/// The name can be a path to a TOML file, or a project name (with or
/// without `.toml`) looked up in [`user_projects_dir`].
pub fn find_project(name: &str) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    if path.is_file() {
        return Some(path);
    }

    let filename = if name.ends_with(".toml") {
        name.to_string()
    } else {
        format!("{name}.toml")
    };
    let user_path = user_projects_dir().join(filename);
    user_path.is_file().then_some(user_path)
}

/// List all project files in the user projects directory.
pub fn list_user_projects() -> Vec<PathBuf> {
    list_projects_in_dir(&user_projects_dir())
}

fn list_projects_in_dir(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut projects: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    projects.sort();
    projects
}

/// Directory for shared frame blocks: `/dev/shm` when present, the system
/// temp dir otherwise.
pub fn default_shm_dir() -> PathBuf {
    let shm = Path::new("/dev/shm");
    if shm.is_dir() {
        shm.to_path_buf()
    } else {
        std::env::temp_dir()
    }
}
