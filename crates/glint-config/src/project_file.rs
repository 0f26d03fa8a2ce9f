//! Project file format: slots, scenes and the preview slot.

use std::collections::BTreeMap;
use std::path::Path;

use glint_registry::EffectRegistry;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::graph_description::GraphDescription;
use crate::validation::{ValidationError, validate_graph};

/// Number of graph slots in a project.
pub const NUM_SLOTS: usize = 127;

/// Index of a project slot, always below [`NUM_SLOTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct SlotId(u8);

impl SlotId {
    /// Slot `index`, or [`ConfigError::InvalidSlot`] when out of range.
    pub fn new(index: usize) -> Result<Self, ConfigError> {
        if index < NUM_SLOTS {
            Ok(SlotId(index as u8))
        } else {
            Err(ConfigError::InvalidSlot(index))
        }
    }

    /// Zero-based index.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// Every slot id in order.
    pub fn all() -> impl Iterator<Item = SlotId> {
        (0..NUM_SLOTS as u8).map(SlotId)
    }
}

impl TryFrom<usize> for SlotId {
    type Error = ConfigError;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        SlotId::new(index)
    }
}

impl From<SlotId> for usize {
    fn from(slot: SlotId) -> usize {
        slot.index()
    }
}

impl core::fmt::Display for SlotId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

/// A stored graph in one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotEntry {
    /// Slot index.
    pub id: SlotId,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Stored graph.
    #[serde(default)]
    pub graph: GraphDescription,
}

/// A scene assigns one slot to each output device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Device id to slot.
    #[serde(default)]
    pub devices: BTreeMap<String, SlotId>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `slot` to `device`.
    pub fn with_device(mut self, device: impl Into<String>, slot: SlotId) -> Self {
        self.devices.insert(device.into(), slot);
        self
    }

    /// Slot assigned to `device`.
    pub fn slot_for(&self, device: &str) -> Option<SlotId> {
        self.devices.get(device).copied()
    }
}

/// A project: up to [`NUM_SLOTS`] stored graphs plus named scenes.
///
/// # TOML Format
///
/// ```toml
/// name = "Living room"
/// active_scene = "evening"
/// preview_slot = 3
///
/// [[slots]]
/// id = 3
/// name = "warm fade"
/// [[slots.graph.nodes]]
/// # ...
///
/// [scenes.evening.devices]
/// strip = 3
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Project name.
    #[serde(default)]
    pub name: String,

    /// Scene activated at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_scene: Option<String>,

    /// Slot under interactive preview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_slot: Option<SlotId>,

    /// Occupied slots. Empty slots are not stored.
    #[serde(default)]
    pub slots: Vec<SlotEntry>,

    /// Named scenes.
    #[serde(default)]
    pub scenes: BTreeMap<String, Scene>,
}

impl ProjectFile {
    /// Create an empty project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Load a project from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let project: ProjectFile = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), slots = project.slots.len(), "loaded project");
        Ok(project)
    }

    /// Save the project to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Stored graph in `slot`.
    pub fn slot(&self, slot: SlotId) -> Option<&SlotEntry> {
        self.slots.iter().find(|s| s.id == slot)
    }

    /// Store `graph` in `slot`, replacing what was there.
    pub fn set_slot(&mut self, slot: SlotId, graph: GraphDescription) {
        match self.slots.iter_mut().find(|s| s.id == slot) {
            Some(entry) => entry.graph = graph,
            None => {
                self.slots.push(SlotEntry {
                    id: slot,
                    name: None,
                    graph,
                });
                self.slots.sort_by_key(|s| s.id);
            }
        }
    }

    /// Empty `slot`. Returns the removed entry.
    pub fn clear_slot(&mut self, slot: SlotId) -> Option<SlotEntry> {
        let pos = self.slots.iter().position(|s| s.id == slot)?;
        Some(self.slots.remove(pos))
    }

    /// Scene by name.
    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.scenes.get(name)
    }

    /// The active scene, if one is set and exists.
    pub fn active(&self) -> Option<&Scene> {
        self.active_scene.as_deref().and_then(|name| self.scene(name))
    }

    /// Check every slot graph and every scene reference.
    pub fn validate(&self, registry: &EffectRegistry) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        let mut seen = [false; NUM_SLOTS];
        for entry in &self.slots {
            if std::mem::replace(&mut seen[entry.id.index()], true) {
                errors.push(ValidationError::DuplicateId(entry.id.to_string()));
            }
            match validate_graph(registry, &entry.graph) {
                Ok(()) => {}
                Err(ValidationError::Multiple(list)) => errors.extend(list),
                Err(err) => errors.push(err),
            }
        }
        if let Some(name) = &self.active_scene {
            if !self.scenes.contains_key(name) {
                errors.push(ValidationError::MissingReference {
                    what: "active_scene",
                    id: name.clone(),
                });
            }
        }
        for (name, scene) in &self.scenes {
            for (device, slot) in &scene.devices {
                if self.slot(*slot).is_none() {
                    tracing::warn!(scene = %name, device = %device, %slot, "scene assigns an empty slot");
                }
            }
        }
        ValidationError::from_list(errors)
    }
}
