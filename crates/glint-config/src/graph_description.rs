//! Serializable description of a whole filter graph.

use glint_core::{Connection, FilterGraph, Modulation, ModulationSourceId, NodeId};
use glint_registry::EffectRegistry;
use serde::{Deserialize, Serialize};

use crate::effect_config::EffectConfig;
use crate::error::ConfigError;

/// One node of a [`GraphDescription`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    /// Node id, kept across save/load and process boundaries.
    pub id: NodeId,
    /// Effect configuration.
    pub effect: EffectConfig,
}

/// One modulation source of a [`GraphDescription`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescription {
    /// Source id.
    pub id: ModulationSourceId,
    /// Source configuration.
    pub source: EffectConfig,
}

/// Everything needed to rebuild a [`FilterGraph`] with identical ids.
///
/// # TOML Format
///
/// ```toml
/// [[nodes]]
/// id = "6f1c..."
/// [nodes.effect]
/// kind = "static_color"
/// version = 2
/// [nodes.effect.params]
/// r = 255.0
///
/// [[connections]]
/// id = "9a0b..."
/// from_node = "6f1c..."
/// from_channel = 0
/// to_node = "c2d4..."
/// to_channel = 0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDescription {
    /// Nodes in insertion order.
    #[serde(default)]
    pub nodes: Vec<NodeDescription>,
    /// Connections.
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Modulation sources.
    #[serde(default)]
    pub sources: Vec<SourceDescription>,
    /// Modulations.
    #[serde(default)]
    pub modulations: Vec<Modulation>,
}

impl GraphDescription {
    /// Create an empty description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture a live graph. Parameters are stored at their base values,
    /// never with modulation applied.
    pub fn describe(graph: &FilterGraph) -> Self {
        Self {
            nodes: graph
                .nodes()
                .map(|node| NodeDescription {
                    id: node.id(),
                    effect: EffectConfig::from_state(&node.state()),
                })
                .collect(),
            connections: graph.connections().to_vec(),
            sources: graph
                .modulation_sources()
                .iter()
                .filter_map(|s| {
                    graph.source_state(s.id()).map(|state| SourceDescription {
                        id: s.id(),
                        source: EffectConfig::from_state(&state),
                    })
                })
                .collect(),
            modulations: graph.modulations().to_vec(),
        }
    }

    /// Instantiate the described graph.
    ///
    /// Nodes go in first, then connections, then sources and modulations,
    /// so every reference is resolvable when it is inserted. The first
    /// rejected entry aborts the build.
    pub fn build(&self, registry: &EffectRegistry) -> Result<FilterGraph, ConfigError> {
        let mut graph = FilterGraph::new();
        for node in &self.nodes {
            let effect = registry.build(&node.effect.to_state())?;
            graph.add_node_with_id(node.id, effect)?;
        }
        for connection in &self.connections {
            graph.insert_connection(*connection)?;
        }
        for source in &self.sources {
            let instance = registry.build_source(&source.source.to_state())?;
            graph.add_modulation_source_with_id(source.id, instance)?;
        }
        for modulation in &self.modulations {
            graph.insert_modulation(modulation.clone())?;
        }
        Ok(graph)
    }

    /// Node by id.
    pub fn node(&self, id: NodeId) -> Option<&NodeDescription> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Id of the first node whose effect kind is `kind`.
    pub fn find_kind(&self, kind: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.effect.kind == kind).map(|n| n.id)
    }

    /// True if the description contains no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
