//! Node implementation for the working graph

use super::property::{PropertyMap, PropertyValue};
use super::types::{NodeId, NodeKind};
use serde::{Deserialize, Serialize};

/// A node in the working graph
///
/// Nodes have:
/// - A unique ID (shared namespace across kinds)
/// - A kind (painting, seal, ...)
/// - A display label
/// - Attributes copied from the reference record
/// - Creation timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node
    pub id: NodeId,

    /// Kind of artifact
    pub kind: NodeKind,

    /// Human readable label (painting name, seal code, ...)
    pub label: String,

    /// Attributes associated with this node
    pub properties: PropertyMap,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Node {
    /// Create a new node without attributes
    pub fn new(id: NodeId, kind: NodeKind, label: impl Into<String>) -> Self {
        Node {
            id,
            kind,
            label: label.into(),
            properties: PropertyMap::new(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a new node with attributes
    pub fn new_with_properties(
        id: NodeId,
        kind: NodeKind,
        label: impl Into<String>,
        properties: PropertyMap,
    ) -> Self {
        let mut node = Node::new(id, kind, label);
        node.properties = properties;
        node
    }

    /// Set a property value
    pub fn set_property(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        self.properties.insert(key.into(), value.into())
    }

    /// Get a property value
    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Check if property exists
    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn is_kind(&self, kind: NodeKind) -> bool {
        self.kind == kind
    }
}

/// Construction data for `WorkingGraph::add_node`
///
/// `owner` carries relational context: a seal observed under a painting names
/// that painting so the ownership edge is ensured even when the seal node
/// already exists.
#[derive(Debug, Clone, Default)]
pub struct NodeSeed {
    pub label: Option<String>,
    pub properties: PropertyMap,
    pub owner: Option<NodeId>,
}

impl NodeSeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn properties(mut self, properties: PropertyMap) -> Self {
        self.properties = properties;
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn owner(mut self, owner: impl Into<NodeId>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}
