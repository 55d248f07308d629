//! Core type definitions for the working graph

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a node
///
/// Ids live in one flat namespace shared by every node kind, so a painting id
/// and a seal code can never denote the same node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<&NodeId> for NodeId {
    fn from(id: &NodeId) -> Self {
        id.clone()
    }
}

/// Unique identifier for an edge, derived from `(kind, source, target)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EdgeId(String);

impl EdgeId {
    /// Ownership edges are directed child -> parent
    pub fn ownership(child: &NodeId, parent: &NodeId) -> Self {
        EdgeId(format!("ownership:{}->{}", child, parent))
    }

    /// Reference edges are directed source -> reference
    pub fn reference(source: &NodeId, reference: &NodeId) -> Self {
        EdgeId(format!("reference:{}->{}", source, reference))
    }

    /// Similarity edges are keyed by the unordered endpoint pair
    pub fn similarity(a: &NodeId, b: &NodeId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        EdgeId(format!("similarity:{}<->{}", lo, hi))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of artifact a node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum NodeKind {
    Painting,
    Author,
    Seal,
    StandardSeal,
    Reference,
}

impl NodeKind {
    /// Short code used in relation tags (e.g. "S-P")
    pub fn code(&self) -> &'static str {
        match self {
            NodeKind::Painting => "P",
            NodeKind::Author => "A",
            NodeKind::Seal => "S",
            NodeKind::StandardSeal => "SS",
            NodeKind::Reference => "R",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Painting => "Painting",
            NodeKind::Author => "Author",
            NodeKind::Seal => "Seal",
            NodeKind::StandardSeal => "StandardSeal",
            NodeKind::Reference => "Reference",
        };
        write!(f, "{}", name)
    }
}

/// Edge kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Ownership,
    Reference,
    Similarity,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeKind::Ownership => "ownership",
            EdgeKind::Reference => "reference",
            EdgeKind::Similarity => "similarity",
        };
        write!(f, "{}", name)
    }
}

/// Which pair of artifact kinds a similarity edge compares.
///
/// Determines the page-equality rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimilarityKind {
    PaintingPainting,
    SealStandardSeal,
    SealSeal,
}

impl SimilarityKind {
    /// Classify an endpoint pair, in either order
    pub fn between(a: NodeKind, b: NodeKind) -> Option<Self> {
        match (a, b) {
            (NodeKind::Painting, NodeKind::Painting) => Some(SimilarityKind::PaintingPainting),
            (NodeKind::Seal, NodeKind::StandardSeal) | (NodeKind::StandardSeal, NodeKind::Seal) => {
                Some(SimilarityKind::SealStandardSeal)
            }
            (NodeKind::Seal, NodeKind::Seal) => Some(SimilarityKind::SealSeal),
            _ => None,
        }
    }

    pub fn relation(&self) -> &'static str {
        match self {
            SimilarityKind::PaintingPainting => "P-P",
            SimilarityKind::SealStandardSeal => "S-SS",
            SimilarityKind::SealSeal => "S-S",
        }
    }
}

/// Relation tag carried by ownership edges (child-parent)
pub fn ownership_relation(child: NodeKind, parent: NodeKind) -> Option<&'static str> {
    match (child, parent) {
        (NodeKind::Seal, NodeKind::Painting) => Some("S-P"),
        (NodeKind::Painting, NodeKind::Author) => Some("P-A"),
        (NodeKind::StandardSeal, NodeKind::Author) => Some("SS-A"),
        (NodeKind::Seal, NodeKind::Author) => Some("S-A"),
        _ => None,
    }
}

/// Relation tag carried by reference edges
pub fn reference_relation(source: NodeKind, target: NodeKind) -> Option<&'static str> {
    match (source, target) {
        (NodeKind::Painting, NodeKind::Reference) => Some("P-R"),
        (NodeKind::Author, NodeKind::Reference) => Some("A-R"),
        _ => None,
    }
}
