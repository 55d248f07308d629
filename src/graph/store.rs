//! In-memory working graph
//!
//! Node and edge storage keyed by deterministic ids, kept in insertion order so
//! snapshots are stable. Exactly one anchor (author) node always exists.

use super::edge::{Edge, EdgePayload, SimilarityPage};
use super::node::{Node, NodeSeed};
use super::property::PropertyMap;
use super::types::{
    ownership_relation, reference_relation, EdgeId, EdgeKind, NodeId, NodeKind, SimilarityKind,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during graph operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Edge {0} not found")]
    EdgeNotFound(EdgeId),

    #[error("Node {id} already exists as {existing}, cannot add it as {requested}")]
    KindConflict {
        id: NodeId,
        existing: NodeKind,
        requested: NodeKind,
    },

    #[error("Invalid {kind} edge: {source_kind} {source_id} -> {target_kind} {target_id}")]
    InvalidEndpoints {
        kind: EdgeKind,
        source_id: NodeId,
        source_kind: NodeKind,
        target_id: NodeId,
        target_kind: NodeKind,
    },

    #[error("Anchor node {0} cannot be removed")]
    AnchorNodeProtected(NodeId),

    #[error("Page {index} out of range for edge {edge} ({len} pages)")]
    PageOutOfRange { edge: EdgeId, index: usize, len: usize },
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Result of `WorkingGraph::add_node`
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAddition {
    pub node: Node,
    pub is_new: bool,
    /// Ownership edge ensured for the seed's owner, if any
    pub ownership: Option<EdgeAddition>,
}

/// Result of adding a singleton edge
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeAddition {
    pub edge: Edge,
    pub is_new: bool,
}

/// What a similarity add did to the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SimilarityOutcome {
    /// Edge created with one page
    New,
    /// Page appended to an existing edge
    PageAdded { page_index: usize },
    /// Same content already recorded; nothing changed
    Duplicate,
}

/// Result of `WorkingGraph::add_similarity_edge`
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityAddition {
    pub edge: Edge,
    pub outcome: SimilarityOutcome,
}

impl SimilarityAddition {
    pub fn is_new(&self) -> bool {
        self.outcome == SimilarityOutcome::New
    }

    pub fn is_duplicate(&self) -> bool {
        self.outcome == SimilarityOutcome::Duplicate
    }

    pub fn page_index(&self) -> Option<usize> {
        match self.outcome {
            SimilarityOutcome::PageAdded { page_index } => Some(page_index),
            _ => None,
        }
    }
}

/// Result of `WorkingGraph::remove_similarity_page`
#[derive(Debug, Clone, PartialEq)]
pub enum PageRemoval {
    /// Page removed; the edge keeps `remaining` pages
    PageRemoved { remaining: usize },
    /// Last page removed; the edge is gone
    EdgeRemoved,
}

/// Caller-owned copy of the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub anchor: NodeId,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| &e.id == id)
    }
}

/// Mutable, session-scoped node/edge store
///
/// - nodes: NodeId -> Node (insertion ordered)
/// - edges: EdgeId -> Edge (insertion ordered)
/// - adjacency: NodeId -> edges touching it, in either direction
#[derive(Debug, Clone)]
pub struct WorkingGraph {
    anchor: Node,
    nodes: IndexMap<NodeId, Node>,
    edges: IndexMap<EdgeId, Edge>,
    adjacency: HashMap<NodeId, Vec<EdgeId>>,
}

impl WorkingGraph {
    /// Create a graph holding only the anchor node
    pub fn new(anchor: Node) -> Self {
        let mut graph = WorkingGraph {
            anchor,
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            adjacency: HashMap::new(),
        };
        graph.install_anchor();
        graph
    }

    /// Create a graph whose anchor is an author node
    pub fn with_author(id: impl Into<NodeId>, label: impl Into<String>, properties: PropertyMap) -> Self {
        Self::new(Node::new_with_properties(
            id.into(),
            NodeKind::Author,
            label,
            properties,
        ))
    }

    fn install_anchor(&mut self) {
        let mut anchor = self.anchor.clone();
        anchor.created_at = chrono::Utc::now().timestamp_millis();
        self.adjacency.insert(anchor.id.clone(), Vec::new());
        self.nodes.insert(anchor.id.clone(), anchor);
    }

    pub fn anchor_id(&self) -> &NodeId {
        &self.anchor.id
    }

    /// Add a node, or return the existing one with the same id
    ///
    /// Painting and standard seal nodes are owned by the anchor unless the seed
    /// names another owner. An owner that is not in the graph is skipped.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        id: impl Into<NodeId>,
        seed: NodeSeed,
    ) -> GraphResult<NodeAddition> {
        let id = id.into();

        if let Some(existing) = self.nodes.get(&id) {
            if existing.kind != kind {
                return Err(GraphError::KindConflict {
                    id,
                    existing: existing.kind,
                    requested: kind,
                });
            }
        }

        let owner = seed.owner.clone().or_else(|| match kind {
            NodeKind::Painting | NodeKind::StandardSeal => Some(self.anchor.id.clone()),
            _ => None,
        });
        let owner = owner.filter(|owner_id| {
            let present = self.nodes.contains_key(owner_id);
            if !present {
                debug!("Owner {} of {} not in graph, skipping ownership", owner_id, id);
            }
            present
        });
        if let Some(owner_id) = &owner {
            self.check_ownership(&id, kind, owner_id)?;
        }

        let is_new = !self.nodes.contains_key(&id);
        if is_new {
            let label = seed.label.unwrap_or_else(|| id.to_string());
            let node = Node::new_with_properties(id.clone(), kind, label, seed.properties);
            self.adjacency.insert(id.clone(), Vec::new());
            self.nodes.insert(id.clone(), node);
            debug!("Added {} node {}", kind, id);
        }

        let ownership = match owner {
            Some(owner_id) => Some(self.add_ownership_edge(&id, &owner_id)?),
            None => None,
        };

        let node = self.nodes.get(&id).cloned().ok_or(GraphError::NodeNotFound(id))?;
        Ok(NodeAddition {
            node,
            is_new,
            ownership,
        })
    }

    fn check_ownership(&self, child: &NodeId, child_kind: NodeKind, parent: &NodeId) -> GraphResult<()> {
        let parent_kind = self.kind_of(parent)?;
        if ownership_relation(child_kind, parent_kind).is_none() {
            return Err(GraphError::InvalidEndpoints {
                kind: EdgeKind::Ownership,
                source_id: child.clone(),
                source_kind: child_kind,
                target_id: parent.clone(),
                target_kind: parent_kind,
            });
        }
        Ok(())
    }

    fn kind_of(&self, id: &NodeId) -> GraphResult<NodeKind> {
        self.nodes
            .get(id)
            .map(|n| n.kind)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))
    }

    fn invalid_endpoints(&self, kind: EdgeKind, source: &NodeId, target: &NodeId) -> GraphError {
        let source_kind = self.nodes.get(source).map(|n| n.kind);
        let target_kind = self.nodes.get(target).map(|n| n.kind);
        match (source_kind, target_kind) {
            (Some(source_kind), Some(target_kind)) => GraphError::InvalidEndpoints {
                kind,
                source_id: source.clone(),
                source_kind,
                target_id: target.clone(),
                target_kind,
            },
            (None, _) => GraphError::NodeNotFound(source.clone()),
            (_, None) => GraphError::NodeNotFound(target.clone()),
        }
    }

    fn insert_edge(&mut self, edge: Edge) {
        for end in [&edge.source, &edge.target] {
            self.adjacency
                .entry(end.clone())
                .or_default()
                .push(edge.id.clone());
        }
        self.edges.insert(edge.id.clone(), edge);
    }

    fn detach_edge(&mut self, id: &EdgeId) -> Option<Edge> {
        let edge = self.edges.shift_remove(id)?;
        for end in [&edge.source, &edge.target] {
            if let Some(list) = self.adjacency.get_mut(end) {
                list.retain(|e| e != id);
            }
        }
        Some(edge)
    }

    /// Ensure the child -> parent ownership edge exists
    pub fn add_ownership_edge(&mut self, child: &NodeId, parent: &NodeId) -> GraphResult<EdgeAddition> {
        let child_kind = self.kind_of(child)?;
        let parent_kind = self.kind_of(parent)?;
        let relation = ownership_relation(child_kind, parent_kind)
            .ok_or_else(|| self.invalid_endpoints(EdgeKind::Ownership, child, parent))?;

        let id = EdgeId::ownership(child, parent);
        if let Some(edge) = self.edges.get(&id) {
            return Ok(EdgeAddition {
                edge: edge.clone(),
                is_new: false,
            });
        }

        let edge = Edge::ownership(child.clone(), parent.clone(), relation);
        self.insert_edge(edge.clone());
        Ok(EdgeAddition { edge, is_new: true })
    }

    /// Ensure the source -> reference citation edge exists
    pub fn add_reference_edge(
        &mut self,
        source: &NodeId,
        reference: &NodeId,
        citation: BTreeMap<String, String>,
    ) -> GraphResult<EdgeAddition> {
        let source_kind = self.kind_of(source)?;
        let target_kind = self.kind_of(reference)?;
        let relation = reference_relation(source_kind, target_kind)
            .ok_or_else(|| self.invalid_endpoints(EdgeKind::Reference, source, reference))?;

        let id = EdgeId::reference(source, reference);
        if let Some(edge) = self.edges.get(&id) {
            return Ok(EdgeAddition {
                edge: edge.clone(),
                is_new: false,
            });
        }

        let edge = Edge::reference(source.clone(), reference.clone(), relation, citation);
        self.insert_edge(edge.clone());
        Ok(EdgeAddition { edge, is_new: true })
    }

    /// Record a similarity match between `a` and `b`
    ///
    /// `page` is oriented from `a` to `b`. The edge keeps the direction of the
    /// first add; later pages are flipped to match before the duplicate check.
    pub fn add_similarity_edge(
        &mut self,
        a: &NodeId,
        b: &NodeId,
        page: SimilarityPage,
    ) -> GraphResult<SimilarityAddition> {
        let a_kind = self.kind_of(a)?;
        let b_kind = self.kind_of(b)?;
        let similarity = SimilarityKind::between(a_kind, b_kind)
            .filter(|_| a != b)
            .ok_or_else(|| self.invalid_endpoints(EdgeKind::Similarity, a, b))?;

        let id = EdgeId::similarity(a, b);
        let Some(edge) = self.edges.get_mut(&id) else {
            let edge = Edge::similarity(a.clone(), b.clone(), similarity, page);
            self.insert_edge(edge.clone());
            debug!("Created similarity edge {}", id);
            return Ok(SimilarityAddition {
                edge,
                outcome: SimilarityOutcome::New,
            });
        };

        let page = if &edge.source == a { page } else { page.reversed() };
        if edge.pages().iter().any(|p| p.same_content(&page)) {
            return Ok(SimilarityAddition {
                edge: edge.clone(),
                outcome: SimilarityOutcome::Duplicate,
            });
        }

        let page_index = match edge.pages_mut() {
            Some(pages) => {
                pages.push(page);
                pages.len() - 1
            }
            None => return Err(GraphError::EdgeNotFound(id)),
        };
        edge.refresh_summary();
        debug!("Appended page {} to similarity edge {}", page_index, id);

        Ok(SimilarityAddition {
            edge: edge.clone(),
            outcome: SimilarityOutcome::PageAdded { page_index },
        })
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, id: &NodeId) -> GraphResult<Node> {
        if id == &self.anchor.id {
            return Err(GraphError::AnchorNodeProtected(id.clone()));
        }
        let node = self
            .nodes
            .shift_remove(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;

        let touching = self.adjacency.remove(id).unwrap_or_default();
        for edge_id in &touching {
            self.detach_edge(edge_id);
        }
        debug!("Removed node {} and {} edges", id, touching.len());
        Ok(node)
    }

    /// Remove one page from the similarity edge between `a` and `b`
    pub fn remove_similarity_page(
        &mut self,
        a: &NodeId,
        b: &NodeId,
        page_index: usize,
    ) -> GraphResult<PageRemoval> {
        let id = EdgeId::similarity(a, b);
        let edge = self
            .edges
            .get_mut(&id)
            .ok_or_else(|| GraphError::EdgeNotFound(id.clone()))?;
        let pages = edge
            .pages_mut()
            .ok_or_else(|| GraphError::EdgeNotFound(id.clone()))?;
        if page_index >= pages.len() {
            return Err(GraphError::PageOutOfRange {
                edge: id.clone(),
                index: page_index,
                len: pages.len(),
            });
        }

        pages.remove(page_index);
        let remaining = pages.len();
        if remaining == 0 {
            self.detach_edge(&id);
            debug!("Removed last page of {}, edge deleted", id);
            return Ok(PageRemoval::EdgeRemoved);
        }
        edge.refresh_summary();
        Ok(PageRemoval::PageRemoved { remaining })
    }

    /// Drop every node and edge, then recreate the anchor
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.adjacency.clear();
        self.install_anchor();
    }

    /// Deep copy of all nodes and edges in insertion order
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            anchor: self.anchor.id.clone(),
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.values().cloned().collect(),
        }
    }

    pub fn node(&self, id: &NodeId) -> Option<Node> {
        self.nodes.get(id).cloned()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<Edge> {
        self.edges.get(id).cloned()
    }

    pub fn similarity_edge(&self, a: &NodeId, b: &NodeId) -> Option<Edge> {
        self.edge(&EdgeId::similarity(a, b))
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<Node> {
        self.nodes
            .values()
            .filter(|n| n.kind == kind)
            .cloned()
            .collect()
    }

    pub fn edges_touching(&self, id: &NodeId) -> Vec<Edge> {
        self.adjacency
            .get(id)
            .map(|ids| ids.iter().filter_map(|e| self.edges.get(e)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Payload-aware edge count by kind
    pub fn edge_count_of_kind(&self, kind: EdgeKind) -> usize {
        self.edges
            .values()
            .filter(|e| match (&e.payload, kind) {
                (EdgePayload::Ownership, EdgeKind::Ownership) => true,
                (EdgePayload::Reference { .. }, EdgeKind::Reference) => true,
                (EdgePayload::Similarity { .. }, EdgeKind::Similarity) => true,
                _ => false,
            })
            .count()
    }
}
