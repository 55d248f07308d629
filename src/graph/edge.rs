//! Edge implementation for the working graph
//!
//! Ownership and reference edges are singletons. Similarity edges own an
//! ordered list of pages, one per independent match between the endpoints.

use super::types::{EdgeId, EdgeKind, NodeId, SimilarityKind};
use super::property::PropertyMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One similarity match between two artifacts
///
/// `source_artifact` and `target_artifact` identify what was compared: segment
/// image paths for paintings, seal image paths for seals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityPage {
    pub score: f64,
    pub source_artifact: String,
    pub target_artifact: String,
    #[serde(default)]
    pub details: PropertyMap,
}

impl SimilarityPage {
    pub fn new(
        score: f64,
        source_artifact: impl Into<String>,
        target_artifact: impl Into<String>,
    ) -> Self {
        SimilarityPage {
            score,
            source_artifact: source_artifact.into(),
            target_artifact: target_artifact.into(),
            details: PropertyMap::new(),
        }
    }

    pub fn with_details(mut self, details: PropertyMap) -> Self {
        self.details = details;
        self
    }

    /// Same page seen from the other endpoint
    pub fn reversed(self) -> Self {
        SimilarityPage {
            score: self.score,
            source_artifact: self.target_artifact,
            target_artifact: self.source_artifact,
            details: self.details,
        }
    }

    /// Two pages record the same match when they compare the same artifact pair
    pub fn same_content(&self, other: &SimilarityPage) -> bool {
        self.source_artifact == other.source_artifact
            && self.target_artifact == other.target_artifact
    }
}

/// Kind-specific edge data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgePayload {
    Ownership,
    Reference {
        /// Citation info -> text excerpt
        citation: BTreeMap<String, String>,
    },
    Similarity {
        similarity: SimilarityKind,
        pages: Vec<SimilarityPage>,
        /// Displayed score, taken from the first page
        score: f64,
    },
}

/// A directed edge in the working graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Deterministic identifier
    pub id: EdgeId,

    /// Source node (first caller's order for similarity edges)
    pub source: NodeId,

    /// Target node
    pub target: NodeId,

    /// Relation tag, e.g. "S-P" or "P-P"
    pub relation: String,

    /// Display label
    pub label: String,

    pub payload: EdgePayload,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Edge {
    pub fn ownership(source: NodeId, target: NodeId, relation: &str) -> Self {
        Edge {
            id: EdgeId::ownership(&source, &target),
            source,
            target,
            relation: relation.to_string(),
            label: "owned by".to_string(),
            payload: EdgePayload::Ownership,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn reference(
        source: NodeId,
        target: NodeId,
        relation: &str,
        citation: BTreeMap<String, String>,
    ) -> Self {
        Edge {
            id: EdgeId::reference(&source, &target),
            source,
            target,
            relation: relation.to_string(),
            label: "cites".to_string(),
            payload: EdgePayload::Reference { citation },
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn similarity(
        source: NodeId,
        target: NodeId,
        kind: SimilarityKind,
        page: SimilarityPage,
    ) -> Self {
        let mut edge = Edge {
            id: EdgeId::similarity(&source, &target),
            source,
            target,
            relation: kind.relation().to_string(),
            label: String::new(),
            payload: EdgePayload::Similarity {
                similarity: kind,
                pages: vec![page],
                score: 0.0,
            },
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        edge.refresh_summary();
        edge
    }

    pub fn kind(&self) -> EdgeKind {
        match self.payload {
            EdgePayload::Ownership => EdgeKind::Ownership,
            EdgePayload::Reference { .. } => EdgeKind::Reference,
            EdgePayload::Similarity { .. } => EdgeKind::Similarity,
        }
    }

    /// Check whether the edge touches the node at either end
    pub fn touches(&self, id: &NodeId) -> bool {
        &self.source == id || &self.target == id
    }

    /// The endpoint opposite `id`, if `id` is an endpoint
    pub fn other_end(&self, id: &NodeId) -> Option<&NodeId> {
        if &self.source == id {
            Some(&self.target)
        } else if &self.target == id {
            Some(&self.source)
        } else {
            None
        }
    }

    /// Similarity pages (empty for other kinds)
    pub fn pages(&self) -> &[SimilarityPage] {
        match &self.payload {
            EdgePayload::Similarity { pages, .. } => pages,
            _ => &[],
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages().len()
    }

    /// Displayed score for similarity edges
    pub fn score(&self) -> Option<f64> {
        match &self.payload {
            EdgePayload::Similarity { score, .. } => Some(*score),
            _ => None,
        }
    }

    /// Recompute summary fields from the first page
    pub(crate) fn refresh_summary(&mut self) {
        if let EdgePayload::Similarity { pages, score, .. } = &mut self.payload {
            let first = pages.first().map(|p| p.score).unwrap_or(0.0);
            *score = first;
            self.label = if pages.len() > 1 {
                format!("similarity {:.1}% ({} pages)", first * 100.0, pages.len())
            } else {
                format!("similarity {:.1}%", first * 100.0)
            };
        }
    }

    pub(crate) fn pages_mut(&mut self) -> Option<&mut Vec<SimilarityPage>> {
        match &mut self.payload {
            EdgePayload::Similarity { pages, .. } => Some(pages),
            _ => None,
        }
    }
}
