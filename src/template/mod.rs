//! Query templates
//!
//! A template is a named, catalog-registered graph traversal: it reads the
//! reference dataset and extends the working graph. The router picks one per
//! question; each is bound to a `TemplateHandler`.

pub mod catalog;
pub mod handlers;

pub use catalog::TemplateCatalog;

use crate::graph::{
    Edge, GraphError, Node, NodeAddition, SimilarityAddition, SimilarityOutcome, WorkingGraph,
};
use crate::history::NodeChange;
use crate::nlq::{Assistant, NLQError, TemplateDescriptor};
use crate::reference::{ReferenceStore, SimilarityRange};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Assistant error: {0}")]
    Assistant(#[from] NLQError),

    #[error("Handler failed: {0}")]
    Failed(String),
}

pub type TemplateResult<T> = Result<T, TemplateError>;

/// What the analyst can have selected on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    Segment,
    Seal,
}

impl fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionKind::Segment => write!(f, "segment"),
            SelectionKind::Seal => write!(f, "seal"),
        }
    }
}

/// One selected item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectedItem {
    /// Segment cut from a painting image
    Segment {
        image_id: String,
        path: String,
        #[serde(default)]
        name: Option<String>,
    },
    /// Seal impression, by code
    Seal {
        code: String,
        #[serde(default)]
        image: Option<String>,
    },
}

impl SelectedItem {
    pub fn segment(image_id: impl Into<String>, path: impl Into<String>) -> Self {
        SelectedItem::Segment {
            image_id: image_id.into(),
            path: path.into(),
            name: None,
        }
    }

    pub fn seal(code: impl Into<String>) -> Self {
        SelectedItem::Seal {
            code: code.into(),
            image: None,
        }
    }

    pub fn kind(&self) -> SelectionKind {
        match self {
            SelectedItem::Segment { .. } => SelectionKind::Segment,
            SelectedItem::Seal { .. } => SelectionKind::Seal,
        }
    }
}

pub fn has_selected(selection: &[SelectedItem], kind: SelectionKind) -> bool {
    selection.iter().any(|item| item.kind() == kind)
}

/// Applicability rule evaluated against the current selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Template is hidden while this kind is selected
    WhenSelected(SelectionKind),
    /// Template is hidden until this kind is selected
    UnlessSelected(SelectionKind),
}

impl Exclusion {
    pub fn excludes(&self, selection: &[SelectedItem]) -> bool {
        match self {
            Exclusion::WhenSelected(kind) => has_selected(selection, *kind),
            Exclusion::UnlessSelected(kind) => !has_selected(selection, *kind),
        }
    }
}

/// Everything a handler may read besides the graph and dataset
pub struct HandlerContext<'a> {
    pub question: &'a str,
    pub current_painting: Option<&'a str>,
    pub selection: &'a [SelectedItem],
    pub similarity_range: SimilarityRange,
    pub assistant: &'a dyn Assistant,
}

/// Result of one handler run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerOutput {
    pub message: String,
    pub data: serde_json::Value,
    pub changes: Vec<NodeChange>,
    pub added_edges: Vec<Edge>,
}

impl HandlerOutput {
    /// Lookup miss: explanatory message, nothing changed
    pub fn message(message: impl Into<String>) -> Self {
        HandlerOutput {
            message: message.into(),
            data: serde_json::Value::Null,
            ..Default::default()
        }
    }

    pub fn added_node_count(&self) -> usize {
        self.changes.iter().filter(|c| c.is_new()).count()
    }
}

#[async_trait]
pub trait TemplateHandler: Send + Sync {
    async fn handle(
        &self,
        graph: &mut WorkingGraph,
        refs: &ReferenceStore,
        ctx: &HandlerContext<'_>,
    ) -> TemplateResult<HandlerOutput>;
}

/// Catalog entry
#[derive(Clone)]
pub struct QueryTemplate {
    pub id: &'static str,
    pub description: &'static str,
    /// Relation path the template traverses, e.g. `P-S`
    pub relationship: &'static str,
    /// Lower-case trigger keywords for the deterministic fallback
    pub keywords: &'static [&'static str],
    /// At least one of these must be selected
    pub required_selection: &'static [SelectionKind],
    pub excluded_when: Option<Exclusion>,
    pub handler: Arc<dyn TemplateHandler>,
}

impl QueryTemplate {
    pub fn is_applicable(&self, selection: &[SelectedItem]) -> bool {
        !self
            .excluded_when
            .map_or(false, |rule| rule.excludes(selection))
    }

    /// Message naming the missing selection, if the requirement is unmet
    pub fn missing_requirement(&self, selection: &[SelectedItem]) -> Option<String> {
        if self.required_selection.is_empty()
            || self
                .required_selection
                .iter()
                .any(|kind| has_selected(selection, *kind))
        {
            return None;
        }
        let names: Vec<String> = self
            .required_selection
            .iter()
            .map(|k| k.to_string())
            .collect();
        Some(format!(
            "This question requires a selected {} first",
            names.join(" or ")
        ))
    }

    /// Number of trigger keywords contained in the lower-cased question
    pub fn keyword_score(&self, question: &str) -> usize {
        let question = question.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| question.contains(*k))
            .count()
    }

    pub fn descriptor(&self) -> TemplateDescriptor {
        TemplateDescriptor {
            id: self.id.to_string(),
            description: self.description.to_string(),
            relationship: self.relationship.to_string(),
            keywords: self.keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl fmt::Debug for QueryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryTemplate")
            .field("id", &self.id)
            .field("relationship", &self.relationship)
            .field("required_selection", &self.required_selection)
            .field("excluded_when", &self.excluded_when)
            .finish()
    }
}

/// Collects the changes and new edges a handler causes
#[derive(Debug, Default)]
pub struct ChangeRecorder {
    changes: Vec<NodeChange>,
    added_edges: Vec<Edge>,
}

impl ChangeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node add
    ///
    /// The ownership edge placing the node is structural and goes with the
    /// node; it is not reported as an added edge.
    pub fn node(&mut self, addition: &NodeAddition) {
        if addition.is_new {
            self.push_change(NodeChange::New(addition.node.clone()));
        }
    }

    /// Record an edge that may or may not be new
    pub fn edge(&mut self, edge: &Edge, is_new: bool) {
        if is_new {
            self.added_edges.push(edge.clone());
        }
    }

    /// Record a similarity add against the node it reached
    ///
    /// A fresh edge between two nodes already in the graph is logged as its
    /// first page so undo can take it back out.
    pub fn similarity(&mut self, node: &NodeAddition, addition: &SimilarityAddition) {
        let edge = &addition.edge;
        let endpoints = (edge.source.clone(), edge.target.clone());
        match addition.outcome {
            SimilarityOutcome::PageAdded { page_index } => {
                self.push_change(NodeChange::PageAdded {
                    node: node.node.clone(),
                    endpoints,
                    page_index,
                });
                self.added_edges.push(edge.clone());
            }
            SimilarityOutcome::New => {
                if !node.is_new {
                    self.push_change(NodeChange::PageAdded {
                        node: node.node.clone(),
                        endpoints,
                        page_index: 0,
                    });
                }
                self.added_edges.push(edge.clone());
            }
            SimilarityOutcome::Duplicate => {
                if !node.is_new {
                    self.push_change(NodeChange::Duplicate(node.node.clone()));
                }
            }
        }
    }

    fn push_change(&mut self, change: NodeChange) {
        let already = self.changes.iter().any(|c| match (c, &change) {
            (NodeChange::New(a), NodeChange::New(b)) => a.id == b.id,
            (NodeChange::Duplicate(a), NodeChange::Duplicate(b)) => a.id == b.id,
            _ => false,
        });
        if !already {
            self.changes.push(change);
        }
    }

    pub fn changes(&self) -> &[NodeChange] {
        &self.changes
    }

    pub fn finish(self, message: impl Into<String>, data: serde_json::Value) -> HandlerOutput {
        HandlerOutput {
            message: message.into(),
            data,
            changes: self.changes,
            added_edges: self.added_edges,
        }
    }
}

/// Human-readable "Kind: label" line for answer synthesis
pub fn describe_node(node: &Node) -> String {
    format!("{}: {}", node.kind, node.label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, NodeSeed, PropertyMap, SimilarityPage};

    #[test]
    fn test_exclusion_rules() {
        let seal = vec![SelectedItem::seal("0003")];
        let segment = vec![SelectedItem::segment("D001", "seg/1.png")];

        let rule = Exclusion::WhenSelected(SelectionKind::Seal);
        assert!(rule.excludes(&seal));
        assert!(!rule.excludes(&segment));

        let rule = Exclusion::UnlessSelected(SelectionKind::Seal);
        assert!(!rule.excludes(&seal));
        assert!(rule.excludes(&[]));
    }

    #[test]
    fn test_selection_serde() {
        let item: SelectedItem =
            serde_json::from_str(r#"{"kind": "segment", "image_id": "D001_1", "path": "a.png"}"#)
                .unwrap();
        assert_eq!(item.kind(), SelectionKind::Segment);
    }

    #[test]
    fn test_recorder_classification() {
        let mut graph = WorkingGraph::with_author("AUTHOR", "Shitao", PropertyMap::new());
        let mut recorder = ChangeRecorder::new();

        let a = graph.add_node(NodeKind::Painting, "A", NodeSeed::new()).unwrap();
        let b = graph.add_node(NodeKind::Painting, "B", NodeSeed::new()).unwrap();
        recorder.node(&a);
        recorder.node(&b);

        let sim = graph
            .add_similarity_edge(&a.node.id, &b.node.id, SimilarityPage::new(0.9, "a", "b"))
            .unwrap();
        recorder.similarity(&b, &sim);
        assert_eq!(recorder.changes().len(), 2);

        // second question: same page again, then a new page
        let b_again = graph.add_node(NodeKind::Painting, "B", NodeSeed::new()).unwrap();
        let mut recorder = ChangeRecorder::new();
        let dup = graph
            .add_similarity_edge(&a.node.id, &b.node.id, SimilarityPage::new(0.9, "a", "b"))
            .unwrap();
        recorder.similarity(&b_again, &dup);
        let page = graph
            .add_similarity_edge(&b.node.id, &a.node.id, SimilarityPage::new(0.8, "b2", "a2"))
            .unwrap();
        recorder.similarity(&b_again, &page);

        let output = recorder.finish("ok", serde_json::Value::Null);
        assert!(matches!(output.changes[0], NodeChange::Duplicate(_)));
        assert!(matches!(
            output.changes[1],
            NodeChange::PageAdded { page_index: 1, .. }
        ));
        assert_eq!(output.added_edges.len(), 1);
        assert_eq!(output.added_node_count(), 0);
    }
}
