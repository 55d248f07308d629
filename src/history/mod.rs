//! History ledger
//!
//! Bounded, newest-first record of processed questions and the graph changes
//! each one caused. Supports undoing the newest record and removing a single
//! node or similarity page introduced by any record.

use crate::graph::{GraphError, Node, NodeId, WorkingGraph};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistoryError {
    #[error("History is empty")]
    Empty,

    #[error("No recorded change for node {node_id}{}", page_index.map(|p| format!(" page {}", p)).unwrap_or_default())]
    ChangeNotFound {
        node_id: NodeId,
        page_index: Option<usize>,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type HistoryResult<T> = Result<T, HistoryError>;

/// One graph change attributed to a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum NodeChange {
    /// Node introduced by the question
    New(Node),
    /// Node already present; its similarity match was already recorded
    Duplicate(Node),
    /// Page appended to the similarity edge between `endpoints`
    PageAdded {
        node: Node,
        endpoints: (NodeId, NodeId),
        page_index: usize,
    },
}

impl NodeChange {
    pub fn node(&self) -> &Node {
        match self {
            NodeChange::New(node) | NodeChange::Duplicate(node) => node,
            NodeChange::PageAdded { node, .. } => node,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node().id
    }

    pub fn is_new(&self) -> bool {
        matches!(self, NodeChange::New(_))
    }

    pub fn page_index(&self) -> Option<usize> {
        match self {
            NodeChange::PageAdded { page_index, .. } => Some(*page_index),
            _ => None,
        }
    }

    fn touches(&self, id: &NodeId) -> bool {
        match self {
            NodeChange::PageAdded { node, endpoints, .. } => {
                &node.id == id || &endpoints.0 == id || &endpoints.1 == id
            }
            other => other.node_id() == id,
        }
    }
}

fn same_pair(a: &(NodeId, NodeId), b: &(NodeId, NodeId)) -> bool {
    (a.0 == b.0 && a.1 == b.1) || (a.0 == b.1 && a.1 == b.0)
}

/// Audited entry of one processed question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub question: String,
    pub template_id: Option<String>,
    pub success: bool,
    pub short_message: String,
    pub full_answer: String,
    /// Unix milliseconds
    pub timestamp: i64,
    pub changes: Vec<NodeChange>,
}

impl HistoryRecord {
    pub fn new(
        question: impl Into<String>,
        template_id: Option<String>,
        success: bool,
        short_message: impl Into<String>,
        full_answer: impl Into<String>,
        changes: Vec<NodeChange>,
    ) -> Self {
        HistoryRecord {
            id: Uuid::new_v4(),
            question: question.into(),
            template_id,
            success,
            short_message: short_message.into(),
            full_answer: full_answer.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            changes,
        }
    }

    pub fn added_node_ids(&self) -> Vec<NodeId> {
        self.changes
            .iter()
            .filter(|c| c.is_new())
            .map(|c| c.node_id().clone())
            .collect()
    }
}

/// What `undo_last` reverted
#[derive(Debug, Clone, PartialEq)]
pub struct UndoReport {
    pub record: HistoryRecord,
    pub removed_nodes: Vec<NodeId>,
    pub removed_pages: usize,
}

/// What `remove_node_record` removed
#[derive(Debug, Clone, PartialEq)]
pub enum RemovalReport {
    Page {
        endpoints: (NodeId, NodeId),
        page_index: usize,
    },
    Node(NodeId),
}

/// Bounded ledger, newest record first
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    capacity: usize,
    records: VecDeque<HistoryRecord>,
}

impl HistoryLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        HistoryLedger {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Newest-first copies
    pub fn records(&self) -> Vec<HistoryRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&HistoryRecord> {
        self.records.front()
    }

    /// Add a record, evicting the oldest when full
    pub fn push(&mut self, record: HistoryRecord) -> Option<HistoryRecord> {
        self.records.push_front(record);
        if self.records.len() > self.capacity {
            let evicted = self.records.pop_back();
            if let Some(old) = &evicted {
                info!("History full, evicted record for \"{}\"", old.question);
            }
            evicted
        } else {
            None
        }
    }

    /// Revert the newest record
    ///
    /// New nodes are removed (each once, already-removed ones skipped) and
    /// appended pages are dropped. Duplicates need no revert.
    pub fn undo_last(&mut self, graph: &mut WorkingGraph) -> HistoryResult<UndoReport> {
        let record = self.records.pop_front().ok_or(HistoryError::Empty)?;

        let mut removed_nodes: Vec<NodeId> = Vec::new();
        let mut removed_pages = 0;

        // newest change first so page indices on one edge stay valid
        for change in record.changes.iter().rev() {
            match change {
                NodeChange::New(node) => {
                    if removed_nodes.contains(&node.id) || !graph.contains_node(&node.id) {
                        continue;
                    }
                    graph.remove_node(&node.id)?;
                    removed_nodes.push(node.id.clone());
                }
                NodeChange::PageAdded {
                    endpoints,
                    page_index,
                    ..
                } => {
                    let Some(edge) = graph.similarity_edge(&endpoints.0, &endpoints.1) else {
                        continue;
                    };
                    if *page_index >= edge.page_count() {
                        continue;
                    }
                    graph.remove_similarity_page(&endpoints.0, &endpoints.1, *page_index)?;
                    self.shift_pages(endpoints, *page_index);
                    removed_pages += 1;
                }
                NodeChange::Duplicate(_) => {}
            }
        }

        let removed: HashSet<NodeId> = removed_nodes.iter().cloned().collect();
        self.strip_nodes(&removed);
        info!(
            "Undid \"{}\": {} nodes, {} pages removed",
            record.question,
            removed_nodes.len(),
            removed_pages
        );

        Ok(UndoReport {
            record,
            removed_nodes,
            removed_pages,
        })
    }

    /// Remove one recorded node, or one recorded similarity page
    ///
    /// With `page_index`, the newest matching page entry is removed from its
    /// edge. Without it, the node itself is removed with every edge touching
    /// it, and every entry about it disappears from the ledger.
    pub fn remove_node_record(
        &mut self,
        graph: &mut WorkingGraph,
        node_id: &NodeId,
        page_index: Option<usize>,
    ) -> HistoryResult<RemovalReport> {
        let position = self.find_change(node_id, page_index).ok_or_else(|| {
            HistoryError::ChangeNotFound {
                node_id: node_id.clone(),
                page_index,
            }
        })?;
        let (record_idx, change_idx) = position;

        let change = self.records[record_idx].changes[change_idx].clone();
        match change {
            NodeChange::PageAdded {
                endpoints,
                page_index,
                ..
            } => {
                graph.remove_similarity_page(&endpoints.0, &endpoints.1, page_index)?;
                self.records[record_idx].changes.remove(change_idx);
                self.shift_pages(&endpoints, page_index);
                debug!("Removed page {} between {} and {}", page_index, endpoints.0, endpoints.1);
                Ok(RemovalReport::Page {
                    endpoints,
                    page_index,
                })
            }
            _ => {
                match graph.remove_node(node_id) {
                    Ok(_) | Err(GraphError::NodeNotFound(_)) => {}
                    Err(e) => return Err(e.into()),
                }
                let mut removed = HashSet::new();
                removed.insert(node_id.clone());
                self.strip_nodes(&removed);
                debug!("Removed node {} and its ledger entries", node_id);
                Ok(RemovalReport::Node(node_id.clone()))
            }
        }
    }

    fn find_change(&self, node_id: &NodeId, page_index: Option<usize>) -> Option<(usize, usize)> {
        self.records.iter().enumerate().find_map(|(r, record)| {
            record
                .changes
                .iter()
                .position(|change| {
                    change.node_id() == node_id
                        && match page_index {
                            Some(p) => change.page_index() == Some(p),
                            None => change.page_index().is_none(),
                        }
                })
                .map(|c| (r, c))
        })
    }

    /// After a page removal, later pages of the same edge move down by one
    fn shift_pages(&mut self, endpoints: &(NodeId, NodeId), removed_index: usize) {
        for record in self.records.iter_mut() {
            for change in record.changes.iter_mut() {
                if let NodeChange::PageAdded {
                    endpoints: ends,
                    page_index,
                    ..
                } = change
                {
                    if same_pair(ends, endpoints) && *page_index > removed_index {
                        *page_index -= 1;
                    }
                }
            }
        }
    }

    /// Drop every entry about the removed nodes, including pages on their edges
    fn strip_nodes(&mut self, removed: &HashSet<NodeId>) {
        if removed.is_empty() {
            return;
        }
        for record in self.records.iter_mut() {
            record
                .changes
                .retain(|change| !removed.iter().any(|id| change.touches(id)));
        }
    }
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, NodeSeed, PropertyMap, SimilarityPage};

    fn graph() -> WorkingGraph {
        WorkingGraph::with_author("AUTHOR", "Shitao", PropertyMap::new())
    }

    fn add_painting(graph: &mut WorkingGraph, id: &str) -> Node {
        graph
            .add_node(NodeKind::Painting, id, NodeSeed::new())
            .unwrap()
            .node
    }

    fn add_page(graph: &mut WorkingGraph, a: &str, b: &str, artifact: &str) -> NodeChange {
        let result = graph
            .add_similarity_edge(&a.into(), &b.into(), SimilarityPage::new(0.9, artifact, "t"))
            .unwrap();
        NodeChange::PageAdded {
            node: graph.node(&b.into()).unwrap(),
            endpoints: (result.edge.source.clone(), result.edge.target.clone()),
            page_index: result.page_index().unwrap(),
        }
    }

    fn record(question: &str, changes: Vec<NodeChange>) -> HistoryRecord {
        HistoryRecord::new(question, Some("t".to_string()), true, "ok", "ok", changes)
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut ledger = HistoryLedger::new(5);
        for i in 0..7 {
            ledger.push(record(&format!("q{}", i), vec![]));
        }
        assert_eq!(ledger.len(), 5);
        let questions: Vec<String> = ledger.records().into_iter().map(|r| r.question).collect();
        assert_eq!(questions, vec!["q6", "q5", "q4", "q3", "q2"]);
    }

    #[test]
    fn test_undo_empty() {
        let mut ledger = HistoryLedger::default();
        let mut graph = graph();
        assert_eq!(ledger.undo_last(&mut graph).unwrap_err(), HistoryError::Empty);
    }

    #[test]
    fn test_undo_removes_exactly_new_nodes() {
        let mut graph = graph();
        let mut ledger = HistoryLedger::default();

        let a = add_painting(&mut graph, "A");
        ledger.push(record("first", vec![NodeChange::New(a.clone())]));

        let b = add_painting(&mut graph, "B");
        let c = add_painting(&mut graph, "C");
        ledger.push(record(
            "second",
            vec![
                NodeChange::New(b),
                NodeChange::New(c.clone()),
                NodeChange::New(c),
                NodeChange::Duplicate(a),
            ],
        ));

        let report = ledger.undo_last(&mut graph).unwrap();
        assert_eq!(report.removed_nodes.len(), 2);
        assert_eq!(graph.node_count(), 2);
        assert!(graph.contains_node(&NodeId::new("A")));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_undo_reverts_page_only() {
        let mut graph = graph();
        let mut ledger = HistoryLedger::default();
        let a = add_painting(&mut graph, "A");
        let b = add_painting(&mut graph, "B");
        graph
            .add_similarity_edge(&a.id, &b.id, SimilarityPage::new(0.9, "a0", "b0"))
            .unwrap();

        let page = add_page(&mut graph, "A", "B", "a1");
        ledger.push(record("page", vec![page]));

        let report = ledger.undo_last(&mut graph).unwrap();
        assert_eq!(report.removed_pages, 1);
        assert!(report.removed_nodes.is_empty());
        assert_eq!(graph.similarity_edge(&a.id, &b.id).unwrap().page_count(), 1);
    }

    #[test]
    fn test_undo_strips_removed_from_older_records() {
        let mut graph = graph();
        let mut ledger = HistoryLedger::default();
        let a = add_painting(&mut graph, "A");
        ledger.push(record("dup", vec![NodeChange::Duplicate(a.clone())]));
        ledger.push(record("new", vec![NodeChange::New(a)]));

        ledger.undo_last(&mut graph).unwrap();
        assert!(ledger.latest().unwrap().changes.is_empty());
    }

    #[test]
    fn test_remove_page_shifts_later_indices() {
        let mut graph = graph();
        let mut ledger = HistoryLedger::default();
        add_painting(&mut graph, "A");
        add_painting(&mut graph, "B");
        graph
            .add_similarity_edge(&"A".into(), &"B".into(), SimilarityPage::new(0.9, "a0", "b"))
            .unwrap();

        let p1 = add_page(&mut graph, "A", "B", "a1");
        ledger.push(record("one", vec![p1]));
        let p2 = add_page(&mut graph, "B", "A", "a2");
        ledger.push(record("two", vec![p2]));

        let report = ledger
            .remove_node_record(&mut graph, &NodeId::new("B"), Some(1))
            .unwrap();
        assert!(matches!(report, RemovalReport::Page { page_index: 1, .. }));

        let edge = graph.similarity_edge(&"A".into(), &"B".into()).unwrap();
        assert_eq!(edge.page_count(), 2);
        assert_eq!(edge.pages()[1].source_artifact, "t");

        // the newer record's page moved from 2 to 1
        let newest = ledger.latest().unwrap();
        assert_eq!(newest.changes[0].page_index(), Some(1));
        assert!(graph.contains_node(&NodeId::new("B")));
    }

    #[test]
    fn test_remove_node_strips_all_entries() {
        let mut graph = graph();
        let mut ledger = HistoryLedger::default();
        let a = add_painting(&mut graph, "A");
        let b = add_painting(&mut graph, "B");
        let c = add_painting(&mut graph, "C");
        graph
            .add_similarity_edge(&a.id, &b.id, SimilarityPage::new(0.9, "a0", "b0"))
            .unwrap();
        graph
            .add_similarity_edge(&c.id, &b.id, SimilarityPage::new(0.9, "c0", "b0"))
            .unwrap();
        ledger.push(record("one", vec![NodeChange::New(a), NodeChange::New(b)]));
        let page = add_page(&mut graph, "C", "B", "c1");
        let page = match page {
            NodeChange::PageAdded { endpoints, page_index, .. } => NodeChange::PageAdded {
                node: c.clone(),
                endpoints,
                page_index,
            },
            other => other,
        };
        ledger.push(record("two", vec![NodeChange::New(c), page]));

        ledger
            .remove_node_record(&mut graph, &NodeId::new("B"), None)
            .unwrap();
        assert!(!graph.contains_node(&NodeId::new("B")));

        let records = ledger.records();
        assert_eq!(records[1].changes.len(), 1);
        assert_eq!(records[0].changes.len(), 1);
        assert!(records[0].changes[0].is_new());
    }

    #[test]
    fn test_remove_unknown_change() {
        let mut graph = graph();
        let mut ledger = HistoryLedger::default();
        let err = ledger
            .remove_node_record(&mut graph, &NodeId::new("ghost"), None)
            .unwrap_err();
        assert!(matches!(err, HistoryError::ChangeNotFound { .. }));
    }
}
