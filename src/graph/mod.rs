//! Working graph implementation
//!
//! This module implements the evidence graph built during an authentication
//! session:
//! - Nodes for paintings, seals, standard seals, references and the author
//! - Singleton ownership and reference edges
//! - Paginated similarity edges holding several independent matches
//! - Insertion-ordered in-memory storage with caller-owned snapshots

pub mod edge;
pub mod node;
pub mod property;
pub mod store;
pub mod types;

// Re-export main types
pub use edge::{Edge, EdgePayload, SimilarityPage};
pub use node::{Node, NodeSeed};
pub use property::{properties_from_json, PropertyMap, PropertyValue};
pub use store::{
    EdgeAddition, GraphError, GraphResult, GraphSnapshot, NodeAddition, PageRemoval,
    SimilarityAddition, SimilarityOutcome, WorkingGraph,
};
pub use types::{EdgeId, EdgeKind, NodeId, NodeKind, SimilarityKind};
