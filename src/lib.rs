//! authgraph
//!
//! An incremental knowledge-graph engine for the interactive authentication of
//! classical paintings. An analyst asks questions about the painting under
//! examination; each question is routed onto one of a fixed set of traversal
//! templates that pull paintings, seals, standard seals and literature
//! citations from a reference dataset into a growing evidence graph.
//!
//! # Architecture
//!
//! - `reference`: immutable dataset loaded once per process
//! - `graph`: session-scoped node/edge store with deduplicated nodes,
//!   singleton ownership/reference edges and paginated similarity edges
//! - `template` + `router`: the template catalog and the question router
//! - `history`: bounded ledger with undo and precise partial deletion
//! - `session`: the service instance tying the above together
//! - `nlq`: the assistant contract plus HTTP and offline implementations
//!
//! ## Example Usage
//!
//! ```rust
//! use authgraph::reference::{PaintingRecord, ReferenceData, ReferenceStore};
//! use authgraph::{AuthSession, QuestionRequest, SessionConfig};
//! use std::sync::Arc;
//!
//! let mut data = ReferenceData::default();
//! data.paintings = vec![PaintingRecord::new("D001", "Reeds and Geese")];
//! let refs = Arc::new(ReferenceStore::from_data(data));
//!
//! let mut session = AuthSession::from_config(refs, SessionConfig::default()).unwrap();
//! session.focus_painting("D001").unwrap();
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let outcome = runtime
//!     .block_on(session.submit_question(QuestionRequest::new("show all paintings")))
//!     .unwrap();
//! assert!(outcome.success);
//! assert_eq!(session.snapshot().nodes.len(), 2);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod graph;
pub mod history;
pub mod nlq;
pub mod reference;
pub mod router;
pub mod session;
pub mod template;

// Re-export main types for convenience
pub use config::{ConfigError, ConfigResult, LLMProvider, NLQConfig, SessionConfig};

pub use graph::{
    Edge, EdgeId, EdgeKind, GraphError, GraphResult, GraphSnapshot, Node, NodeId, NodeKind,
    PropertyMap, PropertyValue, SimilarityPage, WorkingGraph,
};

pub use history::{HistoryError, HistoryLedger, HistoryRecord, HistoryResult, NodeChange};

pub use nlq::{Assistant, LlmAssistant, NLQError, NLQResult, OfflineAssistant};

pub use reference::{ReferenceError, ReferenceResult, ReferenceStore, SimilarityRange};

pub use router::{QuestionOutcome, Resolution, Router};

pub use session::{AuthSession, QuestionRequest, SessionError, SessionResult, TemplateHelp};

pub use template::{
    QueryTemplate, SelectedItem, SelectionKind, TemplateCatalog, TemplateError, TemplateResult,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
