//! Authentication session
//!
//! One analyst's working state: the evidence graph, its history ledger and
//! the router, over a shared read-only reference dataset. Every mutating call
//! takes `&mut self`, so questions are processed strictly one at a time.

use crate::config::{ConfigError, SessionConfig};
use crate::graph::{GraphError, GraphSnapshot, NodeAddition, NodeId, NodeKind, NodeSeed, WorkingGraph};
use crate::history::{HistoryError, HistoryLedger, HistoryRecord, RemovalReport, UndoReport};
use crate::nlq::{Assistant, LlmAssistant, NLQError, OfflineAssistant};
use crate::reference::{base_painting_id, ReferenceStore, SimilarityRange};
use crate::router::{QuestionOutcome, Resolution, Router};
use crate::template::{HandlerContext, SelectedItem, SelectionKind, TemplateCatalog};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Unknown painting: {0}")]
    UnknownPainting(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Assistant error: {0}")]
    Assistant(#[from] NLQError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// One question with the analyst's context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub text: String,
    #[serde(default)]
    pub current_painting: Option<String>,
    #[serde(default)]
    pub selection: Vec<SelectedItem>,
    /// Overrides the configured segment similarity window
    #[serde(default)]
    pub similarity_range: Option<SimilarityRange>,
}

impl QuestionRequest {
    pub fn new(text: impl Into<String>) -> Self {
        QuestionRequest {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_painting(mut self, painting_id: impl Into<String>) -> Self {
        self.current_painting = Some(painting_id.into());
        self
    }

    pub fn with_selection(mut self, item: SelectedItem) -> Self {
        self.selection.push(item);
        self
    }

    pub fn with_range(mut self, range: SimilarityRange) -> Self {
        self.similarity_range = Some(range);
        self
    }
}

/// Catalog entry as shown to users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateHelp {
    pub id: String,
    pub description: String,
    pub relationship: String,
    pub required_selection: Vec<SelectionKind>,
    pub keywords: Vec<String>,
}

pub struct AuthSession {
    config: SessionConfig,
    refs: Arc<ReferenceStore>,
    graph: WorkingGraph,
    history: HistoryLedger,
    router: Router,
    assistant: Arc<dyn Assistant>,
}

impl AuthSession {
    pub fn new(
        refs: Arc<ReferenceStore>,
        assistant: Arc<dyn Assistant>,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        config.validate()?;
        let author = refs.author_record();
        let graph = WorkingGraph::with_author(
            author.id.as_str(),
            author.name.as_str(),
            author.to_properties(),
        );
        info!(
            "Session started on {} paintings, anchor {}",
            refs.painting_count(),
            author.id
        );

        Ok(AuthSession {
            history: HistoryLedger::new(config.history_capacity),
            router: Router::new(TemplateCatalog::standard(), config.confidence_threshold)
                .with_assistant_timeout(Duration::from_secs(config.request_timeout_secs)),
            config,
            refs,
            graph,
            assistant,
        })
    }

    /// Session whose assistant is built from `config.nlq`, offline when absent
    /// or disabled
    pub fn from_config(refs: Arc<ReferenceStore>, config: SessionConfig) -> SessionResult<Self> {
        let assistant: Arc<dyn Assistant> = match config.nlq.as_ref().filter(|n| n.enabled) {
            Some(nlq) => Arc::new(LlmAssistant::new(
                nlq,
                Duration::from_secs(config.request_timeout_secs),
            )?),
            None => Arc::new(OfflineAssistant),
        };
        Self::new(refs, assistant, config)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn reference_store(&self) -> &ReferenceStore {
        &self.refs
    }

    /// Process a free-text question and record it
    pub async fn submit_question(&mut self, request: QuestionRequest) -> SessionResult<QuestionOutcome> {
        let ctx = HandlerContext {
            question: &request.text,
            current_painting: request.current_painting.as_deref(),
            selection: &request.selection,
            similarity_range: request
                .similarity_range
                .unwrap_or(self.config.similarity_range),
            assistant: self.assistant.as_ref(),
        };
        let outcome = self.router.route(&mut self.graph, &self.refs, &ctx).await?;
        self.record(&request.text, &outcome);
        Ok(outcome)
    }

    /// Run a named template, skipping classification
    pub async fn invoke_template(
        &mut self,
        template_id: &str,
        request: QuestionRequest,
    ) -> SessionResult<QuestionOutcome> {
        let template = self
            .router
            .catalog()
            .get(template_id)
            .ok_or_else(|| SessionError::UnknownTemplate(template_id.to_string()))?;
        let ctx = HandlerContext {
            question: &request.text,
            current_painting: request.current_painting.as_deref(),
            selection: &request.selection,
            similarity_range: request
                .similarity_range
                .unwrap_or(self.config.similarity_range),
            assistant: self.assistant.as_ref(),
        };
        let outcome = self
            .router
            .execute(template, Resolution::Explicit, &mut self.graph, &self.refs, &ctx)
            .await?;

        let question = if request.text.is_empty() {
            format!("/run {}", template_id)
        } else {
            request.text.clone()
        };
        self.record(&question, &outcome);
        Ok(outcome)
    }

    fn record(&mut self, question: &str, outcome: &QuestionOutcome) {
        self.history.push(HistoryRecord::new(
            question,
            outcome.template_id.clone(),
            outcome.success,
            outcome.message.as_str(),
            outcome.full_answer.as_str(),
            outcome.changes.clone(),
        ));
    }

    /// Put the painting under examination into the graph, unrecorded
    pub fn focus_painting(&mut self, painting_id: &str) -> SessionResult<NodeAddition> {
        let record = self
            .refs
            .painting(painting_id)
            .ok_or_else(|| SessionError::UnknownPainting(painting_id.to_string()))?;
        let seed = NodeSeed::new()
            .label(record.display_name())
            .properties(record.to_properties());
        Ok(self
            .graph
            .add_node(NodeKind::Painting, base_painting_id(painting_id), seed)?)
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.graph.snapshot()
    }

    pub fn graph(&self) -> &WorkingGraph {
        &self.graph
    }

    /// Ledger records, newest first
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.history.records()
    }

    pub fn undo_last(&mut self) -> SessionResult<UndoReport> {
        Ok(self.history.undo_last(&mut self.graph)?)
    }

    pub fn remove_node_record(
        &mut self,
        node_id: &NodeId,
        page_index: Option<usize>,
    ) -> SessionResult<RemovalReport> {
        Ok(self
            .history
            .remove_node_record(&mut self.graph, node_id, page_index)?)
    }

    /// Back to only the anchor node, with an empty ledger
    pub fn reset(&mut self) {
        self.graph.reset();
        self.history.clear();
        info!("Session reset");
    }

    pub fn templates(&self) -> Vec<TemplateHelp> {
        self.router
            .catalog()
            .templates()
            .iter()
            .map(|t| TemplateHelp {
                id: t.id.to_string(),
                description: t.description.to_string(),
                relationship: t.relationship.to_string(),
                required_selection: t.required_selection.to_vec(),
                keywords: t.keywords.iter().map(|k| k.to_string()).collect(),
            })
            .collect()
    }
}
