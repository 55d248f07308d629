//! Natural Language Querying (NLQ)
//!
//! The assistant collaborator: classifies questions onto query templates,
//! phrases answers from handler results and picks relevant citations. The
//! core never interprets language itself; it only consumes this contract.

pub mod assistant;
pub mod client;

pub use assistant::LlmAssistant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NLQError {
    #[error("LLM API error: {0}")]
    ApiError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Assistant unavailable: {0}")]
    Unavailable(String),
}

pub type NLQResult<T> = Result<T, NLQError>;

/// Reply used when no template applies and the assistant cannot answer
pub const DIRECT_ANSWER_FALLBACK: &str = "This question cannot be answered yet. Try one of the supported questions, e.g. finding similar segments, listing seals or looking up references.";

/// Template summary offered to the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    pub id: String,
    pub description: String,
    pub relationship: String,
    pub keywords: Vec<String>,
}

/// Classifier verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "templateId", alias = "template_id", default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl Classification {
    pub fn none(reasoning: impl Into<String>) -> Self {
        Classification {
            template_id: None,
            confidence: 0.0,
            reasoning: reasoning.into(),
        }
    }
}

/// What a handler did, as shown to the answer synthesizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerSummary {
    pub template_id: String,
    pub message: String,
    pub data: serde_json::Value,
    /// "kind: label" for every node the handler introduced or touched
    pub nodes: Vec<String>,
    pub added_nodes: usize,
    pub added_edges: usize,
}

/// Citation offered to the reference selector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCandidate {
    pub id: String,
    pub name: String,
    pub info: String,
    pub text: String,
    /// Paintings in the graph citing it
    pub paintings: Vec<String>,
}

/// Reference selector verdict
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSelection {
    #[serde(rename = "relevant_reference_ids", alias = "ids", default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub reason: String,
}

/// External language collaborator
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Pick the template matching the question, with a confidence in [0, 1]
    async fn classify(
        &self,
        question: &str,
        candidates: &[TemplateDescriptor],
    ) -> NLQResult<Classification>;

    /// Phrase a full answer from a handler result
    async fn synthesize_answer(&self, question: &str, summary: &HandlerSummary) -> NLQResult<String>;

    /// Answer free-form when no template applies
    async fn direct_answer(&self, question: &str, context: &serde_json::Value) -> NLQResult<String>;

    /// Choose which candidate citations are relevant to the question
    async fn select_references(
        &self,
        question: &str,
        candidates: &[ReferenceCandidate],
    ) -> NLQResult<ReferenceSelection>;
}

/// Assistant that needs no network: never classifies, echoes handler
/// messages, and selects every candidate citation.
#[derive(Debug, Clone, Default)]
pub struct OfflineAssistant;

#[async_trait]
impl Assistant for OfflineAssistant {
    async fn classify(
        &self,
        _question: &str,
        _candidates: &[TemplateDescriptor],
    ) -> NLQResult<Classification> {
        Ok(Classification::none("offline"))
    }

    async fn synthesize_answer(&self, _question: &str, summary: &HandlerSummary) -> NLQResult<String> {
        Ok(summary.message.clone())
    }

    async fn direct_answer(&self, _question: &str, _context: &serde_json::Value) -> NLQResult<String> {
        Ok(DIRECT_ANSWER_FALLBACK.to_string())
    }

    async fn select_references(
        &self,
        _question: &str,
        candidates: &[ReferenceCandidate],
    ) -> NLQResult<ReferenceSelection> {
        Ok(ReferenceSelection {
            ids: candidates.iter().map(|c| c.id.clone()).collect(),
            reason: "all citations of paintings in the graph".to_string(),
        })
    }
}

/// Extract a JSON object from an LLM response that may contain markdown
/// fences or surrounding chatter.
pub fn extract_json(response: &str) -> Option<&str> {
    let trimmed = response.trim();

    // Fenced block first; skip the language tag line
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let code_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        if let Some(end) = after_fence[code_start..].find("```") {
            let block = after_fence[code_start..code_start + end].trim();
            if block.starts_with('{') {
                return Some(block);
            }
        }
    }

    let open = trimmed.find('{')?;
    let close = trimmed.rfind('}')?;
    (close > open).then(|| &trimmed[open..=close])
}
