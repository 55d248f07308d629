//! LLM-backed assistant

use super::client::NLQClient;
use super::{
    extract_json, Assistant, Classification, HandlerSummary, NLQError, NLQResult,
    ReferenceCandidate, ReferenceSelection, TemplateDescriptor,
};
use crate::config::NLQConfig;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

const CLASSIFY_SYSTEM: &str = "You are the question classifier of a painting authentication system. \
Analyse the question and return the best matching template id and a confidence.";
const ANSWER_SYSTEM: &str = "You are an expert in authenticating classical Chinese paintings. \
Explain findings in natural, professional language.";
const REFERENCE_SYSTEM: &str = "You are a scholar of classical Chinese painting, skilled at judging \
which literature is relevant to a question.";

pub struct LlmAssistant {
    client: NLQClient,
}

impl LlmAssistant {
    pub fn new(config: &NLQConfig, timeout: Duration) -> NLQResult<Self> {
        if !config.enabled {
            return Err(NLQError::ConfigError("assistant is disabled".to_string()));
        }
        Ok(Self {
            client: NLQClient::new(config, timeout)?,
        })
    }

    fn parse_reply<T: DeserializeOwned>(reply: &str) -> NLQResult<T> {
        let json = extract_json(reply).ok_or_else(|| {
            NLQError::SerializationError(format!("no JSON object in reply: {}", reply))
        })?;
        serde_json::from_str(json).map_err(|e| NLQError::SerializationError(e.to_string()))
    }

    fn classify_prompt(question: &str, candidates: &[TemplateDescriptor]) -> String {
        let templates = candidates
            .iter()
            .map(|t| {
                format!(
                    "ID: {}\nDescription: {}\nRelationship: {}\nExample keywords: {}",
                    t.id,
                    t.description,
                    t.relationship,
                    t.keywords.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "Classify the user's question onto one of these templates:\n\n{}\n\n\
User question: \"{}\"\n\n\
Judge by meaning, not by exact keyword overlap. Return only JSON:\n\
{{\"templateId\": \"<id or null>\", \"confidence\": <0.0-1.0>, \"reasoning\": \"<why>\"}}",
            templates, question
        )
    }

    fn answer_prompt(question: &str, summary: &HandlerSummary) -> String {
        let nodes = if summary.nodes.is_empty() {
            "none".to_string()
        } else {
            summary.nodes.join("\n")
        };
        format!(
            "The user asked: \"{}\"\n\n\
The system computed:\n- message: {}\n- new nodes: {}\n- new edges: {}\n- nodes:\n{}\n- data: {}\n\n\
Write a professional, friendly answer of two to four sentences. Name the specific \
paintings, seals or references found. Return only the answer text.",
            question, summary.message, summary.added_nodes, summary.added_edges, nodes, summary.data
        )
    }

    fn direct_prompt(question: &str, context: &serde_json::Value) -> String {
        let context = serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string());
        format!(
            "No query template matched the user's question.\n\n\
Current painting:\n{}\n\nUser question: \"{}\"\n\n\
Answer from your knowledge of painting authentication in three to five sentences. \
Say so honestly if the question is beyond what you know. Return only the answer text.",
            context, question
        )
    }

    fn reference_prompt(question: &str, candidates: &[ReferenceCandidate]) -> String {
        let list = candidates
            .iter()
            .enumerate()
            .map(|(i, r)| {
                format!(
                    "{}. id: {}\n   name: {}\n   info: {}\n   text: {}\n   paintings: {}",
                    i + 1,
                    r.id,
                    r.name,
                    r.info,
                    r.text,
                    r.paintings.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "User question: {}\n\nAvailable references:\n{}\n\n\
If the question asks for the references of a painting, return all of them. If it asks \
about a period, subject or person, return every related one. Return only JSON:\n\
{{\"relevant_reference_ids\": [\"<id>\", ...], \"reason\": \"<why>\"}}",
            question, list
        )
    }
}

#[async_trait]
impl Assistant for LlmAssistant {
    async fn classify(
        &self,
        question: &str,
        candidates: &[TemplateDescriptor],
    ) -> NLQResult<Classification> {
        let reply = self
            .client
            .chat(Some(CLASSIFY_SYSTEM), &Self::classify_prompt(question, candidates), 0.3)
            .await?;
        let classification: Classification = Self::parse_reply(&reply)?;
        debug!(
            "Classified as {:?} ({:.2}): {}",
            classification.template_id, classification.confidence, classification.reasoning
        );
        Ok(classification)
    }

    async fn synthesize_answer(&self, question: &str, summary: &HandlerSummary) -> NLQResult<String> {
        self.client
            .chat(Some(ANSWER_SYSTEM), &Self::answer_prompt(question, summary), 0.7)
            .await
    }

    async fn direct_answer(&self, question: &str, context: &serde_json::Value) -> NLQResult<String> {
        self.client
            .chat(Some(ANSWER_SYSTEM), &Self::direct_prompt(question, context), 0.7)
            .await
    }

    async fn select_references(
        &self,
        question: &str,
        candidates: &[ReferenceCandidate],
    ) -> NLQResult<ReferenceSelection> {
        let reply = self
            .client
            .chat(Some(REFERENCE_SYSTEM), &Self::reference_prompt(question, candidates), 0.3)
            .await?;
        let selection: ReferenceSelection = Self::parse_reply(&reply).map_err(|e| {
            warn!("Unparseable reference selection: {}", e);
            e
        })?;
        Ok(selection)
    }
}
