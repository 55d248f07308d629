//! Shared fixture for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use authgraph::nlq::{
    Assistant, Classification, HandlerSummary, NLQError, NLQResult, ReferenceCandidate,
    ReferenceSelection, TemplateDescriptor,
};
use authgraph::reference::{
    PaintingRecord, ReferenceData, ReferenceRecord, ReferenceStore, SealMapping, SealRecord,
    StandardSealRecord,
};
use authgraph::{AuthSession, SessionConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn mapping(seal: &str, standard_image: &str, score: f64) -> SealMapping {
    SealMapping {
        seal_code: seal.to_string(),
        seal_image: None,
        standard_image: Some(standard_image.to_string()),
        has_reference: true,
        similarity: Some(score),
    }
}

/// Three paintings, three seals on two of them, two standard seals,
/// a handful of segment matches and citations
pub fn dataset() -> ReferenceData {
    let mut data = ReferenceData::default();
    data.paintings = vec![
        PaintingRecord::new("D001", "Reeds and Geese"),
        PaintingRecord::new("D002", "Mountain Retreat"),
        PaintingRecord::new("D003", "Plum Blossoms"),
    ];
    data.seals = vec![
        SealRecord::new("0003", "D001_1").with_image("seals/0003.png"),
        SealRecord::new("0004", "D001").with_image("seals/0004.png"),
        SealRecord::new("0007", "D002").with_image("seals/0007.png"),
    ];
    data.standard_seals = vec![
        StandardSealRecord::new("SS01", "Chijue", "std/ss01.png"),
        StandardSealRecord::new("SS02", "Qingxiang", "std/ss02.png"),
    ];
    data.seal_mapping = vec![
        mapping("0003", "std/ss01.png", 0.87),
        mapping("0004", "std/ss02.png", 0.9),
        mapping("0007", "std/ss01.png", 0.81),
    ];

    data.add_segment_similarity("D001_1", "seg/a.png", "D002_3", "seg/b.png", 0.91);
    data.add_segment_similarity("D001_1", "seg/a.png", "D003", "seg/c.png", 0.85);
    data.add_segment_similarity("D001_1", "seg/a.png", "D003", "seg/d.png", 0.4);
    data.add_segment_similarity("D001_1", "seg/e.png", "D002", "seg/f.png", 0.83);

    data.painting_references.insert(
        "D001".to_string(),
        vec![
            ReferenceRecord::new("R1", "Shiqu Baoji", "vol. 3", "a hanging scroll of geese"),
            ReferenceRecord::new("R2", "Dadi Ji", "p. 12", "seal of Chijue noted"),
        ],
    );
    data.painting_references.insert(
        "D002".to_string(),
        vec![ReferenceRecord::new("R1", "Shiqu Baoji", "vol. 3", "a mountain retreat")],
    );
    data
}

pub fn store() -> Arc<ReferenceStore> {
    Arc::new(ReferenceStore::from_data(dataset()))
}

/// Assistant with canned replies that remembers what it was asked
#[derive(Default)]
pub struct ScriptedAssistant {
    pub classification: Option<(String, f64)>,
    pub classify_fails: bool,
    pub answer: Option<String>,
    /// Delay before synthesized answers
    pub answer_delay: Option<Duration>,
    pub references: Option<Vec<String>>,
    pub direct_contexts: Mutex<Vec<serde_json::Value>>,
    pub summaries: Mutex<Vec<HandlerSummary>>,
}

impl ScriptedAssistant {
    pub fn classifying(template_id: &str, confidence: f64) -> Self {
        ScriptedAssistant {
            classification: Some((template_id.to_string(), confidence)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Assistant for ScriptedAssistant {
    async fn classify(
        &self,
        _question: &str,
        _candidates: &[TemplateDescriptor],
    ) -> NLQResult<Classification> {
        if self.classify_fails {
            return Err(NLQError::NetworkError("connection refused".to_string()));
        }
        // answers with its scripted id even when that template was not offered
        Ok(match &self.classification {
            Some((id, confidence)) => Classification {
                template_id: Some(id.clone()),
                confidence: *confidence,
                reasoning: "scripted".to_string(),
            },
            None => Classification::none("no match"),
        })
    }

    async fn synthesize_answer(&self, _question: &str, summary: &HandlerSummary) -> NLQResult<String> {
        if let Ok(mut summaries) = self.summaries.lock() {
            summaries.push(summary.clone());
        }
        if let Some(delay) = self.answer_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.answer {
            Some(answer) => Ok(answer.clone()),
            None => Err(NLQError::Unavailable("scripted".to_string())),
        }
    }

    async fn direct_answer(&self, _question: &str, context: &serde_json::Value) -> NLQResult<String> {
        if let Ok(mut contexts) = self.direct_contexts.lock() {
            contexts.push(context.clone());
        }
        match &self.answer {
            Some(answer) => Ok(answer.clone()),
            None => Err(NLQError::Unavailable("scripted".to_string())),
        }
    }

    async fn select_references(
        &self,
        _question: &str,
        candidates: &[ReferenceCandidate],
    ) -> NLQResult<ReferenceSelection> {
        match &self.references {
            Some(ids) => Ok(ReferenceSelection {
                ids: ids.clone(),
                reason: "scripted selection".to_string(),
            }),
            None => Err(NLQError::ApiError(format!(
                "{} candidates, no script",
                candidates.len()
            ))),
        }
    }
}

pub fn session_with(assistant: ScriptedAssistant) -> (AuthSession, Arc<ScriptedAssistant>) {
    session_with_config(assistant, SessionConfig::default())
}

pub fn session_with_config(
    assistant: ScriptedAssistant,
    config: SessionConfig,
) -> (AuthSession, Arc<ScriptedAssistant>) {
    let assistant = Arc::new(assistant);
    let session = AuthSession::new(store(), assistant.clone(), config).expect("config is valid");
    (session, assistant)
}

pub fn session() -> AuthSession {
    session_with(ScriptedAssistant::default()).0
}
