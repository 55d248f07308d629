//! Question router
//!
//! Maps free text onto one catalog template:
//! 1. filter templates by the current selection
//! 2. ask the assistant to classify; accept above the confidence threshold
//! 3. otherwise fall back to deterministic keyword scoring
//! 4. check the template's selection requirement
//! 5. run the handler and have the assistant phrase the answer
//! 6. with no template at all, answer free-form without touching the graph

use crate::graph::{GraphError, GraphResult, WorkingGraph};
use crate::history::NodeChange;
use crate::nlq::{HandlerSummary, NLQError, NLQResult, DIRECT_ANSWER_FALLBACK};
use crate::reference::ReferenceStore;
use crate::template::catalog::keyword_match;
use crate::template::{
    describe_node, HandlerContext, QueryTemplate, TemplateCatalog, TemplateError,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default bound on a single assistant call
pub const DEFAULT_ASSISTANT_TIMEOUT: Duration = Duration::from_secs(60);

/// How a template was chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Resolution {
    Classifier { confidence: f64, reasoning: String },
    Keyword { matches: usize },
    Explicit,
}

/// Answer to one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub success: bool,
    pub template_id: Option<String>,
    pub resolution: Option<Resolution>,
    /// Short handler message
    pub message: String,
    /// Assistant-phrased answer, or the short message when unavailable
    pub full_answer: String,
    pub data: serde_json::Value,
    pub added_nodes: usize,
    pub added_edges: usize,
    pub changes: Vec<NodeChange>,
}

impl QuestionOutcome {
    fn failure(template: &QueryTemplate, resolution: Resolution, message: String) -> Self {
        QuestionOutcome {
            success: false,
            template_id: Some(template.id.to_string()),
            resolution: Some(resolution),
            full_answer: message.clone(),
            message,
            data: serde_json::Value::Null,
            added_nodes: 0,
            added_edges: 0,
            changes: Vec::new(),
        }
    }
}

pub struct Router {
    catalog: TemplateCatalog,
    confidence_threshold: f64,
    assistant_timeout: Duration,
}

impl Router {
    pub fn new(catalog: TemplateCatalog, confidence_threshold: f64) -> Self {
        Router {
            catalog,
            confidence_threshold,
            assistant_timeout: DEFAULT_ASSISTANT_TIMEOUT,
        }
    }

    /// Bound each assistant call; an expired call counts as a failed call
    pub fn with_assistant_timeout(mut self, timeout: Duration) -> Self {
        self.assistant_timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Run one assistant call under the configured timeout
    async fn bounded<T>(&self, call: impl Future<Output = NLQResult<T>>) -> NLQResult<T> {
        match tokio::time::timeout(self.assistant_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(NLQError::NetworkError(format!(
                "assistant did not answer within {:?}",
                self.assistant_timeout
            ))),
        }
    }

    /// Stages 1 to 3: pick a template for the question, if any
    pub async fn resolve(&self, ctx: &HandlerContext<'_>) -> Option<(&QueryTemplate, Resolution)> {
        let candidates = self.catalog.applicable(ctx.selection);
        if candidates.is_empty() {
            return None;
        }
        let descriptors: Vec<_> = candidates.iter().map(|t| t.descriptor()).collect();

        match self.bounded(ctx.assistant.classify(ctx.question, &descriptors)).await {
            Ok(classification) => {
                // excluded templates stay out even when the classifier names them
                let known = classification
                    .template_id
                    .as_deref()
                    .and_then(|id| candidates.iter().copied().find(|t| t.id == id));
                match known {
                    Some(template) if classification.confidence > self.confidence_threshold => {
                        info!(
                            "Classifier chose {} ({:.2})",
                            template.id, classification.confidence
                        );
                        return Some((
                            template,
                            Resolution::Classifier {
                                confidence: classification.confidence,
                                reasoning: classification.reasoning,
                            },
                        ));
                    }
                    _ => debug!(
                        "Classifier result {:?} ({:.2}) rejected, using keywords",
                        classification.template_id, classification.confidence
                    ),
                }
            }
            Err(e) => warn!("Classifier failed, using keywords: {}", e),
        }

        let (template, matches) = keyword_match(ctx.question, &candidates)?;
        info!("Keyword match chose {} ({} hits)", template.id, matches);
        Some((template, Resolution::Keyword { matches }))
    }

    /// Stages 1 to 6 for a free-text question
    pub async fn route(
        &self,
        graph: &mut WorkingGraph,
        refs: &ReferenceStore,
        ctx: &HandlerContext<'_>,
    ) -> GraphResult<QuestionOutcome> {
        match self.resolve(ctx).await {
            Some((template, resolution)) => self.execute(template, resolution, graph, refs, ctx).await,
            None => Ok(self.answer_directly(refs, ctx).await),
        }
    }

    /// Stages 4 and 5 for an already chosen template
    ///
    /// Invariant violations inside the handler come back as `Err`; any other
    /// handler failure becomes an unsuccessful outcome.
    pub async fn execute(
        &self,
        template: &QueryTemplate,
        resolution: Resolution,
        graph: &mut WorkingGraph,
        refs: &ReferenceStore,
        ctx: &HandlerContext<'_>,
    ) -> GraphResult<QuestionOutcome> {
        if let Some(missing) = template.missing_requirement(ctx.selection) {
            info!("{} needs a selection: {}", template.id, missing);
            return Ok(QuestionOutcome::failure(template, resolution, missing));
        }

        let output = match template.handler.handle(graph, refs, ctx).await {
            Ok(output) => output,
            Err(TemplateError::Graph(e)) if is_invariant_violation(&e) => return Err(e),
            Err(e) => {
                error!("Template {} failed: {}", template.id, e);
                return Ok(QuestionOutcome::failure(
                    template,
                    resolution,
                    format!("System error while answering the question: {}", e),
                ));
            }
        };

        let added_nodes = output.added_node_count();
        let summary = HandlerSummary {
            template_id: template.id.to_string(),
            message: output.message.clone(),
            data: output.data.clone(),
            nodes: output.changes.iter().map(|c| describe_node(c.node())).collect(),
            added_nodes,
            added_edges: output.added_edges.len(),
        };
        let full_answer = match self
            .bounded(ctx.assistant.synthesize_answer(ctx.question, &summary))
            .await
        {
            Ok(answer) if !answer.trim().is_empty() => answer,
            Ok(_) => output.message.clone(),
            Err(e) => {
                warn!("Answer synthesis failed, using handler message: {}", e);
                output.message.clone()
            }
        };
        info!(
            "{} added {} nodes and {} edges",
            template.id,
            added_nodes,
            output.added_edges.len()
        );

        Ok(QuestionOutcome {
            success: true,
            template_id: Some(template.id.to_string()),
            resolution: Some(resolution),
            message: output.message,
            full_answer,
            data: output.data,
            added_nodes,
            added_edges: output.added_edges.len(),
            changes: output.changes,
        })
    }

    /// Stage 6: free-form answer with the current painting as context
    pub async fn answer_directly(
        &self,
        refs: &ReferenceStore,
        ctx: &HandlerContext<'_>,
    ) -> QuestionOutcome {
        let context = ctx
            .current_painting
            .and_then(|id| refs.painting(id))
            .and_then(|record| serde_json::to_value(record).ok())
            .unwrap_or(serde_json::Value::Null);

        let answer = match self
            .bounded(ctx.assistant.direct_answer(ctx.question, &context))
            .await
        {
            Ok(answer) if !answer.trim().is_empty() => answer,
            Ok(_) => DIRECT_ANSWER_FALLBACK.to_string(),
            Err(e) => {
                warn!("Direct answer failed: {}", e);
                DIRECT_ANSWER_FALLBACK.to_string()
            }
        };
        info!("No template matched; answered directly");

        QuestionOutcome {
            success: true,
            template_id: None,
            resolution: None,
            message: answer.clone(),
            full_answer: answer,
            data: serde_json::Value::Null,
            added_nodes: 0,
            added_edges: 0,
            changes: Vec::new(),
        }
    }
}

/// Errors that mean the graph itself was misused, not that a lookup failed
pub fn is_invariant_violation(error: &GraphError) -> bool {
    matches!(
        error,
        GraphError::AnchorNodeProtected(_) | GraphError::KindConflict { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, NodeSeed, PropertyMap};
    use crate::nlq::{
        Assistant, Classification, NLQError, NLQResult, OfflineAssistant, ReferenceCandidate,
        ReferenceSelection, TemplateDescriptor,
    };
    use crate::reference::{PaintingRecord, ReferenceData, SimilarityRange};
    use crate::template::catalog::{
        FIND_STANDARD_SEAL_BY_SELECTED_SEAL, SHOW_ALL_PAINTINGS_BY_AUTHOR, SHOW_ALL_STANDARD_SEALS,
        SHOW_CURRENT_PAINTING_SEALS,
    };
    use crate::template::SelectedItem;
    use async_trait::async_trait;

    struct FixedClassifier {
        template_id: Option<&'static str>,
        confidence: f64,
        fail: bool,
    }

    #[async_trait]
    impl Assistant for FixedClassifier {
        async fn classify(
            &self,
            _question: &str,
            _candidates: &[TemplateDescriptor],
        ) -> NLQResult<Classification> {
            if self.fail {
                return Err(NLQError::NetworkError("down".to_string()));
            }
            Ok(Classification {
                template_id: self.template_id.map(str::to_string),
                confidence: self.confidence,
                reasoning: "fixed".to_string(),
            })
        }

        async fn synthesize_answer(&self, _q: &str, _s: &HandlerSummary) -> NLQResult<String> {
            Err(NLQError::Unavailable("no synthesis".to_string()))
        }

        async fn direct_answer(&self, _q: &str, _c: &serde_json::Value) -> NLQResult<String> {
            Err(NLQError::Unavailable("no answers".to_string()))
        }

        async fn select_references(
            &self,
            _q: &str,
            _c: &[ReferenceCandidate],
        ) -> NLQResult<ReferenceSelection> {
            Ok(ReferenceSelection::default())
        }
    }

    fn router() -> Router {
        Router::new(TemplateCatalog::standard(), 0.2)
    }

    fn ctx<'a>(
        question: &'a str,
        selection: &'a [SelectedItem],
        assistant: &'a dyn Assistant,
    ) -> HandlerContext<'a> {
        HandlerContext {
            question,
            current_painting: None,
            selection,
            similarity_range: SimilarityRange::default(),
            assistant,
        }
    }

    #[tokio::test]
    async fn test_classifier_above_threshold_wins() {
        let router = router();
        let assistant = FixedClassifier {
            template_id: Some(SHOW_ALL_STANDARD_SEALS),
            confidence: 0.21,
            fail: false,
        };
        let (template, resolution) = router
            .resolve(&ctx("show all paintings", &[], &assistant))
            .await
            .unwrap();
        assert_eq!(template.id, SHOW_ALL_STANDARD_SEALS);
        assert!(matches!(resolution, Resolution::Classifier { .. }));
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let router = router();
        let assistant = FixedClassifier {
            template_id: Some(SHOW_ALL_STANDARD_SEALS),
            confidence: 0.2,
            fail: false,
        };
        let (template, resolution) = router
            .resolve(&ctx("show all paintings", &[], &assistant))
            .await
            .unwrap();
        assert_eq!(template.id, SHOW_ALL_PAINTINGS_BY_AUTHOR);
        assert_eq!(resolution, Resolution::Keyword { matches: 1 });
    }

    #[tokio::test]
    async fn test_unknown_id_and_failure_fall_back() {
        let router = router();
        let unknown = FixedClassifier {
            template_id: Some("made_up"),
            confidence: 0.99,
            fail: false,
        };
        let (template, _) = router
            .resolve(&ctx("which seals are on it", &[], &unknown))
            .await
            .unwrap();
        assert_eq!(template.id, SHOW_CURRENT_PAINTING_SEALS);

        let failing = FixedClassifier {
            template_id: None,
            confidence: 0.0,
            fail: true,
        };
        assert!(router
            .resolve(&ctx("good morning", &[], &failing))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_excluded_classifier_choice_falls_back() {
        let router = router();
        let seal = vec![SelectedItem::seal("0003")];
        let listing = FixedClassifier {
            template_id: Some(SHOW_ALL_STANDARD_SEALS),
            confidence: 0.9,
            fail: false,
        };
        let (template, resolution) = router
            .resolve(&ctx("which seals are on it", &seal, &listing))
            .await
            .unwrap();
        assert_eq!(template.id, SHOW_CURRENT_PAINTING_SEALS);
        assert!(matches!(resolution, Resolution::Keyword { .. }));

        // no seal selected, so the selected-seal lookup is never a candidate
        let lookup = FixedClassifier {
            template_id: Some(FIND_STANDARD_SEAL_BY_SELECTED_SEAL),
            confidence: 0.9,
            fail: false,
        };
        assert!(router
            .resolve(&ctx("good morning", &[], &lookup))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_missing_selection_fails_without_mutation() {
        let router = router();
        let refs = ReferenceStore::default();
        let mut graph = WorkingGraph::with_author("AUTHOR", "Shitao", PropertyMap::new());
        let assistant = OfflineAssistant;
        let template = router
            .catalog()
            .get(crate::template::catalog::FIND_SIMILAR_PAINTINGS_BY_SEGMENT)
            .unwrap();

        let outcome = router
            .execute(template, Resolution::Explicit, &mut graph, &refs, &ctx("similar", &[], &assistant))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.message.contains("segment"));
        assert_eq!(graph.node_count(), 1);
    }

    #[tokio::test]
    async fn test_synthesis_failure_uses_handler_message() {
        let router = router();
        let mut data = ReferenceData::default();
        data.paintings = vec![PaintingRecord::new("D001", "Reeds and Geese")];
        let refs = ReferenceStore::from_data(data);
        let mut graph = WorkingGraph::with_author("AUTHOR", "Shitao", PropertyMap::new());
        let assistant = FixedClassifier {
            template_id: None,
            confidence: 0.0,
            fail: false,
        };

        let outcome = router
            .route(&mut graph, &refs, &ctx("show all paintings", &[], &assistant))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.added_nodes, 1);
        assert_eq!(outcome.full_answer, outcome.message);
    }

    struct SlowSynthesizer;

    #[async_trait]
    impl Assistant for SlowSynthesizer {
        async fn classify(
            &self,
            _question: &str,
            _candidates: &[TemplateDescriptor],
        ) -> NLQResult<Classification> {
            Ok(Classification::none("keywords only"))
        }

        async fn synthesize_answer(&self, _q: &str, _s: &HandlerSummary) -> NLQResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }

        async fn direct_answer(&self, _q: &str, _c: &serde_json::Value) -> NLQResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }

        async fn select_references(
            &self,
            _q: &str,
            _c: &[ReferenceCandidate],
        ) -> NLQResult<ReferenceSelection> {
            Ok(ReferenceSelection::default())
        }
    }

    #[tokio::test]
    async fn test_slow_assistant_still_completes_the_question() {
        let router = router().with_assistant_timeout(Duration::from_millis(50));
        let mut data = ReferenceData::default();
        data.paintings = vec![
            PaintingRecord::new("D001", "Reeds and Geese"),
            PaintingRecord::new("D002", "Mountain Retreat"),
        ];
        let refs = ReferenceStore::from_data(data);
        let mut graph = WorkingGraph::with_author("AUTHOR", "Shitao", PropertyMap::new());
        let assistant = SlowSynthesizer;

        let outcome = router
            .route(&mut graph, &refs, &ctx("show all paintings", &[], &assistant))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.added_nodes, 2);
        assert_eq!(outcome.changes.len(), 2);
        assert_eq!(outcome.full_answer, outcome.message);
        assert_eq!(graph.node_count(), 3);

        let outcome = router
            .route(&mut graph, &refs, &ctx("hello there", &[], &assistant))
            .await
            .unwrap();
        assert_eq!(outcome.full_answer, DIRECT_ANSWER_FALLBACK);
    }

    #[tokio::test]
    async fn test_kind_conflict_propagates() {
        let router = router();
        let mut data = ReferenceData::default();
        data.paintings = vec![PaintingRecord::new("D001", "Reeds and Geese")];
        let refs = ReferenceStore::from_data(data);
        let mut graph = WorkingGraph::with_author("AUTHOR", "Shitao", PropertyMap::new());
        graph
            .add_node(NodeKind::Reference, "D001", NodeSeed::new())
            .unwrap();
        let assistant = OfflineAssistant;
        let template = router.catalog().get(SHOW_ALL_PAINTINGS_BY_AUTHOR).unwrap();

        let err = router
            .execute(template, Resolution::Explicit, &mut graph, &refs, &ctx("", &[], &assistant))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::KindConflict { .. }));
    }

    #[tokio::test]
    async fn test_direct_answer_fallback() {
        let router = router();
        let refs = ReferenceStore::default();
        let mut graph = WorkingGraph::with_author("AUTHOR", "Shitao", PropertyMap::new());
        let assistant = FixedClassifier {
            template_id: None,
            confidence: 0.0,
            fail: false,
        };
        let outcome = router
            .route(&mut graph, &refs, &ctx("hello there", &[], &assistant))
            .await
            .unwrap();
        assert!(outcome.template_id.is_none());
        assert_eq!(outcome.full_answer, DIRECT_ANSWER_FALLBACK);
        assert_eq!(graph.node_count(), 1);
    }
}
