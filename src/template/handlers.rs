//! Handlers bound to the built-in templates
//!
//! Every handler reads the reference dataset, extends the working graph and
//! reports what changed. Lookup misses come back as a message with no
//! mutation; graph errors propagate.

use super::{
    ChangeRecorder, HandlerContext, HandlerOutput, SelectedItem, TemplateHandler, TemplateResult,
};
use crate::graph::{
    GraphResult, Node, NodeAddition, NodeId, NodeKind, NodeSeed, PropertyMap, SimilarityPage,
    WorkingGraph,
};
use crate::nlq::ReferenceCandidate;
use crate::reference::{base_painting_id, ReferenceStore, StandardSealMatch, StandardSealRecord};
use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Painting node under its base id, labelled from the catalogue when known
fn ensure_painting(
    graph: &mut WorkingGraph,
    refs: &ReferenceStore,
    id: &str,
) -> GraphResult<NodeAddition> {
    let base = base_painting_id(id);
    let seed = match refs.painting(base) {
        Some(record) => NodeSeed::new()
            .label(record.display_name())
            .properties(record.to_properties()),
        None => NodeSeed::new().label(base),
    };
    graph.add_node(NodeKind::Painting, base, seed)
}

/// Seal node owned by `owner`; a missing owner leaves the seal unowned
fn ensure_seal(
    graph: &mut WorkingGraph,
    refs: &ReferenceStore,
    code: &str,
    owner: Option<&NodeId>,
) -> GraphResult<NodeAddition> {
    let mut seed = match refs.seal(code) {
        Some(record) => NodeSeed::new()
            .label(record.name.clone().unwrap_or_else(|| format!("Seal {}", code)))
            .properties(record.to_properties()),
        None => NodeSeed::new().label(format!("Seal {}", code)),
    };
    if let Some(owner) = owner {
        seed = seed.owner(owner);
    }
    graph.add_node(NodeKind::Seal, code, seed)
}

fn ensure_standard_seal(
    graph: &mut WorkingGraph,
    record: &StandardSealRecord,
) -> GraphResult<NodeAddition> {
    let seed = NodeSeed::new()
        .label(record.display_name())
        .properties(record.to_properties());
    graph.add_node(NodeKind::StandardSeal, record.code.as_str(), seed)
}

/// Seal to standard seal page, oriented seal image -> standard image
fn standard_page(matched: &StandardSealMatch, seal_image: Option<&str>) -> SimilarityPage {
    let source = seal_image
        .or(matched.seal_image.as_deref())
        .unwrap_or(matched.seal_code.as_str());
    let mut details = PropertyMap::new();
    details.insert("seal_code".to_string(), matched.seal_code.as_str().into());
    details.insert(
        "standard_code".to_string(),
        matched.standard.code.as_str().into(),
    );
    SimilarityPage::new(matched.score, source, matched.standard.image.as_str())
        .with_details(details)
}

/// Add the standard seal, then the page linking the seal to it
fn link_standard(
    graph: &mut WorkingGraph,
    recorder: &mut ChangeRecorder,
    seal: &NodeId,
    matched: &StandardSealMatch,
    seal_image: Option<&str>,
) -> GraphResult<Node> {
    let standard = ensure_standard_seal(graph, &matched.standard)?;
    recorder.node(&standard);
    let similarity =
        graph.add_similarity_edge(seal, &standard.node.id, standard_page(matched, seal_image))?;
    recorder.similarity(&standard, &similarity);
    Ok(standard.node)
}

/// Painting node whose label occurs in the question, else the current painting
fn target_painting(
    graph: &WorkingGraph,
    refs: &ReferenceStore,
    ctx: &HandlerContext<'_>,
) -> Option<String> {
    let named = graph
        .nodes_of_kind(NodeKind::Painting)
        .into_iter()
        .find(|n| !n.label.is_empty() && ctx.question.contains(&n.label))
        .map(|n| n.id.as_str().to_string());
    named
        .or_else(|| refs.painting_by_name(ctx.question).map(|p| p.id.clone()))
        .or_else(|| ctx.current_painting.map(|p| base_painting_id(p).to_string()))
}

/// Seals of one painting as seal nodes owned by it
fn add_painting_seals(
    graph: &mut WorkingGraph,
    refs: &ReferenceStore,
    painting_id: &str,
) -> TemplateResult<HandlerOutput> {
    let seals = refs.painting_seals(painting_id);
    if seals.is_empty() {
        return Ok(HandlerOutput::message(format!(
            "No seals are recorded for painting {}",
            painting_id
        )));
    }

    let mut recorder = ChangeRecorder::new();
    let painting = ensure_painting(graph, refs, painting_id)?;
    recorder.node(&painting);

    let mut codes = Vec::with_capacity(seals.len());
    for seal in &seals {
        let addition = ensure_seal(graph, refs, &seal.code, Some(&painting.node.id))?;
        recorder.node(&addition);
        codes.push(seal.code.clone());
    }
    info!("Added {} seals of painting {}", codes.len(), painting.node.id);

    Ok(recorder.finish(
        format!(
            "Found {} seals on \"{}\"",
            codes.len(),
            painting.node.label
        ),
        json!({ "painting": painting.node.id, "seals": codes }),
    ))
}

fn seal_code_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?:印章|(?i:seal)\s*(?:code|number|no\.?)?\s*[#:]?\s*)(\d+)|(\d{3,4})").ok())
        .as_ref()
}

/// Seal code mentioned in the question, zero-padded to four digits
pub fn extract_seal_code(question: &str) -> Option<String> {
    let captures = seal_code_pattern()?.captures(question)?;
    let digits = captures.get(1).or_else(|| captures.get(2))?.as_str();
    Some(format!("{:0>4}", digits))
}

/// Template 1
pub struct SimilarPaintingsBySegment;

#[async_trait]
impl TemplateHandler for SimilarPaintingsBySegment {
    async fn handle(
        &self,
        graph: &mut WorkingGraph,
        refs: &ReferenceStore,
        ctx: &HandlerContext<'_>,
    ) -> TemplateResult<HandlerOutput> {
        let mut recorder = ChangeRecorder::new();
        let mut matched = Vec::new();
        let mut segments = 0;

        for item in ctx.selection {
            let SelectedItem::Segment {
                image_id,
                path,
                name,
            } = item
            else {
                continue;
            };
            segments += 1;

            let source_id = ctx.current_painting.unwrap_or(image_id.as_str());
            let matches: Vec<_> = refs
                .segment_similarities(image_id, path, ctx.similarity_range)
                .into_iter()
                .filter(|m| base_painting_id(&m.painting_id) != base_painting_id(source_id))
                .collect();
            debug!("Segment {} of {} has {} matches", path, image_id, matches.len());
            if matches.is_empty() {
                continue;
            }

            // the source joins the graph only once a match is known
            let source = ensure_painting(graph, refs, source_id)?;
            recorder.node(&source);

            for m in matches {
                let target = ensure_painting(graph, refs, &m.painting_id)?;
                recorder.node(&target);

                let mut details = PropertyMap::new();
                details.insert("matched_image".to_string(), m.painting_id.as_str().into());
                if let Some(name) = name {
                    details.insert("segment_name".to_string(), name.as_str().into());
                }
                let page = SimilarityPage::new(m.score, path.as_str(), m.segment_path.as_str())
                    .with_details(details);
                let similarity = graph.add_similarity_edge(&source.node.id, &target.node.id, page)?;
                recorder.similarity(&target, &similarity);

                matched.push(json!({
                    "painting": target.node.id,
                    "segment": m.segment_path,
                    "score": m.score,
                }));
            }
        }

        if matched.is_empty() {
            return Ok(recorder.finish(
                format!(
                    "No similar segments in range {:.2}-{:.2}",
                    ctx.similarity_range.min, ctx.similarity_range.max
                ),
                json!({ "matches": [] }),
            ));
        }

        let message = format!(
            "Found {} similar matches for {} selected segments",
            matched.len(),
            segments
        );
        Ok(recorder.finish(message, json!({ "matches": matched })))
    }
}

/// Template 2
pub struct ShowCurrentPaintingSeals;

#[async_trait]
impl TemplateHandler for ShowCurrentPaintingSeals {
    async fn handle(
        &self,
        graph: &mut WorkingGraph,
        refs: &ReferenceStore,
        ctx: &HandlerContext<'_>,
    ) -> TemplateResult<HandlerOutput> {
        let Some(current) = ctx.current_painting else {
            return Ok(HandlerOutput::message("Open a painting first"));
        };
        add_painting_seals(graph, refs, base_painting_id(current))
    }
}

/// Template 3
pub struct StandardSealBySelectedSeal;

#[async_trait]
impl TemplateHandler for StandardSealBySelectedSeal {
    async fn handle(
        &self,
        graph: &mut WorkingGraph,
        refs: &ReferenceStore,
        ctx: &HandlerContext<'_>,
    ) -> TemplateResult<HandlerOutput> {
        let mut recorder = ChangeRecorder::new();
        let owner = ctx
            .current_painting
            .map(|p| NodeId::new(base_painting_id(p)));

        let mut found = Vec::new();
        let mut missing = Vec::new();
        for item in ctx.selection {
            let SelectedItem::Seal { code, image } = item else {
                continue;
            };
            let seal = ensure_seal(graph, refs, code, owner.as_ref())?;
            recorder.node(&seal);

            match refs.standard_seal_for(code) {
                Some(matched) => {
                    let standard =
                        link_standard(graph, &mut recorder, &seal.node.id, &matched, image.as_deref())?;
                    found.push(json!({ "seal": code, "standard": standard.id, "score": matched.score }));
                }
                None => missing.push(code.clone()),
            }
        }

        let message = match (found.len(), missing.is_empty()) {
            (0, _) => format!("No standard seal matches seal {}", missing.join(", ")),
            (n, true) => format!("Found standard seals for {} selected seals", n),
            (n, false) => format!(
                "Found standard seals for {} selected seals; none for {}",
                n,
                missing.join(", ")
            ),
        };
        Ok(recorder.finish(message, json!({ "matches": found, "unmatched": missing })))
    }
}

/// Template 4
pub struct ShowAllStandardSeals;

#[async_trait]
impl TemplateHandler for ShowAllStandardSeals {
    async fn handle(
        &self,
        graph: &mut WorkingGraph,
        refs: &ReferenceStore,
        _ctx: &HandlerContext<'_>,
    ) -> TemplateResult<HandlerOutput> {
        let standards = refs.all_standard_seals();
        if standards.is_empty() {
            return Ok(HandlerOutput::message("No standard seals are catalogued"));
        }

        let mut recorder = ChangeRecorder::new();
        for record in &standards {
            let addition = ensure_standard_seal(graph, record)?;
            recorder.node(&addition);
        }
        let codes: Vec<&str> = standards.iter().map(|s| s.code.as_str()).collect();
        Ok(recorder.finish(
            format!("Found {} standard seals", standards.len()),
            json!({ "standard_seals": codes }),
        ))
    }
}

/// Template 5
pub struct SimilarPaintingsByName;

#[async_trait]
impl TemplateHandler for SimilarPaintingsByName {
    async fn handle(
        &self,
        graph: &mut WorkingGraph,
        refs: &ReferenceStore,
        ctx: &HandlerContext<'_>,
    ) -> TemplateResult<HandlerOutput> {
        let Some(painting_id) = target_painting(graph, refs, ctx) else {
            return Ok(HandlerOutput::message(
                "Name a painting in the question or open one first",
            ));
        };
        let Some(best) = refs.best_segment_match(&painting_id) else {
            return Ok(HandlerOutput::message(format!(
                "No similar painting is recorded for {}",
                painting_id
            )));
        };

        let mut recorder = ChangeRecorder::new();
        let source = ensure_painting(graph, refs, &painting_id)?;
        recorder.node(&source);
        let target = ensure_painting(graph, refs, &best.painting_id)?;
        recorder.node(&target);

        let mut details = PropertyMap::new();
        details.insert("matched_image".to_string(), best.painting_id.as_str().into());
        let page = SimilarityPage::new(
            best.score,
            best.source_segment.as_str(),
            best.segment_path.as_str(),
        )
        .with_details(details);
        let similarity = graph.add_similarity_edge(&source.node.id, &target.node.id, page)?;
        recorder.similarity(&target, &similarity);

        Ok(recorder.finish(
            format!(
                "\"{}\" is most similar to \"{}\" ({:.1}%)",
                source.node.label,
                target.node.label,
                best.score * 100.0
            ),
            json!({
                "painting": source.node.id,
                "match": target.node.id,
                "score": best.score,
            }),
        ))
    }
}

/// Template 6
pub struct ShowPaintingSealsByName;

#[async_trait]
impl TemplateHandler for ShowPaintingSealsByName {
    async fn handle(
        &self,
        graph: &mut WorkingGraph,
        refs: &ReferenceStore,
        ctx: &HandlerContext<'_>,
    ) -> TemplateResult<HandlerOutput> {
        let Some(painting_id) = target_painting(graph, refs, ctx) else {
            return Ok(HandlerOutput::message(
                "Name a painting in the question or open one first",
            ));
        };
        add_painting_seals(graph, refs, &painting_id)
    }
}

/// Template 7
pub struct ShowAllPaintings;

#[async_trait]
impl TemplateHandler for ShowAllPaintings {
    async fn handle(
        &self,
        graph: &mut WorkingGraph,
        refs: &ReferenceStore,
        _ctx: &HandlerContext<'_>,
    ) -> TemplateResult<HandlerOutput> {
        let paintings = refs.all_paintings();
        if paintings.is_empty() {
            return Ok(HandlerOutput::message("No paintings are catalogued"));
        }

        let mut recorder = ChangeRecorder::new();
        for record in &paintings {
            let addition = ensure_painting(graph, refs, &record.id)?;
            recorder.node(&addition);
        }
        let author = graph
            .node(graph.anchor_id())
            .map(|n| n.label)
            .unwrap_or_default();
        Ok(recorder.finish(
            format!("Found {} paintings by {}", paintings.len(), author),
            json!({ "count": paintings.len() }),
        ))
    }
}

/// Template 8
pub struct SmartReferenceQuery;

#[async_trait]
impl TemplateHandler for SmartReferenceQuery {
    async fn handle(
        &self,
        graph: &mut WorkingGraph,
        refs: &ReferenceStore,
        ctx: &HandlerContext<'_>,
    ) -> TemplateResult<HandlerOutput> {
        let paintings = graph.nodes_of_kind(NodeKind::Painting);
        if paintings.is_empty() {
            return Ok(HandlerOutput::message(
                "Add a painting to the graph before asking about references",
            ));
        }

        let mut candidates: IndexMap<String, ReferenceCandidate> = IndexMap::new();
        let mut records = IndexMap::new();
        for painting in &paintings {
            for record in refs.painting_references(painting.id.as_str()) {
                candidates
                    .entry(record.id.clone())
                    .or_insert_with(|| ReferenceCandidate {
                        id: record.id.clone(),
                        name: record.name.clone(),
                        info: record.info.clone(),
                        text: record.text.clone(),
                        paintings: Vec::new(),
                    })
                    .paintings
                    .push(painting.id.as_str().to_string());
                records.entry(record.id.clone()).or_insert(record);
            }
        }
        if candidates.is_empty() {
            return Ok(HandlerOutput::message(
                "No references are recorded for the paintings in the graph",
            ));
        }

        let candidate_list: Vec<ReferenceCandidate> = candidates.values().cloned().collect();
        let selection = match ctx
            .assistant
            .select_references(ctx.question, &candidate_list)
            .await
        {
            Ok(selection) => selection,
            Err(e) => {
                warn!("Reference selection failed: {}", e);
                return Ok(HandlerOutput::message(
                    "Reference selection is unavailable right now, please retry",
                ));
            }
        };

        let selected: Vec<&ReferenceCandidate> = selection
            .ids
            .iter()
            .filter_map(|id| candidates.get(id))
            .collect();
        if selected.is_empty() {
            let reason = if selection.reason.is_empty() {
                "No references are relevant to the question".to_string()
            } else {
                selection.reason.clone()
            };
            return Ok(HandlerOutput::message(reason));
        }

        let mut recorder = ChangeRecorder::new();
        for candidate in &selected {
            let Some(record) = records.get(&candidate.id) else {
                continue;
            };
            let seed = NodeSeed::new()
                .label(if record.name.is_empty() { record.id.as_str() } else { record.name.as_str() })
                .properties(record.to_properties());
            let reference = graph.add_node(NodeKind::Reference, record.id.as_str(), seed)?;
            recorder.node(&reference);

            for painting in &candidate.paintings {
                let edge = graph.add_reference_edge(
                    &NodeId::new(painting.as_str()),
                    &reference.node.id,
                    record.citation(),
                )?;
                recorder.edge(&edge.edge, edge.is_new);
            }
        }

        let ids: Vec<&str> = selected.iter().map(|c| c.id.as_str()).collect();
        let message = if selection.reason.is_empty() {
            format!("Found {} relevant references", ids.len())
        } else {
            format!("{}\n\nFound {} relevant references", selection.reason, ids.len())
        };
        Ok(recorder.finish(message, json!({ "references": ids })))
    }
}

/// Template 9
pub struct StandardSealByCode;

#[async_trait]
impl TemplateHandler for StandardSealByCode {
    async fn handle(
        &self,
        graph: &mut WorkingGraph,
        refs: &ReferenceStore,
        ctx: &HandlerContext<'_>,
    ) -> TemplateResult<HandlerOutput> {
        let Some(code) = extract_seal_code(ctx.question) else {
            return Ok(HandlerOutput::message(
                "Name the seal code in the question, e.g. \"seal 0003\"",
            ));
        };
        let seal_id = NodeId::new(code.as_str());
        if !graph.node(&seal_id).is_some_and(|n| n.is_kind(NodeKind::Seal)) {
            return Ok(HandlerOutput::message(format!(
                "Seal {} is not in the graph yet; show the painting's seals first",
                code
            )));
        }
        let Some(matched) = refs.standard_seal_for(&code) else {
            return Ok(HandlerOutput::message(format!(
                "No standard seal matches seal {}",
                code
            )));
        };

        let mut recorder = ChangeRecorder::new();
        let standard = link_standard(graph, &mut recorder, &seal_id, &matched, None)?;
        Ok(recorder.finish(
            format!(
                "Seal {} matches standard seal \"{}\" ({:.1}%)",
                code,
                standard.label,
                matched.score * 100.0
            ),
            json!({ "seal": code, "standard": standard.id, "score": matched.score }),
        ))
    }
}

/// Template 10
pub struct SealsByStandardName;

const STANDARD_SUFFIXES: [&str; 2] = ["(标准)", " (standard)"];

#[async_trait]
impl TemplateHandler for SealsByStandardName {
    async fn handle(
        &self,
        graph: &mut WorkingGraph,
        refs: &ReferenceStore,
        ctx: &HandlerContext<'_>,
    ) -> TemplateResult<HandlerOutput> {
        let standards = graph.nodes_of_kind(NodeKind::StandardSeal);
        if standards.is_empty() {
            return Ok(HandlerOutput::message(
                "No standard seals are in the graph yet",
            ));
        }

        let named = standards.into_iter().find(|node| {
            let bare = STANDARD_SUFFIXES
                .iter()
                .find_map(|s| node.label.strip_suffix(s))
                .unwrap_or(&node.label);
            (!node.label.is_empty() && ctx.question.contains(&node.label))
                || (!bare.is_empty() && ctx.question.contains(bare))
        });
        let Some(standard) = named else {
            return Ok(HandlerOutput::message(
                "Name one of the standard seals in the graph",
            ));
        };

        let matches = refs.seals_for_standard(standard.id.as_str());
        if matches.is_empty() {
            return Ok(HandlerOutput::message(format!(
                "No seals are mapped to standard seal \"{}\"",
                standard.label
            )));
        }

        let mut recorder = ChangeRecorder::new();
        let mut seals = Vec::with_capacity(matches.len());
        for matched in &matches {
            let owner = match refs.seal(&matched.seal_code).and_then(|s| s.painting_id.clone()) {
                Some(painting_id) => {
                    let painting = ensure_painting(graph, refs, &painting_id)?;
                    recorder.node(&painting);
                    Some(painting.node.id)
                }
                None => None,
            };
            let seal = ensure_seal(graph, refs, &matched.seal_code, owner.as_ref())?;
            recorder.node(&seal);
            link_standard(graph, &mut recorder, &seal.node.id, matched, None)?;
            seals.push(matched.seal_code.clone());
        }

        Ok(recorder.finish(
            format!(
                "Found {} seals matching standard seal \"{}\"",
                seals.len(),
                standard.label
            ),
            json!({ "standard": standard.id, "seals": seals }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::NodeChange;
    use crate::nlq::OfflineAssistant;
    use crate::reference::{
        PaintingRecord, ReferenceData, ReferenceRecord, SealMapping, SealRecord, SimilarityRange,
    };

    fn refs() -> ReferenceStore {
        let mut data = ReferenceData::default();
        data.paintings = vec![
            PaintingRecord::new("D001", "Reeds and Geese"),
            PaintingRecord::new("D002", "Mountain Retreat"),
        ];
        data.seals = vec![
            SealRecord::new("0003", "D001_1").with_image("seals/0003.png"),
            SealRecord::new("0007", "D002").with_image("seals/0007.png"),
        ];
        data.standard_seals = vec![StandardSealRecord::new("SS01", "Chijue", "std/ss01.png")];
        data.seal_mapping = vec![
            SealMapping {
                seal_code: "0003".to_string(),
                seal_image: None,
                standard_image: Some("std/ss01.png".to_string()),
                has_reference: true,
                similarity: Some(0.87),
            },
            SealMapping {
                seal_code: "0007".to_string(),
                seal_image: None,
                standard_image: Some("std/ss01.png".to_string()),
                has_reference: true,
                similarity: Some(0.81),
            },
        ];
        data.add_segment_similarity("D001_1", "seg/a.png", "D002_3", "seg/b.png", 0.91);
        data.add_segment_similarity("D001_1", "seg/a.png", "D002_4", "seg/c.png", 0.5);
        data.painting_references.insert(
            "D001".to_string(),
            vec![ReferenceRecord::new("R1", "Catalogue", "vol. 2", "ink on paper")],
        );
        ReferenceStore::from_data(data)
    }

    fn graph() -> WorkingGraph {
        WorkingGraph::with_author("AUTHOR", "Shitao", PropertyMap::new())
    }

    fn ctx<'a>(
        question: &'a str,
        current: Option<&'a str>,
        selection: &'a [SelectedItem],
        assistant: &'a OfflineAssistant,
    ) -> HandlerContext<'a> {
        HandlerContext {
            question,
            current_painting: current,
            selection,
            similarity_range: SimilarityRange::default(),
            assistant,
        }
    }

    #[test]
    fn test_extract_seal_code() {
        assert_eq!(extract_seal_code("印章3的标准印章").as_deref(), Some("0003"));
        assert_eq!(extract_seal_code("standard for seal 12?").as_deref(), Some("0012"));
        assert_eq!(extract_seal_code("what about 0421").as_deref(), Some("0421"));
        assert_eq!(extract_seal_code("Seal code: 7").as_deref(), Some("0007"));
        assert_eq!(extract_seal_code("no digits"), None);
    }

    #[tokio::test]
    async fn test_segment_handler() {
        let refs = refs();
        let mut graph = graph();
        let assistant = OfflineAssistant;
        let selection = vec![SelectedItem::segment("D001_1", "seg/a.png")];

        let output = SimilarPaintingsBySegment
            .handle(&mut graph, &refs, &ctx("similar?", Some("D001"), &selection, &assistant))
            .await
            .unwrap();
        assert_eq!(output.added_node_count(), 2);
        let edge = graph
            .similarity_edge(&NodeId::new("D001"), &NodeId::new("D002"))
            .unwrap();
        assert_eq!(edge.page_count(), 1);
        assert_eq!(edge.pages()[0].source_artifact, "seg/a.png");
        assert_eq!(edge.pages()[0].target_artifact, "seg/b.png");

        // asking again is a duplicate
        let output = SimilarPaintingsBySegment
            .handle(&mut graph, &refs, &ctx("similar?", Some("D001"), &selection, &assistant))
            .await
            .unwrap();
        assert!(output
            .changes
            .iter()
            .any(|c| matches!(c, NodeChange::Duplicate(n) if n.id.as_str() == "D002")));
        assert!(output.added_edges.is_empty());
    }

    #[tokio::test]
    async fn test_segment_miss_leaves_graph_alone() {
        let refs = refs();
        let mut graph = graph();
        let assistant = OfflineAssistant;
        let selection = vec![SelectedItem::segment("D001_1", "seg/unknown.png")];

        let output = SimilarPaintingsBySegment
            .handle(&mut graph, &refs, &ctx("similar?", Some("D001"), &selection, &assistant))
            .await
            .unwrap();
        assert!(output.changes.is_empty());
        assert!(output.added_edges.is_empty());
        assert!(output.message.starts_with("No similar segments"));
        assert_eq!(graph.node_count(), 1);
    }

    #[tokio::test]
    async fn test_current_painting_seals() {
        let refs = refs();
        let mut graph = graph();
        let assistant = OfflineAssistant;

        let output = ShowCurrentPaintingSeals
            .handle(&mut graph, &refs, &ctx("seals?", None, &[], &assistant))
            .await
            .unwrap();
        assert!(output.changes.is_empty());

        let output = ShowCurrentPaintingSeals
            .handle(&mut graph, &refs, &ctx("seals?", Some("D001_1"), &[], &assistant))
            .await
            .unwrap();
        assert_eq!(output.added_node_count(), 2);
        assert!(graph
            .edge(&crate::graph::EdgeId::ownership(&"0003".into(), &"D001".into()))
            .is_some());
    }

    #[tokio::test]
    async fn test_standard_seal_by_code_needs_seal_in_graph() {
        let refs = refs();
        let mut graph = graph();
        let assistant = OfflineAssistant;

        let output = StandardSealByCode
            .handle(&mut graph, &refs, &ctx("seal 3 standard", None, &[], &assistant))
            .await
            .unwrap();
        assert!(output.changes.is_empty());
        assert_eq!(graph.node_count(), 1);

        ShowCurrentPaintingSeals
            .handle(&mut graph, &refs, &ctx("", Some("D001"), &[], &assistant))
            .await
            .unwrap();
        let output = StandardSealByCode
            .handle(&mut graph, &refs, &ctx("seal 3 standard", None, &[], &assistant))
            .await
            .unwrap();
        assert_eq!(output.added_node_count(), 1);
        let edge = graph
            .similarity_edge(&NodeId::new("0003"), &NodeId::new("SS01"))
            .unwrap();
        assert_eq!(edge.pages()[0].source_artifact, "seals/0003.png");
        assert_eq!(edge.pages()[0].target_artifact, "std/ss01.png");
    }

    #[tokio::test]
    async fn test_seals_by_standard_name() {
        let refs = refs();
        let mut graph = graph();
        let assistant = OfflineAssistant;

        ShowAllStandardSeals
            .handle(&mut graph, &refs, &ctx("", None, &[], &assistant))
            .await
            .unwrap();
        let output = SealsByStandardName
            .handle(&mut graph, &refs, &ctx("Which paintings bear Chijue?", None, &[], &assistant))
            .await
            .unwrap();

        // two paintings and two seals
        assert_eq!(output.added_node_count(), 4);
        assert!(graph.contains_node(&NodeId::new("D002")));
        assert!(graph
            .similarity_edge(&NodeId::new("0007"), &NodeId::new("SS01"))
            .is_some());
    }

    #[tokio::test]
    async fn test_smart_reference_query() {
        let refs = refs();
        let mut graph = graph();
        let assistant = OfflineAssistant;

        let output = SmartReferenceQuery
            .handle(&mut graph, &refs, &ctx("references?", None, &[], &assistant))
            .await
            .unwrap();
        assert!(output.changes.is_empty());

        ensure_painting(&mut graph, &refs, "D001").unwrap();
        let output = SmartReferenceQuery
            .handle(&mut graph, &refs, &ctx("references?", None, &[], &assistant))
            .await
            .unwrap();
        assert_eq!(output.added_node_count(), 1);
        assert_eq!(
            graph.edge_count_of_kind(crate::graph::EdgeKind::Reference),
            1
        );
    }

    #[tokio::test]
    async fn test_similar_by_name_uses_named_painting() {
        let refs = refs();
        let mut graph = graph();
        let assistant = OfflineAssistant;

        let output = SimilarPaintingsByName
            .handle(
                &mut graph,
                &refs,
                &ctx("What resembles Reeds and Geese?", None, &[], &assistant),
            )
            .await
            .unwrap();
        assert_eq!(output.added_node_count(), 2);
        let edge = graph
            .similarity_edge(&NodeId::new("D001"), &NodeId::new("D002"))
            .unwrap();
        assert_eq!(edge.score(), Some(0.91));
    }
}
