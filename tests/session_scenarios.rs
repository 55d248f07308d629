mod common;

use authgraph::graph::{EdgeKind, NodeId, NodeKind};
use authgraph::history::NodeChange;
use authgraph::template::catalog::{
    FIND_SIMILAR_PAINTINGS_BY_SEGMENT, FIND_STANDARD_SEAL_BY_SELECTED_SEAL,
    SHOW_CURRENT_PAINTING_SEALS,
};
use authgraph::{QuestionRequest, SelectedItem, SessionConfig, SessionError, SimilarityRange};
use common::{session, session_with, session_with_config, ScriptedAssistant};
use std::collections::BTreeSet;
use std::time::Duration;

fn ids(snapshot: &authgraph::GraphSnapshot) -> BTreeSet<String> {
    snapshot
        .nodes
        .iter()
        .map(|n| n.id.as_str().to_string())
        .collect()
}

fn segment_question(path: &str) -> QuestionRequest {
    QuestionRequest::new("Which paintings have similar segments?")
        .with_painting("D001")
        .with_selection(SelectedItem::segment("D001_1", path))
}

#[tokio::test]
async fn test_scenario_a_segment_matches() {
    let mut session = session();
    session.focus_painting("D001").unwrap();

    let outcome = session
        .submit_question(segment_question("seg/a.png"))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.template_id.as_deref(), Some(FIND_SIMILAR_PAINTINGS_BY_SEGMENT));
    assert_eq!(outcome.added_nodes, 2);
    assert_eq!(outcome.added_edges, 2);

    let history = session.history();
    assert_eq!(history.len(), 1);
    let recorded: BTreeSet<&str> = history[0]
        .changes
        .iter()
        .map(|c| c.node_id().as_str())
        .collect();
    assert_eq!(recorded, BTreeSet::from(["D002", "D003"]));
}

#[tokio::test]
async fn test_scenario_b_missing_seal_selection() {
    let mut session = session();
    session.focus_painting("D001").unwrap();
    let before = session.snapshot();

    let outcome = session
        .invoke_template(
            FIND_STANDARD_SEAL_BY_SELECTED_SEAL,
            QuestionRequest::new("find the matching standard seal").with_painting("D001"),
        )
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.message.contains("seal"));
    let after = session.snapshot();
    assert_eq!(before.nodes.len(), after.nodes.len());
    assert_eq!(before.edges.len(), after.edges.len());

    // failures are still audited
    let history = session.history();
    assert_eq!(history.len(), 1);
    assert!(!history[0].success);
}

#[tokio::test]
async fn test_scenario_c_repeated_standard_seal_lookup() {
    let (mut session, _) = session_with(ScriptedAssistant::classifying(
        FIND_STANDARD_SEAL_BY_SELECTED_SEAL,
        0.9,
    ));
    session.focus_painting("D001").unwrap();
    let request = QuestionRequest::new("find the standard seal for this seal")
        .with_painting("D001")
        .with_selection(SelectedItem::seal("0003"));

    let first = session.submit_question(request.clone()).await.unwrap();
    assert!(first.success);
    assert!(first
        .changes
        .iter()
        .any(|c| c.is_new() && c.node().kind == NodeKind::StandardSeal));
    assert_eq!(session.graph().edge_count_of_kind(EdgeKind::Similarity), 1);

    let second = session.submit_question(request).await.unwrap();
    assert!(second.success);
    assert_eq!(second.added_nodes, 0);
    assert_eq!(second.added_edges, 0);
    assert!(second
        .changes
        .iter()
        .any(|c| matches!(c, NodeChange::Duplicate(n) if n.id.as_str() == "SS01")));

    let edge = session
        .graph()
        .similarity_edge(&NodeId::new("0003"), &NodeId::new("SS01"))
        .unwrap();
    assert_eq!(edge.page_count(), 1);
}

#[tokio::test]
async fn test_undo_restores_previous_graph() {
    let mut session = session();
    session.focus_painting("D001").unwrap();
    let before = session.snapshot();

    session
        .submit_question(segment_question("seg/a.png"))
        .await
        .unwrap();
    assert_eq!(session.snapshot().nodes.len(), before.nodes.len() + 2);

    let report = session.undo_last().unwrap();
    assert_eq!(report.removed_nodes.len(), 2);
    let after = session.snapshot();
    assert_eq!(ids(&before), ids(&after));
    assert_eq!(before.edges.len(), after.edges.len());
    assert!(session.history().is_empty());

    assert!(matches!(
        session.undo_last(),
        Err(SessionError::History(_))
    ));
}

#[tokio::test]
async fn test_pages_accumulate_and_are_removed_precisely() {
    let mut session = session();
    session.focus_painting("D001").unwrap();

    session
        .submit_question(segment_question("seg/a.png"))
        .await
        .unwrap();
    let second = session
        .submit_question(segment_question("seg/e.png"))
        .await
        .unwrap();

    // D002 was already present; the second segment became page 1
    assert_eq!(second.added_nodes, 0);
    assert!(second
        .changes
        .iter()
        .any(|c| matches!(c, NodeChange::PageAdded { page_index: 1, .. })));
    let (p1, p2) = (NodeId::new("D001"), NodeId::new("D002"));
    assert_eq!(session.graph().similarity_edge(&p1, &p2).unwrap().page_count(), 2);

    session.remove_node_record(&p2, Some(1)).unwrap();
    let edge = session.graph().similarity_edge(&p1, &p2).unwrap();
    assert_eq!(edge.page_count(), 1);
    assert_eq!(edge.pages()[0].source_artifact, "seg/a.png");
    assert!(session.graph().contains_node(&p2));

    // removing the node drops it from every record
    session.remove_node_record(&p2, None).unwrap();
    assert!(!session.graph().contains_node(&p2));
    assert!(session
        .history()
        .iter()
        .all(|r| r.changes.iter().all(|c| c.node_id() != &p2)));
}

#[tokio::test]
async fn test_range_override_filters_matches() {
    let mut session = session();
    session.focus_painting("D001").unwrap();

    let outcome = session
        .submit_question(segment_question("seg/a.png").with_range(SimilarityRange::new(0.3, 0.5)))
        .await
        .unwrap();
    assert_eq!(outcome.added_nodes, 1);
    assert!(session.graph().contains_node(&NodeId::new("D003")));
    assert!(!session.graph().contains_node(&NodeId::new("D002")));
}

#[tokio::test]
async fn test_ledger_keeps_five_newest() {
    let mut session = session();
    for i in 0..7 {
        session
            .submit_question(QuestionRequest::new(format!("hello {}", i)))
            .await
            .unwrap();
    }
    let history = session.history();
    assert_eq!(history.len(), 5);
    assert_eq!(history[0].question, "hello 6");
    assert_eq!(history[4].question, "hello 2");
}

#[tokio::test]
async fn test_seal_chain_and_reset() {
    let mut session = session();
    session.focus_painting("D001").unwrap();

    let seals = session
        .invoke_template(
            SHOW_CURRENT_PAINTING_SEALS,
            QuestionRequest::new("").with_painting("D001"),
        )
        .await
        .unwrap();
    assert_eq!(seals.added_nodes, 2);

    let by_code = session
        .submit_question(QuestionRequest::new("standard for seal code 4"))
        .await
        .unwrap();
    assert!(by_code.success);
    assert!(session.graph().contains_node(&NodeId::new("SS02")));

    session.reset();
    let snapshot = session.snapshot();
    assert_eq!(snapshot.nodes.len(), 1);
    assert!(snapshot.edges.is_empty());
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_slow_answer_is_still_recorded_and_undoable() {
    let config = SessionConfig {
        request_timeout_secs: 1,
        ..SessionConfig::default()
    };
    let (mut session, _) = session_with_config(
        ScriptedAssistant {
            answer: Some("late answer".to_string()),
            answer_delay: Some(Duration::from_secs(3)),
            ..Default::default()
        },
        config,
    );
    let before = session.snapshot();

    let outcome = session
        .submit_question(QuestionRequest::new("show all paintings"))
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.added_nodes, 3);
    assert_eq!(outcome.full_answer, outcome.message);
    assert_eq!(session.history().len(), 1);

    session.undo_last().unwrap();
    assert_eq!(ids(&before), ids(&session.snapshot()));
}
