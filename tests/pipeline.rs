//! End-to-end tests across the public library surface: chunk ingestion,
//! hybrid search, graph construction, and insight generation working
//! together the way the CLI drives them.

use noema::config::Config;
use noema::embedding::HashEmbedder;
use noema::engine::HybridSearchEngine;
use noema::extraction::RuleExtractor;
use noema::graph::KnowledgeGraph;
use noema::ingest::{ingest_chunks, ingest_note};
use noema::intelligence::IntelligenceLayer;
use noema::models::{Chunk, InsightPayload, InsightType, LinkType, Object, ObjectType, Severity};

fn chunk(id: &str, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        embedding: Vec::new(),
        token_count: None,
    }
}

#[tokio::test]
async fn chunks_ingested_offline_are_searchable() {
    let config = Config::default();
    let embedder = HashEmbedder::new(64);
    let engine = HybridSearchEngine::new(Box::new(HashEmbedder::new(64)), &config);

    let chunks = vec![
        chunk("c1", "the earth is round and orbits the sun"),
        chunk("c2", "gravity pulls objects toward the center of mass"),
        chunk("c3", "the recipe calls for two eggs and a cup of flour"),
    ];
    let stats = ingest_chunks(&engine, &embedder, chunks, true, &config)
        .await
        .unwrap();
    assert_eq!(stats.indexed, 3);

    let results = engine.search("earth orbits", 10).await.unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].id, "c1");
    // c1 carries both query tokens, so both channels agree on it.
    assert!(results[0].matched_in.both());

    // Fused order is descending and ties break on id, so the ranking is
    // stable across runs.
    for pair in results.windows(2) {
        assert!(
            pair[0].fused_score > pair[1].fused_score
                || (pair[0].fused_score == pair[1].fused_score && pair[0].id < pair[1].id)
        );
    }
}

#[tokio::test]
async fn note_ingestion_feeds_both_stores() {
    let config = Config::default();
    let embedder = HashEmbedder::new(64);
    let engine = HybridSearchEngine::new(Box::new(HashEmbedder::new(64)), &config);
    let mut graph = KnowledgeGraph::new();

    let text = "The earth is round. Gravity explains the tides. What about dark matter?";
    let stats = ingest_note(
        &engine,
        &mut graph,
        &embedder,
        &RuleExtractor,
        "note-1",
        text,
        &config,
    )
    .await
    .unwrap();

    assert_eq!(stats.indexed, 1);
    assert!(stats.objects_added >= 3);
    assert_eq!(stats.links_rejected, 0);

    // The note itself is retrievable.
    let results = engine.search("gravity tides", 5).await.unwrap();
    assert_eq!(results[0].id, "note-1");

    // The extracted contradiction and the open question surface as insights.
    let layer = IntelligenceLayer::new(&graph, config.insights.clone());
    let insights = layer.generate_insights();
    assert!(insights
        .iter()
        .any(|i| i.insight_type == InsightType::Contradiction));
    assert!(insights
        .iter()
        .any(|i| i.insight_type == InsightType::StaleThread));
}

#[tokio::test]
async fn empty_query_and_empty_index_degrade_gracefully() {
    let config = Config::default();
    let engine = HybridSearchEngine::new(Box::new(HashEmbedder::new(64)), &config);

    // Nothing indexed: no results, no error, no embedding call needed.
    assert!(engine.search("anything", 5).await.unwrap().is_empty());

    engine
        .index("c1", "some text", vec![1.0; 64])
        .unwrap();
    let results = engine.search("zzz qqq", 5).await.unwrap();
    // The keyword channel contributes nothing for unseen tokens, but the
    // vector channel still ranks every chunk.
    assert_eq!(results.len(), 1);
    assert!((results[0].keyword_score - 0.0).abs() < 1e-6);
}

#[test]
fn merge_then_analyze_ignores_merged_nodes() {
    let mut graph = KnowledgeGraph::new();
    graph
        .add_objects(vec![
            Object::new("q-dupe", ObjectType::Question, "what causes tides?", 0.8),
            Object::new("q-keep", ObjectType::Question, "what causes the tides?", 0.9),
            Object::new("c-moon", ObjectType::Claim, "the moon causes tides", 0.9),
        ])
        .unwrap();
    graph.merge("q-dupe", "q-keep").unwrap();

    // A link addressed to the merged id is rejected, not redirected.
    let dangling = noema::models::Link {
        src_id: "q-dupe".to_string(),
        dst_id: "c-moon".to_string(),
        link_type: LinkType::DependsOn,
        confidence: 0.9,
        evidence_span_id: None,
    };
    assert!(graph.check_link(&dangling).is_err());

    graph
        .add_links(vec![noema::models::Link {
            src_id: "q-keep".to_string(),
            ..dangling
        }])
        .unwrap();

    let layer = IntelligenceLayer::new(&graph, noema::config::InsightConfig::default());
    let stale = layer.detect_stale_threads();
    // The survivor has an outgoing edge, the merged node is invisible.
    assert!(stale.is_empty());

    let centrality = layer.compute_centrality();
    assert!(centrality.iter().all(|(id, _)| id != "q-dupe"));
}

#[tokio::test]
async fn contradiction_severity_flows_from_extraction_confidence() {
    let config = Config::default();
    let embedder = HashEmbedder::new(32);
    let engine = HybridSearchEngine::new(Box::new(HashEmbedder::new(32)), &config);
    let mut graph = KnowledgeGraph::new();

    // The rule extractor emits a confident round-earth claim against a
    // low-confidence flat-earth claim: exactly one endpoint is
    // well-evidenced, so the contradiction grades medium.
    ingest_note(
        &engine,
        &mut graph,
        &embedder,
        &RuleExtractor,
        "note-earth",
        "The earth is round, not flat.",
        &config,
    )
    .await
    .unwrap();

    let layer = IntelligenceLayer::new(&graph, config.insights.clone());
    let insights = layer.detect_contradictions();
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].severity, Severity::Medium);
    match &insights[0].payload {
        InsightPayload::Contradiction { src_id, dst_id, .. } => {
            assert_eq!(src_id, "claim-earth-round");
            assert_eq!(dst_id, "claim-earth-flat");
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}
