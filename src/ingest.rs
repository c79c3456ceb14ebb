//! Ingestion pipeline orchestration.
//!
//! Coordinates the flow from raw material into the two knowledge stores:
//! chunk records → hybrid search engine, extraction output → knowledge
//! graph. Collaborator calls run under the configured timeouts. Batch
//! indexing comes in two flavors: strict (first failure aborts, indices
//! untouched) and lenient (bad records are rejected individually, the rest
//! proceed).

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::Embedder;
use crate::engine::HybridSearchEngine;
use crate::error::{Error, Result};
use crate::extraction::{validate_extraction, Extractor};
use crate::graph::KnowledgeGraph;
use crate::models::Chunk;

/// Counters for one ingestion run.
#[derive(Debug, Default)]
pub struct IngestStats {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub objects_added: usize,
    pub links_added: usize,
    pub links_rejected: usize,
    pub duration_ms: u128,
}

async fn with_deadline<T>(
    seconds: u64,
    operation: &'static str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(Duration::from_secs(seconds), fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout { operation, seconds }),
    }
}

/// Index a set of chunk records, embedding any that arrive without a
/// vector.
///
/// In strict mode every record is validated before the indices are touched,
/// so the first failure aborts the whole batch with no partial update. In
/// lenient mode each failing record is rejected and counted while the rest
/// go through.
pub async fn ingest_chunks(
    engine: &HybridSearchEngine,
    embedder: &dyn Embedder,
    chunks: Vec<Chunk>,
    strict: bool,
    config: &Config,
) -> Result<IngestStats> {
    let start = Instant::now();
    let mut stats = IngestStats::default();
    let mut prepared: Vec<Chunk> = Vec::with_capacity(chunks.len());

    for mut chunk in chunks {
        if chunk.text.trim().is_empty() {
            stats.skipped += 1;
            continue;
        }
        if chunk.embedding.is_empty() {
            let embedded = with_deadline(
                config.embedding.timeout_secs,
                "embedding",
                embedder.embed(&chunk.text),
            )
            .await;
            match embedded {
                Ok(vector) => chunk.embedding = vector,
                Err(e) if strict => return Err(e),
                Err(e) => {
                    warn!(chunk = %chunk.id, error = %e, "failed to embed chunk, rejecting");
                    stats.failed += 1;
                    continue;
                }
            }
        }
        prepared.push(chunk);
    }

    if strict {
        stats.indexed = engine.index_batch(&prepared)?;
    } else {
        for chunk in &prepared {
            match engine.index(&chunk.id, &chunk.text, chunk.embedding.clone()) {
                Ok(()) => stats.indexed += 1,
                Err(e) => {
                    warn!(chunk = %chunk.id, error = %e, "failed to index chunk, rejecting");
                    stats.failed += 1;
                }
            }
        }
    }

    stats.duration_ms = start.elapsed().as_millis();
    info!(
        indexed = stats.indexed,
        skipped = stats.skipped,
        failed = stats.failed,
        "chunk ingestion complete"
    );
    Ok(stats)
}

/// Run the full pipeline for one note: index its text as a chunk, extract
/// objects and links, and fold them into the graph.
///
/// Extraction output is validated before any graph mutation. A dangling
/// link rejects that edge only: structural edge
/// errors never abort the rest of a note's ingestion.
pub async fn ingest_note(
    engine: &HybridSearchEngine,
    graph: &mut KnowledgeGraph,
    embedder: &dyn Embedder,
    extractor: &dyn Extractor,
    note_id: &str,
    text: &str,
    config: &Config,
) -> Result<IngestStats> {
    let start = Instant::now();
    let mut stats = IngestStats::default();

    let vector = with_deadline(
        config.embedding.timeout_secs,
        "embedding",
        embedder.embed(text),
    )
    .await?;
    engine.index(note_id, text, vector)?;
    stats.indexed = 1;

    let extraction = with_deadline(
        config.extraction.timeout_secs,
        "extraction",
        extractor.extract(text),
    )
    .await?;
    validate_extraction(&extraction)?;

    stats.objects_added = extraction.objects.len();
    graph.add_objects(extraction.objects)?;

    for link in extraction.links {
        match graph.check_link(&link) {
            Ok(()) => {
                graph.add_links(vec![link])?;
                stats.links_added += 1;
            }
            Err(e) => {
                warn!(src = %link.src_id, dst = %link.dst_id, error = %e, "rejecting link");
                stats.links_rejected += 1;
            }
        }
    }

    stats.duration_ms = start.elapsed().as_millis();
    info!(
        note = note_id,
        objects = stats.objects_added,
        links = stats.links_added,
        rejected = stats.links_rejected,
        "note ingestion complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::extraction::RuleExtractor;

    fn chunk(id: &str, text: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: text.to_string(),
            embedding,
            token_count: None,
        }
    }

    #[tokio::test]
    async fn test_ingest_chunks_embeds_missing_vectors() {
        let config = Config::default();
        let embedder = HashEmbedder::new(16);
        let engine = HybridSearchEngine::new(Box::new(HashEmbedder::new(16)), &config);

        let chunks = vec![
            chunk("c1", "the earth is round", vec![]),
            chunk("c2", "gravity causes orbits", vec![]),
        ];
        let stats = ingest_chunks(&engine, &embedder, chunks, true, &config)
            .await
            .unwrap();

        assert_eq!(stats.indexed, 2);
        assert_eq!(engine.len(), 2);
    }

    #[tokio::test]
    async fn test_lenient_mode_rejects_single_record() {
        let config = Config::default();
        let embedder = HashEmbedder::new(16);
        let engine = HybridSearchEngine::new(Box::new(HashEmbedder::new(16)), &config);

        let chunks = vec![
            chunk("c1", "fine", vec![1.0; 16]),
            chunk("c2", "wrong dims", vec![1.0; 3]),
            chunk("c3", "also fine", vec![0.5; 16]),
            chunk("", "  ", vec![]),
        ];
        let stats = ingest_chunks(&engine, &embedder, chunks, false, &config)
            .await
            .unwrap();

        assert_eq!(stats.indexed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(engine.len(), 2);
    }

    #[tokio::test]
    async fn test_strict_mode_aborts_batch() {
        let config = Config::default();
        let embedder = HashEmbedder::new(16);
        let engine = HybridSearchEngine::new(Box::new(HashEmbedder::new(16)), &config);

        let chunks = vec![
            chunk("c1", "fine", vec![1.0; 16]),
            chunk("c2", "wrong dims", vec![1.0; 3]),
        ];
        let result = ingest_chunks(&engine, &embedder, chunks, true, &config).await;

        assert!(result.is_err());
        assert_eq!(engine.len(), 0);
    }

    #[tokio::test]
    async fn test_ingest_note_builds_graph_and_index() {
        let config = Config::default();
        let embedder = HashEmbedder::new(16);
        let engine = HybridSearchEngine::new(Box::new(HashEmbedder::new(16)), &config);
        let mut graph = KnowledgeGraph::new();

        let stats = ingest_note(
            &engine,
            &mut graph,
            &embedder,
            &RuleExtractor,
            "note-1",
            "The earth is round. Gravity explains the tides.",
            &config,
        )
        .await
        .unwrap();

        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.objects_added, 3);
        assert_eq!(stats.links_added, 2);
        assert_eq!(stats.links_rejected, 0);
        assert_eq!(engine.len(), 1);
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.find_contradictions().len(), 1);
    }
}
