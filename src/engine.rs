//! Hybrid search engine: fuses vector and lexical rankings into one list.
//!
//! The engine owns both retrieval leaves, each behind its own `RwLock` so
//! queries run concurrently while writers are exclusive, so a reader never
//! observes a half-applied insert. The embedding model is injected as an
//! [`Embedder`] capability and every call to it runs under the configured
//! timeout.
//!
//! Fusion policy: `fused = alpha·vector + (1−alpha)·keyword`, plus a
//! convergence boost when a chunk surfaces in both channels. The boost
//! rewards convergent evidence; together with `alpha` it determines the
//! relevance order, so both live in [`RetrievalConfig`] rather than being
//! hardcoded. Results order by fused score descending, id ascending on
//! ties, which keeps rankings reproducible.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::{Config, RetrievalConfig};
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::index::{LexicalIndex, VectorIndex};
use crate::models::{Chunk, MatchedIn, SearchResult};

pub struct HybridSearchEngine {
    vectors: RwLock<VectorIndex>,
    lexical: RwLock<LexicalIndex>,
    embedder: Box<dyn Embedder>,
    retrieval: RetrievalConfig,
    embed_timeout: Duration,
    timeout_secs: u64,
}

impl HybridSearchEngine {
    /// Create an engine around an injected embedder.
    ///
    /// Dimensionality is pinned from `embedding.dims` when configured,
    /// otherwise established by the first indexed vector.
    pub fn new(embedder: Box<dyn Embedder>, config: &Config) -> Self {
        let timeout_secs = config.embedding.timeout_secs;
        Self {
            vectors: RwLock::new(VectorIndex::new(config.embedding.dims)),
            lexical: RwLock::new(LexicalIndex::new()),
            embedder,
            retrieval: config.retrieval.clone(),
            embed_timeout: Duration::from_secs(timeout_secs),
            timeout_secs,
        }
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.vectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.read().is_empty()
    }

    /// Register a chunk in both indices. Idempotent: re-indexing the same
    /// id replaces the previous entry, no duplication.
    ///
    /// The record is validated before either index is touched, so a failing
    /// chunk leaves no partial state behind.
    pub fn index(&self, id: &str, text: &str, vector: Vec<f32>) -> Result<()> {
        let mut vectors = self.vectors.write();
        let mut lexical = self.lexical.write();

        if id.is_empty() {
            return Err(Error::EmptyId);
        }
        vectors.check(&vector)?;

        vectors.insert(id, vector)?;
        lexical.insert(id, text)?;
        Ok(())
    }

    /// Index a batch of chunks atomically: every record is validated before
    /// any index mutation, so one wrong-dimension vector aborts the whole
    /// batch without leaving the indices partially updated.
    pub fn index_batch(&self, chunks: &[Chunk]) -> Result<usize> {
        let mut vectors = self.vectors.write();
        let mut lexical = self.lexical.write();

        let mut expected = vectors.dims();
        for chunk in chunks {
            if chunk.id.is_empty() {
                return Err(Error::EmptyId);
            }
            if chunk.embedding.is_empty() {
                return Err(Error::DimensionMismatch {
                    expected: expected.unwrap_or(0),
                    got: 0,
                });
            }
            match expected {
                Some(dims) if dims != chunk.embedding.len() => {
                    return Err(Error::DimensionMismatch {
                        expected: dims,
                        got: chunk.embedding.len(),
                    });
                }
                Some(_) => {}
                // First record of a fresh index establishes dimensionality
                // for the rest of the batch.
                None => expected = Some(chunk.embedding.len()),
            }
        }

        for chunk in chunks {
            vectors.insert(&chunk.id, chunk.embedding.clone())?;
            lexical.insert(&chunk.id, &chunk.text)?;
        }
        Ok(chunks.len())
    }

    /// Run a hybrid query and return up to `k` results (`k == 0` uses the
    /// configured `final_limit`).
    ///
    /// An empty index yields an empty list, not an error. When the
    /// embedding call fails or times out, the engine degrades to
    /// keyword-only results if `retrieval.keyword_fallback` is set,
    /// otherwise it fails closed.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let limit = if k == 0 {
            self.retrieval.final_limit
        } else {
            k
        };

        if self.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = match tokio::time::timeout(self.embed_timeout, self.embedder.embed(query))
            .await
        {
            Ok(Ok(v)) => Some(v),
            Ok(Err(e)) => {
                if self.retrieval.keyword_fallback {
                    warn!(error = %e, "embedding failed, falling back to keyword-only search");
                    None
                } else {
                    return Err(e);
                }
            }
            Err(_) => {
                if self.retrieval.keyword_fallback {
                    warn!(
                        timeout_secs = self.timeout_secs,
                        "embedding timed out, falling back to keyword-only search"
                    );
                    None
                } else {
                    return Err(Error::Timeout {
                        operation: "embedding",
                        seconds: self.timeout_secs,
                    });
                }
            }
        };

        // Candidate pool: at least the requested limit; 0 keeps the whole
        // index, which is right for small corpora.
        let m = if self.retrieval.candidate_k == 0 {
            0
        } else {
            self.retrieval.candidate_k.max(limit)
        };

        let vector_candidates = match &query_vector {
            Some(qv) => self.vectors.read().rank(qv, m),
            None => Vec::new(),
        };
        let keyword_candidates = self.lexical.read().rank(query);

        debug!(
            vector_candidates = vector_candidates.len(),
            keyword_candidates = keyword_candidates.len(),
            alpha = self.retrieval.alpha,
            "fusing candidate sets"
        );

        Ok(self.fuse(vector_candidates, keyword_candidates, limit))
    }

    /// Merge the two candidate sets into one ranked list.
    fn fuse(
        &self,
        vector_candidates: Vec<(String, f32)>,
        keyword_candidates: Vec<(String, f32)>,
        limit: usize,
    ) -> Vec<SearchResult> {
        let alpha = self.retrieval.alpha;
        let boost = self.retrieval.convergence_boost;

        let mut merged: BTreeMap<String, (f32, f32, MatchedIn)> = BTreeMap::new();

        for (id, score) in vector_candidates {
            let entry = merged.entry(id).or_default();
            entry.0 = score;
            entry.2.vector = true;
        }
        for (id, score) in keyword_candidates {
            let entry = merged.entry(id).or_default();
            entry.1 = score;
            entry.2.keyword = true;
        }

        let mut results: Vec<SearchResult> = merged
            .into_iter()
            .map(|(id, (vector_score, keyword_score, matched_in))| {
                let mut fused = alpha * vector_score + (1.0 - alpha) * keyword_score;
                if matched_in.both() {
                    fused += boost;
                }
                SearchResult {
                    id,
                    fused_score: fused,
                    vector_score,
                    keyword_score,
                    matched_in,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(limit);
        results
    }
}
