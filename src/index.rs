//! The two retrieval leaves: a cosine-similarity vector index and a
//! word-overlap lexical index.
//!
//! Both are in-memory, keyed by chunk id, and last-write-wins on repeated
//! inserts of the same id. Ranking output is deterministic: score
//! descending, id ascending on ties.

use std::collections::{HashMap, HashSet};

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};

/// Lowercased word set of a text. Splits on any non-alphanumeric character.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Holds (id, vector) pairs; answers nearest-neighbor queries by cosine
/// similarity. Dimensionality is established by the first inserted vector
/// (or fixed up front) and enforced on every insert.
#[derive(Debug, Default)]
pub struct VectorIndex {
    dims: Option<usize>,
    vectors: HashMap<String, Vec<f32>>,
}

impl VectorIndex {
    pub fn new(dims: Option<usize>) -> Self {
        Self {
            dims: dims.filter(|d| *d > 0),
            vectors: HashMap::new(),
        }
    }

    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.vectors.contains_key(id)
    }

    /// Validate a vector against the established dimensionality without
    /// inserting it. Used to vet a whole batch before mutating anything.
    pub fn check(&self, vector: &[f32]) -> Result<()> {
        if vector.is_empty() {
            return Err(Error::DimensionMismatch {
                expected: self.dims.unwrap_or(0),
                got: 0,
            });
        }
        match self.dims {
            Some(expected) if expected != vector.len() => Err(Error::DimensionMismatch {
                expected,
                got: vector.len(),
            }),
            _ => Ok(()),
        }
    }

    pub fn insert(&mut self, id: &str, vector: Vec<f32>) -> Result<()> {
        if id.is_empty() {
            return Err(Error::EmptyId);
        }
        self.check(&vector)?;
        if self.dims.is_none() {
            self.dims = Some(vector.len());
        }
        self.vectors.insert(id.to_string(), vector);
        Ok(())
    }

    /// Rank all indexed chunks against `query` by cosine similarity,
    /// normalized from `[-1, 1]` to `[0, 1]`. Keeps the top `m` entries;
    /// `m == 0` keeps everything.
    pub fn rank(&self, query: &[f32], m: usize) -> Vec<(String, f32)> {
        let mut scored: Vec<(String, f32)> = self
            .vectors
            .iter()
            .map(|(id, v)| {
                let sim = cosine_similarity(query, v);
                (id.clone(), (sim + 1.0) / 2.0)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        if m > 0 {
            scored.truncate(m);
        }
        scored
    }
}

/// Holds (id, token set) pairs; answers keyword-overlap queries.
#[derive(Debug, Default)]
pub struct LexicalIndex {
    token_sets: HashMap<String, HashSet<String>>,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.token_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_sets.is_empty()
    }

    pub fn insert(&mut self, id: &str, text: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::EmptyId);
        }
        self.token_sets.insert(id.to_string(), tokenize(text));
        Ok(())
    }

    /// Score every indexed chunk as the fraction of query terms present in
    /// its token set. Returns only chunks with score > 0, sorted score
    /// descending then id ascending. A query with no tokens matches nothing
    /// rather than erroring.
    pub fn rank(&self, query: &str) -> Vec<(String, f32)> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(String, f32)> = self
            .token_sets
            .iter()
            .filter_map(|(id, tokens)| {
                let hits = query_tokens.intersection(tokens).count();
                if hits == 0 {
                    None
                } else {
                    Some((id.clone(), hits as f32 / query_tokens.len() as f32))
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_case_insensitive() {
        let tokens = tokenize("The Earth, the EARTH!");
        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains("the"));
        assert!(tokens.contains("earth"));
    }

    #[test]
    fn test_vector_dims_established_on_first_insert() {
        let mut index = VectorIndex::new(None);
        assert_eq!(index.dims(), None);
        index.insert("c1", vec![1.0, 0.0, 0.0]).unwrap();
        assert_eq!(index.dims(), Some(3));

        let err = index.insert("c2", vec![1.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                got: 2
            }
        ));
    }

    #[test]
    fn test_vector_fixed_dims_enforced() {
        let mut index = VectorIndex::new(Some(4));
        assert!(index.insert("c1", vec![0.0; 4]).is_ok());
        assert!(index.insert("c2", vec![0.0; 5]).is_err());
    }

    #[test]
    fn test_vector_insert_is_idempotent() {
        let mut index = VectorIndex::new(None);
        index.insert("c1", vec![1.0, 0.0]).unwrap();
        index.insert("c1", vec![0.0, 1.0]).unwrap();
        assert_eq!(index.len(), 1);
        // Last write wins.
        let top = index.rank(&[0.0, 1.0], 1);
        assert!((top[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_vector_rank_normalizes_and_tie_breaks() {
        let mut index = VectorIndex::new(None);
        index.insert("b", vec![1.0, 0.0]).unwrap();
        index.insert("a", vec![1.0, 0.0]).unwrap();
        index.insert("c", vec![-1.0, 0.0]).unwrap();

        let ranked = index.rank(&[1.0, 0.0], 0);
        // Equal scores break ties by id ascending.
        assert_eq!(ranked[0].0, "a");
        assert_eq!(ranked[1].0, "b");
        assert!((ranked[0].1 - 1.0).abs() < 1e-6);
        // Opposite direction normalizes to 0, not -1.
        assert_eq!(ranked[2].0, "c");
        assert!(ranked[2].1.abs() < 1e-6);
    }

    #[test]
    fn test_lexical_score_is_query_term_fraction() {
        let mut index = LexicalIndex::new();
        index.insert("c1", "the earth is round").unwrap();
        index.insert("c2", "gravity causes orbits").unwrap();

        let ranked = index.rank("earth shape");
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, "c1");
        assert!((ranked[0].1 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_lexical_empty_query_matches_nothing() {
        let mut index = LexicalIndex::new();
        index.insert("c1", "some text").unwrap();
        assert!(index.rank("").is_empty());
        assert!(index.rank("...!!!").is_empty());
    }

    #[test]
    fn test_empty_id_rejected() {
        let mut vectors = VectorIndex::new(None);
        assert!(matches!(
            vectors.insert("", vec![1.0]).unwrap_err(),
            Error::EmptyId
        ));
        let mut lexical = LexicalIndex::new();
        assert!(matches!(
            lexical.insert("", "text").unwrap_err(),
            Error::EmptyId
        ));
    }
}
