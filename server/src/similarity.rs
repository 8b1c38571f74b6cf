//! In-memory similarity search over concept embeddings
//!
//! Brute-force cosine scoring over an insertion-ordered collection. The
//! first inserted embedding fixes the collection's dimension; every later
//! insert, update, and query is validated against it. Results are sorted
//! by descending score with ties broken by insertion order (first inserted
//! wins), so identical queries always return identical rankings.
//!
//! The engine is the reference implementation of the `VectorIndex`
//! capability, the boundary a production vector store plugs into.

use crate::embedding::TextEmbedder;
use crate::vector::cosine_similarity;
use log::info;
use shared::{ConceptMetadata, ErrorKind, SimilarityHit};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimilarityError {
    #[error("vector has dimension {got}, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("embedding {0} already exists")]
    DuplicateId(String),
    #[error("embedding {0} not found")]
    NotFound(String),
}

impl SimilarityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimilarityError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            SimilarityError::DuplicateId(_) => ErrorKind::DuplicateId,
            SimilarityError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredEmbedding {
    id: String,
    vector: Vec<f32>,
    metadata: ConceptMetadata,
}

/// Capability boundary for a production vector store (upsert/query).
/// `SimilarityEngine` defines the reference semantics a real backend
/// must match.
pub trait VectorIndex: Send {
    fn upsert(
        &mut self,
        id: &str,
        vector: Vec<f32>,
        metadata: ConceptMetadata,
    ) -> Result<(), SimilarityError>;

    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SimilarityHit>, SimilarityError>;
}

/// Owns a collection of fixed-dimension embeddings and answers top-K
/// cosine-similarity queries over it.
pub struct SimilarityEngine {
    /// Insertion order doubles as the ranking tie-break.
    entries: Vec<StoredEmbedding>,
    /// Position of each id within `entries`.
    index: HashMap<String, usize>,
    /// Fixed by the first insert; `None` while the collection is empty
    /// and has never held an embedding.
    dimension: Option<usize>,
    embedder: TextEmbedder,
}

impl SimilarityEngine {
    pub fn new(embedder: TextEmbedder) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            dimension: None,
            embedder,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn embedder(&self) -> &TextEmbedder {
        &self.embedder
    }

    /// Metadata lookup by id.
    pub fn get(&self, id: &str) -> Option<&ConceptMetadata> {
        self.index.get(id).map(|&pos| &self.entries[pos].metadata)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), SimilarityError> {
        match self.dimension {
            Some(expected) if vector.len() != expected => {
                Err(SimilarityError::DimensionMismatch {
                    expected,
                    got: vector.len(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Inserts a new embedding. The first insert fixes the collection
    /// dimension.
    pub fn add_embedding(
        &mut self,
        id: &str,
        vector: Vec<f32>,
        metadata: ConceptMetadata,
    ) -> Result<(), SimilarityError> {
        self.check_dimension(&vector)?;
        if self.index.contains_key(id) {
            return Err(SimilarityError::DuplicateId(id.to_string()));
        }

        self.dimension.get_or_insert(vector.len());
        self.index.insert(id.to_string(), self.entries.len());
        self.entries.push(StoredEmbedding {
            id: id.to_string(),
            vector,
            metadata,
        });
        info!("Indexed embedding {}", id);

        Ok(())
    }

    /// Replaces an existing embedding wholesale; the insertion-order rank
    /// of `id` is kept.
    pub fn update_embedding(
        &mut self,
        id: &str,
        vector: Vec<f32>,
        metadata: ConceptMetadata,
    ) -> Result<(), SimilarityError> {
        self.check_dimension(&vector)?;
        let pos = *self
            .index
            .get(id)
            .ok_or_else(|| SimilarityError::NotFound(id.to_string()))?;

        self.entries[pos].vector = vector;
        self.entries[pos].metadata = metadata;
        Ok(())
    }

    /// Removes an embedding.
    ///
    /// Deleting an absent id is an error, not a no-op: mapping layers that
    /// want idempotent deletes can discard `NotFound` themselves.
    pub fn delete_embedding(&mut self, id: &str) -> Result<(), SimilarityError> {
        let pos = self
            .index
            .remove(id)
            .ok_or_else(|| SimilarityError::NotFound(id.to_string()))?;

        self.entries.remove(pos);
        // Positions after the removed entry shift down by one
        for entry in &self.entries[pos..] {
            if let Some(slot) = self.index.get_mut(&entry.id) {
                *slot -= 1;
            }
        }
        info!("Deleted embedding {}", id);

        Ok(())
    }

    /// Top-K entries by descending cosine similarity to `query_vector`.
    ///
    /// An empty collection yields an empty result regardless of the query;
    /// `top_k = 0` yields an empty result; `top_k` past the collection
    /// size yields everything. A stable sort preserves insertion order
    /// between equal scores.
    pub fn find_similar(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SimilarityHit>, SimilarityError> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        self.check_dimension(query_vector)?;

        let mut hits: Vec<SimilarityHit> = self
            .entries
            .iter()
            .map(|entry| SimilarityHit {
                id: entry.id.clone(),
                score: cosine_similarity(query_vector, &entry.vector),
                metadata: entry.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);

        Ok(hits)
    }

    /// Embeds `query` text and searches for it.
    pub fn semantic_search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SimilarityHit>, SimilarityError> {
        let query_vector = self.embedder.embed(query);
        self.find_similar(&query_vector, top_k)
    }

    /// Nearest neighbors of a stored embedding, excluding itself.
    pub fn get_recommendations(
        &self,
        id: &str,
        top_k: usize,
    ) -> Result<Vec<SimilarityHit>, SimilarityError> {
        let pos = *self
            .index
            .get(id)
            .ok_or_else(|| SimilarityError::NotFound(id.to_string()))?;
        let query_vector = self.entries[pos].vector.clone();

        let mut hits = self.find_similar(&query_vector, top_k.saturating_add(1))?;
        hits.retain(|hit| hit.id != id);
        hits.truncate(top_k);

        Ok(hits)
    }
}

impl VectorIndex for SimilarityEngine {
    fn upsert(
        &mut self,
        id: &str,
        vector: Vec<f32>,
        metadata: ConceptMetadata,
    ) -> Result<(), SimilarityError> {
        if self.index.contains_key(id) {
            self.update_embedding(id, vector, metadata)
        } else {
            self.add_embedding(id, vector, metadata)
        }
    }

    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SimilarityHit>, SimilarityError> {
        self.find_similar(vector, top_k)
    }
}
