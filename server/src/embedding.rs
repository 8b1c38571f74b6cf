//! Deterministic text embedding
//!
//! Stand-in for a real embedding model behind the same contract: equal text
//! always yields equal vectors, the output dimension is fixed at
//! construction, and every non-zero result is L2-normalized. Words are
//! bucketed by byte sum rather than a hasher so the mapping is stable
//! across processes and runs.

use crate::vector::l2_normalize;

/// Weight contributed by each word to its bucket.
const WORD_WEIGHT: f32 = 0.1;

#[derive(Debug, Clone, Copy)]
pub struct TextEmbedder {
    dimension: usize,
}

impl TextEmbedder {
    /// Creates an embedder producing vectors of the given dimension.
    /// Dimension must be at least 1.
    pub fn new(dimension: usize) -> Self {
        assert!(dimension >= 1, "embedding dimension must be at least 1");
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embeds text into a normalized fixed-dimension vector.
    ///
    /// Splits on whitespace, lowercases, and adds a fixed weight to the
    /// bucket selected by each word's byte sum. Empty or whitespace-only
    /// text produces the zero vector.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];

        for word in text.to_lowercase().split_whitespace() {
            let byte_sum: usize = word.bytes().map(|b| b as usize).sum();
            vector[byte_sum % self.dimension] += WORD_WEIGHT;
        }

        l2_normalize(&mut vector);
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::magnitude;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_embedding_dimension() {
        let embedder = TextEmbedder::new(5);
        assert_eq!(embedder.embed("linear algebra").len(), 5);
        assert_eq!(embedder.dimension(), 5);
    }

    #[test]
    fn test_equal_text_equal_vector() {
        let embedder = TextEmbedder::new(5);
        let a = embedder.embed("graph theory networks");
        let b = embedder.embed("graph theory networks");
        assert_eq!(a, b);
    }

    #[test]
    fn test_case_insensitive() {
        let embedder = TextEmbedder::new(5);
        assert_eq!(embedder.embed("Calculus"), embedder.embed("calculus"));
    }

    #[test]
    fn test_nonempty_text_is_normalized() {
        let embedder = TextEmbedder::new(5);
        let v = embedder.embed("integration antiderivatives area");
        assert_approx_eq!(magnitude(&v), 1.0, 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = TextEmbedder::new(5);
        assert_eq!(embedder.embed(""), vec![0.0; 5]);
        assert_eq!(embedder.embed("   "), vec![0.0; 5]);
    }

    #[test]
    #[should_panic]
    fn test_zero_dimension_rejected() {
        TextEmbedder::new(0);
    }
}
