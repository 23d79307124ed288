//! Embedding vector value object and similarity math (spec §4.5).

use serde::{Deserialize, Serialize};

/// A fixed-dimension embedding vector tagged with the model that produced
/// it. Per spec §9, mixing dimensionalities in one vector column is
/// disallowed — `model_name` travels with the vector so callers can detect
/// a mismatch before it reaches storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    pub model_name: String,
}

impl Embedding {
    #[must_use]
    pub fn new(values: Vec<f32>, model_name: impl Into<String>) -> Self {
        Self {
            values,
            model_name: model_name.into(),
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.values.len()
    }
}

/// Cosine similarity between two vectors. Zero-norm vectors yield `0.0`
/// rather than `NaN`/dividing by zero (spec §8 testable property).
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vector_is_one() {
        let v = vec![0.3_f32, 0.1, -0.4, 0.9];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_against_zero_vector_is_zero() {
        let v = vec![0.3_f32, 0.1, -0.4];
        let zero = vec![0.0_f32, 0.0, 0.0];
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
    }

    #[test]
    fn cosine_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    proptest::proptest! {
        /// cosine_similarity never leaves [-1, 1] regardless of input magnitude.
        #[test]
        fn prop_cosine_similarity_stays_in_unit_range(
            a in proptest::collection::vec(-1000.0f32..1000.0, 1..16),
            b in proptest::collection::vec(-1000.0f32..1000.0, 1..16),
        ) {
            let len = a.len().min(b.len());
            let sim = cosine_similarity(&a[..len], &b[..len]);
            proptest::prop_assert!((-1.0..=1.0).contains(&sim));
        }

        /// cosine_similarity is symmetric: order of arguments doesn't matter.
        #[test]
        fn prop_cosine_similarity_is_symmetric(
            a in proptest::collection::vec(-1000.0f32..1000.0, 1..16),
            b in proptest::collection::vec(-1000.0f32..1000.0, 1..16),
        ) {
            let len = a.len().min(b.len());
            let forward = cosine_similarity(&a[..len], &b[..len]);
            let backward = cosine_similarity(&b[..len], &a[..len]);
            proptest::prop_assert!((forward - backward).abs() < 1e-5);
        }
    }
}
