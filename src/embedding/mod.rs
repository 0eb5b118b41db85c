pub mod client;
pub mod hashing;

pub use client::*;
pub use hashing::*;

use crate::error::EmbeddingError;

/// Batched text encoder used to score candidate spans
///
/// Implementations must be deterministic for identical input ordering and accept any
/// batch size from 1 up to the caller's configured maximum. The call blocks until the
/// whole batch is encoded.
pub trait ScoreProvider: Send + Sync {
    fn encode(&self, texts: &[String], batch_size: usize) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Short name used in logs and output metadata
    fn name(&self) -> &str;
}

impl<T: ScoreProvider + ?Sized> ScoreProvider for &T {
    fn encode(&self, texts: &[String], batch_size: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).encode(texts, batch_size)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: ScoreProvider + ?Sized> ScoreProvider for Box<T> {
    fn encode(&self, texts: &[String], batch_size: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).encode(texts, batch_size)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Cosine similarity clamped to [0, 1]
///
/// Zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// Check that an encoder answered with one non-empty vector per input, all the same size
pub(crate) fn check_embeddings(expected: usize, vectors: &[Vec<f32>]) -> Result<(), EmbeddingError> {
    if vectors.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            got: vectors.len(),
        });
    }
    let Some(first) = vectors.first() else {
        return Ok(());
    };
    if first.is_empty() {
        return Err(EmbeddingError::EmptyVector);
    }
    for v in vectors {
        if v.len() != first.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: first.len(),
                got: v.len(),
            });
        }
    }
    Ok(())
}
