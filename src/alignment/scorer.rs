use crate::embedding::{check_embeddings, cosine_similarity, ScoreProvider};
use crate::error::EmbeddingError;

/// Scores candidate texts against a target through a Score Provider
///
/// The target is encoded once per call; candidates go to the provider in chunks of at
/// most `batch_size` texts.
pub struct SpanScorer<'a> {
    provider: &'a dyn ScoreProvider,
    batch_size: usize,
}

impl<'a> SpanScorer<'a> {
    pub fn new(provider: &'a dyn ScoreProvider, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// One similarity in [0, 1] per candidate, in candidate order
    ///
    /// An empty candidate list returns immediately without touching the provider.
    pub fn score(&self, target: &str, candidates: &[String]) -> Result<Vec<f32>, EmbeddingError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let target_vec = self.provider.encode(&[target.to_string()], 1)?;
        check_embeddings(1, &target_vec)?;
        let target_vec = &target_vec[0];

        let mut scores = Vec::with_capacity(candidates.len());
        for chunk in candidates.chunks(self.batch_size) {
            let vectors = self.provider.encode(chunk, self.batch_size)?;
            check_embeddings(chunk.len(), &vectors)?;
            for v in &vectors {
                if v.len() != target_vec.len() {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: target_vec.len(),
                        got: v.len(),
                    });
                }
                scores.push(cosine_similarity(target_vec, v));
            }
        }
        Ok(scores)
    }
}
