use super::ScoreProvider;
use crate::error::EmbeddingError;

/// Offline encoder embedding text by signed character n-gram hashing
///
/// Cheap and deterministic. It measures surface similarity, so it only makes sense when
/// both tracks share a script (or for smoke-testing the pipeline without a model).
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dim: usize,
}

impl Default for HashingEncoder {
    fn default() -> Self {
        Self { dim: 256 }
    }
}

impl HashingEncoder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];

        let lower = text.to_lowercase();
        let mut chars: Vec<char> = Vec::with_capacity(lower.chars().count() + 2);
        chars.push('\u{0002}');
        chars.extend(lower.chars().filter(|c| !c.is_whitespace()));
        chars.push('\u{0003}');

        for n in [3usize, 2, 1] {
            if chars.len() < n {
                continue;
            }
            for gram in chars.windows(n) {
                let h = fnv1a(gram);
                let idx = (h as usize) % self.dim;
                let sign = if h & 1 == 0 { 1.0 } else { -1.0 };
                v[idx] += sign;
            }
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

fn fnv1a(chars: &[char]) -> u32 {
    let mut h: u32 = 2_166_136_261;
    for &c in chars {
        h ^= c as u32;
        h = h.wrapping_mul(16_777_619);
    }
    h
}

impl ScoreProvider for HashingEncoder {
    fn encode(&self, texts: &[String], _batch_size: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn name(&self) -> &str {
        "char-ngram-hashing"
    }
}
