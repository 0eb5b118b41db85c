//! Scripted score providers for unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embedding::ScoreProvider;
use crate::error::EmbeddingError;

const DIM: usize = 8;
const NOISE_AXIS: usize = DIM - 1;

/// Encoder returning fixed vectors for known texts
///
/// Lookups use the trimmed text. Unknown texts map to a unit vector on a reserved
/// axis, so they score 0 against any registered text that leaves that axis empty.
#[derive(Debug, Clone, Default)]
pub(crate) struct LookupEncoder {
    vectors: HashMap<String, Vec<f32>>,
    drop_last: bool,
}

impl LookupEncoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, text: &str, components: &[f32]) -> Self {
        let mut v = vec![0.0; DIM];
        for (slot, c) in v.iter_mut().zip(components.iter()) {
            *slot = *c;
        }
        self.vectors.insert(text.to_string(), v);
        self
    }

    /// Answer multi-text batches with one vector too few
    pub(crate) fn dropping_last(mut self) -> Self {
        self.drop_last = true;
        self
    }

    fn lookup(&self, text: &str) -> Vec<f32> {
        self.vectors.get(text.trim()).cloned().unwrap_or_else(|| {
            let mut v = vec![0.0; DIM];
            v[NOISE_AXIS] = 1.0;
            v
        })
    }
}

impl ScoreProvider for LookupEncoder {
    fn encode(&self, texts: &[String], _batch_size: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out: Vec<Vec<f32>> = texts.iter().map(|t| self.lookup(t)).collect();
        if self.drop_last && texts.len() > 1 {
            out.pop();
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "lookup"
    }
}

/// Wrapper recording how often and how heavily the inner encoder is called
pub(crate) struct CountingEncoder<E> {
    inner: E,
    calls: AtomicUsize,
    largest_batch: AtomicUsize,
}

impl<E: ScoreProvider> CountingEncoder<E> {
    pub(crate) fn new(inner: E) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            largest_batch: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn largest_batch(&self) -> usize {
        self.largest_batch.load(Ordering::SeqCst)
    }
}

impl<E: ScoreProvider> ScoreProvider for CountingEncoder<E> {
    fn encode(&self, texts: &[String], batch_size: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.largest_batch.fetch_max(texts.len(), Ordering::SeqCst);
        self.inner.encode(texts, batch_size)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Encoder that fails every call
pub(crate) struct FailingEncoder;

impl ScoreProvider for FailingEncoder {
    fn encode(&self, _texts: &[String], _batch_size: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Request {
            message: "model not loaded".to_string(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}
