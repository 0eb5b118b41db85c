use thiserror::Error;

use crate::models::Stage;

/// Errors raised by a Score Provider
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("encoder request failed: {message}")]
    Request { message: String },
    #[error("encoder returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
    #[error("encoder returned vectors of mixed dimension ({expected} vs {got})")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("encoder returned an empty vector")]
    EmptyVector,
}

impl EmbeddingError {
    pub(crate) fn request(err: impl std::fmt::Display) -> Self {
        Self::Request {
            message: err.to_string(),
        }
    }
}

/// Errors that abort a merge run
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("{stage} failed at segment {segment_index}: {source}")]
    Provider {
        stage: Stage,
        segment_index: usize,
        #[source]
        source: EmbeddingError,
    },
}

impl MergeError {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn provider(stage: Stage, segment_index: usize, source: EmbeddingError) -> Self {
        Self::Provider {
            stage,
            segment_index,
            source,
        }
    }
}
