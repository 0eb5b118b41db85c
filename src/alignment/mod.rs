pub mod candidates;
pub mod progress;
pub mod scorer;

pub use candidates::*;
pub use progress::*;
pub use scorer::*;

use crate::embedding::ScoreProvider;
use crate::models::StageWeights;

/// Everything a stage needs besides its own data: scoring, cancellation, progress
pub struct MergeContext<'a> {
    pub scorer: SpanScorer<'a>,
    pub cancel: CancellationFlag,
    pub progress: ProgressTracker,
    /// Number of refinement-stage calls sharing the refinement progress share
    pub refinement_calls: u32,
}

impl<'a> MergeContext<'a> {
    pub fn new(provider: &'a dyn ScoreProvider, batch_size: usize, cancel: CancellationFlag) -> Self {
        Self {
            scorer: SpanScorer::new(provider, batch_size),
            cancel,
            progress: ProgressTracker::new(StageWeights::default()),
            refinement_calls: 1,
        }
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_refinement_calls(mut self, calls: u32) -> Self {
        self.refinement_calls = calls.max(1);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
