use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::models::{Stage, StageWeights};

/// Overall percentage for position `index` of `total` inside a stage worth `ratio`
///
/// Computes `floor(index / total * ratio)` plus the shares of the stages already done.
/// `total == 0` counts the stage as complete. `index` past `total` is clamped, so the
/// value never exceeds the stage's allocation.
pub fn progress_percentage(index: usize, total: usize, ratio: u32, previous: &[u32]) -> u32 {
    let done: u32 = previous.iter().sum();
    if total == 0 {
        return done + ratio;
    }
    let index = index.min(total) as u64;
    let within = index * ratio as u64 / total as u64;
    done + within as u32
}

/// Shared "cancel requested" cell
///
/// Set from any thread, read by the engine between batches. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    inner: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

type ProgressCallback = Box<dyn FnMut(u32) + Send>;

/// Turns stage positions into a never-decreasing percentage stream
pub struct ProgressTracker {
    weights: StageWeights,
    callback: Option<ProgressCallback>,
    last: u32,
}

impl ProgressTracker {
    pub fn new(weights: StageWeights) -> Self {
        Self {
            weights,
            callback: None,
            last: 0,
        }
    }

    /// Replace the stage weights, keeping the callback
    pub fn with_weights(mut self, weights: StageWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_callback(mut self, callback: impl FnMut(u32) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Last percentage emitted
    pub fn current(&self) -> u32 {
        self.last
    }

    /// Report position `index` of `total` within `stage`
    pub fn report(&mut self, stage: Stage, index: usize, total: usize) {
        let value = progress_percentage(
            index,
            total,
            self.weights.share(stage),
            &self.weights.previous(stage),
        );
        self.emit(value);
    }

    /// Report progress inside sub-pass `pass` of `passes` that share one stage
    pub fn report_pass(&mut self, stage: Stage, pass: u32, passes: u32, index: usize, total: usize) {
        let passes = passes.max(1) as usize;
        let pass = (pass as usize).min(passes - 1);
        let (index, total) = if total == 0 {
            (pass + 1, passes)
        } else {
            (pass * total + index.min(total), passes * total)
        };
        self.report(stage, index, total);
    }

    /// Mark `stage` as fully done
    pub fn finish(&mut self, stage: Stage) {
        self.report(stage, 1, 1);
    }

    fn emit(&mut self, value: u32) {
        if value < self.last {
            return;
        }
        let changed = value != self.last;
        self.last = value;
        if changed {
            if let Some(callback) = self.callback.as_mut() {
                callback(value);
            }
        }
    }
}
