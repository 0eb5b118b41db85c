use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MergeError;

/// Phases of a merge run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Pulling out cues with no time overlap on the other track
    NonOverlap,
    /// Greedy assignment of secondary spans to primary segments
    GlobalAlign,
    /// Neighbour refinement, merge-back, and newline cleanup
    Refinement,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::NonOverlap, Stage::GlobalAlign, Stage::Refinement];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::NonOverlap => "non-overlap handling",
            Stage::GlobalAlign => "global alignment",
            Stage::Refinement => "refinement",
        };
        f.write_str(name)
    }
}

/// Share of the overall progress bar allocated to each stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageWeights {
    pub non_overlap: u32,
    pub global_align: u32,
    pub refinement: u32,
}

impl Default for StageWeights {
    fn default() -> Self {
        Self {
            non_overlap: 10,
            global_align: 40,
            refinement: 50,
        }
    }
}

impl StageWeights {
    /// Percentage allocated to `stage`
    pub fn share(&self, stage: Stage) -> u32 {
        match stage {
            Stage::NonOverlap => self.non_overlap,
            Stage::GlobalAlign => self.global_align,
            Stage::Refinement => self.refinement,
        }
    }

    /// Shares of every stage that runs before `stage`
    pub fn previous(&self, stage: Stage) -> Vec<u32> {
        Stage::ALL
            .iter()
            .take_while(|&&s| s != stage)
            .map(|&s| self.share(s))
            .collect()
    }

    /// Percentage already reached when `stage` starts
    pub fn offset(&self, stage: Stage) -> u32 {
        self.previous(stage).iter().sum()
    }

    pub fn total(&self) -> u32 {
        self.non_overlap + self.global_align + self.refinement
    }
}

/// Configuration for a merge run
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// How many tokens a boundary may move during neighbour refinement
    pub window_size: usize,
    /// Maximum number of texts per encoder call
    pub batch_size: usize,
    /// How far past the alignment cursor the global aligner looks, in tokens
    pub lookahead_tokens: usize,
    /// Number of neighbour refinement passes
    pub refine_passes: u32,
    /// Keep cues that overlap nothing on the other track in the main merge set
    pub ignore_non_overlap_filter: bool,
    pub stage_weights: StageWeights,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            window_size: 4,
            batch_size: 32,
            lookahead_tokens: 24,
            refine_passes: 2,
            ignore_non_overlap_filter: false,
            stage_weights: StageWeights::default(),
        }
    }
}

impl MergeConfig {
    /// Reject configurations that cannot drive a run
    pub fn validate(&self) -> Result<(), MergeError> {
        if self.window_size == 0 {
            return Err(MergeError::invalid_config("window_size must be positive"));
        }
        if self.batch_size == 0 {
            return Err(MergeError::invalid_config("batch_size must be positive"));
        }
        if self.lookahead_tokens == 0 {
            return Err(MergeError::invalid_config(
                "lookahead_tokens must be positive",
            ));
        }
        if self.stage_weights.total() != 100 {
            return Err(MergeError::invalid_config(format!(
                "stage weights must sum to 100, got {}",
                self.stage_weights.total()
            )));
        }
        Ok(())
    }
}
