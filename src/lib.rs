pub mod alignment;
pub mod embedding;
pub mod error;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod stages;

#[cfg(test)]
mod testing;

pub use alignment::{CancellationFlag, MergeContext, ProgressTracker};
pub use embedding::{EmbeddingConfig, HashingEncoder, HttpEncoder, ScoreProvider};
pub use error::{EmbeddingError, MergeError};
pub use io::{parse_track_file, parse_track_json, HumanOutput, MachineOutput, MergeMetadata};
pub use models::{
    Cue, MergeConfig, Segment, Side, Stage, StageWeights, SubtitleTrack, TokenSpan, TokenStream,
};
pub use pipeline::{merge_tracks, MergeOutcome, MergeStats};
pub use stages::{
    align_subs_using_neighbours, attach_unclaimed_tokens, eliminate_unnecessary_newline,
    execute_global_align, execute_non_overlap, TokenBarrier,
};
