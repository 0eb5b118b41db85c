use serde::Serialize;
use tracing::{info, warn};

use crate::alignment::{CancellationFlag, MergeContext, ProgressTracker};
use crate::embedding::ScoreProvider;
use crate::error::MergeError;
use crate::models::{sort_segments, MergeConfig, Segment, Stage, SubtitleTrack};
use crate::stages::{
    align_subs_using_neighbours, attach_unclaimed_tokens, eliminate_unnecessary_newline,
    execute_global_align, execute_non_overlap, FilteredTokens, NonOverlapResult,
};

/// Counters describing what a merge run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub primary_only: usize,
    pub secondary_only: usize,
    pub segments_aligned: usize,
    /// Tokens no aligned span claimed, handed to a neighbouring segment
    pub tokens_attached: usize,
    pub refinement_passes: u32,
    /// Secondary tokens not covered by any output segment
    pub unassigned_tokens: usize,
}

/// Final sequence of a merge run
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub segments: Vec<Segment>,
    pub stats: MergeStats,
    /// True when the run stopped early; `segments` holds the last committed stage
    pub cancelled: bool,
}

/// Merge a primary and a secondary track into one bilingual segment sequence
///
/// Stages, in order:
/// 0. cues overlapping nothing on the other track are set aside (unless disabled)
/// 1. secondary spans are assigned greedily to primary segments
/// 2. neighbour refinement passes, unclaimed tokens handed to their nearest segment,
///    merge-back of the set-aside cues, newline cleanup
///
/// Progress is reported through `progress` using `config.stage_weights`. Secondary spans
/// in the result never overlap and never walk backwards in time order.
///
/// Cancellation is checked between batches. A cancelled run still returns `Ok` with the
/// output of the last stage that finished; stages after it are skipped.
pub fn merge_tracks(
    primary: &SubtitleTrack,
    secondary: &SubtitleTrack,
    provider: &dyn ScoreProvider,
    config: &MergeConfig,
    cancel: CancellationFlag,
    progress: ProgressTracker,
) -> Result<MergeOutcome, MergeError> {
    config.validate()?;
    secondary.tokens.validate()?;

    let mut ctx = MergeContext::new(provider, config.batch_size, cancel)
        .with_progress(progress.with_weights(config.stage_weights))
        .with_refinement_calls(config.refine_passes + 1);
    let mut stats = MergeStats::default();

    info!(
        "Merging {} primary and {} secondary cues ({} secondary tokens) with {}",
        primary.cues.len(),
        secondary.cues.len(),
        secondary.tokens.len(),
        ctx.scorer.provider_name()
    );

    let mut primary_cues = primary.cues.clone();
    primary_cues.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
    let mut secondary_cues = secondary.cues.clone();

    // Stage 0
    let extraction = if config.ignore_non_overlap_filter {
        ctx.progress.finish(Stage::NonOverlap);
        NonOverlapResult {
            filtered: FilteredTokens::identity(&secondary.tokens),
            ..Default::default()
        }
    } else {
        execute_non_overlap(&mut primary_cues, &mut secondary_cues, &secondary.tokens, &mut ctx)
    };

    if extraction.cancelled {
        let mut segments: Vec<Segment> = primary_cues.iter().map(Segment::from_primary).collect();
        sort_segments(&mut segments);
        stats.unassigned_tokens = secondary.tokens.len();
        return Ok(MergeOutcome {
            segments,
            stats,
            cancelled: true,
        });
    }
    stats.primary_only = extraction.primary_only.len();
    stats.secondary_only = extraction.secondary_only.len();

    // Stage 1
    let filtered = extraction.filtered.stream.clone();
    let barriers = extraction.filtered.barriers.clone();
    let aligned = execute_global_align(
        &primary_cues,
        &filtered,
        config.lookahead_tokens,
        &barriers,
        &mut ctx,
    )?;
    let mut cancelled = aligned.cancelled;
    stats.segments_aligned = aligned.segments_aligned;
    let mut segments = aligned.segments;

    // Stage 2
    let mut stage_number = 0u32;
    if !cancelled {
        for _ in 0..config.refine_passes {
            let (refined, next) = align_subs_using_neighbours(
                segments,
                &filtered,
                config.window_size,
                &barriers,
                &mut ctx,
                stage_number,
            )?;
            segments = refined;
            stage_number = next;
            if ctx.is_cancelled() {
                cancelled = true;
                break;
            }
            stats.refinement_passes += 1;
        }
    }
    if !cancelled {
        stats.tokens_attached = attach_unclaimed_tokens(&mut segments, &filtered, &barriers);
    }

    let mut segments = merge_back(segments, extraction);

    if !cancelled {
        let (cleaned, _) = eliminate_unnecessary_newline(segments, &mut ctx, stage_number);
        segments = cleaned;
        cancelled = ctx.is_cancelled();
    }
    if !cancelled {
        ctx.progress.finish(Stage::Refinement);
    }

    stats.unassigned_tokens = count_unassigned(&segments, secondary.tokens.len());
    if stats.unassigned_tokens > 0 {
        warn!(
            "{} secondary tokens are not part of any segment",
            stats.unassigned_tokens
        );
    }

    info!(
        "Merge {}: {} segments ({} aligned, {} primary-only, {} secondary-only)",
        if cancelled { "cancelled" } else { "complete" },
        segments.len(),
        stats.segments_aligned,
        stats.primary_only,
        stats.secondary_only
    );

    Ok(MergeOutcome {
        segments,
        stats,
        cancelled,
    })
}

/// Bring aligned spans back to original token indices and re-insert extracted cues
///
/// Aligned spans never cross a barrier, so each one maps onto a contiguous run of
/// original tokens that no extracted cue owns.
fn merge_back(mut segments: Vec<Segment>, extraction: NonOverlapResult) -> Vec<Segment> {
    let filtered = &extraction.filtered;
    for segment in segments.iter_mut().filter(|s| s.has_secondary()) {
        segment.secondary_token_span = filtered.remap(segment.secondary_token_span);
    }

    segments.extend(extraction.secondary_only);
    segments.extend(extraction.primary_only);

    sort_segments(&mut segments);
    segments
}

fn count_unassigned(segments: &[Segment], token_count: usize) -> usize {
    let mut covered = vec![false; token_count];
    for span in segments.iter().map(|s| s.secondary_token_span) {
        for flag in covered.iter_mut().take(span.end).skip(span.start) {
            *flag = true;
        }
    }
    covered.iter().filter(|c| !**c).count()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::models::{Cue, StageWeights, TokenSpan, TokenStream};
    use crate::testing::LookupEncoder;

    fn hello_world_tracks() -> (SubtitleTrack, SubtitleTrack) {
        let primary = SubtitleTrack::new(
            vec![Cue::new(0, 1000, "Hello"), Cue::new(1000, 2000, "world")],
            TokenStream::from_words(&["Hello", "world"]).with_separator(" "),
        );
        let secondary = SubtitleTrack::new(
            vec![
                Cue::new(0, 900, "Bonjour le").with_token_span((0, 2)),
                Cue::new(900, 2000, "monde").with_token_span((2, 3)),
            ],
            TokenStream::from_words(&["Bonjour", "le", "monde"]).with_separator(" "),
        );
        (primary, secondary)
    }

    fn encoder() -> LookupEncoder {
        LookupEncoder::new()
            .with("Hello", &[1.0, 0.0])
            .with("Bonjour", &[1.0, 0.0])
            .with("Bonjour le", &[0.8, 0.6])
            .with("world", &[0.0, 1.0])
            .with("le monde", &[0.0, 1.0])
            .with("monde", &[0.0, 0.9, 0.4])
            .with("le", &[0.1, 0.3])
    }

    #[test]
    fn test_merge_hello_world() {
        let (primary, secondary) = hello_world_tracks();
        let encoder = encoder();

        let outcome = merge_tracks(
            &primary,
            &secondary,
            &encoder,
            &MergeConfig::default(),
            CancellationFlag::new(),
            ProgressTracker::new(StageWeights::default()),
        )
        .unwrap();

        assert!(!outcome.cancelled);
        assert_eq!(outcome.segments.len(), 2);
        assert_eq!(outcome.segments[0].secondary_text, "Bonjour");
        assert_eq!(outcome.segments[1].secondary_text, "le monde");
        assert_eq!(outcome.stats.unassigned_tokens, 0);
    }

    #[test]
    fn test_invalid_config_rejected_before_scoring() {
        let (primary, secondary) = hello_world_tracks();
        let encoder = crate::testing::FailingEncoder;
        let config = MergeConfig {
            batch_size: 0,
            ..Default::default()
        };

        let err = merge_tracks(
            &primary,
            &secondary,
            &encoder,
            &config,
            CancellationFlag::new(),
            ProgressTracker::new(StageWeights::default()),
        )
        .unwrap_err();

        assert!(matches!(err, MergeError::InvalidConfig { .. }));
    }

    #[test]
    fn test_cancelled_before_start_returns_primary_only() {
        let (primary, secondary) = hello_world_tracks();
        let encoder = encoder();
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let outcome = merge_tracks(
            &primary,
            &secondary,
            &encoder,
            &MergeConfig::default(),
            cancel,
            ProgressTracker::new(StageWeights::default()),
        )
        .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.segments.len(), 2);
        assert!(outcome.segments.iter().all(|s| s.secondary_text.is_empty()));
    }

    #[test]
    fn test_spans_stay_monotone_around_extracted_cue() {
        let primary = SubtitleTrack::new(
            vec![
                Cue::new(0, 1000, "Hello"),
                Cue::new(1000, 2000, "world"),
                Cue::new(7000, 8000, "Later"),
            ],
            TokenStream::default(),
        );
        let secondary = SubtitleTrack::new(
            vec![
                Cue::new(0, 2000, "Bonjour").with_token_span((0, 1)),
                Cue::new(5000, 6000, "Intermede").with_token_span((1, 2)),
                Cue::new(7000, 8000, "Tard").with_token_span((2, 3)),
            ],
            TokenStream::from_words(&["Bonjour", "Intermede", "Tard"]).with_separator(" "),
        );
        // "world" resembles "Tard" more than anything it may legitimately take
        let encoder = LookupEncoder::new()
            .with("Hello", &[1.0, 0.0])
            .with("Bonjour", &[1.0, 0.0])
            .with("world", &[0.0, 1.0])
            .with("Tard", &[0.0, 1.0])
            .with("Later", &[0.0, 0.6, 0.8]);

        let outcome = merge_tracks(
            &primary,
            &secondary,
            &encoder,
            &MergeConfig::default(),
            CancellationFlag::new(),
            ProgressTracker::new(StageWeights::default()),
        )
        .unwrap();

        let spans: Vec<TokenSpan> = outcome
            .segments
            .iter()
            .filter(|s| s.has_secondary())
            .map(|s| s.secondary_token_span)
            .collect();
        assert_eq!(
            spans,
            vec![TokenSpan::new(0, 1), TokenSpan::new(1, 2), TokenSpan::new(2, 3)]
        );
        for pair in spans.windows(2) {
            assert!(pair[0].end <= pair[1].start, "{:?} before {:?}", pair[0], pair[1]);
        }
        assert_eq!(outcome.segments[1].primary_text, "world");
        assert!(!outcome.segments[1].has_secondary());
        assert_eq!(outcome.segments[2].secondary_text, "Intermede");
        assert_eq!(outcome.segments[3].secondary_text, "Tard");
        assert_eq!(outcome.stats.unassigned_tokens, 0);
    }

    #[test]
    fn test_leading_token_is_not_lost() {
        let primary = SubtitleTrack::new(
            vec![Cue::new(0, 1000, "Hello"), Cue::new(1000, 2000, "world")],
            TokenStream::default(),
        );
        let secondary = SubtitleTrack::new(
            vec![
                Cue::new(0, 900, "Euh Bonjour le").with_token_span((0, 3)),
                Cue::new(900, 2000, "monde").with_token_span((3, 4)),
            ],
            TokenStream::from_words(&["Euh", "Bonjour", "le", "monde"]).with_separator(" "),
        );

        let outcome = merge_tracks(
            &primary,
            &secondary,
            &encoder(),
            &MergeConfig::default(),
            CancellationFlag::new(),
            ProgressTracker::new(StageWeights::default()),
        )
        .unwrap();

        assert_eq!(outcome.segments[0].secondary_text, "Euh Bonjour");
        assert_eq!(outcome.segments[0].secondary_token_span, TokenSpan::new(0, 2));
        assert_eq!(outcome.segments[1].secondary_text, "le monde");
        assert_eq!(outcome.stats.tokens_attached, 1);
        assert_eq!(outcome.stats.unassigned_tokens, 0);
    }

    #[test]
    fn test_progress_uses_configured_weights() {
        let (primary, secondary) = hello_world_tracks();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let tracker = ProgressTracker::new(StageWeights::default())
            .with_callback(move |p| sink.lock().unwrap().push(p));
        let config = MergeConfig {
            stage_weights: StageWeights {
                non_overlap: 60,
                global_align: 20,
                refinement: 20,
            },
            ..Default::default()
        };

        merge_tracks(
            &primary,
            &secondary,
            &encoder(),
            &config,
            CancellationFlag::new(),
            tracker,
        )
        .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[..3], [20, 40, 60]);
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn test_merge_back_remaps_and_sorts() {
        let filtered = FilteredTokens {
            stream: TokenStream::from_words(&["a", "d"]),
            index_map: vec![0, 3],
            barriers: Vec::new(),
        };
        let aligned = vec![Segment {
            start: 6000,
            end: 7000,
            primary_text: "x".to_string(),
            secondary_text: "d".to_string(),
            secondary_token_span: TokenSpan::new(1, 2),
            ..Default::default()
        }];
        let extraction = NonOverlapResult {
            secondary_only: vec![Segment {
                start: 500,
                end: 600,
                secondary_text: "b c".to_string(),
                secondary_token_span: TokenSpan::new(1, 3),
                ..Default::default()
            }],
            filtered,
            ..Default::default()
        };

        let merged = merge_back(aligned, extraction);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].secondary_text, "b c");
        assert_eq!(merged[0].secondary_token_span, TokenSpan::new(1, 3));
        assert_eq!(merged[1].secondary_token_span, TokenSpan::new(3, 4));
    }

    #[test]
    fn test_count_unassigned() {
        let segments = vec![
            Segment {
                secondary_token_span: TokenSpan::new(0, 2),
                ..Default::default()
            },
            Segment {
                secondary_token_span: TokenSpan::new(3, 4),
                ..Default::default()
            },
        ];
        assert_eq!(count_unassigned(&segments, 5), 2);
    }
}
