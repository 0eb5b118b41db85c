use tracing::{debug, info};

use crate::alignment::{consecutive_combinations, Candidate, MergeContext};
use crate::error::MergeError;
use crate::models::{Cue, Segment, Stage, TokenStream};

use super::{token_bounds, TokenBarrier};

/// Scores closer than this are treated as equal
pub const SCORE_EPSILON: f32 = 1e-6;

/// Result of Stage 1 global alignment
#[derive(Debug, Clone, Default)]
pub struct GlobalAlignResult {
    /// One segment per primary cue, in input order
    pub segments: Vec<Segment>,
    /// Segments that received a secondary span
    pub segments_aligned: usize,
    /// Tokens not claimed by any segment
    pub unassigned_tokens: usize,
    /// Whether the stage was abandoned because cancellation was requested
    pub cancelled: bool,
}

/// Execute Stage 1: greedy, order-preserving assignment of secondary spans
///
/// Walks the primary cues in order with a cursor into the token stream. Each cue is
/// scored against every candidate span starting at or after the cursor within
/// `lookahead_tokens` tokens; the winner's tokens are consumed, so spans never overlap
/// and never walk backwards. Once the stream is exhausted the remaining segments stay
/// unassigned with a zero score.
///
/// `barriers` mark runs of tokens removed from the stream. A cue timed before a barrier
/// never draws tokens from past it, and a cue timed after one never draws tokens from
/// before it.
///
/// On cancellation the primary-only segments are returned with no assignment at all.
pub fn execute_global_align(
    primary: &[Cue],
    tokens: &TokenStream,
    lookahead_tokens: usize,
    barriers: &[TokenBarrier],
    ctx: &mut MergeContext<'_>,
) -> Result<GlobalAlignResult, MergeError> {
    let unaligned: Vec<Segment> = primary.iter().map(Segment::from_primary).collect();
    let mut segments = unaligned.clone();
    let total = segments.len();
    let mut cursor = 0usize;
    let mut segments_aligned = 0usize;
    let mut claimed = 0usize;

    for (index, segment) in segments.iter_mut().enumerate() {
        if ctx.is_cancelled() {
            info!("Stage 1: cancelled at segment {}", index);
            return Ok(GlobalAlignResult {
                unassigned_tokens: tokens.len(),
                segments: unaligned,
                segments_aligned: 0,
                cancelled: true,
            });
        }

        let target = segment.primary_text.trim();
        let (lo, hi) = token_bounds(barriers, segment.start, segment.end, tokens.len());
        let window_start = cursor.max(lo);
        if window_start >= hi || target.is_empty() {
            ctx.progress.report(Stage::GlobalAlign, index + 1, total);
            continue;
        }

        let window_end = (window_start + lookahead_tokens.max(1)).min(hi) - 1;
        let candidates = consecutive_combinations(tokens, window_start, window_end);
        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let scores = ctx
            .scorer
            .score(target, &texts)
            .map_err(|e| MergeError::provider(Stage::GlobalAlign, index, e))?;

        if let Some(best) = select_best(&candidates, &scores) {
            let chosen = &candidates[best];
            segment.secondary_token_span = chosen.span;
            segment.secondary_text = tokens.text(chosen.span);
            segment.secondary_style = tokens.dominant_style(chosen.span);
            segment.score = scores[best];
            cursor = chosen.span.end;
            segments_aligned += 1;
            claimed += chosen.span.len();

            debug!(
                "Segment {}: {:?} -> {:?} ({:.3})",
                index, segment.primary_text, segment.secondary_text, segment.score
            );
        }

        ctx.progress.report(Stage::GlobalAlign, index + 1, total);
    }

    ctx.progress.finish(Stage::GlobalAlign);

    let unassigned_tokens = tokens.len() - claimed;
    info!(
        "Stage 1: {} of {} segments aligned, {} tokens unassigned",
        segments_aligned, total, unassigned_tokens
    );

    Ok(GlobalAlignResult {
        segments,
        segments_aligned,
        unassigned_tokens,
        cancelled: false,
    })
}

/// Index of the best candidate: highest score, then fewest tokens, then earliest start
pub fn select_best(candidates: &[Candidate], scores: &[f32]) -> Option<usize> {
    let mut best: Option<usize> = None;

    for (i, (candidate, &score)) in candidates.iter().zip(scores.iter()).enumerate() {
        let Some(b) = best else {
            best = Some(i);
            continue;
        };
        let best_score = scores[b];
        let best_span = candidates[b].span;

        let better = if score > best_score + SCORE_EPSILON {
            true
        } else if (score - best_score).abs() <= SCORE_EPSILON {
            candidate.span.len() < best_span.len()
                || (candidate.span.len() == best_span.len() && candidate.span.start < best_span.start)
        } else {
            false
        };

        if better {
            best = Some(i);
        }
    }

    best
}
