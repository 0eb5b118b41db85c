use tracing::{debug, info};

use crate::alignment::MergeContext;
use crate::error::MergeError;
use crate::models::{Segment, Stage, TokenSpan, TokenStream};

use super::{TokenBarrier, SCORE_EPSILON};

/// Execute one neighbour refinement pass over the whole sequence
///
/// Segments holding both a primary text and a secondary span are paired with the next
/// such segment, stepping over any unaligned segment between them. The boundary between
/// the two spans may move up to `window_size` tokens either way (tokens sitting in a gap
/// between the spans are always up for grabs). Left-hand texts are scored against the
/// left primary text and right-hand texts against the right one; the split with the best
/// summed score wins, the current boundary winning ties. A gap is always closed. Pairs
/// separated by a barrier are left alone.
///
/// Returns the refined sequence and `stage_number + 1`. If cancellation is requested
/// before or during the pass, the input comes back untouched, still with
/// `stage_number + 1`.
pub fn align_subs_using_neighbours(
    segments: Vec<Segment>,
    tokens: &TokenStream,
    window_size: usize,
    barriers: &[TokenBarrier],
    ctx: &mut MergeContext<'_>,
    stage_number: u32,
) -> Result<(Vec<Segment>, u32), MergeError> {
    let next_stage = stage_number + 1;
    if ctx.is_cancelled() {
        return Ok((segments, next_stage));
    }

    let mut work = segments.clone();
    let aligned: Vec<usize> = work
        .iter()
        .enumerate()
        .filter(|(_, s)| s.has_primary() && s.has_secondary())
        .map(|(i, _)| i)
        .collect();
    let pairs = aligned.len().saturating_sub(1);
    let mut adjusted = 0usize;

    for (k, pair) in aligned.windows(2).enumerate() {
        if ctx.is_cancelled() {
            info!("Refinement pass {}: cancelled at pair {}", next_stage, k);
            return Ok((segments, next_stage));
        }

        if refine_pair(&mut work, pair[0], pair[1], tokens, window_size, barriers, ctx)? {
            adjusted += 1;
        }
        ctx.progress
            .report_pass(Stage::Refinement, stage_number, ctx.refinement_calls, k + 1, pairs);
    }

    info!(
        "Refinement pass {}: {} of {} boundaries moved",
        next_stage, adjusted, pairs
    );

    Ok((work, next_stage))
}

/// Re-score the boundary between `work[i]` and `work[j]`; true if it moved
fn refine_pair(
    work: &mut [Segment],
    i: usize,
    j: usize,
    tokens: &TokenStream,
    window_size: usize,
    barriers: &[TokenBarrier],
    ctx: &MergeContext<'_>,
) -> Result<bool, MergeError> {
    let (left, right) = (&work[i], &work[j]);
    let current = left.secondary_token_span.end;
    let right_start = right.secondary_token_span.start;
    let outer = TokenSpan::new(left.secondary_token_span.start, right.secondary_token_span.end);
    if current > right_start || outer.end > tokens.len() || outer.len() < 2 {
        return Ok(false);
    }
    if barriers
        .iter()
        .any(|b| current <= b.position && b.position <= right_start)
    {
        return Ok(false);
    }
    let has_gap = current < right_start;

    // Each side keeps at least one token
    let lo = (outer.start + 1).max(current.saturating_sub(window_size));
    let hi = (outer.end - 1).min(right_start + window_size);
    if lo > hi {
        return Ok(false);
    }

    let boundaries: Vec<usize> = (lo..=hi).collect();
    let left_texts: Vec<String> = boundaries
        .iter()
        .map(|&b| tokens.join(TokenSpan::new(outer.start, b)))
        .collect();
    let right_texts: Vec<String> = boundaries
        .iter()
        .map(|&b| tokens.join(TokenSpan::new(b, outer.end)))
        .collect();

    let left_scores = ctx
        .scorer
        .score(left.primary_text.trim(), &left_texts)
        .map_err(|e| MergeError::provider(Stage::Refinement, i, e))?;
    let right_scores = ctx
        .scorer
        .score(right.primary_text.trim(), &right_texts)
        .map_err(|e| MergeError::provider(Stage::Refinement, j, e))?;

    let totals: Vec<f32> = left_scores
        .iter()
        .zip(right_scores.iter())
        .map(|(l, r)| l + r)
        .collect();

    let current_idx = boundaries.iter().position(|&b| b == current);
    let mut best = if has_gap { 0 } else { current_idx.unwrap_or(0) };
    for (k, &total) in totals.iter().enumerate() {
        if total > totals[best] + SCORE_EPSILON {
            best = k;
        }
    }

    if !has_gap && Some(best) == current_idx {
        return Ok(false);
    }

    let boundary = boundaries[best];
    debug!(
        "Boundary {}|{} moved {} -> {} ({:.3})",
        i, j, current, boundary, totals[best]
    );

    let left_span = TokenSpan::new(outer.start, boundary);
    let right_span = TokenSpan::new(boundary, outer.end);
    assign(&mut work[i], tokens, left_span, left_scores[best]);
    assign(&mut work[j], tokens, right_span, right_scores[best]);

    Ok(true)
}

/// Hand tokens no segment claimed to the nearest aligned segment of the same block
///
/// Blocks are the stretches of the stream between barriers. Leading tokens of a block go
/// to its first aligned segment, trailing tokens to its last, and a gap between two
/// aligned segments to the left one. Scores are kept. A block with no aligned segment
/// keeps its tokens unclaimed. Returns the number of tokens handed out.
pub fn attach_unclaimed_tokens(
    segments: &mut [Segment],
    tokens: &TokenStream,
    barriers: &[TokenBarrier],
) -> usize {
    let mut positions: Vec<usize> = barriers.iter().map(|b| b.position).collect();
    positions.sort_unstable();
    positions.dedup();
    let block_of = |span: TokenSpan| positions.partition_point(|&p| p <= span.start);
    let block_end = |block: usize| positions.get(block).copied().unwrap_or(tokens.len());
    let block_start = |block: usize| if block == 0 { 0 } else { positions[block - 1] };

    let aligned: Vec<usize> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.has_secondary() && s.secondary_token_span.end <= tokens.len())
        .map(|(i, _)| i)
        .collect();
    let blocks: Vec<usize> = aligned
        .iter()
        .map(|&i| block_of(segments[i].secondary_token_span))
        .collect();

    let mut attached = 0usize;
    for (n, &i) in aligned.iter().enumerate() {
        let span = segments[i].secondary_token_span;
        let block = blocks[n];

        let start = if n == 0 || blocks[n - 1] != block {
            block_start(block).min(span.start)
        } else {
            span.start
        };
        let end = match aligned.get(n + 1) {
            Some(&next) if blocks[n + 1] == block => {
                segments[next].secondary_token_span.start.max(span.end)
            }
            _ => block_end(block).max(span.end),
        };

        if start != span.start || end != span.end {
            attached += (span.start - start) + (end - span.end);
            let segment = &mut segments[i];
            let widened = TokenSpan::new(start, end);
            segment.secondary_token_span = widened;
            segment.secondary_text = tokens.text(widened);
            segment.secondary_style = tokens.dominant_style(widened);
        }
    }

    if attached > 0 {
        info!("Attached {} unclaimed tokens to neighbouring segments", attached);
    }
    attached
}

fn assign(segment: &mut Segment, tokens: &TokenStream, span: TokenSpan, score: f32) {
    segment.secondary_token_span = span;
    segment.secondary_text = tokens.text(span);
    segment.secondary_style = tokens.dominant_style(span);
    segment.score = score;
}
