use tracing::{debug, info};

use crate::alignment::MergeContext;
use crate::models::{Cue, Segment, Side, Stage, TokenSpan, TokenStream};

/// Result of Stage 0 non-overlap extraction
#[derive(Debug, Clone, Default)]
pub struct NonOverlapResult {
    /// Primary cues that overlap no secondary cue, as primary-only segments
    pub primary_only: Vec<Segment>,
    /// Secondary cues that overlap no primary cue, as secondary-only segments
    pub secondary_only: Vec<Segment>,
    /// Secondary tokens left for alignment once the extracted spans are removed
    pub filtered: FilteredTokens,
    /// Whether the stage was skipped because cancellation was requested
    pub cancelled: bool,
}

/// Where an extracted secondary cue used to sit in the filtered stream
///
/// Segments timed before the cue must take their tokens from before `position`, and
/// segments timed after it from `position` onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBarrier {
    /// Index of the first filtered token after the removed run
    pub position: usize,
    pub start: u64,
    pub end: u64,
}

impl TokenBarrier {
    /// Whether the barrier's cue ends before a cue starting at `start`
    pub fn is_before(&self, start: u64) -> bool {
        self.end <= start && self.start < start
    }

    /// Whether the barrier's cue starts after a cue ending at `end`
    pub fn is_after(&self, end: u64) -> bool {
        self.start >= end
    }
}

/// Filtered token range a cue timed `[start, end)` may draw from
///
/// The result can be empty (`lo >= hi`) when barriers leave no room.
pub fn token_bounds(barriers: &[TokenBarrier], start: u64, end: u64, len: usize) -> (usize, usize) {
    let mut lo = 0;
    let mut hi = len;
    for barrier in barriers {
        if barrier.is_before(start) {
            lo = lo.max(barrier.position);
        } else if barrier.is_after(end) {
            hi = hi.min(barrier.position);
        }
    }
    (lo, hi)
}

/// A token stream with some spans removed, remembering where each token came from
#[derive(Debug, Clone, Default)]
pub struct FilteredTokens {
    pub stream: TokenStream,
    /// `index_map[i]` is the original index of filtered token `i`
    pub index_map: Vec<usize>,
    /// One entry per extracted secondary cue that owned tokens, in extraction order
    pub barriers: Vec<TokenBarrier>,
}

impl FilteredTokens {
    /// Wrap a stream with nothing removed
    pub fn identity(stream: &TokenStream) -> Self {
        Self {
            stream: stream.clone(),
            index_map: (0..stream.len()).collect(),
            barriers: Vec::new(),
        }
    }

    /// Record a barrier for every extracted segment that owns a token span
    pub fn with_barriers(mut self, extracted: &[Segment]) -> Self {
        self.barriers = extracted
            .iter()
            .filter(|s| s.has_secondary())
            .map(|s| TokenBarrier {
                position: self
                    .index_map
                    .partition_point(|&i| i < s.secondary_token_span.start),
                start: s.start,
                end: s.end,
            })
            .collect();
        self
    }

    /// Translate a span over the filtered stream back to original indices
    pub fn remap(&self, span: TokenSpan) -> TokenSpan {
        if span.is_empty() || span.end > self.index_map.len() {
            return TokenSpan::default();
        }
        TokenSpan::new(self.index_map[span.start], self.index_map[span.end - 1] + 1)
    }
}

/// Execute Stage 0: pull cues that overlap nothing on the other track out of the merge
///
/// Both tests use the tracks as they were on entry, so a primary cue removed here still
/// counts as a reference for the secondary pass. Extracted cues are removed from
/// `primary` and `secondary` in place, and the secondary token spans they covered are
/// removed from the stream handed to the global aligner.
pub fn execute_non_overlap(
    primary: &mut Vec<Cue>,
    secondary: &mut Vec<Cue>,
    tokens: &TokenStream,
    ctx: &mut MergeContext<'_>,
) -> NonOverlapResult {
    if ctx.is_cancelled() {
        return NonOverlapResult {
            filtered: FilteredTokens::identity(tokens),
            cancelled: true,
            ..Default::default()
        };
    }

    let primary_reference = primary.clone();
    let (primary_only, _) = filter_and_extract_non_overlap(primary, secondary, Side::Primary);
    ctx.progress.report(Stage::NonOverlap, 1, 3);

    let (secondary_only, spans) =
        filter_and_extract_non_overlap(secondary, &primary_reference, Side::Secondary);
    ctx.progress.report(Stage::NonOverlap, 2, 3);

    let excluded = filter_token_spans(&spans);
    let filtered = filter_token_stream(tokens, &excluded).with_barriers(&secondary_only);
    ctx.progress.finish(Stage::NonOverlap);

    info!(
        "Stage 0: {} primary-only and {} secondary-only cues extracted, {} of {} secondary tokens kept",
        primary_only.len(),
        secondary_only.len(),
        filtered.stream.len(),
        tokens.len()
    );

    NonOverlapResult {
        primary_only,
        secondary_only,
        filtered,
        cancelled: false,
    }
}

/// Remove cues of `input` whose time range intersects no cue of `reference`
///
/// The removed cues come back as single-sided segments anchored on `side`, together
/// with their token spans, in their original order. Cues that overlap anything stay in
/// `input` untouched.
pub fn filter_and_extract_non_overlap(
    input: &mut Vec<Cue>,
    reference: &[Cue],
    side: Side,
) -> (Vec<Segment>, Vec<TokenSpan>) {
    let mut extracted = Vec::new();
    let mut spans = Vec::new();

    input.retain(|cue| {
        let overlaps = reference.iter().any(|r| cue.overlaps(r));
        if !overlaps {
            debug!(
                "{:?} cue {}-{} overlaps nothing on the {:?} track",
                side,
                cue.start,
                cue.end,
                side.opposite()
            );
            extracted.push(Segment::from_cue(cue, side));
            spans.push(cue.token_span);
        }
        overlaps
    });

    (extracted, spans)
}

/// Collapse spans to a minimal covering set sorted by start
///
/// Empty spans are dropped, spans contained in another vanish, and overlapping or
/// touching spans merge into their union.
pub fn filter_token_spans(spans: &[TokenSpan]) -> Vec<TokenSpan> {
    let mut sorted: Vec<TokenSpan> = spans.iter().copied().filter(|s| !s.is_empty()).collect();
    sorted.sort();

    let mut merged: Vec<TokenSpan> = Vec::with_capacity(sorted.len());
    for span in sorted {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => {
                last.end = last.end.max(span.end);
            }
            _ => merged.push(span),
        }
    }
    merged
}

/// Drop tokens (and their style labels) that fall inside any excluded span
pub fn filter_tokens_and_styles(
    tokens: &[String],
    styles: &[String],
    excluded: &[TokenSpan],
) -> (Vec<String>, Vec<String>) {
    let kept = kept_indices(tokens.len(), excluded);
    let kept_tokens = kept.iter().map(|&i| tokens[i].clone()).collect();
    let kept_styles = kept.iter().filter_map(|&i| styles.get(i).cloned()).collect();
    (kept_tokens, kept_styles)
}

/// Remove excluded spans from a stream, keeping the map back to original indices
pub fn filter_token_stream(stream: &TokenStream, excluded: &[TokenSpan]) -> FilteredTokens {
    let (tokens, styles) = filter_tokens_and_styles(&stream.tokens, &stream.styles, excluded);
    FilteredTokens {
        stream: TokenStream {
            tokens,
            styles,
            separator: stream.separator.clone(),
        },
        index_map: kept_indices(stream.len(), excluded),
        barriers: Vec::new(),
    }
}

fn kept_indices(len: usize, excluded: &[TokenSpan]) -> Vec<usize> {
    let excluded = filter_token_spans(excluded);
    let mut spans = excluded.iter().peekable();
    let mut kept = Vec::with_capacity(len);

    for i in 0..len {
        while spans.next_if(|s| s.end <= i).is_some() {}
        if !spans.peek().is_some_and(|s| s.start <= i) {
            kept.push(i);
        }
    }
    kept
}
