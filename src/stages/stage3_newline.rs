use tracing::info;

use crate::alignment::MergeContext;
use crate::models::{Segment, Stage};

/// Segments handled between two cancellation checks
pub const NEWLINE_BATCH_SIZE: usize = 64;

/// Subtitle line-break markers: the ASS hard break and a literal newline
const BREAK_MARKERS: [&str; 2] = ["\\N", "\n"];

/// Execute the newline cleanup pass on both texts of every segment
///
/// Returns the cleaned sequence and `stage_number + 1`. The cancellation gate is
/// checked before each batch; if it is set the input comes back untouched.
pub fn eliminate_unnecessary_newline(
    segments: Vec<Segment>,
    ctx: &mut MergeContext<'_>,
    stage_number: u32,
) -> (Vec<Segment>, u32) {
    let next_stage = stage_number + 1;
    let total = segments.len();
    let mut cleaned = Vec::with_capacity(total);
    let mut changed = 0usize;

    for batch in segments.chunks(NEWLINE_BATCH_SIZE) {
        if ctx.is_cancelled() {
            info!("Newline cleanup cancelled after {} segments", cleaned.len());
            return (segments, next_stage);
        }

        for segment in batch {
            let mut segment = segment.clone();
            let primary = normalize_line_breaks(&segment.primary_text);
            let secondary = normalize_line_breaks(&segment.secondary_text);
            if primary != segment.primary_text || secondary != segment.secondary_text {
                changed += 1;
            }
            segment.primary_text = primary;
            segment.secondary_text = secondary;
            cleaned.push(segment);
        }

        ctx.progress.report_pass(
            Stage::Refinement,
            stage_number,
            ctx.refinement_calls,
            cleaned.len(),
            total,
        );
    }

    // An empty sequence still has to observe the gate
    if total == 0 && ctx.is_cancelled() {
        return (segments, next_stage);
    }

    info!("Newline cleanup: {} of {} segments changed", changed, total);
    (cleaned, next_stage)
}

/// Remove line breaks that carry no layout meaning
///
/// Leading and trailing breaks go, runs of breaks collapse to one, and whitespace
/// hugging a break is trimmed. A single break between two non-empty lines stays, written
/// with the first marker style found in the text. Text without any break marker is
/// returned as is.
pub fn normalize_line_breaks(text: &str) -> String {
    let Some(joiner) = first_marker(text) else {
        return text.to_string();
    };

    let unified = text.replace(BREAK_MARKERS[0], BREAK_MARKERS[1]);
    let lines: Vec<&str> = unified
        .split(BREAK_MARKERS[1])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines.join(joiner)
}

fn first_marker(text: &str) -> Option<&'static str> {
    BREAK_MARKERS
        .iter()
        .filter_map(|&m| text.find(m).map(|pos| (pos, m)))
        .min_by_key(|&(pos, _)| pos)
        .map(|(_, m)| m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::CancellationFlag;
    use crate::testing::LookupEncoder;

    #[test]
    fn test_normalize_cases() {
        let cases = [
            ("Hello world", "Hello world"),
            ("Hello\\Nworld", "Hello\\Nworld"),
            ("\\NHello\\Nworld\\N", "Hello\\Nworld"),
            ("Hello \\N \\N world", "Hello\\Nworld"),
            ("Hello\\N\\N\\Nworld", "Hello\\Nworld"),
            ("line one\n\nline two\n", "line one\nline two"),
            ("mixed\n\\Nbreaks", "mixed\nbreaks"),
            ("\\N", ""),
            ("", ""),
        ];

        for (input, expected) in cases {
            assert_eq!(normalize_line_breaks(input), expected, "input {:?}", input);
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in ["\\N a \\N\\N b \\N", "one\ntwo", "plain", "  padded  "] {
            let once = normalize_line_breaks(input);
            assert_eq!(normalize_line_breaks(&once), once);
        }
    }

    #[test]
    fn test_text_without_markers_untouched() {
        assert_eq!(normalize_line_breaks("  padded  "), "  padded  ");
    }

    fn segment(text: &str) -> Segment {
        Segment {
            start: 0,
            end: 1000,
            primary_text: text.to_string(),
            secondary_text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_cleans_both_sides() {
        let encoder = LookupEncoder::new();
        let mut ctx = MergeContext::new(&encoder, 8, CancellationFlag::new());

        let (cleaned, stage) =
            eliminate_unnecessary_newline(vec![segment("\\Nfoo\\N\\Nbar\\N")], &mut ctx, 2);

        assert_eq!(stage, 3);
        assert_eq!(cleaned[0].primary_text, "foo\\Nbar");
        assert_eq!(cleaned[0].secondary_text, "foo\\Nbar");
    }

    #[test]
    fn test_cancelled_returns_input() {
        let encoder = LookupEncoder::new();
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let mut ctx = MergeContext::new(&encoder, 8, cancel);
        let input = vec![segment("\\Nfoo\\N\\Nbar\\N")];

        let (output, stage) = eliminate_unnecessary_newline(input.clone(), &mut ctx, 0);

        assert_eq!(stage, 1);
        assert_eq!(output, input);
    }

    #[test]
    fn test_empty_sequence() {
        let encoder = LookupEncoder::new();
        let mut ctx = MergeContext::new(&encoder, 8, CancellationFlag::new());

        let (output, stage) = eliminate_unnecessary_newline(Vec::new(), &mut ctx, 0);

        assert!(output.is_empty());
        assert_eq!(stage, 1);
    }
}
