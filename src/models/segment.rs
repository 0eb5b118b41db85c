use serde::{Deserialize, Serialize};

/// Half-open `[start, end)` index range into a token stream
///
/// The default `(0, 0)` span means "unassigned".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
}

impl TokenSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of tokens covered
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether `other` lies entirely inside this span
    pub fn contains(&self, other: &TokenSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl From<(usize, usize)> for TokenSpan {
    fn from((start, end): (usize, usize)) -> Self {
        Self { start, end }
    }
}

/// Which track a cue or segment is anchored on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Primary,
    Secondary,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Primary => Side::Secondary,
            Side::Secondary => Side::Primary,
        }
    }
}

/// One cue of a single source track, as produced by the subtitle loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Start timestamp in milliseconds
    pub start: u64,
    /// End timestamp in milliseconds
    pub end: u64,
    /// Cue text as authored, line breaks included
    pub text: String,
    /// Style identifier from the source track
    #[serde(default)]
    pub style: String,
    /// Span of this cue's tokens in its own track's token stream
    #[serde(default)]
    pub token_span: TokenSpan,
}

impl Cue {
    pub fn new(start: u64, end: u64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            style: String::new(),
            token_span: TokenSpan::default(),
        }
    }

    pub fn with_token_span(mut self, span: impl Into<TokenSpan>) -> Self {
        self.token_span = span.into();
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    /// Whether `[start, end)` intersects `[other.start, other.end)`
    ///
    /// A zero-length cue overlaps a range when its instant falls inside it.
    pub fn overlaps(&self, other: &Cue) -> bool {
        time_ranges_overlap(self.start, self.end, other.start, other.end)
    }
}

pub(crate) fn time_ranges_overlap(a_start: u64, a_end: u64, b_start: u64, b_end: u64) -> bool {
    match (a_start == a_end, b_start == b_end) {
        (true, true) => a_start == b_start,
        (true, false) => b_start <= a_start && a_start < b_end,
        (false, true) => a_start <= b_start && b_start < a_end,
        (false, false) => a_start < b_end && b_start < a_end,
    }
}

/// One output subtitle cue: timing, bilingual text, token spans, and pairing score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start timestamp in milliseconds
    pub start: u64,
    /// End timestamp in milliseconds
    pub end: u64,
    pub primary_text: String,
    pub secondary_text: String,
    /// Tokens of the secondary stream this segment's secondary text was built from
    pub secondary_token_span: TokenSpan,
    /// Tokens of the primary stream this segment's primary text was built from
    pub primary_token_span: TokenSpan,
    /// Confidence of the primary/secondary pairing (0-1); single-sided segments carry 0
    pub score: f32,
    pub primary_style: String,
    pub secondary_style: String,
}

impl Segment {
    /// A primary-anchored segment waiting for its secondary text
    pub fn from_primary(cue: &Cue) -> Self {
        Self {
            start: cue.start,
            end: cue.end.max(cue.start),
            primary_text: cue.text.clone(),
            primary_token_span: cue.token_span,
            primary_style: cue.style.clone(),
            ..Default::default()
        }
    }

    /// A secondary-only segment built from a cue of the secondary track
    pub fn from_secondary(cue: &Cue) -> Self {
        Self {
            start: cue.start,
            end: cue.end.max(cue.start),
            secondary_text: cue.text.clone(),
            secondary_token_span: cue.token_span,
            secondary_style: cue.style.clone(),
            ..Default::default()
        }
    }

    /// Build a single-sided segment anchored on `side`
    pub fn from_cue(cue: &Cue, side: Side) -> Self {
        match side {
            Side::Primary => Self::from_primary(cue),
            Side::Secondary => Self::from_secondary(cue),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn has_primary(&self) -> bool {
        !self.primary_text.is_empty()
    }

    pub fn has_secondary(&self) -> bool {
        !self.secondary_token_span.is_empty()
    }

    /// Drop any secondary assignment
    pub fn clear_secondary(&mut self) {
        self.secondary_text.clear();
        self.secondary_token_span = TokenSpan::default();
        self.secondary_style.clear();
        self.score = 0.0;
    }
}

/// Stable sort by start, then end
pub fn sort_segments(segments: &mut [Segment]) {
    segments.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_span_basics() {
        let span = TokenSpan::new(2, 5);
        assert_eq!(span.len(), 3);
        assert!(!span.is_empty());
        assert!(span.contains(&TokenSpan::new(3, 5)));
        assert!(!span.contains(&TokenSpan::new(1, 3)));
        assert!(TokenSpan::default().is_empty());
    }

    #[test]
    fn test_cue_overlap() {
        let reference = Cue::new(1000, 2000, "ref");

        assert!(!Cue::new(500, 900, "before").overlaps(&reference));
        assert!(Cue::new(1500, 1800, "inside").overlaps(&reference));
        assert!(Cue::new(1900, 2500, "straddles").overlaps(&reference));
        // Touching at the boundary is not an overlap for half-open ranges
        assert!(!Cue::new(2000, 2100, "after").overlaps(&reference));
        assert!(Cue::new(1200, 1200, "instant").overlaps(&reference));
    }

    #[test]
    fn test_sort_segments_is_stable() {
        let mut segments = vec![
            Segment {
                start: 300,
                end: 400,
                primary_text: "c".to_string(),
                ..Default::default()
            },
            Segment {
                start: 100,
                end: 300,
                primary_text: "b1".to_string(),
                ..Default::default()
            },
            Segment {
                start: 100,
                end: 200,
                primary_text: "a".to_string(),
                ..Default::default()
            },
            Segment {
                start: 100,
                end: 300,
                primary_text: "b2".to_string(),
                ..Default::default()
            },
        ];

        sort_segments(&mut segments);

        let order: Vec<&str> = segments.iter().map(|s| s.primary_text.as_str()).collect();
        assert_eq!(order, vec!["a", "b1", "b2", "c"]);
    }

    #[test]
    fn test_from_cue_respects_side() {
        let cue = Cue::new(0, 1000, "Bonjour")
            .with_style("FR")
            .with_token_span((0, 1));

        let secondary = Segment::from_cue(&cue, Side::Secondary);
        assert_eq!(secondary.secondary_text, "Bonjour");
        assert_eq!(secondary.secondary_style, "FR");
        assert_eq!(secondary.secondary_token_span, TokenSpan::new(0, 1));
        assert!(secondary.primary_text.is_empty());
        assert_eq!(secondary.score, 0.0);

        let primary = Segment::from_cue(&cue, Side::Primary);
        assert_eq!(primary.primary_text, "Bonjour");
        assert!(!primary.has_secondary());
    }
}
