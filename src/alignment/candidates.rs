use crate::models::{TokenSpan, TokenStream};

/// A run of consecutive tokens proposed as the match for one target text
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Tokens joined with the stream separator
    pub text: String,
    pub span: TokenSpan,
}

/// Every contiguous concatenation of tokens inside the inclusive window `[start, end]`
///
/// Ordered by start index ascending, then end index ascending, so `["a","b","c"]` over
/// `[0, 2]` gives `a, ab, abc, b, bc, c`. Scoring ties resolve against this order. A
/// window of `n` tokens yields `n * (n + 1) / 2` candidates; `start > end` yields none,
/// and a window running past the stream is clipped to it.
pub fn consecutive_combinations(stream: &TokenStream, start: usize, end: usize) -> Vec<Candidate> {
    if stream.is_empty() || start > end || start >= stream.len() {
        return Vec::new();
    }
    let end = end.min(stream.len() - 1);
    let n = end - start + 1;

    let mut candidates = Vec::with_capacity(n * (n + 1) / 2);
    for i in start..=end {
        let mut text = String::new();
        for j in i..=end {
            if j > i {
                text.push_str(&stream.separator);
            }
            text.push_str(&stream.tokens[j]);
            candidates.push(Candidate {
                text: text.clone(),
                span: TokenSpan::new(i, j + 1),
            });
        }
    }
    candidates
}
