use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Cue, TokenSpan};
use crate::error::MergeError;

/// Tokenized text of one subtitle track
///
/// Tokens are never reordered. `styles` runs parallel to `tokens`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenStream {
    pub tokens: Vec<String>,
    #[serde(default)]
    pub styles: Vec<String>,
    /// Inserted between tokens when a span is joined into text
    #[serde(default)]
    pub separator: String,
}

impl TokenStream {
    /// Build a stream whose tokens already carry their own whitespace
    pub fn new(tokens: Vec<String>, styles: Vec<String>) -> Self {
        Self {
            tokens,
            styles,
            separator: String::new(),
        }
    }

    /// Build a stream of bare tokens with no styles
    pub fn from_words<S: AsRef<str>>(words: &[S]) -> Self {
        let tokens: Vec<String> = words.iter().map(|w| w.as_ref().to_string()).collect();
        let styles = vec![String::new(); tokens.len()];
        Self::new(tokens, styles)
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Reject streams whose style labels do not line up with their tokens
    ///
    /// An empty style list is accepted and treated as "no styles".
    pub fn validate(&self) -> Result<(), MergeError> {
        if !self.styles.is_empty() && self.styles.len() != self.tokens.len() {
            return Err(MergeError::invalid_input(format!(
                "token stream has {} tokens but {} style labels",
                self.tokens.len(),
                self.styles.len()
            )));
        }
        Ok(())
    }

    /// Join the tokens of `span` with the stream separator
    pub fn join(&self, span: TokenSpan) -> String {
        let end = span.end.min(self.tokens.len());
        if span.start >= end {
            return String::new();
        }
        self.tokens[span.start..end].join(&self.separator)
    }

    /// Join and trim, the form stored on a segment
    pub fn text(&self, span: TokenSpan) -> String {
        self.join(span).trim().to_string()
    }

    /// Most frequent style label in `span`, earliest wins on ties
    pub fn dominant_style(&self, span: TokenSpan) -> String {
        let end = span.end.min(self.styles.len());
        if span.start >= end {
            return String::new();
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for style in &self.styles[span.start..end] {
            *counts.entry(style.as_str()).or_default() += 1;
        }

        let mut best: Option<(&str, usize)> = None;
        for style in &self.styles[span.start..end] {
            let count = counts[style.as_str()];
            if best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((style.as_str(), count));
            }
        }
        best.map(|(style, _)| style.to_string()).unwrap_or_default()
    }
}

/// A loaded subtitle track: its cues and its tokenization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub cues: Vec<Cue>,
    pub tokens: TokenStream,
}

impl SubtitleTrack {
    pub fn new(cues: Vec<Cue>, tokens: TokenStream) -> Self {
        Self { cues, tokens }
    }

    /// Total duration covered by the cues in milliseconds
    pub fn duration_ms(&self) -> u64 {
        let first = self.cues.iter().map(|c| c.start).min().unwrap_or(0);
        let last = self.cues.iter().map(|c| c.end).max().unwrap_or(0);
        last.saturating_sub(first)
    }
}
