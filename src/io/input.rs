use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::{Cue, SubtitleTrack, TokenStream};

/// On-disk layout of a track: cues plus the flattened token stream
#[derive(Debug, Deserialize)]
struct TrackFile {
    cues: Vec<Cue>,
    #[serde(default)]
    tokens: Vec<String>,
    #[serde(default)]
    styles: Vec<String>,
    #[serde(default)]
    separator: String,
}

impl From<TrackFile> for SubtitleTrack {
    fn from(file: TrackFile) -> Self {
        let tokens = TokenStream::new(file.tokens, file.styles).with_separator(file.separator);
        SubtitleTrack::new(file.cues, tokens)
    }
}

/// Parse a track JSON file into a SubtitleTrack
pub fn parse_track_file(path: &Path) -> Result<SubtitleTrack> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    parse_track_json(&content).with_context(|| format!("Invalid track file: {:?}", path))
}

/// Parse a track JSON string
///
/// Cues are accepted in any order and come back sorted by time. A cue whose token span
/// points past the end of the token stream is rejected.
pub fn parse_track_json(json: &str) -> Result<SubtitleTrack> {
    let file: TrackFile = serde_json::from_str(json).context("Failed to parse track JSON")?;
    let mut track = SubtitleTrack::from(file);
    track.tokens.validate()?;

    for (index, cue) in track.cues.iter().enumerate() {
        if cue.end < cue.start {
            anyhow::bail!("cue {} ends ({}) before it starts ({})", index, cue.end, cue.start);
        }
        if cue.token_span.start > cue.token_span.end || cue.token_span.end > track.tokens.len() {
            anyhow::bail!(
                "cue {} has token span {}..{} outside a stream of {} tokens",
                index,
                cue.token_span.start,
                cue.token_span.end,
                track.tokens.len()
            );
        }
    }

    track
        .cues
        .sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
    Ok(track)
}
