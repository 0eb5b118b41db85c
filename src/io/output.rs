use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Segment, SubtitleTrack};
use crate::pipeline::{MergeOutcome, MergeStats};

/// Machine-readable output format
#[derive(Debug, Clone, Serialize)]
pub struct MachineOutput {
    /// Merged segments in time order
    pub segments: Vec<Segment>,
    /// Metadata about the run
    pub metadata: MergeMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeMetadata {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub encoder: String,
    pub primary_cues: usize,
    pub secondary_cues: usize,
    pub secondary_tokens: usize,
    pub total_segments: usize,
    pub duration_ms: u64,
    pub cancelled: bool,
    #[serde(flatten)]
    pub stats: MergeStats,
}

impl MergeMetadata {
    pub fn new(
        primary: &SubtitleTrack,
        secondary: &SubtitleTrack,
        outcome: &MergeOutcome,
        encoder: &str,
    ) -> Self {
        let duration_ms = match (outcome.segments.first(), outcome.segments.iter().map(|s| s.end).max()) {
            (Some(first), Some(last)) => last.saturating_sub(first.start),
            _ => 0,
        };

        Self {
            run_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            encoder: encoder.to_string(),
            primary_cues: primary.cues.len(),
            secondary_cues: secondary.cues.len(),
            secondary_tokens: secondary.tokens.len(),
            total_segments: outcome.segments.len(),
            duration_ms,
            cancelled: outcome.cancelled,
            stats: outcome.stats.clone(),
        }
    }
}

impl MachineOutput {
    pub fn new(segments: Vec<Segment>, metadata: MergeMetadata) -> Self {
        Self { segments, metadata }
    }

    /// Write to a JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }
}

/// Human-readable listing of merged segments
pub struct HumanOutput<'a> {
    segments: &'a [Segment],
}

impl<'a> HumanOutput<'a> {
    pub fn new(segments: &'a [Segment]) -> Self {
        Self { segments }
    }

    /// One block per segment: timing and score, then the primary and secondary lines
    pub fn format(&self) -> String {
        let mut output = String::new();

        for segment in self.segments {
            output.push_str(&format!(
                "[{} --> {}] ({:.2})\n",
                format_timestamp(segment.start),
                format_timestamp(segment.end),
                segment.score
            ));
            for text in [&segment.primary_text, &segment.secondary_text] {
                if !text.is_empty() {
                    output.push_str(&text.replace("\\N", "\n"));
                    output.push('\n');
                }
            }
            output.push('\n');
        }

        output
    }

    /// Write to a text file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        write!(file, "{}", self.format())?;
        Ok(())
    }
}

/// Format milliseconds as MM:SS.mmm
fn format_timestamp(ms: u64) -> String {
    let seconds = ms / 1000;
    let millis = ms % 1000;
    let minutes = seconds / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}.{:03}", minutes, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cue, TokenSpan, TokenStream};

    fn segments() -> Vec<Segment> {
        vec![
            Segment {
                start: 0,
                end: 1000,
                primary_text: "Hello".to_string(),
                secondary_text: "Bonjour".to_string(),
                secondary_token_span: TokenSpan::new(0, 1),
                score: 1.0,
                ..Default::default()
            },
            Segment {
                start: 1000,
                end: 2500,
                primary_text: "big\\Nworld".to_string(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "00:00.000");
        assert_eq!(format_timestamp(1500), "00:01.500");
        assert_eq!(format_timestamp(65_000), "01:05.000");
        assert_eq!(format_timestamp(3_661_500), "61:01.500");
    }

    #[test]
    fn test_human_format() {
        let segments = segments();
        let text = HumanOutput::new(&segments).format();

        assert_eq!(
            text,
            "[00:00.000 --> 00:01.000] (1.00)\nHello\nBonjour\n\n\
             [00:01.000 --> 00:02.500] (0.00)\nbig\nworld\n\n"
        );
    }

    #[test]
    fn test_machine_output_json() {
        let primary = SubtitleTrack::new(vec![Cue::new(0, 1000, "Hello")], TokenStream::default());
        let secondary = SubtitleTrack::new(vec![], TokenStream::from_words(&["Bonjour"]));
        let outcome = MergeOutcome {
            segments: segments(),
            stats: MergeStats {
                segments_aligned: 1,
                ..Default::default()
            },
            cancelled: false,
        };
        let metadata = MergeMetadata::new(&primary, &secondary, &outcome, "lookup");
        let output = MachineOutput::new(outcome.segments.clone(), metadata);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.json");
        output.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["segments"].as_array().unwrap().len(), 2);
        assert_eq!(value["segments"][0]["secondary_text"], "Bonjour");
        assert_eq!(value["metadata"]["segments_aligned"], 1);
        assert_eq!(value["metadata"]["duration_ms"], 2500);
        assert_eq!(value["metadata"]["encoder"], "lookup");
        assert_eq!(value["metadata"]["run_id"].as_str().unwrap().len(), 36);
    }
}
