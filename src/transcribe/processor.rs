use anyhow::{Context, Result};
use serde::Deserialize;

use super::{LyricsTiming, TimedSegment, WordTiming};

/// Whisper JSON output format
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    words: Vec<WhisperWord>,
}

#[derive(Debug, Deserialize)]
struct WhisperWord {
    word: String,
    start: f64,
    end: f64,
    probability: Option<f64>,
}

/// Convert whisper's JSON output into [`LyricsTiming`]
pub fn parse_whisper_json(json: &str) -> Result<LyricsTiming> {
    let output: WhisperOutput = serde_json::from_str(json).context("Failed to parse whisper JSON")?;

    let mut segments = Vec::with_capacity(output.segments.len());
    let mut words = Vec::new();

    for segment in output.segments {
        if !(segment.start.is_finite() && segment.end.is_finite()) || segment.start < 0.0 {
            tracing::warn!("Skipping segment with invalid timing: {:?}", segment.text);
            continue;
        }

        words.extend(segment.words.into_iter().map(|word| WordTiming {
            word: word.word.trim().to_string(),
            start_seconds: word.start,
            end_seconds: word.end,
            probability: word.probability,
        }));

        segments.push(TimedSegment {
            start_seconds: segment.start,
            end_seconds: segment.end.max(segment.start),
            text: segment.text.trim().to_string(),
        });
    }

    // Whisper emits segments in order, but keep the invariant explicit
    segments.sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));

    Ok(LyricsTiming {
        text: output.text.trim().to_string(),
        segments,
        words,
        language: output.language,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "text": " Hello there. General Kenobi.",
        "language": "en",
        "segments": [
            {"id": 0, "seek": 0, "start": 0.0, "end": 2.5, "text": " Hello there.",
             "words": [
                {"word": " Hello", "start": 0.0, "end": 0.8, "probability": 0.98},
                {"word": " there.", "start": 0.9, "end": 2.5, "probability": 0.91}
             ]},
            {"id": 1, "seek": 250, "start": 3.0, "end": 5.0, "text": " General Kenobi."}
        ]
    }"#;

    #[test]
    fn test_parse_whisper_json() {
        let timing = parse_whisper_json(SAMPLE).unwrap();

        assert_eq!(timing.text, "Hello there. General Kenobi.");
        assert_eq!(timing.language.as_deref(), Some("en"));
        assert_eq!(
            timing.segments,
            vec![
                TimedSegment::new(0.0, 2.5, "Hello there."),
                TimedSegment::new(3.0, 5.0, "General Kenobi."),
            ]
        );
        assert_eq!(timing.words.len(), 2);
        assert_eq!(timing.words[1].word, "there.");
        assert_eq!(timing.words[1].probability, Some(0.91));
    }

    #[test]
    fn test_parse_empty_transcription() {
        let timing = parse_whisper_json(r#"{"text": "", "segments": []}"#).unwrap();
        assert!(timing.segments.is_empty());
        assert!(timing.text.is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_whisper_json("{not json").is_err());
    }
}
