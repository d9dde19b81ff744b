//! Pairing caller-supplied lyrics with transcribed timing.
//!
//! The supplied text is split into words and handed out to the transcribed
//! segments in proportion to how many words the engine heard in each segment.
//! When the engine heard no words at all, segment duration is the weight
//! instead. Timing always comes from the transcription; the supplied words
//! replace the segment text.

use super::{LyricsTiming, TimedSegment};

/// Replace transcribed segment text with `supplied` lyrics, keeping the timing
pub fn pair_supplied_lyrics(supplied: &str, transcript: LyricsTiming) -> LyricsTiming {
    let supplied_words: Vec<&str> = supplied.split_whitespace().collect();
    if supplied_words.is_empty() {
        return transcript;
    }

    if transcript.segments.is_empty() {
        tracing::warn!("Transcription produced no segments, supplied lyrics cannot be timed");
        return LyricsTiming {
            text: supplied.trim().to_string(),
            segments: Vec::new(),
            words: Vec::new(),
            language: transcript.language,
        };
    }

    let weights = segment_weights(&transcript.segments);
    let boundaries = proportional_boundaries(&weights, supplied_words.len());

    let mut start = 0;
    let segments = transcript
        .segments
        .iter()
        .zip(boundaries)
        .map(|(segment, end)| {
            let text = supplied_words[start..end].join(" ");
            start = end;
            TimedSegment::new(segment.start_seconds, segment.end_seconds, text)
        })
        .collect();

    LyricsTiming {
        text: supplied.trim().to_string(),
        segments,
        // Word timings belong to the transcribed words, not the supplied ones
        words: Vec::new(),
        language: transcript.language,
    }
}

/// Weight of each segment: transcribed word count, falling back to duration
fn segment_weights(segments: &[TimedSegment]) -> Vec<f64> {
    let word_counts: Vec<f64> = segments
        .iter()
        .map(|segment| segment.text.split_whitespace().count() as f64)
        .collect();

    if word_counts.iter().sum::<f64>() > 0.0 {
        return word_counts;
    }

    let durations: Vec<f64> = segments.iter().map(TimedSegment::duration).collect();
    if durations.iter().sum::<f64>() > 0.0 {
        return durations;
    }

    vec![1.0; segments.len()]
}

/// Exclusive end index into the word list for every segment
fn proportional_boundaries(weights: &[f64], word_count: usize) -> Vec<usize> {
    let total: f64 = weights.iter().sum();
    let mut cumulative = 0.0;
    let mut previous = 0;

    let mut boundaries: Vec<usize> = weights
        .iter()
        .map(|weight| {
            cumulative += weight;
            let end = ((cumulative / total) * word_count as f64).round() as usize;
            previous = end.clamp(previous, word_count);
            previous
        })
        .collect();

    // Rounding must never drop trailing words
    if let Some(last) = boundaries.last_mut() {
        *last = word_count;
    }

    boundaries
}
