//! Advanced SubStation Alpha subtitle authoring.

use std::fmt::Write as _;
use std::path::Path;

use crate::config::SubtitleStyle;
use crate::transcribe::TimedSegment;
use crate::Result;

const STYLE_FORMAT: &str = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";
const EVENT_FORMAT: &str = "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

/// One subtitle event, times in centiseconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub start_cs: u64,
    pub end_cs: u64,
    pub text: String,
}

/// Map timed segments to captions, dropping segments without text
pub fn build_captions(segments: &[TimedSegment]) -> Vec<Caption> {
    segments
        .iter()
        .filter_map(|segment| {
            let text = segment.text.trim();
            if text.is_empty() {
                return None;
            }

            let start_cs = seconds_to_centis(segment.start_seconds);
            let end_cs = seconds_to_centis(segment.end_seconds).max(start_cs);

            Some(Caption {
                start_cs,
                end_cs,
                text: text.to_string(),
            })
        })
        .collect()
}

fn seconds_to_centis(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 100.0).round() as u64
    } else {
        0
    }
}

/// Format centiseconds as an ASS timestamp (H:MM:SS.cc)
pub fn format_ass_time(centis: u64) -> String {
    let cs = centis % 100;
    let total_seconds = centis / 100;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}:{:02}:{:02}.{:02}", hours, minutes, seconds, cs)
}

/// Keep caption text from being read as override tags or line breaks
fn escape_text(text: &str) -> String {
    text.replace('{', "(")
        .replace('}', ")")
        .replace("\r\n", "\\N")
        .replace('\n', "\\N")
}

/// Render a complete ASS document
pub fn render_ass(captions: &[Caption], style: &SubtitleStyle, play_res: (u32, u32)) -> String {
    let mut doc = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(doc, "[Script Info]");
    let _ = writeln!(doc, "ScriptType: v4.00+");
    let _ = writeln!(doc, "PlayResX: {}", play_res.0);
    let _ = writeln!(doc, "PlayResY: {}", play_res.1);
    let _ = writeln!(doc, "WrapStyle: 0");
    let _ = writeln!(doc, "ScaledBorderAndShadow: yes");
    let _ = writeln!(doc);

    let _ = writeln!(doc, "[V4+ Styles]");
    let _ = writeln!(doc, "{}", STYLE_FORMAT);
    let _ = writeln!(
        doc,
        "Style: Default,{},{},{},&H000000FF,&H00000000,&H00000000,0,0,0,0,100,100,0,0,1,{},{},{},10,10,40,1",
        style.font_name, style.font_size, style.primary_color, style.outline, style.shadow, style.alignment
    );
    let _ = writeln!(doc);

    let _ = writeln!(doc, "[Events]");
    let _ = writeln!(doc, "{}", EVENT_FORMAT);
    for caption in captions {
        let _ = writeln!(
            doc,
            "Dialogue: 0,{},{},Default,,0,0,0,,{}",
            format_ass_time(caption.start_cs),
            format_ass_time(caption.end_cs),
            escape_text(&caption.text)
        );
    }

    doc
}

/// Write captions to an ASS file
pub fn write_ass(path: &Path, captions: &[Caption], style: &SubtitleStyle, play_res: (u32, u32)) -> Result<()> {
    fs_err::write(path, render_ass(captions, style, play_res))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_segments_are_dropped() {
        let segments = vec![
            TimedSegment::new(0.0, 2.0, "hello"),
            TimedSegment::new(2.0, 2.0, ""),
            TimedSegment::new(4.5, 6.0, "world"),
        ];

        let captions = build_captions(&segments);

        assert_eq!(
            captions,
            vec![
                Caption {
                    start_cs: 0,
                    end_cs: 200,
                    text: "hello".to_string()
                },
                Caption {
                    start_cs: 450,
                    end_cs: 600,
                    text: "world".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_whitespace_only_and_inverted_segments() {
        let segments = vec![
            TimedSegment::new(1.0, 3.0, "   "),
            TimedSegment::new(5.0, 4.0, " late "),
        ];

        let captions = build_captions(&segments);
        assert_eq!(captions.len(), 1);
        assert_eq!(captions[0].text, "late");
        assert_eq!((captions[0].start_cs, captions[0].end_cs), (500, 500));
    }

    #[test]
    fn test_format_ass_time() {
        assert_eq!(format_ass_time(0), "0:00:00.00");
        assert_eq!(format_ass_time(450), "0:00:04.50");
        assert_eq!(format_ass_time(366_125), "1:01:01.25");
    }

    #[test]
    fn test_render_ass_document() {
        let captions = vec![Caption {
            start_cs: 450,
            end_cs: 600,
            text: "line one\nline {two}".to_string(),
        }];

        let doc = render_ass(&captions, &SubtitleStyle::default(), (1920, 1080));

        assert!(doc.contains("PlayResX: 1920"));
        assert!(doc.contains("Style: Default,Arial,48,&H00FFFFFF,"));
        assert!(doc.contains(",1,2,2,2,10,10,40,1"));
        assert!(doc.contains("Dialogue: 0,0:00:04.50,0:00:06.00,Default,,0,0,0,,line one\\Nline (two)"));
    }
}
