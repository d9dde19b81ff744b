use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::{RenderConfig, ToolsConfig};
use crate::tools::{expect_output, ToolCommand, ToolError};
use crate::Result;

/// Bitrate used for every normalized audio artifact
pub const AUDIO_BITRATE: &str = "192k";

/// Everything needed to compose the final karaoke video
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub audio_path: PathBuf,
    pub subtitle_path: PathBuf,
    pub output_path: PathBuf,
    pub duration_seconds: f64,
}

/// Audio/video operations backed by a media toolkit
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    /// Transcode any media file into the standard mp3 audio format
    async fn transcode_audio(&self, source: &Path, target: &Path) -> Result<PathBuf>;

    /// Probe the duration of a media file in seconds
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    /// Mux a solid background, the audio track and burned-in subtitles
    async fn compose_video(&self, composition: &Composition) -> Result<PathBuf>;
}

/// ffmpeg/ffprobe based [`MediaEncoder`]
pub struct Ffmpeg {
    ffmpeg_path: String,
    ffprobe_path: String,
    render: RenderConfig,
}

impl Ffmpeg {
    pub fn new(tools: &ToolsConfig, render: RenderConfig) -> Self {
        Self {
            ffmpeg_path: tools.ffmpeg.clone(),
            ffprobe_path: tools.ffprobe.clone(),
            render,
        }
    }

    /// Build the ffmpeg arguments for a composition
    pub fn compose_args(&self, composition: &Composition) -> Vec<String> {
        // The color source must be at least as long as the audio, -shortest trims it
        let background = format!(
            "color=c={}:s={}:d={}",
            self.render.background_color,
            self.render.resolution,
            composition.duration_seconds.ceil() as u64 + 1
        );

        vec![
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            background,
            "-i".to_string(),
            composition.audio_path.to_string_lossy().into_owned(),
            "-vf".to_string(),
            format!("subtitles={}", escape_filter_path(&composition.subtitle_path)),
            "-c:v".to_string(),
            self.render.video_codec.clone(),
            "-c:a".to_string(),
            self.render.audio_codec.clone(),
            "-shortest".to_string(),
            "-y".to_string(),
            composition.output_path.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl MediaEncoder for Ffmpeg {
    async fn transcode_audio(&self, source: &Path, target: &Path) -> Result<PathBuf> {
        tracing::debug!("Transcoding {} -> {}", source.display(), target.display());

        ToolCommand::new(&self.ffmpeg_path)
            .arg("-i")
            .arg(source)
            .args(["-vn", "-acodec", "libmp3lame", "-ab", AUDIO_BITRATE, "-y"])
            .arg(target)
            .run()
            .await?;

        Ok(expect_output(target)?)
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let stdout = ToolCommand::new(&self.ffprobe_path)
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
            .arg(path)
            .run_stdout()
            .await?;

        Ok(parse_probe_duration(&stdout)?)
    }

    async fn compose_video(&self, composition: &Composition) -> Result<PathBuf> {
        tracing::debug!(
            output = %composition.output_path.display(),
            duration = composition.duration_seconds,
            "Composing karaoke video"
        );

        ToolCommand::new(&self.ffmpeg_path)
            .args(self.compose_args(composition))
            .run()
            .await?;

        Ok(expect_output(&composition.output_path)?)
    }
}

/// Extract `format.duration` from ffprobe JSON output
pub fn parse_probe_duration(json: &str) -> std::result::Result<f64, ToolError> {
    let parse_error = |reason: String| ToolError::Parse {
        program: "ffprobe".to_string(),
        reason,
    };

    let info: serde_json::Value = serde_json::from_str(json).map_err(|e| parse_error(e.to_string()))?;

    // ffprobe reports duration as a string, be lenient about numbers too
    let duration = match &info["format"]["duration"] {
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
    .ok_or_else(|| parse_error("missing format.duration".to_string()))?;

    if !duration.is_finite() || duration <= 0.0 {
        return Err(parse_error(format!("invalid duration {}", duration)));
    }

    Ok(duration)
}

/// Escape a path for use inside an ffmpeg filter argument
fn escape_filter_path(path: &Path) -> String {
    let mut escaped = String::new();
    for c in path.to_string_lossy().chars() {
        match c {
            '\\' | ':' | '\'' | ',' | '[' | ']' | ';' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_duration() {
        let json = r#"{"format": {"duration": "183.456000"}}"#;
        assert!((parse_probe_duration(json).unwrap() - 183.456).abs() < 1e-9);

        assert!(parse_probe_duration(r#"{"format": {}}"#).is_err());
        assert!(parse_probe_duration(r#"{"format": {"duration": "0"}}"#).is_err());
        assert!(parse_probe_duration("not json").is_err());
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(
            escape_filter_path(Path::new("/tmp/job:1/lyrics.ass")),
            "/tmp/job\\:1/lyrics.ass"
        );
        assert_eq!(escape_filter_path(Path::new("it's.ass")), "it\\'s.ass");
    }

    #[test]
    fn test_compose_args_match_audio_duration() {
        let ffmpeg = Ffmpeg::new(&ToolsConfig::default(), RenderConfig::default());
        let composition = Composition {
            audio_path: PathBuf::from("/work/instrumental.mp3"),
            subtitle_path: PathBuf::from("/work/lyrics.ass"),
            output_path: PathBuf::from("/work/out.mp4"),
            duration_seconds: 182.4,
        };

        let args = ffmpeg.compose_args(&composition);
        assert!(args.contains(&"color=c=black:s=1920x1080:d=184".to_string()));
        assert!(args.contains(&"subtitles=/work/lyrics.ass".to_string()));
        assert!(args.contains(&"-shortest".to_string()));
        assert_eq!(args.last().unwrap(), "/work/out.mp4");
    }
}
