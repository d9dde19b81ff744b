use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,

    /// External tool locations
    pub tools: ToolsConfig,

    /// Vocal separation settings
    pub separation: SeparationConfig,

    /// Transcription settings
    pub transcription: TranscriptionConfig,

    /// Video rendering settings
    pub render: RenderConfig,

    /// Publishing settings
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root directory for per-job working directories
    pub work_dir: Option<PathBuf>,

    /// Maximum number of jobs running the pipeline at the same time
    pub max_concurrent_jobs: usize,

    /// Maximum number of unfinished jobs accepted before submissions are rejected
    pub max_queued_jobs: usize,

    /// Status polling interval in milliseconds
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub yt_dlp: String,
    pub ffmpeg: String,
    pub ffprobe: String,
    pub spleeter: String,
    pub whisper: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    /// Separation model passed to the engine
    pub model: String,

    /// Keep the original audio when the separation engine is not installed
    pub allow_passthrough: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Whisper model name
    pub model: String,

    /// Language code (auto-detect if not specified)
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output resolution as WIDTHxHEIGHT
    pub resolution: String,

    /// Background color understood by the ffmpeg color source
    pub background_color: String,

    pub video_codec: String,
    pub audio_codec: String,

    /// Caption style
    pub subtitle: SubtitleStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubtitleStyle {
    pub font_name: String,
    pub font_size: u32,

    /// ASS color in &HAABBGGRR form
    pub primary_color: String,
    pub outline: u32,
    pub shadow: u32,

    /// Numpad-style ASS alignment
    pub alignment: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PublishConfig {
    /// Copy finished videos into this directory
    pub output_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            max_concurrent_jobs: 3,
            max_queued_jobs: 32,
            poll_interval_ms: 500,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            spleeter: "spleeter".to_string(),
            whisper: "whisper".to_string(),
        }
    }
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            model: "spleeter:2stems-16kHz".to_string(),
            allow_passthrough: true,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: "base".to_string(),
            language: None,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            resolution: "1920x1080".to_string(),
            background_color: "black".to_string(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            subtitle: SubtitleStyle::default(),
        }
    }
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_name: "Arial".to_string(),
            font_size: 48,
            primary_color: "&H00FFFFFF".to_string(),
            outline: 2,
            shadow: 2,
            alignment: 2,
        }
    }
}

impl RenderConfig {
    /// Parse the configured resolution into (width, height)
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        let (width, height) = self
            .resolution
            .split_once('x')
            .with_context(|| format!("Invalid resolution '{}', expected WIDTHxHEIGHT", self.resolution))?;

        let width: u32 = width.trim().parse().context("Invalid resolution width")?;
        let height: u32 = height.trim().parse().context("Invalid resolution height")?;

        if width == 0 || height == 0 {
            anyhow::bail!("Resolution must be non-zero: {}", self.resolution);
        }

        Ok((width, height))
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Load and validate configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("karaoke-forge").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.app.max_concurrent_jobs == 0 {
            anyhow::bail!("app.max_concurrent_jobs must be at least 1");
        }

        if self.app.max_queued_jobs < self.app.max_concurrent_jobs {
            anyhow::bail!("app.max_queued_jobs must not be smaller than app.max_concurrent_jobs");
        }

        self.render.dimensions()?;

        Ok(())
    }

    /// Root directory holding one working directory per job
    pub fn work_dir(&self) -> PathBuf {
        self.app
            .work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("karaoke-forge"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.app.poll_interval_ms.max(10))
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Work Dir: {}", self.work_dir().display());
        println!("  Max Concurrent Jobs: {}", self.app.max_concurrent_jobs);
        println!("  Max Queued Jobs: {}", self.app.max_queued_jobs);
        println!("  Separation Model: {}", self.separation.model);
        println!("  Passthrough Without Separator: {}", self.separation.allow_passthrough);
        println!("  Whisper Model: {}", self.transcription.model);
        if let Some(language) = &self.transcription.language {
            println!("  Language: {}", language);
        }
        println!("  Resolution: {}", self.render.resolution);
        if let Some(dir) = &self.publish.output_dir {
            println!("  Publish Dir: {}", dir.display());
        }
    }
}
