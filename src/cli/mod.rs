use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "karaoke",
    about = "Karaoke Forge - turn videos into karaoke videos with synced lyrics",
    version,
    long_about = "Downloads the audio of a video, removes the vocals, times the lyrics against a transcription and renders a karaoke video with the lyrics burned in. Requires yt-dlp, ffmpeg and whisper; spleeter is used for vocal removal when installed."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a karaoke video from a URL or local file
    Create {
        /// Video URL or media file path (YouTube and anything yt-dlp supports, direct media URLs, local files)
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Lyrics text to show instead of the transcription
        #[arg(long, value_name = "TEXT", conflicts_with = "lyrics_file")]
        lyrics: Option<String>,

        /// Read lyrics from a file
        #[arg(long, value_name = "FILE")]
        lyrics_file: Option<PathBuf>,

        /// Song title, used for the output file name
        #[arg(short, long)]
        title: Option<String>,

        /// Song artist
        #[arg(short, long)]
        artist: Option<String>,

        /// Output format for the final job status
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Create karaoke videos for every request in a YAML or JSON file
    Batch {
        /// File containing a list of requests ({source_url, lyrics?, title?, artist?})
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format for the final job statuses
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Check that the external tools are installed
    Check,

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Human readable summary
    Text,
    /// JSON job status
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
