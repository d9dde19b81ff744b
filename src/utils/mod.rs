use crate::config::ToolsConfig;
use crate::tools;

/// Title used when the request does not name the song
pub const DEFAULT_TITLE: &str = "Karaoke Song";

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Sanitize a title for use in a file name.
///
/// Whitespace becomes `_`, anything other than alphanumerics, `-`, `_` and `.`
/// becomes `_`. Leading and trailing dots are stripped so the result is never hidden.
pub fn sanitize_filename(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            c if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' => c,
            _ => '_',
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

/// File name of the rendered karaoke video for a title
pub fn karaoke_filename(title: Option<&str>) -> String {
    let title = title
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(DEFAULT_TITLE);

    let sanitized = sanitize_filename(title);
    let sanitized = if sanitized.is_empty() {
        sanitize_filename(DEFAULT_TITLE)
    } else {
        sanitized
    };

    format!("{}_karaoke.mp4", sanitized)
}

/// Check if the current environment has required tools
pub async fn check_dependencies(tools_config: &ToolsConfig) -> Vec<String> {
    let mut missing = Vec::new();

    if !tools::is_available(&tools_config.yt_dlp, "--version").await {
        missing.push(format!("{} - required for downloading videos", tools_config.yt_dlp));
    }

    if !tools::is_available(&tools_config.ffmpeg, "-version").await {
        missing.push(format!("{} - required for audio and video processing", tools_config.ffmpeg));
    }

    if !tools::is_available(&tools_config.ffprobe, "-version").await {
        missing.push(format!("{} - required for probing audio duration", tools_config.ffprobe));
    }

    if !tools::is_available(&tools_config.whisper, "--help").await {
        missing.push(format!("{} - required for lyrics timing (openai-whisper)", tools_config.whisper));
    }

    if !tools::is_available(&tools_config.spleeter, "--help").await {
        missing.push(format!(
            "{} - optional, vocals are kept when it is missing",
            tools_config.spleeter
        ));
    }

    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m 1s");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("My Song"), "My_Song");
        assert_eq!(sanitize_filename("AC/DC: Back in Black?"), "AC_DC__Back_in_Black_");
        assert_eq!(sanitize_filename("  ..hidden.  "), "hidden");
        assert_eq!(sanitize_filename("Café del Mar"), "Café_del_Mar");
    }

    #[test]
    fn test_karaoke_filename() {
        assert_eq!(karaoke_filename(Some("My Song")), "My_Song_karaoke.mp4");
        assert_eq!(karaoke_filename(None), "Karaoke_Song_karaoke.mp4");
        assert_eq!(karaoke_filename(Some("   ")), "Karaoke_Song_karaoke.mp4");
        assert_eq!(karaoke_filename(Some("...")), "Karaoke_Song_karaoke.mp4");
    }
}
