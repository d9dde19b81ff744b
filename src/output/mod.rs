use anyhow::{Context, Result};
use console::style;

use crate::cli::OutputFormat;
use crate::jobs::{JobStatus, JobView};
use crate::utils::format_file_size;

pub mod ass;

/// Format a job view for the console
pub fn format_job_view(view: &JobView, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_as_text(view)),
        OutputFormat::Json => serde_json::to_string_pretty(view).context("Failed to serialize job"),
    }
}

/// Print a job view to stdout
pub fn print_job_view(view: &JobView, format: &OutputFormat) -> Result<()> {
    println!("{}", format_job_view(view, format)?);
    Ok(())
}

fn format_as_text(view: &JobView) -> String {
    let status = match view.status {
        JobStatus::Completed => style(view.status.as_str()).green().bold(),
        JobStatus::Failed => style(view.status.as_str()).red().bold(),
        _ => style(view.status.as_str()).yellow(),
    };

    let mut lines = vec![
        format!("Job:      {}", view.job_id),
        format!("Source:   {}", view.source_url),
    ];

    if let Some(title) = &view.title {
        lines.push(format!("Title:    {}", title));
    }

    lines.push(format!("Status:   {} ({}%)", status, view.progress));
    lines.push(format!("Message:  {}", view.message));

    if let Some(location) = &view.result_location {
        match fs_err::metadata(location) {
            Ok(metadata) => lines.push(format!(
                "Video:    {} ({})",
                style(location).cyan(),
                format_file_size(metadata.len())
            )),
            Err(_) => lines.push(format!("Video:    {}", style(location).cyan())),
        }
    }

    if let Some(error) = &view.error {
        match view.error_kind {
            Some(kind) => lines.push(format!("Error:    [{}] {}", kind, error)),
            None => lines.push(format!("Error:    {}", error)),
        }
    }

    for note in &view.notes {
        lines.push(format!("Note:     {}", note));
    }

    lines.join("\n")
}
