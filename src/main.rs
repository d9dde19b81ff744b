use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use karaoke_forge::extractors::ExtractorRegistry;
use karaoke_forge::output;
use karaoke_forge::utils;
use karaoke_forge::{
    Cli, Commands, Config, JobId, JobInput, JobRegistry, JobStatus, JobView, KaraokeError,
    KaraokePipeline, Orchestrator, OutputFormat,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "karaoke_forge=debug"
    } else {
        "karaoke_forge=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().await?;

    match cli.command {
        Commands::Create {
            source,
            lyrics,
            lyrics_file,
            title,
            artist,
            format,
        } => {
            warn_missing_tools(&config).await;

            let lyrics = match lyrics_file {
                Some(path) => Some(
                    fs_err::read_to_string(&path)
                        .with_context(|| format!("Failed to read lyrics from {}", path.display()))?,
                ),
                None => lyrics,
            };
            let input = JobInput {
                source_url: source,
                lyrics,
                title,
                artist,
            };

            let orchestrator = build_orchestrator(&config);
            let id = orchestrator.submit(input)?;
            tracing::info!("Started karaoke job {}", id);

            let view = if cli.quiet {
                orchestrator.wait(&id).await?
            } else {
                follow_job(&orchestrator, &id, config.poll_interval()).await?
            };

            output::print_job_view(&view, &format)?;
            if view.status == JobStatus::Failed {
                anyhow::bail!("Karaoke job {} failed", view.job_id);
            }
        }
        Commands::Batch { file, format } => {
            warn_missing_tools(&config).await;

            let requests = load_requests(&file)?;
            if requests.is_empty() {
                println!("No requests found in {}", file.display());
                return Ok(());
            }

            let orchestrator = build_orchestrator(&config);
            let views = run_batch(&orchestrator, requests, cli.quiet, config.poll_interval()).await?;

            for view in &views {
                output::print_job_view(view, &format)?;
                if matches!(format, OutputFormat::Text) {
                    println!();
                }
            }

            let failed = views.iter().filter(|view| view.status == JobStatus::Failed).count();
            println!(
                "Batch finished: {} completed, {} failed",
                views.len() - failed,
                failed
            );
            if failed > 0 {
                anyhow::bail!("{} of {} karaoke jobs failed", failed, views.len());
            }
        }
        Commands::Check => {
            let extractors = ExtractorRegistry::new(&config.tools);
            println!("Supported sources: {}", extractors.list_platforms().join(", "));

            let missing = utils::check_dependencies(&config.tools).await;
            if missing.is_empty() {
                println!("All external tools found.");
            } else {
                println!("Missing tools:");
                for tool in missing {
                    println!("   • {}", tool);
                }
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
                println!("Edit it to change tool paths, models and render settings.");
            }
        }
    }

    Ok(())
}

fn build_orchestrator(config: &Config) -> Orchestrator {
    let pipeline = Arc::new(KaraokePipeline::from_config(config));
    Orchestrator::new(JobRegistry::new(), pipeline, &config.app)
}

// Missing tools only surface as job failures, so warn early (non-fatal)
async fn warn_missing_tools(config: &Config) {
    let missing = utils::check_dependencies(&config.tools).await;
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}

fn progress_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")?)
}

fn update_bar(bar: &ProgressBar, view: &JobView) {
    bar.set_position(u64::from(view.progress));
    bar.set_message(view.message.clone());
}

/// Poll a job with a progress bar until it finishes
async fn follow_job(
    orchestrator: &Orchestrator,
    id: &JobId,
    poll_interval: std::time::Duration,
) -> Result<JobView> {
    let bar = ProgressBar::new(100);
    bar.set_style(progress_style()?);

    loop {
        let view = orchestrator.status(id)?;
        update_bar(&bar, &view);

        if view.is_terminal() {
            bar.finish_with_message(view.status.to_string());
            return Ok(view);
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Read a list of requests; YAML parsing also accepts JSON
fn load_requests(path: &Path) -> Result<Vec<JobInput>> {
    let content = fs_err::read_to_string(path)?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse requests in {}", path.display()))
}

/// Submit every request, holding back submissions while the queue is full
async fn run_batch(
    orchestrator: &Orchestrator,
    requests: Vec<JobInput>,
    quiet: bool,
    poll_interval: std::time::Duration,
) -> Result<Vec<JobView>> {
    let multi = MultiProgress::new();
    let style = progress_style()?;

    let mut waiting: VecDeque<JobInput> = requests.into();
    let mut submitted: Vec<(JobId, ProgressBar)> = Vec::new();

    loop {
        while let Some(input) = waiting.pop_front() {
            match orchestrator.submit(input.clone()) {
                Ok(id) => {
                    let bar = if quiet {
                        ProgressBar::hidden()
                    } else {
                        multi.add(ProgressBar::new(100))
                    };
                    bar.set_style(style.clone());
                    submitted.push((id, bar));
                }
                Err(KaraokeError::QueueFull(limit)) => {
                    tracing::debug!("Queue full ({} jobs), holding back remaining requests", limit);
                    waiting.push_front(input);
                    break;
                }
                Err(err) => {
                    tracing::error!("Skipping request for {}: {}", input.source_url, err);
                }
            }
        }

        let mut finished = 0;
        for (id, bar) in &submitted {
            let view = orchestrator.status(id)?;
            update_bar(bar, &view);
            if view.is_terminal() {
                if !bar.is_finished() {
                    bar.finish_with_message(view.status.to_string());
                }
                finished += 1;
            }
        }

        if waiting.is_empty() && finished == submitted.len() {
            break;
        }
        tokio::time::sleep(poll_interval).await;
    }

    submitted
        .iter()
        .map(|(id, _)| orchestrator.status(id).map_err(anyhow::Error::from))
        .collect()
}
