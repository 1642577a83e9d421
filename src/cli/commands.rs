use anyhow::{Result, Context};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, error};

use crate::cli::config::ProberConfig;
use crate::cli::ScrapeArgs;
use crate::crawler::{RunConfig, ScrapeController, ScrapeRun};
use crate::error::ScrapeError;
use crate::fetch::HttpFetcher;
use crate::storage::{archive_file_name, bundle_entries, ArchiveWriter};
use crate::utils::LogProgress;

/// Run a scrape and write the archive
pub async fn scrape(args: ScrapeArgs) -> Result<ExitCode> {
    let mut config = ProberConfig::load(&args.profile)
        .context(format!("Failed to load profile: {}", args.profile))?;

    // Override configuration with command line parameters if provided
    if let Some(c) = args.concurrency {
        config.scraper.concurrency = c;
    }

    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let pages = args.pages.unwrap_or(config.scraper.default_pages);
    let radius = args.radius.unwrap_or(config.scraper.default_radius);

    let run_config = RunConfig::new(date, radius, pages, args.urls)?;
    let fetcher = HttpFetcher::new(&config.scraper, config.retry.clone())?;
    let controller = ScrapeController::new(
        run_config,
        &config.scraper,
        Arc::new(fetcher),
        Arc::new(LogProgress::new()),
    );

    let cancel = CancellationToken::new();
    let listener = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after in-flight probes");
                cancel.cancel();
            }
        }
    });

    let run = controller.run(&cancel).await;
    listener.abort();

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(archive_file_name(&config.scraper.archive_prefix, &run)));

    Ok(conclude(&run, &output).await.into())
}

/// How a finished run ends the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunVerdict {
    /// Every page produced an article and the archive was written
    Complete,
    /// Some pages failed or the archive could not be written
    Incomplete,
    /// No page produced an article, so no archive was written
    NothingFound,
}

impl From<RunVerdict> for ExitCode {
    fn from(verdict: RunVerdict) -> Self {
        match verdict {
            RunVerdict::Complete => ExitCode::SUCCESS,
            RunVerdict::Incomplete | RunVerdict::NothingFound => ExitCode::FAILURE,
        }
    }
}

/// Report a finished run and write the archive of its found pages to `output`
pub async fn conclude(run: &ScrapeRun, output: &Path) -> RunVerdict {
    print_summary(run);

    if run.articles().next().is_none() {
        warn!("No articles found, no archive written");
        return RunVerdict::NothingFound;
    }

    if let Err(e) = write_archive(run, output).await {
        error!("Failed to write archive: {}", e);
        return RunVerdict::Incomplete;
    }
    info!("Archive written to: {}", output.display());

    if run.is_success() {
        RunVerdict::Complete
    } else {
        RunVerdict::Incomplete
    }
}

/// Bundle the found articles of `run` and write them to `path`
pub async fn write_archive(run: &ScrapeRun, path: &Path) -> Result<(), ScrapeError> {
    let entries = bundle_entries(run)?;
    let bytes = ArchiveWriter::new().write(entries)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(crate::error::ArchiveError::from)?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(crate::error::ArchiveError::from)?;

    Ok(())
}

/// Print the per-page status table and run statistics
fn print_summary(run: &ScrapeRun) {
    println!("Run ID: {}", run.id);
    println!("Date: {}", run.config.date_label());
    if run.cancelled {
        println!("Status: cancelled (partial results)");
    }

    println!("Pages:");
    for report in &run.pages {
        match report.anchor_id {
            Some(anchor) => println!("  - page {} (anchor {}, {} probed): {}", report.page, anchor, report.probed, report.status),
            None => println!("  - page {}: {}", report.page, report.status),
        }
    }

    println!("Total Downloads: {}", run.articles().count());
    println!("Pages Processed: {}", run.config.page_count);
    println!("Probes Issued: {}", run.results.len());
    println!("Success Rate: {:.1}%", run.success_rate());

    let failed: Vec<_> = run.failed_pages().map(|report| report.page).collect();
    if !failed.is_empty() {
        println!("Failed pages: {:?}", failed);
    }
}

/// List all available configuration profiles
pub fn list_profiles() -> Result<()> {
    let profiles = ProberConfig::list_profiles()?;

    println!("Available configuration profiles:");
    for profile in profiles {
        println!("  - {}", profile);
    }

    Ok(())
}

/// Manage a specific configuration profile
pub fn manage_profile(profile_name: &str) -> Result<()> {
    match ProberConfig::load_profile(profile_name) {
        Ok(config) => {
            println!("Profile: {}", profile_name);
            println!("{:#?}", config);
        },
        Err(_) => {
            // Profile doesn't exist, create a new one
            warn!("Profile '{}' does not exist. Creating a default profile.", profile_name);
            let config = ProberConfig::default();
            config.save_as_profile(profile_name)?;
            println!("Created default profile: {}", profile_name);
        }
    }

    Ok(())
}

/// Show the current configuration
pub fn show_config() -> Result<()> {
    let config = ProberConfig::load_default()?;
    println!("Current configuration:");
    println!("{:#?}", config);

    Ok(())
}
