pub mod commands;
pub mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to a file (default location when no path is given)
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<Option<PathBuf>>,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe article IDs around each page's anchor and bundle the articles into a ZIP
    Scrape(ScrapeArgs),

    /// Manage configuration profiles
    Config {
        /// Profile name to manage
        #[arg(required = false)]
        profile: Option<String>,

        /// List all available profiles
        #[arg(short, long)]
        list: bool,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct ScrapeArgs {
    /// Edition date (DD-MM-YYYY or YYYY-MM-DD), defaults to today
    #[arg(short, long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Number of pages to scrape
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..=config::MAX_PAGES as i64))]
    pub pages: Option<u32>,

    /// Search radius around each page's article ID
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(0..=config::MAX_RADIUS as i64))]
    pub radius: Option<u32>,

    /// Article URL for a page, repeated once per page in page order
    #[arg(short = 'u', long = "url", value_name = "URL")]
    pub urls: Vec<String>,

    /// Output archive path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration profile to use
    #[arg(short, long, default_value = "default")]
    pub profile: String,

    /// Number of pages searched at once
    #[arg(short, long)]
    pub concurrency: Option<usize>,
}

/// Parse an edition date in either of the accepted formats
pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%d-%m-%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| format!("invalid date '{}', expected DD-MM-YYYY", value))
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Scrape(args) => {
            info!("Starting scrape with profile {}", args.profile);
            commands::scrape(args).await
        }
        Commands::Config { profile, list } => {
            if list {
                info!("Listing all configuration profiles");
                commands::list_profiles()?;
            } else if let Some(profile_name) = profile {
                info!("Managing configuration profile: {}", profile_name);
                commands::manage_profile(&profile_name)?;
            } else {
                info!("Showing current configuration");
                commands::show_config()?;
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert()
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_date("15-03-2024"), Ok(expected));
        assert_eq!(parse_date("2024-03-15"), Ok(expected));
        assert!(parse_date("15/03/2024").is_err());
    }

    #[test]
    fn test_scrape_arguments() {
        let cli = Cli::try_parse_from([
            "prober", "scrape", "-n", "2", "-r", "5", "--date", "15-03-2024",
            "-u", "https://e.example/v/1/100", "-u", "https://e.example/v/2/200",
        ])
        .unwrap();

        let Commands::Scrape(args) = cli.command else {
            panic!("expected scrape command");
        };
        assert_eq!(args.pages, Some(2));
        assert_eq!(args.radius, Some(5));
        assert_eq!(args.urls.len(), 2);
        assert_eq!(args.profile, "default");
        assert!(cli.log_file.is_none());
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert!(Cli::try_parse_from(["prober", "scrape", "-n", "0"]).is_err());
        assert!(Cli::try_parse_from(["prober", "scrape", "-n", "21"]).is_err());
        assert!(Cli::try_parse_from(["prober", "scrape", "-r", "101"]).is_err());
    }

    #[test]
    fn test_log_file_flag_without_path() {
        let cli = Cli::try_parse_from(["prober", "config", "--log-file", "run.log"]).unwrap();
        assert_eq!(cli.log_file, Some(Some(PathBuf::from("run.log"))));

        let cli = Cli::try_parse_from(["prober", "config", "--list", "--log-file"]).unwrap();
        assert_eq!(cli.log_file, Some(None));
    }
}
