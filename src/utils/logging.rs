use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_NAME: &str = "prober.log";

/// Initialize the logging system.
///
/// Console output always goes to stderr. When `log_file` is set, the same
/// events are appended to that file without ANSI colors. `RUST_LOG` adds
/// directives for other targets.
pub fn init_logging(verbose: bool, log_file: Option<PathBuf>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = open_log_file(&path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(build_filter(verbose)?)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;

    Ok(())
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

fn build_filter(verbose: bool) -> Result<EnvFilter> {
    let level = if verbose { "debug" } else { "info" };
    Ok(EnvFilter::from_default_env()
        .add_directive(format!("paper_prober={}", level).parse()?)
        .add_directive("warn".parse()?))
}

/// Log file location used when `--log-file` is given without a path
pub fn default_log_file() -> PathBuf {
    directories::ProjectDirs::from("com", "paper-prober", "paper-prober")
        .map(|dirs| dirs.data_dir().join(LOG_FILE_NAME))
        .unwrap_or_else(|| Path::new("logs").join(LOG_FILE_NAME))
}
