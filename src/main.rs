use std::process::ExitCode;

use anyhow::Result;
use tracing::{info, error};

mod cli;
mod crawler;
mod error;
mod fetch;
mod storage;
mod utils;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse command line arguments
    let args = cli::parse_args();

    // Initialize logging
    let log_file = args.log_file.clone().map(|path| path.unwrap_or_else(utils::default_log_file));
    utils::init_logging(args.verbose, log_file)?;

    info!("Starting Paper Prober v{}", env!("CARGO_PKG_VERSION"));

    // Process commands
    match cli::process_command(args).await {
        Ok(code) => {
            info!("Command completed");
            Ok(code)
        }
        Err(e) => {
            error!("Command failed: {}", e);
            Err(e)
        }
    }
}
