//! Main application entry point (worker binary).
//!
//! This is a thin wrapper around the `page_trace` library that handles:
//! - Command-line and environment parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use page_trace::config::Opt;
use page_trace::initialization::init_logger_with;
use page_trace::{run_dispatcher, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env from the current directory first, then next to the executable
    if dotenvy::dotenv().is_err() {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let env_path = exe_dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                }
            }
        }
    }

    let config = Config::from(Opt::parse());

    init_logger_with(config.log_level.clone().into(), config.log_format.clone())
        .context("Failed to initialize logger")?;

    match run_dispatcher(config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("page_trace error: {:#}", e);
            process::exit(1);
        }
    }
}
