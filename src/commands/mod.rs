pub mod analyze;
pub mod scan;
pub mod status;

use crate::config::AppConfig;
use crate::error::AppError;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Plant disease classification against a remote model, with offline fallback.
#[derive(Debug, Parser)]
#[command(name = "leafscan", version, about)]
pub struct Cli {
    /// JSON config file; missing keys keep their defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides the inference backend base URL
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Probe the backend and print the gateway status
    Status,
    /// Classify image files and folders
    Analyze {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Descend into subfolders
        #[arg(short, long)]
        recursive: bool,

        /// Write the results as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replay a folder of frames through the live scan loop
    Scan {
        /// Folder whose images act as camera frames
        #[arg(long)]
        frames: PathBuf,

        #[arg(long)]
        interval_ms: Option<u64>,

        #[arg(long, default_value_t = 15)]
        duration_secs: u64,
    },
}

impl Cli {
    pub fn resolve_config(&self) -> Result<AppConfig, AppError> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        if let Some(url) = &self.backend_url {
            config.backend_url = url.clone();
        }
        if let Command::Scan {
            interval_ms: Some(interval_ms),
            ..
        } = &self.command
        {
            config.scan_interval_ms = *interval_ms;
        }
        config.validate()?;
        Ok(config)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn dispatch(cli: Cli) -> Result<(), AppError> {
    let config = cli.resolve_config()?;

    match cli.command {
        Command::Status => print_json(&status::gateway_status(&config).await?),
        Command::Analyze {
            paths,
            recursive,
            output,
        } => {
            let results =
                analyze::analyze_paths(&config, &paths, recursive, output.as_deref()).await?;
            print_json(&results)
        }
        Command::Scan {
            frames,
            duration_secs,
            ..
        } => {
            let report =
                scan::run_scan(&config, &frames, Duration::from_secs(duration_secs)).await?;
            print_json(&report)
        }
    }
}
