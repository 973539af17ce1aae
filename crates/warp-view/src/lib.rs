//! warp-view library exports
//!
//! Argument parsing and configuration loading for the `warp-view` binary,
//! kept here so the CLI surface can be tested without spawning a process.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use warp_tensor::{PreviewOutcome, PreviewService, TensorConfig};

#[derive(Parser, Debug)]
#[command(name = "warp-view")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Image, .npy array or .pt/.pth checkpoint to preview
    #[arg(long)]
    pub file: PathBuf,

    /// TOML configuration file
    #[arg(long, env = "WARP_VIEW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity on stderr (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Log filter for the requested verbosity
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Load the configuration file (if any), then apply environment overrides
pub fn load_config(path: Option<&Path>) -> Result<TensorConfig> {
    let config = match path {
        Some(path) => TensorConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => TensorConfig::default(),
    };
    config
        .apply_env()
        .context("invalid WARP_VIEW_* environment override")
}

/// Build the preview report for the file named on the command line
pub fn run(cli: &Cli) -> Result<PreviewOutcome> {
    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");
    Ok(PreviewService::new(config.preview).preview_file(&cli.file))
}
