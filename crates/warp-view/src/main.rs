//! warp-view - print a JSON preview of one tensor, array or image file

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warp_view::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries exactly one JSON object; logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let outcome = warp_view::run(&cli)?;
    println!("{}", outcome.to_json()?);

    if outcome.fatal {
        std::process::exit(outcome.exit_code());
    }
    Ok(())
}
