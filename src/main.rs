//! sccache-ci - CLI entry point
//!
//! Dispatches to the per-phase subcommands. Any error reaching this
//! level is the job's failure reason, surfaced verbatim.

use clap::Parser;
use console::style;
use sccache_ci::cli::{commands, Cli, Commands};
use sccache_ci::error::CiResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CiResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = info, 1 = debug, 2+ = trace
    let filter = match cli.verbose {
        0 => EnvFilter::new("sccache_ci=info"),
        1 => EnvFilter::new("sccache_ci=debug"),
        _ => EnvFilter::new("sccache_ci=trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        Commands::Setup(args) => commands::setup(args).await,
        Commands::Stats(args) => commands::stats(args).await,
        Commands::Post(args) => commands::post(args).await,
    }
}
