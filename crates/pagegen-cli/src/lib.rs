//! pagegen CLI - programmatic SEO pages from the command line
//!
//! The binary is a thin wrapper: [`run`] parses arguments, loads
//! configuration and dispatches to the command modules.

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
pub mod error;
mod utils;

use crate::utils::{initialize_logging, load_config};
use cli::{Cli, Commands};

/// Execute the pagegen CLI with the current process arguments.
///
/// # Errors
///
/// Returns an error if configuration loading or the command fails. Use
/// [`error::exit_code_from_error`] to turn it into an exit status.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(&cli)?;
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Classify { path } => commands::classify(&config, &path)?,
        Commands::Urls { limit, json } => commands::list_urls(limit, json)?,
        Commands::Page {
            paths,
            brokers,
            stats,
        } => commands::build_pages(&config, &paths, &brokers, stats).await?,
        Commands::Warm {
            brokers,
            concurrency,
            limit,
        } => commands::warm(&config, &brokers, usize::from(concurrency), limit).await?,
        Commands::Invalidate { tags } => commands::invalidate(&config, &tags).await?,
        Commands::Sweep => commands::sweep(&config).await?,
    }
    Ok(())
}
