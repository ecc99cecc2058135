pub mod logging;

pub use logging::initialize_logging;

use anyhow::{Context, Result};
use pagegen_core::Config;

use crate::cli::Cli;

/// Load configuration from `--config` or the default location, then apply
/// `PAGEGEN_*` environment overrides.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::load().context("loading configuration")?,
    };
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}
