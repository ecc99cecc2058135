//! Command implementations.

mod classify;
mod maintenance;
mod page;
mod urls;
mod warm;

pub use classify::classify;
pub use maintenance::{invalidate, sweep};
pub use page::build_pages;
pub use urls::list_urls;
pub use warm::warm;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pagegen_core::{Config, HttpBackend, PageOrchestrator, StaticBrokerSource};

/// Orchestrator over the configured HTTP backend and a broker file.
fn orchestrator(config: &Config, brokers: &Path) -> Result<PageOrchestrator> {
    let brokers = StaticBrokerSource::load(brokers)
        .with_context(|| format!("loading brokers from {}", brokers.display()))?;
    tracing::debug!(count = brokers.len(), "brokers loaded");
    let backend = HttpBackend::from_settings(&config.generator)?;
    Ok(PageOrchestrator::from_config(
        config,
        Arc::new(backend),
        Arc::new(brokers),
    )?)
}
