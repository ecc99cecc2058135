use std::path::Path;

use anyhow::{Result, anyhow};
use pagegen_core::{Config, Registry};

use crate::error::CliError;

/// Build every programmatic URL and print the report.
///
/// Fails with a temporary error if any page could not be built.
pub async fn warm(config: &Config, brokers: &Path, concurrency: usize, limit: Option<usize>) -> Result<()> {
    let pages = super::orchestrator(config, brokers)?;
    let urls = Registry::new()
        .programmatic_urls()
        .into_iter()
        .take(limit.unwrap_or(usize::MAX));

    let report = pages.warm(urls, concurrency).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    pages.shutdown();

    if report.failed.is_empty() {
        Ok(())
    } else {
        Err(CliError::temporary(anyhow!(
            "{} of {} pages failed to build",
            report.failed.len(),
            report.failed.len() + report.succeeded
        ))
        .into())
    }
}
