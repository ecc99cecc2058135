use std::path::Path;

use anyhow::{Context, Result};
use pagegen_core::{Config, PagePayload};

/// Build each path and print the payloads: one object for a single path,
/// an array otherwise.
pub async fn build_pages(config: &Config, paths: &[String], brokers: &Path, stats: bool) -> Result<()> {
    let pages = super::orchestrator(config, brokers)?;

    let mut payloads = Vec::with_capacity(paths.len());
    for path in paths {
        let payload = pages
            .get_page(path)
            .await
            .with_context(|| format!("building {path}"))?;
        payloads.push(payload);
    }

    let payloads: Vec<&PagePayload> = payloads.iter().map(|p| &**p).collect();
    let output = match payloads.as_slice() {
        [single] => serde_json::to_string_pretty(single)?,
        many => serde_json::to_string_pretty(many)?,
    };
    println!("{output}");

    if stats {
        eprintln!("{}", serde_json::to_string_pretty(&pages.cache_stats().await)?);
    }
    pages.shutdown();
    Ok(())
}
