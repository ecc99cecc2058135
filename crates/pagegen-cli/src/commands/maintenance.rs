use std::sync::Arc;

use anyhow::Result;
use pagegen_core::{Cache, CacheConfig, Config, FileStore, PagePayload};

fn durable_cache(config: &Config) -> Cache<PagePayload> {
    let store = FileStore::new(config.durable_dir());
    Cache::with_durable(CacheConfig::from(&config.cache), Arc::new(store))
}

pub async fn invalidate(config: &Config, tags: &[String]) -> Result<()> {
    let removed = durable_cache(config).delete_by_tags(tags).await;
    println!("removed {removed} cached pages");
    Ok(())
}

pub async fn sweep(config: &Config) -> Result<()> {
    let removed = durable_cache(config).sweep_expired().await;
    println!("removed {removed} expired pages");
    Ok(())
}
