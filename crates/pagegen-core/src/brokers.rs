//! Broker records and the query interface the orchestrator consumes.
//!
//! Broker business data lives outside this crate. [`BrokerSource`] is the seam;
//! [`StaticBrokerSource`] serves a fixed list, typically loaded from a JSON file.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A broker as listed on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerRecord {
    pub slug: String,
    pub name: String,
    /// Category slugs the broker is listed under
    #[serde(default)]
    pub categories: Vec<String>,
    /// ISO country codes the broker accepts clients from
    #[serde(default)]
    pub supported_countries: Vec<String>,
    /// Feature and strategy slugs the broker supports
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub regulation: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub instruments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_founded: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headquarters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_deposit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_leverage: Option<u32>,
    /// Higher values are listed first
    #[serde(default)]
    pub content_priority: i32,
}

impl BrokerRecord {
    /// Minimal record, mostly useful for fixtures.
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            categories: Vec::new(),
            supported_countries: Vec::new(),
            features: Vec::new(),
            regulation: Vec::new(),
            platforms: Vec::new(),
            instruments: Vec::new(),
            year_founded: None,
            headquarters: None,
            min_deposit: None,
            max_leverage: None,
            content_priority: 0,
        }
    }
}

/// Filter passed to [`BrokerSource::query_brokers`].
///
/// Absent fields do not constrain the result; every listed feature must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl BrokerFilter {
    pub fn matches(&self, broker: &BrokerRecord) -> bool {
        let category_ok = self.category.as_ref().is_none_or(|wanted| {
            broker
                .categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(wanted))
        });
        let country_ok = self.country.as_ref().is_none_or(|wanted| {
            broker
                .supported_countries
                .iter()
                .any(|c| c.eq_ignore_ascii_case(wanted))
        });
        let features_ok = self.features.iter().all(|wanted| {
            broker
                .features
                .iter()
                .any(|f| f.eq_ignore_ascii_case(wanted))
        });
        category_ok && country_ok && features_ok
    }
}

/// Read-only broker query interface.
#[async_trait]
pub trait BrokerSource: Send + Sync {
    /// Brokers matching `filter`, highest priority first. An empty list is not an error.
    async fn query_brokers(&self, filter: &BrokerFilter) -> Result<Vec<BrokerRecord>>;

    async fn broker_by_slug(&self, slug: &str) -> Result<Option<BrokerRecord>>;

    /// The `limit` highest-priority brokers.
    async fn top_brokers(&self, limit: usize) -> Result<Vec<BrokerRecord>>;
}

/// In-memory broker list ordered by `content_priority`.
#[derive(Debug, Clone, Default)]
pub struct StaticBrokerSource {
    brokers: Vec<BrokerRecord>,
}

impl StaticBrokerSource {
    pub fn new(mut brokers: Vec<BrokerRecord>) -> Self {
        brokers.sort_by(|a, b| b.content_priority.cmp(&a.content_priority));
        Self { brokers }
    }

    /// Parse a JSON array of broker records.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let brokers: Vec<BrokerRecord> = serde_json::from_str(json)?;
        Ok(Self::new(brokers))
    }

    /// Load a JSON array of broker records from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read broker file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&content)
    }

    pub fn len(&self) -> usize {
        self.brokers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brokers.is_empty()
    }
}

#[async_trait]
impl BrokerSource for StaticBrokerSource {
    async fn query_brokers(&self, filter: &BrokerFilter) -> Result<Vec<BrokerRecord>> {
        Ok(self
            .brokers
            .iter()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect())
    }

    async fn broker_by_slug(&self, slug: &str) -> Result<Option<BrokerRecord>> {
        Ok(self.brokers.iter().find(|b| b.slug == slug).cloned())
    }

    async fn top_brokers(&self, limit: usize) -> Result<Vec<BrokerRecord>> {
        Ok(self.brokers.iter().take(limit).cloned().collect())
    }
}
