//! Page assembly: classify, look up, generate, cache.
//!
//! [`PageOrchestrator::get_page`] is the single entry point of the pipeline.
//! A cache hit returns immediately. On a miss, concurrent callers for the same
//! cache key share one build: the first caller starts it, later callers join
//! the in-flight result, so one cold page costs exactly one generation call.
//!
//! Builds run as their own tasks and are bounded by the page deadline. Only a
//! fully assembled payload is ever written to the cache; a failed generation
//! leaves no trace and the next request starts over.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, Shared};
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::brokers::{BrokerFilter, BrokerRecord, BrokerSource};
use crate::cache::{Cache, CacheConfig, CacheStatsSummary, FileStore, SetOptions};
use crate::classifier::PathClassifier;
use crate::config::{Config, OrchestratorSettings, SiteConfig};
use crate::generator::{
    ContentGenerator, CountryContext, GenerationContext, GenerationOptions, GenerationRequest,
    GenerationResult, Length, TextBackend, Tone, extract_description,
};
use crate::rate_limit::RateLimiter;
use crate::registry::{Registry, format_slug};
use crate::types::{Analytics, Breadcrumb, PageIntent, PageMeta, PagePayload, PageTarget, RelatedPage};
use crate::{Error, Result};

type SharedBuild = Shared<BoxFuture<'static, std::result::Result<Arc<PagePayload>, Arc<Error>>>>;

const ROBOTS: &str = "index,follow";
const HOME_QUALITY: f64 = 0.95;

const POPULAR_COUNTRIES: [&str; 5] = ["US", "GB", "DE", "FR", "AU"];
const POPULAR_CATEGORIES: [&str; 3] = ["forex", "stocks", "crypto"];
const RELATED_STRATEGIES: [&str; 3] = ["day-trading", "swing-trading", "scalping"];
const RELATED_FEATURES: [&str; 3] = ["low-spreads", "high-leverage", "mobile-trading"];

/// The collaborators a [`PageOrchestrator`] owns.
pub struct Components {
    pub classifier: PathClassifier,
    pub cache: Arc<Cache<PagePayload>>,
    pub generator: ContentGenerator,
    pub brokers: Arc<dyn BrokerSource>,
}

/// Outcome of [`PageOrchestrator::warm`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmReport {
    pub succeeded: usize,
    /// Path and error message of every page that could not be built
    pub failed: Vec<(String, String)>,
}

/// Turns URL paths into cached page payloads.
///
/// Cloning is cheap; clones share the cache, the limiter and in-flight builds.
#[derive(Clone)]
pub struct PageOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    classifier: PathClassifier,
    cache: Arc<Cache<PagePayload>>,
    generator: ContentGenerator,
    brokers: Arc<dyn BrokerSource>,
    settings: OrchestratorSettings,
    site: SiteConfig,
    in_flight: DashMap<String, SharedBuild>,
    builds: AtomicU64,
}

impl PageOrchestrator {
    pub fn new(components: Components, settings: OrchestratorSettings, site: SiteConfig) -> Self {
        let Components {
            classifier,
            cache,
            generator,
            brokers,
        } = components;
        Self {
            inner: Arc::new(Inner {
                classifier,
                cache,
                generator,
                brokers,
                settings,
                site,
                in_flight: DashMap::new(),
                builds: AtomicU64::new(0),
            }),
        }
    }

    /// Wire up the full pipeline from configuration.
    ///
    /// The cache gets a file-backed durable tier under [`Config::durable_dir`].
    /// Background maintenance is not started; see [`spawn_maintenance`](Self::spawn_maintenance).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration does not validate.
    pub fn from_config(
        config: &Config,
        backend: Arc<dyn TextBackend>,
        brokers: Arc<dyn BrokerSource>,
    ) -> Result<Self> {
        config.validate()?;

        let limiter = Arc::new(RateLimiter::from_settings(&config.rate_limit));
        let durable = Arc::new(FileStore::new(config.durable_dir()));
        let cache = Arc::new(Cache::with_durable(
            CacheConfig::from(&config.cache),
            durable,
        ));
        let classifier = PathClassifier::new(Arc::new(Registry::new()), config.site.year);
        let generator = ContentGenerator::from_config(backend, limiter, config);

        Ok(Self::new(
            Components {
                classifier,
                cache,
                generator,
                brokers,
            },
            config.orchestrator.clone(),
            config.site.clone(),
        ))
    }

    /// Start the cache sweeper and the rate-limit cleanup.
    pub fn spawn_maintenance(&self, sweep_every: Duration, cleanup_every: Duration) {
        self.inner.cache.spawn_sweeper(sweep_every);
        self.inner.generator.limiter().spawn_cleanup(cleanup_every);
    }

    /// Stop background maintenance. In-flight builds run to completion.
    pub fn shutdown(&self) {
        self.inner.cache.shutdown();
        self.inner.generator.limiter().shutdown();
        info!("page orchestrator shut down");
    }

    pub fn classifier(&self) -> &PathClassifier {
        &self.inner.classifier
    }

    /// Fetch or build the page for `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the path is not a known page, or names a
    ///   broker the broker source does not have
    /// - [`Error::Generation`] when content could not be generated, including
    ///   when the backend rate limit is exhausted; nothing is cached
    /// - [`Error::Timeout`] when the build exceeds the page deadline
    #[tracing::instrument(skip(self))]
    pub async fn get_page(&self, path: &str) -> Result<Arc<PagePayload>> {
        let intent = self.inner.classifier.classify(path)?;
        self.page_for(intent).await
    }

    /// Fetch or build the page for an already classified intent.
    ///
    /// # Errors
    ///
    /// See [`get_page`](Self::get_page).
    pub async fn page_for(&self, intent: PageIntent) -> Result<Arc<PagePayload>> {
        let key = cache_key(&intent);
        if let Some(payload) = self.inner.cache.get_value(&key).await {
            return Ok(payload);
        }

        self.join_or_start(key, intent)
            .await
            .map_err(|e| e.shared_copy())
    }

    fn join_or_start(&self, key: String, intent: PageIntent) -> SharedBuild {
        match self.inner.in_flight.entry(key) {
            Entry::Occupied(existing) => {
                debug!(key = %existing.key(), "joining in-flight page build");
                existing.get().clone()
            },
            Entry::Vacant(slot) => {
                let inner = Arc::clone(&self.inner);
                let key = slot.key().clone();
                // The map shard stays locked until the build is registered, so
                // the task's own removal cannot run before the insert.
                let task = tokio::spawn(async move {
                    let result = inner.build(&key, intent).await.map_err(Arc::new);
                    inner.in_flight.remove(&key);
                    result
                });
                let build = async move {
                    task.await.unwrap_or_else(|e| {
                        Err(Arc::new(Error::Other(format!("page build task failed: {e}"))))
                    })
                }
                .boxed()
                .shared();
                slot.insert(build.clone());
                build
            },
        }
    }

    /// Remove every cached page carrying any of `tags`.
    pub async fn invalidate_tags<S: AsRef<str>>(&self, tags: &[S]) -> usize {
        let removed = self.inner.cache.delete_by_tags(tags).await;
        info!(removed, "invalidated cached pages");
        removed
    }

    pub async fn sweep_expired(&self) -> usize {
        self.inner.cache.sweep_expired().await
    }

    pub async fn cache_stats(&self) -> CacheStatsSummary {
        self.inner.cache.stats().await
    }

    /// Number of page builds that completed and were cached.
    pub fn builds(&self) -> u64 {
        self.inner.builds.load(Ordering::Relaxed)
    }

    /// Builds currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Build pages for `paths` with at most `concurrency` running at once.
    pub async fn warm<I, S>(&self, paths: I, concurrency: usize) -> WarmReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let results: Vec<(String, Result<Arc<PagePayload>>)> =
            futures::stream::iter(paths.into_iter().map(Into::into))
                .map(|path: String| async move {
                    let result = self.get_page(&path).await;
                    (path, result)
                })
                .buffer_unordered(concurrency.max(1))
                .collect()
                .await;

        let mut report = WarmReport::default();
        for (path, result) in results {
            match result {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    warn!(path = %path, error = %e, category = e.category(), "warm failed");
                    report.failed.push((path, e.to_string()));
                },
            }
        }
        report.failed.sort();
        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            "cache warm complete"
        );
        report
    }
}

impl Inner {
    #[tracing::instrument(skip(self, intent), fields(kind = %intent.kind()))]
    async fn build(&self, key: &str, intent: PageIntent) -> Result<Arc<PagePayload>> {
        // A build that finished just before this one registered may already be cached
        if let Some(payload) = self.cache.peek(key).await {
            return Ok(payload);
        }

        let deadline = Duration::from_millis(self.settings.page_deadline_ms);
        let payload = tokio::time::timeout(deadline, self.assemble_with_retry(&intent))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "{} exceeded the {}ms page deadline",
                    intent.canonical_path, self.settings.page_deadline_ms
                ))
            })?
            .map_err(|e| match e {
                // Throttling governs backend cost; page callers only see a retryable failure
                Error::RateLimitExceeded { retry_after_secs } => Error::Generation(format!(
                    "generation throttled by rate limit, retry after {retry_after_secs}s"
                )),
                other => other,
            })?;

        let payload = Arc::new(payload);
        let options = SetOptions::default()
            .ttl(Duration::from_secs(self.settings.page_ttl_secs))
            .tags(cache_tags(&intent));
        self.cache.set(key, Arc::clone(&payload), options).await;
        self.builds.fetch_add(1, Ordering::Relaxed);

        info!(
            path = %intent.canonical_path,
            quality = payload.analytics.content_quality,
            brokers = payload.brokers.len(),
            "page assembled"
        );
        Ok(payload)
    }

    async fn assemble_with_retry(&self, intent: &PageIntent) -> Result<PagePayload> {
        let mut backoff = Duration::from_millis(self.settings.retry_backoff_ms);
        let mut attempt = 0;
        loop {
            match self.assemble(intent).await {
                Err(Error::Generation(msg)) if attempt < self.settings.generation_retries => {
                    attempt += 1;
                    warn!(attempt, error = %msg, backoff_ms = ?backoff, "generation failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                },
                other => return other,
            }
        }
    }

    async fn assemble(&self, intent: &PageIntent) -> Result<PagePayload> {
        let registry = self.classifier.registry();
        match &intent.target {
            PageTarget::Home => self.home_page(intent).await,
            PageTarget::Broker { broker } => self.broker_page(intent, broker).await,
            PageTarget::Category { category } => {
                let name = format_slug(category);
                let request = GenerationRequest::new(GenerationContext::PageContent {
                    category: Some(name),
                    country: None,
                })
                .audience("traders of all levels")
                .tone(Tone::Professional);
                let filter = BrokerFilter {
                    category: Some(category.clone()),
                    ..BrokerFilter::default()
                };
                self.generated_page(intent, request, filter, everything()).await
            },
            PageTarget::Country { country } => {
                let context = registry
                    .country(country)
                    .map(CountryContext::from)
                    .ok_or_else(|| Error::NotFound(intent.canonical_path.clone()))?;
                let request = GenerationRequest::new(GenerationContext::PageContent {
                    category: None,
                    country: Some(context),
                })
                .audience("traders in this country")
                .tone(Tone::Professional);
                let filter = BrokerFilter {
                    country: Some(country.clone()),
                    ..BrokerFilter::default()
                };
                self.generated_page(intent, request, filter, everything()).await
            },
            PageTarget::CategoryCountry { category, country } => {
                let context = registry
                    .country(country)
                    .map(CountryContext::from)
                    .ok_or_else(|| Error::NotFound(intent.canonical_path.clone()))?;
                let name = format_slug(category);
                let audience = format!("{name} traders in {}", context.name);
                let request = GenerationRequest::new(GenerationContext::PageContent {
                    category: Some(name),
                    country: Some(context),
                })
                .audience(audience)
                .tone(Tone::Professional);
                let filter = BrokerFilter {
                    category: Some(category.clone()),
                    country: Some(country.clone()),
                    features: Vec::new(),
                };
                self.generated_page(intent, request, filter, everything()).await
            },
            PageTarget::Strategy { strategy } => {
                let request = GenerationRequest::new(GenerationContext::Article {
                    strategy: format_slug(strategy),
                })
                .audience("traders looking to learn new strategies")
                .tone(Tone::Educational)
                .length(Length::Long);
                let filter = BrokerFilter {
                    features: vec![strategy.clone()],
                    ..BrokerFilter::default()
                };
                let options = GenerationOptions {
                    include_comparison: false,
                    ..everything()
                };
                self.generated_page(intent, request, filter, options).await
            },
            PageTarget::Feature { feature } => {
                let request = GenerationRequest::new(GenerationContext::Comparison {
                    feature: format_slug(feature),
                })
                .audience("traders looking for specific features")
                .tone(Tone::Analytical);
                let filter = BrokerFilter {
                    features: vec![feature.clone()],
                    ..BrokerFilter::default()
                };
                self.generated_page(intent, request, filter, everything()).await
            },
        }
    }

    async fn generated_page(
        &self,
        intent: &PageIntent,
        request: GenerationRequest,
        filter: BrokerFilter,
        options: GenerationOptions,
    ) -> Result<PagePayload> {
        let brokers = self.brokers.query_brokers(&filter).await?;
        let request = request
            .keywords(intent.seo.keywords.clone())
            .options(options);
        let generated = self.generator.generate(&request).await?;
        Ok(self.payload_from(intent, brokers, generated))
    }

    fn payload_from(
        &self,
        intent: &PageIntent,
        brokers: Vec<BrokerRecord>,
        generated: GenerationResult,
    ) -> PagePayload {
        let params = intent.params();
        PagePayload {
            title: intent.seo.title.clone(),
            description: intent.seo.description.clone(),
            content: html_escape::encode_text(&generated.text).into_owned(),
            meta: self.meta(intent, generated.structured_data.unwrap_or_else(|| json!({}))),
            brokers,
            faqs: generated.faqs,
            comparison: generated.comparison_rows,
            breadcrumbs: breadcrumbs(&intent.target, self.classifier.registry(), None),
            related_pages: related_pages(
                &intent.target,
                self.classifier.registry(),
                self.settings.max_related_pages,
            ),
            analytics: Analytics {
                page_type: intent.kind(),
                category: params.get("category").cloned(),
                country: params.get("country").cloned(),
                generated_at: generated.generated_at,
                content_quality: generated.quality_score,
            },
        }
    }

    async fn broker_page(&self, intent: &PageIntent, slug: &str) -> Result<PagePayload> {
        let broker = self
            .brokers
            .broker_by_slug(slug)
            .await?
            .ok_or_else(|| Error::NotFound(format!("broker {slug}")))?;

        let request = GenerationRequest::new(GenerationContext::MetaDescription {
            page_type: Some("broker".to_string()),
            topic: Some(broker.name.clone()),
            country: None,
        })
        .audience("traders considering this broker")
        .keywords(intent.seo.keywords.clone());
        let generated = self.generator.generate(&request).await?;

        let structured = broker_structured_data(&broker, &intent.canonical_path);
        Ok(PagePayload {
            title: intent.seo.title.clone(),
            description: html_escape::encode_text(&extract_description(&generated.text)).into_owned(),
            content: broker_review_html(&broker),
            meta: self.meta(intent, structured),
            breadcrumbs: breadcrumbs(&intent.target, self.classifier.registry(), Some(&broker.name)),
            related_pages: Vec::new(),
            faqs: None,
            comparison: None,
            brokers: vec![broker],
            analytics: Analytics {
                page_type: intent.kind(),
                category: None,
                country: None,
                generated_at: generated.generated_at,
                content_quality: generated.quality_score,
            },
        })
    }

    async fn home_page(&self, intent: &PageIntent) -> Result<PagePayload> {
        let brokers = self
            .brokers
            .top_brokers(self.settings.home_broker_limit)
            .await?;
        let structured = json!({
            "@context": "https://schema.org",
            "@type": "WebSite",
            "name": self.site.name,
            "description": "Find and compare the best online trading brokers",
            "url": self.canonical("/"),
            "potentialAction": {
                "@type": "SearchAction",
                "target": "/search?q={search_term_string}",
                "query-input": "required name=search_term_string"
            }
        });

        Ok(PagePayload {
            title: intent.seo.title.clone(),
            description: intent.seo.description.clone(),
            content: home_html(self.site.year),
            meta: self.meta(intent, structured),
            brokers,
            faqs: None,
            comparison: None,
            breadcrumbs: vec![Breadcrumb::current("Home")],
            related_pages: Vec::new(),
            analytics: Analytics {
                page_type: intent.kind(),
                category: None,
                country: None,
                generated_at: Utc::now(),
                content_quality: HOME_QUALITY,
            },
        })
    }

    fn meta(&self, intent: &PageIntent, structured_data: Value) -> PageMeta {
        PageMeta {
            keywords: intent.seo.keywords.clone(),
            structured_data,
            canonical: self.canonical(&intent.canonical_path),
            robots: ROBOTS.to_string(),
        }
    }

    fn canonical(&self, path: &str) -> String {
        format!("{}{path}", self.site.base_url.trim_end_matches('/'))
    }
}

const fn everything() -> GenerationOptions {
    GenerationOptions::everything()
}

/// Cache key of a page: kind plus its parameters as ordered JSON.
pub fn cache_key(intent: &PageIntent) -> String {
    let params = serde_json::to_string(&intent.params()).unwrap_or_default();
    format!("page-data:{}:{params}", intent.kind())
}

/// Invalidation tags: the page kind plus one per parameter.
pub fn cache_tags(intent: &PageIntent) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    tags.insert(format!("page-type:{}", intent.kind()));
    for (name, value) in intent.params() {
        tags.insert(format!("{name}:{value}"));
    }
    tags
}

fn country_name(registry: &Registry, code: &str) -> String {
    registry
        .country(code)
        .map_or_else(|| code.to_string(), |c| c.name.to_string())
}

/// Navigation trail from the home page to `target`.
pub fn breadcrumbs(target: &PageTarget, registry: &Registry, broker_name: Option<&str>) -> Vec<Breadcrumb> {
    let mut crumbs = vec![Breadcrumb::linked("Home", "/")];
    match target {
        PageTarget::Home => return vec![Breadcrumb::current("Home")],
        PageTarget::Category { category } => {
            crumbs.push(Breadcrumb::current(format_slug(category)));
        },
        PageTarget::Country { country } => {
            crumbs.push(Breadcrumb::current(country_name(registry, country)));
        },
        PageTarget::CategoryCountry { category, country } => {
            crumbs.push(Breadcrumb::linked(format_slug(category), format!("/{category}")));
            crumbs.push(Breadcrumb::current(country_name(registry, country)));
        },
        PageTarget::Strategy { strategy } => {
            crumbs.push(Breadcrumb::linked("Trading Strategies", "/strategies"));
            crumbs.push(Breadcrumb::current(format_slug(strategy)));
        },
        PageTarget::Feature { feature } => {
            crumbs.push(Breadcrumb::linked("Broker Features", "/features"));
            crumbs.push(Breadcrumb::current(format_slug(feature)));
        },
        PageTarget::Broker { broker } => {
            crumbs.push(Breadcrumb::linked("Broker Reviews", "/brokers"));
            crumbs.push(Breadcrumb::current(
                broker_name.map_or_else(|| format_slug(broker), str::to_string),
            ));
        },
    }
    crumbs
}

/// Links to neighbouring pages, at most `limit`.
pub fn related_pages(target: &PageTarget, registry: &Registry, limit: usize) -> Vec<RelatedPage> {
    let pages: Vec<RelatedPage> = match target {
        PageTarget::Category { category } => {
            let name = format_slug(category);
            POPULAR_COUNTRIES
                .iter()
                .map(|code| RelatedPage {
                    title: format!("Best {name} Brokers in {code}"),
                    href: format!("/{category}/{}", code.to_ascii_lowercase()),
                })
                .collect()
        },
        PageTarget::Country { country } => {
            let name = country_name(registry, country);
            POPULAR_CATEGORIES
                .iter()
                .map(|category| RelatedPage {
                    title: format!("Best {} Brokers in {name}", format_slug(category)),
                    href: format!("/{category}/{}", country.to_ascii_lowercase()),
                })
                .collect()
        },
        PageTarget::Strategy { strategy } => RELATED_STRATEGIES
            .iter()
            .filter(|s| **s != strategy.as_str())
            .map(|s| RelatedPage {
                title: format!("{} Strategy", format_slug(s)),
                href: format!("/{s}-strategy"),
            })
            .collect(),
        PageTarget::Feature { feature } => RELATED_FEATURES
            .iter()
            .filter(|f| **f != feature.as_str())
            .map(|f| RelatedPage {
                title: format!("Brokers with {}", format_slug(f)),
                href: format!("/{f}-feature"),
            })
            .collect(),
        PageTarget::Home | PageTarget::CategoryCountry { .. } | PageTarget::Broker { .. } => {
            Vec::new()
        },
    };
    pages.into_iter().take(limit).collect()
}

fn broker_review_html(broker: &BrokerRecord) -> String {
    let esc = |s: &str| html_escape::encode_text(s).into_owned();
    let list = |items: &[String]| esc(&items.join(", "));
    let name = esc(&broker.name);

    let mut intro = format!("{name} is a");
    if let Some(year) = broker.year_founded {
        intro.push_str(&format!(" {year}-established"));
    }
    intro.push_str(" broker");
    if let Some(hq) = &broker.headquarters {
        intro.push_str(&format!(" headquartered in {}", esc(hq)));
    }
    intro.push('.');

    let mut html = format!("<h2>{name} Review</h2>\n<p>{intro}</p>\n");
    if !broker.regulation.is_empty() {
        html.push_str(&format!(
            "<h3>Regulation</h3>\n<p>{name} is regulated by {}.</p>\n",
            list(&broker.regulation)
        ));
    }
    if !broker.platforms.is_empty() {
        html.push_str(&format!(
            "<h3>Trading Platforms</h3>\n<p>Available platforms include {}.</p>\n",
            list(&broker.platforms)
        ));
    }
    if !broker.instruments.is_empty() {
        html.push_str(&format!(
            "<h3>Instruments</h3>\n<p>Trade {} with competitive spreads.</p>\n",
            list(&broker.instruments)
        ));
    }
    if broker.min_deposit.is_some() || broker.max_leverage.is_some() {
        html.push_str("<h3>Account Details</h3>\n");
        if let Some(deposit) = broker.min_deposit {
            html.push_str(&format!("<p>Minimum deposit: ${deposit}</p>\n"));
        }
        if let Some(leverage) = broker.max_leverage {
            html.push_str(&format!("<p>Maximum leverage: {leverage}:1</p>\n"));
        }
    }
    html.push_str(&format!(
        "<h3>Conclusion</h3>\n<p>{name} offers a comprehensive trading experience suitable for traders of all levels.</p>"
    ));
    html
}

fn broker_structured_data(broker: &BrokerRecord, canonical: &str) -> Value {
    let mut provider = json!({ "@type": "Organization", "name": broker.name });
    if let Some(year) = broker.year_founded {
        provider["foundingDate"] = json!(year.to_string());
    }
    if let Some(hq) = &broker.headquarters {
        provider["address"] = json!({ "@type": "PostalAddress", "addressCountry": hq });
    }

    let mut data = json!({
        "@context": "https://schema.org",
        "@type": "FinancialService",
        "name": broker.name,
        "description": format!("Comprehensive review of {} trading broker", broker.name),
        "url": canonical,
        "provider": provider,
    });
    if let Some(deposit) = broker.min_deposit {
        data["offers"] = json!({
            "@type": "Offer",
            "priceCurrency": "USD",
            "price": deposit.to_string(),
            "description": "Minimum deposit requirement"
        });
    }
    data
}

fn home_html(year: u16) -> String {
    format!(
        "<h2>Find Your Perfect Trading Broker</h2>
<p>Compare the best online trading brokers for {year}. Our comprehensive reviews and comparisons help you find the right platform for your trading needs.</p>
<h3>Why Choose Our Recommendations?</h3>
<ul>
<li>Unbiased, expert reviews</li>
<li>Real trader feedback</li>
<li>Up-to-date information</li>
<li>Focus on safety and regulation</li>
</ul>
<h3>Popular Trading Categories</h3>
<p>Whether you're interested in forex, stocks, crypto, or commodities, we have detailed guides and broker recommendations to help you succeed.</p>"
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn classify(path: &str) -> PageIntent {
        PathClassifier::default().classify(path).unwrap()
    }

    #[test]
    fn test_cache_key_is_deterministic_and_ordered() {
        let intent = classify("/forex/us");
        assert_eq!(
            cache_key(&intent),
            r#"page-data:category_country:{"category":"forex","country":"US"}"#
        );
        assert_eq!(cache_key(&intent), cache_key(&classify("/Forex/US/")));
        assert_eq!(cache_key(&classify("/")), "page-data:home:{}");
    }

    #[test]
    fn test_cache_tags_cover_every_param() {
        let tags: Vec<String> = cache_tags(&classify("/forex/us")).into_iter().collect();
        assert_eq!(
            tags,
            vec!["category:forex", "country:US", "page-type:category_country"]
        );
        assert!(cache_tags(&classify("/broker/ig-markets")).contains("broker:ig-markets"));
    }

    #[test]
    fn test_breadcrumbs_per_kind() {
        let registry = Registry::new();
        let crumbs = breadcrumbs(&classify("/forex/us").target, &registry, None);
        assert_eq!(
            crumbs,
            vec![
                Breadcrumb::linked("Home", "/"),
                Breadcrumb::linked("Forex", "/forex"),
                Breadcrumb::current("United States"),
            ]
        );

        let crumbs = breadcrumbs(&classify("/scalping-strategy").target, &registry, None);
        assert_eq!(crumbs[1], Breadcrumb::linked("Trading Strategies", "/strategies"));
        assert_eq!(crumbs[2], Breadcrumb::current("Scalping"));

        let crumbs = breadcrumbs(&classify("/broker/ig-markets").target, &registry, Some("IG"));
        assert_eq!(crumbs[2], Breadcrumb::current("IG"));

        assert_eq!(
            breadcrumbs(&PageTarget::Home, &registry, None),
            vec![Breadcrumb::current("Home")]
        );
    }

    #[test]
    fn test_related_pages() {
        let registry = Registry::new();
        let related = related_pages(&classify("/forex").target, &registry, 5);
        assert_eq!(related.len(), 5);
        assert_eq!(related[0].title, "Best Forex Brokers in US");
        assert_eq!(related[0].href, "/forex/us");

        let related = related_pages(&classify("/country/gb").target, &registry, 5);
        assert_eq!(related[2].title, "Best Crypto Brokers in United Kingdom");
        assert_eq!(related[2].href, "/crypto/gb");

        let related = related_pages(&classify("/scalping-strategy").target, &registry, 5);
        let hrefs: Vec<&str> = related.iter().map(|r| r.href.as_str()).collect();
        assert_eq!(hrefs, vec!["/day-trading-strategy", "/swing-trading-strategy"]);

        assert_eq!(related_pages(&classify("/forex").target, &registry, 2).len(), 2);
    }

    #[test]
    fn test_broker_review_escapes_and_skips_missing_fields() {
        let mut broker = BrokerRecord::new("ig", "IG <Markets>");
        broker.regulation = vec!["FCA".into(), "ASIC".into()];
        broker.max_leverage = Some(30);

        let html = broker_review_html(&broker);
        assert!(html.starts_with("<h2>IG &lt;Markets&gt; Review</h2>"));
        assert!(html.contains("is regulated by FCA, ASIC."));
        assert!(html.contains("<p>Maximum leverage: 30:1</p>"));
        assert!(!html.contains("Minimum deposit"));
        assert!(!html.contains("Trading Platforms"));
    }

    #[test]
    fn test_broker_structured_data() {
        let mut broker = BrokerRecord::new("ig", "IG");
        broker.year_founded = Some(1974);
        broker.min_deposit = Some(250.0);
        let data = broker_structured_data(&broker, "/broker/ig");
        assert_eq!(data["@type"], "FinancialService");
        assert_eq!(data["provider"]["foundingDate"], "1974");
        assert_eq!(data["offers"]["price"], "250");
        assert_eq!(data["url"], "/broker/ig");
    }
}
