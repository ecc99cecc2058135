//! URL path classification.
//!
//! [`PathClassifier::classify`] maps a path to a validated [`PageIntent`]. It is
//! a pure function of the path, the registry and the configured year: the same
//! input always yields the same intent, which the page cache key depends on.
//!
//! Rules are tried most specific first. A rule whose shape matches but whose
//! slugs are unknown does not stop classification; the next rule is tried and
//! only when all rules are exhausted is the path `NotFound`.
//!
//! ```rust
//! use pagegen_core::{PageKind, PathClassifier};
//!
//! let classifier = PathClassifier::default();
//! let intent = classifier.classify("/forex/us/")?;
//! assert_eq!(intent.kind(), PageKind::CategoryCountry);
//! assert_eq!(intent.params()["country"], "US");
//!
//! assert!(classifier.classify("/not-a-real-category").is_err());
//! # Ok::<(), pagegen_core::Error>(())
//! ```

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::registry::{format_slug, Registry};
use crate::types::{PageIntent, PageTarget, SeoMetadata};
use crate::{Error, Result};

type RuleFn = fn(&Registry, &Captures<'_>) -> Option<PageTarget>;

fn rule(pattern: &str, build: RuleFn) -> Option<(Regex, RuleFn)> {
    Regex::new(pattern).ok().map(|re| (re, build))
}

static RULES: Lazy<Vec<(Regex, RuleFn)>> = Lazy::new(|| {
    [
        rule(r"^/?$", |_, _| Some(PageTarget::Home)),
        rule(r"^/country/([a-z]{2})$", |registry, caps| {
            let country = registry.country(&caps[1])?;
            Some(PageTarget::Country {
                country: country.code.to_string(),
            })
        }),
        rule(r"^/broker/([a-z0-9-]+)$", |_, caps| {
            Some(PageTarget::Broker {
                broker: caps[1].to_string(),
            })
        }),
        rule(r"^/([a-z-]+)/([a-z]{2})$", |registry, caps| {
            let category = registry.category(&caps[1])?;
            let country = registry.country(&caps[2])?;
            Some(PageTarget::CategoryCountry {
                category: category.slug.to_string(),
                country: country.code.to_string(),
            })
        }),
        rule(r"^/([a-z-]+)-strategy$", |registry, caps| {
            registry
                .is_strategy(&caps[1])
                .then(|| PageTarget::Strategy {
                    strategy: caps[1].to_string(),
                })
        }),
        rule(r"^/([a-z-]+)-feature$", |registry, caps| {
            registry.is_feature(&caps[1]).then(|| PageTarget::Feature {
                feature: caps[1].to_string(),
            })
        }),
        rule(r"^/([a-z-]+)$", |registry, caps| {
            let category = registry.category(&caps[1])?;
            Some(PageTarget::Category {
                category: category.slug.to_string(),
            })
        }),
    ]
    .into_iter()
    .flatten()
    .collect()
});

/// Lower-case the path and strip trailing slashes.
pub fn normalize_path(path: &str) -> String {
    let lowered = path.trim().to_lowercase();
    let trimmed = lowered.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Maps URL paths to page intents.
#[derive(Clone)]
pub struct PathClassifier {
    registry: Arc<Registry>,
    year: u16,
}

impl PathClassifier {
    pub const fn new(registry: Arc<Registry>, year: u16) -> Self {
        Self { registry, year }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Classify a path, returning [`Error::NotFound`] when no rule validates.
    pub fn classify(&self, path: &str) -> Result<PageIntent> {
        let normalized = normalize_path(path);

        let target = RULES
            .iter()
            .find_map(|(pattern, build)| {
                pattern
                    .captures(&normalized)
                    .and_then(|caps| build(&self.registry, &caps))
            })
            .ok_or_else(|| Error::NotFound(normalized.clone()))?;

        let seo = self.seo_metadata(&target);
        Ok(PageIntent {
            canonical_path: target.canonical_path(),
            seo,
            target,
        })
    }

    pub fn is_programmatic(&self, path: &str) -> bool {
        self.classify(path).is_ok()
    }

    /// Title, description and keywords derived from a validated target.
    fn seo_metadata(&self, target: &PageTarget) -> SeoMetadata {
        let year = self.year;
        let (title, description, keywords): (String, String, Vec<String>) = match target {
            PageTarget::Home => (
                format!("Best Online Trading Brokers {year} | Compare & Choose"),
                format!(
                    "Compare the best online trading brokers for {year}. Find regulated platforms for forex, stocks, crypto and more with competitive fees."
                ),
                vec![
                    "trading brokers".into(),
                    "online brokers".into(),
                    "forex".into(),
                    "stocks".into(),
                    "crypto".into(),
                    "compare".into(),
                    year.to_string(),
                ],
            ),
            PageTarget::Category { category } => {
                let (name, description) = self
                    .registry
                    .category(category)
                    .map_or_else(|| (format_slug(category), String::new()), |c| {
                        (c.name.to_string(), c.description.to_string())
                    });
                (
                    format!("Best {name} Brokers {year}"),
                    description,
                    vec![
                        name.to_lowercase(),
                        "brokers".into(),
                        "trading".into(),
                        year.to_string(),
                    ],
                )
            },
            PageTarget::Country { country } => {
                let (name, currency) = self.country_name_and_currency(country);
                (
                    format!("Best Trading Brokers in {name} {year}"),
                    format!(
                        "Find the top regulated brokers for traders in {name}. Compare fees, platforms and features."
                    ),
                    vec![
                        name.to_lowercase(),
                        "brokers".into(),
                        "trading".into(),
                        "regulated".into(),
                        currency.to_lowercase(),
                    ],
                )
            },
            PageTarget::CategoryCountry { category, country } => {
                let category_name = self
                    .registry
                    .category(category)
                    .map_or_else(|| format_slug(category), |c| c.name.to_string());
                let (country_name, currency) = self.country_name_and_currency(country);
                (
                    format!("Best {category_name} Brokers in {country_name} {year}"),
                    format!(
                        "Top {} brokers for traders in {country_name}. Compare regulated platforms with competitive fees.",
                        category_name.to_lowercase()
                    ),
                    vec![
                        category_name.to_lowercase(),
                        country_name.to_lowercase(),
                        "brokers".into(),
                        "trading".into(),
                        "regulated".into(),
                        currency.to_lowercase(),
                    ],
                )
            },
            PageTarget::Strategy { strategy } => {
                let name = format_slug(strategy);
                let lower = name.to_lowercase();
                (
                    format!("{name} Strategy Guide {year}"),
                    format!(
                        "Learn {lower} strategies with our comprehensive guide. Find brokers that support {lower}."
                    ),
                    vec![
                        lower,
                        "strategy".into(),
                        "trading".into(),
                        "guide".into(),
                        "brokers".into(),
                    ],
                )
            },
            PageTarget::Feature { feature } => {
                let name = format_slug(feature);
                let lower = name.to_lowercase();
                (
                    format!("Brokers with {name} {year}"),
                    format!(
                        "Find brokers offering {lower}. Compare the best platforms with {lower} features."
                    ),
                    vec![
                        lower,
                        "brokers".into(),
                        "trading".into(),
                        "platforms".into(),
                        "features".into(),
                    ],
                )
            },
            PageTarget::Broker { broker } => {
                let name = format_slug(broker);
                (
                    format!("Broker Review - {name}"),
                    format!(
                        "Read our comprehensive review of {name}. Learn about fees, platforms, regulations and features."
                    ),
                    vec![
                        name.to_lowercase(),
                        "broker".into(),
                        "review".into(),
                        "trading".into(),
                        "fees".into(),
                    ],
                )
            },
        };

        SeoMetadata {
            title,
            description,
            keywords,
        }
    }

    fn country_name_and_currency(&self, code: &str) -> (String, String) {
        self.registry.country(code).map_or_else(
            || (code.to_string(), String::new()),
            |c| (c.name.to_string(), c.currency.to_string()),
        )
    }
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::new(Arc::new(Registry::new()), crate::config::SiteConfig::default().year)
    }
}
