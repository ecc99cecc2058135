use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::brokers::BrokerRecord;

/// The kinds of page the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Home,
    Category,
    Country,
    CategoryCountry,
    Strategy,
    Feature,
    Broker,
}

impl PageKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Category => "category",
            Self::Country => "country",
            Self::CategoryCountry => "category_country",
            Self::Strategy => "strategy",
            Self::Feature => "feature",
            Self::Broker => "broker",
        }
    }

    /// Name of the page template a renderer should use.
    pub const fn template(self) -> &'static str {
        match self {
            Self::Home => "HomePage",
            Self::Category => "CategoryPage",
            Self::Country => "CountryPage",
            Self::CategoryCountry => "CategoryCountryPage",
            Self::Strategy => "StrategyPage",
            Self::Feature => "FeaturePage",
            Self::Broker => "BrokerReviewPage",
        }
    }
}

impl std::fmt::Display for PageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated page target: the kind together with the parameters it requires.
///
/// Category slugs are lower-case, country codes upper-case ISO alpha-2.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageTarget {
    Home,
    Category { category: String },
    Country { country: String },
    CategoryCountry { category: String, country: String },
    Strategy { strategy: String },
    Feature { feature: String },
    Broker { broker: String },
}

impl PageTarget {
    pub const fn kind(&self) -> PageKind {
        match self {
            Self::Home => PageKind::Home,
            Self::Category { .. } => PageKind::Category,
            Self::Country { .. } => PageKind::Country,
            Self::CategoryCountry { .. } => PageKind::CategoryCountry,
            Self::Strategy { .. } => PageKind::Strategy,
            Self::Feature { .. } => PageKind::Feature,
            Self::Broker { .. } => PageKind::Broker,
        }
    }

    /// Parameters as an ordered name/value map.
    pub fn params(&self) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        match self {
            Self::Home => {},
            Self::Category { category } => {
                params.insert("category", category.clone());
            },
            Self::Country { country } => {
                params.insert("country", country.clone());
            },
            Self::CategoryCountry { category, country } => {
                params.insert("category", category.clone());
                params.insert("country", country.clone());
            },
            Self::Strategy { strategy } => {
                params.insert("strategy", strategy.clone());
            },
            Self::Feature { feature } => {
                params.insert("feature", feature.clone());
            },
            Self::Broker { broker } => {
                params.insert("broker", broker.clone());
            },
        }
        params
    }

    /// Normalized path of the page.
    pub fn canonical_path(&self) -> String {
        match self {
            Self::Home => "/".to_string(),
            Self::Category { category } => format!("/{category}"),
            Self::Country { country } => format!("/country/{}", country.to_ascii_lowercase()),
            Self::CategoryCountry { category, country } => {
                format!("/{category}/{}", country.to_ascii_lowercase())
            },
            Self::Strategy { strategy } => format!("/{strategy}-strategy"),
            Self::Feature { feature } => format!("/{feature}-feature"),
            Self::Broker { broker } => format!("/broker/{broker}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoMetadata {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
}

/// The validated interpretation of a URL path.
///
/// Only [`classify`](crate::classifier::PathClassifier::classify) builds these,
/// after every parameter has been checked against the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageIntent {
    pub target: PageTarget,
    pub canonical_path: String,
    pub seo: SeoMetadata,
}

impl PageIntent {
    pub const fn kind(&self) -> PageKind {
        self.target.kind()
    }

    pub fn params(&self) -> BTreeMap<&'static str, String> {
        self.target.params()
    }

    pub const fn template(&self) -> &'static str {
        self.target.kind().template()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub feature: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl Breadcrumb {
    pub fn linked(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: Some(href.into()),
        }
    }

    pub fn current(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedPage {
    pub title: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub keywords: Vec<String>,
    pub structured_data: serde_json::Value,
    pub canonical: String,
    pub robots: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub page_type: PageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub generated_at: DateTime<Utc>,
    /// Quality score in `[0, 1]`
    pub content_quality: f64,
}

/// A fully assembled page, ready for any renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePayload {
    pub title: String,
    pub description: String,
    /// HTML-safe body
    pub content: String,
    pub meta: PageMeta,
    pub brokers: Vec<BrokerRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faqs: Option<Vec<Faq>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Vec<ComparisonRow>>,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub related_pages: Vec<RelatedPage>,
    pub analytics: Analytics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_are_ordered_and_complete() {
        let target = PageTarget::CategoryCountry {
            category: "forex".to_string(),
            country: "US".to_string(),
        };
        let params: Vec<_> = target.params().into_iter().collect();
        assert_eq!(
            params,
            vec![
                ("category", "forex".to_string()),
                ("country", "US".to_string())
            ]
        );
        assert!(PageTarget::Home.params().is_empty());
    }

    #[test]
    fn test_canonical_paths() {
        let cases = [
            (PageTarget::Home, "/"),
            (
                PageTarget::Country {
                    country: "GB".to_string(),
                },
                "/country/gb",
            ),
            (
                PageTarget::CategoryCountry {
                    category: "crypto".to_string(),
                    country: "DE".to_string(),
                },
                "/crypto/de",
            ),
            (
                PageTarget::Strategy {
                    strategy: "scalping".to_string(),
                },
                "/scalping-strategy",
            ),
            (
                PageTarget::Broker {
                    broker: "ig-markets".to_string(),
                },
                "/broker/ig-markets",
            ),
        ];
        for (target, expected) in cases {
            assert_eq!(target.canonical_path(), expected);
        }
    }

    #[test]
    fn test_target_serializes_with_kind_tag() {
        let target = PageTarget::Feature {
            feature: "low-spreads".to_string(),
        };
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "feature", "feature": "low-spreads"})
        );
    }

    #[test]
    fn test_breadcrumb_omits_missing_href() {
        let json = serde_json::to_string(&Breadcrumb::current("United States")).unwrap();
        assert_eq!(json, r#"{"label":"United States"}"#);
    }
}
