use once_cell::sync::Lazy;
use serde::Serialize;

/// A trading category with its display data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Category {
    /// URL slug, lower-case (e.g. `forex`)
    pub slug: &'static str,
    /// Display name used in titles (e.g. `Forex Trading`)
    pub name: &'static str,
    /// One-line description used as the category page description
    pub description: &'static str,
}

impl Category {
    const fn new(slug: &'static str, name: &'static str, description: &'static str) -> Self {
        Self {
            slug,
            name,
            description,
        }
    }
}

/// A country with the metadata used for prompts and SEO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Country {
    /// ISO 3166-1 alpha-2 code, upper-case
    pub code: &'static str,
    pub name: &'static str,
    pub region: &'static str,
    pub currency: &'static str,
    /// Primary financial regulator, when known
    pub regulator: Option<&'static str>,
}

impl Country {
    const fn new(
        code: &'static str,
        name: &'static str,
        region: &'static str,
        currency: &'static str,
    ) -> Self {
        Self {
            code,
            name,
            region,
            currency,
            regulator: None,
        }
    }

    const fn regulated_by(mut self, regulator: &'static str) -> Self {
        self.regulator = Some(regulator);
        self
    }
}

impl std::fmt::Display for Country {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.code, self.region)
    }
}

static BUILTIN: Lazy<Registry> = Lazy::new(Registry::new);

/// Frozen lookup tables of valid page parameters.
///
/// Everything the classifier accepts is listed here: an intent is only built
/// from slugs and codes this registry knows.
pub struct Registry {
    categories: Vec<Category>,
    countries: Vec<Country>,
    strategies: Vec<&'static str>,
    features: Vec<&'static str>,
}

impl Registry {
    /// Create a new registry with hardcoded entries
    pub fn new() -> Self {
        let categories = vec![
            Category::new(
                "forex",
                "Forex Trading",
                "Find the best forex brokers for currency trading",
            ),
            Category::new(
                "stocks",
                "Stock Trading",
                "Top brokers for stock and equity trading",
            ),
            Category::new(
                "crypto",
                "Cryptocurrency",
                "Best crypto exchanges and trading platforms",
            ),
            Category::new(
                "commodities",
                "Commodities",
                "Trade gold, oil, and other commodities",
            ),
            Category::new("indices", "Indices", "Trade global stock market indices"),
            Category::new(
                "options",
                "Options Trading",
                "Best platforms for options trading",
            ),
            Category::new(
                "futures",
                "Futures Trading",
                "Top futures brokers and platforms",
            ),
            Category::new(
                "cfd",
                "CFD Trading",
                "Best CFD brokers for leveraged trading",
            ),
            Category::new("etf", "ETF Trading", "Trade exchange-traded funds"),
            Category::new(
                "bonds",
                "Bond Trading",
                "Fixed income and bond trading platforms",
            ),
        ];

        let countries = vec![
            Country::new("US", "United States", "North America", "USD").regulated_by("SEC/CFTC"),
            Country::new("GB", "United Kingdom", "Europe", "GBP").regulated_by("FCA"),
            Country::new("DE", "Germany", "Europe", "EUR").regulated_by("BaFin"),
            Country::new("FR", "France", "Europe", "EUR").regulated_by("AMF"),
            Country::new("IT", "Italy", "Europe", "EUR").regulated_by("CONSOB"),
            Country::new("ES", "Spain", "Europe", "EUR").regulated_by("CNMV"),
            Country::new("NL", "Netherlands", "Europe", "EUR"),
            Country::new("SE", "Sweden", "Europe", "SEK"),
            Country::new("NO", "Norway", "Europe", "NOK"),
            Country::new("DK", "Denmark", "Europe", "DKK"),
            Country::new("FI", "Finland", "Europe", "EUR"),
            Country::new("AT", "Austria", "Europe", "EUR"),
            Country::new("BE", "Belgium", "Europe", "EUR"),
            Country::new("IE", "Ireland", "Europe", "EUR"),
            Country::new("PT", "Portugal", "Europe", "EUR"),
            Country::new("GR", "Greece", "Europe", "EUR"),
            Country::new("CH", "Switzerland", "Europe", "CHF"),
            Country::new("PL", "Poland", "Europe", "PLN"),
            Country::new("CZ", "Czech Republic", "Europe", "CZK"),
            Country::new("HU", "Hungary", "Europe", "HUF"),
            Country::new("RO", "Romania", "Europe", "RON"),
            Country::new("BG", "Bulgaria", "Europe", "BGN"),
            Country::new("HR", "Croatia", "Europe", "HRK"),
            Country::new("SI", "Slovenia", "Europe", "EUR"),
            Country::new("SK", "Slovakia", "Europe", "EUR"),
            Country::new("EE", "Estonia", "Europe", "EUR"),
            Country::new("LV", "Latvia", "Europe", "EUR"),
            Country::new("LT", "Lithuania", "Europe", "EUR"),
            Country::new("CY", "Cyprus", "Europe", "EUR"),
            Country::new("MT", "Malta", "Europe", "EUR"),
            Country::new("LU", "Luxembourg", "Europe", "EUR"),
            Country::new("CA", "Canada", "North America", "CAD").regulated_by("CIRO"),
            Country::new("AU", "Australia", "Oceania", "AUD").regulated_by("ASIC"),
            Country::new("NZ", "New Zealand", "Oceania", "NZD"),
            Country::new("JP", "Japan", "Asia", "JPY").regulated_by("FSA"),
            Country::new("SG", "Singapore", "Asia", "SGD").regulated_by("MAS"),
            Country::new("HK", "Hong Kong", "Asia", "HKD"),
            Country::new("CN", "China", "Asia", "CNY"),
            Country::new("IN", "India", "Asia", "INR"),
            Country::new("ID", "Indonesia", "Asia", "IDR"),
            Country::new("MY", "Malaysia", "Asia", "MYR"),
            Country::new("TH", "Thailand", "Asia", "THB"),
            Country::new("PH", "Philippines", "Asia", "PHP"),
            Country::new("VN", "Vietnam", "Asia", "VND"),
            Country::new("AE", "United Arab Emirates", "Middle East", "AED"),
            Country::new("SA", "Saudi Arabia", "Middle East", "SAR"),
            Country::new("ZA", "South Africa", "Africa", "ZAR"),
            Country::new("BR", "Brazil", "South America", "BRL"),
            Country::new("MX", "Mexico", "North America", "MXN"),
        ];

        let strategies = vec![
            "day-trading",
            "swing-trading",
            "position-trading",
            "scalping",
            "momentum",
            "breakout",
            "support-resistance",
            "trend-following",
            "mean-reversion",
            "arbitrage",
            "carry-trade",
            "news-trading",
        ];

        let features = vec![
            "low-spreads",
            "high-leverage",
            "fast-execution",
            "mobile-trading",
            "copy-trading",
            "algorithmic-trading",
            "social-trading",
            "islamic-account",
            "demo-account",
            "micro-account",
            "managed-account",
            "vip-account",
        ];

        Self {
            categories,
            countries,
            strategies,
            features,
        }
    }

    /// Shared process-wide instance of the built-in tables.
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Look up a category by slug (case-insensitive)
    pub fn category(&self, slug: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.slug.eq_ignore_ascii_case(slug))
    }

    /// Look up a country by ISO code (case-insensitive)
    pub fn country(&self, code: &str) -> Option<&Country> {
        self.countries
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(code))
    }

    pub fn is_strategy(&self, slug: &str) -> bool {
        self.strategies.contains(&slug)
    }

    pub fn is_feature(&self, slug: &str) -> bool {
        self.features.contains(&slug)
    }

    /// Countries in a region, in registry order
    pub fn countries_in_region(&self, region: &str) -> Vec<&Country> {
        self.countries
            .iter()
            .filter(|c| c.region.eq_ignore_ascii_case(region))
            .collect()
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub fn strategies(&self) -> &[&'static str] {
        &self.strategies
    }

    pub fn features(&self) -> &[&'static str] {
        &self.features
    }

    /// Every URL the classifier accepts apart from broker reviews, sorted.
    pub fn programmatic_urls(&self) -> Vec<String> {
        let mut urls = vec!["/".to_string()];

        urls.extend(self.categories.iter().map(|c| format!("/{}", c.slug)));
        urls.extend(
            self.countries
                .iter()
                .map(|c| format!("/country/{}", c.code.to_ascii_lowercase())),
        );
        for category in &self.categories {
            urls.extend(self.countries.iter().map(|country| {
                format!("/{}/{}", category.slug, country.code.to_ascii_lowercase())
            }));
        }
        urls.extend(self.strategies.iter().map(|s| format!("/{s}-strategy")));
        urls.extend(self.features.iter().map(|f| format!("/{f}-feature")));

        urls.sort();
        urls
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a kebab-case slug into a title (`day-trading` becomes `Day Trading`).
pub fn format_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}
