//! Template-driven content generation.
//!
//! [`ContentGenerator::generate`] selects a template from the typed request
//! context, assembles the prompt, asks the [`RateLimiter`] for a permit and
//! only then calls the [`TextBackend`]. The raw text is post-processed into
//! word counts, a quality score and, when requested, FAQs, comparison rows
//! and a structured-data block.
//!
//! Retries are not attempted here; the orchestrator owns retry policy.

mod backend;
mod postprocess;
mod template;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{Span, info, warn};

pub use backend::{HttpBackend, TextBackend};
pub use postprocess::{
    QualityInputs, extract_comparison, extract_description, extract_faqs, generic_faqs, headline,
    quality_score, reading_time_minutes, structured_data, word_count,
};
pub use template::{TemplateKind, build_prompt, select_template, variable_value};

use crate::config::{Config, GeneratorSettings, SiteConfig};
use crate::rate_limit::RateLimiter;
use crate::registry::Country;
use crate::types::{ComparisonRow, Faq};
use crate::{Error, Result};

/// Country data substituted into prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryContext {
    /// ISO code, upper-case
    pub code: String,
    /// Display name used in prompt text
    pub name: String,
    pub region: Option<String>,
    pub currency: Option<String>,
    pub regulator: Option<String>,
}

impl CountryContext {
    /// A country known only by code and name; region, currency and regulator use defaults.
    pub fn named(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            region: None,
            currency: None,
            regulator: None,
        }
    }
}

impl From<&Country> for CountryContext {
    fn from(country: &Country) -> Self {
        Self {
            code: country.code.to_string(),
            name: country.name.to_string(),
            region: Some(country.region.to_string()),
            currency: Some(country.currency.to_string()),
            regulator: country.regulator.map(str::to_string),
        }
    }
}

/// What to generate, with the fields each kind of content needs.
///
/// The variant decides the template family; the fields present inside it
/// pick the specific template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationContext {
    PageContent {
        /// Category display name (e.g. `Forex`)
        category: Option<String>,
        country: Option<CountryContext>,
    },
    MetaDescription {
        page_type: Option<String>,
        topic: Option<String>,
        /// Country display name
        country: Option<String>,
    },
    Article {
        strategy: String,
    },
    Comparison {
        feature: String,
    },
}

impl GenerationContext {
    pub fn category(&self) -> Option<&str> {
        match self {
            Self::PageContent { category, .. } => category.as_deref(),
            _ => None,
        }
    }

    pub const fn country(&self) -> Option<&CountryContext> {
        match self {
            Self::PageContent { country, .. } => country.as_ref(),
            _ => None,
        }
    }

    pub fn country_name(&self) -> Option<&str> {
        match self {
            Self::PageContent { country, .. } => country.as_ref().map(|c| c.name.as_str()),
            Self::MetaDescription { country, .. } => country.as_deref(),
            _ => None,
        }
    }

    pub fn strategy(&self) -> Option<&str> {
        match self {
            Self::Article { strategy } => Some(strategy),
            _ => None,
        }
    }

    pub fn feature(&self) -> Option<&str> {
        match self {
            Self::Comparison { feature } => Some(feature),
            _ => None,
        }
    }

    /// Explicit topic, else the first subject present.
    pub fn topic(&self) -> Option<&str> {
        match self {
            Self::MetaDescription {
                topic: Some(topic), ..
            } => Some(topic),
            _ => self
                .category()
                .or_else(|| self.country_name())
                .or_else(|| self.strategy())
                .or_else(|| self.feature()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Professional,
    Friendly,
    Technical,
    Promotional,
    Educational,
    Analytical,
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Professional => "professional",
            Self::Friendly => "friendly",
            Self::Technical => "technical",
            Self::Promotional => "promotional",
            Self::Educational => "educational",
            Self::Analytical => "analytical",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Length {
    Short,
    #[default]
    Medium,
    Long,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub include_faqs: bool,
    pub include_comparison: bool,
    pub include_structured_data: bool,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl GenerationOptions {
    /// FAQs, comparison rows and structured data.
    pub const fn everything() -> Self {
        Self {
            include_faqs: true,
            include_comparison: true,
            include_structured_data: true,
            max_tokens: None,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub context: GenerationContext,
    pub audience: Option<String>,
    pub tone: Option<Tone>,
    pub length: Length,
    pub keywords: Vec<String>,
    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(context: GenerationContext) -> Self {
        Self {
            context,
            audience: None,
            tone: None,
            length: Length::default(),
            keywords: Vec::new(),
            options: GenerationOptions::default(),
        }
    }

    #[must_use]
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    #[must_use]
    pub const fn tone(mut self, tone: Tone) -> Self {
        self.tone = Some(tone);
        self
    }

    #[must_use]
    pub const fn length(mut self, length: Length) -> Self {
        self.length = length;
        self
    }

    #[must_use]
    pub fn keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    #[must_use]
    pub fn options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub text: String,
    pub template: TemplateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faqs: Option<Vec<Faq>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_rows: Option<Vec<ComparisonRow>>,
    /// In `[0, 1]`
    pub quality_score: f64,
    pub word_count: usize,
    pub reading_time_minutes: usize,
    pub generated_at: DateTime<Utc>,
    pub model: String,
}

/// Builds prompts, calls the backend under the rate limit, and analyses the output.
pub struct ContentGenerator {
    backend: Arc<dyn TextBackend>,
    limiter: Arc<RateLimiter>,
    settings: GeneratorSettings,
    site: SiteConfig,
    identity: String,
}

impl ContentGenerator {
    pub fn new(backend: Arc<dyn TextBackend>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            backend,
            limiter,
            settings: GeneratorSettings::default(),
            site: SiteConfig::default(),
            identity: crate::config::RateLimitSettings::default().identity,
        }
    }

    /// Generator configured from the `[generator]`, `[site]` and `[rate_limit]` sections.
    pub fn from_config(
        backend: Arc<dyn TextBackend>,
        limiter: Arc<RateLimiter>,
        config: &Config,
    ) -> Self {
        Self {
            backend,
            limiter,
            settings: config.generator.clone(),
            site: config.site.clone(),
            identity: config.rate_limit.identity.clone(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: GeneratorSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_site(mut self, site: SiteConfig) -> Self {
        self.site = site;
        self
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Generate content for `request`.
    ///
    /// # Errors
    ///
    /// - [`Error::Template`] when no template fits the context
    /// - [`Error::RateLimitExceeded`] when the backend quota is spent; the
    ///   backend is not contacted
    /// - [`Error::Generation`] when the backend fails, times out, or returns
    ///   empty or too-short output
    #[tracing::instrument(skip(self, request), fields(template = tracing::field::Empty))]
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let template = select_template(&request.context)?;
        Span::current().record("template", template.id());
        let prompt = build_prompt(template, request)?;

        let decision = self.limiter.check_limit(&self.identity);
        if !decision.allowed {
            let retry_after_secs = decision.retry_after_secs.unwrap_or(1);
            warn!(retry_after_secs, "generation quota exhausted");
            return Err(Error::RateLimitExceeded { retry_after_secs });
        }

        let timeout = Duration::from_millis(self.settings.timeout_ms);
        let started = Instant::now();
        let text = tokio::time::timeout(timeout, self.backend.complete(&prompt))
            .await
            .map_err(|_| {
                Error::Generation(format!(
                    "backend timed out after {}ms",
                    self.settings.timeout_ms
                ))
            })?
            .map_err(|e| match e {
                Error::Io(_) | Error::Network(_) | Error::Other(_) => {
                    Error::Generation(e.to_string())
                },
                other => other,
            })?;
        let latency = started.elapsed();

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(Error::Generation("backend returned empty output".to_string()));
        }
        if text.chars().count() < self.settings.min_output_chars {
            return Err(Error::Generation(format!(
                "backend output too short ({} chars, need {})",
                text.chars().count(),
                self.settings.min_output_chars
            )));
        }

        let result = self.analyse(text, template, request, latency);
        info!(
            words = result.word_count,
            quality = result.quality_score,
            latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            "generated content"
        );
        Ok(result)
    }

    fn analyse(
        &self,
        text: String,
        template: TemplateKind,
        request: &GenerationRequest,
        latency: Duration,
    ) -> GenerationResult {
        let now = Utc::now();
        let words = word_count(&text);
        let quality = quality_score(
            &text,
            &QualityInputs {
                target_words: template.target_words(request.length),
                keywords: &request.keywords,
                latency,
                latency_threshold: Duration::from_millis(self.settings.latency_threshold_ms),
            },
        );

        let options = &request.options;
        let context = &request.context;
        GenerationResult {
            structured_data: options.include_structured_data.then(|| {
                structured_data(&text, context, &self.site.name, self.site.year, now)
            }),
            faqs: options
                .include_faqs
                .then(|| extract_faqs(&text, context, self.settings.max_faqs)),
            comparison_rows: options
                .include_comparison
                .then(|| extract_comparison(&text, context)),
            quality_score: quality,
            word_count: words,
            reading_time_minutes: reading_time_minutes(words),
            generated_at: now,
            model: self.backend.model().to_string(),
            template,
            text,
        }
    }
}
