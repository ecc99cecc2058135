//! Prompt templates and variable substitution.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{GenerationContext, GenerationRequest, Length};
use crate::{Error, Result};

/// Matches any `{name}` placeholder left in an assembled prompt.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\{[A-Za-z][A-Za-z0-9_]*\}").expect("valid placeholder regex")
});

/// The fixed set of prompt templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    CategoryPage,
    CountryPage,
    CategoryCountryPage,
    MetaDescription,
    StrategyGuide,
    FeatureComparison,
}

impl TemplateKind {
    pub const ALL: [Self; 6] = [
        Self::CategoryPage,
        Self::CountryPage,
        Self::CategoryCountryPage,
        Self::MetaDescription,
        Self::StrategyGuide,
        Self::FeatureComparison,
    ];

    pub const fn id(self) -> &'static str {
        match self {
            Self::CategoryPage => "category_page",
            Self::CountryPage => "country_page",
            Self::CategoryCountryPage => "category_country_page",
            Self::MetaDescription => "meta_description",
            Self::StrategyGuide => "strategy_guide",
            Self::FeatureComparison => "feature_comparison",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::CategoryPage => "Category Page Content",
            Self::CountryPage => "Country Page Content",
            Self::CategoryCountryPage => "Category-Country Page Content",
            Self::MetaDescription => "Meta Description",
            Self::StrategyGuide => "Strategy Guide Content",
            Self::FeatureComparison => "Feature Comparison Content",
        }
    }

    /// Variables the prompt text references, each always substituted.
    pub const fn variables(self) -> &'static [&'static str] {
        match self {
            Self::CategoryPage => &["category", "country", "targetAudience", "keywords"],
            Self::CountryPage => &[
                "country",
                "region",
                "currency",
                "regulatoryAuthority",
                "targetAudience",
                "keywords",
            ],
            Self::CategoryCountryPage => &[
                "category",
                "country",
                "region",
                "currency",
                "targetAudience",
                "keywords",
            ],
            Self::MetaDescription => &["pageType", "topic", "country", "keywords"],
            Self::StrategyGuide => &[
                "strategy",
                "experienceLevel",
                "tradingStyle",
                "timeframes",
                "targetAudience",
                "keywords",
            ],
            Self::FeatureComparison => &["feature", "targetAudience", "keywords"],
        }
    }

    /// Word count the generated text should land near.
    pub const fn target_words(self, length: Length) -> usize {
        match self {
            Self::MetaDescription => 30,
            Self::CategoryPage | Self::CountryPage | Self::CategoryCountryPage => match length {
                Length::Short => 600,
                Length::Medium => 1000,
                Length::Long => 1500,
            },
            Self::StrategyGuide => match length {
                Length::Short => 800,
                Length::Medium => 1500,
                Length::Long => 2000,
            },
            Self::FeatureComparison => 800,
        }
    }

    pub const fn prompt(self) -> &'static str {
        match self {
            Self::CategoryPage => CATEGORY_PAGE,
            Self::CountryPage => COUNTRY_PAGE,
            Self::CategoryCountryPage => CATEGORY_COUNTRY_PAGE,
            Self::MetaDescription => META_DESCRIPTION,
            Self::StrategyGuide => STRATEGY_GUIDE,
            Self::FeatureComparison => FEATURE_COMPARISON,
        }
    }
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Pick the template for a context. The most specific shape wins.
///
/// # Errors
///
/// Returns [`Error::Template`] for page content with neither a category nor a
/// country, which no template covers.
pub fn select_template(context: &GenerationContext) -> Result<TemplateKind> {
    match context {
        GenerationContext::PageContent {
            category: Some(_),
            country: Some(_),
        } => Ok(TemplateKind::CategoryCountryPage),
        GenerationContext::PageContent {
            category: Some(_),
            country: None,
        } => Ok(TemplateKind::CategoryPage),
        GenerationContext::PageContent {
            category: None,
            country: Some(_),
        } => Ok(TemplateKind::CountryPage),
        GenerationContext::PageContent {
            category: None,
            country: None,
        } => Err(Error::Template(
            "page content needs a category or a country".to_string(),
        )),
        GenerationContext::MetaDescription { .. } => Ok(TemplateKind::MetaDescription),
        GenerationContext::Article { .. } => Ok(TemplateKind::StrategyGuide),
        GenerationContext::Comparison { .. } => Ok(TemplateKind::FeatureComparison),
    }
}

/// Value of one template variable, falling back to its documented default.
pub fn variable_value(variable: &str, request: &GenerationRequest) -> String {
    let ctx = &request.context;
    let country = ctx.country();
    let audience = request.audience.as_deref();

    match variable {
        "category" => ctx.category().unwrap_or("trading").to_string(),
        "country" => ctx.country_name().unwrap_or("global").to_string(),
        "region" => country
            .and_then(|c| c.region.as_deref())
            .unwrap_or("global")
            .to_string(),
        "currency" => country
            .and_then(|c| c.currency.as_deref())
            .unwrap_or("USD")
            .to_string(),
        "regulatoryAuthority" => country
            .and_then(|c| c.regulator.as_deref())
            .unwrap_or("local authorities")
            .to_string(),
        "targetAudience" => audience.unwrap_or("traders of all levels").to_string(),
        "keywords" => request.keywords.join(", "),
        "pageType" => match ctx {
            GenerationContext::MetaDescription {
                page_type: Some(page_type),
                ..
            } => page_type.clone(),
            _ => "informational".to_string(),
        },
        "topic" => ctx.topic().unwrap_or("trading").to_string(),
        "strategy" => ctx.strategy().unwrap_or("trading").to_string(),
        "experienceLevel" => pick(
            audience.is_some_and(|a| a.contains("beginner")),
            "beginner",
            "intermediate",
        ),
        "tradingStyle" => pick(
            contains_ignore_case(ctx.strategy(), "day"),
            "day trading",
            "swing trading",
        ),
        "timeframes" => pick(
            contains_ignore_case(ctx.strategy(), "scalping"),
            "1-5 minutes",
            "4 hours - daily",
        ),
        "feature" => ctx.feature().unwrap_or("trading features").to_string(),
        _ => String::new(),
    }
}

fn pick(condition: bool, yes: &str, no: &str) -> String {
    if condition { yes } else { no }.to_string()
}

fn contains_ignore_case(value: Option<&str>, needle: &str) -> bool {
    value.is_some_and(|v| v.to_ascii_lowercase().contains(needle))
}

/// Substitute every variable of `template` and append option instructions.
///
/// # Errors
///
/// Returns [`Error::Template`] if a placeholder survives substitution.
pub fn build_prompt(template: TemplateKind, request: &GenerationRequest) -> Result<String> {
    let mut prompt = template.prompt().to_string();
    for variable in template.variables() {
        let value = variable_value(variable, request);
        prompt = prompt.replace(&format!("{{{variable}}}"), &value);
    }

    if let Some(placeholder) = PLACEHOLDER.find(&prompt) {
        return Err(Error::Template(format!(
            "{template} left {} unresolved",
            placeholder.as_str()
        )));
    }

    let options = &request.options;
    if let Some(max_tokens) = options.max_tokens {
        prompt.push_str(&format!("\n\nMaximum tokens: {max_tokens}"));
    }
    if let Some(temperature) = options.temperature {
        prompt.push_str(&format!("\n\nTemperature: {temperature}"));
    }
    if let Some(tone) = request.tone {
        prompt.push_str(&format!("\n\nTone: {tone}"));
    }

    Ok(prompt)
}

const CATEGORY_PAGE: &str = "\
Generate comprehensive content for a {category} trading category page targeting {country} traders.

Requirements:
- Professional yet accessible tone
- 800-1200 words
- Include key benefits and considerations
- Mention top regulatory requirements
- Highlight important features to look for
- Include practical tips for beginners
- Add comparison points for broker selection
- End with clear call-to-action

Context:
- Category: {category}
- Country: {country}
- Target Audience: {targetAudience}
- Keywords: {keywords}

Structure:
1. Introduction to {category} trading
2. Benefits of {category} trading in {country}
3. Regulatory considerations
4. How to choose the best {category} broker
5. Key features and tools
6. Getting started guide
7. Conclusion

Generate the content now:";

const COUNTRY_PAGE: &str = "\
Create comprehensive content for trading brokers in {country}.

Requirements:
- Professional and informative tone
- 1000-1500 words
- Cover regulatory landscape
- Include tax considerations
- Mention popular trading instruments
- Highlight local market specifics
- Include broker selection criteria
- Add practical guidance

Context:
- Country: {country}
- Region: {region}
- Currency: {currency}
- Regulatory Authority: {regulatoryAuthority}
- Target Audience: {targetAudience}
- Keywords: {keywords}

Structure:
1. Trading landscape in {country}
2. Regulatory framework and investor protection
3. Tax implications for traders
4. Popular trading instruments and markets
5. How to choose a broker in {country}
6. Local trading considerations
7. Recommended broker features
8. Getting started guide

Generate the content now:";

const CATEGORY_COUNTRY_PAGE: &str = "\
Generate specialized content for {category} trading in {country}.

Requirements:
- Highly targeted and specific content
- 900-1300 words
- Combine category expertise with local market knowledge
- Include country-specific regulations for {category}
- Mention local broker options
- Highlight unique opportunities
- Provide actionable advice

Context:
- Category: {category}
- Country: {country}
- Region: {region}
- Currency: {currency}
- Target Audience: {targetAudience}
- Keywords: {keywords}

Structure:
1. {category} trading opportunities in {country}
2. Regulatory requirements for {category} trading
3. Market specifics and trading hours
4. Top {category} brokers serving {country}
5. Platform and tool recommendations
6. Risk management strategies
7. Tax considerations for {category} traders
8. Getting started checklist

Generate the content now:";

const META_DESCRIPTION: &str = "\
Create a compelling meta description (150-160 characters) for a {pageType} page about {topic} targeting {country}.

Requirements:
- Include primary keyword naturally
- Compelling and clickable
- Clear value proposition
- Call-to-action oriented
- Under 160 characters

Context:
- Page Type: {pageType}
- Topic: {topic}
- Country: {country}
- Keywords: {keywords}

Generate the meta description:";

const STRATEGY_GUIDE: &str = "\
Create a comprehensive guide for {strategy} trading strategy.

Requirements:
- Educational and practical tone
- 1200-1800 words
- Step-by-step instructions
- Include examples and case studies
- Risk management section
- Tool and indicator recommendations
- Common mistakes to avoid

Context:
- Strategy: {strategy}
- Experience Level: {experienceLevel}
- Trading Style: {tradingStyle}
- Timeframes: {timeframes}
- Target Audience: {targetAudience}
- Keywords: {keywords}

Structure:
1. What is {strategy} trading?
2. How {strategy} strategy works
3. Required tools and indicators
4. Step-by-step implementation
5. Risk management techniques
6. Examples and case studies
7. Common mistakes and how to avoid them
8. Tips for success
9. Conclusion

Generate the comprehensive guide now:";

const FEATURE_COMPARISON: &str = "\
Create detailed comparison content for brokers offering {feature}.

Requirements:
- Comparative and analytical tone
- 800-1200 words
- Feature-by-feature analysis
- Include pros and cons
- Provider recommendations
- Selection criteria

Context:
- Feature: {feature}
- Target Audience: {targetAudience}
- Keywords: {keywords}

Structure:
1. What is {feature} and why it matters
2. Key aspects to evaluate
3. Top providers comparison
4. Detailed feature analysis
5. Pros and cons of each option
6. Selection criteria and recommendations
7. Implementation tips
8. Conclusion

Generate the comparison content now:";

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::generator::{CountryContext, GenerationOptions, Tone};

    fn us() -> CountryContext {
        CountryContext {
            code: "US".to_string(),
            name: "United States".to_string(),
            region: Some("North America".to_string()),
            currency: Some("USD".to_string()),
            regulator: Some("SEC/CFTC".to_string()),
        }
    }

    fn page(category: Option<&str>, country: Option<CountryContext>) -> GenerationRequest {
        GenerationRequest::new(GenerationContext::PageContent {
            category: category.map(str::to_string),
            country,
        })
    }

    #[test]
    fn test_combined_shape_selects_combined_template() {
        let both = page(Some("Forex"), Some(us()));
        assert_eq!(
            select_template(&both.context).unwrap(),
            TemplateKind::CategoryCountryPage
        );
        assert_eq!(
            select_template(&page(Some("Forex"), None).context).unwrap(),
            TemplateKind::CategoryPage
        );
        assert_eq!(
            select_template(&page(None, Some(us())).context).unwrap(),
            TemplateKind::CountryPage
        );
    }

    #[test]
    fn test_shapeless_page_content_is_a_template_error() {
        let err = select_template(&page(None, None).context).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn test_every_template_resolves_with_defaults_only() {
        let contexts = [
            GenerationContext::PageContent {
                category: Some("Forex".into()),
                country: None,
            },
            GenerationContext::PageContent {
                category: None,
                country: Some(CountryContext::named("NZ", "New Zealand")),
            },
            GenerationContext::PageContent {
                category: Some("Forex".into()),
                country: Some(CountryContext::named("NZ", "New Zealand")),
            },
            GenerationContext::MetaDescription {
                page_type: None,
                topic: None,
                country: None,
            },
            GenerationContext::Article {
                strategy: "Scalping".into(),
            },
            GenerationContext::Comparison {
                feature: "Low Spreads".into(),
            },
        ];

        for context in contexts {
            let request = GenerationRequest::new(context);
            let template = select_template(&request.context).unwrap();
            let prompt = build_prompt(template, &request).unwrap();
            assert!(!PLACEHOLDER.is_match(&prompt), "{template}: {prompt}");
        }
    }

    #[test]
    fn test_country_defaults() {
        let request = page(None, Some(CountryContext::named("NZ", "New Zealand")));
        let prompt = build_prompt(TemplateKind::CountryPage, &request).unwrap();
        assert!(prompt.contains("- Country: New Zealand"));
        assert!(prompt.contains("- Region: global"));
        assert!(prompt.contains("- Currency: USD"));
        assert!(prompt.contains("- Regulatory Authority: local authorities"));
        assert!(prompt.contains("- Target Audience: traders of all levels"));
    }

    #[test]
    fn test_country_metadata_substituted() {
        let mut request = page(Some("Forex"), Some(us()));
        request.keywords = vec!["forex brokers".into(), "united states".into()];
        let prompt = build_prompt(TemplateKind::CategoryCountryPage, &request).unwrap();
        assert!(prompt.starts_with("Generate specialized content for Forex trading in United States."));
        assert!(prompt.contains("- Region: North America"));
        assert!(prompt.contains("- Keywords: forex brokers, united states"));
    }

    #[test]
    fn test_strategy_derived_variables() {
        let mut request = GenerationRequest::new(GenerationContext::Article {
            strategy: "Scalping".into(),
        });
        request.audience = Some("beginner traders".into());
        let prompt = build_prompt(TemplateKind::StrategyGuide, &request).unwrap();
        assert!(prompt.contains("- Experience Level: beginner"));
        assert!(prompt.contains("- Trading Style: swing trading"));
        assert!(prompt.contains("- Timeframes: 1-5 minutes"));

        let day = GenerationRequest::new(GenerationContext::Article {
            strategy: "Day Trading".into(),
        });
        let prompt = build_prompt(TemplateKind::StrategyGuide, &day).unwrap();
        assert!(prompt.contains("- Experience Level: intermediate"));
        assert!(prompt.contains("- Trading Style: day trading"));
        assert!(prompt.contains("- Timeframes: 4 hours - daily"));
    }

    #[test]
    fn test_meta_topic_and_page_type() {
        let request = GenerationRequest::new(GenerationContext::MetaDescription {
            page_type: Some("broker".into()),
            topic: Some("IG Markets".into()),
            country: None,
        });
        let prompt = build_prompt(TemplateKind::MetaDescription, &request).unwrap();
        assert!(prompt.contains("for a broker page about IG Markets targeting global."));
    }

    #[test]
    fn test_options_append_instructions() {
        let mut request = GenerationRequest::new(GenerationContext::Comparison {
            feature: "Low Spreads".into(),
        });
        request.options = GenerationOptions {
            max_tokens: Some(2048),
            temperature: Some(0.7),
            ..GenerationOptions::default()
        };
        request.tone = Some(Tone::Analytical);
        let prompt = build_prompt(TemplateKind::FeatureComparison, &request).unwrap();
        assert!(prompt.ends_with("\n\nMaximum tokens: 2048\n\nTemperature: 0.7\n\nTone: analytical"));
    }

    #[test]
    fn test_target_words() {
        assert_eq!(TemplateKind::MetaDescription.target_words(Length::Long), 30);
        assert_eq!(TemplateKind::CategoryPage.target_words(Length::Short), 600);
        assert_eq!(TemplateKind::CountryPage.target_words(Length::Medium), 1000);
        assert_eq!(TemplateKind::StrategyGuide.target_words(Length::Long), 2000);
        assert_eq!(TemplateKind::FeatureComparison.target_words(Length::Short), 800);
    }

    #[test]
    fn test_declared_variables_match_prompt_text() {
        for template in TemplateKind::ALL {
            for variable in template.variables() {
                assert!(
                    template.prompt().contains(&format!("{{{variable}}}")),
                    "{template} declares unused {variable}"
                );
            }
        }
    }
}
