//! Deterministic analysis of generated text.
//!
//! Every function here is a best-effort scan with a fixed fallback: callers
//! always get something well-formed back, never an empty result where one
//! was requested.

use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

use super::GenerationContext;
use crate::registry::format_slug;
use crate::types::{ComparisonRow, Faq};

#[allow(clippy::expect_used)]
static QUESTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:What|How|Why|When|Where|Which|Who)\s+[^?]*\?").expect("valid question regex")
});

#[allow(clippy::expect_used)]
static NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.").expect("valid numbered regex"));

#[allow(clippy::expect_used)]
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").expect("valid sentence regex"));

/// Features scanned for comparison rows, in output order.
const COMPARISON_FEATURES: [&str; 6] = [
    "regulation",
    "fees",
    "platforms",
    "support",
    "instruments",
    "leverage",
];

#[allow(clippy::expect_used)]
static COMPARISON_LINES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    COMPARISON_FEATURES
        .iter()
        .map(|feature| {
            let pattern = format!(r"(?i){feature}[:\s]*([^\n]+)");
            (*feature, Regex::new(&pattern).expect("valid comparison regex"))
        })
        .collect()
});

/// Answers shorter than this are treated as noise.
const MIN_ANSWER_CHARS: usize = 20;
const WORDS_PER_MINUTE: usize = 200;
const DESCRIPTION_LIMIT: usize = 160;

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Minutes at 200 words per minute, rounded up.
pub const fn reading_time_minutes(words: usize) -> usize {
    words.div_ceil(WORDS_PER_MINUTE)
}

/// Inputs of [`quality_score`].
#[derive(Debug, Clone, Copy)]
pub struct QualityInputs<'a> {
    pub target_words: usize,
    pub keywords: &'a [String],
    pub latency: Duration,
    pub latency_threshold: Duration,
}

/// Heuristic quality in `[0, 1]`.
///
/// Starts at 0.5 and adds for length within 20% of target, paragraph breaks,
/// numbered content, a requested keyword, substantial length and fast
/// generation.
pub fn quality_score(text: &str, inputs: &QualityInputs<'_>) -> f64 {
    let mut score = 0.5;

    #[allow(clippy::cast_precision_loss)]
    let (words, target) = (word_count(text) as f64, inputs.target_words as f64);
    if words >= target * 0.8 && words <= target * 1.2 {
        score += 0.2;
    }

    if text.contains("\n\n") {
        score += 0.1;
    }
    if NUMBERED.is_match(text) {
        score += 0.1;
    }

    let lowered = text.to_lowercase();
    if inputs
        .keywords
        .iter()
        .any(|k| !k.is_empty() && lowered.contains(&k.to_lowercase()))
    {
        score += 0.05;
    }
    if text.len() > 500 {
        score += 0.05;
    }
    if inputs.latency < inputs.latency_threshold {
        score += 0.05;
    }

    f64::min(score, 1.0)
}

/// Question/answer pairs found in `text`, or generic ones from `context`.
///
/// An answer runs from the end of its question to the next blank line, or to
/// the end of the line when no blank line follows.
pub fn extract_faqs(text: &str, context: &GenerationContext, max: usize) -> Vec<Faq> {
    let faqs: Vec<Faq> = QUESTION
        .find_iter(text)
        .filter_map(|question| {
            let rest = &text[question.end()..];
            let answer = match text[question.start()..].find("\n\n") {
                Some(offset) => {
                    let end = question.start() + offset;
                    text.get(question.end()..end).unwrap_or_default()
                },
                None => rest.lines().next().unwrap_or_default(),
            }
            .trim();

            (answer.chars().count() > MIN_ANSWER_CHARS).then(|| Faq {
                question: question.as_str().trim().to_string(),
                answer: answer.to_string(),
            })
        })
        .take(max)
        .collect();

    if faqs.is_empty() {
        generic_faqs(context)
    } else {
        faqs
    }
}

/// Fallback FAQs built from the context alone. Always at least two.
pub fn generic_faqs(context: &GenerationContext) -> Vec<Faq> {
    let mut faqs = Vec::new();

    if let Some(subject) = context.category().or_else(|| context.strategy()) {
        faqs.push(Faq {
            question: format!("What is {subject} trading?"),
            answer: format!(
                "{subject} trading involves speculating on price movements of {subject} instruments through various financial platforms."
            ),
        });
    }

    if let Some(country) = context.country_name() {
        faqs.push(Faq {
            question: format!("Is trading regulated in {country}?"),
            answer: format!(
                "Yes, trading in {country} is regulated by local financial authorities to ensure investor protection and market integrity."
            ),
        });
    }

    if let Some(feature) = context.feature() {
        faqs.push(Faq {
            question: format!("Why does {feature} matter when choosing a broker?"),
            answer: format!(
                "{feature} affects trading costs and flexibility, so compare how each broker implements it before opening an account."
            ),
        });
    }

    faqs.push(Faq {
        question: "How do I choose the right broker?".to_string(),
        answer: "Consider factors like regulation, fees, trading platforms, customer support, and available instruments when selecting a broker.".to_string(),
    });

    if faqs.len() < 2 {
        faqs.push(Faq {
            question: "Is my money safe with a regulated broker?".to_string(),
            answer: "Regulated brokers must keep client funds segregated from company funds and follow the conduct rules of their licensing authority.".to_string(),
        });
    }

    faqs
}

/// Comparison rows for the known features mentioned in `text`, or rows
/// derived from `context` when none are.
pub fn extract_comparison(text: &str, context: &GenerationContext) -> Vec<ComparisonRow> {
    let rows: Vec<ComparisonRow> = COMPARISON_LINES
        .iter()
        .filter_map(|(feature, pattern)| {
            let value = pattern.captures(text)?.get(1)?.as_str().trim();
            (!value.is_empty()).then(|| ComparisonRow {
                feature: format_slug(feature),
                value: value.to_string(),
            })
        })
        .collect();

    if rows.is_empty() {
        fallback_comparison(context)
    } else {
        rows
    }
}

fn fallback_comparison(context: &GenerationContext) -> Vec<ComparisonRow> {
    let row = |feature: &str, value: &str| ComparisonRow {
        feature: feature.to_string(),
        value: value.to_string(),
    };

    let mut rows = Vec::new();
    if let Some(category) = context.category() {
        rows.push(row("Instruments", category));
    }
    if let Some(country) = context.country() {
        rows.push(row("Market", &country.name));
    }
    rows.push(row(
        "Regulation",
        context
            .country()
            .and_then(|c| c.regulator.as_deref())
            .unwrap_or("local authorities"),
    ));
    if let Some(feature) = context.feature() {
        rows.push(row("Feature", feature));
    }
    if let Some(strategy) = context.strategy() {
        rows.push(row("Strategy", strategy));
    }
    rows
}

/// Headline used in structured data.
pub fn headline(context: &GenerationContext, year: u16) -> String {
    match (context.category(), context.country_name()) {
        (Some(category), Some(country)) => format!("Best {category} Brokers in {country} {year}"),
        (Some(category), None) => format!("Best {category} Brokers {year}"),
        (None, Some(country)) => format!("Best Trading Brokers in {country} {year}"),
        (None, None) => {
            if let Some(strategy) = context.strategy() {
                format!("{strategy} Trading Strategy Guide")
            } else if let Some(feature) = context.feature() {
                format!("Brokers with {feature} - Complete Guide")
            } else {
                format!("Trading Broker Guide {year}")
            }
        },
    }
}

/// The first two sentences, cut to 160 characters.
pub fn extract_description(text: &str) -> String {
    let description = SENTENCE_END
        .split(text)
        .take(2)
        .collect::<Vec<_>>()
        .join(". ")
        .trim()
        .to_string();

    if description.chars().count() > DESCRIPTION_LIMIT {
        let cut: String = description.chars().take(DESCRIPTION_LIMIT - 3).collect();
        format!("{cut}...")
    } else {
        description
    }
}

/// A schema.org `Article` block for the generated text.
pub fn structured_data(
    text: &str,
    context: &GenerationContext,
    site_name: &str,
    year: u16,
    now: DateTime<Utc>,
) -> Value {
    let timestamp = now.to_rfc3339();
    let mut data = json!({
        "@context": "https://schema.org",
        "@type": "Article",
        "headline": headline(context, year),
        "description": extract_description(text),
        "datePublished": timestamp,
        "dateModified": timestamp,
        "author": { "@type": "Organization", "name": site_name },
        "publisher": { "@type": "Organization", "name": site_name },
    });

    if let Some(object) = data.as_object_mut() {
        if let Some(category) = context.category() {
            object.insert("about".to_string(), json!(category));
        }
        if let Some(country) = context.country_name() {
            object.insert(
                "spatialCoverage".to_string(),
                json!({ "@type": "Country", "name": country }),
            );
        }
    }
    data
}
