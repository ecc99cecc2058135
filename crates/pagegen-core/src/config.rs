//! Configuration management for the page pipeline.
//!
//! Settings are grouped by the component they tune and stored as TOML. Every
//! section has sensible defaults, so an empty or missing file is a valid
//! configuration.
//!
//! ## Configuration Hierarchy
//!
//! 1. **Defaults**: compiled into [`Config::default`]
//! 2. **Global config**: `global.toml` in the platform config directory
//! 3. **Environment variables**: `PAGEGEN_*` prefix, applied by [`Config::apply_env`]
//!
//! ## Example Configuration File
//!
//! ```toml
//! [site]
//! name = "Broker Analysis"
//! year = 2025
//!
//! [cache]
//! memory_budget_bytes = 52428800
//! default_ttl_secs = 86400
//!
//! [rate_limit]
//! window_ms = 60000
//! max_requests = 10
//!
//! [generator]
//! endpoint = "https://llm.internal/v1/complete"
//! model = "gemini-pro"
//! timeout_ms = 30000
//! ```
//!
//! ```rust
//! use pagegen_core::Config;
//!
//! let config: Config = toml::from_str("[rate_limit]\nmax_requests = 3\n")?;
//! assert_eq!(config.rate_limit.max_requests, 3);
//! assert_eq!(config.rate_limit.window_ms, 60_000);
//! config.validate()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "global.toml";

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Static site inputs used in SEO metadata
    pub site: SiteConfig,
    /// Two-tier cache settings
    pub cache: CacheSettings,
    /// Generation backend rate limiting
    pub rate_limit: RateLimitSettings,
    /// Generation backend and post-processing
    pub generator: GeneratorSettings,
    /// Page assembly and retry policy
    pub orchestrator: OrchestratorSettings,
}

/// Static site inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Organisation name placed in structured data.
    pub name: String,
    /// Year shown in page titles and keywords.
    ///
    /// Fixed in configuration rather than read from the clock so that
    /// classification stays deterministic.
    pub year: u16,
    /// Absolute origin prepended to canonical paths, empty for relative links.
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Broker Analysis".to_string(),
            year: 2025,
            base_url: String::new(),
        }
    }
}

/// Cache tier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Byte budget of the in-process tier.
    pub memory_budget_bytes: usize,
    /// TTL applied when a write does not specify one.
    pub default_ttl_secs: u64,
    /// How often the background sweeper removes expired entries.
    pub sweep_interval_secs: u64,
    /// Directory of the file-backed durable tier.
    ///
    /// `None` resolves to the platform data directory, see [`Config::durable_dir`].
    pub durable_dir: Option<PathBuf>,
    /// Fraction of the budget that eviction shrinks usage down to.
    pub eviction_target_ratio: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memory_budget_bytes: 50 * 1024 * 1024,
            default_ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 60 * 60,
            durable_dir: None,
            eviction_target_ratio: 0.8,
        }
    }
}

/// Fixed-window limits for the generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Permits per window.
    pub max_requests: u32,
    /// Caller identity used for generation calls.
    pub identity: String,
    /// Hygiene sweep interval, defaults to the window length.
    pub cleanup_interval_ms: Option<u64>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 10,
            identity: "ai-content-generation".to_string(),
            cleanup_interval_ms: None,
        }
    }
}

impl RateLimitSettings {
    /// Window length as a [`Duration`].
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Interval of the hygiene sweep.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms.unwrap_or(self.window_ms))
    }
}

/// Generation backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// HTTP endpoint of the text-generation backend.
    pub endpoint: Option<String>,
    /// Bearer token sent to the endpoint.
    pub api_key: Option<String>,
    /// Model name forwarded to the backend and recorded in results.
    pub model: String,
    /// Per-call backend timeout.
    pub timeout_ms: u64,
    /// Output shorter than this is treated as a failed generation.
    pub min_output_chars: usize,
    /// Latency below which the quality score gets its timing bonus.
    pub latency_threshold_ms: u64,
    /// Maximum FAQs extracted from generated text.
    pub max_faqs: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: "gemini-pro".to_string(),
            timeout_ms: 30_000,
            min_output_chars: 50,
            latency_threshold_ms: 10_000,
            max_faqs: 5,
        }
    }
}

/// Page assembly settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Overall deadline of one `get_page` call.
    pub page_deadline_ms: u64,
    /// TTL of assembled pages.
    pub page_ttl_secs: u64,
    /// Cap on related-page links.
    pub max_related_pages: usize,
    /// Brokers listed on the home page.
    pub home_broker_limit: usize,
    /// Extra attempts after a generation failure.
    pub generation_retries: u32,
    /// Initial backoff between attempts, doubled each time.
    pub retry_backoff_ms: u64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            page_deadline_ms: 60_000,
            page_ttl_secs: 24 * 60 * 60,
            max_related_pages: 5,
            home_broker_limit: 10,
            generation_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config directory cannot be determined (unsupported platform)
    /// - The config file exists but cannot be read
    /// - The config file exists but contains invalid TOML
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Save the configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save the configuration to an explicit file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::Config("Invalid config path".into()))?;

        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content).map_err(|e| Error::Config(format!("Failed to write config: {e}")))
    }

    /// Apply `PAGEGEN_*` environment overrides.
    ///
    /// Recognized variables: `PAGEGEN_GENERATOR_ENDPOINT`,
    /// `PAGEGEN_GENERATOR_API_KEY`, `PAGEGEN_CACHE_DIR`, `PAGEGEN_RATE_LIMIT_MAX`.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(endpoint) = lookup("PAGEGEN_GENERATOR_ENDPOINT") {
            self.generator.endpoint = Some(endpoint);
        }
        if let Some(key) = lookup("PAGEGEN_GENERATOR_API_KEY") {
            self.generator.api_key = Some(key);
        }
        if let Some(dir) = lookup("PAGEGEN_CACHE_DIR") {
            self.cache.durable_dir = Some(PathBuf::from(dir));
        }
        if let Some(max) = lookup("PAGEGEN_RATE_LIMIT_MAX") {
            self.rate_limit.max_requests = max.trim().parse().map_err(|_| {
                Error::Config(format!("PAGEGEN_RATE_LIMIT_MAX is not a number: {max}"))
            })?;
        }
        Ok(())
    }

    /// Reject values that would make a component misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.window_ms == 0 {
            return Err(Error::Config("rate_limit.window_ms must be positive".into()));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(Error::Config(
                "rate_limit.max_requests must be positive".into(),
            ));
        }
        if self.cache.memory_budget_bytes == 0 {
            return Err(Error::Config(
                "cache.memory_budget_bytes must be positive".into(),
            ));
        }
        if self.cache.default_ttl_secs == 0 || self.orchestrator.page_ttl_secs == 0 {
            return Err(Error::Config("cache TTLs must be positive".into()));
        }
        let ratio = self.cache.eviction_target_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(Error::Config(format!(
                "cache.eviction_target_ratio must be in (0, 1], got {ratio}"
            )));
        }
        if self.generator.timeout_ms == 0 || self.orchestrator.page_deadline_ms == 0 {
            return Err(Error::Config("timeouts must be positive".into()));
        }
        Ok(())
    }

    /// Directory of the file-backed durable tier.
    pub fn durable_dir(&self) -> PathBuf {
        self.cache.durable_dir.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("dev", "pagegen", "pagegen").map_or_else(
                || {
                    directories::BaseDirs::new().map_or_else(
                        || PathBuf::from(".pagegen/cache"),
                        |base| base.home_dir().join(".pagegen").join("cache"),
                    )
                },
                |dirs| dirs.data_dir().join("cache"),
            )
        })
    }

    /// Path of the global configuration file.
    ///
    /// - Linux: `~/.config/pagegen/global.toml`
    /// - macOS: `~/Library/Application Support/dev.pagegen.pagegen/global.toml`
    /// - Windows: `%APPDATA%\pagegen\pagegen\config\global.toml`
    pub fn config_path() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("dev", "pagegen", "pagegen")
            .ok_or_else(|| Error::Config("Failed to determine project directories".into()))?;

        Ok(project_dirs.config_dir().join(CONFIG_FILE))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_values() {
        // Given: Default configuration is requested
        let config = Config::default();

        // Then: Defaults match the documented values
        assert_eq!(config.cache.memory_budget_bytes, 50 * 1024 * 1024);
        assert_eq!(config.cache.default_ttl_secs, 86_400);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.cleanup_interval(), Duration::from_secs(60));
        assert_eq!(config.generator.model, "gemini-pro");
        assert_eq!(config.orchestrator.max_related_pages, 5);
        assert_eq!(config.site.year, 2025);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        // Given: A file overriding a single key
        let config: Config = toml::from_str("[cache]\ndefault_ttl_secs = 60\n").unwrap();

        // Then: Untouched sections and keys keep their defaults
        assert_eq!(config.cache.default_ttl_secs, 60);
        assert!((config.cache.eviction_target_ratio - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.generator, GeneratorSettings::default());
    }

    #[test]
    fn test_config_save_and_load_roundtrip() -> Result<()> {
        // Given: A temporary directory and a customized configuration
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("nested").join("global.toml");
        let mut original = Config::default();
        original.generator.endpoint = Some("http://localhost:9000/complete".into());
        original.cache.durable_dir = Some(temp_dir.path().join("cache"));
        original.orchestrator.generation_retries = 2;

        // When: Saving and loading it back
        original.save_to(&path)?;
        let loaded = Config::load_from(&path)?;

        // Then: Both are identical
        assert_eq!(loaded, original);
        Ok(())
    }

    #[test]
    fn test_config_parse_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("invalid.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();

        match Config::load_from(&path) {
            Err(Error::Config(msg)) => assert!(msg.contains("Failed to parse config")),
            other => panic!("Expected Config parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_config_load_missing_file() {
        let result = Config::load_from(Path::new("/definitely/does/not/exist/global.toml"));
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Failed to read config")));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PAGEGEN_GENERATOR_ENDPOINT", "http://backend/complete"),
            ("PAGEGEN_CACHE_DIR", "/var/cache/pagegen"),
            ("PAGEGEN_RATE_LIMIT_MAX", " 25 "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(
            config.generator.endpoint.as_deref(),
            Some("http://backend/complete")
        );
        assert_eq!(config.durable_dir(), PathBuf::from("/var/cache/pagegen"));
        assert_eq!(config.rate_limit.max_requests, 25);
        assert!(config.generator.api_key.is_none());
    }

    #[test]
    fn test_env_override_rejects_non_numeric_limit() {
        let mut config = Config::default();
        let result = config.apply_overrides(|name| {
            (name == "PAGEGEN_RATE_LIMIT_MAX").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_degenerate_values() {
        let mut zero_window = Config::default();
        zero_window.rate_limit.window_ms = 0;
        assert!(zero_window.validate().is_err());

        let mut zero_budget = Config::default();
        zero_budget.cache.memory_budget_bytes = 0;
        assert!(zero_budget.validate().is_err());

        for ratio in [0.0, -0.5, 1.5, f64::NAN] {
            let mut config = Config::default();
            config.cache.eviction_target_ratio = ratio;
            assert!(config.validate().is_err(), "ratio {ratio} should be rejected");
        }

        let mut full_ratio = Config::default();
        full_ratio.cache.eviction_target_ratio = 1.0;
        assert!(full_ratio.validate().is_ok());
    }

    #[test]
    fn test_durable_dir_defaults_to_data_dir() {
        let dir = Config::default().durable_dir();
        assert!(dir.ends_with("cache"));
    }

    proptest! {
        #[test]
        fn test_rate_limit_roundtrip(window_ms in 1u64..=3_600_000, max in 1u32..=10_000) {
            let mut config = Config::default();
            config.rate_limit.window_ms = window_ms;
            config.rate_limit.max_requests = max;

            let serialized = toml::to_string_pretty(&config).unwrap();
            let loaded: Config = toml::from_str(&serialized).unwrap();

            prop_assert_eq!(loaded.rate_limit.window_ms, window_ms);
            prop_assert_eq!(loaded.rate_limit.max_requests, max);
            prop_assert!(loaded.validate().is_ok());
        }
    }
}
