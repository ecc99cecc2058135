//! # pagegen-core
//!
//! Core pipeline for programmatic broker pages: turn a URL path into a fully
//! assembled, cached page payload.
//!
//! ## Architecture
//!
//! - **Classification**: [`PathClassifier`] maps paths onto validated page intents
//! - **Rate limiting**: [`RateLimiter`] enforces fixed windows per caller key
//! - **Generation**: [`ContentGenerator`] renders prompts through a [`TextBackend`]
//!   and post-processes the reply
//! - **Caching**: [`Cache`] keeps payloads in a bounded memory tier backed by
//!   an optional durable tier
//! - **Orchestration**: [`PageOrchestrator`] ties them together, coalescing
//!   concurrent builds of the same page
//!
//! ## Quick Start
//!
//! ```rust
//! use pagegen_core::{PageKind, PathClassifier, Result};
//!
//! let classifier = PathClassifier::default();
//! let intent = classifier.classify("/forex/us")?;
//!
//! assert_eq!(intent.kind(), PageKind::CategoryCountry);
//! assert_eq!(intent.canonical_path, "/forex/us");
//! # Ok::<(), pagegen_core::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`]:
//!
//! ```rust
//! use pagegen_core::{Error, PathClassifier};
//!
//! match PathClassifier::default().classify("/no/such/page/here") {
//!     Ok(intent) => println!("page: {}", intent.canonical_path),
//!     Err(Error::NotFound(path)) => eprintln!("no page at {path}"),
//!     Err(e) if e.is_recoverable() => eprintln!("try again: {e}"),
//!     Err(e) => eprintln!("fatal: {e}"),
//! }
//! ```

/// Broker records and the sources that supply them
pub mod brokers;
/// Two-tier page cache
pub mod cache;
/// URL path classification
pub mod classifier;
/// Configuration file and environment overrides
pub mod config;
/// Error types and result aliases
pub mod error;
/// Prompt templates, text backends and post-processing
pub mod generator;
/// Page assembly with build coalescing
pub mod orchestrator;
/// Fixed-window rate limiting
pub mod rate_limit;
/// Known categories, countries, strategies and features
pub mod registry;
/// Page intents and payloads
pub mod types;

pub use brokers::{BrokerFilter, BrokerRecord, BrokerSource, StaticBrokerSource};
pub use cache::{Cache, CacheConfig, CacheStatsSummary, DurableStore, FileStore, MemoryStore};
pub use classifier::PathClassifier;
pub use config::{
    CacheSettings, Config, GeneratorSettings, OrchestratorSettings, RateLimitSettings, SiteConfig,
};
pub use error::{Error, Result};
pub use generator::{
    ContentGenerator, GenerationContext, GenerationRequest, GenerationResult, HttpBackend,
    TextBackend,
};
pub use orchestrator::{Components, PageOrchestrator, WarmReport};
pub use rate_limit::{RateDecision, RateLimiter};
pub use registry::Registry;
pub use types::*;
