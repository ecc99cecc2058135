//! Error types and handling for pagegen-core operations.
//!
//! This module provides a single error type covering every failure in the page
//! pipeline. Errors are categorized for easier handling and carry a hint about
//! whether a retry might succeed.
//!
//! ## Error Categories
//!
//! - **Not found**: the path does not name a page, or the referenced broker is unknown
//! - **Rate limiting**: the generation backend quota is exhausted for the current window
//! - **Generation**: the backend was unreachable, timed out, or returned unusable text
//! - **Cache**: the durable tier could not be reached (never surfaced by the cache itself)
//! - **Template / Configuration**: invalid settings or a prompt that could not be assembled
//! - **I/O, Network, Serialization**: failures from the underlying plumbing
//!
//! ## Recovery Hints
//!
//! ```rust
//! use pagegen_core::Error;
//!
//! let err = Error::Generation("backend returned empty output".to_string());
//! assert!(err.is_recoverable());
//! assert_eq!(err.category(), "generation");
//!
//! let missing = Error::NotFound("/not-a-real-category".to_string());
//! assert!(!missing.is_recoverable());
//! ```

use std::time::Duration;

use thiserror::Error;

/// The main error type for pagegen-core operations.
///
/// All public functions in pagegen-core return `Result<T, Error>`. `Display`
/// gives a user-facing message, `Debug` keeps the source chain.
#[derive(Error, Debug)]
pub enum Error {
    /// The path does not correspond to any known page.
    ///
    /// Terminal: retrying the same path will produce the same answer. Maps to a
    /// "page not found" response.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The generation backend quota is exhausted for the current window.
    ///
    /// Internal cost control, not an end-user rate limit. The caller should back
    /// off for `retry_after_secs` before trying again.
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded {
        /// Seconds until the current window closes.
        retry_after_secs: u64,
    },

    /// Content generation failed.
    ///
    /// Covers an unreachable backend, a backend timeout, and empty or too-short
    /// output. Retryable by the caller of `get_page`, and never cached.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// The durable cache tier is unreachable.
    ///
    /// The cache logs and swallows this; it only escapes from direct
    /// [`DurableStore`](crate::cache::DurableStore) calls.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// No template matches a request, or a prompt kept an unresolved placeholder.
    #[error("Template error: {0}")]
    Template(String),

    /// An overall deadline expired.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration is invalid or inaccessible.
    ///
    /// ## Common Causes
    ///
    /// - Invalid TOML syntax in config files
    /// - Zero-length rate-limit windows or cache budgets
    /// - Config directory creation failures
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request to the generation backend failed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Generic error for uncategorized failures.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// Returns `true` for generation failures, timeouts, rate limiting and
    /// transient network or I/O conditions.
    ///
    /// ```rust
    /// use pagegen_core::Error;
    ///
    /// assert!(Error::Timeout("page deadline".into()).is_recoverable());
    /// assert!(Error::RateLimitExceeded { retry_after_secs: 3 }.is_recoverable());
    /// assert!(!Error::Config("zero window".into()).is_recoverable());
    /// ```
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Generation(_)
            | Self::Timeout(_)
            | Self::RateLimitExceeded { .. }
            | Self::CacheUnavailable(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Whether this error means the page does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Delay suggested by a rate-limit error.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after_secs } => {
                Some(Duration::from_secs(*retry_after_secs))
            },
            _ => None,
        }
    }

    /// Get the error category as a string identifier.
    ///
    /// Used as a structured-logging field and for grouping failures.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::RateLimitExceeded { .. } => "rate_limited",
            Self::Generation(_) => "generation",
            Self::CacheUnavailable(_) => "cache_unavailable",
            Self::Template(_) => "template",
            Self::Timeout(_) => "timeout",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::Other(_) => "other",
        }
    }

    /// Rebuild an owned error from one shared between coalesced callers.
    ///
    /// Variants holding only plain data are reproduced exactly; I/O and network
    /// errors are not `Clone`, so they collapse into `Generation` (when they came
    /// from the backend path) carrying the original message.
    #[must_use]
    pub fn shared_copy(&self) -> Self {
        match self {
            Self::NotFound(msg) => Self::NotFound(msg.clone()),
            Self::RateLimitExceeded { retry_after_secs } => Self::RateLimitExceeded {
                retry_after_secs: *retry_after_secs,
            },
            Self::Generation(msg) => Self::Generation(msg.clone()),
            Self::CacheUnavailable(msg) => Self::CacheUnavailable(msg.clone()),
            Self::Template(msg) => Self::Template(msg.clone()),
            Self::Timeout(msg) => Self::Timeout(msg.clone()),
            Self::Config(msg) => Self::Config(msg.clone()),
            Self::Serialization(msg) => Self::Serialization(msg.clone()),
            Self::Io(e) => Self::Generation(e.to_string()),
            Self::Network(e) => Self::Generation(e.to_string()),
            Self::Other(msg) => Self::Other(msg.clone()),
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display_formatting() {
        assert_eq!(
            Error::NotFound("/nope".to_string()).to_string(),
            "Not found: /nope"
        );
        assert_eq!(
            Error::RateLimitExceeded {
                retry_after_secs: 12
            }
            .to_string(),
            "Rate limit exceeded, retry after 12s"
        );
        assert_eq!(
            Error::Generation("empty output".to_string()).to_string(),
            "Generation failed: empty output"
        );
    }

    #[test]
    fn test_recoverability() {
        let recoverable = vec![
            Error::Generation("timeout".to_string()),
            Error::Timeout("deadline".to_string()),
            Error::RateLimitExceeded {
                retry_after_secs: 1,
            },
            Error::Io(io::Error::new(io::ErrorKind::Interrupted, "interrupted")),
        ];
        for err in recoverable {
            assert!(err.is_recoverable(), "{err} should be recoverable");
        }

        let permanent = vec![
            Error::NotFound("x".to_string()),
            Error::Template("missing".to_string()),
            Error::Config("bad".to_string()),
            Error::Io(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
        ];
        for err in permanent {
            assert!(!err.is_recoverable(), "{err} should not be recoverable");
        }
    }

    #[test]
    fn test_retry_after_only_for_rate_limit() {
        let err = Error::RateLimitExceeded {
            retry_after_secs: 7,
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(Error::Generation("x".into()).retry_after(), None);
    }

    #[test]
    fn test_shared_copy_preserves_plain_variants() {
        let copied = Error::NotFound("/broker/ghost".to_string()).shared_copy();
        assert!(matches!(copied, Error::NotFound(ref p) if p == "/broker/ghost"));

        let copied = Error::RateLimitExceeded {
            retry_after_secs: 4,
        }
        .shared_copy();
        assert_eq!(copied.retry_after(), Some(Duration::from_secs(4)));

        let io_err = Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        let copied = io_err.shared_copy();
        assert_eq!(copied.category(), "generation");
        assert!(copied.to_string().contains("pipe"));
    }

    #[test]
    fn test_serde_json_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = parse_err.into();
        assert_eq!(err.category(), "serialization");
    }
}
