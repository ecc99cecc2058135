//! Exit codes for shell integration.
//!
//! | Code | Category | Meaning |
//! |------|----------|---------|
//! | 0 | - | Success |
//! | 1 | `Internal` | Configuration problems and everything else |
//! | 2 | `NotFound` | No page exists for the path, or the broker is unknown |
//! | 75 | `Temporary` | Generation failed, timed out or was rate limited; retry later |
//!
//! ```bash
//! pagegen page /forex/us --brokers brokers.json
//! case $? in
//!     0) echo "built" ;;
//!     2) echo "no such page" ;;
//!     75) echo "try again later" ;;
//! esac
//! ```

use std::fmt;
use std::process::ExitCode;

use pagegen_core::Error as CoreError;

/// Semantic error category determining the exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    Internal = 1,
    NotFound = 2,
    /// `EX_TEMPFAIL` from sysexits.h
    Temporary = 75,
}

impl ErrorCategory {
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn as_exit_code(self) -> ExitCode {
        ExitCode::from(self.exit_code())
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Internal => "internal error",
            Self::NotFound => "not found",
            Self::Temporary => "temporary failure",
        }
    }

    /// Category of a library error.
    #[must_use]
    pub fn of(err: &CoreError) -> Self {
        if err.is_not_found() {
            Self::NotFound
        } else if err.is_recoverable() {
            Self::Temporary
        } else {
            Self::Internal
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A CLI error with an explicit category.
///
/// Used where the failure is not a single library error, e.g. a warm run in
/// which some pages failed.
#[derive(Debug)]
pub struct CliError {
    pub category: ErrorCategory,
    pub source: anyhow::Error,
}

impl CliError {
    pub fn new(category: ErrorCategory, source: impl Into<anyhow::Error>) -> Self {
        Self {
            category,
            source: source.into(),
        }
    }

    pub fn internal(source: impl Into<anyhow::Error>) -> Self {
        Self::new(ErrorCategory::Internal, source)
    }

    pub fn temporary(source: impl Into<anyhow::Error>) -> Self {
        Self::new(ErrorCategory::Temporary, source)
    }

    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.category.exit_code()
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Determine the exit code from an `anyhow::Error`.
///
/// An explicit [`CliError`] wins; otherwise the first library error found in
/// the chain decides. Anything else is internal.
#[must_use]
pub fn exit_code_from_error(err: &anyhow::Error) -> u8 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return cli_err.exit_code();
    }

    err.chain()
        .find_map(|cause| cause.downcast_ref::<CoreError>())
        .map_or(ErrorCategory::Internal, ErrorCategory::of)
        .exit_code()
}
