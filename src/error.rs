//! Error types for the resolution engine.
//!
//! This module defines the error taxonomy described by the resolution
//! engine's error model: every variant names the failing module and, where
//! applicable, the version or URL that was attempted, so that a caller
//! propagating the error with `?` gets a message useful on its own.

use thiserror::Error;

/// A specialized `Result` type for resolution operations.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// The main error type for the resolution engine.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Malformed `MODULE.bazel`: ordering/uniqueness violations, malformed
    /// `bazel_compatibility` entries, or missing required attributes.
    #[error("failed to parse MODULE.bazel: {message}")]
    Parse {
        /// Description of the violation.
        message: String,
    },

    /// A version string failed the grammar of §4.1.
    #[error("invalid version '{version}': {message}")]
    InvalidVersion {
        /// The offending version string.
        version: String,
        /// Why it was rejected.
        message: String,
    },

    /// A module or version was not present in any consulted source.
    #[error("module '{name}@{version}' not found{}", url.as_ref().map(|u| format!(" (tried {u})")).unwrap_or_default())]
    NotFound {
        /// The module name.
        name: String,
        /// The requested version (empty string for "highest").
        version: String,
        /// The URL that was attempted, if known.
        url: Option<String>,
    },

    /// A transport error, 5xx response, or 429; `retryable` records whether
    /// the registry chain should try the next source.
    #[error("transient error fetching '{name}' from {url}: {message}")]
    Transient {
        /// The module name being fetched.
        name: String,
        /// The URL that was attempted.
        url: String,
        /// Description of the failure.
        message: String,
        /// Whether the caller may retry against another source.
        retryable: bool,
    },

    /// HTTP 401/403 from a registry source.
    #[error("unauthorized fetching '{name}' from {url}")]
    Unauthorized {
        /// The module name being fetched.
        name: String,
        /// The URL that rejected the request.
        url: String,
    },

    /// A malformed or non-`file://` URL was passed where a local source
    /// was expected.
    #[error("invalid file URL '{url}': {message}")]
    InvalidFileUrl {
        /// The offending URL.
        url: String,
        /// Description of the problem.
        message: String,
    },

    /// One or more selected versions were yanked and policy requires
    /// failure.
    #[error("yanked versions selected: {}", modules.join(", "))]
    YankedVersionsError {
        /// `name@version` strings of the offending modules.
        modules: Vec<String>,
    },

    /// A declared direct-dependency version differs from the selected
    /// version and policy requires failure.
    #[error("direct dependency mismatch: {}", .0.join(", "))]
    DirectDepsMismatchError(Vec<String>),

    /// Caller cancellation or deadline fired.
    #[error("resolution cancelled: {reason}")]
    Cancelled {
        /// Why the cancellation happened.
        reason: String,
    },

    /// I/O error reading a local registry source.
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// The path where the error occurred.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ResolveError {
    /// Build a `NotFound` error for a module lookup.
    #[must_use]
    pub fn not_found(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            version: version.into(),
            url: None,
        }
    }

    /// Whether the registry chain should fall back to the next source
    /// after this error (mirrors §4.4's fallback rule: `NotFound` or any
    /// error falls through).
    #[must_use]
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Transient { .. } | Self::Unauthorized { .. })
    }
}
