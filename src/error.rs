//! Error types for configuration loading and request validation.
//!
//! Two families of errors live here:
//!
//! - [`Error`] / [`ErrorKind`]: construction-time failures (bad configuration,
//!   uncompilable schemas or route patterns, I/O while loading a file). These
//!   are returned by the strict loaders such as [`Config::try_from_value`].
//!   The lenient [`Config::normalize`] never surfaces them; it logs and falls
//!   back to the default configuration instead.
//! - [`ValidationFailure`]: the request-time outcome of a failed validation.
//!   Every variant carries its own payload and knows its HTTP status code and
//!   how to turn itself into a [`DecoratedError`].
//!
//! # Design
//!
//! `Error` is an opaque struct paired with an `ErrorKind` enum, following the
//! `std::io::Error` pattern, so internal error sources can change without
//! breaking consumers.
//!
//! # Example
//!
//! ```rust
//! use axum_request_validator::{Error, ErrorKind};
//!
//! let error = Error::config("specs must be an object");
//!
//! match error.kind() {
//!     ErrorKind::ConfigInvalid => println!("bad config: {}", error),
//!     _ => println!("other error: {}", error),
//! }
//! ```
//!
//! [`Config::try_from_value`]: crate::Config::try_from_value
//! [`Config::normalize`]: crate::Config::normalize

use crate::{DecoratedError, Facet, Violation};
use http::StatusCode;
use std::fmt;
use thiserror::Error;

/// The kind of construction-time error that occurred.
///
/// # Stability
///
/// This enum is marked `#[non_exhaustive]`, so new variants may be added
/// in future versions without breaking existing code. Always include a
/// wildcard arm when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The configuration does not have the expected shape or types.
    #[error("configuration error")]
    ConfigInvalid,

    /// A facet schema could not be compiled by the schema engine.
    #[error("schema error")]
    SchemaInvalid,

    /// A route pattern could not be compiled.
    #[error("route pattern error")]
    RoutePatternInvalid,

    /// I/O error while reading a configuration file.
    #[error("I/O error")]
    Io,
}

/// An error that can occur while building a validator.
///
/// Use [`Error::kind()`] to determine the category of error for matching,
/// and the `Display` implementation to get a human-readable message.
pub struct Error {
    kind: ErrorKind,
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl Error {
    /// Creates a new error with the given kind and source.
    ///
    /// # Example
    ///
    /// ```rust
    /// use axum_request_validator::{Error, ErrorKind};
    ///
    /// let err = Error::new(ErrorKind::SchemaInvalid, "not a schema");
    /// assert_eq!(err.kind(), ErrorKind::SchemaInvalid);
    /// ```
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self {
            kind,
            source: error.into(),
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Consumes the error and returns the inner error source.
    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self.source
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, msg.into())
    }

    /// Creates a schema compilation error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaInvalid, msg.into())
    }

    /// Creates a route pattern error.
    pub fn route_pattern(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::RoutePatternInvalid, msg.into())
    }
}

// ============================================================================
// Trait implementations
// ============================================================================

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

// ============================================================================
// From implementations
// ============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::new(ErrorKind::ConfigInvalid, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::ConfigInvalid, err)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Self::new(ErrorKind::RoutePatternInvalid, err)
    }
}

// ============================================================================
// ValidationFailure
// ============================================================================

/// Why a request was rejected.
///
/// Each variant maps to exactly one HTTP status code and one
/// [`DecoratedError`] shape, so callers never have to inspect an error value to
/// find out where it came from.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationFailure {
    /// The request has no method or no URL.
    #[error("Invalid Request Format")]
    RequestMalformed,

    /// No configured route pattern matches and undefined paths are disallowed.
    #[error("Invalid URL")]
    RouteNotFound {
        /// Method of the rejected request.
        method: String,
        /// URL of the rejected request.
        url: String,
    },

    /// A facet schema rejected the corresponding request value.
    #[error("request {facet} params validation failed")]
    FacetValidationFailed {
        /// The facet that failed.
        facet: Facet,
        /// Every violation found within that facet.
        violations: Vec<Violation>,
    },
}

impl ValidationFailure {
    /// Returns the HTTP status code reported for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RequestMalformed => StatusCode::BAD_REQUEST,
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::FacetValidationFailed { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Normalizes the failure into the uniform error shape.
    pub fn decorate(&self) -> DecoratedError {
        match self {
            Self::FacetValidationFailed { facet, violations } => {
                DecoratedError::from_violations(violations.clone(), *facet)
            }
            other => DecoratedError::generic(other),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
