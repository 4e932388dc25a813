//! Uniform error shape surfaced to callers.

use crate::{Facet, Violation};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A failure normalized into `{ description, errors }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoratedError {
    /// What went wrong, e.g. "request body params validation failed".
    pub description: String,
    /// Schema violations, empty for failures that did not come from a schema.
    pub errors: Vec<Violation>,
}

impl DecoratedError {
    /// Decorates the violations reported for one facet. Violations are kept
    /// as reported, in order.
    pub fn from_violations(violations: Vec<Violation>, facet: Facet) -> Self {
        Self {
            description: format!("request {facet} params validation failed"),
            errors: violations,
        }
    }

    /// Decorates a failure that did not originate from a facet schema.
    pub fn generic(error: &impl Display) -> Self {
        Self {
            description: error.to_string(),
            errors: Vec::new(),
        }
    }
}

/// Body written by the direct-response failure policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always `true`.
    pub error: bool,
    /// The decorated error.
    pub data: DecoratedError,
}

impl From<DecoratedError> for ErrorBody {
    fn from(data: DecoratedError) -> Self {
        Self { error: true, data }
    }
}
