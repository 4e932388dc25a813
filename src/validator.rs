//! Request validation orchestration.
//!
//! A [`Validator`] owns a normalized [`Config`] and the compiled route table.
//! Both are built once and only read afterwards, so a single validator can be
//! shared (e.g. behind an `Arc`) by any number of concurrent requests.
//!
//! For each request the validator:
//!
//! 1. rejects requests without a method or URL (400);
//! 2. resolves the URL to the first matching route pattern;
//! 3. lets unmatched requests through, or rejects them (404) when undefined
//!    paths are disallowed;
//! 4. checks the header, path, query and body facets in that order against
//!    their schemas, collecting every violation within a facet and stopping
//!    at the first facet that fails (400).
//!
//! Every failure goes through the [`FailureHandler`].

use crate::{
    Config, DecoratedError, Facet, FailureHandler, Method, PathMatcher, ResponseSink,
    RoutePattern, RouteSpec, ValidationFailure, Violation,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The parts of an inbound request that get validated.
///
/// Facet values default to empty objects. When deserializing, `headers` is
/// accepted for `header` and `params` for `path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "empty_object", alias = "headers")]
    pub header: Value,
    #[serde(default = "empty_object", alias = "params")]
    pub path: Value,
    #[serde(default = "empty_object")]
    pub query: Value,
    #[serde(default = "empty_object")]
    pub body: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Default for RequestDescriptor {
    fn default() -> Self {
        Self {
            method: None,
            url: None,
            header: empty_object(),
            path: empty_object(),
            query: empty_object(),
            body: empty_object(),
        }
    }
}

impl RequestDescriptor {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, header: Value) -> Self {
        self.header = header;
        self
    }

    pub fn with_path(mut self, path: Value) -> Self {
        self.path = path;
        self
    }

    pub fn with_query(mut self, query: Value) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// The value of one facet.
    pub fn facet(&self, facet: Facet) -> &Value {
        match facet {
            Facet::Header => &self.header,
            Facet::Path => &self.path,
            Facet::Query => &self.query,
            Facet::Body => &self.body,
        }
    }
}

/// Method and URL of a well-formed request.
fn target(request: &RequestDescriptor) -> Result<(&str, &str), ValidationFailure> {
    let method = request.method.as_deref().filter(|m| !m.is_empty());
    let url = request.url.as_deref().filter(|u| !u.is_empty());
    match (method, url) {
        (Some(method), Some(url)) => Ok((method, url)),
        _ => Err(ValidationFailure::RequestMalformed),
    }
}

/// Validates requests against a fixed configuration.
///
/// # Example
///
/// ```rust
/// use axum_request_validator::{RequestDescriptor, Validator};
/// use serde_json::json;
///
/// let validator = Validator::new(&json!({
///     "allowUndefinedPaths": false,
///     "specs": {
///         "GET": {
///             "/user/:id": {
///                 "path": {
///                     "type": "object",
///                     "properties": { "id": { "type": "string", "pattern": "^[0-9]+$" } }
///                 }
///             }
///         }
///     }
/// }));
///
/// let ok = RequestDescriptor::new("GET", "/user/1").with_path(json!({ "id": "1" }));
/// assert!(validator.check(&ok).is_ok());
///
/// let bad = RequestDescriptor::new("GET", "/user/abc").with_path(json!({ "id": "abc" }));
/// assert_eq!(validator.check(&bad).unwrap_err().status_code(), 400);
///
/// let unknown = RequestDescriptor::new("GET", "/unknown");
/// assert_eq!(validator.check(&unknown).unwrap_err().status_code(), 404);
/// ```
#[derive(Debug, Clone)]
pub struct Validator {
    config: Config,
    matcher: PathMatcher,
    failures: FailureHandler,
}

impl Validator {
    /// Builds a validator from a raw configuration. Invalid configurations
    /// are replaced by the default configuration.
    pub fn new(raw: &Value) -> Self {
        Self::from_config(Config::normalize(raw))
    }

    /// Builds a validator from an already normalized configuration.
    pub fn from_config(config: Config) -> Self {
        let matcher = PathMatcher::compile(&config.specs);
        let failures = FailureHandler::from_config(&config);
        Self {
            config,
            matcher,
            failures,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The route `url` resolves to for `method`, if any. Methods outside
    /// [`Method::ALL`] never resolve.
    pub fn route(&self, method: &str, url: &str) -> Option<&RouteSpec> {
        let method = method.parse::<Method>().ok()?;
        self.matcher.resolve(method, url)
    }

    /// The route pattern `url` resolves to for `method`, if any.
    pub fn resolve(&self, method: &str, url: &str) -> Option<&RoutePattern> {
        self.route(method, url).map(|route| &route.pattern)
    }

    /// Decides whether `request` conforms, without applying the failure
    /// policy.
    pub fn check(&self, request: &RequestDescriptor) -> Result<(), ValidationFailure> {
        let (method, url) = target(request)?;
        self.check_route(request, self.route(method, url), None)
    }

    /// [`check`](Self::check) against an already resolved route.
    ///
    /// `unreadable_body` stands in for the body facet's result when the body
    /// could not be turned into a value. It is only reported if the route has
    /// a body schema and every earlier facet passed.
    pub(crate) fn check_route(
        &self,
        request: &RequestDescriptor,
        route: Option<&RouteSpec>,
        unreadable_body: Option<Violation>,
    ) -> Result<(), ValidationFailure> {
        let (method, url) = target(request)?;

        let Some(route) = route else {
            tracing::debug!(method, url, "Unknown path");
            if self.config.allow_undefined_paths {
                return Ok(());
            }
            return Err(ValidationFailure::RouteNotFound {
                method: method.to_string(),
                url: url.to_string(),
            });
        };
        tracing::debug!(method, url, pattern = %route.pattern, "Resolved route pattern");

        let mut unreadable_body = unreadable_body;
        for facet in Facet::ORDER {
            let Some(schema) = route.schemas.get(facet) else {
                continue;
            };
            let violations = match unreadable_body.take_if(|_| facet == Facet::Body) {
                Some(violation) => vec![violation],
                None => schema.validate(request.facet(facet)),
            };
            if !violations.is_empty() {
                return Err(ValidationFailure::FacetValidationFailed { facet, violations });
            }
        }

        Ok(())
    }

    /// Validates `request`. On success `next(None)` is called. On failure the
    /// failure policy either writes an error response to `sink` or calls
    /// `next` with the decorated error.
    pub fn validate<S, F>(&self, request: &RequestDescriptor, sink: &mut S, next: F)
    where
        S: ResponseSink + ?Sized,
        F: FnOnce(Option<DecoratedError>),
    {
        match self.check(request) {
            Ok(()) => next(None),
            Err(failure) => self.reject(failure, sink, next),
        }
    }

    /// Applies the failure policy to an already decided failure.
    pub fn reject<S, F>(&self, failure: ValidationFailure, sink: &mut S, next: F)
    where
        S: ResponseSink + ?Sized,
        F: FnOnce(Option<DecoratedError>),
    {
        self.failures
            .handle(failure.decorate(), failure.status_code(), sink, next);
    }
}
