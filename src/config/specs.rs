//! Per-route schema assignments.
//!
//! Routes are kept per HTTP method in an explicit ordered sequence. Resolution
//! is first-match-wins over that order, so callers must register patterns from
//! most to least specific.

use crate::{RoutePattern, Schema};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

/// HTTP methods a route can be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Every supported method.
    pub const ALL: [Method; 4] = [Method::Get, Method::Post, Method::Put, Method::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a method name, ignoring case. Methods outside [`Method::ALL`] are
/// rejected.
impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnsupportedMethod(s.to_string()))
    }
}

/// Returned when parsing a method outside [`Method::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported method: {0}")]
pub struct UnsupportedMethod(pub String);

/// One of the request dimensions validated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    Header,
    Path,
    Query,
    Body,
}

impl Facet {
    /// The order in which facets are validated.
    pub const ORDER: [Facet; 4] = [Facet::Header, Facet::Path, Facet::Query, Facet::Body];

    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Header => "header",
            Facet::Path => "path",
            Facet::Query => "query",
            Facet::Body => "body",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schemas attached to the facets of one route. Facets without a schema are
/// not checked.
///
/// # Example
///
/// ```rust
/// use axum_request_validator::{Facet, FacetSchemas, JsonSchema};
/// use serde_json::json;
///
/// let schemas = FacetSchemas::new()
///     .with(Facet::Path, JsonSchema::compile(json!({ "required": ["id"] })).unwrap());
/// assert!(schemas.get(Facet::Path).is_some());
/// assert!(schemas.get(Facet::Body).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FacetSchemas {
    header: Option<Arc<dyn Schema>>,
    path: Option<Arc<dyn Schema>>,
    query: Option<Arc<dyn Schema>>,
    body: Option<Arc<dyn Schema>>,
}

impl FacetSchemas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a schema to a facet, replacing any previous one.
    pub fn with(self, facet: Facet, schema: impl Schema + 'static) -> Self {
        self.with_shared(facet, Arc::new(schema))
    }

    /// Attaches an already shared schema to a facet.
    pub fn with_shared(mut self, facet: Facet, schema: Arc<dyn Schema>) -> Self {
        *self.slot_mut(facet) = Some(schema);
        self
    }

    /// Returns the schema configured for `facet`, if any.
    pub fn get(&self, facet: Facet) -> Option<&dyn Schema> {
        let slot = match facet {
            Facet::Header => &self.header,
            Facet::Path => &self.path,
            Facet::Query => &self.query,
            Facet::Body => &self.body,
        };
        slot.as_deref()
    }

    /// Returns true when no facet has a schema.
    pub fn is_empty(&self) -> bool {
        Facet::ORDER.iter().all(|facet| self.get(*facet).is_none())
    }

    fn slot_mut(&mut self, facet: Facet) -> &mut Option<Arc<dyn Schema>> {
        match facet {
            Facet::Header => &mut self.header,
            Facet::Path => &mut self.path,
            Facet::Query => &mut self.query,
            Facet::Body => &mut self.body,
        }
    }
}

/// A route pattern and the schemas attached to it.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub pattern: RoutePattern,
    pub schemas: FacetSchemas,
}

/// Route specifications grouped by method, in registration order.
#[derive(Debug, Clone)]
pub struct Specs {
    routes: HashMap<Method, Vec<RouteSpec>>,
}

impl Default for Specs {
    /// Every method present with no routes.
    fn default() -> Self {
        Self {
            routes: Method::ALL
                .into_iter()
                .map(|method| (method, Vec::new()))
                .collect(),
        }
    }
}

impl Specs {
    /// Registers a route. Registering the same pattern twice for a method
    /// replaces the schemas but keeps the original position.
    pub fn insert(&mut self, method: Method, pattern: RoutePattern, schemas: FacetSchemas) {
        let routes = self.routes.entry(method).or_default();
        match routes
            .iter_mut()
            .find(|route| route.pattern.as_str() == pattern.as_str())
        {
            Some(existing) => existing.schemas = schemas,
            None => routes.push(RouteSpec { pattern, schemas }),
        }
    }

    /// Routes registered for `method`, in registration order.
    pub fn routes(&self, method: Method) -> &[RouteSpec] {
        self.routes.get(&method).map(Vec::as_slice).unwrap_or_default()
    }

    /// Schemas registered for an exact `(method, pattern)` pair.
    pub fn get(&self, method: Method, pattern: &str) -> Option<&FacetSchemas> {
        self.routes(method)
            .iter()
            .find(|route| route.pattern.as_str() == pattern)
            .map(|route| &route.schemas)
    }

    /// Total number of registered routes across all methods.
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FnSchema;

    fn pattern(s: &str) -> RoutePattern {
        s.parse().unwrap()
    }

    #[test]
    fn test_method_parse_ignores_case() {
        assert_eq!("get".parse::<Method>(), Ok(Method::Get));
        assert_eq!("Delete".parse::<Method>(), Ok(Method::Delete));
        assert_eq!(
            "PATCH".parse::<Method>(),
            Err(UnsupportedMethod("PATCH".into()))
        );
    }

    #[test]
    fn test_facet_order_is_fixed() {
        assert_eq!(
            Facet::ORDER.map(|f| f.to_string()),
            ["header", "path", "query", "body"]
        );
    }

    #[test]
    fn test_facet_schemas_slots() {
        let schemas = FacetSchemas::new()
            .with(Facet::Header, FnSchema::new(|_| vec![]))
            .with(Facet::Body, FnSchema::new(|_| vec![]));
        assert!(schemas.get(Facet::Header).is_some());
        assert!(schemas.get(Facet::Path).is_none());
        assert!(schemas.get(Facet::Query).is_none());
        assert!(schemas.get(Facet::Body).is_some());
        assert!(!schemas.is_empty());
        assert!(FacetSchemas::new().is_empty());
    }

    #[test]
    fn test_default_specs_have_every_method() {
        let specs = Specs::default();
        assert!(specs.is_empty());
        for method in Method::ALL {
            assert!(specs.routes(method).is_empty());
        }
    }

    #[test]
    fn test_insert_keeps_registration_order() {
        let mut specs = Specs::default();
        specs.insert(Method::Get, pattern("/user/:id"), FacetSchemas::new());
        specs.insert(Method::Get, pattern("/user/me"), FacetSchemas::new());
        let order: Vec<_> = specs
            .routes(Method::Get)
            .iter()
            .map(|r| r.pattern.as_str())
            .collect();
        assert_eq!(order, ["/user/:id", "/user/me"]);
    }

    #[test]
    fn test_duplicate_insert_replaces_in_place() {
        let mut specs = Specs::default();
        specs.insert(Method::Put, pattern("/a"), FacetSchemas::new());
        specs.insert(Method::Put, pattern("/b"), FacetSchemas::new());
        specs.insert(
            Method::Put,
            pattern("/a"),
            FacetSchemas::new().with(Facet::Body, FnSchema::new(|_| vec![])),
        );
        assert_eq!(specs.routes(Method::Put).len(), 2);
        assert_eq!(specs.routes(Method::Put)[0].pattern.as_str(), "/a");
        assert!(specs.get(Method::Put, "/a").unwrap().get(Facet::Body).is_some());
        assert_eq!(specs.len(), 2);
    }
}
