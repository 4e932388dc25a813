//! Route pattern compilation and resolution.
//!
//! Patterns are URL templates such as `/user/:id/friends`. Supported syntax:
//!
//! | Syntax | Matches |
//! |--------|---------|
//! | `:name` | one non-empty path segment, captured as `name` |
//! | `:name(\d+)` | a segment matching the given expression |
//! | `/:name?` | an optional segment (the slash is optional too) |
//! | `*` | anything, including slashes |
//!
//! Matching is case-insensitive and anchored at both ends: prefixes never
//! match. A trailing slash on the URL is tolerated, and any `?query` or
//! `#fragment` suffix is ignored. Captured parameters are percent-decoded.

use crate::{Error, Method, Result, RouteSpec, Specs};
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde_json::{Map, Value};
use std::{collections::HashMap, fmt, str::FromStr};

/// A compiled route pattern.
#[derive(Clone)]
pub struct RoutePattern {
    source: String,
    regex: Regex,
    params: Vec<String>,
}

impl RoutePattern {
    /// Compiles a pattern.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::RoutePatternInvalid`](crate::ErrorKind::RoutePatternInvalid)
    /// error when the pattern does not start with `/`, has an empty or
    /// repeated parameter name, or an invalid custom expression.
    pub fn new(pattern: &str) -> Result<Self> {
        if !pattern.starts_with('/') {
            return Err(Error::route_pattern(format!(
                "route pattern '{pattern}' must start with '/'"
            )));
        }

        let body = pattern.strip_suffix('/').unwrap_or(pattern);
        let chars: Vec<char> = body.chars().collect();
        let mut expr = String::from("(?i)^");
        let mut literal = String::new();
        let mut params: Vec<String> = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                ':' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                        end += 1;
                    }
                    if end == start {
                        return Err(Error::route_pattern(format!(
                            "missing parameter name at offset {i} in '{pattern}'"
                        )));
                    }
                    let name: String = chars[start..end].iter().collect();
                    if params.contains(&name) {
                        return Err(Error::route_pattern(format!(
                            "parameter '{name}' appears twice in '{pattern}'"
                        )));
                    }

                    let mut capture = String::from("[^/]+?");
                    if chars.get(end) == Some(&'(') {
                        let close = closing_paren(&chars, end).ok_or_else(|| {
                            Error::route_pattern(format!("unclosed '(' in '{pattern}'"))
                        })?;
                        capture = chars[end + 1..close].iter().collect();
                        end = close + 1;
                    }

                    let optional = chars.get(end) == Some(&'?');
                    if optional {
                        end += 1;
                    }
                    let optional_slash = optional && literal.ends_with('/');
                    if optional_slash {
                        literal.pop();
                    }
                    expr.push_str(&regex::escape(&literal));
                    literal.clear();

                    let group = format!("(?P<{name}>{capture})");
                    match (optional, optional_slash) {
                        (true, true) => expr.push_str(&format!("(?:/{group})?")),
                        (true, false) => expr.push_str(&format!("{group}?")),
                        _ => expr.push_str(&group),
                    }
                    params.push(name);
                    i = end;
                }
                '*' => {
                    expr.push_str(&regex::escape(&literal));
                    literal.clear();
                    expr.push_str(".*");
                    i += 1;
                }
                c => {
                    literal.push(c);
                    i += 1;
                }
            }
        }
        expr.push_str(&regex::escape(&literal));
        expr.push_str("(?:/)?$");

        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(&expr)?,
            params,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names of the parameters, in order of appearance.
    pub fn param_names(&self) -> &[String] {
        &self.params
    }

    /// Whether `url` is a full match for this pattern.
    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(strip_suffixes(url))
    }

    /// Named parameter values captured from `url`, or `None` if it does not
    /// match. Values are percent-decoded. Optional parameters that are absent
    /// are left out.
    pub fn params(&self, url: &str) -> Option<Map<String, Value>> {
        let captures = self.regex.captures(strip_suffixes(url))?;
        Some(
            self.params
                .iter()
                .filter_map(|name| {
                    captures.name(name).map(|m| {
                        let decoded = percent_decode_str(m.as_str()).decode_utf8_lossy();
                        (name.clone(), Value::String(decoded.into_owned()))
                    })
                })
                .collect(),
        )
    }
}

impl FromStr for RoutePattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RoutePattern").field(&self.source).finish()
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for RoutePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Index of the `)` closing the `(` at `open`, skipping escaped characters.
fn closing_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Drops the query string and fragment.
fn strip_suffixes(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// Compiled routes per method, in registration order.
#[derive(Debug, Clone, Default)]
pub struct PathMatcher {
    routes: HashMap<Method, Vec<RouteSpec>>,
}

impl PathMatcher {
    /// Collects every configured route. Methods without routes are left out.
    pub fn compile(specs: &Specs) -> Self {
        let routes = Method::ALL
            .into_iter()
            .filter(|method| !specs.routes(*method).is_empty())
            .map(|method| (method, specs.routes(method).to_vec()))
            .collect();
        Self { routes }
    }

    /// First route registered for `method` whose pattern fully matches `url`.
    pub fn resolve(&self, method: Method, url: &str) -> Option<&RouteSpec> {
        self.routes
            .get(&method)?
            .iter()
            .find(|route| route.pattern.matches(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FacetSchemas;
    use proptest::prelude::*;

    fn pattern(s: &str) -> RoutePattern {
        s.parse().unwrap()
    }

    fn matcher(routes: &[(Method, &str)]) -> PathMatcher {
        let mut specs = Specs::default();
        for (method, p) in routes {
            specs.insert(*method, pattern(p), FacetSchemas::new());
        }
        PathMatcher::compile(&specs)
    }

    #[test]
    fn test_literal_pattern() {
        let p = pattern("/user/authenticate");
        assert!(p.matches("/user/authenticate"));
        assert!(p.matches("/user/authenticate/"));
        assert!(p.matches("/USER/Authenticate"));
        assert!(!p.matches("/user/authenticate/extra"));
        assert!(!p.matches("/user"));
    }

    #[test]
    fn test_named_parameter() {
        let p = pattern("/user/:id");
        assert!(p.matches("/user/1"));
        assert!(p.matches("/user/abc/"));
        assert!(!p.matches("/user/"));
        assert!(!p.matches("/user/1/friends"));
        assert_eq!(p.param_names(), ["id"]);
        assert_eq!(
            p.params("/user/42").unwrap().get("id"),
            Some(&Value::String("42".into()))
        );
    }

    #[test]
    fn test_multiple_parameters() {
        let p = pattern("/user/:id/:someID/book");
        let params = p.params("/user/7/x9/book").unwrap();
        assert_eq!(params.get("id"), Some(&Value::String("7".into())));
        assert_eq!(params.get("someID"), Some(&Value::String("x9".into())));
    }

    #[test]
    fn test_query_and_fragment_are_ignored() {
        let p = pattern("/user/:id");
        assert!(p.matches("/user/1?expand=true"));
        assert!(p.matches("/user/1#top"));
        assert_eq!(
            p.params("/user/1?x=2").unwrap().get("id"),
            Some(&Value::String("1".into()))
        );
    }

    #[test]
    fn test_params_are_percent_decoded() {
        let p = pattern("/user/:name");
        assert!(p.matches("/user/J%C3%BCrgen"));
        assert_eq!(
            p.params("/user/J%C3%BCrgen").unwrap().get("name"),
            Some(&Value::String("Jürgen".into()))
        );
        assert_eq!(
            p.params("/user/a%2Fb+c").unwrap().get("name"),
            Some(&Value::String("a/b+c".into()))
        );
    }

    #[test]
    fn test_custom_expression() {
        let p = pattern(r"/order/:id(\d+)");
        assert!(p.matches("/order/12"));
        assert!(!p.matches("/order/abc"));
    }

    #[test]
    fn test_optional_parameter() {
        let p = pattern("/files/:name?");
        assert!(p.matches("/files"));
        assert!(p.matches("/files/"));
        assert!(p.matches("/files/report"));
        assert!(p.params("/files").unwrap().is_empty());
    }

    #[test]
    fn test_wildcard() {
        let p = pattern("/static/*");
        assert!(p.matches("/static/css/site.css"));
        assert!(!p.matches("/other/site.css"));
    }

    #[test]
    fn test_root_pattern() {
        let p = pattern("/");
        assert!(p.matches("/"));
        assert!(!p.matches("/user"));
    }

    #[test]
    fn test_literals_are_escaped() {
        let p = pattern("/v1.0/items");
        assert!(p.matches("/v1.0/items"));
        assert!(!p.matches("/v1x0/items"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!("user/:id".parse::<RoutePattern>().is_err());
        assert!("/user/:".parse::<RoutePattern>().is_err());
        assert!("/user/:id(".parse::<RoutePattern>().is_err());
        assert!("/a/:id/b/:id".parse::<RoutePattern>().is_err());
        assert!("/a/:id([)".parse::<RoutePattern>().is_err());
    }

    #[test]
    fn test_unknown_method_resolves_to_none() {
        let m = matcher(&[(Method::Get, "/user/:id")]);
        assert!(m.resolve(Method::Get, "/user/1").is_some());
        assert!(m.resolve(Method::Post, "/user/1").is_none());
        assert!(m.resolve(Method::Delete, "/user/1").is_none());
    }

    #[test]
    fn test_no_match_resolves_to_none() {
        let m = matcher(&[(Method::Get, "/user/:id")]);
        assert!(m.resolve(Method::Get, "/unknow/path").is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let m = matcher(&[(Method::Get, "/user/:id"), (Method::Get, "/user/authenticate")]);
        assert_eq!(
            m.resolve(Method::Get, "/user/authenticate").unwrap().pattern.as_str(),
            "/user/:id"
        );

        let m = matcher(&[(Method::Get, "/user/authenticate"), (Method::Get, "/user/:id")]);
        assert_eq!(
            m.resolve(Method::Get, "/user/authenticate").unwrap().pattern.as_str(),
            "/user/authenticate"
        );
    }

    proptest! {
        #[test]
        fn prop_first_registered_overlapping_pattern_wins(segment in "[a-z0-9]{1,12}") {
            let m = matcher(&[(Method::Put, "/item/:a"), (Method::Put, "/item/:b")]);
            let url = format!("/item/{segment}");
            prop_assert_eq!(m.resolve(Method::Put, &url).unwrap().pattern.as_str(), "/item/:a");
        }

        #[test]
        fn prop_prefixes_never_match(extra in "[a-z0-9]{1,12}") {
            let p = pattern("/user/:id");
            let url = format!("/user/1/{extra}");
            prop_assert!(!p.matches(&url));
        }

        #[test]
        fn prop_unconfigured_method_never_resolves(url in "/[a-z/]{0,20}") {
            let m = matcher(&[(Method::Get, "/*")]);
            prop_assert!(m.resolve(Method::Post, &url).is_none());
            prop_assert!(m.resolve(Method::Get, &url).is_some());
        }
    }
}
