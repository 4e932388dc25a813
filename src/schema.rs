//! Schema capability used to check a single request facet.
//!
//! The validator treats schemas as opaque: anything implementing [`Schema`]
//! can be attached to a facet. Two implementations ship with the crate:
//!
//! - [`JsonSchema`]: a JSON Schema document compiled with the `jsonschema`
//!   crate. This is what configurations loaded from JSON or TOML use.
//! - [`FnSchema`]: wraps a closure, for hand-written checks or adapters to
//!   other validation engines.
//!
//! Schemas must report every violation they find in a value rather than
//! stopping at the first one.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A single validation failure reported by a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Human-readable description of the failure.
    pub message: String,
    /// Field path to the offending value, outermost segment first.
    pub path: Vec<String>,
    /// Extra details (offending value, key, label, ...).
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl Violation {
    /// Creates a violation with an empty context.
    pub fn new<I, S>(message: impl Into<String>, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            message: message.into(),
            path: path.into_iter().map(Into::into).collect(),
            context: Map::new(),
        }
    }

    /// Adds an entry to the context.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// A validation contract for one facet value.
pub trait Schema: Send + Sync + fmt::Debug {
    /// Checks `value` and returns every violation found. An empty vector
    /// means the value conforms.
    fn validate(&self, value: &Value) -> Vec<Violation>;
}

/// A JSON Schema document compiled once and reused for every request.
pub struct JsonSchema {
    document: Value,
    validator: jsonschema::Validator,
}

impl JsonSchema {
    /// Compiles a JSON Schema document.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::SchemaInvalid`](crate::ErrorKind::SchemaInvalid)
    /// error if the document is not a valid schema.
    pub fn compile(document: Value) -> Result<Self> {
        let validator =
            jsonschema::validator_for(&document).map_err(|e| Error::schema(e.to_string()))?;
        Ok(Self {
            document,
            validator,
        })
    }

    /// Returns the source document.
    pub fn document(&self) -> &Value {
        &self.document
    }
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema")
            .field("document", &self.document)
            .finish()
    }
}

impl Schema for JsonSchema {
    fn validate(&self, value: &Value) -> Vec<Violation> {
        self.validator
            .iter_errors(value)
            .map(|error| {
                let mut path = pointer_segments(&error.instance_path.to_string());
                let missing = match &error.kind {
                    jsonschema::error::ValidationErrorKind::Required { property } => {
                        path.push(match property {
                            Value::String(name) => name.clone(),
                            other => other.to_string(),
                        });
                        true
                    }
                    _ => false,
                };

                let mut violation = Violation::new(error.to_string(), path);
                if !missing {
                    violation = violation.with_context("value", error.instance.clone().into_owned());
                }
                if let Some(key) = violation.path.last().cloned() {
                    violation = violation
                        .with_context("key", key.clone())
                        .with_context("label", key);
                }
                violation
            })
            .collect()
    }
}

/// Splits a JSON pointer ("/a/b~1c") into unescaped segments.
fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

type ValidateFn = dyn Fn(&Value) -> Vec<Violation> + Send + Sync;

/// A schema backed by a closure.
///
/// ```rust
/// use axum_request_validator::{FnSchema, Schema, Violation};
/// use serde_json::json;
///
/// let id_is_number = FnSchema::new(|value| match value.get("id") {
///     Some(id) if id.is_number() => vec![],
///     _ => vec![Violation::new("\"id\" must be a number", ["id"])],
/// });
/// assert!(id_is_number.validate(&json!({ "id": 1 })).is_empty());
/// assert_eq!(id_is_number.validate(&json!({ "id": "abc" })).len(), 1);
/// ```
pub struct FnSchema {
    check: Box<ValidateFn>,
}

impl FnSchema {
    /// Wraps a closure as a schema.
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&Value) -> Vec<Violation> + Send + Sync + 'static,
    {
        Self {
            check: Box::new(check),
        }
    }
}

impl fmt::Debug for FnSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FnSchema(..)")
    }
}

impl Schema for FnSchema {
    fn validate(&self, value: &Value) -> Vec<Violation> {
        (self.check)(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    fn user_body_schema() -> JsonSchema {
        JsonSchema::compile(json!({
            "type": "object",
            "properties": {
                "username": { "type": "string", "pattern": "^[a-zA-Z0-9]+$" },
                "password": { "type": "string" },
                "birthyear": { "type": "integer", "minimum": 1900, "maximum": 2013 }
            },
            "required": ["username", "password", "birthyear"]
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_value_has_no_violations() {
        let schema = user_body_schema();
        let violations = schema.validate(&json!({
            "username": "johnDoe",
            "password": "xydnqjhd",
            "birthyear": 2000
        }));
        assert!(violations.is_empty());
    }

    #[test]
    fn test_collects_every_violation() {
        let schema = user_body_schema();
        let violations = schema.validate(&json!({ "username": "John Doe" }));
        assert_eq!(violations.len(), 3, "{violations:?}");

        let paths: Vec<_> = violations.iter().map(|v| v.path.clone()).collect();
        assert!(paths.contains(&vec!["username".to_string()]));
        assert!(paths.contains(&vec!["password".to_string()]));
        assert!(paths.contains(&vec!["birthyear".to_string()]));
    }

    #[test]
    fn test_required_violation_names_missing_field() {
        let schema = user_body_schema();
        let violations = schema.validate(&json!({ "username": "john", "password": "x" }));
        assert_eq!(violations.len(), 1);
        let violation = &violations[0];
        assert_eq!(violation.path, vec!["birthyear"]);
        assert_eq!(violation.context.get("key"), Some(&json!("birthyear")));
        assert!(violation.context.get("value").is_none());
        assert!(violation.message.contains("birthyear"));
    }

    #[test]
    fn test_type_violation_carries_offending_value() {
        let schema = JsonSchema::compile(json!({
            "type": "object",
            "properties": { "id": { "type": "number" } }
        }))
        .unwrap();
        let violations = schema.validate(&json!({ "id": "abc" }));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, vec!["id"]);
        assert_eq!(violations[0].context.get("value"), Some(&json!("abc")));
        assert_eq!(violations[0].context.get("label"), Some(&json!("id")));
    }

    #[test]
    fn test_nested_paths_are_split() {
        let schema = JsonSchema::compile(json!({
            "type": "object",
            "properties": {
                "tags": { "type": "array", "items": { "type": "string" } }
            }
        }))
        .unwrap();
        let violations = schema.validate(&json!({ "tags": ["a", 2] }));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, vec!["tags", "1"]);
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let err = JsonSchema::compile(json!({ "type": 12 })).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaInvalid);
    }

    #[test]
    fn test_pointer_segments_unescape() {
        assert_eq!(pointer_segments(""), Vec::<String>::new());
        assert_eq!(pointer_segments("/a~1b/c~0d"), vec!["a/b", "c~d"]);
    }

    #[test]
    fn test_violation_serializes_in_order() {
        let violation = Violation::new("\"id\" must be a number", ["id"])
            .with_context("value", "abc")
            .with_context("key", "id");
        assert_eq!(
            serde_json::to_string(&violation).unwrap(),
            r#"{"message":"\"id\" must be a number","path":["id"],"context":{"value":"abc","key":"id"}}"#
        );
    }
}
