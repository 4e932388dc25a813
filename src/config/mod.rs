//!
//! Validator configuration: global failure policy plus per-route facet schemas.
//!
//! A configuration can be created in several ways:
//! - Normalized from a raw JSON value via `Config::normalize`, which never
//!   fails: a candidate that does not have the expected shape is discarded as
//!   a whole and replaced by `Config::default()`
//! - Strictly from a JSON value, JSON text or TOML text via
//!   `Config::try_from_value`, `Config::from_json` and `Config::from_toml`
//! - From an environment-specific TOML file via `Config::from_rust_env` or
//!   `Config::from_toml_file`
//! - Constructed programmatically via the builder methods on `Config`
//!
//! The raw shape is:
//!
//! ```json
//! {
//!   "allowUndefinedPaths": true,
//!   "sendErrorResponse": false,
//!   "coerceTypes": false,
//!   "maxBodySize": "1MiB",
//!   "logging": { "format": "json" },
//!   "specs": {
//!     "GET": { "/user/:id": { "path": { "type": "object" } } },
//!     "POST": {}, "PUT": {}, "DELETE": {}
//!   }
//! }
//! ```
//!
//! Facet schemas (`header`, `path`, `query`, `body`) are JSON Schema documents.
//! Routes keep the order in which they appear in the source text.
//!
mod logging;
mod specs;

pub use logging::*;
pub use specs::*;

pub use byte_unit::Byte;

use {
    crate::{Error, JsonSchema, Result, RoutePattern},
    serde::Deserialize,
    serde_json::{Map, Value, json},
    std::{env, fs, path::Path, str::FromStr, sync::LazyLock},
};

/// Fixed meta-schema every raw configuration must satisfy before it is used.
static CONFIG_META_SCHEMA: LazyLock<jsonschema::Validator> = LazyLock::new(|| {
    jsonschema::validator_for(&json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "allowUndefinedPaths": { "type": "boolean" },
            "sendErrorResponse": { "type": "boolean" },
            "coerceTypes": { "type": "boolean" },
            "maxBodySize": { "type": ["string", "integer"], "minimum": 0 },
            "logging": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "format": { "enum": ["json", "default", "compact", "pretty"] }
                }
            },
            "specs": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "GET": { "$ref": "#/$defs/routes" },
                    "POST": { "$ref": "#/$defs/routes" },
                    "PUT": { "$ref": "#/$defs/routes" },
                    "DELETE": { "$ref": "#/$defs/routes" }
                }
            }
        },
        "$defs": {
            "routes": {
                "type": "object",
                "additionalProperties": { "$ref": "#/$defs/facets" }
            },
            "facets": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "header": { "type": ["object", "boolean"] },
                    "path": { "type": ["object", "boolean"] },
                    "query": { "type": ["object", "boolean"] },
                    "body": { "type": ["object", "boolean"] }
                }
            }
        }
    }))
    .unwrap()
});

#[derive(Debug, Clone)]
pub struct Config {
    /// Let requests through when no route pattern matches. Defaults to true.
    pub allow_undefined_paths: bool,
    /// Answer failed requests directly instead of forwarding the error.
    /// Defaults to false.
    pub send_error_response: bool,
    /// Let the axum middleware turn numeric and boolean looking path and
    /// query strings into numbers and booleans before validation. Defaults
    /// to false.
    pub coerce_types: bool,
    /// Route specifications per method.
    pub specs: Specs,
    /// Largest request body the axum middleware buffers for validation.
    pub max_body_size: Byte,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            allow_undefined_paths: true,
            send_error_response: false,
            coerce_types: false,
            specs: Specs::default(),
            max_body_size: Self::default_max_body_size(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    fn default_max_body_size() -> Byte {
        Byte::from_u64(1024 * 1024)
    }

    fn default_true() -> bool {
        true
    }

    ///
    /// Turns a raw candidate into a configuration. `null` yields the defaults.
    /// Any candidate that fails validation is discarded entirely and the
    /// defaults are returned in its place; good and bad parts are never merged.
    ///
    pub fn normalize(raw: &Value) -> Config {
        match Self::try_from_value(raw) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "Invalid validator configuration, falling back to defaults"
                );
                Config::default()
            }
        }
    }

    ///
    /// Strict variant of `normalize`: checks the candidate against the
    /// meta-schema, fills in defaults and compiles every route pattern and
    /// facet schema.
    ///
    pub fn try_from_value(raw: &Value) -> Result<Config> {
        if raw.is_null() {
            return Ok(Config::default());
        }

        let problems: Vec<String> = CONFIG_META_SCHEMA
            .iter_errors(raw)
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect();
        if !problems.is_empty() {
            return Err(Error::config(problems.join("; ")));
        }

        RawConfig::deserialize(raw)?.compile()
    }

    ///
    /// Parses a configuration from JSON text.
    ///
    pub fn from_json(json_str: &str) -> Result<Config> {
        let raw: Value = serde_json::from_str(json_str)?;
        Self::try_from_value(&raw)
    }

    ///
    /// Parses a configuration from TOML text. Route patterns must be quoted
    /// keys, e.g. `[specs.GET."/user/:id".path]`.
    ///
    pub fn from_toml(toml_str: &str) -> Result<Config> {
        let table: toml::Table = toml::from_str(toml_str)?;
        let raw = serde_json::to_value(table)?;
        Self::try_from_value(&raw)
    }

    ///
    /// Loads the configuration from a file based on the RUST_ENV environment
    /// variable. The file is expected at "config/{RUST_ENV}.toml".
    ///
    pub fn from_rust_env() -> Result<Config> {
        let env = env::var("RUST_ENV").map_err(|e| Error::config(e.to_string()))?;
        Self::from_toml_file(format!("config/{env}.toml"))
    }

    ///
    /// Reads and parses a TOML configuration file.
    ///
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Config> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Sets whether requests to unconfigured routes pass through.
    pub fn with_allow_undefined_paths(mut self, allow: bool) -> Self {
        self.allow_undefined_paths = allow;
        self
    }

    /// Sets whether failures are answered directly.
    pub fn with_send_error_response(mut self, send: bool) -> Self {
        self.send_error_response = send;
        self
    }

    /// Sets whether path and query strings are coerced before validation.
    pub fn with_coerce_types(mut self, coerce: bool) -> Self {
        self.coerce_types = coerce;
        self
    }

    /// Registers the schemas for a route. Routes are matched in the order
    /// they are registered.
    pub fn with_route(mut self, method: Method, pattern: RoutePattern, schemas: FacetSchemas) -> Self {
        self.specs.insert(method, pattern, schemas);
        self
    }

    /// Sets the body buffering limit used by the axum middleware.
    pub fn with_max_body_size(mut self, size: u64) -> Self {
        self.max_body_size = Byte::from_u64(size);
        self
    }

    /// Sets the log format of the LoggingConfig.
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.logging.format = format;
        self
    }

    ///
    /// Sets up the tracing subscriber for logging based on the LoggingConfig.
    ///
    /// NOTE: This should be called early during startup to ensure logging is configured
    ///       before any log messages are emitted.
    ///
    pub fn setup_tracing(&self) {
        use tracing_subscriber::{EnvFilter, prelude::*};
        let env_filter = EnvFilter::from_default_env();
        match self.logging.format {
            LogFormat::Json => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer().json())
                    .with(env_filter)
                    .try_init();
            }
            LogFormat::Default => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer())
                    .with(env_filter)
                    .try_init();
            }
            LogFormat::Compact => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer().compact())
                    .with(env_filter)
                    .try_init();
            }
            LogFormat::Pretty => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer().pretty())
                    .with(env_filter)
                    .try_init();
            }
        }
    }
}

///
/// Parses a TOML configuration string into a Config struct.
///
impl FromStr for Config {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::from_toml(s)
    }
}

/// Raw configuration as it appears in JSON or TOML, before compilation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawConfig {
    #[serde(default = "Config::default_true")]
    allow_undefined_paths: bool,
    #[serde(default)]
    send_error_response: bool,
    #[serde(default)]
    coerce_types: bool,
    #[serde(default)]
    specs: RawSpecs,
    #[serde(default = "Config::default_max_body_size")]
    max_body_size: Byte,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Route pattern to facet schemas, per method. `serde_json` is built with
/// `preserve_order`, so iteration follows the source text.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSpecs {
    #[serde(rename = "GET", default)]
    get: Map<String, Value>,
    #[serde(rename = "POST", default)]
    post: Map<String, Value>,
    #[serde(rename = "PUT", default)]
    put: Map<String, Value>,
    #[serde(rename = "DELETE", default)]
    delete: Map<String, Value>,
}

impl RawSpecs {
    fn routes(&self, method: Method) -> &Map<String, Value> {
        match method {
            Method::Get => &self.get,
            Method::Post => &self.post,
            Method::Put => &self.put,
            Method::Delete => &self.delete,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFacets {
    header: Option<Value>,
    path: Option<Value>,
    query: Option<Value>,
    body: Option<Value>,
}

impl RawFacets {
    fn compile(self) -> Result<FacetSchemas> {
        let mut schemas = FacetSchemas::new();
        for (facet, document) in [
            (Facet::Header, self.header),
            (Facet::Path, self.path),
            (Facet::Query, self.query),
            (Facet::Body, self.body),
        ] {
            if let Some(document) = document {
                schemas = schemas.with(facet, JsonSchema::compile(document)?);
            }
        }
        Ok(schemas)
    }
}

impl RawConfig {
    fn compile(self) -> Result<Config> {
        let mut specs = Specs::default();
        for method in Method::ALL {
            for (pattern, facets) in self.specs.routes(method) {
                let pattern: RoutePattern = pattern.parse()?;
                let facets = RawFacets::deserialize(facets)?;
                specs.insert(method, pattern, facets.compile()?);
            }
        }

        Ok(Config {
            allow_undefined_paths: self.allow_undefined_paths,
            send_error_response: self.send_error_response,
            coerce_types: self.coerce_types,
            specs,
            max_body_size: self.max_body_size,
            logging: self.logging,
        })
    }
}
