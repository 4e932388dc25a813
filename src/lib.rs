//! # axum-request-validator
//!
//! Declarative per-route request validation for Axum services.
//!
//! Routes are described by URL patterns (`/user/:id`), and each route may carry
//! a JSON Schema for any of four request facets: `header`, `path`, `query` and
//! `body`. Every request is resolved to the first matching pattern and checked
//! facet by facet. Failures are normalized into one error shape and either
//! answered directly or handed on to the application, depending on the
//! configuration.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use axum_request_validator::{Config, Result, RouterExt, Validator};
//!
//! async fn user() -> &'static str {
//!     "user"
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::from_rust_env()?;  // Loads config/{RUST_ENV}.toml
//!     config.setup_tracing();
//!
//!     let app = Router::new()
//!         .route("/user/{id}", get(user))
//!         .with_request_validation(Validator::from_config(config));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! With `config/dev.toml`:
//! ```toml
//! allowUndefinedPaths = false
//! sendErrorResponse = true
//!
//! [specs.GET."/user/:id".path]
//! type = "object"
//! properties = { id = { type = "string", pattern = "^[0-9]+$" } }
//! ```
//!
//! Run with `RUST_ENV=dev cargo run`.
//!
//! # Outcomes
//!
//! | Situation | Status | `description` |
//! |-----------|--------|---------------|
//! | Method or URL missing | 400 | `Invalid Request Format` |
//! | No pattern matches, undefined paths disallowed | 404 | `Invalid URL` |
//! | A facet schema rejects the request | 400 | `request <facet> params validation failed` |
//! | Body over `maxBodySize` or invalid JSON, route has a body schema | 400 | `request body params validation failed` |
//! | No pattern matches, undefined paths allowed | passes | |
//! | Every configured facet conforms | passes | |
//!
//! With `sendErrorResponse = true` failures are answered with
//! `{ "error": true, "data": { "description": ..., "errors": [...] } }`.
//! Otherwise the request continues and the [`DecoratedError`] is available to
//! the handler as a request extension.
//!
//! # Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Configuration loading and normalization ([`Config`]) |
//! | [`matcher`] | Route patterns and resolution ([`RoutePattern`], [`PathMatcher`]) |
//! | [`schema`] | Facet schemas ([`Schema`], [`JsonSchema`], [`FnSchema`]) |
//! | [`decorate`] | The uniform error shape ([`DecoratedError`]) |
//! | [`failure`] | The failure policy ([`FailureHandler`]) |
//! | [`validator`] | The orchestrator ([`Validator`]) |
//! | [`middleware`] | Axum integration ([`RouterExt`]) |
//! | [`error`] | Error types ([`Error`], [`ValidationFailure`]) |
//!
//! # Framework-independent use
//!
//! The [`Validator`] does not depend on Axum. Describe the request yourself
//! and supply a [`ResponseSink`] and a continuation:
//!
//! ```rust
//! use axum_request_validator::{ErrorBody, RequestDescriptor, ResponseSink, Validator};
//! use http::StatusCode;
//! use serde_json::json;
//!
//! struct Captured(Option<(StatusCode, ErrorBody)>);
//!
//! impl ResponseSink for Captured {
//!     fn write(&mut self, status: StatusCode, body: ErrorBody) {
//!         self.0 = Some((status, body));
//!     }
//! }
//!
//! let validator = Validator::new(&json!({
//!     "allowUndefinedPaths": false,
//!     "sendErrorResponse": true
//! }));
//!
//! let mut sink = Captured(None);
//! validator.validate(&RequestDescriptor::new("GET", "/nowhere"), &mut sink, |_| {
//!     unreachable!("the error is answered directly")
//! });
//!
//! let (status, body) = sink.0.unwrap();
//! assert_eq!(status, StatusCode::NOT_FOUND);
//! assert_eq!(body.data.description, "Invalid URL");
//! ```
pub mod config;
pub mod decorate;
pub mod error;
pub mod failure;
pub mod matcher;
pub mod middleware;
pub mod schema;
pub mod validator;

pub use config::*;
pub use decorate::*;
pub use error::*;
pub use failure::*;
pub use matcher::*;
pub use middleware::*;
pub use schema::*;
pub use validator::*;

pub type Result<T, E = Error> = std::result::Result<T, E>;
