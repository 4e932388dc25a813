//! Axum integration.
//!
//! [`RouterExt::with_request_validation`] installs a [`Validator`] in front of
//! every route of a router. The middleware resolves the route, describes the
//! request as a [`RequestDescriptor`] and runs the validator:
//!
//! - valid requests reach the handler untouched;
//! - with `send_error_response`, invalid requests are answered directly with
//!   `{ "error": true, "data": { "description", "errors" } }`;
//! - otherwise the request still reaches the handler, carrying the
//!   [`DecoratedError`] as a request extension.
//!
//! The body is only read when the resolved route has a body schema. It is
//! buffered up to `max_body_size`, and whatever was read is handed on to the
//! handler unchanged, even when buffering stopped early.
//!
//! With `coerce_types`, path and query strings that look like numbers or
//! booleans are converted before validation, so `{ "type": "number" }` works
//! for `/user/:id`.
//!
//! ```rust,no_run
//! use axum::{Extension, Router, routing::get};
//! use axum_request_validator::{DecoratedError, RouterExt, Validator};
//! use serde_json::json;
//!
//! async fn handler(error: Option<Extension<DecoratedError>>) -> String {
//!     match error {
//!         Some(Extension(error)) => format!("rejected: {}", error.description),
//!         None => "ok".to_string(),
//!     }
//! }
//!
//! let validator = Validator::new(&json!({ "allowUndefinedPaths": false }));
//! let app: Router = Router::new()
//!     .route("/", get(handler))
//!     .with_request_validation(validator);
//! ```

use crate::{ErrorBody, Facet, RequestDescriptor, ResponseSink, RouteSpec, Validator, Violation};
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body::{Body as HttpBody, Frame};
use http_body_util::BodyExt;
use serde_json::{Map, Number, Value};
use std::{
    collections::VecDeque,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

/// Adds request validation to an axum [`Router`].
pub trait RouterExt {
    /// Validates every request handled by this router.
    #[must_use]
    fn with_request_validation(self, validator: Validator) -> Self;
}

impl<S> RouterExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_request_validation(self, validator: Validator) -> Self {
        let validator = Arc::new(validator);
        self.layer(axum::middleware::from_fn(move |request, next| {
            let validator = Arc::clone(&validator);
            validation_middleware(validator, request, next)
        }))
    }
}

/// Captures the direct error response, if one is written.
impl ResponseSink for Option<Response> {
    fn write(&mut self, status: StatusCode, body: ErrorBody) {
        *self = Some((status, Json(body)).into_response());
    }
}

pub(crate) async fn validation_middleware(
    validator: Arc<Validator>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let url = request_url(&parts);
    let route = validator.route(parts.method.as_str(), url);

    let (body, body_value, unreadable_body) = match route {
        Some(route) if route.schemas.get(Facet::Body).is_some() => {
            let limit =
                usize::try_from(validator.config().max_body_size.as_u64()).unwrap_or(usize::MAX);
            let (buffered, body) = buffer_body(body, limit).await;
            match buffered.and_then(|bytes| body_value(&parts.headers, &bytes)) {
                Ok(value) => (body, value, None),
                Err(violation) => (body, Value::Object(Map::new()), Some(violation)),
            }
        }
        _ => (body, Value::Object(Map::new()), None),
    };

    let descriptor =
        describe(&parts, url, route, validator.config().coerce_types).with_body(body_value);

    let mut response: Option<Response> = None;
    let mut forwarded = None;
    if let Err(failure) = validator.check_route(&descriptor, route, unreadable_body) {
        validator.reject(failure, &mut response, |error| forwarded = error);
    }

    if let Some(response) = response {
        return response;
    }

    let mut request = Request::from_parts(parts, body);
    if let Some(error) = forwarded {
        request.extensions_mut().insert(error);
    }
    next.run(request).await
}

fn request_url(parts: &Parts) -> &str {
    parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| parts.uri.path())
}

/// Builds the descriptor of everything but the body.
fn describe(parts: &Parts, url: &str, route: Option<&RouteSpec>, coerce: bool) -> RequestDescriptor {
    let mut path = route
        .and_then(|route| route.pattern.params(url))
        .unwrap_or_default();
    let mut query = parts.uri.query().map(form_object).unwrap_or_default();
    if coerce {
        path.values_mut().for_each(coerce_value);
        query.values_mut().for_each(coerce_value);
    }

    RequestDescriptor::new(parts.method.as_str(), url)
        .with_header(Value::Object(header_object(&parts.headers)))
        .with_path(Value::Object(path))
        .with_query(Value::Object(query))
}

/// Header names (lowercase) to values. Repeated headers are joined with ", ".
fn header_object(headers: &HeaderMap) -> Map<String, Value> {
    let mut object = Map::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match object.get_mut(name.as_str()) {
            Some(Value::String(existing)) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            _ => {
                object.insert(name.as_str().to_string(), Value::String(value));
            }
        }
    }
    object
}

/// Decodes `application/x-www-form-urlencoded` data. Repeated keys become
/// arrays.
fn form_object(encoded: &str) -> Map<String, Value> {
    let mut object = Map::new();
    for (key, value) in url::form_urlencoded::parse(encoded.as_bytes()) {
        let value = Value::String(value.into_owned());
        match object.get_mut(&*key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                object.insert(key.into_owned(), value);
            }
        }
    }
    object
}

/// Turns numeric and boolean strings into numbers and booleans, also inside
/// arrays of repeated query values.
fn coerce_value(value: &mut Value) {
    let coerced = match value {
        Value::String(text) => coerce_scalar(text),
        Value::Array(items) => {
            items.iter_mut().for_each(coerce_value);
            None
        }
        _ => None,
    };
    if let Some(coerced) = coerced {
        *value = coerced;
    }
}

fn coerce_scalar(text: &str) -> Option<Value> {
    match text {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => match text.parse::<i64>() {
            Ok(integer) => Some(Value::from(integer)),
            Err(_) => text
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
        },
    }
}

/// Violation reported for the body facet when the body has no usable value.
fn body_violation(message: String) -> Violation {
    Violation::new(message, std::iter::empty::<String>())
}

/// Interprets the body by content type. An empty body is an empty object and
/// a body declared as JSON must parse.
fn body_value(headers: &HeaderMap, body: &Bytes) -> Result<Value, Violation> {
    if body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/x-www-form-urlencoded") {
        return Ok(Value::Object(form_object(&String::from_utf8_lossy(body))));
    }

    match serde_json::from_slice(body) {
        Ok(value) => Ok(value),
        Err(err) if content_type.contains("json") => {
            tracing::debug!(error = %err, "Request body is not valid JSON");
            Err(body_violation(format!("request body is not valid JSON: {err}")))
        }
        Err(_) => Ok(Value::String(String::from_utf8_lossy(body).into_owned())),
    }
}

/// Reads the body up to `limit` bytes.
///
/// The returned body always yields everything the original would have, in
/// order: the frames read here are replayed before the unread remainder.
async fn buffer_body(mut body: Body, limit: usize) -> (Result<Bytes, Violation>, Body) {
    let too_large = || {
        body_violation(format!("request body exceeds {limit} bytes")).with_context("limit", limit)
    };
    if HttpBody::size_hint(&body).lower() > limit as u64 {
        tracing::debug!(limit, "Request body exceeds the buffering limit");
        return (Err(too_large()), body);
    }

    let mut data = Vec::new();
    let mut read = VecDeque::new();
    let mut outcome = Ok(());
    while let Some(frame) = body.frame().await {
        match frame.map(Frame::into_data) {
            Ok(Ok(chunk)) if data.len() + chunk.len() <= limit => data.extend_from_slice(&chunk),
            Ok(Ok(chunk)) => {
                tracing::debug!(limit, "Request body exceeds the buffering limit");
                read.push_back(Ok(Frame::data(chunk)));
                outcome = Err(too_large());
                break;
            }
            Ok(Err(trailers)) => read.push_back(Ok(trailers)),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read request body");
                outcome = Err(body_violation(format!("request body could not be read: {err}")));
                read.push_back(Err(err));
                break;
            }
        }
    }

    let bytes = Bytes::from(data);
    if !bytes.is_empty() {
        read.push_front(Ok(Frame::data(bytes.clone())));
    }
    let body = Body::new(ReplayBody { read, rest: body });
    (outcome.map(|()| bytes), body)
}

/// A body whose leading frames were already read.
struct ReplayBody {
    read: VecDeque<Result<Frame<Bytes>, axum::Error>>,
    rest: Body,
}

impl HttpBody for ReplayBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        if let Some(frame) = self.read.pop_front() {
            return Poll::Ready(Some(frame));
        }
        Pin::new(&mut self.rest).poll_frame(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValidationFailure;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_header_object_joins_repeats() {
        let map = headers(&[
            ("accept", "text/html"),
            ("accept", "application/json"),
            ("accesstoken", "abc"),
        ]);
        assert_eq!(
            Value::Object(header_object(&map)),
            json!({ "accept": "text/html, application/json", "accesstoken": "abc" })
        );
    }

    #[test]
    fn test_form_object_collects_repeats() {
        assert_eq!(
            Value::Object(form_object("order=ASC&tag=a&tag=b&tag=c&name=J%C3%BCrgen+X")),
            json!({ "order": "ASC", "tag": ["a", "b", "c"], "name": "Jürgen X" })
        );
        assert!(form_object("").is_empty());
    }

    #[test]
    fn test_coerce_value() {
        let mut query = json!({
            "id": "42",
            "ratio": "0.5",
            "negative": "-3",
            "flag": "true",
            "off": "false",
            "name": "abc",
            "ids": ["1", "x"],
            "nan": "NaN",
            "empty": ""
        });
        if let Value::Object(map) = &mut query {
            map.values_mut().for_each(coerce_value);
        }
        assert_eq!(
            query,
            json!({
                "id": 42,
                "ratio": 0.5,
                "negative": -3,
                "flag": true,
                "off": false,
                "name": "abc",
                "ids": [1, "x"],
                "nan": "NaN",
                "empty": ""
            })
        );
    }

    #[test]
    fn test_body_value_by_content_type() {
        let json_headers = headers(&[("content-type", "application/json")]);
        assert_eq!(body_value(&json_headers, &Bytes::new()).unwrap(), json!({}));
        assert_eq!(
            body_value(&json_headers, &Bytes::from_static(br#"{"a":1}"#)).unwrap(),
            json!({ "a": 1 })
        );
        let violation = body_value(&json_headers, &Bytes::from_static(b"{oops")).unwrap_err();
        assert!(violation.message.starts_with("request body is not valid JSON"));
        assert!(violation.path.is_empty());

        let form_headers = headers(&[("content-type", "application/x-www-form-urlencoded")]);
        assert_eq!(
            body_value(&form_headers, &Bytes::from_static(b"username=jo&password=pw")).unwrap(),
            json!({ "username": "jo", "password": "pw" })
        );

        let text_headers = headers(&[("content-type", "text/plain")]);
        assert_eq!(
            body_value(&text_headers, &Bytes::from_static(b"hello")).unwrap(),
            json!("hello")
        );
    }

    #[tokio::test]
    async fn test_buffer_body_within_limit() {
        let (buffered, body) = buffer_body(Body::from("hello"), 16).await;
        assert_eq!(buffered.unwrap(), Bytes::from_static(b"hello"));
        let replayed = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(&replayed[..], b"hello");
    }

    #[tokio::test]
    async fn test_buffer_body_over_limit_keeps_every_byte() {
        let payload = "x".repeat(100);
        let (buffered, body) = buffer_body(Body::from(payload.clone()), 16).await;
        let violation = buffered.unwrap_err();
        assert_eq!(violation.message, "request body exceeds 16 bytes");
        assert_eq!(violation.context.get("limit"), Some(&json!(16)));
        let replayed = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(replayed.len(), 100);
        assert_eq!(&replayed[..], payload.as_bytes());
    }

    #[tokio::test]
    async fn test_buffer_empty_body() {
        let (buffered, body) = buffer_body(Body::empty(), 16).await;
        assert!(buffered.unwrap().is_empty());
        assert!(axum::body::to_bytes(body, usize::MAX).await.unwrap().is_empty());
    }

    #[test]
    fn test_option_response_sink() {
        let mut sink: Option<Response> = None;
        sink.write(
            StatusCode::NOT_FOUND,
            ErrorBody::from(ValidationFailure::RequestMalformed.decorate()),
        );
        assert_eq!(sink.unwrap().status(), StatusCode::NOT_FOUND);
    }
}
