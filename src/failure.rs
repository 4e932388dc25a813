//! The single place deciding what happens to a failed request.

use crate::{Config, DecoratedError, ErrorBody};
use http::StatusCode;

/// Destination for a terminal error response.
pub trait ResponseSink {
    /// Writes the response. Called at most once per validated request.
    fn write(&mut self, status: StatusCode, body: ErrorBody);
}

/// Applies the configured failure policy.
///
/// With `send_error_response` the error is written to the [`ResponseSink`]
/// as `{ "error": true, "data": <error> }` and the continuation is not
/// called. Otherwise the continuation receives the error and nothing is
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureHandler {
    send_error_response: bool,
}

impl FailureHandler {
    pub fn new(send_error_response: bool) -> Self {
        Self {
            send_error_response,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.send_error_response)
    }

    pub fn handle<S, F>(&self, error: DecoratedError, status: StatusCode, sink: &mut S, next: F)
    where
        S: ResponseSink + ?Sized,
        F: FnOnce(Option<DecoratedError>),
    {
        if self.send_error_response {
            tracing::debug!(
                status = %status.as_u16(),
                description = %error.description,
                "Responding with validation error"
            );
            sink.write(status, ErrorBody::from(error));
        } else {
            tracing::debug!(
                status = %status.as_u16(),
                description = %error.description,
                "Forwarding validation error"
            );
            next(Some(error));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink(Vec<(StatusCode, ErrorBody)>);

    impl ResponseSink for RecordingSink {
        fn write(&mut self, status: StatusCode, body: ErrorBody) {
            self.0.push((status, body));
        }
    }

    fn invalid_url() -> DecoratedError {
        DecoratedError::generic(&"Invalid URL")
    }

    #[test]
    fn test_sends_response_when_configured() {
        let mut sink = RecordingSink::default();
        let mut calls = 0;
        FailureHandler::new(true).handle(invalid_url(), StatusCode::NOT_FOUND, &mut sink, |_| {
            calls += 1
        });

        assert_eq!(calls, 0);
        assert_eq!(
            sink.0,
            vec![(
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: true,
                    data: invalid_url()
                }
            )]
        );
    }

    #[test]
    fn test_forwards_error_by_default() {
        let mut sink = RecordingSink::default();
        let mut forwarded = Vec::new();
        FailureHandler::from_config(&Config::default()).handle(
            invalid_url(),
            StatusCode::NOT_FOUND,
            &mut sink,
            |error| forwarded.push(error),
        );

        assert!(sink.0.is_empty());
        assert_eq!(forwarded, vec![Some(invalid_url())]);
    }
}
