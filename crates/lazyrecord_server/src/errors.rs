//! HTTP error envelope.
//!
//! # Invariants
//! - Every failure renders as `{"error": "<message>"}`.
//! - Store failures never leak backend detail into the response body; the
//!   detail goes to the log as an error code.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lazyrecord_core::{ServiceError, StoreError};
use log::{error, warn};
use serde::Serialize;

#[derive(Debug)]
pub struct ServerError {
    status: StatusCode,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ServerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Maps a service failure for `route`. Input errors keep their message
    /// and a missing record is a 404; every other store failure becomes a
    /// 500 carrying `failure_message`.
    pub fn from_service(route: &str, failure_message: &str, err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidInput(message) => {
                warn!(
                    "event=request_rejected module=http route={} status=error error_code=invalid_input",
                    route
                );
                Self::bad_request(message)
            }
            ServiceError::Store(StoreError::NotFound { entity, .. }) => {
                warn!(
                    "event=request_rejected module=http route={} status=error error_code=not_found",
                    route
                );
                Self::new(StatusCode::NOT_FOUND, format!("{entity} not found"))
            }
            ServiceError::Store(err) => {
                error!(
                    "event=request_failed module=http route={} status=error error_code={}",
                    route,
                    err.code()
                );
                Self::internal(failure_message)
            }
        }
    }

    pub fn invalid_json(route: &str, rejection: JsonRejection) -> Self {
        warn!(
            "event=request_rejected module=http route={} status=error error_code=invalid_json http_status={}",
            route,
            rejection.status().as_u16()
        );
        Self::bad_request("invalid JSON body")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::ServerError;
    use axum::http::StatusCode;
    use lazyrecord_core::{ServiceError, StoreError};

    #[test]
    fn invalid_input_is_bad_request_with_its_message() {
        let err = ServerError::from_service(
            "/count/post",
            "failed to update counter",
            ServiceError::InvalidInput("count must be positive".to_string()),
        );
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "count must be positive");
    }

    #[test]
    fn missing_record_is_not_found_without_the_key() {
        let err = ServerError::from_service(
            "/count/post",
            "failed to update counter",
            ServiceError::Store(StoreError::NotFound {
                entity: "counter",
                key: "1".to_string(),
            }),
        );
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "counter not found");
    }

    #[test]
    fn store_failures_are_opaque_internal_errors() {
        for store_err in [
            StoreError::Timeout,
            StoreError::EmptyPool("hello"),
            StoreError::InvalidState("broken".to_string()),
        ] {
            let err = ServerError::from_service(
                "/get",
                "failed to fetch message",
                ServiceError::Store(store_err),
            );
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(err.message(), "failed to fetch message");
        }
    }
}
