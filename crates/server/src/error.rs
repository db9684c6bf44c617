use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;

use taskboard_api::{ApiError, ServiceError};

/// Unified API error type.
///
/// Produces `{"error": "<message>"}` JSON responses.
#[derive(Debug)]
pub struct ApiErr {
    status: StatusCode,
    message: String,
}

impl ApiErr {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Build a closure that logs a DB/IO error and returns `500 Internal Server Error`.
    pub fn from_db<E: fmt::Display>(context: &str) -> impl FnOnce(E) -> Self + '_ {
        move |e| {
            tracing::error!("{context}: {e}");
            Self::internal("internal server error")
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ServiceError> for ApiErr {
    fn from(e: ServiceError) -> Self {
        if let ServiceError::Internal(msg) = &e {
            tracing::error!("service error: {msg}");
            return Self::internal("internal server error");
        }
        let status =
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, e.message())
    }
}

impl From<JsonRejection> for ApiErr {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiErr {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiErr {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiError {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// `Json` body extractor whose rejections use the `{"error": ..}` shape.
///
/// Malformed bodies and unknown enum values are both answered with 400.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiErr))]
pub struct ApiJson<T>(pub T);

/// `Query` extractor with `{"error": ..}` rejections.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiErr))]
pub struct ApiQuery<T>(pub T);

/// `Path` extractor with `{"error": ..}` rejections.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiErr))]
pub struct ApiPath<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_keep_status_and_message() {
        let err = ApiErr::from(ServiceError::Conflict("already a member".into()));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.message(), "already a member");
    }

    #[test]
    fn internal_service_errors_are_masked() {
        let err = ApiErr::from(ServiceError::Internal("RNG failure: boom".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "internal server error");
    }
}
