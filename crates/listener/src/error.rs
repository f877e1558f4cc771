//! Mapping of [`pipeline::ForgebotError`] onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pipeline::ForgebotError;
use serde::Serialize;

/// Error body returned to the webhook sender.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    message: String,
}

/// HTTP wrapper around [`ForgebotError`].
///
/// Client errors (authentication, decode) become 400. Nothing else is expected
/// on the request path, but maps to 500 if it happens.
#[derive(Debug)]
pub struct ApiError(pub ForgebotError);

impl From<ForgebotError> for ApiError {
    fn from(value: ForgebotError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let payload = Json(ErrorResponse {
            message: self.0.to_string(),
        });

        (status, payload).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
