//! HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors returned by API handlers, rendered as `{ "error": message }`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Generic 500 that hides the underlying cause from the caller
    pub fn internal(public_message: &str, cause: impl std::fmt::Display) -> Self {
        error!(error = %cause, "{}", public_message);
        ApiError::Internal(public_message.to_string())
    }
}

impl From<bizlink_common::Error> for ApiError {
    fn from(e: bizlink_common::Error) -> Self {
        use bizlink_common::Error;
        match e {
            Error::Validation(msg) => ApiError::BadRequest(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::internal("Internal server error", other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let api: ApiError =
            bizlink_common::Error::Validation("Some categories do not exist".into()).into();
        assert_eq!(api.to_string(), "Some categories do not exist");
        assert_eq!(api.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_database_error_is_opaque() {
        let api: ApiError = bizlink_common::Error::Internal("disk on fire".into()).into();
        assert_eq!(api.to_string(), "Internal server error");
        assert_eq!(api.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
