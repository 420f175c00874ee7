use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::endpoint::FieldError;
use crate::registry::RegistryError;

/// A single entry of an error document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorObject {
    pub code: String,
    pub detail: String,
}

/// Error document: `{"errors": [{"code": ..., "detail": ...}]}`
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorObject>,
}

impl ErrorResponse {
    fn single(code: &str, detail: impl Into<String>) -> Self {
        Self {
            errors: vec![ErrorObject {
                code: code.to_string(),
                detail: detail.into(),
            }],
        }
    }
}

/// Response type for health check endpoint
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Response type for unhealthy status
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct UnhealthyResponse {
    pub status: String,
    pub error: String,
}

/// Error type shared by the management API and the dispatcher
///
/// Every variant except `Internal` maps to one of the structured error codes
/// clients can rely on. Storage faults are logged and reported as a generic 500.
#[derive(Debug)]
pub enum ApiError {
    /// A required request member is missing
    InvalidParameters(String),
    /// Unknown or malformed endpoint id
    NotFound,
    /// No registered endpoint matches the dispatched path
    PageNotFound(String),
    /// One entry per failed validation rule
    Validation(Vec<FieldError>),
    /// Request body is not well-formed JSON
    InvalidRequest,
    /// Mutating request without the JSON:API media type
    UnsupportedMediaType,
    /// Missing or wrong API token
    Unauthorized,
    /// Storage or other unexpected failure
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidParameters(param) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::single(
                    "invalid_parameters",
                    format!("Missing required parameter: {}", param),
                ),
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                ErrorResponse::single("not_found", "Requested resource does not exist"),
            ),
            ApiError::PageNotFound(path) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::single(
                    "not_found",
                    format!("Requested page {} does not exist", path),
                ),
            ),
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    errors: errors
                        .iter()
                        .map(|error| ErrorObject {
                            code: "validation_error".to_string(),
                            detail: error.full_message(),
                        })
                        .collect(),
                },
            ),
            ApiError::InvalidRequest => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::single("invalid_request", "Invalid JSON format"),
            ),
            ApiError::UnsupportedMediaType => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                ErrorResponse::single(
                    "unsupported_media_type",
                    format!("Content-Type must be {}", crate::jsonapi::MEDIA_TYPE),
                ),
            ),
            ApiError::Unauthorized => {
                let body = ErrorResponse::single("unauthorized", "Access denied");
                let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
                response.headers_mut().insert(
                    WWW_AUTHENTICATE,
                    HeaderValue::from_static("Bearer realm=\"Application\""),
                );
                return response;
            }
            ApiError::Internal(err) => {
                tracing::error!("Request failed: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::single("internal_error", "Internal server error"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound => ApiError::NotFound,
            RegistryError::Invalid(errors) => ApiError::Validation(errors),
            RegistryError::Store(err) => ApiError::Internal(err),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}
