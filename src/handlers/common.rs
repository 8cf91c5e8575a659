use crate::{
    errors::{ApiError, ServiceError},
    ApiResponse, PaginatedResponse,
};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::convert::Infallible;
use validator::Validate;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Success response carrying a human-readable message
pub fn message_response<T: Serialize>(status: StatusCode, data: T, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::with_message(data, message))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Page of items in the success envelope
pub fn paginated_response<T: Serialize>(items: Vec<T>, total: u64, page: u64, limit: u64) -> Response {
    success_response(PaginatedResponse::new(items, total, page, limit))
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input
        .validate()
        .map_err(|e| ApiError::ValidationError(format!("Validation failed: {}", e)))
}

/// Map service errors to API errors
pub fn map_service_error(err: ServiceError) -> ApiError {
    ApiError::ServiceError(err)
}

/// Preferred content language from `Accept-Language`, e.g. `en-US,en;q=0.9` -> `en`
#[derive(Debug, Clone, Default)]
pub struct Language(pub Option<String>);

impl Language {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    fn parse(header_value: &str) -> Option<String> {
        header_value
            .split(',')
            .next()
            .and_then(|tag| tag.split(';').next())
            .and_then(|tag| tag.trim().split('-').next())
            .map(|primary| primary.trim().to_ascii_lowercase())
            .filter(|primary| !primary.is_empty() && primary != "*")
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Language
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Language(
            parts
                .headers
                .get(header::ACCEPT_LANGUAGE)
                .and_then(|v| v.to_str().ok())
                .and_then(Language::parse),
        ))
    }
}
