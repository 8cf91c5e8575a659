use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Stable machine-readable error codes returned to clients
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    EmptyCart,
    AddressNotFound,
    InvalidPaymentMethod,
    VoucherExpired,
    VoucherNotStarted,
    VoucherNotAvailable,
    InsufficientStock,
    ProductUnavailable,
    VoucherMinValueNotMet,
    VoucherNotApplicable,
    InvalidStatusTransition,
    InvalidCode,
    AlreadyAdded,
    AlreadyReviewed,
    OrderNotCompleted,
    VoucherInUse,
    CartFull,
    OutOfStock,
    InvalidVariant,
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    Unauthorized,
    StorageUnavailable,
    Internal,
}

/// A single rejected cart line, reported together with its siblings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LineIssue {
    pub line_id: Uuid,
    pub product_id: Uuid,
    pub code: ErrorCode,
    pub message: String,
    pub requested: i32,
    pub available: i32,
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Bad Request",
    "code": "VOUCHER_EXPIRED",
    "message": "Voucher SUMMER10 has expired",
    "details": null,
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error description
    pub message: String,
    /// Structured details, such as every rejected cart line
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub details: Option<serde_json::Value>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[serde(skip)] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {message}")]
    Conflict { code: ErrorCode, message: String },

    #[error("{message}")]
    BusinessRule { code: ErrorCode, message: String },

    #[error("{} cart line(s) cannot be ordered", .0.len())]
    CartLinesRejected(Vec<LineIssue>),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<DbErr> for ServiceError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::ConnectionAcquire(e) => {
                ServiceError::ServiceUnavailable(format!("storage connection unavailable: {}", e))
            }
            DbErr::Conn(e) => {
                ServiceError::ServiceUnavailable(format!("storage connection failed: {}", e))
            }
            other => ServiceError::DatabaseError(other),
        }
    }
}

impl From<tokio::time::error::Elapsed> for ServiceError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ServiceError::ServiceUnavailable("storage operation timed out".to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Business-rule failure with a specific code
    pub fn rule(code: ErrorCode, message: impl Into<String>) -> Self {
        ServiceError::BusinessRule {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: ErrorCode, message: impl Into<String>) -> Self {
        ServiceError::Conflict {
            code,
            message: message.into(),
        }
    }

    /// Machine-readable code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => ErrorCode::Internal,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::ValidationError(_) => ErrorCode::Validation,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::Conflict { code, .. } | Self::BusinessRule { code, .. } => *code,
            Self::CartLinesRejected(issues) => issues
                .first()
                .map(|issue| issue.code)
                .unwrap_or(ErrorCode::InsufficientStock),
            Self::ServiceUnavailable(_) => ErrorCode::StorageUnavailable,
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_)
            | Self::BusinessRule {
                code: ErrorCode::AddressNotFound,
                ..
            } => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::BusinessRule { .. } | Self::CartLinesRejected(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            Self::ServiceUnavailable(_) => {
                "Storage temporarily unavailable, please retry".to_string()
            }
            _ => self.to_string(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::CartLinesRejected(issues) => Some(json!({ "lines": issues })),
            _ => None,
        }
    }

    /// Transient failures the client may retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }
}

fn error_body(
    status: StatusCode,
    code: ErrorCode,
    message: String,
    details: Option<serde_json::Value>,
) -> Response {
    let err = ErrorResponse {
        error: status.canonical_reason().unwrap_or("Error").to_string(),
        code,
        message,
        details,
        request_id: current_request_id(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    (status, Json(err)).into_response()
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = %self.code(), "request failed");
        }
        error_body(status, self.code(), self.response_message(), self.details())
    }
}

/// API Error type for HTTP responses
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Delegate to ServiceError's unified status/message methods when applicable
        match self {
            ApiError::ServiceError(service_error) => service_error.into_response(),
            ApiError::ValidationError(msg) => {
                error_body(StatusCode::BAD_REQUEST, ErrorCode::Validation, msg, None)
            }
            ApiError::NotFound(msg) => {
                error_body(StatusCode::NOT_FOUND, ErrorCode::NotFound, msg, None)
            }
            ApiError::Unauthorized => error_body(
                StatusCode::UNAUTHORIZED,
                ErrorCode::Unauthorized,
                "Unauthorized".to_string(),
                None,
            ),
            ApiError::Forbidden(msg) => {
                error_body(StatusCode::FORBIDDEN, ErrorCode::Forbidden, msg, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn service_error_response_includes_request_id_and_code() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::rule(ErrorCode::VoucherExpired, "voucher expired").into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.code, ErrorCode::VoucherExpired);
        assert_eq!(payload.message, "voucher expired");
    }

    #[tokio::test]
    async fn rejected_lines_are_returned_together() {
        let issues = vec![
            LineIssue {
                line_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                code: ErrorCode::InsufficientStock,
                message: "only 1 left".into(),
                requested: 3,
                available: 1,
            },
            LineIssue {
                line_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                code: ErrorCode::ProductUnavailable,
                message: "inactive".into(),
                requested: 1,
                available: 0,
            },
        ];
        let response = ServiceError::CartLinesRejected(issues).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.code, ErrorCode::InsufficientStock);
        let lines = payload.details.unwrap()["lines"].as_array().unwrap().len();
        assert_eq!(lines, 2);
    }

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::conflict(ErrorCode::AlreadyAdded, "dup").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::ServiceUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn connection_errors_become_retryable() {
        let err: ServiceError = DbErr::Conn(sea_orm::RuntimeErr::Internal("refused".into())).into();
        assert!(err.is_retryable());
        assert_eq!(err.code(), ErrorCode::StorageUnavailable);

        let err: ServiceError = DbErr::Custom("bad sql".into()).into();
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.response_message(), "Database error");
    }

    #[test]
    fn error_codes_render_screaming_snake_case() {
        assert_eq!(ErrorCode::VoucherMinValueNotMet.to_string(), "VOUCHER_MIN_VALUE_NOT_MET");
        assert_eq!(
            serde_json::to_value(ErrorCode::InvalidStatusTransition).unwrap(),
            json!("INVALID_STATUS_TRANSITION")
        );
    }
}
