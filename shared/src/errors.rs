//! # Application Error Types
//!
//! Unified error handling with automatic HTTP conversion.
//!
//! ## Design Philosophy
//!
//! This module follows the "make illegal states unrepresentable" principle.
//! Each error variant maps to a specific HTTP status code and error code,
//! ensuring consistent API responses across the service.
//!
//! ## HTTP Response Format
//!
//! All errors are serialized to a consistent JSON format:
//!
//! ```json
//! {
//!   "code": "INVALID_CREDENTIALS",
//!   "message": "Invalid credentials",
//!   "request_id": "550e8400-e29b-41d4-a716-446655440000",
//!   "details": { ... },
//!   "timestamp": "2024-01-15T10:30:00Z"
//! }
//! ```
//!
//! ## Framework Integration
//!
//! - **Actix-web**: `impl ResponseError for ApiError`

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

// =============================================================================
// Type Aliases
// =============================================================================

/// Result type alias for handlers and services.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Main Error Enum
// =============================================================================

/// Application error type with automatic HTTP status mapping.
///
/// ## Adding New Variants
///
/// 1. Choose the appropriate HTTP status code
/// 2. Add the variant with `#[error("...")]` for message format
/// 3. Update `status_code()` and `error_code()`
/// 4. Update `is_server_error()` if applicable
#[derive(Debug, Error)]
pub enum ApiError {
    // =========================================================================
    // Request validation (400)
    // =========================================================================
    /// Malformed body or missing required field.
    #[error("{message}")]
    InvalidRequest { message: String },

    /// Request body failed `validator` rules.
    #[error("Validation error")]
    ValidationError(#[from] ValidationErrors),

    /// A flow `proceed` call did not match a legal `(type, state)` edge.
    #[error("Flow is not in a state that allows this operation")]
    InvalidFlowState,

    /// Unsupported OAuth2 provider name.
    #[error("Unknown OAuth2 provider: {provider}")]
    UnknownProvider { provider: String },

    // =========================================================================
    // Authentication (401)
    // =========================================================================
    /// Login mismatch. Deliberately identical wording for unknown-user vs
    /// wrong-password, to avoid user enumeration.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Refresh token failed signature/expiry check, or its `jti` row is gone.
    #[error("Invalid refresh token")]
    InvalidRefresh,

    /// A `pre-*`/`post-*` action denied the operation.
    #[error("{message}")]
    ActionDenied { message: String },

    // =========================================================================
    // Resources (404, 410)
    // =========================================================================
    /// Flow id not found.
    #[error("Flow not found")]
    FlowNotFound,

    /// Flow's 15-minute lifetime has elapsed.
    #[error("Flow has expired")]
    FlowExpired,

    // =========================================================================
    // Rate limiting (429)
    // =========================================================================
    /// Per-IP, per-endpoint token bucket exhausted.
    #[error("Too many requests")]
    RateLimited { retry_after_seconds: u64 },

    // =========================================================================
    // Server errors (500)
    // =========================================================================
    /// Registration email already belongs to an existing account. Spec §6.1
    /// only enumerates 200/201/400/401/404/410/429/500 ("500 otherwise"), so
    /// this conflict surfaces as 500 rather than 409.
    #[error("Email already in use")]
    EmailInUse,

    /// OAuth callback email belongs to an account bound to a different
    /// provider (or to a password account). Spec §6.1 scenario S5 requires
    /// this to surface as `500`, not `409`.
    #[error("Email is bound to a different sign-in method")]
    EmailBoundToOtherProvider,

    /// Action script exceeded its wall-clock budget.
    #[error("Action timed out")]
    ActionTimeout,

    /// Action script threw, or returned without calling `allow`/`deny`.
    #[error("Action runtime error: {message}")]
    ActionRuntimeError { message: String },

    /// The encoded password hash could not be parsed (bad algorithm tag,
    /// wrong version, or malformed PHC string).
    #[error("Password hash is malformed")]
    HashFormatError,

    /// PostgreSQL query failed.
    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    /// Unspecified internal error: SMTP, provider I/O, or anything else
    /// that doesn't fit a more specific variant.
    #[error("Internal server error")]
    Internal { message: String },
}

// =============================================================================
// Error Methods
// =============================================================================

impl ApiError {
    /// Returns a machine-readable error code, stable across releases.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidFlowState => "INVALID_FLOW_STATE",
            Self::UnknownProvider { .. } => "UNKNOWN_PROVIDER",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidRefresh => "INVALID_REFRESH",
            Self::ActionDenied { .. } => "ACTION_DENIED",
            Self::FlowNotFound => "FLOW_NOT_FOUND",
            Self::FlowExpired => "FLOW_EXPIRED",
            Self::EmailInUse => "EMAIL_IN_USE",
            Self::EmailBoundToOtherProvider => "EMAIL_BOUND_TO_OTHER_PROVIDER",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::ActionTimeout => "ACTION_TIMEOUT",
            Self::ActionRuntimeError { .. } => "ACTION_RUNTIME_ERROR",
            Self::HashFormatError => "HASH_FORMAT_ERROR",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error. Source of truth for the
    /// error-to-status mapping described in spec §6.1 / §7.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. }
            | Self::ValidationError(_)
            | Self::InvalidFlowState
            | Self::UnknownProvider { .. } => StatusCode::BAD_REQUEST,

            Self::InvalidCredentials | Self::InvalidRefresh | Self::ActionDenied { .. } => {
                StatusCode::UNAUTHORIZED
            }

            Self::FlowNotFound => StatusCode::NOT_FOUND,
            Self::FlowExpired => StatusCode::GONE,

            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            Self::EmailInUse
            | Self::EmailBoundToOtherProvider
            | Self::ActionTimeout
            | Self::ActionRuntimeError { .. }
            | Self::HashFormatError
            | Self::DatabaseError(_)
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` if this is a server-side fault (5xx): logged at ERROR
    /// level and not expected to be caused by client input.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::EmailInUse
                | Self::EmailBoundToOtherProvider
                | Self::ActionTimeout
                | Self::ActionRuntimeError { .. }
                | Self::HashFormatError
                | Self::DatabaseError(_)
                | Self::Internal { .. }
        )
    }
}

// =============================================================================
// Response Structure
// =============================================================================

/// Standard error response body for the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorResponse {
    pub fn new(error: &ApiError) -> Self {
        let details = match error {
            ApiError::ValidationError(errors) => {
                Some(serde_json::to_value(errors).unwrap_or_default())
            }
            ApiError::RateLimited { retry_after_seconds } => {
                Some(serde_json::json!({ "retry_after_seconds": retry_after_seconds }))
            }
            // Server errors: don't expose internal details to the client.
            ApiError::DatabaseError(_) | ApiError::Internal { .. } => None,
            _ => None,
        };

        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            request_id: None,
            details,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }
}

// =============================================================================
// Actix-web Integration
// =============================================================================

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        let response = ErrorResponse::new(self);
        let mut builder = HttpResponse::build(self.status_code());
        if let Self::RateLimited { retry_after_seconds } = self {
            builder.insert_header(("Retry-After", retry_after_seconds.to_string()));
        }
        builder.json(response)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_return_401() {
        assert_eq!(ApiError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidRefresh.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::ActionDenied { message: "blocked".into() }.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_flow_errors() {
        assert_eq!(ApiError::FlowNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::FlowExpired.status_code(), StatusCode::GONE);
        assert_eq!(ApiError::InvalidFlowState.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_email_conflicts_surface_as_500() {
        // Spec §6.1's status set has no 409; scenario S5 requires
        // `EmailBoundToOtherProvider` to surface as 500, and "500 otherwise"
        // covers `EmailInUse` the same way.
        assert_eq!(ApiError::EmailInUse.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::EmailBoundToOtherProvider.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_codes_are_screaming_snake_case() {
        assert_eq!(ApiError::InvalidCredentials.error_code(), "INVALID_CREDENTIALS");
        assert_eq!(ApiError::FlowExpired.error_code(), "FLOW_EXPIRED");
        assert_eq!(
            ApiError::RateLimited { retry_after_seconds: 60 }.error_code(),
            "RATE_LIMITED"
        );
    }

    #[test]
    fn test_server_errors_are_flagged() {
        assert!(ApiError::Internal { message: "x".into() }.is_server_error());
        assert!(ApiError::ActionTimeout.is_server_error());
        assert!(ApiError::HashFormatError.is_server_error());
        assert!(ApiError::EmailInUse.is_server_error());
        assert!(ApiError::EmailBoundToOtherProvider.is_server_error());
        assert!(!ApiError::InvalidCredentials.is_server_error());
        assert!(!ApiError::FlowNotFound.is_server_error());
    }

    #[test]
    fn test_error_response_includes_timestamp() {
        let error = ApiError::InvalidCredentials;
        let response = ErrorResponse::new(&error);
        let now = chrono::Utc::now();
        let diff = now - response.timestamp;
        assert!(diff.num_seconds() < 60);
    }

    #[test]
    fn test_error_response_with_request_id() {
        let error = ApiError::InvalidCredentials;
        let request_id = Uuid::new_v4();
        let response = ErrorResponse::new(&error).with_request_id(request_id);
        assert_eq!(response.request_id, Some(request_id.to_string()));
    }

    #[test]
    fn test_rate_limited_details_carry_retry_after() {
        let error = ApiError::RateLimited { retry_after_seconds: 42 };
        let response = ErrorResponse::new(&error);
        assert_eq!(
            response.details,
            Some(serde_json::json!({ "retry_after_seconds": 42 }))
        );
    }
}
