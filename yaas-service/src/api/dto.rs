//! # Data Transfer Objects (DTOs)
//!
//! Request/response shapes for the spec §6.1 HTTP surface. DTOs never
//! reuse domain entities directly - [`FlowDto`] strips nothing from
//! [`crate::domain::Flow`] but keeps the conversion explicit so a future
//! field never leaks by accident, and [`UserDto`] always drops
//! `password_hash`.
//!
//! ## JSON Naming Convention
//!
//! All DTOs use `camelCase` for JSON serialization to match the frontend
//! conventions the original flow UI expects (`accessToken`, `flowId`, ...).

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::{Flow, FlowFieldError, User};
use crate::service::auth_service::LoginOutcome;

// =============================================================================
// Flow
// =============================================================================

/// Wire shape of a [`Flow`]. Returned by every `/self-service/*` endpoint
/// whether the flow just advanced or failed with a recoverable error.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDto {
    pub id: Uuid,
    pub flow_type: String,
    pub state: String,
    pub request_url: String,
    pub errors: Vec<FlowFieldError>,
    pub issued_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl From<Flow> for FlowDto {
    fn from(flow: Flow) -> Self {
        Self {
            id: flow.id,
            flow_type: serde_json::to_value(flow.flow_type)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            state: serde_json::to_value(flow.state)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            request_url: flow.request_url,
            errors: flow.errors.0,
            issued_at: flow.issued_at,
            expires_at: flow.expires_at,
        }
    }
}

// =============================================================================
// Login flow
// =============================================================================

/// Body for `POST /self-service/login?flow=<id>` (spec §6.1).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginFlowBody {
    /// `"password"` or `"oauth"`.
    #[validate(length(min = 1, message = "method is required"))]
    pub method: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    pub password: Option<String>,
    pub provider: Option<String>,
    pub callback_url: Option<String>,
}

// =============================================================================
// Registration flow
// =============================================================================

/// Body for `POST /self-service/registration?flow=<id>` (spec §6.1).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationFlowBody {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 10, message = "password must be at least 10 characters"))]
    pub password: String,
}

// =============================================================================
// Logout flow
// =============================================================================

/// Body for `POST /self-service/logout?flow=<id>` (spec §6.1).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LogoutFlowBody {
    #[validate(length(min = 1, message = "refreshToken is required"))]
    pub refresh_token: String,
}

// =============================================================================
// OAuth callback
// =============================================================================

/// Query parameters for `GET /self-service/oauth/callback` (spec §6.1).
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthCallbackQuery {
    pub provider: String,
    pub state: String,
    pub code: String,
}

// =============================================================================
// Token refresh
// =============================================================================

/// Body for `POST /refresh_token` (spec §6.1).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenBody {
    #[validate(length(min = 1, message = "refreshToken is required"))]
    pub refresh_token: String,
}

/// Response for `POST /refresh_token`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponseDto {
    pub access_token: String,
    pub refresh_token: String,
}

/// Response for a successful `Login`/`ProcessOAuthLogin` terminating a
/// flow at `Success`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponseDto {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: UserDto,
}

impl From<LoginOutcome> for AuthResponseDto {
    fn from(outcome: LoginOutcome) -> Self {
        Self {
            access_token: outcome.tokens.access_token,
            refresh_token: outcome.tokens.refresh_token,
            expires_in: outcome.tokens.expires_in,
            user: outcome.user.into(),
        }
    }
}

// =============================================================================
// User
// =============================================================================

/// Public user shape - always strips `password_hash`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub provider: String,
    pub is_active: bool,
    pub is_verified: bool,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            provider: user.provider,
            is_active: user.is_active,
            is_verified: user.is_verified,
        }
    }
}

// =============================================================================
// Admin: Actions
// =============================================================================

/// Body for `POST /actions` (admin surface, spec §6.1).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    pub action_type: String,
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub priority: i32,
}

/// Body for `PUT /actions/{id}`; every field optional (partial update).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActionRequest {
    pub name: Option<String>,
    pub action_type: Option<String>,
    pub code: Option<String>,
    pub is_active: Option<bool>,
    pub priority: Option<i32>,
}

fn default_true() -> bool {
    true
}

/// Wire shape of an [`crate::domain::Action`]. The operator-authored
/// `code` is included - this endpoint is the admin surface, not a
/// client-facing one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDto {
    pub id: i64,
    pub name: String,
    pub action_type: String,
    pub code: String,
    pub is_active: bool,
    pub priority: i32,
}

impl From<crate::domain::Action> for ActionDto {
    fn from(action: crate::domain::Action) -> Self {
        Self {
            id: action.id,
            name: action.name,
            action_type: serde_json::to_value(action.action_type)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            code: action.code,
            is_active: action.is_active,
            priority: action.priority,
        }
    }
}

// =============================================================================
// Shared response shapes
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn flow_dto_serializes_enum_variants_as_snake_case_strings() {
        let flow = Flow {
            id: Uuid::new_v4(),
            flow_type: crate::domain::FlowType::Login,
            state: crate::domain::FlowState::ChooseMethod,
            request_url: "/self-service/login/flows".into(),
            errors: sqlx::types::Json(vec![]),
            issued_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::minutes(15),
        };

        let dto: FlowDto = flow.into();
        assert_eq!(dto.flow_type, "login");
        assert_eq!(dto.state, "choose_method");
    }

    #[test]
    fn user_dto_never_exposes_password_hash() {
        let json = serde_json::to_string(&UserDto {
            id: Uuid::new_v4(),
            email: "a@x.test".into(),
            provider: "password".into(),
            is_active: true,
            is_verified: true,
        })
        .unwrap();
        assert!(!json.contains("password"));
    }
}
