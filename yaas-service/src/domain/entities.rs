//! # Authentication Domain Entities
//!
//! Core business entities for the authentication engine. These map directly
//! to database tables and are framework-agnostic - no actix-web or sqlx
//! attribute leaks into how callers reason about them beyond `FromRow`.
//!
//! ## Entity Overview
//!
//! | Entity        | Table            | Purpose                                   |
//! |---------------|-------------------|-------------------------------------------|
//! | [`User`]      | `users`          | Identity record: password or provider-bound |
//! | [`RefreshToken`] | `refresh_tokens` | Server-side anchor for a refresh JWT's `jti` |
//! | [`Flow`]      | `flows`          | Persisted multi-step interaction state     |
//! | [`Action`]    | `actions`        | Operator-authored pre/post lifecycle script |
//!
//! ## Invariants
//!
//! - `User`: `email` is unique and lowercased; exactly one of
//!   `password_hash` present or (`provider != "password"` with
//!   `provider_id` present).
//! - `RefreshToken`: `jti` is unique; valid iff the row exists and
//!   `now < expires_at`.
//! - `Flow`: state only ever moves along the edges in
//!   [`crate::service::flow_engine`]; an expired flow is immutable.
//! - `Action`: only `is_active` rows run, ordered by `(priority asc, id asc)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// USER
// =============================================================================

/// Identity record as stored in the `users` table.
///
/// Never serialize this directly in an API response - use
/// [`crate::api::dto::UserDto`] instead, which strips `password_hash`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Unique, always lowercased before storage.
    pub email: String,
    /// Argon2id PHC string. Absent for federated-only accounts.
    pub password_hash: Option<String>,
    /// `"password"` for a credentials account, otherwise a provider name
    /// (`"google"`, `"github"`, ...).
    pub provider: String,
    /// Provider-side subject id. Always present when `provider != "password"`.
    pub provider_id: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// `true` if this account authenticates with a password (not federated).
    pub fn is_password_account(&self) -> bool {
        self.provider == "password"
    }
}

/// Data required to create a password-authenticated user.
#[derive(Debug, Clone)]
pub struct NewPasswordUser {
    pub email: String,
    pub password_hash: String,
}

/// Data required to create a federated (OAuth2-bound) user.
#[derive(Debug, Clone)]
pub struct NewProviderUser {
    pub email: String,
    pub provider: String,
    pub provider_id: String,
}

/// Whitelisted fields an Action script is permitted to mutate on a [`User`]
/// (spec §4.3 mutability policy). `id`, `email`, and `password_hash` are
/// identity anchors and are never writable from a script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMutation {
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
}

impl UserMutation {
    pub fn is_empty(&self) -> bool {
        self.is_active.is_none() && self.is_verified.is_none()
    }

    /// Applies the mutation to an in-memory user snapshot. Used both to
    /// thread a script's staged changes to the next script in a pipeline,
    /// and to apply the pipeline's final verdict to the persisted row.
    pub fn apply(&self, user: &mut User) {
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
        if let Some(is_verified) = self.is_verified {
            user.is_verified = is_verified;
        }
    }
}

// =============================================================================
// REFRESH TOKEN
// =============================================================================

/// Server-side anchor for a refresh JWT (spec §3, §4.4).
///
/// A refresh token is valid iff its row exists here and `now < expires_at`.
/// Deletion is the only revocation mechanism; rotation is delete-then-insert.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub jti: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Data required to insert a new `refresh_tokens` row.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub jti: Uuid,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// FLOW
// =============================================================================

/// What kind of self-service interaction a [`Flow`] drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    Login,
    Registration,
    Logout,
    OAuth2Login,
}

/// A flow's current position in its state machine (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Initiated,
    ChooseMethod,
    EnterCredentials,
    RedirectToProvider,
    AwaitingCallback,
    ProcessingCallback,
    EnterDetails,
    VerifyEmail,
    ConfirmLogout,
    Success,
    LogoutComplete,
    Failed,
}

/// A single field-scoped error attached to a flow (spec §3, §4.1).
///
/// Persists across reads so a client re-fetching the flow after a
/// recoverable error (e.g. wrong password) still sees why it failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowFieldError {
    pub field: String,
    pub message: String,
}

/// Persisted interaction state driving a multi-step self-service flow.
///
/// Bounded to a 15-minute lifetime (`expires_at = issued_at + 15min`). An
/// expired flow is immutable: any `proceed` attempt returns
/// [`shared::errors::ApiError::FlowExpired`].
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Flow {
    pub id: Uuid,
    pub flow_type: FlowType,
    pub state: FlowState,
    pub request_url: String,
    /// JSON-encoded `Vec<FlowFieldError>`; stored as `jsonb` and
    /// (de)serialized at the repository boundary.
    #[sqlx(json)]
    pub errors: sqlx::types::Json<Vec<FlowFieldError>>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Flow {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            FlowState::Success | FlowState::LogoutComplete | FlowState::Failed
        )
    }

    pub fn field_errors(&self) -> &[FlowFieldError] {
        &self.errors.0
    }
}

/// Data required to create a new flow; the repository stamps
/// `id`/`issued_at`/`expires_at`.
#[derive(Debug, Clone)]
pub struct NewFlow {
    pub flow_type: FlowType,
    pub state: FlowState,
    pub request_url: String,
}

// =============================================================================
// ACTION
// =============================================================================

/// Lifecycle point an [`Action`] script intercepts (spec §3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    PreLogin,
    PostLogin,
    PreRegister,
    PostRegister,
}

/// An operator-authored script snippet evaluated at a well-known lifecycle
/// point (spec §3).
///
/// Only `is_active` actions execute; execution order within a type is
/// `(priority asc, id asc)`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Action {
    pub id: i64,
    pub name: String,
    pub action_type: ActionType,
    pub code: String,
    pub is_active: bool,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new action via the admin surface.
#[derive(Debug, Clone)]
pub struct NewAction {
    pub name: String,
    pub action_type: ActionType,
    pub code: String,
    pub is_active: bool,
    pub priority: i32,
}

/// Partial update accepted by `PUT /actions/{id}`; `None` fields are left
/// unchanged.
#[derive(Debug, Clone, Default)]
pub struct ActionUpdate {
    pub name: Option<String>,
    pub action_type: Option<ActionType>,
    pub code: Option<String>,
    pub is_active: Option<bool>,
    pub priority: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_mutation_apply_only_touches_set_fields() {
        let mut user = User {
            id: Uuid::new_v4(),
            email: "a@x.test".into(),
            password_hash: Some("hash".into()),
            provider: "password".into(),
            provider_id: None,
            is_active: true,
            is_verified: true,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let mutation = UserMutation { is_active: Some(false), is_verified: None };
        mutation.apply(&mut user);

        assert!(!user.is_active);
        assert!(user.is_verified);
    }

    #[test]
    fn flow_terminal_states() {
        let base = Flow {
            id: Uuid::new_v4(),
            flow_type: FlowType::Login,
            state: FlowState::Success,
            request_url: "/self-service/login/flows".into(),
            errors: sqlx::types::Json(vec![]),
            issued_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::minutes(15),
        };
        assert!(base.is_terminal());

        let mut in_progress = base.clone();
        in_progress.state = FlowState::EnterCredentials;
        assert!(!in_progress.is_terminal());
    }

    #[test]
    fn flow_expiry() {
        let mut flow = Flow {
            id: Uuid::new_v4(),
            flow_type: FlowType::Registration,
            state: FlowState::EnterDetails,
            request_url: "/self-service/registration/flows".into(),
            errors: sqlx::types::Json(vec![]),
            issued_at: Utc::now() - chrono::Duration::minutes(20),
            expires_at: Utc::now() - chrono::Duration::minutes(5),
        };
        assert!(flow.is_expired());
        flow.expires_at = Utc::now() + chrono::Duration::minutes(5);
        assert!(!flow.is_expired());
    }
}
