//! # Domain Events
//!
//! Events emitted by the service layer at significant points in the
//! authentication engine's lifecycle: flow transitions, token rotation, and
//! action-pipeline verdicts. Handlers currently consist of the structured
//! logger (`tracing`); the envelope format anticipates a message-queue
//! publisher without requiring one yet.
//!
//! | Event                 | Trigger                                     |
//! |------------------------|---------------------------------------------|
//! | [`UserRegistered`]     | Register flow reaches `Success`              |
//! | [`UserLoggedIn`]       | Login or OAuth2 flow reaches `Success`       |
//! | [`UserLoggedOut`]      | Logout flow reaches `LogoutComplete`         |
//! | [`RefreshTokenRotated`]| A refresh token is rotated                   |
//! | [`ActionPipelineDenied`]| A `pre-*`/`post-*` action denied the operation |
//! | [`LoginFailed`]        | Invalid credentials or `InvalidRefresh`      |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::ActionType;

/// Common interface for all domain events.
pub trait DomainEvent: Serialize + Send + Sync {
    /// Event type name for routing/filtering.
    fn event_type(&self) -> &'static str;
    fn occurred_at(&self) -> DateTime<Utc>;
    /// The aggregate id (usually a user id) this event relates to.
    fn aggregate_id(&self) -> Uuid;
}

// =============================================================================
// REGISTRATION
// =============================================================================

/// Emitted when a Registration flow completes successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: Uuid,
    pub email: String,
    pub flow_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for UserRegistered {
    fn event_type(&self) -> &'static str {
        "user.registered"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

// =============================================================================
// AUTHENTICATION
// =============================================================================

/// Emitted on a successful Login, either by password or OAuth2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLoggedIn {
    pub user_id: Uuid,
    pub method: LoginMethod,
    pub flow_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMethod {
    Password,
    OAuth2,
}

impl DomainEvent for UserLoggedIn {
    fn event_type(&self) -> &'static str {
        "user.logged_in"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

/// Emitted when a Logout flow reaches `LogoutComplete`.
///
/// `token_found` is `false` when the supplied refresh token had no matching
/// row - logout is idempotent (spec §8 property 8), so this is still a
/// successful logout, just one with nothing left to revoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLoggedOut {
    pub user_id: Option<Uuid>,
    pub token_found: bool,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for UserLoggedOut {
    fn event_type(&self) -> &'static str {
        "user.logged_out"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id.unwrap_or_else(Uuid::nil)
    }
}

/// Emitted when a login or refresh attempt fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginFailed {
    pub attempted_email: Option<String>,
    pub reason: LoginFailureReason,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginFailureReason {
    UserNotFound,
    InvalidPassword,
    InvalidRefreshToken,
    EmailBoundToOtherProvider,
}

impl DomainEvent for LoginFailed {
    fn event_type(&self) -> &'static str {
        "user.login_failed"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        Uuid::nil()
    }
}

// =============================================================================
// TOKEN LIFECYCLE
// =============================================================================

/// Emitted every time a refresh token is rotated (login, refresh, or
/// OAuth2 login). `previous_jti` is `None` on the first mint at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRotated {
    pub user_id: Uuid,
    pub previous_jti: Option<Uuid>,
    pub new_jti: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for RefreshTokenRotated {
    fn event_type(&self) -> &'static str {
        "token.rotated"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

// =============================================================================
// ACTION PIPELINE
// =============================================================================

/// Emitted when a `pre-*`/`post-*` action pipeline calls `deny()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPipelineDenied {
    pub action_type: ActionType,
    pub action_id: i64,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for ActionPipelineDenied {
    fn event_type(&self) -> &'static str {
        "action.denied"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        Uuid::nil()
    }
}

// =============================================================================
// EVENT ENVELOPE
// =============================================================================

/// Wrapper adding delivery metadata, so a future message-queue publisher
/// has a stable contract without every event carrying its own id/version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T: DomainEvent> {
    pub event_id: Uuid,
    pub event_type: String,
    pub version: u32,
    pub payload: T,
    pub timestamp: DateTime<Utc>,
}

impl<T: DomainEvent> EventEnvelope<T> {
    pub fn new(event: T) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event.event_type().to_string(),
            version: 1,
            payload: event,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_registered_event_type() {
        let event = UserRegistered {
            user_id: Uuid::new_v4(),
            email: "a@x.test".into(),
            flow_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        };
        assert_eq!(event.event_type(), "user.registered");
        assert_eq!(event.aggregate_id(), event.user_id);
    }

    #[test]
    fn login_failed_has_nil_aggregate() {
        let event = LoginFailed {
            attempted_email: Some("unknown@x.test".into()),
            reason: LoginFailureReason::UserNotFound,
            occurred_at: Utc::now(),
        };
        assert_eq!(event.aggregate_id(), Uuid::nil());
    }

    #[test]
    fn logged_out_idempotent_replay_has_no_user() {
        let event = UserLoggedOut { user_id: None, token_found: false, occurred_at: Utc::now() };
        assert_eq!(event.aggregate_id(), Uuid::nil());
        assert!(!event.token_found);
    }

    #[test]
    fn envelope_wraps_event_with_metadata() {
        let event = RefreshTokenRotated {
            user_id: Uuid::new_v4(),
            previous_jti: Some(Uuid::new_v4()),
            new_jti: Uuid::new_v4(),
            occurred_at: Utc::now(),
        };
        let envelope = EventEnvelope::new(event.clone());
        assert_eq!(envelope.event_type, "token.rotated");
        assert_eq!(envelope.version, 1);
        assert_eq!(envelope.payload.new_jti, event.new_jti);
    }
}
