//! # Auth Service
//!
//! Orchestrates the public operations of spec §4.2 - `Register`, `Login`,
//! `RefreshToken`, `Logout`, `ProcessOAuthLogin`, and the state-token
//! pair - wiring together the user/refresh-token repositories, the JWT
//! and password-hashing primitives, and the Action sandbox pipeline.
//! Exclusively owns mutation of `User` and `RefreshToken` rows (spec §3).

use std::sync::Arc;

use chrono::Utc;
use shared::auth::jwt::{JwtService, TokenPair};
use shared::auth::password::PasswordHasher;
use shared::auth::state_token::StateTokenCodec;
use shared::errors::ApiError;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{Action, ActionType, NewPasswordUser, NewProviderUser, NewRefreshToken, User, UserMutation};
use crate::repository::{ActionRepository, RefreshTokenRepository, UserRepository};
use crate::service::action_sandbox::{
    ActionConnection, ActionContext, ActionRequestInfo, ActionSandbox, ActionUserView, ScriptOutcome,
};

/// Connection metadata threaded into every Action invocation's
/// `context.connection` (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct ConnectionInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Which flow (and type) an Action invocation is running on behalf of,
/// surfaced as `context.request_info`.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub flow_id: Uuid,
    pub flow_type: String,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub tokens: TokenPair,
}

pub struct AuthService {
    users: UserRepository,
    refresh_tokens: RefreshTokenRepository,
    actions: ActionRepository,
    jwt: Arc<JwtService>,
    password_hasher: Arc<PasswordHasher>,
    state_tokens: Arc<StateTokenCodec>,
    sandbox: Arc<ActionSandbox>,
}

impl AuthService {
    pub fn new(
        users: UserRepository,
        refresh_tokens: RefreshTokenRepository,
        actions: ActionRepository,
        jwt: Arc<JwtService>,
        password_hasher: Arc<PasswordHasher>,
        state_tokens: Arc<StateTokenCodec>,
        sandbox: Arc<ActionSandbox>,
    ) -> Self {
        Self { users, refresh_tokens, actions, jwt, password_hasher, state_tokens, sandbox }
    }

    // =========================================================================
    // Register
    // =========================================================================

    /// Spec §4.2 Register: pre-register denial aborts before any write;
    /// post-register denial is logged and ignored (spec §9: "intentional,
    /// auth proceeds, not a bug") because the user row is already
    /// persisted by the time `post-register` runs.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        connection: ConnectionInfo,
        request: RequestInfo,
    ) -> Result<User, ApiError> {
        let email = email.to_lowercase();

        let placeholder = ActionUserView {
            id: Uuid::nil(),
            email: email.clone(),
            provider: "password".to_string(),
            is_active: true,
            is_verified: false,
        };

        let mutation = match self
            .run_pipeline(ActionType::PreRegister, placeholder, connection.clone(), request.clone())
            .await?
        {
            PipelineVerdict::Allow { mutation } => mutation,
            PipelineVerdict::Deny { message } => return Err(ApiError::ActionDenied { message }),
        };

        let password_hash = self.password_hasher.hash(password)?;

        let mut user = self.users.create_password_user(NewPasswordUser { email, password_hash }).await?;
        if !mutation.is_empty() {
            user = self.users.apply_mutation(user.id, mutation).await?;
        }

        let post_register_user = ActionUserView {
            id: user.id,
            email: user.email.clone(),
            provider: user.provider.clone(),
            is_active: user.is_active,
            is_verified: user.is_verified,
        };

        match self.run_pipeline(ActionType::PostRegister, post_register_user, connection, request).await {
            Ok(PipelineVerdict::Deny { message }) => {
                warn!(user_id = %user.id, reason = %message, "post-register action denied; ignoring per policy");
            }
            Err(error) => {
                warn!(user_id = %user.id, %error, "post-register action pipeline failed; ignoring per policy");
            }
            Ok(PipelineVerdict::Allow { .. }) => {}
        }

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Spec §4.2 Login. `pre-login` denial aborts before the credential
    /// check runs; a missing user or a mismatched password both surface
    /// as the identical `InvalidCredentials` to avoid user enumeration.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        connection: ConnectionInfo,
        request: RequestInfo,
    ) -> Result<LoginOutcome, ApiError> {
        let email = email.to_lowercase();

        let placeholder = ActionUserView {
            id: Uuid::nil(),
            email: email.clone(),
            provider: "password".to_string(),
            is_active: true,
            is_verified: true,
        };

        match self.run_pipeline(ActionType::PreLogin, placeholder, connection.clone(), request.clone()).await? {
            PipelineVerdict::Deny { message } => return Err(ApiError::ActionDenied { message }),
            PipelineVerdict::Allow { .. } => {}
        }

        let user = self.users.find_by_email(&email).await?.ok_or(ApiError::InvalidCredentials)?;
        let Some(password_hash) = user.password_hash.as_deref() else {
            return Err(ApiError::InvalidCredentials);
        };
        if !self.password_hasher.verify(password, password_hash)? {
            return Err(ApiError::InvalidCredentials);
        }

        self.finish_login(user, connection, request).await
    }

    // =========================================================================
    // ProcessOAuthLogin
    // =========================================================================

    /// Spec §4.2 ProcessOAuthLogin. Email collision with a differently
    /// bound account is a hard failure (`EmailBoundToOtherProvider`) -
    /// there is no account-linking flow.
    pub async fn process_oauth_login(
        &self,
        provider: &str,
        provider_id: &str,
        email: &str,
        connection: ConnectionInfo,
        request: RequestInfo,
    ) -> Result<LoginOutcome, ApiError> {
        let email = email.to_lowercase();

        let placeholder = ActionUserView {
            id: Uuid::nil(),
            email: email.clone(),
            provider: provider.to_string(),
            is_active: true,
            is_verified: true,
        };

        let mutation = match self
            .run_pipeline(ActionType::PreLogin, placeholder, connection.clone(), request.clone())
            .await?
        {
            PipelineVerdict::Deny { message } => return Err(ApiError::ActionDenied { message }),
            PipelineVerdict::Allow { mutation } => mutation,
        };

        let user = match self.users.find_by_email(&email).await? {
            None => {
                self.users
                    .create_provider_user(NewProviderUser {
                        email,
                        provider: provider.to_string(),
                        provider_id: provider_id.to_string(),
                    })
                    .await?
            }
            Some(existing)
                if existing.provider == provider && existing.provider_id.as_deref() == Some(provider_id) =>
            {
                existing
            }
            Some(_) => return Err(ApiError::EmailBoundToOtherProvider),
        };

        let user = if mutation.is_empty() { user } else { self.users.apply_mutation(user.id, mutation).await? };

        self.finish_login(user, connection, request).await
    }

    /// Shared tail of `Login` and `ProcessOAuthLogin`: `post-login`,
    /// mutation application, token minting, and the `LastLogin` stamp
    /// (spec §4.2 steps 3-6).
    async fn finish_login(
        &self,
        user: User,
        connection: ConnectionInfo,
        request: RequestInfo,
    ) -> Result<LoginOutcome, ApiError> {
        let post_login_view = ActionUserView {
            id: user.id,
            email: user.email.clone(),
            provider: user.provider.clone(),
            is_active: user.is_active,
            is_verified: user.is_verified,
        };

        let mutation = match self.run_pipeline(ActionType::PostLogin, post_login_view, connection, request).await? {
            PipelineVerdict::Deny { message } => return Err(ApiError::ActionDenied { message }),
            PipelineVerdict::Allow { mutation } => mutation,
        };

        let user = if mutation.is_empty() { user } else { self.users.apply_mutation(user.id, mutation).await? };

        let tokens = self.jwt.generate_tokens(user.id)?;
        self.refresh_tokens
            .insert(NewRefreshToken {
                user_id: user.id,
                jti: tokens.refresh_jti,
                expires_at: Utc::now() + chrono::Duration::seconds(tokens.refresh_expires_in),
            })
            .await?;

        let user = self.users.stamp_last_login(user.id).await?;

        Ok(LoginOutcome { user, tokens })
    }

    // =========================================================================
    // RefreshToken
    // =========================================================================

    /// Spec §4.2 RefreshToken: delete-then-insert rotation. Deleting the
    /// old row before minting the new pair guarantees a replayed old
    /// token is rejected (spec §8 property 3); per spec §9, a concurrent
    /// second refresh with the same token is out of scope - callers must
    /// not call refresh twice concurrently with the same token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let claims = self.jwt.validate_refresh_token(refresh_token)?;

        let row = self.refresh_tokens.find_by_jti(claims.jti).await?.ok_or(ApiError::InvalidRefresh)?;
        self.refresh_tokens.delete_by_jti(row.jti).await?;

        let user = self.users.find_by_id(claims.sub).await?.ok_or(ApiError::InvalidRefresh)?;

        let tokens = self.jwt.generate_tokens(user.id)?;
        self.refresh_tokens
            .insert(NewRefreshToken {
                user_id: user.id,
                jti: tokens.refresh_jti,
                expires_at: Utc::now() + chrono::Duration::seconds(tokens.refresh_expires_in),
            })
            .await?;

        Ok(tokens)
    }

    // =========================================================================
    // Logout
    // =========================================================================

    /// Spec §4.2 Logout / §8 property 8: idempotent. A missing row is not
    /// an error - the second call of two identical logouts still succeeds.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        let claims = self.jwt.validate_refresh_token(refresh_token)?;
        self.refresh_tokens.delete_by_jti(claims.jti).await?;
        Ok(())
    }

    // =========================================================================
    // State token pair
    // =========================================================================

    pub fn generate_state_token(&self, flow_id: Uuid, callback_url: &str) -> Result<String, ApiError> {
        self.state_tokens.encode(flow_id, callback_url)
    }

    pub fn validate_state_token(&self, token: &str) -> Result<(Uuid, String), ApiError> {
        self.state_tokens.decode(token)
    }

    // =========================================================================
    // Action pipeline
    // =========================================================================

    /// Runs every active action for `action_type` in `(priority asc, id
    /// asc)` order (spec §4.3), threading each script's staged mutation
    /// into the next as the evolving `user` view. Stops and returns `Deny`
    /// as soon as one script calls `deny()`.
    async fn run_pipeline(
        &self,
        action_type: ActionType,
        mut user_view: ActionUserView,
        connection: ConnectionInfo,
        request: RequestInfo,
    ) -> Result<PipelineVerdict, ApiError> {
        let scripts: Vec<Action> = self.actions.active_by_type(action_type).await?;
        let mut accumulated = UserMutation::default();

        for action in scripts {
            let context = ActionContext {
                user: user_view.clone(),
                connection: ActionConnection { ip: connection.ip.clone(), user_agent: connection.user_agent.clone() },
                request_info: ActionRequestInfo { flow_id: request.flow_id, flow_type: request.flow_type.clone() },
            };

            match self.sandbox.run(action.code.clone(), context).await {
                Ok(ScriptOutcome::Allow { mutation }) => {
                    if let Some(is_active) = mutation.is_active {
                        user_view.is_active = is_active;
                        accumulated.is_active = Some(is_active);
                    }
                    if let Some(is_verified) = mutation.is_verified {
                        user_view.is_verified = is_verified;
                        accumulated.is_verified = Some(is_verified);
                    }
                }
                Ok(ScriptOutcome::Deny { message }) => {
                    return Ok(PipelineVerdict::Deny { message });
                }
                Err(error) => {
                    error!(action_id = action.id, action_name = %action.name, %error, "action script failed");
                    return Err(error);
                }
            }
        }

        Ok(PipelineVerdict::Allow { mutation: accumulated })
    }
}

enum PipelineVerdict {
    Allow { mutation: UserMutation },
    Deny { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_verdict_allow_carries_mutation() {
        let verdict = PipelineVerdict::Allow { mutation: UserMutation { is_active: Some(false), is_verified: None } };
        match verdict {
            PipelineVerdict::Allow { mutation } => assert_eq!(mutation.is_active, Some(false)),
            _ => panic!("expected allow"),
        }
    }
}
