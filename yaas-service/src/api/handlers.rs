//! # Request Handlers
//!
//! HTTP handlers for the spec §6.1 surface: the three self-service flow
//! families (login, registration, logout), the OAuth2 callback, token
//! refresh, and the admin Action CRUD surface. Each flow handler follows
//! the same shape:
//!
//! 1. **Extract** request data (JSON body, query string, headers)
//! 2. **Validate** input using the `validator` crate
//! 3. **Rate-limit** by `(client ip, endpoint name)` (spec §4.7)
//! 4. **Drive** the flow through [`crate::service::FlowEngine`], calling
//!    [`crate::service::AuthService`] at the state that needs it
//! 5. **Transform** the result into a DTO
//!
//! A recoverable failure (e.g. wrong password) leaves the flow in its
//! prior state with a field-scoped error attached and returns the
//! corresponding `ApiError`, which the caller can retry against the same
//! flow id; a terminal failure moves the flow to `Failed`.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use shared::errors::ApiError;
use shared::validation;
use uuid::Uuid;

use crate::domain::{ActionType, ActionUpdate, FlowFieldError, FlowState, FlowType, NewAction};
use crate::service::auth_service::{ConnectionInfo, RequestInfo};
use crate::service::oauth_providers::Provider;
use crate::service::rate_limiter::resolve_client_ip;
use crate::AppState;

use super::dto::{
    ActionDto, AuthResponseDto, CreateActionRequest, FlowDto, HealthResponse, LoginFlowBody, LogoutFlowBody,
    MessageResponse, OAuthCallbackQuery, RefreshTokenBody, RegistrationFlowBody, TokenResponseDto,
    UpdateActionRequest,
};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct FlowQuery {
    pub flow: Uuid,
}

fn client_ip(req: &HttpRequest) -> String {
    let forwarded_for = req.headers().get("X-Forwarded-For").and_then(|v| v.to_str().ok());
    let real_ip = req.headers().get("X-Real-IP").and_then(|v| v.to_str().ok());
    let remote_addr = req.connection_info().peer_addr().map(str::to_string);
    resolve_client_ip(forwarded_for, real_ip, remote_addr.as_deref())
}

fn connection_info(req: &HttpRequest) -> ConnectionInfo {
    ConnectionInfo {
        ip: Some(client_ip(req)),
        user_agent: req.headers().get("User-Agent").and_then(|v| v.to_str().ok()).map(String::from),
    }
}

async fn enforce_rate_limit(state: &AppState, req: &HttpRequest, endpoint: &str) -> Result<(), ApiError> {
    state.rate_limiter.check(&client_ip(req), endpoint).await
}

// =============================================================================
// Health check
// =============================================================================

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "yaas".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

// =============================================================================
// Login flow
// =============================================================================

/// `GET /self-service/login/flows` - initiates a Login flow.
pub async fn login_flows(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    enforce_rate_limit(&state, &req, "login.initiate").await?;
    let flow = state.flow_engine.initiate(FlowType::Login, "/self-service/login/flows".to_string()).await?;
    Ok(HttpResponse::Ok().json(FlowDto::from(flow)))
}

/// `POST /self-service/login?flow=<id>` - advances a Login flow.
pub async fn login_proceed(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<FlowQuery>,
    body: web::Json<LoginFlowBody>,
) -> Result<HttpResponse, ApiError> {
    enforce_rate_limit(&state, &req, "login.proceed").await?;
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let flow_id = query.flow;
    let flow = state.flow_engine.load(flow_id).await?;
    let connection = connection_info(&req);

    if flow.state == FlowState::Initiated {
        state.flow_engine.transition(flow_id, FlowState::ChooseMethod, vec![]).await?;
    }

    match body.method.as_str() {
        "password" => {
            state.flow_engine.transition(flow_id, FlowState::EnterCredentials, vec![]).await?;

            let email = body.email.ok_or_else(|| ApiError::InvalidRequest { message: "email is required".into() })?;
            let password =
                body.password.ok_or_else(|| ApiError::InvalidRequest { message: "password is required".into() })?;

            let request_info = RequestInfo { flow_id, flow_type: "login".to_string() };

            match state.auth_service.login(&email, &password, connection, request_info).await {
                Ok(outcome) => {
                    state.flow_engine.transition(flow_id, FlowState::Success, vec![]).await?;
                    Ok(HttpResponse::Ok().json(AuthResponseDto::from(outcome)))
                }
                Err(ApiError::InvalidCredentials) => {
                    let errors = vec![FlowFieldError {
                        field: "password".to_string(),
                        message: "invalid credentials".to_string(),
                    }];
                    state.flow_engine.attach_recoverable_error(flow_id, FlowState::EnterCredentials, errors).await?;
                    Err(ApiError::InvalidCredentials)
                }
                Err(ApiError::ActionDenied { message }) => {
                    let errors = vec![FlowFieldError { field: "method".to_string(), message: message.clone() }];
                    state.flow_engine.transition(flow_id, FlowState::Failed, errors).await?;
                    Err(ApiError::ActionDenied { message })
                }
                Err(other) => Err(other),
            }
        }
        "oauth" => {
            let provider_name =
                body.provider.ok_or_else(|| ApiError::InvalidRequest { message: "provider is required".into() })?;
            let provider = Provider::parse(&provider_name)?;
            let callback_url = body
                .callback_url
                .ok_or_else(|| ApiError::InvalidRequest { message: "callbackUrl is required".into() })?;

            state.flow_engine.transition(flow_id, FlowState::RedirectToProvider, vec![]).await?;

            let state_token = state.auth_service.generate_state_token(flow_id, &callback_url)?;
            let login_url = state.provider_registry.login_url(provider, &state_token)?;

            state.flow_engine.transition(flow_id, FlowState::AwaitingCallback, vec![]).await?;

            Ok(HttpResponse::Ok().json(serde_json::json!({ "redirectUrl": login_url })))
        }
        other => Err(ApiError::InvalidRequest { message: format!("unknown login method: {other}") }),
    }
}

// =============================================================================
// Registration flow
// =============================================================================

/// `GET /self-service/registration/flows` - initiates a Registration flow
/// (state becomes `EnterDetails` immediately, spec §6.1).
pub async fn registration_flows(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    enforce_rate_limit(&state, &req, "registration.initiate").await?;
    let flow = state
        .flow_engine
        .initiate(FlowType::Registration, "/self-service/registration/flows".to_string())
        .await?;
    Ok(HttpResponse::Ok().json(FlowDto::from(flow)))
}

/// `POST /self-service/registration?flow=<id>` - advances Registration.
pub async fn registration_proceed(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<FlowQuery>,
    body: web::Json<RegistrationFlowBody>,
) -> Result<HttpResponse, ApiError> {
    enforce_rate_limit(&state, &req, "registration.proceed").await?;
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let flow_id = query.flow;
    let connection = connection_info(&req);
    let request_info = RequestInfo { flow_id, flow_type: "registration".to_string() };

    match state.auth_service.register(&body.email, &body.password, connection, request_info).await {
        Ok(_user) => {
            let flow = state.flow_engine.transition(flow_id, FlowState::Success, vec![]).await?;
            Ok(HttpResponse::Created().json(FlowDto::from(flow.flow)))
        }
        Err(ApiError::EmailInUse) => {
            let errors = vec![FlowFieldError { field: "email".to_string(), message: "email already in use".to_string() }];
            state.flow_engine.transition(flow_id, FlowState::Failed, errors).await?;
            Err(ApiError::EmailInUse)
        }
        Err(ApiError::ActionDenied { message }) => {
            let errors = vec![FlowFieldError { field: "email".to_string(), message: message.clone() }];
            state.flow_engine.transition(flow_id, FlowState::Failed, errors).await?;
            Err(ApiError::ActionDenied { message })
        }
        Err(other) => Err(other),
    }
}

// =============================================================================
// Logout flow
// =============================================================================

/// `GET /self-service/logout/flows` - initiates a Logout flow.
pub async fn logout_flows(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    enforce_rate_limit(&state, &req, "logout.initiate").await?;
    let flow = state.flow_engine.initiate(FlowType::Logout, "/self-service/logout/flows".to_string()).await?;
    Ok(HttpResponse::Ok().json(FlowDto::from(flow)))
}

/// `POST /self-service/logout?flow=<id>` - advances Logout.
pub async fn logout_proceed(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<FlowQuery>,
    body: web::Json<LogoutFlowBody>,
) -> Result<HttpResponse, ApiError> {
    enforce_rate_limit(&state, &req, "logout.proceed").await?;
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let flow_id = query.flow;
    state.flow_engine.transition(flow_id, FlowState::ConfirmLogout, vec![]).await?;

    // Logout is idempotent (spec §8 property 8); an already-invalid token
    // still completes the flow rather than failing it.
    match state.auth_service.logout(&body.refresh_token).await {
        Ok(()) | Err(ApiError::InvalidRefresh) => {
            let flow = state.flow_engine.transition(flow_id, FlowState::LogoutComplete, vec![]).await?;
            Ok(HttpResponse::Ok().json(FlowDto::from(flow.flow)))
        }
        Err(other) => {
            state.flow_engine.transition(flow_id, FlowState::Failed, vec![]).await?;
            Err(other)
        }
    }
}

// =============================================================================
// OAuth callback
// =============================================================================

/// `GET /self-service/oauth/callback?provider=&state=&code=` - the
/// provider return URL. Terminates with a redirect to the original
/// `callback_url?accessToken=&refreshToken=` on success (spec §6.1).
pub async fn oauth_callback(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<OAuthCallbackQuery>,
) -> Result<HttpResponse, ApiError> {
    enforce_rate_limit(&state, &req, "oauth.callback").await?;

    let provider = Provider::parse(&query.provider)?;
    let (flow_id, callback_url) = state.auth_service.validate_state_token(&query.state)?;

    state.flow_engine.transition(flow_id, FlowState::ProcessingCallback, vec![]).await?;

    let connection = connection_info(&req);
    let request_info = RequestInfo { flow_id, flow_type: "login".to_string() };

    let outcome = async {
        let access_token = state.provider_registry.exchange_code(provider, query.code.clone()).await?;
        let identity = state.provider_registry.user_info(provider, &access_token).await?;
        state
            .auth_service
            .process_oauth_login(query.provider.as_str(), &identity.provider_id, &identity.email, connection, request_info)
            .await
    }
    .await;

    match outcome {
        Ok(login_outcome) => {
            state.flow_engine.transition(flow_id, FlowState::Success, vec![]).await?;
            let redirect = format!(
                "{callback_url}?accessToken={}&refreshToken={}",
                login_outcome.tokens.access_token, login_outcome.tokens.refresh_token
            );
            Ok(HttpResponse::Found().append_header(("Location", redirect)).finish())
        }
        Err(ApiError::EmailBoundToOtherProvider) => {
            let errors =
                vec![FlowFieldError { field: "email".to_string(), message: "bound to a different provider".to_string() }];
            state.flow_engine.transition(flow_id, FlowState::Failed, errors).await?;
            Err(ApiError::EmailBoundToOtherProvider)
        }
        Err(other) => Err(other),
    }
}

// =============================================================================
// Token refresh
// =============================================================================

/// `POST /refresh_token`.
pub async fn refresh_token(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<RefreshTokenBody>,
) -> Result<HttpResponse, ApiError> {
    enforce_rate_limit(&state, &req, "refresh_token").await?;
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let tokens = state.auth_service.refresh_token(&body.refresh_token).await?;
    Ok(HttpResponse::Ok().json(TokenResponseDto { access_token: tokens.access_token, refresh_token: tokens.refresh_token }))
}

// =============================================================================
// Admin: Actions
// =============================================================================

/// `GET /actions` - lists every configured Action (admin surface, spec
/// §6.1). Authentication/authorization for the admin surface is left to
/// the deployment's edge (reverse proxy, network policy) - the same
/// posture the original service took with its admin routes.
pub async fn list_actions(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let actions = state.actions.list().await?;
    Ok(HttpResponse::Ok().json(actions.into_iter().map(ActionDto::from).collect::<Vec<_>>()))
}

/// `POST /actions` - creates an Action.
pub async fn create_action(
    state: web::Data<AppState>,
    body: web::Json<CreateActionRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let action_type = parse_action_type(&body.action_type)?;
    let action = state
        .actions
        .create(NewAction {
            name: body.name,
            action_type,
            code: body.code,
            is_active: body.is_active,
            priority: body.priority,
        })
        .await?;

    Ok(HttpResponse::Created().json(ActionDto::from(action)))
}

/// `PUT /actions/{id}` - partial update.
pub async fn update_action(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<UpdateActionRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let action_type = body.action_type.as_deref().map(parse_action_type).transpose()?;

    let update = ActionUpdate {
        name: body.name,
        action_type,
        code: body.code,
        is_active: body.is_active,
        priority: body.priority,
    };

    let updated = state.actions.update(path.into_inner(), update).await?;
    match updated {
        Some(action) => Ok(HttpResponse::Ok().json(ActionDto::from(action))),
        None => Err(ApiError::InvalidRequest { message: "action not found".to_string() }),
    }
}

/// `DELETE /actions/{id}`.
pub async fn delete_action(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let deleted = state.actions.delete(path.into_inner()).await?;
    if deleted {
        Ok(HttpResponse::Ok().json(MessageResponse { message: "action deleted".to_string() }))
    } else {
        Err(ApiError::InvalidRequest { message: "action not found".to_string() })
    }
}

fn parse_action_type(name: &str) -> Result<ActionType, ApiError> {
    match name {
        "pre-login" => Ok(ActionType::PreLogin),
        "post-login" => Ok(ActionType::PostLogin),
        "pre-register" => Ok(ActionType::PreRegister),
        "post-register" => Ok(ActionType::PostRegister),
        other => Err(ApiError::InvalidRequest { message: format!("unknown action type: {other}") }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_action_type_accepts_all_four_kebab_case_tags() {
        assert!(matches!(parse_action_type("pre-login"), Ok(ActionType::PreLogin)));
        assert!(matches!(parse_action_type("post-login"), Ok(ActionType::PostLogin)));
        assert!(matches!(parse_action_type("pre-register"), Ok(ActionType::PreRegister)));
        assert!(matches!(parse_action_type("post-register"), Ok(ActionType::PostRegister)));
    }

    #[test]
    fn parse_action_type_rejects_unknown_tag() {
        assert!(parse_action_type("pre-logout").is_err());
    }
}
