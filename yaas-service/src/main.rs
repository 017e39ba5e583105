//! # YAAS - Yet Another Auth Service
//!
//! **yaas-service** is the identity and access engine described by spec
//! §1-§9: self-service login/registration/logout flows driven by an
//! explicit state machine, OAuth2 login against Google and GitHub,
//! JWT access/refresh token lifecycle, and an embedded JavaScript
//! "Action" pipeline that lets an operator hook custom logic into each
//! flow without redeploying the service.
//!
//! ## Architecture Overview
//!
//! This service follows the same layered shape as the rest of the
//! platform:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        HTTP Layer (api/)                        │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐ │
//! │  │   routes    │  │  handlers   │  │    DTOs (Request/Res)   │ │
//! │  └──────┬──────┘  └──────┬──────┘  └────────────┬────────────┘ │
//! └─────────┼────────────────┼─────────────────────┼───────────────┘
//!           │                │                      │
//!           ▼                ▼                      ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Service Layer (service/)                     │
//! │  AuthService · FlowEngine · ActionSandbox · ProviderRegistry ·   │
//! │  RateLimiter                                                     │
//! └─────────────────────────────┼───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Repository Layer (repository/)                 │
//! │  UserRepository · RefreshTokenRepository · FlowRepository ·      │
//! │  ActionRepository                                                │
//! └─────────────────────────────┼───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Domain Layer (domain/)                       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## API Endpoints
//!
//! See [`api::routes`] for the complete, current mapping. Summary:
//!
//! | Method | Endpoint                         | Description                       |
//! |--------|-----------------------------------|------------------------------------|
//! | GET    | `/self-service/login/flows`       | Initiate a Login flow              |
//! | POST   | `/self-service/login`             | Advance a Login flow               |
//! | GET    | `/self-service/registration/flows`| Initiate a Registration flow       |
//! | POST   | `/self-service/registration`      | Advance a Registration flow        |
//! | GET    | `/self-service/logout/flows`      | Initiate a Logout flow             |
//! | POST   | `/self-service/logout`            | Advance a Logout flow              |
//! | GET    | `/self-service/oauth/callback`    | OAuth2 provider return URL         |
//! | POST   | `/refresh_token`                  | Rotate a refresh token             |
//! | GET    | `/actions`                         | List configured Actions (admin)    |
//! | POST   | `/actions`                         | Create an Action (admin)           |
//! | PUT    | `/actions/{id}`                    | Update an Action (admin)           |
//! | DELETE | `/actions/{id}`                    | Delete an Action (admin)           |
//! | GET    | `/health`                          | Service health status              |
//!
//! ## Configuration
//!
//! Environment variables are loaded via [`shared::config::AppConfig`].
//! Key settings:
//!
//! - `SERVICE_NAME=yaas`
//! - `JWT_ACCESS_SECRET` / `JWT_REFRESH_SECRET` - token signing secrets
//! - `STATE_TOKEN_SECRET` - OAuth2 `state` parameter signing secret
//! - `BASE_URL` - public origin used to build OAuth2 redirect URLs
//! - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` / `GOOGLE_REDIRECT_URL`
//! - `GITHUB_CLIENT_ID` / `GITHUB_CLIENT_SECRET` / `GITHUB_REDIRECT_URL`

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use shared::{
    auth::{jwt::JwtService, password::PasswordHasher, state_token::StateTokenCodec},
    config::AppConfig,
    database,
    tracing_config,
};
use tracing::info;

mod api;
mod domain;
mod repository;
mod service;

use api::routes;
use repository::{ActionRepository, FlowRepository, RefreshTokenRepository, UserRepository};
use service::action_sandbox::DEFAULT_SCRIPT_TIMEOUT;
use service::{ActionSandbox, AuthService, FlowEngine, ProviderRegistry, RateLimiter};

/// Shared application state injected into every request handler via
/// [`actix_web::web::Data`].
///
/// | Field              | Owns                                           |
/// |---------------------|------------------------------------------------|
/// | `auth_service`       | Register/Login/RefreshToken/Logout/OAuth login  |
/// | `flow_engine`        | The flow state machine (spec §4.1)              |
/// | `provider_registry`  | OAuth2 provider strategies                      |
/// | `rate_limiter`       | Per-IP x per-endpoint token bucket              |
/// | `actions`            | Admin CRUD over Actions                         |
pub struct AppState {
    pub auth_service: AuthService,
    pub flow_engine: FlowEngine,
    pub provider_registry: ProviderRegistry,
    pub rate_limiter: RateLimiter,
    pub actions: ActionRepository,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::from_env().expect("Failed to load configuration");

    tracing_config::init_tracing(&config.service_name, config.is_production());

    info!(
        service = %config.service_name,
        host = %config.server.host,
        port = %config.server.port,
        "Starting yaas-service"
    );

    let db_pool = database::create_pool(&config.database).await.expect("Failed to create database pool");

    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));
    let password_hasher = Arc::new(PasswordHasher::new());
    let state_tokens = Arc::new(StateTokenCodec::new(config.state_token.secret.clone()));
    let sandbox = Arc::new(ActionSandbox::new(DEFAULT_SCRIPT_TIMEOUT));

    let user_repository = UserRepository::new(db_pool.clone());
    let refresh_token_repository = RefreshTokenRepository::new(db_pool.clone());
    let flow_repository = FlowRepository::new(db_pool.clone());
    let action_repository = ActionRepository::new(db_pool.clone());

    let auth_service = AuthService::new(
        user_repository,
        refresh_token_repository,
        action_repository.clone(),
        jwt_service.clone(),
        password_hasher,
        state_tokens,
        sandbox,
    );
    let flow_engine = FlowEngine::new(flow_repository);
    let provider_registry = ProviderRegistry::new(config.oauth.clone());
    let rate_limiter = RateLimiter::new(config.rate_limit.clone());

    // The sweeper evicts idle per-IP buckets so the visitor map doesn't
    // grow unbounded over the service's lifetime (spec §4.7).
    tokio::spawn(rate_limiter.clone().run_sweeper());

    let app_state = web::Data::new(AppState {
        auth_service,
        flow_engine,
        provider_registry,
        rate_limiter,
        actions: action_repository,
    });

    let db_pool = web::Data::new(db_pool);

    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    info!("Server listening on {}:{}", server_host, server_port);

    HttpServer::new(move || {
        let cors = Cors::default().allow_any_origin().allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(app_state.clone())
            .app_data(db_pool.clone())
            .configure(routes::configure)
    })
    .bind((server_host, server_port))?
    .run()
    .await
}
