//! # API Layer
//!
//! The API layer handles HTTP request/response processing for the
//! self-service flows, OAuth2 callback, token refresh, and admin Action
//! surface. It bridges the HTTP world with the service layer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            HTTP Request                                 │
//! └───────────────────────────────┬─────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Routes (routes.rs)                             │
//! │  Define URL patterns and HTTP methods, map to handlers                  │
//! └───────────────────────────────┬─────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Handlers (handlers.rs)                           │
//! │  1. Extract request data (JSON body, headers, path params)              │
//! │  2. Validate input using DTOs                                           │
//! │  3. Rate-limit by (client ip, endpoint)                                 │
//! │  4. Drive the flow engine / auth service                                │
//! │  5. Transform response                                                  │
//! └───────────────────────────────┬─────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          DTOs (dto.rs)                                  │
//! │  - Request validation (serde, validator)                                │
//! │  - Response serialization                                               │
//! │  - API contract definitions                                             │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! | Module       | Responsibility                                      |
//! |--------------|-----------------------------------------------------|
//! | `routes`     | Route definitions with actix-web's `configure()`    |
//! | `handlers`   | Request handlers (extractors → service → response)  |
//! | `dto`        | Data Transfer Objects for request/response          |
//!
//! ## Endpoint Summary
//!
//! | Method | Path                                | Handler               |
//! |--------|--------------------------------------|------------------------|
//! | GET    | `/self-service/login/flows`         | `login_flows`          |
//! | POST   | `/self-service/login`               | `login_proceed`        |
//! | GET    | `/self-service/registration/flows`  | `registration_flows`   |
//! | POST   | `/self-service/registration`        | `registration_proceed` |
//! | GET    | `/self-service/logout/flows`        | `logout_flows`         |
//! | POST   | `/self-service/logout`              | `logout_proceed`       |
//! | GET    | `/self-service/oauth/callback`      | `oauth_callback`       |
//! | POST   | `/refresh_token`                    | `refresh_token`        |
//! | GET    | `/actions`                          | `list_actions`         |
//! | POST   | `/actions`                          | `create_action`        |
//! | PUT    | `/actions/{id}`                     | `update_action`        |
//! | DELETE | `/actions/{id}`                     | `delete_action`        |
//! | GET    | `/health`                           | `health_check`         |
//!
//! ## Related Documentation
//!
//! - Service layer: [`crate::service`]
//! - Error responses: [`shared::errors::ApiError`]

pub mod dto;
pub mod handlers;
pub mod routes;
