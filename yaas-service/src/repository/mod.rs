//! # Repository Layer
//!
//! Persistence contracts for the four entities owned by the authentication
//! engine (spec §3): users, refresh tokens, flows, and actions. Each
//! repository wraps a `PgPool` and maps `sqlx::Error` into
//! [`shared::errors::ApiError`] - no SQL leaks past this layer.
//!
//! | Repository                | Table            | Owner                          |
//! |---------------------------|-------------------|---------------------------------|
//! | [`UserRepository`]        | `users`          | `AuthService` (exclusive)       |
//! | [`RefreshTokenRepository`]| `refresh_tokens` | `AuthService` (exclusive)       |
//! | [`FlowRepository`]        | `flows`          | `FlowEngine` (exclusive)        |
//! | [`ActionRepository`]      | `actions`        | Admin surface (write), sandbox pipeline (read) |

pub mod action_repository;
pub mod flow_repository;
pub mod refresh_token_repository;
pub mod user_repository;

pub use action_repository::ActionRepository;
pub use flow_repository::FlowRepository;
pub use refresh_token_repository::RefreshTokenRepository;
pub use user_repository::UserRepository;
