//! # Service Layer
//!
//! Business logic for the authentication engine, orchestrating the
//! repository layer underneath and the API layer above.
//!
//! | Service            | Owns                                                         |
//! |---------------------|--------------------------------------------------------------|
//! | [`AuthService`]      | Register / Login / RefreshToken / Logout / ProcessOAuthLogin  |
//! | [`FlowEngine`]       | Flow state machine (spec §4.1)                                |
//! | [`ActionSandbox`]    | Embedded script VM for the Action pipeline (spec §4.3)        |
//! | [`ProviderRegistry`] | OAuth2 provider strategies: Google, GitHub (spec §4.5)        |
//! | [`RateLimiter`]      | Per-IP x per-endpoint token bucket (spec §4.7)                |

pub mod action_sandbox;
pub mod auth_service;
pub mod flow_engine;
pub mod oauth_providers;
pub mod rate_limiter;

pub use action_sandbox::ActionSandbox;
pub use auth_service::AuthService;
pub use flow_engine::FlowEngine;
pub use oauth_providers::ProviderRegistry;
pub use rate_limiter::RateLimiter;
