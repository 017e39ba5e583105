//! # Authentication Middleware for Actix-web
//!
//! Extracts and validates the access token from HTTP requests.
//!
//! ## Overview
//!
//! | Component | Purpose | Usage |
//! |-----------|---------|-------|
//! | [`AuthMiddleware`] | Extract and validate the bearer token | Service-level authentication |
//! | [`AuthenticatedUser`] | Extractor for handlers | Get the current user id in handlers |
//!
//! ## Authentication Flow
//!
//! ```text
//! ┌─────────┐     ┌──────────────┐     ┌─────────────┐     ┌─────────┐
//! │ Request │────►│ AuthMiddleware│────►│ Extract JWT │────►│ Validate│
//! └─────────┘     └──────────────┘     └─────────────┘     └────┬────┘
//!                                                                │
//!                 ┌──────────────┐     ┌─────────────┐          │
//!                 │   Handler    │◄────│ Insert User │◄─────────┘
//!                 │(AuthenticUser)│     │ Extension   │     (if valid)
//!                 └──────────────┘     └─────────────┘
//! ```
//!
//! Role/permission enforcement beyond what's stored on the user is out of
//! scope here - this middleware only answers "is there a valid access token",
//! not "is this user allowed to do X". yaas-service doesn't currently wrap
//! any route with it; the admin Action-management endpoints rely on the
//! deployment's edge (reverse proxy, network policy) for authorization
//! instead.
//!
//! ## Usage Example
//!
//! ### Setup Middleware
//!
//! ```rust,ignore
//! use shared::auth::{AuthMiddleware, JwtService};
//! use std::sync::Arc;
//!
//! let jwt_service = Arc::new(JwtService::new(config.jwt));
//! let auth_middleware = AuthMiddleware::new(jwt_service);
//!
//! App::new()
//!     .service(
//!         web::scope("/api")
//!             .wrap(auth_middleware)
//!             .route("/profile", web::get().to(get_profile))
//!     )
//! ```
//!
//! ### Use in Handlers
//!
//! ```rust,ignore
//! use shared::auth::AuthenticatedUser;
//!
//! async fn get_profile(user: AuthenticatedUser) -> impl Responder {
//!     format!("Hello, {}!", user.user_id)
//! }
//! ```

use crate::auth::jwt::{AccessClaims, JwtService};
use crate::errors::ApiError;
use actix_web::{dev::ServiceRequest, Error, HttpMessage};
use std::sync::Arc;
use uuid::Uuid;

// =============================================================================
// Authenticated User
// =============================================================================

/// The user identified by a validated access token.
///
/// Inserted into request extensions by [`AuthMiddleware::authenticate`] and
/// retrievable in handlers via the `FromRequest` impl below.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// The user's unique identifier (from the token's `sub` claim).
    pub user_id: Uuid,
}

impl From<AccessClaims> for AuthenticatedUser {
    fn from(claims: AccessClaims) -> Self {
        Self { user_id: claims.sub }
    }
}

// =============================================================================
// Auth Middleware
// =============================================================================

/// Middleware for JWT-based authentication.
///
/// 1. Extracts the JWT from the `Authorization` header
/// 2. Validates the token signature, issuer, audience, and expiry
/// 3. Inserts the authenticated user into request extensions
#[derive(Clone)]
pub struct AuthMiddleware {
    jwt_service: Arc<JwtService>,
}

impl AuthMiddleware {
    pub fn new(jwt_service: Arc<JwtService>) -> Self {
        Self { jwt_service }
    }

    /// Extracts and validates the user from a request.
    ///
    /// ## Errors
    ///
    /// Returns `ApiError::InvalidCredentials` if the header is missing,
    /// malformed, or the token fails validation.
    pub fn extract_user(&self, req: &ServiceRequest) -> Result<AuthenticatedUser, ApiError> {
        let auth_header = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError::InvalidCredentials)?;

        let token = JwtService::extract_from_header(auth_header)?;
        let claims = self.jwt_service.validate_access_token(token)?;

        Ok(AuthenticatedUser::from(claims))
    }

    /// Authenticates a request and stores the user in extensions.
    pub fn authenticate(&self, req: &ServiceRequest) -> Result<(), ApiError> {
        let user = self.extract_user(req)?;
        req.extensions_mut().insert(user);
        Ok(())
    }
}

// =============================================================================
// Actix-web Extractor
// =============================================================================

/// Extractor for getting the authenticated user in handlers.
///
/// ## Errors
///
/// Returns `ApiError::InvalidCredentials` if no user is in request
/// extensions - i.e. authentication middleware wasn't applied or failed.
impl actix_web::FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = std::future::Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        let result = req
            .extensions()
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::InvalidCredentials.into());

        std::future::ready(result)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticated_user_from_claims() {
        let claims = AccessClaims {
            sub: Uuid::new_v4(),
            iss: "yaas".to_string(),
            aud: "yaas-api".to_string(),
            exp: 0,
            iat: 0,
            nbf: 0,
        };

        let user = AuthenticatedUser::from(claims.clone());
        assert_eq!(user.user_id, claims.sub);
    }
}
