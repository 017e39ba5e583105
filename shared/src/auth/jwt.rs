//! # JWT Token Service
//!
//! Handles generation and validation of JSON Web Tokens (JWT) for authentication.
//!
//! ## What is JWT?
//!
//! JWT (JSON Web Token) is an open standard ([RFC 7519](https://tools.ietf.org/html/rfc7519))
//! for securely transmitting information between parties as a JSON object. This information
//! can be verified because it is digitally signed.
//!
//! ## Our Token Implementation
//!
//! | Token Type | TTL | Purpose | Signed with |
//! |------------|-----|---------|--------------|
//! | Access Token | 15 min (default) | API authorization | `jwt.access_secret` |
//! | Refresh Token | 7 days (default) | Get new access token | `jwt.refresh_secret` |
//!
//! Access and refresh tokens are signed with **distinct** secrets so that a
//! leaked access token (which travels in every request) can never be replayed
//! as a refresh token.
//!
//! ## Claims (Token Payload)
//!
//! Access tokens carry standard RFC 7519 claims only (`sub`, `iss`, `aud`,
//! `exp`, `iat`, `nbf`). Refresh tokens additionally carry a `jti` (UUIDv4),
//! which is the primary key of the corresponding `refresh_tokens` row -
//! rotation and revocation are implemented by deleting/inserting that row,
//! not by tracking a blacklist of JWT IDs.
//!
//! ## Security Notes
//!
//! - We use **HS256** (HMAC-SHA256) for signing.
//! - Secrets must be at least 32 characters.
//! - Tokens are validated for signature, expiration, issuer, and audience.

use crate::config::JwtConfig;
use crate::errors::ApiError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Claims Structures
// =============================================================================

/// Claims carried by a short-lived access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject - the user's unique identifier.
    pub sub: Uuid,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
}

/// Claims carried by a rotating refresh token.
///
/// `jti` is the primary key of the `refresh_tokens` row backing this token;
/// a refresh token is only valid while that row still exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub jti: Uuid,
    pub exp: i64,
    pub iat: i64,
}

// =============================================================================
// Token Pair
// =============================================================================

/// A pair of access and refresh tokens returned after login or refresh.
///
/// ## Token Rotation
///
/// When refreshing, the client receives a brand new pair; the old refresh
/// token's `refresh_tokens` row is deleted as part of the same operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    /// Seconds until the refresh token expires.
    pub refresh_expires_in: i64,
    /// `jti` of the minted refresh token, so the caller can persist the
    /// matching `refresh_tokens` row.
    pub refresh_jti: Uuid,
}

// =============================================================================
// JWT Service
// =============================================================================

/// Service for JWT generation and validation.
///
/// Created once at startup from [`JwtConfig`] and shared (via `Arc`) across
/// the application.
#[derive(Clone)]
pub struct JwtService {
    access_encoding_key: EncodingKey,
    access_decoding_key: DecodingKey,
    refresh_encoding_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
    config: JwtConfig,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        Self {
            access_encoding_key: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding_key: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding_key: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding_key: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            config,
        }
    }

    /// Generates a fresh access + refresh token pair for a user.
    ///
    /// The caller is responsible for persisting a `refresh_tokens` row keyed
    /// by [`TokenPair::refresh_jti`] before handing the pair to the client.
    pub fn generate_tokens(&self, user_id: Uuid) -> Result<TokenPair, ApiError> {
        let now = Utc::now();
        let access_ttl = Duration::seconds(self.config.access_token_ttl_seconds as i64);
        let refresh_ttl = Duration::seconds(self.config.refresh_token_ttl_seconds as i64);
        let refresh_jti = Uuid::new_v4();

        let access_claims = AccessClaims {
            sub: user_id,
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            exp: (now + access_ttl).timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
        };
        let access_token = encode(&Header::default(), &access_claims, &self.access_encoding_key)
            .map_err(|e| ApiError::Internal {
                message: format!("failed to generate access token: {}", e),
            })?;

        let refresh_claims = RefreshClaims {
            sub: user_id,
            jti: refresh_jti,
            exp: (now + refresh_ttl).timestamp(),
            iat: now.timestamp(),
        };
        let refresh_token = encode(&Header::default(), &refresh_claims, &self.refresh_encoding_key)
            .map_err(|e| ApiError::Internal {
                message: format!("failed to generate refresh token: {}", e),
            })?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.config.access_token_ttl_seconds as i64,
            refresh_expires_in: self.config.refresh_token_ttl_seconds as i64,
            refresh_jti,
        })
    }

    /// Validates and decodes an access token.
    ///
    /// ## Errors
    ///
    /// Returns `ApiError::InvalidCredentials` if the signature, issuer,
    /// audience, or expiry check fails.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, ApiError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        let token_data: TokenData<AccessClaims> =
            decode(token, &self.access_decoding_key, &validation)
                .map_err(|_| ApiError::InvalidCredentials)?;

        Ok(token_data.claims)
    }

    /// Validates and decodes a refresh token's signature and expiry.
    ///
    /// This only checks the JWT itself; the caller must still confirm the
    /// `jti` has a live row in `refresh_tokens` before trusting it.
    ///
    /// ## Errors
    ///
    /// Returns `ApiError::InvalidRefresh` if the signature or expiry check
    /// fails.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, ApiError> {
        let mut validation = Validation::default();
        validation.validate_aud = false;
        validation.required_spec_claims.remove("aud");

        let token_data: TokenData<RefreshClaims> =
            decode(token, &self.refresh_decoding_key, &validation)
                .map_err(|_| ApiError::InvalidRefresh)?;

        Ok(token_data.claims)
    }

    /// Extracts the token from an `Authorization: Bearer <token>` header.
    pub fn extract_from_header(auth_header: &str) -> Result<&str, ApiError> {
        auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::InvalidCredentials)
    }
}

// Implement Debug manually to avoid exposing keys
impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            access_secret: "test_access_secret_minimum_32_chars".to_string(),
            refresh_secret: "test_refresh_secret_minimum_32_chars".to_string(),
            access_token_ttl_seconds: 900,
            refresh_token_ttl_seconds: 2_592_000,
            issuer: "yaas".to_string(),
            audience: "yaas-api".to_string(),
        }
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let service = JwtService::new(test_config());
        let user_id = Uuid::new_v4();

        let tokens = service.generate_tokens(user_id).unwrap();
        let claims = service.validate_access_token(&tokens.access_token).unwrap();

        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn test_generate_and_validate_refresh_token() {
        let service = JwtService::new(test_config());
        let user_id = Uuid::new_v4();

        let tokens = service.generate_tokens(user_id).unwrap();
        let claims = service.validate_refresh_token(&tokens.refresh_token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.jti, tokens.refresh_jti);
    }

    #[test]
    fn test_access_token_rejected_by_refresh_validation() {
        let service = JwtService::new(test_config());
        let user_id = Uuid::new_v4();
        let tokens = service.generate_tokens(user_id).unwrap();

        // Signed with a different secret, so decoding as a refresh token fails.
        let result = service.validate_refresh_token(&tokens.access_token);
        assert!(matches!(result, Err(ApiError::InvalidRefresh)));
    }

    #[test]
    fn test_refresh_token_rejected_by_access_validation() {
        let service = JwtService::new(test_config());
        let user_id = Uuid::new_v4();
        let tokens = service.generate_tokens(user_id).unwrap();

        let result = service.validate_access_token(&tokens.refresh_token);
        assert!(matches!(result, Err(ApiError::InvalidCredentials)));
    }

    #[test]
    fn test_extract_from_header_valid() {
        let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
        let header = format!("Bearer {}", token);

        let extracted = JwtService::extract_from_header(&header).unwrap();
        assert_eq!(extracted, token);
    }

    #[test]
    fn test_extract_from_header_invalid() {
        let result = JwtService::extract_from_header("InvalidHeader token");
        assert!(matches!(result, Err(ApiError::InvalidCredentials)));
    }

    #[test]
    fn test_refresh_tokens_have_unique_jti() {
        let service = JwtService::new(test_config());
        let user_id = Uuid::new_v4();

        let tokens1 = service.generate_tokens(user_id).unwrap();
        let tokens2 = service.generate_tokens(user_id).unwrap();

        assert_ne!(tokens1.refresh_jti, tokens2.refresh_jti);
    }
}
