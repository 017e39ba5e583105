//! # OAuth2 State Token
//!
//! Signs and verifies the opaque `state` parameter round-tripped through an
//! OAuth2 provider during the login/registration flow.
//!
//! ## Why not a random nonce in a server-side session?
//!
//! The service doesn't keep session state between the redirect to the
//! provider and the callback - the flow id and the original callback URL
//! are instead embedded directly in the state value, HMAC-signed so the
//! callback handler can trust them without a lookup.
//!
//! ## Format
//!
//! ```text
//! base64url(flow_id ":" callback_url ":" issued_at) "." base64url(hmac_sha256(payload))
//! ```
//!
//! Signature comparison is constant-time ([`hmac::Mac::verify_slice`]) to
//! avoid leaking timing information about a guessed signature.

use crate::errors::ApiError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Default lifetime of a state token: matches the 15-minute flow expiry
/// (spec §6) so a state token stays valid for as long as the flow it's
/// bound to.
const STATE_TOKEN_TTL_SECONDS: i64 = 900;

/// Signs and verifies OAuth2 `state` parameters.
#[derive(Clone)]
pub struct StateTokenCodec {
    secret: String,
}

impl StateTokenCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Produces a signed `state` value binding a flow id to the callback URL
    /// the browser should be sent back to after the provider redirects here.
    pub fn encode(&self, flow_id: Uuid, callback_url: &str) -> Result<String, ApiError> {
        let issued_at = Utc::now().timestamp();
        let payload = format!("{}:{}:{}", flow_id, callback_url, issued_at);
        let signature = self.sign(payload.as_bytes())?;

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Verifies a `state` value and extracts the flow id and callback URL.
    ///
    /// ## Errors
    ///
    /// Returns `ApiError::InvalidRequest` if the token is malformed, has an
    /// invalid signature, or has exceeded its 15-minute lifetime.
    pub fn decode(&self, token: &str) -> Result<(Uuid, String), ApiError> {
        let malformed = || ApiError::InvalidRequest {
            message: "invalid state parameter".to_string(),
        };

        let (payload_part, signature_part) = token.split_once('.').ok_or_else(malformed)?;

        let payload = URL_SAFE_NO_PAD.decode(payload_part).map_err(|_| malformed())?;
        let signature = URL_SAFE_NO_PAD.decode(signature_part).map_err(|_| malformed())?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| ApiError::Internal { message: "invalid state token secret".to_string() })?;
        mac.update(&payload);
        mac.verify_slice(&signature).map_err(|_| malformed())?;

        let payload = String::from_utf8(payload).map_err(|_| malformed())?;
        let mut parts = payload.splitn(3, ':');
        let flow_id: Uuid = parts.next().ok_or_else(malformed)?.parse().map_err(|_| malformed())?;
        let callback_url = parts.next().ok_or_else(malformed)?.to_string();
        let issued_at: i64 = parts.next().ok_or_else(malformed)?.parse().map_err(|_| malformed())?;

        if Utc::now().timestamp() - issued_at > STATE_TOKEN_TTL_SECONDS {
            return Err(malformed());
        }

        Ok((flow_id, callback_url))
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, ApiError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| ApiError::Internal { message: "invalid state token secret".to_string() })?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let codec = StateTokenCodec::new("a-secret-that-is-at-least-32-chars");
        let flow_id = Uuid::new_v4();
        let token = codec.encode(flow_id, "https://app.example.com/callback").unwrap();

        let (decoded_flow_id, callback_url) = codec.decode(&token).unwrap();
        assert_eq!(decoded_flow_id, flow_id);
        assert_eq!(callback_url, "https://app.example.com/callback");
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let codec = StateTokenCodec::new("a-secret-that-is-at-least-32-chars");
        let token = codec.encode(Uuid::new_v4(), "https://app.example.com/callback").unwrap();

        let mut tampered = token.clone();
        tampered.push('x');

        assert!(codec.decode(&tampered).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let codec = StateTokenCodec::new("a-secret-that-is-at-least-32-chars");
        let other = StateTokenCodec::new("a-different-secret-at-least-32-ch");
        let token = codec.encode(Uuid::new_v4(), "https://app.example.com/callback").unwrap();

        assert!(other.decode(&token).is_err());
    }

    #[test]
    fn test_malformed_token_rejected() {
        let codec = StateTokenCodec::new("a-secret-that-is-at-least-32-chars");
        assert!(codec.decode("not-a-valid-token").is_err());
    }
}
