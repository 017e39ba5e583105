//! # Email Verification Token
//!
//! HMAC-signed, time-limited token binding a user id to the moment it was
//! issued. This is a library-level capability only: no HTTP route in this
//! service mints or consumes it, since sending the verification email is
//! delegated to an SMTP sink outside this crate's scope. It exists so a
//! caller wiring up that sink has a ready-made, constant-time-verified
//! token format to put in the link.
//!
//! ## Format
//!
//! ```text
//! base64url(user_id ":" issued_at) "." base64url(hmac_sha256(payload))
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Default validity window for an email verification link.
const DEFAULT_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug)]
pub enum EmailVerificationTokenError {
    Malformed,
    Expired,
}

/// Signs and verifies email-verification tokens.
#[derive(Clone)]
pub struct EmailVerificationCodec {
    secret: String,
    ttl_seconds: i64,
}

impl EmailVerificationCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into(), ttl_seconds: DEFAULT_TTL_SECONDS }
    }

    pub fn with_ttl(secret: impl Into<String>, ttl_seconds: i64) -> Self {
        Self { secret: secret.into(), ttl_seconds }
    }

    pub fn encode(&self, user_id: Uuid) -> String {
        let issued_at = Utc::now().timestamp();
        let payload = format!("{}:{}", user_id, issued_at);
        let signature = self.sign(payload.as_bytes());

        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(signature)
        )
    }

    pub fn decode(&self, token: &str) -> Result<Uuid, EmailVerificationTokenError> {
        let (payload_part, signature_part) =
            token.split_once('.').ok_or(EmailVerificationTokenError::Malformed)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_part)
            .map_err(|_| EmailVerificationTokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_part)
            .map_err(|_| EmailVerificationTokenError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| EmailVerificationTokenError::Malformed)?;
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| EmailVerificationTokenError::Malformed)?;

        let payload = String::from_utf8(payload).map_err(|_| EmailVerificationTokenError::Malformed)?;
        let (user_id, issued_at) = payload
            .split_once(':')
            .ok_or(EmailVerificationTokenError::Malformed)?;

        let user_id: Uuid = user_id.parse().map_err(|_| EmailVerificationTokenError::Malformed)?;
        let issued_at: i64 = issued_at.parse().map_err(|_| EmailVerificationTokenError::Malformed)?;

        if Utc::now().timestamp() - issued_at > self.ttl_seconds {
            return Err(EmailVerificationTokenError::Expired);
        }

        Ok(user_id)
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let codec = EmailVerificationCodec::new("a-secret-that-is-at-least-32-chars");
        let user_id = Uuid::new_v4();
        let token = codec.encode(user_id);

        assert_eq!(codec.decode(&token).unwrap(), user_id);
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = EmailVerificationCodec::with_ttl("a-secret-that-is-at-least-32-chars", -1);
        let token = codec.encode(Uuid::new_v4());

        assert!(matches!(
            codec.decode(&token),
            Err(EmailVerificationTokenError::Expired)
        ));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let codec = EmailVerificationCodec::new("a-secret-that-is-at-least-32-chars");
        let mut token = codec.encode(Uuid::new_v4());
        token.push('x');

        assert!(matches!(
            codec.decode(&token),
            Err(EmailVerificationTokenError::Malformed)
        ));
    }
}
