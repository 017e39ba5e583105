//! # Authentication Module
//!
//! Provides the cryptographic primitives this service is built on: password
//! hashing, access/refresh token generation and validation, request-level
//! authentication middleware, and the signed tokens used by the OAuth2 and
//! email-verification flows.
//!
//! ## Module Structure
//!
//! ```text
//! auth/
//! ├── jwt.rs                 - access/refresh token generation and validation
//! ├── password.rs            - Argon2id password hashing
//! ├── middleware.rs          - Actix-web authentication middleware
//! ├── state_token.rs         - signed OAuth2 `state` parameter
//! └── email_verification.rs  - signed email-verification token
//! ```
//!
//! ## Overview
//!
//! | Component | Purpose | See Also |
//! |-----------|---------|----------|
//! | [`JwtService`] | Generate and validate access/refresh tokens | [RFC 7519](https://tools.ietf.org/html/rfc7519) |
//! | [`PasswordHasher`] | Argon2id password hashing | [OWASP Password Storage](https://cheatsheetseries.owasp.org/cheatsheets/Password_Storage_Cheat_Sheet.html) |
//! | [`AuthMiddleware`] | Request authentication | Actix-web middleware docs |
//! | [`AuthenticatedUser`] | Extractor for authenticated user | Actix-web extractors |
//! | [`StateTokenCodec`] | Signed OAuth2 `state` parameter | [`crate::auth::state_token`] |
//!
//! Role/permission enforcement beyond storage and MFA/WebAuthn/passkeys are
//! out of scope for this module.
//!
//! ## Token Flow
//!
//! ```text
//! ┌────────┐        ┌────────────┐        ┌────────────┐
//! │ Client │        │ Flow API   │        │ Protected  │
//! └───┬────┘        └─────┬──────┘        │    API     │
//!     │                   │               └─────┬──────┘
//!     │ flow proceeds to  │                     │
//!     │ success           │                     │
//!     │──────────────────>│                     │
//!     │                   │                     │
//!     │ {access_token,    │                     │
//!     │  refresh_token}   │                     │
//!     │<──────────────────│                     │
//!     │                   │                     │
//!     │ GET /resource     │                     │
//!     │ Authorization:    │                     │
//!     │ Bearer <access>   │                     │
//!     │────────────────────────────────────────>│
//!     │                   │                     │
//!     │ 200 OK {data}     │                     │
//!     │<────────────────────────────────────────│
//!     │                   │                     │
//!     │ (after 15 min)    │                     │
//!     │ POST /token/refresh                     │
//!     │──────────────────>│                     │
//!     │                   │                     │
//!     │ {new access_token,│                     │
//!     │  new refresh}     │                     │
//!     │<──────────────────│                     │
//! ```

pub mod email_verification;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod state_token;

// Re-export main types for convenient access
pub use email_verification::EmailVerificationCodec;
pub use jwt::{AccessClaims, JwtService, RefreshClaims, TokenPair};
pub use middleware::{AuthMiddleware, AuthenticatedUser};
pub use password::PasswordHasher;
pub use state_token::StateTokenCodec;
