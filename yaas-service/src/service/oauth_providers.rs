//! # OAuth2 Provider Registry
//!
//! Google and GitHub as the two reference provider strategies (spec §4.5,
//! §9: "modeled as a small strategy set... resolved by string name... use
//! tagged variants or a registry of function pairs, not class
//! inheritance"). [`Provider`] is exactly that tagged enum; each variant's
//! `authorize_url`/`token_url`/`user_info_url` are compiled-in constants,
//! while client id/secret/redirect/scopes come from [`OAuthConfig`].

use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use shared::config::OAuthConfig;
use shared::errors::ApiError;

/// The closed set of configured OAuth2 providers (spec §4.5: "closed set
/// via config").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    Github,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self, ApiError> {
        match name {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            other => Err(ApiError::UnknownProvider { provider: other.to_string() }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }

    fn auth_url(self) -> &'static str {
        match self {
            Self::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            Self::Github => "https://github.com/login/oauth/authorize",
        }
    }

    fn token_url(self) -> &'static str {
        match self {
            Self::Google => "https://oauth2.googleapis.com/token",
            Self::Github => "https://github.com/login/oauth/access_token",
        }
    }

    fn user_info_url(self) -> &'static str {
        match self {
            Self::Google => "https://www.googleapis.com/oauth2/v2/userinfo",
            Self::Github => "https://api.github.com/user",
        }
    }

    /// GitHub's `/user` response does not reliably include a verified
    /// primary email when the user has their address set to private; a
    /// secondary call is required (spec §4.5).
    fn emails_url(self) -> Option<&'static str> {
        match self {
            Self::Github => Some("https://api.github.com/user/emails"),
            Self::Google => None,
        }
    }
}

/// Normalized identity pulled out of a provider's raw user-info payload.
#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    pub provider_id: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: String,
}

/// GitHub's `id` is a JSON integer; some front-door proxies and old
/// fixtures have been seen to re-serialize it as a float, so this accepts
/// either (spec §9 open question: "handle integer-vs-float JSON parse
/// variability defensively").
#[derive(Debug, Deserialize)]
struct GithubUserInfo {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    id: String,
    email: Option<String>,
}

fn deserialize_flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdValue {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match IdValue::deserialize(deserializer)? {
        IdValue::Int(n) => Ok(n.to_string()),
        IdValue::Float(n) => Ok((n as i64).to_string()),
        IdValue::Text(s) => Ok(s),
    }
}

#[derive(Debug, Deserialize)]
struct GithubEmailEntry {
    email: String,
    primary: bool,
    verified: bool,
}

/// Resolves [`Provider`]s against configured credentials and performs the
/// three operations spec §4.5 assigns the registry: `LoginURL`,
/// `ExchangeCode`, `UserInfo`.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    oauth: OAuthConfig,
    http: reqwest::Client,
}

impl ProviderRegistry {
    pub fn new(oauth: OAuthConfig) -> Self {
        Self { oauth, http: reqwest::Client::new() }
    }

    fn client_for(&self, provider: Provider) -> Result<BasicClient, ApiError> {
        let entry = match provider {
            Provider::Google => self.oauth.google.as_ref(),
            Provider::Github => self.oauth.github.as_ref(),
        }
        .ok_or(ApiError::UnknownProvider { provider: provider.as_str().to_string() })?;

        Ok(BasicClient::new(
            ClientId::new(entry.client_id.clone()),
            Some(ClientSecret::new(entry.client_secret.clone())),
            AuthUrl::new(provider.auth_url().to_string())
                .map_err(|e| ApiError::Internal { message: format!("invalid auth_url: {e}") })?,
            Some(
                TokenUrl::new(provider.token_url().to_string())
                    .map_err(|e| ApiError::Internal { message: format!("invalid token_url: {e}") })?,
            ),
        )
        .set_redirect_uri(
            RedirectUrl::new(entry.redirect_url.clone())
                .map_err(|e| ApiError::Internal { message: format!("invalid redirect_url: {e}") })?,
        ))
    }

    /// Builds the authorization URL a login flow redirects the browser to,
    /// carrying `stateToken` through as the CSRF `state` parameter and
    /// requesting `access_type=offline` (spec §4.5).
    pub fn login_url(&self, provider: Provider, state_token: &str) -> Result<String, ApiError> {
        let client = self.client_for(provider)?;
        let scopes = match match provider {
            Provider::Google => self.oauth.google.as_ref(),
            Provider::Github => self.oauth.github.as_ref(),
        } {
            Some(entry) => entry.scopes.clone(),
            None => Vec::new(),
        };

        let mut request = client
            .authorize_url(|| CsrfToken::new(state_token.to_string()))
            .add_extra_param("access_type", "offline");

        for scope in scopes {
            request = request.add_scope(Scope::new(scope));
        }

        let (url, _csrf) = request.url();
        Ok(url.to_string())
    }

    /// Exchanges an authorization `code` for a bearer access token.
    pub async fn exchange_code(&self, provider: Provider, code: String) -> Result<String, ApiError> {
        let client = self.client_for(provider)?;

        let token = client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(async_http_client)
            .await
            .map_err(|e| ApiError::Internal { message: format!("oauth2 code exchange failed: {e}") })?;

        Ok(token.access_token().secret().clone())
    }

    /// Fetches and normalizes the provider's user-info payload into a
    /// `(providerID, email)` pair.
    pub async fn user_info(&self, provider: Provider, access_token: &str) -> Result<ProviderIdentity, ApiError> {
        match provider {
            Provider::Google => self.google_user_info(access_token).await,
            Provider::Github => self.github_user_info(access_token).await,
        }
    }

    async fn google_user_info(&self, access_token: &str) -> Result<ProviderIdentity, ApiError> {
        let info: GoogleUserInfo = self
            .http
            .get(Provider::Google.user_info_url())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ApiError::Internal { message: format!("google userinfo request failed: {e}") })?
            .json()
            .await
            .map_err(|e| ApiError::Internal { message: format!("google userinfo decode failed: {e}") })?;

        Ok(ProviderIdentity { provider_id: info.id, email: info.email })
    }

    async fn github_user_info(&self, access_token: &str) -> Result<ProviderIdentity, ApiError> {
        let info: GithubUserInfo = self
            .http
            .get(Provider::Github.user_info_url())
            .bearer_auth(access_token)
            .header("User-Agent", "yaas")
            .send()
            .await
            .map_err(|e| ApiError::Internal { message: format!("github userinfo request failed: {e}") })?
            .json()
            .await
            .map_err(|e| ApiError::Internal { message: format!("github userinfo decode failed: {e}") })?;

        let email = match info.email {
            Some(email) => email,
            None => self.github_primary_verified_email(access_token).await?,
        };

        Ok(ProviderIdentity { provider_id: info.id, email })
    }

    /// Secondary call for accounts with a private primary email (spec
    /// §4.5: "may require a secondary call to the emails endpoint to pick
    /// the primary, verified address").
    async fn github_primary_verified_email(&self, access_token: &str) -> Result<String, ApiError> {
        let Some(emails_url) = Provider::Github.emails_url() else {
            return Err(ApiError::Internal { message: "github provider has no emails endpoint".to_string() });
        };

        let entries: Vec<GithubEmailEntry> = self
            .http
            .get(emails_url)
            .bearer_auth(access_token)
            .header("User-Agent", "yaas")
            .send()
            .await
            .map_err(|e| ApiError::Internal { message: format!("github emails request failed: {e}") })?
            .json()
            .await
            .map_err(|e| ApiError::Internal { message: format!("github emails decode failed: {e}") })?;

        entries
            .into_iter()
            .find(|entry| entry.primary && entry.verified)
            .map(|entry| entry.email)
            .ok_or_else(|| ApiError::Internal { message: "no verified primary github email".to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_providers() {
        assert_eq!(Provider::parse("google").unwrap(), Provider::Google);
        assert_eq!(Provider::parse("github").unwrap(), Provider::Github);
    }

    #[test]
    fn parse_rejects_unknown_provider() {
        let err = Provider::parse("facebook").unwrap_err();
        assert!(matches!(err, ApiError::UnknownProvider { provider } if provider == "facebook"));
    }

    #[test]
    fn github_id_accepts_integer_and_float_json() {
        let int_json = r#"{"id": 12345, "email": "a@x.test"}"#;
        let parsed: GithubUserInfo = serde_json::from_str(int_json).unwrap();
        assert_eq!(parsed.id, "12345");

        let float_json = r#"{"id": 12345.0, "email": null}"#;
        let parsed: GithubUserInfo = serde_json::from_str(float_json).unwrap();
        assert_eq!(parsed.id, "12345");
    }

    #[test]
    fn login_url_unconfigured_provider_is_unknown() {
        let registry = ProviderRegistry::new(OAuthConfig::default());
        let err = registry.login_url(Provider::Google, "state").unwrap_err();
        assert!(matches!(err, ApiError::UnknownProvider { .. }));
    }
}
