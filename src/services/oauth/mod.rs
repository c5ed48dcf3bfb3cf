//! OAuth sign-in providers (authorization code flow with PKCE).

pub mod userinfo;

use chrono::{DateTime, Duration, Utc};
use oauth2::reqwest::async_http_client;
use oauth2::{
    basic::BasicClient, AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse as OAuth2TokenResponse,
    TokenUrl,
};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

pub use userinfo::{fetch_profile, Profile};

#[derive(thiserror::Error, Debug)]
pub enum OAuthError {
    #[error("Unknown OAuth provider: {0}")]
    UnknownProvider(String),

    #[error("OAuth provider not configured: {0}")]
    NotConfigured(&'static str),

    #[error("OAuth URL construction failed: {0}")]
    UrlConstruction(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    #[error("Profile request failed: {0}")]
    Profile(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    LinkedIn,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::LinkedIn => "linkedin",
        }
    }

    fn auth_url(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            OAuthProvider::LinkedIn => "https://www.linkedin.com/oauth/v2/authorization",
        }
    }

    fn token_url(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "https://oauth2.googleapis.com/token",
            OAuthProvider::LinkedIn => "https://www.linkedin.com/oauth/v2/accessToken",
        }
    }

    pub fn userinfo_url(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "https://openidconnect.googleapis.com/v1/userinfo",
            OAuthProvider::LinkedIn => "https://api.linkedin.com/v2/userinfo",
        }
    }

    pub fn scopes(&self) -> &'static [&'static str] {
        &["openid", "email", "profile"]
    }

    // LinkedIn rejects HTTP Basic client authentication on its token endpoint.
    fn auth_type(&self) -> AuthType {
        match self {
            OAuthProvider::Google => AuthType::BasicAuth,
            OAuthProvider::LinkedIn => AuthType::RequestBody,
        }
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(OAuthProvider::Google),
            "linkedin" => Ok(OAuthProvider::LinkedIn),
            other => Err(OAuthError::UnknownProvider(other.to_string())),
        }
    }
}

/// Client id and secret for one provider.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: Secret<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenData {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub scopes: Vec<String>,
}

fn build_oauth_client(
    provider: OAuthProvider,
    credentials: &ProviderCredentials,
    redirect_uri: &str,
) -> Result<BasicClient, OAuthError> {
    let redirect_url = RedirectUrl::new(redirect_uri.to_string())
        .map_err(|e| OAuthError::InvalidRedirectUri(e.to_string()))?;

    let client = BasicClient::new(
        ClientId::new(credentials.client_id.clone()),
        Some(ClientSecret::new(
            credentials.client_secret.expose_secret().clone(),
        )),
        AuthUrl::new(provider.auth_url().to_string())
            .map_err(|e| OAuthError::UrlConstruction(e.to_string()))?,
        Some(
            TokenUrl::new(provider.token_url().to_string())
                .map_err(|e| OAuthError::UrlConstruction(e.to_string()))?,
        ),
    )
    .set_auth_type(provider.auth_type())
    .set_redirect_uri(redirect_url);

    Ok(client)
}

/// Generates the authorization URL for `provider`.
/// Returns (auth_url, csrf_token, pkce_verifier)
pub fn build_auth_url(
    provider: OAuthProvider,
    credentials: &ProviderCredentials,
    redirect_uri: &str,
) -> Result<(String, String, String), OAuthError> {
    let client = build_oauth_client(provider, credentials, redirect_uri)?;

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (auth_url, csrf_token) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(provider.scopes().iter().map(|s| Scope::new(s.to_string())))
        .set_pkce_challenge(pkce_challenge)
        .url();

    Ok((
        auth_url.to_string(),
        csrf_token.secret().clone(),
        pkce_verifier.secret().clone(),
    ))
}

/// Exchanges an authorization code for access and refresh tokens
pub async fn exchange_code(
    provider: OAuthProvider,
    credentials: &ProviderCredentials,
    code: &str,
    redirect_uri: &str,
    pkce_verifier: Option<&str>,
) -> Result<TokenData, OAuthError> {
    let client = build_oauth_client(provider, credentials, redirect_uri)?;

    let mut token_request = client.exchange_code(AuthorizationCode::new(code.to_string()));

    if let Some(verifier) = pkce_verifier {
        token_request =
            token_request.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_string()));
    }

    let token_response = token_request
        .request_async(async_http_client)
        .await
        .map_err(|e| OAuthError::TokenExchange(e.to_string()))?;

    let expires_in = token_response
        .expires_in()
        .unwrap_or(std::time::Duration::from_secs(3600));

    let expires_at = Utc::now() + Duration::seconds(expires_in.as_secs() as i64);

    let scopes = token_response
        .scopes()
        .map(|s| s.iter().map(|scope| scope.to_string()).collect())
        .unwrap_or_else(|| provider.scopes().iter().map(|s| s.to_string()).collect());

    Ok(TokenData {
        access_token: token_response.access_token().secret().clone(),
        refresh_token: token_response.refresh_token().map(|t| t.secret().clone()),
        expires_at,
        scopes,
    })
}
