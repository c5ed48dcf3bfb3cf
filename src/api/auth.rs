use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::api::middleware::session::{
    AppState, SESSION_KEY_CSRF_TOKEN, SESSION_KEY_OAUTH_PROVIDER, SESSION_KEY_PKCE_VERIFIER,
    SESSION_KEY_RETURN_URL, SESSION_KEY_USER_ID,
};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{
    oauth_account::{LinkAccountData, OAuthAccount},
    user::{UpsertUserData, User},
};
use crate::services::oauth::{self, OAuthError, OAuthProvider, ProviderCredentials};

fn credentials(
    config: &Config,
    provider: OAuthProvider,
) -> std::result::Result<ProviderCredentials, OAuthError> {
    match provider {
        OAuthProvider::Google => Ok(ProviderCredentials {
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
        }),
        OAuthProvider::LinkedIn => {
            match (&config.linkedin_client_id, &config.linkedin_client_secret) {
                (Some(client_id), Some(client_secret)) => Ok(ProviderCredentials {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                }),
                _ => Err(OAuthError::NotConfigured("linkedin")),
            }
        }
    }
}

/// Only same-site relative paths are accepted as post-login destinations.
fn safe_return_path(path: Option<String>) -> Option<String> {
    path.filter(|p| p.starts_with('/') && !p.starts_with("//") && !p.contains('\\'))
}

#[derive(Deserialize)]
struct LoginQuery {
    return_to: Option<String>,
}

/// Starts the OAuth flow for `provider`
async fn login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<LoginQuery>,
    session: Session,
) -> Result<Redirect> {
    let provider: OAuthProvider = provider.parse()?;
    let credentials = credentials(&state.config, provider)?;
    let redirect_uri = state.config.oauth_redirect_uri(provider.as_str());

    let (auth_url, csrf_token, pkce_verifier) =
        oauth::build_auth_url(provider, &credentials, &redirect_uri)?;

    session.insert(SESSION_KEY_CSRF_TOKEN, csrf_token).await?;
    session.insert(SESSION_KEY_PKCE_VERIFIER, pkce_verifier).await?;
    session.insert(SESSION_KEY_OAUTH_PROVIDER, provider).await?;
    if let Some(return_to) = safe_return_path(query.return_to) {
        session.insert(SESSION_KEY_RETURN_URL, return_to).await?;
    }

    tracing::info!(provider = provider.as_str(), "Redirecting to OAuth provider");

    Ok(Redirect::to(&auth_url))
}

#[derive(Deserialize)]
struct OAuthCallback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Handles the OAuth callback
async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<OAuthCallback>,
    session: Session,
) -> Result<Redirect> {
    let provider: OAuthProvider = provider.parse()?;

    if let Some(error) = params.error {
        tracing::warn!(provider = provider.as_str(), %error, "OAuth provider returned an error");
        return Err(AppError::OAuth(format!("Sign-in was not completed: {}", error)));
    }
    let code = params
        .code
        .ok_or_else(|| AppError::OAuth("Missing authorization code".to_string()))?;

    let stored_csrf: Option<String> = session.remove(SESSION_KEY_CSRF_TOKEN).await?;
    let stored_provider: Option<OAuthProvider> = session.remove(SESSION_KEY_OAUTH_PROVIDER).await?;
    let pkce_verifier: Option<String> = session.remove(SESSION_KEY_PKCE_VERIFIER).await?;

    if stored_csrf.is_none() || stored_csrf != params.state || stored_provider != Some(provider) {
        return Err(AppError::OAuth("CSRF token mismatch".to_string()));
    }

    let credentials = credentials(&state.config, provider)?;
    let redirect_uri = state.config.oauth_redirect_uri(provider.as_str());

    let token_data = oauth::exchange_code(
        provider,
        &credentials,
        &code,
        &redirect_uri,
        pkce_verifier.as_deref(),
    )
    .await?;

    tracing::info!(provider = provider.as_str(), "Exchanged OAuth code for tokens");

    let profile =
        oauth::fetch_profile(&state.http, provider.userinfo_url(), &token_data.access_token)
            .await?;

    let email = profile
        .verified_email()
        .ok_or_else(|| AppError::OAuth("Provider did not return a verified email".to_string()))?;

    let user = User::upsert_by_email(
        &state.pool,
        UpsertUserData {
            email,
            display_name: profile.display_name(),
            photo_url: profile.picture.clone(),
        },
    )
    .await?;

    OAuthAccount::link(
        &state.pool,
        LinkAccountData {
            user_id: user.id,
            provider: provider.as_str().to_string(),
            provider_user_id: profile.sub.clone(),
            access_token: state.cipher.encrypt(&token_data.access_token)?,
            refresh_token: state.cipher.encrypt_optional(token_data.refresh_token.as_deref())?,
            token_expires_at: token_data.expires_at,
            scope: token_data.scopes.join(" "),
        },
    )
    .await?;

    let return_to: Option<String> = session.remove(SESSION_KEY_RETURN_URL).await?;

    session.cycle_id().await?;
    session.insert(SESSION_KEY_USER_ID, user.id).await?;

    tracing::info!(user_id = %user.id, provider = provider.as_str(), "User signed in");

    Ok(Redirect::to(return_to.as_deref().unwrap_or("/")))
}

/// Logs out the user
async fn logout(session: Session) -> Result<StatusCode> {
    session.flush().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Creates the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/:provider/login", get(login))
        .route("/auth/:provider/callback", get(callback))
        .route("/auth/logout", post(logout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_return_path() {
        assert_eq!(safe_return_path(Some("/cards".to_string())).as_deref(), Some("/cards"));
        assert_eq!(safe_return_path(Some("//evil.example".to_string())), None);
        assert_eq!(safe_return_path(Some("https://evil.example".to_string())), None);
        assert_eq!(safe_return_path(Some("/\\evil.example".to_string())), None);
        assert_eq!(safe_return_path(None), None);
    }
}
