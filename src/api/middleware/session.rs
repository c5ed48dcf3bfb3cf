use std::sync::Arc;

use axum::extract::FromRef;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::Config;
use crate::services::{
    bulk_registration::TicketingService, email::EmailClient, encryption::TokenCipher,
    paystack::PaystackClient, wallet_pass::GoogleWalletIssuer,
};

/// Session keys used in the application
pub const SESSION_KEY_USER_ID: &str = "user_id";
pub const SESSION_KEY_CSRF_TOKEN: &str = "csrf_token";
pub const SESSION_KEY_PKCE_VERIFIER: &str = "pkce_verifier";
pub const SESSION_KEY_OAUTH_PROVIDER: &str = "oauth_provider";
pub const SESSION_KEY_RETURN_URL: &str = "return_url";

/// Creates a session layer for Axum
pub async fn create_session_layer(
    pool: PgPool,
    base_url: &str,
) -> Result<SessionManagerLayer<PostgresStore>, sqlx::Error> {
    let session_store = PostgresStore::new(pool);
    session_store.migrate().await?;

    // Plain-HTTP local development would never get the cookie back otherwise.
    let secure = base_url.starts_with("https://");

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(30)));

    Ok(session_layer)
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub ticketing: TicketingService,
    pub mailer: EmailClient,
    pub cipher: TokenCipher,
    pub http: reqwest::Client,
    pub wallet: Option<Arc<GoogleWalletIssuer>>,
}

impl AppState {
    /// Wires the outbound clients from configuration.
    pub fn new(pool: PgPool, config: Config) -> Self {
        let paystack = PaystackClient::new(&config.paystack_base_url, config.paystack_secret_key.clone());
        let mailer = EmailClient::new(
            &config.sendgrid_base_url,
            config.sendgrid_api_key.clone(),
            &config.email_from,
        );
        let ticketing = TicketingService::new(
            pool.clone(),
            paystack,
            mailer.clone(),
            config.signing_key.expose_secret().as_bytes(),
            &config.base_url,
            &config.paystack_callback_url(),
        );
        let cipher = TokenCipher::from_secret(config.encryption_key.expose_secret());

        Self {
            wallet: wallet_issuer(&config).map(Arc::new),
            pool,
            ticketing,
            mailer,
            cipher,
            http: reqwest::Client::new(),
            config,
        }
    }
}

fn wallet_issuer(config: &Config) -> Option<GoogleWalletIssuer> {
    let (Some(issuer_id), Some(email), Some(key)) = (
        &config.google_wallet_issuer_id,
        &config.google_wallet_service_account_email,
        &config.google_wallet_private_key,
    ) else {
        tracing::info!("Google Wallet not configured");
        return None;
    };

    match GoogleWalletIssuer::new(issuer_id, email, key.expose_secret(), &config.base_url) {
        Ok(issuer) => Some(issuer),
        Err(e) => {
            tracing::error!(error = %e, "Google Wallet disabled: invalid service account key");
            None
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.pool.clone()
    }
}
