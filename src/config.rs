use secrecy::Secret;
use serde::Deserialize;

pub const DEFAULT_PAYSTACK_BASE_URL: &str = "https://api.paystack.co";
pub const DEFAULT_SENDGRID_BASE_URL: &str = "https://api.sendgrid.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub base_url: String,
    pub host: String,
    pub port: u16,

    // Security
    pub encryption_key: Secret<String>,
    pub signing_key: Secret<String>,

    // OAuth sign-in
    pub google_client_id: String,
    pub google_client_secret: Secret<String>,
    pub linkedin_client_id: Option<String>,
    pub linkedin_client_secret: Option<Secret<String>>,

    // Paystack
    pub paystack_secret_key: Secret<String>,
    pub paystack_base_url: String,
    pub default_currency: String,

    // RevenueCat webhook shared secret (sent as the Authorization header)
    pub revenuecat_webhook_auth: Secret<String>,

    // SendGrid
    pub sendgrid_api_key: Option<Secret<String>>,
    pub sendgrid_base_url: String,
    pub email_from: String,

    // Google Wallet
    pub google_wallet_issuer_id: Option<String>,
    pub google_wallet_service_account_email: Option<String>,
    pub google_wallet_private_key: Option<Secret<String>>,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Ok(Self {
            database_url: config.get("database_url")?,
            database_max_connections: config.get("database_max_connections").unwrap_or(20),
            base_url: config
                .get::<String>("base_url")?
                .trim_end_matches('/')
                .to_string(),
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            encryption_key: Secret::new(config.get("encryption_key")?),
            signing_key: Secret::new(config.get("signing_key")?),

            google_client_id: config.get("google_client_id")?,
            google_client_secret: Secret::new(config.get("google_client_secret")?),
            linkedin_client_id: config.get("linkedin_client_id").ok(),
            linkedin_client_secret: config
                .get::<String>("linkedin_client_secret")
                .ok()
                .map(Secret::new),

            paystack_secret_key: Secret::new(config.get("paystack_secret_key")?),
            paystack_base_url: config
                .get("paystack_base_url")
                .unwrap_or_else(|_| DEFAULT_PAYSTACK_BASE_URL.to_string()),
            default_currency: config
                .get("default_currency")
                .unwrap_or_else(|_| "NGN".to_string()),

            revenuecat_webhook_auth: Secret::new(config.get("revenuecat_webhook_auth")?),

            sendgrid_api_key: config
                .get::<String>("sendgrid_api_key")
                .ok()
                .map(Secret::new),
            sendgrid_base_url: config
                .get("sendgrid_base_url")
                .unwrap_or_else(|_| DEFAULT_SENDGRID_BASE_URL.to_string()),
            email_from: config
                .get("email_from")
                .unwrap_or_else(|_| "no-reply@cardlink.app".to_string()),

            google_wallet_issuer_id: config.get("google_wallet_issuer_id").ok(),
            google_wallet_service_account_email: config
                .get("google_wallet_service_account_email")
                .ok(),
            google_wallet_private_key: config
                .get::<String>("google_wallet_private_key")
                .ok()
                .map(Secret::new),
        })
    }

    /// Public URL a scanned contact QR code resolves to.
    pub fn card_share_url(&self, card_id: uuid::Uuid) -> String {
        format!("{}/c/{}", self.base_url, card_id)
    }

    pub fn oauth_redirect_uri(&self, provider: &str) -> String {
        format!("{}/auth/{}/callback", self.base_url, provider)
    }

    pub fn paystack_callback_url(&self) -> String {
        format!("{}/api/payments/paystack/callback", self.base_url)
    }
}
