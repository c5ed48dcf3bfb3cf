use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Linked sign-in provider account. Tokens are AES-256-GCM ciphertext.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OAuthAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub provider_user_id: String,
    #[serde(skip_serializing)]
    pub access_token: Vec<u8>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<Vec<u8>>,
    pub token_expires_at: DateTime<Utc>,
    pub scope: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LinkAccountData {
    pub user_id: Uuid,
    pub provider: String,
    pub provider_user_id: String,
    pub access_token: Vec<u8>,
    pub refresh_token: Option<Vec<u8>>,
    pub token_expires_at: DateTime<Utc>,
    pub scope: String,
}

impl OAuthAccount {
    /// Links a provider account to a user, replacing stored tokens on re-login.
    pub async fn link(pool: &PgPool, data: LinkAccountData) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO oauth_accounts (
                user_id, provider, provider_user_id, access_token,
                refresh_token, token_expires_at, scope
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (provider, provider_user_id) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                access_token = EXCLUDED.access_token,
                refresh_token = COALESCE(EXCLUDED.refresh_token, oauth_accounts.refresh_token),
                token_expires_at = EXCLUDED.token_expires_at,
                scope = EXCLUDED.scope,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(data.user_id)
        .bind(&data.provider)
        .bind(&data.provider_user_id)
        .bind(&data.access_token)
        .bind(&data.refresh_token)
        .bind(data.token_expires_at)
        .bind(&data.scope)
        .fetch_one(pool)
        .await
    }

    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM oauth_accounts WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
