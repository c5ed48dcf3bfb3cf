use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: String,
    pub entitlement: Option<String>,
    pub store: String,
    pub status: String, // 'active', 'cancelled', 'billing_issue', 'expired'
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UpsertSubscriptionData {
    pub user_id: Uuid,
    pub product_id: String,
    pub entitlement: Option<String>,
    pub store: String,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Premium features stay unlocked until expiry even after cancellation.
    pub fn is_entitled(&self, now: DateTime<Utc>) -> bool {
        let status_grants = matches!(self.status.as_str(), "active" | "cancelled" | "billing_issue");
        status_grants && self.expires_at.map_or(true, |expires_at| expires_at > now)
    }

    pub async fn upsert(
        conn: &mut PgConnection,
        data: UpsertSubscriptionData,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO subscriptions (user_id, product_id, entitlement, store, status, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE
            SET product_id = EXCLUDED.product_id,
                entitlement = COALESCE(EXCLUDED.entitlement, subscriptions.entitlement),
                store = EXCLUDED.store,
                status = EXCLUDED.status,
                expires_at = COALESCE(EXCLUDED.expires_at, subscriptions.expires_at),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(data.user_id)
        .bind(&data.product_id)
        .bind(&data.entitlement)
        .bind(&data.store)
        .bind(&data.status)
        .bind(data.expires_at)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Expires every lapsed subscription, returning how many rows changed.
    pub async fn expire_lapsed(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'expired', updated_at = NOW()
            WHERE status IN ('active', 'cancelled', 'billing_issue')
              AND expires_at IS NOT NULL
              AND expires_at < $1
            "#,
        )
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub app_user_id: String,
    pub event_id: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub received_at: DateTime<Utc>,
}

impl SubscriptionLog {
    /// Stores a webhook event. Returns `false` if this event id was already logged.
    pub async fn record(
        conn: &mut PgConnection,
        user_id: Option<Uuid>,
        app_user_id: &str,
        event_id: &str,
        event_type: &str,
        payload: &JsonValue,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscription_logs (user_id, app_user_id, event_id, event_type, payload)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(app_user_id)
        .bind(event_id)
        .bind(event_type)
        .bind(payload)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
