use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkStatus {
    PendingPayment,
    Completed,
    Failed,
}

impl BulkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkStatus::PendingPayment => "pending_payment",
            BulkStatus::Completed => "completed",
            BulkStatus::Failed => "failed",
        }
    }
}

/// One ticket holder inside a bulk purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BulkRegistration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub purchaser_id: Uuid,
    pub purchaser_email: String,
    pub quantity: i32,
    pub unit_price_minor: i64,
    pub total_amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub payment_reference: String,
    pub authorization_url: Option<String>,
    pub attendees: Json<Vec<Attendee>>,
    pub failure_reason: Option<String>,
    pub verification_attempts: i32,
    pub last_verification_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateBulkRegistrationData {
    pub event_id: Uuid,
    pub purchaser_id: Uuid,
    pub purchaser_email: String,
    pub unit_price_minor: i64,
    pub total_amount_minor: i64,
    pub currency: String,
    pub payment_reference: String,
    pub attendees: Vec<Attendee>,
}

impl BulkRegistration {
    pub fn is_pending(&self) -> bool {
        self.status == BulkStatus::PendingPayment.as_str()
    }

    pub async fn create(
        pool: &PgPool,
        data: CreateBulkRegistrationData,
    ) -> Result<Self, sqlx::Error> {
        let quantity = data.attendees.len() as i32;

        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO bulk_registrations (
                event_id, purchaser_id, purchaser_email, quantity, unit_price_minor,
                total_amount_minor, currency, status, payment_reference, attendees
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending_payment', $8, $9)
            RETURNING *
            "#,
        )
        .bind(data.event_id)
        .bind(data.purchaser_id)
        .bind(&data.purchaser_email)
        .bind(quantity)
        .bind(data.unit_price_minor)
        .bind(data.total_amount_minor)
        .bind(&data.currency)
        .bind(&data.payment_reference)
        .bind(Json(data.attendees))
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM bulk_registrations WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_reference(
        pool: &PgPool,
        reference: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM bulk_registrations WHERE payment_reference = $1")
            .bind(reference)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_purchaser(
        pool: &PgPool,
        purchaser_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM bulk_registrations
            WHERE purchaser_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(purchaser_id)
        .fetch_all(pool)
        .await
    }

    pub async fn set_authorization_url(
        pool: &PgPool,
        id: Uuid,
        authorization_url: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE bulk_registrations
            SET authorization_url = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(authorization_url)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Locks the row for the completion transaction. Only pending rows are
    /// returned, so concurrent webhook and callback deliveries serialize here
    /// and the loser sees `None`.
    pub async fn lock_pending(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM bulk_registrations
            WHERE id = $1 AND status = 'pending_payment'
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn mark_completed(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE bulk_registrations
            SET status = 'completed', completed_at = NOW(), failure_reason = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Marks a pending registration failed. Returns `false` if it was no longer pending.
    pub async fn mark_failed(
        conn: &mut PgConnection,
        id: Uuid,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE bulk_registrations
            SET status = 'failed', failure_reason = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending_payment'
            "#,
        )
        .bind(id)
        .bind(reason)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Pending registrations old enough to be re-verified by the retry job.
    pub async fn list_pending_for_retry(
        pool: &PgPool,
        older_than: DateTime<Utc>,
        max_attempts: i32,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM bulk_registrations
            WHERE status = 'pending_payment'
              AND created_at < $1
              AND verification_attempts < $2
            ORDER BY created_at ASC
            LIMIT $3
            "#,
        )
        .bind(older_than)
        .bind(max_attempts)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Records a verification attempt and returns the new attempt count.
    pub async fn record_verification_attempt(pool: &PgPool, id: Uuid) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            UPDATE bulk_registrations
            SET verification_attempts = verification_attempts + 1,
                last_verification_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING verification_attempts
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }
}
