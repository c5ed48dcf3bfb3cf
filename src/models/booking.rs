use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub host_user_id: Uuid,
    pub guest_name: String,
    pub guest_email: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub note: Option<String>,
    pub status: String, // 'confirmed' or 'cancelled'
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateBookingData {
    pub host_user_id: Uuid,
    pub guest_name: String,
    pub guest_email: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl Booking {
    /// Inserts the booking unless it overlaps a confirmed one for the host.
    /// The host's user row is locked for the duration so two guests cannot
    /// claim the same slot concurrently.
    pub async fn create_if_free(
        pool: &PgPool,
        data: CreateBookingData,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(data.host_user_id)
            .execute(&mut *tx)
            .await?;

        let overlapping: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE host_user_id = $1
                  AND status = 'confirmed'
                  AND starts_at < $3
                  AND ends_at > $2
            )
            "#,
        )
        .bind(data.host_user_id)
        .bind(data.starts_at)
        .bind(data.ends_at)
        .fetch_one(&mut *tx)
        .await?;

        if overlapping {
            return Ok(None);
        }

        let booking = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO bookings (host_user_id, guest_name, guest_email, starts_at, ends_at, note)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(data.host_user_id)
        .bind(&data.guest_name)
        .bind(&data.guest_email)
        .bind(data.starts_at)
        .bind(data.ends_at)
        .bind(&data.note)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(booking))
    }

    pub async fn list_upcoming_for_host(
        pool: &PgPool,
        host_user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM bookings
            WHERE host_user_id = $1
              AND status = 'confirmed'
              AND ends_at >= NOW()
            ORDER BY starts_at ASC
            "#,
        )
        .bind(host_user_id)
        .fetch_all(pool)
        .await
    }

    /// Cancels a host's booking. Returns `false` if nothing matched.
    pub async fn cancel(pool: &PgPool, id: Uuid, host_user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE bookings SET status = 'cancelled'
            WHERE id = $1 AND host_user_id = $2 AND status = 'confirmed'
            "#,
        )
        .bind(id)
        .bind(host_user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
