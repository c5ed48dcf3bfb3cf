use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventRegistration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub attendee_name: String,
    pub attendee_email: String,
    pub status: String, // 'confirmed' or 'cancelled'
    pub created_at: DateTime<Utc>,
}

impl EventRegistration {
    pub async fn create(
        conn: &mut PgConnection,
        event_id: Uuid,
        user_id: Uuid,
        attendee_name: &str,
        attendee_email: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO event_registrations (event_id, user_id, attendee_name, attendee_email)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .bind(attendee_name)
        .bind(attendee_email)
        .fetch_one(conn)
        .await
    }

    pub async fn find_confirmed(
        pool: &PgPool,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM event_registrations
            WHERE event_id = $1 AND user_id = $2 AND status = 'confirmed'
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_event(pool: &PgPool, event_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM event_registrations
            WHERE event_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(pool)
        .await
    }
}
