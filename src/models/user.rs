use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

pub const ORGANISER_NONE: &str = "none";
pub const ORGANISER_PENDING: &str = "pending";
pub const ORGANISER_APPROVED: &str = "approved";
pub const ORGANISER_REJECTED: &str = "rejected";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub organiser_status: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UpsertUserData {
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
}

impl User {
    pub fn is_approved_organiser(&self) -> bool {
        self.organiser_status == ORGANISER_APPROVED
    }

    /// Inserts the user, or refreshes the profile of the user with that email.
    pub async fn upsert_by_email(pool: &PgPool, data: UpsertUserData) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO users (email, display_name, photo_url)
            VALUES (LOWER($1), $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                photo_url = COALESCE(EXCLUDED.photo_url, users.photo_url),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(&data.email)
        .bind(&data.display_name)
        .bind(&data.photo_url)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        display_name: Option<String>,
        photo_url: Option<String>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                photo_url = COALESCE($3, photo_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(display_name)
        .bind(photo_url)
        .fetch_one(pool)
        .await
    }

    /// Sets the organiser status, returning `None` when the user does not exist.
    pub async fn set_organiser_status(
        pool: &PgPool,
        id: Uuid,
        status: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE users
            SET organiser_status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_pending_organisers(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM users
            WHERE organiser_status = 'pending'
            ORDER BY updated_at ASC
            "#,
        )
        .fetch_all(pool)
        .await
    }
}
