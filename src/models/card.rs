use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BusinessCard {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub linkedin_url: Option<String>,
    pub bio: Option<String>,
    pub theme_color: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardFields {
    pub full_name: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub linkedin_url: Option<String>,
    pub bio: Option<String>,
    pub theme_color: Option<String>,
    pub is_primary: Option<bool>,
}

impl BusinessCard {
    /// Creates a card. The user's first card becomes primary.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        full_name: &str,
        fields: CardFields,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        let is_primary = existing == 0 || fields.is_primary.unwrap_or(false);
        if is_primary {
            clear_primary(&mut tx, user_id).await?;
        }

        let card = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO cards (
                user_id, full_name, job_title, company, email, phone,
                website, linkedin_url, bio, theme_color, is_primary
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, COALESCE($10, '#1E88E5'), $11)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(full_name)
        .bind(fields.job_title)
        .bind(fields.company)
        .bind(fields.email)
        .bind(fields.phone)
        .bind(fields.website)
        .bind(fields.linkedin_url)
        .bind(fields.bio)
        .bind(fields.theme_color)
        .bind(is_primary)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(card)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM cards WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM cards
            WHERE user_id = $1
            ORDER BY is_primary DESC, created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_primary(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM cards WHERE user_id = $1 AND is_primary")
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Applies the provided fields; absent fields keep their value.
    pub async fn update(pool: &PgPool, id: Uuid, fields: CardFields) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if fields.is_primary == Some(true) {
            let user_id: Uuid = sqlx::query_scalar("SELECT user_id FROM cards WHERE id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
            clear_primary(&mut tx, user_id).await?;
        }

        let card = sqlx::query_as::<_, Self>(
            r#"
            UPDATE cards
            SET full_name = COALESCE($2, full_name),
                job_title = COALESCE($3, job_title),
                company = COALESCE($4, company),
                email = COALESCE($5, email),
                phone = COALESCE($6, phone),
                website = COALESCE($7, website),
                linkedin_url = COALESCE($8, linkedin_url),
                bio = COALESCE($9, bio),
                theme_color = COALESCE($10, theme_color),
                is_primary = COALESCE($11, is_primary),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(fields.full_name)
        .bind(fields.job_title)
        .bind(fields.company)
        .bind(fields.email)
        .bind(fields.phone)
        .bind(fields.website)
        .bind(fields.linkedin_url)
        .bind(fields.bio)
        .bind(fields.theme_color)
        .bind(fields.is_primary)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(card)
    }

    /// Deletes a card; if it was primary, the oldest remaining card is promoted.
    pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let deleted: Option<bool> = sqlx::query_scalar(
            "DELETE FROM cards WHERE id = $1 AND user_id = $2 RETURNING is_primary",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if deleted == Some(true) {
            sqlx::query(
                r#"
                UPDATE cards SET is_primary = TRUE, updated_at = NOW()
                WHERE id = (
                    SELECT id FROM cards WHERE user_id = $1
                    ORDER BY created_at ASC LIMIT 1
                )
                "#,
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(deleted.is_some())
    }
}

async fn clear_primary(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE cards SET is_primary = FALSE WHERE user_id = $1 AND is_primary")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
