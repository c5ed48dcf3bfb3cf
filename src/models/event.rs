use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

pub const EVENT_PUBLISHED: &str = "published";
pub const EVENT_CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub organiser_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub ticket_price_minor: i64,
    pub currency: String,
    pub max_attendees: Option<i32>,
    pub current_attendees: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventData {
    pub organiser_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub ticket_price_minor: i64,
    pub currency: String,
    pub max_attendees: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEventData {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub max_attendees: Option<i32>,
}

impl Event {
    pub fn is_paid(&self) -> bool {
        self.ticket_price_minor > 0
    }

    pub fn is_open_for_registration(&self, now: DateTime<Utc>) -> bool {
        self.status == EVENT_PUBLISHED && self.ends_at > now
    }

    /// Seats left, or `None` when the event has no attendee cap.
    pub fn remaining_capacity(&self) -> Option<i64> {
        self.max_attendees
            .map(|max| (i64::from(max) - i64::from(self.current_attendees)).max(0))
    }

    /// Create a new event
    pub async fn create(pool: &PgPool, data: CreateEventData) -> Result<Self, sqlx::Error> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (
                organiser_id, title, description, location, starts_at, ends_at,
                ticket_price_minor, currency, max_attendees
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(data.organiser_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.location)
        .bind(data.starts_at)
        .bind(data.ends_at)
        .bind(data.ticket_price_minor)
        .bind(data.currency)
        .bind(data.max_attendees)
        .fetch_one(pool)
        .await?;

        Ok(event)
    }

    /// Find event by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            SELECT * FROM events WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(event)
    }

    /// List events created by an organiser
    pub async fn list_by_organiser(
        pool: &PgPool,
        organiser_id: Uuid,
        published_only: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = if published_only {
            r#"
            SELECT * FROM events
            WHERE organiser_id = $1 AND status = 'published'
            ORDER BY starts_at ASC
            "#
        } else {
            r#"
            SELECT * FROM events
            WHERE organiser_id = $1
            ORDER BY starts_at ASC
            "#
        };

        let events = sqlx::query_as::<_, Event>(query)
            .bind(organiser_id)
            .fetch_all(pool)
            .await?;

        Ok(events)
    }

    /// List published events that have not ended yet
    pub async fn list_upcoming(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let events = sqlx::query_as::<_, Event>(
            r#"
            SELECT * FROM events
            WHERE status = 'published'
              AND ends_at >= NOW()
            ORDER BY starts_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(events)
    }

    /// Next upcoming event the given email holds a valid ticket for
    pub async fn next_ticketed_for_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            SELECT e.* FROM events e
            WHERE e.status = 'published'
              AND e.ends_at >= NOW()
              AND EXISTS (
                  SELECT 1 FROM tickets t
                  WHERE t.event_id = e.id
                    AND LOWER(t.attendee_email) = LOWER($1)
                    AND t.status <> 'cancelled'
              )
            ORDER BY e.starts_at ASC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Update an event
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateEventData,
    ) -> Result<Self, sqlx::Error> {
        // Build dynamic update query based on which fields are provided
        let mut query = String::from("UPDATE events SET ");
        let mut updates = Vec::new();
        let mut bind_count = 1;

        if data.title.is_some() {
            updates.push(format!("title = ${}", bind_count));
            bind_count += 1;
        }
        if data.description.is_some() {
            updates.push(format!("description = ${}", bind_count));
            bind_count += 1;
        }
        if data.location.is_some() {
            updates.push(format!("location = ${}", bind_count));
            bind_count += 1;
        }
        if data.starts_at.is_some() {
            updates.push(format!("starts_at = ${}", bind_count));
            bind_count += 1;
        }
        if data.ends_at.is_some() {
            updates.push(format!("ends_at = ${}", bind_count));
            bind_count += 1;
        }
        if data.max_attendees.is_some() {
            updates.push(format!("max_attendees = ${}", bind_count));
            bind_count += 1;
        }

        if updates.is_empty() {
            // No fields to update, just return existing event
            return Self::find_by_id(pool, id)
                .await?
                .ok_or(sqlx::Error::RowNotFound);
        }

        updates.push("updated_at = NOW()".to_string());
        query.push_str(&updates.join(", "));
        query.push_str(&format!(" WHERE id = ${} RETURNING *", bind_count));

        let mut query_builder = sqlx::query_as::<_, Event>(&query);

        if let Some(title) = data.title {
            query_builder = query_builder.bind(title);
        }
        if let Some(desc) = data.description {
            query_builder = query_builder.bind(desc);
        }
        if let Some(location) = data.location {
            query_builder = query_builder.bind(location);
        }
        if let Some(starts_at) = data.starts_at {
            query_builder = query_builder.bind(starts_at);
        }
        if let Some(ends_at) = data.ends_at {
            query_builder = query_builder.bind(ends_at);
        }
        if let Some(max_attendees) = data.max_attendees {
            query_builder = query_builder.bind(max_attendees);
        }

        query_builder = query_builder.bind(id);

        let event = query_builder.fetch_one(pool).await?;

        Ok(event)
    }

    /// Cancel an event (soft delete)
    pub async fn cancel(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE events
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Adds `quantity` attendees if the cap allows it. Returns `false` when
    /// the event is full (or no longer published) and nothing was changed.
    pub async fn try_reserve_seats(
        conn: &mut PgConnection,
        id: Uuid,
        quantity: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET current_attendees = current_attendees + $2,
                updated_at = NOW()
            WHERE id = $1
              AND status = 'published'
              AND (max_attendees IS NULL OR current_attendees + $2 <= max_attendees)
            "#,
        )
        .bind(id)
        .bind(quantity)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_event(max_attendees: Option<i32>, current_attendees: i32) -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            organiser_id: Uuid::new_v4(),
            title: "Founders Mixer".to_string(),
            description: None,
            location: Some("Lagos".to_string()),
            starts_at: now + Duration::days(3),
            ends_at: now + Duration::days(3) + Duration::hours(2),
            ticket_price_minor: 500_000,
            currency: "NGN".to_string(),
            max_attendees,
            current_attendees,
            status: EVENT_PUBLISHED.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_remaining_capacity() {
        assert_eq!(sample_event(Some(100), 40).remaining_capacity(), Some(60));
        assert_eq!(sample_event(Some(10), 10).remaining_capacity(), Some(0));
        assert_eq!(sample_event(None, 1_000).remaining_capacity(), None);
    }

    #[test]
    fn test_registration_window() {
        let now = Utc::now();
        let mut event = sample_event(None, 0);
        assert!(event.is_open_for_registration(now));

        event.status = EVENT_CANCELLED.to_string();
        assert!(!event.is_open_for_registration(now));

        let mut past = sample_event(None, 0);
        past.ends_at = now - Duration::hours(1);
        assert!(!past.is_open_for_registration(now));
    }
}
