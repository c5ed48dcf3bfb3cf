use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub bulk_registration_id: Option<Uuid>,
    pub registration_id: Option<Uuid>,
    pub attendee_name: String,
    pub attendee_email: String,
    #[serde(skip_serializing)]
    pub ticket_code: String,
    pub status: String, // 'valid', 'checked_in', 'cancelled'
    pub issued_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub event_id: Uuid,
    pub bulk_registration_id: Option<Uuid>,
    pub registration_id: Option<Uuid>,
    pub attendee_name: String,
    pub attendee_email: String,
    pub ticket_code: String,
}

/// Outcome of a check-in attempt on a ticket row.
#[derive(Debug, Clone)]
pub enum CheckIn {
    Admitted(Ticket),
    AlreadyCheckedIn(DateTime<Utc>),
    Cancelled,
    NotFound,
}

impl Ticket {
    pub async fn create(conn: &mut PgConnection, data: NewTicket) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO tickets (
                event_id, bulk_registration_id, registration_id,
                attendee_name, attendee_email, ticket_code
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(data.event_id)
        .bind(data.bulk_registration_id)
        .bind(data.registration_id)
        .bind(&data.attendee_name)
        .bind(&data.attendee_email)
        .bind(&data.ticket_code)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_email(pool: &PgPool, email: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM tickets
            WHERE LOWER(attendee_email) = LOWER($1)
            ORDER BY issued_at DESC
            "#,
        )
        .bind(email)
        .fetch_all(pool)
        .await
    }

    pub async fn list_by_bulk_registration(
        pool: &PgPool,
        bulk_registration_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM tickets
            WHERE bulk_registration_id = $1
            ORDER BY issued_at ASC
            "#,
        )
        .bind(bulk_registration_id)
        .fetch_all(pool)
        .await
    }

    pub async fn count_by_event(pool: &PgPool, event_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE event_id = $1 AND status <> 'cancelled'")
            .bind(event_id)
            .fetch_one(pool)
            .await
    }

    /// Flips a valid ticket to checked-in, matching on both id and code.
    pub async fn check_in(
        pool: &PgPool,
        id: Uuid,
        ticket_code: &str,
    ) -> Result<CheckIn, sqlx::Error> {
        let admitted = sqlx::query_as::<_, Self>(
            r#"
            UPDATE tickets
            SET status = 'checked_in', checked_in_at = NOW()
            WHERE id = $1 AND ticket_code = $2 AND status = 'valid'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(ticket_code)
        .fetch_optional(pool)
        .await?;

        if let Some(ticket) = admitted {
            return Ok(CheckIn::Admitted(ticket));
        }

        let existing = sqlx::query_as::<_, Self>(
            "SELECT * FROM tickets WHERE id = $1 AND ticket_code = $2",
        )
        .bind(id)
        .bind(ticket_code)
        .fetch_optional(pool)
        .await?;

        Ok(match existing {
            Some(ticket) if ticket.status == "cancelled" => CheckIn::Cancelled,
            Some(ticket) => CheckIn::AlreadyCheckedIn(ticket.checked_in_at.unwrap_or(ticket.issued_at)),
            None => CheckIn::NotFound,
        })
    }
}
