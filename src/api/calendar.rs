use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::current_user, session::AppState};
use crate::error::{AppError, Result};
use crate::models::{
    booking::{Booking, CreateBookingData},
    Event, User,
};
use crate::services::{
    calendar::{self, CalendarFeed},
    email, validation,
};

async fn load_host(state: &AppState, user_id: Uuid) -> Result<User> {
    User::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Calendar not found".to_string()))
}

/// iCalendar feed of a user's published events and busy slots
async fn calendar_feed(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Response> {
    let host = load_host(&state, user_id).await?;

    let events = Event::list_by_organiser(&state.pool, host.id, true).await?;
    let bookings = Booking::list_upcoming_for_host(&state.pool, host.id).await?;

    let mut feed = CalendarFeed::new(&host.display_name);
    for event in &events {
        feed.add_event(event, &format!("{}/api/events/{}", state.config.base_url, event.id));
    }
    for booking in &bookings {
        feed.add_busy_booking(booking);
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (header::CACHE_CONTROL, "max-age=300"),
        ],
        feed.render(),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct BookingRequest {
    guest_name: String,
    guest_email: String,
    starts_at: DateTime<Utc>,
    duration_minutes: i64,
    note: Option<String>,
}

fn prepare_booking(host_id: Uuid, req: BookingRequest, now: DateTime<Utc>) -> Result<CreateBookingData> {
    let guest_name = req.guest_name.trim().to_string();
    if guest_name.is_empty() {
        return Err(AppError::Validation("Guest name is required".to_string()));
    }
    if !validation::is_valid_email(&req.guest_email) {
        return Err(AppError::Validation(format!(
            "'{}' is not a valid email address",
            req.guest_email
        )));
    }

    let ends_at = calendar::validate_slot(req.starts_at, req.duration_minutes, now)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    Ok(CreateBookingData {
        host_user_id: host_id,
        guest_name,
        guest_email: validation::normalize_email(&req.guest_email),
        starts_at: req.starts_at,
        ends_at,
        note: req.note.filter(|n| !n.trim().is_empty()),
    })
}

async fn create_booking(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Booking>)> {
    let host = load_host(&state, user_id).await?;
    let data = prepare_booking(host.id, req, Utc::now())?;

    let booking = Booking::create_if_free(&state.pool, data)
        .await?
        .ok_or_else(|| AppError::Conflict("That time slot is no longer available".to_string()))?;

    tracing::info!(booking_id = %booking.id, host_id = %host.id, "Booking created");

    let mailer = state.mailer.clone();
    let notice = email::booking_notice(&host.email, &booking);
    tokio::spawn(async move {
        mailer.send_all_best_effort(&[notice]).await;
    });

    Ok((StatusCode::CREATED, Json(booking)))
}

async fn list_bookings(State(state): State<AppState>, session: Session) -> Result<Json<Vec<Booking>>> {
    let user = current_user(&session, &state.pool).await?;
    Ok(Json(Booking::list_upcoming_for_host(&state.pool, user.id).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    session: Session,
) -> Result<StatusCode> {
    let user = current_user(&session, &state.pool).await?;

    if !Booking::cancel(&state.pool, booking_id, user.id).await? {
        return Err(AppError::NotFound("Booking not found".to_string()));
    }

    tracing::info!(%booking_id, "Booking cancelled");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/public/calendar/:user_id", get(calendar_feed))
        .route("/public/calendar/:user_id/bookings", post(create_booking))
        .route("/api/bookings", get(list_bookings))
        .route("/api/bookings/:booking_id/cancel", post(cancel_booking))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(starts_in: Duration, minutes: i64) -> BookingRequest {
        BookingRequest {
            guest_name: " Bola ".to_string(),
            guest_email: "Bola@Example.com".to_string(),
            starts_at: Utc::now() + starts_in,
            duration_minutes: minutes,
            note: Some("  ".to_string()),
        }
    }

    #[test]
    fn test_prepare_booking() {
        let host = Uuid::new_v4();
        let data = prepare_booking(host, request(Duration::days(1), 30), Utc::now()).unwrap();

        assert_eq!(data.guest_name, "Bola");
        assert_eq!(data.guest_email, "bola@example.com");
        assert_eq!(data.ends_at - data.starts_at, Duration::minutes(30));
        assert_eq!(data.note, None);
    }

    #[test]
    fn test_rejects_bad_slots() {
        let host = Uuid::new_v4();
        assert!(prepare_booking(host, request(Duration::days(1), 5), Utc::now()).is_err());
        assert!(prepare_booking(host, request(-Duration::hours(1), 30), Utc::now()).is_err());

        let mut bad_email = request(Duration::days(1), 30);
        bad_email.guest_email = "not-an-email".to_string();
        assert!(matches!(
            prepare_booking(host, bad_email, Utc::now()),
            Err(AppError::Validation(_))
        ));
    }
}
