use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::current_user, session::AppState};
use crate::error::{AppError, Result};
use crate::models::{
    event::{CreateEventData, UpdateEventData, EVENT_CANCELLED},
    Attendee, BulkRegistration, Event, EventRegistration, Ticket, User,
};
use crate::services::bulk_registration::BulkCheckout;

const UPCOMING_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
struct CreateEventRequest {
    title: String,
    description: Option<String>,
    location: Option<String>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    #[serde(default)]
    ticket_price_minor: i64,
    currency: Option<String>,
    max_attendees: Option<i32>,
}

fn validate_schedule(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<()> {
    if ends_at <= starts_at {
        return Err(AppError::Validation("Event must end after it starts".to_string()));
    }
    Ok(())
}

fn validate_max_attendees(max_attendees: Option<i32>, current_attendees: i32) -> Result<()> {
    match max_attendees {
        Some(max) if max <= 0 => Err(AppError::Validation(
            "max_attendees must be positive".to_string(),
        )),
        Some(max) if max < current_attendees => Err(AppError::Validation(format!(
            "max_attendees cannot be lower than the {} attendees already registered",
            current_attendees
        ))),
        _ => Ok(()),
    }
}

/// Checks a new event and returns it with defaults applied.
fn prepare_event(
    organiser: &User,
    req: CreateEventRequest,
    default_currency: &str,
    now: DateTime<Utc>,
) -> Result<CreateEventData> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    validate_schedule(req.starts_at, req.ends_at)?;
    if req.ends_at <= now {
        return Err(AppError::Validation("Event has already ended".to_string()));
    }
    if req.ticket_price_minor < 0 {
        return Err(AppError::Validation("Ticket price cannot be negative".to_string()));
    }
    validate_max_attendees(req.max_attendees, 0)?;

    if req.ticket_price_minor > 0 && !organiser.is_approved_organiser() {
        return Err(AppError::Forbidden(
            "Only approved organisers can create paid events".to_string(),
        ));
    }

    let currency = req
        .currency
        .unwrap_or_else(|| default_currency.to_string())
        .trim()
        .to_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::Validation(format!("Invalid currency code '{}'", currency)));
    }

    Ok(CreateEventData {
        organiser_id: organiser.id,
        title,
        description: req.description,
        location: req.location,
        starts_at: req.starts_at,
        ends_at: req.ends_at,
        ticket_price_minor: req.ticket_price_minor,
        currency,
        max_attendees: req.max_attendees,
    })
}

async fn load_event(state: &AppState, event_id: Uuid) -> Result<Event> {
    Event::find_by_id(&state.pool, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

/// Loads an event the signed-in user organises
async fn load_organised(state: &AppState, session: &Session, event_id: Uuid) -> Result<Event> {
    let user = current_user(session, &state.pool).await?;
    let event = load_event(state, event_id).await?;

    if event.organiser_id != user.id && !user.is_admin {
        return Err(AppError::Forbidden(
            "Only the organiser can manage this event".to_string(),
        ));
    }
    Ok(event)
}

async fn list_upcoming(State(state): State<AppState>) -> Result<Json<Vec<Event>>> {
    Ok(Json(Event::list_upcoming(&state.pool, UPCOMING_LIMIT).await?))
}

async fn list_mine(State(state): State<AppState>, session: Session) -> Result<Json<Vec<Event>>> {
    let user = current_user(&session, &state.pool).await?;
    Ok(Json(Event::list_by_organiser(&state.pool, user.id, false).await?))
}

async fn create_event(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>)> {
    let user = current_user(&session, &state.pool).await?;
    let data = prepare_event(&user, req, &state.config.default_currency, Utc::now())?;

    let event = Event::create(&state.pool, data).await?;
    tracing::info!(event_id = %event.id, organiser_id = %user.id, paid = event.is_paid(), "Event created");

    Ok((StatusCode::CREATED, Json(event)))
}

async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Event>> {
    Ok(Json(load_event(&state, event_id).await?))
}

async fn update_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    session: Session,
    Json(data): Json<UpdateEventData>,
) -> Result<Json<Event>> {
    let event = load_organised(&state, &session, event_id).await?;
    if event.status == EVENT_CANCELLED {
        return Err(AppError::Conflict("Cancelled events cannot be edited".to_string()));
    }

    if data.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::Validation("Title cannot be empty".to_string()));
    }
    validate_schedule(
        data.starts_at.unwrap_or(event.starts_at),
        data.ends_at.unwrap_or(event.ends_at),
    )?;
    validate_max_attendees(data.max_attendees, event.current_attendees)?;

    Ok(Json(Event::update(&state.pool, event.id, data).await?))
}

async fn cancel_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    session: Session,
) -> Result<StatusCode> {
    let event = load_organised(&state, &session, event_id).await?;
    Event::cancel(&state.pool, event.id).await?;

    tracing::info!(event_id = %event.id, "Event cancelled");
    Ok(StatusCode::NO_CONTENT)
}

async fn register(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    session: Session,
) -> Result<(StatusCode, Json<Ticket>)> {
    let user = current_user(&session, &state.pool).await?;
    let ticket = state.ticketing.register_free(event_id, &user).await?;

    Ok((StatusCode::CREATED, Json(ticket)))
}

#[derive(Serialize)]
struct AttendanceResponse {
    event: Event,
    registrations: Vec<EventRegistration>,
    tickets_issued: i64,
}

async fn attendance(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    session: Session,
) -> Result<Json<AttendanceResponse>> {
    let event = load_organised(&state, &session, event_id).await?;

    let registrations = EventRegistration::list_by_event(&state.pool, event.id).await?;
    let tickets_issued = Ticket::count_by_event(&state.pool, event.id).await?;

    Ok(Json(AttendanceResponse {
        event,
        registrations,
        tickets_issued,
    }))
}

#[derive(Deserialize)]
struct BulkRegisterRequest {
    attendees: Vec<Attendee>,
}

#[derive(Serialize)]
struct BulkRegisterResponse {
    #[serde(flatten)]
    registration: BulkRegistration,
    authorization_url: Option<String>,
}

impl From<BulkCheckout> for BulkRegisterResponse {
    fn from(checkout: BulkCheckout) -> Self {
        Self {
            registration: checkout.registration,
            authorization_url: checkout.authorization_url,
        }
    }
}

/// Buys tickets for several attendees in one payment
async fn bulk_register(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    session: Session,
    Json(body): Json<BulkRegisterRequest>,
) -> Result<(StatusCode, Json<BulkRegisterResponse>)> {
    let user = current_user(&session, &state.pool).await?;

    let checkout = state
        .ticketing
        .start_bulk_registration(event_id, &user, body.attendees)
        .await?;

    Ok((StatusCode::CREATED, Json(checkout.into())))
}

async fn list_bulk_registrations(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<BulkRegistration>>> {
    let user = current_user(&session, &state.pool).await?;
    Ok(Json(BulkRegistration::list_by_purchaser(&state.pool, user.id).await?))
}

#[derive(Serialize)]
struct BulkRegistrationDetail {
    #[serde(flatten)]
    registration: BulkRegistration,
    tickets: Vec<Ticket>,
}

async fn get_bulk_registration(
    State(state): State<AppState>,
    Path(registration_id): Path<Uuid>,
    session: Session,
) -> Result<Json<BulkRegistrationDetail>> {
    let user = current_user(&session, &state.pool).await?;

    let registration = BulkRegistration::find_by_id(&state.pool, registration_id)
        .await?
        .filter(|r| r.purchaser_id == user.id)
        .ok_or_else(|| AppError::NotFound("Registration not found".to_string()))?;
    let tickets = Ticket::list_by_bulk_registration(&state.pool, registration.id).await?;

    Ok(Json(BulkRegistrationDetail {
        registration,
        tickets,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/events", get(list_upcoming).post(create_event))
        .route("/api/events/mine", get(list_mine))
        .route("/api/events/:event_id", get(get_event).patch(update_event))
        .route("/api/events/:event_id/cancel", post(cancel_event))
        .route("/api/events/:event_id/register", post(register))
        .route("/api/events/:event_id/attendance", get(attendance))
        .route("/events/:event_id/bulk-register", post(bulk_register))
        .route("/api/bulk-registrations", get(list_bulk_registrations))
        .route("/api/bulk-registrations/:registration_id", get(get_bulk_registration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{ORGANISER_APPROVED, ORGANISER_NONE};
    use chrono::Duration;

    fn user(organiser_status: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "org@example.com".to_string(),
            display_name: "Organiser".to_string(),
            photo_url: None,
            organiser_status: organiser_status.to_string(),
            is_admin: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn request(price: i64) -> CreateEventRequest {
        let now = Utc::now();
        CreateEventRequest {
            title: "  Builders Meetup ".to_string(),
            description: None,
            location: Some("Yaba".to_string()),
            starts_at: now + Duration::days(3),
            ends_at: now + Duration::days(3) + Duration::hours(2),
            ticket_price_minor: price,
            currency: None,
            max_attendees: Some(80),
        }
    }

    #[test]
    fn test_free_event_for_anyone() {
        let data = prepare_event(&user(ORGANISER_NONE), request(0), "ngn", Utc::now()).unwrap();
        assert_eq!(data.title, "Builders Meetup");
        assert_eq!(data.currency, "NGN");
    }

    #[test]
    fn test_paid_event_requires_approval() {
        let result = prepare_event(&user(ORGANISER_NONE), request(500_000), "NGN", Utc::now());
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let result = prepare_event(&user(ORGANISER_APPROVED), request(500_000), "NGN", Utc::now());
        assert!(result.is_ok());
    }

    #[test]
    fn test_schedule_and_capacity_checks() {
        let mut req = request(0);
        req.ends_at = req.starts_at;
        assert!(matches!(
            prepare_event(&user(ORGANISER_NONE), req, "NGN", Utc::now()),
            Err(AppError::Validation(_))
        ));

        assert!(validate_max_attendees(Some(0), 0).is_err());
        assert!(validate_max_attendees(Some(10), 11).is_err());
        assert!(validate_max_attendees(Some(11), 11).is_ok());
        assert!(validate_max_attendees(None, 500).is_ok());
    }

    #[test]
    fn test_invalid_currency() {
        let mut req = request(0);
        req.currency = Some("NAIRA".to_string());
        assert!(matches!(
            prepare_event(&user(ORGANISER_NONE), req, "NGN", Utc::now()),
            Err(AppError::Validation(_))
        ));
    }
}
