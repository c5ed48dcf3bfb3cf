use askama::Template;
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::current_user, session::AppState};
use crate::error::{AppError, Result};
use crate::models::{ticket::CheckIn, BulkRegistration, Event, Ticket, User};
use crate::services::{qr_generator, ticket_codes, wallet_pass::WalletPassError};

#[derive(Template)]
#[template(path = "tickets/show.html")]
struct TicketPageTemplate {
    event: Event,
    ticket: Ticket,
    starts_at: String,
    qr_url: String,
}

fn signing_key(state: &AppState) -> &[u8] {
    state.config.signing_key.expose_secret().as_bytes()
}

/// The attendee, or the person who bought the ticket, may view it.
async fn can_view(state: &AppState, user: &User, ticket: &Ticket) -> Result<bool> {
    if ticket.attendee_email.eq_ignore_ascii_case(&user.email) {
        return Ok(true);
    }
    let Some(bulk_id) = ticket.bulk_registration_id else {
        return Ok(false);
    };
    Ok(BulkRegistration::find_by_id(&state.pool, bulk_id)
        .await?
        .is_some_and(|r| r.purchaser_id == user.id))
}

async fn load_visible(state: &AppState, session: &Session, ticket_id: Uuid) -> Result<Ticket> {
    let user = current_user(session, &state.pool).await?;
    let not_found = || AppError::NotFound("Ticket not found".to_string());

    let ticket = Ticket::find_by_id(&state.pool, ticket_id)
        .await?
        .ok_or_else(not_found)?;

    if !can_view(state, &user, &ticket).await? {
        return Err(not_found());
    }
    Ok(ticket)
}

async fn list_tickets(State(state): State<AppState>, session: Session) -> Result<Json<Vec<Ticket>>> {
    let user = current_user(&session, &state.pool).await?;
    Ok(Json(Ticket::list_by_email(&state.pool, &user.email).await?))
}

#[derive(Serialize)]
struct TicketDetail {
    #[serde(flatten)]
    ticket: Ticket,
    qr_payload: String,
    ticket_url: String,
}

async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    session: Session,
) -> Result<Json<TicketDetail>> {
    let ticket = load_visible(&state, &session, ticket_id).await?;

    Ok(Json(TicketDetail {
        qr_payload: state.ticketing.ticket_payload(&ticket),
        ticket_url: state.ticketing.ticket_url(&ticket),
        ticket,
    }))
}

fn qr_svg_response(payload: &str) -> Result<Response> {
    let svg = qr_generator::generate_svg(payload)?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}

async fn ticket_qr_svg(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    session: Session,
) -> Result<Response> {
    let ticket = load_visible(&state, &session, ticket_id).await?;
    qr_svg_response(&state.ticketing.ticket_payload(&ticket))
}

async fn google_wallet(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    session: Session,
) -> Result<Json<serde_json::Value>> {
    let issuer = state.wallet.clone().ok_or(WalletPassError::NotConfigured)?;
    let ticket = load_visible(&state, &session, ticket_id).await?;
    let event = Event::find_by_id(&state.pool, ticket.event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    let save_url = issuer.save_url(&event, &ticket, &state.ticketing.ticket_payload(&ticket))?;

    tracing::info!(ticket_id = %ticket.id, "Google Wallet pass link issued");

    Ok(Json(json!({ "save_url": save_url })))
}

#[derive(Deserialize)]
struct CheckInRequest {
    payload: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
enum CheckInResponse {
    Admitted { ticket: Ticket },
    AlreadyCheckedIn { checked_in_at: DateTime<Utc> },
    Cancelled,
}

/// Scans a ticket QR code at the door. Only the event's organiser may do this.
async fn check_in(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CheckInRequest>,
) -> Result<Json<CheckInResponse>> {
    let user = current_user(&session, &state.pool).await?;

    let (ticket_id, code) = ticket_codes::parse_payload(&body.payload, signing_key(&state))
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let ticket = Ticket::find_by_id(&state.pool, ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;
    let event = Event::find_by_id(&state.pool, ticket.event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    if event.organiser_id != user.id && !user.is_admin {
        return Err(AppError::Forbidden(
            "Only the event organiser can check in tickets".to_string(),
        ));
    }

    let response = match Ticket::check_in(&state.pool, ticket_id, &code).await? {
        CheckIn::Admitted(ticket) => {
            tracing::info!(ticket_id = %ticket.id, event_id = %event.id, "Ticket checked in");
            CheckInResponse::Admitted { ticket }
        }
        CheckIn::AlreadyCheckedIn(at) => {
            tracing::warn!(%ticket_id, "Ticket already used");
            CheckInResponse::AlreadyCheckedIn { checked_in_at: at }
        }
        CheckIn::Cancelled => CheckInResponse::Cancelled,
        CheckIn::NotFound => return Err(AppError::NotFound("Ticket not found".to_string())),
    };

    Ok(Json(response))
}

async fn load_by_payload(state: &AppState, payload: &str) -> Result<Ticket> {
    let not_found = || AppError::NotFound("Ticket not found".to_string());

    let (ticket_id, code) =
        ticket_codes::parse_payload(payload, signing_key(state)).map_err(|_| not_found())?;

    Ticket::find_by_id(&state.pool, ticket_id)
        .await?
        .filter(|t| t.ticket_code == code)
        .ok_or_else(not_found)
}

/// Public ticket page linked from confirmation emails
async fn ticket_page(
    State(state): State<AppState>,
    Path(payload): Path<String>,
) -> Result<TicketPageTemplate> {
    let ticket = load_by_payload(&state, &payload).await?;
    let event = Event::find_by_id(&state.pool, ticket.event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    Ok(TicketPageTemplate {
        starts_at: event.starts_at.format("%a %e %b %Y, %H:%M UTC").to_string(),
        qr_url: format!("/t/{}/qr.svg", payload),
        event,
        ticket,
    })
}

async fn public_qr_svg(
    State(state): State<AppState>,
    Path(payload): Path<String>,
) -> Result<Response> {
    let ticket = load_by_payload(&state, &payload).await?;
    qr_svg_response(&state.ticketing.ticket_payload(&ticket))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tickets", get(list_tickets))
        .route("/api/tickets/check-in", post(check_in))
        .route("/api/tickets/:ticket_id", get(get_ticket))
        .route("/api/tickets/:ticket_id/qr.svg", get(ticket_qr_svg))
        .route("/api/tickets/:ticket_id/google-wallet", get(google_wallet))
        .route("/t/:payload", get(ticket_page))
        .route("/t/:payload/qr.svg", get(public_qr_svg))
}
