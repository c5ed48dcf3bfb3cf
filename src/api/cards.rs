use askama::Template;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::current_user, session::AppState};
use crate::error::{AppError, Result};
use crate::models::card::{BusinessCard, CardFields};
use crate::services::{qr_generator, validation, vcard};

#[derive(Template)]
#[template(path = "cards/share.html")]
struct SharePageTemplate {
    card: BusinessCard,
    vcard_url: String,
    qr_url: String,
}

fn validate_fields(fields: &CardFields) -> Result<()> {
    if let Some(name) = &fields.full_name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Full name cannot be empty".to_string()));
        }
    }
    if let Some(email) = &fields.email {
        if !validation::is_valid_email(email) {
            return Err(AppError::Validation(format!("'{}' is not a valid email address", email)));
        }
    }
    if let Some(color) = &fields.theme_color {
        if !validation::is_valid_theme_color(color) {
            return Err(AppError::Validation(
                "Theme color must be a hex color like #1f2937".to_string(),
            ));
        }
    }
    Ok(())
}

async fn load_owned(state: &AppState, session: &Session, card_id: Uuid) -> Result<BusinessCard> {
    let user = current_user(session, &state.pool).await?;
    BusinessCard::find_by_id(&state.pool, card_id)
        .await?
        .filter(|card| card.user_id == user.id)
        .ok_or_else(|| AppError::NotFound("Card not found".to_string()))
}

async fn list_cards(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<BusinessCard>>> {
    let user = current_user(&session, &state.pool).await?;
    Ok(Json(BusinessCard::list_by_user(&state.pool, user.id).await?))
}

async fn create_card(
    State(state): State<AppState>,
    session: Session,
    Json(fields): Json<CardFields>,
) -> Result<(StatusCode, Json<BusinessCard>)> {
    let user = current_user(&session, &state.pool).await?;
    validate_fields(&fields)?;

    let full_name = fields
        .full_name
        .clone()
        .map(|n| n.trim().to_string())
        .unwrap_or_else(|| user.display_name.clone());

    let card = BusinessCard::create(&state.pool, user.id, &full_name, fields).await?;
    tracing::info!(card_id = %card.id, user_id = %user.id, "Card created");

    Ok((StatusCode::CREATED, Json(card)))
}

async fn get_card(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    session: Session,
) -> Result<Json<BusinessCard>> {
    Ok(Json(load_owned(&state, &session, card_id).await?))
}

async fn update_card(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    session: Session,
    Json(fields): Json<CardFields>,
) -> Result<Json<BusinessCard>> {
    let card = load_owned(&state, &session, card_id).await?;
    validate_fields(&fields)?;

    Ok(Json(BusinessCard::update(&state.pool, card.id, fields).await?))
}

async fn delete_card(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    session: Session,
) -> Result<StatusCode> {
    let user = current_user(&session, &state.pool).await?;

    if !BusinessCard::delete(&state.pool, card_id, user.id).await? {
        return Err(AppError::NotFound("Card not found".to_string()));
    }

    tracing::info!(%card_id, user_id = %user.id, "Card deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn vcard_response(state: &AppState, card: &BusinessCard) -> Response {
    let body = vcard::render(card, &state.config.card_share_url(card.id));
    (
        [
            (header::CONTENT_TYPE, "text/vcard; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", vcard::filename(card)),
            ),
        ],
        body,
    )
        .into_response()
}

async fn card_vcard(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    session: Session,
) -> Result<Response> {
    let card = load_owned(&state, &session, card_id).await?;
    Ok(vcard_response(&state, &card))
}

async fn card_qr_svg(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    session: Session,
) -> Result<Response> {
    let card = load_owned(&state, &session, card_id).await?;
    let svg = qr_generator::generate_svg(&state.config.card_share_url(card.id))?;

    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}

async fn card_qr_png(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    session: Session,
) -> Result<Response> {
    let card = load_owned(&state, &session, card_id).await?;
    let png = qr_generator::generate_png(&state.config.card_share_url(card.id))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

async fn load_public(state: &AppState, card_id: Uuid) -> Result<BusinessCard> {
    BusinessCard::find_by_id(&state.pool, card_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Card not found".to_string()))
}

/// Public page a scanned card QR code opens
async fn share_page(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
) -> Result<SharePageTemplate> {
    let card = load_public(&state, card_id).await?;

    Ok(SharePageTemplate {
        vcard_url: format!("/c/{}/vcard", card.id),
        qr_url: format!("/c/{}/qr.svg", card.id),
        card,
    })
}

async fn public_vcard(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
) -> Result<Response> {
    let card = load_public(&state, card_id).await?;
    Ok(vcard_response(&state, &card))
}

async fn public_qr_svg(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
) -> Result<Response> {
    let card = load_public(&state, card_id).await?;
    let svg = qr_generator::generate_svg(&state.config.card_share_url(card.id))?;

    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/cards", get(list_cards).post(create_card))
        .route(
            "/api/cards/:card_id",
            get(get_card).patch(update_card).delete(delete_card),
        )
        .route("/api/cards/:card_id/vcard", get(card_vcard))
        .route("/api/cards/:card_id/qr.svg", get(card_qr_svg))
        .route("/api/cards/:card_id/qr.png", get(card_qr_png))
        .route("/c/:card_id", get(share_page))
        .route("/c/:card_id/vcard", get(public_vcard))
        .route("/c/:card_id/qr.svg", get(public_qr_svg))
}
