use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::current_user, session::AppState};
use crate::error::Result;
use crate::models::{BusinessCard, Event, Subscription};

#[derive(Debug, Serialize)]
pub struct WidgetCard {
    pub id: Uuid,
    pub full_name: String,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub theme_color: String,
    pub share_url: String,
    pub qr_url: String,
}

#[derive(Debug, Serialize)]
pub struct WidgetEvent {
    pub id: Uuid,
    pub title: String,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
}

/// Compact payload for the home-screen widget
#[derive(Debug, Serialize)]
pub struct WidgetResponse {
    pub card: Option<WidgetCard>,
    pub next_event: Option<WidgetEvent>,
    pub is_premium: bool,
}

fn widget_card(card: BusinessCard, share_url: String) -> WidgetCard {
    WidgetCard {
        qr_url: format!("/c/{}/qr.svg", card.id),
        id: card.id,
        full_name: card.full_name,
        job_title: card.job_title,
        company: card.company,
        theme_color: card.theme_color,
        share_url,
    }
}

async fn widget(State(state): State<AppState>, session: Session) -> Result<Json<WidgetResponse>> {
    let user = current_user(&session, &state.pool).await?;

    let card = BusinessCard::find_primary(&state.pool, user.id)
        .await?
        .map(|card| {
            let share_url = state.config.card_share_url(card.id);
            widget_card(card, share_url)
        });

    let next_event = Event::next_ticketed_for_email(&state.pool, &user.email)
        .await?
        .map(|event| WidgetEvent {
            id: event.id,
            title: event.title,
            location: event.location,
            starts_at: event.starts_at,
        });

    let is_premium = Subscription::find_by_user(&state.pool, user.id)
        .await?
        .is_some_and(|s| s.is_entitled(Utc::now()));

    Ok(Json(WidgetResponse {
        card,
        next_event,
        is_premium,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/widget", get(widget))
}
