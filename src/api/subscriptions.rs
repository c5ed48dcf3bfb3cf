use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tower_sessions::Session;

use crate::api::middleware::{auth::current_user, session::AppState};
use crate::error::{AppError, Result};
use crate::models::Subscription;
use crate::services::revenuecat::{self, WebhookBody};

/// RevenueCat server-to-server notifications
async fn revenuecat_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if !revenuecat::is_authorized(
        authorization,
        state.config.revenuecat_webhook_auth.expose_secret(),
    ) {
        tracing::warn!("Rejected RevenueCat webhook with invalid authorization");
        return Err(AppError::Unauthorized);
    }

    let raw: JsonValue = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON: {}", e)))?;
    let parsed: WebhookBody = serde_json::from_value(raw.clone())
        .map_err(|e| AppError::Validation(format!("Invalid RevenueCat event: {}", e)))?;

    let result = revenuecat::handle_event(&state.pool, &parsed.event, &raw).await?;
    tracing::debug!(?result, "RevenueCat webhook handled");

    Ok(StatusCode::OK)
}

#[derive(Serialize)]
struct SubscriptionStatus {
    is_premium: bool,
    subscription: Option<Subscription>,
}

async fn my_subscription(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<SubscriptionStatus>> {
    let user = current_user(&session, &state.pool).await?;
    let subscription = Subscription::find_by_user(&state.pool, user.id).await?;

    Ok(Json(SubscriptionStatus {
        is_premium: subscription
            .as_ref()
            .is_some_and(|s| s.is_entitled(Utc::now())),
        subscription,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/revenuecat/webhook", post(revenuecat_webhook))
        .route("/api/subscriptions/me", get(my_subscription))
}
