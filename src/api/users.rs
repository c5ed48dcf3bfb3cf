use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{
    auth::{current_user, require_admin},
    session::AppState,
};
use crate::error::{AppError, Result};
use crate::models::{
    user::{ORGANISER_APPROVED, ORGANISER_NONE, ORGANISER_PENDING, ORGANISER_REJECTED},
    OAuthAccount, Subscription, User,
};

#[derive(Serialize)]
struct MeResponse {
    #[serde(flatten)]
    user: User,
    providers: Vec<String>,
    subscription: Option<Subscription>,
    is_premium: bool,
}

async fn me(State(state): State<AppState>, session: Session) -> Result<Json<MeResponse>> {
    let user = current_user(&session, &state.pool).await?;

    let providers = OAuthAccount::list_by_user(&state.pool, user.id)
        .await?
        .into_iter()
        .map(|account| account.provider)
        .collect();
    let subscription = Subscription::find_by_user(&state.pool, user.id).await?;
    let is_premium = subscription
        .as_ref()
        .is_some_and(|s| s.is_entitled(Utc::now()));

    Ok(Json(MeResponse {
        user,
        providers,
        subscription,
        is_premium,
    }))
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    display_name: Option<String>,
    photo_url: Option<String>,
}

async fn update_me(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    let user = current_user(&session, &state.pool).await?;

    let display_name = body.display_name.map(|n| n.trim().to_string());
    if display_name.as_deref() == Some("") {
        return Err(AppError::Validation("Display name cannot be empty".to_string()));
    }

    let user = User::update_profile(&state.pool, user.id, display_name, body.photo_url).await?;
    Ok(Json(user))
}

async fn request_organiser(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<User>> {
    let user = current_user(&session, &state.pool).await?;

    match user.organiser_status.as_str() {
        ORGANISER_APPROVED => {
            return Err(AppError::Conflict("Already an approved organiser".to_string()))
        }
        ORGANISER_PENDING => return Ok(Json(user)),
        ORGANISER_NONE | ORGANISER_REJECTED => {}
        other => tracing::warn!(user_id = %user.id, status = other, "Unexpected organiser status"),
    }

    let user = User::set_organiser_status(&state.pool, user.id, ORGANISER_PENDING)
        .await?
        .ok_or(AppError::Unauthorized)?;

    tracing::info!(user_id = %user.id, "Organiser status requested");

    Ok(Json(user))
}

async fn list_pending_organisers(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<User>>> {
    require_admin(&session, &state.pool).await?;
    Ok(Json(User::list_pending_organisers(&state.pool).await?))
}

async fn set_status(state: &AppState, session: &Session, user_id: Uuid, status: &str) -> Result<User> {
    let admin = require_admin(session, &state.pool).await?;

    let user = User::set_organiser_status(&state.pool, user_id, status)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::info!(admin_id = %admin.id, user_id = %user.id, status, "Organiser status changed");

    Ok(user)
}

async fn approve_organiser(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    session: Session,
) -> Result<Json<User>> {
    set_status(&state, &session, user_id, ORGANISER_APPROVED)
        .await
        .map(Json)
}

async fn reject_organiser(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    session: Session,
) -> Result<Json<User>> {
    set_status(&state, &session, user_id, ORGANISER_REJECTED)
        .await
        .map(Json)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users/me", get(me).patch(update_me))
        .route("/api/users/me/organiser-request", post(request_organiser))
        .route("/api/admin/organisers", get(list_pending_organisers))
        .route("/api/admin/organisers/:user_id/approve", post(approve_organiser))
        .route("/api/admin/organisers/:user_id/reject", post(reject_organiser))
}
