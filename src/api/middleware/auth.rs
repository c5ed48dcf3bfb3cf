use sqlx::PgPool;
use tower_sessions::Session;
use uuid::Uuid;

use super::session::SESSION_KEY_USER_ID;
use crate::error::{AppError, Result};
use crate::models::User;

/// Reads the signed-in user id from the session.
pub async fn session_user_id(session: &Session) -> Result<Uuid> {
    session
        .get::<Uuid>(SESSION_KEY_USER_ID)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Loads the signed-in user. A session pointing at a deleted user is
/// treated as signed out.
pub async fn current_user(session: &Session, pool: &PgPool) -> Result<User> {
    let user_id = session_user_id(session).await?;

    match User::find_by_id(pool, user_id).await? {
        Some(user) => Ok(user),
        None => {
            session.flush().await?;
            Err(AppError::Unauthorized)
        }
    }
}

pub async fn require_admin(session: &Session, pool: &PgPool) -> Result<User> {
    let user = current_user(session, pool).await?;
    if !user.is_admin {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    Ok(user)
}
