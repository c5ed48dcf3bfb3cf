use chrono::Utc;
use sqlx::PgPool;

/// Moves subscriptions whose paid period has ended to `expired`.
/// RevenueCat normally sends EXPIRATION itself; this catches missed webhooks.
pub async fn expire_lapsed_subscriptions(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let expired = crate::models::Subscription::expire_lapsed(pool, Utc::now()).await?;

    if expired > 0 {
        tracing::info!(expired, "Expired lapsed subscriptions");
    } else {
        tracing::debug!("No lapsed subscriptions");
    }

    Ok(expired)
}
