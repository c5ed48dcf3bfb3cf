//! RevenueCat event handling against a real database. Needs `DATABASE_URL`.

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use cardlink::models::{user::UpsertUserData, Subscription, User};
use cardlink::services::revenuecat::{handle_event, RevenueCatEvent, WebhookResult};

fn event(id: &str, event_type: &str, app_user_id: &str) -> RevenueCatEvent {
    RevenueCatEvent {
        id: id.to_string(),
        event_type: event_type.to_string(),
        app_user_id: app_user_id.to_string(),
        product_id: Some("cardlink_pro_monthly".to_string()),
        entitlement_ids: Some(vec!["pro".to_string()]),
        expiration_at_ms: Some(4_102_444_800_000),
        store: Some("APP_STORE".to_string()),
    }
}

async fn log_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM subscription_logs")
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test]
async fn purchase_activates_subscription_once(pool: PgPool) {
    let user = User::upsert_by_email(
        &pool,
        UpsertUserData {
            email: "tunde@example.com".to_string(),
            display_name: "Tunde Bakare".to_string(),
            photo_url: None,
        },
    )
    .await
    .unwrap();
    let purchase = event("evt-1", "INITIAL_PURCHASE", &user.id.to_string());

    let first = handle_event(&pool, &purchase, &json!({})).await.unwrap();
    assert_eq!(
        first,
        WebhookResult::Applied {
            user_id: user.id,
            status: "active"
        }
    );

    let replay = handle_event(&pool, &purchase, &json!({})).await.unwrap();
    assert_eq!(replay, WebhookResult::Duplicate);

    let subscription = Subscription::find_by_user(&pool, user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.status, "active");
    assert_eq!(subscription.entitlement.as_deref(), Some("pro"));
    assert_eq!(log_count(&pool).await, 1);
}

#[sqlx::test]
async fn unknown_user_is_logged_without_state_change(pool: PgPool) {
    let stranger = Uuid::new_v4().to_string();

    let result = handle_event(&pool, &event("evt-2", "RENEWAL", &stranger), &json!({}))
        .await
        .unwrap();

    assert_eq!(result, WebhookResult::Ignored);
    assert_eq!(log_count(&pool).await, 1);
}
