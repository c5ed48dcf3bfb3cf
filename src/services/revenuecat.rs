//! RevenueCat webhook handling for iOS subscriptions.
//!
//! RevenueCat posts `{ "api_version": "1.0", "event": { ... } }` with the
//! shared secret in the `Authorization` header. `app_user_id` is the
//! cardlink user id the mobile client configured the SDK with.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::models::subscription::{
    Subscription, SubscriptionLog, UpsertSubscriptionData,
};

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookBody {
    pub event: RevenueCatEvent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RevenueCatEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub app_user_id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub entitlement_ids: Option<Vec<String>>,
    #[serde(default)]
    pub expiration_at_ms: Option<i64>,
    #[serde(default)]
    pub store: Option<String>,
}

/// Subscription status an event moves the user to, or `None` for event
/// types that carry no state change (TEST, TRANSFER, ...).
pub fn status_for_event(event_type: &str) -> Option<&'static str> {
    match event_type {
        "INITIAL_PURCHASE" | "RENEWAL" | "UNCANCELLATION" | "PRODUCT_CHANGE"
        | "NON_RENEWING_PURCHASE" => Some("active"),
        "CANCELLATION" => Some("cancelled"),
        "BILLING_ISSUE" => Some("billing_issue"),
        "EXPIRATION" => Some("expired"),
        _ => None,
    }
}

fn expiration(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

/// Whether the `Authorization` header carries the configured secret.
/// Accepts both the bare value and a `Bearer ` prefixed one.
pub fn is_authorized(header: Option<&str>, expected: &str) -> bool {
    let Some(header) = header else {
        return false;
    };
    let presented = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookResult {
    Applied { user_id: Uuid, status: &'static str },
    Duplicate,
    Ignored,
}

/// Logs the event and applies its status change in one transaction.
#[tracing::instrument(skip(pool, raw, event), fields(event_id = %event.id, event_type = %event.event_type))]
pub async fn handle_event(
    pool: &PgPool,
    event: &RevenueCatEvent,
    raw: &JsonValue,
) -> Result<WebhookResult, sqlx::Error> {
    // The log row references users, so only known ids are linked.
    let user_id = match Uuid::parse_str(&event.app_user_id) {
        Ok(id) => {
            let user = crate::models::User::find_by_id(pool, id).await?;
            if user.is_none() {
                tracing::warn!(user_id = %id, "RevenueCat event for unknown user");
            }
            user.map(|user| user.id)
        }
        Err(_) => None,
    };

    let mut tx = pool.begin().await?;

    let is_new = SubscriptionLog::record(
        &mut tx,
        user_id,
        &event.app_user_id,
        &event.id,
        &event.event_type,
        raw,
    )
    .await?;

    if !is_new {
        tracing::info!("Duplicate RevenueCat event ignored");
        return Ok(WebhookResult::Duplicate);
    }

    let (Some(user_id), Some(status)) = (user_id, status_for_event(&event.event_type)) else {
        tx.commit().await?;
        tracing::info!(app_user_id = %event.app_user_id, "RevenueCat event logged without state change");
        return Ok(WebhookResult::Ignored);
    };

    Subscription::upsert(
        &mut tx,
        UpsertSubscriptionData {
            user_id,
            product_id: event
                .product_id
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            entitlement: event
                .entitlement_ids
                .as_ref()
                .and_then(|ids| ids.first().cloned()),
            store: event.store.clone().unwrap_or_else(|| "APP_STORE".to_string()),
            status: status.to_string(),
            expires_at: expiration(event.expiration_at_ms),
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(%user_id, status, "Subscription updated from RevenueCat");

    Ok(WebhookResult::Applied { user_id, status })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for_event("INITIAL_PURCHASE"), Some("active"));
        assert_eq!(status_for_event("RENEWAL"), Some("active"));
        assert_eq!(status_for_event("CANCELLATION"), Some("cancelled"));
        assert_eq!(status_for_event("BILLING_ISSUE"), Some("billing_issue"));
        assert_eq!(status_for_event("EXPIRATION"), Some("expired"));
        assert_eq!(status_for_event("TEST"), None);
    }

    #[test]
    fn test_authorization_header() {
        assert!(is_authorized(Some("rc-shared-secret"), "rc-shared-secret"));
        assert!(is_authorized(Some("Bearer rc-shared-secret"), "rc-shared-secret"));
        assert!(!is_authorized(Some("Bearer wrong"), "rc-shared-secret"));
        assert!(!is_authorized(None, "rc-shared-secret"));
        assert!(!is_authorized(Some(""), ""));
    }

    #[test]
    fn test_event_parsing() {
        let body: WebhookBody = serde_json::from_str(
            r#"{
                "api_version": "1.0",
                "event": {
                    "id": "CD489E0E-5D52-4E03-966B-A7F17788E432",
                    "type": "RENEWAL",
                    "app_user_id": "2b1d5a0e-4f0c-4f7e-9d7a-2a9f7f1f3c11",
                    "product_id": "cardlink_pro_monthly",
                    "entitlement_ids": ["pro"],
                    "expiration_at_ms": 1767225600000,
                    "store": "APP_STORE",
                    "environment": "SANDBOX"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(body.event.event_type, "RENEWAL");
        assert_eq!(
            expiration(body.event.expiration_at_ms).unwrap().to_rfc3339(),
            "2026-01-01T00:00:00+00:00"
        );
    }
}
