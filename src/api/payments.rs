use askama::Template;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::api::middleware::session::AppState;
use crate::error::{AppError, Result};
use crate::services::{
    bulk_registration::{PaymentOutcome, RegistrationError},
    paystack::{WebhookEvent, SIGNATURE_HEADER},
};

#[derive(Template)]
#[template(path = "payments/result.html")]
struct PaymentResultTemplate {
    tone: &'static str,
    heading: &'static str,
    message: String,
    reference: Option<String>,
}

impl PaymentResultTemplate {
    fn from_outcome(outcome: &PaymentOutcome, reference: String) -> Self {
        let (tone, heading, message) = match outcome {
            PaymentOutcome::Completed { tickets_issued } => (
                "ok",
                "Payment successful",
                format!("{} ticket(s) issued. Confirmation emails are on their way.", tickets_issued),
            ),
            PaymentOutcome::AlreadyProcessed { status } if status == "completed" => (
                "ok",
                "Payment successful",
                "Your tickets have already been issued.".to_string(),
            ),
            PaymentOutcome::Pending => (
                "pending",
                "Payment processing",
                "We have not received confirmation yet. Your tickets will be emailed once the payment clears.".to_string(),
            ),
            PaymentOutcome::Failed { reason } => ("failed", "Payment failed", reason.clone()),
            PaymentOutcome::RefundRequired { .. } => (
                "failed",
                "Payment will be refunded",
                "Your payment arrived after this registration had closed, so no tickets were issued. The amount will be refunded.".to_string(),
            ),
            PaymentOutcome::AlreadyProcessed { .. } => (
                "failed",
                "Payment failed",
                "This registration was not completed. Please start a new purchase.".to_string(),
            ),
        };

        Self {
            tone,
            heading,
            message,
            reference: Some(reference),
        }
    }

    fn error(message: &str, reference: Option<String>) -> Self {
        Self {
            tone: "failed",
            heading: "Something went wrong",
            message: message.to_string(),
            reference,
        }
    }
}

/// Paystack webhook. The signature is checked on the raw body before parsing.
async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !state
        .ticketing
        .paystack()
        .verify_webhook_signature(&body, signature)
    {
        tracing::warn!("Rejected Paystack webhook with invalid signature");
        return Err(AppError::Unauthorized);
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::info!(error = %e, "Ignoring Paystack webhook without a transaction reference");
            return Ok(StatusCode::OK);
        }
    };

    let reference = event.data.reference.as_str();
    let result = match event.event.as_str() {
        "charge.success" => state.ticketing.confirm_payment(reference).await,
        "charge.failed" => {
            let reason = event
                .data
                .gateway_response
                .as_deref()
                .unwrap_or("Charge failed");
            state.ticketing.record_failure(reference, reason).await
        }
        other => {
            tracing::debug!(event = other, %reference, "Ignoring Paystack webhook event");
            return Ok(StatusCode::OK);
        }
    };

    // Processing errors are acknowledged; the retry job re-verifies pending payments.
    match result {
        Ok(outcome) => {
            tracing::info!(event = %event.event, %reference, ?outcome, "Paystack webhook processed")
        }
        Err(RegistrationError::RegistrationNotFound) => {
            tracing::warn!(%reference, "Paystack webhook for unknown reference")
        }
        Err(e) => {
            tracing::error!(%reference, error = %e, "Paystack webhook processing failed")
        }
    }

    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct CallbackQuery {
    reference: Option<String>,
    trxref: Option<String>,
}

/// Where Paystack redirects the buyer after checkout
async fn paystack_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> PaymentResultTemplate {
    let Some(reference) = query.reference.or(query.trxref) else {
        return PaymentResultTemplate::error("Missing payment reference.", None);
    };

    match state.ticketing.confirm_payment(&reference).await {
        Ok(outcome) => PaymentResultTemplate::from_outcome(&outcome, reference),
        Err(RegistrationError::RegistrationNotFound) => {
            PaymentResultTemplate::error("We could not find this payment.", Some(reference))
        }
        Err(e) => {
            tracing::error!(%reference, error = %e, "Payment callback verification failed");
            PaymentResultTemplate::from_outcome(&PaymentOutcome::Pending, reference)
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/paystack/webhook", post(paystack_webhook))
        .route("/api/payments/paystack/callback", get(paystack_callback))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_page_tones() {
        let page = PaymentResultTemplate::from_outcome(
            &PaymentOutcome::Completed { tickets_issued: 3 },
            "CL-1".to_string(),
        );
        assert_eq!(page.tone, "ok");
        assert!(page.message.starts_with("3 ticket(s)"));

        let page = PaymentResultTemplate::from_outcome(
            &PaymentOutcome::AlreadyProcessed {
                status: "failed".to_string(),
            },
            "CL-2".to_string(),
        );
        assert_eq!(page.tone, "failed");
    }

    #[test]
    fn test_result_page_renders_escaped() {
        let page = PaymentResultTemplate::from_outcome(
            &PaymentOutcome::Failed {
                reason: "<b>Declined</b>".to_string(),
            },
            "CL-3".to_string(),
        );
        let html = page.render().unwrap();

        assert!(html.contains("&lt;b&gt;Declined"));
        assert!(!html.contains("<b>Declined"));
        assert!(html.contains("CL-3"));
    }
}
