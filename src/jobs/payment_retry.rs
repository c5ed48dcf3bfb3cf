use chrono::{Duration, Utc};
use sqlx::PgPool;

use crate::models::BulkRegistration;
use crate::services::bulk_registration::{PaymentOutcome, TicketingService};

/// Registrations younger than this are left to the webhook and callback.
const MIN_AGE_MINUTES: i64 = 2;
pub const MAX_VERIFICATION_ATTEMPTS: i32 = 5;

#[derive(Debug, Default)]
pub struct RetryStats {
    pub total_checked: usize,
    pub completed: usize,
    pub failed: usize,
    pub still_pending: usize,
    pub gave_up: usize,
    pub errors: usize,
}

/// Background job that re-verifies bulk registrations whose payment
/// confirmation never arrived.
///
/// For each `pending_payment` registration older than two minutes:
/// 1. Record the attempt
/// 2. Ask Paystack for the transaction status and finalize or fail it
/// 3. After the fifth unsuccessful attempt, mark it failed
pub async fn retry_pending_payments(
    pool: &PgPool,
    ticketing: &TicketingService,
    batch_size: i64,
) -> Result<RetryStats, sqlx::Error> {
    let mut stats = RetryStats::default();

    let cutoff = Utc::now() - Duration::minutes(MIN_AGE_MINUTES);
    let pending = BulkRegistration::list_pending_for_retry(
        pool,
        cutoff,
        MAX_VERIFICATION_ATTEMPTS,
        batch_size,
    )
    .await?;
    stats.total_checked = pending.len();

    if pending.is_empty() {
        return Ok(stats);
    }

    tracing::info!(total = stats.total_checked, "Starting payment retry job");

    for registration in pending {
        let attempts = BulkRegistration::record_verification_attempt(pool, registration.id).await?;
        let exhausted = attempts >= MAX_VERIFICATION_ATTEMPTS;

        match ticketing.confirm_payment(&registration.payment_reference).await {
            Ok(PaymentOutcome::Completed { .. }) => stats.completed += 1,
            Ok(PaymentOutcome::Failed { .. }) => stats.failed += 1,
            Ok(PaymentOutcome::AlreadyProcessed { .. } | PaymentOutcome::RefundRequired { .. }) => {}
            Ok(PaymentOutcome::Pending) => {
                if exhausted {
                    give_up(ticketing, &registration, attempts, &mut stats).await;
                } else {
                    stats.still_pending += 1;
                }
            }
            Err(e) => {
                tracing::error!(
                    bulk_registration_id = %registration.id,
                    reference = %registration.payment_reference,
                    attempts,
                    error = %e,
                    "Payment verification failed"
                );
                stats.errors += 1;
                if exhausted {
                    give_up(ticketing, &registration, attempts, &mut stats).await;
                }
            }
        }
    }

    tracing::info!(?stats, "Payment retry job completed");

    Ok(stats)
}

async fn give_up(
    ticketing: &TicketingService,
    registration: &BulkRegistration,
    attempts: i32,
    stats: &mut RetryStats,
) {
    let reason = format!("Payment not confirmed after {} verification attempts", attempts);
    match ticketing
        .record_failure(&registration.payment_reference, &reason)
        .await
    {
        Ok(_) => stats.gave_up += 1,
        Err(e) => {
            tracing::error!(
                bulk_registration_id = %registration.id,
                error = %e,
                "Failed to mark registration as failed"
            );
            stats.errors += 1;
        }
    }
}
