// Background jobs

pub mod payment_retry;
pub mod subscription_expiry;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::services::bulk_registration::TicketingService;

const PAYMENT_RETRY_SCHEDULE: &str = "0 */5 * * * *";
const SUBSCRIPTION_EXPIRY_SCHEDULE: &str = "0 0 * * * *";
const PAYMENT_RETRY_BATCH: i64 = 50;

/// Registers the recurring jobs and starts the scheduler.
pub async fn start_scheduler(
    pool: PgPool,
    ticketing: TicketingService,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let retry_pool = pool.clone();
    scheduler
        .add(Job::new_async(PAYMENT_RETRY_SCHEDULE, move |_id, _lock| {
            let pool = retry_pool.clone();
            let ticketing = ticketing.clone();
            Box::pin(async move {
                if let Err(e) =
                    payment_retry::retry_pending_payments(&pool, &ticketing, PAYMENT_RETRY_BATCH)
                        .await
                {
                    tracing::error!(error = %e, "Payment retry job failed");
                }
            })
        })?)
        .await?;

    scheduler
        .add(Job::new_async(SUBSCRIPTION_EXPIRY_SCHEDULE, move |_id, _lock| {
            let pool = pool.clone();
            Box::pin(async move {
                if let Err(e) = subscription_expiry::expire_lapsed_subscriptions(&pool).await {
                    tracing::error!(error = %e, "Subscription expiry job failed");
                }
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Background jobs scheduled");

    Ok(scheduler)
}
